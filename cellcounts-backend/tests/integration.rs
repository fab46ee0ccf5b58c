use camino::Utf8PathBuf;
use cellcounts_backend::{config::Config, load_dataset, server};
use pretty_assertions::assert_eq;
use scraper::{Html, Selector};
use serde_json::{Value, json};

fn config(db_path: &Utf8PathBuf, port: u16) -> Config {
    serde_json::from_value(json!({
        "db_path": db_path,
        "host": "127.0.0.1",
        "port": port,
    }))
    .unwrap()
}

fn sample_csv() -> Utf8PathBuf {
    Utf8PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("data/cell-count-sample.csv")
}

#[tokio::test]
async fn dashboard_and_api() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = Utf8PathBuf::try_from(dir.path().join("cell_data.db")).unwrap();
    let config = config(&db_path, 18050);

    let report = load_dataset(&config, &sample_csv()).unwrap();
    assert_eq!((report.n_subjects, report.n_samples), (9, 15));

    let app_address = format!("http://{}", config.app_address());
    let _server_handle = tokio::spawn(server::serve(config));

    let client = reqwest::Client::new();

    tokio::time::sleep(tokio::time::Duration::from_secs(1)).await;

    let health = client
        .get(format!("{app_address}/health"))
        .send()
        .await
        .unwrap();
    assert_eq!(health.status(), reqwest::StatusCode::OK);

    let page = client
        .get(format!(
            "{app_address}/?tab=frequency&project=prj3&population=b_cell"
        ))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    let page = Html::parse_document(&page);
    let rows = Selector::parse("table.frequencies tbody tr").unwrap();
    assert_eq!(page.select(&rows).count(), 3);

    let frequencies: Value = client
        .get(format!("{app_address}/api/frequencies?condition=healthy"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(frequencies["records"].as_array().unwrap().len(), 5);
    assert_eq!(frequencies["records"][0]["sample_id"], "s011");
    assert_eq!(frequencies["records"][0]["population"], "b_cell");

    let comparison: Value = client
        .get(format!("{app_address}/api/comparison"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(comparison["rows"].as_array().unwrap().len(), 5);
    assert_eq!(comparison["rows"][0]["responders_n"], 5);
    assert_eq!(comparison["rows"][0]["non_responders_n"], 4);

    let baseline: Value = client
        .get(format!("{app_address}/api/baseline"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(baseline["cohort_subset"]["n_samples"], 5);
    assert_eq!(baseline["all"]["n_subjects"], 9);

    let bad_filter = client
        .get(format!("{app_address}/?population=platelet"))
        .send()
        .await
        .unwrap();
    assert_eq!(bad_filter.status(), reqwest::StatusCode::BAD_REQUEST);
    let page = Html::parse_document(&bad_filter.text().await.unwrap());
    let error = Selector::parse("div.error").unwrap();
    assert_eq!(page.select(&error).count(), 1);
}

#[tokio::test]
async fn serving_without_a_store_fails_at_startup() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = Utf8PathBuf::try_from(dir.path().join("missing.db")).unwrap();

    let err = server::serve(config(&db_path, 18051)).await.unwrap_err();

    assert!(format!("{err:#}").contains("no data has been loaded yet"));
}
