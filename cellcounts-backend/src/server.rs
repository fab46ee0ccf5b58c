use std::sync::Arc;

use anyhow::Context;
use axum::{Router, routing::get};
use cellcounts_core::{
    baseline::{BASELINE_TIMEPOINT, BaselineSummary},
    comparison::{Comparison, compare_responders},
    frequency::FilterOptions,
    model::Cohort,
};
use dashboard::Dashboard;
use diesel::SqliteConnection;
use tokio::{net::TcpListener, signal};
use tower_http::trace::TraceLayer;

use crate::{
    config::Config,
    db::{self, DbPool, error::QueryError, query},
};

mod api;
pub mod dashboard;

/// Outputs that only depend on the loaded dataset, computed once at startup.
#[derive(Debug, Clone, serde::Serialize)]
pub struct Precomputed {
    pub comparison: Comparison,
    pub baseline: BaselineSummary,
    pub cohort_baseline: BaselineSummary,
    pub filter_options: FilterOptions,
}

impl Precomputed {
    /// # Errors
    pub fn compute(conn: &mut SqliteConnection, cohort: &Cohort) -> Result<Self, QueryError> {
        let comparison_rows = query::fetch_comparison_table(conn, cohort)?;
        let comparison = compare_responders(cohort.clone(), &comparison_rows);

        for row in comparison.rows.iter().filter(|r| r.note.is_some()) {
            tracing::warn!(
                population = %row.population,
                note = row.note.as_deref(),
                "comparison is undefined for {cohort}"
            );
        }

        let baseline =
            BaselineSummary::from_records(&query::fetch_baseline_table(conn, BASELINE_TIMEPOINT, None)?);
        let cohort_baseline = BaselineSummary::from_records(&query::fetch_baseline_table(
            conn,
            BASELINE_TIMEPOINT,
            Some(cohort),
        )?);

        let filter_options = FilterOptions::from_table(&query::frequency_table(conn)?);

        Ok(Self {
            comparison,
            baseline,
            cohort_baseline,
            filter_options,
        })
    }
}

#[derive(Clone)]
struct AppState {
    db_pool: DbPool,
    precomputed: Arc<Precomputed>,
    dashboard: Arc<Dashboard>,
}

impl AppState {
    async fn new(config: &Config) -> anyhow::Result<Self> {
        let db_path = config.db_path().to_owned();
        let cohort = config.cohort();

        let db_pool = db::read_only_pool(&db_path)
            .context(format!("failed to open a connection pool for {db_path}"))?;

        let pool = db_pool.clone();
        let precomputed = tokio::task::spawn_blocking(move || {
            let mut conn = pool.get()?;
            Precomputed::compute(&mut conn, &cohort)
        })
        .await?
        .context(format!("failed to compute dashboard data from {db_path}"))?;

        Ok(Self {
            db_pool,
            precomputed: Arc::new(precomputed),
            dashboard: Arc::new(Dashboard::new(config.dashboard().clone())),
        })
    }

    /// Runs `f` on a pooled connection on the blocking thread pool.
    async fn with_conn<T, F>(&self, f: F) -> api::error::Result<T>
    where
        F: FnOnce(&mut SqliteConnection) -> Result<T, QueryError> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.db_pool.clone();

        let result = tokio::task::spawn_blocking(move || {
            let mut conn = pool.get()?;
            f(&mut conn)
        })
        .await??;

        Ok(result)
    }
}

/// # Errors
pub async fn serve(mut config: Config) -> anyhow::Result<()> {
    config
        .read_dashboard_config()
        .context("failed to read dashboard config")?;
    let app_addr = config.app_address();

    let app_state = AppState::new(&config)
        .await
        .context("failed to initialize app state")?;
    tracing::info!(cohort = %config.cohort(), "precomputed comparison and baseline summaries");

    let app = app(app_state);

    let listener = TcpListener::bind(&app_addr)
        .await
        .context(format!("failed to listen on {app_addr}"))?;
    tracing::info!("cellcounts dashboard listening on {app_addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("failed to serve app")?;

    Ok(())
}

fn app(app_state: AppState) -> Router {
    api::router()
        .layer(TraceLayer::new_for_http())
        .route("/health", get(async || ()))
        .with_state(app_state)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
    tracing::info!("shutting down");
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{
        body::{Body, to_bytes},
        http::{Request, StatusCode},
    };
    use camino::Utf8PathBuf;
    use cellcounts_core::model::{Cohort, Population};
    use diesel::SqliteConnection;
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use tower::ServiceExt;

    use super::{AppState, Precomputed, app, dashboard::Dashboard};
    use crate::db::{
        self,
        error::QueryError,
        test_util::{bare_db, loaded_db, sample_csv_path},
    };

    fn state(db_path: &Utf8PathBuf) -> AppState {
        let mut conn = db::establish(db_path).unwrap();
        db::load::load(&mut conn, &sample_csv_path()).unwrap();

        let db_pool = db::read_only_pool(db_path).unwrap();
        let precomputed = Precomputed::compute(&mut db_pool.get().unwrap(), &Cohort::default()).unwrap();

        AppState {
            db_pool,
            precomputed: Arc::new(precomputed),
            dashboard: Arc::new(Dashboard::new(super::dashboard::DashboardConfig::default())),
        }
    }

    async fn get(app_state: AppState, uri: &str) -> (StatusCode, String) {
        let response = app(app_state)
            .oneshot(Request::get(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();

        (status, String::from_utf8(body.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn routes() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = Utf8PathBuf::try_from(dir.path().join("cell_data.db")).unwrap();
        let app_state = state(&db_path);

        let (status, _) = get(app_state.clone(), "/health").await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = get(app_state.clone(), "/?tab=comparison").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("Statistical Test Results"));

        let (status, body) = get(app_state.clone(), "/api/comparison").await;
        assert_eq!(status, StatusCode::OK);
        let comparison: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(comparison["cohort"]["condition"], "melanoma");

        let (status, _) = get(app_state.clone(), "/api/frequencies?time_from_treatment_start=soon").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = get(app_state, "/?tab=nowhere").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn read_only_pool_refuses_writes() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = Utf8PathBuf::try_from(dir.path().join("cell_data.db")).unwrap();
        let app_state = state(&db_path);

        let mut conn = app_state.db_pool.get().unwrap();
        assert!(db::reset_schema(&mut conn).is_err());
    }

    #[rstest]
    fn precomputed_from_loaded_store(#[from(loaded_db)] mut conn: SqliteConnection) {
        let precomputed = Precomputed::compute(&mut conn, &Cohort::default()).unwrap();

        assert_eq!(precomputed.comparison.n_samples(), 9);
        assert_eq!(precomputed.baseline.n_samples, 10);
        assert_eq!(precomputed.cohort_baseline.n_subjects, 5);
        assert_eq!(precomputed.filter_options.projects, ["prj1", "prj2", "prj3"]);
        assert_eq!(precomputed.filter_options.timepoints, [0, 7, 14]);
        assert_eq!(
            precomputed.filter_options.treatments,
            ["miraclib", "none", "phauximab"]
        );
        assert!(
            precomputed
                .comparison
                .row(Population::Cd4TCell)
                .unwrap()
                .p_value
                .is_some()
        );
    }

    #[rstest]
    fn precomputing_without_a_store(#[from(bare_db)] mut conn: SqliteConnection) {
        let err = Precomputed::compute(&mut conn, &Cohort::default()).unwrap_err();

        assert!(matches!(err, QueryError::SchemaMissing { .. }));
    }
}
