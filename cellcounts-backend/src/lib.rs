use anyhow::Context;
use camino::{Utf8Path, Utf8PathBuf};
use config::Config;
use db::load::LoadReport;

pub mod config;
pub mod db;
pub mod server;

/// Pretty logs on stderr, or JSON lines in a daily rolling file under
/// `log_dir`.
pub fn initialize_logging(log_dir: Option<Utf8PathBuf>) {
    use tracing::Level;
    use tracing_subscriber::{filter::Targets, prelude::*};

    let log_layer = tracing_subscriber::fmt::layer();

    match log_dir {
        None => {
            let dev_log_filter = Targets::new()
                .with_target("cellcounts_backend", Level::DEBUG)
                .with_target("tower_http", Level::TRACE);
            let log_layer = log_layer.pretty().with_filter(dev_log_filter);

            tracing_subscriber::registry().with(log_layer).init();
        }
        Some(path) => {
            let log_writer = tracing_appender::rolling::daily(path, "cellcounts.log");
            let prod_log_filter = Targets::new()
                .with_target("cellcounts_backend", Level::INFO)
                .with_target("tower_http", Level::INFO);
            let log_layer = log_layer
                .json()
                .with_writer(log_writer)
                .with_filter(prod_log_filter);

            tracing_subscriber::registry().with(log_layer).init();
        }
    }
}

/// # Errors
pub fn load_dataset(config: &Config, csv_path: &Utf8Path) -> anyhow::Result<LoadReport> {
    let db_path = config.db_path();
    let mut conn = db::establish(db_path).context(format!("failed to open {db_path}"))?;

    let report = db::load::load(&mut conn, csv_path)
        .context(format!("failed to load {csv_path} into {db_path}"))?;
    tracing::info!(
        n_subjects = report.n_subjects,
        n_samples = report.n_samples,
        n_conflicts = report.conflicts.len(),
        "loaded {csv_path} into {db_path}"
    );

    Ok(report)
}

/// # Errors
pub async fn serve_app(config: Config) -> anyhow::Result<()> {
    server::serve(config).await
}
