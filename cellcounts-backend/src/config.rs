use std::fs;

use anyhow::Context;
use camino::{Utf8Path, Utf8PathBuf};
use cellcounts_core::model::Cohort;
use clap::{Args, Parser, Subcommand};

use crate::server::dashboard::DashboardConfig;

#[derive(Args, serde::Deserialize, Clone, Debug)]
#[serde(default)]
pub struct Config {
    #[arg(long, env = "CELLCOUNTS_DB_PATH", default_value = "cell_data.db")]
    db_path: Utf8PathBuf,
    #[arg(long, env = "CELLCOUNTS_HOST", default_value_t = String::from("127.0.0.1"))]
    host: String,
    #[arg(long, env = "CELLCOUNTS_PORT", default_value_t = 8050)]
    port: u16,
    #[arg(long, env = "CELLCOUNTS_COHORT_CONDITION", default_value_t = String::from("melanoma"))]
    cohort_condition: String,
    #[arg(long, env = "CELLCOUNTS_COHORT_TREATMENT", default_value_t = String::from("miraclib"))]
    cohort_treatment: String,
    #[arg(long, env = "CELLCOUNTS_COHORT_SAMPLE_TYPE", default_value_t = String::from("PBMC"))]
    cohort_sample_type: String,
    #[arg(long, env = "CELLCOUNTS_DASHBOARD_CONFIG_PATH")]
    dashboard_config_path: Option<Utf8PathBuf>,
    #[arg(skip)]
    dashboard: DashboardConfig,
}

impl Default for Config {
    fn default() -> Self {
        let Cohort {
            condition,
            treatment,
            sample_type,
        } = Cohort::default();

        Self {
            db_path: Utf8PathBuf::from("cell_data.db"),
            host: String::from("127.0.0.1"),
            port: 8050,
            cohort_condition: condition,
            cohort_treatment: treatment,
            cohort_sample_type: sample_type,
            dashboard_config_path: None,
            dashboard: DashboardConfig::default(),
        }
    }
}

impl Config {
    /// Replaces the default dashboard title and theme with the TOML file at
    /// `dashboard_config_path`, when one is given.
    ///
    /// # Errors
    pub fn read_dashboard_config(&mut self) -> anyhow::Result<()> {
        let Self {
            dashboard_config_path,
            dashboard,
            ..
        } = self;

        let Some(path) = dashboard_config_path else {
            return Ok(());
        };

        let contents =
            fs::read_to_string(&path).context(format!("failed to read dashboard config {path}"))?;
        *dashboard =
            toml::from_str(&contents).context(format!("failed to parse dashboard config {path}"))?;

        Ok(())
    }

    #[must_use]
    pub fn app_address(&self) -> String {
        let Self {
            host: app_host,
            port: app_port,
            ..
        } = self;

        format!("{app_host}:{app_port}")
    }

    #[must_use]
    pub fn db_path(&self) -> &Utf8Path {
        &self.db_path
    }

    #[must_use]
    pub fn cohort(&self) -> Cohort {
        let Self {
            cohort_condition,
            cohort_treatment,
            cohort_sample_type,
            ..
        } = self;

        Cohort::new(cohort_condition, cohort_treatment, cohort_sample_type)
    }

    #[must_use]
    pub fn dashboard(&self) -> &DashboardConfig {
        &self.dashboard
    }
}

#[derive(Subcommand)]
pub enum Command {
    /// Replace the store with the contents of a cell-count CSV
    Load {
        #[command(flatten)]
        config: Config,
        #[arg(long, env = "CELLCOUNTS_CSV_PATH", default_value = "cell-count.csv")]
        csv_path: Utf8PathBuf,
    },
    /// Serve the dashboard over HTTP
    Serve {
        #[command(flatten)]
        config: Config,
    },
}

#[derive(Parser)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
    #[arg(long, env = "CELLCOUNTS_LOG_DIR", global = true)]
    pub log_dir: Option<Utf8PathBuf>,
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use cellcounts_core::model::Cohort;
    use clap::Parser;
    use pretty_assertions::assert_eq;

    use super::{Cli, Command, Config};

    #[test]
    fn serve_defaults() {
        let Cli { command, log_dir } = Cli::try_parse_from(["cellcounts", "serve"]).unwrap();
        let Command::Serve { config } = command else {
            panic!("expected the serve command");
        };

        assert_eq!(log_dir, None);
        assert_eq!(config.app_address(), "127.0.0.1:8050");
        assert_eq!(config.db_path().as_str(), "cell_data.db");
        assert_eq!(config.cohort(), Cohort::default());
    }

    #[test]
    fn load_takes_a_csv_path() {
        let Cli { command, .. } = Cli::try_parse_from([
            "cellcounts",
            "load",
            "--csv-path",
            "data.csv",
            "--db-path",
            "store.db",
            "--log-dir",
            "logs",
        ])
        .unwrap();
        let Command::Load { config, csv_path } = command else {
            panic!("expected the load command");
        };

        assert_eq!(csv_path, "data.csv");
        assert_eq!(config.db_path().as_str(), "store.db");
    }

    #[test]
    fn partial_json_config() {
        let config: Config = serde_json::from_value(serde_json::json!({ "port": 9000 })).unwrap();

        assert_eq!(config.app_address(), "127.0.0.1:9000");
        assert_eq!(config.cohort(), Cohort::default());
    }

    #[test]
    fn dashboard_config_from_toml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "title = \"Trial overview\"\npage_size = 5\n\n[theme]\naccent = \"#123456\""
        )
        .unwrap();

        let mut config = Config {
            dashboard_config_path: Some(file.path().to_path_buf().try_into().unwrap()),
            ..Config::default()
        };
        config.read_dashboard_config().unwrap();

        let dashboard = config.dashboard();
        assert_eq!(dashboard.title, "Trial overview");
        assert_eq!(dashboard.page_size, 5);
        assert_eq!(dashboard.theme.accent, "#123456");
        assert_eq!(dashboard.theme.responder, "#00cc00");
    }

    #[test]
    fn unreadable_dashboard_config() {
        let mut config = Config {
            dashboard_config_path: Some("does/not/exist.toml".into()),
            ..Config::default()
        };

        assert!(config.read_dashboard_config().is_err());
    }
}
