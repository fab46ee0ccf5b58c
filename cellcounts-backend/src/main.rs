use cellcounts_backend::{
    config::{Cli, Command},
    initialize_logging, load_dataset, serve_app,
};
use clap::Parser;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().unwrap_or_default();
    let Cli { command, log_dir } = Cli::parse();

    initialize_logging(log_dir);

    match command {
        Command::Load { config, csv_path } => {
            tokio::task::spawn_blocking(move || load_dataset(&config, &csv_path)).await??;
        }
        Command::Serve { config } => serve_app(config).await?,
    }

    Ok(())
}
