use std::fs::{self, OpenOptions};
use std::sync::Mutex;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use toka::app::App;
use toka::config::{Cli, Config};
use toka::storage::LocalStorage;
use toka::{gateway, tui};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = Config::load(&cli)?;

    // The terminal belongs to the UI, so logs go to a file
    let log_path = config.log_path();
    if let Some(parent) = log_path.parent() {
        fs::create_dir_all(parent)?;
    }
    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .with_context(|| format!("opening log file {}", log_path.display()))?;
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(Mutex::new(log_file))
        .with_ansi(false)
        .init();

    let gateway = gateway::connect(&config)
        .await
        .context("connecting to the store")?;
    let storage = LocalStorage::open(config.local_storage_path())?;
    let mut app = App::new(gateway, storage, &cli.path)?;

    tui::install_panic_hook();
    let mut terminal = tui::init()?;
    let app_result = app.run(&mut terminal).await;
    tui::restore()?;
    app_result?;

    tracing::info!("Goodbye");
    Ok(())
}
