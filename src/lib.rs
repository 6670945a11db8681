pub mod core;
pub mod handler;
pub mod providers;
pub mod render;
pub mod router;

use anyhow::{Result, bail};
use tracing::{debug, info};

pub enum AppCommand {
    /// Serve fund documents over HTTP
    Serve,
    /// Render the document for one fund to stdout
    Fetch(String),
}

pub async fn run_command(command: AppCommand, config_path: Option<&str>) -> Result<()> {
    info!("Fund XML service starting...");

    let config = match config_path {
        Some(path) => crate::core::config::AppConfig::load_from_path(path)?,
        None => crate::core::config::AppConfig::load()?,
    };
    debug!("Loaded config: {config:#?}");

    match command {
        AppCommand::Serve => handler::serve(&config).await,
        AppCommand::Fetch(fund) => {
            let state = handler::AppState::from_config(&config)?;
            let response = handler::handle_path(&state, &format!("/{fund}")).await;
            println!("{}", response.body);
            if !response.status.is_success() {
                bail!("Request for {fund} failed with status {}", response.status);
            }
            Ok(())
        }
    }
}
