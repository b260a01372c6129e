mod cli;
mod cmd;
mod command;
mod config;
mod engine;
mod images;
mod logger;
mod prompt;
mod spinner;

use anyhow::Result;
use tracing::{error, info};

fn main() -> Result<()> {
    match cli::run() {
        Ok(result) => {
            info!("dockbox finished successfully");
            Ok(result)
        }
        Err(err) => {
            error!(error = ?err, "dockbox failed");
            Err(err)
        }
    }
}
