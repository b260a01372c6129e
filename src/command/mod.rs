pub mod clean;
pub mod list;
pub mod tree;

use anyhow::{Context, Result};

use crate::config::Config;
use crate::engine::{self, CliEngine};

/// Load the global config and connect to the configured engine.
fn connect() -> Result<(Config, CliEngine)> {
    let config = Config::load()?;
    let engine = engine::create_engine(&config).context("Failed to set up container engine")?;
    Ok((config, engine))
}
