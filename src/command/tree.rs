use anyhow::{Context, Result};

use crate::config::Config;
use crate::engine::Engine;
use crate::images;
use crate::spinner;

pub fn run(all: bool) -> Result<()> {
    let (config, engine) = super::connect()?;
    let output = spinner::with_spinner("Reading image history", || render(&engine, &config, all))?;
    print!("{output}");
    Ok(())
}

fn render(engine: &dyn Engine, config: &Config, all: bool) -> Result<String> {
    let forest = images::build_forest(engine, config, all).context("Failed to build image tree")?;
    if forest.is_empty() {
        return Ok("No images found\n".to_string());
    }
    Ok(images::render_forest(&forest))
}
