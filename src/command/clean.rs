use anyhow::Result;
use console::style;
use tracing::info;

use crate::config::Config;
use crate::engine::Engine;
use crate::images::{self, ExecutionReport};
use crate::prompt::{Confirm, TerminalConfirm};

/// Image reference for a `clean` argument: box names are mapped into the
/// managed namespace unless the name already is a managed image or `is_image` is set.
pub fn image_ref(config: &Config, name: &str, is_image: bool) -> String {
    if is_image || config.is_managed(name) {
        name.to_string()
    } else {
        config.image_name(name)
    }
}

pub fn run(name: &str, is_image: bool) -> Result<()> {
    let (config, engine) = super::connect()?;
    let mut confirm = TerminalConfirm::stdio();
    if let Some(report) = clean(&engine, &config, name, is_image, &mut confirm)? {
        print_report(&report);
        println!("Successfully deleted dockbox: {}", image_ref(&config, name, is_image));
    } else {
        println!("Aborted.");
    }
    Ok(())
}

/// Returns `None` when the user declined the final confirmation.
fn clean(
    engine: &dyn Engine,
    config: &Config,
    name: &str,
    is_image: bool,
    confirm: &mut dyn Confirm,
) -> Result<Option<ExecutionReport>> {
    let reference = image_ref(config, name, is_image);
    match images::plan_and_execute_deletion(engine, config, &reference, confirm) {
        Ok(report) => Ok(Some(report)),
        Err(images::Error::UserAborted) => {
            info!(image = %reference, "clean:aborted");
            Ok(None)
        }
        Err(e) => Err(e.into()),
    }
}

fn print_report(report: &ExecutionReport) {
    for container in &report.removed_containers {
        println!("  {} container {}", style("✔").green(), container);
    }
    for image in &report.removed_images {
        println!("  {} {}", style("✔").green(), image);
    }
    for image in &report.already_absent {
        println!("  {} {} (already removed)", style("-").dim(), image);
    }
}
