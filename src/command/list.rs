use std::collections::{BTreeSet, HashMap};
use std::path::PathBuf;

use anyhow::{Context, Result};
use tabled::{
    Table, Tabled,
    settings::{Padding, Style, object::Columns},
};

use crate::config::{self, Config};
use crate::engine::{Engine, ImageFilter};
use crate::spinner;

#[derive(Tabled)]
struct DockboxRow {
    #[tabled(rename = "NAME")]
    name: String,
    #[tabled(rename = "SIZE (MB)")]
    size_mb: u64,
    #[tabled(rename = "CREATED")]
    created: String,
    #[tabled(rename = "STATUS")]
    status: String,
}

/// `2021-07-20T01:49:19.514Z` -> `2021-07-20 01:49:19 UTC`
fn format_created(created: &str) -> String {
    let trimmed = created
        .split_once('.')
        .map(|(secs, _)| secs)
        .unwrap_or(created)
        .trim_end_matches('Z');
    match trimmed
        .split_once('T')
        .and_then(|(date, time)| Some((date, time.get(..8)?)))
    {
        Some((date, time)) => format!("{} {} UTC", date, time),
        None => created.to_string(),
    }
}

pub fn run(paths: &[PathBuf]) -> Result<()> {
    let (config, engine) = super::connect()?;
    let wanted = (!paths.is_empty()).then(|| config::find_project_images(paths));
    let rows = spinner::with_spinner("Listing dockboxes", || {
        collect_rows(&engine, &config, wanted.as_ref())
    })?;

    if rows.is_empty() {
        println!("No dockboxes found");
        return Ok(());
    }

    let mut table = Table::new(rows);
    table
        .with(Style::blank())
        .modify(Columns::new(0..4), Padding::new(0, 1, 0, 0));
    println!("{table}");

    Ok(())
}

/// Managed images, optionally restricted to the image names in `wanted`.
fn collect_rows(
    engine: &dyn Engine,
    config: &Config,
    wanted: Option<&BTreeSet<String>>,
) -> Result<Vec<DockboxRow>> {
    let mut status_by_image: HashMap<String, String> = HashMap::new();
    for container in engine
        .list_containers(true)
        .context("Failed to list containers")?
    {
        let running = container.is_running();
        let status = status_by_image
            .entry(container.image_id)
            .or_insert_with(|| container.status.clone());
        if running {
            *status = container.status;
        }
    }

    let images = engine
        .list_images(ImageFilter::default())
        .context("Failed to list images")?;

    let rows = images
        .iter()
        .filter_map(|image| {
            let tag = image.primary_tag().filter(|tag| config.is_managed(tag))?;
            let name = config.display_name(tag);
            if let Some(wanted) = wanted
                && !wanted.contains(&config.image_name(&name))
            {
                return None;
            }
            Some(DockboxRow {
                name,
                size_mb: image.size / 1_000_000,
                created: format_created(&image.created),
                status: status_by_image.get(&image.id).cloned().unwrap_or_default(),
            })
        })
        .collect();
    Ok(rows)
}
