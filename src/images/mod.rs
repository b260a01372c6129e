//! Image lineage and safe removal.
//!
//! The CLI layer uses three entry points: [`build_forest`] to reconstruct the
//! lineage of the local images, [`render_forest`] to draw it, and
//! [`plan_and_execute_deletion`] to remove an image together with whichever
//! ancestors the user agrees to drop.

mod executor;
mod forest;
mod planner;
mod printer;

use std::io;

use tracing::{debug, info};

pub use executor::ExecutionReport;
pub use forest::ImageForest;

use executor::Executor;
use forest::ForestBuilder;
use planner::DeletionPlanner;
use printer::ForestPrinter;

use crate::config::Config;
use crate::engine::{Engine, EngineError, ImageFilter, Op};
use crate::prompt::Confirm;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Image not found: {0}")]
    NotFound(String),

    #[error("Aborted by user")]
    UserAborted,

    #[error("Failed to {op}{}", with_target(.id))]
    Engine {
        op: Op,
        id: String,
        #[source]
        source: EngineError,
    },

    #[error("Failed to read confirmation")]
    Prompt(#[from] io::Error),
}

fn with_target(id: &str) -> String {
    if id.is_empty() {
        String::new()
    } else {
        format!(" {id}")
    }
}

/// Reconstruct the lineage of the local images.
///
/// Only images under the managed namespace seed the forest unless
/// `include_all` is set, in which case every engine image seeds it,
/// untagged intermediates included. Ancestors are always included.
pub fn build_forest(
    engine: &dyn Engine,
    config: &Config,
    include_all: bool,
) -> Result<ImageForest, Error> {
    let mut images = engine
        .list_images(ImageFilter { all: include_all })
        .map_err(|source| Error::Engine {
            op: Op::ListImages,
            id: String::new(),
            source,
        })?;
    if !include_all {
        images.retain(|image| image.primary_tag().is_some_and(|tag| config.is_managed(tag)));
    }
    debug!(
        engine = engine.name(),
        images = images.len(),
        include_all,
        "images:building forest"
    );

    ForestBuilder::new(config).build(&images, |id| engine.image_history(id))
}

/// Remove `image_ref` and every ancestor the user approves, children first.
pub fn plan_and_execute_deletion(
    engine: &dyn Engine,
    config: &Config,
    image_ref: &str,
    confirm: &mut dyn Confirm,
) -> Result<ExecutionReport, Error> {
    let target = engine.inspect_image(image_ref).map_err(|source| match source {
        EngineError::NoSuchImage(_) => Error::NotFound(image_ref.to_string()),
        source => Error::Engine {
            op: Op::InspectImage,
            id: image_ref.to_string(),
            source,
        },
    })?;
    info!(image = %image_ref, id = %target, "images:deleting");

    let forest = build_forest(engine, config, true)?;
    let plan = DeletionPlanner::new(&forest).plan(&target, confirm)?;
    Executor::new(engine).apply(&plan)
}

pub fn render_forest(forest: &ImageForest) -> String {
    ForestPrinter::new(forest).render()
}
