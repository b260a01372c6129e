//! Container engine abstraction.
//!
//! The image forest and deletion planner only ever talk to the engine through
//! the [`Engine`] trait, so tests can swap in an in-memory fake.

mod docker;
#[cfg(test)]
pub mod fake;

use std::fmt;

pub use docker::CliEngine;

use crate::config::{Config, Runtime};

/// Id the engine reports for history entries whose layer is not present locally.
pub const HISTORY_SENTINEL: &str = "<missing>";

/// Tag the engine reports for dangling images.
const DANGLING_TAG: &str = "<none>:<none>";

/// One image as reported by the engine's image listing.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ImageSummary {
    pub id: String,
    pub tags: Vec<String>,
    /// Size in bytes
    pub size: u64,
    /// Creation timestamp as reported by the engine (RFC 3339)
    pub created: String,
}

impl ImageSummary {
    /// First usable repo tag, ignoring dangling `<none>:<none>` placeholders.
    pub fn primary_tag(&self) -> Option<&str> {
        first_tag(&self.tags)
    }
}

/// One entry of an image's linear ancestry, newest first.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryRecord {
    pub id: String,
    pub tags: Vec<String>,
}

impl HistoryRecord {
    /// Whether this entry marks the end of the locally known ancestry.
    pub fn is_sentinel(&self) -> bool {
        self.id == HISTORY_SENTINEL
    }

    pub fn primary_tag(&self) -> Option<&str> {
        first_tag(&self.tags)
    }
}

fn first_tag(tags: &[String]) -> Option<&str> {
    tags.iter()
        .map(String::as_str)
        .find(|tag| !tag.is_empty() && *tag != DANGLING_TAG)
}

/// One container as reported by the engine.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ContainerSummary {
    pub id: String,
    /// Content id of the image the container was created from
    pub image_id: String,
    /// Image reference the container was created with, e.g. `dockbox/api`
    pub image_ref: String,
    pub status: String,
}

impl ContainerSummary {
    pub fn is_running(&self) -> bool {
        self.status == "running"
    }
}

/// Which images to list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImageFilter {
    /// Include intermediate (untagged) images
    pub all: bool,
}

/// Engine operation, used to label failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    ListImages,
    InspectImage,
    ImageHistory,
    ListContainers,
    RemoveContainer,
    StopContainer,
    RemoveImage,
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Op::ListImages => "list images",
            Op::InspectImage => "inspect image",
            Op::ImageHistory => "read history of",
            Op::ListContainers => "list containers",
            Op::RemoveContainer => "remove container",
            Op::StopContainer => "stop container",
            Op::RemoveImage => "remove image",
        };
        f.write_str(name)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("No such image: {0}")]
    NoSuchImage(String),

    #[error("No such container: {0}")]
    NoSuchContainer(String),

    #[error("Container {0} is running")]
    ContainerRunning(String),

    #[error("{0} not found in PATH")]
    RuntimeNotFound(&'static str),

    #[error("Failed to {op} {target}: {message}")]
    Failed {
        op: Op,
        target: String,
        message: String,
    },

    #[error("Failed to parse {op} output")]
    Parse {
        op: Op,
        #[source]
        source: serde_json::Error,
    },
}

/// The image and container primitives dockbox consumes from a container engine.
///
/// Every call blocks until the engine answers.
pub trait Engine {
    /// Returns the name of this engine (e.g., "docker", "podman")
    fn name(&self) -> &'static str;

    fn list_images(&self, filter: ImageFilter) -> Result<Vec<ImageSummary>, EngineError>;

    /// Resolve a reference (name, tag or id) to the image's content id.
    fn inspect_image(&self, reference: &str) -> Result<String, EngineError>;

    /// Ancestry of `id`, newest (the image itself) first.
    fn image_history(&self, id: &str) -> Result<Vec<HistoryRecord>, EngineError>;

    fn list_containers(&self, all: bool) -> Result<Vec<ContainerSummary>, EngineError>;

    fn remove_container(&self, id: &str, force: bool) -> Result<(), EngineError>;

    fn stop_container(&self, id: &str) -> Result<(), EngineError>;

    fn remove_image(&self, id: &str, force: bool, prune_children: bool)
    -> Result<(), EngineError>;
}

/// Detect which runtime to use based on environment and config.
///
/// Priority order:
/// 1. DOCKBOX_RUNTIME environment variable
/// 2. Config file runtime setting
/// 3. Default to docker
pub fn detect_runtime(config: &Config) -> Runtime {
    if let Ok(env_runtime) = std::env::var("DOCKBOX_RUNTIME") {
        match env_runtime.to_lowercase().as_str() {
            "docker" => return Runtime::Docker,
            "podman" => return Runtime::Podman,
            other => {
                eprintln!(
                    "dockbox: unknown runtime '{}' in DOCKBOX_RUNTIME, falling back to config",
                    other
                );
            }
        }
    }
    config.runtime()
}

/// Create an engine for the configured runtime.
pub fn create_engine(config: &Config) -> Result<CliEngine, EngineError> {
    CliEngine::locate(detect_runtime(config))
}
