//! Docker/Podman engine implementation backed by the runtime's CLI.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;
use tracing::{debug, trace};

use super::{
    ContainerSummary, Engine, EngineError, HistoryRecord, ImageFilter, ImageSummary, Op,
};
use crate::cmd::{Cmd, CmdFailure};
use crate::config::Runtime;

static NO_SUCH_IMAGE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)no such image|image not known").unwrap());

static NO_SUCH_CONTAINER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)no such container|no such object|no container with name or id").unwrap()
});

static CONTAINER_RUNNING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)cannot remove (a )?running container|container is running").unwrap()
});

/// Engine that drives the `docker` or `podman` executable.
pub struct CliEngine {
    runtime: Runtime,
    binary: PathBuf,
    /// id -> repo tags, filled on first history lookup
    tag_cache: RefCell<Option<HashMap<String, Vec<String>>>>,
}

impl CliEngine {
    /// Find the runtime executable on PATH.
    pub fn locate(runtime: Runtime) -> Result<Self, EngineError> {
        let binary =
            which::which(runtime.binary()).map_err(|_| EngineError::RuntimeNotFound(runtime.binary()))?;
        debug!(runtime = runtime.binary(), binary = %binary.display(), "engine:located");
        Ok(Self {
            runtime,
            binary,
            tag_cache: RefCell::new(None),
        })
    }

    fn cmd(&self) -> Cmd {
        Cmd::new(&self.binary)
    }

    /// Repo tags for each id, resolved from a cached full image listing.
    /// `history` only reports layer ids, so tags have to come from here.
    fn tags_for(&self, ids: &[String]) -> Result<Vec<Vec<String>>, EngineError> {
        if self.tag_cache.borrow().is_none() {
            let images = self.list_images(ImageFilter { all: true })?;
            let index = images.into_iter().map(|img| (img.id, img.tags)).collect();
            *self.tag_cache.borrow_mut() = Some(index);
        }
        let cache = self.tag_cache.borrow();
        Ok(ids
            .iter()
            .map(|id| {
                cache
                    .as_ref()
                    .and_then(|index| index.get(id))
                    .cloned()
                    .unwrap_or_default()
            })
            .collect())
    }

    fn invalidate_tags(&self) {
        self.tag_cache.borrow_mut().take();
    }
}

impl Engine for CliEngine {
    fn name(&self) -> &'static str {
        self.runtime.binary()
    }

    fn list_images(&self, filter: ImageFilter) -> Result<Vec<ImageSummary>, EngineError> {
        let stdout = self
            .cmd()
            .args(["image", "ls", "--quiet", "--no-trunc"])
            .arg_if(filter.all, "--all")
            .run_and_capture_stdout()
            .map_err(|e| classify(Op::ListImages, "", e))?;

        let ids = unique_lines(&stdout);
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        trace!(count = ids.len(), "engine:inspecting images");

        let json = self
            .cmd()
            .args(["image", "inspect"])
            .args(ids)
            .run_and_capture_stdout()
            .map_err(|e| classify(Op::ListImages, "", e))?;
        parse_image_inspect(&json)
    }

    fn inspect_image(&self, reference: &str) -> Result<String, EngineError> {
        self.cmd()
            .args(["image", "inspect", "--format", "{{.Id}}", reference])
            .run_and_capture_stdout()
            .map_err(|e| classify(Op::InspectImage, reference, e))
    }

    fn image_history(&self, id: &str) -> Result<Vec<HistoryRecord>, EngineError> {
        let stdout = self
            .cmd()
            .args(["image", "history", "--no-trunc", "--format", "{{.ID}}", id])
            .run_and_capture_stdout()
            .map_err(|e| classify(Op::ImageHistory, id, e))?;

        let ids: Vec<String> = stdout
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect();
        let tags = self.tags_for(&ids)?;
        Ok(ids
            .into_iter()
            .zip(tags)
            .map(|(id, tags)| HistoryRecord { id, tags })
            .collect())
    }

    fn list_containers(&self, all: bool) -> Result<Vec<ContainerSummary>, EngineError> {
        let stdout = self
            .cmd()
            .args(["container", "ls", "--quiet", "--no-trunc"])
            .arg_if(all, "--all")
            .run_and_capture_stdout()
            .map_err(|e| classify(Op::ListContainers, "", e))?;

        let ids = unique_lines(&stdout);
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let json = self
            .cmd()
            .args(["container", "inspect"])
            .args(ids)
            .run_and_capture_stdout()
            .map_err(|e| classify(Op::ListContainers, "", e))?;
        parse_container_inspect(&json)
    }

    fn remove_container(&self, id: &str, force: bool) -> Result<(), EngineError> {
        self.cmd()
            .args(["container", "rm"])
            .arg_if(force, "--force")
            .arg(id)
            .run()
            .map(|_| ())
            .map_err(|e| classify(Op::RemoveContainer, id, e))
    }

    fn stop_container(&self, id: &str) -> Result<(), EngineError> {
        self.cmd()
            .args(["container", "stop", id])
            .run()
            .map(|_| ())
            .map_err(|e| classify(Op::StopContainer, id, e))
    }

    fn remove_image(
        &self,
        id: &str,
        force: bool,
        prune_children: bool,
    ) -> Result<(), EngineError> {
        let result = self
            .cmd()
            .args(["image", "rm"])
            .arg_if(force, "--force")
            .arg_if(!prune_children, "--no-prune")
            .arg(id)
            .run()
            .map(|_| ())
            .map_err(|e| classify(Op::RemoveImage, id, e));
        self.invalidate_tags();
        result
    }
}

/// Map a failed CLI invocation onto the engine error the callers match on.
fn classify(op: Op, target: &str, failure: CmdFailure) -> EngineError {
    debug!(%op, reference = target, status = ?failure.status, "engine:command failed");
    let stderr = failure.stderr.as_str();
    let target = target.to_string();
    match op {
        Op::InspectImage | Op::ImageHistory | Op::RemoveImage if NO_SUCH_IMAGE.is_match(stderr) => {
            EngineError::NoSuchImage(target)
        }
        Op::RemoveContainer | Op::StopContainer if NO_SUCH_CONTAINER.is_match(stderr) => {
            EngineError::NoSuchContainer(target)
        }
        Op::RemoveContainer if CONTAINER_RUNNING.is_match(stderr) => {
            EngineError::ContainerRunning(target)
        }
        Op::InspectImage if NO_SUCH_CONTAINER.is_match(stderr) => EngineError::NoSuchImage(target),
        _ => EngineError::Failed {
            op,
            target,
            message: failure.to_string(),
        },
    }
}

fn unique_lines(stdout: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    stdout
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && seen.insert(*line))
        .map(str::to_string)
        .collect()
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ImageInspect {
    id: String,
    #[serde(default)]
    repo_tags: Option<Vec<String>>,
    #[serde(default)]
    size: u64,
    #[serde(default)]
    created: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ContainerInspect {
    id: String,
    #[serde(default)]
    image: String,
    #[serde(default)]
    config: Option<ContainerConfig>,
    #[serde(default)]
    state: Option<ContainerState>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ContainerConfig {
    #[serde(default)]
    image: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ContainerState {
    #[serde(default)]
    status: String,
}

fn parse_image_inspect(json: &str) -> Result<Vec<ImageSummary>, EngineError> {
    let images: Vec<ImageInspect> = serde_json::from_str(json).map_err(|source| {
        EngineError::Parse {
            op: Op::ListImages,
            source,
        }
    })?;
    Ok(images
        .into_iter()
        .map(|img| ImageSummary {
            id: img.id,
            tags: img.repo_tags.unwrap_or_default(),
            size: img.size,
            created: img.created,
        })
        .collect())
}

fn parse_container_inspect(json: &str) -> Result<Vec<ContainerSummary>, EngineError> {
    let containers: Vec<ContainerInspect> = serde_json::from_str(json).map_err(|source| {
        EngineError::Parse {
            op: Op::ListContainers,
            source,
        }
    })?;
    Ok(containers
        .into_iter()
        .map(|c| ContainerSummary {
            id: c.id,
            image_id: c.image,
            image_ref: c.config.map(|cfg| cfg.image).unwrap_or_default(),
            status: c.state.map(|s| s.status).unwrap_or_default(),
        })
        .collect())
}
