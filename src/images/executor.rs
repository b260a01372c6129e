//! Applies a deletion plan against the engine.

use std::collections::HashMap;

use tracing::{debug, info, warn};

use super::Error;
use super::forest::ImageNode;
use super::planner::DeletionPlan;
use crate::engine::{ContainerSummary, Engine, EngineError, Op};

/// Outcome of a single removal request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Removal {
    Removed,
    AlreadyAbsent,
}

/// Containers keyed by both the image id and the image reference they were created from.
#[derive(Debug, Default)]
pub struct ContainerIndex {
    by_image: HashMap<String, Vec<String>>,
}

impl ContainerIndex {
    pub fn new(containers: &[ContainerSummary]) -> Self {
        let mut by_image: HashMap<String, Vec<String>> = HashMap::new();
        for container in containers {
            for key in [&container.image_id, &container.image_ref] {
                if !key.is_empty() {
                    by_image
                        .entry(key.clone())
                        .or_default()
                        .push(container.id.clone());
                }
            }
        }
        Self { by_image }
    }

    /// Containers depending on `node`, matched by id, tag, and the tag without `:latest`.
    pub fn for_node(&self, node: &ImageNode) -> Vec<&str> {
        let mut keys = vec![node.id.as_str()];
        if let Some(tag) = node.tag.as_deref() {
            keys.push(tag);
            if let Some(short) = tag.strip_suffix(":latest") {
                keys.push(short);
            }
        }

        let mut found: Vec<&str> = Vec::new();
        for key in keys {
            for id in self.by_image.get(key).into_iter().flatten() {
                if !found.contains(&id.as_str()) {
                    found.push(id);
                }
            }
        }
        found
    }
}

/// What the executor did, for reporting back to the user.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct ExecutionReport {
    pub removed_images: Vec<String>,
    pub already_absent: Vec<String>,
    pub removed_containers: Vec<String>,
}

pub struct Executor<'e> {
    engine: &'e dyn Engine,
}

impl<'e> Executor<'e> {
    pub fn new(engine: &'e dyn Engine) -> Self {
        Self { engine }
    }

    /// Remove every image in `plan`, in order, together with its containers.
    ///
    /// Stops at the first unexpected engine failure. Removals that already
    /// happened stay committed.
    pub fn apply(&self, plan: &DeletionPlan<'_>) -> Result<ExecutionReport, Error> {
        let containers = self
            .engine
            .list_containers(true)
            .map_err(|source| Error::Engine {
                op: Op::ListContainers,
                id: String::new(),
                source,
            })?;
        let index = ContainerIndex::new(&containers);
        debug!(containers = containers.len(), "executor:indexed containers");

        let mut report = ExecutionReport::default();
        for (step, node) in plan.nodes.iter().enumerate() {
            info!(step, image = %node.describe(), "executor:removing image");

            if !node.is_anonymous() {
                for container in index.for_node(node) {
                    if self.remove_container(container)? == Removal::Removed {
                        report.removed_containers.push(container.to_string());
                    }
                }
            }

            match self.remove_image(node)? {
                Removal::Removed => report.removed_images.push(node.label().to_string()),
                Removal::AlreadyAbsent => report.already_absent.push(node.label().to_string()),
            }
        }
        info!(
            removed = report.removed_images.len(),
            absent = report.already_absent.len(),
            containers = report.removed_containers.len(),
            "executor:done"
        );
        Ok(report)
    }

    /// Remove a container, stopping it first if the engine refuses because it is running.
    fn remove_container(&self, id: &str) -> Result<Removal, Error> {
        debug!(container = %id, "executor:removing container");
        let result = match self.engine.remove_container(id, false) {
            Err(EngineError::ContainerRunning(_)) => {
                info!(container = %id, "executor:stopping running container");
                match self.engine.stop_container(id) {
                    Ok(()) | Err(EngineError::NoSuchContainer(_)) => {}
                    Err(source) => {
                        return Err(Error::Engine {
                            op: Op::StopContainer,
                            id: id.to_string(),
                            source,
                        });
                    }
                }
                self.engine.remove_container(id, false)
            }
            other => other,
        };

        match result {
            Ok(()) => Ok(Removal::Removed),
            Err(EngineError::NoSuchContainer(_)) => {
                debug!(container = %id, "executor:container already absent");
                Ok(Removal::AlreadyAbsent)
            }
            Err(source) => {
                warn!(container = %id, error = %source, "executor:container removal failed");
                Err(Error::Engine {
                    op: Op::RemoveContainer,
                    id: id.to_string(),
                    source,
                })
            }
        }
    }

    fn remove_image(&self, node: &ImageNode) -> Result<Removal, Error> {
        match self.engine.remove_image(&node.id, true, true) {
            Ok(()) => {
                info!(image = %node.describe(), "executor:removed image");
                Ok(Removal::Removed)
            }
            Err(EngineError::NoSuchImage(_)) => {
                debug!(image = %node.describe(), "executor:image already absent");
                Ok(Removal::AlreadyAbsent)
            }
            Err(source) => {
                warn!(image = %node.describe(), error = %source, "executor:image removal failed");
                Err(Error::Engine {
                    op: Op::RemoveImage,
                    id: node.id.clone(),
                    source,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::engine::fake::{Call, FakeEngine};
    use crate::engine::ImageFilter;
    use crate::images::forest::{ForestBuilder, ImageForest};

    fn build(engine: &FakeEngine) -> ImageForest {
        let images = engine.list_images(ImageFilter { all: true }).unwrap();
        ForestBuilder::new(&Config::default())
            .build(&images, |id| engine.image_history(id))
            .unwrap()
    }

    fn plan_of<'a>(forest: &'a ImageForest, ids: &[&str]) -> DeletionPlan<'a> {
        DeletionPlan {
            nodes: ids.iter().map(|id| forest.get(id).unwrap()).collect(),
        }
    }

    #[test]
    fn test_removes_in_plan_order() {
        let engine = FakeEngine::new()
            .image("c", &["dockbox/app"], &["b", "a"])
            .layer_tags("b", &["dockbox/mid"]);
        let forest = build(&engine);

        let report = Executor::new(&engine)
            .apply(&plan_of(&forest, &["c", "b", "a"]))
            .unwrap();
        assert_eq!(engine.removed_images(), vec!["c", "b", "a"]);
        assert_eq!(report.removed_images, vec!["app", "mid", "a"]);
    }

    #[test]
    fn test_already_absent_image_is_skipped() {
        let engine = FakeEngine::new()
            .image("c", &["dockbox/app"], &["b"])
            .already_gone("c");
        let forest = build(&engine);

        let report = Executor::new(&engine)
            .apply(&plan_of(&forest, &["c", "b"]))
            .unwrap();
        assert_eq!(engine.removed_images(), vec!["c", "b"]);
        assert_eq!(report.already_absent, vec!["app"]);
        assert_eq!(report.removed_images, vec!["b"]);
    }

    #[test]
    fn test_failure_stops_without_rollback() {
        let engine = FakeEngine::new()
            .image("c", &["dockbox/app"], &["b", "a"])
            .failing_removal("b");
        let forest = build(&engine);

        let err = Executor::new(&engine)
            .apply(&plan_of(&forest, &["c", "b", "a"]))
            .unwrap_err();
        assert!(matches!(err, Error::Engine { op: Op::RemoveImage, ref id, .. } if id == "b"));
        assert_eq!(engine.removed_images(), vec!["c", "b"]);
    }

    #[test]
    fn test_running_container_is_stopped_then_removed() {
        let engine = FakeEngine::new()
            .image("c", &["dockbox/app:latest"], &[])
            .container("k1", "c", "dockbox/app", "running")
            .container("k2", "other", "dockbox/other", "exited");
        let forest = build(&engine);

        let report = Executor::new(&engine)
            .apply(&plan_of(&forest, &["c"]))
            .unwrap();
        assert_eq!(
            engine.calls(),
            vec![
                Call::RemoveContainer("k1".to_string()),
                Call::StopContainer("k1".to_string()),
                Call::RemoveContainer("k1".to_string()),
                Call::RemoveImage("c".to_string()),
            ]
        );
        assert_eq!(report.removed_containers, vec!["k1"]);
    }

    #[test]
    fn test_vanished_container_does_not_block_image_removal() {
        let engine = FakeEngine::new()
            .image("c", &["dockbox/app"], &[])
            .container("k1", "c", "dockbox/app", "exited")
            .vanished_container("k1");
        let forest = build(&engine);

        let report = Executor::new(&engine)
            .apply(&plan_of(&forest, &["c"]))
            .unwrap();
        assert_eq!(engine.removed_images(), vec!["c"]);
        assert!(report.removed_containers.is_empty());
        assert_eq!(report.removed_images, vec!["app"]);
    }

    #[test]
    fn test_container_failure_aborts_before_image_removal() {
        let engine = FakeEngine::new()
            .image("c", &["dockbox/app"], &["b"])
            .container("k1", "c", "dockbox/app", "exited")
            .failing_container("k1");
        let forest = build(&engine);

        let err = Executor::new(&engine)
            .apply(&plan_of(&forest, &["c", "b"]))
            .unwrap_err();
        assert!(matches!(err, Error::Engine { op: Op::RemoveContainer, ref id, .. } if id == "k1"));
        assert_eq!(engine.calls(), vec![Call::RemoveContainer("k1".to_string())]);
    }

    #[test]
    fn test_stop_failure_aborts_before_image_removal() {
        let engine = FakeEngine::new()
            .image("c", &["dockbox/app"], &[])
            .container("k1", "c", "dockbox/app", "running")
            .failing_stop("k1");
        let forest = build(&engine);

        let err = Executor::new(&engine)
            .apply(&plan_of(&forest, &["c"]))
            .unwrap_err();
        assert!(matches!(err, Error::Engine { op: Op::StopContainer, ref id, .. } if id == "k1"));
        assert_eq!(
            engine.calls(),
            vec![
                Call::RemoveContainer("k1".to_string()),
                Call::StopContainer("k1".to_string()),
            ]
        );
    }

    #[test]
    fn test_anonymous_layers_skip_container_removal() {
        let engine = FakeEngine::new()
            .image("c", &["dockbox/app"], &["b"])
            .container("k1", "b", "b", "exited");
        let forest = build(&engine);

        Executor::new(&engine)
            .apply(&plan_of(&forest, &["b"]))
            .unwrap();
        assert_eq!(engine.calls(), vec![Call::RemoveImage("b".to_string())]);
    }

    #[test]
    fn test_container_index_matches_tag_variants() {
        let containers = vec![
            ContainerSummary {
                id: "k1".to_string(),
                image_id: "sha256:a".to_string(),
                image_ref: "dockbox/app".to_string(),
                status: "exited".to_string(),
            },
            ContainerSummary {
                id: "k2".to_string(),
                image_id: "sha256:a".to_string(),
                image_ref: "sha256:a".to_string(),
                status: "exited".to_string(),
            },
        ];
        let index = ContainerIndex::new(&containers);
        let node = ImageNode {
            id: "sha256:a".to_string(),
            name: "app".to_string(),
            tag: Some("dockbox/app:latest".to_string()),
            parent: None,
            children: Default::default(),
        };
        assert_eq!(index.for_node(&node), vec!["k1", "k2"]);
    }
}
