//! In-memory engine used by tests.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};

use super::{
    ContainerSummary, Engine, EngineError, HISTORY_SENTINEL, HistoryRecord, ImageFilter,
    ImageSummary, Op,
};

/// A mutation the fake engine received, in call order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    RemoveContainer(String),
    StopContainer(String),
    RemoveImage(String),
}

#[derive(Default)]
pub struct FakeEngine {
    images: Vec<ImageSummary>,
    /// Ancestor ids (excluding the image itself), newest first
    histories: HashMap<String, Vec<String>>,
    /// Histories that end without the sentinel
    open_ended: HashSet<String>,
    tags: HashMap<String, Vec<String>>,
    containers: RefCell<Vec<ContainerSummary>>,
    removed_images: RefCell<HashSet<String>>,
    gone_images: HashSet<String>,
    failing_images: HashSet<String>,
    failing_history: HashSet<String>,
    vanished_containers: HashSet<String>,
    failing_containers: HashSet<String>,
    failing_stops: HashSet<String>,
    calls: RefCell<Vec<Call>>,
}

impl FakeEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an image with tags and its ancestor chain (parent first).
    pub fn image(mut self, id: &str, tags: &[&str], ancestors: &[&str]) -> Self {
        let tags: Vec<String> = tags.iter().map(|t| t.to_string()).collect();
        self.tags.insert(id.to_string(), tags.clone());
        self.images.push(ImageSummary {
            id: id.to_string(),
            tags,
            size: 1_000_000,
            created: "2021-07-20T01:49:19Z".to_string(),
        });
        self.histories.insert(
            id.to_string(),
            ancestors.iter().map(|a| a.to_string()).collect(),
        );
        self
    }

    /// Attach tags to an intermediate layer that is not itself listed.
    pub fn layer_tags(mut self, id: &str, tags: &[&str]) -> Self {
        self.tags
            .insert(id.to_string(), tags.iter().map(|t| t.to_string()).collect());
        self
    }

    /// Make the image's history end without the sentinel record.
    pub fn open_ended(mut self, id: &str) -> Self {
        self.open_ended.insert(id.to_string());
        self
    }

    pub fn container(self, id: &str, image_id: &str, image_ref: &str, status: &str) -> Self {
        self.containers.borrow_mut().push(ContainerSummary {
            id: id.to_string(),
            image_id: image_id.to_string(),
            image_ref: image_ref.to_string(),
            status: status.to_string(),
        });
        self
    }

    /// `remove_image` reports "no such image" for this id.
    pub fn already_gone(mut self, id: &str) -> Self {
        self.gone_images.insert(id.to_string());
        self
    }

    /// `remove_image` fails with a generic error for this id.
    pub fn failing_removal(mut self, id: &str) -> Self {
        self.failing_images.insert(id.to_string());
        self
    }

    /// `image_history` fails for this id.
    pub fn failing_history(mut self, id: &str) -> Self {
        self.failing_history.insert(id.to_string());
        self
    }

    /// `remove_container` reports "no such container" for this id.
    pub fn vanished_container(mut self, id: &str) -> Self {
        self.vanished_containers.insert(id.to_string());
        self
    }

    /// `remove_container` fails with a generic error for this id.
    pub fn failing_container(mut self, id: &str) -> Self {
        self.failing_containers.insert(id.to_string());
        self
    }

    /// `stop_container` fails with a generic error for this id.
    pub fn failing_stop(mut self, id: &str) -> Self {
        self.failing_stops.insert(id.to_string());
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.borrow().clone()
    }

    pub fn removed_images(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::RemoveImage(id) => Some(id),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: Call) {
        self.calls.borrow_mut().push(call);
    }
}

impl Engine for FakeEngine {
    fn name(&self) -> &'static str {
        "fake"
    }

    fn list_images(&self, filter: ImageFilter) -> Result<Vec<ImageSummary>, EngineError> {
        let removed = self.removed_images.borrow();
        Ok(self
            .images
            .iter()
            .filter(|img| !removed.contains(&img.id))
            .filter(|img| filter.all || !img.tags.is_empty())
            .cloned()
            .collect())
    }

    fn inspect_image(&self, reference: &str) -> Result<String, EngineError> {
        self.images
            .iter()
            .find(|img| {
                img.id == reference
                    || img.tags.iter().any(|t| {
                        t == reference || t.strip_suffix(":latest") == Some(reference)
                    })
            })
            .map(|img| img.id.clone())
            .ok_or_else(|| EngineError::NoSuchImage(reference.to_string()))
    }

    fn image_history(&self, id: &str) -> Result<Vec<HistoryRecord>, EngineError> {
        if self.failing_history.contains(id) {
            return Err(EngineError::Failed {
                op: Op::ImageHistory,
                target: id.to_string(),
                message: "daemon unavailable".to_string(),
            });
        }
        let ancestors = self
            .histories
            .get(id)
            .ok_or_else(|| EngineError::NoSuchImage(id.to_string()))?;
        let record = |id: &str| HistoryRecord {
            id: id.to_string(),
            tags: self.tags.get(id).cloned().unwrap_or_default(),
        };
        let mut history = vec![record(id)];
        history.extend(ancestors.iter().map(|a| record(a.as_str())));
        if !self.open_ended.contains(id) {
            history.push(HistoryRecord {
                id: HISTORY_SENTINEL.to_string(),
                tags: vec![],
            });
        }
        Ok(history)
    }

    fn list_containers(&self, all: bool) -> Result<Vec<ContainerSummary>, EngineError> {
        Ok(self
            .containers
            .borrow()
            .iter()
            .filter(|c| all || c.is_running())
            .cloned()
            .collect())
    }

    fn remove_container(&self, id: &str, _force: bool) -> Result<(), EngineError> {
        self.record(Call::RemoveContainer(id.to_string()));
        if self.failing_containers.contains(id) {
            return Err(EngineError::Failed {
                op: Op::RemoveContainer,
                target: id.to_string(),
                message: "device or resource busy".to_string(),
            });
        }
        if self.vanished_containers.contains(id) {
            return Err(EngineError::NoSuchContainer(id.to_string()));
        }
        let mut containers = self.containers.borrow_mut();
        let pos = containers
            .iter()
            .position(|c| c.id == id)
            .ok_or_else(|| EngineError::NoSuchContainer(id.to_string()))?;
        if containers[pos].is_running() {
            return Err(EngineError::ContainerRunning(id.to_string()));
        }
        containers.remove(pos);
        Ok(())
    }

    fn stop_container(&self, id: &str) -> Result<(), EngineError> {
        self.record(Call::StopContainer(id.to_string()));
        if self.failing_stops.contains(id) {
            return Err(EngineError::Failed {
                op: Op::StopContainer,
                target: id.to_string(),
                message: "timeout".to_string(),
            });
        }
        let mut containers = self.containers.borrow_mut();
        let container = containers
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or_else(|| EngineError::NoSuchContainer(id.to_string()))?;
        container.status = "exited".to_string();
        Ok(())
    }

    fn remove_image(
        &self,
        id: &str,
        _force: bool,
        _prune_children: bool,
    ) -> Result<(), EngineError> {
        self.record(Call::RemoveImage(id.to_string()));
        if self.failing_images.contains(id) {
            return Err(EngineError::Failed {
                op: Op::RemoveImage,
                target: id.to_string(),
                message: "conflict".to_string(),
            });
        }
        if self.gone_images.contains(id) || !self.removed_images.borrow_mut().insert(id.to_string())
        {
            return Err(EngineError::NoSuchImage(id.to_string()));
        }
        Ok(())
    }
}
