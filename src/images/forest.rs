//! Image lineage reconstructed from per-image history chains.
//!
//! Nodes live in an id-keyed arena owned by [`ImageForest`]. Parent and child
//! links are ids, never owning references, so the structure cannot form
//! reference cycles and needs no cleanup.

use std::collections::{BTreeSet, HashMap};

use tracing::{debug, info};

use super::Error;
use crate::config::Config;
use crate::engine::{EngineError, HistoryRecord, ImageSummary, Op};

/// One image or intermediate layer in the lineage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageNode {
    pub id: String,
    /// Display name; empty for anonymous intermediate layers
    pub name: String,
    /// Full repo tag the name was derived from
    pub tag: Option<String>,
    pub parent: Option<String>,
    pub children: BTreeSet<String>,
}

impl ImageNode {
    fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            name: String::new(),
            tag: None,
            parent: None,
            children: BTreeSet::new(),
        }
    }

    /// Name if the image is tagged, otherwise its id.
    pub fn label(&self) -> &str {
        if self.name.is_empty() {
            &self.id
        } else {
            &self.name
        }
    }

    /// Name and id together, for prompts and logs.
    pub fn describe(&self) -> String {
        if self.name.is_empty() {
            self.id.clone()
        } else {
            format!("{} ({})", self.name, self.id)
        }
    }

    pub fn is_anonymous(&self) -> bool {
        self.tag.is_none()
    }
}

/// The merged lineage of a set of images.
#[derive(Debug, Default)]
pub struct ImageForest {
    nodes: HashMap<String, ImageNode>,
    roots: Vec<String>,
    leaves: Vec<String>,
}

impl ImageForest {
    pub fn get(&self, id: &str) -> Option<&ImageNode> {
        self.nodes.get(id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Nodes without a resolvable parent, in discovery order.
    pub fn roots(&self) -> impl Iterator<Item = &ImageNode> {
        self.roots
            .iter()
            .filter_map(|id| self.nodes.get(id))
            .filter(|node| node.parent.is_none())
    }

    /// The images the forest was built from, in input order.
    pub fn leaves(&self) -> impl Iterator<Item = &ImageNode> {
        self.leaves.iter().filter_map(|id| self.nodes.get(id))
    }

    #[cfg(test)]
    pub fn nodes(&self) -> impl Iterator<Item = &ImageNode> {
        self.nodes.values()
    }

    pub fn parent_of(&self, node: &ImageNode) -> Option<&ImageNode> {
        node.parent.as_deref().and_then(|id| self.nodes.get(id))
    }

    /// Direct children of `node`, ordered by id.
    pub fn children_of<'a>(&'a self, node: &'a ImageNode) -> impl Iterator<Item = &'a ImageNode> {
        node.children.iter().filter_map(|id| self.nodes.get(id))
    }

    fn get_or_insert(&mut self, id: &str) -> &mut ImageNode {
        self.nodes
            .entry(id.to_string())
            .or_insert_with(|| ImageNode::new(id))
    }

    /// Make `parent` the parent of `child`, keeping both sides of the link in sync.
    fn link(&mut self, child: &str, parent: &str) {
        let previous = self.get_or_insert(child).parent.replace(parent.to_string());
        if let Some(previous) = previous.filter(|p| p != parent)
            && let Some(old) = self.nodes.get_mut(&previous)
        {
            old.children.remove(child);
        }
        self.get_or_insert(parent).children.insert(child.to_string());
    }

    fn add_root(&mut self, id: &str) {
        if !self.roots.iter().any(|r| r == id) {
            self.roots.push(id.to_string());
        }
    }
}

/// Merges linear per-image histories into an [`ImageForest`].
pub struct ForestBuilder<'a> {
    config: &'a Config,
}

impl<'a> ForestBuilder<'a> {
    pub fn new(config: &'a Config) -> Self {
        Self { config }
    }

    /// Build the forest for `images`, asking `history` for each image's ancestry.
    ///
    /// The first history record is the image itself and is skipped. Ancestors
    /// are looked up by id, so images that share a base converge on the same
    /// node. The first history error aborts the build.
    pub fn build<F>(&self, images: &[ImageSummary], mut history: F) -> Result<ImageForest, Error>
    where
        F: FnMut(&str) -> Result<Vec<HistoryRecord>, EngineError>,
    {
        let mut forest = ImageForest::default();

        for image in images {
            self.name_node(forest.get_or_insert(&image.id), image.primary_tag());
            if !forest.leaves.contains(&image.id) {
                forest.leaves.push(image.id.clone());
            }

            debug!(image = %image.id, tags = ?image.tags, "forest:reading history");
            let records = history(&image.id).map_err(|source| Error::Engine {
                op: Op::ImageHistory,
                id: image.id.clone(),
                source,
            })?;

            let mut current = image.id.clone();
            let mut reached_sentinel = false;
            for record in records.iter().skip(1) {
                if record.is_sentinel() {
                    forest.add_root(&current);
                    reached_sentinel = true;
                    break;
                }
                self.name_node(forest.get_or_insert(&record.id), record.primary_tag());
                forest.link(&current, &record.id);
                current = record.id.clone();
            }
            if !reached_sentinel && forest.get(&current).is_some_and(|n| n.parent.is_none()) {
                forest.add_root(&current);
            }
        }

        let root_names: Vec<&str> = forest.roots().map(ImageNode::label).collect();
        info!(
            nodes = forest.len(),
            leaves = forest.leaves().count(),
            roots = ?root_names,
            "forest:built"
        );
        Ok(forest)
    }

    fn name_node(&self, node: &mut ImageNode, tag: Option<&str>) {
        if let Some(tag) = tag
            && node.tag.is_none()
        {
            node.name = self.config.display_name(tag);
            node.tag = Some(tag.to_string());
        }
    }
}
