//! Ordering image removals so no image is removed before its dependents.

use tracing::{debug, info};

use super::Error;
use super::forest::{ImageForest, ImageNode};
use crate::prompt::{Confirm, Prompt};

/// Result of walking one subtree in postorder.
#[derive(Debug, Default)]
pub struct Postorder<'a> {
    /// Nodes without children
    pub leaves: Vec<&'a ImageNode>,
    /// Every node of the subtree, children strictly before their parent
    pub visited: Vec<&'a ImageNode>,
}

impl<'a> Postorder<'a> {
    /// Walk the subtree rooted at `root`, appending to this accumulator.
    pub fn walk(&mut self, forest: &'a ImageForest, root: &'a ImageNode) {
        if root.children.is_empty() {
            self.leaves.push(root);
        }
        for child in forest.children_of(root) {
            self.walk(forest, child);
        }
        self.visited.push(root);
    }
}

/// Images to remove, children before parents.
#[derive(Debug)]
pub struct DeletionPlan<'a> {
    pub nodes: Vec<&'a ImageNode>,
}

impl DeletionPlan<'_> {
    pub fn ids(&self) -> Vec<&str> {
        self.nodes.iter().map(|n| n.id.as_str()).collect()
    }
}

/// Computes which ancestors of an image can go with it, asking before
/// touching anything that is named or shared.
pub struct DeletionPlanner<'a> {
    forest: &'a ImageForest,
}

impl<'a> DeletionPlanner<'a> {
    pub fn new(forest: &'a ImageForest) -> Self {
        Self { forest }
    }

    /// Plan the removal of `target_id` and whichever ancestors the user approves.
    ///
    /// Ascends one parent at a time. Sibling subtrees of the node being left
    /// behind are gathered in postorder and placed, followed by the ancestor,
    /// after everything already planned. A decline stops the ascent; a decline
    /// of the final summary aborts with [`Error::UserAborted`].
    pub fn plan(
        &self,
        target_id: &str,
        confirm: &mut dyn Confirm,
    ) -> Result<DeletionPlan<'a>, Error> {
        let target = self
            .forest
            .get(target_id)
            .ok_or_else(|| Error::NotFound(target_id.to_string()))?;
        info!(image = %target.describe(), "planner:start");

        let mut plan = vec![target];
        let mut current = target;

        while let Some(ancestor) = self.forest.parent_of(current) {
            let mut siblings = Postorder::default();
            for sibling in self.forest.children_of(ancestor) {
                if sibling.id != current.id {
                    siblings.walk(self.forest, sibling);
                }
            }

            let prompt = if !siblings.leaves.is_empty() {
                Some(Prompt::RemoveWithDependents {
                    ancestor: ancestor.describe(),
                    affected: siblings.leaves.iter().map(|n| n.describe()).collect(),
                })
            } else if !ancestor.name.is_empty() {
                Some(Prompt::RemoveParent {
                    ancestor: ancestor.describe(),
                })
            } else {
                None
            };

            let approved = match prompt {
                Some(prompt) => confirm.confirm(&prompt)?,
                None => true,
            };
            debug!(
                ancestor = %ancestor.describe(),
                dependents = siblings.visited.len(),
                approved,
                "planner:ascent step"
            );
            if !approved {
                break;
            }

            plan.extend(siblings.visited);
            plan.push(ancestor);
            current = ancestor;
        }

        let summary = Prompt::ConfirmPlan {
            entries: plan.iter().map(|n| n.label().to_string()).collect(),
        };
        if !confirm.confirm(&summary)? {
            info!("planner:aborted by user");
            return Err(Error::UserAborted);
        }

        info!(count = plan.len(), "planner:confirmed");
        Ok(DeletionPlan { nodes: plan })
    }
}
