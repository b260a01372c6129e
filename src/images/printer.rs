use super::forest::{ImageForest, ImageNode};

const BRANCH: &str = "├── ";
const LAST_BRANCH: &str = "└── ";
const PIPE: &str = "│   ";
const SPACE: &str = "    ";

/// Draws each root's subtree with box-drawing branches.
pub struct ForestPrinter<'a> {
    forest: &'a ImageForest,
}

impl<'a> ForestPrinter<'a> {
    pub fn new(forest: &'a ImageForest) -> Self {
        Self { forest }
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        for root in self.forest.roots() {
            self.render_node(&mut out, root, "", "");
        }
        out
    }

    fn render_node(&self, out: &mut String, node: &ImageNode, prefix: &str, children_prefix: &str) {
        out.push_str(prefix);
        out.push_str(node.label());
        out.push('\n');

        let count = node.children.len();
        for (i, child) in self.forest.children_of(node).enumerate() {
            if i + 1 < count {
                self.render_node(
                    out,
                    child,
                    &format!("{children_prefix}{BRANCH}"),
                    &format!("{children_prefix}{PIPE}"),
                );
            } else {
                self.render_node(
                    out,
                    child,
                    &format!("{children_prefix}{LAST_BRANCH}"),
                    &format!("{children_prefix}{SPACE}"),
                );
            }
        }
    }
}
