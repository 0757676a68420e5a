//! Plain-text outline of a [`ThoughtTree`] for diagnostics.

use std::fmt::Write;

use super::{Node, NodeStatus, ThoughtTree};

impl ThoughtTree {
    /// Renders the tree depth-first, two spaces of indent per level:
    ///
    /// ```text
    /// #0 Use 4 numbers ... Let's think step by step:
    ///   #1 [viable 5.00] 4 * 6 = 24
    ///   #2 [dead 0.00] 4 + 4 = 9
    /// ```
    pub fn outline(&self) -> String {
        let mut out = String::new();
        if let Some(root) = self.root() {
            self.write_node(&mut out, root, 0);
        }
        out
    }

    fn write_node(&self, out: &mut String, node: &Node, depth: usize) {
        let indent = "  ".repeat(depth);
        let content = node.content.trim_end().replace('\n', " ");
        let _ = match (node.parent, node.score) {
            (None, _) => writeln!(out, "{indent}{} {content}", node.id),
            (Some(_), Some(score)) => writeln!(
                out,
                "{indent}{} [{} {score:.2}] {content}",
                node.id,
                status_label(node.status)
            ),
            (Some(_), None) => writeln!(
                out,
                "{indent}{} [{}] {content}",
                node.id,
                status_label(node.status)
            ),
        };
        for child in &node.children {
            if let Some(child) = self.get(*child) {
                self.write_node(out, child, depth + 1);
            }
        }
    }
}

fn status_label(status: NodeStatus) -> &'static str {
    match status {
        NodeStatus::Unscored => "unscored",
        NodeStatus::Viable => "viable",
        NodeStatus::Dead => "dead",
        NodeStatus::Answer => "answer",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outline_indents_children_and_shows_status() {
        let mut tree = ThoughtTree::with_root("problem\n");
        let a = tree.add_child(tree.root_id(), "first").unwrap();
        tree.set_score(a, 5.0).unwrap();
        let b = tree.add_child(a, "second").unwrap();
        tree.mark_dead(b).unwrap();

        let text = tree.outline();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "#0 problem");
        assert_eq!(lines[1], "  #1 [viable 5.00] first");
        assert_eq!(lines[2], "    #2 [dead] second");
    }

    #[test]
    fn outline_of_empty_tree_is_empty() {
        assert!(ThoughtTree::new().outline().is_empty());
    }
}
