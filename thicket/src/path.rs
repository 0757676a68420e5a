//! Rendered reasoning paths: the text the oracle sees for one node.

use std::sync::Arc;

/// Problem statement plus the prompt text for a node: root framing followed by
/// each step as `step_prefix + step + "\n"`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReasoningPath {
    problem: Arc<str>,
    text: String,
    depth: usize,
}

impl ReasoningPath {
    /// Path of the root node: just the framing.
    pub fn root(problem: Arc<str>, framing: &str) -> Self {
        Self {
            problem,
            text: framing.to_string(),
            depth: 0,
        }
    }

    /// Renders `steps` (root excluded, top-down) under the root framing.
    pub fn from_steps<I, S>(problem: Arc<str>, framing: &str, steps: I, step_prefix: &str) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        steps
            .into_iter()
            .fold(Self::root(problem, framing), |path, step| {
                path.extend(step.as_ref(), step_prefix)
            })
    }

    /// This path with one more step appended.
    pub fn extend(&self, step: &str, step_prefix: &str) -> Self {
        let mut text = String::with_capacity(self.text.len() + step_prefix.len() + step.len() + 1);
        text.push_str(&self.text);
        text.push_str(step_prefix);
        text.push_str(step);
        text.push('\n');
        Self {
            problem: Arc::clone(&self.problem),
            text,
            depth: self.depth + 1,
        }
    }

    pub fn problem(&self) -> &str {
        &self.problem
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Number of steps below the root.
    pub fn depth(&self) -> usize {
        self.depth
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_steps_under_framing() {
        let problem: Arc<str> = Arc::from("make 24");
        let path = ReasoningPath::from_steps(
            problem,
            "make 24\nLet's think step by step:\n",
            ["4 * 6 = 24", "done"],
            "- ",
        );
        assert_eq!(
            path.text(),
            "make 24\nLet's think step by step:\n- 4 * 6 = 24\n- done\n"
        );
        assert_eq!(path.depth(), 2);
        assert_eq!(path.problem(), "make 24");
    }

    #[test]
    fn extend_leaves_original_untouched() {
        let root = ReasoningPath::root(Arc::from("p"), "p\n");
        let child = root.extend("a", "  - ");
        assert_eq!(root.text(), "p\n");
        assert_eq!(child.text(), "p\n  - a\n");
    }
}
