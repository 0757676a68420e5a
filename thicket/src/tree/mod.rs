//! Node/tree store: an arena of reasoning nodes keyed by monotonically increasing id.
//!
//! Nodes are never physically removed; dead nodes stay in the arena so every path
//! remains reconstructable for diagnostics. A parent id is always smaller than its
//! children's ids, so parent chains cannot cycle.
//!
//! The store has no business logic: scoring, selection and pruning decisions are
//! made by the search loop, which is the only writer.

mod outline;

use serde::Serialize;

use crate::error::TreeError;

/// Stable arena index of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct NodeId(pub usize);

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Lifecycle of a node. `Dead` and `Answer` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeStatus {
    Unscored,
    Viable,
    Dead,
    Answer,
}

impl NodeStatus {
    fn is_terminal(self) -> bool {
        matches!(self, NodeStatus::Dead | NodeStatus::Answer)
    }
}

/// One reasoning step. The root holds the problem framing instead of a thought.
#[derive(Debug, Clone, Serialize)]
pub struct Node {
    pub id: NodeId,
    pub content: String,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    pub status: NodeStatus,
    /// Viability score once evaluated; `None` for the root and unscored nodes.
    pub score: Option<f64>,
}

impl Node {
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}

/// Exclusive owner of all nodes of one search.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ThoughtTree {
    nodes: Vec<Node>,
}

impl ThoughtTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates the tree with its root already in place.
    pub fn with_root(content: impl Into<String>) -> Self {
        let mut tree = Self::new();
        tree.add_root(content);
        tree
    }

    /// Adds the root node. A tree has exactly one root; calling this on a non-empty
    /// tree discards every existing node.
    pub fn add_root(&mut self, content: impl Into<String>) -> NodeId {
        self.nodes.clear();
        let id = NodeId(0);
        self.nodes.push(Node {
            id,
            content: content.into(),
            parent: None,
            children: Vec::new(),
            status: NodeStatus::Unscored,
            score: None,
        });
        id
    }

    /// Appends a child under `parent`. The new id is greater than every existing id.
    pub fn add_child(
        &mut self,
        parent: NodeId,
        content: impl Into<String>,
    ) -> Result<NodeId, TreeError> {
        if parent.0 >= self.nodes.len() {
            return Err(TreeError::UnknownParent(parent));
        }
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            id,
            content: content.into(),
            parent: Some(parent),
            children: Vec::new(),
            status: NodeStatus::Unscored,
            score: None,
        });
        self.nodes[parent.0].children.push(id);
        Ok(id)
    }

    pub fn root(&self) -> Option<&Node> {
        self.nodes.first()
    }

    pub fn root_id(&self) -> NodeId {
        NodeId(0)
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0)
    }

    fn get_mut(&mut self, id: NodeId) -> Result<&mut Node, TreeError> {
        self.nodes.get_mut(id.0).ok_or(TreeError::UnknownNode(id))
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// All nodes in id order.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter()
    }

    /// Contents from the first step below the root down to `id` (root excluded).
    ///
    /// Walks parent pointers leaf-to-root (O(depth)) and reverses.
    pub fn path_to_root(&self, id: NodeId) -> Result<Vec<String>, TreeError> {
        let mut node = self.get(id).ok_or(TreeError::UnknownNode(id))?;
        let mut steps = Vec::new();
        while let Some(parent) = node.parent {
            steps.push(node.content.clone());
            node = self.get(parent).ok_or(TreeError::UnknownNode(parent))?;
        }
        steps.reverse();
        Ok(steps)
    }

    /// Records a score. Leaves a terminal status untouched; otherwise the node becomes `Viable`.
    pub fn set_score(&mut self, id: NodeId, score: f64) -> Result<(), TreeError> {
        let node = self.get_mut(id)?;
        node.score = Some(score);
        if !node.status.is_terminal() {
            node.status = NodeStatus::Viable;
        }
        Ok(())
    }

    /// Marks a node dead. The root and nodes already in a terminal status are left as they are.
    pub fn mark_dead(&mut self, id: NodeId) -> Result<(), TreeError> {
        let node = self.get_mut(id)?;
        if node.parent.is_none() || node.status.is_terminal() {
            return Ok(());
        }
        node.status = NodeStatus::Dead;
        Ok(())
    }

    /// Marks a node as an accepted answer. A dead node stays dead.
    pub fn mark_answer(&mut self, id: NodeId) -> Result<(), TreeError> {
        let node = self.get_mut(id)?;
        if node.status.is_terminal() {
            return Ok(());
        }
        node.status = NodeStatus::Answer;
        Ok(())
    }

    /// Ids of nodes with the given status, ascending.
    pub fn ids_with_status(&self, status: NodeStatus) -> Vec<NodeId> {
        self.nodes
            .iter()
            .filter(|n| n.status == status)
            .map(|n| n.id)
            .collect()
    }
}
