//! Leaf selector: the viable-leaf index with per-iteration score decay.
//!
//! Holds exactly the leaves eligible for expansion. Selected leaves leave the index
//! (their children take over leafhood); dead candidates never enter it.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use crate::tree::NodeId;

/// Default per-iteration decay factor.
pub const DEFAULT_DECAY: f64 = 0.99;

/// Default score given to the root when the index has to be reseeded.
pub const DEFAULT_RESEED_SCORE: f64 = 1e-3;

/// Viable-leaf index: node id to current (decayed) viability score.
#[derive(Debug, Clone)]
pub struct LeafFrontier {
    scores: BTreeMap<NodeId, f64>,
    decay: f64,
    reseed_score: f64,
}

impl Default for LeafFrontier {
    fn default() -> Self {
        Self::new(DEFAULT_DECAY, DEFAULT_RESEED_SCORE)
    }
}

impl LeafFrontier {
    /// `decay` must lie in (0, 1] and `reseed_score` must be positive; [`crate::SearchConfig::validate`]
    /// enforces both for config-built searches.
    pub fn new(decay: f64, reseed_score: f64) -> Self {
        Self {
            scores: BTreeMap::new(),
            decay,
            reseed_score,
        }
    }

    pub fn decay_factor(&self) -> f64 {
        self.decay
    }

    /// Multiplies every score in the index by the decay factor.
    pub fn decay(&mut self) {
        if self.decay == 1.0 {
            return;
        }
        for score in self.scores.values_mut() {
            *score *= self.decay;
        }
    }

    /// Puts `{root: ε}` into an empty index so the search can always resume from the root.
    /// Returns whether a reseed happened.
    pub fn reseed_if_empty(&mut self, root: NodeId) -> bool {
        if !self.scores.is_empty() {
            return false;
        }
        self.scores.insert(root, self.reseed_score);
        true
    }

    /// Removes and returns the `k` best entries: highest score first, ties broken by the
    /// higher (more recent) id.
    pub fn select_top_n(&mut self, k: usize) -> Vec<(NodeId, f64)> {
        let mut ranked: Vec<(NodeId, f64)> = self.scores.iter().map(|(id, s)| (*id, *s)).collect();
        ranked.sort_by(|a, b| rank(b, a));
        ranked.truncate(k);
        for (id, _) in &ranked {
            self.scores.remove(id);
        }
        ranked
    }

    pub fn insert(&mut self, id: NodeId, score: f64) {
        self.scores.insert(id, score);
    }

    pub fn remove(&mut self, id: NodeId) -> Option<f64> {
        self.scores.remove(&id)
    }

    /// Puts previously selected entries back, e.g. after an aborted iteration.
    pub fn restore(&mut self, entries: impl IntoIterator<Item = (NodeId, f64)>) {
        self.scores.extend(entries);
    }

    pub fn score(&self, id: NodeId) -> Option<f64> {
        self.scores.get(&id).copied()
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.scores.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    /// Snapshot of the index in id order.
    pub fn entries(&self) -> Vec<(NodeId, f64)> {
        self.scores.iter().map(|(id, s)| (*id, *s)).collect()
    }
}

fn rank(a: &(NodeId, f64), b: &(NodeId, f64)) -> Ordering {
    a.1.total_cmp(&b.1).then(a.0.cmp(&b.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decay_strictly_decreases_positive_scores() {
        let mut f = LeafFrontier::new(0.9, 1e-3);
        f.insert(NodeId(1), 5.0);
        f.insert(NodeId(2), 0.5);
        let mut prev = f.entries();
        for _ in 0..10 {
            f.decay();
            let now = f.entries();
            for ((_, before), (_, after)) in prev.iter().zip(now.iter()) {
                assert!(after < before);
            }
            prev = now;
        }
    }

    #[test]
    fn decay_of_one_leaves_scores_unchanged() {
        let mut f = LeafFrontier::new(1.0, 1e-3);
        f.insert(NodeId(1), 5.0);
        f.insert(NodeId(2), 3.0);
        for _ in 0..5 {
            f.decay();
        }
        assert_eq!(f.entries(), vec![(NodeId(1), 5.0), (NodeId(2), 3.0)]);
    }

    #[test]
    fn empty_index_reseeds_root() {
        let mut f = LeafFrontier::new(0.99, 0.01);
        assert!(f.reseed_if_empty(NodeId(0)));
        assert!(!f.reseed_if_empty(NodeId(0)));
        let picked = f.select_top_n(3);
        assert_eq!(picked, vec![(NodeId(0), 0.01)]);
        assert!(f.is_empty());
    }

    #[test]
    fn select_prefers_score_then_newer_id() {
        let mut f = LeafFrontier::default();
        f.insert(NodeId(3), 2.0);
        f.insert(NodeId(5), 4.0);
        f.insert(NodeId(7), 2.0);
        f.insert(NodeId(9), 1.0);
        let picked = f.select_top_n(3);
        let ids: Vec<NodeId> = picked.iter().map(|(id, _)| *id).collect();
        assert_eq!(ids, vec![NodeId(5), NodeId(7), NodeId(3)]);
        assert_eq!(f.entries(), vec![(NodeId(9), 1.0)]);
    }

    #[test]
    fn select_returns_at_most_k() {
        let mut f = LeafFrontier::default();
        for i in 1..=10 {
            f.insert(NodeId(i), i as f64);
        }
        assert_eq!(f.select_top_n(4).len(), 4);
        assert_eq!(f.len(), 6);
        assert_eq!(f.select_top_n(0).len(), 0);
        assert_eq!(f.select_top_n(100).len(), 6);
    }

    #[test]
    fn restore_puts_entries_back() {
        let mut f = LeafFrontier::default();
        f.insert(NodeId(1), 3.0);
        let picked = f.select_top_n(1);
        assert!(f.is_empty());
        f.restore(picked);
        assert_eq!(f.score(NodeId(1)), Some(3.0));
    }
}
