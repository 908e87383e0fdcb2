//! Back-navigation history
//!
//! Linear list of previously visited states, independent of the tree links.
//! Entries can outlive the state they point to; readers skip dead entries.

use std::collections::VecDeque;

use super::state_graph::StateId;

/// Most-recent-first list of visited states
#[derive(Debug, Clone, Default)]
pub struct TraversalHistory {
    entries: VecDeque<StateId>,
}

impl TraversalHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, state: StateId) {
        self.entries.push_front(state);
    }

    pub fn pop(&mut self) -> Option<StateId> {
        self.entries.pop_front()
    }

    pub fn peek(&self) -> Option<StateId> {
        self.entries.front().copied()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries from most to least recent
    pub fn iter(&self) -> impl Iterator<Item = StateId> + '_ {
        self.entries.iter().copied()
    }
}
