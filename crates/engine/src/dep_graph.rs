//! Dependency graph for formula cells.
//!
//! Tracks precedents (cells a formula reads) and dependents (cells that
//! read a given cell) so cache invalidation and cycle rejection stay
//! O(edges touched).
//!
//! # Edge Direction
//!
//! ```text
//! A → B  means  "B reads A"  (A is a precedent of B)
//! ```
//!
//! # Invariants
//!
//! 1. **Bidirectional consistency:** if A ∈ preds[B] then B ∈ succs[A],
//!    and vice versa.
//! 2. **No dangling entries:** empty sets are removed, not stored.
//! 3. **No duplicate edges:** set semantics enforced by `FxHashSet`.
//! 4. **Atomic updates:** `replace_edges` is the only mutator that touches
//!    both maps.

use rustc_hash::{FxHashMap, FxHashSet};

use crate::position::Position;

#[derive(Default, Debug, Clone)]
pub struct DepGraph {
    /// Precedents: for each formula cell B, the cells A it reads.
    preds: FxHashMap<Position, FxHashSet<Position>>,

    /// Dependents: for each referenced cell A, the formula cells B that
    /// read it.
    succs: FxHashMap<Position, FxHashSet<Position>>,
}

impl DepGraph {
    /// Create an empty dependency graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// The cells this cell reads (incoming edges).
    pub fn precedents(&self, cell: Position) -> impl Iterator<Item = Position> + '_ {
        self.preds
            .get(&cell)
            .into_iter()
            .flat_map(|s| s.iter().copied())
    }

    /// The cells that read this cell (outgoing edges).
    pub fn dependents(&self, cell: Position) -> impl Iterator<Item = Position> + '_ {
        self.succs
            .get(&cell)
            .into_iter()
            .flat_map(|s| s.iter().copied())
    }

    /// True if at least one formula cell reads this cell.
    ///
    /// Cleared cells with dependents must be retained as Empty so dangling
    /// formulas keep a stable node to link against.
    pub fn is_referenced(&self, cell: Position) -> bool {
        self.succs.contains_key(&cell)
    }

    /// Replace all precedent edges for a formula cell atomically.
    ///
    /// 1. Removes the cell from all its old precedents' dependent sets
    /// 2. Clears the cell's precedent set
    /// 3. Adds the cell to all new precedents' dependent sets
    /// 4. Stores the cell's new precedent set
    ///
    /// Pass an empty set to clear all edges for this cell.
    pub fn replace_edges(&mut self, cell: Position, new_preds: FxHashSet<Position>) {
        if let Some(old_preds) = self.preds.remove(&cell) {
            for pred in old_preds {
                if let Some(deps) = self.succs.get_mut(&pred) {
                    deps.remove(&cell);
                    // No dangling entries (invariant 2)
                    if deps.is_empty() {
                        self.succs.remove(&pred);
                    }
                }
            }
        }

        if new_preds.is_empty() {
            return;
        }

        for pred in &new_preds {
            self.succs.entry(*pred).or_default().insert(cell);
        }

        self.preds.insert(cell, new_preds);
    }

    /// Clear all edges for a cell (content no longer references anything).
    pub fn clear_cell(&mut self, cell: Position) {
        self.replace_edges(cell, FxHashSet::default());
    }

    /// Check whether installing `refs` as the out-edges of `target` would
    /// close a cycle.
    ///
    /// Does not modify the graph. Walks the *committed* precedent edges
    /// depth-first from each proposed reference; reaching `target` means
    /// the proposed edge would complete a loop. O(V + E) with an explicit
    /// stack and a visited set.
    pub fn would_create_cycle(&self, target: Position, refs: &[Position]) -> bool {
        if refs.contains(&target) {
            return true;
        }

        let mut visited = FxHashSet::default();
        let mut stack: Vec<Position> = refs.to_vec();

        while let Some(current) = stack.pop() {
            if current == target {
                return true;
            }
            if !visited.insert(current) {
                continue;
            }
            if let Some(preds) = self.preds.get(&current) {
                stack.extend(preds.iter().copied());
            }
        }

        false
    }

    /// Check all invariants. Panics if any are violated.
    ///
    /// Only available in test builds.
    #[cfg(test)]
    pub fn assert_consistent(&self) {
        for (cell, preds) in &self.preds {
            for pred in preds {
                assert!(
                    self.succs.get(pred).is_some_and(|s| s.contains(cell)),
                    "missing succ edge: {} should have {} in dependents",
                    pred,
                    cell
                );
            }
        }

        for (cell, dependents) in &self.succs {
            for dep in dependents {
                assert!(
                    self.preds.get(dep).is_some_and(|s| s.contains(cell)),
                    "missing pred edge: {} should have {} in precedents",
                    dep,
                    cell
                );
            }
        }

        for (cell, preds) in &self.preds {
            assert!(!preds.is_empty(), "empty preds set stored for {}", cell);
        }
        for (cell, succs) in &self.succs {
            assert!(!succs.is_empty(), "empty succs set stored for {}", cell);
        }
    }
}
