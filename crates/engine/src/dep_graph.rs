//! Dependency graph for formula cells.
//!
//! Stores the set of ordered pairs `(s, t)` meaning "evaluating `t` requires
//! `s` to be evaluated first" — i.e. `t`'s formula references `s`.
//!
//! # Edge Direction
//!
//! ```text
//! s → t  means  "t depends on s"  (s is a dependee of t)
//! ```
//!
//! This makes "what breaks if I change s?" trivial: follow outgoing edges.
//!
//! # Invariants
//!
//! 1. **Bidirectional consistency:** `t ∈ forward[s]` iff `s ∈ reverse[t]`.
//! 2. **Counter consistency:** `pair_count == Σ|forward[s]| == Σ|reverse[t]|`,
//!    including across `replace_*` calls, which recompute it from the delta
//!    of set sizes rather than trusting per-edge bookkeeping.
//! 3. **No dangling entries:** empty sets are removed, not stored; a missing
//!    key reads as an empty set.
//! 4. **No duplicate pairs:** set semantics enforced by `FxHashSet`.

use rustc_hash::{FxHashMap, FxHashSet};

use crate::recalc::CycleError;

/// Dependency graph over cell names, with O(1) amortized lookup in both
/// directions and a total-pair counter.
#[derive(Default, Debug, Clone)]
pub struct DependencyGraph {
    /// Dependents: for each cell `s`, the formula cells `t` that reference it.
    /// s -> {t1, t2, ...}
    forward: FxHashMap<String, FxHashSet<String>>,

    /// Dependees: for each formula cell `t`, the cells `s` it references.
    /// t -> {s1, s2, ...}
    reverse: FxHashMap<String, FxHashSet<String>>,

    /// Total number of pairs in the graph.
    pair_count: usize,
}

impl DependencyGraph {
    /// Create an empty dependency graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of `(s, t)` pairs.
    pub fn num_dependencies(&self) -> usize {
        self.pair_count
    }

    /// The cells whose formulas reference `s` (outgoing edges).
    pub fn dependents<'a>(&'a self, s: &str) -> impl Iterator<Item = &'a str> + 'a {
        self.forward
            .get(s)
            .into_iter()
            .flat_map(|set| set.iter().map(String::as_str))
    }

    /// The cells referenced by `t`'s formula (incoming edges).
    pub fn dependees<'a>(&'a self, t: &str) -> impl Iterator<Item = &'a str> + 'a {
        self.reverse
            .get(t)
            .into_iter()
            .flat_map(|set| set.iter().map(String::as_str))
    }

    pub fn has_dependents(&self, s: &str) -> bool {
        self.forward.contains_key(s)
    }

    pub fn has_dependees(&self, t: &str) -> bool {
        self.reverse.contains_key(t)
    }

    /// Number of cells `t`'s formula references.
    pub fn num_dependees(&self, t: &str) -> usize {
        self.reverse.get(t).map_or(0, FxHashSet::len)
    }

    /// Add the pair `(s, t)` if absent. Idempotent on duplicates.
    pub fn add(&mut self, s: &str, t: &str) {
        let inserted = self
            .forward
            .entry(s.to_string())
            .or_default()
            .insert(t.to_string());
        if inserted {
            self.reverse
                .entry(t.to_string())
                .or_default()
                .insert(s.to_string());
            self.pair_count += 1;
        }
    }

    /// Remove the pair `(s, t)` if present. No-op when absent.
    pub fn remove(&mut self, s: &str, t: &str) {
        let removed = match self.forward.get_mut(s) {
            Some(set) => {
                let removed = set.remove(t);
                if set.is_empty() {
                    self.forward.remove(s);
                }
                removed
            }
            None => false,
        };
        if removed {
            if let Some(set) = self.reverse.get_mut(t) {
                set.remove(s);
                if set.is_empty() {
                    self.reverse.remove(t);
                }
            }
            self.pair_count -= 1;
        }
    }

    /// Replace every pair `(s, *)` with `(s, t)` for each `t` in `new_deps`.
    ///
    /// The counter moves by the delta of set sizes, so it stays exact no
    /// matter how the old and new sets overlap.
    pub fn replace_dependents(&mut self, s: &str, new_deps: FxHashSet<String>) {
        // Step 1: remove old edges
        if let Some(old) = self.forward.remove(s) {
            self.pair_count -= old.len();
            for t in old {
                if let Some(set) = self.reverse.get_mut(&t) {
                    set.remove(s);
                    if set.is_empty() {
                        self.reverse.remove(&t);
                    }
                }
            }
        }

        // Step 2: nothing to add
        if new_deps.is_empty() {
            return;
        }

        // Step 3: add new edges
        self.pair_count += new_deps.len();
        for t in &new_deps {
            self.reverse
                .entry(t.clone())
                .or_default()
                .insert(s.to_string());
        }

        // Step 4: store the new dependent set
        self.forward.insert(s.to_string(), new_deps);
    }

    /// Replace every pair `(*, t)` with `(s, t)` for each `s` in `new_deps`.
    ///
    /// Mirror image of [`replace_dependents`](Self::replace_dependents); this
    /// is the call the workbook makes when a cell's formula changes.
    pub fn replace_dependees(&mut self, t: &str, new_deps: FxHashSet<String>) {
        if let Some(old) = self.reverse.remove(t) {
            self.pair_count -= old.len();
            for s in old {
                if let Some(set) = self.forward.get_mut(&s) {
                    set.remove(t);
                    if set.is_empty() {
                        self.forward.remove(&s);
                    }
                }
            }
        }

        if new_deps.is_empty() {
            return;
        }

        self.pair_count += new_deps.len();
        for s in &new_deps {
            self.forward
                .entry(s.clone())
                .or_default()
                .insert(t.to_string());
        }

        self.reverse.insert(t.to_string(), new_deps);
    }

    // =========================================================================
    // Recomputation order + cycle detection
    // =========================================================================

    /// Compute the recomputation order for a change at `start`: `start`
    /// itself followed by its transitive dependents, each cell after every
    /// dependee of it that the traversal reaches.
    ///
    /// Iterative depth-first search over `dependents` with an explicit frame
    /// stack, so arbitrarily long chains cannot overflow the call stack.
    /// Cells are marked *visiting* on entry and *visited* on exit; meeting a
    /// *visiting* cell again is a cycle and aborts with [`CycleError`]. The
    /// reverse of the finish order is the result. Neighbours are walked in
    /// sorted order, making the order deterministic for a given edge set.
    pub fn recompute_order(&self, start: &str) -> Result<Vec<String>, CycleError> {
        #[derive(Clone, Copy, PartialEq, Eq)]
        enum Mark {
            Visiting,
            Visited,
        }

        struct Frame {
            cell: String,
            neighbours: Vec<String>,
            next: usize,
        }

        let sorted_neighbours = |cell: &str| -> Vec<String> {
            let mut neighbours: Vec<String> = self
                .forward
                .get(cell)
                .into_iter()
                .flat_map(|set| set.iter().cloned())
                .collect();
            neighbours.sort();
            neighbours
        };

        let mut marks: FxHashMap<String, Mark> = FxHashMap::default();
        let mut finish: Vec<String> = Vec::new();

        marks.insert(start.to_string(), Mark::Visiting);
        let mut stack = vec![Frame {
            cell: start.to_string(),
            neighbours: sorted_neighbours(start),
            next: 0,
        }];

        while let Some(frame) = stack.last_mut() {
            if frame.next < frame.neighbours.len() {
                let w = frame.neighbours[frame.next].clone();
                frame.next += 1;

                match marks.get(&w) {
                    Some(Mark::Visiting) => {
                        // The DFS path from w back to here closes a loop.
                        let mut cells: Vec<String> =
                            stack.iter().map(|f| f.cell.clone()).collect();
                        if let Some(pos) = cells.iter().position(|c| *c == w) {
                            cells.drain(..pos);
                        }
                        return Err(if cells.len() == 1 {
                            CycleError::self_reference(&w)
                        } else {
                            CycleError::cycle(cells)
                        });
                    }
                    Some(Mark::Visited) => {}
                    None => {
                        marks.insert(w.clone(), Mark::Visiting);
                        stack.push(Frame {
                            neighbours: sorted_neighbours(&w),
                            cell: w,
                            next: 0,
                        });
                    }
                }
            } else {
                // All neighbours explored
                let finished = stack.pop().unwrap();
                marks.insert(finished.cell.clone(), Mark::Visited);
                finish.push(finished.cell);
            }
        }

        finish.reverse();
        Ok(finish)
    }

    /// Check all invariants. Panics if any are violated.
    ///
    /// Only available in test builds.
    #[cfg(test)]
    pub fn assert_consistent(&self) {
        // Invariant 1: bidirectional consistency (forward → reverse)
        for (s, dependents) in &self.forward {
            for t in dependents {
                assert!(
                    self.reverse.get(t).is_some_and(|set| set.contains(s)),
                    "missing reverse edge: ({s}, {t}) present in forward only"
                );
            }
        }

        // Invariant 1: bidirectional consistency (reverse → forward)
        for (t, dependees) in &self.reverse {
            for s in dependees {
                assert!(
                    self.forward.get(s).is_some_and(|set| set.contains(t)),
                    "missing forward edge: ({s}, {t}) present in reverse only"
                );
            }
        }

        // Invariant 2: counter matches both sums
        let forward_total: usize = self.forward.values().map(FxHashSet::len).sum();
        let reverse_total: usize = self.reverse.values().map(FxHashSet::len).sum();
        assert_eq!(self.pair_count, forward_total, "counter != Σ|forward[s]|");
        assert_eq!(self.pair_count, reverse_total, "counter != Σ|reverse[t]|");

        // Invariant 3: no empty sets stored
        for (s, set) in &self.forward {
            assert!(!set.is_empty(), "empty forward set stored for {s}");
        }
        for (t, set) in &self.reverse {
            assert!(!set.is_empty(), "empty reverse set stored for {t}");
        }
    }
}
