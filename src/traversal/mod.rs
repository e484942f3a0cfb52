//! Recursive multi-tree traversals.
//!
//! A traversal walks tuples of tree nodes. For each tuple it computes a delta
//! bounding the tuple's contribution from the node bounds alone, asks the problem
//! whether that bound is tight enough to stand in for the exact interaction, and
//! either postpones the bounded contribution at the query nodes (prune), evaluates
//! every point tuple (base case), or splits a node and recurses.

use std::ops::{Add, AddAssign};

mod dual;
mod triple;

pub use dual::{DualTreeProblem, DualTreeTraversal};
pub use triple::{NodeTriple, SlotState, TripleTreeProblem, TripleTreeTraversal};

use crate::statistic::{NodeState, Summary};

/// Counters collected during a traversal.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TraversalStats {
    /// Node tuples examined.
    pub visited: usize,
    /// Node tuples approximated by their delta.
    pub prunes: usize,
    /// Leaf tuples evaluated point by point.
    pub base_cases: usize,
}

impl Add for TraversalStats {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self {
            visited: self.visited + rhs.visited,
            prunes: self.prunes + rhs.prunes,
            base_cases: self.base_cases + rhs.base_cases,
        }
    }
}

impl AddAssign for TraversalStats {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

/// Everything a finished traversal leaves behind, in tree order.
///
/// `results` hold raw accumulators until [`crate::accumulator::finalize`] has
/// flushed the postponed contributions in `state` into them.
#[derive(Clone, Debug)]
pub struct TraversalRun<S: Summary> {
    pub state: Vec<NodeState<S>>,
    pub results: Vec<S::Result>,
    pub stats: TraversalStats,
}
