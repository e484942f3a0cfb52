//! Algebra of the per-node and per-query state used by the traversals.
//!
//! Each algorithm supplies one implementation of these traits:
//!
//! - [`Postponed`]: contributions decided at a node but not yet pushed to the
//!   queries below it.
//! - [`QueryResult`]: the raw accumulators of one query point.
//! - [`Summary`]: a conservative aggregate over every query of a subtree, used
//!   to decide whether a node tuple can be approximated.
//!
//! Deltas are algorithm-specific and are applied by turning them into a
//! [`Postponed`] value (see the problem traits in [`crate::traversal`]).

use std::fmt::Debug;

/// Deferred contribution stored at a tree node.
///
/// `Default` must be the zero contribution.
pub trait Postponed: Clone + Default + Debug + Send + Sync {
    fn set_zero(&mut self) {
        *self = Self::default();
    }

    /// Adds `other` to `self`.
    fn apply_postponed(&mut self, other: &Self);
}

/// Raw per-query accumulators.
pub trait QueryResult: Clone + Default + Debug + Send + Sync {
    type Postponed: Postponed;

    fn apply_postponed(&mut self, postponed: &Self::Postponed);
}

/// Conservative aggregate over the queries of a subtree.
///
/// `Default` describes a subtree no contribution has reached yet.
pub trait Summary: Clone + Default + Debug + Send + Sync {
    type Result: QueryResult;

    /// Resets to the identity of [`accumulate`](Self::accumulate) and
    /// [`accumulate_result`](Self::accumulate_result).
    fn start_reaccumulate(&mut self);

    /// Widens `self` to also cover `other`.
    fn accumulate(&mut self, other: &Self);

    /// Widens `self` to also cover one query's raw accumulators.
    fn accumulate_result(&mut self, result: &Self::Result);

    /// Adds a contribution that reaches every query of the subtree.
    fn apply_postponed(&mut self, postponed: &<Self::Result as QueryResult>::Postponed);
}

/// Raw accumulators of the queries summarized by `S`.
pub type ResultOf<S> = <S as Summary>::Result;

/// Deferred contribution type matching `S`.
pub type PostponedOf<S> = <ResultOf<S> as QueryResult>::Postponed;

/// Per-node traversal state: a node's pending contributions and its summary.
#[derive(Clone, Debug, Default)]
pub struct NodeState<S: Summary> {
    pub postponed: PostponedOf<S>,
    pub summary: S,
}

impl<S: Summary> NodeState<S> {
    /// Records a contribution for every query below this node.
    pub fn postpone(&mut self, contribution: &PostponedOf<S>) {
        self.postponed.apply_postponed(contribution);
        self.summary.apply_postponed(contribution);
    }

    /// Moves this node's pending contributions into its two children.
    pub fn push_down(&mut self, left: &mut Self, right: &mut Self) {
        left.postpone(&self.postponed);
        right.postpone(&self.postponed);
        self.postponed.set_zero();
    }

    /// Rebuilds the summary from the children, then adds what is still pending here.
    pub fn refresh_from_children(&mut self, left: &S, right: &S) {
        self.summary.start_reaccumulate();
        self.summary.accumulate(left);
        self.summary.accumulate(right);
        self.summary.apply_postponed(&self.postponed);
    }

    /// Rebuilds the summary of a leaf from its queries' accumulators.
    pub fn refresh_from_results(&mut self, results: &[S::Result]) {
        self.summary.start_reaccumulate();
        for r in results {
            self.summary.accumulate_result(r);
        }
        self.summary.apply_postponed(&self.postponed);
    }
}
