use crate::accumulator;
use crate::kdtree::{KdNode, KdTree};
use crate::statistic::{NodeState, PostponedOf, ResultOf, Summary};
use crate::traversal::{TraversalRun, TraversalStats};
use tracing::{debug, debug_span};

/// Query subtrees with at least this many points fork their two halves onto rayon.
const PARALLEL_TRAVERSAL_THRESHOLD: usize = 512;

/// A pairwise aggregation between a query tree and a reference tree.
pub trait DualTreeProblem<const D: usize>: Sync {
    type Summary: Summary;
    type Delta;

    /// Bounds the contribution of every reference point under `reference` to every
    /// query point under `query`, from the node bounds alone.
    fn compute_delta(&self, query: &KdNode<D>, reference: &KdNode<D>) -> Self::Delta;

    /// Whether `delta` may stand in for the exact interaction without pushing any
    /// query below `query` past its error budget. `summary` covers every such query.
    fn can_summarize(
        &self,
        delta: &Self::Delta,
        summary: &Self::Summary,
        query: &KdNode<D>,
        reference: &KdNode<D>,
    ) -> bool;

    /// Adds the contribution `delta` represents for each query point to `postponed`.
    fn apply_delta(&self, delta: &Self::Delta, postponed: &mut PostponedOf<Self::Summary>);

    /// Exact contribution of `references` to one query point.
    fn base_case(&self, query: &[f64; D], references: &[[f64; D]], result: &mut ResultOf<Self::Summary>);

    /// Turns raw accumulators into the reported values. Must be idempotent.
    fn post_process(&self, result: &mut ResultOf<Self::Summary>);
}

/// Depth-first dual-tree traversal driver.
pub struct DualTreeTraversal<'p, P> {
    problem: &'p P,
    parallel: bool,
}

impl<'p, P> DualTreeTraversal<'p, P> {
    pub fn new(problem: &'p P) -> Self {
        Self {
            problem,
            parallel: true,
        }
    }

    /// Traverse independent query subtrees concurrently.
    pub fn parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }
}

impl<'p, P> DualTreeTraversal<'p, P> {
    /// Runs the traversal and finalizes the results, returned in the query tree's input order.
    pub fn run<const D: usize, QS: Sync, RS: Sync>(
        &self,
        query: &KdTree<D, QS>,
        reference: &KdTree<D, RS>,
    ) -> (Vec<ResultOf<P::Summary>>, TraversalStats)
    where
        P: DualTreeProblem<D>,
    {
        let mut run = self.traverse(query, reference);
        accumulator::finalize(query, &mut run, |r| self.problem.post_process(r), self.parallel);
        let stats = run.stats;
        (query.to_original_order(run.results), stats)
    }

    /// Runs the traversal without finalizing. Results stay in tree order.
    pub fn traverse<const D: usize, QS: Sync, RS: Sync>(
        &self,
        query: &KdTree<D, QS>,
        reference: &KdTree<D, RS>,
    ) -> TraversalRun<P::Summary>
    where
        P: DualTreeProblem<D>,
    {
        let _span = debug_span!("dual_tree", queries = query.len(), references = reference.len()).entered();

        let mut state = vec![NodeState::<P::Summary>::default(); query.num_nodes()];
        let mut results = vec![ResultOf::<P::Summary>::default(); query.len()];
        let stats = self.recurse(query, reference, query.root(), reference.root(), &mut state, &mut results);

        debug!(visited = stats.visited, prunes = stats.prunes, base_cases = stats.base_cases, "dual-tree traversal done");
        TraversalRun { state, results, stats }
    }

    /// `state` holds the query subtree rooted at `qi` in pre-order and `results` its points.
    fn recurse<const D: usize, QS: Sync, RS: Sync>(
        &self,
        query: &KdTree<D, QS>,
        reference: &KdTree<D, RS>,
        qi: usize,
        ri: usize,
        state: &mut [NodeState<P::Summary>],
        results: &mut [ResultOf<P::Summary>],
    ) -> TraversalStats
    where
        P: DualTreeProblem<D>,
    {
        let q = query.node(qi);
        let r = reference.node(ri);
        let mut stats = TraversalStats {
            visited: 1,
            ..Default::default()
        };

        let delta = self.problem.compute_delta(q, r);
        if self.problem.can_summarize(&delta, &state[0].summary, q, r) {
            let mut contribution = PostponedOf::<P::Summary>::default();
            self.problem.apply_delta(&delta, &mut contribution);
            state[0].postpone(&contribution);
            stats.prunes += 1;
            return stats;
        }

        match (query.children(qi), reference.children(ri)) {
            (None, None) => {
                let references = reference.node_points(ri);
                for (point, result) in query.node_points(qi).iter().zip(results.iter_mut()) {
                    self.problem.base_case(point, references, result);
                }
                state[0].refresh_from_results(results);
                stats.base_cases += 1;
            }
            (None, Some((rl, rr))) => {
                stats += self.recurse(query, reference, qi, rl, state, results);
                stats += self.recurse(query, reference, qi, rr, state, results);
            }
            (Some((ql, qr)), reference_children) => {
                let (own, rest) = state.split_at_mut(1);
                let (left_state, right_state) = rest.split_at_mut(query.node(ql).subtree_len());
                own[0].push_down(&mut left_state[0], &mut right_state[0]);
                let (left_results, right_results) = results.split_at_mut(query.node(ql).count());

                let visit = |qc: usize, state: &mut [NodeState<P::Summary>], results: &mut [ResultOf<P::Summary>]| {
                    match reference_children {
                        Some((rl, rr)) => {
                            self.recurse(query, reference, qc, rl, state, results)
                                + self.recurse(query, reference, qc, rr, state, results)
                        }
                        None => self.recurse(query, reference, qc, ri, state, results),
                    }
                };

                let (left, right) = if self.parallel && q.count() >= PARALLEL_TRAVERSAL_THRESHOLD {
                    rayon::join(
                        || visit(ql, &mut *left_state, &mut *left_results),
                        || visit(qr, &mut *right_state, &mut *right_results),
                    )
                } else {
                    (
                        visit(ql, &mut *left_state, &mut *left_results),
                        visit(qr, &mut *right_state, &mut *right_results),
                    )
                };
                stats += left + right;

                own[0].refresh_from_children(&left_state[0].summary, &right_state[0].summary);
            }
        }
        stats
    }
}
