//! Result finalization: flushing postponed contributions into the per-query
//! accumulators and mapping results back to the caller's point order.

use crate::kdtree::KdTree;
use crate::statistic::{NodeState, Postponed, QueryResult, ResultOf, Summary};
use crate::traversal::TraversalRun;

/// Subtrees with at least this many points are flushed on separate rayon tasks.
const PARALLEL_FINALIZE_THRESHOLD: usize = 4096;

/// Pushes every postponed contribution down to the leaves of `tree`, applies it to
/// each query's accumulators and runs `post_process` on every query.
///
/// Postponed values are zeroed once flushed, so finalizing an already finalized run
/// again leaves every result unchanged as long as `post_process` only reads the raw
/// accumulators.
pub fn finalize<const D: usize, T, S, F>(tree: &KdTree<D, T>, run: &mut TraversalRun<S>, post_process: F, parallel: bool)
where
    T: Sync,
    S: Summary,
    F: Fn(&mut ResultOf<S>) + Sync,
{
    debug_assert_eq!(run.state.len(), tree.num_nodes());
    debug_assert_eq!(run.results.len(), tree.len());
    flush(tree, tree.root(), &mut run.state, &mut run.results, &post_process, parallel);
}

fn flush<const D: usize, T, S, F>(
    tree: &KdTree<D, T>,
    index: usize,
    state: &mut [NodeState<S>],
    results: &mut [ResultOf<S>],
    post_process: &F,
    parallel: bool,
) where
    T: Sync,
    S: Summary,
    F: Fn(&mut ResultOf<S>) + Sync,
{
    match tree.children(index) {
        None => {
            let own = &mut state[0];
            for result in results.iter_mut() {
                result.apply_postponed(&own.postponed);
                post_process(result);
            }
            own.postponed.set_zero();
        }
        Some((left, right)) => {
            let (own, rest) = state.split_at_mut(1);
            let (left_state, right_state) = rest.split_at_mut(tree.node(left).subtree_len());
            own[0].push_down(&mut left_state[0], &mut right_state[0]);
            let (left_results, right_results) = results.split_at_mut(tree.node(left).count());

            if parallel && tree.node(index).count() >= PARALLEL_FINALIZE_THRESHOLD {
                rayon::join(
                    || flush(tree, left, left_state, left_results, post_process, parallel),
                    || flush(tree, right, right_state, right_results, post_process, parallel),
                );
            } else {
                flush(tree, left, left_state, left_results, post_process, parallel);
                flush(tree, right, right_state, right_results, post_process, parallel);
            }
        }
    }
}

/// Reorders tree-ordered values into input order: the value at tree position `i`
/// lands at index `old_from_new[i]`.
///
/// `old_from_new` must be a permutation of `0..values.len()`.
pub fn unpermute<T>(values: Vec<T>, old_from_new: &[usize]) -> Vec<T> {
    debug_assert_eq!(values.len(), old_from_new.len());
    let mut slots: Vec<Option<T>> = std::iter::repeat_with(|| None).take(values.len()).collect();
    for (value, &old) in values.into_iter().zip(old_from_new) {
        slots[old] = Some(value);
    }
    slots.into_iter().flatten().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traversal::TraversalStats;

    #[derive(Clone, Debug, Default, PartialEq)]
    struct Count(f64);

    impl Postponed for Count {
        fn apply_postponed(&mut self, other: &Self) {
            self.0 += other.0;
        }
    }

    #[derive(Clone, Debug, Default)]
    struct Tally {
        raw: f64,
        reported: f64,
    }

    impl QueryResult for Tally {
        type Postponed = Count;

        fn apply_postponed(&mut self, postponed: &Count) {
            self.raw += postponed.0;
        }
    }

    #[derive(Clone, Debug, Default)]
    struct MaxTally(f64);

    impl Summary for MaxTally {
        type Result = Tally;

        fn start_reaccumulate(&mut self) {
            self.0 = f64::NEG_INFINITY;
        }

        fn accumulate(&mut self, other: &Self) {
            self.0 = self.0.max(other.0);
        }

        fn accumulate_result(&mut self, result: &Tally) {
            self.0 = self.0.max(result.raw);
        }

        fn apply_postponed(&mut self, postponed: &Count) {
            self.0 += postponed.0;
        }
    }

    #[test]
    fn test_unpermute() {
        let values = vec!['c', 'a', 'b'];
        assert_eq!(unpermute(values, &[2, 0, 1]), vec!['a', 'b', 'c']);
    }

    #[test]
    fn test_unpermute_moves_non_clone_values() {
        let values: Vec<Box<usize>> = (0..6).map(Box::new).collect();
        let old_from_new = [3, 5, 0, 4, 1, 2];
        let restored = unpermute(values, &old_from_new);
        for (new, &old) in old_from_new.iter().enumerate() {
            assert_eq!(*restored[old], new);
        }
        assert!(unpermute(Vec::<Box<usize>>::new(), &[]).is_empty());
    }

    #[test]
    fn test_finalize_flushes_every_level_once() {
        let tree = KdTree::build((0..8).map(|i| [i as f64]).collect(), 2).unwrap();
        let mut run = TraversalRun::<MaxTally> {
            state: vec![NodeState::default(); tree.num_nodes()],
            results: vec![Tally::default(); tree.len()],
            stats: TraversalStats::default(),
        };
        run.state[0].postpone(&Count(1.0));
        let (left, _) = tree.children(0).unwrap();
        run.state[left].postpone(&Count(10.0));

        let post = |r: &mut Tally| r.reported = 2.0 * r.raw;
        finalize(&tree, &mut run, post, false);
        let first: Vec<f64> = run.results.iter().map(|r| r.reported).collect();
        let left_count = tree.node(left).count();
        for (i, v) in first.iter().enumerate() {
            let expected = if i < left_count { 22.0 } else { 2.0 };
            assert_eq!(*v, expected);
        }
        assert!(run.state.iter().all(|s| s.postponed == Count(0.0)));

        finalize(&tree, &mut run, post, true);
        let second: Vec<f64> = run.results.iter().map(|r| r.reported).collect();
        assert_eq!(first, second);
    }
}
