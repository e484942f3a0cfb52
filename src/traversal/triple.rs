use crate::accumulator;
use crate::kdtree::{KdNode, KdTree};
use crate::statistic::{NodeState, PostponedOf, QueryResult, ResultOf, Summary};
use crate::traversal::{TraversalRun, TraversalStats};
use tracing::{debug, debug_span};

/// A three-point aggregation over a single tree.
///
/// Every unordered triple of distinct points is visited exactly once, and its
/// contribution reaches all three of its points.
pub trait TripleTreeProblem<const D: usize>: Sync {
    type Summary: Summary;
    type Delta;

    /// Bounds the contribution of every point triple drawn from `triple` to each of
    /// its points, from the node bounds alone.
    fn compute_delta(&self, triple: &NodeTriple<'_, D>) -> Self::Delta;

    /// `summaries[slot]` covers every point of the node in that slot, including
    /// contributions still pending at its ancestors.
    fn can_summarize(&self, delta: &Self::Delta, summaries: &[Self::Summary; 3], triple: &NodeTriple<'_, D>) -> bool;

    /// Adds the per-point contribution of `delta` to the node in `slot`. Called once
    /// per distinct node, for the first slot it occupies.
    fn apply_delta(&self, delta: &Self::Delta, slot: usize, postponed: &mut PostponedOf<Self::Summary>);

    /// Exact contributions of one point triple to each of its three points.
    fn base_case(&self, points: [&[f64; D]; 3]) -> [PostponedOf<Self::Summary>; 3];

    /// Turns raw accumulators into the reported values. Must be idempotent.
    fn post_process(&self, result: &mut ResultOf<Self::Summary>);
}

/// How a slot of a node triple takes part in one redistribution step.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SlotState {
    /// Holds the node being split; replaced by one of its children.
    Split,
    /// Holds a leaf, which can never be split.
    Leaf,
    /// Holds an internal node that waits for a later step.
    Kept,
}

/// Three tree nodes, ordered by the position of their point ranges.
///
/// Any two slots hold either the same node or nodes with disjoint point ranges, so
/// slots holding the same node are adjacent.
#[derive(Clone, Copy, Debug)]
pub struct NodeTriple<'a, const D: usize> {
    pub ids: [usize; 3],
    pub nodes: [&'a KdNode<D>; 3],
}

impl<'a, const D: usize> NodeTriple<'a, D> {
    pub fn new<S>(tree: &'a KdTree<D, S>, ids: [usize; 3]) -> Self {
        Self {
            ids,
            nodes: ids.map(|i| tree.node(i)),
        }
    }

    /// Whether `slot` is the first slot holding its node.
    pub fn is_first(&self, slot: usize) -> bool {
        (0..slot).all(|s| self.ids[s] != self.ids[slot])
    }

    /// Number of slots holding the same node as `slot`.
    pub fn multiplicity(&self, slot: usize) -> usize {
        self.ids.iter().filter(|&&id| id == self.ids[slot]).count()
    }

    /// First slot of each distinct node.
    pub fn distinct_slots(&self) -> impl Iterator<Item = usize> + '_ {
        (0..3).filter(|&s| self.is_first(s))
    }

    /// Number of point triples `(i < j < k)` with `i`, `j`, `k` in slots 0, 1, 2.
    pub fn num_tuples(&self) -> f64 {
        let [a, b, c] = self.nodes.map(|n| n.count() as f64);
        match (self.ids[0] == self.ids[1], self.ids[1] == self.ids[2]) {
            (true, true) => a * (a - 1.0) * (a - 2.0) / 6.0,
            (true, false) => a * (a - 1.0) / 2.0 * c,
            (false, true) => a * b * (b - 1.0) / 2.0,
            (false, false) => a * b * c,
        }
    }

    /// Number of triples each single point of the node in `slot` belongs to.
    pub fn tuples_per_point(&self, slot: usize) -> f64 {
        let [a, b, c] = self.nodes.map(|n| n.count() as f64);
        match (self.ids[0] == self.ids[1], self.ids[1] == self.ids[2]) {
            (true, true) => (a - 1.0) * (a - 2.0) / 2.0,
            (true, false) => {
                if slot < 2 { (a - 1.0) * c } else { a * (a - 1.0) / 2.0 }
            }
            (false, true) => {
                if slot == 0 { b * (b - 1.0) / 2.0 } else { a * (b - 1.0) }
            }
            (false, false) => match slot {
                0 => b * c,
                1 => a * c,
                _ => a * b,
            },
        }
    }

    /// Classifies every slot for a step that splits `split_id`.
    pub fn slot_states(&self, split_id: usize) -> [SlotState; 3] {
        std::array::from_fn(|s| {
            if self.ids[s] == split_id {
                SlotState::Split
            } else if self.nodes[s].is_leaf() {
                SlotState::Leaf
            } else {
                SlotState::Kept
            }
        })
    }
}

/// Replaces every `Split` slot by a child, enumerating each child multiset once.
///
/// With `m` split slots the replacements are `m - k` left children followed by `k`
/// right children for `k = 0..=m`, which keeps the slots in point order.
pub fn redistribute(ids: [usize; 3], states: [SlotState; 3], left: usize, right: usize) -> Vec<[usize; 3]> {
    let m = states.iter().filter(|&&s| s == SlotState::Split).count();
    (0..=m)
        .map(|k| {
            let mut out = ids;
            let mut seen = 0;
            for s in 0..3 {
                if states[s] == SlotState::Split {
                    out[s] = if seen < m - k { left } else { right };
                    seen += 1;
                }
            }
            out
        })
        .collect()
}

/// Depth-first triple-tree traversal driver. Runs on the calling thread.
pub struct TripleTreeTraversal<'p, P> {
    problem: &'p P,
}

impl<'p, P> TripleTreeTraversal<'p, P> {
    pub fn new(problem: &'p P) -> Self {
        Self { problem }
    }

    /// Runs the traversal and finalizes the results, returned in input order.
    pub fn run<const D: usize, S: Sync>(&self, tree: &KdTree<D, S>) -> (Vec<ResultOf<P::Summary>>, TraversalStats)
    where
        P: TripleTreeProblem<D>,
    {
        let mut run = self.traverse(tree);
        accumulator::finalize(tree, &mut run, |r| self.problem.post_process(r), false);
        let stats = run.stats;
        (tree.to_original_order(run.results), stats)
    }

    /// Runs the traversal without finalizing. Results stay in tree order.
    pub fn traverse<const D: usize, S: Sync>(&self, tree: &KdTree<D, S>) -> TraversalRun<P::Summary>
    where
        P: TripleTreeProblem<D>,
    {
        let _span = debug_span!("triple_tree", points = tree.len()).entered();

        let mut state = vec![NodeState::<P::Summary>::default(); tree.num_nodes()];
        let mut results = vec![ResultOf::<P::Summary>::default(); tree.len()];
        let root = tree.root();
        let stats = self.recurse(tree, [root; 3], &mut state, &mut results);

        debug!(visited = stats.visited, prunes = stats.prunes, base_cases = stats.base_cases, "triple-tree traversal done");
        TraversalRun { state, results, stats }
    }

    fn recurse<const D: usize, S: Sync>(
        &self,
        tree: &KdTree<D, S>,
        ids: [usize; 3],
        state: &mut [NodeState<P::Summary>],
        results: &mut [ResultOf<P::Summary>],
    ) -> TraversalStats
    where
        P: TripleTreeProblem<D>,
    {
        let triple = NodeTriple::new(tree, ids);
        let mut stats = TraversalStats::default();
        if triple.num_tuples() == 0.0 {
            return stats;
        }
        stats.visited = 1;

        let delta = self.problem.compute_delta(&triple);
        let summaries = ids.map(|id| effective_summary(tree, state, id));
        if self.problem.can_summarize(&delta, &summaries, &triple) {
            for slot in triple.distinct_slots() {
                let mut contribution = PostponedOf::<P::Summary>::default();
                self.problem.apply_delta(&delta, slot, &mut contribution);
                state[ids[slot]].postpone(&contribution);
                refresh_ancestors(tree, state, ids[slot]);
            }
            stats.prunes += 1;
            return stats;
        }

        // Split the largest internal node; leaves everywhere means the exact base case.
        let split = triple
            .distinct_slots()
            .filter(|&s| !triple.nodes[s].is_leaf())
            .max_by(|&a, &b| {
                triple.nodes[a]
                    .count()
                    .cmp(&triple.nodes[b].count())
                    .then(b.cmp(&a))
            });

        match split {
            None => {
                self.base_case(&triple, tree.points(), results);
                for slot in triple.distinct_slots() {
                    let node = triple.nodes[slot];
                    let id = ids[slot];
                    state[id].refresh_from_results(&results[node.begin()..node.end()]);
                    refresh_ancestors(tree, state, id);
                }
                stats.base_cases += 1;
            }
            Some(slot) => {
                let split_id = ids[slot];
                let Some((left, right)) = tree.children(split_id) else {
                    return stats;
                };
                push_down(state, split_id, left, right);

                let states = triple.slot_states(split_id);
                for child_ids in redistribute(ids, states, left, right) {
                    stats += self.recurse(tree, child_ids, state, results);
                }
            }
        }
        stats
    }

    fn base_case<const D: usize>(
        &self,
        triple: &NodeTriple<'_, D>,
        points: &[[f64; D]],
        results: &mut [ResultOf<P::Summary>],
    ) where
        P: TripleTreeProblem<D>,
    {
        let [a, b, c] = triple.nodes;
        for i in a.begin()..a.end() {
            for j in b.begin().max(i + 1)..b.end() {
                for k in c.begin().max(j + 1)..c.end() {
                    let [ci, cj, ck] = self.problem.base_case([&points[i], &points[j], &points[k]]);
                    results[i].apply_postponed(&ci);
                    results[j].apply_postponed(&cj);
                    results[k].apply_postponed(&ck);
                }
            }
        }
    }
}

/// Summary of `id` with every contribution still pending at its ancestors applied.
fn effective_summary<const D: usize, T, S: Summary>(tree: &KdTree<D, T>, state: &[NodeState<S>], id: usize) -> S {
    let mut summary = state[id].summary.clone();
    let mut current = id;
    while let Some(parent) = tree.node(current).parent() {
        summary.apply_postponed(&state[parent].postponed);
        current = parent;
    }
    summary
}

/// Rebuilds the summaries on the path from `id` to the root.
fn refresh_ancestors<const D: usize, T, S: Summary>(tree: &KdTree<D, T>, state: &mut [NodeState<S>], id: usize) {
    let mut current = id;
    while let Some(parent) = tree.node(current).parent() {
        if let Some((left, right)) = tree.children(parent) {
            let (head, tail) = state.split_at_mut(left);
            let (left_state, right_state) = tail.split_at_mut(right - left);
            head[parent].refresh_from_children(&left_state[0].summary, &right_state[0].summary);
        }
        current = parent;
    }
}

fn push_down<S: Summary>(state: &mut [NodeState<S>], id: usize, left: usize, right: usize) {
    let (head, tail) = state.split_at_mut(left);
    let (left_state, right_state) = tail.split_at_mut(right - left);
    head[id].push_down(&mut left_state[0], &mut right_state[0]);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redistribute_counts() {
        let kept = SlotState::Kept;
        let split = SlotState::Split;
        assert_eq!(redistribute([1, 1, 1], [split; 3], 2, 3), vec![[2, 2, 2], [2, 2, 3], [2, 3, 3], [3, 3, 3]]);
        assert_eq!(redistribute([1, 1, 9], [split, split, kept], 2, 3), vec![[2, 2, 9], [2, 3, 9], [3, 3, 9]]);
        assert_eq!(redistribute([0, 4, 4], [kept, split, split], 5, 6), vec![[0, 5, 5], [0, 5, 6], [0, 6, 6]]);
        assert_eq!(redistribute([0, 4, 8], [kept, split, SlotState::Leaf], 5, 6), vec![[0, 5, 8], [0, 6, 8]]);
    }

    #[test]
    fn test_tuple_counts() {
        let tree = KdTree::build((0..12).map(|i| [i as f64]).collect(), 2).unwrap();
        let (l, r) = tree.children(0).unwrap();
        let (nl, nr) = (tree.node(l).count() as f64, tree.node(r).count() as f64);

        let all = NodeTriple::new(&tree, [0, 0, 0]);
        assert_eq!(all.num_tuples(), 220.0);
        assert_eq!(all.tuples_per_point(0), 55.0);
        assert_eq!(all.multiplicity(1), 3);
        assert_eq!(all.distinct_slots().collect::<Vec<_>>(), vec![0]);

        let llr = NodeTriple::new(&tree, [l, l, r]);
        assert_eq!(llr.num_tuples(), nl * (nl - 1.0) / 2.0 * nr);
        assert_eq!(llr.tuples_per_point(0), (nl - 1.0) * nr);
        assert_eq!(llr.tuples_per_point(2), nl * (nl - 1.0) / 2.0);
        assert_eq!(llr.distinct_slots().collect::<Vec<_>>(), vec![0, 2]);

        // Per-point counts times point counts recover three times the tuple count.
        let lrr = NodeTriple::new(&tree, [l, r, r]);
        let total = nl * lrr.tuples_per_point(0) + nr * lrr.tuples_per_point(1);
        assert_eq!(total, 3.0 * lrr.num_tuples());
    }

    #[test]
    fn test_slot_states() {
        let tree = KdTree::build((0..12).map(|i| [i as f64]).collect(), 2).unwrap();
        let (l, r) = tree.children(0).unwrap();
        let leaf = tree.leaves().next().unwrap();
        assert!(tree.is_ancestor(l, leaf));

        let triple = NodeTriple::new(&tree, [leaf, l, r]);
        assert_eq!(
            triple.slot_states(r),
            [SlotState::Leaf, SlotState::Kept, SlotState::Split]
        );
        let triple = NodeTriple::new(&tree, [leaf, r, r]);
        assert_eq!(
            triple.slot_states(r),
            [SlotState::Leaf, SlotState::Split, SlotState::Split]
        );
    }
}
