//! Three-body potential summation over the triple-tree traversal.
//!
//! Every point receives the Axilrod-Teller potential of each unordered triple it
//! belongs to. Contributions are kept as separate negative and positive intervals so
//! that cancellation between attractive and repulsive triples never hides error.
//! The reported potential is the sum of the two interval midpoints.

use crate::bounds::dist_sq;
use crate::error::{Error, Result, check_tolerance};
use crate::kde::DEFAULT_ABSOLUTE_ERROR;
use crate::kdtree::{DEFAULT_LEAF_SIZE, KdTree, KdTreeBuilder};
use crate::potential::AxilrodTeller;
use crate::range::Range;
use crate::statistic::{Postponed, QueryResult, Summary};
use crate::store::points_from_flat;
use crate::traversal::{NodeTriple, TraversalStats, TripleTreeProblem, TripleTreeTraversal};
use tracing::{debug, debug_span};

#[derive(Clone, Debug, Default, PartialEq)]
pub struct NbodyPostponed {
    pub negative_potential: Range,
    pub positive_potential: Range,
    /// Triples accounted for.
    pub pruned: f64,
    pub used_error: f64,
}

impl Postponed for NbodyPostponed {
    fn apply_postponed(&mut self, other: &Self) {
        self.negative_potential += other.negative_potential;
        self.positive_potential += other.positive_potential;
        self.pruned += other.pruned;
        self.used_error += other.used_error;
    }
}

impl NbodyPostponed {
    /// Exact contribution of a single triple.
    fn exact(potential: f64) -> Self {
        let (negative, positive) = if potential < 0.0 { (potential, 0.0) } else { (0.0, potential) };
        Self {
            negative_potential: Range::point(negative),
            positive_potential: Range::point(positive),
            pruned: 1.0,
            used_error: 0.0,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct NbodyResult {
    pub negative_potential: Range,
    pub positive_potential: Range,
    pub pruned: f64,
    pub used_error: f64,
    /// Net potential estimate, set by post-processing.
    pub potential: f64,
}

impl QueryResult for NbodyResult {
    type Postponed = NbodyPostponed;

    fn apply_postponed(&mut self, postponed: &NbodyPostponed) {
        self.negative_potential += postponed.negative_potential;
        self.positive_potential += postponed.positive_potential;
        self.pruned += postponed.pruned;
        self.used_error += postponed.used_error;
    }
}

/// Hull of the potential intervals of a subtree's points, with the fewest triples
/// accounted for and the most error spent.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct NbodySummary {
    pub negative_potential: Range,
    pub positive_potential: Range,
    pub pruned: f64,
    pub used_error: f64,
}

impl Summary for NbodySummary {
    type Result = NbodyResult;

    fn start_reaccumulate(&mut self) {
        self.negative_potential = Range::empty();
        self.positive_potential = Range::empty();
        self.pruned = f64::INFINITY;
        self.used_error = 0.0;
    }

    fn accumulate(&mut self, other: &Self) {
        self.negative_potential |= other.negative_potential;
        self.positive_potential |= other.positive_potential;
        self.pruned = self.pruned.min(other.pruned);
        self.used_error = self.used_error.max(other.used_error);
    }

    fn accumulate_result(&mut self, result: &NbodyResult) {
        self.negative_potential |= result.negative_potential;
        self.positive_potential |= result.positive_potential;
        self.pruned = self.pruned.min(result.pruned);
        self.used_error = self.used_error.max(result.used_error);
    }

    fn apply_postponed(&mut self, postponed: &NbodyPostponed) {
        self.negative_potential += postponed.negative_potential;
        self.positive_potential += postponed.positive_potential;
        self.pruned += postponed.pruned;
        self.used_error += postponed.used_error;
    }
}

/// Per-point contribution of a node triple, one entry per slot.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NbodyDelta {
    pub potential: [Range; 3],
    pub pruned: [f64; 3],
    pub used_error: [f64; 3],
}

/// The three-body problem driven by [`TripleTreeTraversal`].
#[derive(Clone, Debug)]
pub struct NbodyProblem {
    potential: AxilrodTeller,
    // Triples each point belongs to: C(N - 1, 2).
    total_tuples: f64,
    absolute_error: f64,
    relative_error: f64,
}

impl NbodyProblem {
    pub fn new(potential: AxilrodTeller, num_points: usize, absolute_error: f64, relative_error: f64) -> Self {
        let others = num_points.saturating_sub(1) as f64;
        Self {
            potential,
            total_tuples: others * (others - 1.0).max(0.0) / 2.0,
            absolute_error,
            relative_error,
        }
    }
}

/// Smallest absolute value in `range`.
fn magnitude_lower_bound(range: Range) -> f64 {
    if range.contains(0.0) {
        0.0
    } else {
        range.lo.abs().min(range.hi.abs())
    }
}

impl<const D: usize> TripleTreeProblem<D> for NbodyProblem {
    type Summary = NbodySummary;
    type Delta = NbodyDelta;

    fn compute_delta(&self, triple: &NodeTriple<'_, D>) -> NbodyDelta {
        let [a, b, c] = triple.nodes.map(|n| n.bounds());
        let range = self
            .potential
            .range_on_sq(a.dist_sq_range(b), a.dist_sq_range(c), b.dist_sq_range(c));
        let pruned: [f64; 3] = std::array::from_fn(|s| triple.tuples_per_point(s));
        NbodyDelta {
            potential: pruned.map(|t| range * t),
            pruned,
            used_error: pruned.map(|t| 0.5 * t * range.width()),
        }
    }

    fn can_summarize(&self, delta: &NbodyDelta, summaries: &[NbodySummary; 3], triple: &NodeTriple<'_, D>) -> bool {
        triple.distinct_slots().all(|s| {
            let summary = &summaries[s];
            let remaining = self.total_tuples - summary.pruned;
            if remaining <= 0.0 {
                return false;
            }
            let potential = summary.negative_potential + summary.positive_potential + delta.potential[s];
            let tolerance = self
                .absolute_error
                .max(self.relative_error * magnitude_lower_bound(potential));
            let budget = (tolerance - summary.used_error) * delta.pruned[s] / remaining;
            budget > 0.0 && delta.used_error[s] <= budget
        })
    }

    fn apply_delta(&self, delta: &NbodyDelta, slot: usize, postponed: &mut NbodyPostponed) {
        let potential = delta.potential[slot];
        postponed.negative_potential += potential.negative_part();
        postponed.positive_potential += potential.positive_part();
        postponed.pruned += delta.pruned[slot];
        postponed.used_error += delta.used_error[slot];
    }

    fn base_case(&self, points: [&[f64; D]; 3]) -> [NbodyPostponed; 3] {
        let [p1, p2, p3] = points;
        let v = self
            .potential
            .eval_on_sq(dist_sq(p1, p2), dist_sq(p1, p3), dist_sq(p2, p3));
        let contribution = NbodyPostponed::exact(v);
        [contribution.clone(), contribution.clone(), contribution]
    }

    fn post_process(&self, result: &mut NbodyResult) {
        result.potential = result.negative_potential.mid() + result.positive_potential.mid();
    }
}

/// Per-point results in input order.
#[derive(Clone, Debug)]
pub struct NbodyOutput {
    pub results: Vec<NbodyResult>,
    pub stats: TraversalStats,
}

impl NbodyOutput {
    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn potentials(&self) -> Vec<f64> {
        self.results.iter().map(|r| r.potential).collect()
    }

    /// `(potential, triples pruned)` rows for [`crate::output::write_results`].
    pub fn rows(&self) -> Vec<(f64, f64)> {
        self.results.iter().map(|r| (r.potential, r.pruned)).collect()
    }
}

/// Builder for [`ThreeBodySimulator`].
#[derive(Clone, Copy, Debug)]
pub struct ThreeBodySimulatorBuilder {
    absolute_error: f64,
    relative_error: f64,
    leaf_size: usize,
    strength: f64,
}

impl Default for ThreeBodySimulatorBuilder {
    fn default() -> Self {
        Self {
            absolute_error: DEFAULT_ABSOLUTE_ERROR,
            relative_error: 0.0,
            leaf_size: DEFAULT_LEAF_SIZE,
            strength: 1.0,
        }
    }
}

impl ThreeBodySimulatorBuilder {
    pub fn absolute_error(mut self, absolute_error: f64) -> Self {
        self.absolute_error = absolute_error;
        self
    }

    pub fn relative_error(mut self, relative_error: f64) -> Self {
        self.relative_error = relative_error;
        self
    }

    pub fn leaf_size(mut self, leaf_size: usize) -> Self {
        self.leaf_size = leaf_size;
        self
    }

    pub fn strength(mut self, strength: f64) -> Self {
        self.strength = strength;
        self
    }

    pub fn build(self) -> Result<ThreeBodySimulator> {
        check_tolerance("absolute_error", self.absolute_error)?;
        check_tolerance("relative_error", self.relative_error)?;
        if self.leaf_size == 0 {
            return Err(Error::InvalidLeafSize);
        }
        if !self.strength.is_finite() {
            return Err(Error::InvalidStrength(self.strength));
        }
        Ok(ThreeBodySimulator {
            potential: AxilrodTeller::new(self.strength),
            absolute_error: self.absolute_error,
            relative_error: self.relative_error,
            leaf_size: self.leaf_size,
        })
    }
}

/// Validated three-body potential simulator.
#[derive(Clone, Debug)]
pub struct ThreeBodySimulator {
    potential: AxilrodTeller,
    absolute_error: f64,
    relative_error: f64,
    leaf_size: usize,
}

impl ThreeBodySimulator {
    pub fn builder() -> ThreeBodySimulatorBuilder {
        ThreeBodySimulatorBuilder::default()
    }

    pub fn potential(&self) -> &AxilrodTeller {
        &self.potential
    }

    /// Net potential at every point.
    pub fn simulate<const D: usize>(&self, points: Vec<[f64; D]>) -> Result<NbodyOutput> {
        let tree: KdTree<D> = KdTreeBuilder::new().leaf_size(self.leaf_size).build(points)?;
        Ok(self.simulate_tree(&tree))
    }

    pub fn simulate_flat<const D: usize>(&self, coords: &[f64]) -> Result<NbodyOutput> {
        self.simulate::<D>(points_from_flat(coords)?)
    }

    pub fn simulate_tree<const D: usize, S: Sync>(&self, tree: &KdTree<D, S>) -> NbodyOutput {
        let _span = debug_span!("three_body", dim = D, points = tree.len()).entered();
        let problem = NbodyProblem::new(self.potential, tree.len(), self.absolute_error, self.relative_error);
        let (results, stats) = TripleTreeTraversal::new(&problem).run(tree);
        debug!(prunes = stats.prunes, base_cases = stats.base_cases, "three-body potentials ready");
        NbodyOutput { results, stats }
    }
}
