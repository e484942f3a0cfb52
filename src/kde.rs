//! Dual-tree kernel density estimation.
//!
//! The density at a query `q` is `sum_r K(|q - r|) / (N * C)`, where `N` is the number
//! of references and `C` the kernel's normalizing constant. The sum runs over every
//! reference. When queries and references are the same set, each point's own kernel
//! value is included.
//!
//! A query/reference node pair is approximated by the midpoint of the kernel range
//! over the pair's distance range when its worst-case error fits the query's share
//! of the error budget:
//!
//! ```text
//! err <= (tau - used_max) * |R| / (N - pruned_min)
//! tau  = max(absolute_error, relative_error * density_lower_bound)
//! ```
//!
//! `used_max` and `pruned_min` come from the query node's summary. Each prune or
//! base case keeps `(tau - used) / (N - pruned)` from shrinking for every query,
//! so the used error of a query never exceeds `tau` once all references are accounted for.

use crate::bounds::dist_sq;
use crate::error::{Error, Result, check_tolerance};
use crate::kdtree::{DEFAULT_LEAF_SIZE, KdNode, KdTree, KdTreeBuilder};
use crate::kernel::{GaussianKernel, Kernel};
use crate::range::Range;
use crate::statistic::{Postponed, QueryResult, Summary};
use crate::store::points_from_flat;
use crate::traversal::{DualTreeProblem, DualTreeTraversal, TraversalStats};
use std::marker::PhantomData;
use tracing::{debug, debug_span};

/// Default absolute error bound on every density estimate.
pub const DEFAULT_ABSOLUTE_ERROR: f64 = 0.1;

/// Contribution postponed at a query node.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct KdePostponed {
    /// Bounds on the unnormalized kernel sum.
    pub density: Range,
    /// References accounted for.
    pub pruned: f64,
    /// Approximation error spent, in density units.
    pub used_error: f64,
}

impl Postponed for KdePostponed {
    fn apply_postponed(&mut self, other: &Self) {
        self.density += other.density;
        self.pruned += other.pruned;
        self.used_error += other.used_error;
    }
}

/// Accumulators of one query point.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct KdeResult {
    /// Bounds on the unnormalized kernel sum.
    pub density: Range,
    pub pruned: f64,
    pub used_error: f64,
    /// Normalized density estimate, set by post-processing.
    pub estimate: f64,
}

impl QueryResult for KdeResult {
    type Postponed = KdePostponed;

    fn apply_postponed(&mut self, postponed: &KdePostponed) {
        self.density += postponed.density;
        self.pruned += postponed.pruned;
        self.used_error += postponed.used_error;
    }
}

/// Worst case over the queries of a subtree.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct KdeSummary {
    /// Smallest lower bound on the unnormalized kernel sum.
    pub density_lo: f64,
    /// Fewest references accounted for.
    pub pruned: f64,
    /// Most error spent.
    pub used_error: f64,
}

impl Summary for KdeSummary {
    type Result = KdeResult;

    fn start_reaccumulate(&mut self) {
        self.density_lo = f64::INFINITY;
        self.pruned = f64::INFINITY;
        self.used_error = 0.0;
    }

    fn accumulate(&mut self, other: &Self) {
        self.density_lo = self.density_lo.min(other.density_lo);
        self.pruned = self.pruned.min(other.pruned);
        self.used_error = self.used_error.max(other.used_error);
    }

    fn accumulate_result(&mut self, result: &KdeResult) {
        self.density_lo = self.density_lo.min(result.density.lo);
        self.pruned = self.pruned.min(result.pruned);
        self.used_error = self.used_error.max(result.used_error);
    }

    fn apply_postponed(&mut self, postponed: &KdePostponed) {
        self.density_lo += postponed.density.lo;
        self.pruned += postponed.pruned;
        self.used_error += postponed.used_error;
    }
}

/// Bounded contribution of one reference node to each query of a query node.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct KdeDelta {
    pub density: Range,
    pub pruned: f64,
    pub used_error: f64,
}

/// The kernel summation problem driven by [`DualTreeTraversal`].
#[derive(Clone, Debug)]
pub struct KdeProblem<K> {
    kernel: K,
    num_references: f64,
    // Turns an unnormalized kernel sum into a density.
    scale: f64,
    absolute_error: f64,
    relative_error: f64,
}

impl<K: Kernel> KdeProblem<K> {
    pub fn new(kernel: K, dim: usize, num_references: usize, absolute_error: f64, relative_error: f64) -> Self {
        let num_references = num_references as f64;
        let scale = 1.0 / (num_references * kernel.norm_constant(dim));
        Self {
            kernel,
            num_references,
            scale,
            absolute_error,
            relative_error,
        }
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }
}

impl<K: Kernel, const D: usize> DualTreeProblem<D> for KdeProblem<K> {
    type Summary = KdeSummary;
    type Delta = KdeDelta;

    fn compute_delta(&self, query: &KdNode<D>, reference: &KdNode<D>) -> KdeDelta {
        let count = reference.count() as f64;
        let kernel = self
            .kernel
            .range_unnorm_on_sq(query.bounds().dist_sq_range(reference.bounds()));
        KdeDelta {
            density: kernel * count,
            pruned: count,
            used_error: 0.5 * count * kernel.width() * self.scale,
        }
    }

    fn can_summarize(&self, delta: &KdeDelta, summary: &KdeSummary, _query: &KdNode<D>, _reference: &KdNode<D>) -> bool {
        let remaining = self.num_references - summary.pruned;
        if remaining <= 0.0 {
            return false;
        }
        let lower = (summary.density_lo + delta.density.lo) * self.scale;
        let tolerance = self.absolute_error.max(self.relative_error * lower);
        let budget = (tolerance - summary.used_error) * delta.pruned / remaining;
        budget > 0.0 && delta.used_error <= budget
    }

    fn apply_delta(&self, delta: &KdeDelta, postponed: &mut KdePostponed) {
        postponed.density += delta.density;
        postponed.pruned += delta.pruned;
        postponed.used_error += delta.used_error;
    }

    fn base_case(&self, query: &[f64; D], references: &[[f64; D]], result: &mut KdeResult) {
        let sum: f64 = references
            .iter()
            .map(|r| self.kernel.eval_unnorm_on_sq(dist_sq(query, r)))
            .sum();
        result.density += Range::point(sum);
        result.pruned += references.len() as f64;
    }

    fn post_process(&self, result: &mut KdeResult) {
        result.estimate = result.density.mid() * self.scale;
    }
}

/// Per-query results in input order.
#[derive(Clone, Debug)]
pub struct KdeOutput {
    pub results: Vec<KdeResult>,
    pub stats: TraversalStats,
    scale: f64,
}

impl KdeOutput {
    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn estimates(&self) -> Vec<f64> {
        self.results.iter().map(|r| r.estimate).collect()
    }

    /// Guaranteed bounds on the true density of query `index`.
    pub fn bounds(&self, index: usize) -> Range {
        self.results[index].density * self.scale
    }

    /// `(estimate, references pruned)` rows for [`crate::output::write_results`].
    pub fn rows(&self) -> Vec<(f64, f64)> {
        self.results.iter().map(|r| (r.estimate, r.pruned)).collect()
    }
}

/// Builder for [`KernelDensity`].
#[derive(Clone, Copy, Debug)]
pub struct KernelDensityBuilder<K = GaussianKernel> {
    bandwidth: Option<f64>,
    absolute_error: f64,
    relative_error: f64,
    leaf_size: usize,
    parallel: bool,
    kernel: PhantomData<K>,
}

impl Default for KernelDensityBuilder {
    fn default() -> Self {
        Self {
            bandwidth: None,
            absolute_error: DEFAULT_ABSOLUTE_ERROR,
            relative_error: 0.0,
            leaf_size: DEFAULT_LEAF_SIZE,
            parallel: true,
            kernel: PhantomData,
        }
    }
}

impl<K: Kernel> KernelDensityBuilder<K> {
    pub fn bandwidth(mut self, bandwidth: f64) -> Self {
        self.bandwidth = Some(bandwidth);
        self
    }

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

    pub fn parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Switches the smoothing kernel.
    pub fn kernel<K2: Kernel>(self) -> KernelDensityBuilder<K2> {
        KernelDensityBuilder {
            bandwidth: self.bandwidth,
            absolute_error: self.absolute_error,
            relative_error: self.relative_error,
            leaf_size: self.leaf_size,
            parallel: self.parallel,
            kernel: PhantomData,
        }
    }

    pub fn build(self) -> Result<KernelDensity<K>> {
        let bandwidth = self.bandwidth.unwrap_or(f64::NAN);
        if !(bandwidth.is_finite() && bandwidth > 0.0) {
            return Err(Error::InvalidBandwidth(bandwidth));
        }
        check_tolerance("absolute_error", self.absolute_error)?;
        check_tolerance("relative_error", self.relative_error)?;
        if self.leaf_size == 0 {
            return Err(Error::InvalidLeafSize);
        }
        Ok(KernelDensity {
            kernel: K::with_bandwidth(bandwidth),
            absolute_error: self.absolute_error,
            relative_error: self.relative_error,
            leaf_size: self.leaf_size,
            parallel: self.parallel,
        })
    }
}

/// Validated kernel density estimator.
#[derive(Clone, Debug)]
pub struct KernelDensity<K = GaussianKernel> {
    kernel: K,
    absolute_error: f64,
    relative_error: f64,
    leaf_size: usize,
    parallel: bool,
}

impl KernelDensity {
    pub fn builder() -> KernelDensityBuilder {
        KernelDensityBuilder::default()
    }
}

impl<K: Kernel + Clone> KernelDensity<K> {
    pub fn kernel(&self) -> &K {
        &self.kernel
    }

    fn tree_builder(&self) -> KdTreeBuilder {
        KdTreeBuilder::new().leaf_size(self.leaf_size).parallel(self.parallel)
    }

    /// Density of `references` at every point of `queries`.
    pub fn estimate<const D: usize>(&self, queries: Vec<[f64; D]>, references: Vec<[f64; D]>) -> Result<KdeOutput> {
        let query_tree: KdTree<D> = self.tree_builder().build(queries)?;
        let reference_tree: KdTree<D> = self.tree_builder().build(references)?;
        Ok(self.estimate_trees(&query_tree, &reference_tree))
    }

    /// Density of `points` at each of its own points, sharing one tree.
    pub fn estimate_self<const D: usize>(&self, points: Vec<[f64; D]>) -> Result<KdeOutput> {
        let tree: KdTree<D> = self.tree_builder().build(points)?;
        Ok(self.estimate_trees(&tree, &tree))
    }

    /// Like [`estimate`](Self::estimate) on interleaved coordinates, `D` values per point.
    pub fn estimate_flat<const D: usize>(&self, queries: &[f64], references: &[f64]) -> Result<KdeOutput> {
        self.estimate::<D>(points_from_flat(queries)?, points_from_flat(references)?)
    }

    /// Runs on prebuilt trees. Results follow the query tree's input order.
    pub fn estimate_trees<const D: usize, QS: Sync, RS: Sync>(
        &self,
        query: &KdTree<D, QS>,
        reference: &KdTree<D, RS>,
    ) -> KdeOutput {
        let _span = debug_span!("kde", dim = D, bandwidth = self.kernel.bandwidth()).entered();
        let problem = KdeProblem::new(
            self.kernel.clone(),
            D,
            reference.len(),
            self.absolute_error,
            self.relative_error,
        );
        let (results, stats) = DualTreeTraversal::new(&problem)
            .parallel(self.parallel)
            .run(query, reference);
        debug!(queries = results.len(), prunes = stats.prunes, "kernel density estimates ready");
        KdeOutput {
            results,
            stats,
            scale: problem.scale(),
        }
    }
}
