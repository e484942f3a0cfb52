//! Brute-force references for validating the tree-based estimators.
//!
//! Quadratic for densities and cubic for three-body potentials. Queries are
//! independent and run on rayon's pool.

use crate::bounds::dist_sq;
use crate::kernel::Kernel;
use crate::potential::AxilrodTeller;
use rayon::prelude::*;

/// Exact normalized density of `references` at every query, self-contribution included.
pub fn kde<const D: usize, K: Kernel>(queries: &[[f64; D]], references: &[[f64; D]], kernel: &K) -> Vec<f64> {
    let scale = 1.0 / (references.len() as f64 * kernel.norm_constant(D));
    queries
        .par_iter()
        .map(|q| {
            let sum: f64 = references
                .iter()
                .map(|r| kernel.eval_unnorm_on_sq(dist_sq(q, r)))
                .sum();
            sum * scale
        })
        .collect()
}

/// Exact three-body potential at every point: the sum over all unordered pairs of
/// other points.
pub fn three_body<const D: usize>(points: &[[f64; D]], potential: &AxilrodTeller) -> Vec<f64> {
    (0..points.len())
        .into_par_iter()
        .map(|i| {
            let p = &points[i];
            let mut total = 0.0;
            for j in 0..points.len() {
                if j == i {
                    continue;
                }
                let a = dist_sq(p, &points[j]);
                for k in (j + 1)..points.len() {
                    if k == i {
                        continue;
                    }
                    total += potential.eval_on_sq(a, dist_sq(p, &points[k]), dist_sq(&points[j], &points[k]));
                }
            }
            total
        })
        .collect()
}

/// Largest `|approx - exact| / |exact|` over all entries. Entries with an exact
/// value of zero compare absolutely.
pub fn max_relative_error(approx: &[f64], exact: &[f64]) -> f64 {
    approx
        .iter()
        .zip(exact)
        .map(|(a, e)| {
            let diff = (a - e).abs();
            if *e == 0.0 { diff } else { diff / e.abs() }
        })
        .fold(0.0, f64::max)
}
