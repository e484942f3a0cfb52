use crate::range::Range;
use std::f64::consts::PI;

/// A radially symmetric smoothing kernel, evaluated on squared distances.
///
/// Kernels must be non-increasing in the distance, which is what lets
/// [`range_unnorm_on_sq`](Self::range_unnorm_on_sq) bound a whole node pair from
/// its distance range.
pub trait Kernel: Send + Sync {
    fn with_bandwidth(bandwidth: f64) -> Self
    where
        Self: Sized;

    /// Unnormalized kernel value at squared distance `dist_sq`.
    fn eval_unnorm_on_sq(&self, dist_sq: f64) -> f64;

    /// Bounds of the unnormalized value over a range of squared distances.
    fn range_unnorm_on_sq(&self, dist_sq: Range) -> Range {
        Range::new(self.eval_unnorm_on_sq(dist_sq.hi), self.eval_unnorm_on_sq(dist_sq.lo))
    }

    /// Constant that turns the unnormalized kernel into a density in `dim` dimensions.
    fn norm_constant(&self, dim: usize) -> f64;

    fn bandwidth(&self) -> f64;
}

/// `exp(-d^2 / 2h^2)`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GaussianKernel {
    bandwidth: f64,
    neg_inv_bandwidth_sq_half: f64,
}

impl GaussianKernel {
    /// The bandwidth is validated by the estimator builders.
    pub fn new(bandwidth: f64) -> Self {
        Self {
            bandwidth,
            neg_inv_bandwidth_sq_half: -0.5 / (bandwidth * bandwidth),
        }
    }
}

impl Kernel for GaussianKernel {
    fn with_bandwidth(bandwidth: f64) -> Self {
        Self::new(bandwidth)
    }

    fn eval_unnorm_on_sq(&self, dist_sq: f64) -> f64 {
        (dist_sq * self.neg_inv_bandwidth_sq_half).exp()
    }

    fn norm_constant(&self, dim: usize) -> f64 {
        (2.0 * PI * self.bandwidth * self.bandwidth).powf(dim as f64 / 2.0)
    }

    fn bandwidth(&self) -> f64 {
        self.bandwidth
    }
}

/// `max(0, 1 - d^2 / h^2)`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EpanechnikovKernel {
    bandwidth: f64,
    inv_bandwidth_sq: f64,
}

impl EpanechnikovKernel {
    pub fn new(bandwidth: f64) -> Self {
        Self {
            bandwidth,
            inv_bandwidth_sq: 1.0 / (bandwidth * bandwidth),
        }
    }
}

impl Kernel for EpanechnikovKernel {
    fn with_bandwidth(bandwidth: f64) -> Self {
        Self::new(bandwidth)
    }

    fn eval_unnorm_on_sq(&self, dist_sq: f64) -> f64 {
        (1.0 - dist_sq * self.inv_bandwidth_sq).max(0.0)
    }

    fn norm_constant(&self, dim: usize) -> f64 {
        // Volume of the unit ball times 2 / (d + 2), scaled by h^d.
        let d = dim as f64;
        let unit_ball = PI.powf(d / 2.0) / gamma_half_integer(dim + 2);
        2.0 * unit_ball * self.bandwidth.powf(d) / (d + 2.0)
    }

    fn bandwidth(&self) -> f64 {
        self.bandwidth
    }
}

/// `Gamma(n / 2)` for a positive integer `n`.
fn gamma_half_integer(n: usize) -> f64 {
    let mut value = if n % 2 == 0 { 1.0 } else { PI.sqrt() };
    let mut k = if n % 2 == 0 { 2 } else { 1 };
    while k < n {
        value *= k as f64 / 2.0;
        k += 2;
    }
    value
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_gaussian_values() {
        let k = GaussianKernel::new(1.0);
        assert_eq!(k.eval_unnorm_on_sq(0.0), 1.0);
        assert_relative_eq!(k.eval_unnorm_on_sq(2.0), (-1.0f64).exp());
        assert_relative_eq!(k.norm_constant(2), 2.0 * PI);
        let r = k.range_unnorm_on_sq(Range::new(1.0, 4.0));
        assert_relative_eq!(r.lo, (-2.0f64).exp());
        assert_relative_eq!(r.hi, (-0.5f64).exp());
    }

    #[test]
    fn test_epanechnikov_support() {
        let k = EpanechnikovKernel::new(2.0);
        assert_eq!(k.eval_unnorm_on_sq(0.0), 1.0);
        assert_eq!(k.eval_unnorm_on_sq(4.0), 0.0);
        assert_eq!(k.eval_unnorm_on_sq(9.0), 0.0);
        assert_relative_eq!(k.eval_unnorm_on_sq(1.0), 0.75);
    }

    #[test]
    fn test_epanechnikov_normalization() {
        // In one dimension the integral of 1 - x^2 over [-1, 1] is 4/3.
        assert_relative_eq!(EpanechnikovKernel::new(1.0).norm_constant(1), 4.0 / 3.0, epsilon = 1e-12);
        // In two dimensions it is pi / 2.
        assert_relative_eq!(EpanechnikovKernel::new(1.0).norm_constant(2), PI / 2.0, epsilon = 1e-12);
    }

    #[test]
    fn test_gamma_half_integer() {
        assert_relative_eq!(gamma_half_integer(1), PI.sqrt());
        assert_relative_eq!(gamma_half_integer(2), 1.0);
        assert_relative_eq!(gamma_half_integer(3), PI.sqrt() / 2.0);
        assert_relative_eq!(gamma_half_integer(4), 1.0);
        assert_relative_eq!(gamma_half_integer(6), 2.0);
    }
}
