use crate::range::Range;

/// Generic axis-aligned bounding box for N-dimensional space.
///
/// One inclusive interval per dimension. The empty box has `min = +inf` and
/// `max = -inf` everywhere, so growing it by any point yields a valid box.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoundingBox<const D: usize> {
    pub min: [f64; D],
    pub max: [f64; D],
}

impl<const D: usize> Default for BoundingBox<D> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<const D: usize> BoundingBox<D> {
    pub fn new(min: [f64; D], max: [f64; D]) -> Self {
        Self { min, max }
    }

    pub fn empty() -> Self {
        Self {
            min: [f64::INFINITY; D],
            max: [f64::NEG_INFINITY; D],
        }
    }

    /// Tight box around a set of points.
    pub fn from_points(points: &[[f64; D]]) -> Self {
        let mut bounds = Self::empty();
        for p in points {
            bounds.grow(p);
        }
        bounds
    }

    pub fn is_empty(&self) -> bool {
        (0..D).any(|d| self.min[d] > self.max[d])
    }

    /// Union with a point.
    pub fn grow(&mut self, point: &[f64; D]) {
        for d in 0..D {
            if point[d] < self.min[d] { self.min[d] = point[d]; }
            if point[d] > self.max[d] { self.max[d] = point[d]; }
        }
    }

    /// Union with another box.
    pub fn merge(&mut self, other: &Self) {
        for d in 0..D {
            self.min[d] = self.min[d].min(other.min[d]);
            self.max[d] = self.max[d].max(other.max[d]);
        }
    }

    pub fn merged(mut self, other: &Self) -> Self {
        self.merge(other);
        self
    }

    pub fn width(&self, dim: usize) -> f64 {
        self.max[dim] - self.min[dim]
    }

    pub fn mid(&self, dim: usize) -> f64 {
        0.5 * (self.min[dim] + self.max[dim])
    }

    pub fn center(&self) -> [f64; D] {
        std::array::from_fn(|d| self.mid(d))
    }

    /// The dimension of maximum width, with that width. Ties go to the lowest dimension.
    pub fn widest_dim(&self) -> (usize, f64) {
        let mut best = (0, f64::NEG_INFINITY);
        for d in 0..D {
            let w = self.width(d);
            if w > best.1 {
                best = (d, w);
            }
        }
        best
    }

    pub fn contains(&self, point: &[f64; D]) -> bool {
        (0..D).all(|d| point[d] >= self.min[d] && point[d] <= self.max[d])
    }

    /// Squared length of the diagonal.
    pub fn diagonal_sq(&self) -> f64 {
        (0..D).map(|d| self.width(d).powi(2)).sum()
    }

    /// Minimum squared distance between any point of `self` and any point of `other`.
    pub fn min_dist_sq(&self, other: &Self) -> f64 {
        let mut d2 = 0.0;
        for d in 0..D {
            let gap = (other.min[d] - self.max[d]).max(self.min[d] - other.max[d]);
            if gap > 0.0 {
                d2 += gap * gap;
            }
        }
        d2
    }

    /// Maximum squared distance between any point of `self` and any point of `other`.
    pub fn max_dist_sq(&self, other: &Self) -> f64 {
        let mut d2 = 0.0;
        for d in 0..D {
            let span = (other.max[d] - self.min[d]).max(self.max[d] - other.min[d]);
            d2 += span * span;
        }
        d2
    }

    pub fn dist_sq_range(&self, other: &Self) -> Range {
        Range::new(self.min_dist_sq(other), self.max_dist_sq(other))
    }

    pub fn min_dist_sq_point(&self, point: &[f64; D]) -> f64 {
        let mut d2 = 0.0;
        for d in 0..D {
            let v = point[d];
            if v < self.min[d] { d2 += (self.min[d] - v).powi(2); }
            else if v > self.max[d] { d2 += (v - self.max[d]).powi(2); }
        }
        d2
    }

    pub fn max_dist_sq_point(&self, point: &[f64; D]) -> f64 {
        let mut d2 = 0.0;
        for d in 0..D {
            let span = (point[d] - self.min[d]).abs().max((self.max[d] - point[d]).abs());
            d2 += span * span;
        }
        d2
    }
}

/// Squared Euclidean distance between two points.
pub fn dist_sq<const D: usize>(a: &[f64; D], b: &[f64; D]) -> f64 {
    let mut d2 = 0.0;
    for d in 0..D {
        let diff = a[d] - b[d];
        d2 += diff * diff;
    }
    d2
}
