use crate::bounds::BoundingBox;
use crate::error::{Error, Result};

/// The dataset a tree is built over: a contiguous point buffer plus, for every
/// slot, the index the point had in the caller's input.
///
/// Construction reorders the buffer in place. Every reordering goes through
/// [`PointSlice::swap`], which moves the point and its original index together,
/// so slot `i` of both arrays always describes the same logical point.
#[derive(Clone, Debug)]
pub struct PointStore<const D: usize> {
    points: Vec<[f64; D]>,
    old_from_new: Vec<usize>,
}

impl<const D: usize> PointStore<D> {
    /// Takes ownership of `points`, rejecting empty input and non-finite coordinates.
    pub fn new(points: Vec<[f64; D]>) -> Result<Self> {
        if points.is_empty() {
            return Err(Error::EmptyDataset);
        }
        if let Some(index) = points.iter().position(|p| p.iter().any(|v| !v.is_finite())) {
            return Err(Error::NonFinite { index });
        }
        let old_from_new = (0..points.len()).collect();
        Ok(Self { points, old_from_new })
    }

    /// Builds a store from interleaved coordinates, `D` values per point.
    pub fn from_flat(coords: &[f64]) -> Result<Self> {
        Self::new(points_from_flat(coords)?)
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn points(&self) -> &[[f64; D]] {
        &self.points
    }

    pub fn old_from_new(&self) -> &[usize] {
        &self.old_from_new
    }

    pub fn as_slice_mut(&mut self) -> PointSlice<'_, D> {
        PointSlice {
            points: &mut self.points,
            ids: &mut self.old_from_new,
        }
    }

    pub fn into_parts(self) -> (Vec<[f64; D]>, Vec<usize>) {
        (self.points, self.old_from_new)
    }
}

/// Splits interleaved coordinates into points.
pub fn points_from_flat<const D: usize>(coords: &[f64]) -> Result<Vec<[f64; D]>> {
    if D == 0 || coords.len() % D != 0 {
        return Err(Error::DimensionMismatch {
            expected: D,
            found: coords.len() % D.max(1),
        });
    }
    Ok(coords
        .chunks_exact(D)
        .map(|c| std::array::from_fn(|d| c[d]))
        .collect())
}

/// Mutable view over a contiguous range of a [`PointStore`].
#[derive(Debug)]
pub struct PointSlice<'a, const D: usize> {
    points: &'a mut [[f64; D]],
    ids: &'a mut [usize],
}

impl<'a, const D: usize> PointSlice<'a, D> {
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn point(&self, i: usize) -> &[f64; D] {
        &self.points[i]
    }

    pub fn points(&self) -> &[[f64; D]] {
        self.points
    }

    /// Swaps two slots across every parallel array.
    pub fn swap(&mut self, i: usize, j: usize) {
        self.points.swap(i, j);
        self.ids.swap(i, j);
    }

    /// Splits into disjoint views `[0, mid)` and `[mid, len)`.
    pub fn split_at_mut(self, mid: usize) -> (PointSlice<'a, D>, PointSlice<'a, D>) {
        let (pl, pr) = self.points.split_at_mut(mid);
        let (il, ir) = self.ids.split_at_mut(mid);
        (
            PointSlice { points: pl, ids: il },
            PointSlice { points: pr, ids: ir },
        )
    }

    pub fn bounds(&self) -> BoundingBox<D> {
        BoundingBox::from_points(self.points)
    }

    /// In-place two-pointer partition around `split` along `dim`.
    ///
    /// Afterwards every slot before the returned index has `p[dim] < split` and every
    /// slot from it on has `p[dim] >= split`. The bounds of both sides are grown as
    /// points are classified.
    pub fn partition(&mut self, dim: usize, split: f64) -> (usize, BoundingBox<D>, BoundingBox<D>) {
        let mut left_bounds = BoundingBox::empty();
        let mut right_bounds = BoundingBox::empty();
        // Everything before `left` and from `right` on is already classified.
        let mut left = 0;
        let mut right = self.points.len();

        loop {
            while left < right && self.points[left][dim] < split {
                left_bounds.grow(&self.points[left]);
                left += 1;
            }
            while left < right && self.points[right - 1][dim] >= split {
                right_bounds.grow(&self.points[right - 1]);
                right -= 1;
            }
            if left >= right {
                break;
            }

            self.swap(left, right - 1);
            left_bounds.grow(&self.points[left]);
            right_bounds.grow(&self.points[right - 1]);
            left += 1;
            right -= 1;
        }

        debug_assert_eq!(left, right);
        (left, left_bounds, right_bounds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_bad_input() {
        assert!(matches!(PointStore::<2>::new(Vec::new()), Err(Error::EmptyDataset)));
        assert!(matches!(
            PointStore::new(vec![[0.0, 1.0], [f64::NAN, 0.0]]),
            Err(Error::NonFinite { index: 1 })
        ));
        assert!(matches!(
            PointStore::<3>::from_flat(&[0.0, 1.0, 2.0, 3.0]),
            Err(Error::DimensionMismatch { expected: 3, found: 1 })
        ));
    }

    #[test]
    fn test_partition_keeps_ids_in_step() {
        let points = vec![[5.0], [1.0], [7.0], [2.0], [9.0], [0.0]];
        let mut store = PointStore::new(points.clone()).unwrap();
        let mut slice = store.as_slice_mut();
        let (split, lb, rb) = slice.partition(0, 4.0);

        assert_eq!(split, 3);
        assert!(slice.points()[..split].iter().all(|p| p[0] < 4.0));
        assert!(slice.points()[split..].iter().all(|p| p[0] >= 4.0));
        assert_eq!(lb, BoundingBox::new([0.0], [2.0]));
        assert_eq!(rb, BoundingBox::new([5.0], [9.0]));

        for (p, &old) in store.points().iter().zip(store.old_from_new()) {
            assert_eq!(*p, points[old]);
        }
    }

    #[test]
    fn test_partition_one_sided() {
        let mut store = PointStore::new(vec![[1.0], [1.0], [1.0]]).unwrap();
        let (split, lb, rb) = store.as_slice_mut().partition(0, 1.0);
        assert_eq!(split, 0);
        assert!(lb.is_empty());
        assert_eq!(rb, BoundingBox::new([1.0], [1.0]));
    }

    #[test]
    fn test_split_views_are_disjoint() {
        let mut store = PointStore::from_flat(&[0.0, 0.0, 1.0, 1.0, 2.0, 2.0]).unwrap();
        let (mut l, r) = store.as_slice_mut().split_at_mut(1);
        assert_eq!(l.len(), 1);
        assert_eq!(r.len(), 2);
        assert_eq!(r.point(0), &[1.0, 1.0]);
        l.swap(0, 0);
        assert_eq!(l.bounds(), BoundingBox::new([0.0, 0.0], [0.0, 0.0]));
    }
}
