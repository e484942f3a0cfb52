use crate::bounds::BoundingBox;
use crate::error::{Error, Result};
use rand::prelude::*;
use rand::rngs::StdRng;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::debug;

/// Reads one point per line. Coordinates are separated by whitespace or commas;
/// blank lines and lines starting with `#` are skipped.
pub fn import_points<const D: usize, R: BufRead>(reader: R) -> Result<Vec<[f64; D]>> {
    let mut points = Vec::new();
    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let values = line
            .split(|c: char| c.is_whitespace() || c == ',')
            .filter(|t| !t.is_empty())
            .map(|t| {
                t.parse::<f64>().map_err(|e| Error::Parse {
                    line: index + 1,
                    message: format!("`{}`: {}", t, e),
                })
            })
            .collect::<Result<Vec<f64>>>()?;
        let point: [f64; D] = values
            .as_slice()
            .try_into()
            .map_err(|_| Error::DimensionMismatch {
                expected: D,
                found: values.len(),
            })?;
        points.push(point);
    }
    if points.is_empty() {
        return Err(Error::EmptyDataset);
    }
    debug!(points = points.len(), dim = D, "dataset imported");
    Ok(points)
}

pub fn import_points_from_path<const D: usize>(path: impl AsRef<Path>) -> Result<Vec<[f64; D]>> {
    let file = File::open(path)?;
    import_points(BufReader::new(file))
}

/// `count` points drawn uniformly from `bounds`.
pub fn random_points<const D: usize>(count: usize, bounds: &BoundingBox<D>, seed: u64) -> Vec<[f64; D]> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..count)
        .map(|_| std::array::from_fn(|d| bounds.min[d] + rng.r#gen::<f64>() * bounds.width(d)))
        .collect()
}

/// Maps both sets into the unit hypercube with one shared affine map per dimension.
///
/// Dimensions where every coordinate is equal map to zero.
pub fn scale_by_min_max<const D: usize>(queries: &mut [[f64; D]], references: &mut [[f64; D]]) {
    let mut bounds = BoundingBox::<D>::from_points(queries);
    bounds.merge(&BoundingBox::from_points(references));
    if bounds.is_empty() {
        return;
    }
    for point in queries.iter_mut().chain(references.iter_mut()) {
        for d in 0..D {
            let width = bounds.width(d);
            point[d] = if width > 0.0 { (point[d] - bounds.min[d]) / width } else { 0.0 };
        }
    }
}

/// Seed for [`random_points`]: random in the browser, fixed elsewhere so runs repeat.
pub fn seed() -> u64 {
    #[cfg(target_arch = "wasm32")]
    {
        (js_sys::Math::random() * 4294967296.0) as u64
    }
    #[cfg(not(target_arch = "wasm32"))]
    {
        123456789
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_import_mixed_separators() {
        let text = "# x y\n0.5 1.0\n\n2,3\n  -1.5 ,\t4e-1  \n";
        let points: Vec<[f64; 2]> = import_points(Cursor::new(text)).unwrap();
        assert_eq!(points, vec![[0.5, 1.0], [2.0, 3.0], [-1.5, 0.4]]);
    }

    #[test]
    fn test_import_errors() {
        let bad = import_points::<2, _>(Cursor::new("1 2\n3 x\n"));
        assert!(matches!(bad, Err(Error::Parse { line: 2, .. })));

        let short = import_points::<3, _>(Cursor::new("1 2 3\n4 5\n"));
        assert!(matches!(short, Err(Error::DimensionMismatch { expected: 3, found: 2 })));

        let empty = import_points::<2, _>(Cursor::new("# nothing\n"));
        assert!(matches!(empty, Err(Error::EmptyDataset)));
    }

    #[test]
    fn test_random_points_in_bounds_and_repeatable() {
        let bounds = BoundingBox::new([-1.0, 2.0, 0.0], [1.0, 3.0, 10.0]);
        let a = random_points(200, &bounds, seed());
        let b = random_points(200, &bounds, seed());
        assert_eq!(a, b);
        assert!(a.iter().all(|p| bounds.contains(p)));
    }

    #[test]
    fn test_scale_by_min_max() {
        let mut queries = vec![[0.0, 5.0], [2.0, 5.0]];
        let mut references = vec![[4.0, 5.0]];
        scale_by_min_max(&mut queries, &mut references);
        assert_eq!(queries, vec![[0.0, 0.0], [0.5, 0.0]]);
        assert_eq!(references, vec![[1.0, 0.0]]);
    }
}
