use crate::range::Range;

/// Axilrod-Teller triple-dipole potential.
///
/// For pair distances `r12`, `r13`, `r23` and interior angles `g1`, `g2`, `g3`:
///
/// ```text
/// V = strength * (1 + 3 cos(g1) cos(g2) cos(g3)) / (r12 r13 r23)^3
/// ```
///
/// Everything is evaluated on squared distances, with the cosines taken from the
/// law of cosines. The potential is symmetric in its three points.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AxilrodTeller {
    strength: f64,
}

impl Default for AxilrodTeller {
    fn default() -> Self {
        Self::new(1.0)
    }
}

impl AxilrodTeller {
    pub fn new(strength: f64) -> Self {
        Self { strength }
    }

    pub fn strength(&self) -> f64 {
        self.strength
    }

    /// Potential of a triple with squared distances `a = r12^2`, `b = r13^2`, `c = r23^2`.
    ///
    /// Triples with coincident points do not interact and evaluate to zero.
    pub fn eval_on_sq(&self, a: f64, b: f64, c: f64) -> f64 {
        let product = a * b * c;
        if product <= 0.0 {
            return 0.0;
        }
        let cos1 = (a + b - c) / (2.0 * (a * b).sqrt());
        let cos2 = (a + c - b) / (2.0 * (a * c).sqrt());
        let cos3 = (b + c - a) / (2.0 * (b * c).sqrt());
        self.strength * (1.0 + 3.0 * cos1 * cos2 * cos3) / (product * product.sqrt())
    }

    /// Bounds of the potential over all triples whose squared distances lie in the
    /// given ranges.
    ///
    /// Unbounded when any range reaches zero distance.
    pub fn range_on_sq(&self, a: Range, b: Range, c: Range) -> Range {
        if a.lo <= 0.0 || b.lo <= 0.0 || c.lo <= 0.0 {
            return Range::new(f64::NEG_INFINITY, f64::INFINITY);
        }
        let cos1 = cosine(a, b, c);
        let cos2 = cosine(a, c, b);
        let cos3 = cosine(b, c, a);
        let angular = cos1.times(&cos2).times(&cos3).clamp(-1.0, 0.125) * 3.0;
        let angular = Range::new(1.0 + angular.lo, 1.0 + angular.hi);

        let product_lo = a.lo * b.lo * c.lo;
        let product_hi = a.hi * b.hi * c.hi;
        let inverse = Range::new(
            1.0 / (product_hi * product_hi.sqrt()),
            1.0 / (product_lo * product_lo.sqrt()),
        );
        angular.times(&inverse) * self.strength
    }
}

/// Cosine of the angle between the sides with squared lengths `x` and `y`,
/// opposite the side with squared length `z`, clamped to `[-1, 1]`.
fn cosine(x: Range, y: Range, z: Range) -> Range {
    let numerator = Range::new(x.lo + y.lo - z.hi, x.hi + y.hi - z.lo);
    let denominator = Range::new(2.0 * (x.lo * y.lo).sqrt(), 2.0 * (x.hi * y.hi).sqrt());
    numerator.div_positive(&denominator).clamp(-1.0, 1.0)
}
