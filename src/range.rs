use std::ops::{Add, AddAssign, BitOr, BitOrAssign, Mul};

/// A closed interval `[lo, hi]` on the real line.
///
/// Interval-valued accumulators are combined with `+` (interval addition) and `|`
/// (interval union). The empty interval is `[+inf, -inf]`, the identity of union.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Range {
    pub lo: f64,
    pub hi: f64,
}

impl Default for Range {
    fn default() -> Self {
        Self::zero()
    }
}

impl Range {
    pub fn new(lo: f64, hi: f64) -> Self {
        Self { lo, hi }
    }

    /// The degenerate interval `[v, v]`.
    pub fn point(v: f64) -> Self {
        Self { lo: v, hi: v }
    }

    pub fn zero() -> Self {
        Self::point(0.0)
    }

    pub fn empty() -> Self {
        Self {
            lo: f64::INFINITY,
            hi: f64::NEG_INFINITY,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.lo > self.hi
    }

    pub fn mid(&self) -> f64 {
        0.5 * (self.lo + self.hi)
    }

    pub fn width(&self) -> f64 {
        self.hi - self.lo
    }

    pub fn contains(&self, v: f64) -> bool {
        v >= self.lo && v <= self.hi
    }

    pub fn clamp(&self, lo: f64, hi: f64) -> Self {
        Self {
            lo: self.lo.clamp(lo, hi),
            hi: self.hi.clamp(lo, hi),
        }
    }

    /// Part of the interval at or below zero, as an interval.
    pub fn negative_part(&self) -> Self {
        Self {
            lo: self.lo.min(0.0),
            hi: self.hi.min(0.0),
        }
    }

    /// Part of the interval at or above zero, as an interval.
    pub fn positive_part(&self) -> Self {
        Self {
            lo: self.lo.max(0.0),
            hi: self.hi.max(0.0),
        }
    }

    /// Interval product.
    pub fn times(&self, other: &Self) -> Self {
        let candidates = [
            self.lo * other.lo,
            self.lo * other.hi,
            self.hi * other.lo,
            self.hi * other.hi,
        ];
        let mut out = Self::empty();
        for v in candidates {
            out.lo = out.lo.min(v);
            out.hi = out.hi.max(v);
        }
        out
    }

    /// Interval quotient by a strictly positive interval.
    ///
    /// A divisor touching zero yields the unbounded interval.
    pub fn div_positive(&self, divisor: &Self) -> Self {
        if divisor.lo <= 0.0 {
            return Self::new(f64::NEG_INFINITY, f64::INFINITY);
        }
        let lo = (self.lo / divisor.lo).min(self.lo / divisor.hi);
        let hi = (self.hi / divisor.lo).max(self.hi / divisor.hi);
        Self { lo, hi }
    }
}

impl Add for Range {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self {
            lo: self.lo + rhs.lo,
            hi: self.hi + rhs.hi,
        }
    }
}

impl AddAssign for Range {
    fn add_assign(&mut self, rhs: Self) {
        self.lo += rhs.lo;
        self.hi += rhs.hi;
    }
}

impl BitOr for Range {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self {
            lo: self.lo.min(rhs.lo),
            hi: self.hi.max(rhs.hi),
        }
    }
}

impl BitOrAssign for Range {
    fn bitor_assign(&mut self, rhs: Self) {
        *self = *self | rhs;
    }
}

impl Mul<f64> for Range {
    type Output = Self;

    /// Scales both endpoints. Negative factors swap them.
    fn mul(self, rhs: f64) -> Self {
        let a = self.lo * rhs;
        let b = self.hi * rhs;
        Self {
            lo: a.min(b),
            hi: a.max(b),
        }
    }
}
