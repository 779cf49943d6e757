//! Region selection and the tolerant index search over timestamps.

/// Relative amount each region bound is widened by before searching, to absorb
/// floating point drift from upstream arithmetic such as timeshifts.
pub const ROUNDING_FACTOR: f64 = 2e-7;

/// The selected time interval shared by linked plots.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Region {
    #[default]
    Unbounded,
    Bounded { lo: f64, hi: f64 },
}

impl Region {
    /// Build a bounded region, swapping reversed bounds.
    pub fn bounded(a: f64, b: f64) -> Self {
        if a <= b {
            Region::Bounded { lo: a, hi: b }
        } else {
            Region::Bounded { lo: b, hi: a }
        }
    }

    pub fn from_option(region: Option<(f64, f64)>) -> Self {
        match region {
            Some((a, b)) => Region::bounded(a, b),
            None => Region::Unbounded,
        }
    }

    pub fn is_bounded(&self) -> bool {
        matches!(self, Region::Bounded { .. })
    }

    /// Bounds, with `Unbounded` as `(-inf, +inf)`.
    pub fn bounds(&self) -> (f64, f64) {
        match *self {
            Region::Unbounded => (f64::NEG_INFINITY, f64::INFINITY),
            Region::Bounded { lo, hi } => (lo, hi),
        }
    }

    pub fn as_option(&self) -> Option<(f64, f64)> {
        match *self {
            Region::Unbounded => None,
            Region::Bounded { lo, hi } => Some((lo, hi)),
        }
    }

    /// Half-open index range of `timestamps` inside this region.
    pub fn indices(&self, timestamps: &[f64]) -> Option<(usize, usize)> {
        match self {
            Region::Unbounded if timestamps.is_empty() => None,
            Region::Unbounded => Some((0, timestamps.len())),
            Region::Bounded { .. } => indices_of_region(timestamps, self.bounds()),
        }
    }

    /// Slice `values` by the range `timestamps` covers in this region.
    pub fn slice<'a, T>(&self, timestamps: &[f64], values: &'a [T]) -> &'a [T] {
        match self.indices(timestamps) {
            Some((lo, hi)) if hi <= values.len() => &values[lo..hi],
            _ => &values[..0],
        }
    }
}

/// Returns the half-open index range of an ascending `timestamps` array that
/// falls in the closed interval `region`, or `None` if no sample does.
///
/// Each bound is widened by [`ROUNDING_FACTOR`] of its magnitude, so a sample
/// that differs from a bound only by rounding error is still included.
pub fn indices_of_region(timestamps: &[f64], region: (f64, f64)) -> Option<(usize, usize)> {
    let (lo, hi) = region;
    let lo = lo - lo.abs() * ROUNDING_FACTOR;
    let hi = hi + hi.abs() * ROUNDING_FACTOR;
    let lo_index = timestamps.partition_point(|&t| t < lo);
    let hi_index = timestamps.partition_point(|&t| t <= hi);
    if lo_index >= hi_index {
        None
    } else {
        Some((lo_index, hi_index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    const TS: [f64; 5] = [0.0, 1.0, 2.0, 3.0, 4.0];

    #[test]
    fn region_inclusive_on_both_ends() {
        assert_eq!(indices_of_region(&TS, (1.0, 3.0)), Some((1, 4)));
        assert_eq!(indices_of_region(&TS, (0.5, 2.5)), Some((1, 3)));
        assert_eq!(indices_of_region(&TS, (-10.0, 10.0)), Some((0, 5)));
    }

    #[test]
    fn region_without_samples_is_none() {
        assert_eq!(indices_of_region(&TS, (1.2, 1.8)), None);
        assert_eq!(indices_of_region(&TS, (5.0, 6.0)), None);
        assert_eq!(indices_of_region(&[], (0.0, 1.0)), None);
    }

    #[test]
    fn rounding_drift_is_absorbed() {
        let ts = [0.1 + 0.2, 1.0, 1.0 + 1e-9];
        // 0.1 + 0.2 is slightly above 0.3
        assert_eq!(indices_of_region(&ts, (0.3, 0.3)), Some((0, 1)));
        // the upper bound widens by 2e-7 relative, covering 1e-9 of drift
        assert_eq!(indices_of_region(&ts, (0.5, 1.0)), Some((1, 3)));
        // but not more than the factor
        assert_eq!(indices_of_region(&[1.001], (0.5, 1.0)), None);
    }

    #[test]
    fn negative_bounds_widen_outward() {
        let ts = [-2.0 - 1e-9, -1.0];
        assert_eq!(indices_of_region(&ts, (-2.0, -1.5)), Some((0, 1)));
    }

    #[test]
    fn unbounded_and_reversed_regions() {
        assert_eq!(Region::Unbounded.indices(&TS), Some((0, 5)));
        assert_eq!(Region::Unbounded.indices(&[]), None);
        assert_eq!(Region::bounded(3.0, 1.0), Region::Bounded { lo: 1.0, hi: 3.0 });
        let values = [10, 11, 12, 13, 14];
        assert_eq!(Region::bounded(1.0, 2.0).slice(&TS, &values), &[11, 12]);
        assert!(Region::bounded(8.0, 9.0).slice(&TS, &values).is_empty());
    }

    #[test]
    fn agrees_with_linear_scan_on_generated_series() {
        let mut rng = StdRng::seed_from_u64(0x5c09e);
        for _ in 0..2_000 {
            let n = rng.gen_range(0..40);
            let mut t: f64 = rng.gen_range(-50.0..50.0);
            let mut ts = Vec::with_capacity(n);
            for _ in 0..n {
                ts.push(t);
                // occasional repeated timestamps
                if !rng.gen_bool(0.1) {
                    t += rng.gen_range(0.01..5.0);
                }
            }
            let (mut lo, mut hi): (f64, f64) = (rng.gen_range(-60.0..150.0), rng.gen_range(-60.0..150.0));
            if lo > hi {
                std::mem::swap(&mut lo, &mut hi);
            }
            if n > 0 && rng.gen_bool(0.3) {
                // bounds sitting exactly on samples
                let i = rng.gen_range(0..n);
                let j = rng.gen_range(i..n);
                (lo, hi) = (ts[i], ts[j]);
            }

            let wide_lo = lo - lo.abs() * ROUNDING_FACTOR;
            let wide_hi = hi + hi.abs() * ROUNDING_FACTOR;
            let inside: Vec<usize> = (0..n).filter(|&i| ts[i] >= wide_lo && ts[i] <= wide_hi).collect();
            let expected = match (inside.first(), inside.last()) {
                (Some(&first), Some(&last)) => Some((first, last + 1)),
                _ => None,
            };
            assert_eq!(
                indices_of_region(&ts, (lo, hi)),
                expected,
                "ts={ts:?} region=({lo}, {hi})"
            );
            if let Some((first, end)) = expected {
                assert_eq!(end - first, inside.len());
            }
        }
    }
}
