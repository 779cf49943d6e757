//! Alignment of two independently sampled series for X-Y plotting.

use std::ops::Range;

use super::region::{indices_of_region, Region};

/// Pairs whose timestamps deviate by more than this fraction of one sample
/// interval are not correlated.
pub const CORRELATION_TOLERANCE: f64 = 1e-3;

/// Aligned index ranges of an X series and a Y series.
pub type CorrelatedIndices = ((usize, usize), (usize, usize));

/// Find the index ranges of `x_ts` and `y_ts` inside `[start, end]`, if the two
/// series are correlated there: same number of samples, and timestamps that
/// match within [`CORRELATION_TOLERANCE`] of the sampling interval.
///
/// A count mismatch of exactly one is treated as an edge effect of floating
/// point rounding and corrected by dropping the boundary sample of the longer
/// series on whichever edge disagrees more.
pub fn get_correlated_indices(x_ts: &[f64], y_ts: &[f64], start: f64, end: f64) -> Option<CorrelatedIndices> {
    let (mut xt_lo, mut xt_hi) = indices_of_region(x_ts, (start, end))?;
    let (mut yt_lo, mut yt_hi) = indices_of_region(y_ts, (start, end))?;
    if xt_hi - xt_lo < 2 {
        return None;
    }

    let x_count = xt_hi - xt_lo;
    let y_count = yt_hi - yt_lo;
    if x_count == y_count + 1 || y_count == x_count + 1 {
        let lo_delta = (y_ts[yt_lo] - x_ts[xt_lo]).abs();
        let hi_delta = (y_ts[yt_hi - 1] - x_ts[xt_hi - 1]).abs();
        let (lo, hi) = if x_count > y_count {
            (&mut xt_lo, &mut xt_hi)
        } else {
            (&mut yt_lo, &mut yt_hi)
        };
        if lo_delta > hi_delta {
            *lo += 1;
        } else {
            *hi -= 1;
        }
    }
    if xt_hi - xt_lo != yt_hi - yt_lo || xt_hi - xt_lo < 2 {
        return None;
    }

    let xs = &x_ts[xt_lo..xt_hi];
    let ys = &y_ts[yt_lo..yt_hi];
    let interval = (xs[1] - xs[0]).min(ys[1] - ys[0]);
    let max_deviation = xs
        .iter()
        .zip(ys)
        .map(|(x, y)| (y - x).abs())
        .fold(0.0_f64, f64::max);
    if max_deviation > interval * CORRELATION_TOLERANCE {
        return None;
    }
    Some(((xt_lo, xt_hi), (yt_lo, yt_hi)))
}

/// Correlate over `region` truncated to the span both series cover.
pub fn correlate_in_region(x_ts: &[f64], y_ts: &[f64], region: Region) -> Option<CorrelatedIndices> {
    let (x_first, x_last) = (x_ts.first()?, x_ts.last()?);
    let (y_first, y_last) = (y_ts.first()?, y_ts.last()?);
    let (lo, hi) = region.bounds();
    let lo = lo.max(*x_first).max(*y_first);
    let hi = hi.min(*x_last).min(*y_last);
    if lo > hi {
        return None;
    }
    get_correlated_indices(x_ts, y_ts, lo, hi)
}

/// One piece of a faded X-Y curve.
#[derive(Debug, Clone, PartialEq)]
pub struct FadeSegment {
    pub x: Range<usize>,
    pub y: Range<usize>,
    /// 0 (oldest) to 255 (newest).
    pub alpha: u8,
}

/// Split an aligned X-Y range into up to `segments` pieces whose opacity ramps
/// up toward the newest samples. Consecutive pieces share one sample so the
/// drawn curve stays continuous.
pub fn fade_segments(indices: CorrelatedIndices, segments: usize) -> Vec<FadeSegment> {
    let ((xt_lo, xt_hi), (yt_lo, _)) = indices;
    let count = xt_hi - xt_lo;
    let segments = segments.min(count);
    if segments < 2 {
        return vec![FadeSegment {
            x: xt_lo..xt_hi,
            y: yt_lo..yt_lo + count,
            alpha: u8::MAX,
        }];
    }

    let mut out = Vec::with_capacity(segments);
    let mut last_end = xt_lo;
    for i in 0..segments {
        let frac = i as f64 / (segments - 1) as f64;
        let this_end = (frac * count as f64) as usize + xt_lo;
        if this_end > last_end {
            out.push(FadeSegment {
                x: last_end..this_end,
                y: last_end - xt_lo + yt_lo..this_end - xt_lo + yt_lo,
                alpha: (frac * 255.0) as u8,
            });
        }
        last_end = last_end.max(this_end.saturating_sub(1));
    }
    out
}
