//! Averaged time series
#[cfg(doc)]
use crate::prelude::{Cggtts, Rinex};

/// (epoch, value) rows produced by the averaging methods.
/// Epochs are expressed in seconds when produced from [Rinex]
/// and in fractional MJD when produced from [Cggtts].
/// Gaps are absent rows, never NaN.
pub type Series = Vec<(f64, f64)>;

/// Arithmetic, unweighted mean. None when there is nothing to average.
pub(crate) fn mean<I: Iterator<Item = f64>>(values: I) -> Option<f64> {
    let (sum, count) = values.fold((0.0_f64, 0_usize), |(sum, count), value| {
        (sum + value, count + 1)
    });
    if count > 0 {
        Some(sum / count as f64)
    } else {
        None
    }
}
