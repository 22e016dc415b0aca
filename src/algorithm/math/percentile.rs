use std::error::Error;
use std::fmt;

use super::{CumulativeDistribution, Histogram};

#[derive(Debug, Clone, PartialEq)]
pub enum PercentileError {
    /// Requested fraction is not strictly inside (0, 1).
    InvalidPercentile(f64),

    /// Histogram holds no observation, nothing to normalize against.
    EmptyHistogram,

    /// Target mass is at or above the total count.
    OutOfRange { percentile: f64, mass: f64, total: u64 },

    /// Target mass falls inside a bucket without observations.
    DegenerateBucket { percentile: f64, bucket: usize },

    /// Bucket edges or widths cannot describe an equal-width histogram.
    InvalidGeometry(String),

    /// Running count no longer fits a `u64` once `bucket` is added.
    CountOverflow { bucket: usize },
}

impl fmt::Display for PercentileError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            PercentileError::InvalidPercentile(p) => {
                write!(f, "percentile {} is outside of (0, 1)", p)
            }
            PercentileError::EmptyHistogram => write!(f, "histogram has no observations"),
            PercentileError::OutOfRange {
                percentile,
                mass,
                total,
            } => write!(
                f,
                "percentile {} targets mass {} which is not below total {}",
                percentile, mass, total
            ),
            PercentileError::DegenerateBucket { percentile, bucket } => write!(
                f,
                "percentile {} falls inside empty bucket #{}",
                percentile, bucket
            ),
            PercentileError::InvalidGeometry(message) => {
                write!(f, "invalid bucket geometry: {}", message)
            }
            PercentileError::CountOverflow { bucket } => {
                write!(f, "bucket counts overflow at bucket #{}", bucket)
            }
        }
    }
}

impl Error for PercentileError {}

pub type Estimate = Result<f64, PercentileError>;

/// Estimates the rating below which each requested fraction of the population falls,
/// interpolating linearly inside the bucket that holds the fraction's cumulative mass.
///
/// Results come back in the order of `percentiles`, one per request. A bad request
/// only fails its own slot; the whole call fails only when the histogram is empty
/// or its counts add up past `u64::MAX`.
///
/// When the target mass lands exactly on a cumulative boundary the estimate is the
/// lower edge of the bucket above that boundary.
pub fn estimate(
    histogram: &Histogram,
    percentiles: &[f64],
) -> Result<Vec<Estimate>, PercentileError> {
    let cumulative = histogram.cumulative()?;
    let total = cumulative.total();

    if total == 0 {
        return Err(PercentileError::EmptyHistogram);
    }

    Ok(percentiles
        .iter()
        .map(|p| estimate_one(histogram, &cumulative, total, *p))
        .collect())
}

/// Same as [`estimate`] but pairs every result with its label, see [`percentile_label`].
pub fn estimate_labelled(
    histogram: &Histogram,
    percentiles: &[f64],
) -> Result<Vec<(String, Estimate)>, PercentileError> {
    Ok(percentiles
        .iter()
        .map(|p| percentile_label(*p))
        .zip(estimate(histogram, percentiles)?)
        .collect())
}

/// Field name a percentile is stored under: its integer percentage, `"50"` for 0.5.
/// Fractional percentages keep their decimals, `"12.5"` for 0.125.
pub fn percentile_label(percentile: f64) -> String {
    let percentage = percentile * 100.0;
    let rounded = percentage.round();

    if (percentage - rounded).abs() < 1e-9 {
        format!("{}", rounded as i64)
    } else {
        format!("{}", (percentage * 1e6).round() / 1e6)
    }
}

fn estimate_one(
    histogram: &Histogram,
    cumulative: &CumulativeDistribution,
    total: u64,
    percentile: f64,
) -> Estimate {
    if !(percentile > 0.0 && percentile < 1.0) {
        return Err(PercentileError::InvalidPercentile(percentile));
    }

    interpolate(histogram, cumulative, total as f64 * percentile, percentile)
}

fn interpolate(
    histogram: &Histogram,
    cumulative: &CumulativeDistribution,
    mass: f64,
    percentile: f64,
) -> Estimate {
    let bucket = cumulative
        .first_above(mass)
        .ok_or(PercentileError::OutOfRange {
            percentile,
            mass,
            total: cumulative.total(),
        })?;

    // @NOTE: the strict search never lands on an empty bucket as long as
    //        `cumulative` was computed from `histogram`
    let count = histogram.counts()[bucket];
    if count == 0 {
        return Err(PercentileError::DegenerateBucket { percentile, bucket });
    }

    let miss = mass - cumulative.below(bucket) as f64;
    let fraction_of_bucket = miss / count as f64;

    Ok(histogram.edge(bucket) + fraction_of_bucket * histogram.geometry().width)
}
