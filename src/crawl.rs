use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use log::{error, info, warn};

use crate::actors::lichess::DistributionSource;
use crate::algorithm::{estimate_labelled, BucketGeometry};
use crate::entities::Distributions;
use crate::schemas::{Distribution, PercentileRatings, PerfType};

#[derive(Debug, Default, Clone, PartialEq)]
pub struct ScrapeReport {
    /// Ids of the snapshots stored during the run.
    pub saved: Vec<String>,
    pub failed: Vec<(PerfType, String)>,
}

/// Scrapes every perf type one after the other and stores each snapshot dated `now`.
/// A failing perf type is reported and does not stop the others.
pub async fn scrape_distributions<S>(
    source: &S,
    distributions: &Distributions,
    perf_types: &[PerfType],
    now: DateTime<Utc>,
) -> ScrapeReport
where
    S: DistributionSource + ?Sized,
{
    let mut report = ScrapeReport::default();

    for perf_type in perf_types {
        let result = match source.fetch(*perf_type).await {
            Ok(counts) => distributions
                .save(&Distribution::new(*perf_type, now, counts))
                .await
                .map_err(|error| error.to_string()),
            Err(error) => Err(error.to_string()),
        };

        match result {
            Ok(id) => {
                info!("Stored distribution {}", id);
                report.saved.push(id);
            }
            Err(message) => {
                error!("Fail to scrape {}: {}", perf_type, message);
                report.failed.push((*perf_type, message));
            }
        }
    }

    report
}

/// Estimates `percentiles` for the stored snapshot `id` and attaches them to it.
/// Percentiles that cannot be estimated are left out of the stored ratings.
pub async fn add_percentiles(
    distributions: &Distributions,
    id: &str,
    geometry: BucketGeometry,
    percentiles: &[f64],
) -> Result<PercentileRatings> {
    let distribution = distributions
        .get(id)
        .await?
        .ok_or_else(|| anyhow!("distribution {} not found", id))?;

    let estimates = estimate_labelled(&distribution.histogram(geometry), percentiles)
        .with_context(|| format!("Fail to estimate percentiles of {}", id))?;

    let mut ratings = PercentileRatings::new();
    for (label, estimate) in estimates {
        match estimate {
            Ok(rating) => {
                ratings.insert(label, rating);
            }
            Err(error) => warn!("Skip percentile {} of {}: {}", label, id, error),
        }
    }

    distributions
        .save_percentiles(id, &ratings)
        .await
        .with_context(|| format!("Fail to store percentiles of {}", id))?;
    Ok(ratings)
}

/// Runs [`add_percentiles`] over stored snapshots, only those still without
/// percentiles when `only_missing` is set. Returns how many were updated.
pub async fn add_all_percentiles(
    distributions: &Distributions,
    geometry: BucketGeometry,
    percentiles: &[f64],
    only_missing: bool,
) -> Result<usize> {
    let mut updated = 0;

    for (id, distribution) in distributions.list().await? {
        if only_missing && distribution.percentiles.is_some() {
            continue;
        }

        match add_percentiles(distributions, &id, geometry, percentiles).await {
            Ok(_) => updated += 1,
            Err(error) => error!("{:#}", error),
        }
    }

    Ok(updated)
}

/// Runs [`add_percentiles`] on each of `ids`. A snapshot that fails is logged and
/// the others still get their percentiles. Returns how many were updated.
pub async fn add_percentiles_for(
    distributions: &Distributions,
    ids: &[String],
    geometry: BucketGeometry,
    percentiles: &[f64],
) -> usize {
    let mut updated = 0;

    for id in ids {
        match add_percentiles(distributions, id, geometry, percentiles).await {
            Ok(_) => updated += 1,
            Err(error) => error!("{:#}", error),
        }
    }

    updated
}

/// One scheduled round: scrape, then attach percentiles to the fresh snapshots.
pub async fn scrape_and_compute<S>(
    source: &S,
    distributions: &Distributions,
    perf_types: &[PerfType],
    geometry: BucketGeometry,
    percentiles: &[f64],
) -> ScrapeReport
where
    S: DistributionSource + ?Sized,
{
    let report = scrape_distributions(source, distributions, perf_types, Utc::now()).await;

    add_percentiles_for(distributions, &report.saved, geometry, percentiles).await;

    info!(
        "Scrape finished: {} stored, {} failed",
        report.saved.len(),
        report.failed.len()
    );
    report
}
