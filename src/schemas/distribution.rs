use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::PerfType;
use crate::algorithm::{BucketGeometry, Histogram};

/// Hour resolution used in document ids and chart dates.
pub const DATE_FORMAT: &str = "%d%m%y%H";

/// Raw histogram snapshot scraped for one perf type.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Distribution {
    pub perf_type: PerfType,
    pub date: DateTime<Utc>,
    pub distribution: Vec<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub percentiles: Option<PercentileRatings>,
}

/// Percentile label (integer percentage) to estimated rating.
pub type PercentileRatings = BTreeMap<String, f64>;

impl Distribution {
    pub fn new(perf_type: PerfType, date: DateTime<Utc>, distribution: Vec<u64>) -> Self {
        Self {
            perf_type,
            date,
            distribution,
            percentiles: None,
        }
    }

    /// One document per perf type and hour, a re-scrape inside the hour overwrites it.
    pub fn id(&self) -> String {
        format!("{}{}", self.perf_type, self.date.format(DATE_FORMAT))
    }

    pub fn histogram(&self, geometry: BucketGeometry) -> Histogram {
        Histogram::new(geometry, self.distribution.clone())
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct RatingPoint {
    pub date: String,
    pub rating: f64,
}

/// Evolution of one percentile over time.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct PercentileLine {
    pub percentile: f64,
    pub line: Vec<RatingPoint>,
}

/// Groups the stored percentiles of `distributions` into one date ordered line per
/// percentile, highest percentile first. Snapshots without percentiles are skipped.
pub fn timeline(distributions: &[Distribution]) -> Vec<PercentileLine> {
    let mut ordered = distributions.iter().collect::<Vec<_>>();
    ordered.sort_by_key(|distribution| distribution.date);

    let mut lines: BTreeMap<String, Vec<RatingPoint>> = BTreeMap::new();
    for distribution in ordered {
        let Some(percentiles) = distribution.percentiles.as_ref() else {
            continue;
        };

        for (label, rating) in percentiles {
            lines.entry(label.clone()).or_default().push(RatingPoint {
                date: distribution.date.format(DATE_FORMAT).to_string(),
                rating: *rating,
            });
        }
    }

    let mut result = lines
        .into_iter()
        .filter_map(|(label, line)| {
            Some(PercentileLine {
                percentile: label.parse::<f64>().ok()?,
                line,
            })
        })
        .collect::<Vec<_>>();
    result.sort_by(|l, r| r.percentile.total_cmp(&l.percentile));
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn snapshot(hour: u32, median: Option<f64>) -> Distribution {
        let mut distribution = Distribution::new(
            PerfType::Blitz,
            Utc.with_ymd_and_hms(2020, 4, 7, hour, 15, 0).unwrap(),
            vec![1, 2, 3],
        );
        distribution.percentiles = median.map(|median| {
            BTreeMap::from([("5".to_string(), median - 300.0), ("50".to_string(), median)])
        });
        distribution
    }

    #[test]
    fn test_id_uses_perf_type_and_hour() {
        assert_eq!(snapshot(9, None).id(), "blitz07042009");
    }

    #[test]
    fn test_percentiles_are_omitted_until_computed() {
        let json = serde_json::to_value(snapshot(9, None)).unwrap();

        assert!(json.get("percentiles").is_none());
        assert_eq!(json["perf_type"], "blitz");
        assert_eq!(json["distribution"], serde_json::json!([1, 2, 3]));
    }

    #[test]
    fn test_timeline_orders_dates_and_percentiles() {
        let lines = timeline(&[
            snapshot(12, Some(1510.0)),
            snapshot(10, Some(1500.0)),
            snapshot(11, None),
        ]);

        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].percentile, 50.0);
        assert_eq!(lines[1].percentile, 5.0);
        assert_eq!(
            lines[0].line,
            vec![
                RatingPoint {
                    date: "07042010".to_string(),
                    rating: 1500.0,
                },
                RatingPoint {
                    date: "07042012".to_string(),
                    rating: 1510.0,
                },
            ]
        );
    }
}
