use std::cmp::Ordering;
use std::ops::Index;

use serde::{Deserialize, Serialize};

use super::PercentileError;
use crate::algorithm::upper_bound;

const EDGE_TOLERANCE: f64 = 1e-9;

/// Equal-width bucket layout: bucket `i` covers `[start + i * width, start + (i + 1) * width)`.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct BucketGeometry {
    pub start: f64,
    pub width: f64,
}

impl BucketGeometry {
    /// Layout of the lichess rating distribution chart: 800, 825, ..., 2800.
    pub const LICHESS: BucketGeometry = BucketGeometry {
        start: 800.0,
        width: 25.0,
    };

    pub fn new(start: f64, width: f64) -> Result<Self, PercentileError> {
        if !start.is_finite() {
            return Err(PercentileError::InvalidGeometry(format!(
                "start edge must be finite, got {}",
                start
            )));
        }
        if !width.is_finite() || width <= 0.0 {
            return Err(PercentileError::InvalidGeometry(format!(
                "bucket width must be positive, got {}",
                width
            )));
        }

        Ok(Self { start, width })
    }

    /// Derives the layout from explicit lower edges. At least two edges are needed
    /// to infer the width, and every edge must sit on the same grid.
    pub fn from_edges(edges: &[f64]) -> Result<Self, PercentileError> {
        if edges.len() < 2 {
            return Err(PercentileError::InvalidGeometry(format!(
                "need at least 2 lower edges to infer a bucket width, got {}",
                edges.len()
            )));
        }

        let geometry = Self::new(edges[0], edges[1] - edges[0])?;

        for (i, edge) in edges.iter().enumerate() {
            let expected = geometry.edge(i);

            if !edge.is_finite()
                || (edge - expected).abs() > EDGE_TOLERANCE * expected.abs().max(1.0)
            {
                return Err(PercentileError::InvalidGeometry(format!(
                    "edge #{} is {}, expected {} for width {}",
                    i, edge, expected, geometry.width
                )));
            }
        }

        Ok(geometry)
    }

    pub fn edge(&self, index: usize) -> f64 {
        self.start + (index as f64) * self.width
    }
}

impl Default for BucketGeometry {
    fn default() -> Self {
        Self::LICHESS
    }
}

/// Immutable histogram snapshot: one count per bucket of `geometry`.
#[derive(Debug, Clone, PartialEq)]
pub struct Histogram {
    geometry: BucketGeometry,
    counts: Vec<u64>,
}

impl Histogram {
    pub fn new(geometry: BucketGeometry, counts: Vec<u64>) -> Self {
        Self { geometry, counts }
    }

    /// Builds a histogram from lower edges, one per count.
    pub fn from_edges(edges: &[f64], counts: Vec<u64>) -> Result<Self, PercentileError> {
        if edges.len() != counts.len() {
            return Err(PercentileError::InvalidGeometry(format!(
                "{} lower edges for {} buckets",
                edges.len(),
                counts.len()
            )));
        }

        Ok(Self::new(BucketGeometry::from_edges(edges)?, counts))
    }

    pub fn geometry(&self) -> &BucketGeometry {
        &self.geometry
    }

    pub fn counts(&self) -> &[u64] {
        &self.counts
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Number of observations, an error when it does not fit a `u64`.
    pub fn total(&self) -> Result<u64, PercentileError> {
        self.cumulative().map(|cumulative| cumulative.total())
    }

    pub fn edge(&self, index: usize) -> f64 {
        self.geometry.edge(index)
    }

    /// Upper edge of the last bucket.
    pub fn upper_edge(&self) -> f64 {
        self.geometry.edge(self.counts.len())
    }

    pub fn cumulative(&self) -> Result<CumulativeDistribution, PercentileError> {
        let mut running = Vec::with_capacity(self.counts.len());
        let mut sum = 0u64;

        for (bucket, count) in self.counts.iter().enumerate() {
            sum = sum
                .checked_add(*count)
                .ok_or(PercentileError::CountOverflow { bucket })?;
            running.push(sum);
        }

        Ok(CumulativeDistribution { running })
    }
}

/// Running sums of bucket counts, lowest bucket first.
#[derive(Debug, Clone, PartialEq)]
pub struct CumulativeDistribution {
    running: Vec<u64>,
}

impl CumulativeDistribution {
    pub fn total(&self) -> u64 {
        self.running.last().copied().unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.running.len()
    }

    pub fn is_empty(&self) -> bool {
        self.running.is_empty()
    }

    pub fn as_slice(&self) -> &[u64] {
        &self.running
    }

    /// Cumulative mass strictly below bucket `index`.
    pub fn below(&self, index: usize) -> u64 {
        match index {
            0 => 0,
            _ => self.running[index - 1],
        }
    }

    /// Smallest index whose running sum is strictly greater than `mass`.
    pub fn first_above(&self, mass: f64) -> Option<usize> {
        upper_bound(&self.running, &mass, |n: &f64, c: &u64| {
            n.partial_cmp(&(*c as f64)).unwrap_or(Ordering::Greater)
        })
    }
}

impl Index<usize> for CumulativeDistribution {
    type Output = u64;

    fn index(&self, index: usize) -> &u64 {
        &self.running[index]
    }
}
