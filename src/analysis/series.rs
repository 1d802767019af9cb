use log::warn;
use serde::Serialize;

use super::slice::{SliceResult, SliceStatus};
use crate::error::{AnalysisError, Result};

// ---------------------------------------------------------------------------
// SeriesAggregator – ordered accumulation of per-slice results
// ---------------------------------------------------------------------------

/// Collects slice results in stack order. Owned by whoever drives the run.
#[derive(Debug, Clone, Default)]
pub struct SeriesAggregator {
    timestamps: Option<Vec<f64>>,
    results: Vec<SliceResult>,
}

impl SeriesAggregator {
    /// Aggregator that uses the slice index as its time axis.
    pub fn new() -> Self {
        Self::default()
    }

    /// Aggregator labelled with per-slice acquisition times.
    ///
    /// The times must cover every slice that ends up recorded; a shorter list
    /// is discarded at [`finalize`](Self::finalize) in favour of the index axis.
    pub fn with_timestamps(timestamps: Vec<f64>) -> Self {
        SeriesAggregator {
            timestamps: Some(timestamps),
            results: Vec::new(),
        }
    }

    pub fn set_timestamps(&mut self, timestamps: Vec<f64>) {
        self.timestamps = Some(timestamps);
    }

    /// Number of slices recorded so far.
    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// Append the result of slice `slice_index` (1-based).
    ///
    /// Slices must arrive contiguously: the next accepted index is always
    /// `len() + 1`.
    pub fn record(&mut self, slice_index: usize, result: SliceResult) -> Result<()> {
        let expected = self.results.len() + 1;
        if slice_index != expected || result.slice_index != expected {
            return Err(AnalysisError::OutOfOrderSlice {
                expected,
                got: slice_index,
            });
        }
        self.results.push(result);
        Ok(())
    }

    pub fn results(&self) -> &[SliceResult] {
        &self.results
    }

    pub fn count_status(&self, status: SliceStatus) -> usize {
        self.results.iter().filter(|r| r.status == status).count()
    }

    /// Aligned series, one entry per recorded slice.
    ///
    /// A run aborted part-way uses the leading times. If fewer times than
    /// slices were supplied, the whole series falls back to the 1-based slice
    /// index so the axis never mixes the two.
    pub fn finalize(self) -> DistanceSeries {
        let n = self.results.len();
        let timestamps = match self.timestamps {
            Some(mut times) if times.len() >= n => {
                times.truncate(n);
                times
            }
            Some(times) => {
                warn!(
                    "{} timestamp(s) for {n} slice(s); labelling the series by slice index",
                    times.len()
                );
                index_axis(n)
            }
            None => index_axis(n),
        };
        DistanceSeries {
            timestamps,
            raw_distances: self.results.iter().map(|r| r.raw_distance_physical).collect(),
            subpixel_distances: self
                .results
                .iter()
                .map(|r| r.subpixel_distance_physical)
                .collect(),
            statuses: self.results.iter().map(|r| r.status).collect(),
            results: self.results,
        }
    }
}

fn index_axis(n: usize) -> Vec<f64> {
    (1..=n).map(|i| i as f64).collect()
}

// ---------------------------------------------------------------------------
// DistanceSeries – finished time series
// ---------------------------------------------------------------------------

/// Four aligned sequences indexed by slice order, plus the full records.
///
/// Distances are in physical units; `None` marks a slice where the distance
/// could not be measured.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DistanceSeries {
    pub timestamps: Vec<f64>,
    pub raw_distances: Vec<Option<f64>>,
    pub subpixel_distances: Vec<Option<f64>>,
    pub statuses: Vec<SliceStatus>,
    pub results: Vec<SliceResult>,
}

/// Counts per status and spread of the measured sub-pixel distance.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesSummary {
    pub slices: usize,
    pub ok: usize,
    pub insufficient_peaks: usize,
    pub window_out_of_bounds: usize,
    pub mean_subpixel: Option<f64>,
    pub std_subpixel: Option<f64>,
}

impl DistanceSeries {
    pub fn len(&self) -> usize {
        self.statuses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.statuses.is_empty()
    }

    pub fn summary(&self) -> SeriesSummary {
        let count = |s: SliceStatus| self.statuses.iter().filter(|&&x| x == s).count();
        let measured: Vec<f64> = self.subpixel_distances.iter().flatten().copied().collect();

        let (mean, std) = if measured.is_empty() {
            (None, None)
        } else {
            let n = measured.len() as f64;
            let mean = measured.iter().sum::<f64>() / n;
            let var = measured.iter().map(|d| (d - mean).powi(2)).sum::<f64>() / n;
            (Some(mean), Some(var.sqrt()))
        };

        SeriesSummary {
            slices: self.len(),
            ok: count(SliceStatus::Ok),
            insufficient_peaks: count(SliceStatus::InsufficientPeaks),
            window_out_of_bounds: count(SliceStatus::WindowOutOfBounds),
            mean_subpixel: mean,
            std_subpixel: std,
        }
    }
}
