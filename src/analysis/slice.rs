use std::borrow::Borrow;

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use super::peaks::{select_peaks, PeakCandidate};
use super::refine::{refine_peak, RefinedPeak};
use super::series::SeriesAggregator;
use super::spline::CubicSpline;
use crate::config::RunConfig;
use crate::data::model::{Profile, ProfileStack};
use crate::error::{AnalysisError, Result};

// ---------------------------------------------------------------------------
// SliceStatus / SliceResult – the per-slice record
// ---------------------------------------------------------------------------

/// Terminal state of one slice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SliceStatus {
    Ok,
    InsufficientPeaks,
    WindowOutOfBounds,
}

impl SliceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SliceStatus::Ok => "OK",
            SliceStatus::InsufficientPeaks => "INSUFFICIENT_PEAKS",
            SliceStatus::WindowOutOfBounds => "WINDOW_OUT_OF_BOUNDS",
        }
    }
}

impl std::fmt::Display for SliceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

/// Distances measured on one slice. `None` marks a distance that could not
/// be measured; `status` says why.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SliceResult {
    /// 1-based position in the stack.
    pub slice_index: usize,
    pub raw_distance_pixels: Option<f64>,
    pub subpixel_distance_pixels: Option<f64>,
    pub raw_distance_physical: Option<f64>,
    pub subpixel_distance_physical: Option<f64>,
    pub status: SliceStatus,
}

impl SliceResult {
    fn new(
        slice_index: usize,
        raw_pixels: Option<f64>,
        subpixel_pixels: Option<f64>,
        calibration: f64,
        status: SliceStatus,
    ) -> Self {
        SliceResult {
            slice_index,
            raw_distance_pixels: raw_pixels,
            subpixel_distance_pixels: subpixel_pixels,
            raw_distance_physical: raw_pixels.map(|d| d * calibration),
            subpixel_distance_physical: subpixel_pixels.map(|d| d * calibration),
            status,
        }
    }
}

// ---------------------------------------------------------------------------
// SliceDiagnostics – plain coordinates for an external renderer
// ---------------------------------------------------------------------------

/// Intermediate values of one slice, ready to plot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SliceDiagnostics {
    pub slice_index: usize,
    /// Spline sweep abscissas (empty when no spline was built).
    pub spline_x: Vec<f64>,
    /// Spline sweep values.
    pub spline_y: Vec<f64>,
    /// `[position, amplitude]` of each selected seed peak.
    pub seed_markers: Vec<[f64; 2]>,
    /// `[sub-pixel position, spline value]` of each refined peak.
    pub refined_markers: Vec<[f64; 2]>,
}

/// Everything produced for one slice.
#[derive(Debug, Clone, PartialEq)]
pub struct SliceOutcome {
    pub result: SliceResult,
    pub seeds: Vec<PeakCandidate>,
    pub refined: Vec<RefinedPeak>,
    pub diagnostics: SliceDiagnostics,
}

// ---------------------------------------------------------------------------
// Per-slice pipeline
// ---------------------------------------------------------------------------

/// Select peaks, build the spline, refine both peaks and measure.
///
/// Peak-local failures end up in the returned status. Only a degenerate
/// profile, or a slice without two peaks under `fail_fast`, is an `Err`.
pub fn process_slice(
    slice_index: usize,
    profile: &Profile,
    config: &RunConfig,
) -> Result<SliceOutcome> {
    let seeds = select_peaks(profile, config.min_amplitude, config.reduction);
    let mut diagnostics = SliceDiagnostics {
        slice_index,
        seed_markers: seeds.iter().map(|s| [s.position, s.amplitude]).collect(),
        ..Default::default()
    };

    if seeds.len() < 2 {
        let err = AnalysisError::InsufficientPeaks {
            slice: slice_index,
            found: seeds.len(),
        };
        if config.fail_fast {
            return Err(err);
        }
        warn!("{err}; slice skipped");
        return Ok(SliceOutcome {
            result: SliceResult::new(
                slice_index,
                None,
                None,
                config.calibration,
                SliceStatus::InsufficientPeaks,
            ),
            seeds,
            refined: Vec::new(),
            diagnostics,
        });
    }

    let raw = (seeds[1].position - seeds[0].position).abs();

    let spline = CubicSpline::build(profile)?;
    let (spline_x, spline_y) = spline.sweep(config.sweep_points);
    diagnostics.spline_x = spline_x;
    diagnostics.spline_y = spline_y;

    // Any peak that cannot be refined marks the slice WINDOW_OUT_OF_BOUNDS;
    // the warning keeps the actual cause.
    let mut refined = Vec::with_capacity(2);
    let mut failed = false;
    for seed in &seeds {
        match refine_peak(profile, seed, &spline, config.half_width) {
            Ok(peak) => refined.push(peak),
            Err(err) if err.is_recoverable() => {
                warn!(
                    "slice {slice_index}: peak at index {} not refined: {err}",
                    seed.index
                );
                failed = true;
            }
            Err(err) => return Err(err),
        }
    }

    let last_intensity = profile.intensities()[profile.len() - 1];
    diagnostics.refined_markers = refined
        .iter()
        .map(|r| {
            let x = r.subpixel_position;
            [x, spline.evaluate(x).unwrap_or(last_intensity)]
        })
        .collect();

    let result = if failed {
        SliceResult::new(
            slice_index,
            Some(raw),
            None,
            config.calibration,
            SliceStatus::WindowOutOfBounds,
        )
    } else {
        let subpixel = (refined[1].subpixel_position - refined[0].subpixel_position).abs();
        debug!("slice {slice_index}: raw {raw:.3} px, sub-pixel {subpixel:.4} px");
        SliceResult::new(
            slice_index,
            Some(raw),
            Some(subpixel),
            config.calibration,
            SliceStatus::Ok,
        )
    };

    Ok(SliceOutcome {
        result,
        seeds,
        refined,
        diagnostics,
    })
}

// ---------------------------------------------------------------------------
// Whole-stack entry points
// ---------------------------------------------------------------------------

/// Process validated profiles in slice order, recording into `aggregator`.
///
/// Returns the diagnostics of every slice. Stops at the first fatal error;
/// slices already recorded stay in the aggregator.
pub fn run(
    profiles: &[Profile],
    config: &RunConfig,
    aggregator: &mut SeriesAggregator,
) -> Result<Vec<SliceDiagnostics>> {
    run_slices(profiles.iter().map(Ok), config, aggregator)
}

/// Like [`run`], validating each slice of a raw stack just before it is
/// processed. When every slice carries a time, those times replace the
/// aggregator's time axis; otherwise the aggregator keeps its own.
pub fn run_stack(
    stack: &ProfileStack,
    config: &RunConfig,
    aggregator: &mut SeriesAggregator,
) -> Result<Vec<SliceDiagnostics>> {
    if let Some(times) = stack.recorded_times() {
        aggregator.set_timestamps(times);
    }
    run_slices(stack.iter_profiles(), config, aggregator)
}

fn run_slices<I, P>(
    profiles: I,
    config: &RunConfig,
    aggregator: &mut SeriesAggregator,
) -> Result<Vec<SliceDiagnostics>>
where
    I: IntoIterator<Item = Result<P>>,
    P: Borrow<Profile>,
{
    config.validate()?;

    let mut diagnostics = Vec::new();
    for profile in profiles {
        let slice_index = aggregator.len() + 1;
        let profile = profile?;
        let outcome = process_slice(slice_index, profile.borrow(), config)?;
        aggregator.record(slice_index, outcome.result)?;
        diagnostics.push(outcome.diagnostics);
    }

    info!(
        "processed {} slice(s), {} measured",
        diagnostics.len(),
        aggregator.count_status(SliceStatus::Ok)
    );
    Ok(diagnostics)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn two_unit_peaks() -> Profile {
        Profile::from_intensities(vec![0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0]).unwrap()
    }

    fn gaussian_pair(centers: (f64, f64), n: usize) -> Profile {
        let g = |x: f64, mu: f64| 100.0 * (-(x - mu).powi(2) / (2.0 * 1.5f64.powi(2))).exp();
        Profile::from_intensities(
            (0..n)
                .map(|i| g(i as f64, centers.0) + g(i as f64, centers.1) + 5.0)
                .collect(),
        )
        .unwrap()
    }

    #[test]
    fn window_out_of_bounds_still_reports_raw_distance() {
        let cfg = RunConfig {
            calibration: 0.5,
            min_amplitude: 0.5,
            ..Default::default()
        };
        let outcome = process_slice(1, &two_unit_peaks(), &cfg).unwrap();
        let r = &outcome.result;
        assert_eq!(r.status, SliceStatus::WindowOutOfBounds);
        assert_eq!(r.raw_distance_pixels, Some(4.0));
        assert_eq!(r.raw_distance_physical, Some(2.0));
        assert_eq!(r.subpixel_distance_pixels, None);
        assert_eq!(r.subpixel_distance_physical, None);
        assert!(outcome.refined.is_empty());
        assert_eq!(outcome.diagnostics.seed_markers, vec![[1.0, 1.0], [5.0, 1.0]]);
    }

    #[test]
    fn shoulder_peak_without_slope_root_is_out_of_bounds() {
        // Both windows fit inside the profile, but the spline slope keeps its
        // sign across each of them: the seed at 4 sits on a rising shoulder
        // and the one at 12 inherits ringing from the drop after index 8.
        let y = vec![
            0.0, 1.0, 2.0, 3.0, 3.5, 3.45, 6.0, 9.0, 12.0, 0.0, 0.0, 0.0, 5.0, 0.0, 0.0, 0.0,
        ];
        let cfg = RunConfig {
            min_amplitude: 0.01,
            ..Default::default()
        };
        let outcome = process_slice(1, &Profile::from_intensities(y).unwrap(), &cfg).unwrap();
        assert_eq!(
            outcome.seeds.iter().map(|s| s.index).collect::<Vec<_>>(),
            vec![4, 12]
        );
        let r = &outcome.result;
        assert_eq!(r.status, SliceStatus::WindowOutOfBounds);
        assert_eq!(r.raw_distance_pixels, Some(8.0));
        assert_eq!(r.raw_distance_physical, Some(8.0));
        assert_eq!(r.subpixel_distance_pixels, None);
        assert_eq!(r.subpixel_distance_physical, None);
        assert!(outcome.refined.is_empty());
        assert!(outcome.diagnostics.refined_markers.is_empty());
        assert_eq!(outcome.diagnostics.spline_x.len(), cfg.sweep_points - 1);
    }

    #[test]
    fn measures_gaussian_pair() {
        let cfg = RunConfig {
            calibration: 0.2,
            min_amplitude: 10.0,
            ..Default::default()
        };
        let outcome = process_slice(3, &gaussian_pair((15.4, 27.1), 44), &cfg).unwrap();
        let r = &outcome.result;
        assert_eq!(r.status, SliceStatus::Ok);
        assert_eq!(r.slice_index, 3);
        assert_eq!(r.raw_distance_pixels, Some(12.0));
        let sub = r.subpixel_distance_pixels.unwrap();
        assert!((sub - 11.7).abs() < 0.1, "sub-pixel distance {sub}");
        assert_relative_eq!(r.subpixel_distance_physical.unwrap(), sub * 0.2);
        assert_eq!(outcome.refined.len(), 2);
        assert_eq!(outcome.diagnostics.refined_markers.len(), 2);
        assert_eq!(outcome.diagnostics.spline_x.len(), cfg.sweep_points - 1);
    }

    #[test]
    fn distances_scale_linearly_with_calibration() {
        let profile = gaussian_pair((10.2, 21.7), 32);
        let base = RunConfig {
            min_amplitude: 10.0,
            ..Default::default()
        };
        let scaled = RunConfig {
            calibration: 3.5,
            ..base.clone()
        };
        let a = process_slice(1, &profile, &base).unwrap().result;
        let b = process_slice(1, &profile, &scaled).unwrap().result;
        assert_eq!(a.raw_distance_pixels, b.raw_distance_pixels);
        assert_eq!(a.subpixel_distance_pixels, b.subpixel_distance_pixels);
        assert_relative_eq!(
            b.raw_distance_physical.unwrap(),
            3.5 * a.raw_distance_physical.unwrap()
        );
        assert_relative_eq!(
            b.subpixel_distance_physical.unwrap(),
            3.5 * a.subpixel_distance_physical.unwrap()
        );
    }

    #[test]
    fn insufficient_peaks_skips_or_fails_fast() {
        let single = Profile::from_intensities(vec![0.0, 1.0, 3.0, 1.0, 0.0]).unwrap();
        let mut cfg = RunConfig::default();

        let outcome = process_slice(2, &single, &cfg).unwrap();
        assert_eq!(outcome.result.status, SliceStatus::InsufficientPeaks);
        assert_eq!(outcome.result.raw_distance_pixels, None);
        assert!(outcome.diagnostics.spline_x.is_empty());

        cfg.fail_fast = true;
        assert_eq!(
            process_slice(2, &single, &cfg).unwrap_err(),
            AnalysisError::InsufficientPeaks { slice: 2, found: 1 }
        );
    }

    #[test]
    fn run_rejects_invalid_config() {
        let cfg = RunConfig {
            half_width: 0,
            ..Default::default()
        };
        let mut agg = SeriesAggregator::new();
        assert!(matches!(
            run(&[two_unit_peaks()], &cfg, &mut agg),
            Err(AnalysisError::InvalidConfig(_))
        ));
        assert!(agg.is_empty());
    }

    #[test]
    fn status_labels() {
        assert_eq!(SliceStatus::Ok.to_string(), "OK");
        assert_eq!(SliceStatus::WindowOutOfBounds.to_string(), "WINDOW_OUT_OF_BOUNDS");
        assert_eq!(
            serde_json::to_string(&SliceStatus::InsufficientPeaks).unwrap(),
            "\"INSUFFICIENT_PEAKS\""
        );
    }
}
