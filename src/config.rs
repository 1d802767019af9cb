use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::analysis::peaks::ReductionPolicy;
use crate::analysis::refine::DEFAULT_HALF_WIDTH;
use crate::error::AnalysisError;

/// Number of points in the diagnostic spline sweep.
pub const DEFAULT_SWEEP_POINTS: usize = 1000;

// ---------------------------------------------------------------------------
// RunConfig – constants fixed for one pass over a stack
// ---------------------------------------------------------------------------

/// Per-run parameters, threaded explicitly through the pipeline.
///
/// Every field has a default, so a JSON file only needs the keys it changes:
///
/// ```json
/// { "calibration": 0.108, "unit": "um", "min_amplitude": 25.0 }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Physical units per pixel of displacement.
    pub calibration: f64,
    /// Label of the physical unit (column suffix in exports).
    pub unit: String,
    /// Prominence a maximum must exceed to count as a peak.
    pub min_amplitude: f64,
    /// Samples on each side of a seed peak in the refinement window.
    pub half_width: usize,
    /// Abort on the first slice with fewer than two peaks instead of skipping it.
    pub fail_fast: bool,
    /// Which candidates to discard when more than two peaks are found.
    pub reduction: ReductionPolicy,
    /// Points in the diagnostic spline sweep.
    pub sweep_points: usize,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            calibration: 1.0,
            unit: "px".to_string(),
            min_amplitude: 0.0,
            half_width: DEFAULT_HALF_WIDTH,
            fail_fast: false,
            reduction: ReductionPolicy::default(),
            sweep_points: DEFAULT_SWEEP_POINTS,
        }
    }
}

impl RunConfig {
    /// Load from a JSON file; missing keys keep their defaults.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config: RunConfig = serde_json::from_str(&text).context("parsing config JSON")?;
        config.validate()?;
        Ok(config)
    }

    /// Reject parameter combinations that cannot produce a measurement.
    pub fn validate(&self) -> std::result::Result<(), AnalysisError> {
        if !self.calibration.is_finite() || self.calibration <= 0.0 {
            return Err(AnalysisError::InvalidConfig(format!(
                "calibration must be positive and finite, got {}",
                self.calibration
            )));
        }
        if !self.min_amplitude.is_finite() || self.min_amplitude < 0.0 {
            return Err(AnalysisError::InvalidConfig(format!(
                "min_amplitude must be non-negative, got {}",
                self.min_amplitude
            )));
        }
        if self.half_width == 0 {
            return Err(AnalysisError::InvalidConfig(
                "half_width must be at least 1".to_string(),
            ));
        }
        if self.sweep_points < 2 {
            return Err(AnalysisError::InvalidConfig(format!(
                "sweep_points must be at least 2, got {}",
                self.sweep_points
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_reference_values() {
        let cfg = RunConfig::default();
        assert_eq!(cfg.half_width, 2);
        assert_eq!(cfg.reduction, ReductionPolicy::DropTallest);
        assert!(!cfg.fail_fast);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let cfg: RunConfig =
            serde_json::from_str(r#"{ "calibration": 0.25, "reduction": "keep_tallest" }"#)
                .unwrap();
        assert_eq!(cfg.calibration, 0.25);
        assert_eq!(cfg.reduction, ReductionPolicy::KeepTallest);
        assert_eq!(cfg.sweep_points, DEFAULT_SWEEP_POINTS);
    }

    #[test]
    fn rejects_bad_values() {
        let bad = [
            RunConfig {
                calibration: 0.0,
                ..Default::default()
            },
            RunConfig {
                calibration: f64::NAN,
                ..Default::default()
            },
            RunConfig {
                min_amplitude: -1.0,
                ..Default::default()
            },
            RunConfig {
                half_width: 0,
                ..Default::default()
            },
            RunConfig {
                sweep_points: 1,
                ..Default::default()
            },
        ];
        for cfg in bad {
            assert!(matches!(cfg.validate(), Err(AnalysisError::InvalidConfig(_))));
        }
    }

    #[test]
    fn loads_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.json");
        std::fs::write(&path, r#"{ "min_amplitude": 12.5, "fail_fast": true }"#).unwrap();
        let cfg = RunConfig::from_json_file(&path).unwrap();
        assert_eq!(cfg.min_amplitude, 12.5);
        assert!(cfg.fail_fast);

        std::fs::write(&path, r#"{ "half_width": 0 }"#).unwrap();
        assert!(RunConfig::from_json_file(&path).is_err());
    }
}
