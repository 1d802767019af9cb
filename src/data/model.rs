use serde::{Deserialize, Serialize};

use crate::error::{AnalysisError, Result};

// ---------------------------------------------------------------------------
// Profile – one validated intensity-vs-position signal
// ---------------------------------------------------------------------------

/// A 1-D intensity profile sampled at strictly increasing positions.
///
/// Construction validates the samples once, so every consumer downstream
/// (peak finder, spline, refiner) can index without re-checking.
#[derive(Debug, Clone, PartialEq)]
pub struct Profile {
    positions: Vec<f64>,
    intensities: Vec<f64>,
}

impl Profile {
    /// Build a profile from parallel position / intensity arrays.
    pub fn new(positions: Vec<f64>, intensities: Vec<f64>) -> Result<Self> {
        if positions.len() != intensities.len() {
            return Err(AnalysisError::DegenerateInput(format!(
                "{} positions but {} intensities",
                positions.len(),
                intensities.len()
            )));
        }
        if positions.len() < 2 {
            return Err(AnalysisError::DegenerateInput(format!(
                "need at least 2 samples, got {}",
                positions.len()
            )));
        }
        if let Some(i) = positions
            .iter()
            .chain(intensities.iter())
            .position(|v| !v.is_finite())
        {
            return Err(AnalysisError::DegenerateInput(format!(
                "non-finite value at flat index {i}"
            )));
        }
        if let Some(i) = positions.windows(2).position(|w| w[1] <= w[0]) {
            return Err(AnalysisError::DegenerateInput(format!(
                "positions not strictly increasing at index {}",
                i + 1
            )));
        }
        Ok(Profile {
            positions,
            intensities,
        })
    }

    /// Profile sampled at integer abscissas `0, 1, …, n-1`.
    pub fn from_intensities(intensities: Vec<f64>) -> Result<Self> {
        let positions = (0..intensities.len()).map(|i| i as f64).collect();
        Self::new(positions, intensities)
    }

    pub fn positions(&self) -> &[f64] {
        &self.positions
    }

    pub fn intensities(&self) -> &[f64] {
        &self.intensities
    }

    /// Number of samples.
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    /// Always false for a validated profile; kept for API symmetry.
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn first_position(&self) -> f64 {
        self.positions[0]
    }

    pub fn last_position(&self) -> f64 {
        self.positions[self.positions.len() - 1]
    }
}

// ---------------------------------------------------------------------------
// ProfileSlice / ProfileStack – raw host input, one entry per time step
// ---------------------------------------------------------------------------

/// One slice as read from disk, before validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileSlice {
    /// Position axis (x).
    pub x: Vec<f64>,
    /// Intensity axis (y) – same length as `x`.
    pub y: Vec<f64>,
    /// Acquisition time of this slice, if the source recorded one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<f64>,
}

impl ProfileSlice {
    /// Validate into a [`Profile`].
    pub fn to_profile(&self) -> Result<Profile> {
        Profile::new(self.x.clone(), self.y.clone())
    }
}

/// Ordered stack of slices (slice 1 first).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProfileStack {
    pub slices: Vec<ProfileSlice>,
}

impl ProfileStack {
    pub fn new(slices: Vec<ProfileSlice>) -> Self {
        ProfileStack { slices }
    }

    /// Number of slices.
    pub fn len(&self) -> usize {
        self.slices.len()
    }

    /// Whether the stack is empty.
    pub fn is_empty(&self) -> bool {
        self.slices.is_empty()
    }

    /// Per-slice time axis.
    ///
    /// Uses the recorded times when every slice has one, otherwise falls back
    /// to the 1-based slice index so the axis never mixes the two.
    pub fn timestamps(&self) -> Vec<f64> {
        self.recorded_times()
            .unwrap_or_else(|| (1..=self.slices.len()).map(|i| i as f64).collect())
    }

    /// Recorded times, only if every slice of a non-empty stack has one.
    pub fn recorded_times(&self) -> Option<Vec<f64>> {
        let times: Vec<f64> = self.slices.iter().map(|s| s.time).collect::<Option<_>>()?;
        (!times.is_empty()).then_some(times)
    }

    /// Validate slices lazily, in order; errors name the 1-based slice.
    pub fn iter_profiles(&self) -> impl Iterator<Item = Result<Profile>> + '_ {
        self.slices.iter().enumerate().map(|(i, s)| {
            s.to_profile().map_err(|e| match e {
                AnalysisError::DegenerateInput(msg) => {
                    AnalysisError::DegenerateInput(format!("slice {}: {msg}", i + 1))
                }
                other => other,
            })
        })
    }

    /// Validate every slice, failing on the first degenerate one.
    pub fn profiles(&self) -> Result<Vec<Profile>> {
        self.iter_profiles().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_unsorted_positions() {
        let err = Profile::new(vec![0.0, 2.0, 1.0], vec![1.0, 2.0, 3.0]).unwrap_err();
        assert!(matches!(err, AnalysisError::DegenerateInput(_)));
    }

    #[test]
    fn rejects_repeated_positions() {
        assert!(Profile::new(vec![0.0, 1.0, 1.0], vec![1.0, 2.0, 3.0]).is_err());
    }

    #[test]
    fn rejects_short_and_mismatched_input() {
        assert!(Profile::from_intensities(vec![1.0]).is_err());
        assert!(Profile::new(vec![0.0, 1.0], vec![1.0]).is_err());
        assert!(Profile::new(vec![0.0, 1.0], vec![1.0, f64::NAN]).is_err());
    }

    #[test]
    fn integer_abscissas() {
        let p = Profile::from_intensities(vec![3.0, 4.0, 5.0]).unwrap();
        assert_eq!(p.positions(), &[0.0, 1.0, 2.0]);
        assert_eq!(p.first_position(), 0.0);
        assert_eq!(p.last_position(), 2.0);
    }

    #[test]
    fn timestamps_fall_back_to_slice_index() {
        let slice = |time| ProfileSlice {
            x: vec![0.0, 1.0],
            y: vec![0.0, 1.0],
            time,
        };
        let stack = ProfileStack::new(vec![slice(Some(0.5)), slice(None), slice(Some(1.5))]);
        assert_eq!(stack.timestamps(), vec![1.0, 2.0, 3.0]);
        assert_eq!(stack.recorded_times(), None);

        let stack = ProfileStack::new(vec![slice(Some(0.5)), slice(Some(1.5))]);
        assert_eq!(stack.timestamps(), vec![0.5, 1.5]);
        assert_eq!(stack.recorded_times(), Some(vec![0.5, 1.5]));
        assert_eq!(ProfileStack::default().recorded_times(), None);
    }

    #[test]
    fn degenerate_slice_is_named() {
        let stack = ProfileStack::new(vec![ProfileSlice {
            x: vec![1.0, 0.0],
            y: vec![0.0, 1.0],
            time: None,
        }]);
        let msg = stack.profiles().unwrap_err().to_string();
        assert!(msg.contains("slice 1"));
    }
}
