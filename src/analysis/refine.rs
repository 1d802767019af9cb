use serde::{Deserialize, Serialize};

use super::peaks::PeakCandidate;
use super::spline::CubicSpline;
use crate::data::model::Profile;
use crate::error::{AnalysisError, Result};

/// Default refinement half-width, in samples on each side of the seed.
pub const DEFAULT_HALF_WIDTH: usize = 2;

/// A seed peak located to sub-sample precision.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RefinedPeak {
    pub seed_index: usize,
    pub subpixel_position: f64,
}

/// Locate the spline maximum near `candidate`.
///
/// Brackets `[index - half_width, index + half_width]` and solves for the zero
/// of the spline slope inside it. The window must lie inside the profile.
pub fn refine_peak(
    profile: &Profile,
    candidate: &PeakCandidate,
    spline: &CubicSpline,
    half_width: usize,
) -> Result<RefinedPeak> {
    let len = profile.len();
    let lo = candidate.index as isize - half_width as isize;
    let hi = candidate.index as isize + half_width as isize;
    if lo < 0 || hi >= len as isize {
        return Err(AnalysisError::WindowOutOfBounds { lo, hi, len });
    }

    let positions = profile.positions();
    let root = spline.derivative_root_between(positions[lo as usize], positions[hi as usize])?;
    Ok(RefinedPeak {
        seed_index: candidate.index,
        subpixel_position: root,
    })
}
