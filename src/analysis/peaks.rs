use log::debug;
use serde::{Deserialize, Serialize};

use crate::data::model::Profile;

// ---------------------------------------------------------------------------
// PeakCandidate – one detected local maximum
// ---------------------------------------------------------------------------

/// A local maximum that cleared the prominence threshold.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PeakCandidate {
    /// Sample index into the profile.
    pub index: usize,
    /// Position of that sample.
    pub position: f64,
    /// Intensity at that sample.
    pub amplitude: f64,
    /// Height above the higher of the two bases.
    pub prominence: f64,
}

/// How to cut a candidate list down to two peaks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReductionPolicy {
    /// Repeatedly drop the tallest remaining candidate. This is the
    /// historical behaviour of the measurement and the default.
    #[default]
    DropTallest,
    /// Repeatedly drop the shortest remaining candidate, keeping the two
    /// strongest peaks.
    KeepTallest,
}

// ---------------------------------------------------------------------------
// Maximum finder with noise tolerance
// ---------------------------------------------------------------------------

/// `(index, prominence)` of every interior local maximum whose prominence
/// exceeds `min_amplitude`, by ascending index.
///
/// A flat-topped maximum is reported at the middle of its plateau. Maxima on
/// the first or last sample are not reported.
pub fn find_maxima(values: &[f64], min_amplitude: f64) -> Vec<(usize, f64)> {
    local_maxima(values)
        .into_iter()
        .map(|idx| (idx, prominence(values, idx)))
        .filter(|&(_, prom)| prom > min_amplitude)
        .collect()
}

fn local_maxima(values: &[f64]) -> Vec<usize> {
    let n = values.len();
    let mut out = Vec::new();
    if n < 3 {
        return out;
    }
    let mut i = 1;
    while i < n - 1 {
        if values[i] > values[i - 1] {
            let mut plateau_end = i;
            while plateau_end + 1 < n && values[plateau_end + 1] == values[i] {
                plateau_end += 1;
            }
            if plateau_end + 1 < n && values[plateau_end + 1] < values[i] {
                out.push((i + plateau_end) / 2);
            }
            i = plateau_end + 1;
        } else {
            i += 1;
        }
    }
    out
}

/// Walk outwards until a strictly taller sample (or the edge); the base on
/// each side is the lowest point passed, and the peak's reference level is
/// the higher of the two bases.
fn prominence(values: &[f64], peak: usize) -> f64 {
    let top = values[peak];

    let mut left_min = top;
    for &v in values[..peak].iter().rev() {
        if v > top {
            break;
        }
        left_min = left_min.min(v);
    }

    let mut right_min = top;
    for &v in &values[peak + 1..] {
        if v > top {
            break;
        }
        right_min = right_min.min(v);
    }

    top - left_min.max(right_min)
}

// ---------------------------------------------------------------------------
// Two-peak selection
// ---------------------------------------------------------------------------

/// Detect peaks in a profile and reduce them to at most two.
///
/// Returns candidates ordered by index. When fewer than two peaks are found
/// the short list is returned unchanged; the caller decides how to report it.
pub fn select_peaks(
    profile: &Profile,
    min_amplitude: f64,
    policy: ReductionPolicy,
) -> Vec<PeakCandidate> {
    let positions = profile.positions();
    let intensities = profile.intensities();

    let candidates: Vec<PeakCandidate> = find_maxima(intensities, min_amplitude)
        .into_iter()
        .map(|(index, prominence)| PeakCandidate {
            index,
            position: positions[index],
            amplitude: intensities[index],
            prominence,
        })
        .collect();

    debug!(
        "{} maxima above amplitude {min_amplitude}: {:?}",
        candidates.len(),
        candidates.iter().map(|c| c.index).collect::<Vec<_>>()
    );

    reduce_to_two(candidates, policy)
}

/// Remove candidates one at a time until two remain.
///
/// Ties go to the lowest index.
pub fn reduce_to_two(
    mut candidates: Vec<PeakCandidate>,
    policy: ReductionPolicy,
) -> Vec<PeakCandidate> {
    while candidates.len() > 2 {
        let mut victim = 0;
        for (i, c) in candidates.iter().enumerate().skip(1) {
            let better = match policy {
                ReductionPolicy::DropTallest => c.amplitude > candidates[victim].amplitude,
                ReductionPolicy::KeepTallest => c.amplitude < candidates[victim].amplitude,
            };
            if better {
                victim = i;
            }
        }
        let removed = candidates.remove(victim);
        debug!(
            "dropping peak at index {} (amplitude {})",
            removed.index, removed.amplitude
        );
    }
    candidates
}

#[cfg(test)]
mod tests {
    use super::*;

    fn indices(c: &[PeakCandidate]) -> Vec<usize> {
        c.iter().map(|p| p.index).collect()
    }

    #[test]
    fn two_unit_peaks() {
        let p = Profile::from_intensities(vec![0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0]).unwrap();
        let peaks = select_peaks(&p, 0.5, ReductionPolicy::DropTallest);
        assert_eq!(indices(&peaks), vec![1, 5]);
        assert_eq!(peaks[0].amplitude, 1.0);
        assert_eq!(peaks[1].position, 5.0);
    }

    #[test]
    fn noise_below_threshold_is_ignored() {
        // Small ripple at index 3 has prominence 0.1.
        let y = vec![0.0, 2.0, 0.5, 0.6, 0.5, 3.0, 0.0];
        let kept: Vec<usize> = find_maxima(&y, 0.2).iter().map(|m| m.0).collect();
        assert_eq!(kept, vec![1, 5]);
        assert_eq!(find_maxima(&y, 0.05).len(), 3);
    }

    #[test]
    fn prominence_is_measured_from_the_higher_base() {
        // Peak at 3 is separated from the taller one at 5 by a saddle at 4.
        let y = vec![0.0, 0.5, 1.0, 2.0, 1.5, 4.0, 0.0];
        let maxima = find_maxima(&y, 0.0);
        assert_eq!(maxima.len(), 2);
        assert_eq!(maxima[0], (3, 0.5));
        assert_eq!(maxima[1], (5, 4.0));
    }

    #[test]
    fn plateau_reports_middle_sample() {
        let y = vec![0.0, 1.0, 1.0, 1.0, 0.0];
        assert_eq!(find_maxima(&y, 0.5), vec![(2, 1.0)]);
    }

    #[test]
    fn edges_are_not_maxima() {
        let y = vec![5.0, 1.0, 0.0, 1.0, 6.0];
        assert!(find_maxima(&y, 0.0).is_empty());
    }

    #[test]
    fn drop_tallest_keeps_the_two_shortest() {
        let y = vec![0.0, 3.0, 0.0, 5.0, 0.0, 2.0, 0.0, 4.0, 0.0];
        let p = Profile::from_intensities(y).unwrap();
        let peaks = select_peaks(&p, 0.5, ReductionPolicy::DropTallest);
        assert_eq!(indices(&peaks), vec![1, 5]);
    }

    #[test]
    fn keep_tallest_keeps_the_two_strongest() {
        let y = vec![0.0, 3.0, 0.0, 5.0, 0.0, 2.0, 0.0, 4.0, 0.0];
        let p = Profile::from_intensities(y).unwrap();
        let peaks = select_peaks(&p, 0.5, ReductionPolicy::KeepTallest);
        assert_eq!(indices(&peaks), vec![3, 7]);
    }

    #[test]
    fn never_more_than_two() {
        let y: Vec<f64> = (0..60)
            .map(|i| (i as f64 * 0.9).sin() * (1.0 + i as f64 * 0.01))
            .collect();
        let p = Profile::from_intensities(y).unwrap();
        assert!(find_maxima(p.intensities(), 0.1).len() > 2);
        for policy in [ReductionPolicy::DropTallest, ReductionPolicy::KeepTallest] {
            let peaks = select_peaks(&p, 0.1, policy);
            assert_eq!(peaks.len(), 2);
            assert!(peaks[0].index < peaks[1].index);
        }
    }

    #[test]
    fn short_list_returned_unchanged() {
        let p = Profile::from_intensities(vec![0.0, 1.0, 2.0, 1.0, 0.0]).unwrap();
        let peaks = select_peaks(&p, 0.5, ReductionPolicy::DropTallest);
        assert_eq!(indices(&peaks), vec![2]);

        let flat = Profile::from_intensities(vec![1.0; 5]).unwrap();
        assert!(select_peaks(&flat, 0.0, ReductionPolicy::DropTallest).is_empty());
    }

    #[test]
    fn policy_serializes_as_snake_case() {
        let json = serde_json::to_string(&ReductionPolicy::KeepTallest).unwrap();
        assert_eq!(json, "\"keep_tallest\"");
    }
}
