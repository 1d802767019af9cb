use thiserror::Error;

// ---------------------------------------------------------------------------
// AnalysisError – every failure the numerical pipeline can report
// ---------------------------------------------------------------------------

/// Errors raised by the profile → spline → peak → distance pipeline.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AnalysisError {
    /// The profile cannot support an interpolant (too short, unsorted, NaN…).
    #[error("degenerate profile: {0}")]
    DegenerateInput(String),

    /// Spline evaluated outside its half-open domain `[min, max)`.
    #[error("x = {x} is outside the spline domain [{min}, {max})")]
    OutOfDomain { x: f64, min: f64, max: f64 },

    /// The spline derivative has the same sign at both bracket ends.
    #[error("derivative does not change sign in [{lo}, {hi}]")]
    NoRootInBracket { lo: f64, hi: f64 },

    /// The bisection hit its iteration cap before reaching tolerance.
    #[error("root search in [{lo}, {hi}] did not converge after {iterations} iterations")]
    RootNotConverged { lo: f64, hi: f64, iterations: usize },

    /// The refinement window around a seed peak leaves the profile.
    #[error("refinement window [{lo}, {hi}] exceeds profile indices 0..{len}")]
    WindowOutOfBounds { lo: isize, hi: isize, len: usize },

    /// Run parameters that cannot produce a meaningful measurement.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// A slice result arrived out of sequence.
    #[error("slice {got} recorded out of order, expected slice {expected}")]
    OutOfOrderSlice { expected: usize, got: usize },

    /// Fewer than two peaks survived detection.
    #[error("slice {slice}: found {found} peak(s), need 2")]
    InsufficientPeaks { slice: usize, found: usize },
}

impl AnalysisError {
    /// Whether processing may continue with the next slice.
    ///
    /// `InsufficientPeaks` counts as recoverable here; the fail-fast switch
    /// in [`RunConfig`](crate::config::RunConfig) decides whether it aborts.
    pub fn is_recoverable(&self) -> bool {
        !matches!(
            self,
            AnalysisError::DegenerateInput(_)
                | AnalysisError::InvalidConfig(_)
                | AnalysisError::OutOfOrderSlice { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, AnalysisError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn structural_errors_are_fatal() {
        assert!(!AnalysisError::DegenerateInput("x".into()).is_recoverable());
        assert!(!AnalysisError::InvalidConfig("x".into()).is_recoverable());
        assert!(!AnalysisError::OutOfOrderSlice { expected: 2, got: 3 }.is_recoverable());
        assert!(AnalysisError::NoRootInBracket { lo: 0.0, hi: 1.0 }.is_recoverable());
        assert!(AnalysisError::InsufficientPeaks { slice: 1, found: 0 }.is_recoverable());
        assert!(AnalysisError::WindowOutOfBounds { lo: -1, hi: 3, len: 7 }.is_recoverable());
    }

    #[test]
    fn messages_name_the_offending_values() {
        let msg = AnalysisError::WindowOutOfBounds { lo: -1, hi: 3, len: 7 }.to_string();
        assert!(msg.contains("[-1, 3]"));
        assert!(msg.contains("0..7"));
    }
}
