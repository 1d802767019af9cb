/// Numerical core: per-slice peak distance measurement.
///
/// Architecture:
/// ```text
///   Profile (one slice)
///        │
///        ▼
///   ┌──────────┐
///   │  peaks    │  prominence-filtered maxima → two seed peaks
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  spline   │  natural cubic interpolant of the profile
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  refine   │  slope root near each seed → sub-pixel position
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  slice    │  distances, status, diagnostics
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  series   │  ordered time series across the stack
///   └──────────┘
/// ```

pub mod peaks;
pub mod refine;
pub mod series;
pub mod slice;
pub mod spline;

pub use peaks::{select_peaks, PeakCandidate, ReductionPolicy};
pub use refine::{refine_peak, RefinedPeak};
pub use series::{DistanceSeries, SeriesAggregator, SeriesSummary};
pub use slice::{
    process_slice, run, run_stack, SliceDiagnostics, SliceOutcome, SliceResult, SliceStatus,
};
pub use spline::CubicSpline;
