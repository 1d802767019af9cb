//! Sub-pixel distance between two intensity peaks, tracked across every
//! slice of a profile stack.
//!
//! ```no_run
//! use peakspan::analysis::{run_stack, SeriesAggregator};
//! use peakspan::config::RunConfig;
//! use peakspan::data::loader::load_file;
//!
//! # fn main() -> anyhow::Result<()> {
//! let stack = load_file("kymograph.parquet".as_ref())?;
//! let config = RunConfig { calibration: 0.108, ..Default::default() };
//! let mut aggregator = SeriesAggregator::new();
//! let diagnostics = run_stack(&stack, &config, &mut aggregator)?;
//! let series = aggregator.finalize();
//! println!("{} slices, {} diagnostics", series.len(), diagnostics.len());
//! # Ok(())
//! # }
//! ```

pub mod analysis;
pub mod config;
pub mod data;
pub mod error;

pub use error::AnalysisError;
