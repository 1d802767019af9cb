use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use log::{error, info};

use peakspan::analysis::{run_stack, ReductionPolicy, SeriesAggregator};
use peakspan::config::RunConfig;
use peakspan::data::{export, loader};

/// Measure the sub-pixel distance between two peaks in every slice of a profile stack.
#[derive(Parser, Debug)]
#[command(name = "peakspan", version, about)]
struct Args {
    /// Profile stack (.parquet, .json or .csv), one slice per row
    input: PathBuf,

    /// JSON run configuration; flags below override its values
    #[arg(long)]
    config: Option<PathBuf>,

    /// Physical units per pixel
    #[arg(long)]
    calibration: Option<f64>,

    /// Physical unit label used in the CSV header
    #[arg(long)]
    unit: Option<String>,

    /// Minimum peak prominence
    #[arg(long)]
    min_amplitude: Option<f64>,

    /// Refinement window half-width in samples
    #[arg(long)]
    half_width: Option<usize>,

    /// Abort on the first slice with fewer than two peaks
    #[arg(long, default_value_t = false)]
    fail_fast: bool,

    /// Keep the two tallest peaks instead of dropping the tallest ones
    #[arg(long, default_value_t = false)]
    keep_tallest: bool,

    /// Write the distance series here as CSV
    #[arg(long, short)]
    output: Option<PathBuf>,

    /// Write per-slice spline sweeps and markers here as JSON
    #[arg(long)]
    diagnostics: Option<PathBuf>,
}

impl Args {
    fn run_config(&self) -> Result<RunConfig> {
        let mut config = match &self.config {
            Some(path) => RunConfig::from_json_file(path)?,
            None => RunConfig::default(),
        };
        if let Some(calibration) = self.calibration {
            config.calibration = calibration;
        }
        if let Some(unit) = &self.unit {
            config.unit = unit.clone();
        }
        if let Some(min_amplitude) = self.min_amplitude {
            config.min_amplitude = min_amplitude;
        }
        if let Some(half_width) = self.half_width {
            config.half_width = half_width;
        }
        if self.fail_fast {
            config.fail_fast = true;
        }
        if self.keep_tallest {
            config.reduction = ReductionPolicy::KeepTallest;
        }
        config.validate()?;
        Ok(config)
    }
}

fn run(args: &Args) -> Result<()> {
    let config = args.run_config()?;
    let stack = loader::load_file(&args.input)
        .with_context(|| format!("loading {}", args.input.display()))?;

    let mut aggregator = SeriesAggregator::new();
    let diagnostics = run_stack(&stack, &config, &mut aggregator)?;
    let series = aggregator.finalize();

    for (result, time) in series.results.iter().zip(&series.timestamps) {
        info!(
            "slice {:>4}  t={:<10}  {:<20}  raw={:<10}  subpixel={}",
            result.slice_index,
            time,
            result.status,
            fmt_distance(result.raw_distance_physical, &config.unit),
            fmt_distance(result.subpixel_distance_physical, &config.unit),
        );
    }

    let summary = series.summary();
    info!(
        "{}/{} slices measured; mean {} ± {}",
        summary.ok,
        summary.slices,
        fmt_distance(summary.mean_subpixel, &config.unit),
        fmt_distance(summary.std_subpixel, &config.unit),
    );

    if let Some(path) = &args.output {
        export::write_series_csv(path, &series, &config.unit)?;
    }
    if let Some(path) = &args.diagnostics {
        export::write_diagnostics_json(path, &diagnostics)?;
    }
    Ok(())
}

fn fmt_distance(value: Option<f64>, unit: &str) -> String {
    match value {
        Some(v) => format!("{v:.4} {unit}"),
        None => "-".to_string(),
    }
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err:#}");
            ExitCode::FAILURE
        }
    }
}
