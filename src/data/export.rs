use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};
use log::info;

use crate::analysis::{DistanceSeries, SliceDiagnostics};

// ---------------------------------------------------------------------------
// Series → CSV
// ---------------------------------------------------------------------------

/// Write the distance series as one CSV row per slice.
///
/// Columns: `slice,time,status,raw_px,subpixel_px,raw_<unit>,subpixel_<unit>`.
/// Distances that were not measured are written as empty cells.
pub fn write_series_csv(path: &Path, series: &DistanceSeries, unit: &str) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("creating {}", path.display()))?;

    writer.write_record([
        "slice".to_string(),
        "time".to_string(),
        "status".to_string(),
        "raw_px".to_string(),
        "subpixel_px".to_string(),
        format!("raw_{unit}"),
        format!("subpixel_{unit}"),
    ])?;

    for (result, time) in series.results.iter().zip(series.timestamps.iter()) {
        writer.write_record([
            result.slice_index.to_string(),
            time.to_string(),
            result.status.to_string(),
            cell(result.raw_distance_pixels),
            cell(result.subpixel_distance_pixels),
            cell(result.raw_distance_physical),
            cell(result.subpixel_distance_physical),
        ])?;
    }

    writer.flush().context("flushing series CSV")?;
    info!("wrote {} slice(s) to {}", series.len(), path.display());
    Ok(())
}

fn cell(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

// ---------------------------------------------------------------------------
// Diagnostics → JSON
// ---------------------------------------------------------------------------

/// Write per-slice diagnostics (spline sweep and markers) as pretty JSON.
pub fn write_diagnostics_json(path: &Path, diagnostics: &[SliceDiagnostics]) -> Result<()> {
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, diagnostics).context("serializing diagnostics")?;
    writer.flush().context("flushing diagnostics")?;
    info!(
        "wrote diagnostics for {} slice(s) to {}",
        diagnostics.len(),
        path.display()
    );
    Ok(())
}
