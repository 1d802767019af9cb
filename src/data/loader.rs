use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use arrow::array::{
    Array, Float32Array, Float64Array, Int32Array, Int64Array, LargeListArray, ListArray,
};
use arrow::datatypes::DataType;
use log::info;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use serde_json::Value as JsonValue;

use super::model::{ProfileSlice, ProfileStack};

// ---------------------------------------------------------------------------
// Public entry-point
// ---------------------------------------------------------------------------

/// Load a profile stack from a file.  Dispatch by extension.
///
/// Every format stores one slice per row/record, in stack order:
/// * `.parquet` – list columns `y` and (optionally) `x`, optional numeric `time`
/// * `.json`    – `[{ "x": [...], "y": [...], "time": 0.0 }, ...]`
/// * `.csv`     – columns `x` and `y` containing semicolon-separated floats,
///   optional `time` column
///
/// When `x` is absent the slice is sampled at integer positions `0..n`.
pub fn load_file(path: &Path) -> Result<ProfileStack> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    let stack = match ext.as_str() {
        "parquet" | "pq" => load_parquet(path),
        "json" => load_json(path),
        "csv" => load_csv(path),
        other => bail!("Unsupported file extension: .{other}"),
    }?;

    info!("loaded {} slice(s) from {}", stack.len(), path.display());
    Ok(stack)
}

fn make_slice(
    x: Option<Vec<f64>>,
    y: Vec<f64>,
    time: Option<f64>,
    row: usize,
) -> Result<ProfileSlice> {
    let x = x.unwrap_or_else(|| (0..y.len()).map(|i| i as f64).collect());
    if x.len() != y.len() {
        bail!("Row {row}: x has {} values but y has {}", x.len(), y.len());
    }
    Ok(ProfileSlice { x, y, time })
}

// ---------------------------------------------------------------------------
// JSON loader
// ---------------------------------------------------------------------------

/// Expected JSON schema (records-oriented):
///
/// ```json
/// [
///   { "time": 0.0, "x": [0.0, 1.0, ...], "y": [12.0, 14.5, ...] },
///   ...
/// ]
/// ```
fn load_json(path: &Path) -> Result<ProfileStack> {
    let text = std::fs::read_to_string(path).context("reading JSON file")?;
    let root: JsonValue = serde_json::from_str(&text).context("parsing JSON")?;

    let records = root.as_array().context("Expected top-level JSON array")?;

    let mut slices = Vec::with_capacity(records.len());

    for (i, rec) in records.iter().enumerate() {
        let obj = rec
            .as_object()
            .with_context(|| format!("Row {i} is not a JSON object"))?;

        let x = match obj.get("x") {
            Some(v) => Some(json_array_to_f64(Some(v), i, "x")?),
            None => None,
        };
        let y = json_array_to_f64(obj.get("y"), i, "y")?;
        let time = match obj.get("time") {
            None | Some(JsonValue::Null) => None,
            Some(v) => Some(
                v.as_f64()
                    .with_context(|| format!("Row {i}: 'time' is not a number"))?,
            ),
        };

        slices.push(make_slice(x, y, time, i)?);
    }

    Ok(ProfileStack::new(slices))
}

fn json_array_to_f64(val: Option<&JsonValue>, row: usize, col: &str) -> Result<Vec<f64>> {
    let arr = val
        .and_then(|v| v.as_array())
        .with_context(|| format!("Row {row}: missing or invalid '{col}' array"))?;

    arr.iter()
        .enumerate()
        .map(|(j, v)| {
            v.as_f64()
                .with_context(|| format!("Row {row}, {col}[{j}]: not a number"))
        })
        .collect()
}

// ---------------------------------------------------------------------------
// CSV loader
// ---------------------------------------------------------------------------

/// CSV layout:  header row with column names.
/// `x` and `y` columns contain semicolon-separated floats:
///   `"0;1;2"`, `"12.0;14.5;13.1"`
/// An optional `time` column holds one float per slice. Other columns are ignored.
fn load_csv(path: &Path) -> Result<ProfileStack> {
    let mut reader = csv::Reader::from_path(path).context("opening CSV")?;
    let headers: Vec<String> = reader
        .headers()
        .context("reading CSV headers")?
        .iter()
        .map(|h| h.to_string())
        .collect();

    let x_idx = headers.iter().position(|h| h == "x");
    let y_idx = headers
        .iter()
        .position(|h| h == "y")
        .context("CSV missing 'y' column")?;
    let time_idx = headers.iter().position(|h| h == "time");

    let mut slices = Vec::new();

    for (row_no, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("CSV row {row_no}"))?;

        let x = match x_idx {
            Some(idx) => Some(parse_semicolon_floats(
                record.get(idx).unwrap_or(""),
                row_no,
                "x",
            )?),
            None => None,
        };
        let y = parse_semicolon_floats(record.get(y_idx).unwrap_or(""), row_no, "y")?;
        let time = match time_idx.and_then(|idx| record.get(idx)).map(str::trim) {
            None | Some("") => None,
            Some(tok) => Some(
                tok.parse::<f64>()
                    .with_context(|| format!("Row {row_no}, time: '{tok}' is not a number"))?,
            ),
        };

        slices.push(make_slice(x, y, time, row_no)?);
    }

    Ok(ProfileStack::new(slices))
}

fn parse_semicolon_floats(s: &str, row: usize, col: &str) -> Result<Vec<f64>> {
    s.split(';')
        .enumerate()
        .map(|(j, tok)| {
            tok.trim()
                .parse::<f64>()
                .with_context(|| format!("Row {row}, {col}[{j}]: '{tok}' is not a number"))
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Parquet loader
// ---------------------------------------------------------------------------

/// Load a Parquet file containing a profile stack.
///
/// Expected schema:
/// - `y`: List<Float64> or LargeList<Float64> – intensity arrays
/// - `x`: (optional) List<Float64> or LargeList<Float64> – position arrays
/// - `time`: (optional) Float64 / Float32 / Int64 / Int32 – slice time
fn load_parquet(path: &Path) -> Result<ProfileStack> {
    let file = std::fs::File::open(path).context("opening parquet file")?;
    let builder =
        ParquetRecordBatchReaderBuilder::try_new(file).context("reading parquet metadata")?;
    let reader = builder.build().context("building parquet reader")?;

    let mut slices = Vec::new();

    for batch_result in reader {
        let batch = batch_result.context("reading parquet record batch")?;
        let schema = batch.schema();
        let n_rows = batch.num_rows();

        let y_idx = schema
            .index_of("y")
            .map_err(|_| anyhow::anyhow!("Parquet file missing 'y' column"))?;
        let x_col = schema.index_of("x").ok().map(|i| batch.column(i));
        let time_col = schema.index_of("time").ok().map(|i| batch.column(i));
        let y_col = batch.column(y_idx);

        for row in 0..n_rows {
            let row_no = slices.len();
            let x = match x_col {
                Some(col) => Some(
                    extract_f64_list(col, row)
                        .with_context(|| format!("Row {row_no}: failed to read 'x'"))?,
                ),
                None => None,
            };
            let y = extract_f64_list(y_col, row)
                .with_context(|| format!("Row {row_no}: failed to read 'y'"))?;
            let time = match time_col {
                Some(col) => extract_scalar(col, row)
                    .with_context(|| format!("Row {row_no}: failed to read 'time'"))?,
                None => None,
            };

            slices.push(make_slice(x, y, time, row_no)?);
        }
    }

    Ok(ProfileStack::new(slices))
}

// -- Parquet / Arrow helpers --

/// Extract a `Vec<f64>` from a List or LargeList column at the given row.
fn extract_f64_list(col: &Arc<dyn Array>, row: usize) -> Result<Vec<f64>> {
    if col.is_null(row) {
        bail!("null value in list column");
    }

    let values_array = match col.data_type() {
        DataType::List(_) => {
            let list_arr = col
                .as_any()
                .downcast_ref::<ListArray>()
                .context("expected ListArray")?;
            list_arr.value(row)
        }
        DataType::LargeList(_) => {
            let list_arr = col
                .as_any()
                .downcast_ref::<LargeListArray>()
                .context("expected LargeListArray")?;
            list_arr.value(row)
        }
        other => bail!("Expected List or LargeList column, got {other:?}"),
    };

    // The inner array can be Float64 or Float32; nulls become NaN and are
    // rejected later by profile validation.
    if let Some(f64_arr) = values_array.as_any().downcast_ref::<Float64Array>() {
        Ok(f64_arr.iter().map(|v| v.unwrap_or(f64::NAN)).collect())
    } else if let Some(f32_arr) = values_array.as_any().downcast_ref::<Float32Array>() {
        Ok(f32_arr
            .iter()
            .map(|v| v.unwrap_or(f32::NAN) as f64)
            .collect())
    } else {
        bail!(
            "List inner type is {:?}, expected Float64 or Float32",
            values_array.data_type()
        )
    }
}

/// Extract one numeric cell; a null cell means "no time recorded".
fn extract_scalar(col: &Arc<dyn Array>, row: usize) -> Result<Option<f64>> {
    if col.is_null(row) {
        return Ok(None);
    }
    let value = match col.data_type() {
        DataType::Float64 => col
            .as_any()
            .downcast_ref::<Float64Array>()
            .context("expected Float64Array")?
            .value(row),
        DataType::Float32 => col
            .as_any()
            .downcast_ref::<Float32Array>()
            .context("expected Float32Array")?
            .value(row) as f64,
        DataType::Int64 => col
            .as_any()
            .downcast_ref::<Int64Array>()
            .context("expected Int64Array")?
            .value(row) as f64,
        DataType::Int32 => col
            .as_any()
            .downcast_ref::<Int32Array>()
            .context("expected Int32Array")?
            .value(row) as f64,
        other => bail!("Expected numeric column, got {other:?}"),
    };
    Ok(Some(value))
}

#[cfg(test)]
mod tests {
    use super::*;

    use arrow::array::{Float64Builder, ListBuilder};
    use arrow::datatypes::{Field, Schema};
    use arrow::record_batch::RecordBatch;
    use parquet::arrow::ArrowWriter;

    #[test]
    fn json_records_with_and_without_x() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stack.json");
        std::fs::write(
            &path,
            r#"[
                { "time": 0.5, "x": [0.0, 0.5, 1.0], "y": [1.0, 2.0, 1.0] },
                { "y": [3.0, 4.0, 3.0], "label": "ignored" }
            ]"#,
        )
        .unwrap();

        let stack = load_file(&path).unwrap();
        assert_eq!(stack.len(), 2);
        assert_eq!(stack.slices[0].x, vec![0.0, 0.5, 1.0]);
        assert_eq!(stack.slices[0].time, Some(0.5));
        assert_eq!(stack.slices[1].x, vec![0.0, 1.0, 2.0]);
        assert_eq!(stack.slices[1].time, None);
    }

    #[test]
    fn json_length_mismatch_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, r#"[{ "x": [0.0, 1.0], "y": [1.0] }]"#).unwrap();
        let err = load_file(&path).unwrap_err().to_string();
        assert!(err.contains("Row 0"), "{err}");
    }

    #[test]
    fn csv_with_time_column() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stack.csv");
        std::fs::write(
            &path,
            "time,x,y\n0.0,0;1;2;3,0;5;1;0\n0.1,0;1;2;3,0;1;5;0\n",
        )
        .unwrap();

        let stack = load_file(&path).unwrap();
        assert_eq!(stack.len(), 2);
        assert_eq!(stack.slices[1].y, vec![0.0, 1.0, 5.0, 0.0]);
        assert_eq!(stack.timestamps(), vec![0.0, 0.1]);
    }

    #[test]
    fn csv_bad_number_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stack.csv");
        std::fs::write(&path, "y\n0;abc;1\n").unwrap();
        assert!(load_file(&path).is_err());
    }

    #[test]
    fn parquet_round_trip() {
        let mut y_builder = ListBuilder::new(Float64Builder::new());
        for row in [[0.0, 2.0, 0.0, 2.0, 0.0], [0.0, 3.0, 0.0, 3.0, 0.0]] {
            y_builder.values().append_slice(&row);
            y_builder.append(true);
        }
        let y_array = y_builder.finish();
        let time_array = Float64Array::from(vec![10.0, 20.0]);

        let item = Arc::new(Field::new("item", DataType::Float64, true));
        let schema = Arc::new(Schema::new(vec![
            Field::new("y", DataType::List(item), false),
            Field::new("time", DataType::Float64, false),
        ]));
        let batch = RecordBatch::try_new(
            schema.clone(),
            vec![Arc::new(y_array), Arc::new(time_array)],
        )
        .unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stack.parquet");
        let file = std::fs::File::create(&path).unwrap();
        let mut writer = ArrowWriter::try_new(file, schema, None).unwrap();
        writer.write(&batch).unwrap();
        writer.close().unwrap();

        let stack = load_file(&path).unwrap();
        assert_eq!(stack.len(), 2);
        assert_eq!(stack.slices[1].y, vec![0.0, 3.0, 0.0, 3.0, 0.0]);
        assert_eq!(stack.slices[1].x, vec![0.0, 1.0, 2.0, 3.0, 4.0]);
        assert_eq!(stack.timestamps(), vec![10.0, 20.0]);
    }

    #[test]
    fn unsupported_extension() {
        let err = load_file(Path::new("stack.tif")).unwrap_err().to_string();
        assert!(err.contains(".tif"));
    }
}
