use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use arrow::array::{
    Array, Float32Array, Float64Array, Int16Array, Int32Array, Int64Array, UInt16Array,
    UInt32Array,
};
use arrow::datatypes::DataType;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use serde::Deserialize;

use super::model::LabeledDataset;

// ---------------------------------------------------------------------------
// Public entry-point
// ---------------------------------------------------------------------------

/// Load a labeled dataset from a file.  Dispatch by extension.
///
/// Supported formats:
/// * `.csv`     – header row, one numeric cell per column (recommended)
/// * `.json`    – `{ "columns": [...], "data": [[...], ...] }`
/// * `.parquet` – flat integer / float columns
///
/// In every format the last two columns are the targets.
pub fn load_file(path: &Path) -> Result<LabeledDataset> {
    if !path.exists() {
        bail!("dataset file {} does not exist", path.display());
    }

    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    let dataset = match ext.as_str() {
        "csv" | "txt" => load_csv(path),
        "json" => load_json(path),
        "parquet" | "pq" => load_parquet(path),
        other => bail!("Unsupported file extension: .{other}"),
    }
    .with_context(|| format!("loading {}", path.display()))?;

    if dataset.is_empty() {
        bail!("dataset {} contains no rows", path.display());
    }
    Ok(dataset)
}

// ---------------------------------------------------------------------------
// CSV loader
// ---------------------------------------------------------------------------

/// CSV layout: header row with column names, then one row per sample:
///   `spectrum_1,...,spectrum_16,alcohol_percentage,sugar_percentage`
fn load_csv(path: &Path) -> Result<LabeledDataset> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .context("opening CSV")?;
    let headers: Vec<String> = reader
        .headers()
        .context("reading CSV headers")?
        .iter()
        .map(|h| h.to_string())
        .collect();

    let mut rows = Vec::new();
    for (row_no, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("CSV row {row_no}"))?;
        let row = record
            .iter()
            .enumerate()
            .map(|(col, cell)| {
                cell.parse::<f64>().with_context(|| {
                    format!("CSV row {row_no}, column '{}': '{cell}' is not a number", headers[col])
                })
            })
            .collect::<Result<Vec<f64>>>()?;
        rows.push(row);
    }

    LabeledDataset::from_rows(headers, rows)
}

// ---------------------------------------------------------------------------
// JSON loader
// ---------------------------------------------------------------------------

/// The split orientation written by `df.to_json(orient='split')`.
#[derive(Deserialize)]
struct SplitTable {
    columns: Vec<String>,
    data: Vec<Vec<f64>>,
}

/// Expected JSON schema:
///
/// ```json
/// {
///   "columns": ["spectrum_1", ..., "alcohol_percentage", "sugar_percentage"],
///   "data": [[812, ..., 12.5, 3.0], ...]
/// }
/// ```
fn load_json(path: &Path) -> Result<LabeledDataset> {
    let text = std::fs::read_to_string(path).context("reading JSON file")?;
    let table: SplitTable = serde_json::from_str(&text).context("parsing JSON")?;
    LabeledDataset::from_rows(table.columns, table.data)
}

// ---------------------------------------------------------------------------
// Parquet loader
// ---------------------------------------------------------------------------

/// Load a Parquet file with one flat numeric column per feature/target.
fn load_parquet(path: &Path) -> Result<LabeledDataset> {
    let file = std::fs::File::open(path).context("opening parquet file")?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(file)
        .context("reading parquet metadata")?;
    let columns: Vec<String> = builder
        .schema()
        .fields()
        .iter()
        .map(|f| f.name().clone())
        .collect();
    let reader = builder.build().context("building parquet reader")?;

    let mut rows = Vec::new();
    for batch_result in reader {
        let batch = batch_result.context("reading parquet record batch")?;
        let first = rows.len();
        rows.resize_with(first + batch.num_rows(), || Vec::with_capacity(columns.len()));

        for (col_idx, name) in columns.iter().enumerate() {
            let col = batch.column(col_idx);
            for row in 0..batch.num_rows() {
                let value = extract_f64(col, row)
                    .with_context(|| format!("Row {}: column '{name}'", first + row))?;
                rows[first + row].push(value);
            }
        }
    }

    LabeledDataset::from_rows(columns, rows)
}

/// Read one numeric cell as `f64`.
fn extract_f64(col: &Arc<dyn Array>, row: usize) -> Result<f64> {
    if col.is_null(row) {
        bail!("null value");
    }

    macro_rules! cell {
        ($ty:ty) => {
            col.as_any()
                .downcast_ref::<$ty>()
                .map(|arr| arr.value(row) as f64)
                .context(concat!("expected ", stringify!($ty)))
        };
    }

    match col.data_type() {
        DataType::Float64 => cell!(Float64Array),
        DataType::Float32 => cell!(Float32Array),
        DataType::Int64 => cell!(Int64Array),
        DataType::Int32 => cell!(Int32Array),
        DataType::Int16 => cell!(Int16Array),
        DataType::UInt32 => cell!(UInt32Array),
        DataType::UInt16 => cell!(UInt16Array),
        other => bail!("Expected a numeric column, got {other:?}"),
    }
}
