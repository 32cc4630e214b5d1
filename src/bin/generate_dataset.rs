//! Write a deterministic synthetic training set for the bridge model.
//!
//! ```text
//! generate_dataset                      # -> mantispectra_dataset.csv
//! generate_dataset data/train.parquet   # Parquet instead of CSV
//! ```

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use arrow::array::{ArrayRef, Float64Array, Int64Array};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const CHANNELS: usize = 16;
const DARK_LEVEL: f64 = 420.0;
const LAMP_LEVEL: f64 = 9_000.0;

/// Absorption band centred on `centre` (channel index), Gaussian in shape.
fn band(channel: usize, centre: f64, width: f64) -> f64 {
    (-(channel as f64 - centre).powi(2) / (2.0 * width.powi(2))).exp()
}

/// Box-Muller transform for normal noise
fn gauss(rng: &mut StdRng, mean: f64, std_dev: f64) -> f64 {
    let u1: f64 = rng.gen::<f64>().max(1e-15);
    let u2: f64 = rng.gen();
    let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
    mean + std_dev * z
}

/// Counts per channel for a liquid with the given composition.
fn synthesize(rng: &mut StdRng, alcohol: f64, sugar: f64) -> Vec<i64> {
    (0..CHANNELS)
        .map(|ch| {
            let absorbance = 0.025 * alcohol * band(ch, 11.0, 1.8) + 0.018 * sugar * band(ch, 5.0, 2.5);
            let counts = DARK_LEVEL + LAMP_LEVEL * (-absorbance).exp() + gauss(rng, 0.0, 25.0);
            counts.round() as i64
        })
        .collect()
}

struct Table {
    spectra: Vec<Vec<i64>>,
    alcohol: Vec<f64>,
    sugar: Vec<f64>,
}

fn generate() -> Table {
    let mut rng = StdRng::seed_from_u64(42);
    let alcohol_levels = [0.0, 4.5, 8.0, 12.5, 15.0];
    let sugar_levels = [0.0, 2.0, 5.0, 10.0];
    let repeats = 5;

    let mut table = Table {
        spectra: Vec::new(),
        alcohol: Vec::new(),
        sugar: Vec::new(),
    };
    for &alcohol in &alcohol_levels {
        for &sugar in &sugar_levels {
            for _ in 0..repeats {
                table.spectra.push(synthesize(&mut rng, alcohol, sugar));
                table.alcohol.push(alcohol);
                table.sugar.push(sugar);
            }
        }
    }
    table
}

fn header() -> Vec<String> {
    (1..=CHANNELS)
        .map(|i| format!("spectrum_{i}"))
        .chain(["alcohol_percentage".to_string(), "sugar_percentage".to_string()])
        .collect()
}

fn write_csv(path: &Path, table: &Table) -> Result<()> {
    let mut writer = csv::Writer::from_path(path).context("creating CSV")?;
    writer.write_record(header())?;
    for (i, spectrum) in table.spectra.iter().enumerate() {
        let mut record: Vec<String> = spectrum.iter().map(|v| v.to_string()).collect();
        record.push(table.alcohol[i].to_string());
        record.push(table.sugar[i].to_string());
        writer.write_record(&record)?;
    }
    writer.flush()?;
    Ok(())
}

fn write_parquet(path: &Path, table: &Table) -> Result<()> {
    let names = header();
    let mut fields = Vec::with_capacity(names.len());
    let mut columns: Vec<ArrayRef> = Vec::with_capacity(names.len());

    for (ch, name) in names.iter().take(CHANNELS).enumerate() {
        fields.push(Field::new(name, DataType::Int64, false));
        let values: Vec<i64> = table.spectra.iter().map(|s| s[ch]).collect();
        columns.push(Arc::new(Int64Array::from(values)));
    }
    fields.push(Field::new(&names[CHANNELS], DataType::Float64, false));
    columns.push(Arc::new(Float64Array::from(table.alcohol.clone())));
    fields.push(Field::new(&names[CHANNELS + 1], DataType::Float64, false));
    columns.push(Arc::new(Float64Array::from(table.sugar.clone())));

    let schema = Arc::new(Schema::new(fields));
    let batch = RecordBatch::try_new(schema.clone(), columns).context("building record batch")?;

    let file = std::fs::File::create(path).context("creating parquet file")?;
    let mut writer = ArrowWriter::try_new(file, schema, None).context("creating parquet writer")?;
    writer.write(&batch)?;
    writer.close()?;
    Ok(())
}

fn main() -> Result<()> {
    env_logger::init();

    let output = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "mantispectra_dataset.csv".to_string());
    let path = Path::new(&output);
    let table = generate();

    match path.extension().and_then(|e| e.to_str()) {
        Some("parquet") | Some("pq") => write_parquet(path, &table)?,
        _ => write_csv(path, &table)?,
    }

    log::info!("Wrote {} samples to {}", table.spectra.len(), path.display());
    println!("Wrote {} labeled spectra ({CHANNELS} channels each) to {output}", table.spectra.len());
    Ok(())
}
