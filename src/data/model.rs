use std::fmt;

use crate::config::SENSOR_CHANNELS;
use crate::error::BridgeError;

// ---------------------------------------------------------------------------
// SensorReading – one capture from the spectral sensor
// ---------------------------------------------------------------------------

/// One capture: a signed count per spectral channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SensorReading([i64; SENSOR_CHANNELS]);

impl SensorReading {
    pub fn new(values: [i64; SENSOR_CHANNELS]) -> Self {
        SensorReading(values)
    }

    pub fn values(&self) -> &[i64; SENSOR_CHANNELS] {
        &self.0
    }

    /// Channel values as model input.
    pub fn as_features(&self) -> Vec<f64> {
        self.0.iter().map(|&v| v as f64).collect()
    }
}

impl TryFrom<Vec<i64>> for SensorReading {
    type Error = BridgeError;

    fn try_from(values: Vec<i64>) -> Result<Self, Self::Error> {
        let found = values.len();
        let array: [i64; SENSOR_CHANNELS] =
            values
                .try_into()
                .map_err(|_| BridgeError::MalformedReading {
                    expected: SENSOR_CHANNELS,
                    found,
                })?;
        Ok(SensorReading(array))
    }
}

impl fmt::Display for SensorReading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, v) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            write!(f, "{v}")?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// LabeledSample – one row of the training table
// ---------------------------------------------------------------------------

/// Feature vector plus the two target values measured for it.
#[derive(Debug, Clone, PartialEq)]
pub struct LabeledSample {
    pub features: Vec<f64>,
    pub targets: [f64; 2],
}

// ---------------------------------------------------------------------------
// LabeledDataset – the complete training table
// ---------------------------------------------------------------------------

/// A parsed training table: all columns but the last two are features,
/// the last two are targets.
#[derive(Debug, Clone)]
pub struct LabeledDataset {
    pub feature_names: Vec<String>,
    pub target_names: [String; 2],
    pub samples: Vec<LabeledSample>,
}

impl LabeledDataset {
    /// Split full-width rows into features and targets.
    ///
    /// `columns` must name every cell of a row, targets last.
    pub fn from_rows(columns: Vec<String>, rows: Vec<Vec<f64>>) -> anyhow::Result<Self> {
        if columns.len() < 3 {
            anyhow::bail!(
                "need at least one feature column and two target columns, found {} columns",
                columns.len()
            );
        }
        let n_features = columns.len() - 2;

        let mut samples = Vec::with_capacity(rows.len());
        for (i, row) in rows.into_iter().enumerate() {
            if row.len() != columns.len() {
                anyhow::bail!(
                    "row {i} has {} values but the header names {} columns",
                    row.len(),
                    columns.len()
                );
            }
            let targets = [row[n_features], row[n_features + 1]];
            let mut features = row;
            features.truncate(n_features);
            samples.push(LabeledSample { features, targets });
        }

        let mut feature_names = columns;
        let sugar = feature_names.pop().unwrap_or_default();
        let alcohol = feature_names.pop().unwrap_or_default();

        Ok(LabeledDataset {
            feature_names,
            target_names: [alcohol, sugar],
            samples,
        })
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Whether the dataset has no rows.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn n_features(&self) -> usize {
        self.feature_names.len()
    }
}
