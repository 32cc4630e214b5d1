/// Regression layer: fit, persist and load the spectra → (alcohol, sugar) model.
///
/// ```text
///   dataset file ──loader──▶ LabeledDataset ──split──▶ train / holdout
///                                                  │
///                                            pls::fit (nalgebra)
///                                                  │
///                                                  ▼
///                              ModelArtifact ──save/load──▶ pls_model.json
/// ```

pub mod artifact;
pub mod pls;

use std::path::Path;

use log::info;
use nalgebra::DMatrix;

pub use artifact::{ModelArtifact, TrainingSummary, FORMAT_VERSION};
pub use pls::PlsModel;

use crate::config::{ModelConfig, SENSOR_CHANNELS};
use crate::data::loader;
use crate::data::model::{LabeledDataset, LabeledSample};
use crate::data::split::{partition, split_indices};
use crate::error::{BridgeError, Result};

/// Train a model from the dataset at `dataset_path`.
pub fn train(dataset_path: &Path, config: &ModelConfig) -> Result<ModelArtifact> {
    let dataset =
        loader::load_file(dataset_path).map_err(|e| BridgeError::Dataset(format!("{e:#}")))?;
    train_on(&dataset, config)
}

/// Train on an already loaded dataset.
pub fn train_on(dataset: &LabeledDataset, config: &ModelConfig) -> Result<ModelArtifact> {
    if dataset.len() < 2 {
        return Err(BridgeError::Dataset(format!(
            "need at least 2 rows, found {}",
            dataset.len()
        )));
    }
    if dataset.n_features() != SENSOR_CHANNELS {
        return Err(BridgeError::Dataset(format!(
            "expected {SENSOR_CHANNELS} feature columns (one per sensor channel), found {}",
            dataset.n_features()
        )));
    }

    let split = split_indices(dataset.len(), config.holdout_fraction, config.seed);
    let (train_rows, holdout_rows) = partition(dataset, &split);
    info!(
        "Training PLS ({} components) on {} rows, holding out {}",
        config.components,
        train_rows.len(),
        holdout_rows.len()
    );

    let (x, y) = to_matrices(&train_rows, dataset.n_features());
    let model = pls::fit(&x, &y, config.components)?;

    let holdout_rmse = rmse(&model, &holdout_rows)?;
    if let Some([a, b]) = holdout_rmse {
        info!(
            "Holdout RMSE: {} = {a:.4}, {} = {b:.4}",
            dataset.target_names[0], dataset.target_names[1]
        );
    }

    Ok(ModelArtifact {
        format_version: FORMAT_VERSION,
        feature_names: dataset.feature_names.clone(),
        target_names: dataset.target_names.clone(),
        model,
        training: TrainingSummary {
            train_rows: train_rows.len(),
            holdout_rows: holdout_rows.len(),
            seed: config.seed,
            holdout_rmse,
        },
    })
}

/// Load the artifact if it exists, otherwise train and persist one.
///
/// Called once at startup; the returned artifact is never replaced while
/// the bridge runs.
pub fn load_or_train(config: &ModelConfig) -> Result<ModelArtifact> {
    if config.artifact_path.exists() {
        return ModelArtifact::load(&config.artifact_path);
    }

    info!(
        "No model at {}; training from {}",
        config.artifact_path.display(),
        config.dataset_path.display()
    );
    let artifact = train(&config.dataset_path, config)?;
    artifact.save(&config.artifact_path)?;
    Ok(artifact)
}

fn to_matrices(rows: &[&LabeledSample], n_features: usize) -> (DMatrix<f64>, DMatrix<f64>) {
    let x = DMatrix::from_fn(rows.len(), n_features, |i, j| rows[i].features[j]);
    let y = DMatrix::from_fn(rows.len(), 2, |i, j| rows[i].targets[j]);
    (x, y)
}

fn rmse(model: &PlsModel, rows: &[&LabeledSample]) -> Result<Option<[f64; 2]>> {
    if rows.is_empty() {
        return Ok(None);
    }
    let mut sq = [0.0f64; 2];
    for sample in rows {
        let (a, b) = model.predict(&sample.features)?;
        sq[0] += (a - sample.targets[0]).powi(2);
        sq[1] += (b - sample.targets[1]).powi(2);
    }
    let n = rows.len() as f64;
    Ok(Some([(sq[0] / n).sqrt(), (sq[1] / n).sqrt()]))
}
