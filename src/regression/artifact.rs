use std::fs;
use std::io::{BufWriter, Write};
use std::path::Path;

use log::info;
use serde::{Deserialize, Serialize};

use super::pls::PlsModel;
use crate::config::SENSOR_CHANNELS;
use crate::error::{BridgeError, Result};

/// Bumped whenever the on-disk layout changes.
pub const FORMAT_VERSION: u32 = 1;

// ---------------------------------------------------------------------------
// ModelArtifact – what lives in pls_model.json
// ---------------------------------------------------------------------------

/// How the model was trained, kept next to it for diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingSummary {
    pub train_rows: usize,
    pub holdout_rows: usize,
    pub seed: u64,
    /// Root-mean-square error per target on the holdout rows.
    pub holdout_rmse: Option<[f64; 2]>,
}

/// A trained model plus the metadata needed to use it safely.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub format_version: u32,
    pub feature_names: Vec<String>,
    pub target_names: [String; 2],
    pub model: PlsModel,
    pub training: TrainingSummary,
}

impl ModelArtifact {
    /// Expected input dimensionality.
    pub fn n_features(&self) -> usize {
        self.model.n_features()
    }

    pub fn predict(&self, features: &[f64]) -> Result<(f64, f64)> {
        self.model.predict(features)
    }

    /// Read and validate an artifact.
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .map_err(|e| BridgeError::Artifact(format!("reading {}: {e}", path.display())))?;
        let artifact: ModelArtifact = serde_json::from_str(&text)
            .map_err(|e| BridgeError::Artifact(format!("decoding {}: {e}", path.display())))?;

        if artifact.format_version != FORMAT_VERSION {
            return Err(BridgeError::Artifact(format!(
                "{}: unsupported format version {} (expected {FORMAT_VERSION})",
                path.display(),
                artifact.format_version
            )));
        }
        artifact
            .model
            .validate()
            .map_err(|e| BridgeError::Artifact(format!("{}: {e}", path.display())))?;
        if artifact.n_features() != SENSOR_CHANNELS {
            return Err(BridgeError::Artifact(format!(
                "{}: model takes {} features, the sensor has {SENSOR_CHANNELS} channels",
                path.display(),
                artifact.n_features()
            )));
        }
        if artifact.feature_names.len() != artifact.n_features() {
            return Err(BridgeError::Artifact(format!(
                "{}: {} feature names for {} features",
                path.display(),
                artifact.feature_names.len(),
                artifact.n_features()
            )));
        }

        info!(
            "Loaded model from {} ({} features, {} components)",
            path.display(),
            artifact.n_features(),
            artifact.model.n_components
        );
        Ok(artifact)
    }

    /// Write the artifact as pretty JSON, replacing any existing file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let io_err = |e: std::io::Error| BridgeError::Artifact(format!("writing {}: {e}", path.display()));

        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir).map_err(io_err)?;
        }
        // Readers only ever see a complete file: write a sibling, then rename.
        let tmp = path.with_extension("json.tmp");
        let mut writer = BufWriter::new(fs::File::create(&tmp).map_err(io_err)?);
        serde_json::to_writer_pretty(&mut writer, self)
            .map_err(|e| BridgeError::Artifact(format!("encoding {}: {e}", path.display())))?;
        writer.flush().map_err(io_err)?;
        drop(writer);
        fs::rename(&tmp, path).map_err(io_err)?;

        info!("Saved model to {}", path.display());
        Ok(())
    }
}
