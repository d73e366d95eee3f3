//! Visualizer configuration.
//!
//! The defaults encode the standard experiment layout; a JSON file given via
//! `--config` overrides them wholesale.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::mask::MeasurementSetting;

// ---------------------------------------------------------------------------
// ModelSpec
// ---------------------------------------------------------------------------

/// One model under comparison.
#[derive(Debug, Clone, Deserialize)]
pub struct ModelSpec {
    /// Output directory suffix and figure label.
    pub label: String,
    /// Method name understood by the model factory.
    pub method: String,
    /// Safetensors checkpoint path.
    pub checkpoint: PathBuf,
}

// ---------------------------------------------------------------------------
// VisualizeConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct VisualizeConfig {
    /// Directory of ground-truth `.mat` scenes.
    pub test_data_dir: PathBuf,
    /// MAT container holding the 2-D `mask` field.
    pub mask_path: PathBuf,
    /// All outputs land below this root.
    pub output_root: PathBuf,

    pub setting: MeasurementSetting,
    /// Dispersion shift per band, pixels.
    pub shift_step: usize,
    pub bands: usize,
    pub wavelength_start: f64,
    pub wavelength_end: f64,
    /// Band indices composing the pseudo-RGB image (R, G, B).
    pub rgb_bands: [usize; 3],
    /// Central patch edge for the mean-spectrum comparison.
    pub patch: usize,
    /// Representative band indices shown as false-colour panels.
    pub show_bands: Vec<usize>,

    /// The two models under comparison; the first provides the standalone
    /// pseudo-RGB reconstruction image.
    pub models: [ModelSpec; 2],
}

impl Default for VisualizeConfig {
    fn default() -> Self {
        VisualizeConfig {
            test_data_dir: PathBuf::from("data/test"),
            mask_path: PathBuf::from("data/mask.mat"),
            output_root: PathBuf::from("test_image"),
            setting: MeasurementSetting::default(),
            shift_step: 2,
            bands: 28,
            wavelength_start: 450.0,
            wavelength_end: 650.0,
            rgb_bands: [23, 14, 3],
            patch: 30,
            show_bands: vec![5, 12, 19, 26],
            models: [
                ModelSpec {
                    label: "ours".into(),
                    method: "gapnet".into(),
                    checkpoint: PathBuf::from("checkpoints/ours.safetensors"),
                },
                ModelSpec {
                    label: "baseline".into(),
                    method: "gapnet".into(),
                    checkpoint: PathBuf::from("checkpoints/baseline.safetensors"),
                },
            ],
        }
    }
}

impl VisualizeConfig {
    /// Per-model `.mat` output directory.
    pub fn mat_dir(&self, label: &str) -> PathBuf {
        self.output_root.join(format!("mat_{label}"))
    }
}

/// Defaults, or the JSON file at `path` when given.
pub fn load(path: Option<&Path>) -> Result<VisualizeConfig> {
    match path {
        None => Ok(VisualizeConfig::default()),
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("reading config '{}'", path.display()))?;
            serde_json::from_str(&text)
                .with_context(|| format!("parsing config '{}'", path.display()))
        }
    }
}
