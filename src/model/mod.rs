//! Reconstruction models: the construction factory, checkpoint loading, and
//! the shared inference-time interface.

pub mod checkpoint;
mod gap;

pub use gap::GapNet;

use std::path::Path;

use anyhow::{bail, Context, Result};
use ndarray::Array2;

use crate::cube::HyperCube;
use crate::mask::MaskSet;
use checkpoint::StateDict;

const DEFAULT_STAGES: usize = 3;

// ---------------------------------------------------------------------------
// Reconstructor – the inference-time seam
// ---------------------------------------------------------------------------

/// A loaded reconstruction model. Immutable after `load_state`; inference
/// never mutates the parameters.
pub trait Reconstructor {
    fn name(&self) -> &str;

    /// The exact parameter set a checkpoint must provide.
    fn parameter_names(&self) -> Vec<String>;

    /// Assign checkpoint tensors; fails listing missing/unexpected keys.
    fn load_state(&mut self, state: &StateDict) -> Result<()>;

    /// Reconstruct a hyperspectral cube from one coded measurement.
    fn reconstruct(&self, meas: &Array2<f32>, masks: &MaskSet) -> HyperCube;
}

// ---------------------------------------------------------------------------
// Factory
// ---------------------------------------------------------------------------

/// Construct an untrained model from a method name.
///
/// Recognised: `gapnet` (default stage count) and `gapnet_<N>stg`.
pub fn build(method: &str, bands: usize) -> Result<Box<dyn Reconstructor>> {
    let Some(rest) = method.strip_prefix("gapnet") else {
        bail!("unknown method '{method}'");
    };

    let stages = if rest.is_empty() {
        DEFAULT_STAGES
    } else {
        rest.strip_prefix('_')
            .and_then(|s| s.strip_suffix("stg"))
            .and_then(|n| n.parse::<usize>().ok())
            .filter(|&n| n > 0)
            .with_context(|| format!("malformed method name '{method}'"))?
    };

    Ok(Box::new(GapNet::new(stages, bands)))
}

/// Factory plus checkpoint: build the model and load its weights.
pub fn load_pretrained(
    method: &str,
    bands: usize,
    checkpoint_path: &Path,
) -> Result<Box<dyn Reconstructor>> {
    let mut model = build(method, bands)?;
    let state = checkpoint::load(checkpoint_path)?;
    model
        .load_state(&state)
        .with_context(|| format!("loading '{}' into {}", checkpoint_path.display(), model.name()))?;
    log::info!(
        "model {} loaded from {}",
        model.name(),
        checkpoint_path.display()
    );
    Ok(model)
}
