//! Coded-aperture mask handling and measurement synthesis.
//!
//! The dispersive element shifts band `c` by `c × shift_step` pixels along
//! the width axis before the detector integrates, so the per-band mask `Φ`
//! and every measurement live on a widened `H × (W + shift_step·(C−1))`
//! plane.

use std::path::Path;

use anyhow::{bail, Context, Result};
use ndarray::{s, Array2, Array3};
use serde::Deserialize;

use crate::cube::HyperCube;
use crate::mat;

/// Field name holding the aperture pattern in the mask container.
const MASK_FIELD: &str = "mask";

// ---------------------------------------------------------------------------
// MeasurementSetting
// ---------------------------------------------------------------------------

/// Input-encoding setting for measurement synthesis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MeasurementSetting {
    /// Plain sum over modulated, shifted bands.
    Raw,
    /// Sum scaled by `2 / C` (the conventional energy normalisation).
    #[default]
    Normalized,
}

// ---------------------------------------------------------------------------
// MaskSet
// ---------------------------------------------------------------------------

/// The shifted per-band mask `Φ` plus the precomputed `Φ·Φᵀ` normaliser.
#[derive(Debug, Clone)]
pub struct MaskSet {
    /// `C × H × W_ext`, band `c` shifted right by `c × shift_step`.
    pub phi: Array3<f32>,
    /// `H × W_ext`, `Σ_c φ_c²`.
    pub phi_phi_t: Array2<f32>,
    pub shift_step: usize,
}

impl MaskSet {
    /// Load the 2-D aperture pattern from a MAT container and expand it.
    pub fn from_mat(path: &Path, bands: usize, shift_step: usize) -> Result<Self> {
        let container =
            mat::read(path).with_context(|| format!("loading mask '{}'", path.display()))?;
        let raw = container
            .get(MASK_FIELD)
            .with_context(|| format!("no '{}' field in '{}'", MASK_FIELD, path.display()))?;
        if raw.ndim() != 2 {
            bail!(
                "mask field in '{}' has shape {:?}, expected 2-D",
                path.display(),
                raw.shape()
            );
        }
        let plane = Array2::from_shape_fn((raw.shape()[0], raw.shape()[1]), |(h, w)| {
            raw[[h, w]] as f32
        });
        Ok(Self::from_plane(&plane, bands, shift_step))
    }

    /// Replicate a 2-D aperture across `bands` and apply the dispersion
    /// shift, precomputing `Φ·Φᵀ`.
    pub fn from_plane(plane: &Array2<f32>, bands: usize, shift_step: usize) -> Self {
        let (height, width) = plane.dim();
        let width_ext = width + shift_step * (bands.saturating_sub(1));

        let mut phi = Array3::zeros((bands, height, width_ext));
        for c in 0..bands {
            let offset = c * shift_step;
            phi.slice_mut(s![c, .., offset..offset + width])
                .assign(plane);
        }

        let mut phi_phi_t = Array2::zeros((height, width_ext));
        for c in 0..bands {
            for ((h, w), &v) in phi.index_axis(ndarray::Axis(0), c).indexed_iter() {
                phi_phi_t[[h, w]] += v * v;
            }
        }

        MaskSet {
            phi,
            phi_phi_t,
            shift_step,
        }
    }

    pub fn bands(&self) -> usize {
        self.phi.shape()[0]
    }

    pub fn height(&self) -> usize {
        self.phi.shape()[1]
    }

    /// Widened detector width.
    pub fn width_ext(&self) -> usize {
        self.phi.shape()[2]
    }

    /// Unshifted scene width.
    pub fn width(&self) -> usize {
        self.width_ext() - self.shift_step * self.bands().saturating_sub(1)
    }

    /// Forward model `Φx`: modulate, shift, integrate over bands.
    pub fn forward(&self, cube: &Array3<f32>) -> Array2<f32> {
        let (bands, height, width) = cube.dim();
        let mut meas = Array2::zeros((height, self.width_ext()));
        for c in 0..bands {
            let offset = c * self.shift_step;
            for h in 0..height {
                for w in 0..width {
                    meas[[h, offset + w]] += self.phi[[c, h, offset + w]] * cube[[c, h, w]];
                }
            }
        }
        meas
    }

    /// Adjoint `Φᵀy`: re-modulate the measurement into each band's frame.
    pub fn transpose(&self, meas: &Array2<f32>) -> Array3<f32> {
        let (bands, height, width) = (self.bands(), self.height(), self.width());
        let mut cube = Array3::zeros((bands, height, width));
        for c in 0..bands {
            let offset = c * self.shift_step;
            for h in 0..height {
                for w in 0..width {
                    cube[[c, h, w]] = self.phi[[c, h, offset + w]] * meas[[h, offset + w]];
                }
            }
        }
        cube
    }
}

// ---------------------------------------------------------------------------
// Measurement synthesis
// ---------------------------------------------------------------------------

/// Apply the coded-aperture forward model to a ground-truth cube.
pub fn synthesize(
    cube: &HyperCube,
    masks: &MaskSet,
    setting: MeasurementSetting,
) -> Result<Array2<f32>> {
    if cube.bands() != masks.bands()
        || cube.height() != masks.height()
        || cube.width() != masks.width()
    {
        bail!(
            "cube {}x{}x{} does not match mask geometry {}x{}x{}",
            cube.bands(),
            cube.height(),
            cube.width(),
            masks.bands(),
            masks.height(),
            masks.width(),
        );
    }

    let mut meas = masks.forward(cube.array());
    if setting == MeasurementSetting::Normalized {
        let scale = 2.0 / cube.bands() as f32;
        meas.mapv_inplace(|v| v * scale);
    }
    Ok(meas)
}

/// Undo the dispersion geometry: crop band `c` back out of the widened
/// measurement plane. The standard reconstruction initialiser.
pub fn shift_back(meas: &Array2<f32>, bands: usize, shift_step: usize) -> Array3<f32> {
    let (height, width_ext) = meas.dim();
    let width = width_ext - shift_step * bands.saturating_sub(1);

    Array3::from_shape_fn((bands, height, width), |(c, h, w)| {
        meas[[h, c * shift_step + w]]
    })
}
