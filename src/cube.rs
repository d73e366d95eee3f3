//! Hyperspectral cube type and the small amount of pixel math the
//! visualizer needs from it.

use anyhow::{bail, Result};
use ndarray::{Array2, Array3, ArrayD, ArrayView2, Axis};

// ---------------------------------------------------------------------------
// HyperCube – bands × height × width
// ---------------------------------------------------------------------------

/// A hyperspectral cube, channel-first (`C × H × W`), `f32` intensities.
#[derive(Debug, Clone)]
pub struct HyperCube {
    data: Array3<f32>,
}

impl HyperCube {
    /// Wrap an already channel-first array.
    pub fn new(data: Array3<f32>) -> Self {
        HyperCube { data }
    }

    /// Build from a raw MAT field, accepting both the MATLAB `H × W × C`
    /// layout and channel-first `C × H × W`.
    ///
    /// The band axis is taken to be the strictly smallest dimension; square
    /// ambiguous shapes default to the MATLAB layout.
    pub fn from_dyn(raw: &ArrayD<f64>) -> Result<Self> {
        let shape = raw.shape();
        if shape.len() != 3 {
            bail!("expected a 3-D cube, got shape {:?}", shape);
        }
        let (d0, d1, d2) = (shape[0], shape[1], shape[2]);

        let channel_first = d0 < d1 && d0 < d2;
        let (bands, height, width) = if channel_first {
            (d0, d1, d2)
        } else {
            (d2, d0, d1)
        };

        let data = Array3::from_shape_fn((bands, height, width), |(c, h, w)| {
            let v = if channel_first {
                raw[[c, h, w]]
            } else {
                raw[[h, w, c]]
            };
            v as f32
        });
        Ok(HyperCube { data })
    }

    pub fn bands(&self) -> usize {
        self.data.shape()[0]
    }

    pub fn height(&self) -> usize {
        self.data.shape()[1]
    }

    pub fn width(&self) -> usize {
        self.data.shape()[2]
    }

    /// One spectral band as an `H × W` view.
    pub fn band(&self, c: usize) -> ArrayView2<'_, f32> {
        self.data.index_axis(Axis(0), c)
    }

    pub fn array(&self) -> &Array3<f32> {
        &self.data
    }

    /// Pseudo-RGB composite from a fixed band-to-channel mapping, min-max
    /// normalised jointly over the three planes. Returns `H × W × 3`.
    pub fn pseudo_rgb(&self, rgb_bands: (usize, usize, usize)) -> Result<Array3<f32>> {
        let (r, g, b) = rgb_bands;
        let bands = self.bands();
        if r >= bands || g >= bands || b >= bands {
            bail!(
                "RGB band mapping ({r}, {g}, {b}) out of range for {bands}-band cube"
            );
        }

        let mut rgb = Array3::zeros((self.height(), self.width(), 3));
        for (channel, band) in [r, g, b].into_iter().enumerate() {
            let plane = self.band(band);
            for ((h, w), &v) in plane.indexed_iter() {
                rgb[[h, w, channel]] = v;
            }
        }

        let min = rgb.iter().copied().fold(f32::INFINITY, f32::min);
        let max = rgb.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        let span = max - min + 1e-8;
        rgb.mapv_inplace(|v| (v - min) / span);
        Ok(rgb)
    }

    /// Mean spectrum over the central `patch × patch` window, one value per
    /// band. The patch is clamped to the cube extent.
    pub fn patch_mean_spectrum(&self, patch: usize) -> Vec<f32> {
        let patch = patch.min(self.height()).min(self.width()).max(1);
        let h0 = self.height() / 2 - patch / 2;
        let w0 = self.width() / 2 - patch / 2;

        (0..self.bands())
            .map(|c| {
                let window = self
                    .data
                    .slice(ndarray::s![c, h0..h0 + patch, w0..w0 + patch]);
                window.mean().unwrap_or(0.0)
            })
            .collect()
    }

    /// Reorder to the MATLAB `H × W × C` layout, widened to `f64`, for
    /// persisting reconstructions.
    pub fn to_hwc_f64(&self) -> ArrayD<f64> {
        let (bands, height, width) = (self.bands(), self.height(), self.width());
        Array3::from_shape_fn((height, width, bands), |(h, w, c)| {
            self.data[[c, h, w]] as f64
        })
        .into_dyn()
    }
}

// ---------------------------------------------------------------------------
// Shared pixel helpers
// ---------------------------------------------------------------------------

/// Min-max rescale of a 2-D plane into [0, 1].
pub fn minmax01(plane: ArrayView2<'_, f32>) -> Array2<f32> {
    let min = plane.iter().copied().fold(f32::INFINITY, f32::min);
    let max = plane.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let span = max - min + 1e-8;
    plane.mapv(|v| (v - min) / span)
}
