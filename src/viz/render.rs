//! Raster output helpers: PNG writing and false-colour band tinting.

use std::path::Path;

use anyhow::{bail, Context, Result};
use image::RgbImage;
use ndarray::{Array3, ArrayView2};

use crate::cube::minmax01;

/// Save an `H × W × 3` float image (values in [0, 1]) as a PNG.
pub fn save_rgb(path: &Path, rgb: &Array3<f32>) -> Result<()> {
    let shape = rgb.shape();
    if shape[2] != 3 {
        bail!("expected an H x W x 3 image, got {:?}", shape);
    }
    let (height, width) = (shape[0] as u32, shape[1] as u32);

    let img = RgbImage::from_fn(width, height, |x, y| {
        let px = |c: usize| {
            (rgb[[y as usize, x as usize, c]].clamp(0.0, 1.0) * 255.0).round() as u8
        };
        image::Rgb([px(0), px(1), px(2)])
    });
    img.save(path)
        .with_context(|| format!("writing '{}'", path.display()))?;
    Ok(())
}

/// Normalise a single band to [0, 1] and tint it with a wavelength colour.
/// Returns `H × W × 3`.
pub fn false_color(plane: ArrayView2<'_, f32>, tint: (f64, f64, f64)) -> Array3<f32> {
    let norm = minmax01(plane);
    let (height, width) = norm.dim();
    let tint = [tint.0 as f32, tint.1 as f32, tint.2 as f32];

    Array3::from_shape_fn((height, width, 3), |(h, w, c)| {
        (norm[[h, w]] * tint[c]).clamp(0.0, 1.0)
    })
}
