//! Composite comparison figure.
//!
//! Layout (fixed 2400 × 1600 canvas):
//! ```text
//! ┌───────────────┬──────┬──────┬──────┐
//! │ GT RGB │ Meas │ A b0 │ B b0 │ GT b0│
//! │        │      ├──────┼──────┼──────┤
//! ├───────────────┤  …  4 band rows  … │
//! │ spectral      ├──────┼──────┼──────┤
//! │ comparison    │ A b3 │ B b3 │ GT b3│
//! └───────────────┴──────┴──────┴──────┘
//! ```

use std::path::Path;

use anyhow::{anyhow, bail, Result};
use ndarray::{Array2, Array3, ArrayView2};
use plotters::coord::Shift;
use plotters::prelude::*;

use crate::color::wavelength_to_rgb;
use crate::cube::{minmax01, HyperCube};
use crate::viz::render::false_color;

const FIG_WIDTH: u32 = 2400;
const FIG_HEIGHT: u32 = 1600;
const LEFT_WIDTH: i32 = 1200;
const TOP_HEIGHT: i32 = 800;

type Area<'a> = DrawingArea<BitMapBackend<'a>, Shift>;

/// Everything one comparison figure needs.
pub struct FigureSpec<'a> {
    pub gt: &'a HyperCube,
    pub recon_a: &'a HyperCube,
    pub recon_b: &'a HyperCube,
    pub meas: &'a Array2<f32>,
    pub label_a: &'a str,
    pub label_b: &'a str,
    pub rgb_bands: (usize, usize, usize),
    /// Centre wavelength per band, nm.
    pub wavelengths: &'a [f64],
    /// Central patch edge for the mean-spectrum comparison.
    pub patch: usize,
    /// Representative band indices, one panel row each.
    pub show_bands: &'a [usize],
}

/// Render the figure to `path` as a PNG.
pub fn render_comparison(path: &Path, spec: &FigureSpec<'_>) -> Result<()> {
    let bands = spec.gt.bands();
    if spec.wavelengths.len() != bands {
        bail!(
            "{} wavelengths for a {}-band cube",
            spec.wavelengths.len(),
            bands
        );
    }
    if let Some(&bad) = spec.show_bands.iter().find(|&&b| b >= bands) {
        bail!("representative band {bad} out of range for {bands}-band cube");
    }
    if spec.show_bands.is_empty() {
        bail!("no representative bands selected");
    }

    let root = BitMapBackend::new(path, (FIG_WIDTH, FIG_HEIGHT)).into_drawing_area();
    root.fill(&WHITE).map_err(to_anyhow)?;

    let (left, right) = root.split_horizontally(LEFT_WIDTH);
    let (top_left, bottom_left) = left.split_vertically(TOP_HEIGHT);
    let (gt_area, meas_area) = top_left.split_horizontally(LEFT_WIDTH / 2);

    draw_rgb_panel(&gt_area, "Ground Truth RGB", &spec.gt.pseudo_rgb(spec.rgb_bands)?)?;
    draw_gray_panel(&meas_area, "Measurement", spec.meas.view())?;
    draw_spectral_chart(&bottom_left, spec)?;

    // Band panels: one row per representative band, columns A / B / GT.
    let cells = right.split_evenly((spec.show_bands.len(), 3));
    for (row, &band) in spec.show_bands.iter().enumerate() {
        let tint = wavelength_to_rgb(spec.wavelengths[band]);
        let columns: [(&HyperCube, String); 3] = [
            (spec.recon_a, format!("{} Band {}", spec.label_a, band + 1)),
            (spec.recon_b, format!("{} Band {}", spec.label_b, band + 1)),
            (spec.gt, format!("GT Band {}", band + 1)),
        ];
        for (col, (cube, title)) in columns.iter().enumerate() {
            let img = false_color(cube.band(band), tint);
            draw_rgb_panel(&cells[row * 3 + col], title, &img)?;
        }
    }

    root.present().map_err(to_anyhow)?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Panels
// ---------------------------------------------------------------------------

/// An image panel: caption on top, no axes, one filled rectangle per pixel.
fn draw_rgb_panel(area: &Area<'_>, title: &str, img: &Array3<f32>) -> Result<()> {
    let (height, width) = (img.shape()[0], img.shape()[1]);

    let mut chart = ChartBuilder::on(area)
        .caption(title, ("sans-serif", 28))
        .margin(10)
        .build_cartesian_2d(0f64..width as f64, 0f64..height as f64)
        .map_err(to_anyhow)?;

    chart
        .draw_series((0..height).flat_map(|row| {
            // Row 0 sits at the top of the panel.
            let y0 = (height - row) as f64;
            let y1 = y0 - 1.0;
            (0..width).map(move |col| {
                let px = |c: usize| {
                    (img[[row, col, c]].clamp(0.0, 1.0) * 255.0).round() as u8
                };
                let color = RGBColor(px(0), px(1), px(2));
                Rectangle::new(
                    [(col as f64, y0), ((col + 1) as f64, y1)],
                    color.filled(),
                )
            })
        }))
        .map_err(to_anyhow)?;
    Ok(())
}

/// Grayscale variant for the measurement plane.
fn draw_gray_panel(area: &Area<'_>, title: &str, plane: ArrayView2<'_, f32>) -> Result<()> {
    let norm = minmax01(plane);
    let (height, width) = norm.dim();
    let img = Array3::from_shape_fn((height, width, 3), |(h, w, _)| norm[[h, w]]);
    draw_rgb_panel(area, title, &img)
}

/// Mean spectrum over the central patch for GT and both reconstructions.
fn draw_spectral_chart(area: &Area<'_>, spec: &FigureSpec<'_>) -> Result<()> {
    let curves = [
        ("Ground Truth", RED, spec.gt.patch_mean_spectrum(spec.patch)),
        (spec.label_a, BLUE, spec.recon_a.patch_mean_spectrum(spec.patch)),
        (spec.label_b, GREEN, spec.recon_b.patch_mean_spectrum(spec.patch)),
    ];

    let y_min = curves
        .iter()
        .flat_map(|(_, _, c)| c.iter().copied())
        .fold(f32::INFINITY, f32::min) as f64;
    let y_max = curves
        .iter()
        .flat_map(|(_, _, c)| c.iter().copied())
        .fold(f32::NEG_INFINITY, f32::max) as f64;
    let pad = ((y_max - y_min) * 0.05).max(1e-3);

    let x_min = spec.wavelengths.first().copied().unwrap_or(0.0);
    let x_max = spec.wavelengths.last().copied().unwrap_or(1.0);

    let mut chart = ChartBuilder::on(area)
        .caption("Spectral Signature Comparison", ("sans-serif", 28))
        .margin(20)
        .x_label_area_size(50)
        .y_label_area_size(70)
        .build_cartesian_2d(x_min..x_max, (y_min - pad)..(y_max + pad))
        .map_err(to_anyhow)?;

    chart
        .configure_mesh()
        .x_desc("Wavelength (nm)")
        .y_desc("Mean Intensity")
        .label_style(("sans-serif", 18))
        .axis_desc_style(("sans-serif", 20))
        .draw()
        .map_err(to_anyhow)?;

    for (label, color, curve) in curves {
        let series: Vec<(f64, f64)> = spec
            .wavelengths
            .iter()
            .zip(curve.iter())
            .map(|(&wl, &v)| (wl, v as f64))
            .collect();
        chart
            .draw_series(LineSeries::new(series, color))
            .map_err(to_anyhow)?
            .label(label)
            .legend(move |(x, y)| {
                PathElement::new(vec![(x, y), (x + 20, y)], color)
            });
    }

    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .label_font(("sans-serif", 18))
        .draw()
        .map_err(to_anyhow)?;
    Ok(())
}

fn to_anyhow<E: std::fmt::Display>(err: E) -> anyhow::Error {
    anyhow!("figure rendering: {err}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array3 as A3;

    fn cube(bands: usize, height: usize, width: usize, offset: f32) -> HyperCube {
        HyperCube::new(A3::from_shape_fn((bands, height, width), |(c, h, w)| {
            offset + (c + h + w) as f32 * 0.1
        }))
    }

    #[test]
    fn renders_a_png_for_a_small_scene() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cmp.png");

        let gt = cube(4, 6, 6, 0.0);
        let a = cube(4, 6, 6, 0.05);
        let b = cube(4, 6, 6, 0.1);
        let meas = Array2::from_shape_fn((6, 9), |(h, w)| (h + w) as f32);
        let wavelengths = crate::color::band_wavelengths(4, 450.0, 650.0);

        let spec = FigureSpec {
            gt: &gt,
            recon_a: &a,
            recon_b: &b,
            meas: &meas,
            label_a: "ours",
            label_b: "baseline",
            rgb_bands: (3, 2, 0),
            wavelengths: &wavelengths,
            patch: 4,
            show_bands: &[0, 1, 2, 3],
        };
        render_comparison(&path, &spec).unwrap();

        let img = image::open(&path).unwrap();
        assert_eq!(img.width(), FIG_WIDTH);
        assert_eq!(img.height(), FIG_HEIGHT);
    }

    #[test]
    fn rejects_out_of_range_representative_band() {
        let dir = tempfile::tempdir().unwrap();
        let gt = cube(4, 6, 6, 0.0);
        let meas = Array2::zeros((6, 9));
        let wavelengths = crate::color::band_wavelengths(4, 450.0, 650.0);

        let spec = FigureSpec {
            gt: &gt,
            recon_a: &gt,
            recon_b: &gt,
            meas: &meas,
            label_a: "a",
            label_b: "b",
            rgb_bands: (0, 1, 2),
            wavelengths: &wavelengths,
            patch: 4,
            show_bands: &[7],
        };
        assert!(render_comparison(&dir.path().join("x.png"), &spec).is_err());
    }
}
