//! Visualization pipeline: inference over the test set plus figure output.
//!
//! ```text
//!  checkpoints          test scenes          mask.mat
//!       │                    │                   │
//!       ▼                    ▼                   ▼
//!  ┌──────────┐        ┌──────────┐        ┌──────────┐
//!  │  models   │        │ dataset   │        │ MaskSet   │
//!  └──────────┘        └──────────┘        └──────────┘
//!       │                    │                   │
//!       └─────────── per-sample loop ────────────┘
//!                         │
//!        ┌────────────────┼──────────────────┐
//!        ▼                ▼                  ▼
//!   mat_<label>/    <stem>_recon_rgb    <stem>_comparison
//!   <stem>.mat          .png                .png
//! ```

pub mod figure;
pub mod render;

use anyhow::{bail, Context, Result};

use crate::config::VisualizeConfig;
use crate::cube::HyperCube;
use crate::dataset::{load_cube, TestSet};
use crate::mask::{synthesize, MaskSet};
use crate::model::{load_pretrained, Reconstructor};
use crate::{color, mat};

/// Run the whole visualization pass, strictly sequentially.
pub fn run(cfg: &VisualizeConfig) -> Result<()> {
    let models: Vec<Box<dyn Reconstructor>> = cfg
        .models
        .iter()
        .map(|spec| {
            load_pretrained(&spec.method, cfg.bands, &spec.checkpoint)
                .with_context(|| format!("loading model '{}'", spec.label))
        })
        .collect::<Result<_>>()?;

    let masks = MaskSet::from_mat(&cfg.mask_path, cfg.bands, cfg.shift_step)?;
    let tests = TestSet::scan(&cfg.test_data_dir)?;
    if tests.is_empty() {
        bail!(
            "no .mat scenes found in '{}'",
            cfg.test_data_dir.display()
        );
    }

    std::fs::create_dir_all(&cfg.output_root)
        .with_context(|| format!("creating '{}'", cfg.output_root.display()))?;
    for spec in &cfg.models {
        let dir = cfg.mat_dir(&spec.label);
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("creating '{}'", dir.display()))?;
    }

    let wavelengths =
        color::band_wavelengths(cfg.bands, cfg.wavelength_start, cfg.wavelength_end);

    for sample in tests.iter() {
        log::info!("processing {}", sample.stem);
        let gt = load_cube(&sample.path)?;
        let meas = synthesize(&gt, &masks, cfg.setting)
            .with_context(|| format!("sample '{}'", sample.stem))?;

        let recons: Vec<HyperCube> = models
            .iter()
            .map(|m| m.reconstruct(&meas, &masks))
            .collect();

        // Persist reconstructions in the MATLAB H x W x C layout.
        for (spec, recon) in cfg.models.iter().zip(recons.iter()) {
            let mut out = mat::MatFile::new();
            out.insert("recon", recon.to_hwc_f64());
            let path = cfg.mat_dir(&spec.label).join(format!("{}.mat", sample.stem));
            mat::write(&path, &out)
                .with_context(|| format!("writing '{}'", path.display()))?;
            log::info!("  saved {}", path.display());
        }

        // Standalone pseudo-RGB of the first model's reconstruction.
        let rgb_bands = (cfg.rgb_bands[0], cfg.rgb_bands[1], cfg.rgb_bands[2]);
        let rgb_path = cfg
            .output_root
            .join(format!("{}_recon_rgb.png", sample.stem));
        render::save_rgb(&rgb_path, &recons[0].pseudo_rgb(rgb_bands)?)?;

        let figure_path = cfg
            .output_root
            .join(format!("{}_comparison.png", sample.stem));
        figure::render_comparison(
            &figure_path,
            &figure::FigureSpec {
                gt: &gt,
                recon_a: &recons[0],
                recon_b: &recons[1],
                meas: &meas,
                label_a: &cfg.models[0].label,
                label_b: &cfg.models[1].label,
                rgb_bands,
                wavelengths: &wavelengths,
                patch: cfg.patch,
                show_bands: &cfg.show_bands,
            },
        )?;
        log::info!("  saved {}", figure_path.display());
    }

    println!(
        "Visualization complete. Results saved in '{}'.",
        cfg.output_root.display()
    );
    Ok(())
}
