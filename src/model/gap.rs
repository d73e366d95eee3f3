//! GAP-style unfolding reconstructor.
//!
//! Each stage alternates a measurement-consistency gradient step (learned
//! step size, residual normalised by `Φ·Φᵀ`) with a learned two-layer 3×3
//! convolutional residual denoiser. Shift-back of the measurement seeds the
//! estimate.

use anyhow::{bail, Context, Result};
use ndarray::{Array1, Array3, Array4, ArrayD};

use super::checkpoint::{check_keys, StateDict};
use super::Reconstructor;
use crate::cube::HyperCube;
use crate::mask::{shift_back, MaskSet};

const EPS: f32 = 1e-6;

// ---------------------------------------------------------------------------
// Conv2d – zero-padded same-size convolution
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct Conv2d {
    /// `out × in × kh × kw`.
    weight: Array4<f32>,
    bias: Array1<f32>,
}

impl Conv2d {
    fn zeros(out_ch: usize, in_ch: usize, kernel: usize) -> Self {
        Conv2d {
            weight: Array4::zeros((out_ch, in_ch, kernel, kernel)),
            bias: Array1::zeros(out_ch),
        }
    }

    fn apply(&self, input: &Array3<f32>) -> Array3<f32> {
        let (in_ch, height, width) = input.dim();
        let (out_ch, w_in, kh, kw) = self.weight.dim();
        debug_assert_eq!(in_ch, w_in);
        let (ph, pw) = (kh as isize / 2, kw as isize / 2);

        let mut out = Array3::zeros((out_ch, height, width));
        for o in 0..out_ch {
            for y in 0..height {
                for x in 0..width {
                    let mut acc = self.bias[o];
                    for i in 0..in_ch {
                        for dy in 0..kh {
                            for dx in 0..kw {
                                let sy = y as isize + dy as isize - ph;
                                let sx = x as isize + dx as isize - pw;
                                if sy < 0
                                    || sx < 0
                                    || sy >= height as isize
                                    || sx >= width as isize
                                {
                                    continue;
                                }
                                acc += self.weight[[o, i, dy, dx]]
                                    * input[[i, sy as usize, sx as usize]];
                            }
                        }
                    }
                    out[[o, y, x]] = acc;
                }
            }
        }
        out
    }
}

// ---------------------------------------------------------------------------
// GapNet
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct Stage {
    eta: f32,
    conv1: Conv2d,
    conv2: Conv2d,
}

/// The `gapnet` family reconstructor.
#[derive(Debug, Clone)]
pub struct GapNet {
    name: String,
    bands: usize,
    stages: Vec<Stage>,
}

impl GapNet {
    /// Fresh network with zeroed parameters: until a checkpoint is loaded it
    /// reproduces its shift-back initialisation.
    pub fn new(stages: usize, bands: usize) -> Self {
        let stage = |_| Stage {
            eta: 0.0,
            conv1: Conv2d::zeros(bands, bands, 3),
            conv2: Conv2d::zeros(bands, bands, 3),
        };
        GapNet {
            name: format!("gapnet_{stages}stg"),
            bands,
            stages: (0..stages).map(stage).collect(),
        }
    }

    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    fn take_tensor<'s>(
        state: &'s StateDict,
        key: &str,
        shape: &[usize],
    ) -> Result<&'s ArrayD<f32>> {
        let tensor = state
            .get(key)
            .with_context(|| format!("parameter '{key}' missing from checkpoint"))?;
        if tensor.shape() != shape {
            bail!(
                "parameter '{key}' has shape {:?}, expected {shape:?}",
                tensor.shape()
            );
        }
        Ok(tensor)
    }
}

impl Reconstructor for GapNet {
    fn name(&self) -> &str {
        &self.name
    }

    fn parameter_names(&self) -> Vec<String> {
        let mut names = Vec::new();
        for i in 0..self.stages.len() {
            names.push(format!("stages.{i}.eta"));
            names.push(format!("stages.{i}.conv1.weight"));
            names.push(format!("stages.{i}.conv1.bias"));
            names.push(format!("stages.{i}.conv2.weight"));
            names.push(format!("stages.{i}.conv2.bias"));
        }
        names
    }

    fn load_state(&mut self, state: &StateDict) -> Result<()> {
        check_keys(&self.parameter_names(), state)?;

        let c = self.bands;
        for (i, stage) in self.stages.iter_mut().enumerate() {
            let eta = Self::take_tensor(state, &format!("stages.{i}.eta"), &[1])?;
            stage.eta = eta[[0]];

            for (conv, label) in [(&mut stage.conv1, "conv1"), (&mut stage.conv2, "conv2")] {
                let weight =
                    Self::take_tensor(state, &format!("stages.{i}.{label}.weight"), &[c, c, 3, 3])?;
                let bias = Self::take_tensor(state, &format!("stages.{i}.{label}.bias"), &[c])?;
                conv.weight = weight
                    .clone()
                    .into_dimensionality()
                    .context("conv weight rank")?;
                conv.bias = bias.clone().into_dimensionality().context("conv bias rank")?;
            }
        }
        Ok(())
    }

    fn reconstruct(&self, meas: &ndarray::Array2<f32>, masks: &MaskSet) -> HyperCube {
        let mut x = shift_back(meas, self.bands, masks.shift_step);

        for stage in &self.stages {
            // Measurement-consistency gradient step.
            if stage.eta != 0.0 {
                let projected = masks.forward(&x);
                let mut residual = meas - &projected;
                residual.zip_mut_with(&masks.phi_phi_t, |r, &p| *r /= p + EPS);
                let correction = masks.transpose(&residual);
                x.zip_mut_with(&correction, |xv, &cv| *xv += stage.eta * cv);
            }

            // Learned residual denoiser.
            let mut features = stage.conv1.apply(&x);
            features.mapv_inplace(|v| v.max(0.0)); // ReLU
            let delta = stage.conv2.apply(&features);
            x.zip_mut_with(&delta, |xv, &dv| *xv -= dv);
        }

        HyperCube::new(x)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array2, ArrayD, IxDyn};

    fn tiny_masks(bands: usize) -> MaskSet {
        MaskSet::from_plane(&Array2::ones((4, 5)), bands, 1)
    }

    fn full_state(net: &GapNet, bands: usize, eta: f32) -> StateDict {
        let mut state = StateDict::new();
        for name in net.parameter_names() {
            let tensor = if name.ends_with(".eta") {
                ArrayD::from_shape_vec(IxDyn(&[1]), vec![eta]).unwrap()
            } else if name.ends_with(".weight") {
                ArrayD::zeros(IxDyn(&[bands, bands, 3, 3]))
            } else {
                ArrayD::zeros(IxDyn(&[bands]))
            };
            state.insert(name, tensor);
        }
        state
    }

    #[test]
    fn zeroed_net_reduces_to_shift_back() {
        let bands = 3;
        let masks = tiny_masks(bands);
        let net = GapNet::new(2, bands);

        let meas = Array2::from_shape_fn((4, masks.width_ext()), |(h, w)| (h + w) as f32);
        let recon = net.reconstruct(&meas, &masks);

        let expected = shift_back(&meas, bands, masks.shift_step);
        assert_eq!(recon.array(), &expected);
    }

    #[test]
    fn output_shape_matches_scene_geometry() {
        let bands = 3;
        let masks = tiny_masks(bands);
        let mut net = GapNet::new(1, bands);
        net.load_state(&full_state(&net, bands, 0.5)).unwrap();

        let meas = Array2::ones((4, masks.width_ext()));
        let recon = net.reconstruct(&meas, &masks);
        assert_eq!(
            (recon.bands(), recon.height(), recon.width()),
            (bands, 4, 5)
        );
    }

    #[test]
    fn load_state_rejects_missing_and_extra_keys() {
        let bands = 2;
        let mut net = GapNet::new(1, bands);

        let mut state = full_state(&net, bands, 0.0);
        state.remove("stages.0.eta");
        assert!(net.load_state(&state).is_err());

        let mut state = full_state(&net, bands, 0.0);
        state.insert(
            "stages.9.eta".into(),
            ArrayD::zeros(IxDyn(&[1])),
        );
        assert!(net.load_state(&state).is_err());
    }

    #[test]
    fn load_state_rejects_wrong_shapes() {
        let bands = 2;
        let mut net = GapNet::new(1, bands);
        let mut state = full_state(&net, bands, 0.0);
        state.insert(
            "stages.0.conv1.weight".into(),
            ArrayD::zeros(IxDyn(&[bands, bands, 5, 5])),
        );
        assert!(net.load_state(&state).is_err());
    }

    #[test]
    fn conv_identity_kernel_preserves_input() {
        let mut conv = Conv2d::zeros(2, 2, 3);
        for c in 0..2 {
            conv.weight[[c, c, 1, 1]] = 1.0;
        }
        let input = Array3::from_shape_fn((2, 3, 3), |(c, h, w)| (c * 9 + h * 3 + w) as f32);
        let out = conv.apply(&input);
        assert_eq!(out, input);
    }

    #[test]
    fn gradient_step_moves_toward_measurement() {
        // One stage, eta > 0, zero denoiser: consistency error must shrink.
        let bands = 2;
        let masks = tiny_masks(bands);
        let mut net = GapNet::new(1, bands);
        net.load_state(&full_state(&net, bands, 1.0)).unwrap();

        let meas = Array2::from_shape_fn((4, masks.width_ext()), |(h, w)| {
            1.0 + (h * w) as f32 * 0.1
        });

        let x0 = shift_back(&meas, bands, masks.shift_step);
        let err0: f32 = (&meas - &masks.forward(&x0)).mapv(f32::abs).sum();

        let recon = net.reconstruct(&meas, &masks);
        let err1: f32 = (&meas - &masks.forward(recon.array()))
            .mapv(f32::abs)
            .sum();
        assert!(err1 < err0, "gradient step should reduce residual ({err1} vs {err0})");
    }
}
