//! Inspection tools for coded-aperture hyperspectral reconstruction
//! experiments: a `.mat` → JSON converter for browser-based viewing and a
//! two-model comparison visualizer.

pub mod color;
pub mod config;
pub mod convert;
pub mod cube;
pub mod dataset;
pub mod mask;
pub mod mat;
pub mod model;
pub mod viz;
