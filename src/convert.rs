//! `.mat` → `.json` / `.json.gz` conversion for browser-based inspection.
//!
//! Numeric arrays become nested JSON sequences (row-major), single-element
//! arrays collapse to a bare number, and reserved `__` metadata fields are
//! dropped. The JSON body is serialised once in memory so the plain and
//! gzipped outputs are byte-identical.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use flate2::write::GzEncoder;
use flate2::Compression;
use ndarray::{ArrayD, ArrayViewD};
use serde_json::{Map, Number, Value};

use crate::mat;

// ---------------------------------------------------------------------------
// Conversion report
// ---------------------------------------------------------------------------

/// Shape summary for one converted field.
#[derive(Debug, Clone)]
pub struct FieldInfo {
    pub name: String,
    pub shape: Vec<usize>,
}

/// Everything the CLI needs to print after a successful conversion.
#[derive(Debug)]
pub struct ConversionReport {
    pub fields: Vec<FieldInfo>,
    pub json_path: PathBuf,
    pub gz_path: PathBuf,
    pub mat_bytes: u64,
    pub json_bytes: u64,
    pub gz_bytes: u64,
}

impl ConversionReport {
    /// Size of `bytes` relative to the original container, in percent.
    pub fn ratio(&self, bytes: u64) -> f64 {
        bytes as f64 / self.mat_bytes as f64 * 100.0
    }
}

// ---------------------------------------------------------------------------
// Conversion pipeline
// ---------------------------------------------------------------------------

/// Convert `mat_path` into `<stem>.json` and `<stem>.json.gz` next to it.
pub fn convert(mat_path: &Path) -> Result<ConversionReport> {
    if !mat_path.exists() {
        bail!("file '{}' not found", mat_path.display());
    }

    log::info!("loading {}", mat_path.display());
    let container = mat::read(mat_path)
        .with_context(|| format!("loading '{}'", mat_path.display()))?;

    let mut fields = Vec::new();
    let mut body = Map::new();
    for (name, array) in container.data_fields() {
        fields.push(FieldInfo {
            name: name.to_string(),
            shape: array.shape().to_vec(),
        });
        body.insert(name.to_string(), array_to_json(array));
    }

    // Serialise fully before touching the filesystem so a malformed container
    // cannot leave a stale .json behind.
    let json = serde_json::to_vec(&Value::Object(body)).context("encoding JSON")?;

    let json_path = mat_path.with_extension("json");
    let gz_path = mat_path.with_extension("json.gz");

    log::info!("saving {}", json_path.display());
    fs::write(&json_path, &json)
        .with_context(|| format!("writing '{}'", json_path.display()))?;

    log::info!("saving compressed {}", gz_path.display());
    let gz_file = fs::File::create(&gz_path)
        .with_context(|| format!("creating '{}'", gz_path.display()))?;
    let mut encoder = GzEncoder::new(gz_file, Compression::default());
    encoder
        .write_all(&json)
        .with_context(|| format!("writing '{}'", gz_path.display()))?;
    encoder
        .finish()
        .with_context(|| format!("finishing '{}'", gz_path.display()))?;

    Ok(ConversionReport {
        fields,
        mat_bytes: fs::metadata(mat_path)?.len(),
        json_bytes: fs::metadata(&json_path)?.len(),
        gz_bytes: fs::metadata(&gz_path)?.len(),
        json_path,
        gz_path,
    })
}

// ---------------------------------------------------------------------------
// Array → JSON value
// ---------------------------------------------------------------------------

/// Nested-sequence encoding; a single-element array becomes a bare number.
fn array_to_json(array: &ArrayD<f64>) -> Value {
    if array.len() == 1 {
        return number(array.iter().next().copied().unwrap_or(f64::NAN));
    }
    nest(array.view())
}

fn nest(view: ArrayViewD<'_, f64>) -> Value {
    match view.ndim() {
        0 => number(*view.iter().next().unwrap_or(&f64::NAN)),
        1 => Value::Array(view.iter().map(|&v| number(v)).collect()),
        _ => Value::Array(view.outer_iter().map(nest).collect()),
    }
}

/// JSON has no NaN/Inf; non-finite values become `null`.
fn number(v: f64) -> Value {
    Number::from_f64(v).map(Value::Number).unwrap_or(Value::Null)
}
