//! MAT container codec: reading and writing Level 5 MAT-files.
//!
//! Only the subset the reconstruction pipeline actually produces is covered:
//! real numeric arrays (all integer widths, single, double), stored either
//! plain or inside zlib-compressed `miCOMPRESSED` elements. Cell arrays,
//! structs, sparse and character data are skipped with a warning on read.
//!
//! ```text
//!  .mat bytes
//!       │
//!       ▼
//!  ┌──────────┐
//!  │  reader   │  header + data elements → MatFile
//!  └──────────┘
//!       │
//!       ▼
//!  ┌──────────┐
//!  │ MatFile   │  ordered field name → ArrayD<f64>
//!  └──────────┘
//!       │
//!       ▼
//!  ┌──────────┐
//!  │  writer   │  MatFile → uncompressed mxDOUBLE elements
//!  └──────────┘
//! ```

mod read;
mod write;

pub use read::{parse, read};
pub use write::write;

use ndarray::ArrayD;

/// Field names starting with this prefix are container metadata, not data.
pub const METADATA_PREFIX: &str = "__";

// ---------------------------------------------------------------------------
// MatError
// ---------------------------------------------------------------------------

/// Errors produced by the MAT codec.
#[derive(Debug, thiserror::Error)]
pub enum MatError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed MAT file: {0}")]
    Format(String),
}

pub type Result<T> = std::result::Result<T, MatError>;

// ---------------------------------------------------------------------------
// MatFile – an ordered field → array mapping
// ---------------------------------------------------------------------------

/// The parsed contents of a MAT container, in file order.
///
/// All numeric payloads are widened to `f64` on read; layout is logical
/// (row-major) indexing regardless of the column-major on-disk order.
#[derive(Debug, Clone, Default)]
pub struct MatFile {
    entries: Vec<(String, ArrayD<f64>)>,
}

impl MatFile {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a field, replacing any existing field of the same name.
    pub fn insert(&mut self, name: impl Into<String>, array: ArrayD<f64>) {
        let name = name.into();
        if let Some(slot) = self.entries.iter_mut().find(|(n, _)| *n == name) {
            slot.1 = array;
        } else {
            self.entries.push((name, array));
        }
    }

    /// Look up a field by name.
    pub fn get(&self, name: &str) -> Option<&ArrayD<f64>> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, a)| a)
    }

    /// All fields in file order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ArrayD<f64>)> {
        self.entries.iter().map(|(n, a)| (n.as_str(), a))
    }

    /// Fields excluding reserved `__` metadata entries.
    pub fn data_fields(&self) -> impl Iterator<Item = (&str, &ArrayD<f64>)> {
        self.iter().filter(|(n, _)| !n.starts_with(METADATA_PREFIX))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Shared format constants (MAT-file Level 5)
// ---------------------------------------------------------------------------

pub(crate) const MI_INT8: u32 = 1;
pub(crate) const MI_UINT8: u32 = 2;
pub(crate) const MI_INT16: u32 = 3;
pub(crate) const MI_UINT16: u32 = 4;
pub(crate) const MI_INT32: u32 = 5;
pub(crate) const MI_UINT32: u32 = 6;
pub(crate) const MI_SINGLE: u32 = 7;
pub(crate) const MI_DOUBLE: u32 = 9;
pub(crate) const MI_INT64: u32 = 12;
pub(crate) const MI_UINT64: u32 = 13;
pub(crate) const MI_MATRIX: u32 = 14;
pub(crate) const MI_COMPRESSED: u32 = 15;

pub(crate) const MX_DOUBLE_CLASS: u8 = 6;

/// Round `n` up to the 8-byte element alignment.
pub(crate) fn pad8(n: usize) -> usize {
    (n + 7) & !7
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn insert_replaces_existing_field() {
        let mut mat = MatFile::new();
        mat.insert("a", array![[1.0]].into_dyn());
        mat.insert("a", array![[2.0]].into_dyn());
        assert_eq!(mat.len(), 1);
        assert_eq!(mat.get("a").unwrap()[[0, 0]], 2.0);
    }

    #[test]
    fn data_fields_skip_metadata_prefix() {
        let mut mat = MatFile::new();
        mat.insert("__header__", array![[0.0]].into_dyn());
        mat.insert("img", array![[1.0]].into_dyn());
        let names: Vec<&str> = mat.data_fields().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["img"]);
    }

    #[test]
    fn pad8_rounds_up() {
        assert_eq!(pad8(0), 0);
        assert_eq!(pad8(1), 8);
        assert_eq!(pad8(8), 8);
        assert_eq!(pad8(13), 16);
    }
}
