//! Test-set enumeration and ground-truth cube loading.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};

use crate::cube::HyperCube;
use crate::mat;

/// Field names tried, in order, when pulling a cube out of a MAT container.
const CUBE_FIELDS: &[&str] = &["img", "truth", "img_expand", "orig"];

// ---------------------------------------------------------------------------
// TestSet
// ---------------------------------------------------------------------------

/// One test scene: the file stem names every derived output.
#[derive(Debug, Clone)]
pub struct TestSample {
    pub stem: String,
    pub path: PathBuf,
}

/// The enumerated test directory, sorted by stem.
#[derive(Debug, Clone)]
pub struct TestSet {
    samples: Vec<TestSample>,
}

impl TestSet {
    /// Scan `dir` for `*.mat` files.
    pub fn scan(dir: &Path) -> Result<Self> {
        let entries = std::fs::read_dir(dir)
            .with_context(|| format!("reading test directory '{}'", dir.display()))?;

        let mut samples = Vec::new();
        for entry in entries {
            let path = entry?.path();
            let is_mat = path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e.eq_ignore_ascii_case("mat"));
            if !is_mat {
                continue;
            }
            let stem = path
                .file_stem()
                .and_then(|s| s.to_str())
                .map(str::to_owned)
                .with_context(|| format!("non-UTF-8 file name '{}'", path.display()))?;
            samples.push(TestSample { stem, path });
        }
        samples.sort_by(|a, b| a.stem.cmp(&b.stem));

        Ok(TestSet { samples })
    }

    pub fn iter(&self) -> impl Iterator<Item = &TestSample> {
        self.samples.iter()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Load a ground-truth cube, trying the conventional field names first and
/// falling back to the first 3-D field in the container.
pub fn load_cube(path: &Path) -> Result<HyperCube> {
    let container =
        mat::read(path).with_context(|| format!("loading '{}'", path.display()))?;

    for &field in CUBE_FIELDS {
        if let Some(raw) = container.get(field) {
            return HyperCube::from_dyn(raw)
                .with_context(|| format!("field '{}' of '{}'", field, path.display()));
        }
    }
    if let Some((name, raw)) = container.data_fields().find(|(_, a)| a.ndim() == 3) {
        return HyperCube::from_dyn(raw)
            .with_context(|| format!("field '{}' of '{}'", name, path.display()));
    }

    bail!(
        "no hyperspectral cube found in '{}' (tried fields {:?})",
        path.display(),
        CUBE_FIELDS
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mat::MatFile;
    use ndarray::ArrayD;
    use ndarray::Dimension;

    fn cube_field(shape: &[usize]) -> ArrayD<f64> {
        ArrayD::from_shape_fn(ndarray::IxDyn(shape), |idx| {
            idx.slice().iter().sum::<usize>() as f64
        })
    }

    #[test]
    fn scan_sorts_by_stem_and_ignores_other_extensions() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["scene02.mat", "scene01.mat", "notes.txt"] {
            std::fs::write(dir.path().join(name), b"x").unwrap();
        }

        let set = TestSet::scan(dir.path()).unwrap();
        let stems: Vec<&str> = set.iter().map(|s| s.stem.as_str()).collect();
        assert_eq!(stems, vec!["scene01", "scene02"]);
    }

    #[test]
    fn load_cube_prefers_conventional_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scene.mat");

        let mut fixture = MatFile::new();
        fixture.insert("extra", cube_field(&[2, 2]));
        fixture.insert("img", cube_field(&[6, 7, 3]));
        mat::write(&path, &fixture).unwrap();

        let cube = load_cube(&path).unwrap();
        assert_eq!((cube.bands(), cube.height(), cube.width()), (3, 6, 7));
    }

    #[test]
    fn load_cube_falls_back_to_first_3d_field() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scene.mat");

        let mut fixture = MatFile::new();
        fixture.insert("whatever", cube_field(&[5, 5, 2]));
        mat::write(&path, &fixture).unwrap();

        let cube = load_cube(&path).unwrap();
        assert_eq!(cube.bands(), 2);
    }

    #[test]
    fn load_cube_errors_without_any_cube() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("flat.mat");

        let mut fixture = MatFile::new();
        fixture.insert("mask", cube_field(&[4, 4]));
        mat::write(&path, &fixture).unwrap();

        assert!(load_cube(&path).is_err());
    }
}
