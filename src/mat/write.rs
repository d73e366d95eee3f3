//! Level 5 MAT-file writer.
//!
//! Emits uncompressed `mxDOUBLE_CLASS` matrices only, which is what the
//! downstream MATLAB/Python tooling expects of reconstruction dumps. Output
//! is always little-endian.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use byteorder::{LittleEndian, WriteBytesExt};
use ndarray::ArrayD;

use super::{pad8, MatFile, Result, MI_DOUBLE, MI_INT32, MI_INT8, MI_MATRIX, MI_UINT32, MX_DOUBLE_CLASS};

const HEADER_TEXT: &str = "MATLAB 5.0 MAT-file, written by hsi-tools";

/// Write all fields of `mat` to `path` as a Level 5 MAT file.
pub fn write(path: &Path, mat: &MatFile) -> Result<()> {
    let file = File::create(path)?;
    let mut w = BufWriter::new(file);

    write_header(&mut w)?;
    for (name, array) in mat.iter() {
        write_matrix(&mut w, name, array)?;
    }
    w.flush()?;
    Ok(())
}

fn write_header(w: &mut impl Write) -> std::io::Result<()> {
    let mut text = [0x20u8; 116]; // space-padded descriptive text
    let bytes = HEADER_TEXT.as_bytes();
    text[..bytes.len()].copy_from_slice(bytes);
    w.write_all(&text)?;
    w.write_all(&[0u8; 8])?; // subsystem data offset (none)
    w.write_u16::<LittleEndian>(0x0100)?; // version
    w.write_all(b"IM")?; // endian indicator
    Ok(())
}

/// Write one `miMATRIX` element with flags, dimensions, name and data
/// sub-elements, each padded to the 8-byte alignment.
fn write_matrix(w: &mut impl Write, name: &str, array: &ArrayD<f64>) -> std::io::Result<()> {
    // MAT arrays have at least two dimensions; pad a trailing 1 where needed.
    let mut dims: Vec<i32> = array.shape().iter().map(|&d| d as i32).collect();
    while dims.len() < 2 {
        dims.push(1);
    }

    let dims_bytes = dims.len() * 4;
    let name_bytes = name.len();
    let data_bytes = array.len() * 8;
    let total = 16 // array flags
        + 8 + pad8(dims_bytes)
        + 8 + pad8(name_bytes)
        + 8 + data_bytes;

    w.write_u32::<LittleEndian>(MI_MATRIX)?;
    w.write_u32::<LittleEndian>(total as u32)?;

    // Array flags: class in the low byte of the first word.
    w.write_u32::<LittleEndian>(MI_UINT32)?;
    w.write_u32::<LittleEndian>(8)?;
    w.write_u32::<LittleEndian>(MX_DOUBLE_CLASS as u32)?;
    w.write_u32::<LittleEndian>(0)?;

    // Dimensions.
    w.write_u32::<LittleEndian>(MI_INT32)?;
    w.write_u32::<LittleEndian>(dims_bytes as u32)?;
    for &d in &dims {
        w.write_i32::<LittleEndian>(d)?;
    }
    write_padding(w, dims_bytes)?;

    // Array name.
    w.write_u32::<LittleEndian>(MI_INT8)?;
    w.write_u32::<LittleEndian>(name_bytes as u32)?;
    w.write_all(name.as_bytes())?;
    write_padding(w, name_bytes)?;

    // Real part, column-major: row-major traversal of the transposed view.
    w.write_u32::<LittleEndian>(MI_DOUBLE)?;
    w.write_u32::<LittleEndian>(data_bytes as u32)?;
    for &v in array.t().iter() {
        w.write_f64::<LittleEndian>(v)?;
    }
    Ok(())
}

fn write_padding(w: &mut impl Write, written: usize) -> std::io::Result<()> {
    let pad = pad8(written) - written;
    if pad > 0 {
        w.write_all(&[0u8; 8][..pad])?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mat::{parse, read};
    use byteorder::ByteOrder;
    use ndarray::{array, Array3};
    use std::io::Write as _;

    fn sample() -> MatFile {
        let mut mat = MatFile::new();
        mat.insert("scalar", ndarray::arr0(3.5).into_dyn());
        mat.insert("plane", array![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]].into_dyn());
        mat.insert(
            "cube",
            Array3::from_shape_fn((2, 3, 4), |(c, h, w)| (c * 100 + h * 10 + w) as f64).into_dyn(),
        );
        mat
    }

    #[test]
    fn round_trip_preserves_names_shapes_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sample.mat");

        let original = sample();
        write(&path, &original).unwrap();
        let loaded = read(&path).unwrap();

        assert_eq!(loaded.len(), original.len());
        // Scalars come back as the padded 1x1 shape.
        assert_eq!(loaded.get("scalar").unwrap().shape(), &[1, 1]);
        assert_eq!(loaded.get("scalar").unwrap()[[0, 0]], 3.5);

        let plane = loaded.get("plane").unwrap();
        assert_eq!(plane.shape(), &[2, 3]);
        assert_eq!(plane[[1, 2]], 6.0);

        let cube = loaded.get("cube").unwrap();
        assert_eq!(cube.shape(), &[2, 3, 4]);
        assert_eq!(cube[[1, 2, 3]], 123.0);
    }

    #[test]
    fn element_sizes_honour_alignment() {
        // A name that is not a multiple of 8 forces the padding path.
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("padded.mat");

        let mut mat = MatFile::new();
        mat.insert("abc", array![[1.0, 2.0]].into_dyn());
        write(&path, &mat).unwrap();

        let bytes = std::fs::read(&path).unwrap();
        // Element byte count (after the 128-byte header, tag word 2) must
        // cover the rest of the file exactly.
        let total = byteorder::LittleEndian::read_u32(&bytes[132..136]) as usize;
        assert_eq!(128 + 8 + total, bytes.len());

        let loaded = read(&path).unwrap();
        assert_eq!(loaded.get("abc").unwrap().shape(), &[1, 2]);
    }

    #[test]
    fn reader_inflates_compressed_elements() {
        // Re-wrap the writer's matrix element in an miCOMPRESSED envelope.
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plain.mat");
        let mut mat = MatFile::new();
        mat.insert("m", array![[7.0, 8.0], [9.0, 10.0]].into_dyn());
        write(&path, &mat).unwrap();

        let plain = std::fs::read(&path).unwrap();
        let element = &plain[128..];

        let mut encoder =
            flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::default());
        encoder.write_all(element).unwrap();
        let compressed = encoder.finish().unwrap();

        let mut bytes = plain[..128].to_vec();
        let mut tag = Vec::new();
        tag.write_u32::<LittleEndian>(crate::mat::MI_COMPRESSED).unwrap();
        tag.write_u32::<LittleEndian>(compressed.len() as u32).unwrap();
        bytes.extend_from_slice(&tag);
        bytes.extend_from_slice(&compressed);

        let loaded = parse(&bytes).unwrap();
        let m = loaded.get("m").unwrap();
        assert_eq!(m.shape(), &[2, 2]);
        assert_eq!(m[[1, 0]], 9.0);
    }
}
