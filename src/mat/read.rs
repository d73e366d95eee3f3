//! Level 5 MAT-file reader.
//!
//! Layout (all multi-byte values in the file's own endianness):
//! ```text
//! bytes 0-115:   descriptive text
//! bytes 116-123: subsystem data offset (unused here)
//! bytes 124-125: version (0x0100)
//! bytes 126-127: endian indicator – "IM" little-endian, "MI" big-endian
//! then:          a sequence of tagged data elements
//! ```
//! Each element tag is 8 bytes (u32 type, u32 byte count) unless the upper
//! half of the first word is non-zero, in which case it is a "small data
//! element": type and count packed into one word, payload in the next 4
//! bytes. Element payloads are padded to 8-byte boundaries.

use std::io::Read;
use std::path::Path;

use byteorder::{BigEndian, ByteOrder, LittleEndian};
use ndarray::{ArrayD, IxDyn, ShapeBuilder};

use super::{
    pad8, MatError, MatFile, Result, MI_COMPRESSED, MI_DOUBLE, MI_INT16, MI_INT32, MI_INT64,
    MI_INT8, MI_MATRIX, MI_SINGLE, MI_UINT16, MI_UINT32, MI_UINT64, MI_UINT8,
};

/// Read and parse a MAT file from disk.
pub fn read(path: &Path) -> Result<MatFile> {
    let bytes = std::fs::read(path)?;
    parse(&bytes)
}

/// Parse a MAT container from an in-memory byte buffer.
pub fn parse(bytes: &[u8]) -> Result<MatFile> {
    if bytes.len() < 128 {
        return Err(MatError::Format(format!(
            "file too short for a MAT header ({} bytes)",
            bytes.len()
        )));
    }

    let mut mat = MatFile::new();
    match &bytes[126..128] {
        b"IM" => read_elements::<LittleEndian>(&bytes[128..], &mut mat)?,
        b"MI" => read_elements::<BigEndian>(&bytes[128..], &mut mat)?,
        other => {
            return Err(MatError::Format(format!(
                "bad endian indicator {:?} (not a Level 5 MAT file?)",
                other
            )))
        }
    }
    Ok(mat)
}

// ---------------------------------------------------------------------------
// Element stream
// ---------------------------------------------------------------------------

/// One tagged data element: type code and payload slice.
struct Element<'a> {
    dtype: u32,
    payload: &'a [u8],
}

/// Cursor over a sequence of tagged elements.
struct Elements<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Elements<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Elements { buf, pos: 0 }
    }

    /// Decode the next element, or `None` at end of buffer.
    fn next<E: ByteOrder>(&mut self) -> Result<Option<Element<'a>>> {
        if self.pos + 8 > self.buf.len() {
            return Ok(None);
        }
        let word = E::read_u32(&self.buf[self.pos..self.pos + 4]);

        let (dtype, nbytes, data_start, advance) = if word >> 16 != 0 {
            // Small data element: type and length share the first word.
            (word & 0xffff, (word >> 16) as usize, self.pos + 4, 8)
        } else {
            let nbytes = E::read_u32(&self.buf[self.pos + 4..self.pos + 8]) as usize;
            (word, nbytes, self.pos + 8, 8 + pad8(nbytes))
        };

        let data_end = data_start + nbytes;
        if data_end > self.buf.len() {
            return Err(MatError::Format(format!(
                "element type {} claims {} bytes but only {} remain",
                dtype,
                nbytes,
                self.buf.len() - data_start
            )));
        }

        let payload = &self.buf[data_start..data_end];
        self.pos += advance;
        Ok(Some(Element { dtype, payload }))
    }
}

/// Walk the top-level element sequence, collecting numeric matrices.
fn read_elements<E: ByteOrder>(buf: &[u8], mat: &mut MatFile) -> Result<()> {
    let mut elements = Elements::new(buf);
    while let Some(el) = elements.next::<E>()? {
        match el.dtype {
            MI_COMPRESSED => {
                let inflated = inflate(el.payload)?;
                read_elements::<E>(&inflated, mat)?;
            }
            MI_MATRIX => {
                if let Some((name, array)) = decode_matrix::<E>(el.payload)? {
                    mat.insert(name, array);
                }
            }
            other => log::warn!("skipping unsupported top-level element type {other}"),
        }
    }
    Ok(())
}

/// Inflate a zlib-compressed `miCOMPRESSED` payload.
fn inflate(data: &[u8]) -> Result<Vec<u8>> {
    let mut decoder = flate2::read::ZlibDecoder::new(data);
    let mut out = Vec::new();
    decoder
        .read_to_end(&mut out)
        .map_err(|e| MatError::Format(format!("zlib: {e}")))?;
    Ok(out)
}

// ---------------------------------------------------------------------------
// miMATRIX decoding
// ---------------------------------------------------------------------------

// Numeric mxCLASS range (mxDOUBLE_CLASS..=mxUINT64_CLASS).
const NUMERIC_CLASSES: std::ops::RangeInclusive<u8> = 6..=15;

/// Decode one `miMATRIX` element into `(name, array)`.
///
/// Returns `Ok(None)` for array classes outside the numeric subset.
fn decode_matrix<E: ByteOrder>(payload: &[u8]) -> Result<Option<(String, ArrayD<f64>)>> {
    let mut sub = Elements::new(payload);

    // 1. Array flags: class in the low byte, flag bits in the next.
    let flags_el = expect_sub::<E>(&mut sub, "array flags")?;
    if flags_el.payload.len() < 8 {
        return Err(MatError::Format("array flags element too short".into()));
    }
    let flags_word = E::read_u32(&flags_el.payload[0..4]);
    let class = (flags_word & 0xff) as u8;
    let complex = flags_word & 0x0800 != 0;

    // 2. Dimensions.
    let dims_el = expect_sub::<E>(&mut sub, "dimensions")?;
    let dims: Vec<usize> = dims_el
        .payload
        .chunks_exact(4)
        .map(|c| E::read_i32(c) as usize)
        .collect();

    // 3. Array name.
    let name_el = expect_sub::<E>(&mut sub, "array name")?;
    let name = String::from_utf8_lossy(name_el.payload).into_owned();

    if !NUMERIC_CLASSES.contains(&class) {
        log::warn!("skipping field '{name}': unsupported array class {class}");
        return Ok(None);
    }
    if complex {
        log::warn!("field '{name}' is complex; keeping the real part only");
    }

    // 4. Real part.
    let real_el = expect_sub::<E>(&mut sub, "real part")?;
    let values = decode_numeric::<E>(real_el.dtype, real_el.payload)?;

    let expected: usize = dims.iter().product();
    if values.len() != expected {
        return Err(MatError::Format(format!(
            "field '{}': {} values for dimensions {:?}",
            name,
            values.len(),
            dims
        )));
    }

    // On-disk order is column-major; build a Fortran-layout array so logical
    // indexing matches MATLAB's.
    let array = ArrayD::from_shape_vec(IxDyn(&dims).f(), values)
        .map_err(|e| MatError::Format(format!("field '{name}': {e}")))?;
    Ok(Some((name, array)))
}

fn expect_sub<'a, E: ByteOrder>(sub: &mut Elements<'a>, what: &str) -> Result<Element<'a>> {
    sub.next::<E>()?
        .ok_or_else(|| MatError::Format(format!("matrix element truncated before {what}")))
}

/// Widen a raw numeric payload of the given element type to `f64`.
fn decode_numeric<E: ByteOrder>(dtype: u32, data: &[u8]) -> Result<Vec<f64>> {
    fn chunked<T>(data: &[u8], width: usize, f: impl Fn(&[u8]) -> T) -> Vec<T> {
        data.chunks_exact(width).map(|c| f(c)).collect()
    }

    let values = match dtype {
        MI_INT8 => data.iter().map(|&b| b as i8 as f64).collect(),
        MI_UINT8 => data.iter().map(|&b| b as f64).collect(),
        MI_INT16 => chunked(data, 2, |c| E::read_i16(c) as f64),
        MI_UINT16 => chunked(data, 2, |c| E::read_u16(c) as f64),
        MI_INT32 => chunked(data, 4, |c| E::read_i32(c) as f64),
        MI_UINT32 => chunked(data, 4, |c| E::read_u32(c) as f64),
        MI_SINGLE => chunked(data, 4, |c| E::read_f32(c) as f64),
        MI_DOUBLE => chunked(data, 8, E::read_f64),
        MI_INT64 => chunked(data, 8, |c| E::read_i64(c) as f64),
        MI_UINT64 => chunked(data, 8, |c| E::read_u64(c) as f64),
        other => {
            return Err(MatError::Format(format!(
                "unsupported numeric element type {other}"
            )))
        }
    };
    Ok(values)
}
