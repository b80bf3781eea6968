//! Trace Persistence
//!
//! Saves and loads trace batches as NumPy `.npy` files (v1.0 header,
//! little-endian f64, C order) with a JSON metadata sidecar. The pair
//! `{stem}.npy` / `{stem}_metadata.json` is the interchange format the
//! tuning front-end consumes.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};
use tracing::debug;

use crate::error::{IoError, IoResult};
use crate::metadata::{TraceMetadata, DTYPE_F64_LE};

const NPY_MAGIC: &[u8; 6] = b"\x93NUMPY";

/// .npy headers are padded so the data section starts on this alignment.
const NPY_HEADER_ALIGN: usize = 64;

/// A batch of traces stored row-major: one row per cell, one column per
/// timepoint. Rows are rectangular by construction.
#[derive(Debug, Clone, PartialEq)]
pub struct TraceBatch {
    data: Vec<f64>,
    num_cells: usize,
    num_timepoints: usize,
}

impl TraceBatch {
    /// Build a batch from per-cell rows. Ragged rows are rejected.
    pub fn from_rows(rows: &[Vec<f64>]) -> IoResult<Self> {
        let num_cells = rows.len();
        let num_timepoints = rows.first().map_or(0, |r| r.len());

        let mut data = Vec::with_capacity(num_cells * num_timepoints);
        for (row_idx, row) in rows.iter().enumerate() {
            if row.len() != num_timepoints {
                return Err(IoError::RaggedRows {
                    row: row_idx,
                    expected: num_timepoints,
                    got: row.len(),
                });
            }
            data.extend_from_slice(row);
        }

        Ok(Self {
            data,
            num_cells,
            num_timepoints,
        })
    }

    /// Build a batch from a row-major flat buffer.
    pub fn from_flat(data: Vec<f64>, num_cells: usize, num_timepoints: usize) -> IoResult<Self> {
        let expected = num_cells * num_timepoints;
        if data.len() != expected {
            return Err(IoError::DataSizeMismatch {
                expected,
                got: data.len(),
            });
        }
        Ok(Self {
            data,
            num_cells,
            num_timepoints,
        })
    }

    /// One cell's trace.
    pub fn row(&self, cell: usize) -> &[f64] {
        let start = cell * self.num_timepoints;
        &self.data[start..start + self.num_timepoints]
    }

    /// Iterate traces in cell order.
    pub fn rows(&self) -> impl Iterator<Item = &[f64]> {
        (0..self.num_cells).map(|cell| self.row(cell))
    }

    /// Copy out per-cell rows.
    pub fn to_rows(&self) -> Vec<Vec<f64>> {
        self.rows().map(|r| r.to_vec()).collect()
    }

    pub fn num_cells(&self) -> usize {
        self.num_cells
    }

    pub fn num_timepoints(&self) -> usize {
        self.num_timepoints
    }
}

fn npy_path(stem: &Path) -> PathBuf {
    let mut s = stem.as_os_str().to_os_string();
    s.push(".npy");
    PathBuf::from(s)
}

fn metadata_path(stem: &Path) -> PathBuf {
    let mut s = stem.as_os_str().to_os_string();
    s.push("_metadata.json");
    PathBuf::from(s)
}

/// Save a trace batch in the tuning interchange format.
///
/// Writes `{stem}.npy` (f64, C order, shape `(num_cells, num_timepoints)`)
/// and `{stem}_metadata.json`. User metadata in `extra` is merged into the
/// sidecar; the built-in keys take precedence.
pub fn save_for_tuning(
    batch: &TraceBatch,
    fs: f64,
    stem: &Path,
    extra: Option<Map<String, Value>>,
) -> IoResult<()> {
    let metadata = TraceMetadata::new(fs, batch.num_cells, batch.num_timepoints)
        .with_extra(extra.unwrap_or_default());
    metadata.validate()?;

    write_npy(&npy_path(stem), batch)?;

    let json = serde_json::to_string_pretty(&metadata)?;
    let mut file = File::create(metadata_path(stem))?;
    file.write_all(json.as_bytes())?;

    debug!(
        cells = batch.num_cells,
        timepoints = batch.num_timepoints,
        "saved trace batch"
    );
    Ok(())
}

/// Load a trace batch and its sidecar saved by [`save_for_tuning`].
///
/// Missing data and sidecar files give distinct errors; the array shape
/// is cross-checked against the sidecar dimensions.
pub fn load_tuning_data(stem: &Path) -> IoResult<(TraceBatch, TraceMetadata)> {
    let npy = npy_path(stem);
    let json = metadata_path(stem);

    if !npy.exists() {
        return Err(IoError::TraceFileNotFound(npy));
    }
    if !json.exists() {
        return Err(IoError::MetadataFileNotFound(json));
    }

    let batch = read_npy(&npy)?;

    let text = std::fs::read_to_string(&json)?;
    let metadata: TraceMetadata = serde_json::from_str(&text)?;
    metadata.validate()?;

    if metadata.num_cells != batch.num_cells || metadata.num_timepoints != batch.num_timepoints {
        return Err(IoError::ShapeMismatch {
            meta_cells: metadata.num_cells,
            meta_timepoints: metadata.num_timepoints,
            cells: batch.num_cells,
            timepoints: batch.num_timepoints,
        });
    }

    Ok((batch, metadata))
}

fn write_npy(path: &Path, batch: &TraceBatch) -> IoResult<()> {
    let mut file = BufWriter::new(File::create(path)?);

    let header_dict = format!(
        "{{'descr': '{}', 'fortran_order': False, 'shape': ({}, {}), }}",
        DTYPE_F64_LE, batch.num_cells, batch.num_timepoints
    );

    // Pad so the data section starts on a 64-byte boundary, newline last
    let unpadded = NPY_MAGIC.len() + 4 + header_dict.len() + 1;
    let padding = (NPY_HEADER_ALIGN - unpadded % NPY_HEADER_ALIGN) % NPY_HEADER_ALIGN;
    let header_len = header_dict.len() + padding + 1;

    file.write_all(NPY_MAGIC)?;
    file.write_all(&[1u8, 0u8])?; // version 1.0
    file.write_all(&(header_len as u16).to_le_bytes())?;
    file.write_all(header_dict.as_bytes())?;
    file.write_all(&b" ".repeat(padding))?;
    file.write_all(b"\n")?;

    for &v in &batch.data {
        file.write_all(&v.to_le_bytes())?;
    }
    file.flush()?;
    Ok(())
}

fn read_npy(path: &Path) -> IoResult<TraceBatch> {
    let mut file = BufReader::new(File::open(path)?);

    let mut magic = [0u8; 6];
    file.read_exact(&mut magic)?;
    if &magic != NPY_MAGIC {
        return Err(IoError::BadNpyMagic);
    }

    let mut version = [0u8; 2];
    file.read_exact(&mut version)?;
    if version[0] != 1 {
        return Err(IoError::UnsupportedNpyVersion {
            major: version[0],
            minor: version[1],
        });
    }

    let mut len_bytes = [0u8; 2];
    file.read_exact(&mut len_bytes)?;
    let header_len = u16::from_le_bytes(len_bytes) as usize;

    let mut header_bytes = vec![0u8; header_len];
    file.read_exact(&mut header_bytes)?;
    let header = String::from_utf8_lossy(&header_bytes);

    let (num_cells, num_timepoints) = parse_npy_header(&header)?;

    let mut raw = Vec::new();
    file.read_to_end(&mut raw)?;

    let expected = num_cells * num_timepoints;
    if raw.len() != expected * 8 {
        return Err(IoError::DataSizeMismatch {
            expected,
            got: raw.len() / 8,
        });
    }

    let data: Vec<f64> = raw
        .chunks_exact(8)
        .map(|b| f64::from_le_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]]))
        .collect();

    TraceBatch::from_flat(data, num_cells, num_timepoints)
}

/// Parse the dict-literal .npy header: dtype, memory order, and shape.
/// A 1-D shape `(n,)` is treated as a single-cell batch.
fn parse_npy_header(header: &str) -> IoResult<(usize, usize)> {
    let descr = extract_quoted_value(header, "descr")
        .ok_or_else(|| IoError::BadNpyHeader("missing 'descr'".to_string()))?;
    if descr != DTYPE_F64_LE {
        return Err(IoError::UnsupportedDtype(descr));
    }

    if header.contains("'fortran_order': True") {
        return Err(IoError::FortranOrder);
    }
    if !header.contains("'fortran_order': False") {
        return Err(IoError::BadNpyHeader(
            "missing 'fortran_order'".to_string(),
        ));
    }

    let open = header
        .find('(')
        .ok_or_else(|| IoError::BadNpyHeader("missing shape".to_string()))?;
    let close = header[open..]
        .find(')')
        .map(|i| open + i)
        .ok_or_else(|| IoError::BadNpyHeader("unterminated shape".to_string()))?;

    let dims: Vec<usize> = header[open + 1..close]
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<usize>()
                .map_err(|_| IoError::BadNpyHeader(format!("bad shape entry {:?}", s)))
        })
        .collect::<IoResult<_>>()?;

    match dims.as_slice() {
        [n] => Ok((1, *n)),
        [rows, cols] => Ok((*rows, *cols)),
        _ => Err(IoError::BadNpyHeader(format!(
            "expected 1-D or 2-D shape, got {} dims",
            dims.len()
        ))),
    }
}

fn extract_quoted_value(header: &str, key: &str) -> Option<String> {
    let needle = format!("'{}':", key);
    let after = &header[header.find(&needle)? + needle.len()..];
    let start = after.find('\'')? + 1;
    let end = after[start..].find('\'')? + start;
    Some(after[start..end].to_string())
}
