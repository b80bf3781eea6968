//! Boundary-Layer Error Types

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur loading, saving, or validating trace data
#[derive(Error, Debug)]
pub enum IoError {
    #[error("Trace data file not found: {0}")]
    TraceFileNotFound(PathBuf),

    #[error("Metadata file not found: {0}")]
    MetadataFileNotFound(PathBuf),

    #[error("Not an .npy file: bad magic bytes")]
    BadNpyMagic,

    #[error("Unsupported .npy version {major}.{minor}")]
    UnsupportedNpyVersion { major: u8, minor: u8 },

    #[error("Unsupported dtype {0:?}, expected \"<f8\"")]
    UnsupportedDtype(String),

    #[error("Fortran-ordered arrays are not supported")]
    FortranOrder,

    #[error("Malformed .npy header: {0}")]
    BadNpyHeader(String),

    #[error("Data size mismatch: expected {expected} values, got {got}")]
    DataSizeMismatch { expected: usize, got: usize },

    #[error(
        "Sidecar dimensions ({meta_cells}x{meta_timepoints}) do not match \
         array ({cells}x{timepoints})"
    )]
    ShapeMismatch {
        meta_cells: usize,
        meta_timepoints: usize,
        cells: usize,
        timepoints: usize,
    },

    #[error("Ragged rows: row {row} has {got} samples, expected {expected}")]
    RaggedRows {
        row: usize,
        expected: usize,
        got: usize,
    },

    #[error("Unsupported schema version {0:?}")]
    UnsupportedSchemaVersion(String),

    #[error("Invalid parameter {name}: {value}")]
    InvalidParameter { name: &'static str, value: f64 },

    #[error("DSP error: {0}")]
    Dsp(#[from] cairn_dsp::DspError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for boundary operations
pub type IoResult<T> = Result<T, IoError>;
