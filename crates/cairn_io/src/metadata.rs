//! Trace Metadata Sidecar
//!
//! JSON sidecar describing a persisted trace batch: sampling rate,
//! dimensions, schema version, and a typed bag for arbitrary user
//! metadata. Validated once at the boundary; the numerical core never
//! sees untyped maps.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{IoError, IoResult};

/// Sidecar schema version written by this crate.
pub const SCHEMA_VERSION: &str = "1.0.0";

/// The only dtype tag this crate reads or writes: little-endian f64.
pub const DTYPE_F64_LE: &str = "<f8";

/// Sidecar keys owned by the schema; user extras under these names are
/// dropped so the built-in values always win.
const RESERVED_KEYS: [&str; 5] = [
    "schema_version",
    "sampling_rate_hz",
    "num_cells",
    "num_timepoints",
    "dtype",
];

/// Metadata sidecar for a persisted trace batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceMetadata {
    pub schema_version: String,
    pub sampling_rate_hz: f64,
    pub num_cells: usize,
    pub num_timepoints: usize,
    pub dtype: String,

    /// Arbitrary user metadata carried alongside the required fields
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl TraceMetadata {
    /// Sidecar for a batch with the current schema version and dtype.
    pub fn new(sampling_rate_hz: f64, num_cells: usize, num_timepoints: usize) -> Self {
        Self {
            schema_version: SCHEMA_VERSION.to_string(),
            sampling_rate_hz,
            num_cells,
            num_timepoints,
            dtype: DTYPE_F64_LE.to_string(),
            extra: Map::new(),
        }
    }

    /// Attach user metadata, dropping any keys the schema owns.
    pub fn with_extra(mut self, extra: Map<String, Value>) -> Self {
        self.extra = extra;
        for key in RESERVED_KEYS {
            self.extra.remove(key);
        }
        self
    }

    /// Boundary validation: dtype, sampling rate, and schema major version.
    pub fn validate(&self) -> IoResult<()> {
        if self.dtype != DTYPE_F64_LE {
            return Err(IoError::UnsupportedDtype(self.dtype.clone()));
        }
        if !(self.sampling_rate_hz > 0.0) || !self.sampling_rate_hz.is_finite() {
            return Err(IoError::InvalidParameter {
                name: "sampling_rate_hz",
                value: self.sampling_rate_hz,
            });
        }
        if !self.schema_version.starts_with("1.") {
            return Err(IoError::UnsupportedSchemaVersion(
                self.schema_version.clone(),
            ));
        }
        Ok(())
    }
}
