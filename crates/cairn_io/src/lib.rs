//! Cairn I/O - Boundary Layer
//!
//! This crate provides the boundary collaborators around the Cairn
//! deconvolution core, including:
//! - Trace batch persistence as `.npy` + JSON metadata sidecar pairs
//! - The parameter-export reader for tuned solver settings
//! - The filter+solve pipeline driving `cairn_dsp` end to end
//!
//! # Architecture
//!
//! ```text
//! {stem}.npy + {stem}_metadata.json ──load──▶ TraceBatch
//! params export (JSON) ──────────────parse──▶ TuningParams
//!                                               │
//!                          run_pipeline(batch, params)
//!                                               │
//!              optional bandpass ──▶ FISTA solve per cell
//!                                               │
//!                                  BatchDeconvolutionResult
//! ```
//!
//! All validation happens at this boundary; the numerical core only ever
//! sees typed, rectangular data.

mod error;
mod metadata;
mod npy;
mod params;
mod pipeline;

pub use error::{IoError, IoResult};
pub use metadata::{TraceMetadata, DTYPE_F64_LE, SCHEMA_VERSION};
pub use npy::{load_tuning_data, save_for_tuning, TraceBatch};
pub use params::TuningParams;
pub use pipeline::run_pipeline;

// Re-export solver types for convenience
pub use cairn_dsp::{BatchDeconvolutionResult, DeconvolutionResult, SolverConfig};
