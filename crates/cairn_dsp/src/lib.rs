//! Cairn DSP - Calcium Deconvolution Core
//!
//! This crate provides the numerical core for calcium-imaging
//! deconvolution, including:
//! - Double-exponential kernel construction from indicator kinetics
//! - Lipschitz constant estimation via padded spectral analysis
//! - Bandpass preprocessing derived from the kernel's own time constants
//! - Accelerated proximal-gradient (FISTA) solver with joint baseline
//!   estimation and adaptive restart
//!
//! # Architecture
//!
//! The caller builds a kernel, estimates its Lipschitz constant once,
//! optionally filters each trace, then solves each trace independently
//! through the same kernel/Lipschitz pair. Traces never interact, and
//! every operation runs in a fixed floating-point order: identical
//! inputs yield bit-identical outputs.

mod error;
mod filter;
mod fista;
mod kernel;
mod lipschitz;

pub use error::{DspError, DspResult};
pub use filter::{bandpass_filter, MARGIN_FACTOR_HP, MARGIN_FACTOR_LP};
pub use fista::{
    run_deconvolution, run_deconvolution_batch, run_deconvolution_full,
    run_deconvolution_full_batch, BatchDeconvolutionResult, DeconvolutionResult, SolverConfig,
};
pub use kernel::{build_kernel, tau_to_ar2, Ar2Coefficients, KERNEL_TAIL_FLOOR};
pub use lipschitz::{compute_lipschitz, LIPSCHITZ_FLOOR};
