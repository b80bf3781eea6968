//! Parameter Export Reader
//!
//! Reads the JSON parameter export produced by the tuning front-end:
//! kernel time constants, sparsity penalty, sampling rate, and whether
//! bandpass preprocessing was enabled. Validated once here, then handed
//! to the solver as a typed config.

use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use cairn_dsp::SolverConfig;

use crate::error::{IoError, IoResult};

/// Tuned parameters driving the filter+solve pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TuningParams {
    /// Rise time constant in seconds
    pub tau_rise_s: f64,

    /// Decay time constant in seconds
    pub tau_decay_s: f64,

    /// L1 sparsity penalty
    pub lambda: f64,

    /// Sampling rate in Hz
    pub sampling_rate_hz: f64,

    /// Whether bandpass preprocessing runs before the solver
    #[serde(default)]
    pub filter_enabled: bool,

    /// Fields the export carries that the pipeline does not consume
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl TuningParams {
    /// Parse and validate an export from its JSON text.
    pub fn from_json_str(text: &str) -> IoResult<Self> {
        let params: Self = serde_json::from_str(text)?;
        params.validate()?;
        Ok(params)
    }

    /// Load and validate an export file.
    pub fn load(path: &Path) -> IoResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn validate(&self) -> IoResult<()> {
        if !(self.tau_rise_s > 0.0) || !self.tau_rise_s.is_finite() {
            return Err(IoError::InvalidParameter {
                name: "tau_rise_s",
                value: self.tau_rise_s,
            });
        }
        if !(self.tau_decay_s > 0.0) || !self.tau_decay_s.is_finite() {
            return Err(IoError::InvalidParameter {
                name: "tau_decay_s",
                value: self.tau_decay_s,
            });
        }
        if !(self.lambda >= 0.0) || !self.lambda.is_finite() {
            return Err(IoError::InvalidParameter {
                name: "lambda",
                value: self.lambda,
            });
        }
        if !(self.sampling_rate_hz > 0.0) || !self.sampling_rate_hz.is_finite() {
            return Err(IoError::InvalidParameter {
                name: "sampling_rate_hz",
                value: self.sampling_rate_hz,
            });
        }
        Ok(())
    }

    /// Solver configuration for these parameters; optimization knobs keep
    /// their defaults.
    pub fn to_solver_config(&self) -> SolverConfig {
        SolverConfig {
            fs: self.sampling_rate_hz,
            tau_rise: self.tau_rise_s,
            tau_decay: self.tau_decay_s,
            lambda: self.lambda,
            ..SolverConfig::default()
        }
    }
}
