//! DSP Error Types

use thiserror::Error;

/// Errors that can occur during kernel construction or deconvolution
#[derive(Error, Debug)]
pub enum DspError {
    #[error("Time constant {name} must be positive and finite, got {value}")]
    InvalidTimeConstant { name: &'static str, value: f64 },

    #[error("Sampling rate must be positive and finite, got {0}")]
    InvalidSampleRate(f64),

    #[error("Lambda must be non-negative and finite, got {0}")]
    InvalidLambda(f64),

    #[error("Tolerance must be positive, got {0}")]
    InvalidTolerance(f64),

    #[error("max_iters must be at least 1")]
    InvalidMaxIters,

    #[error("Ragged batch: trace {cell} has {got} samples, expected {expected}")]
    RaggedBatch {
        cell: usize,
        expected: usize,
        got: usize,
    },
}

/// Result type alias for DSP operations
pub type DspResult<T> = Result<T, DspError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = DspError::InvalidTimeConstant {
            name: "tau_rise",
            value: -0.5,
        };
        assert!(err.to_string().contains("tau_rise"));
        assert!(err.to_string().contains("-0.5"));

        let err = DspError::RaggedBatch {
            cell: 3,
            expected: 100,
            got: 99,
        };
        assert!(err.to_string().contains("3"));
        assert!(err.to_string().contains("99"));
    }
}
