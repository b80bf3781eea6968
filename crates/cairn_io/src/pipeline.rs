//! Filter + Solve Pipeline
//!
//! Drives the full deconvolution flow for a loaded batch: optional
//! bandpass preprocessing per trace, then one solve per cell through a
//! shared kernel/Lipschitz pair.

use tracing::info;

use cairn_dsp::{bandpass_filter, run_deconvolution_full_batch, BatchDeconvolutionResult};

use crate::error::IoResult;
use crate::npy::TraceBatch;
use crate::params::TuningParams;

/// Deconvolve every trace in the batch under the exported parameters.
///
/// When `filter_enabled` is set, each trace is bandpass-filtered with
/// cutoffs derived from the kernel time constants before solving.
pub fn run_pipeline(
    batch: &TraceBatch,
    params: &TuningParams,
) -> IoResult<BatchDeconvolutionResult> {
    params.validate()?;
    let config = params.to_solver_config();

    let traces: Vec<Vec<f64>> = if params.filter_enabled {
        batch
            .rows()
            .map(|row| {
                bandpass_filter(
                    row,
                    params.tau_rise_s,
                    params.tau_decay_s,
                    params.sampling_rate_hz,
                )
            })
            .collect()
    } else {
        batch.to_rows()
    };

    let result = run_deconvolution_full_batch(&traces, &config)?;

    let converged = result.converged.iter().filter(|&&c| c).count();
    info!(
        cells = result.num_cells(),
        converged,
        filtered = params.filter_enabled,
        "pipeline complete"
    );

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cairn_dsp::build_kernel;

    fn make_params(filter_enabled: bool) -> TuningParams {
        TuningParams::from_json_str(&format!(
            r#"{{"tau_rise_s": 0.02, "tau_decay_s": 0.4, "lambda": 0.01,
                "sampling_rate_hz": 30.0, "filter_enabled": {}}}"#,
            filter_enabled
        ))
        .unwrap()
    }

    fn make_batch(event_locs: &[usize], n: usize) -> TraceBatch {
        let kernel = build_kernel(0.02, 0.4, 30.0).unwrap();
        let rows: Vec<Vec<f64>> = event_locs
            .iter()
            .map(|&loc| {
                let mut trace = vec![0.0_f64; n];
                for (k, &kv) in kernel.iter().enumerate() {
                    if loc + k < n {
                        trace[loc + k] += kv;
                    }
                }
                trace
            })
            .collect();
        TraceBatch::from_rows(&rows).unwrap()
    }

    #[test]
    fn test_pipeline_recovers_events() {
        let batch = make_batch(&[30, 90], 200);
        let params = make_params(false);

        let result = run_pipeline(&batch, &params).unwrap();
        assert_eq!(result.num_cells(), 2);

        for (i, &loc) in [30_usize, 90].iter().enumerate() {
            let max_idx = result.activity[i]
                .iter()
                .enumerate()
                .max_by(|a, b| a.1.partial_cmp(b.1).unwrap())
                .unwrap()
                .0;
            assert!(
                (max_idx as i64 - loc as i64).abs() <= 2,
                "Cell {}: max at {}, expected near {}",
                i,
                max_idx,
                loc
            );
        }
    }

    #[test]
    fn test_pipeline_respects_filter_flag() {
        // A trace with a large DC offset: filtering removes the offset
        // before the solve, so the estimated baselines must differ.
        let kernel = build_kernel(0.02, 0.4, 30.0).unwrap();
        let n = 512;
        let mut trace = vec![100.0_f64; n];
        for (k, &kv) in kernel.iter().enumerate() {
            if 50 + k < n {
                trace[50 + k] += kv;
            }
        }
        let batch = TraceBatch::from_rows(&[trace]).unwrap();

        let raw = run_pipeline(&batch, &make_params(false)).unwrap();
        let filtered = run_pipeline(&batch, &make_params(true)).unwrap();

        assert!(raw.baseline[0] > 50.0, "Unfiltered baseline absorbs the DC");
        assert!(
            filtered.baseline[0].abs() < raw.baseline[0],
            "Filtered baseline should be far smaller: {} vs {}",
            filtered.baseline[0],
            raw.baseline[0]
        );
    }

    #[test]
    fn test_pipeline_empty_batch() {
        let batch = TraceBatch::from_rows(&[]).unwrap();
        let result = run_pipeline(&batch, &make_params(false)).unwrap();
        assert_eq!(result.num_cells(), 0);
    }
}
