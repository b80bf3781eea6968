//! FISTA Deconvolution Solver
//!
//! Recovers sparse non-negative activity from a calcium trace by solving
//!
//! minimize  (1/2)||K*s + b - y||^2 + lambda * G_dc * ||s||_1
//! s.t.      s >= 0
//!
//! where K is the causal truncated convolution by the calcium kernel,
//! b is a scalar baseline estimated jointly (closed-form mean of the
//! unexplained signal), and G_dc = sum(kernel) scales the penalty so it
//! is comparable across kernel shapes.
//!
//! The solver is accelerated proximal gradient (Beck & Teboulle FISTA)
//! with adaptive restart (O'Donoghue & Candes 2015): the gradient is
//! evaluated at the extrapolated point y_k, the proximal step produces
//! x_{k+1}, and momentum is reset whenever the objective increases.
//! Everything runs in a fixed floating-point order, so identical inputs
//! produce bit-identical outputs.

use tracing::debug;

use crate::error::{DspError, DspResult};
use crate::kernel::build_kernel;
use crate::lipschitz::compute_lipschitz;

/// Denominator floor in the relative objective change, guarding the
/// convergence test against a zero objective.
const OBJECTIVE_DENOM_FLOOR: f64 = 1e-10;

/// Iterations before the convergence test is armed; restart dynamics need
/// a few iterations to settle.
const CONVERGENCE_WARMUP_ITERS: u32 = 5;

/// Solver configuration: kernel kinetics plus optimization knobs.
#[derive(Debug, Clone)]
pub struct SolverConfig {
    /// Sampling rate in Hz
    pub fs: f64,

    /// Rise time constant in seconds
    pub tau_rise: f64,

    /// Decay time constant in seconds
    pub tau_decay: f64,

    /// L1 penalty; scaled internally by the kernel DC gain
    pub lambda: f64,

    /// Relative objective change below which the solve converges
    pub tolerance: f64,

    /// Iteration cap; hitting it is reported, not an error
    pub max_iters: u32,

    /// Estimate the scalar baseline jointly with the activity. Disabling
    /// pins the baseline at 0 (the legacy baseline-free formulation).
    pub estimate_baseline: bool,
}

impl Default for SolverConfig {
    fn default() -> Self {
        // GCaMP6f kinetics at standard 2-photon frame rates
        Self {
            fs: 30.0,
            tau_rise: 0.02,
            tau_decay: 0.4,
            lambda: 0.01,
            tolerance: 1e-6,
            max_iters: 2000,
            estimate_baseline: true,
        }
    }
}

impl SolverConfig {
    /// Validate optimization knobs. Kernel kinetics are validated by
    /// [`build_kernel`] when the solver is constructed.
    pub fn validate(&self) -> DspResult<()> {
        if !(self.lambda >= 0.0) || !self.lambda.is_finite() {
            return Err(DspError::InvalidLambda(self.lambda));
        }
        if !(self.tolerance > 0.0) {
            return Err(DspError::InvalidTolerance(self.tolerance));
        }
        if self.max_iters == 0 {
            return Err(DspError::InvalidMaxIters);
        }
        Ok(())
    }
}

/// Full result of deconvolving a single trace.
#[derive(Debug, Clone)]
pub struct DeconvolutionResult {
    /// Non-negative activity estimate, same length as the trace
    pub activity: Vec<f64>,

    /// Estimated scalar baseline
    pub baseline: f64,

    /// Kernel-convolved activity plus baseline (the model fit)
    pub reconvolution: Vec<f64>,

    /// Number of FISTA iterations run
    pub iterations: u32,

    /// Whether the convergence criterion was met before `max_iters`
    pub converged: bool,
}

/// Batch result: every field of [`DeconvolutionResult`] as a per-trace
/// collection, aligned by cell index.
#[derive(Debug, Clone, Default)]
pub struct BatchDeconvolutionResult {
    pub activity: Vec<Vec<f64>>,
    pub baseline: Vec<f64>,
    pub reconvolution: Vec<Vec<f64>>,
    pub iterations: Vec<u32>,
    pub converged: Vec<bool>,
}

impl BatchDeconvolutionResult {
    /// Empty batch result with room for `cells` traces.
    pub fn with_capacity(cells: usize) -> Self {
        Self {
            activity: Vec::with_capacity(cells),
            baseline: Vec::with_capacity(cells),
            reconvolution: Vec::with_capacity(cells),
            iterations: Vec::with_capacity(cells),
            converged: Vec::with_capacity(cells),
        }
    }

    /// Append one trace's result, preserving cell order.
    pub fn push(&mut self, result: DeconvolutionResult) {
        self.activity.push(result.activity);
        self.baseline.push(result.baseline);
        self.reconvolution.push(result.reconvolution);
        self.iterations.push(result.iterations);
        self.converged.push(result.converged);
    }

    pub fn num_cells(&self) -> usize {
        self.activity.len()
    }
}

/// Deconvolve one trace, returning the activity estimate only.
///
/// Thin projection of [`run_deconvolution_full`]; same solve, smaller
/// return shape.
pub fn run_deconvolution(trace: &[f64], config: &SolverConfig) -> DspResult<Vec<f64>> {
    Ok(run_deconvolution_full(trace, config)?.activity)
}

/// Deconvolve one trace, returning the full result record.
pub fn run_deconvolution_full(
    trace: &[f64],
    config: &SolverConfig,
) -> DspResult<DeconvolutionResult> {
    let solver = TraceSolver::from_config(config)?;
    Ok(solver.solve(trace))
}

/// Deconvolve a batch of traces, returning activity estimates only.
pub fn run_deconvolution_batch(
    traces: &[Vec<f64>],
    config: &SolverConfig,
) -> DspResult<Vec<Vec<f64>>> {
    Ok(run_deconvolution_full_batch(traces, config)?.activity)
}

/// Deconvolve a batch of traces through a single kernel/Lipschitz pair.
///
/// Rows are solved independently in index order; a ragged batch fails
/// before any solving begins.
pub fn run_deconvolution_full_batch(
    traces: &[Vec<f64>],
    config: &SolverConfig,
) -> DspResult<BatchDeconvolutionResult> {
    validate_batch_shape(traces)?;
    let solver = TraceSolver::from_config(config)?;

    let mut batch = BatchDeconvolutionResult::with_capacity(traces.len());
    for trace in traces {
        batch.push(solver.solve(trace));
    }

    debug!(cells = traces.len(), "batch deconvolution complete");
    Ok(batch)
}

fn validate_batch_shape(traces: &[Vec<f64>]) -> DspResult<()> {
    let Some(first) = traces.first() else {
        return Ok(());
    };
    let expected = first.len();
    for (cell, trace) in traces.iter().enumerate() {
        if trace.len() != expected {
            return Err(DspError::RaggedBatch {
                cell,
                expected,
                got: trace.len(),
            });
        }
    }
    Ok(())
}

/// Immutable per-solve context: kernel, step size, and thresholds shared
/// by every trace in a batch. Per-trace state lives on the stack of
/// [`TraceSolver::solve`] and is never shared across traces.
struct TraceSolver {
    kernel: Vec<f64>,
    step_size: f64,
    threshold: f64,
    effective_lambda: f64,
    tolerance: f64,
    max_iters: u32,
    estimate_baseline: bool,
}

impl TraceSolver {
    fn from_config(config: &SolverConfig) -> DspResult<Self> {
        config.validate()?;

        let kernel = build_kernel(config.tau_rise, config.tau_decay, config.fs)?;
        let lipschitz = compute_lipschitz(&kernel);

        // Scale the penalty by the kernel DC gain so lambda is comparable
        // across kernel shapes
        let kernel_dc_gain: f64 = kernel.iter().sum();
        let effective_lambda = config.lambda * kernel_dc_gain;

        let step_size = 1.0 / lipschitz;
        let threshold = step_size * effective_lambda;

        Ok(Self {
            kernel,
            step_size,
            threshold,
            effective_lambda,
            tolerance: config.tolerance,
            max_iters: config.max_iters,
            estimate_baseline: config.estimate_baseline,
        })
    }

    /// Closed-form baseline given the current reconvolution: the mean of
    /// the unexplained signal. Fixed summation order for determinism.
    fn baseline_for(&self, trace: &[f64], reconvolution: &[f64]) -> f64 {
        if !self.estimate_baseline {
            return 0.0;
        }
        let mut sum = 0.0_f64;
        for (y, r) in trace.iter().zip(reconvolution.iter()) {
            sum += y - r;
        }
        sum / trace.len() as f64
    }

    fn solve(&self, trace: &[f64]) -> DeconvolutionResult {
        let n = trace.len();
        if n == 0 {
            return DeconvolutionResult {
                activity: Vec::new(),
                baseline: 0.0,
                reconvolution: Vec::new(),
                iterations: 0,
                converged: true,
            };
        }

        let mut solution = vec![0.0_f64; n]; // x_k
        let mut extrapolated = vec![0.0_f64; n]; // y_k
        let mut t_fista = 1.0_f64;
        let mut prev_objective = f64::INFINITY;
        let mut baseline = 0.0_f64;
        let mut converged = false;
        let mut iteration = 0_u32;

        while iteration < self.max_iters {
            iteration += 1;

            // 1. Forward convolution at the extrapolated point y_k
            let reconvolution = convolve_truncated(&extrapolated, &self.kernel, n);

            // 2. Baseline given y_k, then the residual of the model fit
            baseline = self.baseline_for(trace, &reconvolution);
            let residual: Vec<f64> = (0..n)
                .map(|i| reconvolution[i] + baseline - trace[i])
                .collect();

            // 3. Gradient of the quadratic term: adjoint convolution
            let gradient = adjoint_convolve(&residual, &self.kernel, n);

            // 4. Proximal gradient step from y_k (not x_k):
            //    x_{k+1} = max(y_k - step*grad - threshold, 0)
            let new_solution: Vec<f64> = (0..n)
                .map(|i| {
                    (extrapolated[i] - self.step_size * gradient[i] - self.threshold).max(0.0)
                })
                .collect();
            let x_prev = std::mem::replace(&mut solution, new_solution);

            // 5. Objective at x_{k+1}, with the baseline refit to it
            let recon_new = convolve_truncated(&solution, &self.kernel, n);
            baseline = self.baseline_for(trace, &recon_new);

            let mut data_fidelity = 0.0_f64;
            for i in 0..n {
                let r = recon_new[i] + baseline - trace[i];
                data_fidelity += r * r;
            }
            let l1_penalty: f64 = solution.iter().sum();
            let objective = 0.5 * data_fidelity + self.effective_lambda * l1_penalty;

            // 6. Adaptive restart: stale momentum made the objective climb
            if objective > prev_objective && iteration > 1 {
                t_fista = 1.0;
            }

            // 7. Momentum extrapolation, re-projected to the feasible set
            let t_new = (1.0 + (1.0 + 4.0 * t_fista * t_fista).sqrt()) / 2.0;
            let momentum = (t_fista - 1.0) / t_new;
            for i in 0..n {
                extrapolated[i] =
                    (solution[i] + momentum * (solution[i] - x_prev[i])).max(0.0);
            }
            t_fista = t_new;

            // 8. Convergence on relative objective change, once warmed up
            if iteration > CONVERGENCE_WARMUP_ITERS {
                let rel_change = (prev_objective - objective).abs()
                    / (prev_objective.abs() + OBJECTIVE_DENOM_FLOOR);
                if rel_change < self.tolerance {
                    converged = true;
                    break;
                }
            }
            prev_objective = objective;
        }

        // Final model fit for the returned record
        let mut reconvolution = convolve_truncated(&solution, &self.kernel, n);
        for r in reconvolution.iter_mut() {
            *r += baseline;
        }

        debug!(iterations = iteration, converged, baseline, "fista solve finished");

        DeconvolutionResult {
            activity: solution,
            baseline,
            reconvolution,
            iterations: iteration,
            converged,
        }
    }
}

/// Causal truncated convolution: out[t] = sum_k kernel[k] * signal[t-k],
/// truncated to the first `n` samples of the full convolution.
fn convolve_truncated(signal: &[f64], kernel: &[f64], n: usize) -> Vec<f64> {
    let klen = kernel.len();
    let mut out = vec![0.0_f64; n];
    for (t, o) in out.iter_mut().enumerate() {
        let mut sum = 0.0_f64;
        let k_max = klen.min(t + 1);
        for k in 0..k_max {
            sum += kernel[k] * signal[t - k];
        }
        *o = sum;
    }
    out
}

/// Adjoint of the causal truncated convolution: correlation with the
/// time-reversed kernel, aligned at the kernel's last tap. Equivalent to
/// the full convolution with the reversed kernel windowed to
/// [klen-1, klen-1+n).
fn adjoint_convolve(residual: &[f64], kernel: &[f64], n: usize) -> Vec<f64> {
    let klen = kernel.len();
    let mut out = vec![0.0_f64; n];
    for (t, o) in out.iter_mut().enumerate() {
        let mut sum = 0.0_f64;
        let k_max = klen.min(n - t);
        for k in 0..k_max {
            sum += kernel[k] * residual[t + k];
        }
        *o = sum;
    }
    out
}
