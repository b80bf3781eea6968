//! Bandpass Preprocessing Filter
//!
//! Frequency-domain bandpass whose cutoffs are derived from the kernel's
//! own time constants: drift slower than the decay timescale and noise
//! faster than the rise timescale carry no activity information, so both
//! are attenuated before the solver sees the trace.

use rustfft::{num_complex::Complex, FftPlanner};
use std::f64::consts::PI;

/// Margin factors for deriving bandpass cutoffs from kernel time constants.
/// HP cutoff = 1/(2*pi*tau_decay*M_HP), LP cutoff = M_LP/(2*pi*tau_rise).
/// HP uses 16x to preserve the slow calcium decay tail while still
/// removing sub-calcium baseline drift. LP uses 4x for tighter noise
/// rejection above the kernel's rise band.
pub const MARGIN_FACTOR_HP: f64 = 16.0;
pub const MARGIN_FACTOR_LP: f64 = 4.0;

/// Transition half-width of each raised-cosine taper, as a fraction of
/// the respective cutoff frequency.
const TAPER_FRACTION: f64 = 0.5;

/// Traces shorter than this pass through unfiltered; there is no usable
/// frequency resolution below 8 samples.
const MIN_FILTER_LEN: usize = 8;

/// Apply an FFT bandpass filter derived from kernel time constants.
///
/// Returns a trace of the same length. The filter is a no-op (a copy of
/// the input) when the trace is shorter than 8 samples, when any
/// parameter is non-positive, or when the derived band is degenerate
/// (`f_hp >= f_lp`) -- filtering is inapplicable in those cases, not a
/// failure.
pub fn bandpass_filter(trace: &[f64], tau_rise: f64, tau_decay: f64, fs: f64) -> Vec<f64> {
    let n = trace.len();
    if n < MIN_FILTER_LEN {
        return trace.to_vec();
    }
    if !(tau_rise > 0.0) || !(tau_decay > 0.0) || !(fs > 0.0) {
        return trace.to_vec();
    }

    let nyquist = fs / 2.0;

    // High-pass removes sub-calcium drift, low-pass removes supra-calcium noise
    let f_hp = 1.0 / (2.0 * PI * tau_decay * MARGIN_FACTOR_HP);
    let mut f_lp = MARGIN_FACTOR_LP / (2.0 * PI * tau_rise);

    if f_lp > nyquist {
        f_lp = nyquist;
    }

    if f_hp >= f_lp {
        return trace.to_vec();
    }

    let gain = build_gain_curve(n, fs, f_hp, f_lp);

    let mut planner = FftPlanner::new();
    let forward = planner.plan_fft_forward(n);
    let inverse = planner.plan_fft_inverse(n);

    let mut spectrum: Vec<Complex<f64>> =
        trace.iter().map(|&x| Complex::new(x, 0.0)).collect();
    forward.process(&mut spectrum);

    // Real-valued gain applied Hermitian-symmetrically: bin i and bin n-i
    // share the same gain, keeping the inverse transform real.
    let spectrum_len = n / 2 + 1;
    for i in 0..spectrum_len {
        spectrum[i] *= gain[i];
        if i > 0 && i < n - i {
            spectrum[n - i] *= gain[i];
        }
    }

    inverse.process(&mut spectrum);

    // rustfft does not normalize the inverse transform
    let scale = 1.0 / n as f64;
    spectrum.iter().map(|c| c.re * scale).collect()
}

/// Raised-cosine tapered bandpass gain over spectrum bins 0..=n/2.
fn build_gain_curve(n: usize, fs: f64, f_hp: f64, f_lp: f64) -> Vec<f64> {
    let spectrum_len = n / 2 + 1;
    let df = fs / n as f64;

    let w_hp = f_hp * TAPER_FRACTION;
    let w_lp = f_lp * TAPER_FRACTION;

    let mut gain = vec![0.0_f64; spectrum_len];
    for (i, g) in gain.iter_mut().enumerate() {
        let f = i as f64 * df;

        *g = if f < f_hp - w_hp {
            // Stopband (below high-pass)
            0.0
        } else if f < f_hp + w_hp {
            // High-pass transition (cosine taper 0 -> 1)
            let t = (f - (f_hp - w_hp)) / (2.0 * w_hp);
            0.5 * (1.0 - (PI * t).cos())
        } else if f < f_lp - w_lp {
            // Passband
            1.0
        } else if f < f_lp + w_lp {
            // Low-pass transition (cosine taper 1 -> 0)
            let t = (f - (f_lp - w_lp)) / (2.0 * w_lp);
            0.5 * (1.0 + (PI * t).cos())
        } else {
            // Stopband (above low-pass)
            0.0
        };
    }

    gain
}
