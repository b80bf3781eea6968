//! Calcium Kernel Construction
//!
//! Builds the double-exponential impulse response of a calcium indicator
//! from its rise/decay time constants and the imaging frame rate:
//!
//! h[n] = d^n - r^n,  d = exp(-dt/tau_decay),  r = exp(-dt/tau_rise)
//!
//! normalized so the peak equals 1.0. The first sample is exactly zero
//! (the indicator has no instantaneous response), and the kernel length
//! grows with tau_decay * fs so the decay tail is fully captured.

use crate::error::{DspError, DspResult};

/// Relative amplitude at which the decay tail is truncated.
/// The kernel extends until exp(-t/tau_decay) falls below this fraction
/// of peak, giving length ceil(-ln(floor) * tau_decay * fs).
pub const KERNEL_TAIL_FLOOR: f64 = 1e-6;

/// Minimum kernel length in samples. A kernel needs at least the zero
/// onset sample plus one response sample to be usable.
pub const MIN_KERNEL_LEN: usize = 2;

/// AR(2) parametrization of the double-exponential kernel.
///
/// The process `c[t] = g1*c[t-1] + g2*c[t-2] + s[t]` has characteristic
/// roots `decay_root` and `rise_root`; `g1` is their sum, `g2` the
/// negated product.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ar2Coefficients {
    pub g1: f64,
    pub g2: f64,
    pub decay_root: f64,
    pub rise_root: f64,
}

fn validate_params(tau_rise: f64, tau_decay: f64, fs: f64) -> DspResult<()> {
    if !(tau_rise > 0.0) || !tau_rise.is_finite() {
        return Err(DspError::InvalidTimeConstant {
            name: "tau_rise",
            value: tau_rise,
        });
    }
    if !(tau_decay > 0.0) || !tau_decay.is_finite() {
        return Err(DspError::InvalidTimeConstant {
            name: "tau_decay",
            value: tau_decay,
        });
    }
    if !(fs > 0.0) || !fs.is_finite() {
        return Err(DspError::InvalidSampleRate(fs));
    }
    Ok(())
}

/// Build a double-exponential calcium kernel normalized to peak = 1.0.
///
/// Two calls with identical inputs yield bit-identical output.
///
/// # Errors
///
/// Returns [`DspError`] if any of `tau_rise`, `tau_decay`, `fs` is
/// non-positive or non-finite. Parameters are never clamped.
pub fn build_kernel(tau_rise: f64, tau_decay: f64, fs: f64) -> DspResult<Vec<f64>> {
    validate_params(tau_rise, tau_decay, fs)?;

    let dt = 1.0 / fs;

    // Carry the decay envelope until it drops below the tail floor.
    let kernel_len = ((-KERNEL_TAIL_FLOOR.ln()) * tau_decay / dt).ceil() as usize;
    let kernel_len = kernel_len.max(MIN_KERNEL_LEN);

    let mut kernel = Vec::with_capacity(kernel_len);
    let mut peak = 0.0_f64;

    for i in 0..kernel_len {
        let t = (i as f64) * dt;
        let val = (-t / tau_decay).exp() - (-t / tau_rise).exp();
        kernel.push(val);
        if val > peak {
            peak = val;
        }
    }

    // Normalize to peak = 1.0
    if peak > 0.0 {
        for v in kernel.iter_mut() {
            *v /= peak;
        }
    }

    Ok(kernel)
}

/// Derive AR(2) coefficients from the kernel time constants.
///
/// `g1 = d + r` (sum of roots), `g2 = -(d * r)` (negated product), where
/// `d = exp(-dt/tau_decay)` and `r = exp(-dt/tau_rise)`.
///
/// # Errors
///
/// Same validation as [`build_kernel`].
pub fn tau_to_ar2(tau_rise: f64, tau_decay: f64, fs: f64) -> DspResult<Ar2Coefficients> {
    validate_params(tau_rise, tau_decay, fs)?;

    let dt = 1.0 / fs;
    let decay_root = (-dt / tau_decay).exp();
    let rise_root = (-dt / tau_rise).exp();

    Ok(Ar2Coefficients {
        g1: decay_root + rise_root,
        g2: -(decay_root * rise_root),
        decay_root,
        rise_root,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kernel_peak_is_one() {
        let kernel = build_kernel(0.02, 0.4, 30.0).unwrap();
        let peak = kernel.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        assert!((peak - 1.0).abs() < 1e-10, "Peak should be 1.0, got {}", peak);
    }

    #[test]
    fn test_kernel_peak_is_one_extreme_params() {
        let kernel = build_kernel(0.001, 2.0, 100.0).unwrap();
        let peak = kernel.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        assert!((peak - 1.0).abs() < 1e-10, "Peak should be 1.0, got {}", peak);
    }

    #[test]
    fn test_kernel_first_sample_is_zero() {
        let kernel = build_kernel(0.02, 0.4, 30.0).unwrap();
        assert!(
            kernel[0].abs() < 1e-15,
            "First sample should be 0.0, got {}",
            kernel[0]
        );
    }

    #[test]
    fn test_kernel_values_non_negative() {
        let kernel = build_kernel(0.02, 0.4, 30.0).unwrap();
        for (i, &v) in kernel.iter().enumerate() {
            assert!(v >= -1e-15, "Kernel value at index {} is negative: {}", i, v);
        }
    }

    #[test]
    fn test_kernel_length_scales_with_tau_decay() {
        let k1 = build_kernel(0.02, 0.4, 30.0).unwrap();
        let k2 = build_kernel(0.02, 0.8, 30.0).unwrap();
        assert!(
            k2.len() > k1.len(),
            "Longer tau_decay should produce longer kernel: {} vs {}",
            k2.len(),
            k1.len()
        );
    }

    #[test]
    fn test_kernel_length_scales_with_fs() {
        let k1 = build_kernel(0.02, 0.4, 30.0).unwrap();
        let k2 = build_kernel(0.02, 0.4, 60.0).unwrap();
        assert!(
            k2.len() > k1.len(),
            "Higher fs should produce longer kernel: {} vs {}",
            k2.len(),
            k1.len()
        );
    }

    #[test]
    fn test_kernel_deterministic() {
        let k1 = build_kernel(0.02, 0.4, 30.0).unwrap();
        let k2 = build_kernel(0.02, 0.4, 30.0).unwrap();
        assert_eq!(k1, k2, "Identical inputs must yield bit-identical kernels");
    }

    #[test]
    fn test_invalid_params_rejected() {
        assert!(build_kernel(0.0, 0.4, 30.0).is_err());
        assert!(build_kernel(-0.02, 0.4, 30.0).is_err());
        assert!(build_kernel(0.02, 0.0, 30.0).is_err());
        assert!(build_kernel(0.02, 0.4, 0.0).is_err());
        assert!(build_kernel(0.02, 0.4, -30.0).is_err());
        assert!(build_kernel(f64::NAN, 0.4, 30.0).is_err());
        assert!(build_kernel(0.02, f64::INFINITY, 30.0).is_err());
    }

    #[test]
    fn test_ar2_coefficients_match_roots() {
        let tau_rise = 0.02_f64;
        let tau_decay = 0.4_f64;
        let fs = 30.0_f64;
        let dt = 1.0 / fs;

        let d = (-dt / tau_decay).exp();
        let r = (-dt / tau_rise).exp();

        let ar2 = tau_to_ar2(tau_rise, tau_decay, fs).unwrap();

        assert!((ar2.g1 - (d + r)).abs() < 1e-15);
        assert!((ar2.g2 - (-(d * r))).abs() < 1e-15);
        assert!((ar2.decay_root - d).abs() < 1e-15);
        assert!((ar2.rise_root - r).abs() < 1e-15);
    }

    #[test]
    fn test_ar2_roots_in_unit_interval() {
        let ar2 = tau_to_ar2(0.02, 0.4, 30.0).unwrap();

        // Discriminant must be non-negative for real roots
        let discriminant = ar2.g1 * ar2.g1 + 4.0 * ar2.g2;
        assert!(discriminant >= 0.0);

        // Both roots in (0, 1) for a stable decaying kernel
        assert!(ar2.decay_root > 0.0 && ar2.decay_root < 1.0);
        assert!(ar2.rise_root > 0.0 && ar2.rise_root < 1.0);
    }

    #[test]
    fn test_ar2_invalid_params_rejected() {
        assert!(tau_to_ar2(0.0, 0.4, 30.0).is_err());
        assert!(tau_to_ar2(0.02, -1.0, 30.0).is_err());
        assert!(tau_to_ar2(0.02, 0.4, f64::NAN).is_err());
    }
}
