//! Lipschitz Constant Estimation
//!
//! The FISTA step size is 1/L, where L bounds the curvature of the
//! quadratic loss (1/2)||y - K*s||^2. For convolution by the kernel h,
//! L = max_w |H(w)|^2 -- the squared operator norm of the convolution
//! map. Zero-padding the DFT to at least twice the kernel length keeps
//! circular aliasing from understating the linear operator's norm.

use rustfft::{num_complex::Complex, FftPlanner};

/// Floor returned for an empty kernel, keeping the 1/L step size
/// well-defined downstream.
pub const LIPSCHITZ_FLOOR: f64 = 1e-10;

/// Compute the Lipschitz constant of the gradient of (1/2)||y - K*s||^2.
///
/// Returns `max_w |H(w)|^2` over a DFT of length
/// `next_power_of_two(2 * kernel.len())`, never less than
/// [`LIPSCHITZ_FLOOR`]. A single-sample kernel `[c]` yields `c*c`.
pub fn compute_lipschitz(kernel: &[f64]) -> f64 {
    let n = kernel.len();
    if n == 0 {
        return LIPSCHITZ_FLOOR;
    }

    // Zero-pad to at least 2n for proper spectral analysis
    let fft_len = (2 * n).next_power_of_two();

    let mut planner = FftPlanner::new();
    let fft = planner.plan_fft_forward(fft_len);

    let mut buffer: Vec<Complex<f64>> =
        kernel.iter().map(|&h| Complex::new(h, 0.0)).collect();
    buffer.resize(fft_len, Complex::new(0.0, 0.0));
    fft.process(&mut buffer);

    let max_power = buffer
        .iter()
        .map(|c| c.norm_sqr())
        .fold(0.0_f64, f64::max);

    max_power.max(LIPSCHITZ_FLOOR)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::build_kernel;

    #[test]
    fn test_empty_kernel_returns_floor() {
        assert_eq!(compute_lipschitz(&[]), LIPSCHITZ_FLOOR);
    }

    #[test]
    fn test_single_sample_kernel() {
        let l = compute_lipschitz(&[3.0]);
        assert!((l - 9.0).abs() < 1e-12, "Expected c^2 = 9, got {}", l);

        let l = compute_lipschitz(&[-0.5]);
        assert!((l - 0.25).abs() < 1e-12, "Expected c^2 = 0.25, got {}", l);
    }

    #[test]
    fn test_spectral_bounds_hold() {
        let kernel = build_kernel(0.02, 0.4, 30.0).unwrap();
        let lipschitz = compute_lipschitz(&kernel);

        assert!(lipschitz > 0.0);

        // By Parseval, max power >= average power = sum of squares
        let sum_squares: f64 = kernel.iter().map(|&k| k * k).sum();
        assert!(
            lipschitz >= sum_squares * 0.99,
            "Lipschitz should be >= sum of squares: {} vs {}",
            lipschitz,
            sum_squares
        );

        // Bounded above by the squared L1 norm (triangle inequality on the DFT)
        let l1_norm: f64 = kernel.iter().map(|&k| k.abs()).sum();
        assert!(
            lipschitz <= l1_norm * l1_norm * 1.01,
            "Lipschitz should be <= L1 norm squared: {} vs {}",
            lipschitz,
            l1_norm * l1_norm
        );
    }

    #[test]
    fn test_bounds_across_kinetics() {
        for (tau_r, tau_d, fs) in [
            (0.005, 0.1, 100.0),
            (0.05, 1.0, 20.0),
            (0.02, 0.4, 30.0),
        ] {
            let kernel = build_kernel(tau_r, tau_d, fs).unwrap();
            let lipschitz = compute_lipschitz(&kernel);
            let sum_squares: f64 = kernel.iter().map(|&k| k * k).sum();
            let l1_norm: f64 = kernel.iter().map(|&k| k.abs()).sum();
            assert!(lipschitz >= sum_squares * 0.99);
            assert!(lipschitz <= l1_norm * l1_norm * 1.01);
        }
    }

    #[test]
    fn test_deterministic() {
        let kernel = build_kernel(0.02, 0.4, 30.0).unwrap();
        let l1 = compute_lipschitz(&kernel);
        let l2 = compute_lipschitz(&kernel);
        assert_eq!(l1, l2);
    }
}
