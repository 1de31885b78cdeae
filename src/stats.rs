use std::f64::consts::PI;

/// Log density of a univariate Gaussian at `x`.
///
/// A non-positive `std_dev` yields NaN, which callers treat as a rejected
/// proposal rather than an error.
pub(crate) fn gaussian_log_density(x: f64, mean: f64, std_dev: f64) -> f64 {
    let z = (x - mean) / std_dev;
    -0.5 * z * z - std_dev.ln() - 0.5 * (2.0 * PI).ln()
}

#[cfg(test)]
mod tests {
    use super::*;
    use is_close::is_close;

    #[test]
    fn test_standard_normal_at_mean() {
        // log(1 / sqrt(2 pi))
        assert!(is_close!(
            gaussian_log_density(0.0, 0.0, 1.0),
            -0.918_938_533_204_672_7
        ));
    }

    #[test]
    fn test_scaled_and_shifted() {
        // Reference value from scipy.stats.norm.logpdf(1.5, 3.0, 0.25)
        assert!(is_close!(
            gaussian_log_density(1.5, 3.0, 0.25),
            -17.532_644_172_084_78,
            rel_tol = 1e-12
        ));
    }

    #[test]
    fn test_negative_scale_is_nan() {
        assert!(gaussian_log_density(0.0, 0.0, -1.0).is_nan());
    }
}
