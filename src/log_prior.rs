//! Independent Gaussian prior over the full parameter vector, derived from
//! per-parameter bounds.
//!
//! Means sit at the interval midpoints and standard deviations at 1/8 of the
//! interval widths, so the bulk of the prior mass lies inside the bounds. The
//! standard deviations double as the Metropolis random-walk proposal scale;
//! coupling prior width to proposal spread is deliberate.

use ndarray::{Array1, Array2};

use crate::errors::{PopMcmcError, PopMcmcResult};
use crate::stats::gaussian_log_density;

/// A log prior formed from a `2 x m` table of parameter bounds.
///
/// Row 0 holds the lower bounds and row 1 the upper bounds; the columns cover
/// the free ODE parameters followed by one noise scale per observed output
/// dimension.
pub struct LogPrior {
    bounds: Array2<f64>,
    means: Array1<f64>,
    std_devs: Array1<f64>,
}

impl LogPrior {
    /// Build the prior, validating the bounds table.
    pub fn new(bounds: Array2<f64>) -> PopMcmcResult<Self> {
        if bounds.nrows() != 2 || bounds.ncols() < 1 {
            return Err(PopMcmcError::InvalidBounds(format!(
                "bounds must have exactly 2 rows and at least one column, got {}x{}",
                bounds.nrows(),
                bounds.ncols()
            )));
        }
        let lower = bounds.row(0);
        let upper = bounds.row(1);
        if lower.iter().zip(upper.iter()).any(|(l, u)| u <= l) {
            return Err(PopMcmcError::InvalidBounds(
                "lower bounds must be in the first row and upper bounds in the second".to_string(),
            ));
        }

        let means = (&lower + &upper) / 2.0;
        let std_devs = (&upper - &lower) / 8.0;
        Ok(Self {
            bounds,
            means,
            std_devs,
        })
    }

    /// Log density of the prior at `theta`.
    ///
    /// The sum of the independent per-dimension Gaussian log densities.
    pub fn evaluate(&self, theta: &Array1<f64>) -> PopMcmcResult<f64> {
        if theta.len() != self.len() {
            return Err(PopMcmcError::DimensionMismatch {
                expected: self.len(),
                actual: theta.len(),
            });
        }
        Ok(theta
            .iter()
            .zip(self.means.iter())
            .zip(self.std_devs.iter())
            .map(|((&x, &mean), &std_dev)| gaussian_log_density(x, mean, std_dev))
            .sum())
    }

    /// Number of parameters covered by the prior.
    pub fn len(&self) -> usize {
        self.bounds.ncols()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn bounds(&self) -> &Array2<f64> {
        &self.bounds
    }

    pub fn means(&self) -> &Array1<f64> {
        &self.means
    }

    /// Per-dimension standard deviations, reused as the random-walk proposal
    /// scale during mutation.
    pub fn std_devs(&self) -> &Array1<f64> {
        &self.std_devs
    }
}
