//! Synthetic observation generation.
//!
//! Solves a system at known ground-truth parameters and perturbs the
//! trajectory with independent Gaussian noise, producing observation tables
//! for calibration tests and worked examples.

use std::sync::Arc;

use ndarray::{Array1, Array2};
use rand::Rng;
use rand_distr::StandardNormal;

use crate::errors::{PopMcmcError, PopMcmcResult};
use crate::ode_system::OdeSystem;

/// Generates noisy observed data from a ground-truth solution.
pub struct DataGenerator {
    ode_system: Arc<OdeSystem>,
    true_theta: Vec<f64>,
    sigma: Array1<f64>,
}

impl DataGenerator {
    /// `true_theta` are the ground-truth ODE parameters and `sigma` the
    /// per-output-dimension noise standard deviations.
    pub fn new(
        ode_system: Arc<OdeSystem>,
        true_theta: Vec<f64>,
        sigma: Array1<f64>,
    ) -> PopMcmcResult<Self> {
        if true_theta.len() != ode_system.n_theta() {
            return Err(PopMcmcError::DimensionMismatch {
                expected: ode_system.n_theta(),
                actual: true_theta.len(),
            });
        }
        if sigma.len() != ode_system.dim_y() {
            return Err(PopMcmcError::DimensionMismatch {
                expected: ode_system.dim_y(),
                actual: sigma.len(),
            });
        }
        Ok(Self {
            ode_system,
            true_theta,
            sigma,
        })
    }

    /// Generate a (time steps x output dimensions) observation table.
    pub fn generate<R: Rng>(&self, rng: &mut R) -> PopMcmcResult<Array2<f64>> {
        let solution = self.ode_system.solve(&self.true_theta)?;
        let dim_y = self.ode_system.dim_y();

        let mut y_obs = Array2::zeros((solution.len(), dim_y));
        for (i, (_, y)) in solution.iter().enumerate() {
            for j in 0..dim_y {
                y_obs[[i, j]] = y[j] + self.sigma[j] * rng.sample::<f64, _>(StandardNormal);
            }
        }
        Ok(y_obs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ode_system::{State, Time};
    use nalgebra::dvector;
    use ndarray::array;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn exponential_system() -> Arc<OdeSystem> {
        let rhs = |y: &State, _t: Time, theta: &[f64], dy_dt: &mut State| {
            dy_dt[0] = theta[0] * y[0];
        };
        Arc::new(
            OdeSystem::new(
                rhs,
                dvector![1.0],
                Array1::linspace(0.0, 1.0, 20),
                1,
                "exponential_growth",
            )
            .unwrap(),
        )
    }

    #[test]
    fn test_generated_shape_and_noise() {
        let generator =
            DataGenerator::new(exponential_system(), vec![2.0], array![0.01]).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let y_obs = generator.generate(&mut rng).unwrap();

        assert_eq!(y_obs.dim(), (20, 1));
        // Observations track the true trajectory to within a few sigma
        for (i, (t, _)) in exponential_system()
            .solve(&[2.0])
            .unwrap()
            .iter()
            .enumerate()
        {
            let truth = (2.0 * t).exp();
            assert!((y_obs[[i, 0]] - truth).abs() < 0.1);
        }
    }

    #[test]
    fn test_dimension_validation() {
        let result = DataGenerator::new(exponential_system(), vec![2.0, 3.0], array![0.01]);
        assert!(result.is_err());

        let result = DataGenerator::new(exponential_system(), vec![2.0], array![0.01, 0.01]);
        assert!(result.is_err());
    }
}
