//! Population controller: owns the chains and drives the iteration loop.
//!
//! Each iteration mutates one uniformly drawn chain, attempts a replica
//! exchange between it and a second chain, and then records one history row
//! for every chain in the population. The loop is strictly sequential and a
//! single injectable random source drives every draw, so seeded runs are
//! reproducible.

use std::sync::Arc;

use log::{debug, info};
use ndarray::{Array1, Array2};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::chain::Chain;
use crate::errors::{PopMcmcError, PopMcmcResult};
use crate::history::HistoryTable;
use crate::log_prior::LogPrior;
use crate::ode_system::OdeSystem;

/// Configures and validates a [`Simulator`].
///
/// Construction is fail-fast: every invariant violation surfaces from
/// [`SimulatorBuilder::build`] before any sampling happens.
pub struct SimulatorBuilder {
    ode_system: OdeSystem,
    num_chains: usize,
    y_obs: Array2<f64>,
    param_bounds: Array2<f64>,
    param_names: Option<Vec<String>>,
    max_its: usize,
    burn_in: usize,
    seed: Option<u64>,
}

impl SimulatorBuilder {
    /// Start a builder from the required inputs.
    ///
    /// `y_obs` is the observed data table, one row per time-grid point and
    /// one column per output dimension. `param_bounds` is a `2 x m` table
    /// covering the ODE parameters and one noise-scale bound per output
    /// dimension.
    pub fn new(
        ode_system: OdeSystem,
        num_chains: usize,
        y_obs: Array2<f64>,
        param_bounds: Array2<f64>,
    ) -> Self {
        Self {
            ode_system,
            num_chains,
            y_obs,
            param_bounds,
            param_names: None,
            max_its: 1000,
            burn_in: 500,
            seed: None,
        }
    }

    /// Names for the parameters, used for the history columns.
    ///
    /// Defaults to `param_1..param_m`; a list of the wrong length falls back
    /// to the defaults.
    pub fn with_param_names(mut self, param_names: Vec<String>) -> Self {
        self.param_names = Some(param_names);
        self
    }

    /// Total iteration budget for [`Simulator::run`].
    pub fn with_max_its(mut self, max_its: usize) -> Self {
        self.max_its = max_its;
        self
    }

    /// Length of the initial phase excluded from posterior summaries.
    ///
    /// Tracked as a bound for downstream consumers; the run loop itself does
    /// not treat burn-in iterations differently.
    pub fn with_burn_in(mut self, burn_in: usize) -> Self {
        self.burn_in = burn_in;
        self
    }

    /// Seed for the run's random source, for reproducible runs.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Validate the configuration and build a simulator using a standard RNG.
    pub fn build(self) -> PopMcmcResult<Simulator<StdRng>> {
        let rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        self.build_with_rng(rng)
    }

    /// Validate the configuration and build a simulator with an injected
    /// random source.
    pub fn build_with_rng<R: Rng>(self, rng: R) -> PopMcmcResult<Simulator<R>> {
        if self.num_chains < 2 {
            return Err(PopMcmcError::Error(
                "population MCMC needs at least two chains to exchange between".to_string(),
            ));
        }
        if self.param_bounds.nrows() != 2 {
            return Err(PopMcmcError::InvalidBounds(format!(
                "param_bounds must have exactly 2 rows, got {}",
                self.param_bounds.nrows()
            )));
        }

        // The bounds must cover every ODE parameter plus one noise scale per
        // output dimension.
        let expected = self.ode_system.n_theta() + self.ode_system.dim_y();
        if self.param_bounds.ncols() != expected {
            return Err(PopMcmcError::BoundsMismatch {
                expected,
                actual: self.param_bounds.ncols(),
            });
        }
        if self.burn_in > self.max_its {
            return Err(PopMcmcError::BurnInExceedsBudget {
                burn_in: self.burn_in,
                max_its: self.max_its,
            });
        }

        let obs_shape = self.y_obs.dim();
        let grid_shape = (self.ode_system.times().len(), self.ode_system.dim_y());
        if obs_shape != grid_shape {
            return Err(PopMcmcError::Error(format!(
                "observed data must be a (time steps x output dimensions) table of shape {:?}, got {:?}",
                grid_shape, obs_shape
            )));
        }

        let num_params = self.param_bounds.ncols();
        let param_names = match self.param_names {
            Some(names) if names.len() == num_params => names,
            _ => (1..=num_params).map(|i| format!("param_{}", i)).collect(),
        };

        let ode_system = Arc::new(self.ode_system);
        let log_prior = Arc::new(LogPrior::new(self.param_bounds.clone())?);
        let chains = (1..=self.num_chains)
            .map(|id| {
                Chain::new(
                    id,
                    self.num_chains,
                    Arc::clone(&ode_system),
                    Arc::clone(&log_prior),
                    &param_names,
                    self.max_its,
                )
            })
            .collect::<PopMcmcResult<Vec<_>>>()?;

        Ok(Simulator {
            ode_system,
            log_prior,
            chains,
            y_obs: self.y_obs,
            param_bounds: self.param_bounds,
            param_names,
            max_its: self.max_its,
            burn_in: self.burn_in,
            rng,
        })
    }
}

/// Runs the population MCMC algorithm over a fixed set of chains.
///
/// The simulator owns the population; the shared [`OdeSystem`] and
/// [`LogPrior`] are read-only from every chain's perspective, and parameter
/// vectors only ever move between chains through the controller-mediated
/// [`Simulator::exchange`].
pub struct Simulator<R: Rng = StdRng> {
    ode_system: Arc<OdeSystem>,
    log_prior: Arc<LogPrior>,
    chains: Vec<Chain>,
    y_obs: Array2<f64>,
    param_bounds: Array2<f64>,
    param_names: Vec<String>,
    max_its: usize,
    burn_in: usize,
    rng: R,
}

impl<R: Rng> Simulator<R> {
    /// Draw each chain's initial parameters uniformly within the bounds.
    ///
    /// The one-time initial sample is not recorded in the history.
    fn set_uniform_initial_sample(&mut self) {
        let num_params = self.param_bounds.ncols();
        for chain in &mut self.chains {
            let params: Array1<f64> = (0..num_params)
                .map(|k| {
                    self.rng
                        .gen_range(self.param_bounds[[0, k]]..self.param_bounds[[1, k]])
                })
                .collect();
            chain.set_params(params);
        }
    }

    /// Run the population MCMC for the configured iteration budget.
    ///
    /// Per iteration: mutate one uniformly drawn chain, attempt an exchange
    /// with a second (distinct) uniformly drawn chain, then append one
    /// history row labelled with the iteration for every chain. No error is
    /// caught or retried; a failure aborts the run.
    pub fn run(&mut self) -> PopMcmcResult<()> {
        info!(
            "running population MCMC for '{}': {} chains, {} iterations",
            self.ode_system.title(),
            self.chains.len(),
            self.max_its
        );

        self.set_uniform_initial_sample();

        let num_chains = self.chains.len();
        for t in 0..self.max_its {
            // Mutation step
            let i = self.rng.gen_range(0..num_chains);
            let mutated = self.chains[i].mutate(self.y_obs.view(), &mut self.rng)?;
            if mutated {
                debug!("{} --- {} mutated successfully", t, self.chains[i]);
            }

            // Choose a distinct partner chain
            let mut j = self.rng.gen_range(0..num_chains);
            while j == i {
                j = self.rng.gen_range(0..num_chains);
            }

            // Exchange step
            let exchanged = self.exchange(i, j)?;
            if exchanged {
                debug!("{} --- {} swapped with {}", t, self.chains[i], self.chains[j]);
            }

            // Record the parameter history for the whole population
            for chain in &mut self.chains {
                chain.append_history(t)?;
            }
        }

        info!("run complete: {} history rows", num_chains * self.max_its);
        Ok(())
    }

    /// Attempt a replica exchange between the chains at indices `i` and `j`.
    ///
    /// With untempered densities `d_i`, `d_j` and temperatures `T_i`, `T_j`,
    /// the tempered density of chain `k` at state `x` is `(1 - T_k) d(x)`,
    /// and the swap is accepted with probability
    /// `min(1, exp(pi_i(x_j) + pi_j(x_i) - pi_i(x_i) - pi_j(x_j)))`.
    /// On acceptance the two parameter vectors are swapped in place; ids and
    /// temperings stay with their chain. Returns whether the swap occurred.
    pub fn exchange(&mut self, i: usize, j: usize) -> PopMcmcResult<bool> {
        if i == j || i >= self.chains.len() || j >= self.chains.len() {
            return Err(PopMcmcError::Error(format!(
                "exchange needs two distinct chain indices below {}, got {} and {}",
                self.chains.len(),
                i,
                j
            )));
        }

        let density_i = self.chains[i].density(self.y_obs.view())?;
        let density_j = self.chains[j].density(self.y_obs.view())?;
        let tempering_i = self.chains[i].tempering();
        let tempering_j = self.chains[j].tempering();

        let pi_i_x_i = (1.0 - tempering_i) * density_i;
        let pi_i_x_j = (1.0 - tempering_i) * density_j;
        let pi_j_x_i = (1.0 - tempering_j) * density_i;
        let pi_j_x_j = (1.0 - tempering_j) * density_j;
        let log_acceptance = pi_i_x_j + pi_j_x_i - pi_i_x_i - pi_j_x_j;

        let acceptance = log_acceptance.min(0.0).exp();
        let u: f64 = self.rng.gen();
        if acceptance > u {
            let (lo, hi) = self.chains.split_at_mut(i.max(j));
            let (first, second) = (&mut lo[i.min(j)], &mut hi[0]);
            first.swap_params(second);
            return Ok(true);
        }
        Ok(false)
    }

    /// The combined parameter history of all chains.
    ///
    /// Columns are `[t, param_1, ..., param_m, id]` with one row per
    /// (iteration, chain) pair, concatenated chain by chain in insertion
    /// order. A full run contributes `N x max_its` rows.
    pub fn param_history(&self) -> PopMcmcResult<HistoryTable> {
        let mut table =
            HistoryTable::with_capacity(&self.param_names, self.chains.len() * self.max_its);
        for chain in &self.chains {
            table.append(chain.history())?;
        }
        Ok(table)
    }

    pub fn num_chains(&self) -> usize {
        self.chains.len()
    }

    pub fn chains(&self) -> &[Chain] {
        &self.chains
    }

    pub fn param_names(&self) -> &[String] {
        &self.param_names
    }

    pub fn max_its(&self) -> usize {
        self.max_its
    }

    /// The burn-in bound supplied at construction. Downstream posterior
    /// summaries conventionally discard history rows with `t` below this.
    pub fn burn_in(&self) -> usize {
        self.burn_in
    }

    pub fn log_prior(&self) -> &LogPrior {
        &self.log_prior
    }

    pub fn ode_system(&self) -> &OdeSystem {
        &self.ode_system
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

    /// A system whose solution is constantly `y_init`, independent of theta,
    /// keeping these tests cheap and the likelihood exactly computable.
    fn constant_system() -> OdeSystem {
        let rhs = |_y: &State, _t: Time, _theta: &[f64], dy_dt: &mut State| {
            dy_dt[0] = 0.0;
        };
        OdeSystem::new(
            rhs,
            dvector![1.0],
            Array1::linspace(0.0, 1.0, 4),
            1,
            "constant",
        )
        .unwrap()
    }

    fn exact_obs() -> Array2<f64> {
        Array2::from_elem((4, 1), 1.0)
    }

    /// Bounds symmetric around zero for the parameter and around 1 for the
    /// noise scale.
    fn bounds() -> Array2<f64> {
        array![[-4.0, 0.5], [4.0, 1.5]]
    }

    fn builder() -> SimulatorBuilder {
        SimulatorBuilder::new(constant_system(), 4, exact_obs(), bounds())
            .with_max_its(10)
            .with_burn_in(5)
    }

    #[test]
    fn test_build_validates_bounds_rows() {
        let bad_bounds = array![[-1.0, 0.5]];
        let result = SimulatorBuilder::new(constant_system(), 4, exact_obs(), bad_bounds).build();
        assert!(matches!(result, Err(PopMcmcError::InvalidBounds(_))));
    }

    #[test]
    fn test_build_validates_bounds_columns() {
        // One ODE parameter + one noise scale = 2 expected columns
        let bad_bounds = array![[-1.0, 0.5, 0.0], [1.0, 1.5, 1.0]];
        let result = SimulatorBuilder::new(constant_system(), 4, exact_obs(), bad_bounds).build();
        assert!(matches!(
            result,
            Err(PopMcmcError::BoundsMismatch {
                expected: 2,
                actual: 3
            })
        ));
    }

    #[test]
    fn test_build_validates_burn_in() {
        let result = builder().with_max_its(10).with_burn_in(11).build();
        assert!(matches!(
            result,
            Err(PopMcmcError::BurnInExceedsBudget {
                burn_in: 11,
                max_its: 10
            })
        ));
    }

    #[test]
    fn test_build_validates_observation_shape() {
        let wrong_obs = Array2::from_elem((3, 1), 1.0);
        let result = SimulatorBuilder::new(constant_system(), 4, wrong_obs, bounds()).build();
        assert!(result.is_err());
    }

    #[test]
    fn test_build_requires_two_chains() {
        let result = SimulatorBuilder::new(constant_system(), 1, exact_obs(), bounds()).build();
        assert!(result.is_err());
    }

    #[test]
    fn test_default_param_names() {
        let simulator = builder().build().unwrap();
        assert_eq!(simulator.param_names(), &["param_1", "param_2"]);

        // A name list of the wrong length falls back to the defaults
        let simulator = builder()
            .with_param_names(vec!["a".to_string()])
            .build()
            .unwrap();
        assert_eq!(simulator.param_names(), &["param_1", "param_2"]);

        let simulator = builder()
            .with_param_names(vec!["a".to_string(), "sigma".to_string()])
            .build()
            .unwrap();
        assert_eq!(simulator.param_names(), &["a", "sigma"]);
    }

    #[test]
    fn test_initial_sample_within_bounds() {
        let mut simulator = builder()
            .build_with_rng(ChaCha8Rng::seed_from_u64(7))
            .unwrap();
        simulator.set_uniform_initial_sample();

        for chain in simulator.chains() {
            let params = chain.params().unwrap();
            assert!(params[0] >= -4.0 && params[0] < 4.0);
            assert!(params[1] >= 0.5 && params[1] < 1.5);
        }
    }

    #[test]
    fn test_exchange_certain_when_densities_equal() {
        // Mirror-image parameters around the prior mean give the two chains
        // identical densities (the constant model ignores theta), so the
        // log acceptance is exactly zero and the swap always happens.
        let mut simulator = builder()
            .build_with_rng(ChaCha8Rng::seed_from_u64(3))
            .unwrap();
        let x_a = array![-1.0, 1.0];
        let x_b = array![1.0, 1.0];

        // Indices are 0-based; chains 0 and 3 have distinct temperatures.
        {
            let chains = &mut simulator.chains;
            chains[0].set_params(x_a.clone());
            chains[3].set_params(x_b.clone());
        }

        let swapped = simulator.exchange(0, 3).unwrap();
        assert!(swapped);
        assert_eq!(simulator.chains()[0].params().unwrap(), &x_b);
        assert_eq!(simulator.chains()[3].params().unwrap(), &x_a);

        // Swapping twice with the same intervening densities restores the
        // original assignment.
        let swapped = simulator.exchange(0, 3).unwrap();
        assert!(swapped);
        assert_eq!(simulator.chains()[0].params().unwrap(), &x_a);
        assert_eq!(simulator.chains()[3].params().unwrap(), &x_b);
    }

    #[test]
    fn test_exchange_rejects_same_index() {
        let mut simulator = builder()
            .build_with_rng(ChaCha8Rng::seed_from_u64(3))
            .unwrap();
        simulator.set_uniform_initial_sample();
        assert!(simulator.exchange(2, 2).is_err());
        assert!(simulator.exchange(0, 9).is_err());
    }

    #[test]
    fn test_run_records_full_history() {
        let mut simulator = builder()
            .with_max_its(25)
            .with_burn_in(0)
            .build_with_rng(ChaCha8Rng::seed_from_u64(11))
            .unwrap();
        simulator.run().unwrap();

        let history = simulator.param_history().unwrap();
        assert_eq!(history.n_rows(), 4 * 25);
        assert_eq!(history.columns(), &["t", "param_1", "param_2", "id"]);

        let ids = history.column("id").unwrap();
        assert!(ids.iter().all(|&id| (1.0..=4.0).contains(&id)));
        // Every chain contributes exactly max_its rows
        for chain_id in 1..=4 {
            let count = ids.iter().filter(|&&id| id == chain_id as f64).count();
            assert_eq!(count, 25);
        }

        let ts = history.column("t").unwrap();
        assert!(ts.iter().all(|&t| t < 25.0));
    }

    #[test]
    fn test_seeded_runs_are_reproducible() {
        let run = |seed: u64| {
            let mut simulator = builder()
                .with_max_its(15)
                .with_burn_in(0)
                .build_with_rng(ChaCha8Rng::seed_from_u64(seed))
                .unwrap();
            simulator.run().unwrap();
            simulator.param_history().unwrap()
        };

        assert_eq!(run(99), run(99));
        assert_ne!(run(99), run(100));
    }
}
