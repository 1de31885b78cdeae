//! A single tempered replica of the population.
//!
//! Each chain owns a tempering parameter, a current parameter vector and an
//! append-only parameter history. The chain evaluates the *untempered*
//! posterior density (log prior + log likelihood) and performs a local
//! Metropolis random-walk mutation; tempering only enters the controller's
//! exchange step.

use std::fmt;
use std::sync::Arc;

use ndarray::{s, Array1, ArrayView2};
use rand::Rng;
use rand_distr::StandardNormal;

use crate::errors::{PopMcmcError, PopMcmcResult};
use crate::history::HistoryTable;
use crate::log_prior::LogPrior;
use crate::ode_system::OdeSystem;
use crate::stats::gaussian_log_density;

/// One replica in a population MCMC run.
pub struct Chain {
    id: usize,
    tempering: f64,
    ode_system: Arc<OdeSystem>,
    log_prior: Arc<LogPrior>,
    /// Absent until the controller draws the initial uniform sample.
    current_params: Option<Array1<f64>>,
    history: HistoryTable,
}

impl Chain {
    /// Create a chain with identity `id` in a population of `num_chains`.
    ///
    /// Ids run from 1 to N; the tempering parameter is `(id - 1) / N`, a
    /// uniformly spaced ladder where id 1 is the cold reference chain and
    /// larger ids sample progressively flatter posteriors during exchange.
    /// `history_capacity` pre-allocates the history for that many records.
    pub fn new(
        id: usize,
        num_chains: usize,
        ode_system: Arc<OdeSystem>,
        log_prior: Arc<LogPrior>,
        param_names: &[String],
        history_capacity: usize,
    ) -> PopMcmcResult<Self> {
        if id < 1 || id > num_chains {
            return Err(PopMcmcError::InvalidChainId { id, num_chains });
        }
        Ok(Self {
            id,
            tempering: (id - 1) as f64 / num_chains as f64,
            ode_system,
            log_prior,
            current_params: None,
            history: HistoryTable::with_capacity(param_names, history_capacity),
        })
    }

    /// Untempered log posterior density at the current parameters,
    /// `log(prior) + log(likelihood)`. Tempering is applied later, by the
    /// controller's exchange step.
    pub fn density(&self, y_obs: ArrayView2<f64>) -> PopMcmcResult<f64> {
        let params = self.params_or_err()?;
        let log_prior = self.log_prior.evaluate(params)?;
        let log_likelihood = self.log_likelihood(params, y_obs)?;
        Ok(log_prior + log_likelihood)
    }

    /// Gaussian log likelihood of the observations given `params`.
    ///
    /// The model-parameter prefix of `params` is fed to the ODE solver and
    /// the trailing entries provide one observation-noise scale per output
    /// dimension.
    fn log_likelihood(&self, params: &Array1<f64>, y_obs: ArrayView2<f64>) -> PopMcmcResult<f64> {
        let n_theta = self.ode_system.n_theta();
        let theta: Vec<f64> = params.iter().take(n_theta).copied().collect();
        let std_devs = params.slice(s![n_theta..]);

        let expected = self.ode_system.solve(&theta)?;

        let (num_time_steps, num_vars) = y_obs.dim();
        let mut total = 0.0;
        for (i, (_, y)) in expected.iter().enumerate().take(num_time_steps) {
            for j in 0..num_vars {
                total += gaussian_log_density(y_obs[[i, j]], y[j], std_devs[j]);
            }
        }
        Ok(total)
    }

    /// Propose a Metropolis random-walk step and accept or reject it.
    ///
    /// The proposal draws each dimension independently from a Gaussian
    /// centred on the current value with the prior's standard deviation
    /// (a symmetric kernel, so no Hastings correction is needed). Accepts
    /// iff `exp(new_density - current_density)` beats a uniform draw; on
    /// rejection the pre-proposal parameters are restored exactly. The
    /// acceptance uses the untempered density for every chain regardless of
    /// its temperature.
    ///
    /// Returns whether the proposal was accepted.
    pub fn mutate<R: Rng>(&mut self, y_obs: ArrayView2<f64>, rng: &mut R) -> PopMcmcResult<bool> {
        let old_params = self.params_or_err()?.clone();
        let current_density = self.density(y_obs)?;

        let scale = self.log_prior.std_devs();
        let proposal: Array1<f64> = old_params
            .iter()
            .zip(scale.iter())
            .map(|(&p, &s)| p + s * rng.sample::<f64, _>(StandardNormal))
            .collect();

        // The density is always evaluated at the chain's current parameters,
        // so the proposal is applied tentatively and reverted on rejection.
        self.current_params = Some(proposal);
        let new_density = self.density(y_obs)?;

        let r = (new_density - current_density).exp();
        let u: f64 = rng.gen();
        if r > u {
            Ok(true)
        } else {
            self.current_params = Some(old_params);
            Ok(false)
        }
    }

    /// Append one `(t, current params, id)` record to this chain's history.
    pub fn append_history(&mut self, t: usize) -> PopMcmcResult<()> {
        let params = self
            .current_params
            .as_ref()
            .ok_or(PopMcmcError::UninitialisedChain(self.id))?;
        self.history.push_row(t, params, self.id);
        Ok(())
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn tempering(&self) -> f64 {
        self.tempering
    }

    /// Current parameters, `None` until the chain has been initialised.
    pub fn params(&self) -> Option<&Array1<f64>> {
        self.current_params.as_ref()
    }

    /// Replace the current parameters, noise scales included.
    pub fn set_params(&mut self, params: Array1<f64>) {
        self.current_params = Some(params);
    }

    /// Swap parameter vectors with another chain; ids, temperings and
    /// histories stay with their chain. Used by the controller's exchange.
    pub(crate) fn swap_params(&mut self, other: &mut Chain) {
        std::mem::swap(&mut self.current_params, &mut other.current_params);
    }

    pub fn history(&self) -> &HistoryTable {
        &self.history
    }

    fn params_or_err(&self) -> PopMcmcResult<&Array1<f64>> {
        self.current_params
            .as_ref()
            .ok_or(PopMcmcError::UninitialisedChain(self.id))
    }
}

impl fmt::Display for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.current_params {
            Some(params) => write!(f, "Chain {} with parameters {}", self.id, params),
            None => write!(f, "Chain {} (uninitialised)", self.id),
        }
    }
}
