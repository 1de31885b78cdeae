//! Population (parallel tempering) MCMC calibration of ODE models.
//!
//! The crate calibrates the parameters of an ordinary-differential-equation
//! model against noisy time-series observations. Users supply a model
//! right-hand side, `2 x m` bounds on the parameters (including one
//! observation-noise scale per output dimension) and an observed data table;
//! a population of tempered Markov chains then produces posterior parameter
//! samples as a columnar history table.
//!
//! Each chain `k` of `N` carries a tempering parameter `T_k = (k - 1) / N`
//! that flattens its target posterior during exchange comparisons; chain 1 is
//! the cold reference chain whose samples approximate the true posterior.
//! Every iteration mutates one chain with a Metropolis random walk, attempts
//! a replica exchange between two chains using their tempered densities, and
//! records the state of the whole population.
//!
//! ```no_run
//! use ndarray::{array, Array1};
//! use nalgebra::dvector;
//! use population_mcmc::{OdeSystem, SimulatorBuilder, State, Time};
//!
//! // dy/dt = a * y with y(0) = 1
//! let rhs = |y: &State, _t: Time, theta: &[f64], dy_dt: &mut State| {
//!     dy_dt[0] = theta[0] * y[0];
//! };
//! let system = OdeSystem::new(rhs, dvector![1.0], Array1::linspace(0.0, 5.0, 100), 1, "growth")?;
//!
//! // Observed data with shape (time steps x output dimensions)
//! let y_obs = ndarray::Array2::ones((100, 1));
//!
//! // Bounds over the ODE parameter and the observation-noise scale
//! let bounds = array![[0.0, 1e-4], [4.0, 1.0]];
//!
//! let mut simulator = SimulatorBuilder::new(system, 5, y_obs, bounds)
//!     .with_param_names(vec!["a".to_string(), "sigma".to_string()])
//!     .with_max_its(500)
//!     .with_burn_in(250)
//!     .with_seed(42)
//!     .build()?;
//! simulator.run()?;
//! let history = simulator.param_history()?;
//! # Ok::<(), population_mcmc::PopMcmcError>(())
//! ```

pub mod chain;
pub mod data_generator;
pub mod errors;
pub mod history;
pub mod log_prior;
pub mod ode_system;
pub mod simulator;
mod stats;

pub use chain::Chain;
pub use data_generator::DataGenerator;
pub use errors::{PopMcmcError, PopMcmcResult};
pub use history::HistoryTable;
pub use log_prior::LogPrior;
pub use ode_system::{OdeRhs, OdeSystem, State, Time};
pub use simulator::{Simulator, SimulatorBuilder};
