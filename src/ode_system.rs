//! Model evaluator: wraps an ODE right-hand side and solves it for a given
//! parameter vector over a fixed time grid.
//!
//! The system has the form `y'(t) = f(y, t; theta)`, `y(0) = y_init`, where
//! `y` is an n-dimensional state vector and `theta` an m-dimensional
//! parameter vector. Solutions are produced with a fixed-step RK4 integrator,
//! so identical `theta` and grid always yield identical output.

use nalgebra::DVector;
use ndarray::Array1;
use ode_solvers::dop_shared::System;
use ode_solvers::Rk4;

use crate::errors::{PopMcmcError, PopMcmcResult};

/// Scalar time.
pub type Time = f64;

/// State vector of the ODE system.
pub type State = DVector<f64>;

/// Number of internal RK4 steps taken between consecutive grid points.
const SUBSTEPS: usize = 10;

/// Right-hand side of a system of ODEs, `f(y, t; theta)`.
///
/// `theta` holds only the free model parameters, never the trailing
/// noise scales of a full calibration parameter vector.
pub trait OdeRhs: Send + Sync {
    fn rhs(&self, y: &State, t: Time, theta: &[f64], dy_dt: &mut State);
}

impl<F> OdeRhs for F
where
    F: Fn(&State, Time, &[f64], &mut State) + Send + Sync,
{
    fn rhs(&self, y: &State, t: Time, theta: &[f64], dy_dt: &mut State) {
        self(y, t, theta, dy_dt)
    }
}

/// Adapter presenting an [`OdeRhs`] at fixed `theta` to the integrator.
struct OdeProblem<'a> {
    rhs: &'a dyn OdeRhs,
    theta: &'a [f64],
}

impl System<Time, State> for OdeProblem<'_> {
    fn system(&self, t: Time, y: &State, dy_dt: &mut State) {
        self.rhs.rhs(y, t, self.theta, dy_dt);
    }
}

/// An ODE system together with its initial state and solution time grid.
pub struct OdeSystem {
    rhs: Box<dyn OdeRhs>,
    y_init: State,
    times: Array1<Time>,
    n_theta: usize,
    title: String,
}

impl OdeSystem {
    /// Create a new system.
    ///
    /// `n_theta` declares how many free parameters `rhs` consumes; it cannot
    /// be introspected from the function itself and is not re-validated at
    /// solve time, so callers of [`OdeSystem::solve`] must pass a `theta` of
    /// exactly this length.
    pub fn new(
        rhs: impl OdeRhs + 'static,
        y_init: State,
        times: Array1<Time>,
        n_theta: usize,
        title: impl Into<String>,
    ) -> PopMcmcResult<Self> {
        if y_init.is_empty() {
            return Err(PopMcmcError::Error(
                "initial state must have at least one entry".to_string(),
            ));
        }
        if times.is_empty() {
            return Err(PopMcmcError::Error(
                "time grid must have at least one point".to_string(),
            ));
        }
        if times.windows(2).into_iter().any(|w| w[1] <= w[0]) {
            return Err(PopMcmcError::Error(
                "time grid must be strictly increasing".to_string(),
            ));
        }
        Ok(Self {
            rhs: Box::new(rhs),
            y_init,
            times,
            n_theta,
            title: title.into(),
        })
    }

    /// Solve the system at the given parameters.
    ///
    /// Returns one `(time, state)` pair per grid point; the first pair is the
    /// initial state at `times[0]`. Integrator failure propagates as
    /// [`PopMcmcError::SolveFailed`].
    pub fn solve(&self, theta: &[f64]) -> PopMcmcResult<Vec<(Time, State)>> {
        let mut solution = Vec::with_capacity(self.times.len());
        let mut y = self.y_init.clone();
        solution.push((self.times[0], y.clone()));

        for w in self.times.windows(2) {
            let (t_current, t_next) = (w[0], w[1]);
            let step = (t_next - t_current) / SUBSTEPS as f64;
            let problem = OdeProblem {
                rhs: self.rhs.as_ref(),
                theta,
            };
            let mut stepper = Rk4::new(problem, t_current, y, t_next, step);
            stepper
                .integrate()
                .map_err(|e| PopMcmcError::SolveFailed(format!("{:?}", e)))?;
            y = stepper
                .y_out()
                .last()
                .cloned()
                .ok_or_else(|| PopMcmcError::SolveFailed("integrator produced no output".to_string()))?;
            solution.push((t_next, y.clone()));
        }

        Ok(solution)
    }

    /// Number of free parameters the right-hand side consumes.
    pub fn n_theta(&self) -> usize {
        self.n_theta
    }

    /// Dimension of the state vector `y`.
    pub fn dim_y(&self) -> usize {
        self.y_init.len()
    }

    /// The solution time grid.
    pub fn times(&self) -> &Array1<Time> {
        &self.times
    }

    /// Display title of the system.
    pub fn title(&self) -> &str {
        &self.title
    }
}
