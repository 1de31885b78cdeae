use thiserror::Error;

/// Error type for invalid operations.
///
/// Every construction-time check is fail-fast and names the violated
/// invariant. Nothing is caught or retried during a run; an error aborts it.
#[derive(Error, Debug)]
pub enum PopMcmcError {
    #[error("{0}")]
    Error(String),
    #[error("invalid bounds: {0}")]
    InvalidBounds(String),
    #[error("expected {expected} bounds columns (ODE parameters + noise scales), got {actual}")]
    BoundsMismatch { expected: usize, actual: usize },
    #[error("parameter vector length must match the number of bounds columns ({actual} != {expected})")]
    DimensionMismatch { expected: usize, actual: usize },
    #[error("chain id must lie between 1 and {num_chains}, got {id}")]
    InvalidChainId { id: usize, num_chains: usize },
    #[error("burn-in length ({burn_in}) cannot be more than the iteration budget ({max_its})")]
    BurnInExceedsBudget { burn_in: usize, max_its: usize },
    #[error("chain {0} has not been initialised yet")]
    UninitialisedChain(usize),
    #[error("ODE integration failed: {0}")]
    SolveFailed(String),
}

/// Convenience type for `Result<T, PopMcmcError>`.
pub type PopMcmcResult<T> = Result<T, PopMcmcError>;
