use thiserror::Error;

/// Fatal conditions surfaced by the solver. None of these are recoverable
/// inside the engine; hitting the time limit is deliberately *not* an error
/// (the run reports its best bounds and exits normally).
#[derive(Debug, Error)]
pub enum SolverError {
    #[error("malformed instance: {0}")]
    InstanceMalformed(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("root relaxation cannot be built: {0}")]
    RootInfeasible(String),

    /// A child's relaxation beat its parent's, or the global upper bound
    /// rose between dispatch cycles. Either way the bounds can no longer be
    /// trusted, so the run aborts.
    #[error("bound monotonicity violated: {0}")]
    BoundMonotonicity(String),

    /// Pricing produced a path revisiting a target that was already being
    /// tracked as critical.
    #[error("critical target revisited: {0}")]
    CriticalCycle(String),

    #[error("master problem backend: {0}")]
    Master(String),

    #[error("worker failed: {0}")]
    WorkerFailure(String),
}

pub type Result<T> = std::result::Result<T, SolverError>;
