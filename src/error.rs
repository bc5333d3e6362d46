use crate::Handle;
use thiserror::Error;

/// Returned by an [`ObjectFactory`](crate::ObjectFactory) that cannot produce a
/// valid instance.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FactoryError {
    /// Host-bound creation was asked for an instance without any template.
    #[error("no template to instantiate from")]
    MissingTemplate,

    /// The creation strategy refused to build an instance.
    #[error("factory rejected creation: {0}")]
    Rejected(String),
}

/// Errors reported by [`ObjectPool`](crate::ObjectPool) and
/// [`PoolRegistry`](crate::PoolRegistry).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PoolError {
    /// The pool is bounded, at capacity, and has no idle instance.
    #[error("pool exhausted: all {max_count} instances are checked out")]
    Exhausted {
        /// Configured hard cap of the pool.
        max_count: usize,
    },

    /// The pool was destroyed.
    #[error("pool has been destroyed")]
    Disposed,

    /// The handle does not name an instance that is currently checked out.
    #[error("stale handle {0:?}")]
    StaleHandle(Handle),

    /// Size bounds are inconsistent.
    #[error("invalid pool configuration: {0}")]
    InvalidConfig(String),

    /// A pool for this object type is already registered.
    #[error("a pool for `{0}` is already registered")]
    AlreadyRegistered(&'static str),

    /// The factory failed; the inner error is passed through unchanged.
    #[error(transparent)]
    Factory(#[from] FactoryError),
}

/// Errors reported by [`Fsm`](crate::Fsm) and [`ProcedureFsm`](crate::ProcedureFsm).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FsmError {
    /// The target state key was never registered.
    #[error("invalid transition: state {0} is not registered")]
    InvalidTransition(String),

    /// The same state key was registered twice.
    #[error("state {0} is registered more than once")]
    DuplicateState(String),

    /// The operation needs an active state and there is none.
    #[error("no active state")]
    NoActiveState,
}

/// Errors reported by the frame driver.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// `tick` was called before `start` or after `shutdown`.
    #[error("runtime is not running")]
    NotRunning,

    /// A pool module failed.
    #[error(transparent)]
    Pool(#[from] PoolError),

    /// A state machine module failed.
    #[error(transparent)]
    Fsm(#[from] FsmError),

    /// Configuration could not be parsed.
    #[error("invalid runtime configuration: {0}")]
    Config(#[from] serde_json::Error),
}
