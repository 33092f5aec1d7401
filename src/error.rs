//! Crate-wide error type.
//!
//! Every fault surfaced by the evaluation engine, access checker, or
//! scheduler is a variant of [`SimError`]. Nothing in this crate panics on a
//! user-reachable path; internal invariant violations (a malformed compiled
//! tree) use `unreachable!`/`expect` because they indicate a bug in the
//! front end, not a runtime condition a caller can recover from.

use thiserror::Error;

/// Result alias used throughout the crate.
pub type SimResult<T> = Result<T, SimError>;

/// One of the two ways a test thread's access to a signal can be
/// disallowed by the access checker (see [`crate::access`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictKind {
    /// The signal itself was touched by an unrelated thread this tick.
    DirectConflict,
    /// A signal this one depends on (or is depended on by) was touched by
    /// an unrelated thread this tick, in a mode that makes the two
    /// accesses thread-order-dependent.
    DependentConflict,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SimError {
    #[error("unknown symbol: {0}")]
    UnknownSymbol(String),

    #[error("signal {0} is not pokeable (not an input, or not an IO leaf)")]
    UnpokeableSignal(String),

    #[error("signal {0} is not peekable (not an IO leaf)")]
    UnpeekableSignal(String),

    #[error("value class mismatch for symbol {symbol}: expected {expected}, got {actual}")]
    ClassMismatch {
        symbol: String,
        expected: &'static str,
        actual: &'static str,
    },

    #[error("value poked to {symbol} does not fit its {class} storage class")]
    ValueOutOfRange { symbol: String, class: &'static str },

    #[error("thread-order-dependent access to {signal} ({kind:?}, poke={is_poke})")]
    ThreadOrderDependent {
        signal: String,
        kind: ConflictKind,
        is_poke: bool,
    },

    #[error("simulation idle for {0} cycles without a value-changing poke: timeout")]
    Timeout(u64),

    #[error("assertion failed at step {0}")]
    AssertionFailed(u64),

    #[error("simulation stopped at step {0}")]
    Stop(u64),

    #[error("scheduler deadlock: no thread is runnable")]
    Deadlock,

    #[error("operation not supported on this backend")]
    NotSupported,

    #[error("underlying simulator exited early")]
    SimulatorExitedEarly,

    #[error("configuration error: {0}")]
    Config(String),
}
