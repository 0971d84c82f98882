//! Outcome model: what an operation returns, what the caller gets back, and
//! how an attempt is classified for circuit health.
//!
//! The crux of the design lives here. A "no such record" reply from a healthy
//! dependency must not count against the breaker — a naive scheme that treats
//! every error as a failure would trip the circuit on ordinary not-found
//! responses. The operation contract therefore uses an explicit [`Reply`]
//! variant for misses instead of error-type dispatch, and the classifier maps
//! misses to a healthy outcome.

use std::time::Duration;

use crate::error::Cause;
use crate::executor::Attempt;

/// What a guarded remote operation returns.
///
/// The operation reports a miss as data (`NotFound`), not as an error. This is
/// the downstream-404 case: the dependency is healthy, the record isn't there.
#[derive(Debug, Clone)]
pub enum Reply<T, E> {
    /// The lookup produced a value.
    Found(T),

    /// The dependency answered, but the record does not exist.
    NotFound,

    /// The dependency failed to answer usefully (transport error,
    /// unexpected status, malformed response).
    Error(E),
}

impl<T, E> Reply<T, E> {
    /// Maps an optional value to `Found`/`NotFound`, the common shape of a
    /// client that already decoded a 404 into `None`.
    pub fn from_option(value: Option<T>) -> Self {
        match value {
            Some(v) => Reply::Found(v),
            None => Reply::NotFound,
        }
    }
}

/// What the gateway returns to the caller on the non-error path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup<T> {
    /// The value, from the operation or from a fallback substitute.
    Found(T),

    /// Business miss: the dependency is healthy but has no such record.
    NotFound,
}

impl<T> Lookup<T> {
    /// True if this lookup carries a value.
    pub fn is_found(&self) -> bool {
        matches!(self, Lookup::Found(_))
    }

    /// Converts to an `Option`, discarding the distinction's name.
    pub fn into_option(self) -> Option<T> {
        match self {
            Lookup::Found(v) => Some(v),
            Lookup::NotFound => None,
        }
    }
}

/// Health label recorded into an endpoint's sliding window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The call completed acceptably (including business misses).
    Success,

    /// The call failed, timed out, or aborted.
    Failure,

    /// The call completed, but its latency exceeded the slow-call threshold.
    /// Tracked separately from failures; both rates are computed independently.
    Slow,
}

/// A classified attempt: the health label to record plus the caller-facing
/// verdict.
pub(crate) struct Classified<T, E> {
    pub(crate) health: Outcome,
    pub(crate) elapsed: Option<Duration>,
    pub(crate) verdict: Verdict<T, E>,
}

/// Caller-facing disposition of one attempt.
pub(crate) enum Verdict<T, E> {
    Value(T),
    Miss,
    Failed(Cause<E>),
}

/// Classifies the terminal report of an attempt.
///
/// Misses classify as healthy. Timeouts and aborts always classify as
/// failures, never as misses. A completed call over `slow_after` is `Slow`
/// (unless it errored, in which case `Failure` dominates).
pub(crate) fn classify<T, E>(attempt: Attempt<T, E>, slow_after: Duration) -> Classified<T, E> {
    match attempt {
        Attempt::Completed { reply, elapsed } => {
            let slow = elapsed > slow_after;
            let healthy = if slow { Outcome::Slow } else { Outcome::Success };
            match reply {
                Reply::Found(value) => Classified {
                    health: healthy,
                    elapsed: Some(elapsed),
                    verdict: Verdict::Value(value),
                },
                Reply::NotFound => Classified {
                    health: healthy,
                    elapsed: Some(elapsed),
                    verdict: Verdict::Miss,
                },
                Reply::Error(err) => Classified {
                    health: Outcome::Failure,
                    elapsed: Some(elapsed),
                    verdict: Verdict::Failed(Cause::Operation(err)),
                },
            }
        }
        Attempt::TimedOut { waited } => Classified {
            health: Outcome::Failure,
            elapsed: Some(waited),
            verdict: Verdict::Failed(Cause::Timeout(waited)),
        },
        Attempt::Aborted => Classified {
            health: Outcome::Failure,
            elapsed: None,
            verdict: Verdict::Failed(Cause::Aborted),
        },
    }
}
