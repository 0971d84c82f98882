//! Observability seam for breaker events.

use std::time::Duration;

use crate::outcome::Outcome;
use crate::state::State;

/// Receives breaker events for every endpoint in a registry.
///
/// The crate does no logging or metrics of its own; a host installs a
/// listener on the registry and forwards events to whatever backend it uses.
/// All methods default to no-ops, so an implementation overrides only what it
/// cares about. Callbacks run on the calling thread, outside the endpoint
/// lock; keep them cheap.
pub trait BreakerListener: Send + Sync + 'static {
    /// A breaker changed state.
    fn on_transition(&self, service: &str, from: State, to: State) {
        let _ = (service, from, to);
    }

    /// A call was rejected without reaching the dependency.
    fn on_rejection(&self, service: &str) {
        let _ = service;
    }

    /// A call outcome was recorded. `elapsed` is the observed latency, the
    /// waited-out deadline for timeouts, or `None` for aborted attempts.
    fn on_outcome(&self, service: &str, outcome: Outcome, elapsed: Option<Duration>) {
        let _ = (service, outcome, elapsed);
    }
}

/// Listener that discards all events. The registry default.
pub struct NullListener;

impl BreakerListener for NullListener {}
