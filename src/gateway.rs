//! The guarded-call gateway: orchestration of one protected lookup.

use std::sync::Arc;

use crate::error::{Cause, ServiceUnavailable};
use crate::executor::TimeoutExecutor;
use crate::outcome::{classify, Lookup, Reply, Verdict};
use crate::registry::EndpointRegistry;
#[cfg(feature = "async")]
use crate::outcome::Outcome;
#[cfg(feature = "async")]
use crate::state::CallToken;

/// Entry point for guarded remote lookups.
///
/// A gateway is cheap to clone and share; all per-service state lives in the
/// injected [`EndpointRegistry`].
#[derive(Clone)]
pub struct Gateway {
    registry: Arc<EndpointRegistry>,
}

impl Gateway {
    /// Creates a gateway over the given registry.
    pub fn new(registry: Arc<EndpointRegistry>) -> Self {
        Self { registry }
    }

    /// The registry this gateway consults.
    pub fn registry(&self) -> &Arc<EndpointRegistry> {
        &self.registry
    }

    /// Executes one guarded lookup against `service`.
    ///
    /// The flow: resolve the endpoint, ask its breaker for permission, run
    /// the operation under the endpoint's deadline, classify the result,
    /// record it, and return. Rejected and failed calls go through `fallback`
    /// with the triggering [`Cause`]; the fallback must either produce a
    /// substitute value or a [`ServiceUnavailable`] — nothing else ever
    /// crosses this boundary. A [`Reply::NotFound`] from the operation comes
    /// back as [`Lookup::NotFound`], not as an error, and does not count
    /// against the breaker.
    ///
    /// The call blocks for at most the endpoint's configured timeout.
    /// Exactly one attempt is made; retrying is the caller's concern.
    pub fn invoke<T, E, F, G>(
        &self,
        service: &str,
        operation: F,
        fallback: G,
    ) -> Result<Lookup<T>, ServiceUnavailable>
    where
        T: Send + 'static,
        E: std::error::Error + Send + Sync + 'static,
        F: FnOnce() -> Reply<T, E> + Send + 'static,
        G: FnOnce(Cause<E>) -> Result<T, ServiceUnavailable>,
    {
        let endpoint = self.registry.endpoint(service);

        let token = match endpoint.permit() {
            Some(token) => token,
            None => return fallback(Cause::Rejected).map(Lookup::Found),
        };

        let executor = TimeoutExecutor::new(endpoint.settings().call_timeout);
        let attempt = executor.run(operation);
        let classified = classify(attempt, endpoint.settings().slow_call_duration);

        // Recording is unconditional once an outcome exists, and happens
        // before any return path.
        endpoint.record(classified.health, classified.elapsed, token);

        match classified.verdict {
            Verdict::Value(value) => Ok(Lookup::Found(value)),
            Verdict::Miss => Ok(Lookup::NotFound),
            Verdict::Failed(cause) => fallback(cause).map(Lookup::Found),
        }
    }
}

#[cfg(feature = "async")]
impl Gateway {
    /// Async twin of [`invoke`](Gateway::invoke), with the deadline enforced
    /// by the runtime instead of a helper thread.
    pub async fn invoke_async<T, E, F, Fut, G>(
        &self,
        service: &str,
        operation: F,
        fallback: G,
    ) -> Result<Lookup<T>, ServiceUnavailable>
    where
        E: std::error::Error + Send + Sync + 'static,
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Reply<T, E>>,
        G: FnOnce(Cause<E>) -> Result<T, ServiceUnavailable>,
    {
        let endpoint = self.registry.endpoint(service);

        let token = match endpoint.permit() {
            Some(token) => token,
            None => return fallback(Cause::Rejected).map(Lookup::Found),
        };

        // An async caller can drop this future mid-await. The guard makes
        // sure the permitted call still gets an outcome recorded, so a
        // half-open trial permit can never leak.
        let mut guard = AbandonGuard {
            endpoint: Arc::clone(&endpoint),
            token,
            armed: true,
        };

        let executor = TimeoutExecutor::new(endpoint.settings().call_timeout);
        let attempt = executor.run_async(operation).await;
        guard.armed = false;

        let classified = classify(attempt, endpoint.settings().slow_call_duration);

        endpoint.record(classified.health, classified.elapsed, token);

        match classified.verdict {
            Verdict::Value(value) => Ok(Lookup::Found(value)),
            Verdict::Miss => Ok(Lookup::NotFound),
            Verdict::Failed(cause) => fallback(cause).map(Lookup::Found),
        }
    }
}

/// Records an abandoned call as a failure.
///
/// Armed between permission and recording in [`Gateway::invoke_async`]: if
/// the caller drops the future while the operation is in flight, the
/// abandoned call is recorded as a timeout-equivalent [`Outcome::Failure`],
/// keeping the breaker's permit/record pairing intact.
#[cfg(feature = "async")]
struct AbandonGuard {
    endpoint: Arc<crate::registry::GuardedEndpoint>,
    token: CallToken,
    armed: bool,
}

#[cfg(feature = "async")]
impl Drop for AbandonGuard {
    fn drop(&mut self) {
        if self.armed {
            self.endpoint.record(Outcome::Failure, None, self.token);
        }
    }
}
