//! Per-service breaker instances and the registry that owns them.

use std::sync::Arc;
use std::time::Duration;

use ahash::AHashMap;
use parking_lot::RwLock;

use crate::config::Settings;
use crate::hook::{BreakerListener, NullListener};
use crate::outcome::Outcome;
use crate::state::{CallToken, State, StateMachine};

/// One guarded downstream dependency: its settings and its breaker state.
///
/// Exactly one instance exists per service name within a registry, created on
/// first use and kept for the registry's lifetime.
pub struct GuardedEndpoint {
    service: String,
    settings: Settings,
    machine: StateMachine,
    listener: Arc<dyn BreakerListener>,
}

impl GuardedEndpoint {
    fn new(service: String, settings: Settings, listener: Arc<dyn BreakerListener>) -> Self {
        let machine = StateMachine::new(settings.clone());
        Self {
            service,
            settings,
            machine,
            listener,
        }
    }

    /// The service name this endpoint guards.
    pub fn service(&self) -> &str {
        &self.service
    }

    /// Current breaker state.
    pub fn state(&self) -> State {
        self.machine.state()
    }

    /// Current failure rate over the sliding window (0.0 below minimum fill).
    pub fn failure_rate(&self) -> f64 {
        self.machine.failure_rate()
    }

    pub(crate) fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Asks the breaker whether a call may proceed, notifying the listener of
    /// any lazy transition and of rejections. Returns the token the call's
    /// outcome must be recorded under, or `None` if rejected.
    pub(crate) fn permit(&self) -> Option<CallToken> {
        let (token, transition) = self.machine.permit();
        if let Some(t) = transition {
            self.listener.on_transition(&self.service, t.from, t.to);
        }
        if token.is_none() {
            self.listener.on_rejection(&self.service);
        }
        token
    }

    /// Records a classified outcome, notifying the listener.
    pub(crate) fn record(&self, outcome: Outcome, elapsed: Option<Duration>, token: CallToken) {
        let transition = self.machine.record(outcome, token);
        self.listener.on_outcome(&self.service, outcome, elapsed);
        if let Some(t) = transition {
            self.listener.on_transition(&self.service, t.from, t.to);
        }
    }
}

/// Process-owned registry of guarded endpoints, keyed by service name.
///
/// Endpoints are created lazily with the registry defaults, or with a
/// per-service override where one was configured. The registry is meant to be
/// built once, wrapped in an [`Arc`], and handed to the gateway — there is no
/// ambient global instance.
pub struct EndpointRegistry {
    defaults: Settings,
    overrides: AHashMap<String, Settings>,
    listener: Arc<dyn BreakerListener>,
    endpoints: RwLock<AHashMap<String, Arc<GuardedEndpoint>>>,
}

impl EndpointRegistry {
    /// Creates a builder with default settings and a no-op listener.
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder {
            defaults: Settings::default(),
            overrides: AHashMap::new(),
            listener: Arc::new(NullListener),
        }
    }

    /// Returns the endpoint for `service`, creating it on first use.
    pub fn endpoint(&self, service: &str) -> Arc<GuardedEndpoint> {
        if let Some(endpoint) = self.endpoints.read().get(service) {
            return Arc::clone(endpoint);
        }

        let mut endpoints = self.endpoints.write();
        // Double-checked: another caller may have created it between locks.
        if let Some(endpoint) = endpoints.get(service) {
            return Arc::clone(endpoint);
        }

        let settings = self
            .overrides
            .get(service)
            .cloned()
            .unwrap_or_else(|| self.defaults.clone());
        let endpoint = Arc::new(GuardedEndpoint::new(
            service.to_string(),
            settings,
            Arc::clone(&self.listener),
        ));
        endpoints.insert(service.to_string(), Arc::clone(&endpoint));
        endpoint
    }

    /// Looks up an existing endpoint without creating one.
    pub fn get(&self, service: &str) -> Option<Arc<GuardedEndpoint>> {
        self.endpoints.read().get(service).map(Arc::clone)
    }
}

impl Default for EndpointRegistry {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Builder for [`EndpointRegistry`].
pub struct RegistryBuilder {
    defaults: Settings,
    overrides: AHashMap<String, Settings>,
    listener: Arc<dyn BreakerListener>,
}

impl RegistryBuilder {
    /// Sets the process-wide default settings for lazily created endpoints.
    pub fn defaults(mut self, settings: Settings) -> Self {
        self.defaults = settings;
        self
    }

    /// Overrides the settings for one service name.
    pub fn override_for(mut self, service: impl Into<String>, settings: Settings) -> Self {
        self.overrides.insert(service.into(), settings);
        self
    }

    /// Installs a listener receiving events from every endpoint.
    pub fn listener<L: BreakerListener>(mut self, listener: L) -> Self {
        self.listener = Arc::new(listener);
        self
    }

    /// Builds the registry.
    pub fn build(self) -> EndpointRegistry {
        EndpointRegistry {
            defaults: self.defaults,
            overrides: self.overrides,
            listener: self.listener,
            endpoints: RwLock::new(AHashMap::new()),
        }
    }
}
