use remoteguard::{
    BreakerListener, Cause, EndpointRegistry, Gateway, Lookup, Reply, ServiceUnavailable,
    Settings, State,
};
use std::error::Error;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

// Downstream error type standing in for a transport failure
#[derive(Debug)]
struct LookupError(String);

impl LookupError {
    fn new(msg: &str) -> Self {
        LookupError(msg.to_string())
    }
}

impl fmt::Display for LookupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Lookup error: {}", self.0)
    }
}

impl Error for LookupError {}

fn gateway_with(settings: Settings) -> Gateway {
    let registry = EndpointRegistry::builder().defaults(settings).build();
    Gateway::new(Arc::new(registry))
}

#[test]
fn business_misses_never_trip_the_breaker() {
    let gateway = gateway_with(
        Settings::builder()
            .ring_buffer_size(4)
            .min_calls(4)
            .failure_rate_threshold(0.5)
            .build(),
    );

    for _ in 0..20 {
        let result = gateway.invoke(
            "accounts-service",
            || Reply::<String, LookupError>::NotFound,
            |cause| Err(ServiceUnavailable::from_cause("accounts-service", cause)),
        );
        assert_eq!(result.unwrap(), Lookup::NotFound);
    }

    let endpoint = gateway.registry().endpoint("accounts-service");
    assert_eq!(endpoint.state(), State::Closed);
    assert_eq!(endpoint.failure_rate(), 0.0);
}

#[test]
fn failure_rate_at_threshold_trips_open_and_rejects_without_executing() {
    let gateway = gateway_with(
        Settings::builder()
            .ring_buffer_size(4)
            .min_calls(4)
            .failure_rate_threshold(0.5)
            .build(),
    );

    // Feed [Failure, Failure, Success, Success]: 50% failure rate at minimum fill.
    for _ in 0..2 {
        let result = gateway.invoke(
            "accounts-service",
            || Reply::<String, LookupError>::Error(LookupError::new("connection refused")),
            |cause| Err(ServiceUnavailable::from_cause("accounts-service", cause)),
        );
        assert!(result.is_err());
    }
    for _ in 0..2 {
        let result = gateway.invoke(
            "accounts-service",
            || Reply::<String, LookupError>::Found("account 123".to_string()),
            |cause| Err(ServiceUnavailable::from_cause("accounts-service", cause)),
        );
        assert!(result.is_ok());
    }

    let endpoint = gateway.registry().endpoint("accounts-service");
    assert_eq!(endpoint.state(), State::Open);
    assert_eq!(endpoint.failure_rate(), 0.5);

    // While open, the operation is never executed.
    let executions = Arc::new(AtomicUsize::new(0));
    for _ in 0..5 {
        let count = Arc::clone(&executions);
        let result = gateway.invoke(
            "accounts-service",
            move || {
                count.fetch_add(1, Ordering::SeqCst);
                Reply::<String, LookupError>::Found("unreachable".to_string())
            },
            |cause| {
                assert!(matches!(cause, Cause::Rejected));
                Err(ServiceUnavailable::from_cause("accounts-service", cause))
            },
        );
        assert!(result.is_err());
    }
    assert_eq!(executions.load(Ordering::SeqCst), 0);
}

#[test]
fn cooldown_elapses_then_trials_close_the_circuit() {
    let gateway = gateway_with(
        Settings::builder()
            .ring_buffer_size(2)
            .min_calls(2)
            .failure_rate_threshold(0.5)
            .open_wait(Duration::from_millis(100))
            .half_open_permits(2)
            .build(),
    );

    for _ in 0..2 {
        let _ = gateway.invoke(
            "accounts-service",
            || Reply::<String, LookupError>::Error(LookupError::new("boom")),
            |cause| Err(ServiceUnavailable::from_cause("accounts-service", cause)),
        );
    }
    let endpoint = gateway.registry().endpoint("accounts-service");
    assert_eq!(endpoint.state(), State::Open);

    thread::sleep(Duration::from_millis(200));

    // First call after the cooldown is the first half-open trial.
    let executions = Arc::new(AtomicUsize::new(0));
    for _ in 0..2 {
        let count = Arc::clone(&executions);
        let result = gateway.invoke(
            "accounts-service",
            move || {
                count.fetch_add(1, Ordering::SeqCst);
                Reply::<String, LookupError>::Found("recovered".to_string())
            },
            |cause| Err(ServiceUnavailable::from_cause("accounts-service", cause)),
        );
        assert!(result.is_ok());
    }

    assert_eq!(executions.load(Ordering::SeqCst), 2);
    assert_eq!(endpoint.state(), State::Closed);
    // The main window was reset on recovery.
    assert_eq!(endpoint.failure_rate(), 0.0);
}

#[test]
fn failing_trial_reopens_and_restarts_the_wait() {
    let gateway = gateway_with(
        Settings::builder()
            .ring_buffer_size(2)
            .min_calls(2)
            .failure_rate_threshold(0.5)
            .open_wait(Duration::from_millis(100))
            .half_open_permits(4)
            .build(),
    );

    for _ in 0..2 {
        let _ = gateway.invoke(
            "accounts-service",
            || Reply::<String, LookupError>::Error(LookupError::new("boom")),
            |cause| Err(ServiceUnavailable::from_cause("accounts-service", cause)),
        );
    }
    thread::sleep(Duration::from_millis(200));

    // One failing trial: 100% trial failure rate, straight back to open.
    let result = gateway.invoke(
        "accounts-service",
        || Reply::<String, LookupError>::Error(LookupError::new("still broken")),
        |cause| Err(ServiceUnavailable::from_cause("accounts-service", cause)),
    );
    assert!(result.is_err());

    let endpoint = gateway.registry().endpoint("accounts-service");
    assert_eq!(endpoint.state(), State::Open);

    // Wait timer restarted: immediate calls are rejected again.
    let executions = Arc::new(AtomicUsize::new(0));
    let count = Arc::clone(&executions);
    let result = gateway.invoke(
        "accounts-service",
        move || {
            count.fetch_add(1, Ordering::SeqCst);
            Reply::<String, LookupError>::Found("unreachable".to_string())
        },
        |cause| Err(ServiceUnavailable::from_cause("accounts-service", cause)),
    );
    assert!(result.is_err());
    assert_eq!(executions.load(Ordering::SeqCst), 0);
}

#[test]
fn timeout_counts_as_failure_even_if_operation_would_succeed() {
    let gateway = gateway_with(
        Settings::builder()
            .call_timeout(Duration::from_millis(50))
            .ring_buffer_size(4)
            .min_calls(1)
            .failure_rate_threshold(0.5)
            .build(),
    );

    let result = gateway.invoke(
        "accounts-service",
        || {
            thread::sleep(Duration::from_millis(300));
            Reply::<String, LookupError>::Found("eventually".to_string())
        },
        |cause| {
            assert!(matches!(cause, Cause::Timeout(_)));
            Err(ServiceUnavailable::from_cause("accounts-service", cause))
        },
    );
    assert!(result.is_err());

    let endpoint = gateway.registry().endpoint("accounts-service");
    assert_eq!(endpoint.failure_rate(), 1.0);
    assert_eq!(endpoint.state(), State::Open);
}

#[test]
fn fallback_may_substitute_a_value() {
    let gateway = gateway_with(Settings::default());

    let result = gateway.invoke(
        "accounts-service",
        || Reply::<String, LookupError>::Error(LookupError::new("boom")),
        |_cause| Ok("cached account".to_string()),
    );

    assert_eq!(result.unwrap(), Lookup::Found("cached account".to_string()));
}

#[test]
fn service_unavailable_carries_identity_message_and_cause() {
    let gateway = gateway_with(
        Settings::builder()
            .ring_buffer_size(2)
            .min_calls(2)
            .failure_rate_threshold(0.5)
            .build(),
    );

    for _ in 0..2 {
        let _ = gateway.invoke(
            "accounts-service",
            || Reply::<String, LookupError>::Error(LookupError::new("boom")),
            |cause| Err(ServiceUnavailable::from_cause("accounts-service", cause)),
        );
    }

    let err = gateway
        .invoke(
            "accounts-service",
            || Reply::<String, LookupError>::Found("unreachable".to_string()),
            |cause| Err(ServiceUnavailable::from_cause("accounts-service", cause)),
        )
        .unwrap_err();

    assert_eq!(err.service(), "accounts-service");
    assert!(err.message().contains("temporarily unavailable"));
    assert!(err.source().is_some());
}

#[test]
fn endpoints_do_not_interfere() {
    let gateway = gateway_with(
        Settings::builder()
            .ring_buffer_size(2)
            .min_calls(2)
            .failure_rate_threshold(0.5)
            .build(),
    );

    for _ in 0..2 {
        let _ = gateway.invoke(
            "accounts-service",
            || Reply::<String, LookupError>::Error(LookupError::new("boom")),
            |cause| Err(ServiceUnavailable::from_cause("accounts-service", cause)),
        );
    }
    assert_eq!(
        gateway.registry().endpoint("accounts-service").state(),
        State::Open
    );

    let result = gateway.invoke(
        "customers-service",
        || Reply::<String, LookupError>::Found("customer 7".to_string()),
        |cause| Err(ServiceUnavailable::from_cause("customers-service", cause)),
    );
    assert_eq!(result.unwrap(), Lookup::Found("customer 7".to_string()));
    assert_eq!(
        gateway.registry().endpoint("customers-service").state(),
        State::Closed
    );
}

#[test]
fn per_service_override_takes_effect() {
    let registry = EndpointRegistry::builder()
        .override_for(
            "flaky-service",
            Settings::builder()
                .ring_buffer_size(2)
                .min_calls(2)
                .failure_rate_threshold(0.5)
                .build(),
        )
        .build();
    let gateway = Gateway::new(Arc::new(registry));

    // Two failures trip the overridden endpoint...
    for _ in 0..2 {
        let _ = gateway.invoke(
            "flaky-service",
            || Reply::<String, LookupError>::Error(LookupError::new("boom")),
            |cause| Err(ServiceUnavailable::from_cause("flaky-service", cause)),
        );
    }
    assert_eq!(
        gateway.registry().endpoint("flaky-service").state(),
        State::Open
    );

    // ...but not a default-configured one, which needs 10 calls to evaluate.
    for _ in 0..2 {
        let _ = gateway.invoke(
            "steady-service",
            || Reply::<String, LookupError>::Error(LookupError::new("boom")),
            |cause| Err(ServiceUnavailable::from_cause("steady-service", cause)),
        );
    }
    assert_eq!(
        gateway.registry().endpoint("steady-service").state(),
        State::Closed
    );
}

#[derive(Default)]
struct RecordingListener {
    transitions: parking_lot::Mutex<Vec<(String, State, State)>>,
    rejections: AtomicUsize,
}

// The registry takes its listener by value; this newtype keeps a shared
// handle on the recorder so the test can inspect what was seen.
struct ShareListener(Arc<RecordingListener>);

impl BreakerListener for ShareListener {
    fn on_transition(&self, service: &str, from: State, to: State) {
        self.0.transitions.lock().push((service.to_string(), from, to));
    }

    fn on_rejection(&self, _service: &str) {
        self.0.rejections.fetch_add(1, Ordering::SeqCst);
    }
}

#[test]
fn listener_observes_transitions_and_rejections() {
    let listener = Arc::new(RecordingListener::default());
    let registry = EndpointRegistry::builder()
        .defaults(
            Settings::builder()
                .ring_buffer_size(2)
                .min_calls(2)
                .failure_rate_threshold(0.5)
                .build(),
        )
        .listener(ShareListener(Arc::clone(&listener)))
        .build();
    let gateway = Gateway::new(Arc::new(registry));

    for _ in 0..2 {
        let _ = gateway.invoke(
            "accounts-service",
            || Reply::<String, LookupError>::Error(LookupError::new("boom")),
            |cause| Err(ServiceUnavailable::from_cause("accounts-service", cause)),
        );
    }
    let _ = gateway.invoke(
        "accounts-service",
        || Reply::<String, LookupError>::Found("unreachable".to_string()),
        |cause| Err(ServiceUnavailable::from_cause("accounts-service", cause)),
    );

    let transitions = listener.transitions.lock();
    assert!(transitions.contains(&(
        "accounts-service".to_string(),
        State::Closed,
        State::Open
    )));
    assert_eq!(listener.rejections.load(Ordering::SeqCst), 1);
}

#[cfg(feature = "async")]
mod async_tests {
    use super::*;

    #[tokio::test]
    async fn async_lookup_passes_through() {
        let gateway = gateway_with(Settings::default());

        let result = gateway
            .invoke_async(
                "accounts-service",
                || async { Reply::<String, LookupError>::Found("account 123".to_string()) },
                |cause| Err(ServiceUnavailable::from_cause("accounts-service", cause)),
            )
            .await;

        assert_eq!(result.unwrap(), Lookup::Found("account 123".to_string()));
    }

    #[tokio::test]
    async fn async_deadline_breach_is_a_timeout_failure() {
        let gateway = gateway_with(
            Settings::builder()
                .call_timeout(Duration::from_millis(50))
                .ring_buffer_size(4)
                .min_calls(1)
                .failure_rate_threshold(0.5)
                .build(),
        );

        let result = gateway
            .invoke_async(
                "accounts-service",
                || async {
                    tokio::time::sleep(Duration::from_millis(300)).await;
                    Reply::<String, LookupError>::Found("eventually".to_string())
                },
                |cause| {
                    assert!(matches!(cause, Cause::Timeout(_)));
                    Err(ServiceUnavailable::from_cause("accounts-service", cause))
                },
            )
            .await;

        assert!(result.is_err());
        assert_eq!(
            gateway.registry().endpoint("accounts-service").state(),
            State::Open
        );
    }

    #[tokio::test]
    async fn abandoned_trial_counts_as_failure_and_breaker_recovers() {
        let gateway = gateway_with(
            Settings::builder()
                .call_timeout(Duration::from_secs(5))
                .ring_buffer_size(2)
                .min_calls(2)
                .failure_rate_threshold(0.5)
                .open_wait(Duration::from_millis(100))
                .half_open_permits(1)
                .build(),
        );

        for _ in 0..2 {
            let _ = gateway
                .invoke_async(
                    "accounts-service",
                    || async { Reply::<String, LookupError>::Error(LookupError::new("boom")) },
                    |cause| Err(ServiceUnavailable::from_cause("accounts-service", cause)),
                )
                .await;
        }
        let endpoint = gateway.registry().endpoint("accounts-service");
        assert_eq!(endpoint.state(), State::Open);

        tokio::time::sleep(Duration::from_millis(150)).await;

        // The caller abandons the sole half-open trial mid-flight. The
        // in-flight call must still yield an outcome, or the permit budget
        // would stay exhausted forever.
        let cancelled = tokio::time::timeout(
            Duration::from_millis(50),
            gateway.invoke_async(
                "accounts-service",
                || async {
                    tokio::time::sleep(Duration::from_secs(2)).await;
                    Reply::<String, LookupError>::Found("too late".to_string())
                },
                |cause| Err(ServiceUnavailable::from_cause("accounts-service", cause)),
            ),
        )
        .await;
        assert!(cancelled.is_err());

        // The abandoned trial was recorded as a failure, reopening the
        // circuit rather than wedging it half-open.
        assert_eq!(endpoint.state(), State::Open);

        tokio::time::sleep(Duration::from_millis(150)).await;

        let result = gateway
            .invoke_async(
                "accounts-service",
                || async { Reply::<String, LookupError>::Found("recovered".to_string()) },
                |cause| Err(ServiceUnavailable::from_cause("accounts-service", cause)),
            )
            .await;
        assert_eq!(result.unwrap(), Lookup::Found("recovered".to_string()));
        assert_eq!(endpoint.state(), State::Closed);
    }

    #[tokio::test]
    async fn async_miss_is_not_an_error() {
        let gateway = gateway_with(Settings::default());

        let result = gateway
            .invoke_async(
                "accounts-service",
                || async { Reply::<String, LookupError>::NotFound },
                |cause| Err(ServiceUnavailable::from_cause("accounts-service", cause)),
            )
            .await;

        assert_eq!(result.unwrap(), Lookup::NotFound);
    }
}
