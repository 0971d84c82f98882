//! Breaker and timeout settings.

use std::time::Duration;

/// Tuning knobs for one guarded endpoint.
///
/// Defaults follow the usual circuit-breaker conventions: a 3 second call
/// deadline, a 100-slot outcome window evaluated after 10 calls, a 50%
/// failure-rate trip threshold, a 60 second open-state cooldown, and 10
/// half-open trial calls. Slow-call gating ships effectively disabled (a 1.0
/// rate threshold paired with a 60s latency threshold that exceeds the call
/// deadline); configure both to enable it.
#[derive(Debug, Clone)]
pub struct Settings {
    pub(crate) call_timeout: Duration,
    pub(crate) ring_buffer_size: usize,
    pub(crate) min_calls: usize,
    pub(crate) failure_rate_threshold: f64,
    pub(crate) slow_rate_threshold: f64,
    pub(crate) slow_call_duration: Duration,
    pub(crate) open_wait: Duration,
    pub(crate) half_open_permits: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            call_timeout: Duration::from_secs(3),
            ring_buffer_size: 100,
            min_calls: 10,
            failure_rate_threshold: 0.5,
            slow_rate_threshold: 1.0,
            slow_call_duration: Duration::from_secs(60),
            open_wait: Duration::from_secs(60),
            half_open_permits: 10,
        }
    }
}

impl Settings {
    /// Creates a builder seeded with the defaults.
    pub fn builder() -> SettingsBuilder {
        SettingsBuilder {
            settings: Settings::default(),
        }
    }
}

/// Builder for [`Settings`].
#[derive(Debug)]
pub struct SettingsBuilder {
    settings: Settings,
}

impl SettingsBuilder {
    /// Maximum wait before a call counts as a failure.
    pub fn call_timeout(mut self, timeout: Duration) -> Self {
        self.settings.call_timeout = timeout;
        self
    }

    /// Sliding window capacity.
    pub fn ring_buffer_size(mut self, size: usize) -> Self {
        self.settings.ring_buffer_size = size;
        self
    }

    /// Entries required in the window before rates are evaluated.
    pub fn min_calls(mut self, min: usize) -> Self {
        self.settings.min_calls = min;
        self
    }

    /// Failure-rate fraction (0.0..=1.0) that trips the circuit open.
    pub fn failure_rate_threshold(mut self, threshold: f64) -> Self {
        self.settings.failure_rate_threshold = threshold;
        self
    }

    /// Slow-call-rate fraction (0.0..=1.0) that trips the circuit open.
    pub fn slow_rate_threshold(mut self, threshold: f64) -> Self {
        self.settings.slow_rate_threshold = threshold;
        self
    }

    /// Latency above which a completed call is recorded as slow.
    pub fn slow_call_duration(mut self, duration: Duration) -> Self {
        self.settings.slow_call_duration = duration;
        self
    }

    /// Cooldown in the open state before half-open trials become eligible.
    pub fn open_wait(mut self, wait: Duration) -> Self {
        self.settings.open_wait = wait;
        self
    }

    /// Number of trial calls permitted per entry into the half-open state.
    pub fn half_open_permits(mut self, permits: u32) -> Self {
        self.settings.half_open_permits = permits;
        self
    }

    /// Finalizes the settings.
    pub fn build(self) -> Settings {
        self.settings
    }
}
