//! Circuit breaker state machine.

use std::time::Instant;

use parking_lot::Mutex;

use crate::config::Settings;
use crate::outcome::Outcome;
use crate::window::{SlidingWindow, TrialTally};

/// Snapshot of a breaker's current state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    /// Normal operation; calls pass through.
    Closed,

    /// Calls are rejected without reaching the dependency.
    Open,

    /// A bounded batch of trial calls probes whether the dependency recovered.
    HalfOpen,
}

/// A state change, reported to the listener by the owning endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Transition {
    pub(crate) from: State,
    pub(crate) to: State,
}

/// Ticket issued with every permitted call and handed back through
/// [`record`](StateMachine::record).
///
/// A token issued during a half-open phase is stamped with that phase's
/// generation, so the machine can tell a genuine trial outcome from a
/// straggler that was permitted earlier (e.g. while closed, with the trip
/// happening before its outcome arrived). Straggler outcomes land in the main
/// window, never in the trial tally.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct CallToken {
    trial: Option<u64>,
}

/// Internal phase, carrying the per-state bookkeeping the snapshot omits:
/// the open-entry timestamp and the half-open issue counter + trial tally.
#[derive(Debug)]
enum Phase {
    Closed,
    Open { since: Instant },
    HalfOpen { issued: u32, trials: TrialTally },
}

#[derive(Debug)]
struct Inner {
    phase: Phase,
    window: SlidingWindow,
    trial_generation: u64,
}

/// State machine for one guarded endpoint.
///
/// There is no background timer: the open-state cooldown is checked lazily on
/// [`permit`](StateMachine::permit), and the machine trips at record time so
/// that the next permission check after the threshold is reached is denied.
/// The machine cycles indefinitely; there is no terminal state.
///
/// One mutex serializes the phase and the window. Distinct endpoints own
/// distinct machines and never contend on the same lock.
#[derive(Debug)]
pub(crate) struct StateMachine {
    settings: Settings,
    inner: Mutex<Inner>,
}

impl StateMachine {
    pub(crate) fn new(settings: Settings) -> Self {
        let window = SlidingWindow::new(settings.ring_buffer_size, settings.min_calls);
        Self {
            settings,
            inner: Mutex::new(Inner {
                phase: Phase::Closed,
                window,
                trial_generation: 0,
            }),
        }
    }

    pub(crate) fn state(&self) -> State {
        match &self.inner.lock().phase {
            Phase::Closed => State::Closed,
            Phase::Open { .. } => State::Open,
            Phase::HalfOpen { .. } => State::HalfOpen,
        }
    }

    /// Current failure rate of the main window (0.0 below minimum fill).
    pub(crate) fn failure_rate(&self) -> f64 {
        self.inner.lock().window.failure_rate()
    }

    /// Decides whether a call may go through right now, returning a token
    /// for it (`None` means rejected).
    ///
    /// Open: rejected until the cooldown elapses, at which point the machine
    /// moves to half-open and this same call becomes the first trial.
    /// Half-open: permitted while the trial budget lasts, counted at issue
    /// time so concurrent callers cannot exceed it.
    pub(crate) fn permit(&self) -> (Option<CallToken>, Option<Transition>) {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        match &mut inner.phase {
            Phase::Closed => (Some(CallToken { trial: None }), None),
            Phase::Open { since } => {
                if since.elapsed() >= self.settings.open_wait {
                    inner.trial_generation += 1;
                    inner.phase = Phase::HalfOpen {
                        issued: 1,
                        trials: TrialTally::new(),
                    };
                    (
                        Some(CallToken {
                            trial: Some(inner.trial_generation),
                        }),
                        Some(Transition {
                            from: State::Open,
                            to: State::HalfOpen,
                        }),
                    )
                } else {
                    (None, None)
                }
            }
            Phase::HalfOpen { issued, .. } => {
                if *issued < self.settings.half_open_permits {
                    *issued += 1;
                    (
                        Some(CallToken {
                            trial: Some(inner.trial_generation),
                        }),
                        None,
                    )
                } else {
                    (None, None)
                }
            }
        }
    }

    /// Records a classified outcome under the token its call was permitted
    /// with, and applies the transition rules.
    ///
    /// Closed: the outcome lands in the main window; once the window is
    /// evaluable and either rate crosses its threshold, the circuit opens.
    /// Half-open: a current-generation trial outcome lands in the trial
    /// tally; crossing the failure threshold reopens immediately (restarting
    /// the cooldown), while a full trial batch below it closes the circuit
    /// and resets the main window. Outcomes under a token from any earlier
    /// phase land in the main window instead.
    pub(crate) fn record(&self, outcome: Outcome, token: CallToken) -> Option<Transition> {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        match &mut inner.phase {
            Phase::Closed => {
                inner.window.record(outcome);
                if inner.window.is_evaluable()
                    && (inner.window.failure_rate() >= self.settings.failure_rate_threshold
                        || inner.window.slow_rate() >= self.settings.slow_rate_threshold)
                {
                    inner.phase = Phase::Open {
                        since: Instant::now(),
                    };
                    return Some(Transition {
                        from: State::Closed,
                        to: State::Open,
                    });
                }
                None
            }
            Phase::HalfOpen { trials, .. } => {
                if token.trial != Some(inner.trial_generation) {
                    // Straggler permitted before this half-open entry; its
                    // outcome must not contaminate the trial tally.
                    inner.window.record(outcome);
                    return None;
                }
                trials.record(outcome);
                if trials.failure_rate() >= self.settings.failure_rate_threshold {
                    inner.phase = Phase::Open {
                        since: Instant::now(),
                    };
                    return Some(Transition {
                        from: State::HalfOpen,
                        to: State::Open,
                    });
                }
                if trials.len() >= self.settings.half_open_permits as usize {
                    inner.window.reset();
                    inner.phase = Phase::Closed;
                    return Some(Transition {
                        from: State::HalfOpen,
                        to: State::Closed,
                    });
                }
                None
            }
            // A call permitted while closed can finish after the trip; its
            // outcome still belongs to the window.
            Phase::Open { .. } => {
                inner.window.record(outcome);
                None
            }
        }
    }
}
