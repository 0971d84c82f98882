//! Sliding window of recent call outcomes.

use smallvec::SmallVec;

use crate::outcome::Outcome;

/// Fixed-capacity ring buffer of the last N outcomes for one endpoint.
///
/// Insertion past capacity overwrites the oldest slot. Failure and slow counts
/// are maintained incrementally so rate queries never rescan the buffer. Rates
/// read as 0.0 until the window holds a configured minimum number of entries.
#[derive(Debug)]
pub(crate) struct SlidingWindow {
    slots: Vec<Outcome>,
    capacity: usize,
    min_calls: usize,
    cursor: usize,
    failures: usize,
    slow: usize,
}

impl SlidingWindow {
    pub(crate) fn new(capacity: usize, min_calls: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            slots: Vec::with_capacity(capacity),
            capacity,
            min_calls,
            cursor: 0,
            failures: 0,
            slow: 0,
        }
    }

    /// Records one outcome, evicting the oldest if the window is full.
    pub(crate) fn record(&mut self, outcome: Outcome) {
        if self.slots.len() < self.capacity {
            self.slots.push(outcome);
        } else {
            let evicted = std::mem::replace(&mut self.slots[self.cursor], outcome);
            self.cursor = (self.cursor + 1) % self.capacity;
            self.forget(evicted);
        }
        self.count(outcome);
    }

    /// Number of outcomes currently held; never exceeds capacity.
    pub(crate) fn len(&self) -> usize {
        self.slots.len()
    }

    /// True once the window holds enough entries for rates to be meaningful.
    pub(crate) fn is_evaluable(&self) -> bool {
        self.len() >= self.min_calls
    }

    /// Fraction of held outcomes that are failures; 0.0 below minimum fill.
    pub(crate) fn failure_rate(&self) -> f64 {
        if !self.is_evaluable() {
            return 0.0;
        }
        self.failures as f64 / self.len() as f64
    }

    /// Fraction of held outcomes that are slow calls; 0.0 below minimum fill.
    pub(crate) fn slow_rate(&self) -> f64 {
        if !self.is_evaluable() {
            return 0.0;
        }
        self.slow as f64 / self.len() as f64
    }

    /// Empties the window, forgetting all recorded history.
    pub(crate) fn reset(&mut self) {
        self.slots.clear();
        self.cursor = 0;
        self.failures = 0;
        self.slow = 0;
    }

    fn count(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Failure => self.failures += 1,
            Outcome::Slow => self.slow += 1,
            Outcome::Success => {}
        }
    }

    fn forget(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Failure => self.failures -= 1,
            Outcome::Slow => self.slow -= 1,
            Outcome::Success => {}
        }
    }
}

/// Outcome tally for the half-open trial batch.
///
/// Deliberately separate from the main window: trial evidence must not be
/// diluted by pre-open history. Sized for the default trial budget without
/// heap allocation.
#[derive(Debug, Default)]
pub(crate) struct TrialTally {
    outcomes: SmallVec<[Outcome; 16]>,
}

impl TrialTally {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record(&mut self, outcome: Outcome) {
        self.outcomes.push(outcome);
    }

    /// Trials recorded so far.
    pub(crate) fn len(&self) -> usize {
        self.outcomes.len()
    }

    /// Fraction of recorded trials that failed; 0.0 with no trials yet.
    pub(crate) fn failure_rate(&self) -> f64 {
        if self.outcomes.is_empty() {
            return 0.0;
        }
        let failures = self
            .outcomes
            .iter()
            .filter(|o| matches!(o, Outcome::Failure))
            .count();
        failures as f64 / self.outcomes.len() as f64
    }
}
