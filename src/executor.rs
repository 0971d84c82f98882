//! Deadline-bounded execution of remote operations.

use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

use crate::outcome::Reply;

/// Terminal report of one attempted operation, before classification.
#[derive(Debug)]
pub(crate) enum Attempt<T, E> {
    /// The operation replied within the deadline. Carries the reply and the
    /// observed latency.
    Completed {
        /// What the operation returned.
        reply: Reply<T, E>,
        /// How long the operation took.
        elapsed: Duration,
    },

    /// The deadline elapsed first. The operation may still be running; its
    /// eventual reply is discarded.
    TimedOut {
        /// The deadline that was waited out.
        waited: Duration,
    },

    /// The worker stopped without replying (the operation panicked, or the
    /// worker thread could not be spawned).
    Aborted,
}

/// Runs an operation with a bounded wait.
///
/// The operation runs on a helper thread; the caller blocks on a channel for
/// at most the deadline. On a deadline breach the executor detaches: the
/// helper keeps running to completion, but whatever it produces goes nowhere.
/// There is no cooperative cancellation signal into the operation.
pub(crate) struct TimeoutExecutor {
    deadline: Duration,
}

impl TimeoutExecutor {
    pub(crate) fn new(deadline: Duration) -> Self {
        Self { deadline }
    }

    /// Executes `operation`, waiting at most the configured deadline.
    pub(crate) fn run<T, E, F>(&self, operation: F) -> Attempt<T, E>
    where
        T: Send + 'static,
        E: Send + 'static,
        F: FnOnce() -> Reply<T, E> + Send + 'static,
    {
        // Buffered so the detached worker never blocks on a receiver that
        // already gave up.
        let (tx, rx) = mpsc::sync_channel(1);
        let started = Instant::now();

        let spawned = thread::Builder::new()
            .name("remoteguard-call".to_string())
            .spawn(move || {
                let _ = tx.send(operation());
            });
        if spawned.is_err() {
            return Attempt::Aborted;
        }

        match rx.recv_timeout(self.deadline) {
            Ok(reply) => Attempt::Completed {
                reply,
                elapsed: started.elapsed(),
            },
            Err(RecvTimeoutError::Timeout) => Attempt::TimedOut {
                waited: self.deadline,
            },
            Err(RecvTimeoutError::Disconnected) => Attempt::Aborted,
        }
    }
}

#[cfg(feature = "async")]
impl TimeoutExecutor {
    /// Executes an async operation, waiting at most the configured deadline.
    ///
    /// On a deadline breach the operation's future is dropped, which is as
    /// much cancellation as the runtime provides.
    pub(crate) async fn run_async<T, E, F, Fut>(&self, operation: F) -> Attempt<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Reply<T, E>>,
    {
        let started = Instant::now();
        match tokio::time::timeout(self.deadline, operation()).await {
            Ok(reply) => Attempt::Completed {
                reply,
                elapsed: started.elapsed(),
            },
            Err(_) => Attempt::TimedOut {
                waited: self.deadline,
            },
        }
    }
}
