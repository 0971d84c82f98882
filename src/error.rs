//! Error types crossing the gateway boundary.

use std::error::Error;
use std::fmt::{self, Display, Formatter};
use std::time::Duration;

/// The trigger handed to a fallback when a guarded call cannot produce a value.
///
/// This is the full failure taxonomy of the gateway: a call is either rejected
/// up front by the breaker, cut off by the deadline, lost to a dead worker, or
/// failed by the remote operation itself. Business misses are not causes; they
/// are returned to the caller as [`Lookup::NotFound`](crate::Lookup::NotFound)
/// and never reach the fallback.
#[derive(Debug)]
pub enum Cause<E> {
    /// The circuit was open (or the half-open trial budget was exhausted);
    /// no real call was attempted.
    Rejected,

    /// The deadline elapsed before the operation replied. Carries the
    /// duration that was waited.
    Timeout(Duration),

    /// The operation stopped without producing a result (e.g. it panicked).
    Aborted,

    /// The operation itself failed with a downstream error.
    Operation(E),
}

impl<E> Display for Cause<E>
where
    E: Display,
{
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Cause::Rejected => write!(f, "circuit breaker is open, call rejected"),
            Cause::Timeout(waited) => write!(f, "call timed out after {:?}", waited),
            Cause::Aborted => write!(f, "remote operation aborted before producing a result"),
            Cause::Operation(e) => write!(f, "remote operation failed: {}", e),
        }
    }
}

impl<E: Error + 'static> Error for Cause<E> {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Cause::Operation(e) => Some(e),
            _ => None,
        }
    }
}

/// Typed signal that a downstream dependency is unavailable.
///
/// This is the only error type that leaves the gateway: whatever went wrong
/// underneath (rejection, timeout, transport error) is translated into one of
/// these by the caller-supplied fallback. It carries the identity of the
/// unavailable service so a boundary layer can render a "try again later"
/// experience distinct from a "not found" one.
///
/// Immutable once constructed.
#[derive(Debug)]
pub struct ServiceUnavailable {
    service: String,
    message: String,
    cause: Option<Box<dyn Error + Send + Sync + 'static>>,
}

impl ServiceUnavailable {
    /// Creates a signal with a custom message and no underlying cause.
    pub fn new(service: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            message: message.into(),
            cause: None,
        }
    }

    /// Creates a signal with a custom message and an underlying cause.
    pub fn with_cause(
        service: impl Into<String>,
        message: impl Into<String>,
        cause: impl Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            service: service.into(),
            message: message.into(),
            cause: Some(Box::new(cause)),
        }
    }

    /// Creates a signal from a gateway [`Cause`] with the standard
    /// "temporarily unavailable" message. The cause is retained and exposed
    /// through [`Error::source`].
    pub fn from_cause<E>(service: impl Into<String>, cause: Cause<E>) -> Self
    where
        E: Error + Send + Sync + 'static,
    {
        let service = service.into();
        let message = format!(
            "{} is temporarily unavailable. Please try again later.",
            service
        );
        Self {
            service,
            message,
            cause: Some(Box::new(cause)),
        }
    }

    /// Identity of the unavailable service.
    pub fn service(&self) -> &str {
        &self.service
    }

    /// Human-readable message.
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl Display for ServiceUnavailable {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "service '{}' unavailable: {}", self.service, self.message)
    }
}

impl Error for ServiceUnavailable {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.cause
            .as_deref()
            .map(|c| c as &(dyn Error + 'static))
    }
}
