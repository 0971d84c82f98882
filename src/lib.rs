//! # remoteguard
//!
//! A circuit-breaking guard for remote lookups. It shields callers from the
//! failure modes of a downstream service: every call runs under a deadline,
//! recent outcomes are tracked per endpoint in a sliding window, and once the
//! downstream is judged unhealthy the breaker stops issuing real calls and
//! routes straight to a fallback that yields a typed
//! [`ServiceUnavailable`] signal.
//!
//! ## States
//!
//! Each guarded endpoint cycles through the classic three breaker states:
//!
//! - **Closed**: normal operation; calls pass through and land in the window.
//! - **Open**: calls are rejected immediately; after a cooldown, the next
//!   permission check moves to half-open.
//! - **Half-open**: a bounded batch of trial calls probes whether the
//!   dependency recovered; the batch decides between closing and reopening.
//!
//! ## Misses are not failures
//!
//! The operation contract distinguishes "the record does not exist"
//! ([`Reply::NotFound`]) from "the dependency is broken" ([`Reply::Error`]).
//! Misses come back to the caller as [`Lookup::NotFound`] and count as
//! *healthy* outcomes — an endpoint serving nothing but 404s stays closed.
//!
//! ## Basic usage
//!
//! ```rust
//! use remoteguard::{EndpointRegistry, Gateway, Lookup, Reply, ServiceUnavailable};
//! use std::sync::Arc;
//!
//! let registry = Arc::new(EndpointRegistry::builder().build());
//! let gateway = Gateway::new(registry);
//!
//! let result = gateway.invoke(
//!     "accounts-service",
//!     // The remote operation: a client call that reports misses as data.
//!     || Reply::<_, std::io::Error>::Found("account 123".to_string()),
//!     // The fallback: runs on rejection or failure, and must end in either
//!     // a substitute value or a ServiceUnavailable signal.
//!     |cause| Err(ServiceUnavailable::from_cause("accounts-service", cause)),
//! );
//!
//! match result {
//!     Ok(Lookup::Found(account)) => println!("found: {}", account),
//!     Ok(Lookup::NotFound) => println!("no such account"),
//!     Err(err) => println!("unavailable: {}", err),
//! }
//! ```
//!
//! ## Async support
//!
//! With the `async` feature enabled, [`Gateway::invoke_async`] accepts an
//! async operation and enforces the deadline through the runtime:
//!
//! ```rust,ignore
//! let result = gateway.invoke_async(
//!     "accounts-service",
//!     || async { client.fetch_account("123").await },
//!     |cause| Err(ServiceUnavailable::from_cause("accounts-service", cause)),
//! ).await;
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

mod config;
mod error;
mod executor;
mod gateway;
mod hook;
mod outcome;
mod registry;
mod state;
mod window;

// Re-exports
pub use config::{Settings, SettingsBuilder};
pub use error::{Cause, ServiceUnavailable};
pub use gateway::Gateway;
pub use hook::{BreakerListener, NullListener};
pub use outcome::{Lookup, Outcome, Reply};
pub use registry::{EndpointRegistry, GuardedEndpoint, RegistryBuilder};
pub use state::State;
