// Allow unwrap/expect/panic in tests for clear failure messages
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used, clippy::panic))]

//! # vela-core
//!
//! Lifecycle harness for a long-running background service hosted inside a
//! process.
//!
//! - [`ServiceState`] and [`StateMachine`]: the seven-state lifecycle graph
//! - [`BackgroundService`]: the startup / loop / shutdown hooks a service supplies
//! - [`Harness`]: runs one service, guaranteeing exactly-once teardown
//! - [`ServiceHost`]: registers services, runs them, stops them on signal
//!
//! ## Example
//!
//! ```rust,ignore
//! use vela_core::{BackgroundService, Harness, HostContext};
//! use tokio_util::sync::CancellationToken;
//!
//! struct Heartbeat;
//!
//! impl BackgroundService for Heartbeat {
//!     fn name(&self) -> &str { "heartbeat" }
//! }
//!
//! let harness = Harness::builder(Heartbeat)
//!     .host_context(HostContext::new("example"))
//!     .build()?;
//! let stop = CancellationToken::new();
//! let summary = harness.run(stop.clone()).await;
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod context;
pub mod error;
mod fault;
pub mod harness;
pub mod host;
pub mod identity;
pub mod metrics;
pub mod service;
pub mod signal;
pub mod state;
#[cfg(test)]
mod tests;

pub use config::{DEFAULT_LOOP_ITERATION_DELAY_MS, HarnessConfig, HostConfig};
pub use context::HostContext;
pub use error::{HarnessError, Result};
pub use harness::{Harness, HarnessBuilder, RunSummary};
pub use host::{HostReport, ServiceHost, termination_signal};
pub use identity::{IdentityAllocator, InstanceId, SequentialAllocator};
pub use metrics::{HarnessMetrics, MetricsSnapshot};
pub use service::{BackgroundService, IterationOutcome};
pub use signal::{CancellationSignal, Registration};
pub use state::{ServiceState, StateMachine, Transition};
