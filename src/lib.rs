//! Vela: lifecycle harness for hosted background services
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use vela::prelude::*;
//!
//! struct Heartbeat;
//!
//! impl BackgroundService for Heartbeat {
//!     fn name(&self) -> &str {
//!         "heartbeat"
//!     }
//! }
//!
//! # async fn start() -> vela::core::Result<()> {
//! let mut host = ServiceHost::new(HostConfig::new("my-host"))?;
//! host.register(Heartbeat).await?;
//! let report = host.run().await;
//! std::process::exit(i32::from(report.exit_code()));
//! # }
//! ```

pub use vela_core as core;

/// Prelude module for common imports.
pub mod prelude {
    pub use vela_core::{
        BackgroundService, CancellationSignal, Harness, HarnessConfig, HarnessError,
        HarnessMetrics, HostConfig, HostContext, HostReport, InstanceId, IterationOutcome,
        RunSummary, ServiceHost, ServiceState,
    };
}
