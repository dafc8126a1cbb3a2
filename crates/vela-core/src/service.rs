//! Service strategy trait.
//!
//! A concrete service plugs its domain logic into the harness by
//! implementing [`BackgroundService`]. Every hook has a no-op default, so a
//! minimal service only supplies a name and the hooks it cares about.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::context::HostContext;
use crate::error::Result;

/// What a single loop iteration reported.
///
/// Advisory only: the harness records it but never changes control flow
/// because of it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IterationOutcome {
    /// Work was performed.
    #[default]
    Completed,
    /// Nothing needed doing this time.
    Idle,
}

/// Domain logic driven by a [`Harness`](crate::harness::Harness).
///
/// # Implementation Guidelines
///
/// 1. **mandatory_startup**: steps that must succeed or the process must not
///    start. The host calls it before the service is registered, and the
///    harness calls it again before `startup`; the harness only lets it run
///    to success once, but a failed attempt may be retried, so keep it
///    idempotent.
///
/// 2. **startup**: remaining setup once the host is live. An error routes
///    the service to `FailStart` and the loop never runs.
///
/// 3. **loop_iteration**: one periodic unit of work. Errors and panics are
///    logged and swallowed; the inter-iteration delay still happens.
///
/// 4. **shutdown**: teardown. Runs exactly once no matter how many
///    shutdown triggers fire. Errors and panics are logged and swallowed.
///    `Harness::run` does not return until it has finished.
///
/// The `stopping` token passed to `startup` and `loop_iteration` fires when
/// the host cancels or the harness is disposed.
///
/// # Example
///
/// ```rust,ignore
/// use vela_core::{BackgroundService, IterationOutcome, Result};
/// use async_trait::async_trait;
/// use tokio_util::sync::CancellationToken;
///
/// struct Heartbeat;
///
/// #[async_trait]
/// impl BackgroundService for Heartbeat {
///     fn name(&self) -> &str { "heartbeat" }
///
///     async fn loop_iteration(&self, _stopping: &CancellationToken) -> Result<IterationOutcome> {
///         tracing::info!("still alive");
///         Ok(IterationOutcome::Completed)
///     }
/// }
/// ```
#[async_trait]
pub trait BackgroundService: Send + Sync + 'static {
    /// Human-readable service name, used in logs and to look up config.
    fn name(&self) -> &str;

    /// Setup that must succeed before the host may start.
    async fn mandatory_startup(&self, _ctx: &HostContext) -> Result<()> {
        Ok(())
    }

    /// Setup performed once the host is running.
    async fn startup(&self, _ctx: &HostContext, _stopping: &CancellationToken) -> Result<()> {
        Ok(())
    }

    /// Teardown. Called at most once per harness.
    async fn shutdown(&self) -> Result<()> {
        Ok(())
    }

    /// One periodic unit of work.
    async fn loop_iteration(&self, _stopping: &CancellationToken) -> Result<IterationOutcome> {
        Ok(IterationOutcome::Completed)
    }
}
