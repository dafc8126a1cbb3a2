//! Service harness: drives one [`BackgroundService`] through its lifecycle.
//!
//! The harness owns the state machine and the exactly-once teardown guard.
//! Three independent triggers can request shutdown, in any order and
//! concurrently:
//!
//! - the loop ending inside [`Harness::run`],
//! - the host's cancellation signal firing,
//! - an explicit [`Harness::dispose`].
//!
//! All three converge on the same guarded teardown, so the service's
//! `shutdown` hook runs exactly once.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::OnceCell;
use tokio_util::sync::CancellationToken;

use crate::config::{HarnessConfig, delay_from_millis};
use crate::context::HostContext;
use crate::error::{HarnessError, Result};
use crate::fault::{AbortOnDrop, isolate, join_error};
use crate::identity::{IdentityAllocator, InstanceId, SequentialAllocator};
use crate::metrics::HarnessMetrics;
use crate::service::BackgroundService;
use crate::signal::CancellationSignal;
use crate::state::{ServiceState, StateMachine};

/// Lifecycle harness for a single background service.
///
/// Cheap to clone; clones share the same instance.
#[derive(Clone)]
pub struct Harness {
    inner: Arc<Inner>,
}

struct Inner {
    id: InstanceId,
    label: String,
    service: Arc<dyn BackgroundService>,
    context: HostContext,
    state: StateMachine,
    loop_delay_ms: AtomicU64,
    // Written only by the run task.
    iterations: AtomicU64,
    // Independent of the state lock.
    shutdown_performed: Mutex<bool>,
    teardown_done: CancellationToken,
    dispose_requested: CancellationToken,
    // Handed to service hooks; fires on cancellation or dispose.
    stopping: CancellationToken,
    mandatory: OnceCell<()>,
    metrics: HarnessMetrics,
}

/// Builder for [`Harness`].
pub struct HarnessBuilder {
    service: Arc<dyn BackgroundService>,
    context: Option<HostContext>,
    allocator: Option<Arc<dyn IdentityAllocator>>,
    config: HarnessConfig,
}

impl HarnessBuilder {
    /// Sets the host context. Required.
    #[must_use]
    pub fn host_context(mut self, context: HostContext) -> Self {
        self.context = Some(context);
        self
    }

    /// Sets the identity allocator.
    ///
    /// Defaults to a fresh [`SequentialAllocator`]; hosts running several
    /// services should share one allocator so identities stay unique.
    #[must_use]
    pub fn allocator(mut self, allocator: Arc<dyn IdentityAllocator>) -> Self {
        self.allocator = Some(allocator);
        self
    }

    /// Sets the harness configuration.
    #[must_use]
    pub fn config(mut self, config: HarnessConfig) -> Self {
        self.config = config;
        self
    }

    /// Builds the harness in [`ServiceState::NotStarted`].
    ///
    /// # Errors
    /// Returns [`HarnessError::MissingHostContext`] if no host context was
    /// supplied, or a configuration error for a negative loop delay.
    pub fn build(self) -> Result<Harness> {
        let context = self.context.ok_or(HarnessError::MissingHostContext)?;
        let delay = self.config.loop_iteration_delay()?;

        let allocator = self
            .allocator
            .unwrap_or_else(|| Arc::new(SequentialAllocator::new()));
        let id = allocator.allocate();
        let label = format!("{}:{}", self.service.name(), id);

        let delay_ms = millis(delay);
        tracing::debug!(service = %label, delay_ms, "harness created");

        Ok(Harness {
            inner: Arc::new(Inner {
                id,
                state: StateMachine::new(label.clone()),
                label,
                service: self.service,
                context,
                loop_delay_ms: AtomicU64::new(delay_ms),
                iterations: AtomicU64::new(0),
                shutdown_performed: Mutex::new(false),
                teardown_done: CancellationToken::new(),
                dispose_requested: CancellationToken::new(),
                stopping: CancellationToken::new(),
                mandatory: OnceCell::new(),
                metrics: HarnessMetrics::new(),
            }),
        })
    }
}

/// What a call to [`Harness::run`] achieved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    /// Service name.
    pub service: String,
    /// Harness identity.
    pub instance: InstanceId,
    /// Whether startup succeeded and the loop was entered.
    pub started: bool,
    /// State when `run` returned.
    pub final_state: ServiceState,
    /// Loop passes performed.
    pub iterations: u64,
}

impl Harness {
    /// Starts building a harness around `service`.
    pub fn builder<S: BackgroundService>(service: S) -> HarnessBuilder {
        Self::builder_shared(Arc::new(service))
    }

    /// Starts building a harness around an already shared service.
    pub fn builder_shared(service: Arc<dyn BackgroundService>) -> HarnessBuilder {
        HarnessBuilder {
            service,
            context: None,
            allocator: None,
            config: HarnessConfig::default(),
        }
    }

    /// Returns the instance identity.
    #[must_use]
    pub fn id(&self) -> InstanceId {
        self.inner.id
    }

    /// Returns the service name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.inner.service.name()
    }

    /// Returns the `name:id` prefix used in log records.
    #[must_use]
    pub fn log_prefix(&self) -> &str {
        &self.inner.label
    }

    /// Returns the current lifecycle state.
    #[must_use]
    pub fn state(&self) -> ServiceState {
        self.inner.state.current()
    }

    /// Returns true only while the service is open for business.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.state().is_active()
    }

    /// Returns the host context.
    #[must_use]
    pub fn host_context(&self) -> &HostContext {
        &self.inner.context
    }

    /// Returns the harness metrics.
    #[must_use]
    pub fn metrics(&self) -> &HarnessMetrics {
        &self.inner.metrics
    }

    /// Returns the pause between loop iterations.
    #[must_use]
    pub fn loop_iteration_delay(&self) -> Duration {
        Duration::from_millis(self.inner.loop_delay_ms.load(Ordering::Relaxed))
    }

    /// Sets the pause between loop iterations.
    pub fn set_loop_iteration_delay(&self, delay: Duration) {
        self.inner.loop_delay_ms.store(millis(delay), Ordering::Relaxed);
    }

    /// Sets the pause between loop iterations from a millisecond count.
    ///
    /// # Errors
    /// A negative value is rejected and the previous delay is kept.
    pub fn set_loop_iteration_delay_ms(&self, millis: i64) -> Result<()> {
        match delay_from_millis(millis) {
            Ok(delay) => {
                self.set_loop_iteration_delay(delay);
                Ok(())
            }
            Err(err) => {
                tracing::warn!(
                    service = %self.inner.label,
                    millis,
                    "ignoring negative loop iteration delay"
                );
                Err(err)
            }
        }
    }

    /// Returns how many loop passes have been performed.
    #[must_use]
    pub fn loop_iteration_count(&self) -> u64 {
        self.inner.iterations.load(Ordering::Relaxed)
    }

    /// Returns true once the guarded teardown has been claimed.
    #[must_use]
    pub fn shutdown_performed(&self) -> bool {
        *self.inner.shutdown_performed.lock()
    }

    /// Returns true once [`Harness::dispose`] has been called.
    #[must_use]
    pub fn dispose_requested(&self) -> bool {
        self.inner.dispose_requested.is_cancelled()
    }

    /// Runs the service's mandatory startup until it first succeeds.
    ///
    /// Safe to call any number of times, including concurrently: after one
    /// success further calls return `Ok` without touching the service. The
    /// host calls this before registering the service so a failure can abort
    /// process bring-up; [`Harness::run`] calls it again.
    ///
    /// # Errors
    /// Returns [`HarnessError::Startup`] if the hook fails or panics.
    pub async fn mandatory_startup(&self) -> Result<()> {
        let inner = &self.inner;
        let result = inner
            .mandatory
            .get_or_try_init(|| {
                let service = Arc::clone(&inner.service);
                let context = inner.context.clone();
                isolate(async move { service.mandatory_startup(&context).await })
            })
            .await;

        match result {
            Ok(_) => Ok(()),
            Err(err) => {
                tracing::error!(
                    service = %inner.label,
                    error = %err,
                    "mandatory startup failed"
                );
                Err(into_startup_error(err))
            }
        }
    }

    /// Runs the service for its whole lifetime.
    ///
    /// Occupies the calling task until the service has stopped: startup,
    /// then the loop until `signal` fires or [`Harness::dispose`] is called,
    /// then teardown. If another trigger is already tearing down, `run`
    /// waits for that teardown to finish. Faults raised by the service never
    /// escape, and a fault inside one loop pass is logged before the loop
    /// carries on. Should the loop task itself fail, the state is forced to
    /// [`ServiceState::Stopped`] and `run` returns without tearing down;
    /// [`Harness::dispose`] still performs the teardown.
    ///
    /// Only the first call does anything; later calls (or a call after
    /// disposal) return immediately.
    pub async fn run<S: CancellationSignal>(&self, signal: S) -> RunSummary {
        let inner = &self.inner;

        if !inner.state.request(ServiceState::Starting).is_applied() {
            tracing::warn!(
                service = %inner.label,
                state = %self.state(),
                "run ignored; service is not in its initial state"
            );
            return self.summary(false);
        }
        tracing::info!(service = %inner.label, "is starting");

        let _registration = signal.register({
            let harness = self.clone();
            move || async move { harness.on_cancellation().await }
        });

        let started = match self.startup_phase().await {
            Ok(()) => true,
            Err(err) => {
                inner.metrics.record_startup_failure();
                tracing::error!(
                    service = %inner.label,
                    error = %err,
                    "failed to set up service; skipping active phase"
                );
                inner.state.request(ServiceState::FailStart);
                false
            }
        };

        if started {
            inner.state.request(ServiceState::Active);

            let harness = self.clone();
            let mut main = AbortOnDrop(tokio::spawn(async move {
                harness.active_loop(signal).await;
            }));

            if let Err(err) = (&mut main.0).await {
                tracing::error!(
                    service = %inner.label,
                    error = %join_error(err),
                    "fault on service main task"
                );
                inner.state.request(ServiceState::Stopped);
                return self.summary(started);
            }
        }

        inner.state.request(ServiceState::ShuttingDown);
        self.guarded_teardown(true).await;
        tracing::info!(service = %inner.label, "has stopped");
        inner.state.request(ServiceState::Stopped);

        self.summary(started)
    }

    /// Shuts the service down and marks it disposed.
    ///
    /// Callable at any time, from any task, any number of times. Wakes the
    /// loop if it is sleeping. Returns at once if another trigger has
    /// already claimed teardown.
    pub async fn dispose(&self) {
        let inner = &self.inner;
        if self.state().is_terminal() {
            return;
        }
        if !inner.dispose_requested.is_cancelled() {
            tracing::info!(service = %inner.label, "dispose requested");
        }
        inner.dispose_requested.cancel();
        inner.stopping.cancel();

        inner.state.request(ServiceState::ShuttingDown);
        self.guarded_teardown(false).await;
        inner.state.request(ServiceState::Disposed);
    }

    async fn startup_phase(&self) -> Result<()> {
        self.mandatory_startup().await?;

        let service = Arc::clone(&self.inner.service);
        let context = self.inner.context.clone();
        let stopping = self.inner.stopping.clone();
        isolate(async move { service.startup(&context, &stopping).await })
            .await
            .map_err(into_startup_error)
    }

    async fn active_loop<S: CancellationSignal>(&self, signal: S) {
        let inner = &self.inner;

        while !signal.is_cancelled() && !inner.dispose_requested.is_cancelled() {
            let harness = self.clone();
            let mut pass = AbortOnDrop(tokio::spawn(async move { harness.perform_pass().await }));

            if let Err(err) = (&mut pass.0).await {
                tracing::error!(
                    service = %inner.label,
                    error = %join_error(err),
                    "fault in service loop; continuing"
                );
            }

            self.pause(&signal).await;
        }

        tracing::debug!(service = %inner.label, "left service loop");
    }

    /// One loop pass: count it, run the hook, record the outcome.
    async fn perform_pass(&self) {
        let inner = &self.inner;
        let iteration = inner.iterations.fetch_add(1, Ordering::Relaxed) + 1;
        tracing::debug!(service = %inner.label, iteration, "performing loop iteration");

        let service = Arc::clone(&inner.service);
        let stopping = inner.stopping.clone();
        let began = Instant::now();

        match isolate(async move { service.loop_iteration(&stopping).await }).await {
            Ok(outcome) => {
                inner.metrics.record_iteration(outcome, began.elapsed());
                tracing::debug!(
                    service = %inner.label,
                    iteration,
                    ?outcome,
                    "loop iteration done"
                );
            }
            Err(err) => {
                inner.metrics.record_iteration_fault(began.elapsed());
                tracing::error!(
                    service = %inner.label,
                    iteration,
                    panicked = err.is_panic(),
                    error = %err,
                    "loop iteration failed"
                );
            }
        }
    }

    /// Sleeps the loop delay, waking early on cancellation or dispose.
    async fn pause<S: CancellationSignal>(&self, signal: &S) {
        let delay = self.loop_iteration_delay();
        tokio::select! {
            biased;
            () = signal.cancelled() => {}
            () = self.inner.dispose_requested.cancelled() => {}
            () = tokio::time::sleep(delay) => {}
        }
    }

    async fn on_cancellation(&self) {
        let inner = &self.inner;
        tracing::info!(service = %inner.label, "is stopping");
        inner.stopping.cancel();

        inner.state.request(ServiceState::ShuttingDown);
        self.guarded_teardown(false).await;
        inner.state.request(ServiceState::Stopped);

        tracing::info!(service = %inner.label, "is stopped");
    }

    /// Invokes the service's shutdown hook at most once.
    ///
    /// The flag is claimed before the hook runs, so a failing hook is never
    /// retried. A caller that loses the claim returns at once unless
    /// `wait_for_peer` is set, in which case it waits for the hook to finish.
    ///
    /// The claimed hook runs on a detached task: dropping the caller midway
    /// leaves the teardown running to completion.
    async fn guarded_teardown(&self, wait_for_peer: bool) {
        let inner = &self.inner;
        let claimed = {
            let mut performed = inner.shutdown_performed.lock();
            !std::mem::replace(&mut *performed, true)
        };

        if !claimed {
            if wait_for_peer {
                inner.teardown_done.cancelled().await;
            }
            return;
        }

        let harness = self.clone();
        let teardown = tokio::spawn(async move { harness.teardown().await });
        if let Err(err) = teardown.await {
            tracing::error!(
                service = %inner.label,
                error = %join_error(err),
                "teardown task failed"
            );
        }
    }

    async fn teardown(&self) {
        let inner = &self.inner;
        let _done = inner.teardown_done.clone().drop_guard();

        let service = Arc::clone(&inner.service);
        if let Err(err) = isolate(async move { service.shutdown().await }).await {
            inner.metrics.record_shutdown_fault();
            tracing::error!(
                service = %inner.label,
                panicked = err.is_panic(),
                error = %err,
                "shutdown hook failed"
            );
        }
    }

    fn summary(&self, started: bool) -> RunSummary {
        RunSummary {
            service: self.name().to_string(),
            instance: self.id(),
            started,
            final_state: self.state(),
            iterations: self.loop_iteration_count(),
        }
    }
}

impl fmt::Debug for Harness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Harness")
            .field("service", &self.name())
            .field("id", &self.id())
            .field("state", &self.state())
            .field("iterations", &self.loop_iteration_count())
            .finish_non_exhaustive()
    }
}

fn millis(delay: Duration) -> u64 {
    u64::try_from(delay.as_millis()).unwrap_or(u64::MAX)
}

fn into_startup_error(err: HarnessError) -> HarnessError {
    match err {
        HarnessError::Startup(_) => err,
        other => HarnessError::startup(other.to_string()),
    }
}
