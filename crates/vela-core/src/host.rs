//! Minimal hosting runtime.
//!
//! Brings services up the way a process host does: each service passes its
//! mandatory startup at registration (so a failure aborts bring-up before
//! anything runs), then every harness gets a dedicated task. A termination
//! signal cancels the shared token, the host waits a bounded time for the
//! run tasks, and finally disposes every harness.

use std::future::Future;
use std::sync::Arc;

use serde::Serialize;
use tokio::task::{JoinError, JoinSet};
use tokio_util::sync::CancellationToken;

use crate::config::HostConfig;
use crate::context::HostContext;
use crate::error::{HarnessError, Result};
use crate::fault::join_error;
use crate::harness::{Harness, RunSummary};
use crate::identity::SequentialAllocator;
use crate::service::BackgroundService;
use crate::state::ServiceState;

/// Runs a set of background services until told to stop.
#[derive(Debug)]
pub struct ServiceHost {
    config: HostConfig,
    context: HostContext,
    allocator: Arc<SequentialAllocator>,
    shutdown: CancellationToken,
    harnesses: Vec<Harness>,
}

impl ServiceHost {
    /// Creates a host with its own identity allocator and host context.
    ///
    /// # Errors
    /// Returns an error if the configuration is invalid.
    pub fn new(config: HostConfig) -> Result<Self> {
        config.validate()?;
        let context = HostContext::new(config.name.clone());
        Ok(Self {
            config,
            context,
            allocator: Arc::new(SequentialAllocator::new()),
            shutdown: CancellationToken::new(),
            harnesses: Vec::new(),
        })
    }

    /// Returns the host configuration.
    #[must_use]
    pub const fn config(&self) -> &HostConfig {
        &self.config
    }

    /// Returns the context handed to every registered service.
    #[must_use]
    pub const fn context(&self) -> &HostContext {
        &self.context
    }

    /// Returns a token that stops the host when cancelled.
    #[must_use]
    pub fn shutdown_handle(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Returns the registered harnesses.
    #[must_use]
    pub fn services(&self) -> &[Harness] {
        &self.harnesses
    }

    /// Wraps `service` in a harness and runs its mandatory startup.
    ///
    /// The configured loop delay for the service's name is applied first.
    ///
    /// # Errors
    /// Returns [`HarnessError::Startup`] if mandatory startup fails; the
    /// harness is disposed and not registered, and the host should abort.
    pub async fn register<S: BackgroundService>(&mut self, service: S) -> Result<Harness> {
        let config = self.config.service(service.name());
        let harness = Harness::builder(service)
            .host_context(self.context.clone())
            .allocator(self.allocator.clone())
            .config(config)
            .build()?;

        if let Err(err) = harness.mandatory_startup().await {
            tracing::error!(
                host = %self.config.name,
                service = %harness.log_prefix(),
                error = %err,
                "service failed to start; aborting registration"
            );
            harness.dispose().await;
            return Err(HarnessError::startup(format!(
                "{} failed to start: {err}",
                harness.name()
            )));
        }

        tracing::info!(
            host = %self.config.name,
            service = %harness.log_prefix(),
            "registered service"
        );
        self.harnesses.push(harness.clone());
        Ok(harness)
    }

    /// Runs every service until SIGINT/SIGTERM or the shutdown handle fires.
    pub async fn run(self) -> HostReport {
        self.run_until(termination_signal()).await
    }

    /// Runs every service until `shutdown` completes, the shutdown handle
    /// fires, or every service has stopped by itself.
    pub async fn run_until<F>(self, shutdown: F) -> HostReport
    where
        F: Future<Output = ()>,
    {
        let Self {
            config,
            shutdown: root,
            harnesses,
            ..
        } = self;

        tracing::info!(host = %config.name, services = harnesses.len(), "starting host");

        let mut tasks = JoinSet::new();
        for harness in &harnesses {
            let harness = harness.clone();
            let signal = root.clone();
            tasks.spawn(async move { harness.run(signal).await });
        }

        let mut runs = Vec::with_capacity(harnesses.len());
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                () = &mut shutdown => {
                    tracing::info!(host = %config.name, "shutdown requested");
                    break;
                }
                () = root.cancelled() => {
                    tracing::info!(host = %config.name, "shutdown handle triggered");
                    break;
                }
                joined = tasks.join_next() => match joined {
                    Some(result) => collect(&mut runs, result),
                    None => {
                        tracing::info!(host = %config.name, "all services stopped");
                        break;
                    }
                },
            }
        }

        root.cancel();

        let drained = tokio::time::timeout(config.shutdown_timeout, async {
            while let Some(result) = tasks.join_next().await {
                collect(&mut runs, result);
            }
        })
        .await;

        let aborted = if drained.is_err() {
            let stragglers = tasks.len();
            tracing::warn!(
                host = %config.name,
                stragglers,
                timeout = ?config.shutdown_timeout,
                "services did not stop in time; aborting"
            );
            tasks.shutdown().await;
            stragglers
        } else {
            0
        };

        let mut final_states = Vec::with_capacity(harnesses.len());
        for harness in &harnesses {
            harness.dispose().await;
            final_states.push((harness.name().to_string(), harness.state()));
        }

        tracing::info!(host = %config.name, "host shutdown");

        HostReport {
            host: config.name,
            runs,
            aborted,
            final_states,
        }
    }
}

fn collect(runs: &mut Vec<RunSummary>, result: std::result::Result<RunSummary, JoinError>) {
    match result {
        Ok(summary) => runs.push(summary),
        Err(err) => tracing::error!(error = %join_error(err), "service task failed"),
    }
}

/// Completes on Ctrl-C, or SIGTERM on Unix.
pub async fn termination_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    () = ctrl_c => {}
                    _ = term.recv() => {}
                }
            }
            Err(err) => {
                tracing::warn!(error = %err, "failed to listen for SIGTERM");
                ctrl_c.await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        ctrl_c.await;
    }
}

/// Outcome of a host run.
#[derive(Debug, Clone, Serialize)]
pub struct HostReport {
    /// Host name.
    pub host: String,
    /// One summary per service whose run task completed.
    pub runs: Vec<RunSummary>,
    /// Run tasks aborted after the shutdown timeout.
    pub aborted: usize,
    /// State of every service after disposal.
    pub final_states: Vec<(String, ServiceState)>,
}

impl HostReport {
    /// Returns true if every service started and stopped on its own.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.aborted == 0 && self.runs.iter().all(|run| run.started)
    }

    /// Process exit code: 0 clean, 1 a startup failed, 2 tasks were aborted.
    #[must_use]
    pub fn exit_code(&self) -> u8 {
        if self.aborted > 0 {
            2
        } else if self.runs.iter().any(|run| !run.started) {
            1
        } else {
            0
        }
    }
}
