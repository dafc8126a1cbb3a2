// Examples are allowed to use expect/unwrap for simplicity
#![allow(clippy::expect_used, clippy::unwrap_used)]

//! Template service hosted by Vela.
//!
//! A starting point for a concrete background service: idempotent mandatory
//! setup, an admin loop every ten seconds, and teardown on Ctrl-C/SIGTERM.
//!
//! # Usage
//!
//! ```bash
//! # Run with built-in settings
//! cargo run --example template
//!
//! # Run with a TOML host config
//! cargo run --example template -- host.toml
//!
//! # Show per-iteration logs
//! RUST_LOG=debug cargo run --example template
//! ```
//!
//! A host config looks like:
//!
//! ```toml
//! name = "template-host"
//! shutdown_timeout = "10s"
//!
//! [services.template]
//! loop_iteration_delay_ms = 10000
//! ```

use std::process::ExitCode;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;
use vela::prelude::*;

/// Stand-in for a connection the service must hold before it may run.
#[derive(Debug)]
struct QueueClient {
    host: String,
}

/// Example service that reports a heartbeat from its admin loop.
#[derive(Default)]
struct TemplateService {
    client: parking_lot::Mutex<Option<QueueClient>>,
    heartbeats: AtomicU64,
}

#[async_trait]
impl BackgroundService for TemplateService {
    fn name(&self) -> &str {
        "template"
    }

    async fn mandatory_startup(&self, ctx: &HostContext) -> vela::core::Result<()> {
        // Called at registration and again by the harness; only connect once.
        let mut client = self.client.lock();
        if client.is_none() {
            tracing::info!(host = ctx.host_name(), "connecting queue client");
            *client = Some(QueueClient {
                host: ctx.host_name().to_string(),
            });
        }
        Ok(())
    }

    async fn startup(
        &self,
        ctx: &HostContext,
        _stopping: &CancellationToken,
    ) -> vela::core::Result<()> {
        if self.client.lock().is_none() {
            return Err(HarnessError::startup("queue client missing"));
        }
        tracing::info!(host = ctx.host_name(), "template service ready");
        Ok(())
    }

    async fn shutdown(&self) -> vela::core::Result<()> {
        if let Some(client) = self.client.lock().take() {
            tracing::info!(host = %client.host, "closing queue client");
        }
        tracing::info!(
            heartbeats = self.heartbeats.load(Ordering::Relaxed),
            "template service shut down"
        );
        Ok(())
    }

    async fn loop_iteration(
        &self,
        _stopping: &CancellationToken,
    ) -> vela::core::Result<IterationOutcome> {
        let beat = self.heartbeats.fetch_add(1, Ordering::Relaxed) + 1;
        tracing::info!(beat, "heartbeat");
        Ok(IterationOutcome::Completed)
    }
}

fn load_config() -> vela::core::Result<HostConfig> {
    match std::env::args().nth(1) {
        Some(path) => HostConfig::load(path),
        None => Ok(HostConfig::new("template-host").with_service(
            "template",
            HarnessConfig::new().with_loop_iteration_delay_ms(10_000),
        )),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = match load_config() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("invalid configuration: {err}");
            return ExitCode::FAILURE;
        }
    };

    let mut host = ServiceHost::new(config).expect("config was validated on load");

    if let Err(err) = host.register(TemplateService::default()).await {
        eprintln!("aborting: {err}");
        return ExitCode::FAILURE;
    }

    tracing::info!("running; press Ctrl-C to stop");
    let report = host.run().await;

    for run in &report.runs {
        tracing::info!(
            service = %run.service,
            instance = %run.instance,
            iterations = run.iterations,
            final_state = %run.final_state,
            "service finished"
        );
    }

    ExitCode::from(report.exit_code())
}
