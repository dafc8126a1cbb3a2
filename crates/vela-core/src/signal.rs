//! Cancellation signal abstraction.
//!
//! The harness accepts any level-triggered "stop now" indicator that can be
//! queried and awaited. [`CancellationToken`] is the stock implementation.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// A level-triggered cancellation indicator supplied by the host.
///
/// Once fired, the signal stays fired.
#[async_trait]
pub trait CancellationSignal: Clone + Send + Sync + 'static {
    /// Returns true once cancellation has fired.
    fn is_cancelled(&self) -> bool;

    /// Completes when cancellation fires (immediately if it already has).
    async fn cancelled(&self);

    /// Sleeps for `duration`, returning early if cancellation fires.
    ///
    /// Returns true if woken by cancellation.
    async fn sleep_or_cancelled(&self, duration: Duration) -> bool {
        tokio::select! {
            biased;
            () = self.cancelled() => true,
            () = tokio::time::sleep(duration) => false,
        }
    }

    /// Registers `callback` to run at most once when cancellation fires.
    ///
    /// The callback runs on its own task. Dropping the returned
    /// [`Registration`] disarms it; a callback that has already started is
    /// allowed to finish.
    fn register<F, Fut>(&self, callback: F) -> Registration
    where
        Self: Sized,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let disarm = CancellationToken::new();
        let armed = disarm.clone();
        let signal = self.clone();

        let task = tokio::spawn(async move {
            tokio::select! {
                biased;
                () = armed.cancelled() => return,
                () = signal.cancelled() => {}
            }
            callback().await;
        });

        Registration { disarm, task }
    }
}

#[async_trait]
impl CancellationSignal for CancellationToken {
    fn is_cancelled(&self) -> bool {
        CancellationToken::is_cancelled(self)
    }

    async fn cancelled(&self) {
        CancellationToken::cancelled(self).await;
    }
}

/// Handle to a callback registered with [`CancellationSignal::register`].
#[derive(Debug)]
pub struct Registration {
    disarm: CancellationToken,
    task: JoinHandle<()>,
}

impl Registration {
    /// Prevents the callback from running if it has not started yet.
    pub fn disarm(&self) {
        self.disarm.cancel();
    }

    /// Returns true once the callback task has finished (ran or disarmed).
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for Registration {
    fn drop(&mut self) {
        self.disarm();
    }
}
