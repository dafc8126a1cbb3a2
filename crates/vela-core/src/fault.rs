//! Fault boundary for service code.
//!
//! Each call into a service hook runs on its own task so that a panic is
//! reported as a [`HarnessError::Panicked`] instead of unwinding through the
//! harness. If the caller is dropped mid-call the task is aborted with it.

use std::any::Any;
use std::future::Future;

use tokio::task::{JoinError, JoinHandle};

use crate::error::{HarnessError, Result};

/// Aborts the wrapped task when dropped.
#[derive(Debug)]
pub(crate) struct AbortOnDrop<T>(pub(crate) JoinHandle<T>);

impl<T> Drop for AbortOnDrop<T> {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Runs `fut` on its own task, converting a panic into an error.
pub(crate) async fn isolate<T, F>(fut: F) -> Result<T>
where
    F: Future<Output = Result<T>> + Send + 'static,
    T: Send + 'static,
{
    let mut task = AbortOnDrop(tokio::spawn(fut));
    match (&mut task.0).await {
        Ok(result) => result,
        Err(err) => Err(join_error(err)),
    }
}

/// Maps a failed join into the harness taxonomy.
pub(crate) fn join_error(err: JoinError) -> HarnessError {
    if err.is_panic() {
        let payload = err.into_panic();
        HarnessError::Panicked(panic_message(payload.as_ref()))
    } else {
        HarnessError::Aborted(err.to_string())
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
