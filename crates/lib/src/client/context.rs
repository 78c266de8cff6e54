//! Deadline and cancellation for remote calls.

use std::future::Future;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::Instant;

use super::ClientError;

/// Carried into every remote call.
///
/// A context is cheap to clone; clones share the cancellation signal.
#[derive(Debug, Clone)]
pub struct CallContext {
  deadline: Option<Instant>,
  call_timeout: Option<Duration>,
  cancel: watch::Receiver<bool>,
}

/// Cancels every [`CallContext`] created from it.
#[derive(Debug)]
pub struct CancelHandle(watch::Sender<bool>);

impl CancelHandle {
  pub fn cancel(&self) {
    self.0.send_replace(true);
  }
}

impl Default for CallContext {
  fn default() -> Self {
    Self::background()
  }
}

impl CallContext {
  /// A context that never expires and cannot be cancelled.
  pub fn background() -> Self {
    // The sender is dropped right away, so the signal can never fire.
    let (_, cancel) = watch::channel(false);
    Self {
      deadline: None,
      call_timeout: None,
      cancel,
    }
  }

  /// A cancellable context and the handle that cancels it.
  pub fn with_cancel() -> (Self, CancelHandle) {
    let (tx, cancel) = watch::channel(false);
    let ctx = Self {
      deadline: None,
      call_timeout: None,
      cancel,
    };
    (ctx, CancelHandle(tx))
  }

  /// Limit each single call to `timeout`.
  pub fn with_timeout(mut self, timeout: Duration) -> Self {
    self.call_timeout = Some(timeout);
    self
  }

  /// Fail every call that would end after `deadline`.
  pub fn with_deadline(mut self, deadline: Instant) -> Self {
    self.deadline = Some(deadline);
    self
  }

  pub fn is_cancelled(&self) -> bool {
    *self.cancel.borrow()
  }

  /// The point in time a call started now has to finish by.
  fn effective_deadline(&self) -> Option<Instant> {
    let per_call = self.call_timeout.map(|t| Instant::now() + t);
    match (self.deadline, per_call) {
      (Some(a), Some(b)) => Some(a.min(b)),
      (a, b) => a.or(b),
    }
  }

  /// Run a remote call under this context.
  ///
  /// # Errors
  ///
  /// Returns [`ClientError::Cancelled`] if the context is or gets cancelled and
  /// [`ClientError::Timeout`] if the deadline passes first; otherwise the
  /// call's own result.
  pub async fn run<T>(&self, call: impl Future<Output = Result<T, ClientError>>) -> Result<T, ClientError> {
    if self.is_cancelled() {
      return Err(ClientError::Cancelled);
    }

    let deadline = self.effective_deadline();
    let bounded = async move {
      match deadline {
        Some(deadline) => match tokio::time::timeout_at(deadline, call).await {
          Ok(result) => result,
          Err(_) => Err(ClientError::Timeout),
        },
        None => call.await,
      }
    };

    let mut cancel = self.cancel.clone();
    tokio::select! {
      result = bounded => result,
      _ = cancelled(&mut cancel) => Err(ClientError::Cancelled),
    }
  }
}

/// Resolves once the signal fires; never resolves if its sender is gone.
async fn cancelled(cancel: &mut watch::Receiver<bool>) {
  if cancel.wait_for(|cancelled| *cancelled).await.is_err() {
    std::future::pending::<()>().await;
  }
}
