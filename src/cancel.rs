//! Cancellation token shared by everything that can block on the network.
//!
//! A token is cancelled explicitly (Ctrl-C in the binary) or implicitly once
//! its deadline passes. Clones observe the same state.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Notify;
use tokio::time::Instant;

/// Why a cancellable operation stopped early.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CancelError {
  #[error("operation cancelled")]
  Cancelled,
  #[error("deadline exceeded")]
  DeadlineExceeded,
}

#[derive(Debug, Default)]
struct Inner {
  cancelled: AtomicBool,
  notify: Notify,
}

/// A cancellation token with an optional deadline.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
  inner: Arc<Inner>,
  deadline: Option<Instant>,
}

impl CancellationToken {
  /// Create a token that is only cancelled explicitly.
  pub fn new() -> Self {
    Self::default()
  }

  /// Derive a token sharing this one's cancel state that also expires after `timeout`.
  #[allow(dead_code)]
  pub fn with_timeout(&self, timeout: Duration) -> Self {
    self.with_deadline(Instant::now() + timeout)
  }

  /// Derive a token sharing this one's cancel state that also expires at `deadline`.
  ///
  /// An earlier existing deadline wins.
  #[allow(dead_code)]
  pub fn with_deadline(&self, deadline: Instant) -> Self {
    let deadline = match self.deadline {
      Some(existing) if existing < deadline => existing,
      _ => deadline,
    };
    Self {
      inner: Arc::clone(&self.inner),
      deadline: Some(deadline),
    }
  }

  /// Request cancellation. All clones observe it.
  pub fn cancel(&self) {
    self.inner.cancelled.store(true, Ordering::SeqCst);
    self.inner.notify.notify_waiters();
  }

  pub fn is_cancelled(&self) -> bool {
    self.inner.cancelled.load(Ordering::SeqCst)
  }

  #[allow(dead_code)]
  pub fn deadline(&self) -> Option<Instant> {
    self.deadline
  }

  /// The reason this token is done, if it is.
  ///
  /// Explicit cancellation takes precedence over an elapsed deadline.
  pub fn error(&self) -> Option<CancelError> {
    if self.is_cancelled() {
      return Some(CancelError::Cancelled);
    }
    match self.deadline {
      Some(deadline) if Instant::now() >= deadline => Some(CancelError::DeadlineExceeded),
      _ => None,
    }
  }

  /// Resolve once the token is cancelled or its deadline passes.
  pub async fn done(&self) -> CancelError {
    match self.deadline {
      Some(deadline) => tokio::select! {
        _ = self.cancelled() => CancelError::Cancelled,
        _ = tokio::time::sleep_until(deadline) => {
          self.error().unwrap_or(CancelError::DeadlineExceeded)
        }
      },
      None => {
        self.cancelled().await;
        CancelError::Cancelled
      }
    }
  }

  /// Sleep for `duration`, returning early with an error if the token finishes first.
  pub async fn sleep(&self, duration: Duration) -> Result<(), CancelError> {
    if let Some(err) = self.error() {
      return Err(err);
    }
    tokio::select! {
      err = self.done() => Err(err),
      _ = tokio::time::sleep(duration) => Ok(()),
    }
  }

  async fn cancelled(&self) {
    loop {
      // Register before checking the flag so a concurrent cancel() is not missed.
      let notified = self.inner.notify.notified();
      if self.is_cancelled() {
        return;
      }
      notified.await;
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_new_token_is_live() {
    let token = CancellationToken::new();
    assert!(!token.is_cancelled());
    assert_eq!(token.error(), None);
  }

  #[test]
  fn test_cancel_is_shared_between_clones() {
    let token = CancellationToken::new();
    let clone = token.clone();
    clone.cancel();
    assert!(token.is_cancelled());
    assert_eq!(token.error(), Some(CancelError::Cancelled));
  }

  #[tokio::test(start_paused = true)]
  async fn test_deadline_expires() {
    let token = CancellationToken::new().with_timeout(Duration::from_millis(50));
    assert_eq!(token.error(), None);

    let err = token.done().await;
    assert_eq!(err, CancelError::DeadlineExceeded);
    assert_eq!(token.error(), Some(CancelError::DeadlineExceeded));
  }

  #[tokio::test(start_paused = true)]
  async fn test_earlier_deadline_wins() {
    let parent = CancellationToken::new().with_timeout(Duration::from_secs(1));
    let child = parent.with_timeout(Duration::from_secs(10));
    assert_eq!(child.deadline(), parent.deadline());
  }

  #[tokio::test]
  async fn test_done_wakes_on_cancel() {
    let token = CancellationToken::new();
    let waiter = token.clone();
    let handle = tokio::spawn(async move { waiter.done().await });

    tokio::task::yield_now().await;
    token.cancel();

    let err = handle.await.unwrap();
    assert_eq!(err, CancelError::Cancelled);
  }

  #[tokio::test(start_paused = true)]
  async fn test_sleep_interrupted_by_deadline() {
    let token = CancellationToken::new().with_timeout(Duration::from_millis(10));
    let start = Instant::now();
    let result = token.sleep(Duration::from_secs(5)).await;
    assert_eq!(result, Err(CancelError::DeadlineExceeded));
    assert!(start.elapsed() < Duration::from_secs(1));
  }

  #[tokio::test(start_paused = true)]
  async fn test_sleep_completes() {
    let token = CancellationToken::new();
    assert_eq!(token.sleep(Duration::from_millis(10)).await, Ok(()));
  }
}
