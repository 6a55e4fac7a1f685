//! Client-side token bucket every outbound API call passes through.
//!
//! Tokens refill lazily on each acquire attempt, so no background timer is
//! needed. `wait` sleeps exactly until the next token is due instead of
//! polling, and gives up as soon as the caller's token is cancelled.

use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

use crate::cancel::{CancelError, CancellationToken};

#[derive(Debug)]
struct TokenBucket {
  tokens: u32,
  max_tokens: u32,
  refill_rate: Duration,
  last_refill: Instant,
}

impl TokenBucket {
  fn refill(&mut self, now: Instant) {
    let elapsed = now.saturating_duration_since(self.last_refill);
    let to_add = elapsed.as_nanos() / self.refill_rate.as_nanos().max(1);
    if to_add == 0 {
      return;
    }

    // Time past the last whole token is dropped, not carried over.
    let room = u128::from(self.max_tokens - self.tokens);
    self.tokens += to_add.min(room) as u32;
    self.last_refill = now;
  }

  fn time_until_next(&self, now: Instant) -> Duration {
    (self.last_refill + self.refill_rate).saturating_duration_since(now)
  }
}

/// Token-bucket rate limiter.
#[derive(Debug)]
pub struct RateLimiter {
  bucket: Mutex<TokenBucket>,
}

impl RateLimiter {
  /// Allow `max_requests` per `per`, starting with a full bucket.
  pub fn new(max_requests: u32, per: Duration) -> Self {
    let max_tokens = max_requests.max(1);
    Self {
      bucket: Mutex::new(TokenBucket {
        tokens: max_tokens,
        max_tokens,
        refill_rate: per / max_tokens,
        last_refill: Instant::now(),
      }),
    }
  }

  /// Time needed to regenerate one token.
  #[allow(dead_code)]
  pub fn refill_rate(&self) -> Duration {
    self.lock().refill_rate
  }

  /// Tokens currently available, after applying any pending refill.
  #[allow(dead_code)]
  pub fn available(&self) -> u32 {
    let mut bucket = self.lock();
    bucket.refill(Instant::now());
    bucket.tokens
  }

  /// Take a token if one is available, without blocking.
  #[allow(dead_code)]
  pub fn try_acquire(&self) -> bool {
    self.acquire_or_delay().is_none()
  }

  /// Block until a token is taken or `cancel` finishes.
  pub async fn wait(&self, cancel: &CancellationToken) -> Result<(), CancelError> {
    loop {
      let delay = match self.acquire_or_delay() {
        None => return Ok(()),
        Some(delay) => delay,
      };

      debug!("Rate limit reached, next token in {:?}", delay);
      cancel.sleep(delay).await?;
    }
  }

  /// Take a token, or report how long until the next one is due.
  fn acquire_or_delay(&self) -> Option<Duration> {
    let now = Instant::now();
    let mut bucket = self.lock();
    bucket.refill(now);
    if bucket.tokens > 0 {
      bucket.tokens -= 1;
      None
    } else {
      // Never hand back a zero delay or wait() would spin.
      Some(bucket.time_until_next(now).max(Duration::from_millis(1)))
    }
  }

  fn lock(&self) -> std::sync::MutexGuard<'_, TokenBucket> {
    // The bucket holds plain counters, so a poisoned lock is still consistent.
    self.bucket.lock().unwrap_or_else(PoisonError::into_inner)
  }
}
