//! Retrying transport decorator.
//!
//! Retries server errors (5xx), rate limiting (429) and retryable transport
//! errors with exponential backoff. Client errors are returned untouched on
//! the first attempt. After the last attempt the final response or error is
//! handed back as-is, so callers still inspect status codes themselves.

use bytes::Bytes;
use futures::future::BoxFuture;
use http_body_util::BodyExt;
use reqwest::{header, Body, Request, Response, StatusCode};
use std::time::Duration;
use tracing::{debug, warn};

use super::transport::{Transport, TransportError};
use crate::cancel::CancellationToken;

/// Retry schedule.
#[derive(Debug, Clone)]
pub struct RetryConfig {
  /// Maximum number of attempts (including the first one).
  pub max_attempts: u32,
  /// Delay after the first failed attempt.
  pub base_delay: Duration,
  /// Maximum delay cap.
  pub max_delay: Duration,
}

impl Default for RetryConfig {
  fn default() -> Self {
    Self {
      max_attempts: 3,
      base_delay: Duration::from_millis(100),
      max_delay: Duration::from_secs(5),
    }
  }
}

impl RetryConfig {
  /// Backoff before retrying after failed attempt number `attempt` (0-indexed).
  pub fn calculate_delay(&self, attempt: u32) -> Duration {
    let multiplier = 2u32.saturating_pow(attempt);
    self
      .base_delay
      .checked_mul(multiplier)
      .unwrap_or(self.max_delay)
      .min(self.max_delay)
  }
}

/// A [`Transport`] that retries transient failures of the wrapped transport.
#[derive(Debug, Clone)]
pub struct RetryTransport<T> {
  inner: T,
  config: RetryConfig,
}

impl<T: Transport> RetryTransport<T> {
  pub fn new(inner: T) -> Self {
    Self::with_config(inner, RetryConfig::default())
  }

  pub fn with_config(inner: T, config: RetryConfig) -> Self {
    Self { inner, config }
  }

  #[allow(dead_code)]
  pub fn inner(&self) -> &T {
    &self.inner
  }

  /// Send `request`, retrying transient failures. Backoff sleeps end early
  /// with [`TransportError::Cancelled`] when `cancel` finishes.
  pub async fn send(
    &self,
    mut request: Request,
    cancel: &CancellationToken,
  ) -> Result<Response, TransportError> {
    // Buffer the body once so every attempt can replay it.
    let body = match request.body_mut().take() {
      Some(body) => Some(buffer_body(body).await?),
      None => None,
    };

    let max_attempts = self.config.max_attempts.max(1);
    let mut backoff_attempt = 0;
    let mut attempt = 0;

    loop {
      attempt += 1;
      let last = attempt == max_attempts;

      let pause = match self.inner.round_trip(rebuild(&request, body.as_ref())).await {
        Ok(response) => {
          let status = response.status();
          if !is_retryable_status(status) || last {
            if last && is_retryable_status(status) {
              warn!(
                "All {} attempts for {} exhausted, last status {}",
                max_attempts,
                request.url(),
                status
              );
            }
            return Ok(response);
          }

          match retry_after(&response) {
            Some(delay) if status == StatusCode::TOO_MANY_REQUESTS => {
              debug!("Rate limited by server, honoring Retry-After of {:?}", delay);
              delay
            }
            _ => {
              let delay = self.config.calculate_delay(backoff_attempt);
              backoff_attempt += 1;
              delay
            }
          }
        }
        Err(err) => {
          if !err.is_retryable() {
            debug!("Error is not retryable: {}", err);
            return Err(err);
          }
          if last {
            warn!("All {} attempts for {} exhausted: {}", max_attempts, request.url(), err);
            return Err(err);
          }
          let delay = match &err {
            TransportError::RateLimited {
              retry_after: Some(delay),
            } => *delay,
            _ => {
              let delay = self.config.calculate_delay(backoff_attempt);
              backoff_attempt += 1;
              delay
            }
          };
          debug!("Attempt {}/{} failed: {}", attempt, max_attempts, err);
          delay
        }
      };

      warn!(
        "Attempt {}/{} for {} {} failed, retrying in {:?}",
        attempt,
        max_attempts,
        request.method(),
        request.url(),
        pause
      );
      cancel.sleep(pause).await?;
    }
  }
}

impl<T: Transport> Transport for RetryTransport<T> {
  fn round_trip(&self, request: Request) -> BoxFuture<'_, Result<Response, TransportError>> {
    Box::pin(async move { self.send(request, &CancellationToken::new()).await })
  }
}

/// 5xx and 429 are transient; everything else is definitive.
pub fn is_retryable_status(status: StatusCode) -> bool {
  status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS
}

/// Parse a `Retry-After` header given as whole seconds.
fn retry_after(response: &Response) -> Option<Duration> {
  response
    .headers()
    .get(header::RETRY_AFTER)
    .and_then(|v| v.to_str().ok())
    .and_then(|s| s.trim().parse::<u64>().ok())
    .map(Duration::from_secs)
}

/// Read a request body into memory, draining it if it is a stream.
async fn buffer_body(body: Body) -> Result<Bytes, TransportError> {
  if let Some(bytes) = body.as_bytes() {
    return Ok(Bytes::copy_from_slice(bytes));
  }
  let collected = body.collect().await.map_err(|e| TransportError::Request {
    message: format!("failed to buffer request body: {}", e),
  })?;
  Ok(collected.to_bytes())
}

fn rebuild(template: &Request, body: Option<&Bytes>) -> Request {
  let mut request = Request::new(template.method().clone(), template.url().clone());
  *request.headers_mut() = template.headers().clone();
  *request.timeout_mut() = template.timeout().copied();
  *request.version_mut() = template.version();
  *request.body_mut() = body.cloned().map(Body::from);
  request
}
