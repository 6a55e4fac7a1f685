//! The request/response seam that retry and the API client are built on.

use futures::future::BoxFuture;
use reqwest::{Request, Response};
use std::time::Duration;
use thiserror::Error;

use crate::cancel::CancelError;

/// Transport-level failure: no HTTP response was produced.
#[derive(Debug, Error)]
pub enum TransportError {
  #[error("network error: {message}")]
  Network { message: String },

  #[error("request timed out")]
  Timeout,

  /// Raised by transports that detect throttling below the HTTP layer.
  #[allow(dead_code)]
  #[error("rate limited, retry after {retry_after:?}")]
  RateLimited { retry_after: Option<Duration> },

  #[error(transparent)]
  Cancelled(#[from] CancelError),

  #[error("request failed: {message}")]
  Request { message: String },
}

impl TransportError {
  /// Whether another attempt could plausibly succeed.
  pub fn is_retryable(&self) -> bool {
    matches!(
      self,
      TransportError::Network { .. }
        | TransportError::Timeout
        | TransportError::RateLimited { .. }
    )
  }
}

impl From<reqwest::Error> for TransportError {
  fn from(err: reqwest::Error) -> Self {
    if err.is_timeout() {
      TransportError::Timeout
    } else if err.is_connect() || err.is_request() {
      // reqwest reports refused connections, DNS failures and resets this way.
      TransportError::Network {
        message: err.to_string(),
      }
    } else {
      TransportError::Request {
        message: err.to_string(),
      }
    }
  }
}

/// Anything that can send one HTTP request and produce one response.
pub trait Transport: Send + Sync {
  fn round_trip(&self, request: Request) -> BoxFuture<'_, Result<Response, TransportError>>;
}

impl Transport for reqwest::Client {
  fn round_trip(&self, request: Request) -> BoxFuture<'_, Result<Response, TransportError>> {
    Box::pin(async move { self.execute(request).await.map_err(TransportError::from) })
  }
}

impl<T: Transport + ?Sized> Transport for std::sync::Arc<T> {
  fn round_trip(&self, request: Request) -> BoxFuture<'_, Result<Response, TransportError>> {
    (**self).round_trip(request)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_retryable_errors() {
    assert!(TransportError::Timeout.is_retryable());
    assert!(TransportError::Network {
      message: "connection reset".into()
    }
    .is_retryable());
    assert!(TransportError::RateLimited { retry_after: None }.is_retryable());

    assert!(!TransportError::Cancelled(CancelError::Cancelled).is_retryable());
    assert!(!TransportError::Request {
      message: "builder error".into()
    }
    .is_retryable());
  }
}
