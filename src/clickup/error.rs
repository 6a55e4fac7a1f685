use thiserror::Error;

use crate::cancel::CancelError;
use crate::network::TransportError;

/// Errors from talking to the ClickUp API.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("gave up waiting for the rate limiter: {0}")]
  RateLimit(#[source] CancelError),

  #[error(transparent)]
  Transport(#[from] TransportError),

  #[error("API returned {status}: {message}")]
  Status { status: u16, message: String },

  #[error("failed to read API response: {0}")]
  Body(#[source] reqwest::Error),

  #[error("failed to decode API response: {0}")]
  Decode(#[from] serde_json::Error),

  #[error("invalid API URL: {0}")]
  Url(#[from] url::ParseError),

  #[error("API token contains characters not allowed in a header")]
  InvalidToken,

  #[error("workspace {0} not found")]
  WorkspaceNotFound(String),
}

impl ApiError {
  #[allow(dead_code)]
  pub fn status(&self) -> Option<u16> {
    match self {
      ApiError::Status { status, .. } => Some(*status),
      _ => None,
    }
  }
}
