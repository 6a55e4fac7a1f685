//! Canned API responses for client tests.

use futures::future::BoxFuture;
use reqwest::header::AUTHORIZATION;
use reqwest::{Method, Request, Response};
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::client::ClickUpClient;
use crate::cancel::CancellationToken;
use crate::network::{RateLimiter, Transport, TransportError};

pub const BASE_URL: &str = "https://api.example.test/api/v2";

#[derive(Debug, Clone)]
pub struct RecordedRequest {
  pub method: Method,
  pub url: String,
  pub auth: Option<String>,
  pub body: Option<Value>,
}

/// Records requests and replies with queued JSON bodies.
#[derive(Default)]
pub struct FakeApi {
  replies: Mutex<VecDeque<(u16, Value)>>,
  seen: Mutex<Vec<RecordedRequest>>,
}

impl FakeApi {
  pub fn with(replies: Vec<(u16, Value)>) -> Arc<Self> {
    Arc::new(Self {
      replies: Mutex::new(replies.into()),
      seen: Mutex::default(),
    })
  }

  pub fn seen(&self) -> Vec<RecordedRequest> {
    self.seen.lock().unwrap().clone()
  }

  pub fn urls(&self) -> Vec<String> {
    self.seen().into_iter().map(|r| r.url).collect()
  }
}

impl Transport for FakeApi {
  fn round_trip(&self, request: Request) -> BoxFuture<'_, Result<Response, TransportError>> {
    let auth = request
      .headers()
      .get(AUTHORIZATION)
      .map(|v| v.to_str().unwrap().to_string());
    let body = request
      .body()
      .and_then(|b| b.as_bytes())
      .map(|b| serde_json::from_slice(b).unwrap());
    self.seen.lock().unwrap().push(RecordedRequest {
      method: request.method().clone(),
      url: request.url().to_string(),
      auth,
      body,
    });

    let (status, json) = self
      .replies
      .lock()
      .unwrap()
      .pop_front()
      .unwrap_or_else(|| panic!("unexpected request to {}", request.url()));
    Box::pin(async move {
      let response = http::Response::builder()
        .status(status)
        .body(serde_json::to_vec(&json).unwrap())
        .unwrap();
      Ok(Response::from(response))
    })
  }
}

pub fn fake_client(api: &Arc<FakeApi>) -> ClickUpClient<Arc<FakeApi>> {
  ClickUpClient::with_transport(
    api.clone(),
    BASE_URL,
    "pk_test",
    Arc::new(RateLimiter::new(100, Duration::from_secs(60))),
    CancellationToken::new(),
  )
  .unwrap()
}

/// `GET team` body with two workspaces.
pub fn teams() -> Value {
  json!({
    "teams": [
      {"id": "1", "name": "Acme", "members": [
        {"user": {"id": 100, "username": "Alice"}},
        {"user": {"id": 200, "username": "Bob"}}
      ]},
      {"id": "2", "name": "Side project", "members": []}
    ]
  })
}
