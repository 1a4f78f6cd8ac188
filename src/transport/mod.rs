//! Single HTTP round trips against the wallet backend.
//!
//! A transport executes exactly one call: it attaches the ambient session
//! credential, enforces a hard deadline, and reports either the decoded JSON
//! body or a typed failure. It never retries and knows nothing about session
//! renewal; that lives in [`crate::auth`].

mod http;

use async_trait::async_trait;
use serde_json::Value;
use std::fmt;
use std::time::Duration;

pub use http::HttpTransport;

/// Status code the backend uses to signal an expired session.
pub const AUTH_EXPIRED_STATUS: u16 = 401;

/// HTTP verbs used by the registries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
  Get,
  Post,
  Put,
  Patch,
  Delete,
}

impl Method {
  pub fn as_str(self) -> &'static str {
    match self {
      Method::Get => "GET",
      Method::Post => "POST",
      Method::Put => "PUT",
      Method::Patch => "PATCH",
      Method::Delete => "DELETE",
    }
  }
}

impl fmt::Display for Method {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// One outbound call.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
  pub method: Method,
  /// Path relative to the configured base URL, e.g. `/wallet/user`.
  pub path: String,
  /// Query string pairs, appended in order.
  pub query: Vec<(String, String)>,
  pub body: Option<Value>,
  pub timeout: Duration,
}

impl Request {
  pub fn new(method: Method, path: impl Into<String>, timeout: Duration) -> Self {
    Self {
      method,
      path: path.into(),
      query: Vec::new(),
      body: None,
      timeout,
    }
  }

  pub fn get(path: impl Into<String>, timeout: Duration) -> Self {
    Self::new(Method::Get, path, timeout)
  }

  pub fn with_body(mut self, body: Value) -> Self {
    self.body = Some(body);
    self
  }

  pub fn with_query(mut self, key: impl Into<String>, value: impl ToString) -> Self {
    self.query.push((key.into(), value.to_string()));
    self
  }
}

/// Failure of a single transport call.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TransportError {
  #[error("request timed out after {0:?}")]
  Timeout(Duration),

  #[error("network error: {0}")]
  Network(String),

  #[error("backend responded with status {status}")]
  Status { status: u16, body: Value },

  #[error("malformed response body: {0}")]
  Decode(String),
}

impl TransportError {
  /// The backend rejected the session credential.
  pub fn is_auth_expired(&self) -> bool {
    matches!(self, TransportError::Status { status, .. } if *status == AUTH_EXPIRED_STATUS)
  }

  /// Timeouts and connection failures may be retried at the caller's discretion.
  pub fn is_retryable(&self) -> bool {
    matches!(self, TransportError::Timeout(_) | TransportError::Network(_))
  }
}

/// Executes one HTTP call with a bounded timeout.
#[async_trait]
pub trait Transport: Send + Sync {
  async fn execute(&self, request: &Request) -> Result<Value, TransportError>;
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn test_only_401_is_auth_expired() {
    let expired = TransportError::Status {
      status: 401,
      body: Value::Null,
    };
    let forbidden = TransportError::Status {
      status: 403,
      body: json!({"message": "nope"}),
    };
    assert!(expired.is_auth_expired());
    assert!(!forbidden.is_auth_expired());
    assert!(!TransportError::Timeout(Duration::from_secs(1)).is_auth_expired());
  }

  #[test]
  fn test_retryable_classification() {
    assert!(TransportError::Timeout(Duration::from_millis(5)).is_retryable());
    assert!(TransportError::Network("reset".into()).is_retryable());
    assert!(!TransportError::Decode("eof".into()).is_retryable());
    assert!(!TransportError::Status {
      status: 500,
      body: Value::Null
    }
    .is_retryable());
  }

  #[test]
  fn test_request_builder() {
    let req = Request::get("/wallet/history", Duration::from_secs(3))
      .with_query("page", 2)
      .with_query("limit", 20);
    assert_eq!(req.method, Method::Get);
    assert_eq!(
      req.query,
      vec![
        ("page".to_string(), "2".to_string()),
        ("limit".to_string(), "20".to_string())
      ]
    );
    assert!(req.body.is_none());
  }
}
