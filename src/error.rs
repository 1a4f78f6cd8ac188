//! Errors surfaced to callers of the data-access layer.

use serde_json::Value;

use crate::transport::TransportError;

/// Caller-facing failure of a read or write.
///
/// Cloneable so a single failed fetch can be delivered to every subscriber
/// waiting on the same key.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ApiError {
  /// Network failure or timeout. Retryable at the caller's discretion.
  #[error(transparent)]
  Transport(TransportError),

  /// Non-authentication error status, relayed verbatim.
  #[error("server error {status}: {message}")]
  Server {
    status: u16,
    message: String,
    body: Value,
  },

  /// Session renewal failed, or the renewed session was rejected again.
  /// The caller should send the user back through sign-in.
  #[error("session expired, sign in again")]
  AuthExpired,

  /// The backend answered successfully but the payload had an unexpected shape.
  #[error("failed to decode {operation} response: {message}")]
  Decode {
    operation: &'static str,
    message: String,
  },

  /// The operation was never registered with the client's registry.
  #[error("operation {0} is not registered")]
  UnknownOperation(&'static str),

  /// The cache entry went away before a result was delivered.
  #[error("query was cancelled")]
  Cancelled,
}

impl ApiError {
  pub fn is_retryable(&self) -> bool {
    matches!(self, ApiError::Transport(e) if e.is_retryable())
  }
}

impl From<TransportError> for ApiError {
  fn from(err: TransportError) -> Self {
    match err {
      TransportError::Status { status, body } => ApiError::Server {
        status,
        message: server_message(&body),
        body,
      },
      TransportError::Decode(message) => ApiError::Decode {
        operation: "transport",
        message,
      },
      other => ApiError::Transport(other),
    }
  }
}

/// Pull a human-readable message out of an error body.
fn server_message(body: &Value) -> String {
  match body {
    Value::String(s) if !s.is_empty() => s.clone(),
    Value::Object(map) => map
      .get("message")
      .or_else(|| map.get("error"))
      .and_then(Value::as_str)
      .map(String::from)
      .unwrap_or_else(|| body.to_string()),
    Value::Null => "no details".to_string(),
    other => other.to_string(),
  }
}
