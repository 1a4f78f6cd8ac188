use async_trait::async_trait;
use color_eyre::{eyre::eyre, Result};
use reqwest::cookie::Jar;
use serde_json::Value;
use std::sync::Arc;
use url::Url;

use super::{Method, Request, Transport, TransportError};
use crate::config::ApiConfig;

/// reqwest-backed transport.
///
/// The session credential is a cookie kept in the client's jar, so it is
/// attached to every call and replaced whenever the refresh endpoint sets a
/// new one.
#[derive(Clone)]
pub struct HttpTransport {
  client: reqwest::Client,
  base_url: Url,
}

impl HttpTransport {
  pub fn new(config: &ApiConfig) -> Result<Self> {
    let base_url = normalize_base(&config.base_url)?;

    let jar = Arc::new(Jar::default());
    if let Some(cookie) = &config.session_cookie {
      jar.add_cookie_str(cookie, &base_url);
    }

    let client = reqwest::Client::builder()
      .cookie_provider(jar)
      .build()
      .map_err(|e| eyre!("Failed to create HTTP client: {}", e))?;

    Ok(Self { client, base_url })
  }

  fn url_for(&self, path: &str) -> Result<Url, TransportError> {
    self
      .base_url
      .join(path.trim_start_matches('/'))
      .map_err(|e| TransportError::Network(format!("invalid path {}: {}", path, e)))
  }

  async fn send(&self, request: &Request) -> Result<Value, TransportError> {
    let url = self.url_for(&request.path)?;

    let mut builder = self.client.request(to_reqwest(request.method), url);
    if !request.query.is_empty() {
      builder = builder.query(&request.query);
    }
    if let Some(body) = &request.body {
      builder = builder.json(body);
    }

    let response = builder
      .send()
      .await
      .map_err(|e| TransportError::Network(e.to_string()))?;
    let status = response.status();
    let bytes = response
      .bytes()
      .await
      .map_err(|e| TransportError::Network(e.to_string()))?;

    if status.is_success() {
      if bytes.is_empty() {
        return Ok(Value::Null);
      }
      return serde_json::from_slice(&bytes).map_err(|e| TransportError::Decode(e.to_string()));
    }

    // Error bodies are best-effort: keep raw text when it isn't JSON.
    let body = serde_json::from_slice(&bytes)
      .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()));
    Err(TransportError::Status {
      status: status.as_u16(),
      body,
    })
  }
}

#[async_trait]
impl Transport for HttpTransport {
  async fn execute(&self, request: &Request) -> Result<Value, TransportError> {
    tracing::debug!(method = %request.method, path = %request.path, "sending request");

    // Dropping the send future on deadline aborts the in-flight call.
    let result = match tokio::time::timeout(request.timeout, self.send(request)).await {
      Ok(result) => result,
      Err(_) => Err(TransportError::Timeout(request.timeout)),
    };

    if let Err(e) = &result {
      tracing::debug!(path = %request.path, error = %e, "request failed");
    }
    result
  }
}

fn to_reqwest(method: Method) -> reqwest::Method {
  match method {
    Method::Get => reqwest::Method::GET,
    Method::Post => reqwest::Method::POST,
    Method::Put => reqwest::Method::PUT,
    Method::Patch => reqwest::Method::PATCH,
    Method::Delete => reqwest::Method::DELETE,
  }
}

/// Parse the base URL so relative joins keep its path prefix.
fn normalize_base(raw: &str) -> Result<Url> {
  let mut raw = raw.trim().to_string();
  if !raw.ends_with('/') {
    raw.push('/');
  }
  Url::parse(&raw).map_err(|e| eyre!("Invalid base URL {}: {}", raw, e))
}
