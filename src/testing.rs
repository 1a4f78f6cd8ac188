//! Scripted transport for tests.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::api::{ApiClient, Registry};
use crate::config::ApiConfig;
use crate::transport::{Method, Request, Transport, TransportError, AUTH_EXPIRED_STATUS};

pub const REFRESH_PATH: &str = "/auth/refresh";

type Handler = Box<dyn Fn(&Request) -> Result<Value, TransportError> + Send + Sync>;

#[derive(Default)]
struct FakeState {
  routes: HashMap<(Method, String), Handler>,
  calls: Vec<Request>,
  session_valid: bool,
  refresh_fails: bool,
  keep_rejecting: bool,
  latency: Duration,
}

/// In-memory backend that answers from registered routes.
///
/// Unknown routes answer 404. While the session is expired every call except
/// the refresh endpoint answers 401; a successful refresh revalidates it.
pub struct FakeTransport {
  state: Mutex<FakeState>,
}

impl FakeTransport {
  pub fn new() -> Arc<Self> {
    Arc::new(Self {
      state: Mutex::new(FakeState {
        session_valid: true,
        ..Default::default()
      }),
    })
  }

  pub fn respond(&self, method: Method, path: &str, value: Value) {
    self.respond_with(method, path, move |_| Ok(value.clone()));
  }

  pub fn fail(&self, method: Method, path: &str, error: TransportError) {
    self.respond_with(method, path, move |_| Err(error.clone()));
  }

  pub fn respond_with<F>(&self, method: Method, path: &str, handler: F)
  where
    F: Fn(&Request) -> Result<Value, TransportError> + Send + Sync + 'static,
  {
    self
      .state
      .lock()
      .unwrap()
      .routes
      .insert((method, path.to_string()), Box::new(handler));
  }

  pub fn expire_session(&self) {
    self.state.lock().unwrap().session_valid = false;
  }

  pub fn fail_refresh(&self) {
    self.state.lock().unwrap().refresh_fails = true;
  }

  /// Refresh answers 200 but the session stays rejected.
  pub fn keep_rejecting(&self) {
    self.state.lock().unwrap().keep_rejecting = true;
  }

  pub fn set_latency(&self, latency: Duration) {
    self.state.lock().unwrap().latency = latency;
  }

  /// Number of calls made to `path`, any method.
  pub fn calls(&self, path: &str) -> usize {
    self
      .state
      .lock()
      .unwrap()
      .calls
      .iter()
      .filter(|r| r.path == path)
      .count()
  }

  pub fn requests(&self) -> Vec<Request> {
    self.state.lock().unwrap().calls.clone()
  }
}

#[async_trait]
impl Transport for FakeTransport {
  async fn execute(&self, request: &Request) -> Result<Value, TransportError> {
    let (latency, result) = {
      let mut state = self.state.lock().unwrap();
      state.calls.push(request.clone());

      let result = if request.path == REFRESH_PATH {
        if state.refresh_fails {
          Err(unauthorized())
        } else {
          if !state.keep_rejecting {
            state.session_valid = true;
          }
          Ok(Value::Null)
        }
      } else if !state.session_valid {
        Err(unauthorized())
      } else {
        match state.routes.get(&(request.method, request.path.clone())) {
          Some(handler) => handler(request),
          None => Err(TransportError::Status {
            status: 404,
            body: json!({"message": "not found"}),
          }),
        }
      };
      (state.latency, result)
    };

    if !latency.is_zero() {
      tokio::time::sleep(latency).await;
    }
    result
  }
}

fn unauthorized() -> TransportError {
  TransportError::Status {
    status: AUTH_EXPIRED_STATUS,
    body: json!({"message": "session expired"}),
  }
}

/// Client over `fake` with every domain registered.
pub fn client(fake: &Arc<FakeTransport>) -> ApiClient {
  ApiClient::new(
    fake.clone(),
    Registry::standard().unwrap(),
    &ApiConfig::for_base_url("http://backend.test"),
  )
}
