use serde_json::Value;
use std::sync::Arc;

use super::coordinator::RefreshCoordinator;
use crate::error::ApiError;
use crate::transport::{Request, Transport};

/// Transport wrapper that renews an expired session and retries once.
#[derive(Clone)]
pub struct ReauthGuard {
  transport: Arc<dyn Transport>,
  coordinator: RefreshCoordinator,
  /// The credential-refresh call. Issued raw, never through the guard.
  refresh: Request,
}

impl ReauthGuard {
  pub fn new(
    transport: Arc<dyn Transport>,
    coordinator: RefreshCoordinator,
    refresh: Request,
  ) -> Self {
    Self {
      transport,
      coordinator,
      refresh,
    }
  }

  pub fn coordinator(&self) -> &RefreshCoordinator {
    &self.coordinator
  }

  /// Execute `request`, renewing the session at most once on a 401.
  ///
  /// 1. Wait until no renewal is running
  /// 2. Send the request; anything but a 401 is returned as-is
  /// 3. Join (or start) the single renewal for this wave of failures
  /// 4. Renewal failed: `AuthExpired`, no retry
  /// 5. Renewal succeeded: retry once; a second 401 is `AuthExpired`
  pub async fn execute(&self, request: &Request) -> Result<Value, ApiError> {
    let seen = self.coordinator.wait_idle().await;

    match self.transport.execute(request).await {
      Err(e) if e.is_auth_expired() => {}
      other => return other.map_err(ApiError::from),
    }

    tracing::debug!(path = %request.path, generation = seen, "session rejected");

    let transport = Arc::clone(&self.transport);
    let refresh = self.refresh.clone();
    let renewed = self
      .coordinator
      .renew_once(seen, move || async move {
        tracing::info!(path = %refresh.path, "renewing session");
        match transport.execute(&refresh).await {
          Ok(_) => {
            tracing::info!("session renewed");
            true
          }
          Err(e) => {
            tracing::warn!(error = %e, "session renewal failed");
            false
          }
        }
      })
      .await;

    if !renewed {
      return Err(ApiError::AuthExpired);
    }

    self.coordinator.wait_idle().await;
    match self.transport.execute(request).await {
      Err(e) if e.is_auth_expired() => {
        tracing::warn!(path = %request.path, "request rejected again after renewal");
        Err(ApiError::AuthExpired)
      }
      other => other.map_err(ApiError::from),
    }
  }
}
