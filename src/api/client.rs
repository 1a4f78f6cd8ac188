//! Shared client behind every domain facade.

use color_eyre::{eyre::eyre, Result};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

use super::registry::Registry;
use super::{contact, payment, payment_method, wallet};
use crate::auth::{ReauthGuard, RefreshCoordinator};
use crate::cache::{CacheResult, CacheStore, QueryKey, Subscription};
use crate::config::ApiConfig;
use crate::error::ApiError;
use crate::transport::{HttpTransport, Method, Request, Transport};

/// Wallet API client with session renewal and tag-invalidated caching.
///
/// One instance owns one guard, one cache store, and one registry; clones
/// share all three, so every domain sees the same cache and a write in one
/// domain invalidates reads of another.
#[derive(Clone)]
pub struct ApiClient {
  guard: ReauthGuard,
  cache: CacheStore,
  registry: Arc<Registry>,
  timeout: Duration,
}

impl ApiClient {
  pub fn new(transport: Arc<dyn Transport>, registry: Registry, config: &ApiConfig) -> Self {
    let timeout = config.timeout();
    let refresh = Request::new(Method::Post, config.refresh_path.clone(), timeout);
    Self {
      guard: ReauthGuard::new(transport, RefreshCoordinator::new(), refresh),
      cache: CacheStore::new(),
      registry: Arc::new(registry),
      timeout,
    }
  }

  /// Client over HTTP with every shipped domain registered.
  pub fn from_config(config: &ApiConfig) -> Result<Self> {
    let transport = HttpTransport::new(config)?;
    let registry = Registry::standard().map_err(|e| eyre!("Invalid operation registry: {}", e))?;
    Ok(Self::new(Arc::new(transport), registry, config))
  }

  pub fn cache(&self) -> &CacheStore {
    &self.cache
  }

  pub fn registry(&self) -> &Registry {
    &self.registry
  }

  pub fn coordinator(&self) -> &RefreshCoordinator {
    self.guard.coordinator()
  }

  pub fn wallets(&self) -> wallet::WalletApi<'_> {
    wallet::WalletApi::new(self)
  }

  pub fn payments(&self) -> payment::PaymentApi<'_> {
    payment::PaymentApi::new(self)
  }

  pub fn payment_methods(&self) -> payment_method::PaymentMethodApi<'_> {
    payment_method::PaymentMethodApi::new(self)
  }

  pub fn contacts(&self) -> contact::ContactApi<'_> {
    contact::ContactApi::new(self)
  }

  /// Build a request with the configured deadline.
  pub fn request(&self, method: Method, path: impl Into<String>) -> Request {
    Request::new(method, path, self.timeout)
  }

  /// Subscribe to a registered read. The subscription stays live, and is
  /// refetched on invalidation, until dropped.
  pub fn watch(&self, operation: &'static str, args: Value, request: Request) -> Result<Subscription, ApiError> {
    let def = self
      .registry
      .query(operation)
      .ok_or(ApiError::UnknownOperation(operation))?;

    let guard = self.guard.clone();
    let fetcher = move || {
      let guard = guard.clone();
      let request = request.clone();
      async move { guard.execute(&request).await }
    };

    Ok(self.cache.subscribe(
      QueryKey::new(def.id, &args),
      def.provides,
      def.retention.duration(),
      fetcher,
    ))
  }

  /// One-shot read: subscribe, wait for the result, unsubscribe.
  ///
  /// The entry stays cached for its retention window after this returns.
  pub async fn read<T: DeserializeOwned>(
    &self,
    operation: &'static str,
    args: Value,
    request: Request,
  ) -> Result<CacheResult<T>, ApiError> {
    let mut subscription = self.watch(operation, args, request)?;
    let result = subscription.settled().await?;
    drop(subscription);
    result.try_map(|value| decode(operation, value))
  }

  /// Run a registered write. On success its tags are invalidated before
  /// this returns; on failure nothing is invalidated.
  pub async fn write<T: DeserializeOwned>(
    &self,
    operation: &'static str,
    request: Request,
  ) -> Result<T, ApiError> {
    let def = self
      .registry
      .mutation(operation)
      .ok_or(ApiError::UnknownOperation(operation))?;

    let value = self.guard.execute(&request).await?;
    let marked = self.cache.invalidate(def.invalidates);
    tracing::info!(
      operation,
      tags = ?def.invalidates,
      marked,
      "write committed"
    );

    decode(operation, value)
  }
}

pub(crate) fn decode<T: DeserializeOwned>(operation: &'static str, value: Value) -> Result<T, ApiError> {
  serde_json::from_value(value).map_err(|e| ApiError::Decode {
    operation,
    message: e.to_string(),
  })
}
