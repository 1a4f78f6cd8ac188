//! Saved payment methods.

use serde_json::Value;

use super::client::ApiClient;
use super::registry::{Domain, MutationDef, QueryDef};
use super::types::PaymentMethod;
use crate::cache::{CacheResult, Retention, Tag};
use crate::error::ApiError;
use crate::transport::Method;

pub const LIST: QueryDef = QueryDef {
  id: "payment_method.list",
  provides: &[Tag::PaymentMethod],
  retention: Retention::Stable,
};

pub const DELETE: MutationDef = MutationDef {
  id: "payment_method.delete",
  method: Method::Delete,
  invalidates: &[Tag::PaymentMethod],
};

pub const DOMAIN: Domain = Domain {
  name: "payment_method",
  queries: &[LIST],
  mutations: &[DELETE],
};

pub struct PaymentMethodApi<'a> {
  client: &'a ApiClient,
}

impl<'a> PaymentMethodApi<'a> {
  pub(crate) fn new(client: &'a ApiClient) -> Self {
    Self { client }
  }

  pub async fn list(&self) -> Result<CacheResult<Vec<PaymentMethod>>, ApiError> {
    let request = self.client.request(Method::Get, "/payment-methods");
    self.client.read(LIST.id, Value::Null, request).await
  }

  pub async fn delete(&self, method_id: &str) -> Result<(), ApiError> {
    let request = self
      .client
      .request(DELETE.method, format!("/payment-methods/{}", method_id));
    let _: Value = self.client.write(DELETE.id, request).await?;
    tracing::debug!(method_id, "payment method removed");
    Ok(())
  }

  /// Payment method marked default by the backend, if any.
  pub async fn default_method(&self) -> Result<Option<PaymentMethod>, ApiError> {
    let methods = self.list().await?;
    Ok(methods.data.into_iter().find(|m| m.is_default))
  }
}
