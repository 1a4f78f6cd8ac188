//! Saved contacts.

use serde_json::{json, Value};

use super::client::ApiClient;
use super::registry::{Domain, MutationDef, QueryDef};
use super::types::{Contact, ContactInput};
use crate::cache::{CacheResult, Retention, Tag};
use crate::error::ApiError;
use crate::transport::Method;

pub const LIST: QueryDef = QueryDef {
  id: "contact.list",
  provides: &[Tag::Contact],
  retention: Retention::Frequent,
};

pub const GET: QueryDef = QueryDef {
  id: "contact.get",
  provides: &[Tag::Contact],
  retention: Retention::Frequent,
};

pub const CREATE: MutationDef = MutationDef {
  id: "contact.create",
  method: Method::Post,
  invalidates: &[Tag::Contact],
};

pub const UPDATE: MutationDef = MutationDef {
  id: "contact.update",
  method: Method::Put,
  invalidates: &[Tag::Contact],
};

pub const DELETE: MutationDef = MutationDef {
  id: "contact.delete",
  method: Method::Delete,
  invalidates: &[Tag::Contact],
};

pub const DOMAIN: Domain = Domain {
  name: "contact",
  queries: &[LIST, GET],
  mutations: &[CREATE, UPDATE, DELETE],
};

pub struct ContactApi<'a> {
  client: &'a ApiClient,
}

impl<'a> ContactApi<'a> {
  pub(crate) fn new(client: &'a ApiClient) -> Self {
    Self { client }
  }

  pub async fn list(&self) -> Result<CacheResult<Vec<Contact>>, ApiError> {
    let request = self.client.request(Method::Get, "/contacts");
    self.client.read(LIST.id, Value::Null, request).await
  }

  pub async fn get(&self, contact_id: &str) -> Result<CacheResult<Contact>, ApiError> {
    let request = self
      .client
      .request(Method::Get, format!("/contacts/{}", contact_id));
    self
      .client
      .read(GET.id, json!({ "id": contact_id }), request)
      .await
  }

  pub async fn create(&self, contact: &ContactInput) -> Result<Contact, ApiError> {
    let request = self
      .client
      .request(CREATE.method, "/contacts")
      .with_body(json!(contact));
    self.client.write(CREATE.id, request).await
  }

  pub async fn update(&self, contact_id: &str, contact: &ContactInput) -> Result<Contact, ApiError> {
    let request = self
      .client
      .request(UPDATE.method, format!("/contacts/{}", contact_id))
      .with_body(json!(contact));
    self.client.write(UPDATE.id, request).await
  }

  pub async fn delete(&self, contact_id: &str) -> Result<(), ApiError> {
    let request = self
      .client
      .request(DELETE.method, format!("/contacts/{}", contact_id));
    let _: Value = self.client.write(DELETE.id, request).await?;
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::{CacheSource, CacheStatus, QueryKey};
  use crate::testing::{client, FakeTransport};

  #[tokio::test]
  async fn test_update_refreshes_list_and_detail() {
    let fake = FakeTransport::new();
    fake.respond(Method::Get, "/contacts", json!([{ "id": "c1", "name": "Ada" }]));
    fake.respond(Method::Get, "/contacts/c1", json!({ "id": "c1", "name": "Ada" }));
    fake.respond(
      Method::Put,
      "/contacts/c1",
      json!({ "id": "c1", "name": "Ada L." }),
    );
    let api = client(&fake);

    api.contacts().list().await.unwrap();
    api.contacts().get("c1").await.unwrap();

    fake.respond(Method::Get, "/contacts", json!([{ "id": "c1", "name": "Ada L." }]));
    fake.respond(Method::Get, "/contacts/c1", json!({ "id": "c1", "name": "Ada L." }));
    let updated = api
      .contacts()
      .update(
        "c1",
        &ContactInput {
          name: "Ada L.".into(),
          ..Default::default()
        },
      )
      .await
      .unwrap();
    assert_eq!(updated.name, "Ada L.");
    assert_eq!(
      fake.requests().last().and_then(|r| r.body.clone()),
      Some(json!({ "name": "Ada L." }))
    );

    let detail = api.contacts().get("c1").await.unwrap();
    assert_eq!(detail.source, CacheSource::Network);
    assert_eq!(detail.data.name, "Ada L.");
    assert_eq!(api.contacts().list().await.unwrap().data[0].name, "Ada L.");
  }

  #[tokio::test]
  async fn test_contact_writes_leave_wallet_cache_alone() {
    let fake = FakeTransport::new();
    fake.respond(Method::Get, "/wallet/user", json!([]));
    fake.respond(Method::Delete, "/contacts/c9", Value::Null);
    let api = client(&fake);

    api.wallets().user_wallets().await.unwrap();
    api.contacts().delete("c9").await.unwrap();

    assert_eq!(
      api.cache().status(&QueryKey::bare(crate::api::wallet::USER.id)),
      Some(CacheStatus::Fresh)
    );
  }

  #[tokio::test]
  async fn test_missing_contact_is_server_error() {
    let fake = FakeTransport::new();
    let api = client(&fake);

    let err = api.contacts().get("ghost").await.unwrap_err();
    assert!(matches!(err, ApiError::Server { status: 404, .. }));
  }
}
