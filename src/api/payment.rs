//! Payment operations.

use serde_json::json;
use std::time::Duration;

use super::client::{decode, ApiClient};
use super::registry::{Domain, MutationDef, QueryDef};
use super::types::{CreatePaymentRequest, Payment, PaymentStatus};
use crate::cache::{CacheResult, Retention, Tag};
use crate::error::ApiError;
use crate::transport::Method;

const MONEY_MOVEMENT: &[Tag] = &[Tag::Wallet, Tag::Transaction, Tag::PaymentMethod];

/// Status is poll-only: it provides no tags, so no write refreshes it.
pub const STATUS: QueryDef = QueryDef {
  id: "payment.status",
  provides: &[],
  retention: Retention::Frequent,
};

pub const CREATE: MutationDef = MutationDef {
  id: "payment.create",
  method: Method::Post,
  invalidates: MONEY_MOVEMENT,
};

pub const PROCESS: MutationDef = MutationDef {
  id: "payment.process",
  method: Method::Post,
  invalidates: MONEY_MOVEMENT,
};

pub const DOMAIN: Domain = Domain {
  name: "payment",
  queries: &[STATUS],
  mutations: &[CREATE, PROCESS],
};

pub struct PaymentApi<'a> {
  client: &'a ApiClient,
}

impl<'a> PaymentApi<'a> {
  pub(crate) fn new(client: &'a ApiClient) -> Self {
    Self { client }
  }

  pub async fn create(&self, payment: &CreatePaymentRequest) -> Result<Payment, ApiError> {
    let request = self
      .client
      .request(CREATE.method, "/payment")
      .with_body(json!(payment));
    self.client.write(CREATE.id, request).await
  }

  pub async fn process(&self, payment_id: &str) -> Result<Payment, ApiError> {
    let request = self
      .client
      .request(PROCESS.method, format!("/payment/{}/process", payment_id));
    self.client.write(PROCESS.id, request).await
  }

  pub async fn status(&self, payment_id: &str) -> Result<CacheResult<PaymentStatus>, ApiError> {
    let request = self
      .client
      .request(Method::Get, format!("/payment/{}/status", payment_id));
    self
      .client
      .read(STATUS.id, json!({ "id": payment_id }), request)
      .await
  }

  /// Poll a payment until it reaches a terminal state.
  ///
  /// Holds one subscription and refetches it every `interval`. Returns the
  /// last status seen, terminal or not, once `max_polls` fetches are used.
  /// At least one fetch always happens, so a budget of 0 behaves like 1.
  pub async fn wait_for_settlement(
    &self,
    payment_id: &str,
    interval: Duration,
    max_polls: usize,
  ) -> Result<PaymentStatus, ApiError> {
    let request = self
      .client
      .request(Method::Get, format!("/payment/{}/status", payment_id));
    let mut subscription = self
      .client
      .watch(STATUS.id, json!({ "id": payment_id }), request)?;

    let mut status: PaymentStatus = decode(STATUS.id, subscription.settled().await?.data)?;
    let max_polls = max_polls.max(1);
    let mut polls = 1;
    while !status.status.is_terminal() && polls < max_polls {
      tokio::time::sleep(interval).await;
      subscription.refetch();
      status = decode(STATUS.id, subscription.settled().await?.data)?;
      polls += 1;
      tracing::debug!(payment_id, polls, state = ?status.status, "polled payment status");
    }

    Ok(status)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::api::types::PaymentState;
  use crate::cache::{CacheStatus, QueryKey};
  use crate::testing::{client, FakeTransport};
  use serde_json::Value;
  use std::sync::atomic::{AtomicUsize, Ordering};
  use std::sync::Arc;

  #[tokio::test(start_paused = true)]
  async fn test_wait_for_settlement_polls_until_terminal() {
    let fake = FakeTransport::new();
    let polls = Arc::new(AtomicUsize::new(0));
    {
      let polls = polls.clone();
      fake.respond_with(Method::Get, "/payment/p1/status", move |_| {
        let n = polls.fetch_add(1, Ordering::SeqCst);
        let state = if n < 2 { "processing" } else { "completed" };
        Ok(json!({ "paymentId": "p1", "status": state }))
      });
    }
    let api = client(&fake);

    let status = api
      .payments()
      .wait_for_settlement("p1", Duration::from_secs(2), 10)
      .await
      .unwrap();
    assert_eq!(status.status, PaymentState::Completed);
    assert_eq!(fake.calls("/payment/p1/status"), 3);
  }

  #[tokio::test(start_paused = true)]
  async fn test_wait_for_settlement_stops_at_poll_budget() {
    let fake = FakeTransport::new();
    fake.respond(
      Method::Get,
      "/payment/p2/status",
      json!({ "status": "pending" }),
    );
    let api = client(&fake);

    let status = api
      .payments()
      .wait_for_settlement("p2", Duration::from_secs(1), 4)
      .await
      .unwrap();
    assert_eq!(status.status, PaymentState::Pending);
    assert_eq!(fake.calls("/payment/p2/status"), 4);
  }

  #[tokio::test(start_paused = true)]
  async fn test_zero_poll_budget_still_fetches_once() {
    let fake = FakeTransport::new();
    fake.respond(
      Method::Get,
      "/payment/p5/status",
      json!({ "status": "processing" }),
    );
    let api = client(&fake);

    let status = api
      .payments()
      .wait_for_settlement("p5", Duration::from_secs(1), 0)
      .await
      .unwrap();
    assert_eq!(status.status, PaymentState::Processing);
    assert_eq!(fake.calls("/payment/p5/status"), 1);
  }

  #[tokio::test]
  async fn test_process_invalidates_money_tags_but_not_status() {
    let fake = FakeTransport::new();
    fake.respond(
      Method::Get,
      "/payment/p3/status",
      json!({ "status": "pending" }),
    );
    fake.respond(Method::Get, "/wallet/user", json!([]));
    fake.respond(
      Method::Post,
      "/payment/p3/process",
      json!({ "id": "p3", "amount": 12.5, "status": "processing" }),
    );
    let api = client(&fake);

    api.payments().status("p3").await.unwrap();
    api.wallets().user_wallets().await.unwrap();

    let payment = api.payments().process("p3").await.unwrap();
    assert_eq!(payment.status, PaymentState::Processing);

    let status_key = QueryKey::new(STATUS.id, &json!({ "id": "p3" }));
    assert_eq!(api.cache().status(&status_key), Some(CacheStatus::Fresh));
    assert_eq!(
      api.cache().status(&QueryKey::bare(crate::api::wallet::USER.id)),
      Some(CacheStatus::Stale)
    );
  }

  #[tokio::test]
  async fn test_create_posts_body() {
    let fake = FakeTransport::new();
    fake.respond(
      Method::Post,
      "/payment",
      json!({ "id": "p4", "amount": 3.0, "status": "pending" }),
    );
    let api = client(&fake);

    api
      .payments()
      .create(&CreatePaymentRequest {
        wallet_id: "w1".into(),
        amount: 3.0,
        recipient: "merchant-9".into(),
        description: None,
      })
      .await
      .unwrap();

    let body = fake.requests()[0].body.clone().unwrap_or(Value::Null);
    assert_eq!(
      body,
      json!({ "walletId": "w1", "amount": 3.0, "recipient": "merchant-9" })
    );
  }
}
