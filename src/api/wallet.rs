//! Wallet and transaction-history operations.

use serde_json::{json, Value};

use super::client::ApiClient;
use super::registry::{Domain, MutationDef, QueryDef};
use super::types::{
  CreateWalletRequest, HistoryQuery, TopUpRequest, Transaction, TransactionPage, TransferRequest,
  Wallet, WalletBalance,
};
use crate::cache::{CacheResult, Retention, Subscription, Tag};
use crate::error::ApiError;
use crate::transport::Method;

/// Money movement touches balances, history, and payment-method usage.
const MONEY_MOVEMENT: &[Tag] = &[Tag::Wallet, Tag::Transaction, Tag::PaymentMethod];

pub const USER: QueryDef = QueryDef {
  id: "wallet.user",
  provides: &[Tag::Wallet],
  retention: Retention::SemiStable,
};

pub const BALANCE: QueryDef = QueryDef {
  id: "wallet.balance",
  provides: &[Tag::Wallet],
  retention: Retention::SemiStable,
};

pub const HISTORY: QueryDef = QueryDef {
  id: "wallet.history",
  provides: &[Tag::Transaction],
  retention: Retention::Frequent,
};

pub const RECENT: QueryDef = QueryDef {
  id: "wallet.recent",
  provides: &[Tag::Transaction],
  retention: Retention::Frequent,
};

pub const CREATE: MutationDef = MutationDef {
  id: "wallet.create",
  method: Method::Post,
  invalidates: MONEY_MOVEMENT,
};

pub const RENAME: MutationDef = MutationDef {
  id: "wallet.rename",
  method: Method::Patch,
  invalidates: MONEY_MOVEMENT,
};

pub const TOP_UP: MutationDef = MutationDef {
  id: "wallet.top_up",
  method: Method::Post,
  invalidates: MONEY_MOVEMENT,
};

pub const TRANSFER: MutationDef = MutationDef {
  id: "wallet.transfer",
  method: Method::Post,
  invalidates: MONEY_MOVEMENT,
};

pub const DOMAIN: Domain = Domain {
  name: "wallet",
  queries: &[USER, BALANCE, HISTORY, RECENT],
  mutations: &[CREATE, RENAME, TOP_UP, TRANSFER],
};

/// Wallet operations over a shared [`ApiClient`].
pub struct WalletApi<'a> {
  client: &'a ApiClient,
}

impl<'a> WalletApi<'a> {
  pub(crate) fn new(client: &'a ApiClient) -> Self {
    Self { client }
  }

  /// Wallets of the signed-in user
  pub async fn user_wallets(&self) -> Result<CacheResult<Vec<Wallet>>, ApiError> {
    let request = self.client.request(Method::Get, "/wallet/user");
    self.client.read(USER.id, Value::Null, request).await
  }

  pub async fn balance(&self, wallet_id: &str) -> Result<CacheResult<WalletBalance>, ApiError> {
    let (args, request) = self.balance_call(wallet_id);
    self.client.read(BALANCE.id, args, request).await
  }

  /// Keep a balance subscribed so it refreshes whenever wallets change.
  pub fn watch_balance(&self, wallet_id: &str) -> Result<Subscription, ApiError> {
    let (args, request) = self.balance_call(wallet_id);
    self.client.watch(BALANCE.id, args, request)
  }

  fn balance_call(&self, wallet_id: &str) -> (Value, crate::transport::Request) {
    (
      json!({ "id": wallet_id }),
      self
        .client
        .request(Method::Get, format!("/wallet/{}/balance", wallet_id)),
    )
  }

  pub async fn history(&self, query: &HistoryQuery) -> Result<CacheResult<TransactionPage>, ApiError> {
    let mut request = self
      .client
      .request(Method::Get, "/wallet/history")
      .with_query("page", query.page)
      .with_query("limit", query.limit);
    if let Some(kind) = &query.kind {
      request = request.with_query("type", kind);
    }
    self.client.read(HISTORY.id, json!(query), request).await
  }

  pub async fn recent_transactions(&self, limit: u32) -> Result<CacheResult<Vec<Transaction>>, ApiError> {
    let request = self
      .client
      .request(Method::Get, "/wallet/transactions/recent")
      .with_query("limit", limit);
    self
      .client
      .read(RECENT.id, json!({ "limit": limit }), request)
      .await
  }

  pub async fn create(&self, wallet: &CreateWalletRequest) -> Result<Wallet, ApiError> {
    let request = self
      .client
      .request(CREATE.method, "/wallet")
      .with_body(json!(wallet));
    self.client.write(CREATE.id, request).await
  }

  pub async fn rename(&self, wallet_id: &str, name: &str) -> Result<Wallet, ApiError> {
    let request = self
      .client
      .request(RENAME.method, format!("/wallet/{}/name", wallet_id))
      .with_body(json!({ "name": name }));
    self.client.write(RENAME.id, request).await
  }

  pub async fn top_up(&self, top_up: &TopUpRequest) -> Result<Transaction, ApiError> {
    let request = self
      .client
      .request(TOP_UP.method, "/wallet/topup")
      .with_body(json!(top_up));
    self.client.write(TOP_UP.id, request).await
  }

  pub async fn transfer(&self, transfer: &TransferRequest) -> Result<Transaction, ApiError> {
    let request = self
      .client
      .request(TRANSFER.method, "/wallet/transfer")
      .with_body(json!(transfer));
    self.client.write(TRANSFER.id, request).await
  }
}
