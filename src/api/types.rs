//! Request and response payloads.
//!
//! Shapes are owned by the backend; these types only carry what callers read.
//! Unknown fields are ignored so backend additions don't break decoding.

use serde::{Deserialize, Serialize};

/// A user's wallet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Wallet {
  pub id: String,
  pub name: String,
  pub balance: f64,
  pub currency: String,
  #[serde(default)]
  pub is_default: bool,
}

/// Balance of one wallet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletBalance {
  #[serde(default)]
  pub wallet_id: Option<String>,
  pub balance: f64,
  pub currency: String,
}

/// Ledger entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
  pub id: String,
  #[serde(rename = "type")]
  pub kind: String, // "topup", "transfer", "payment", ...
  pub amount: f64,
  #[serde(default)]
  pub currency: Option<String>,
  pub status: String,
  #[serde(default)]
  pub description: Option<String>,
  pub created_at: String,
}

/// One page of transaction history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionPage {
  pub transactions: Vec<Transaction>,
  #[serde(default)]
  pub total: u64,
  #[serde(default)]
  pub page: u32,
}

/// Filters for transaction history
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryQuery {
  pub page: u32,
  pub limit: u32,
  #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
  pub kind: Option<String>,
}

impl Default for HistoryQuery {
  fn default() -> Self {
    Self {
      page: 1,
      limit: 20,
      kind: None,
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateWalletRequest {
  pub name: String,
  pub currency: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopUpRequest {
  pub wallet_id: String,
  pub amount: f64,
  pub payment_method_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferRequest {
  pub from_wallet_id: String,
  pub to_wallet_id: String,
  pub amount: f64,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub note: Option<String>,
}

/// Payment record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
  pub id: String,
  pub amount: f64,
  #[serde(default)]
  pub currency: Option<String>,
  pub status: PaymentState,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePaymentRequest {
  pub wallet_id: String,
  pub amount: f64,
  pub recipient: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub description: Option<String>,
}

/// Lifecycle of a payment as reported by the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentState {
  Pending,
  Processing,
  Completed,
  Failed,
  Cancelled,
  #[serde(other)]
  Unknown,
}

impl PaymentState {
  /// No further transitions are expected.
  pub fn is_terminal(self) -> bool {
    matches!(
      self,
      PaymentState::Completed | PaymentState::Failed | PaymentState::Cancelled
    )
  }
}

/// Polled payment status
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentStatus {
  #[serde(default)]
  pub payment_id: Option<String>,
  pub status: PaymentState,
  #[serde(default)]
  pub message: Option<String>,
}

/// Saved card or bank account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentMethod {
  pub id: String,
  #[serde(rename = "type")]
  pub kind: String,
  #[serde(default)]
  pub label: Option<String>,
  #[serde(default)]
  pub last4: Option<String>,
  #[serde(default)]
  pub is_default: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contact {
  pub id: String,
  pub name: String,
  #[serde(default)]
  pub email: Option<String>,
  #[serde(default)]
  pub phone: Option<String>,
  #[serde(default)]
  pub wallet_id: Option<String>,
}

/// Fields for creating or updating a contact
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactInput {
  pub name: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub email: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub phone: Option<String>,
}
