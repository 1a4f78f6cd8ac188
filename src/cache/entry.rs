use chrono::{DateTime, Utc};
use serde_json::Value;
use std::time::Duration;

use crate::error::ApiError;

/// How long an entry survives with no subscribers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Retention {
  /// Rarely changing data (payment methods).
  Stable,
  /// Wallet lists and balances.
  SemiStable,
  /// Frequently mutated data (transactions, recent activity).
  #[default]
  Frequent,
}

impl Retention {
  pub fn duration(self) -> Duration {
    match self {
      Retention::Stable => Duration::from_secs(600),
      Retention::SemiStable => Duration::from_secs(300),
      Retention::Frequent => Duration::from_secs(60),
    }
  }
}

/// Lifecycle of a cache entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
  Uninitialized,
  Fetching,
  Fresh,
  Stale,
  Evicted,
}

/// What subscribers of an entry observe.
#[derive(Debug, Clone)]
pub struct EntrySnapshot {
  pub status: CacheStatus,
  /// Last successfully fetched value, kept across STALE and failed refetches.
  pub value: Option<Value>,
  /// Failure of the most recent fetch, cleared when a new fetch starts.
  pub error: Option<ApiError>,
  pub fetched_at: Option<DateTime<Utc>>,
}

impl EntrySnapshot {
  pub(crate) fn uninitialized() -> Self {
    Self {
      status: CacheStatus::Uninitialized,
      value: None,
      error: None,
      fetched_at: None,
    }
  }

  /// A fetch outcome is available: fresh data or a failed attempt.
  pub fn is_settled(&self) -> bool {
    match self.status {
      CacheStatus::Fresh => true,
      CacheStatus::Fetching => false,
      _ => self.error.is_some(),
    }
  }
}
