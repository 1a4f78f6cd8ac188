//! Result types handed back to readers.

use chrono::{DateTime, Utc};

/// Data from a cached read, with where it came from.
#[derive(Debug, Clone)]
pub struct CacheResult<T> {
  /// The actual data
  pub data: T,
  /// Where the data came from
  pub source: CacheSource,
  /// When the data was fetched from the backend
  pub fetched_at: Option<DateTime<Utc>>,
}

impl<T> CacheResult<T> {
  pub fn new(data: T, source: CacheSource, fetched_at: Option<DateTime<Utc>>) -> Self {
    Self {
      data,
      source,
      fetched_at,
    }
  }

  /// Convert the payload, keeping provenance.
  pub fn try_map<U, E>(self, f: impl FnOnce(T) -> Result<U, E>) -> Result<CacheResult<U>, E> {
    Ok(CacheResult {
      data: f(self.data)?,
      source: self.source,
      fetched_at: self.fetched_at,
    })
  }

  pub fn is_cached(&self) -> bool {
    self.source == CacheSource::Cache
  }
}

/// Indicates where a result came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheSource {
  /// Fetched from the backend for this subscription
  Network,
  /// Served from an entry that was already fresh
  Cache,
}
