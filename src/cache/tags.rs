//! Closed set of invalidation tags.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Label grouping cached reads that must be invalidated together.
///
/// Reads declare the tags they provide, writes the tags they invalidate.
/// Adding a domain means adding a variant here, so the graph can't drift
/// through a misspelled string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Tag {
  Wallet,
  Transaction,
  PaymentMethod,
  Contact,
}

impl Tag {
  pub const ALL: [Tag; 4] = [Tag::Wallet, Tag::Transaction, Tag::PaymentMethod, Tag::Contact];

  pub fn as_str(self) -> &'static str {
    match self {
      Tag::Wallet => "Wallet",
      Tag::Transaction => "Transaction",
      Tag::PaymentMethod => "PaymentMethod",
      Tag::Contact => "Contact",
    }
  }
}

impl fmt::Display for Tag {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}
