use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fmt;

/// Identity of a cached read: operation id plus its serialized arguments.
///
/// Arguments are held as canonical JSON text. `serde_json` objects keep their
/// keys sorted, so two argument values that compare equal produce the same key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryKey {
  operation: &'static str,
  args: String,
}

impl QueryKey {
  pub fn new(operation: &'static str, args: &Value) -> Self {
    Self {
      operation,
      args: args.to_string(),
    }
  }

  /// Key for an operation that takes no arguments.
  pub fn bare(operation: &'static str) -> Self {
    Self::new(operation, &Value::Null)
  }

  pub fn operation(&self) -> &'static str {
    self.operation
  }

  pub fn args(&self) -> &str {
    &self.args
  }

  /// Short stable digest, used in logs instead of raw arguments.
  pub fn fingerprint(&self) -> String {
    let mut hasher = Sha256::new();
    hasher.update(self.operation.as_bytes());
    hasher.update(b":");
    hasher.update(self.args.as_bytes());
    let digest = hasher.finalize();
    hex::encode(&digest[..6])
  }
}

impl fmt::Display for QueryKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}#{}", self.operation, self.fingerprint())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn test_key_ignores_field_order() {
    let a = QueryKey::new("wallet.history", &json!({"page": 1, "limit": 20}));
    let b = QueryKey::new("wallet.history", &json!({"limit": 20, "page": 1}));
    assert_eq!(a, b);
    assert_eq!(a.fingerprint(), b.fingerprint());
  }

  #[test]
  fn test_distinct_args_and_operations() {
    let a = QueryKey::new("wallet.balance", &json!({"id": "w1"}));
    let b = QueryKey::new("wallet.balance", &json!({"id": "w2"}));
    let c = QueryKey::new("payment.status", &json!({"id": "w1"}));
    assert_ne!(a, b);
    assert_ne!(a, c);
    assert_eq!(a.fingerprint().len(), 12);
  }

  #[test]
  fn test_bare_key() {
    let k = QueryKey::bare("payment_method.list");
    assert_eq!(k.operation(), "payment_method.list");
    assert_eq!(k.args(), "null");
    assert!(k.to_string().starts_with("payment_method.list#"));
  }
}
