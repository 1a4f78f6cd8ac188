//! Operation definitions and the tag graph they form.

use std::collections::HashMap;

use crate::cache::{Retention, Tag};
use crate::transport::Method;

/// A cached read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryDef {
  pub id: &'static str,
  pub provides: &'static [Tag],
  pub retention: Retention,
}

/// A write that invalidates cached reads when it succeeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MutationDef {
  pub id: &'static str,
  pub method: Method,
  pub invalidates: &'static [Tag],
}

/// Operations contributed by one domain module.
#[derive(Debug, Clone, Copy)]
pub struct Domain {
  pub name: &'static str,
  pub queries: &'static [QueryDef],
  pub mutations: &'static [MutationDef],
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
  #[error("operation {id} registered twice (second time by domain {domain})")]
  Duplicate {
    id: &'static str,
    domain: &'static str,
  },
}

/// Every operation known to one client, fixed once built.
///
/// Domains register independently; they share a single tag namespace, so a
/// write in one domain can invalidate reads declared by another.
#[derive(Debug, Default)]
pub struct Registry {
  queries: HashMap<&'static str, QueryDef>,
  mutations: HashMap<&'static str, MutationDef>,
  domains: Vec<&'static str>,
}

impl Registry {
  pub fn builder() -> RegistryBuilder {
    RegistryBuilder::default()
  }

  /// Registry with every domain this crate ships.
  pub fn standard() -> Result<Self, RegistryError> {
    Self::builder()
      .domain(super::wallet::DOMAIN)
      .domain(super::payment::DOMAIN)
      .domain(super::payment_method::DOMAIN)
      .domain(super::contact::DOMAIN)
      .build()
  }

  pub fn query(&self, id: &str) -> Option<&QueryDef> {
    self.queries.get(id)
  }

  pub fn mutation(&self, id: &str) -> Option<&MutationDef> {
    self.mutations.get(id)
  }

  pub fn domains(&self) -> &[&'static str] {
    &self.domains
  }

  /// Tags a read provides; empty for unknown ids.
  pub fn provides(&self, id: &str) -> &'static [Tag] {
    self.queries.get(id).map(|q| q.provides).unwrap_or(&[])
  }

  /// Tags a write invalidates; empty for unknown ids.
  pub fn invalidates(&self, id: &str) -> &'static [Tag] {
    self.mutations.get(id).map(|m| m.invalidates).unwrap_or(&[])
  }

  /// Reads that provide `tag`, sorted by id.
  pub fn readers_of(&self, tag: Tag) -> Vec<&'static str> {
    let mut ids: Vec<_> = self
      .queries
      .values()
      .filter(|q| q.provides.contains(&tag))
      .map(|q| q.id)
      .collect();
    ids.sort_unstable();
    ids
  }

  /// Reads a successful `mutation` will mark stale, sorted by id.
  pub fn affected_reads(&self, mutation: &str) -> Vec<&'static str> {
    let tags = self.invalidates(mutation);
    let mut ids: Vec<_> = self
      .queries
      .values()
      .filter(|q| q.provides.iter().any(|t| tags.contains(t)))
      .map(|q| q.id)
      .collect();
    ids.sort_unstable();
    ids
  }
}

#[derive(Debug, Default)]
pub struct RegistryBuilder {
  domains: Vec<Domain>,
}

impl RegistryBuilder {
  pub fn domain(mut self, domain: Domain) -> Self {
    self.domains.push(domain);
    self
  }

  pub fn build(self) -> Result<Registry, RegistryError> {
    let mut registry = Registry::default();

    for domain in self.domains {
      for query in domain.queries {
        if registry.queries.contains_key(query.id) || registry.mutations.contains_key(query.id) {
          return Err(RegistryError::Duplicate {
            id: query.id,
            domain: domain.name,
          });
        }
        registry.queries.insert(query.id, *query);
      }
      for mutation in domain.mutations {
        if registry.queries.contains_key(mutation.id)
          || registry.mutations.contains_key(mutation.id)
        {
          return Err(RegistryError::Duplicate {
            id: mutation.id,
            domain: domain.name,
          });
        }
        registry.mutations.insert(mutation.id, *mutation);
      }
      registry.domains.push(domain.name);
    }

    tracing::debug!(
      domains = ?registry.domains,
      queries = registry.queries.len(),
      mutations = registry.mutations.len(),
      "registry built"
    );
    Ok(registry)
  }
}
