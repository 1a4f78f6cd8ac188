//! Typed read/write operations per domain.
//!
//! Each domain module declares its reads (with the tags they provide and a
//! retention tier) and writes (with the tags they invalidate), and exposes a
//! small facade over the shared [`ApiClient`].

mod client;
pub mod contact;
pub mod payment;
pub mod payment_method;
mod registry;
mod types;
pub mod wallet;

pub use client::ApiClient;
pub use registry::{Domain, MutationDef, QueryDef, Registry, RegistryBuilder, RegistryError};
pub use types::*;
