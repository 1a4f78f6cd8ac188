//! Client-side data access for the wallet backend.
//!
//! Layers, leaf first:
//! - [`transport`]: one HTTP call with a hard deadline
//! - [`auth`]: single-flight session renewal with one retry per request
//! - [`cache`]: subscribed query results, retention, tag invalidation
//! - [`api`]: per-domain operations sharing one client, cache, and tag graph

pub mod api;
pub mod auth;
pub mod cache;
pub mod config;
pub mod error;
pub mod transport;

#[cfg(test)]
mod testing;

pub use api::ApiClient;
pub use error::ApiError;
