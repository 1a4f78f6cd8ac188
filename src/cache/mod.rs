//! Tag-invalidated query cache.
//!
//! This module provides the shared store behind every domain registry:
//! - One entry per query key, with subscriber counting
//! - In-flight fetch sharing between concurrent subscribers
//! - Retention windows before unsubscribed entries are evicted
//! - Staleness marking along declared tags when writes commit

mod entry;
mod key;
mod store;
mod tags;
mod traits;

pub use entry::{CacheStatus, EntrySnapshot, Retention};
pub use key::QueryKey;
pub use store::{CacheStore, Subscription};
pub use tags::Tag;
pub use traits::{CacheResult, CacheSource};
