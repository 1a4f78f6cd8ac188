//! Session renewal around the transport.
//!
//! When the backend rejects the session, every concurrent caller funnels into
//! one renewal call; each then retries its own request at most once.

mod coordinator;
mod guard;

pub use coordinator::{RefreshCoordinator, RefreshPhase};
pub use guard::ReauthGuard;
