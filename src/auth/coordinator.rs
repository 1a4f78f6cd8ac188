//! Single-flight coordination of session renewal.

use std::future::Future;
use std::sync::Arc;
use tokio::sync::watch;

/// Whether a renewal is currently running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshPhase {
  Idle,
  Refreshing,
}

#[derive(Debug, Clone, Copy)]
struct RefreshState {
  phase: RefreshPhase,
  /// Bumped every time a renewal finishes, successful or not.
  generation: u64,
  /// Outcome of the most recent renewal.
  last_renewed: bool,
}

/// What a caller that just saw an authentication failure should do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Claim {
  /// This caller moved IDLE -> REFRESHING and must start the renewal.
  Owner(u64),
  /// A renewal for this generation is already running.
  Await(u64),
  /// A renewal finished after this caller's request was issued.
  Settled(bool),
}

/// Shared IDLE/REFRESHING state for one client instance.
///
/// Cloning yields another handle to the same state. Callers record the
/// generation they observed before issuing a request ([`wait_idle`]); on an
/// authentication failure they hand it back to [`renew_once`], which starts a
/// renewal only if none has run or is running since that generation. Every
/// caller of the same wave therefore shares one renewal and its outcome.
///
/// [`wait_idle`]: RefreshCoordinator::wait_idle
/// [`renew_once`]: RefreshCoordinator::renew_once
#[derive(Debug, Clone)]
pub struct RefreshCoordinator {
  state: Arc<watch::Sender<RefreshState>>,
}

impl Default for RefreshCoordinator {
  fn default() -> Self {
    Self::new()
  }
}

impl RefreshCoordinator {
  pub fn new() -> Self {
    let (tx, _rx) = watch::channel(RefreshState {
      phase: RefreshPhase::Idle,
      generation: 0,
      last_renewed: true,
    });
    Self {
      state: Arc::new(tx),
    }
  }

  pub fn phase(&self) -> RefreshPhase {
    self.state.borrow().phase
  }

  /// Number of renewals completed so far.
  pub fn generation(&self) -> u64 {
    self.state.borrow().generation
  }

  /// Suspend until no renewal is running and return the generation seen.
  pub async fn wait_idle(&self) -> u64 {
    let mut rx = self.state.subscribe();
    let result = rx
      .wait_for(|s| s.phase == RefreshPhase::Idle)
      .await
      .map(|s| s.generation);
    // The sender lives in `self`, so the channel cannot close under us.
    result.unwrap_or_else(|_| self.generation())
  }

  /// Resolve an authentication failure observed at generation `seen`.
  ///
  /// Exactly one caller per wave runs `renew`; the rest wait for it. The
  /// renewal is driven on its own task so it completes, and releases the
  /// REFRESHING state, even if the claiming caller is dropped.
  pub async fn renew_once<F, Fut>(&self, seen: u64, renew: F) -> bool
  where
    F: FnOnce() -> Fut,
    Fut: Future<Output = bool> + Send + 'static,
  {
    match self.claim(seen) {
      Claim::Settled(renewed) => renewed,
      Claim::Await(generation) => self.outcome_after(generation).await,
      Claim::Owner(generation) => {
        let renewal = renew();
        let mut finish = FinishOnDrop {
          coordinator: self.clone(),
          renewed: false,
        };
        tokio::spawn(async move {
          // A panicking renewal still drops `finish`, reported as failed.
          finish.renewed = renewal.await;
        });
        self.outcome_after(generation).await
      }
    }
  }

  fn claim(&self, seen: u64) -> Claim {
    let mut claim = Claim::Settled(false);
    self.state.send_if_modified(|s| match s.phase {
      RefreshPhase::Refreshing => {
        claim = Claim::Await(s.generation);
        false
      }
      RefreshPhase::Idle if s.generation != seen => {
        claim = Claim::Settled(s.last_renewed);
        false
      }
      RefreshPhase::Idle => {
        s.phase = RefreshPhase::Refreshing;
        claim = Claim::Owner(s.generation);
        true
      }
    });
    claim
  }

  fn finish(&self, renewed: bool) {
    self.state.send_modify(|s| {
      s.phase = RefreshPhase::Idle;
      s.generation += 1;
      s.last_renewed = renewed;
    });
  }

  async fn outcome_after(&self, generation: u64) -> bool {
    let mut rx = self.state.subscribe();
    let result = rx
      .wait_for(|s| s.phase == RefreshPhase::Idle && s.generation > generation)
      .await
      .map(|s| s.last_renewed);
    result.unwrap_or(false)
  }
}

/// Returns the coordinator to IDLE however the renewal task ends.
struct FinishOnDrop {
  coordinator: RefreshCoordinator,
  renewed: bool,
}

impl Drop for FinishOnDrop {
  fn drop(&mut self) {
    self.coordinator.finish(self.renewed);
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::sync::atomic::{AtomicUsize, Ordering};
  use std::time::Duration;

  #[test]
  fn test_first_claim_owns_the_wave() {
    let c = RefreshCoordinator::new();
    assert_eq!(c.claim(0), Claim::Owner(0));
    assert_eq!(c.phase(), RefreshPhase::Refreshing);
    assert_eq!(c.claim(0), Claim::Await(0));

    c.finish(true);
    assert_eq!(c.phase(), RefreshPhase::Idle);
    assert_eq!(c.generation(), 1);
    // A late failure from before the renewal adopts its outcome.
    assert_eq!(c.claim(0), Claim::Settled(true));
    // A failure after the renewal starts a new wave.
    assert_eq!(c.claim(1), Claim::Owner(1));
  }

  #[tokio::test(start_paused = true)]
  async fn test_concurrent_failures_share_one_renewal() {
    let c = RefreshCoordinator::new();
    let renewals = Arc::new(AtomicUsize::new(0));

    let results = futures::future::join_all((0..8).map(|_| {
      let c = c.clone();
      let renewals = renewals.clone();
      async move {
        let seen = c.wait_idle().await;
        c.renew_once(seen, move || async move {
          renewals.fetch_add(1, Ordering::SeqCst);
          tokio::time::sleep(Duration::from_millis(50)).await;
          true
        })
        .await
      }
    }))
    .await;

    assert!(results.into_iter().all(|ok| ok));
    assert_eq!(renewals.load(Ordering::SeqCst), 1);
    assert_eq!(c.generation(), 1);
  }

  #[tokio::test(start_paused = true)]
  async fn test_failed_renewal_is_reported_to_waiters() {
    let c = RefreshCoordinator::new();
    let results = futures::future::join_all((0..3).map(|_| {
      let c = c.clone();
      async move {
        c.renew_once(0, || async {
          tokio::time::sleep(Duration::from_millis(10)).await;
          false
        })
        .await
      }
    }))
    .await;
    assert_eq!(results, vec![false, false, false]);
    assert_eq!(c.phase(), RefreshPhase::Idle);
  }

  #[tokio::test]
  async fn test_panicking_renewal_releases_waiters() {
    let c = RefreshCoordinator::new();
    let transport_broken = true;
    let renewed = c
      .renew_once(0, move || async move {
        if transport_broken {
          panic!("transport blew up during renewal");
        }
        true
      })
      .await;

    assert!(!renewed);
    assert_eq!(c.phase(), RefreshPhase::Idle);
    assert_eq!(c.generation(), 1);
    assert_eq!(c.wait_idle().await, 1);
  }

  #[tokio::test(start_paused = true)]
  async fn test_wait_idle_blocks_during_renewal() {
    let c = RefreshCoordinator::new();
    assert_eq!(c.claim(0), Claim::Owner(0));

    let waiter = {
      let c = c.clone();
      tokio::spawn(async move { c.wait_idle().await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(!waiter.is_finished());

    c.finish(true);
    assert_eq!(waiter.await.unwrap(), 1);
  }
}
