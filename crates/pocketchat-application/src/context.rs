//! The single live inference context.
//!
//! `InferenceContext` wraps the engine binding behind an exclusive lease so
//! priming and completion are mutually exclusive critical sections. Each
//! lease takes a new epoch; token callbacks registered under an older epoch
//! are ignored, so output from an abandoned call can never leak into a later
//! one.

use pocketchat_core::engine::InferenceEngine;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tokio_util::sync::CancellationToken;

/// State shared between the context, its leases and token callbacks.
#[derive(Debug, Default)]
struct ContextShared {
    epoch: AtomicU64,
    primed: AtomicBool,
    /// The engine may hold turns from an earlier priming or completion.
    has_history: AtomicBool,
    /// Cancellation token of the current lease holder.
    in_flight: Mutex<Option<(u64, CancellationToken)>>,
}

/// Handle to the engine's live conversational state.
///
/// Exactly one of these is "the active context" at a time; it is shared by
/// the lifecycle coordinator (which primes it) and completion sessions
/// (which drive it).
pub struct InferenceContext {
    engine: Arc<dyn InferenceEngine>,
    lease: Arc<AsyncMutex<()>>,
    shared: Arc<ContextShared>,
}

impl InferenceContext {
    pub fn new(engine: Arc<dyn InferenceEngine>) -> Self {
        Self {
            engine,
            lease: Arc::new(AsyncMutex::new(())),
            shared: Arc::new(ContextShared::default()),
        }
    }

    pub fn engine(&self) -> &Arc<dyn InferenceEngine> {
        &self.engine
    }

    /// Whether the engine is still loading its model.
    pub fn is_loading(&self) -> bool {
        self.engine.is_loading()
    }

    /// Whether the last priming succeeded and nothing invalidated it since.
    pub fn is_primed(&self) -> bool {
        self.shared.primed.load(Ordering::SeqCst)
    }

    pub fn has_history(&self) -> bool {
        self.shared.has_history.load(Ordering::SeqCst)
    }

    pub fn epoch(&self) -> u64 {
        self.shared.epoch.load(Ordering::SeqCst)
    }

    /// Whether some lease is currently held.
    pub fn is_busy(&self) -> bool {
        self.in_flight_guard().is_some()
    }

    /// Signals the current lease holder to wind down.
    ///
    /// Cooperative: the holder observes its cancellation token and forwards
    /// the request to the engine.
    pub fn cancel_in_flight(&self) {
        if let Some((epoch, token)) = self.in_flight_guard().as_ref() {
            tracing::debug!("[InferenceContext] Cancelling lease epoch={}", epoch);
            token.cancel();
        }
    }

    /// Acquires the exclusive lease, cancelling and awaiting any holder.
    pub async fn acquire(&self) -> ContextLease {
        self.acquire_linked(&CancellationToken::new()).await
    }

    /// Like [`acquire`](Self::acquire), but the lease is also cancelled when
    /// `parent` is.
    pub async fn acquire_linked(&self, parent: &CancellationToken) -> ContextLease {
        self.cancel_in_flight();
        let guard = self.lease.clone().lock_owned().await;

        let epoch = self.shared.epoch.fetch_add(1, Ordering::SeqCst) + 1;
        let token = parent.child_token();
        *self.in_flight_guard() = Some((epoch, token.clone()));
        tracing::debug!("[InferenceContext] Lease acquired epoch={}", epoch);

        ContextLease {
            _guard: guard,
            engine: self.engine.clone(),
            shared: self.shared.clone(),
            token,
            epoch,
        }
    }

    fn in_flight_guard(&self) -> std::sync::MutexGuard<'_, Option<(u64, CancellationToken)>> {
        lock_in_flight(&self.shared)
    }
}

fn lock_in_flight(
    shared: &ContextShared,
) -> std::sync::MutexGuard<'_, Option<(u64, CancellationToken)>> {
    // The guarded value stays consistent even if a holder panicked.
    shared
        .in_flight
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Exclusive access to the engine for one priming or completion.
///
/// Dropping the lease releases the context.
pub struct ContextLease {
    _guard: OwnedMutexGuard<()>,
    engine: Arc<dyn InferenceEngine>,
    shared: Arc<ContextShared>,
    token: CancellationToken,
    epoch: u64,
}

impl ContextLease {
    pub fn engine(&self) -> &Arc<dyn InferenceEngine> {
        &self.engine
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Cancelled when the owner stops or another caller needs the context.
    pub fn cancellation(&self) -> &CancellationToken {
        &self.token
    }

    pub fn is_primed(&self) -> bool {
        self.shared.primed.load(Ordering::SeqCst)
    }

    pub fn has_history(&self) -> bool {
        self.shared.has_history.load(Ordering::SeqCst)
    }

    pub fn mark_primed(&self) {
        self.shared.primed.store(true, Ordering::SeqCst);
    }

    pub fn mark_unprimed(&self) {
        self.shared.primed.store(false, Ordering::SeqCst);
    }

    /// Records that a completion call was issued and may have left turns in
    /// the engine.
    pub fn mark_history(&self) {
        self.shared.has_history.store(true, Ordering::SeqCst);
    }

    /// Records that the engine's history was reset.
    pub fn clear_history(&self) {
        self.shared.has_history.store(false, Ordering::SeqCst);
    }

    /// A cheap, `'static` check that this lease's epoch is still current.
    pub fn epoch_guard(&self) -> EpochGuard {
        EpochGuard {
            shared: self.shared.clone(),
            epoch: self.epoch,
        }
    }
}

impl Drop for ContextLease {
    fn drop(&mut self) {
        let mut in_flight = lock_in_flight(&self.shared);
        if matches!(in_flight.as_ref(), Some((epoch, _)) if *epoch == self.epoch) {
            *in_flight = None;
        }
        tracing::debug!("[InferenceContext] Lease released epoch={}", self.epoch);
    }
}

/// Detects whether a lease has been superseded.
#[derive(Clone)]
pub struct EpochGuard {
    shared: Arc<ContextShared>,
    epoch: u64,
}

impl EpochGuard {
    pub fn is_current(&self) -> bool {
        self.shared.epoch.load(Ordering::SeqCst) == self.epoch
    }
}
