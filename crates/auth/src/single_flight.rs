// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Single-flight coordination of token refreshes.
//!
//! The first caller spawns the operation and parks a weak handle to a
//! broadcast sender in the slot; everyone arriving while it runs subscribes
//! to the same result instead of starting another one. The spawned task owns
//! the only strong handle, so once it has sent and dropped the sender the
//! slot is empty again and the next caller starts a fresh operation.

use std::future::Future;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tokio::sync::broadcast;
use tracing::debug;

use crate::client::AuthClient;
use crate::error::AuthError;

type Slot<T> = Mutex<Weak<broadcast::Sender<Result<T, AuthError>>>>;

/// Coalesces concurrent runs of one operation into a single execution.
pub struct SingleFlight<T> {
    slot: Arc<Slot<T>>,
}

impl<T> Default for SingleFlight<T> {
    fn default() -> Self {
        Self { slot: Arc::new(Mutex::new(Weak::new())) }
    }
}

impl<T: Clone + Send + 'static> SingleFlight<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether an operation is currently running.
    pub fn in_flight(&self) -> bool {
        self.slot.lock().strong_count() > 0
    }

    /// Join the running operation, or start `f` if none is running.
    ///
    /// The operation runs on its own task, so it completes (and its result
    /// is recorded) even if every caller is dropped.
    pub async fn run<F, Fut>(&self, f: F) -> Result<T, AuthError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, AuthError>> + Send + 'static,
    {
        let mut rx = {
            let mut slot = self.slot.lock();
            if let Some(tx) = slot.upgrade() {
                debug!("joining in-flight operation");
                tx.subscribe()
            } else {
                let (tx, rx) = broadcast::channel(1);
                let tx = Arc::new(tx);
                *slot = Arc::downgrade(&tx);

                let fut = f();
                let shared = Arc::clone(&self.slot);
                tokio::spawn(async move {
                    let result = fut.await;
                    // Send and release under the lock so nobody subscribes
                    // between the two and misses the result.
                    let _slot = shared.lock();
                    let _ = tx.send(result);
                    drop(tx);
                });
                rx
            }
        };

        match rx.recv().await {
            Ok(result) => result,
            Err(_) => Err(AuthError::NetworkError("operation ended without a result".to_owned())),
        }
    }
}

/// The only sanctioned way to refresh: every caller (gateway retries, the
/// scheduler, explicit user refreshes) shares one network call.
pub struct RefreshCoordinator {
    client: Arc<AuthClient>,
    flight: SingleFlight<String>,
}

impl RefreshCoordinator {
    pub fn new(client: Arc<AuthClient>) -> Self {
        Self { client, flight: SingleFlight::new() }
    }

    pub fn is_refreshing(&self) -> bool {
        self.flight.in_flight()
    }

    /// New access token, shared with every concurrent caller.
    pub async fn refresh(&self) -> Result<String, AuthError> {
        let client = Arc::clone(&self.client);
        self.flight.run(move || async move { client.refresh().await }).await
    }
}

#[cfg(test)]
#[path = "single_flight_tests.rs"]
mod tests;
