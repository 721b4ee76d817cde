//! Keyed single-flight execution.
//!
//! At most one task runs per key; callers arriving while it runs wait on the
//! same shared result. The work runs on a spawned task so a caller dropping its
//! future does not cancel it for the others.

use futures::future::{BoxFuture, FutureExt, Shared};
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use thiserror::Error;
use tracing::trace;

type Flight<T> = Shared<BoxFuture<'static, Result<T, Aborted>>>;
type Calls<K, T> = Arc<Mutex<HashMap<K, Flight<T>>>>;

/// The task behind a flight ended without a result (panic or runtime shutdown).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("in-flight task aborted: {0}")]
pub(crate) struct Aborted(String);

pub(crate) struct SingleFlight<K, T> {
    calls: Calls<K, T>,
}

impl<K, T> fmt::Debug for SingleFlight<K, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let in_flight = self.calls.try_lock().map(|calls| calls.len()).ok();
        f.debug_struct("SingleFlight")
            .field("in_flight", &in_flight)
            .finish()
    }
}

impl<K, T> SingleFlight<K, T>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    T: Clone + Send + Sync + 'static,
{
    pub(crate) fn new() -> Self {
        Self {
            calls: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Runs `work` for `key`, or joins the flight already running for it.
    pub(crate) async fn run<F>(&self, key: K, work: F) -> Result<T, Aborted>
    where
        F: Future<Output = T> + Send + 'static,
    {
        let flight = {
            let mut calls = lock(&self.calls);
            if let Some(existing) = calls.get(&key) {
                trace!("joining in-flight call");
                existing.clone()
            } else {
                let release = Release {
                    calls: Arc::clone(&self.calls),
                    key: key.clone(),
                };
                let handle = tokio::spawn(async move {
                    let _release = release;
                    work.await
                });
                let flight: Flight<T> = async move {
                    handle.await.map_err(|e| Aborted(e.to_string()))
                }
                .boxed()
                .shared();
                calls.insert(key, flight.clone());
                flight
            }
        };

        flight.await
    }

    /// Number of keys with a flight currently running.
    #[cfg(test)]
    pub(crate) fn in_flight(&self) -> usize {
        lock(&self.calls).len()
    }
}

/// Removes a finished flight from the map, also when its task panics.
struct Release<K: Eq + Hash, T> {
    calls: Calls<K, T>,
    key: K,
}

impl<K: Eq + Hash, T> Drop for Release<K, T> {
    fn drop(&mut self) {
        lock(&self.calls).remove(&self.key);
    }
}

fn lock<M>(mutex: &Mutex<M>) -> MutexGuard<'_, M> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
