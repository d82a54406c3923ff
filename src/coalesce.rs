//! Coalescing of concurrent lookups
//!
//! At most one lookup runs per key. Callers arriving while it is outstanding get a
//! clone of the same shared future and observe the same outcome.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};

use futures::future::{BoxFuture, FutureExt, Shared};

/// Future handed out to every caller waiting on the same key
pub type SharedLookup<T> = Shared<BoxFuture<'static, T>>;

/// Map of outstanding lookups keyed by normalized name
pub struct InFlightCoalescer<T: Clone> {
    inflight: Arc<Mutex<HashMap<String, SharedLookup<T>>>>,
}

impl<T: Clone> Clone for InFlightCoalescer<T> {
    fn clone(&self) -> Self {
        Self {
            inflight: Arc::clone(&self.inflight),
        }
    }
}

impl<T: Clone> Default for InFlightCoalescer<T> {
    fn default() -> Self {
        Self {
            inflight: Arc::new(Mutex::new(HashMap::new())),
        }
    }
}

impl<T> InFlightCoalescer<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Joins the lookup already running for `key`, or starts one with `factory`
    ///
    /// The registered future removes its own key once it completes, whatever the
    /// outcome, so a later lookup for the same key starts fresh. `factory` is only
    /// invoked when no lookup is outstanding.
    pub fn get_or_create<F, Fut>(&self, key: &str, factory: F) -> SharedLookup<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T> + Send + 'static,
    {
        let mut inflight = self.lock();
        if let Some(existing) = inflight.get(key) {
            return existing.clone();
        }

        let registry = Arc::clone(&self.inflight);
        let owned_key = key.to_string();
        let work = factory();
        let lookup = async move {
            let outcome = work.await;
            lock_map(&registry).remove(&owned_key);
            outcome
        }
        .boxed()
        .shared();

        inflight.insert(key.to_string(), lookup.clone());
        lookup
    }

    /// Number of lookups currently outstanding
    pub fn in_flight_count(&self) -> usize {
        self.lock().len()
    }

    pub fn is_in_flight(&self, key: &str) -> bool {
        self.lock().contains_key(key)
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, SharedLookup<T>>> {
        lock_map(&self.inflight)
    }
}

fn lock_map<V>(map: &Mutex<HashMap<String, V>>) -> MutexGuard<'_, HashMap<String, V>> {
    map.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
