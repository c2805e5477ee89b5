//! Collapsing concurrent generations of the same artifact.
//!
//! The first caller for a key runs the work; callers arriving while it is
//! running wait for the same cell and receive the same result. The slot is
//! removed once the work is done, so a later request starts fresh and the
//! filesystem stays the only durable record.

use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;

use tokio::sync::{Mutex, OnceCell};

use crate::error::{ContentError, Result};

type Slot<T> = Arc<OnceCell<std::result::Result<T, Arc<ContentError>>>>;

/// Map of keys to the generation currently running for them.
pub struct InFlight<K, T> {
    slots: Mutex<HashMap<K, Slot<T>>>,
}

impl<K, T> Default for InFlight<K, T> {
    fn default() -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
        }
    }
}

impl<K, T> InFlight<K, T>
where
    K: Eq + Hash + Clone,
    T: Clone,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `work` for `key` unless a run for the same key is in progress, in
    /// which case wait for it and share its result.
    pub async fn run<F, Fut>(&self, key: K, work: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let slot = {
            let mut slots = self.slots.lock().await;
            slots.entry(key.clone()).or_default().clone()
        };

        let result = slot
            .get_or_init(|| async move { work().await.map_err(Arc::new) })
            .await
            .clone();

        {
            let mut slots = self.slots.lock().await;
            if slots
                .get(&key)
                .is_some_and(|current| Arc::ptr_eq(current, &slot))
            {
                slots.remove(&key);
            }
        }

        result.map_err(ContentError::from_shared)
    }

    /// Number of keys currently being generated.
    pub async fn len(&self) -> usize {
        self.slots.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.slots.lock().await.is_empty()
    }
}
