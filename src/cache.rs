//! Load-once memoisation of heavyweight models, keyed by model name.
//!
//! Entries are never evicted. The map lock is held across the load, so two
//! requests racing for the same cold model load it once.

use std::{collections::HashMap, future::Future, hash::Hash, sync::Arc};

use tokio::sync::Mutex;

use crate::error::Result;

pub struct ModelCache<K, V> {
    entries: Mutex<HashMap<K, Arc<V>>>,
}

impl<K, V> Default for ModelCache<K, V> {
    fn default() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }
}

impl<K: Eq + Hash + Clone, V> ModelCache<K, V> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached value for `key`, running `load` on a miss.
    ///
    /// A failed load leaves nothing behind, so the next call retries.
    pub async fn get_or_load<F, Fut>(&self, key: &K, load: F) -> Result<Arc<V>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V>>,
    {
        let mut entries = self.entries.lock().await;
        if let Some(value) = entries.get(key) {
            return Ok(Arc::clone(value));
        }

        let value = Arc::new(load().await?);
        entries.insert(key.clone(), Arc::clone(&value));
        Ok(value)
    }
}
