//! In-memory primary storage tier.

use crate::resilience::Store;
use bulwark_core::{MessageError, StoreAccessError};
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// HashMap-backed storage tier, usable wherever a [`Store`] is expected.
#[derive(Debug)]
pub struct InMemoryStore<K, V> {
    entries: Arc<RwLock<HashMap<K, V>>>,
}

impl<K, V> Default for InMemoryStore<K, V> {
    fn default() -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

impl<K, V> InMemoryStore<K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &K) -> Result<Option<V>, StoreAccessError> {
        Ok(self.read()?.get(key).cloned())
    }

    /// Insert a mapping, returning the previous value.
    pub fn put(&self, key: K, value: V) -> Result<Option<V>, StoreAccessError> {
        Ok(self.write()?.insert(key, value))
    }

    pub fn contains_key(&self, key: &K) -> Result<bool, StoreAccessError> {
        Ok(self.read()?.contains_key(key))
    }

    /// Number of stored entries.
    pub fn len(&self) -> Result<usize, StoreAccessError> {
        Ok(self.read()?.len())
    }

    pub fn is_empty(&self) -> Result<bool, StoreAccessError> {
        Ok(self.read()?.is_empty())
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, HashMap<K, V>>, StoreAccessError> {
        self.entries.read().map_err(|_| lock_poisoned())
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, HashMap<K, V>>, StoreAccessError> {
        self.entries.write().map_err(|_| lock_poisoned())
    }
}

impl<K, V> Store<K> for InMemoryStore<K, V>
where
    K: Eq + Hash + Send + Sync,
    V: Clone + Send + Sync,
{
    fn remove(&self, key: &K) -> Result<(), StoreAccessError> {
        self.write()?.remove(key);
        Ok(())
    }

    fn clear(&self) -> Result<(), StoreAccessError> {
        self.write()?.clear();
        Ok(())
    }
}

fn lock_poisoned() -> StoreAccessError {
    StoreAccessError::access(MessageError::new("Storage lock poisoned"))
}
