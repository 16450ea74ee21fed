//! Recovery store: the forget-only view of a storage tier.

use super::traits::Store;
use bulwark_core::StoreAccessError;
use std::sync::Arc;

/// Destructive forget operations used to discard possibly-inconsistent
/// entries after a storage failure.
///
/// Never touches the loader/writer.
pub trait RecoveryStore<K>: Send + Sync {
    /// Forget every entry in the tier.
    fn obliterate_all(&self) -> Result<(), StoreAccessError>;

    /// Forget a single key.
    fn obliterate(&self, key: &K) -> Result<(), StoreAccessError>;

    /// Forget each of `keys`, in order, stopping at the first failure.
    fn obliterate_keys(&self, keys: &[K]) -> Result<(), StoreAccessError> {
        for key in keys {
            self.obliterate(key)?;
        }
        Ok(())
    }
}

/// Recovery store backed by a [`Store`].
///
/// Single keys map to [`Store::remove`], the whole tier to [`Store::clear`].
#[derive(Debug)]
pub struct DefaultRecoveryStore<S> {
    store: Arc<S>,
}

impl<S> DefaultRecoveryStore<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// The wrapped storage tier.
    pub fn store(&self) -> &S {
        &self.store
    }
}

impl<S> Clone for DefaultRecoveryStore<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<K, S> RecoveryStore<K> for DefaultRecoveryStore<S>
where
    S: Store<K>,
{
    fn obliterate_all(&self) -> Result<(), StoreAccessError> {
        self.store.clear()
    }

    fn obliterate(&self, key: &K) -> Result<(), StoreAccessError> {
        self.store.remove(key)
    }
}
