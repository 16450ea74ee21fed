//! Collaborator traits consumed by resilience strategies.
//!
//! Strategies never own cache data. They reach the primary storage tier
//! through [`Store`] (eviction only) and the system of record through
//! [`LoaderWriter`].

use bulwark_core::StoreAccessError;
use std::sync::Arc;

/// The eviction surface of a primary storage tier.
///
/// Both operations may fail: they are typically invoked when the tier has
/// already reported a failure.
pub trait Store<K>: Send + Sync {
    /// Remove the mapping for `key`, if any.
    fn remove(&self, key: &K) -> Result<(), StoreAccessError>;

    /// Remove every mapping.
    fn clear(&self) -> Result<(), StoreAccessError>;
}

impl<K, S: Store<K> + ?Sized> Store<K> for Arc<S> {
    fn remove(&self, key: &K) -> Result<(), StoreAccessError> {
        (**self).remove(key)
    }

    fn clear(&self) -> Result<(), StoreAccessError> {
        (**self).clear()
    }
}

/// External system of record for cache contents.
///
/// Implementations own their retry and backoff policy; strategies make a
/// single attempt per failure.
pub trait LoaderWriter<K, V>: Send + Sync {
    /// Error raised by the system of record.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Load the authoritative value for `key`, `None` if there is none.
    fn load(&self, key: &K) -> Result<Option<V>, Self::Error>;

    /// Persist `key -> value`.
    fn write(&self, key: &K, value: &V) -> Result<(), Self::Error>;
}
