//! Cache operations as tagged variants.
//!
//! Each variant carries the arguments of the failed cache operation and,
//! where one is possible, the failure the cache core already hit while
//! consulting the loader/writer. A strategy resolves a variant into a
//! [`Resolution`] or a surfaced error.

use bulwark_core::{
    BulkCacheLoadingError, BulkCacheWritingError, CacheWritingError, LoaderWriterFailure,
    ObliterationScope, OperationKind,
};
use std::collections::HashMap;

/// A cache operation whose storage access failed.
#[derive(Debug, Clone)]
pub enum CacheOperation<K, V> {
    Get {
        key: K,
    },
    ContainsKey {
        key: K,
    },
    Put {
        key: K,
        value: V,
    },
    Remove {
        key: K,
        writer_failure: Option<CacheWritingError<K>>,
    },
    Clear,
    PutIfAbsent {
        key: K,
        value: V,
        /// Value the loader/writer produced, if the core got that far.
        loader_writer_result: Option<V>,
        fallback_failure: Option<LoaderWriterFailure<K>>,
    },
    /// Remove `key` only if currently mapped to `value`.
    ConditionalRemove {
        key: K,
        value: V,
        known_to_be_present: bool,
        fallback_failure: Option<LoaderWriterFailure<K>>,
    },
    Replace {
        key: K,
        value: V,
        fallback_failure: Option<LoaderWriterFailure<K>>,
    },
    /// Replace `key` only if currently mapped to `old_value`.
    ConditionalReplace {
        key: K,
        old_value: V,
        new_value: V,
        known_to_match: bool,
        fallback_failure: Option<LoaderWriterFailure<K>>,
    },
    GetAll {
        keys: Vec<K>,
        /// Mappings the core already loaded before storage failed.
        partially_loaded: Option<HashMap<K, Option<V>>>,
        loader_failure: Option<BulkCacheLoadingError<K, V>>,
    },
    PutAll {
        entries: HashMap<K, V>,
        writer_failure: Option<BulkCacheWritingError<K>>,
    },
    RemoveAll {
        keys: Vec<K>,
        writer_failure: Option<BulkCacheWritingError<K>>,
    },
}

impl<K, V> CacheOperation<K, V> {
    pub fn kind(&self) -> OperationKind {
        match self {
            Self::Get { .. } => OperationKind::Get,
            Self::ContainsKey { .. } => OperationKind::ContainsKey,
            Self::Put { .. } => OperationKind::Put,
            Self::Remove { .. } => OperationKind::Remove,
            Self::Clear => OperationKind::Clear,
            Self::PutIfAbsent { .. } => OperationKind::PutIfAbsent,
            Self::ConditionalRemove { .. } => OperationKind::ConditionalRemove,
            Self::Replace { .. } => OperationKind::Replace,
            Self::ConditionalReplace { .. } => OperationKind::ConditionalReplace,
            Self::GetAll { .. } => OperationKind::GetAll,
            Self::PutAll { .. } => OperationKind::PutAll,
            Self::RemoveAll { .. } => OperationKind::RemoveAll,
        }
    }

    /// Snake-case operation name, as logged.
    pub fn name(&self) -> &'static str {
        self.kind().as_str()
    }

    /// Entries a failure of this operation implicates.
    pub fn scope(&self) -> ObliterationScope<K>
    where
        K: Clone,
    {
        match self {
            Self::Clear => ObliterationScope::All,
            Self::Get { key }
            | Self::ContainsKey { key }
            | Self::Put { key, .. }
            | Self::Remove { key, .. }
            | Self::PutIfAbsent { key, .. }
            | Self::ConditionalRemove { key, .. }
            | Self::Replace { key, .. }
            | Self::ConditionalReplace { key, .. } => ObliterationScope::Key(key.clone()),
            Self::GetAll { keys, .. } | Self::RemoveAll { keys, .. } => {
                ObliterationScope::Keys(keys.clone())
            }
            Self::PutAll { entries, .. } => ObliterationScope::Keys(entries.keys().cloned().collect()),
        }
    }

    /// Whether the cache core already saw the loader/writer fail.
    pub fn has_fallback_failure(&self) -> bool {
        match self {
            Self::Get { .. } | Self::ContainsKey { .. } | Self::Put { .. } | Self::Clear => false,
            Self::Remove { writer_failure, .. } => writer_failure.is_some(),
            Self::PutIfAbsent {
                fallback_failure, ..
            }
            | Self::ConditionalRemove {
                fallback_failure, ..
            }
            | Self::Replace {
                fallback_failure, ..
            }
            | Self::ConditionalReplace {
                fallback_failure, ..
            } => fallback_failure.is_some(),
            Self::GetAll { loader_failure, .. } => loader_failure.is_some(),
            Self::PutAll { writer_failure, .. } | Self::RemoveAll { writer_failure, .. } => {
                writer_failure.is_some()
            }
        }
    }
}

/// The successful outcome of resolving a [`CacheOperation`].
#[derive(Debug, Clone)]
pub enum Resolution<K, V> {
    /// Void operations: put, remove, clear, put_all.
    Done,
    /// get, put_if_absent, replace.
    Value(Option<V>),
    /// contains_key, conditional remove and replace.
    Flag(bool),
    /// get_all, remove_all.
    Entries(HashMap<K, Option<V>>),
}

impl<K, V> Resolution<K, V> {
    pub fn into_value(self) -> Option<Option<V>> {
        match self {
            Self::Value(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_flag(&self) -> Option<bool> {
        match self {
            Self::Flag(flag) => Some(*flag),
            _ => None,
        }
    }

    pub fn into_entries(self) -> Option<HashMap<K, Option<V>>> {
        match self {
            Self::Entries(entries) => Some(entries),
            _ => None,
        }
    }
}
