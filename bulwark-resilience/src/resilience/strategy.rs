//! Resilience strategies: what a cache does once its storage tier fails.
//!
//! Every handler follows the same protocol:
//!
//! 1. A pass-through failure is unwrapped and surfaced at once. No cleanup.
//! 2. Otherwise the entries implicated in the failure are obliterated.
//!    A failed obliteration is reported to the listener and absorbed.
//! 3. The operation result is computed: a loader/writer fallback for
//!    `get` and `put`, a secondary failure re-raised when the cache core
//!    supplied one, or a value that is safe to treat as a miss or no-op.
//!
//! Cleanup always happens before the fallback call and before any error is
//! surfaced.

use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;
use std::marker::PhantomData;
use std::sync::Arc;

use bulwark_core::{
    cause, BulkCacheLoadingError, BulkCacheWritingError, CacheLoadingError, CacheWritingError,
    ConfigError, LoaderWriterFailure, ObliterationScope, OperationKind, RecoveryEvent, ResilienceConfig,
    ResilienceError, ResilienceResult, StoreAccessError,
};

use super::listener::{RecoveryListener, TracingRecoveryListener};
use super::operation::{CacheOperation, Resolution};
use super::recovery_store::{DefaultRecoveryStore, RecoveryStore};
use super::traits::{LoaderWriter, Store};

/// Resolves a failed cache operation into its observable outcome.
///
/// Implementations are invoked by the cache core after the storage tier has
/// already classified the failure. Exactly one outcome is produced per call.
pub trait ResilienceStrategy<K, V>: Send + Sync {
    /// Resolve `operation`, whose storage access failed with `failure`.
    ///
    /// A pass-through `failure` surfaces its cause untouched. Any other
    /// failure is recovered from, yielding the operation's result or its
    /// re-raised loader/writer failure.
    fn resolve(
        &self,
        operation: CacheOperation<K, V>,
        failure: StoreAccessError,
    ) -> ResilienceResult<Resolution<K, V>, K, V>;
}

/// Strategy for caches backed by a loader/writer.
///
/// Reads and writes fall through to the loader/writer; everything else
/// resolves to a miss or no-op. Holds no state besides its collaborators, so
/// it is as thread safe as they are.
pub struct RobustLoaderWriterStrategy<K, V, R, L, D = TracingRecoveryListener> {
    store: R,
    loader_writer: Arc<L>,
    listener: D,
    _marker: PhantomData<fn() -> (K, V)>,
}

impl<K, V, S, L> RobustLoaderWriterStrategy<K, V, DefaultRecoveryStore<S>, L>
where
    K: Clone + Eq + Hash + Debug,
    S: Store<K>,
    L: LoaderWriter<K, V>,
{
    /// Create a strategy over `store` and `loader_writer` with default diagnostics.
    pub fn new(store: Arc<S>, loader_writer: Arc<L>) -> Self {
        Self::from_parts(
            DefaultRecoveryStore::new(store),
            loader_writer,
            TracingRecoveryListener::default(),
        )
    }

    /// Create a strategy with diagnostics tuned by `config`.
    ///
    /// Fails if `config` does not validate.
    pub fn with_config(
        store: Arc<S>,
        loader_writer: Arc<L>,
        config: &ResilienceConfig,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::from_parts(
            DefaultRecoveryStore::new(store),
            loader_writer,
            TracingRecoveryListener::new(config),
        ))
    }
}

impl<K, V, R, L, D> RobustLoaderWriterStrategy<K, V, R, L, D>
where
    K: Clone + Eq + Hash,
    R: RecoveryStore<K>,
    L: LoaderWriter<K, V>,
    D: RecoveryListener<K>,
{
    /// Assemble a strategy from an explicit recovery store and listener.
    pub fn from_parts(store: R, loader_writer: Arc<L>, listener: D) -> Self {
        Self {
            store,
            loader_writer,
            listener,
            _marker: PhantomData,
        }
    }

    /// The loader/writer used for fallback reads and writes.
    pub fn loader_writer(&self) -> &L {
        &self.loader_writer
    }

    /// The listener receiving recovery diagnostics.
    pub fn listener(&self) -> &D {
        &self.listener
    }

    // === Single-key Operations ===

    /// `get`: obliterate the key, then load it from the loader/writer.
    pub fn get_failure(&self, key: &K, failure: StoreAccessError) -> ResilienceResult<Option<V>, K, V> {
        self.cleanup(OperationKind::Get, ObliterationScope::Key(key.clone()), &failure)?;
        self.loader_writer
            .load(key)
            .map_err(|e| CacheLoadingError::new(Some(key.clone()), cause(e)).into())
    }

    /// `contains_key`: always a miss.
    pub fn contains_key_failure(&self, key: &K, failure: StoreAccessError) -> ResilienceResult<bool, K, V> {
        self.cleanup(OperationKind::ContainsKey, ObliterationScope::Key(key.clone()), &failure)?;
        Ok(false)
    }

    /// `put`: obliterate the key, then write through.
    pub fn put_failure(&self, key: &K, value: &V, failure: StoreAccessError) -> ResilienceResult<(), K, V> {
        self.cleanup(OperationKind::Put, ObliterationScope::Key(key.clone()), &failure)?;
        self.loader_writer
            .write(key, value)
            .map_err(|e| CacheWritingError::new(Some(key.clone()), cause(e)).into())
    }

    pub fn remove_failure(
        &self,
        key: &K,
        failure: StoreAccessError,
        writer_failure: Option<CacheWritingError<K>>,
    ) -> ResilienceResult<(), K, V> {
        self.cleanup(OperationKind::Remove, ObliterationScope::Key(key.clone()), &failure)?;
        surface(writer_failure, || ())
    }

    /// `clear`: obliterate the whole tier.
    pub fn clear_failure(&self, failure: StoreAccessError) -> ResilienceResult<(), K, V> {
        self.cleanup(OperationKind::Clear, ObliterationScope::All, &failure)
    }

    /// `put_if_absent`: report the loader/writer's value when it differs from
    /// the attempted one (already present, do not overwrite), otherwise absent.
    pub fn put_if_absent_failure(
        &self,
        key: &K,
        value: &V,
        loader_writer_result: Option<V>,
        failure: StoreAccessError,
        fallback_failure: Option<LoaderWriterFailure<K>>,
    ) -> ResilienceResult<Option<V>, K, V>
    where
        V: PartialEq,
    {
        self.cleanup(OperationKind::PutIfAbsent, ObliterationScope::Key(key.clone()), &failure)?;
        surface(fallback_failure, || {
            loader_writer_result.filter(|existing| existing != value)
        })
    }

    /// Conditional `remove(key, value)`: trust the caller's presence hint.
    pub fn conditional_remove_failure(
        &self,
        key: &K,
        _value: &V,
        failure: StoreAccessError,
        known_to_be_present: bool,
        fallback_failure: Option<LoaderWriterFailure<K>>,
    ) -> ResilienceResult<bool, K, V> {
        self.cleanup(OperationKind::ConditionalRemove, ObliterationScope::Key(key.clone()), &failure)?;
        surface(fallback_failure, || known_to_be_present)
    }

    /// `replace(key, value)`: treat as no prior value.
    pub fn replace_failure(
        &self,
        key: &K,
        _value: &V,
        failure: StoreAccessError,
        fallback_failure: Option<LoaderWriterFailure<K>>,
    ) -> ResilienceResult<Option<V>, K, V> {
        self.cleanup(OperationKind::Replace, ObliterationScope::Key(key.clone()), &failure)?;
        surface(fallback_failure, || None)
    }

    /// Conditional `replace(key, old, new)`: trust the caller's match hint.
    pub fn conditional_replace_failure(
        &self,
        key: &K,
        _old_value: &V,
        _new_value: &V,
        failure: StoreAccessError,
        known_to_match: bool,
        fallback_failure: Option<LoaderWriterFailure<K>>,
    ) -> ResilienceResult<bool, K, V> {
        self.cleanup(
            OperationKind::ConditionalReplace,
            ObliterationScope::Key(key.clone()),
            &failure,
        )?;
        surface(fallback_failure, || known_to_match)
    }

    // === Bulk Operations ===

    /// `get_all`: the partially loaded mappings if the core has them,
    /// otherwise every requested key mapped to absent.
    pub fn get_all_failure(
        &self,
        keys: &[K],
        partially_loaded: Option<HashMap<K, Option<V>>>,
        failure: StoreAccessError,
        loader_failure: Option<BulkCacheLoadingError<K, V>>,
    ) -> ResilienceResult<HashMap<K, Option<V>>, K, V> {
        self.cleanup(OperationKind::GetAll, ObliterationScope::Keys(keys.to_vec()), &failure)?;
        surface(loader_failure, || {
            partially_loaded.unwrap_or_else(|| keys.iter().map(|key| (key.clone(), None)).collect())
        })
    }

    pub fn put_all_failure(
        &self,
        entries: &HashMap<K, V>,
        failure: StoreAccessError,
        writer_failure: Option<BulkCacheWritingError<K>>,
    ) -> ResilienceResult<(), K, V> {
        let keys = entries.keys().cloned().collect();
        self.cleanup(OperationKind::PutAll, ObliterationScope::Keys(keys), &failure)?;
        surface(writer_failure, || ())
    }

    /// `remove_all`: nothing is reported as removed.
    pub fn remove_all_failure(
        &self,
        keys: &[K],
        failure: StoreAccessError,
        writer_failure: Option<BulkCacheWritingError<K>>,
    ) -> ResilienceResult<HashMap<K, Option<V>>, K, V> {
        self.cleanup(OperationKind::RemoveAll, ObliterationScope::Keys(keys.to_vec()), &failure)?;
        surface(writer_failure, HashMap::new)
    }

    // === Cleanup ===

    /// Obliterate `scope` unless `from` is a pass-through failure.
    ///
    /// Only the pass-through cause can escape; obliteration errors go to the
    /// listener.
    fn cleanup(
        &self,
        operation: OperationKind,
        scope: ObliterationScope<K>,
        from: &StoreAccessError,
    ) -> ResilienceResult<(), K, V> {
        filter_pass_through(from)?;

        let result = match &scope {
            ObliterationScope::Key(key) => self.store.obliterate(key),
            ObliterationScope::Keys(keys) => self.store.obliterate_keys(keys),
            ObliterationScope::All => self.store.obliterate_all(),
        };

        let event = RecoveryEvent::new(operation, scope, from);
        match result {
            Ok(()) => self.listener.recovered(&event),
            Err(cleanup_error) => self.listener.inconsistent(&event, &cleanup_error),
        }
        Ok(())
    }
}

impl<K, V, R, L, D> ResilienceStrategy<K, V> for RobustLoaderWriterStrategy<K, V, R, L, D>
where
    K: Clone + Eq + Hash,
    V: PartialEq,
    R: RecoveryStore<K>,
    L: LoaderWriter<K, V>,
    D: RecoveryListener<K>,
{
    fn resolve(
        &self,
        operation: CacheOperation<K, V>,
        failure: StoreAccessError,
    ) -> ResilienceResult<Resolution<K, V>, K, V> {
        match operation {
            CacheOperation::Get { key } => self.get_failure(&key, failure).map(Resolution::Value),
            CacheOperation::ContainsKey { key } => {
                self.contains_key_failure(&key, failure).map(Resolution::Flag)
            }
            CacheOperation::Put { key, value } => {
                self.put_failure(&key, &value, failure).map(|()| Resolution::Done)
            }
            CacheOperation::Remove {
                key,
                writer_failure,
            } => self
                .remove_failure(&key, failure, writer_failure)
                .map(|()| Resolution::Done),
            CacheOperation::Clear => self.clear_failure(failure).map(|()| Resolution::Done),
            CacheOperation::PutIfAbsent {
                key,
                value,
                loader_writer_result,
                fallback_failure,
            } => self
                .put_if_absent_failure(&key, &value, loader_writer_result, failure, fallback_failure)
                .map(Resolution::Value),
            CacheOperation::ConditionalRemove {
                key,
                value,
                known_to_be_present,
                fallback_failure,
            } => self
                .conditional_remove_failure(&key, &value, failure, known_to_be_present, fallback_failure)
                .map(Resolution::Flag),
            CacheOperation::Replace {
                key,
                value,
                fallback_failure,
            } => self
                .replace_failure(&key, &value, failure, fallback_failure)
                .map(Resolution::Value),
            CacheOperation::ConditionalReplace {
                key,
                old_value,
                new_value,
                known_to_match,
                fallback_failure,
            } => self
                .conditional_replace_failure(
                    &key,
                    &old_value,
                    &new_value,
                    failure,
                    known_to_match,
                    fallback_failure,
                )
                .map(Resolution::Flag),
            CacheOperation::GetAll {
                keys,
                partially_loaded,
                loader_failure,
            } => self
                .get_all_failure(&keys, partially_loaded, failure, loader_failure)
                .map(Resolution::Entries),
            CacheOperation::PutAll {
                entries,
                writer_failure,
            } => self
                .put_all_failure(&entries, failure, writer_failure)
                .map(|()| Resolution::Done),
            CacheOperation::RemoveAll {
                keys,
                writer_failure,
            } => self
                .remove_all_failure(&keys, failure, writer_failure)
                .map(Resolution::Entries),
        }
    }
}

impl<K, V, R: Debug, L, D: Debug> Debug for RobustLoaderWriterStrategy<K, V, R, L, D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RobustLoaderWriterStrategy")
            .field("store", &self.store)
            .field("listener", &self.listener)
            .finish_non_exhaustive()
    }
}

/// Unwrap a pass-through failure into the error surfaced to the caller.
///
/// Deprecated escape hatch: only needed while hosts tunnel caller errors
/// through the storage layer.
fn filter_pass_through<K, V>(failure: &StoreAccessError) -> ResilienceResult<(), K, V> {
    match failure {
        StoreAccessError::PassThrough { cause } => Err(ResilienceError::PassThrough(Arc::clone(cause))),
        StoreAccessError::Access { .. } => Ok(()),
    }
}

/// Re-raise the secondary failure if there is one, else compute the result.
fn surface<T, K, V, F>(secondary: Option<F>, otherwise: impl FnOnce() -> T) -> ResilienceResult<T, K, V>
where
    F: Into<ResilienceError<K, V>>,
{
    match secondary {
        Some(failure) => Err(failure.into()),
        None => Ok(otherwise()),
    }
}
