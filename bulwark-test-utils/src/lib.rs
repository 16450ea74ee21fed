//! Bulwark Test Utilities
//!
//! Centralized test infrastructure for the bulwark workspace:
//! - A shared call log to assert ordering across collaborators
//! - A fault-injecting store and a scripted loader/writer
//! - A recording diagnostic listener
//! - Proptest generators for keys, values, failures and operations

pub use bulwark_core::{
    cause, BulkCacheLoadingError, BulkCacheWritingError, CacheLoadingError, CacheWritingError,
    ErrorCause, LoaderWriterFailure, MessageError, ObliterationScope, OperationKind,
    RecoveryEvent, ResilienceConfig, ResilienceError, StoreAccessError,
};
pub use bulwark_resilience::{
    CacheOperation, DefaultRecoveryStore, LoaderWriter, RecoveryListener, Resolution,
    ResilienceStrategy, RobustLoaderWriterStrategy, Store,
};

use proptest::prelude::*;
use std::collections::{HashMap, HashSet};
use std::hash::Hash;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

// ============================================================================
// CALL LOG
// ============================================================================

/// A collaborator call, in the order it happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call<K> {
    StoreRemove(K),
    StoreClear,
    Load(K),
    Write(K),
}

impl<K> Call<K> {
    pub fn is_store_call(&self) -> bool {
        matches!(self, Call::StoreRemove(_) | Call::StoreClear)
    }

    pub fn is_loader_writer_call(&self) -> bool {
        matches!(self, Call::Load(_) | Call::Write(_))
    }
}

/// Ordered record of calls shared by the test collaborators.
#[derive(Debug)]
pub struct CallLog<K> {
    calls: Mutex<Vec<Call<K>>>,
}

impl<K> Default for CallLog<K> {
    fn default() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
        }
    }
}

impl<K: Clone> CallLog<K> {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn record(&self, call: Call<K>) {
        self.calls.lock().unwrap().push(call);
    }

    pub fn calls(&self) -> Vec<Call<K>> {
        self.calls.lock().unwrap().clone()
    }

    pub fn store_calls(&self) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| c.is_store_call()).count()
    }

    pub fn loader_writer_calls(&self) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.is_loader_writer_call())
            .count()
    }

    /// Whether every store call precedes every loader/writer call.
    pub fn cleanup_precedes_fallback(&self) -> bool {
        let calls = self.calls.lock().unwrap();
        match calls.iter().position(|c| c.is_loader_writer_call()) {
            Some(first_fallback) => !calls[first_fallback..].iter().any(|c| c.is_store_call()),
            None => true,
        }
    }
}

// ============================================================================
// FAULTY STORE
// ============================================================================

/// Store that records every eviction and can be told to fail them.
#[derive(Debug)]
pub struct FaultyStore<K> {
    log: Arc<CallLog<K>>,
    fail_cleanup: AtomicBool,
}

impl<K: Clone> FaultyStore<K> {
    pub fn new(log: Arc<CallLog<K>>) -> Self {
        Self {
            log,
            fail_cleanup: AtomicBool::new(false),
        }
    }

    /// A store whose evictions all fail.
    pub fn broken(log: Arc<CallLog<K>>) -> Self {
        let store = Self::new(log);
        store.set_fail_cleanup(true);
        store
    }

    pub fn set_fail_cleanup(&self, fail: bool) {
        self.fail_cleanup.store(fail, Ordering::SeqCst);
    }

    fn outcome(&self) -> Result<(), StoreAccessError> {
        if self.fail_cleanup.load(Ordering::SeqCst) {
            Err(StoreAccessError::access(MessageError::new("eviction failed")))
        } else {
            Ok(())
        }
    }
}

impl<K: Clone + Send + Sync> Store<K> for FaultyStore<K> {
    fn remove(&self, key: &K) -> Result<(), StoreAccessError> {
        self.log.record(Call::StoreRemove(key.clone()));
        self.outcome()
    }

    fn clear(&self) -> Result<(), StoreAccessError> {
        self.log.record(Call::StoreClear);
        self.outcome()
    }
}

// ============================================================================
// SCRIPTED LOADER / WRITER
// ============================================================================

/// Loader/writer backed by a map, recording calls, optionally failing.
#[derive(Debug)]
pub struct ScriptedLoaderWriter<K, V> {
    log: Arc<CallLog<K>>,
    records: Mutex<HashMap<K, V>>,
    unavailable: AtomicBool,
}

impl<K, V> ScriptedLoaderWriter<K, V>
where
    K: Clone + Eq + Hash,
    V: Clone,
{
    pub fn new(log: Arc<CallLog<K>>) -> Self {
        Self {
            log,
            records: Mutex::new(HashMap::new()),
            unavailable: AtomicBool::new(false),
        }
    }

    pub fn with_record(self, key: K, value: V) -> Self {
        self.records.lock().unwrap().insert(key, value);
        self
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn record(&self, key: &K) -> Option<V> {
        self.records.lock().unwrap().get(key).cloned()
    }

    fn check_available(&self) -> Result<(), MessageError> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(MessageError::new("system of record unavailable"))
        } else {
            Ok(())
        }
    }
}

impl<K, V> LoaderWriter<K, V> for ScriptedLoaderWriter<K, V>
where
    K: Clone + Eq + Hash + Send + Sync,
    V: Clone + Send + Sync,
{
    type Error = MessageError;

    fn load(&self, key: &K) -> Result<Option<V>, MessageError> {
        self.log.record(Call::Load(key.clone()));
        self.check_available()?;
        Ok(self.record(key))
    }

    fn write(&self, key: &K, value: &V) -> Result<(), MessageError> {
        self.log.record(Call::Write(key.clone()));
        self.check_available()?;
        self.records.lock().unwrap().insert(key.clone(), value.clone());
        Ok(())
    }
}

// ============================================================================
// RECORDING LISTENER
// ============================================================================

/// A diagnostic signal captured by [`RecordingListener`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Signal<K> {
    Recovered {
        operation: OperationKind,
        scope: ObliterationScope<K>,
    },
    Inconsistent {
        operation: OperationKind,
        scope: ObliterationScope<K>,
        cleanup_error: String,
    },
}

#[derive(Debug)]
pub struct RecordingListener<K> {
    signals: Mutex<Vec<Signal<K>>>,
}

impl<K> Default for RecordingListener<K> {
    fn default() -> Self {
        Self {
            signals: Mutex::new(Vec::new()),
        }
    }
}

impl<K: Clone> RecordingListener<K> {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn signals(&self) -> Vec<Signal<K>> {
        self.signals.lock().unwrap().clone()
    }

    pub fn recovered_count(&self) -> usize {
        self.signals
            .lock()
            .unwrap()
            .iter()
            .filter(|s| matches!(s, Signal::Recovered { .. }))
            .count()
    }

    pub fn inconsistent_count(&self) -> usize {
        self.signals
            .lock()
            .unwrap()
            .iter()
            .filter(|s| matches!(s, Signal::Inconsistent { .. }))
            .count()
    }
}

impl<K: Clone + Send + Sync> RecoveryListener<K> for RecordingListener<K> {
    fn recovered(&self, event: &RecoveryEvent<K>) {
        self.signals.lock().unwrap().push(Signal::Recovered {
            operation: event.operation,
            scope: event.scope.clone(),
        });
    }

    fn inconsistent(&self, event: &RecoveryEvent<K>, cleanup_error: &StoreAccessError) {
        self.signals.lock().unwrap().push(Signal::Inconsistent {
            operation: event.operation,
            scope: event.scope.clone(),
            cleanup_error: cleanup_error.to_string(),
        });
    }
}

// ============================================================================
// HARNESS
// ============================================================================

pub type TestKey = u32;
pub type TestValue = String;

/// Strategy wired to the recording collaborators.
pub type HarnessStrategy = RobustLoaderWriterStrategy<
    TestKey,
    TestValue,
    DefaultRecoveryStore<FaultyStore<TestKey>>,
    ScriptedLoaderWriter<TestKey, TestValue>,
    Arc<RecordingListener<TestKey>>,
>;

/// A strategy plus handles on everything it talks to.
pub struct Harness {
    pub log: Arc<CallLog<TestKey>>,
    pub store: Arc<FaultyStore<TestKey>>,
    pub loader_writer: Arc<ScriptedLoaderWriter<TestKey, TestValue>>,
    pub listener: Arc<RecordingListener<TestKey>>,
    pub strategy: HarnessStrategy,
}

impl Harness {
    /// Healthy eviction, available loader/writer, no records.
    pub fn new() -> Self {
        Self::build(false, Vec::new())
    }

    /// Every eviction fails.
    pub fn with_broken_store() -> Self {
        Self::build(true, Vec::new())
    }

    /// Loader/writer pre-populated with `records`.
    pub fn with_records(records: Vec<(TestKey, TestValue)>) -> Self {
        Self::build(false, records)
    }

    fn build(broken_store: bool, records: Vec<(TestKey, TestValue)>) -> Self {
        let log = CallLog::new();
        let store = Arc::new(if broken_store {
            FaultyStore::broken(Arc::clone(&log))
        } else {
            FaultyStore::new(Arc::clone(&log))
        });
        let loader_writer = Arc::new(
            records
                .into_iter()
                .fold(ScriptedLoaderWriter::new(Arc::clone(&log)), |lw, (k, v)| {
                    lw.with_record(k, v)
                }),
        );
        let listener = RecordingListener::new();
        let strategy = RobustLoaderWriterStrategy::from_parts(
            DefaultRecoveryStore::new(Arc::clone(&store)),
            Arc::clone(&loader_writer),
            Arc::clone(&listener),
        );
        Self {
            log,
            store,
            loader_writer,
            listener,
            strategy,
        }
    }
}

impl Default for Harness {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// FAILURE FIXTURES
// ============================================================================

pub fn access_failure(message: &str) -> StoreAccessError {
    StoreAccessError::access(MessageError::new(message))
}

pub fn pass_through_failure(message: &str) -> StoreAccessError {
    StoreAccessError::pass_through(MessageError::new(message))
}

pub fn loading_failure(key: TestKey, message: &str) -> CacheLoadingError<TestKey> {
    CacheLoadingError::new(Some(key), cause(MessageError::new(message)))
}

pub fn writing_failure(key: TestKey, message: &str) -> CacheWritingError<TestKey> {
    CacheWritingError::new(Some(key), cause(MessageError::new(message)))
}

pub fn bulk_loading_failure(keys: &[TestKey]) -> BulkCacheLoadingError<TestKey, TestValue> {
    let failures = keys
        .iter()
        .map(|k| (*k, cause(MessageError::new("bulk load failed"))))
        .collect();
    BulkCacheLoadingError::new(failures, HashMap::new())
}

pub fn bulk_writing_failure(keys: &[TestKey]) -> BulkCacheWritingError<TestKey> {
    let failures = keys
        .iter()
        .map(|k| (*k, cause(MessageError::new("bulk write failed"))))
        .collect();
    BulkCacheWritingError::new(failures, HashSet::new())
}

// ============================================================================
// TRACING
// ============================================================================

/// Install a test-friendly tracing subscriber once per process.
///
/// Honors `RUST_LOG`; defaults to DEBUG for the bulwark crates.
pub fn init_test_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("bulwark_resilience=debug,info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

/// Generate a cache key from a small domain, so collisions happen.
pub fn arb_key() -> impl Strategy<Value = TestKey> {
    0u32..32
}

pub fn arb_value() -> impl Strategy<Value = TestValue> {
    "[a-z]{1,8}"
}

pub fn arb_keys() -> impl Strategy<Value = Vec<TestKey>> {
    prop::collection::vec(arb_key(), 0..8)
}

pub fn arb_entries() -> impl Strategy<Value = HashMap<TestKey, TestValue>> {
    prop::collection::hash_map(arb_key(), arb_value(), 0..8)
}

/// Generate a storage failure: mostly genuine, sometimes pass-through.
pub fn arb_store_failure() -> impl Strategy<Value = StoreAccessError> {
    prop_oneof![
        3 => "[a-z ]{1,16}".prop_map(|m| access_failure(&m)),
        1 => "[a-z ]{1,16}".prop_map(|m| pass_through_failure(&m)),
    ]
}

/// Generate a genuine (non pass-through) storage failure.
pub fn arb_access_failure() -> impl Strategy<Value = StoreAccessError> {
    "[a-z ]{1,16}".prop_map(|m| access_failure(&m))
}

fn fallback_failure(key: TestKey, loading: bool) -> LoaderWriterFailure<TestKey> {
    if loading {
        LoaderWriterFailure::Loading(loading_failure(key, "load failed"))
    } else {
        LoaderWriterFailure::Writing(writing_failure(key, "write failed"))
    }
}

/// Generate an operation carrying no secondary failure.
pub fn arb_operation() -> impl Strategy<Value = CacheOperation<TestKey, TestValue>> {
    prop_oneof![
        2 => arb_single_key_operation(),
        1 => arb_bulk_operation(),
    ]
}

/// Generate a single-key operation carrying no secondary failure.
pub fn arb_single_key_operation() -> impl Strategy<Value = CacheOperation<TestKey, TestValue>> {
    prop_oneof![
        arb_key().prop_map(|key| CacheOperation::Get { key }),
        arb_key().prop_map(|key| CacheOperation::ContainsKey { key }),
        (arb_key(), arb_value()).prop_map(|(key, value)| CacheOperation::Put { key, value }),
        arb_key().prop_map(|key| CacheOperation::Remove {
            key,
            writer_failure: None
        }),
        (arb_key(), arb_value(), prop::option::of(arb_value())).prop_map(
            |(key, value, loader_writer_result)| CacheOperation::PutIfAbsent {
                key,
                value,
                loader_writer_result,
                fallback_failure: None,
            }
        ),
        (arb_key(), arb_value(), any::<bool>()).prop_map(|(key, value, known_to_be_present)| {
            CacheOperation::ConditionalRemove {
                key,
                value,
                known_to_be_present,
                fallback_failure: None,
            }
        }),
        (arb_key(), arb_value()).prop_map(|(key, value)| CacheOperation::Replace {
            key,
            value,
            fallback_failure: None,
        }),
        (arb_key(), arb_value(), arb_value(), any::<bool>()).prop_map(
            |(key, old_value, new_value, known_to_match)| CacheOperation::ConditionalReplace {
                key,
                old_value,
                new_value,
                known_to_match,
                fallback_failure: None,
            }
        ),
    ]
}

/// Generate a bulk or whole-tier operation carrying no secondary failure.
pub fn arb_bulk_operation() -> impl Strategy<Value = CacheOperation<TestKey, TestValue>> {
    prop_oneof![
        Just(CacheOperation::Clear),
        (
            arb_keys(),
            prop::option::of(prop::collection::hash_map(
                arb_key(),
                prop::option::of(arb_value()),
                0..4
            ))
        )
            .prop_map(|(keys, partially_loaded)| CacheOperation::GetAll {
                keys,
                partially_loaded,
                loader_failure: None,
            }),
        arb_entries().prop_map(|entries| CacheOperation::PutAll {
            entries,
            writer_failure: None,
        }),
        arb_keys().prop_map(|keys| CacheOperation::RemoveAll {
            keys,
            writer_failure: None,
        }),
    ]
}

/// Generate an operation whose loader/writer already failed.
pub fn arb_operation_with_fallback_failure() -> impl Strategy<Value = CacheOperation<TestKey, TestValue>> {
    prop_oneof![
        arb_key().prop_map(|key| CacheOperation::Remove {
            key,
            writer_failure: Some(writing_failure(key, "write failed")),
        }),
        (arb_key(), arb_value(), prop::option::of(arb_value()), any::<bool>()).prop_map(
            |(key, value, loader_writer_result, loading)| CacheOperation::PutIfAbsent {
                key,
                value,
                loader_writer_result,
                fallback_failure: Some(fallback_failure(key, loading)),
            }
        ),
        (arb_key(), arb_value(), any::<bool>(), any::<bool>()).prop_map(
            |(key, value, known_to_be_present, loading)| CacheOperation::ConditionalRemove {
                key,
                value,
                known_to_be_present,
                fallback_failure: Some(fallback_failure(key, loading)),
            }
        ),
        (arb_key(), arb_value(), any::<bool>()).prop_map(|(key, value, loading)| {
            CacheOperation::Replace {
                key,
                value,
                fallback_failure: Some(fallback_failure(key, loading)),
            }
        }),
        (arb_key(), arb_value(), arb_value(), any::<bool>(), any::<bool>()).prop_map(
            |(key, old_value, new_value, known_to_match, loading)| {
                CacheOperation::ConditionalReplace {
                    key,
                    old_value,
                    new_value,
                    known_to_match,
                    fallback_failure: Some(fallback_failure(key, loading)),
                }
            }
        ),
        arb_keys().prop_map(|keys| {
            let loader_failure = Some(bulk_loading_failure(&keys));
            CacheOperation::GetAll {
                keys,
                partially_loaded: None,
                loader_failure,
            }
        }),
        arb_entries().prop_map(|entries| {
            let keys: Vec<_> = entries.keys().copied().collect();
            CacheOperation::PutAll {
                entries,
                writer_failure: Some(bulk_writing_failure(&keys)),
            }
        }),
        arb_keys().prop_map(|keys| {
            let writer_failure = Some(bulk_writing_failure(&keys));
            CacheOperation::RemoveAll {
                keys,
                writer_failure,
            }
        }),
    ]
}

/// The key set a given operation should obliterate, `None` for the whole tier.
pub fn expected_obliteration(operation: &CacheOperation<TestKey, TestValue>) -> Option<Vec<TestKey>> {
    match operation.scope() {
        ObliterationScope::Key(key) => Some(vec![key]),
        ObliterationScope::Keys(keys) => Some(keys),
        ObliterationScope::All => None,
    }
}
