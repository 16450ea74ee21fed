//! Bulwark Resilience - Storage Failure Recovery
//!
//! Recovery protocol invoked when a cache's primary storage tier fails:
//! evict the implicated entries, then resolve the operation against the
//! loader/writer instead of surfacing a raw storage error.

pub mod memory;
pub mod resilience;

pub use memory::InMemoryStore;

// Re-export resilience types for cache integration
pub use resilience::{
    CacheOperation, DefaultRecoveryStore, LoaderWriter, LogPacer, RecoveryListener, RecoveryStore,
    Resolution, ResilienceStrategy, RobustLoaderWriterStrategy, Store, TracingRecoveryListener,
};

pub use bulwark_core::{
    BulkCacheLoadingError, BulkCacheWritingError, CacheLoadingError, CacheWritingError,
    LoaderWriterFailure, ObliterationScope, OperationKind, RecoveryEvent, ResilienceConfig,
    ResilienceError, ResilienceResult, StoreAccessError,
};
