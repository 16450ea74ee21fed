//! Bulwark Core - Failure Taxonomy and Diagnostics Types
//!
//! Pure data types shared by the bulwark crates: the storage and
//! loader/writer failure taxonomy, the diagnostic events produced during
//! recovery, and strategy configuration. No recovery logic lives here.

pub mod config;
pub mod error;
pub mod event;

pub use config::{ResilienceConfig, DEFAULT_INCONSISTENCY_LOG_INTERVAL_MS};
pub use error::{
    cause, BulkCacheLoadingError, BulkCacheWritingError, CacheLoadingError, CacheWritingError,
    ConfigError, ErrorCause, LoaderWriterFailure, MessageError, ResilienceError,
    ResilienceResult, StoreAccessError,
};
pub use event::{ObliterationScope, OperationKind, RecoveryEvent};

use chrono::{DateTime, Utc};

/// Timestamp type using UTC timezone.
pub type Timestamp = DateTime<Utc>;
