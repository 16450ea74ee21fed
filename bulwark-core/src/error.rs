//! Error types for bulwark resilience handling.
//!
//! Four failure classes flow through this crate:
//!
//! - [`StoreAccessError`]: raised by the primary storage tier. Either a real
//!   access failure, or a pass-through wrapper smuggling a caller error.
//! - [`CacheLoadingError`] / [`CacheWritingError`]: the loader/writer failed
//!   while servicing a single key.
//! - [`BulkCacheLoadingError`] / [`BulkCacheWritingError`]: the same for a
//!   bulk operation, keyed per failing key.
//! - [`ConfigError`]: configuration could not be read or validated.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::hash::Hash;
use std::sync::Arc;
use thiserror::Error;

/// Opaque, shareable error cause.
///
/// Causes are reference counted so that every error in this crate stays
/// `Clone` and a re-raised failure carries the very same cause instance.
pub type ErrorCause = Arc<dyn std::error::Error + Send + Sync + 'static>;

/// Wrap any error into an [`ErrorCause`].
pub fn cause<E>(error: E) -> ErrorCause
where
    E: std::error::Error + Send + Sync + 'static,
{
    Arc::new(error)
}

/// Plain message error, for collaborators that only have text to report.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct MessageError {
    pub message: String,
}

impl MessageError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

// ============================================================================
// STORAGE TIER FAILURES
// ============================================================================

/// Failure raised by the primary storage tier.
#[derive(Debug, Clone, Error)]
pub enum StoreAccessError {
    /// The tier could not service the operation.
    #[error("Store access failed: {cause}")]
    Access { cause: ErrorCause },

    /// A caller-supplied error tunnelled through the storage layer.
    ///
    /// Not a storage fault: resilience handling unwraps it and surfaces the
    /// cause untouched, without any cleanup. Deprecated escape hatch; hosts
    /// that use [`ResilienceError`] end to end should not need it.
    #[error("Pass-through failure: {cause}")]
    PassThrough { cause: ErrorCause },
}

impl StoreAccessError {
    /// A genuine storage access failure.
    pub fn access<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Access {
            cause: Arc::new(error),
        }
    }

    /// A pass-through wrapper around a caller error.
    pub fn pass_through<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::PassThrough {
            cause: Arc::new(error),
        }
    }

    /// Whether this failure must bypass recovery.
    pub fn is_pass_through(&self) -> bool {
        matches!(self, Self::PassThrough { .. })
    }

    /// The underlying cause.
    pub fn cause(&self) -> &ErrorCause {
        match self {
            Self::Access { cause } | Self::PassThrough { cause } => cause,
        }
    }
}

// ============================================================================
// LOADER / WRITER FAILURES
// ============================================================================

/// The loader failed to produce a value.
#[derive(Debug, Clone, Error)]
#[error("Cache loading failed for key {key:?}: {cause}")]
pub struct CacheLoadingError<K> {
    pub key: Option<K>,
    #[source]
    pub cause: ErrorCause,
}

impl<K> CacheLoadingError<K> {
    pub fn new(key: Option<K>, cause: ErrorCause) -> Self {
        Self { key, cause }
    }
}

/// The writer failed to persist a mapping.
#[derive(Debug, Clone, Error)]
#[error("Cache writing failed for key {key:?}: {cause}")]
pub struct CacheWritingError<K> {
    pub key: Option<K>,
    #[source]
    pub cause: ErrorCause,
}

impl<K> CacheWritingError<K> {
    pub fn new(key: Option<K>, cause: ErrorCause) -> Self {
        Self { key, cause }
    }
}

/// A bulk load where some keys failed.
///
/// `successes` holds whatever the loader did manage to produce.
#[derive(Clone, Error)]
#[error("Bulk cache loading failed for {} key(s), {} succeeded", .failures.len(), .successes.len())]
pub struct BulkCacheLoadingError<K, V> {
    pub failures: HashMap<K, ErrorCause>,
    pub successes: HashMap<K, Option<V>>,
}

impl<K: Eq + Hash, V> BulkCacheLoadingError<K, V> {
    pub fn new(failures: HashMap<K, ErrorCause>, successes: HashMap<K, Option<V>>) -> Self {
        Self {
            failures,
            successes,
        }
    }

    /// Keys the loader failed on.
    pub fn failed_keys(&self) -> impl Iterator<Item = &K> {
        self.failures.keys()
    }
}

impl<K: fmt::Debug, V> fmt::Debug for BulkCacheLoadingError<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BulkCacheLoadingError")
            .field("failures", &self.failures)
            .field("successes", &self.successes.len())
            .finish()
    }
}

/// A bulk write where some keys failed.
#[derive(Debug, Clone, Error)]
#[error("Bulk cache writing failed for {} key(s), {} succeeded", .failures.len(), .successes.len())]
pub struct BulkCacheWritingError<K> {
    pub failures: HashMap<K, ErrorCause>,
    pub successes: HashSet<K>,
}

impl<K: Eq + Hash> BulkCacheWritingError<K> {
    pub fn new(failures: HashMap<K, ErrorCause>, successes: HashSet<K>) -> Self {
        Self {
            failures,
            successes,
        }
    }

    /// Keys the writer failed on.
    pub fn failed_keys(&self) -> impl Iterator<Item = &K> {
        self.failures.keys()
    }
}

/// A single-key loader/writer failure handed back by the cache core.
///
/// Conditional operations may consult the loader, the writer, or both, so
/// either kind can arrive as the secondary failure.
#[derive(Debug, Clone, Error)]
pub enum LoaderWriterFailure<K> {
    #[error(transparent)]
    Loading(#[from] CacheLoadingError<K>),

    #[error(transparent)]
    Writing(#[from] CacheWritingError<K>),
}

// ============================================================================
// MASTER ERROR
// ============================================================================

/// Every outcome a resilience handler may surface to the cache caller.
///
/// Storage failures never appear here: they are either recovered from or
/// translated into one of these variants.
#[derive(Debug, Clone, Error)]
pub enum ResilienceError<K, V> {
    /// The unwrapped cause of a pass-through failure, surfaced verbatim.
    #[error(transparent)]
    PassThrough(ErrorCause),

    #[error(transparent)]
    Loading(#[from] CacheLoadingError<K>),

    #[error(transparent)]
    Writing(#[from] CacheWritingError<K>),

    #[error(transparent)]
    BulkLoading(#[from] BulkCacheLoadingError<K, V>),

    #[error(transparent)]
    BulkWriting(#[from] BulkCacheWritingError<K>),
}

impl<K, V> From<LoaderWriterFailure<K>> for ResilienceError<K, V> {
    fn from(failure: LoaderWriterFailure<K>) -> Self {
        match failure {
            LoaderWriterFailure::Loading(e) => Self::Loading(e),
            LoaderWriterFailure::Writing(e) => Self::Writing(e),
        }
    }
}

impl<K, V> ResilienceError<K, V> {
    /// The innermost cause for single-key variants and pass-through.
    pub fn cause(&self) -> Option<&ErrorCause> {
        match self {
            Self::PassThrough(cause) => Some(cause),
            Self::Loading(e) => Some(&e.cause),
            Self::Writing(e) => Some(&e.cause),
            Self::BulkLoading(_) | Self::BulkWriting(_) => None,
        }
    }
}

/// Result type alias for resilience handlers.
pub type ResilienceResult<T, K, V> = Result<T, ResilienceError<K, V>>;

// ============================================================================
// CONFIGURATION FAILURES
// ============================================================================

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

// =============================================================================
// TESTS
// =============================================================================
