//! Failure recovery for cache storage tiers.
//!
//! When the primary storage tier fails an operation, the cache core hands
//! the failure to a [`ResilienceStrategy`]. The strategy restores the tier
//! to a consistent state by obliterating the implicated entries through a
//! [`RecoveryStore`], then produces the operation's result: a fallback read
//! or write against the [`LoaderWriter`], a re-raised loader/writer failure,
//! or a value that is safe to treat as a miss.
//!
//! # Example
//!
//! ```ignore
//! let strategy = RobustLoaderWriterStrategy::new(store, loader_writer);
//!
//! match cache_tier.get(&key) {
//!     Ok(value) => Ok(value),
//!     Err(failure) => strategy.get_failure(&key, failure),
//! }
//! ```
//!
//! Operations can also be resolved uniformly through
//! [`ResilienceStrategy::resolve`] with a [`CacheOperation`] variant.

pub mod listener;
pub mod operation;
pub mod recovery_store;
pub mod strategy;
pub mod traits;

pub use listener::{LogPacer, RecoveryListener, TracingRecoveryListener};
pub use operation::{CacheOperation, Resolution};
pub use recovery_store::{DefaultRecoveryStore, RecoveryStore};
pub use strategy::{ResilienceStrategy, RobustLoaderWriterStrategy};
pub use traits::{LoaderWriter, Store};
