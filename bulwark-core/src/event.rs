//! Diagnostic events emitted while recovering from storage failures.

use crate::{ErrorCause, StoreAccessError, Timestamp};
use chrono::Utc;
use serde::{Serialize, Serializer};
use std::fmt;

/// Cache operation discriminator, used to label diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Get,
    ContainsKey,
    Put,
    Remove,
    Clear,
    PutIfAbsent,
    ConditionalRemove,
    Replace,
    ConditionalReplace,
    GetAll,
    PutAll,
    RemoveAll,
}

impl OperationKind {
    /// Whether the operation addresses a collection of keys.
    pub fn is_bulk(&self) -> bool {
        matches!(self, Self::GetAll | Self::PutAll | Self::RemoveAll)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "get",
            Self::ContainsKey => "contains_key",
            Self::Put => "put",
            Self::Remove => "remove",
            Self::Clear => "clear",
            Self::PutIfAbsent => "put_if_absent",
            Self::ConditionalRemove => "conditional_remove",
            Self::Replace => "replace",
            Self::ConditionalReplace => "conditional_replace",
            Self::GetAll => "get_all",
            Self::PutAll => "put_all",
            Self::RemoveAll => "remove_all",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The set of entries an obliteration addresses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "scope", content = "keys")]
pub enum ObliterationScope<K> {
    /// A single key.
    Key(K),
    /// A collection of keys.
    Keys(Vec<K>),
    /// Every entry in the tier.
    All,
}

impl<K> ObliterationScope<K> {
    /// Number of keys addressed, `None` for the whole tier.
    pub fn key_count(&self) -> Option<usize> {
        match self {
            Self::Key(_) => Some(1),
            Self::Keys(keys) => Some(keys.len()),
            Self::All => None,
        }
    }
}

/// One recovery attempt: which operation failed, what was evicted, and why.
#[derive(Debug, Clone, Serialize)]
pub struct RecoveryEvent<K> {
    pub operation: OperationKind,
    pub scope: ObliterationScope<K>,
    /// Keys addressed by `scope`, `None` for the whole tier.
    pub key_count: Option<usize>,
    /// The storage failure that triggered recovery.
    #[serde(serialize_with = "serialize_cause")]
    pub cause: ErrorCause,
    pub occurred_at: Timestamp,
}

impl<K> RecoveryEvent<K> {
    pub fn new(operation: OperationKind, scope: ObliterationScope<K>, trigger: &StoreAccessError) -> Self {
        Self {
            operation,
            key_count: scope.key_count(),
            scope,
            cause: trigger.cause().clone(),
            occurred_at: Utc::now(),
        }
    }
}

fn serialize_cause<S: Serializer>(cause: &ErrorCause, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(cause)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MessageError;

    #[test]
    fn test_scope_key_count() {
        assert_eq!(ObliterationScope::Key("a").key_count(), Some(1));
        assert_eq!(ObliterationScope::Keys(vec!["a", "b"]).key_count(), Some(2));
        assert_eq!(ObliterationScope::<&str>::All.key_count(), None);
    }

    #[test]
    fn test_bulk_operation_kinds() {
        assert!(OperationKind::GetAll.is_bulk());
        assert!(OperationKind::RemoveAll.is_bulk());
        assert!(!OperationKind::Clear.is_bulk());
        assert_eq!(OperationKind::PutIfAbsent.to_string(), "put_if_absent");
    }

    #[test]
    fn test_event_serializes_cause_as_text() {
        let trigger = StoreAccessError::access(MessageError::new("segment corrupt"));
        let event = RecoveryEvent::new(OperationKind::Get, ObliterationScope::Key(42u32), &trigger);

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["operation"], "get");
        assert_eq!(json["scope"]["scope"], "key");
        assert_eq!(json["scope"]["keys"], 42);
        assert_eq!(json["cause"], "segment corrupt");
        assert_eq!(json["key_count"], 1);
    }

    #[test]
    fn test_event_key_count_follows_scope() {
        let trigger = StoreAccessError::access(MessageError::new("x"));
        let bulk = RecoveryEvent::new(OperationKind::RemoveAll, ObliterationScope::Keys(vec![1u8, 2, 3]), &trigger);
        assert_eq!(bulk.key_count, Some(3));

        let all = RecoveryEvent::new(OperationKind::Clear, ObliterationScope::<u8>::All, &trigger);
        assert_eq!(all.key_count, None);
    }

    #[test]
    fn test_event_shares_trigger_cause() {
        let trigger = StoreAccessError::access(MessageError::new("x"));
        let event = RecoveryEvent::new(OperationKind::Clear, ObliterationScope::<u8>::All, &trigger);
        assert!(std::sync::Arc::ptr_eq(&event.cause, trigger.cause()));
    }
}
