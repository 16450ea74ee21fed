//! Recovery protocol tests.
//!
//! Exercises every handler against recording collaborators, checking the
//! three observable effects of a failure: what was obliterated, what the
//! loader/writer saw, and what reached the caller.

use bulwark_resilience::InMemoryStore;
use bulwark_test_utils::*;
use std::collections::HashMap;
use std::sync::Arc;

// ============================================================================
// PASS-THROUGH
// ============================================================================

#[test]
fn test_pass_through_on_get_skips_cleanup_and_loader() {
    let h = Harness::with_records(vec![(1, "one".to_string())]);
    let failure = pass_through_failure("caller supplied");
    let expected = Arc::clone(failure.cause());

    let err = h.strategy.get_failure(&1, failure).unwrap_err();
    match err {
        ResilienceError::PassThrough(cause) => assert!(Arc::ptr_eq(&cause, &expected)),
        other => panic!("expected pass-through, got {other:?}"),
    }
    assert!(h.log.calls().is_empty());
    assert!(h.listener.signals().is_empty());
}

#[test]
fn test_pass_through_wins_over_secondary_failure() {
    let h = Harness::new();
    let err = h
        .strategy
        .remove_failure(&1, pass_through_failure("raw"), Some(writing_failure(1, "w")))
        .unwrap_err();
    assert!(matches!(err, ResilienceError::PassThrough(_)));
    assert_eq!(h.log.store_calls(), 0);
}

// ============================================================================
// GET / PUT FALLBACK
// ============================================================================

#[test]
fn test_get_obliterates_once_before_loading() {
    let h = Harness::with_records(vec![(7, "seven".to_string())]);

    let value = h.strategy.get_failure(&7, access_failure("read failed")).unwrap();

    assert_eq!(value.as_deref(), Some("seven"));
    assert_eq!(h.log.calls(), vec![Call::StoreRemove(7), Call::Load(7)]);
    assert_eq!(h.listener.recovered_count(), 1);
}

#[test]
fn test_get_of_unknown_key_is_absent() {
    let h = Harness::new();
    let value = h.strategy.get_failure(&3, access_failure("read failed")).unwrap();
    assert_eq!(value, None);
}

#[test]
fn test_get_surfaces_loading_error_after_cleanup() {
    let h = Harness::new();
    h.loader_writer.set_unavailable(true);

    let err = h.strategy.get_failure(&4, access_failure("read failed")).unwrap_err();

    match err {
        ResilienceError::Loading(e) => {
            assert_eq!(e.key, Some(4));
            assert_eq!(e.cause.to_string(), "system of record unavailable");
        }
        other => panic!("expected loading error, got {other:?}"),
    }
    assert_eq!(h.log.calls(), vec![Call::StoreRemove(4), Call::Load(4)]);
}

#[test]
fn test_put_writes_through_after_cleanup() {
    let h = Harness::new();

    h.strategy
        .put_failure(&2, &"two".to_string(), access_failure("write failed"))
        .unwrap();

    assert_eq!(h.log.calls(), vec![Call::StoreRemove(2), Call::Write(2)]);
    assert_eq!(h.loader_writer.record(&2).as_deref(), Some("two"));
}

#[test]
fn test_put_surfaces_writing_error() {
    let h = Harness::new();
    h.loader_writer.set_unavailable(true);

    let err = h
        .strategy
        .put_failure(&2, &"two".to_string(), access_failure("write failed"))
        .unwrap_err();
    assert!(matches!(err, ResilienceError::Writing(ref e) if e.key == Some(2)));
}

#[test]
fn test_get_still_loads_when_cleanup_fails() {
    let h = Harness::with_broken_store();
    h.loader_writer.set_unavailable(false);
    h.loader_writer.write(&5, &"five".to_string()).unwrap();

    let value = h.strategy.get_failure(&5, access_failure("read failed")).unwrap();
    assert_eq!(value.as_deref(), Some("five"));
    assert_eq!(h.listener.inconsistent_count(), 1);
    assert_eq!(h.listener.recovered_count(), 0);
}

// ============================================================================
// MISS / NO-OP DEFAULTS
// ============================================================================

#[test]
fn test_contains_key_is_false() {
    let h = Harness::new();
    assert!(!h.strategy.contains_key_failure(&1, access_failure("x")).unwrap());
    assert_eq!(h.log.calls(), vec![Call::StoreRemove(1)]);
}

#[test]
fn test_contains_key_is_false_when_cleanup_fails() {
    let h = Harness::with_broken_store();
    assert!(!h.strategy.contains_key_failure(&1, access_failure("x")).unwrap());

    let signals = h.listener.signals();
    assert_eq!(
        signals,
        vec![Signal::Inconsistent {
            operation: OperationKind::ContainsKey,
            scope: ObliterationScope::Key(1),
            cleanup_error: "Store access failed: eviction failed".to_string(),
        }]
    );
}

#[test]
fn test_clear_obliterates_everything_once() {
    let h = Harness::new();
    h.strategy.clear_failure(access_failure("x")).unwrap();
    assert_eq!(h.log.calls(), vec![Call::StoreClear]);
    assert_eq!(
        h.listener.signals(),
        vec![Signal::Recovered {
            operation: OperationKind::Clear,
            scope: ObliterationScope::All,
        }]
    );
}

#[test]
fn test_remove_without_secondary_failure_is_void() {
    let h = Harness::new();
    h.strategy.remove_failure(&8, access_failure("x"), None).unwrap();
    assert_eq!(h.log.calls(), vec![Call::StoreRemove(8)]);
}

#[test]
fn test_remove_reraises_writer_failure_after_cleanup() {
    let h = Harness::new();
    let secondary = writing_failure(8, "writer rejected");
    let expected = Arc::clone(&secondary.cause);

    let err = h
        .strategy
        .remove_failure(&8, access_failure("x"), Some(secondary))
        .unwrap_err();

    match err {
        ResilienceError::Writing(e) => assert!(Arc::ptr_eq(&e.cause, &expected)),
        other => panic!("expected writing error, got {other:?}"),
    }
    assert_eq!(h.log.calls(), vec![Call::StoreRemove(8)]);
}

#[test]
fn test_replace_is_treated_as_no_prior_value() {
    let h = Harness::with_records(vec![(1, "stale".to_string())]);
    let prior = h
        .strategy
        .replace_failure(&1, &"fresh".to_string(), access_failure("x"), None)
        .unwrap();
    assert_eq!(prior, None);
    assert_eq!(h.log.loader_writer_calls(), 0);
}

#[test]
fn test_conditional_replace_returns_match_hint() {
    let h = Harness::new();
    let old = "a".to_string();
    let new = "b".to_string();

    assert!(h
        .strategy
        .conditional_replace_failure(&1, &old, &new, access_failure("x"), true, None)
        .unwrap());
    assert!(!h
        .strategy
        .conditional_replace_failure(&1, &old, &new, access_failure("x"), false, None)
        .unwrap());
    assert_eq!(h.log.loader_writer_calls(), 0);
}

#[test]
fn test_conditional_remove_returns_presence_hint() {
    let h = Harness::new();
    let value = "v".to_string();

    assert!(h
        .strategy
        .conditional_remove_failure(&1, &value, access_failure("x"), true, None)
        .unwrap());
    assert!(!h
        .strategy
        .conditional_remove_failure(&1, &value, access_failure("x"), false, None)
        .unwrap());
    assert_eq!(h.log.loader_writer_calls(), 0);
    assert_eq!(h.log.store_calls(), 2);
}

#[test]
fn test_conditional_remove_reraises_loading_failure() {
    let h = Harness::new();
    let err = h
        .strategy
        .conditional_remove_failure(
            &1,
            &"v".to_string(),
            access_failure("x"),
            true,
            Some(loading_failure(1, "loader down").into()),
        )
        .unwrap_err();
    assert!(matches!(err, ResilienceError::Loading(_)));
    assert_eq!(h.log.store_calls(), 1);
}

// ============================================================================
// PUT IF ABSENT
// ============================================================================

#[test]
fn test_put_if_absent_returns_differing_loader_value() {
    let h = Harness::new();
    let existing = h
        .strategy
        .put_if_absent_failure(
            &1,
            &"attempted".to_string(),
            Some("present".to_string()),
            access_failure("x"),
            None,
        )
        .unwrap();
    assert_eq!(existing.as_deref(), Some("present"));
}

#[test]
fn test_put_if_absent_equal_or_missing_result_is_absent() {
    let h = Harness::new();
    let attempted = "same".to_string();

    let equal = h
        .strategy
        .put_if_absent_failure(&1, &attempted, Some("same".to_string()), access_failure("x"), None)
        .unwrap();
    assert_eq!(equal, None);

    let missing = h
        .strategy
        .put_if_absent_failure(&1, &attempted, None, access_failure("x"), None)
        .unwrap();
    assert_eq!(missing, None);
}

#[test]
fn test_put_if_absent_reraises_exact_writing_failure() {
    let h = Harness::new();
    let secondary = writing_failure(1, "writer rejected");
    let expected = Arc::clone(&secondary.cause);

    let err = h
        .strategy
        .put_if_absent_failure(
            &1,
            &"v".to_string(),
            Some("other".to_string()),
            access_failure("x"),
            Some(secondary.into()),
        )
        .unwrap_err();

    match err {
        ResilienceError::Writing(e) => {
            assert!(Arc::ptr_eq(&e.cause, &expected));
            assert_eq!(e.key, Some(1));
        }
        other => panic!("expected writing error, got {other:?}"),
    }
    assert_eq!(h.log.calls(), vec![Call::StoreRemove(1)]);
}

// ============================================================================
// BULK OPERATIONS
// ============================================================================

#[test]
fn test_get_all_maps_every_key_to_absent() {
    let h = Harness::with_records(vec![(1, "one".to_string())]);

    let entries = h
        .strategy
        .get_all_failure(&[1, 2], None, access_failure("x"), None)
        .unwrap();

    assert_eq!(entries, HashMap::from([(1, None), (2, None)]));
    assert_eq!(h.log.calls(), vec![Call::StoreRemove(1), Call::StoreRemove(2)]);
    assert_eq!(h.log.loader_writer_calls(), 0);
}

#[test]
fn test_get_all_returns_partially_loaded_unchanged() {
    let h = Harness::new();
    let loaded = HashMap::from([(1, Some("one".to_string())), (2, None)]);

    let entries = h
        .strategy
        .get_all_failure(&[1, 2, 3], Some(loaded.clone()), access_failure("x"), None)
        .unwrap();

    assert_eq!(entries, loaded);
    assert_eq!(h.log.store_calls(), 3);
}

#[test]
fn test_get_all_reraises_bulk_loading_failure() {
    let h = Harness::new();
    let err = h
        .strategy
        .get_all_failure(
            &[1, 2],
            Some(HashMap::new()),
            access_failure("x"),
            Some(bulk_loading_failure(&[2])),
        )
        .unwrap_err();

    match err {
        ResilienceError::BulkLoading(e) => {
            assert_eq!(e.failed_keys().copied().collect::<Vec<_>>(), vec![2]);
        }
        other => panic!("expected bulk loading error, got {other:?}"),
    }
}

#[test]
fn test_put_all_obliterates_entry_keys() {
    let h = Harness::new();
    let entries = HashMap::from([(4, "d".to_string())]);

    h.strategy.put_all_failure(&entries, access_failure("x"), None).unwrap();

    assert_eq!(h.log.calls(), vec![Call::StoreRemove(4)]);
    assert_eq!(h.log.loader_writer_calls(), 0);
}

#[test]
fn test_put_all_reraises_bulk_writing_failure() {
    let h = Harness::new();
    let entries = HashMap::from([(4, "d".to_string()), (5, "e".to_string())]);

    let err = h
        .strategy
        .put_all_failure(&entries, access_failure("x"), Some(bulk_writing_failure(&[5])))
        .unwrap_err();

    assert!(matches!(err, ResilienceError::BulkWriting(ref e) if e.failures.contains_key(&5)));
    assert_eq!(h.log.store_calls(), 2);
}

#[test]
fn test_remove_all_returns_empty_map_and_obliterates_keys() {
    let h = Harness::new();

    let removed = h.strategy.remove_all_failure(&[6, 7], access_failure("x"), None).unwrap();

    assert!(removed.is_empty());
    assert_eq!(h.log.calls(), vec![Call::StoreRemove(6), Call::StoreRemove(7)]);
    assert_eq!(
        h.listener.signals(),
        vec![Signal::Recovered {
            operation: OperationKind::RemoveAll,
            scope: ObliterationScope::Keys(vec![6, 7]),
        }]
    );
}

#[test]
fn test_remove_all_reraises_bulk_writing_failure() {
    let h = Harness::new();
    let err = h
        .strategy
        .remove_all_failure(&[6], access_failure("x"), Some(bulk_writing_failure(&[6])))
        .unwrap_err();
    assert!(matches!(err, ResilienceError::BulkWriting(_)));
    assert_eq!(h.log.store_calls(), 1);
}

#[test]
fn test_bulk_cleanup_failure_is_reported_once() {
    let h = Harness::with_broken_store();

    let removed = h
        .strategy
        .remove_all_failure(&[1, 2, 3], access_failure("x"), None)
        .unwrap();

    assert!(removed.is_empty());
    // Obliteration stops at the first failing key.
    assert_eq!(h.log.calls(), vec![Call::StoreRemove(1)]);
    assert_eq!(h.listener.inconsistent_count(), 1);
}

// ============================================================================
// DISPATCH
// ============================================================================

#[test]
fn test_resolve_matches_typed_handlers() {
    let h = Harness::with_records(vec![(1, "one".to_string())]);

    let resolution = h
        .strategy
        .resolve(CacheOperation::Get { key: 1 }, access_failure("x"))
        .unwrap();
    assert_eq!(resolution.into_value(), Some(Some("one".to_string())));

    let resolution = h
        .strategy
        .resolve(
            CacheOperation::ConditionalRemove {
                key: 1,
                value: "one".to_string(),
                known_to_be_present: true,
                fallback_failure: None,
            },
            access_failure("x"),
        )
        .unwrap();
    assert_eq!(resolution.as_flag(), Some(true));

    let resolution = h
        .strategy
        .resolve(
            CacheOperation::RemoveAll {
                keys: vec![1],
                writer_failure: None,
            },
            access_failure("x"),
        )
        .unwrap();
    assert_eq!(resolution.into_entries(), Some(HashMap::new()));

    let resolution = h.strategy.resolve(CacheOperation::Clear, access_failure("x")).unwrap();
    assert!(matches!(resolution, Resolution::Done));
}

#[test]
fn test_strategy_over_in_memory_store() {
    init_test_tracing();

    let store = Arc::new(InMemoryStore::new());
    store.put(1u32, "stale".to_string()).unwrap();
    store.put(2u32, "kept".to_string()).unwrap();

    let log = CallLog::new();
    let loader_writer = Arc::new(ScriptedLoaderWriter::new(log).with_record(1, "fresh".to_string()));
    let strategy = RobustLoaderWriterStrategy::with_config(
        Arc::clone(&store),
        loader_writer,
        &ResilienceConfig::default(),
    )
    .unwrap();

    let value = strategy.get_failure(&1, access_failure("checksum mismatch")).unwrap();

    assert_eq!(value.as_deref(), Some("fresh"));
    assert_eq!(store.get(&1).unwrap(), None);
    assert_eq!(store.get(&2).unwrap().as_deref(), Some("kept"));

    strategy.clear_failure(access_failure("segment lost")).unwrap();
    assert!(store.is_empty().unwrap());
}
