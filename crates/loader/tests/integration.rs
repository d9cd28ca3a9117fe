pub mod fixtures;

use fixtures::*;
use smuggler_loader::{
    AppRouter, BulkLoader, Connection, FormatRegistry, LoadError, MemoryStore, ModelId, Record,
    SerializedStream,
};

#[test]
fn test_single_stream_is_loaded_and_committed() {
    let store = setup_store();
    let mut conn = store.connect("default");

    let loaded = BulkLoader::default().load(&mut conn, [books([1, 2])]).expect("load failed");

    assert_eq!(loaded, 2);
    assert_eq!(store.count(BOOK), 2);
    assert_eq!(store.rows(BOOK)[1].1["title"], "library.book #2");
    assert_eq!(store.commits(), 1);
    assert_eq!(store.executed().len(), 1);
    assert!(conn.is_closed(), "connection must be closed after commit");
}

#[test]
fn test_malformed_record_rolls_back_earlier_streams() {
    let store = setup_store();
    let mut conn = store.connect("default");
    let malformed = SerializedStream::from_bytes("json", r#"[{"model": "library.book", "pk": "#);

    let err = BulkLoader::default().load(&mut conn, [books([1]), malformed]).unwrap_err();

    assert!(err.is_validation(), "{err}");
    assert_eq!(store.total(), 0);
    assert_eq!(store.commits(), 0);
    assert_eq!(store.rollbacks(), 1);
    assert!(!conn.is_managed(), "managed mode must be left after rollback");
}

#[test]
fn test_one_reset_statement_per_touched_model() {
    let store = setup_store();
    let mut conn = store.connect("default");

    let loaded = BulkLoader::default()
        .load(&mut conn, [books([1, 2]), authors([1, 2]), books([3])])
        .expect("load failed");

    assert_eq!(loaded, 5);
    let executed = store.executed();
    assert_eq!(executed.len(), 2);
    assert!(executed.iter().any(|sql| sql.contains("\"library_book\"")));
    assert!(executed.iter().any(|sql| sql.contains("\"library_author\"")));
}

#[test]
fn test_empty_batch_still_commits() {
    let store = setup_store();
    let mut conn = store.connect("default");

    let loaded = BulkLoader::default().load(&mut conn, Vec::new()).expect("load failed");

    assert_eq!(loaded, 0);
    assert_eq!(store.commits(), 1);
    assert!(store.executed().is_empty());
    assert!(conn.is_closed());
}

#[test]
fn test_streams_without_objects_issue_no_resets() {
    let store = setup_store();
    let mut conn = store.connect("default");
    let empty = [
        SerializedStream::from_bytes("json", "[]"),
        SerializedStream::from_bytes("jsonl", ""),
        SerializedStream::from_bytes("csv", "model,pk,title\n"),
    ];

    assert_eq!(BulkLoader::default().load(&mut conn, empty).unwrap(), 0);
    assert!(store.executed().is_empty());
    assert_eq!(store.commits(), 1);
}

#[test]
fn test_sequences_follow_loaded_keys() {
    let store = setup_store();
    let mut conn = store.connect("default");
    BulkLoader::default().load(&mut conn, [books([4, 9, 2])]).unwrap();

    assert_eq!(store.sequence(BOOK), 9);

    let next = SerializedStream::from_bytes(
        "jsonl",
        r#"{"model": "library.book", "fields": {"title": "Key from sequence"}}"#,
    );
    BulkLoader::default().load(&mut conn, [next]).unwrap();
    assert_eq!(store.rows(BOOK).last().map(|(pk, _)| *pk), Some(10));
}

#[test]
fn test_mixed_formats_in_one_batch() {
    let store = setup_store();
    let mut conn = store.connect("default");
    let batch = [
        books([1]),
        SerializedStream::from_bytes(
            "ndjson",
            "{\"model\": \"library.author\", \"pk\": 1, \"fields\": {\"name\": \"Austen\"}}\n",
        ),
        SerializedStream::from_bytes("csv", "model,pk,title\nlibrary.book,2,Emma\n"),
    ];

    assert_eq!(BulkLoader::default().load(&mut conn, batch).unwrap(), 3);
    assert_eq!(store.count(BOOK), 2);
    assert_eq!(store.count(AUTHOR), 1);
}

#[test]
fn test_rejected_objects_are_skipped_silently() {
    let store = setup_store();
    let mut conn = store.connect("default");
    let loader = BulkLoader::builder().policy(AppRouter::new().route("library", "replica")).build();
    let entries = json_stream(ENTRY, "body", [1, 2]);

    let loaded = loader.load(&mut conn, [books([1, 2, 3]), entries]).expect("load failed");

    assert_eq!(loaded, 2);
    assert_eq!(store.count(BOOK), 0);
    assert_eq!(store.count(ENTRY), 2);
    let executed = store.executed();
    assert_eq!(executed.len(), 1, "only accepted models are reset");
    assert!(executed[0].contains("\"archive_entry\""));
}

#[test]
fn test_all_rejected_means_no_resets() {
    let store = setup_store();
    let mut conn = store.connect("default");
    let loader = BulkLoader::builder().policy(|_: &str, _: &ModelId| false).build();

    assert_eq!(loader.load(&mut conn, [books([1, 2])]).unwrap(), 0);
    assert!(store.executed().is_empty());
    assert_eq!(store.commits(), 1);
}

#[test]
fn test_policy_sees_connection_alias() {
    let store = setup_store();
    let mut replica = store.connect("replica");
    let loader = BulkLoader::builder().policy(AppRouter::new().route("library", "replica")).build();

    assert_eq!(loader.load(&mut replica, [books([1])]).unwrap(), 1);
    assert_eq!(replica.alias(), "replica");
}

#[test]
fn test_unexpected_error_is_returned_unchanged() {
    let store = setup_store();
    let mut conn = FlakyConnection::new(store.connect("default"));
    conn.fail_persist_after = Some(2);

    let err = BulkLoader::default().load(&mut conn, [books([1, 2, 3])]).unwrap_err();

    assert_eq!(err.to_string(), injected_error().to_string());
    assert!(!err.is_validation());
    assert_eq!(store.total(), 0);
    assert_eq!(store.rollbacks(), 1);
    assert!(!conn.inner.is_managed());
}

#[test]
fn test_failed_reset_rolls_back() {
    let store = setup_store();
    let mut conn = FlakyConnection::new(store.connect("default"));
    conn.fail_execute = true;

    let err = BulkLoader::default().load(&mut conn, [books([1])]).unwrap_err();

    assert!(matches!(err, LoadError::Storage { .. }));
    assert_eq!(store.total(), 0);
    assert_eq!(store.rollbacks(), 1);
}

#[test]
fn test_failed_commit_rolls_back() {
    let store = setup_store();
    let mut conn = FlakyConnection::new(store.connect("default"));
    conn.fail_commit = true;

    let err = BulkLoader::default().load(&mut conn, [books([1])]).unwrap_err();

    assert_eq!(err.to_string(), injected_error().to_string());
    assert_eq!(store.total(), 0);
    assert_eq!(store.rollbacks(), 1);
}

#[test]
fn test_rollback_failure_does_not_mask_the_cause() {
    let store = setup_store();
    let mut conn = FlakyConnection::new(store.connect("default"));
    conn.fail_persist_after = Some(0);
    conn.fail_rollback = true;

    let err = BulkLoader::default().load(&mut conn, [books([1])]).unwrap_err();

    assert_eq!(err.to_string(), injected_error().to_string());
    assert_eq!(store.total(), 0);
}

#[test]
fn test_schema_violation_aborts_the_batch() {
    let store = setup_store();
    let mut conn = store.connect("default");
    let untitled = SerializedStream::from_bytes(
        "json",
        r#"[{"model": "library.book", "pk": 5, "fields": {"title": null}}]"#,
    );

    let err = BulkLoader::default().load(&mut conn, [books([1, 2]), untitled]).unwrap_err();

    assert!(err.is_validation());
    assert!(err.to_string().contains("title"), "{err}");
    assert_eq!(store.total(), 0);
}

#[test]
fn test_unknown_format_aborts_the_batch() {
    let store = setup_store();
    let mut conn = store.connect("default");
    let xml = SerializedStream::from_bytes("xml", "<objects/>");

    let err = BulkLoader::default().load(&mut conn, [books([1]), xml]).unwrap_err();

    assert!(matches!(err, LoadError::UnknownFormat { .. }));
    assert_eq!(store.total(), 0);
}

#[test]
fn test_custom_registry_limits_formats() {
    let store = setup_store();
    let mut conn = store.connect("default");
    let mut registry = FormatRegistry::new();
    registry.register("fixture", smuggler_loader::format::JsonFixtures);
    let loader = BulkLoader::builder().registry(registry).build();

    assert!(loader.load(&mut conn, [books([1])]).is_err(), "json is not registered");
    let stream = SerializedStream::from_bytes("fixture", r#"[{"model": "library.author", "pk": 1, "fields": {"name": "Woolf"}}]"#);
    assert_eq!(loader.load(&mut conn, [stream]).unwrap(), 1);
}

#[test]
fn test_existing_rows_survive_a_failed_batch() {
    let store = setup_store();
    let mut conn = store.connect("default");
    BulkLoader::default().load(&mut conn, [books([1])]).unwrap();

    let broken = SerializedStream::from_bytes("csv", "model,pk,title\nlibrary.book,x,Emma\n");
    BulkLoader::default().load(&mut conn, [books([2, 3]), broken]).unwrap_err();

    assert_eq!(store.count(BOOK), 1);
    assert_eq!(store.commits(), 1);
}

#[test]
fn test_fixture_files_are_loaded_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("authors.csv");
    std::fs::write(&path, "model,pk,name\nlibrary.author,1,Austen\nlibrary.author,2,Woolf\n").unwrap();

    let store = setup_store();
    let mut conn = store.connect("default");
    let loader = BulkLoader::default();
    let stream = SerializedStream::open(&path, loader.registry()).unwrap();

    assert_eq!(loader.load(&mut conn, [stream]).unwrap(), 2);
    assert_eq!(store.sequence(AUTHOR), 2);
}

#[test]
fn test_cleanup_failure_after_commit_keeps_the_count() {
    let store = setup_store();
    let mut conn = FlakyConnection::new(store.connect("default"));
    conn.fail_leave = true;
    conn.fail_close = true;

    let loaded = BulkLoader::default().load(&mut conn, [books([1, 2])]).expect("commit succeeded");

    assert_eq!(loaded, 2);
    assert_eq!(store.count(BOOK), 2);
    assert_eq!(store.commits(), 1);
    assert_eq!(store.rollbacks(), 0);
}

#[test]
fn test_concurrent_load_cannot_erase_a_committed_batch() {
    let store = setup_store();
    let mut open = store.connect("default");
    let mut loader_conn = store.connect("default");

    open.begin_managed().unwrap();
    let err = BulkLoader::default().load(&mut loader_conn, [books([1])]).unwrap_err();
    assert!(matches!(err, LoadError::Transaction { .. }), "{err}");

    open.leave_managed().unwrap();
    assert_eq!(BulkLoader::default().load(&mut loader_conn, [books([1])]).unwrap(), 1);

    let emma = Record::new(ModelId::parse(BOOK).unwrap()).with_pk(2).with_field("title", "Emma");
    open.begin_managed().unwrap();
    open.persist(&emma).unwrap();
    open.commit().unwrap();
    open.leave_managed().unwrap();

    let keys: Vec<i64> = store.rows(BOOK).into_iter().map(|(pk, _)| pk).collect();
    assert_eq!(keys, [1, 2]);
}

#[test]
fn test_every_touched_model_gets_its_own_reset() {
    let store = MemoryStore::builder()
        .model("shop_eu.item", ["name"])
        .model("shop.order", ["name"])
        .build()
        .unwrap();
    let mut conn = store.connect("default");
    let batch = SerializedStream::from_bytes(
        "jsonl",
        concat!(
            "{\"model\": \"shop_eu.item\", \"pk\": 5, \"fields\": {\"name\": \"lamp\"}}\n",
            "{\"model\": \"shop.order\", \"pk\": 9, \"fields\": {\"name\": \"#9\"}}\n",
        ),
    );

    assert_eq!(BulkLoader::default().load(&mut conn, [batch]).unwrap(), 2);
    assert_eq!((store.sequence("shop_eu.item"), store.sequence("shop.order")), (5, 9));
}
