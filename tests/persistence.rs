use serde_json::json;
use std::io::Write;
use tempfile::tempdir;
use vecstored::vector::{Metric, StoreError, StoredRecord, VectorStore};

fn record(vector: Vec<f32>, tag: &str) -> StoredRecord {
    StoredRecord {
        vector,
        metadata: json!({"tag": tag}),
        doc: format!("doc for {tag}"),
    }
}

fn log_path(dir: &std::path::Path, collection: &str) -> std::path::PathBuf {
    dir.join("collections").join(collection).join("records.log")
}

#[test]
fn records_survive_restart_without_clean_shutdown() {
    let dir = tempdir().unwrap();

    let store = VectorStore::open(dir.path(), "test_col", Metric::Euclidean).unwrap();
    store.upsert("a", record(vec![1.0, 0.0], "a")).unwrap();
    store.upsert("b", record(vec![0.0, 1.0], "b")).unwrap();
    store.upsert("c", record(vec![1.0, 1.0], "c")).unwrap();
    // no clean shutdown hook exists on purpose, dropping is the crash
    drop(store);

    let store = VectorStore::open(dir.path(), "test_col", Metric::Euclidean).unwrap();
    assert_eq!(store.len(), 3);
    for (id, vector) in [
        ("a", vec![1.0, 0.0]),
        ("b", vec![0.0, 1.0]),
        ("c", vec![1.0, 1.0]),
    ] {
        let fetched = store.get(id).unwrap();
        assert_eq!(fetched.vector, vector);
        assert_eq!(fetched.metadata, json!({"tag": id}));
        assert_eq!(fetched.doc, format!("doc for {id}"));
    }

    let hits = store.search(&[1.0, 0.0], 2).unwrap();
    let ids: Vec<&str> = hits.iter().map(|h| h.id.as_str()).collect();
    assert_eq!(ids, vec!["a", "c"]);
}

#[test]
fn deletes_survive_restart() {
    let dir = tempdir().unwrap();

    let store = VectorStore::open(dir.path(), "test_col", Metric::Euclidean).unwrap();
    store.upsert("keep", record(vec![1.0], "keep")).unwrap();
    store.upsert("gone", record(vec![2.0], "gone")).unwrap();
    store.delete("gone").unwrap();
    drop(store);

    let store = VectorStore::open(dir.path(), "test_col", Metric::Euclidean).unwrap();
    assert_eq!(store.len(), 1);
    assert!(store.get("keep").is_ok());
    assert!(matches!(store.get("gone"), Err(StoreError::NotFound)));
}

#[test]
fn replaced_vector_survives_restart_as_latest() {
    let dir = tempdir().unwrap();

    let store = VectorStore::open(dir.path(), "test_col", Metric::Euclidean).unwrap();
    store.upsert("a", record(vec![1.0, 0.0], "v1")).unwrap();
    store.upsert("a", record(vec![0.0, 1.0], "v2")).unwrap();
    drop(store);

    let store = VectorStore::open(dir.path(), "test_col", Metric::Euclidean).unwrap();
    let fetched = store.get("a").unwrap();
    assert_eq!(fetched.vector, vec![0.0, 1.0]);
    assert_eq!(fetched.metadata, json!({"tag": "v2"}));
}

#[test]
fn torn_tail_is_truncated_and_acknowledged_records_kept() {
    let dir = tempdir().unwrap();

    let store = VectorStore::open(dir.path(), "test_col", Metric::Euclidean).unwrap();
    store.upsert("a", record(vec![1.0, 0.0], "a")).unwrap();
    store.upsert("b", record(vec![0.0, 1.0], "b")).unwrap();
    drop(store);

    // simulate a crash mid-append: garbage after the last complete frame
    let path = log_path(dir.path(), "test_col");
    let mut file = std::fs::OpenOptions::new().append(true).open(&path).unwrap();
    file.write_all(&[0xde, 0xad, 0xbe, 0xef, 0x01]).unwrap();
    drop(file);

    let store = VectorStore::open(dir.path(), "test_col", Metric::Euclidean).unwrap();
    assert_eq!(store.len(), 2);
    assert!(store.get("a").is_ok());
    assert!(store.get("b").is_ok());

    // the log accepts appends again after truncation
    store.upsert("c", record(vec![2.0, 2.0], "c")).unwrap();
    drop(store);
    let store = VectorStore::open(dir.path(), "test_col", Metric::Euclidean).unwrap();
    assert_eq!(store.len(), 3);
}

#[test]
fn dimensionality_is_enforced_across_restarts() {
    let dir = tempdir().unwrap();

    let store = VectorStore::open(dir.path(), "test_col", Metric::Euclidean).unwrap();
    store.upsert("a", record(vec![1.0, 2.0, 3.0], "a")).unwrap();
    drop(store);

    let store = VectorStore::open(dir.path(), "test_col", Metric::Euclidean).unwrap();
    assert_eq!(store.dim(), Some(3));
    assert!(matches!(
        store.upsert("b", record(vec![1.0], "b")),
        Err(StoreError::DimensionMismatch {
            expected: 3,
            got: 1
        })
    ));
}

#[test]
fn reopening_with_conflicting_metric_fails() {
    let dir = tempdir().unwrap();

    let store = VectorStore::open(dir.path(), "test_col", Metric::Euclidean).unwrap();
    store.upsert("a", record(vec![1.0], "a")).unwrap();
    drop(store);

    let err = VectorStore::open(dir.path(), "test_col", Metric::Cosine);
    assert!(matches!(err, Err(StoreError::MetricMismatch { .. })));
}

#[test]
fn compaction_drops_tombstones_and_preserves_live_records() {
    let dir = tempdir().unwrap();

    let store = VectorStore::open(dir.path(), "test_col", Metric::Euclidean).unwrap();
    for i in 0..20u32 {
        store
            .upsert(&format!("id:{i}"), record(vec![i as f32, 1.0], "x"))
            .unwrap();
    }
    for i in 0..10u32 {
        store.delete(&format!("id:{i}")).unwrap();
    }
    let bytes_before = store.info().log_bytes;

    assert!(store.compact().unwrap());
    let info = store.info();
    assert_eq!(info.live_count, 10);
    assert_eq!(info.total_records, 10);
    assert_eq!(info.tombstones, 0);
    assert_eq!(info.compactions, 1);
    assert!(info.log_bytes < bytes_before);
    drop(store);

    let store = VectorStore::open(dir.path(), "test_col", Metric::Euclidean).unwrap();
    assert_eq!(store.len(), 10);
    for i in 10..20u32 {
        assert_eq!(
            store.get(&format!("id:{i}")).unwrap().vector,
            vec![i as f32, 1.0]
        );
    }
    for i in 0..10u32 {
        assert!(matches!(
            store.get(&format!("id:{i}")),
            Err(StoreError::NotFound)
        ));
    }
}

#[test]
fn collections_are_created_on_first_reference() {
    let dir = tempdir().unwrap();

    let store = VectorStore::open(dir.path(), "fresh", Metric::Euclidean).unwrap();
    assert!(store.is_empty());
    assert_eq!(store.dim(), None);

    let collection_dir = dir.path().join("collections").join("fresh");
    assert!(collection_dir.join("manifest.json").exists());
    assert!(collection_dir.join("records.log").exists());
}
