use serde_json::json;
use vecstored::vector::{Metric, StoreError, StoreSettings, StoredRecord, VectorStore};

fn record(vector: Vec<f32>) -> StoredRecord {
    StoredRecord {
        vector,
        metadata: json!({}),
        doc: String::new(),
    }
}

#[test]
fn upsert_then_get_roundtrips() {
    let store = VectorStore::new("test_col", Metric::Euclidean);
    let stored = StoredRecord {
        vector: vec![0.5, -1.25, 3.0],
        metadata: json!({"tag": "A", "rank": 3}),
        doc: "hello world".to_string(),
    };
    store.upsert("vec1", stored.clone()).unwrap();

    let fetched = store.get("vec1").unwrap();
    assert_eq!(fetched, stored);
}

#[test]
fn delete_then_get_is_not_found() {
    let store = VectorStore::new("test_col", Metric::Euclidean);
    store.upsert("vec1", record(vec![1.0, 0.0])).unwrap();
    store.delete("vec1").unwrap();

    assert!(matches!(store.get("vec1"), Err(StoreError::NotFound)));
    assert!(matches!(store.delete("vec1"), Err(StoreError::NotFound)));
}

#[test]
fn dimension_mismatch_leaves_state_unchanged() {
    let store = VectorStore::new("test_col", Metric::Euclidean);
    store.upsert("vec1", record(vec![1.0, 0.0])).unwrap();

    let err = store.upsert("vec2", record(vec![1.0, 0.0, 0.0]));
    assert!(matches!(
        err,
        Err(StoreError::DimensionMismatch {
            expected: 2,
            got: 3
        })
    ));
    assert_eq!(store.len(), 1);
    assert!(matches!(store.get("vec2"), Err(StoreError::NotFound)));

    // replacing an existing id with the wrong dimension must not clobber it
    let err = store.upsert("vec1", record(vec![9.0]));
    assert!(err.is_err());
    assert_eq!(store.get("vec1").unwrap().vector, vec![1.0, 0.0]);
}

#[test]
fn query_dimension_mismatch_is_rejected() {
    let store = VectorStore::new("test_col", Metric::Euclidean);
    store.upsert("vec1", record(vec![1.0, 0.0])).unwrap();
    assert!(matches!(
        store.search(&[1.0, 0.0, 0.0], 1),
        Err(StoreError::DimensionMismatch { .. })
    ));
}

#[test]
fn search_orders_ascending_and_clamps_k() {
    let store = VectorStore::new("test_col", Metric::Euclidean);
    store.upsert("a", record(vec![1.0, 0.0])).unwrap();
    store.upsert("b", record(vec![0.0, 1.0])).unwrap();
    store.upsert("c", record(vec![1.0, 1.0])).unwrap();

    let hits = store.search(&[1.0, 0.0], 2).unwrap();
    let ids: Vec<&str> = hits.iter().map(|h| h.id.as_str()).collect();
    assert_eq!(ids, vec!["a", "c"]);
    assert!(hits[0].distance.abs() < 1e-6);
    assert!((hits[1].distance - 1.0).abs() < 1e-6);

    let all = store.search(&[1.0, 0.0], 50).unwrap();
    assert_eq!(all.len(), 3);
    assert!(all.windows(2).all(|w| w[0].distance <= w[1].distance));
}

#[test]
fn search_on_empty_collection_returns_nothing() {
    let store = VectorStore::new("test_col", Metric::Euclidean);
    assert!(store.search(&[1.0, 0.0], 5).unwrap().is_empty());
}

#[test]
fn replace_never_serves_the_stale_vector() {
    let store = VectorStore::new("test_col", Metric::Euclidean);
    store.upsert("a", record(vec![0.0, 0.0])).unwrap();
    store.upsert("far", record(vec![5.0, 5.0])).unwrap();

    // `a` starts as the closest match to the origin, then moves away
    store.upsert("a", record(vec![100.0, 100.0])).unwrap();

    let hits = store.search(&[0.0, 0.0], 2).unwrap();
    assert_eq!(hits[0].id, "far");
    assert_eq!(hits[1].id, "a");
    assert!((hits[1].distance - (2.0f32 * 100.0 * 100.0).sqrt()).abs() < 1e-2);
}

#[test]
fn equidistant_hits_tie_break_by_id() {
    let store = VectorStore::new("test_col", Metric::Euclidean);
    store.upsert("z", record(vec![0.0, 1.0])).unwrap();
    store.upsert("a", record(vec![1.0, 0.0])).unwrap();
    store.upsert("m", record(vec![0.0, -1.0])).unwrap();

    let hits = store.search(&[0.0, 0.0], 3).unwrap();
    let ids: Vec<&str> = hits.iter().map(|h| h.id.as_str()).collect();
    assert_eq!(ids, vec!["a", "m", "z"]);
}

#[test]
fn cosine_metric_ranks_by_angle() {
    let store = VectorStore::new("test_col", Metric::Cosine);
    store.upsert("same_dir", record(vec![2.0, 0.0])).unwrap();
    store.upsert("diag", record(vec![1.0, 1.0])).unwrap();
    store.upsert("ortho", record(vec![0.0, 3.0])).unwrap();

    let hits = store.search(&[1.0, 0.0], 3).unwrap();
    let ids: Vec<&str> = hits.iter().map(|h| h.id.as_str()).collect();
    assert_eq!(ids, vec!["same_dir", "diag", "ortho"]);
    assert!(hits[0].distance.abs() < 1e-6);
    assert!((hits[2].distance - 1.0).abs() < 1e-6);
}

#[test]
fn parallel_and_serial_scans_agree() {
    let serial = VectorStore::with_settings(
        "test_col",
        Metric::Euclidean,
        StoreSettings {
            parallel_scan: false,
            ..StoreSettings::default()
        },
    );
    let parallel = VectorStore::with_settings(
        "test_col",
        Metric::Euclidean,
        StoreSettings {
            parallel_scan: true,
            parallel_scan_min: 2,
            ..StoreSettings::default()
        },
    );

    for i in 0..200u32 {
        let v = vec![(i % 17) as f32, (i % 5) as f32, (i % 3) as f32];
        serial.upsert(&format!("id:{i}"), record(v.clone())).unwrap();
        parallel.upsert(&format!("id:{i}"), record(v)).unwrap();
    }

    let query = [4.0, 2.0, 1.0];
    let from_serial = serial.search(&query, 25).unwrap();
    let from_parallel = parallel.search(&query, 25).unwrap();
    let serial_ids: Vec<&str> = from_serial.iter().map(|h| h.id.as_str()).collect();
    let parallel_ids: Vec<&str> = from_parallel.iter().map(|h| h.id.as_str()).collect();
    assert_eq!(serial_ids, parallel_ids);
}

#[test]
fn search_results_reflect_latest_metadata() {
    let store = VectorStore::new("test_col", Metric::Euclidean);
    store
        .upsert(
            "a",
            StoredRecord {
                vector: vec![1.0, 0.0],
                metadata: json!({"rev": 1}),
                doc: "first".to_string(),
            },
        )
        .unwrap();
    store
        .upsert(
            "a",
            StoredRecord {
                vector: vec![1.0, 0.0],
                metadata: json!({"rev": 2}),
                doc: "second".to_string(),
            },
        )
        .unwrap();

    let hits = store.search(&[1.0, 0.0], 1).unwrap();
    assert_eq!(hits[0].metadata, json!({"rev": 2}));
    assert_eq!(hits[0].doc, "second");
}

#[test]
fn info_tracks_counters() {
    let store = VectorStore::new("test_col", Metric::Euclidean);
    store.upsert("a", record(vec![1.0])).unwrap();
    store.upsert("a", record(vec![2.0])).unwrap();
    store.upsert("b", record(vec![3.0])).unwrap();
    store.delete("a").unwrap();

    let info = store.info();
    assert_eq!(info.collection, "test_col");
    assert_eq!(info.dim, Some(1));
    assert_eq!(info.live_count, 1);
    assert_eq!(info.total_records, 4);
    assert_eq!(info.tombstones, 1);
}
