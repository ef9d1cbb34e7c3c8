// tests/reload.rs

//! Snapshot cache reload behavior: idempotence, atomicity, and corrupt
//! artifact handling.

mod common;

use advisor::UpdatesRequest;
use advisor::resolver;
use advisor::snapshot::SnapshotStore;
use std::fs;

fn query(snapshot: &advisor::Snapshot) -> String {
    let req = UpdatesRequest::for_packages(vec![
        "mypkg-1.0-1.x86_64".to_string(),
        "modpkg-1.0-1.x86_64".to_string(),
        "ghost-1.0-1.x86_64".to_string(),
    ]);
    serde_json::to_string(&resolver::updates(snapshot, &req)).unwrap()
}

#[test]
fn test_reload_idempotence() {
    let (_dir, path) = common::artifact();

    let store = SnapshotStore::new();
    let v1 = store.load_from(&path).unwrap();
    let first = store.current().unwrap();

    let v2 = store.load_from(&path).unwrap();
    let second = store.current().unwrap();

    assert_eq!(v1, v2);
    assert_eq!(query(&first), query(&second));
}

#[test]
fn test_reload_atomicity_readers_keep_old_snapshot() {
    let (dir, path) = common::artifact();

    let store = SnapshotStore::new();
    store.load_from(&path).unwrap();
    let reader = store.current().unwrap();
    let before = query(&reader);

    // A newer artifact replaces the snapshot mid-flight.
    let v2_path = dir.path().join("advisor-v2.db");
    common::write_artifact(&v2_path, common::EXPORTED_V2).unwrap();
    store.load_from(&v2_path).unwrap();

    // The in-flight reader still observes the old snapshot wholesale;
    // new readers get the new one.
    assert_eq!(query(&reader), before);
    let new_reader = store.current().unwrap();
    assert_eq!(new_reader.version(), store.version());
    assert_ne!(reader.version(), new_reader.version());
}

#[test]
fn test_corrupt_artifact_keeps_previous_snapshot() {
    let (dir, path) = common::artifact();

    let store = SnapshotStore::new();
    let v1 = store.load_from(&path).unwrap();

    let bad_path = dir.path().join("corrupt.db");
    fs::write(&bad_path, b"this is not a sqlite artifact").unwrap();

    let err = store.load_from(&bad_path).unwrap_err();
    assert!(matches!(err, advisor::Error::CorruptArtifact(_)));

    // The previous snapshot stays live.
    assert!(store.is_ready());
    assert_eq!(store.version(), Some(v1));
}

#[test]
fn test_missing_dbchange_is_corrupt() {
    let (dir, path) = common::artifact();
    {
        let conn = rusqlite::Connection::open(&path).unwrap();
        conn.execute("DELETE FROM dbchange", []).unwrap();
    }

    let store = SnapshotStore::new();
    let err = store.load_from(&path).unwrap_err();
    assert!(matches!(err, advisor::Error::CorruptArtifact(_)));
    assert!(!store.is_ready());
    drop(dir);
}

#[test]
fn test_dangling_reference_is_corrupt() {
    let (dir, path) = common::artifact();
    {
        let conn = rusqlite::Connection::open(&path).unwrap();
        // Reference a repository that does not exist.
        conn.execute("INSERT INTO pkg_repo VALUES (1001, 999)", [])
            .unwrap();
    }

    let err = advisor::snapshot::load(&path).unwrap_err();
    assert!(matches!(err, advisor::Error::CorruptArtifact(_)));
    drop(dir);
}

#[test]
fn test_repo_lookup_exact_vs_pattern() {
    let (_dir, path) = common::artifact();
    let snap = advisor::snapshot::load(&path).unwrap();

    // Exact lookup takes the label verbatim; it is not a pattern.
    assert_eq!(snap.repo_ids_by_label("my-repo").len(), 1);
    assert!(snap.repo_ids_by_label("repo").is_empty());
    assert!(snap.repo_ids_by_label("my-.*").is_empty());

    let pattern = regex::Regex::new("repo$").unwrap();
    assert_eq!(snap.repo_ids_matching(&pattern).len(), 2);
}

#[test]
fn test_snapshot_exposes_version_identity() {
    let (_dir, path) = common::artifact();
    let snap = advisor::snapshot::load(&path).unwrap();
    assert_eq!(
        snap.version().unwrap().to_rfc3339(),
        "2024-05-01T10:00:00+00:00"
    );
    let change = snap.dbchange.as_ref().unwrap();
    assert_eq!(change.exported, change.last_change);
}
