//! Scan-then-resolve runs against an on-disk record store.

use std::fs;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use mediadedupe::actions::delete::DeletionMode;
use mediadedupe::config::SearchPath;
use mediadedupe::fingerprint::fingerprint_bytes;
use mediadedupe::resolver::{ResolveOptions, Resolver};
use mediadedupe::scanner::{FileTypes, ScanConfig, Scanner};
use mediadedupe::store::{RecordStore, SqliteStore};
use tempfile::tempdir;

use super::common::{scan_tracks, write_track, TagStripper};

#[test]
fn test_tag_only_difference_is_reported_in_dry_run() {
    let lib = tempdir().unwrap();
    let dl = tempdir().unwrap();
    let db = tempdir().unwrap();
    let a = write_track(lib.path(), "a.flac", "title=Song", "SAMPLES-1");
    let b = write_track(dl.path(), "b.mp3", "title=Song (copy)", "SAMPLES-1");

    let store = SqliteStore::open(&db.path().join("audio.db")).unwrap();
    let summary = scan_tracks(
        &store,
        vec![SearchPath::reference(lib.path()), SearchPath::new(dl.path())],
    );
    assert_eq!(summary.recorded, 2);

    let resolution = Resolver::new(&store, ResolveOptions::dry_run())
        .resolve()
        .unwrap();

    assert_eq!(resolution.deletable.len(), 1);
    assert_eq!(resolution.deletable[0].duplicate, b);
    assert_eq!(resolution.deletable[0].original, a);
    assert!(resolution.removed.is_empty());
    assert!(resolution.reference_collisions.is_empty());

    // Dry run touches neither the filesystem nor the store.
    assert!(a.exists());
    assert!(b.exists());
    assert_eq!(store.count().unwrap(), 2);
}

#[test]
fn test_delete_mode_removes_file_and_record() {
    let lib = tempdir().unwrap();
    let dl = tempdir().unwrap();
    let db = tempdir().unwrap();
    let a = write_track(lib.path(), "a.flac", "v1", "PCM");
    let b = write_track(dl.path(), "b.mp3", "v2", "PCM");
    let keep = write_track(dl.path(), "unique.mp3", "v3", "OTHER");
    let b_len = fs::metadata(&b).unwrap().len();

    let store = SqliteStore::open(&db.path().join("audio.db")).unwrap();
    scan_tracks(
        &store,
        vec![SearchPath::reference(lib.path()), SearchPath::new(dl.path())],
    );

    let resolution = Resolver::new(&store, ResolveOptions::deleting(DeletionMode::Permanent))
        .resolve()
        .unwrap();

    assert_eq!(resolution.removed.len(), 1);
    assert_eq!(resolution.removed[0].path, b);
    assert_eq!(resolution.removed[0].bytes, b_len);
    assert_eq!(resolution.bytes_freed(), b_len);
    assert!(!b.exists());
    assert!(a.exists());
    assert!(keep.exists());
    assert!(!store.exists(&b).unwrap());
    assert!(store.exists(&a).unwrap());
    assert_eq!(store.count().unwrap(), 2);
}

#[test]
fn test_reference_collision_is_reported_and_nothing_deleted() {
    let lib = tempdir().unwrap();
    let db = tempdir().unwrap();
    let x = write_track(lib.path(), "x.flac", "one", "SAME");
    let y = write_track(lib.path(), "nested/y.mp3", "two", "SAME");

    let store = SqliteStore::open(&db.path().join("audio.db")).unwrap();
    scan_tracks(&store, vec![SearchPath::reference(lib.path())]);

    let resolution = Resolver::new(&store, ResolveOptions::deleting(DeletionMode::Permanent))
        .resolve()
        .unwrap();

    assert!(resolution.removed.is_empty());
    assert!(resolution.deletable.is_empty());
    assert!(!resolution.reference_collisions.is_empty());
    let collision = &resolution.reference_collisions[0];
    let pair = [collision.first.clone(), collision.second.clone()];
    assert!(pair.contains(&x));
    assert!(pair.contains(&y));
    assert!(x.exists());
    assert!(y.exists());
}

#[test]
fn test_non_reference_duplicates_without_reference_are_ignored() {
    let dl = tempdir().unwrap();
    let db = tempdir().unwrap();
    let c = write_track(dl.path(), "c.mp3", "a", "TWIN");
    let d = write_track(dl.path(), "d.mp3", "b", "TWIN");

    let store = SqliteStore::open(&db.path().join("audio.db")).unwrap();
    scan_tracks(&store, vec![SearchPath::new(dl.path())]);

    let resolution = Resolver::new(&store, ResolveOptions::deleting(DeletionMode::Permanent))
        .resolve()
        .unwrap();

    assert!(!resolution.found_anything());
    assert!(c.exists());
    assert!(d.exists());
}

#[test]
fn test_rescan_is_idempotent() {
    let lib = tempdir().unwrap();
    let db = tempdir().unwrap();
    write_track(lib.path(), "a.flac", "t", "ONE");
    write_track(lib.path(), "b.flac", "t", "TWO");

    let store = SqliteStore::open(&db.path().join("audio.db")).unwrap();
    let first = scan_tracks(&store, vec![SearchPath::reference(lib.path())]);
    let second = scan_tracks(&store, vec![SearchPath::reference(lib.path())]);

    assert_eq!(first.recorded, 2);
    assert_eq!(second.recorded, 0);
    assert_eq!(second.already_recorded, 2);
    assert_eq!(store.count().unwrap(), 2);
}

#[test]
fn test_records_survive_reopening_the_store() {
    let lib = tempdir().unwrap();
    let db = tempdir().unwrap();
    let db_path = db.path().join("audio.db");
    let a = write_track(lib.path(), "a.flac", "t", "KEEP");

    {
        let store = SqliteStore::open(&db_path).unwrap();
        scan_tracks(&store, vec![SearchPath::reference(lib.path())]);
    }

    let store = SqliteStore::open(&db_path).unwrap();
    let found = store
        .find_by_fingerprint(&fingerprint_bytes(b"KEEP"), true)
        .unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].path, a);
}

#[test]
fn test_unreadable_file_does_not_stop_the_scan() {
    let lib = tempdir().unwrap();
    let db = tempdir().unwrap();
    write_track(lib.path(), "good.flac", "t", "FINE");
    fs::write(lib.path().join("broken.flac"), "BAD header").unwrap();
    let bad = fs::canonicalize(lib.path().join("broken.flac")).unwrap();

    let store = SqliteStore::open(&db.path().join("audio.db")).unwrap();
    let summary = scan_tracks(&store, vec![SearchPath::reference(lib.path())]);

    assert_eq!(summary.candidates, 2);
    assert_eq!(summary.recorded, 1);
    assert_eq!(summary.failures.len(), 1);
    assert_eq!(summary.failures[0].path(), bad.as_path());
    assert!(!store.exists(&bad).unwrap());
}

#[test]
fn test_stale_record_is_dropped_on_delete() {
    let lib = tempdir().unwrap();
    let dl = tempdir().unwrap();
    let db = tempdir().unwrap();
    write_track(lib.path(), "a.flac", "t", "GONE");
    let b = write_track(dl.path(), "b.mp3", "t", "GONE");

    let store = SqliteStore::open(&db.path().join("audio.db")).unwrap();
    scan_tracks(
        &store,
        vec![SearchPath::reference(lib.path()), SearchPath::new(dl.path())],
    );
    fs::remove_file(&b).unwrap();

    let resolution = Resolver::new(&store, ResolveOptions::deleting(DeletionMode::Permanent))
        .resolve()
        .unwrap();

    assert_eq!(resolution.removed.len(), 1);
    assert_eq!(resolution.removed[0].bytes, 0);
    assert!(resolution.delete_failures.is_empty());
    assert!(!store.exists(&b).unwrap());
}

#[test]
fn test_cancelled_scan_records_nothing() {
    let lib = tempdir().unwrap();
    let db = tempdir().unwrap();
    for i in 0..5 {
        write_track(lib.path(), &format!("{}.flac", i), "t", &format!("S{}", i));
    }

    let store = SqliteStore::open(&db.path().join("audio.db")).unwrap();
    let flag = Arc::new(AtomicBool::new(true));
    let config = ScanConfig::new(
        vec![SearchPath::reference(lib.path())],
        FileTypes::new(["flac"]),
    )
    .with_shutdown_flag(flag.clone());
    let summary = Scanner::new(&store, &TagStripper, config).scan().unwrap();

    assert!(summary.interrupted);
    assert_eq!(summary.recorded, 0);
    assert_eq!(store.count().unwrap(), 0);

    let resolution = Resolver::new(&store, ResolveOptions::dry_run().with_shutdown_flag(flag))
        .resolve()
        .unwrap();
    assert!(resolution.interrupted);
}

#[test]
fn test_earlier_search_path_wins_for_nested_directories() {
    let lib = tempdir().unwrap();
    let db = tempdir().unwrap();
    let inner = write_track(lib.path(), "inbox/a.mp3", "t", "NEST");

    let store = SqliteStore::open(&db.path().join("audio.db")).unwrap();
    scan_tracks(
        &store,
        vec![
            SearchPath::new(lib.path().join("inbox")),
            SearchPath::reference(lib.path()),
        ],
    );

    let found = store
        .find_by_fingerprint(&fingerprint_bytes(b"NEST"), false)
        .unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].path, inner);
    assert!(store
        .find_by_fingerprint(&fingerprint_bytes(b"NEST"), true)
        .unwrap()
        .is_empty());
}

#[test]
fn test_parent_component_alias_keeps_reference() {
    let root = tempdir().unwrap();
    let db = tempdir().unwrap();
    let a = write_track(&root.path().join("lib"), "a.flac", "t", "ONLY");

    let store = SqliteStore::open(&db.path().join("audio.db")).unwrap();
    let summary = scan_tracks(
        &store,
        vec![
            SearchPath::reference(root.path().join("lib")),
            SearchPath::new(root.path().join("lib/../lib")),
        ],
    );
    assert_eq!(summary.recorded, 1);
    assert_eq!(summary.already_recorded, 1);

    let resolution = Resolver::new(&store, ResolveOptions::deleting(DeletionMode::Permanent))
        .resolve()
        .unwrap();

    assert!(a.exists());
    assert!(resolution.removed.is_empty());
    assert!(store.exists(&a).unwrap());
    assert_eq!(store.count().unwrap(), 1);
}

#[cfg(unix)]
#[test]
fn test_symlinked_search_path_keeps_reference() {
    let root = tempdir().unwrap();
    let db = tempdir().unwrap();
    let lib = root.path().join("lib");
    let a = write_track(&lib, "a.flac", "t", "ONLY");
    let link = root.path().join("link");
    std::os::unix::fs::symlink(&lib, &link).unwrap();

    let store = SqliteStore::open(&db.path().join("audio.db")).unwrap();
    scan_tracks(
        &store,
        vec![SearchPath::reference(&lib), SearchPath::new(&link)],
    );

    let resolution = Resolver::new(&store, ResolveOptions::deleting(DeletionMode::Permanent))
        .resolve()
        .unwrap();

    assert!(a.exists());
    assert!(resolution.removed.is_empty());
    assert!(resolution.delete_failures.is_empty());
    assert!(store.exists(&a).unwrap());
    assert_eq!(store.count().unwrap(), 1);
}

#[test]
fn test_alias_recorded_before_canonical_roots_is_kept() {
    let root = tempdir().unwrap();
    let db = tempdir().unwrap();
    let a = write_track(&root.path().join("lib"), "a.flac", "t", "ONLY");

    let store = SqliteStore::open(&db.path().join("audio.db")).unwrap();
    scan_tracks(&store, vec![SearchPath::reference(root.path().join("lib"))]);
    let alias = root.path().join("lib/../lib/a.flac");
    store
        .upsert(&alias, &fingerprint_bytes(b"ONLY"), false)
        .unwrap();

    let resolution = Resolver::new(&store, ResolveOptions::deleting(DeletionMode::Permanent))
        .resolve()
        .unwrap();

    assert!(a.exists());
    assert!(resolution.removed.is_empty());
    assert_eq!(resolution.aliased.len(), 1);
    assert_eq!(resolution.aliased[0].original, a);
}
