use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::thread;
use std::time::{Duration, Instant};

use glob::Pattern;
use tempfile::TempDir;

use super::cache::RecentFileCache;
use super::relocate::move_into;
use super::scan::{fingerprint, list_matching_files, snapshot, stable_snapshot};
use super::watcher::{PollSummary, WatchConfig, Watcher};
use crate::commands::ingest::{connect_with_retry, count_rows, open_database};
use crate::test_support::{call_export_xml, full_call_export_xml};

fn watch_config(folder: &Path) -> WatchConfig {
    WatchConfig {
        watch_folder: folder.to_path_buf(),
        file_pattern: Pattern::new("*.xml").expect("pattern should compile"),
        poll_interval: Duration::from_millis(10),
        stability_wait: Duration::ZERO,
        dedup_capacity: 16,
    }
}

fn watcher_for(folder: &Path, db_path: &Path) -> Watcher {
    let connection = open_database(db_path).expect("database should open");
    Watcher::new(watch_config(folder), connection).expect("watcher should start")
}

fn file_names(directory: &Path) -> Vec<String> {
    let mut names = fs::read_dir(directory)
        .expect("directory should be readable")
        .map(|entry| {
            entry
                .expect("entry should be readable")
                .file_name()
                .to_string_lossy()
                .into_owned()
        })
        .collect::<Vec<_>>();
    names.sort();
    names
}

#[test]
fn dropped_export_is_imported_and_moved_to_processed() {
    let folder = TempDir::new().expect("temp dir should be created");
    let db_dir = TempDir::new().expect("temp dir should be created");
    let mut watcher = watcher_for(folder.path(), &db_dir.path().join("calls.sqlite"));

    fs::write(folder.path().join("591_20240126100000123.xml"), full_call_export_xml())
        .expect("export should be written");
    fs::write(folder.path().join("notes.txt"), "not an export").expect("file should be written");

    let summary = watcher.poll_once().expect("poll should succeed");

    assert_eq!(
        summary,
        PollSummary {
            processed: 1,
            ..PollSummary::default()
        }
    );
    assert_eq!(
        file_names(&folder.path().join("processed")),
        vec!["591_20240126100000123.xml".to_string()]
    );
    assert!(file_names(&folder.path().join("failed")).is_empty());
    assert!(folder.path().join("notes.txt").exists());
    assert_eq!(count_rows(watcher.connection(), "calls").expect("count calls"), 1);
    assert_eq!(count_rows(watcher.connection(), "units").expect("count units"), 2);
}

#[test]
fn malformed_export_is_moved_to_failed() {
    let folder = TempDir::new().expect("temp dir should be created");
    let db_dir = TempDir::new().expect("temp dir should be created");
    let mut watcher = watcher_for(folder.path(), &db_dir.path().join("calls.sqlite"));

    fs::write(folder.path().join("broken.xml"), "<CallExport><CallId>1</CallId>")
        .expect("export should be written");

    let summary = watcher.poll_once().expect("poll should succeed");

    assert_eq!(summary.failed, 1);
    assert_eq!(
        file_names(&folder.path().join("failed")),
        vec!["broken.xml".to_string()]
    );
    assert_eq!(count_rows(watcher.connection(), "calls").expect("count calls"), 0);
}

#[test]
fn redelivered_export_is_treated_as_already_processed() {
    let folder = TempDir::new().expect("temp dir should be created");
    let db_dir = TempDir::new().expect("temp dir should be created");
    let db_path = db_dir.path().join("calls.sqlite");
    let export = call_export_xml("77", &["E1"]);
    let path = folder.path().join("77_20240126100000001.xml");

    fs::write(&path, &export).expect("export should be written");
    let mut first_watcher = watcher_for(folder.path(), &db_path);
    let first = first_watcher.poll_once().expect("first poll should succeed");
    assert_eq!(first.processed, 1);
    drop(first_watcher);

    fs::write(&path, &export).expect("export should be written again");
    let mut watcher = watcher_for(folder.path(), &db_path);
    let second = watcher.poll_once().expect("second poll should succeed");

    assert_eq!(second.already_processed, 1);
    assert_eq!(
        file_names(&folder.path().join("processed")),
        vec![
            "77_20240126100000001.xml".to_string(),
            "77_20240126100000001_1.xml".to_string(),
        ]
    );
    assert_eq!(count_rows(watcher.connection(), "calls").expect("count calls"), 1);
}

#[test]
fn relocation_appends_suffix_on_collision() {
    let source = TempDir::new().expect("temp dir should be created");
    let destination = TempDir::new().expect("temp dir should be created");

    for expected in ["call.xml", "call_1.xml", "call_2.xml"] {
        let path = source.path().join("call.xml");
        fs::write(&path, expected).expect("file should be written");
        let moved = move_into(&path, destination.path()).expect("move should succeed");

        assert_eq!(moved, destination.path().join(expected));
        assert!(!path.exists());
        assert_eq!(fs::read_to_string(&moved).expect("moved file should read"), expected);
    }

    let path = source.path().join("README");
    fs::write(&path, "a").expect("file should be written");
    move_into(&path, destination.path()).expect("move should succeed");
    fs::write(&path, "b").expect("file should be written");
    let moved = move_into(&path, destination.path()).expect("move should succeed");
    assert_eq!(moved, destination.path().join("README_1"));
}

#[test]
fn recent_file_cache_evicts_oldest_first() {
    let mut cache = RecentFileCache::new(2);

    assert!(cache.insert("a".to_string()));
    assert!(cache.insert("b".to_string()));
    assert!(!cache.insert("a".to_string()));
    assert!(cache.insert("c".to_string()));

    assert_eq!(cache.len(), 2);
    assert!(!cache.contains("a"));
    assert!(cache.contains("b"));
    assert!(cache.contains("c"));
}

#[test]
fn listing_is_sorted_and_ignores_directories() {
    let folder = TempDir::new().expect("temp dir should be created");
    fs::write(folder.path().join("b.xml"), "b").expect("file should be written");
    fs::write(folder.path().join("a.xml"), "a").expect("file should be written");
    fs::write(folder.path().join("c.json"), "c").expect("file should be written");
    fs::create_dir(folder.path().join("dir.xml")).expect("dir should be created");

    let pattern = Pattern::new("*.xml").expect("pattern should compile");
    let files = list_matching_files(folder.path(), &pattern).expect("listing should succeed");

    assert_eq!(
        files,
        vec![folder.path().join("a.xml"), folder.path().join("b.xml")]
    );
}

#[test]
fn fingerprint_changes_with_content_size() {
    let folder = TempDir::new().expect("temp dir should be created");
    let path = folder.path().join("a.xml");

    fs::write(&path, "one").expect("file should be written");
    let first = fingerprint(&path, snapshot(&path).expect("snapshot should succeed"));
    fs::write(&path, "one more").expect("file should be rewritten");
    let second = fingerprint(&path, snapshot(&path).expect("snapshot should succeed"));

    assert_ne!(first, second);
    assert!(
        stable_snapshot(&path, Duration::ZERO)
            .expect("sampling should succeed")
            .is_some()
    );
}

#[test]
fn growing_file_is_deferred_and_left_in_place() {
    let folder = TempDir::new().expect("temp dir should be created");
    let db_dir = TempDir::new().expect("temp dir should be created");
    let connection =
        open_database(&db_dir.path().join("calls.sqlite")).expect("database should open");
    let mut config = watch_config(folder.path());
    config.stability_wait = Duration::from_millis(400);
    let mut watcher = Watcher::new(config, connection).expect("watcher should start");

    let path = folder.path().join("12_20240126100000001.xml");
    fs::write(&path, "<CallExport>").expect("partial export should be written");

    let writer_path = path.clone();
    let writer = thread::spawn(move || {
        thread::sleep(Duration::from_millis(100));
        let mut file = OpenOptions::new()
            .append(true)
            .open(&writer_path)
            .expect("export should reopen");
        file.write_all(b"<CallId>12</CallId>")
            .expect("export should grow");
    });

    let summary = watcher.poll_once().expect("poll should succeed");
    writer.join().expect("writer thread should finish");

    assert_eq!(
        summary,
        PollSummary {
            unstable: 1,
            ..PollSummary::default()
        }
    );
    assert!(path.exists());
    assert!(file_names(&folder.path().join("processed")).is_empty());
    assert!(file_names(&folder.path().join("failed")).is_empty());
}

#[test]
fn file_already_dispatched_by_this_process_is_skipped() {
    let folder = TempDir::new().expect("temp dir should be created");
    let db_dir = TempDir::new().expect("temp dir should be created");
    let mut watcher = watcher_for(folder.path(), &db_dir.path().join("calls.sqlite"));

    let path = folder.path().join("91_20240126100000001.xml");
    fs::write(&path, call_export_xml("91", &["E1"])).expect("export should be written");
    let key = fingerprint(&path, snapshot(&path).expect("snapshot should succeed"));
    assert!(watcher.seen_mut().insert(key));

    let summary = watcher.poll_once().expect("poll should succeed");

    assert_eq!(
        summary,
        PollSummary {
            already_seen: 1,
            ..PollSummary::default()
        }
    );
    assert!(path.exists());
    assert_eq!(count_rows(watcher.connection(), "calls").expect("count calls"), 0);
}

#[test]
fn run_until_returns_once_shutdown_is_requested() {
    let folder = TempDir::new().expect("temp dir should be created");
    let db_dir = TempDir::new().expect("temp dir should be created");
    let connection =
        open_database(&db_dir.path().join("calls.sqlite")).expect("database should open");
    let mut config = watch_config(folder.path());
    config.poll_interval = Duration::from_secs(60);
    let mut watcher = Watcher::new(config, connection).expect("watcher should start");

    let path = folder.path().join("92_20240126100000001.xml");
    fs::write(&path, call_export_xml("92", &["E1"])).expect("export should be written");

    let shutdown = AtomicBool::new(true);
    let started = Instant::now();
    watcher.run_until(&shutdown);

    assert!(started.elapsed() < Duration::from_secs(5));
    assert!(path.exists());
    assert_eq!(count_rows(watcher.connection(), "calls").expect("count calls"), 0);
}

#[test]
fn connect_with_retry_gives_up_on_unreachable_database() {
    let folder = TempDir::new().expect("temp dir should be created");
    let db_path = folder.path().join("missing").join("calls.sqlite");

    let err = connect_with_retry(&db_path, 2, Duration::ZERO)
        .expect_err("unreachable database should fail");

    assert!(format!("{err:#}").contains("unreachable after 2 attempts"));
}
