//! Integration tests for change detection and snapshot republication.

mod common;

use std::fs;
use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::time::Duration;

use common::{subscribe, wait_for_snapshot, CountingSource, NoisySource};
use strata::{AggregateBuilder, FileSource, MapSource};

fn write_file(dir: &tempfile::TempDir, name: &str, content: &str) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, content).unwrap();
    path
}

#[test]
fn self_reporting_source_pushes_changes() {
    let source = MapSource::with_entries("map", [("k", "1")]);
    let aggregate = AggregateBuilder::new()
        .source(source.clone())
        .build()
        .unwrap();

    let rx = subscribe(&aggregate);
    source.set("k", "2");
    let snapshot = wait_for_snapshot(&rx, |s| s.value("k").as_deref() == Some("2"));
    assert_eq!(snapshot.value("k").as_deref(), Some("2"));
}

#[test]
fn snapshots_arrive_in_publication_order() {
    let source = MapSource::with_entries("map", [("k", "0")]);
    let aggregate = AggregateBuilder::new()
        .source(source.clone())
        .build()
        .unwrap();

    let rx = subscribe(&aggregate);
    source.set("k", "1");
    source.set("k", "2");
    source.set("k", "3");

    let mut seen = Vec::new();
    while seen.last().map(String::as_str) != Some("3") {
        let snapshot = rx
            .recv_timeout(Duration::from_secs(10))
            .expect("expected an ordered stream of snapshots");
        seen.push(snapshot.value("k").unwrap());
    }
    assert_eq!(seen, vec!["1".to_string(), "2".to_string(), "3".to_string()]);
}

#[test]
fn unchanged_sources_are_not_reloaded_on_recompute() {
    let (counting, loads) = CountingSource::new("stable", &[("stable.key", "yes")]);
    let changing = MapSource::with_entries("changing", [("k", "1")]);

    let aggregate = AggregateBuilder::new()
        .source_with_priority(counting, 5)
        .source_with_priority(changing.clone(), 10)
        .build()
        .unwrap();
    assert_eq!(loads.load(Ordering::SeqCst), 1);

    let rx = subscribe(&aggregate);
    changing.set("k", "2");
    let snapshot = wait_for_snapshot(&rx, |s| s.value("k").as_deref() == Some("2"));

    // The recompute reused the cached tree of the unchanged source.
    assert_eq!(loads.load(Ordering::SeqCst), 1);
    assert_eq!(snapshot.value("stable.key").as_deref(), Some("yes"));
}

#[test]
fn noop_reload_suppresses_publication() {
    let (noisy, modified) = NoisySource::new("noisy", &[("k", "1")]);
    let aggregate = AggregateBuilder::new()
        .source(noisy)
        .poll_interval(Duration::from_millis(20))
        .build()
        .unwrap();

    let rx = subscribe(&aggregate);
    // The stamp claims modification on every poll, but reloads produce
    // byte-identical content: nothing may be published.
    modified.store(true, Ordering::SeqCst);
    assert!(rx.recv_timeout(Duration::from_millis(500)).is_err());

    // A forced reload publishes even without a difference.
    aggregate.reload().unwrap();
    let snapshot = rx
        .recv_timeout(Duration::from_secs(10))
        .expect("forced reload publishes unconditionally");
    assert_eq!(snapshot.value("k").as_deref(), Some("1"));
}

#[test]
fn polled_file_change_republishes() {
    let dir = tempfile::TempDir::new().unwrap();
    // Watching is disabled through the source's own data so the polling
    // path is the one under test.
    let path = write_file(&dir, "app.yaml", "k: 1\nstrata.watch.enabled: \"false\"\n");

    let aggregate = AggregateBuilder::new()
        .source(FileSource::new(&path))
        .poll_interval(Duration::from_millis(20))
        .build()
        .unwrap();
    assert_eq!(aggregate.snapshot().value("k").as_deref(), Some("1"));

    let rx = subscribe(&aggregate);
    fs::write(&path, "k: 2\nstrata.watch.enabled: \"false\"\n").unwrap();

    let snapshot = wait_for_snapshot(&rx, |s| s.value("k").as_deref() == Some("2"));
    assert_eq!(snapshot.value("k").as_deref(), Some("2"));
}

#[test]
fn watched_file_change_republishes() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = write_file(&dir, "app.yaml", "k: 1\n");

    let aggregate = AggregateBuilder::new()
        .source(FileSource::new(&path))
        .build()
        .unwrap();

    let rx = subscribe(&aggregate);
    // Give the watch registration a moment before touching the file.
    std::thread::sleep(Duration::from_millis(250));
    fs::write(&path, "k: 2\n").unwrap();

    let snapshot = wait_for_snapshot(&rx, |s| s.value("k").as_deref() == Some("2"));
    assert_eq!(snapshot.value("k").as_deref(), Some("2"));
}

#[test]
fn deleted_optional_file_clears_its_contribution() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = write_file(&dir, "app.yaml", "k: 1\n");
    let keeper = MapSource::with_entries("keeper", [("kept", "yes")]);

    let aggregate = AggregateBuilder::new()
        .source(FileSource::new(&path).optional(true))
        .source(keeper)
        .build()
        .unwrap();
    assert_eq!(aggregate.snapshot().value("k").as_deref(), Some("1"));

    let rx = subscribe(&aggregate);
    std::thread::sleep(Duration::from_millis(250));
    fs::remove_file(&path).unwrap();

    let snapshot = wait_for_snapshot(&rx, |s| s.value("k").is_none());
    assert_eq!(snapshot.value("kept").as_deref(), Some("yes"));
}

#[test]
fn disabled_change_support_stays_silent() {
    let source = MapSource::with_entries("map", [("k", "1")]);
    let aggregate = AggregateBuilder::new()
        .source(source.clone())
        .changes(false)
        .build()
        .unwrap();

    let rx = subscribe(&aggregate);
    source.set("k", "2");
    assert!(rx.recv_timeout(Duration::from_millis(500)).is_err());
    // The current snapshot is also untouched.
    assert_eq!(aggregate.snapshot().value("k").as_deref(), Some("1"));
}

#[test]
fn reserved_change_support_flag_disables_detection() {
    // The flag lives in the source's own data and, once merged, in the
    // aggregate's tree, so it turns change support off for the whole
    // aggregate.
    let silent = MapSource::with_entries(
        "silent",
        [("k", "1"), ("strata.changes.enabled", "false")],
    );
    let other = MapSource::with_entries("other", [("m", "1")]);
    let aggregate = AggregateBuilder::new()
        .source(silent.clone())
        .source(other.clone())
        .build()
        .unwrap();

    let rx = subscribe(&aggregate);
    silent.set("k", "2");
    other.set("m", "2");
    assert!(rx.recv_timeout(Duration::from_millis(500)).is_err());
}

#[test]
fn shutdown_is_idempotent() {
    let source = MapSource::with_entries("map", [("k", "1")]);
    let mut aggregate = AggregateBuilder::new()
        .source(source.clone())
        .poll_interval(Duration::from_millis(20))
        .build()
        .unwrap();
    let _rx = subscribe(&aggregate);

    aggregate.shutdown();
    aggregate.shutdown();
    // Mutations after shutdown go nowhere, and must not panic.
    source.set("k", "2");
}
