// ABOUTME: Integration tests for the rollout lock.
// ABOUTME: Tests lock acquisition, stale detection, force breaking, and release.

use chrono::Utc;
use rollwatch::rollout::{LockInfo, RolloutErrorKind, RolloutLock};
use rollwatch::types::{RevisionId, ServiceName};
use std::fs;

fn service(name: &str) -> ServiceName {
    ServiceName::new(name).unwrap()
}

/// Test: Lock acquired prevents second rollout.
#[test]
fn lock_acquired_prevents_second_rollout() {
    let dir = tempfile::tempdir().unwrap();
    let service = service("test-lock-prevent");
    let revision = RevisionId::new("v2");

    let lock = RolloutLock::acquire_in(dir.path(), &service, &revision, false)
        .expect("first lock should succeed");

    let err = RolloutLock::acquire_in(dir.path(), &service, &revision, false)
        .expect_err("second lock should fail");
    assert_eq!(err.kind(), RolloutErrorKind::Lock);
    assert!(err.to_string().contains("held by"));

    lock.release().expect("release should succeed");

    let lock = RolloutLock::acquire_in(dir.path(), &service, &revision, false)
        .expect("lock should be free after release");
    drop(lock);
}

/// Test: Lock file records who holds it.
#[test]
fn lock_file_contains_holder_info() {
    let dir = tempfile::tempdir().unwrap();
    let service = service("test-lock-info");

    let lock = RolloutLock::acquire_in(dir.path(), &service, &RevisionId::new("3f2c1ab"), false)
        .unwrap();

    let content = fs::read_to_string(lock.path()).unwrap();
    let info: LockInfo = serde_json::from_str(&content).unwrap();
    assert_eq!(info.service, "test-lock-info");
    assert_eq!(info.revision, "3f2c1ab");
    assert_eq!(info.pid, std::process::id());
    assert!(!info.holder.is_empty());
}

/// Test: Stale lock (older than 1 hour) is broken automatically.
#[test]
fn stale_lock_is_broken() {
    let dir = tempfile::tempdir().unwrap();
    let service = service("test-lock-stale");
    let revision = RevisionId::new("v2");

    let mut stale = LockInfo::new(&service, &RevisionId::new("v1"));
    stale.started_at = Utc::now() - chrono::Duration::hours(2);
    stale.pid = 1;
    fs::write(
        dir.path().join("test-lock-stale.lock"),
        serde_json::to_string(&stale).unwrap(),
    )
    .unwrap();

    let lock = RolloutLock::acquire_in(dir.path(), &service, &revision, false)
        .expect("stale lock should be broken");

    let info: LockInfo =
        serde_json::from_str(&fs::read_to_string(lock.path()).unwrap()).unwrap();
    assert_eq!(info.revision, "v2");
}

/// Test: Force breaks a fresh lock.
#[test]
fn force_breaks_held_lock() {
    let dir = tempfile::tempdir().unwrap();
    let service = service("test-lock-force");
    let revision = RevisionId::new("v2");

    let first = RolloutLock::acquire_in(dir.path(), &service, &revision, false).unwrap();
    let second = RolloutLock::acquire_in(dir.path(), &service, &revision, true)
        .expect("force should break the lock");

    // The first holder lost its lock; forgetting it keeps the file for the second.
    std::mem::forget(first);
    assert!(second.path().exists());
}

/// Test: Corrupted lock file is broken.
#[test]
fn corrupted_lock_is_broken() {
    let dir = tempfile::tempdir().unwrap();
    let service = service("test-lock-corrupt");
    fs::write(dir.path().join("test-lock-corrupt.lock"), "not json").unwrap();

    RolloutLock::acquire_in(dir.path(), &service, &RevisionId::new("v2"), false)
        .expect("corrupted lock should be broken");
}

/// Test: Dropping the lock removes the file.
#[test]
fn drop_releases_lock() {
    let dir = tempfile::tempdir().unwrap();
    let service = service("test-lock-drop");

    let path = {
        let lock =
            RolloutLock::acquire_in(dir.path(), &service, &RevisionId::new("v2"), false).unwrap();
        lock.path().to_path_buf()
    };
    assert!(!path.exists());
}

/// Test: Locks are per service.
#[test]
fn different_services_do_not_contend() {
    let dir = tempfile::tempdir().unwrap();
    let revision = RevisionId::new("v2");

    let _a = RolloutLock::acquire_in(dir.path(), &service("checkout"), &revision, false).unwrap();
    let _b = RolloutLock::acquire_in(dir.path(), &service("enrichment-api"), &revision, false)
        .unwrap();
}
