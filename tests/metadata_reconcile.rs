//! Integration tests for metadata reconciliation after a write.
//!
//! Syscalls are observed through `RecordingOps`, which forwards to the real
//! descriptor operations unless told to fail or pretend.
//!
//! # Coverage Areas
//!
//! - Mode changes issue exactly one `fchmod`
//! - Matching modes issue none
//! - Invalid timestamps are never applied
//! - Valid timestamps are applied to the descriptor
//! - Unset owner halves inherit the on-disk value
//! - Unprivileged writers drop pending changes silently
//! - Directories that cannot be opened keep their metadata
//! - Failed syscalls fail the write

mod integration;

use integration::helpers::*;
use std::sync::Arc;

use filetime::FileTime;
use metadata::{Call, Operation, RecordingOps};
use vfdest::{DiskStat, FileKind, FileStat, ReconcileStep, VirtualFile, WriteError};

fn disk_stat(uid: u32, gid: u32) -> DiskStat {
    DiskStat {
        mode: 0o100644,
        atime: FileTime::from_unix_time(1_000, 0),
        mtime: FileTime::from_unix_time(1_000, 0),
        uid,
        gid,
        size: 0,
        kind: FileKind::File,
    }
}

// ============================================================================
// Mode
// ============================================================================

#[cfg(unix)]
#[tokio::test]
async fn changed_mode_applied_with_one_chmod() {
    let dir = TestDir::new().expect("create test dir");
    let existing = dir.write_file("out/tool.sh", b"#!/bin/sh\n").unwrap();
    test_support::set_permissions(&existing, 0o644).unwrap();
    let ops = Arc::new(RecordingOps::new());

    let written = destination_in(&dir)
        .with_ops(ops.clone())
        .write(
            VirtualFile::new("tool.sh")
                .with_contents(b"#!/bin/sh\necho hi\n".to_vec())
                .with_stat(FileStat::new().with_mode(0o755)),
        )
        .await
        .expect("write");

    assert_eq!(ops.count(Operation::Chmod), 1);
    assert!(ops.calls().contains(&Call::Chmod { mode: 0o100755 }));
    assert_eq!(test_support::permissions(&existing).unwrap(), 0o755);
    assert_eq!(written.stat().mode.map(|mode| mode & 0o7777), Some(0o755));
}

#[cfg(unix)]
#[tokio::test]
async fn matching_mode_skips_chmod() {
    let dir = TestDir::new().expect("create test dir");
    let existing = dir.write_file("out/same.txt", b"old").unwrap();
    test_support::set_permissions(&existing, 0o644).unwrap();
    let ops = Arc::new(RecordingOps::new());

    destination_in(&dir)
        .with_ops(ops.clone())
        .write(
            VirtualFile::new("same.txt")
                .with_contents(b"new".to_vec())
                .with_stat(FileStat::new().with_mode(0o644)),
        )
        .await
        .expect("write");

    assert_eq!(ops.count(Operation::Stat), 1);
    assert_eq!(ops.count(Operation::Chmod), 0);
}

// ============================================================================
// Timestamps
// ============================================================================

#[tokio::test]
async fn invalid_mtime_is_never_applied() {
    let dir = TestDir::new().expect("create test dir");
    let ops = Arc::new(RecordingOps::new());
    let invalid = FileTime::from_unix_time(1_700_000_000, 2_000_000_000);

    let written = destination_in(&dir)
        .with_ops(ops.clone())
        .write(
            VirtualFile::new("t.txt")
                .with_contents(b"t".to_vec())
                .with_stat(FileStat::new().with_times(invalid, None)),
        )
        .await
        .expect("write");

    assert_eq!(ops.count(Operation::SetTimes), 0);
    assert_ne!(written.stat().mtime, Some(invalid));
}

#[tokio::test]
async fn valid_mtime_is_applied() {
    let dir = TestDir::new().expect("create test dir");
    let mtime = FileTime::from_unix_time(1_500_000_000, 0);

    let written = destination_in(&dir)
        .write(
            VirtualFile::new("dated.txt")
                .with_contents(b"dated".to_vec())
                .with_stat(FileStat::new().with_times(mtime, None)),
        )
        .await
        .expect("write");

    let on_disk = std::fs::metadata(dir.join("out/dated.txt")).unwrap();
    assert_eq!(FileTime::from_last_modification_time(&on_disk), mtime);
    assert_eq!(written.stat().mtime, Some(mtime));
}

// ============================================================================
// Ownership and privilege
// ============================================================================

#[cfg(unix)]
#[tokio::test]
async fn unset_gid_inherits_actual_group() {
    let dir = TestDir::new().expect("create test dir");
    let ops = Arc::new(
        RecordingOps::new()
            .with_disk_stat(disk_stat(1000, 1000))
            .with_effective_uid(Some(1000))
            .pretend(Operation::Chown),
    );

    destination_in(&dir)
        .with_ops(ops.clone())
        .write(
            VirtualFile::new("owned.txt")
                .with_contents(b"owned".to_vec())
                .with_stat(FileStat::new().with_owner(Some(1001), None)),
        )
        .await
        .expect("write");

    assert_eq!(
        ops.calls()
            .into_iter()
            .filter(|call| call.operation() == Operation::Chown)
            .collect::<Vec<_>>(),
        vec![Call::Chown {
            uid: 1001,
            gid: 1000
        }]
    );
}

#[tokio::test]
async fn unprivileged_writer_skips_changes() {
    let dir = TestDir::new().expect("create test dir");
    let ops = Arc::new(
        RecordingOps::new()
            .with_disk_stat(disk_stat(1000, 1000))
            .with_effective_uid(Some(4242)),
    );

    destination_in(&dir)
        .with_ops(ops.clone())
        .write(
            VirtualFile::new("foreign.txt")
                .with_contents(b"foreign".to_vec())
                .with_stat(
                    FileStat::new()
                        .with_mode(0o600)
                        .with_owner(Some(1001), Some(1001)),
                ),
        )
        .await
        .expect("permission skip is not an error");

    assert_eq!(ops.calls(), vec![Call::Stat]);
}

#[tokio::test]
async fn missing_effective_uid_skips_changes() {
    let dir = TestDir::new().expect("create test dir");
    let ops = Arc::new(
        RecordingOps::new()
            .with_disk_stat(disk_stat(1000, 1000))
            .with_effective_uid(None),
    );

    destination_in(&dir)
        .with_ops(ops.clone())
        .write(
            VirtualFile::new("plain.txt")
                .with_contents(b"plain".to_vec())
                .with_stat(FileStat::new().with_mode(0o600)),
        )
        .await
        .expect("write");

    assert_eq!(ops.count(Operation::Chmod), 0);
}

#[tokio::test]
async fn unopenable_directory_is_written_without_reconciling() {
    let dir = TestDir::new().expect("create test dir");
    let ops = Arc::new(RecordingOps::new().fail(Operation::OpenDirectory));

    let written = destination_in(&dir)
        .with_ops(ops.clone())
        .write(
            VirtualFile::new("sealed")
                .as_directory()
                .with_stat(FileStat::new().with_mode(0o040700)),
        )
        .await
        .expect("permission denied on open is not an error");

    assert!(dir.join("out/sealed").is_dir());
    assert_eq!(written.path(), dir.join("out/sealed"));
    assert_eq!(ops.calls(), vec![Call::OpenDirectory]);
}

// ============================================================================
// Failures
// ============================================================================

#[cfg(unix)]
#[tokio::test]
async fn failed_chmod_fails_the_write() {
    let dir = TestDir::new().expect("create test dir");
    let ops = Arc::new(
        RecordingOps::new()
            .with_disk_stat(disk_stat(1000, 1000))
            .with_effective_uid(Some(1000))
            .fail(Operation::Chmod)
            .pretend(Operation::SetTimes),
    );
    let mtime = FileTime::from_unix_time(1_600_000_000, 0);

    let error = destination_in(&dir)
        .with_ops(ops.clone())
        .write(
            VirtualFile::new("denied.txt")
                .with_contents(b"denied".to_vec())
                .with_stat(FileStat::new().with_mode(0o600).with_times(mtime, None)),
        )
        .await
        .expect_err("chmod fails");

    let WriteError::Metadata(metadata) = &error else {
        panic!("expected metadata error, got {error:?}");
    };
    assert_eq!(metadata.step(), ReconcileStep::Permissions);
    assert_eq!(ops.count(Operation::SetTimes), 1);
}
