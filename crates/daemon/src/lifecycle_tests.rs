// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use tempfile::TempDir;

#[test]
fn paths_follow_the_standard_layout() {
    let paths = DaemonPaths::under("/home/u/.choo");
    assert_eq!(paths.socket_path, PathBuf::from("/home/u/.choo/daemon.sock"));
    assert_eq!(paths.pid_path, PathBuf::from("/home/u/.choo/daemon.pid"));
    assert_eq!(paths.web_socket_path, PathBuf::from("/home/u/.choo/web.sock"));
    assert_eq!(paths.jobs_dir, PathBuf::from("/home/u/.choo/jobs"));
}

#[test]
fn ensure_creates_root_with_restricted_mode() {
    let tmp = TempDir::new().unwrap();
    let paths = DaemonPaths::under(tmp.path().join(".choo"));
    paths.ensure().unwrap();

    assert!(paths.root.is_dir());
    assert!(paths.jobs_dir.is_dir());
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mode = std::fs::metadata(&paths.root).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o700);
    }
}

#[test]
fn pid_lock_records_our_pid() {
    let tmp = TempDir::new().unwrap();
    let paths = DaemonPaths::under(tmp.path());
    paths.ensure().unwrap();

    let lock = PidLock::acquire(&paths).unwrap();
    let recorded: i32 =
        std::fs::read_to_string(&paths.pid_path).unwrap().trim().parse().unwrap();
    assert_eq!(recorded, std::process::id() as i32);

    lock.release();
    assert!(!paths.pid_path.exists());
}

#[test]
fn second_acquire_detects_live_owner() {
    let tmp = TempDir::new().unwrap();
    let paths = DaemonPaths::under(tmp.path());
    paths.ensure().unwrap();

    let _held = PidLock::acquire(&paths).unwrap();
    let err = PidLock::acquire(&paths).unwrap_err();
    match err {
        LifecycleError::AlreadyRunning { pid } => assert_eq!(pid, std::process::id() as i32),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn stale_pid_file_is_replaced() {
    let tmp = TempDir::new().unwrap();
    let paths = DaemonPaths::under(tmp.path());
    paths.ensure().unwrap();

    // A pid that cannot exist (beyond pid_max on Linux).
    std::fs::write(&paths.pid_path, "999999999").unwrap();

    let _lock = PidLock::acquire(&paths).unwrap();
    let recorded: i32 =
        std::fs::read_to_string(&paths.pid_path).unwrap().trim().parse().unwrap();
    assert_eq!(recorded, std::process::id() as i32);
}

#[test]
fn our_own_process_is_alive() {
    assert!(process_alive(std::process::id() as i32));
    assert!(!process_alive(999_999_999));
}
