// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon lifecycle: paths, pid lock, double-start detection.

use fs2::FileExt;
use std::fs::File;
use std::io::{Read, Write};
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("daemon already running (pid {pid})")]
    AlreadyRunning { pid: i32 },

    #[error("cannot determine home directory")]
    NoHome,

    #[error("lifecycle i/o on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Filesystem layout under `~/.choo`.
#[derive(Debug, Clone)]
pub struct DaemonPaths {
    /// State root, mode 0700.
    pub root: PathBuf,
    pub socket_path: PathBuf,
    pub pid_path: PathBuf,
    pub log_path: PathBuf,
    /// Per-job state directories live under here.
    pub jobs_dir: PathBuf,
    /// Web pusher socket.
    pub web_socket_path: PathBuf,
}

impl DaemonPaths {
    /// Resolve the standard layout under the user's home directory.
    pub fn resolve() -> Result<Self, LifecycleError> {
        let home = dirs::home_dir().ok_or(LifecycleError::NoHome)?;
        Ok(Self::under(home.join(".choo")))
    }

    /// Layout rooted at an explicit directory (tests, `CHOO_HOME`).
    pub fn under(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            socket_path: root.join("daemon.sock"),
            pid_path: root.join("daemon.pid"),
            log_path: root.join("daemon.log"),
            jobs_dir: root.join("jobs"),
            web_socket_path: root.join("web.sock"),
            root,
        }
    }

    /// Create the root (0700) and jobs directories.
    pub fn ensure(&self) -> Result<(), LifecycleError> {
        fn io(path: &PathBuf) -> impl Fn(std::io::Error) -> LifecycleError + '_ {
            move |source| LifecycleError::Io { path: path.clone(), source }
        }
        std::fs::create_dir_all(&self.root).map_err(io(&self.root))?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&self.root, std::fs::Permissions::from_mode(0o700))
                .map_err(io(&self.root))?;
        }
        std::fs::create_dir_all(&self.jobs_dir).map_err(io(&self.jobs_dir))?;
        Ok(())
    }
}

/// Exclusive pid-file lock, held for the daemon's lifetime.
#[derive(Debug)]
pub struct PidLock {
    // NOTE(lifetime): held to maintain the exclusive file lock; released on drop
    #[allow(dead_code)]
    file: File,
    path: PathBuf,
}

impl PidLock {
    /// Acquire the pid file. A second instance finds the lock held,
    /// reads the recorded pid, verifies the process is alive, and
    /// reports "already running". A stale file (dead pid) is replaced.
    pub fn acquire(paths: &DaemonPaths) -> Result<Self, LifecycleError> {
        let io = |source| LifecycleError::Io { path: paths.pid_path.clone(), source };

        let mut file = std::fs::OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&paths.pid_path)
            .map_err(io)?;

        if file.try_lock_exclusive().is_err() {
            let mut content = String::new();
            let _ = file.read_to_string(&mut content);
            if let Ok(pid) = content.trim().parse::<i32>() {
                if process_alive(pid) {
                    return Err(LifecycleError::AlreadyRunning { pid });
                }
            }
            // Lock holder died without releasing (should not happen with
            // advisory locks, but be safe): block until we get it.
            FileExt::lock_exclusive(&file).map_err(io)?;
        }

        // Lock acquired: the previous owner is gone even if the file has
        // a pid in it. Record ours.
        file.set_len(0).map_err(io)?;
        use std::io::Seek;
        file.seek(std::io::SeekFrom::Start(0)).map_err(io)?;
        write!(file, "{}", std::process::id()).map_err(io)?;
        file.flush().map_err(io)?;

        Ok(Self { file, path: paths.pid_path.clone() })
    }

    /// Remove the pid file (graceful shutdown).
    pub fn release(self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

/// `kill(pid, 0)`: true when the process exists.
pub fn process_alive(pid: i32) -> bool {
    nix::sys::signal::kill(nix::unistd::Pid::from_raw(pid), None).is_ok()
}

#[cfg(test)]
#[path = "lifecycle_tests.rs"]
mod tests;
