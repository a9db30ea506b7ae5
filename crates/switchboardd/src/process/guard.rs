//! Instance lock plus the pid and health artefacts it protects.
//!
//! The lock is an exclusive `flock` on `switchboardd.lock`. A second worker
//! blocks on it until the first releases its handle, so at most one worker
//! serves a runtime directory. The lock file itself is never removed: unlinking
//! it would let a later worker lock a fresh inode while a blocked one still
//! waits on the old one.

use std::fs::{self, File, OpenOptions, Permissions};
use std::io::{self, Write};
use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use fs2::FileExt;
use nix::errno::Errno;
use nix::sys::signal::kill;
use nix::unistd::Pid;
use serde::{Deserialize, Serialize};
use switchboard_config::RuntimePaths;
use tempfile::Builder;
use tracing::{info, warn};

use super::PROCESS_TARGET;
use super::errors::LaunchError;

#[derive(Debug)]
pub(super) struct ProcessGuard {
    paths: RuntimePaths,
    _lock: File,
    pid: Option<u32>,
}

impl ProcessGuard {
    /// Takes the instance lock, waiting for any running worker to exit.
    pub(super) fn acquire(paths: RuntimePaths) -> Result<Self, LaunchError> {
        let lock = acquire_lock(&paths)?;
        Ok(Self {
            paths,
            _lock: lock,
            pid: None,
        })
    }

    pub(super) fn write_pid(&mut self, pid: u32) -> Result<(), LaunchError> {
        let path = self.paths.pid_path();
        atomic_write(path, format!("{pid}\n").as_bytes()).map_err(|source| {
            LaunchError::PidWrite {
                path: path.to_path_buf(),
                source,
            }
        })?;
        self.pid = Some(pid);
        info!(
            target: PROCESS_TARGET,
            pid,
            file = %path.display(),
            "pid file written"
        );
        Ok(())
    }

    pub(super) fn write_health(&self, state: HealthState) -> Result<(), LaunchError> {
        let pid = self.pid.ok_or(LaunchError::MissingPid)?;
        let snapshot = HealthSnapshot::new(state, pid)?;
        let mut contents = serde_json::to_vec(&snapshot)?;
        contents.push(b'\n');
        let path = self.paths.health_path();
        atomic_write(path, &contents).map_err(|source| LaunchError::HealthWrite {
            path: path.to_path_buf(),
            source,
        })?;
        info!(
            target: PROCESS_TARGET,
            status = state.as_str(),
            file = %path.display(),
            "health snapshot updated"
        );
        Ok(())
    }

    pub(super) const fn paths(&self) -> &RuntimePaths {
        &self.paths
    }
}

impl Drop for ProcessGuard {
    fn drop(&mut self) {
        for (path, label) in [
            (self.paths.pid_path(), "pid"),
            (self.paths.health_path(), "health"),
        ] {
            if let Err(error) = fs::remove_file(path)
                && error.kind() != io::ErrorKind::NotFound
            {
                warn!(
                    target: PROCESS_TARGET,
                    file = %path.display(),
                    error = %error,
                    "failed to remove {label} file"
                );
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum HealthState {
    Starting,
    Ready,
    Stopping,
}

impl HealthState {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Starting => "starting",
            Self::Ready => "ready",
            Self::Stopping => "stopping",
        }
    }
}

/// Contents of `switchboardd.health`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct HealthSnapshot {
    pub(crate) status: String,
    pub(crate) pid: u32,
    pub(crate) timestamp: u64,
}

impl HealthSnapshot {
    fn new(state: HealthState, pid: u32) -> Result<Self, LaunchError> {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|source| LaunchError::Clock { source })?
            .as_secs();
        Ok(Self {
            status: state.as_str().to_owned(),
            pid,
            timestamp,
        })
    }
}

fn acquire_lock(paths: &RuntimePaths) -> Result<File, LaunchError> {
    let path = paths.lock_path();
    let lock = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .mode(0o600)
        .open(path)
        .map_err(|source| LaunchError::LockOpen {
            path: path.to_path_buf(),
            source,
        })?;

    match lock.try_lock_exclusive() {
        Ok(()) => {}
        Err(error) if error.kind() == io::ErrorKind::WouldBlock => {
            let holder = read_pid(paths.pid_path());
            info!(
                target: PROCESS_TARGET,
                file = %path.display(),
                holder = ?holder,
                holder_alive = holder.is_some_and(process_alive),
                "instance lock held; waiting for the running worker to exit"
            );
            lock.lock_exclusive()
                .map_err(|source| LaunchError::LockAcquire {
                    path: path.to_path_buf(),
                    source,
                })?;
        }
        Err(source) => {
            return Err(LaunchError::LockAcquire {
                path: path.to_path_buf(),
                source,
            });
        }
    }
    info!(
        target: PROCESS_TARGET,
        file = %path.display(),
        "acquired instance lock"
    );
    Ok(lock)
}

fn read_pid(path: &Path) -> Option<u32> {
    fs::read_to_string(path).ok()?.trim().parse().ok()
}

fn process_alive(pid: u32) -> bool {
    let Ok(raw) = i32::try_from(pid) else {
        return false;
    };
    matches!(kill(Pid::from_raw(raw), None), Ok(()) | Err(Errno::EPERM))
}

/// Replaces `path` with `contents` through a rename so readers never see a
/// partial write.
fn atomic_write(path: &Path, contents: &[u8]) -> io::Result<()> {
    let directory = path.parent().ok_or_else(|| {
        io::Error::new(io::ErrorKind::NotFound, "target path has no parent directory")
    })?;
    let prefix = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("switchboardd");
    let mut file = Builder::new()
        .prefix(prefix)
        .permissions(Permissions::from_mode(0o600))
        .tempfile_in(directory)?;
    file.write_all(contents)?;
    file.as_file().sync_all()?;
    file.persist(path).map_err(|error| error.error)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::mpsc;
    use std::thread;
    use std::time::Duration;

    use camino::Utf8PathBuf;
    use rstest::{fixture, rstest};
    use switchboard_config::{Config, SocketEndpoint};
    use tempfile::TempDir;

    use super::*;

    struct Runtime {
        _dir: TempDir,
        paths: RuntimePaths,
    }

    #[fixture]
    fn runtime() -> Runtime {
        let dir = TempDir::new().expect("temp dir");
        let socket = Utf8PathBuf::from_path_buf(dir.path().join("switchboardd.sock"))
            .expect("utf-8 temp dir");
        let config = Config {
            daemon_socket: SocketEndpoint::unix(socket),
            ..Config::default()
        };
        let paths = RuntimePaths::from_config(&config).expect("runtime paths");
        Runtime { _dir: dir, paths }
    }

    #[rstest]
    fn pid_and_health_files_are_private_and_removed_on_drop(runtime: Runtime) {
        let mut guard = ProcessGuard::acquire(runtime.paths.clone()).expect("acquire");
        guard.write_pid(4242).expect("pid");
        guard.write_health(HealthState::Ready).expect("health");

        let pid = fs::read_to_string(runtime.paths.pid_path()).expect("read pid");
        assert_eq!(pid.trim(), "4242");
        let health: HealthSnapshot =
            serde_json::from_slice(&fs::read(runtime.paths.health_path()).expect("read health"))
                .expect("parse health");
        assert_eq!(health.status, "ready");
        assert_eq!(health.pid, 4242);
        let mode = fs::metadata(runtime.paths.health_path())
            .expect("metadata")
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, 0o600);

        drop(guard);
        assert!(!runtime.paths.pid_path().exists());
        assert!(!runtime.paths.health_path().exists());
        assert!(runtime.paths.lock_path().exists(), "lock file is kept");
    }

    #[rstest]
    fn health_requires_a_pid(runtime: Runtime) {
        let guard = ProcessGuard::acquire(runtime.paths.clone()).expect("acquire");
        assert!(matches!(
            guard.write_health(HealthState::Starting),
            Err(LaunchError::MissingPid)
        ));
    }

    #[rstest]
    fn second_guard_waits_for_the_first(runtime: Runtime) {
        let first = ProcessGuard::acquire(runtime.paths.clone()).expect("acquire first");
        let (acquired_tx, acquired_rx) = mpsc::channel();
        let paths = runtime.paths.clone();
        let waiter = thread::spawn(move || {
            let second = ProcessGuard::acquire(paths).expect("acquire second");
            acquired_tx.send(()).expect("report acquisition");
            drop(second);
        });

        assert!(
            acquired_rx.recv_timeout(Duration::from_millis(200)).is_err(),
            "second guard must block while the first is held"
        );
        drop(first);
        acquired_rx
            .recv_timeout(Duration::from_secs(5))
            .expect("second guard acquires after release");
        waiter.join().expect("waiter thread");
    }
}
