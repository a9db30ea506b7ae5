//! Starts the worker on demand.
//!
//! Concurrent clients serialise on the spawn lock. Whoever holds it checks
//! the socket again before spawning, so a racing cold start launches a single
//! worker and every client ends up connected to it.

use std::env;
use std::ffi::{OsStr, OsString};
use std::fs::{File, OpenOptions};
use std::os::unix::net::UnixStream;
use std::os::unix::process::CommandExt;
use std::process::{Child, Command, Stdio};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

use fs2::FileExt;
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use switchboard_config::{Config, RuntimePaths, SocketEndpoint};
use tracing::debug;

use super::LIFECYCLE_TARGET;
use super::error::LifecycleError;
use crate::transport::connect_if_listening;

/// Environment variable overriding the worker binary.
const WORKER_BIN_ENV_VAR: &str = "SWITCHBOARDD_BIN";
const DEFAULT_WORKER_BIN: &str = "switchboardd";
const SOCKET_ENV_VAR: &str = "SWITCHBOARD_DAEMON_SOCKET";
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Where to find the worker and how to configure it.
#[derive(Debug, Clone, Copy)]
pub(crate) struct SpawnContext<'a> {
    pub(crate) config: &'a Config,
    /// Program name followed by the configuration flags to forward.
    pub(crate) config_arguments: &'a [OsString],
    pub(crate) binary_override: Option<&'a OsStr>,
}

/// Returns a connection to the worker, spawning it if nothing is listening.
///
/// # Errors
///
/// Fails when the spawn lock cannot be taken, the worker cannot be launched
/// or exits early, or the socket does not appear within the spawn timeout.
pub(crate) fn connect_or_spawn(context: SpawnContext<'_>) -> Result<UnixStream, LifecycleError> {
    let config = context.config;
    let paths = RuntimePaths::from_config(config)?;
    let _spawn_lock = acquire_spawn_lock(&paths)?;
    if let Some(stream) = connect_existing(config.daemon_socket())? {
        debug!(target: LIFECYCLE_TARGET, "worker started by another client");
        return Ok(stream);
    }

    let mut child = spawn_worker(context)?;
    debug!(
        target: LIFECYCLE_TARGET,
        pid = child.id(),
        socket = %config.daemon_socket(),
        "spawned worker"
    );
    wait_for_socket(&paths, config.daemon_socket(), &mut child, config.spawn_timeout())
}

fn acquire_spawn_lock(paths: &RuntimePaths) -> Result<File, LifecycleError> {
    let path = paths.spawn_lock_path();
    let file = OpenOptions::new()
        .create(true)
        .truncate(false)
        .read(true)
        .write(true)
        .open(path)
        .map_err(|source| LifecycleError::SpawnLockOpen {
            path: path.to_path_buf(),
            source,
        })?;
    file.lock_exclusive()
        .map_err(|source| LifecycleError::SpawnLockAcquire {
            path: path.to_path_buf(),
            source,
        })?;
    Ok(file)
}

fn connect_existing(endpoint: &SocketEndpoint) -> Result<Option<UnixStream>, LifecycleError> {
    connect_if_listening(endpoint).map_err(|source| LifecycleError::SocketCheck {
        endpoint: endpoint.to_string(),
        source,
    })
}

/// Launches the worker detached from the client's stdio and process group.
fn spawn_worker(context: SpawnContext<'_>) -> Result<Child, LifecycleError> {
    let binary = resolve_worker_binary(context.binary_override);
    let mut command = Command::new(&binary);
    command
        .args(context.config_arguments.iter().skip(1))
        .env(SOCKET_ENV_VAR, context.config.daemon_socket().to_string())
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .process_group(0);
    command
        .spawn()
        .map_err(|source| LifecycleError::LaunchWorker { binary, source })
}

fn resolve_worker_binary(binary_override: Option<&OsStr>) -> OsString {
    binary_override
        .map(OsString::from)
        .or_else(|| env::var_os(WORKER_BIN_ENV_VAR))
        .unwrap_or_else(|| OsString::from(DEFAULT_WORKER_BIN))
}

/// Waits until the socket accepts a connection.
///
/// Directory events from `notify` wake the loop early; the poll interval
/// bounds the wait when events are missed or the watcher is unavailable.
fn wait_for_socket(
    paths: &RuntimePaths,
    endpoint: &SocketEndpoint,
    child: &mut Child,
    timeout: Duration,
) -> Result<UnixStream, LifecycleError> {
    let (events, wakeups) = mpsc::channel();
    let _watcher = watch_runtime_dir(paths, events);
    let deadline = Instant::now() + timeout;
    loop {
        if let Some(status) = child
            .try_wait()
            .map_err(|source| LifecycleError::MonitorWorker { source })?
        {
            // A clean exit means the worker forked into the background.
            if !status.success() {
                return Err(LifecycleError::WorkerExited {
                    exit_status: status.code(),
                });
            }
        }
        if let Some(stream) = connect_existing(endpoint)? {
            return Ok(stream);
        }

        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Err(LifecycleError::SpawnTimeout {
                endpoint: endpoint.to_string(),
                timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
            });
        }
        let pause = remaining.min(POLL_INTERVAL);
        match wakeups.recv_timeout(pause) {
            Ok(()) | Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => thread::sleep(pause),
        }
    }
}

fn watch_runtime_dir(paths: &RuntimePaths, events: mpsc::Sender<()>) -> Option<RecommendedWatcher> {
    let watcher = notify::recommended_watcher(move |event: notify::Result<notify::Event>| {
        if event.is_ok() && events.send(()).is_err() {
            debug!(target: LIFECYCLE_TARGET, "socket waiter already finished");
        }
    });
    let watched = watcher.and_then(|mut watcher| {
        watcher
            .watch(paths.runtime_dir(), RecursiveMode::NonRecursive)
            .map(|()| watcher)
    });
    match watched {
        Ok(watcher) => Some(watcher),
        Err(error) => {
            debug!(
                target: LIFECYCLE_TARGET,
                error = %error,
                "runtime directory watch unavailable; polling only"
            );
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use camino::{Utf8Path, Utf8PathBuf};
    use tempfile::TempDir;

    use super::*;

    struct Sandbox {
        _dir: TempDir,
        config: Config,
    }

    fn sandbox(spawn_timeout_ms: u64) -> Sandbox {
        let dir = TempDir::new().expect("temp dir");
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("utf-8 temp dir");
        let config = Config {
            daemon_socket: SocketEndpoint::unix(root.join("run").join("switchboardd.sock")),
            spawn_timeout_ms,
            log_filter: "warn".to_owned(),
            vfs_root: root,
            ..Config::default()
        };
        Sandbox { _dir: dir, config }
    }

    fn context<'a>(config: &'a Config, binary: &'a str) -> SpawnContext<'a> {
        SpawnContext {
            config,
            config_arguments: &[],
            binary_override: Some(OsStr::new(binary)),
        }
    }

    #[test]
    fn binary_override_wins() {
        assert_eq!(
            resolve_worker_binary(Some(OsStr::new("/opt/switchboardd"))),
            OsString::from("/opt/switchboardd")
        );
    }

    #[test]
    fn missing_binaries_fail_to_launch() {
        let sandbox = sandbox(200);
        let error = connect_or_spawn(context(&sandbox.config, "/nonexistent/switchboardd"))
            .expect_err("launch fails");
        assert!(
            matches!(&error, LifecycleError::LaunchWorker { binary, .. }
                if binary == &OsString::from("/nonexistent/switchboardd")),
            "{error}"
        );
    }

    #[test]
    fn failing_workers_are_reported() {
        let sandbox = sandbox(5_000);
        let error = connect_or_spawn(context(&sandbox.config, "false")).expect_err("worker fails");
        assert!(
            matches!(error, LifecycleError::WorkerExited { exit_status: Some(1) }),
            "{error}"
        );
    }

    #[test]
    fn silent_workers_time_out() {
        let sandbox = sandbox(200);
        let started = Instant::now();
        let error = connect_or_spawn(context(&sandbox.config, "true")).expect_err("times out");
        assert!(
            matches!(error, LifecycleError::SpawnTimeout { timeout_ms: 200, .. }),
            "{error}"
        );
        assert!(started.elapsed() >= Duration::from_millis(200));
    }

    fn wait_for_file(path: &Utf8Path) {
        let deadline = Instant::now() + Duration::from_secs(10);
        while !path.exists() {
            assert!(Instant::now() < deadline, "{path} never appeared");
            thread::sleep(Duration::from_millis(20));
        }
    }

    #[test]
    fn racing_cold_starts_spawn_one_worker() {
        let sandbox = sandbox(10_000);
        let spawn_log = sandbox.config.vfs_root.join("spawns.log");
        // `sh -c` records each launch; the test then plays the detached worker.
        let arguments = [
            OsString::from("switchboard"),
            OsString::from("-c"),
            OsString::from(format!("echo spawned >> '{spawn_log}'")),
        ];
        let context = SpawnContext {
            config: &sandbox.config,
            config_arguments: &arguments,
            binary_override: Some(OsStr::new("sh")),
        };

        let (worker, outcomes) = thread::scope(|scope| {
            let clients: Vec<_> = (0..4)
                .map(|_| scope.spawn(move || connect_or_spawn(context)))
                .collect();
            wait_for_file(&spawn_log);
            let worker = switchboardd::testing::InProcessWorker::start(sandbox.config.clone());
            let outcomes: Vec<_> = clients
                .into_iter()
                .map(|client| client.join().expect("client thread"))
                .collect();
            (worker, outcomes)
        });

        for outcome in &outcomes {
            assert!(outcome.is_ok(), "client failed: {outcome:?}");
        }
        let launches = std::fs::read_to_string(&spawn_log).expect("spawn log");
        assert_eq!(launches.lines().count(), 1, "{launches}");
        drop(outcomes);
        worker.stop().expect("clean shutdown");
    }

    #[test]
    fn running_workers_are_reused_without_spawning() {
        let sandbox = sandbox(200);
        let worker = switchboardd::testing::InProcessWorker::start(sandbox.config.clone());
        assert!(worker.wait_until_ready(Duration::from_secs(5)));

        // Spawning `false` would fail, so success proves the re-check.
        connect_or_spawn(context(&sandbox.config, "false")).expect("connects to running worker");
        worker.stop().expect("clean shutdown");
    }
}
