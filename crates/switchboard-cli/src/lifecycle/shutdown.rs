//! Signals the worker to stop and waits for it to go away.

use std::io;
use std::thread;
use std::time::{Duration, Instant};

use libc::{SIGTERM, kill, pid_t};
use switchboard_config::{RuntimePaths, SocketEndpoint};

use super::error::LifecycleError;
use crate::transport::connect_if_listening;

pub(crate) const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Waits until the pid file is gone and the socket no longer answers.
pub(crate) fn wait_for_shutdown(
    paths: &RuntimePaths,
    endpoint: &SocketEndpoint,
    timeout: Duration,
) -> Result<(), LifecycleError> {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        let pid_exists = paths.pid_path().exists();
        let listening = connect_if_listening(endpoint)
            .map_err(|source| LifecycleError::SocketCheck {
                endpoint: endpoint.to_string(),
                source,
            })?
            .is_some();
        if !pid_exists && !listening {
            return Ok(());
        }
        thread::sleep(POLL_INTERVAL);
    }
    Err(LifecycleError::ShutdownTimeout {
        pid_path: paths.pid_path().to_path_buf(),
        timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
    })
}

/// Sends `SIGTERM` to `pid`.
pub(crate) fn signal_worker(pid: u32) -> Result<(), LifecycleError> {
    let target = pid_t::try_from(pid).map_err(|_| LifecycleError::SignalFailed {
        pid,
        source: io::Error::from(io::ErrorKind::InvalidInput),
    })?;
    // SAFETY: kill(2) has no memory-safety preconditions; an unknown pid is
    // reported through errno.
    let result = unsafe { kill(target, SIGTERM) };
    if result == 0 {
        Ok(())
    } else {
        Err(LifecycleError::SignalFailed {
            pid,
            source: io::Error::last_os_error(),
        })
    }
}
