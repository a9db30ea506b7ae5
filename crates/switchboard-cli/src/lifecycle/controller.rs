//! Implements `switchboard daemon start|stop|status`.

use std::io::Write;
use std::process::ExitCode;
use std::time::{SystemTime, UNIX_EPOCH};

use switchboard_config::RuntimePaths;

use super::error::LifecycleError;
use super::monitoring::{read_health, read_pid};
use super::shutdown::{SHUTDOWN_TIMEOUT, signal_worker, wait_for_shutdown};
use super::spawning::{SpawnContext, connect_or_spawn};
use crate::cli::DaemonAction;
use crate::transport::connect_if_listening;

const NOT_RUNNING: &str = "switchboardd is not running";

/// Runs `action`, writing the human-readable outcome to `stdout`.
pub(crate) fn handle<W>(
    action: DaemonAction,
    context: SpawnContext<'_>,
    stdout: &mut W,
) -> Result<ExitCode, LifecycleError>
where
    W: Write,
{
    match action {
        DaemonAction::Start => start(context, stdout),
        DaemonAction::Stop => stop(context, stdout),
        DaemonAction::Status => status(context, stdout),
    }
}

fn start<W: Write>(context: SpawnContext<'_>, stdout: &mut W) -> Result<ExitCode, LifecycleError> {
    drop(connect_or_spawn(context)?);
    line(
        stdout,
        format_args!("switchboardd listening on {}", context.config.daemon_socket()),
    )?;
    Ok(ExitCode::SUCCESS)
}

fn stop<W: Write>(context: SpawnContext<'_>, stdout: &mut W) -> Result<ExitCode, LifecycleError> {
    let paths = RuntimePaths::from_config_readonly(context.config)?;
    let Some(pid) = read_pid(paths.pid_path())? else {
        line(stdout, format_args!("{NOT_RUNNING}"))?;
        return Ok(ExitCode::SUCCESS);
    };
    signal_worker(pid)?;
    wait_for_shutdown(&paths, context.config.daemon_socket(), SHUTDOWN_TIMEOUT)?;
    line(stdout, format_args!("switchboardd (pid {pid}) stopped"))?;
    Ok(ExitCode::SUCCESS)
}

fn status<W: Write>(context: SpawnContext<'_>, stdout: &mut W) -> Result<ExitCode, LifecycleError> {
    let endpoint = context.config.daemon_socket();
    let paths = RuntimePaths::from_config_readonly(context.config)?;
    if let Some(snapshot) = read_health(paths.health_path())? {
        let age = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |now| now.as_secs().saturating_sub(snapshot.timestamp));
        line(
            stdout,
            format_args!(
                "switchboardd is {} (pid {}, updated {age}s ago) on {endpoint}",
                snapshot.status, snapshot.pid
            ),
        )?;
        return Ok(ExitCode::SUCCESS);
    }

    let listening = connect_if_listening(endpoint)
        .map_err(|source| LifecycleError::SocketCheck {
            endpoint: endpoint.to_string(),
            source,
        })?
        .is_some();
    if listening {
        line(
            stdout,
            format_args!(
                "{endpoint} is listening but {} is missing",
                paths.health_path().display()
            ),
        )?;
    } else {
        line(stdout, format_args!("{NOT_RUNNING}"))?;
    }
    Ok(ExitCode::SUCCESS)
}

fn line<W: Write>(stdout: &mut W, args: std::fmt::Arguments<'_>) -> Result<(), LifecycleError> {
    stdout.write_fmt(args).map_err(LifecycleError::Io)?;
    stdout.write_all(b"\n").map_err(LifecycleError::Io)?;
    stdout.flush().map_err(LifecycleError::Io)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use camino::Utf8PathBuf;
    use switchboard_config::{Config, SocketEndpoint};
    use tempfile::TempDir;

    use super::*;

    struct Sandbox {
        _dir: TempDir,
        config: Config,
    }

    fn sandbox() -> Sandbox {
        let dir = TempDir::new().expect("temp dir");
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("utf-8 temp dir");
        let config = Config {
            daemon_socket: SocketEndpoint::unix(root.join("run").join("switchboardd.sock")),
            log_filter: "warn".to_owned(),
            vfs_root: root,
            ..Config::default()
        };
        Sandbox { _dir: dir, config }
    }

    fn run(action: DaemonAction, config: &Config) -> String {
        let mut stdout = Vec::new();
        let context = SpawnContext {
            config,
            config_arguments: &[],
            binary_override: Some(std::ffi::OsStr::new("false")),
        };
        let code = handle(action, context, &mut stdout).expect("lifecycle command");
        assert_eq!(code, ExitCode::SUCCESS);
        String::from_utf8(stdout).expect("utf-8")
    }

    #[test]
    fn status_without_a_worker_reports_not_running() {
        let sandbox = sandbox();
        assert_eq!(run(DaemonAction::Status, &sandbox.config).trim(), NOT_RUNNING);
    }

    #[test]
    fn stop_without_a_worker_is_a_no_op() {
        let sandbox = sandbox();
        assert_eq!(run(DaemonAction::Stop, &sandbox.config).trim(), NOT_RUNNING);
    }

    #[test]
    fn status_reports_a_live_worker() {
        let sandbox = sandbox();
        let worker = switchboardd::testing::InProcessWorker::start(sandbox.config.clone());
        assert!(worker.wait_until_ready(Duration::from_secs(5)));

        let output = run(DaemonAction::Status, &sandbox.config);

        // The socket is published just before the snapshot flips to ready.
        assert!(
            output.starts_with("switchboardd is ready")
                || output.starts_with("switchboardd is starting"),
            "{output}"
        );
        assert!(output.contains(&format!("pid {}", std::process::id())), "{output}");
        worker.stop().expect("clean shutdown");
    }

    #[test]
    fn start_reuses_a_running_worker() {
        let sandbox = sandbox();
        let worker = switchboardd::testing::InProcessWorker::start(sandbox.config.clone());
        assert!(worker.wait_until_ready(Duration::from_secs(5)));

        let output = run(DaemonAction::Start, &sandbox.config);

        assert!(output.starts_with("switchboardd listening on unix://"), "{output}");
        worker.stop().expect("clean shutdown");
    }
}
