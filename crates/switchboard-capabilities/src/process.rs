//! Bounded subprocess execution shared by the shell-backed capabilities.
//!
//! The child's stdout and stderr are drained on helper threads so a chatty
//! program cannot block on a full pipe, while the calling thread polls for
//! exit and kills the child once the deadline passes.

use std::ffi::OsStr;
use std::io::{self, Read, Write};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use switchboard_bus::CapabilityError;
use tracing::{debug, warn};

const PROCESS_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::process");
const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Collected result of a finished child.
#[derive(Debug)]
pub(crate) struct ProcessOutput {
    pub(crate) status: ExitStatus,
    pub(crate) stdout: Vec<u8>,
    pub(crate) stderr: Vec<u8>,
}

impl ProcessOutput {
    pub(crate) fn stdout_text(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    pub(crate) fn stderr_text(&self) -> String {
        String::from_utf8_lossy(&self.stderr).trim().to_owned()
    }
}

/// Runs `program` with `args`, feeding `input` to stdin when given.
///
/// Spawn failures surface as I/O errors and an expired deadline as a timeout;
/// a non-zero exit is returned to the caller to interpret.
pub(crate) fn run_with_deadline<I, S>(
    program: &str,
    args: I,
    input: Option<Vec<u8>>,
    timeout: Duration,
) -> Result<ProcessOutput, CapabilityError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let mut command = Command::new(program);
    command
        .args(args)
        .stdin(if input.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    debug!(target: PROCESS_TARGET, program, "spawning subprocess");
    let mut child = command
        .spawn()
        .map_err(|error| CapabilityError::io(format!("failed to start '{program}': {error}")))?;

    let writer = match (child.stdin.take(), input) {
        (Some(mut stdin), Some(bytes)) => Some(thread::spawn(move || {
            // A child that exits without reading its input closes the pipe.
            let result = stdin.write_all(&bytes);
            drop(stdin);
            result
        })),
        _ => None,
    };
    let stdout = drain(child.stdout.take());
    let stderr = drain(child.stderr.take());

    let status = wait_for_exit(program, &mut child, timeout)?;

    if let Some(handle) = writer
        && let Ok(Err(error)) = handle.join()
        && error.kind() != io::ErrorKind::BrokenPipe
    {
        return Err(CapabilityError::io(format!(
            "failed to write input to '{program}': {error}"
        )));
    }
    Ok(ProcessOutput {
        status,
        stdout: collect(stdout),
        stderr: collect(stderr),
    })
}

fn drain<R>(pipe: Option<R>) -> Option<JoinHandle<Vec<u8>>>
where
    R: Read + Send + 'static,
{
    pipe.map(|mut reader| {
        thread::spawn(move || {
            let mut buffer = Vec::new();
            if reader.read_to_end(&mut buffer).is_err() {
                buffer.clear();
            }
            buffer
        })
    })
}

fn collect(handle: Option<JoinHandle<Vec<u8>>>) -> Vec<u8> {
    handle
        .and_then(|handle| handle.join().ok())
        .unwrap_or_default()
}

fn wait_for_exit(
    program: &str,
    child: &mut Child,
    timeout: Duration,
) -> Result<ExitStatus, CapabilityError> {
    let start = Instant::now();
    loop {
        match child.try_wait() {
            Ok(Some(status)) => {
                debug!(target: PROCESS_TARGET, program, ?status, "subprocess exited");
                return Ok(status);
            }
            Ok(None) if start.elapsed() > timeout => {
                warn!(
                    target: PROCESS_TARGET,
                    program,
                    timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
                    "subprocess timed out, killing"
                );
                drop(child.kill());
                drop(child.wait());
                return Err(CapabilityError::timeout(format!(
                    "'{program}' did not finish within {}ms",
                    timeout.as_millis()
                )));
            }
            Ok(None) => thread::sleep(POLL_INTERVAL),
            Err(error) => {
                return Err(CapabilityError::io(format!(
                    "failed to wait for '{program}': {error}"
                )));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use switchboard_bus::ErrorKind;

    use super::*;

    #[test]
    fn output_and_status_are_collected() {
        let output = run_with_deadline(
            "sh",
            ["-c", "printf out; printf err >&2; exit 3"],
            None,
            Duration::from_secs(5),
        )
        .expect("run");
        assert_eq!(output.stdout_text(), "out");
        assert_eq!(output.stderr_text(), "err");
        assert_eq!(output.status.code(), Some(3));
    }

    #[test]
    fn input_is_piped_to_stdin() {
        let output = run_with_deadline(
            "cat",
            Vec::<&str>::new(),
            Some(b"hello".to_vec()),
            Duration::from_secs(5),
        )
        .expect("run");
        assert_eq!(output.stdout_text(), "hello");
    }

    #[test]
    fn slow_programs_are_killed() {
        let error = run_with_deadline("sleep", ["5"], None, Duration::from_millis(100))
            .expect_err("timeout");
        assert_eq!(error.kind(), ErrorKind::Timeout);
    }

    #[test]
    fn missing_programs_are_io_errors() {
        let error = run_with_deadline(
            "switchboard-no-such-program",
            Vec::<&str>::new(),
            None,
            Duration::from_secs(1),
        )
        .expect_err("spawn failure");
        assert_eq!(error.kind(), ErrorKind::Io);
    }
}
