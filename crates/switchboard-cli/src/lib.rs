//! Command-line client for the switchboard message bus.
//!
//! `switchboard TYPE [--kind K] [--data JSON] [--correlation ID]` sends one
//! message; without `TYPE`, newline-delimited JSON messages are read from
//! stdin. Replies are written to stdout as JSON lines and every error reply
//! is summarised on stderr. The exit code is non-zero when any error
//! arrived.
//!
//! By default messages go to the `switchboardd` worker, which is spawned on
//! first use. `--inline` routes them against a registry built in-process, and
//! `switchboard daemon start|stop|status` manages the worker directly.

use std::ffi::{OsStr, OsString};
use std::io::{Read, Write};
use std::os::unix::net::UnixStream;
use std::process::ExitCode;

use clap::Parser;
use tracing::debug;

mod cli;
mod config;
mod errors;
mod inline;
mod input;
mod lifecycle;
mod output;
mod session;
mod telemetry;
mod transport;

use cli::{Cli, CliCommand};
use config::{ConfigLoader, OrthoConfigLoader, split_config_arguments};
use errors::{AppError, is_daemon_not_running};
use input::Input;
use lifecycle::SpawnContext;
use output::ReplySink;

const CLI_TARGET: &str = env!("CARGO_PKG_NAME");

/// The standard streams handed to one invocation.
pub(crate) struct IoStreams<'a, R, W, E> {
    pub(crate) stdin: &'a mut R,
    pub(crate) stdout: &'a mut W,
    pub(crate) stderr: &'a mut E,
}

struct CliRunner<'a, L: ConfigLoader> {
    loader: &'a L,
    daemon_binary: Option<&'a OsStr>,
}

impl<'a, L: ConfigLoader> CliRunner<'a, L> {
    const fn new(loader: &'a L) -> Self {
        Self {
            loader,
            daemon_binary: None,
        }
    }

    #[cfg(test)]
    const fn with_daemon_binary(mut self, daemon_binary: Option<&'a OsStr>) -> Self {
        self.daemon_binary = daemon_binary;
        self
    }

    fn run<I, R, W, E>(&self, args: I, io: IoStreams<'_, R, W, E>) -> ExitCode
    where
        I: IntoIterator<Item = OsString>,
        R: Read + Send,
        W: Write,
        E: Write,
    {
        let IoStreams {
            stdin,
            stdout,
            stderr,
        } = io;
        let args: Vec<OsString> = args.into_iter().collect();
        let split = split_config_arguments(&args);
        let cli = match Cli::try_parse_from(&split.command_arguments) {
            Ok(cli) => cli,
            Err(error) => return report_usage(&error, stdout, stderr),
        };

        let result = self.loader.load(&split.config_arguments).and_then(|config| {
            let _telemetry = telemetry::install(&config);
            let context = SpawnContext {
                config: &config,
                config_arguments: &split.config_arguments,
                binary_override: self.daemon_binary,
            };
            execute(&cli, context, stdin, stdout, stderr)
        });

        match result {
            Ok(exit_code) => exit_code,
            Err(error) => {
                drop(writeln!(stderr, "switchboard: {error}"));
                ExitCode::FAILURE
            }
        }
    }
}

/// Runs the client with the given arguments and standard streams.
#[must_use]
pub fn run<I, R, W, E>(args: I, stdin: &mut R, stdout: &mut W, stderr: &mut E) -> ExitCode
where
    I: IntoIterator<Item = OsString>,
    R: Read + Send,
    W: Write,
    E: Write,
{
    CliRunner::new(&OrthoConfigLoader).run(
        args,
        IoStreams {
            stdin,
            stdout,
            stderr,
        },
    )
}

fn execute<R, W, E>(
    cli: &Cli,
    context: SpawnContext<'_>,
    stdin: &mut R,
    stdout: &mut W,
    stderr: &mut E,
) -> Result<ExitCode, AppError>
where
    R: Read + Send,
    W: Write,
    E: Write,
{
    if let Some(CliCommand::Daemon { action }) = &cli.command {
        return lifecycle::handle(*action, context, stdout).map_err(AppError::from);
    }

    let input = Input::from_cli(cli, stdin)?;
    let mut sink = ReplySink::new(stdout, stderr);
    if cli.inline {
        let registry = inline::build_registry(context.config)?;
        inline::run(&registry, input, &mut sink)?;
    } else {
        let stream = connect_worker(context)?;
        session::run(stream, input, &mut sink)?;
    }
    Ok(sink.exit_code())
}

fn connect_worker(context: SpawnContext<'_>) -> Result<UnixStream, AppError> {
    match transport::connect(context.config.daemon_socket()) {
        Ok(stream) => Ok(stream),
        Err(error) if is_daemon_not_running(&error) => {
            debug!(
                target: CLI_TARGET,
                socket = %context.config.daemon_socket(),
                "worker not listening; starting it"
            );
            Ok(lifecycle::connect_or_spawn(context)?)
        }
        Err(error) => Err(error),
    }
}

/// Prints clap's rendering of a parse outcome, honouring help and version.
fn report_usage<W, E>(error: &clap::Error, stdout: &mut W, stderr: &mut E) -> ExitCode
where
    W: Write,
    E: Write,
{
    let rendered = error.render();
    if error.use_stderr() {
        drop(write!(stderr, "{rendered}"));
        ExitCode::from(2)
    } else {
        drop(write!(stdout, "{rendered}"));
        ExitCode::SUCCESS
    }
}
