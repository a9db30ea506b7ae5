//! Command-line interface definition for the `switchboard` client.

use clap::{Parser, Subcommand, ValueEnum};
use switchboard_bus::MessageKind;

/// Sends messages to the switchboard worker, or routes them in-process.
///
/// Without a `TYPE`, newline-delimited JSON messages are read from stdin.
#[derive(Parser, Debug)]
#[command(
    name = "switchboard",
    disable_help_subcommand = true,
    args_conflicts_with_subcommands = true
)]
pub(crate) struct Cli {
    /// Routes messages against a local registry instead of the worker.
    #[arg(long)]
    pub(crate) inline: bool,
    /// Kind of the message built from `TYPE`.
    #[arg(long, value_enum, requires = "message_type")]
    pub(crate) kind: Option<KindArg>,
    /// JSON payload of the message built from `TYPE`.
    #[arg(long, value_name = "JSON", requires = "message_type")]
    pub(crate) data: Option<String>,
    /// Correlation id of the message built from `TYPE`.
    #[arg(long, value_name = "ID", requires = "message_type")]
    pub(crate) correlation: Option<String>,
    /// Worker lifecycle commands.
    #[command(subcommand)]
    pub(crate) command: Option<CliCommand>,
    /// Capability to invoke, for example `Ping`.
    #[arg(value_name = "TYPE")]
    pub(crate) message_type: Option<String>,
}

/// Message kinds a caller may originate.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, ValueEnum)]
pub(crate) enum KindArg {
    /// State-changing request.
    #[default]
    Command,
    /// Side-effect free request.
    Query,
    /// Notification; passed through without dispatch.
    Event,
}

impl From<KindArg> for MessageKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Command => Self::Command,
            KindArg::Query => Self::Query,
            KindArg::Event => Self::Event,
        }
    }
}

/// Structured subcommands.
#[derive(Subcommand, Debug, Clone)]
pub(crate) enum CliCommand {
    /// Manages the background worker.
    Daemon {
        /// The lifecycle action to perform.
        #[command(subcommand)]
        action: DaemonAction,
    },
}

/// Worker lifecycle actions.
#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DaemonAction {
    /// Starts the worker if it is not already listening.
    Start,
    /// Stops the worker gracefully.
    Stop,
    /// Prints the worker's health snapshot.
    Status,
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[test]
    fn type_flags_parse() {
        let cli = Cli::try_parse_from([
            "switchboard",
            "--kind",
            "query",
            "--data",
            r#"{"payload":1}"#,
            "Ping",
        ])
        .expect("parse");
        assert_eq!(cli.message_type.as_deref(), Some("Ping"));
        assert_eq!(cli.kind, Some(KindArg::Query));
        assert_eq!(cli.data.as_deref(), Some(r#"{"payload":1}"#));
    }

    #[test]
    fn message_flags_require_a_type() {
        let error = Cli::try_parse_from(["switchboard", "--data", "{}"]).expect_err("rejected");
        assert_eq!(error.kind(), clap::error::ErrorKind::MissingRequiredArgument);
    }

    #[rstest]
    #[case::start("start", DaemonAction::Start)]
    #[case::stop("stop", DaemonAction::Stop)]
    #[case::status("status", DaemonAction::Status)]
    fn daemon_actions_parse(#[case] word: &str, #[case] expected: DaemonAction) {
        let cli = Cli::try_parse_from(["switchboard", "daemon", word]).expect("parse");
        assert!(matches!(
            cli.command,
            Some(CliCommand::Daemon { action }) if action == expected
        ));
    }
}
