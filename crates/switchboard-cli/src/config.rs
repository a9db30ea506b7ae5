//! Configuration loading helpers for the switchboard client.
//!
//! Leading configuration flags are split off for `ortho_config`; the rest of
//! the command line is parsed by clap. The same configuration arguments are
//! forwarded to a spawned worker so both processes agree on the socket.

use std::ffi::{OsStr, OsString};

use ortho_config::OrthoConfig;
use switchboard_config::Config;

use crate::errors::AppError;

/// Flags understood by the configuration loader.
///
/// These must precede any client flag or `TYPE` on the command line.
pub(crate) const CONFIG_CLI_FLAGS: &[&str] = &[
    "--config-path",
    "--daemon-socket",
    "--log-filter",
    "--log-format",
    "--spawn-timeout-ms",
    "--vfs-root",
    "--vfs-mounts",
    "--store-path",
    "--http-program",
    "--agent-socket",
];

pub(crate) trait ConfigLoader {
    /// Loads configuration from the split-off configuration arguments.
    fn load(&self, args: &[OsString]) -> Result<Config, AppError>;
}

/// Loads configuration through `ortho_config` layering.
pub(crate) struct OrthoConfigLoader;

impl ConfigLoader for OrthoConfigLoader {
    fn load(&self, args: &[OsString]) -> Result<Config, AppError> {
        Config::load_from_iter(args.iter().cloned()).map_err(AppError::LoadConfiguration)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FlagAction {
    Include { needs_value: bool },
    Stop,
}

fn classify(argument: &OsStr) -> FlagAction {
    let text = argument.to_string_lossy();
    if !text.starts_with("--") {
        return FlagAction::Stop;
    }
    let (flag, has_inline_value) = text
        .split_once('=')
        .map_or((text.as_ref(), false), |(flag, _)| (flag, true));
    if CONFIG_CLI_FLAGS.contains(&flag) {
        FlagAction::Include {
            needs_value: !has_inline_value,
        }
    } else {
        FlagAction::Stop
    }
}

/// Configuration arguments and the remaining command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ConfigArgumentSplit {
    /// Program name followed by the configuration flags and their values.
    pub(crate) config_arguments: Vec<OsString>,
    /// Program name followed by everything after the configuration flags.
    pub(crate) command_arguments: Vec<OsString>,
}

pub(crate) fn split_config_arguments(args: &[OsString]) -> ConfigArgumentSplit {
    let mut remaining = args.iter();
    let program: Vec<OsString> = remaining.next().cloned().into_iter().collect();
    let mut config_arguments = program.clone();
    let mut pending_value = false;
    let mut rest = remaining.as_slice();

    while let Some((argument, tail)) = rest.split_first() {
        if pending_value {
            pending_value = false;
        } else {
            match classify(argument) {
                FlagAction::Include { needs_value } => pending_value = needs_value,
                FlagAction::Stop => break,
            }
        }
        config_arguments.push(argument.clone());
        rest = tail;
    }

    let mut command_arguments = program;
    command_arguments.extend(rest.iter().cloned());
    ConfigArgumentSplit {
        config_arguments,
        command_arguments,
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    fn os(args: &[&str]) -> Vec<OsString> {
        args.iter().map(OsString::from).collect()
    }

    #[rstest]
    #[case::inline_value("--log-filter=debug", FlagAction::Include { needs_value: false })]
    #[case::separate_value("--log-filter", FlagAction::Include { needs_value: true })]
    #[case::positional("Ping", FlagAction::Stop)]
    #[case::client_flag("--inline", FlagAction::Stop)]
    fn flags_are_classified(#[case] argument: &str, #[case] expected: FlagAction) {
        assert_eq!(classify(OsStr::new(argument)), expected);
    }

    #[test]
    fn leading_config_flags_are_split_off() {
        let split = split_config_arguments(&os(&[
            "switchboard",
            "--daemon-socket",
            "/tmp/sb/switchboardd.sock",
            "--log-filter=debug",
            "--inline",
            "Ping",
        ]));
        assert_eq!(
            split.config_arguments,
            os(&[
                "switchboard",
                "--daemon-socket",
                "/tmp/sb/switchboardd.sock",
                "--log-filter=debug"
            ])
        );
        assert_eq!(
            split.command_arguments,
            os(&["switchboard", "--inline", "Ping"])
        );
    }

    #[test]
    fn config_flags_after_the_command_stay_with_it() {
        let split = split_config_arguments(&os(&["switchboard", "Ping", "--log-filter", "x"]));
        assert_eq!(split.config_arguments, os(&["switchboard"]));
        assert_eq!(
            split.command_arguments,
            os(&["switchboard", "Ping", "--log-filter", "x"])
        );
    }

    #[test]
    fn empty_arguments_split_cleanly() {
        let split = split_config_arguments(&[]);
        assert!(split.config_arguments.is_empty());
        assert!(split.command_arguments.is_empty());
    }
}
