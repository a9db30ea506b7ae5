//! `Tool.Describe`: asks an external program to describe itself.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use switchboard_bus::{Capability, CapabilityError, ExecutionUnit};
use tracing::debug;

use crate::builtin::Builtin;
use crate::process::{ProcessOutput, run_with_deadline};

const TOOL_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::tool");

/// `Tool.Describe` input.
#[derive(Debug, Clone, Deserialize)]
pub struct DescribeRequest {
    /// Program name or path.
    pub program: String,
}

/// Which flag produced the description.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DescriptionSource {
    /// `--description` output.
    Description,
    /// First line of `--help` output.
    Help,
}

/// `Tool.Describe` output.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ToolDescription {
    /// Program that was described.
    pub program: String,
    /// Self-reported description.
    pub description: String,
    /// Flag that produced it.
    pub source: DescriptionSource,
}

/// Runs `--description`, falling back to `--help`.
#[derive(Debug)]
pub struct DescribeCapability {
    timeout: Duration,
}

impl DescribeCapability {
    /// Creates the capability with a per-invocation `timeout`.
    #[must_use]
    pub const fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Capability for DescribeCapability {
    type Input = DescribeRequest;
    type Output = ToolDescription;

    fn description(&self) -> &str {
        Builtin::ToolDescribe.description()
    }

    fn validate_input(&self, input: &DescribeRequest) -> Result<(), String> {
        if input.program.is_empty() || input.program.starts_with('-') {
            return Err(format!("'{}' is not a program name", input.program));
        }
        if input.program.chars().any(char::is_whitespace) {
            return Err("program names must not contain whitespace".to_owned());
        }
        Ok(())
    }

    fn validate_output(&self, output: &ToolDescription) -> Result<(), String> {
        if output.description.trim().is_empty() {
            return Err("description is empty".to_owned());
        }
        Ok(())
    }

    fn instantiate(&self) -> Box<dyn ExecutionUnit<DescribeRequest, ToolDescription>> {
        let timeout = self.timeout;
        Box::new(move |input: DescribeRequest| describe_program(input.program, timeout))
    }
}

fn describe_program(
    program: String,
    timeout: Duration,
) -> Result<ToolDescription, CapabilityError> {
    let described = run_with_deadline(&program, ["--description"], None, timeout)?;
    if let Some(description) = successful_text(&described).map(|text| text.trim().to_owned()) {
        return Ok(ToolDescription {
            program,
            description,
            source: DescriptionSource::Description,
        });
    }
    debug!(target: TOOL_TARGET, program = %program, "--description unavailable, trying --help");

    let help = run_with_deadline(&program, ["--help"], None, timeout)?;
    let line = successful_text(&help).and_then(|text| {
        text.lines()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .map(str::to_owned)
    });
    match line {
        Some(description) => Ok(ToolDescription {
            program,
            description,
            source: DescriptionSource::Help,
        }),
        None => Err(CapabilityError::execution(format!(
            "'{program}' answers neither --description nor --help"
        ))),
    }
}

/// Non-blank output of a successful run; help text on stderr counts.
fn successful_text(output: &ProcessOutput) -> Option<String> {
    if !output.status.success() {
        return None;
    }
    [output.stdout_text(), output.stderr_text()]
        .into_iter()
        .find(|text| !text.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case::empty("")]
    #[case::flag("--help")]
    #[case::shell("ls -la")]
    fn suspicious_program_names_are_rejected(#[case] program: &str) {
        let request = DescribeRequest {
            program: program.to_owned(),
        };
        assert!(DescribeCapability::new(Duration::from_secs(1)).validate_input(&request).is_err());
    }

    #[test]
    fn missing_programs_surface_as_io_errors() {
        let error = describe_program("switchboard-no-such-tool".to_owned(), Duration::from_secs(1))
            .expect_err("missing program");
        assert_eq!(error.kind(), switchboard_bus::ErrorKind::Io);
    }

    #[test]
    fn source_serialises_in_lowercase() {
        let value = serde_json::to_value(DescriptionSource::Help).expect("serialise");
        assert_eq!(value, "help");
    }
}
