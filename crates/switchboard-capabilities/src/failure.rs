//! Translation of collaborator errors into capability failures.

use std::error::Error;

use switchboard_bus::{CapabilityError, ErrorKind};
use switchboard_seal::{AgentError, SealError};
use switchboard_vfs::{VaultError, VfsError};

/// Renders `error` followed by each of its sources.
pub(crate) fn describe(error: &dyn Error) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        if !message.ends_with(&text) {
            message.push_str(": ");
            message.push_str(&text);
        }
        source = cause.source();
    }
    message
}

pub(crate) fn seal_failure(error: &SealError) -> CapabilityError {
    let kind = match error {
        SealError::Format(_)
        | SealError::UnsupportedVersion { .. }
        | SealError::UnsupportedAlgorithm { .. } => ErrorKind::Format,
        SealError::KeyMismatch { .. } => ErrorKind::KeyMismatch,
        SealError::Integrity => ErrorKind::Integrity,
        SealError::Agent(AgentError::Connect { .. } | AgentError::Io(_)) => ErrorKind::Io,
        SealError::Agent(_) | SealError::Crypto => ErrorKind::Execution,
    };
    CapabilityError::new(kind, describe(error))
}

pub(crate) fn vault_failure(error: &VaultError) -> CapabilityError {
    let kind = match error {
        VaultError::InvalidKey { .. } | VaultError::PlaintextRejected { .. } => {
            ErrorKind::Validation
        }
        VaultError::Io { .. } => ErrorKind::Io,
        VaultError::Corrupt { .. } | VaultError::Poisoned => ErrorKind::Execution,
    };
    CapabilityError::new(kind, describe(error))
}

pub(crate) fn vfs_failure(error: &VfsError) -> CapabilityError {
    CapabilityError::validation(describe(error))
}

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use switchboard_seal::FormatError;

    use super::*;

    #[rstest]
    #[case::format(SealError::Format(FormatError::MissingPrefix), ErrorKind::Format)]
    #[case::version(SealError::UnsupportedVersion { version: 9 }, ErrorKind::Format)]
    #[case::mismatch(
        SealError::KeyMismatch { expected: "aa".into(), found: "bb".into() },
        ErrorKind::KeyMismatch
    )]
    #[case::integrity(SealError::Integrity, ErrorKind::Integrity)]
    #[case::no_agent(SealError::Agent(AgentError::NotConfigured), ErrorKind::Execution)]
    #[case::agent_io(
        SealError::Agent(AgentError::Io(std::io::Error::other("reset"))),
        ErrorKind::Io
    )]
    fn seal_errors_keep_their_category(#[case] error: SealError, #[case] kind: ErrorKind) {
        assert_eq!(seal_failure(&error).kind(), kind);
    }

    #[test]
    fn plaintext_rejection_is_a_validation_failure() {
        let error = VaultError::PlaintextRejected {
            key: "/vault/token".into(),
        };
        let failure = vault_failure(&error);
        assert_eq!(failure.kind(), ErrorKind::Validation);
        assert!(failure.message().contains("/vault/token"));
    }

    #[test]
    fn describe_includes_sources() {
        let error = SealError::Agent(AgentError::Io(std::io::Error::other("reset by peer")));
        assert_eq!(describe(&error), "SSH agent I/O failed: reset by peer");
    }
}
