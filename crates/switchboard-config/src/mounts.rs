use std::str::FromStr;

use camino::Utf8PathBuf;
use thiserror::Error;

/// A single `name=/absolute/path` mount table entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountEntry {
    /// Top-level virtual segment, without slashes.
    pub name: String,
    /// Absolute host directory the segment maps to.
    pub path: Utf8PathBuf,
}

impl FromStr for MountEntry {
    type Err = MountParseError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let (raw_name, raw_path) = input
            .split_once('=')
            .ok_or_else(|| MountParseError::MissingSeparator(input.to_owned()))?;
        let name = raw_name.trim();
        if name.is_empty() || name.contains('/') {
            return Err(MountParseError::InvalidName(name.to_owned()));
        }
        let path = Utf8PathBuf::from(raw_path.trim());
        if !path.is_absolute() {
            return Err(MountParseError::RelativePath(path));
        }
        Ok(Self {
            name: name.to_owned(),
            path,
        })
    }
}

/// Errors raised while parsing mount table entries.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MountParseError {
    /// The entry lacked the `=` separator.
    #[error("mount entry '{0}' must use the form name=/absolute/path")]
    MissingSeparator(String),
    /// The mount name was empty or contained a slash.
    #[error("mount name '{0}' must be a single non-empty segment")]
    InvalidName(String),
    /// The mount target was relative.
    #[error("mount target '{0}' must be absolute")]
    RelativePath(Utf8PathBuf),
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[test]
    fn parses_name_and_path() {
        let entry: MountEntry = "docs=/srv/docs".parse().expect("parse mount");
        assert_eq!(entry.name, "docs");
        assert_eq!(entry.path, Utf8PathBuf::from("/srv/docs"));
    }

    #[rstest]
    #[case::no_separator("docs")]
    #[case::empty_name("=/srv/docs")]
    #[case::nested_name("a/b=/srv/docs")]
    #[case::relative_target("docs=srv/docs")]
    fn rejects_malformed_entries(#[case] input: &str) {
        assert!(input.parse::<MountEntry>().is_err(), "{input} should fail");
    }
}
