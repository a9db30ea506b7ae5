//! Substitution of sealed tokens embedded in header values.
//!
//! A header may carry a token anywhere in its value, for example
//! `Authorization: Bearer pwenc:v1:...`. Each embedded token is opened and
//! replaced by its plaintext. Errors name the header but never its value.

use std::collections::BTreeMap;

use thiserror::Error;
use zeroize::Zeroizing;

use crate::error::SealError;
use crate::token::{TOKEN_PREFIX, is_token_byte};

/// A header value contained a token that could not be opened.
#[derive(Debug, Error)]
#[error("failed to unseal header '{name}'")]
pub struct HeaderError {
    /// Header whose value failed.
    pub name: String,
    /// Why the embedded token failed to open.
    #[source]
    pub source: SealError,
}

/// Replaces every embedded token in `value` using `open`.
///
/// # Errors
///
/// Returns the first error raised by `open`.
pub fn unseal_value<F>(value: &str, open: &mut F) -> Result<String, SealError>
where
    F: FnMut(&str) -> Result<Zeroizing<String>, SealError>,
{
    let mut output = String::with_capacity(value.len());
    let mut rest = value;
    while let Some(start) = rest.find(TOKEN_PREFIX) {
        let (before, candidate) = rest.split_at(start);
        output.push_str(before);
        let length = TOKEN_PREFIX.len()
            + candidate
                .bytes()
                .skip(TOKEN_PREFIX.len())
                .take_while(|byte| is_token_byte(*byte))
                .count();
        let (token, after) = candidate.split_at(length);
        output.push_str(&open(token)?);
        rest = after;
    }
    output.push_str(rest);
    Ok(output)
}

/// Returns a copy of `headers` with every embedded token opened.
///
/// # Errors
///
/// Returns a [`HeaderError`] naming the first header whose token failed.
pub fn unseal_headers<F>(
    headers: &BTreeMap<String, String>,
    mut open: F,
) -> Result<BTreeMap<String, String>, HeaderError>
where
    F: FnMut(&str) -> Result<Zeroizing<String>, SealError>,
{
    headers
        .iter()
        .map(|(name, value)| {
            unseal_value(value, &mut open)
                .map(|unsealed| (name.clone(), unsealed))
                .map_err(|source| HeaderError {
                    name: name.clone(),
                    source,
                })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use rstest::{fixture, rstest};

    use super::*;
    use crate::key::SealingKey;
    use crate::token::{open_with_key, seal_with_key};

    #[fixture]
    fn key() -> SealingKey {
        SealingKey::from_parts("c".repeat(64), [3; 32])
    }

    fn headers(pairs: &[(&str, String)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(name, value)| ((*name).to_owned(), value.clone()))
            .collect()
    }

    #[rstest]
    fn embedded_tokens_are_substituted(key: SealingKey) {
        let token = seal_with_key(&key, "s3cret").expect("seal");
        let input = headers(&[
            ("Authorization", format!("Bearer {token}")),
            ("Accept", String::from("application/json")),
        ]);
        let output = unseal_headers(&input, |token| open_with_key(&key, token)).expect("unseal");
        assert_eq!(output["Authorization"], "Bearer s3cret");
        assert_eq!(output["Accept"], "application/json");
    }

    #[rstest]
    fn several_tokens_in_one_value_are_substituted(key: SealingKey) {
        let user = seal_with_key(&key, "alice").expect("seal");
        let pass = seal_with_key(&key, "pw").expect("seal");
        let input = headers(&[("X-Credentials", format!("{user}:{pass};"))]);
        let output = unseal_headers(&input, |token| open_with_key(&key, token)).expect("unseal");
        assert_eq!(output["X-Credentials"], "alice:pw;");
    }

    #[rstest]
    fn failures_name_only_the_header(key: SealingKey) {
        let input = headers(&[("X-Api-Key", String::from("pwenc:v1:garbage"))]);
        let error = unseal_headers(&input, |token| open_with_key(&key, token))
            .expect_err("bad token");
        assert_eq!(error.name, "X-Api-Key");
        let rendered = error.to_string();
        assert!(rendered.contains("X-Api-Key"));
        assert!(!rendered.contains("garbage"));
    }
}
