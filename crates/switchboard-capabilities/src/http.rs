//! `Http.Fetch`, performed by an external HTTP client.
//!
//! Header values may embed sealed tokens. They are opened just before the
//! request and handed to the client through a private temporary file rather
//! than the command line, so the plaintext never shows up in the process
//! table. The client is invoked curl-style:
//!
//! ```text
//! <program> -sS -X METHOD -H @headers -w "\n%{http_code}" [--data-binary @-] -- URL
//! ```
//!
//! and must print the response body followed by a newline and the status code.

use std::collections::BTreeMap;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use switchboard_bus::{Capability, CapabilityError, ExecutionUnit};
use switchboard_seal::unseal_headers;
use tempfile::{Builder, NamedTempFile};
use tracing::debug;
use url::Url;
use zeroize::Zeroizing;

use crate::builtin::Builtin;
use crate::failure::{describe, seal_failure};
use crate::process::run_with_deadline;
use crate::services::SecretSealer;

const HTTP_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::http");
const STATUS_FORMAT: &str = "\n%{http_code}";

fn default_method() -> String {
    "GET".to_owned()
}

/// `Http.Fetch` input.
#[derive(Debug, Clone, Deserialize)]
pub struct FetchRequest {
    /// `http` or `https` URL.
    pub url: String,
    /// Request method, `GET` when omitted.
    #[serde(default = "default_method")]
    pub method: String,
    /// Request headers; values may embed sealed tokens.
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    /// Request body.
    #[serde(default)]
    pub body: Option<String>,
}

/// `Http.Fetch` output.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct FetchResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response body, lossily decoded as UTF-8.
    pub body: String,
}

/// Performs HTTP requests through `program`.
pub struct FetchCapability {
    sealer: Arc<dyn SecretSealer>,
    program: String,
    timeout: Duration,
}

impl FetchCapability {
    /// Creates the capability.
    #[must_use]
    pub fn new(
        sealer: Arc<dyn SecretSealer>,
        program: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            sealer,
            program: program.into(),
            timeout,
        }
    }
}

fn is_tchar(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || "!#$%&'*+-.^_`|~".contains(ch)
}

fn is_http_token(value: &str) -> bool {
    !value.is_empty() && value.chars().all(is_tchar)
}

impl Capability for FetchCapability {
    type Input = FetchRequest;
    type Output = FetchResponse;

    fn description(&self) -> &str {
        Builtin::HttpFetch.description()
    }

    fn validate_input(&self, input: &FetchRequest) -> Result<(), String> {
        let url = Url::parse(&input.url).map_err(|error| format!("invalid url: {error}"))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(format!("unsupported scheme '{}'", url.scheme()));
        }
        if !is_http_token(&input.method) {
            return Err(format!("invalid method '{}'", input.method));
        }
        for (name, value) in &input.headers {
            if !is_http_token(name) {
                return Err(format!("invalid header name '{name}'"));
            }
            if value.contains(['\r', '\n']) {
                return Err(format!("header '{name}' contains a line break"));
            }
        }
        Ok(())
    }

    fn validate_output(&self, output: &FetchResponse) -> Result<(), String> {
        if (100..=599).contains(&output.status) {
            Ok(())
        } else {
            Err(format!("status {} is outside the HTTP range", output.status))
        }
    }

    fn instantiate(&self) -> Box<dyn ExecutionUnit<FetchRequest, FetchResponse>> {
        let sealer = Arc::clone(&self.sealer);
        let program = self.program.clone();
        let timeout = self.timeout;
        Box::new(move |input: FetchRequest| fetch(&*sealer, &program, timeout, input))
    }
}

fn fetch(
    sealer: &dyn SecretSealer,
    program: &str,
    timeout: Duration,
    input: FetchRequest,
) -> Result<FetchResponse, CapabilityError> {
    let headers = unseal_headers(&input.headers, |token| sealer.open(token)).map_err(|error| {
        CapabilityError::new(seal_failure(&error.source).kind(), error.to_string())
    })?;
    let header_file = write_headers(&headers)?;
    drop(headers);

    let mut args = vec![
        "-sS".to_owned(),
        "-X".to_owned(),
        input.method.clone(),
        "-H".to_owned(),
        format!("@{}", header_file.path().display()),
        "-w".to_owned(),
        STATUS_FORMAT.to_owned(),
    ];
    if input.body.is_some() {
        args.extend(["--data-binary".to_owned(), "@-".to_owned()]);
    }
    args.extend(["--".to_owned(), input.url.clone()]);

    debug!(
        target: HTTP_TARGET,
        method = %input.method,
        url = %input.url,
        header_count = input.headers.len(),
        "performing request"
    );
    let output = run_with_deadline(program, &args, input.body.map(String::into_bytes), timeout)?;
    drop(header_file);

    if !output.status.success() {
        return Err(CapabilityError::execution(format!(
            "'{program}' exited with {}: {}",
            output.status,
            output.stderr_text()
        )));
    }
    parse_response(&output.stdout_text())
}

fn write_headers(headers: &BTreeMap<String, String>) -> Result<NamedTempFile, CapabilityError> {
    let io_failure = |error: std::io::Error| {
        CapabilityError::io(format!("failed to stage headers: {}", describe(&error)))
    };
    let mut builder = Builder::new();
    builder.prefix("switchboard-headers-");
    #[cfg(unix)]
    {
        use std::fs::Permissions;
        use std::os::unix::fs::PermissionsExt;
        builder.permissions(Permissions::from_mode(0o600));
    }
    let mut file = builder.tempfile().map_err(io_failure)?;
    let mut contents = Zeroizing::new(String::new());
    for (name, value) in headers {
        contents.push_str(name);
        contents.push_str(": ");
        contents.push_str(value);
        contents.push('\n');
    }
    file.write_all(contents.as_bytes()).map_err(io_failure)?;
    file.flush().map_err(io_failure)?;
    Ok(file)
}

fn parse_response(stdout: &str) -> Result<FetchResponse, CapabilityError> {
    let (body, code) = stdout.rsplit_once('\n').unwrap_or(("", stdout));
    let status = code.trim().parse::<u16>().map_err(|_| {
        CapabilityError::execution(format!(
            "could not read a status code from '{}'",
            code.trim()
        ))
    })?;
    Ok(FetchResponse {
        status,
        body: body.to_owned(),
    })
}

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use switchboard_seal::Sealer;
    use switchboard_seal::testing::MemoryConnector;

    use super::*;

    fn capability() -> FetchCapability {
        let sealer: Arc<dyn SecretSealer> = Arc::new(Sealer::new(MemoryConnector::ed25519(1)));
        FetchCapability::new(sealer, "curl", Duration::from_secs(1))
    }

    fn request(url: &str, method: &str) -> FetchRequest {
        FetchRequest {
            url: url.to_owned(),
            method: method.to_owned(),
            headers: BTreeMap::new(),
            body: None,
        }
    }

    #[rstest]
    #[case::https("https://example.com/a", "GET")]
    #[case::http_post("http://localhost:8080/", "POST")]
    fn acceptable_requests_validate(#[case] url: &str, #[case] method: &str) {
        assert!(capability().validate_input(&request(url, method)).is_ok());
    }

    #[rstest]
    #[case::file_scheme("file:///etc/passwd", "GET")]
    #[case::not_a_url("example.com", "GET")]
    #[case::method_with_space("https://example.com", "GET /")]
    #[case::empty_method("https://example.com", "")]
    fn unacceptable_requests_fail(#[case] url: &str, #[case] method: &str) {
        assert!(capability().validate_input(&request(url, method)).is_err());
    }

    #[test]
    fn header_injection_is_rejected() {
        let mut input = request("https://example.com", "GET");
        input
            .headers
            .insert("X-Test".to_owned(), "a\r\nHost: evil".to_owned());
        assert!(capability().validate_input(&input).is_err());
    }

    #[rstest]
    #[case::body("hello\n200", 200, "hello")]
    #[case::multiline_body("a\nb\n404", 404, "a\nb")]
    #[case::empty_body("\n204", 204, "")]
    #[case::status_only("301", 301, "")]
    fn responses_split_at_the_last_line(
        #[case] stdout: &str,
        #[case] status: u16,
        #[case] body: &str,
    ) {
        let response = parse_response(stdout).expect("parse");
        assert_eq!(response.status, status);
        assert_eq!(response.body, body);
    }

    #[test]
    fn missing_status_is_an_execution_error() {
        let error = parse_response("body\nnot-a-code").expect_err("status");
        assert_eq!(error.kind(), switchboard_bus::ErrorKind::Execution);
    }
}
