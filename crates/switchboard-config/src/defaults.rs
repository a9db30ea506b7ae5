use camino::Utf8PathBuf;
use std::env;

#[cfg(unix)]
use libc::geteuid;

#[cfg(unix)]
use dirs::{home_dir, runtime_dir};

use crate::socket::SocketEndpoint;

/// Default log filter expression used by the binaries.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Default wait budget for a freshly spawned worker.
pub const DEFAULT_SPAWN_TIMEOUT_MS: u64 = 5_000;

/// Program used by the HTTP fetch capability unless overridden.
pub const DEFAULT_HTTP_PROGRAM: &str = "curl";

/// Default log filter expression used by the binaries.
#[must_use]
pub const fn default_log_filter() -> &'static str {
    DEFAULT_LOG_FILTER
}

/// Default logging format for the binaries.
#[must_use]
pub const fn default_log_format() -> crate::logging::LogFormat {
    crate::logging::LogFormat::Json
}

/// Computes the default socket endpoint for the worker.
///
/// Prefers `$XDG_RUNTIME_DIR/switchboard`, falling back to a per-user
/// namespace under the temporary directory.
#[must_use]
pub fn default_socket_endpoint() -> SocketEndpoint {
    let (mut base, apply_namespace) = match runtime_base_directory() {
        Some(dir) => (dir, false),
        None => (fallback_base_directory(), true),
    };

    base.push("switchboard");
    if apply_namespace {
        base.push(user_namespace());
    }

    SocketEndpoint::unix(base.join("switchboardd.sock"))
}

/// Default anchor for virtual path resolution: the user's home directory.
#[must_use]
pub fn default_vfs_root() -> Utf8PathBuf {
    #[cfg(unix)]
    {
        home_dir()
            .and_then(|path| Utf8PathBuf::from_path_buf(path).ok())
            .unwrap_or_else(|| Utf8PathBuf::from("/"))
    }

    #[cfg(not(unix))]
    {
        Utf8PathBuf::from("/")
    }
}

#[cfg(unix)]
fn runtime_base_directory() -> Option<Utf8PathBuf> {
    runtime_dir().and_then(|path| Utf8PathBuf::from_path_buf(path).ok())
}

#[cfg(not(unix))]
fn runtime_base_directory() -> Option<Utf8PathBuf> {
    None
}

fn fallback_base_directory() -> Utf8PathBuf {
    let candidate = env::temp_dir();
    Utf8PathBuf::from_path_buf(candidate).unwrap_or_else(|_| Utf8PathBuf::from("/tmp"))
}

#[cfg(unix)]
fn user_namespace() -> String {
    // SAFETY: `geteuid` has no preconditions and cannot fail.
    let uid = unsafe { geteuid() };
    format!("uid-{uid}")
}

#[cfg(not(unix))]
fn user_namespace() -> String {
    String::from("default")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_socket_lives_in_switchboard_namespace() {
        let endpoint = default_socket_endpoint();
        assert_eq!(endpoint.path().file_name(), Some("switchboardd.sock"));
        assert!(
            endpoint
                .path()
                .components()
                .any(|component| component.as_str() == "switchboard"),
            "unexpected default socket: {endpoint}"
        );
    }
}
