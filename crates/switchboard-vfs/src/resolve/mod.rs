//! Virtual path resolution.
//!
//! Four rules are applied in order:
//!
//! 1. `vfs:` references resolve against the mount whose name matches their
//!    first segment, or against the root when none does.
//! 2. Any other absolute URI is returned unchanged.
//! 3. Paths starting with `/` resolve against the root; the base is ignored.
//! 4. Relative paths resolve against the base when one is given, otherwise
//!    against the root.
//!
//! Results are absolute URLs, `file://` for everything that lands on disk.
//! Because every result is itself an absolute URI, resolving it again returns
//! it unchanged.

use camino::{Utf8Component, Utf8Path, Utf8PathBuf};
use switchboard_config::MountEntry;
use thiserror::Error;
use url::Url;

/// Marker introducing a virtual reference.
pub const VFS_MARKER: &str = "vfs:";

/// Errors raised while resolving a reference.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum VfsError {
    /// The reference looked like a URI but could not be parsed.
    #[error("'{uri}' is not a valid URI")]
    InvalidUri {
        /// Offending reference.
        uri: String,
        /// Parser error.
        #[source]
        source: url::ParseError,
    },
    /// A root, mount, or base did not resolve to an absolute path.
    #[error("'{path}' is not an absolute path")]
    NotAbsolute {
        /// Offending path.
        path: String,
    },
    /// The result lies outside the root and every mount.
    #[error("'{resolved}' escapes the virtual filesystem root")]
    EscapesRoot {
        /// The resolved location.
        resolved: String,
    },
}

/// Resolves `uri` to an absolute URL.
///
/// # Errors
///
/// Returns [`VfsError::InvalidUri`] for unparseable absolute references and
/// [`VfsError::NotAbsolute`] when `root`, a mount, or `base` is relative.
pub fn resolve(
    uri: &str,
    base: Option<&str>,
    root: &Utf8Path,
    mounts: &[MountEntry],
) -> Result<Url, VfsError> {
    if let Some(reference) = uri.strip_prefix(VFS_MARKER) {
        let reference = reference.trim_start_matches('/');
        let (segment, tail) = reference.split_once('/').unwrap_or((reference, ""));
        return match find_mount(mounts, segment) {
            Some(mount) => file_url(&join_lexically(&mount.path, tail)),
            None => file_url(&join_lexically(root, reference)),
        };
    }
    if is_absolute_uri(uri) {
        return Url::parse(uri).map_err(|source| VfsError::InvalidUri {
            uri: uri.to_owned(),
            source,
        });
    }
    if let Some(rooted) = uri.strip_prefix('/') {
        return file_url(&join_lexically(root, rooted));
    }
    match base {
        None => file_url(&join_lexically(root, uri)),
        Some(base) => resolve_relative(uri, &resolve(base, None, root, mounts)?),
    }
}

/// Resolves `uri` and rejects results outside the root and every mount.
///
/// # Errors
///
/// Returns [`VfsError::EscapesRoot`] when the result is not a file beneath
/// the root or a mount, and any error [`resolve`] raises.
pub fn resolve_contained(
    uri: &str,
    base: Option<&str>,
    root: &Utf8Path,
    mounts: &[MountEntry],
) -> Result<Url, VfsError> {
    let resolved = resolve(uri, base, root, mounts)?;
    let contained = resolved
        .to_file_path()
        .ok()
        .and_then(|path| Utf8PathBuf::from_path_buf(path).ok())
        .is_some_and(|path| {
            path.starts_with(root) || mounts.iter().any(|mount| path.starts_with(&mount.path))
        });
    if contained {
        Ok(resolved)
    } else {
        Err(VfsError::EscapesRoot {
            resolved: resolved.into(),
        })
    }
}

/// A root and mount table bundled for repeated resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolver {
    root: Utf8PathBuf,
    mounts: Vec<MountEntry>,
}

impl Resolver {
    /// Creates a resolver anchored at `root`.
    #[must_use]
    pub const fn new(root: Utf8PathBuf, mounts: Vec<MountEntry>) -> Self {
        Self { root, mounts }
    }

    /// Anchor directory.
    #[must_use]
    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    /// See [`resolve`].
    ///
    /// # Errors
    ///
    /// Propagates errors from [`resolve`].
    pub fn resolve(&self, uri: &str, base: Option<&str>) -> Result<Url, VfsError> {
        resolve(uri, base, &self.root, &self.mounts)
    }

    /// See [`resolve_contained`].
    ///
    /// # Errors
    ///
    /// Propagates errors from [`resolve_contained`].
    pub fn resolve_contained(&self, uri: &str, base: Option<&str>) -> Result<Url, VfsError> {
        resolve_contained(uri, base, &self.root, &self.mounts)
    }
}

fn find_mount<'a>(mounts: &'a [MountEntry], segment: &str) -> Option<&'a MountEntry> {
    mounts.iter().find(|mount| mount.name == segment)
}

/// Returns `true` when `uri` starts with a URI scheme.
///
/// Single-letter schemes are treated as paths so `C:` style prefixes never
/// masquerade as URIs.
fn is_absolute_uri(uri: &str) -> bool {
    uri.split_once(':').is_some_and(|(scheme, _)| {
        scheme.len() > 1
            && scheme.starts_with(|ch: char| ch.is_ascii_alphabetic())
            && scheme
                .chars()
                .all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '+' | '-' | '.'))
    })
}

fn resolve_relative(uri: &str, base: &Url) -> Result<Url, VfsError> {
    if base.scheme() == "file" {
        let base_path = base
            .to_file_path()
            .ok()
            .and_then(|path| Utf8PathBuf::from_path_buf(path).ok())
            .ok_or_else(|| VfsError::NotAbsolute {
                path: base.to_string(),
            })?;
        return file_url(&join_lexically(&base_path, uri));
    }
    let mut directory = base.clone();
    if !directory.path().ends_with('/') {
        let with_slash = format!("{}/", directory.path());
        directory.set_path(&with_slash);
    }
    directory.join(uri).map_err(|source| VfsError::InvalidUri {
        uri: uri.to_owned(),
        source,
    })
}

/// Appends `relative` to `anchor`, folding `.` and `..` without touching the
/// filesystem. `..` never climbs above `/`.
fn join_lexically(anchor: &Utf8Path, relative: &str) -> Utf8PathBuf {
    let mut joined = anchor.to_path_buf();
    for component in Utf8Path::new(relative).components() {
        match component {
            Utf8Component::Normal(segment) => joined.push(segment),
            Utf8Component::ParentDir => {
                joined.pop();
            }
            Utf8Component::CurDir | Utf8Component::RootDir | Utf8Component::Prefix(_) => {}
        }
    }
    joined
}

fn file_url(path: &Utf8Path) -> Result<Url, VfsError> {
    Url::from_file_path(path.as_std_path()).map_err(|()| VfsError::NotAbsolute {
        path: path.to_string(),
    })
}

#[cfg(test)]
mod tests;
