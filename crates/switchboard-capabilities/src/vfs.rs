//! `Vfs.Resolve`.

use serde::{Deserialize, Serialize};
use switchboard_bus::{Capability, ExecutionUnit};
use switchboard_vfs::Resolver;

use crate::builtin::Builtin;
use crate::failure::vfs_failure;

/// `Vfs.Resolve` input.
#[derive(Debug, Clone, Deserialize)]
pub struct ResolveRequest {
    /// Reference to resolve.
    pub uri: String,
    /// Base for relative references.
    #[serde(default)]
    pub base: Option<String>,
    /// Reject results outside the root and mounts.
    #[serde(default)]
    pub contained: bool,
}

/// `Vfs.Resolve` output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Resolved {
    /// Absolute URL.
    pub resolved: String,
}

/// Resolves virtual references against the configured root and mounts.
#[derive(Debug)]
pub struct ResolveCapability {
    resolver: Resolver,
}

impl ResolveCapability {
    /// Creates the capability over `resolver`.
    #[must_use]
    pub const fn new(resolver: Resolver) -> Self {
        Self { resolver }
    }
}

impl Capability for ResolveCapability {
    type Input = ResolveRequest;
    type Output = Resolved;

    fn description(&self) -> &str {
        Builtin::VfsResolve.description()
    }

    fn validate_input(&self, input: &ResolveRequest) -> Result<(), String> {
        if input.uri.trim().is_empty() {
            return Err("uri must not be empty".to_owned());
        }
        Ok(())
    }

    fn instantiate(&self) -> Box<dyn ExecutionUnit<ResolveRequest, Resolved>> {
        let resolver = self.resolver.clone();
        Box::new(move |input: ResolveRequest| {
            let base = input.base.as_deref();
            let url = if input.contained {
                resolver.resolve_contained(&input.uri, base)
            } else {
                resolver.resolve(&input.uri, base)
            }
            .map_err(|error| vfs_failure(&error))?;
            Ok(Resolved {
                resolved: url.into(),
            })
        })
    }
}
