//! The closed set of built-in capabilities.

use serde::Serialize;

/// Every capability the runtimes register at start-up.
///
/// Registration matches on this enum exhaustively, so adding a variant
/// without wiring its capability fails to compile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Builtin {
    /// Connection prologue acknowledgement.
    Authenticate,
    /// Echoes its payload.
    Ping,
    /// Lists registered capabilities.
    CapabilityList,
    /// Seals a plaintext secret.
    SecretSeal,
    /// Stores a value.
    StoreSet,
    /// Reads a value.
    StoreGet,
    /// Removes a value.
    StoreDelete,
    /// Lists stored keys.
    StoreList,
    /// Resolves a virtual path.
    VfsResolve,
    /// Performs an HTTP request.
    HttpFetch,
    /// Describes an external program.
    ToolDescribe,
}

impl Builtin {
    /// All built-ins in registration order.
    pub const ALL: [Self; 11] = [
        Self::Authenticate,
        Self::Ping,
        Self::CapabilityList,
        Self::SecretSeal,
        Self::StoreSet,
        Self::StoreGet,
        Self::StoreDelete,
        Self::StoreList,
        Self::VfsResolve,
        Self::HttpFetch,
        Self::ToolDescribe,
    ];

    /// Registry name, used as the message `type`.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Authenticate => switchboard_bus::protocol::AUTHENTICATE_TYPE,
            Self::Ping => "Ping",
            Self::CapabilityList => "Capability.List",
            Self::SecretSeal => "Secret.Seal",
            Self::StoreSet => "Store.Set",
            Self::StoreGet => "Store.Get",
            Self::StoreDelete => "Store.Delete",
            Self::StoreList => "Store.List",
            Self::VfsResolve => "Vfs.Resolve",
            Self::HttpFetch => "Http.Fetch",
            Self::ToolDescribe => "Tool.Describe",
        }
    }

    /// One-line summary reported by `Capability.List`.
    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::Authenticate => "Acknowledges the connection prologue",
            Self::Ping => "Echoes the payload back to the caller",
            Self::CapabilityList => "Lists registered capabilities and their descriptions",
            Self::SecretSeal => "Seals a secret into a pwenc:v1 token bound to the SSH agent key",
            Self::StoreSet => "Stores a JSON value under a slash-delimited key",
            Self::StoreGet => "Reads the value stored under a key",
            Self::StoreDelete => "Removes the value stored under a key",
            Self::StoreList => "Lists keys beneath a prefix",
            Self::VfsResolve => "Resolves a vfs: reference or path to an absolute URL",
            Self::HttpFetch => "Performs an HTTP request, unsealing header secrets first",
            Self::ToolDescribe => "Describes an external program via --description or --help",
        }
    }

    /// Looks a built-in up by registry name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|builtin| builtin.name() == name)
    }
}

/// Name and description of one registered capability.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CatalogueEntry {
    /// Registry name.
    pub name: &'static str,
    /// One-line summary.
    pub description: &'static str,
}

/// Catalogue of every built-in, computed before registration so
/// `Capability.List` can include itself.
#[must_use]
pub fn catalogue() -> Vec<CatalogueEntry> {
    Builtin::ALL
        .into_iter()
        .map(|builtin| CatalogueEntry {
            name: builtin.name(),
            description: builtin.description(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn names_are_unique() {
        let names: HashSet<_> = Builtin::ALL.into_iter().map(Builtin::name).collect();
        assert_eq!(names.len(), Builtin::ALL.len());
    }

    #[test]
    fn names_round_trip() {
        for builtin in Builtin::ALL {
            assert_eq!(Builtin::from_name(builtin.name()), Some(builtin));
        }
        assert_eq!(Builtin::from_name("Shell.Exec"), None);
    }

    #[test]
    fn catalogue_covers_every_builtin() {
        let entries = catalogue();
        assert_eq!(entries.len(), Builtin::ALL.len());
        assert!(entries.iter().any(|entry| entry.name == "Capability.List"));
    }
}
