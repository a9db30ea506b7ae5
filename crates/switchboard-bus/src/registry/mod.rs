//! Immutable capability registry.
//!
//! Capabilities are collected through a [`RegistryBuilder`] at start-up. Once
//! [`RegistryBuilder::build`] returns, the [`Registry`] exposes lookups only;
//! there is no way to add or replace an entry, so concurrent readers never
//! observe a partially updated table.

use std::collections::BTreeMap;

use serde_json::Value;
use thiserror::Error;

use crate::capability::{Capability, ErasedCapability};
use crate::error::BusError;

/// Read-only map from capability name to capability.
pub struct Registry {
    entries: BTreeMap<String, Box<dyn ErasedCapability>>,
}

impl Registry {
    /// Starts building a registry.
    #[must_use]
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    /// Returns `true` when a capability is registered under `name`.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Description of the named capability.
    #[must_use]
    pub fn description(&self, name: &str) -> Option<&str> {
        self.entries.get(name).map(|entry| entry.description())
    }

    /// Registered names in lexical order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Number of registered capabilities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` when nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Validates `data`, executes the named capability, and validates its output.
    pub(crate) fn dispatch(&self, name: &str, data: Value) -> Result<Value, BusError> {
        let entry = self
            .entries
            .get(name)
            .ok_or_else(|| BusError::not_found(name))?;
        entry.dispatch(name, data)
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("Registry")
            .field("capabilities", &self.entries.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Collects capabilities before freezing them into a [`Registry`].
#[derive(Default)]
pub struct RegistryBuilder {
    entries: BTreeMap<String, Box<dyn ErasedCapability>>,
}

impl RegistryBuilder {
    /// Registers `capability` under `name`.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::InvalidName`] when the name is not a
    /// dot-namespaced identifier and [`RegistryError::Duplicate`] when the
    /// name is already taken.
    pub fn register<C>(
        mut self,
        name: impl Into<String>,
        capability: C,
    ) -> Result<Self, RegistryError>
    where
        C: Capability,
    {
        let key = name.into();
        validate_name(&key)?;
        if self.entries.contains_key(&key) {
            return Err(RegistryError::Duplicate { name: key });
        }
        self.entries.insert(key, Box::new(capability));
        Ok(self)
    }

    /// Freezes the collected capabilities.
    #[must_use]
    pub fn build(self) -> Registry {
        Registry {
            entries: self.entries,
        }
    }
}

/// Errors raised while building a registry.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RegistryError {
    /// A capability was already registered under the name.
    #[error("capability '{name}' is already registered")]
    Duplicate {
        /// Conflicting name.
        name: String,
    },
    /// The name is not a dot-namespaced identifier.
    #[error("capability name '{name}' must be dot-separated segments of [A-Za-z0-9_-]")]
    InvalidName {
        /// Rejected name.
        name: String,
    },
}

fn validate_name(name: &str) -> Result<(), RegistryError> {
    let valid = !name.is_empty()
        && name.split('.').all(|segment| {
            !segment.is_empty()
                && segment
                    .chars()
                    .all(|ch| ch.is_ascii_alphanumeric() || ch == '_' || ch == '-')
        });
    if valid {
        Ok(())
    } else {
        Err(RegistryError::InvalidName {
            name: name.to_owned(),
        })
    }
}
