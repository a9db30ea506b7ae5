//! `Store.*` capabilities over the shared vault store.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use switchboard_bus::{Capability, ExecutionUnit};
use switchboard_seal::is_token;
use switchboard_vfs::VAULT_PREFIX;
use switchboard_vfs::store::validate_key;

use crate::builtin::Builtin;
use crate::failure::vault_failure;
use crate::services::SharedStore;

fn check_key(key: &str) -> Result<(), String> {
    validate_key(key).map_err(|error| error.to_string())
}

/// `Store.Set` input.
#[derive(Debug, Clone, Deserialize)]
pub struct SetRequest {
    /// Absolute slash path.
    pub key: String,
    /// Value to store.
    pub value: Value,
}

/// `Store.Set` output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Stored {
    /// Key written.
    pub key: String,
    /// Always `true`.
    pub stored: bool,
}

/// Writes a value; `/vault/` keys only accept sealed tokens.
pub struct StoreSetCapability {
    store: Arc<SharedStore>,
}

impl StoreSetCapability {
    /// Creates the capability over `store`.
    #[must_use]
    pub const fn new(store: Arc<SharedStore>) -> Self {
        Self { store }
    }
}

impl Capability for StoreSetCapability {
    type Input = SetRequest;
    type Output = Stored;

    fn description(&self) -> &str {
        Builtin::StoreSet.description()
    }

    fn validate_input(&self, input: &SetRequest) -> Result<(), String> {
        check_key(&input.key)?;
        if input.key.starts_with(VAULT_PREFIX) && !input.value.as_str().is_some_and(is_token) {
            return Err(format!("key '{}' only accepts sealed tokens", input.key));
        }
        Ok(())
    }

    fn instantiate(&self) -> Box<dyn ExecutionUnit<SetRequest, Stored>> {
        let store = Arc::clone(&self.store);
        Box::new(move |input: SetRequest| {
            store
                .set(&input.key, input.value)
                .map_err(|error| vault_failure(&error))?;
            Ok(Stored {
                key: input.key,
                stored: true,
            })
        })
    }
}

/// Input naming a single key.
#[derive(Debug, Clone, Deserialize)]
pub struct KeyRequest {
    /// Absolute slash path.
    pub key: String,
}

/// `Store.Get` output.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Fetched {
    /// Key read.
    pub key: String,
    /// Stored value, `null` when absent.
    pub value: Value,
    /// Whether the key exists.
    pub found: bool,
}

/// Reads a value.
pub struct StoreGetCapability {
    store: Arc<SharedStore>,
}

impl StoreGetCapability {
    /// Creates the capability over `store`.
    #[must_use]
    pub const fn new(store: Arc<SharedStore>) -> Self {
        Self { store }
    }
}

impl Capability for StoreGetCapability {
    type Input = KeyRequest;
    type Output = Fetched;

    fn description(&self) -> &str {
        Builtin::StoreGet.description()
    }

    fn validate_input(&self, input: &KeyRequest) -> Result<(), String> {
        check_key(&input.key)
    }

    fn instantiate(&self) -> Box<dyn ExecutionUnit<KeyRequest, Fetched>> {
        let store = Arc::clone(&self.store);
        Box::new(move |input: KeyRequest| {
            let value = store.get(&input.key).map_err(|error| vault_failure(&error))?;
            Ok(Fetched {
                key: input.key,
                found: value.is_some(),
                value: value.unwrap_or(Value::Null),
            })
        })
    }
}

/// `Store.Delete` output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Deleted {
    /// Key removed.
    pub key: String,
    /// Whether the key existed.
    pub deleted: bool,
}

/// Removes a value.
pub struct StoreDeleteCapability {
    store: Arc<SharedStore>,
}

impl StoreDeleteCapability {
    /// Creates the capability over `store`.
    #[must_use]
    pub const fn new(store: Arc<SharedStore>) -> Self {
        Self { store }
    }
}

impl Capability for StoreDeleteCapability {
    type Input = KeyRequest;
    type Output = Deleted;

    fn description(&self) -> &str {
        Builtin::StoreDelete.description()
    }

    fn validate_input(&self, input: &KeyRequest) -> Result<(), String> {
        check_key(&input.key)
    }

    fn instantiate(&self) -> Box<dyn ExecutionUnit<KeyRequest, Deleted>> {
        let store = Arc::clone(&self.store);
        Box::new(move |input: KeyRequest| {
            let deleted = store
                .delete(&input.key)
                .map_err(|error| vault_failure(&error))?;
            Ok(Deleted {
                key: input.key,
                deleted,
            })
        })
    }
}

fn root_prefix() -> String {
    "/".to_owned()
}

/// `Store.List` input.
#[derive(Debug, Clone, Deserialize)]
pub struct ListRequest {
    /// Prefix to list beneath; every key when omitted.
    #[serde(default = "root_prefix")]
    pub prefix: String,
}

/// `Store.List` output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Keys {
    /// Matching keys in lexical order.
    pub keys: Vec<String>,
}

/// Lists keys beneath a prefix.
pub struct StoreListCapability {
    store: Arc<SharedStore>,
}

impl StoreListCapability {
    /// Creates the capability over `store`.
    #[must_use]
    pub const fn new(store: Arc<SharedStore>) -> Self {
        Self { store }
    }
}

impl Capability for StoreListCapability {
    type Input = ListRequest;
    type Output = Keys;

    fn description(&self) -> &str {
        Builtin::StoreList.description()
    }

    fn validate_input(&self, input: &ListRequest) -> Result<(), String> {
        if input.prefix == "/" {
            return Ok(());
        }
        check_key(&input.prefix)
    }

    fn instantiate(&self) -> Box<dyn ExecutionUnit<ListRequest, Keys>> {
        let store = Arc::clone(&self.store);
        Box::new(move |input: ListRequest| {
            let keys = store
                .list(&input.prefix)
                .map_err(|error| vault_failure(&error))?;
            Ok(Keys { keys })
        })
    }
}
