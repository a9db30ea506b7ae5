//! Built-in capabilities and the registry every runtime starts from.
//!
//! [`default_registry`] walks [`Builtin::ALL`] and registers each variant
//! through an exhaustive `match`, wiring capabilities to the shared
//! [`Services`]: the agent-backed sealer, the vault store, the VFS resolver,
//! and the external programs used for HTTP and tool descriptions.

pub mod builtin;
mod failure;
pub mod http;
pub mod meta;
mod process;
pub mod secret;
pub mod services;
pub mod store;
pub mod tool;
pub mod vfs;

use std::sync::Arc;

use switchboard_bus::{Registry, RegistryBuilder, RegistryError};

pub use builtin::{Builtin, CatalogueEntry, catalogue};
pub use services::{
    DESCRIBE_TIMEOUT, HTTP_TIMEOUT, SecretSealer, Services, ServicesError, SharedStore,
};

/// Builds a registry holding every built-in capability.
///
/// # Errors
///
/// Returns a [`RegistryError`] if two built-ins share a name.
pub fn default_registry(services: &Services) -> Result<Registry, RegistryError> {
    Builtin::ALL
        .into_iter()
        .try_fold(Registry::builder(), |builder, builtin| {
            register(builder, builtin, services)
        })
        .map(RegistryBuilder::build)
}

fn register(
    builder: RegistryBuilder,
    builtin: Builtin,
    services: &Services,
) -> Result<RegistryBuilder, RegistryError> {
    let name = builtin.name();
    match builtin {
        Builtin::Authenticate => builder.register(name, meta::AuthenticateCapability),
        Builtin::Ping => builder.register(name, meta::PingCapability),
        Builtin::CapabilityList => builder.register(name, meta::ListCapability),
        Builtin::SecretSeal => {
            builder.register(name, secret::SealCapability::new(Arc::clone(&services.sealer)))
        }
        Builtin::StoreSet => {
            builder.register(name, store::StoreSetCapability::new(Arc::clone(&services.store)))
        }
        Builtin::StoreGet => {
            builder.register(name, store::StoreGetCapability::new(Arc::clone(&services.store)))
        }
        Builtin::StoreDelete => builder.register(
            name,
            store::StoreDeleteCapability::new(Arc::clone(&services.store)),
        ),
        Builtin::StoreList => {
            builder.register(name, store::StoreListCapability::new(Arc::clone(&services.store)))
        }
        Builtin::VfsResolve => {
            builder.register(name, vfs::ResolveCapability::new(services.resolver.clone()))
        }
        Builtin::HttpFetch => builder.register(
            name,
            http::FetchCapability::new(
                Arc::clone(&services.sealer),
                services.http_program.clone(),
                services.http_timeout,
            ),
        ),
        Builtin::ToolDescribe => {
            builder.register(name, tool::DescribeCapability::new(services.describe_timeout))
        }
    }
}
