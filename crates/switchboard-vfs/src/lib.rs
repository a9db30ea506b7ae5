//! Virtual filesystem addressing and the key-value vault.
//!
//! [`resolve`] maps `vfs:` references, rooted and relative paths, and
//! absolute URIs onto absolute URLs using a configured root directory and
//! mount table. [`VaultStore`] is a small key-value store over slash paths
//! that refuses to hold plaintext under `/vault/`.

pub mod resolve;
pub mod store;

pub use resolve::{Resolver, VFS_MARKER, VfsError, resolve, resolve_contained};
pub use store::{FileBackend, KvBackend, MemoryBackend, VAULT_PREFIX, VaultError, VaultStore};
