//! Shared collaborators handed to the built-in capabilities.

use std::sync::Arc;
use std::time::Duration;

use switchboard_config::{Config, MountParseError, RuntimePaths};
use switchboard_seal::{AgentConnector, SealError, Sealer, SshAgentConnector};
use switchboard_vfs::{FileBackend, KvBackend, Resolver, VaultError, VaultStore};
use thiserror::Error;
use zeroize::Zeroizing;

/// Default budget for `Http.Fetch` subprocesses.
pub const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Default budget for each `Tool.Describe` invocation.
pub const DESCRIBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Object-safe sealing interface.
pub trait SecretSealer: Send + Sync {
    /// Seals `plaintext` into a token.
    ///
    /// # Errors
    ///
    /// Returns a [`SealError`] when sealing fails.
    fn seal(&self, plaintext: &str) -> Result<String, SealError>;

    /// Opens `token` into its plaintext.
    ///
    /// # Errors
    ///
    /// Returns a [`SealError`] when the token cannot be opened.
    fn open(&self, token: &str) -> Result<Zeroizing<String>, SealError>;
}

impl<C> SecretSealer for Sealer<C>
where
    C: AgentConnector + Send + Sync,
{
    fn seal(&self, plaintext: &str) -> Result<String, SealError> {
        Sealer::seal(self, plaintext)
    }

    fn open(&self, token: &str) -> Result<Zeroizing<String>, SealError> {
        Sealer::open(self, token)
    }
}

/// Vault store over a type-erased backend.
pub type SharedStore = VaultStore<Box<dyn KvBackend>>;

/// Everything the built-in capabilities need at run time.
#[derive(Clone)]
pub struct Services {
    /// Seals and opens secrets.
    pub sealer: Arc<dyn SecretSealer>,
    /// Key-value store.
    pub store: Arc<SharedStore>,
    /// Virtual path resolver.
    pub resolver: Resolver,
    /// Program used for HTTP requests.
    pub http_program: String,
    /// Budget for each HTTP request.
    pub http_timeout: Duration,
    /// Budget for each description invocation.
    pub describe_timeout: Duration,
}

impl Services {
    /// Bundles explicit collaborators with the default HTTP settings.
    #[must_use]
    pub fn new(sealer: Arc<dyn SecretSealer>, store: SharedStore, resolver: Resolver) -> Self {
        Self {
            sealer,
            store: Arc::new(store),
            resolver,
            http_program: switchboard_config::DEFAULT_HTTP_PROGRAM.to_owned(),
            http_timeout: HTTP_TIMEOUT,
            describe_timeout: DESCRIBE_TIMEOUT,
        }
    }

    /// Builds the production services from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ServicesError`] when the mount table is malformed or the
    /// store file cannot be opened.
    pub fn from_config(config: &Config, paths: &RuntimePaths) -> Result<Self, ServicesError> {
        let mounts = config.mounts()?;
        let backend: Box<dyn KvBackend> = Box::new(FileBackend::open(paths.store_path())?);
        let connector = SshAgentConnector::new(config.agent_socket.as_deref());
        Ok(Self {
            sealer: Arc::new(Sealer::new(connector)),
            store: Arc::new(VaultStore::new(backend)),
            resolver: Resolver::new(config.vfs_root.clone(), mounts),
            http_program: config.http_program.clone(),
            http_timeout: HTTP_TIMEOUT,
            describe_timeout: DESCRIBE_TIMEOUT,
        })
    }
}

impl std::fmt::Debug for Services {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("Services")
            .field("resolver", &self.resolver)
            .field("http_program", &self.http_program)
            .finish_non_exhaustive()
    }
}

/// Failures while assembling [`Services`].
#[derive(Debug, Error)]
pub enum ServicesError {
    /// A mount table entry is malformed.
    #[error("invalid mount table: {0}")]
    Mounts(#[from] MountParseError),
    /// The store could not be opened.
    #[error("failed to open the key-value store")]
    Store(#[from] VaultError),
}
