//! `Secret.Seal`.
//!
//! There is no matching unseal capability: plaintext only leaves a token
//! inside the capability that consumes it, such as `Http.Fetch`.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use switchboard_bus::{Capability, ExecutionUnit};
use switchboard_seal::is_token;
use zeroize::Zeroizing;

use crate::builtin::Builtin;
use crate::failure::seal_failure;
use crate::services::SecretSealer;

/// `Secret.Seal` input.
#[derive(Deserialize)]
pub struct SealRequest {
    /// Secret to seal.
    pub plaintext: String,
}

impl std::fmt::Debug for SealRequest {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("SealRequest")
            .field("plaintext", &"<redacted>")
            .finish()
    }
}

/// `Secret.Seal` output.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Sealed {
    /// `pwenc:v1:` token.
    pub token: String,
}

/// Seals a plaintext through the configured agent identity.
pub struct SealCapability {
    sealer: Arc<dyn SecretSealer>,
}

impl SealCapability {
    /// Creates the capability over `sealer`.
    #[must_use]
    pub const fn new(sealer: Arc<dyn SecretSealer>) -> Self {
        Self { sealer }
    }
}

impl Capability for SealCapability {
    type Input = SealRequest;
    type Output = Sealed;

    fn description(&self) -> &str {
        Builtin::SecretSeal.description()
    }

    fn validate_output(&self, output: &Sealed) -> Result<(), String> {
        if is_token(&output.token) {
            Ok(())
        } else {
            Err("sealer returned a value that is not a token".to_owned())
        }
    }

    fn instantiate(&self) -> Box<dyn ExecutionUnit<SealRequest, Sealed>> {
        let sealer = Arc::clone(&self.sealer);
        Box::new(move |input: SealRequest| {
            let plaintext = Zeroizing::new(input.plaintext);
            let token = sealer
                .seal(&plaintext)
                .map_err(|error| seal_failure(&error))?;
            Ok(Sealed { token })
        })
    }
}
