//! Capabilities describing the bus itself.

use serde::de::IgnoredAny;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use switchboard_bus::{Capability, CapabilityError, ExecutionUnit};

use crate::builtin::{Builtin, CatalogueEntry, catalogue};

/// Reply to the connection prologue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct Authenticated {
    /// Always `true`.
    pub authenticated: bool,
}

/// Acknowledges `Authenticate`. The worker only admits a connection whose
/// first message is this command; the payload itself is ignored.
#[derive(Debug, Default)]
pub struct AuthenticateCapability;

impl Capability for AuthenticateCapability {
    type Input = IgnoredAny;
    type Output = Authenticated;

    fn description(&self) -> &str {
        Builtin::Authenticate.description()
    }

    fn instantiate(&self) -> Box<dyn ExecutionUnit<IgnoredAny, Authenticated>> {
        Box::new(|_: IgnoredAny| {
            Ok::<_, CapabilityError>(Authenticated {
                authenticated: true,
            })
        })
    }
}

/// `Ping` payload, echoed verbatim.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Echo {
    /// Arbitrary JSON; `null` when omitted.
    #[serde(default)]
    pub payload: Value,
}

/// Echoes its payload.
#[derive(Debug, Default)]
pub struct PingCapability;

impl Capability for PingCapability {
    type Input = Echo;
    type Output = Echo;

    fn description(&self) -> &str {
        Builtin::Ping.description()
    }

    fn instantiate(&self) -> Box<dyn ExecutionUnit<Echo, Echo>> {
        Box::new(|input: Echo| Ok::<_, CapabilityError>(input))
    }
}

/// `Capability.List` reply.
#[derive(Debug, Clone, Serialize)]
pub struct Listing {
    /// Every registered capability.
    pub capabilities: Vec<CatalogueEntry>,
}

/// Lists the built-in catalogue.
#[derive(Debug, Default)]
pub struct ListCapability;

impl Capability for ListCapability {
    type Input = IgnoredAny;
    type Output = Listing;

    fn description(&self) -> &str {
        Builtin::CapabilityList.description()
    }

    fn validate_output(&self, output: &Listing) -> Result<(), String> {
        if output.capabilities.is_empty() {
            return Err("capability catalogue is empty".to_owned());
        }
        Ok(())
    }

    fn instantiate(&self) -> Box<dyn ExecutionUnit<IgnoredAny, Listing>> {
        Box::new(|_: IgnoredAny| {
            Ok::<_, CapabilityError>(Listing {
                capabilities: catalogue(),
            })
        })
    }
}
