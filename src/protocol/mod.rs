//! Wire protocol for the agent bridge.
//!
//! Two variants are served: the legacy protocol writes bare response
//! bodies, the framed protocol wraps every response in the binary
//! envelope implemented in [`codec`]. Inbound request lines are parsed
//! by [`query`] into typed queries.

pub mod codec;
pub mod query;

pub use query::{ParsedRequest, Query, TrapPush};

use serde::{Deserialize, Serialize};

/// Fixed reply sent in place of any query-level error, so the polling
/// server always receives a well-formed response.
pub const NOT_SUPPORTED: &str = "ZBX_NOTSUPPORTED";

/// Reply to `agent.version` queries.
pub const AGENT_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Which wire variant an agent speaks.
///
/// This is decided once at start-up and threaded down into every
/// connection handler; there is no global mode flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProtocolVersion {
    /// Protocol 1.1: responses are the bare body bytes.
    #[serde(rename = "1.1")]
    Legacy,
    /// Protocol 1.4: responses carry the binary envelope.
    #[serde(rename = "1.4")]
    Framed,
}

impl Default for ProtocolVersion {
    fn default() -> Self {
        ProtocolVersion::Framed
    }
}

impl ProtocolVersion {
    pub fn is_framed(self) -> bool {
        matches!(self, ProtocolVersion::Framed)
    }
}

impl std::str::FromStr for ProtocolVersion {
    type Err = crate::ZbridgeError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "1.1" => Ok(ProtocolVersion::Legacy),
            "1.4" => Ok(ProtocolVersion::Framed),
            other => Err(crate::ZbridgeError::Config(format!(
                "unknown protocol version '{}', expected '1.1' or '1.4'",
                other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_framed() {
        assert_eq!(ProtocolVersion::default(), ProtocolVersion::Framed);
    }

    #[test]
    fn parses_configuration_strings() {
        assert_eq!("1.1".parse::<ProtocolVersion>().unwrap(), ProtocolVersion::Legacy);
        assert_eq!("1.4".parse::<ProtocolVersion>().unwrap(), ProtocolVersion::Framed);
        assert!("2.0".parse::<ProtocolVersion>().is_err());
    }
}
