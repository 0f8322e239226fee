//! Configuration surface for the passive agent and the trapper.
//!
//! Both structs carry defaults and can be populated from the
//! environment with a `ZBRIDGE_` prefix.

use serde::{Deserialize, Serialize};

use crate::protocol::ProtocolVersion;
use crate::{Result, ZbridgeError};

/// Default passive listener port.
pub const DEFAULT_AGENT_PORT: u16 = 10052;

/// Default collector port for the trapper.
pub const DEFAULT_COLLECTOR_PORT: u16 = 10051;

/// Passive agent configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Address to bind, or `None` to listen on any interface.
    pub bind_address: Option<String>,
    pub port: u16,
    /// Wire variant served to connecting pollers.
    pub protocol: ProtocolVersion,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            bind_address: None,
            port: DEFAULT_AGENT_PORT,
            protocol: ProtocolVersion::default(),
        }
    }
}

impl AgentConfig {
    /// Load from `ZBRIDGE_*` environment variables, falling back to the
    /// defaults for anything unset.
    pub fn from_env() -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::Environment::with_prefix("ZBRIDGE"))
            .build()
            .map_err(|e| ZbridgeError::Config(e.to_string()))?;
        settings
            .try_deserialize()
            .map_err(|e| ZbridgeError::Config(e.to_string()))
    }

    pub fn with_bind_address(mut self, address: impl Into<String>) -> Self {
        self.bind_address = Some(address.into());
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_protocol(mut self, protocol: ProtocolVersion) -> Self {
        self.protocol = protocol;
        self
    }

    pub fn validate(&self) -> std::result::Result<(), String> {
        if matches!(self.bind_address.as_deref(), Some("")) {
            return Err("bind_address must not be empty".to_string());
        }
        Ok(())
    }
}

/// Trapper session configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrapperConfig {
    /// Collector to push items to.
    pub server: String,
    pub port: u16,
    /// Host name this process reports its items under.
    pub host: String,
}

impl Default for TrapperConfig {
    fn default() -> Self {
        Self {
            server: "localhost".to_string(),
            port: DEFAULT_COLLECTOR_PORT,
            host: "localhost".to_string(),
        }
    }
}

impl TrapperConfig {
    pub fn new(server: impl Into<String>, host: impl Into<String>) -> Self {
        Self {
            server: server.into(),
            host: host.into(),
            ..Default::default()
        }
    }

    /// Load from `ZBRIDGE_TRAPPER_*` environment variables.
    pub fn from_env() -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::Environment::with_prefix("ZBRIDGE_TRAPPER"))
            .build()
            .map_err(|e| ZbridgeError::Config(e.to_string()))?;
        settings
            .try_deserialize()
            .map_err(|e| ZbridgeError::Config(e.to_string()))
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn agent_defaults() {
        let config = AgentConfig::default();
        assert_eq!(config.port, 10052);
        assert_eq!(config.protocol, ProtocolVersion::Framed);
        assert!(config.bind_address.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn trapper_defaults() {
        let config = TrapperConfig::default();
        assert_eq!(config.port, 10051);
    }

    #[test]
    fn builders_apply() {
        let config = AgentConfig::default()
            .with_bind_address("127.0.0.1")
            .with_port(10053)
            .with_protocol(ProtocolVersion::Legacy);
        assert_eq!(config.bind_address.as_deref(), Some("127.0.0.1"));
        assert_eq!(config.port, 10053);
        assert_eq!(config.protocol, ProtocolVersion::Legacy);

        let trapper = TrapperConfig::new("collector.example", "web01").with_port(20051);
        assert_eq!(trapper.server, "collector.example");
        assert_eq!(trapper.host, "web01");
        assert_eq!(trapper.port, 20051);
    }

    #[test]
    fn empty_bind_address_is_rejected() {
        let config = AgentConfig::default().with_bind_address("");
        assert!(config.validate().is_err());
    }
}
