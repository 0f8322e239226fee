//! # zbridge
//!
//! zbridge is a monitoring agent bridge: it exposes live attributes of the
//! process that embeds it to a Zabbix-compatible monitoring server, and it
//! can proactively push values to a remote collector.
//!
//! ## Architecture Overview
//!
//! The crate is built from a small set of modules:
//!
//! - [`protocol`] - wire codec (framed envelope, request lines) and the
//!   query grammar
//! - [`store`] - the pluggable [`AttributeStore`] capability that resolves
//!   `(object name, attribute path)` pairs, plus a reference in-memory
//!   implementation
//! - [`agent`] - the passive side: a listening socket, a bounded pool of
//!   connection handlers, and the self-describing agent registry
//! - [`trapper`] - the active side: a queue of items drained by a sender
//!   task that pushes framed payloads to a collector
//! - [`config`] - configuration surface for both sides
//! - [`metrics`] - lock-free runtime counters
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use zbridge::{AgentConfig, MemoryStore, PassiveAgent, QueryProcessor};
//!
//! #[tokio::main]
//! async fn main() -> zbridge::Result<()> {
//!     let store = Arc::new(MemoryStore::new());
//!     store.set_attribute("app:type=Runtime", "Pid", std::process::id() as i64);
//!
//!     let processor = QueryProcessor::new(store);
//!     let agent = PassiveAgent::start(AgentConfig::default(), processor).await?;
//!
//!     tokio::signal::ctrl_c().await?;
//!     agent.stop().await;
//!     Ok(())
//! }
//! ```
//!
//! Inbound queries flow socket bytes -> query parser -> attribute store ->
//! wire codec -> socket bytes. Outbound, application code enqueues an
//! [`Item`] and the trapper's sender task delivers it.

pub mod agent;
pub mod config;
pub mod metrics;
pub mod protocol;
pub mod store;
pub mod trapper;

pub use agent::{AgentRecord, PassiveAgent, QueryProcessor};
pub use config::{AgentConfig, TrapperConfig};
pub use metrics::{MetricsRegistry, MetricsSnapshot};
pub use protocol::{ProtocolVersion, AGENT_VERSION, NOT_SUPPORTED};
pub use store::{AttributeStore, AttributeValue, MemoryStore, StoreError};
pub use trapper::{Item, Trapper};

use thiserror::Error;

/// zbridge error types
///
/// Query-level failures (parse errors, resolution errors) are absorbed at
/// the connection-handler boundary and turned into the not-supported
/// sentinel, so only start-up problems and transport failures surface
/// through this type.
#[derive(Debug, Error)]
pub enum ZbridgeError {
    /// Socket and stream failures below the protocol layer
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed inbound request framing
    #[error("parse error: {0}")]
    Parse(#[from] protocol::codec::CodecError),

    /// Attribute or operation resolution failures
    #[error("resolution error: {0}")]
    Store(#[from] store::StoreError),

    /// Start-up configuration problems: bad bind address, port in use,
    /// unresolvable collector host
    #[error("configuration error: {0}")]
    Config(String),

    /// Mid-connection transport failures
    #[error("transport error: {0}")]
    Transport(String),

    /// Rejected item construction
    #[error("invalid item: {0}")]
    InvalidItem(String),

    /// Collector payload serialization failures
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias used throughout zbridge.
pub type Result<T> = std::result::Result<T, ZbridgeError>;
