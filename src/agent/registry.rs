//! Self-describing records for running agents.
//!
//! Each passive agent registers the port and bind address it serves on
//! so operators can see what is running inside the process. Records
//! live for the lifetime of their agent.

use dashmap::DashMap;
use once_cell::sync::Lazy;

static RECORDS: Lazy<DashMap<u16, AgentRecord>> = Lazy::new(DashMap::new);

/// What a running agent reports about itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentRecord {
    pub port: u16,
    /// Configured bind address, or `*` when listening on any interface.
    pub bind_address: String,
}

pub(crate) fn register(record: AgentRecord) {
    RECORDS.insert(record.port, record);
}

pub(crate) fn unregister(port: u16) {
    RECORDS.remove(&port);
}

/// Record for the agent listening on `port`, if one is running.
pub fn lookup(port: u16) -> Option<AgentRecord> {
    RECORDS.get(&port).map(|r| r.value().clone())
}

/// All currently registered agents.
pub fn snapshot() -> Vec<AgentRecord> {
    RECORDS.iter().map(|r| r.value().clone()).collect()
}
