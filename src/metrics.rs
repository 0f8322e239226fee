//! Runtime counters for the agent and the trapper.
//!
//! Counters sit on hot paths, so they are plain atomics with relaxed
//! ordering; aggregation happens only when a snapshot is taken.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Shared registry handed to the agent and the trapper.
#[derive(Debug, Default)]
pub struct MetricsRegistry {
    pub agent: AgentMetrics,
    pub trapper: TrapperMetrics,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            connections_accepted: self.agent.connections_accepted.load(Ordering::Relaxed),
            queries_served: self.agent.queries_served.load(Ordering::Relaxed),
            queries_failed: self.agent.queries_failed.load(Ordering::Relaxed),
            peak_handlers: self.agent.peak_handlers.load(Ordering::Relaxed),
            items_queued: self.trapper.items_queued.load(Ordering::Relaxed),
            items_sent: self.trapper.items_sent.load(Ordering::Relaxed),
            items_dropped: self.trapper.items_dropped.load(Ordering::Relaxed),
        }
    }
}

/// Passive-side counters.
#[derive(Debug, Default)]
pub struct AgentMetrics {
    connections_accepted: AtomicU64,
    queries_served: AtomicU64,
    queries_failed: AtomicU64,
    active_handlers: AtomicU64,
    peak_handlers: AtomicU64,
}

impl AgentMetrics {
    pub fn connection_accepted(&self) {
        self.connections_accepted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn query_served(&self) {
        self.queries_served.fetch_add(1, Ordering::Relaxed);
    }

    pub fn query_failed(&self) {
        self.queries_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn handler_started(&self) {
        let active = self.active_handlers.fetch_add(1, Ordering::Relaxed) + 1;
        self.peak_handlers.fetch_max(active, Ordering::Relaxed);
    }

    pub fn handler_finished(&self) {
        self.active_handlers.fetch_sub(1, Ordering::Relaxed);
    }

    /// Highest number of handlers that ever ran at once.
    pub fn peak_handlers(&self) -> u64 {
        self.peak_handlers.load(Ordering::Relaxed)
    }

    pub fn queries_served_total(&self) -> u64 {
        self.queries_served.load(Ordering::Relaxed)
    }
}

/// Active-side counters.
#[derive(Debug, Default)]
pub struct TrapperMetrics {
    items_queued: AtomicU64,
    items_sent: AtomicU64,
    items_dropped: AtomicU64,
}

impl TrapperMetrics {
    pub fn item_queued(&self) {
        self.items_queued.fetch_add(1, Ordering::Relaxed);
    }

    pub fn item_sent(&self) {
        self.items_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn item_dropped(&self) {
        self.items_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn items_sent_total(&self) -> u64 {
        self.items_sent.load(Ordering::Relaxed)
    }
}

/// Point-in-time view of all counters.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub connections_accepted: u64,
    pub queries_served: u64,
    pub queries_failed: u64,
    pub peak_handlers: u64,
    pub items_queued: u64,
    pub items_sent: u64,
    pub items_dropped: u64,
}
