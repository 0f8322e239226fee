//! Active push side of the bridge.
//!
//! A [`Trapper`] owns an unbounded queue of [`Item`]s drained by a
//! dedicated sender task, plus any periodic producers registered with
//! [`Trapper::every`]. Producers only enqueue; all network I/O happens
//! on the sender task, so enqueuing never blocks.

pub mod item;
mod sender;

pub use item::Item;
pub use sender::push_once;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::config::TrapperConfig;
use crate::metrics::MetricsRegistry;
use crate::store::AttributeStore;
use crate::{Result, ZbridgeError};

/// Streams items to a remote collector from a dedicated sender task.
pub struct Trapper {
    tx: mpsc::UnboundedSender<Item>,
    sender_handle: JoinHandle<()>,
    periodic: Mutex<Vec<JoinHandle<()>>>,
    metrics: Arc<MetricsRegistry>,
}

impl Trapper {
    /// Start a trapper session. The collector name resolves now;
    /// failure to resolve is fatal to this session only.
    pub async fn start(config: TrapperConfig, store: Arc<dyn AttributeStore>) -> Result<Self> {
        Self::start_with_metrics(config, store, Arc::new(MetricsRegistry::new())).await
    }

    pub async fn start_with_metrics(
        config: TrapperConfig,
        store: Arc<dyn AttributeStore>,
        metrics: Arc<MetricsRegistry>,
    ) -> Result<Self> {
        let target: SocketAddr = tokio::net::lookup_host((config.server.as_str(), config.port))
            .await
            .map_err(|e| {
                ZbridgeError::Config(format!("cannot resolve collector '{}': {}", config.server, e))
            })?
            .next()
            .ok_or_else(|| {
                ZbridgeError::Config(format!("collector '{}' has no addresses", config.server))
            })?;

        let (tx, rx) = mpsc::unbounded_channel();
        let sender_handle = tokio::spawn(sender::run(
            rx,
            store,
            target,
            config.host.clone(),
            Arc::clone(&metrics),
        ));
        info!("trapper started, pushing to {} as '{}'", target, config.host);

        Ok(Self {
            tx,
            sender_handle,
            periodic: Mutex::new(Vec::new()),
            metrics,
        })
    }

    /// Non-blocking enqueue onto the unbounded sender channel.
    fn enqueue(&self, item: Item) -> Result<()> {
        self.metrics.trapper.item_queued();
        self.tx
            .send(item)
            .map_err(|_| ZbridgeError::Transport("trapper queue is closed".into()))
    }

    /// Queue a literal item. Never blocks.
    pub fn send(&self, key: impl Into<String>, value: impl Into<String>) -> Result<()> {
        self.enqueue(Item::literal(key, value)?)
    }

    /// Queue a derived item; its value is read from the store when the
    /// sender gets to it.
    pub fn send_attribute(
        &self,
        key: impl Into<String>,
        object: impl Into<String>,
        attribute: impl Into<String>,
    ) -> Result<()> {
        self.enqueue(Item::derived(key, object, attribute)?)
    }

    /// Queue a derived item now and again every `interval` until the
    /// trapper stops.
    pub fn every(
        &self,
        interval: Duration,
        key: impl Into<String>,
        object: impl Into<String>,
        attribute: impl Into<String>,
    ) -> Result<()> {
        let item = Item::derived(key, object, attribute)?;
        let tx = self.tx.clone();
        let metrics = Arc::clone(&self.metrics);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                metrics.trapper.item_queued();
                if tx.send(item.clone()).is_err() {
                    break;
                }
            }
        });
        self.periodic.lock().push(handle);
        Ok(())
    }

    pub fn metrics(&self) -> &Arc<MetricsRegistry> {
        &self.metrics
    }

    /// Cancel periodic producers, then wait for the sender to drain
    /// everything already queued.
    ///
    /// The drain wait is unbounded: expect latency proportional to the
    /// queue depth at the moment of the call.
    pub async fn stop(self) {
        let handles = {
            let mut periodic = self.periodic.lock();
            std::mem::take(&mut *periodic)
        };
        for handle in &handles {
            handle.abort();
        }
        for handle in handles {
            let _ = handle.await;
        }

        // Closing the queue lets the sender finish whatever is left and
        // exit.
        drop(self.tx);
        if let Err(e) = self.sender_handle.await {
            warn!("sender task ended abnormally: {}", e);
        }
        info!("trapper stopped");
    }
}
