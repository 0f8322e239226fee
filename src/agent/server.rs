//! Listener and connection dispatch.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, Semaphore};
use tokio::task::JoinHandle;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

use super::handler::{self, QueryProcessor};
use super::registry::{self, AgentRecord};
use crate::config::AgentConfig;
use crate::protocol::ProtocolVersion;
use crate::{Result, ZbridgeError};

/// Most connections an agent serves at once; further accepted
/// connections wait their turn in an unbounded queue.
pub const MAX_CONCURRENT_HANDLERS: usize = 5;

/// How long `stop` waits for in-flight handlers before proceeding.
pub const SHUTDOWN_DRAIN: Duration = Duration::from_secs(10);

/// Lifecycle of a passive agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentState {
    Stopped,
    Starting,
    Listening,
    Stopping,
}

/// The passive side of the bridge: accepts monitoring-server
/// connections and dispatches each one to a bounded pool of query
/// handlers.
pub struct PassiveAgent {
    state: Arc<Mutex<AgentState>>,
    local_addr: SocketAddr,
    shutdown_tx: broadcast::Sender<()>,
    accept_handle: JoinHandle<()>,
    workers: TaskTracker,
}

impl PassiveAgent {
    /// Bind and start serving.
    ///
    /// Binding failures (port in use, address unavailable) surface here
    /// and are not retried. On success the agent registers its
    /// self-describing record and begins accepting connections.
    pub async fn start(config: AgentConfig, processor: QueryProcessor) -> Result<Self> {
        config.validate().map_err(ZbridgeError::Config)?;
        let state = Arc::new(Mutex::new(AgentState::Starting));

        let bind_host = config
            .bind_address
            .clone()
            .unwrap_or_else(|| "0.0.0.0".to_string());
        let listener = TcpListener::bind((bind_host.as_str(), config.port))
            .await
            .map_err(|e| {
                ZbridgeError::Config(format!("cannot bind {}:{}: {}", bind_host, config.port, e))
            })?;
        let local_addr = listener.local_addr()?;

        registry::register(AgentRecord {
            port: local_addr.port(),
            bind_address: config.bind_address.clone().unwrap_or_else(|| "*".to_string()),
        });

        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let workers = TaskTracker::new();
        let version = config.protocol;

        info!("agent listening on {} (protocol {:?})", local_addr, version);
        *state.lock() = AgentState::Listening;

        let accept_handle = tokio::spawn(accept_loop(
            listener,
            processor,
            version,
            workers.clone(),
            Arc::clone(&state),
            shutdown_rx,
        ));

        Ok(Self {
            state,
            local_addr,
            shutdown_tx,
            accept_handle,
            workers,
        })
    }

    /// The address the agent is actually bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn state(&self) -> AgentState {
        *self.state.lock()
    }

    /// Stop accepting, give in-flight handlers a bounded drain window,
    /// and unregister the management record.
    pub async fn stop(self) {
        *self.state.lock() = AgentState::Stopping;
        let _ = self.shutdown_tx.send(());
        if let Err(e) = self.accept_handle.await {
            warn!("accept task ended abnormally: {}", e);
        }
        self.workers.close();
        if tokio::time::timeout(SHUTDOWN_DRAIN, self.workers.wait())
            .await
            .is_err()
        {
            warn!(
                "shutdown proceeding with {} handler(s) still running",
                self.workers.len()
            );
        }
        registry::unregister(self.local_addr.port());
        *self.state.lock() = AgentState::Stopped;
        info!("agent on {} stopped", self.local_addr);
    }
}

async fn accept_loop(
    listener: TcpListener,
    processor: QueryProcessor,
    version: ProtocolVersion,
    workers: TaskTracker,
    state: Arc<Mutex<AgentState>>,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    let permits = Arc::new(Semaphore::new(MAX_CONCURRENT_HANDLERS));
    loop {
        tokio::select! {
            accepted = listener.accept() => {
                match accepted {
                    Ok((stream, peer)) => {
                        debug!("accepted connection from {}", peer);
                        processor.metrics().agent.connection_accepted();
                        let permits = Arc::clone(&permits);
                        let processor = processor.clone();
                        workers.spawn(async move {
                            let _permit = match permits.acquire_owned().await {
                                Ok(permit) => permit,
                                Err(_) => return,
                            };
                            processor.metrics().agent.handler_started();
                            if let Err(e) =
                                handler::handle_connection(stream, processor.clone(), version).await
                            {
                                warn!("dropping connection from {}: {}", peer, e);
                            }
                            processor.metrics().agent.handler_finished();
                        });
                    }
                    Err(e) => {
                        // Accept failures are expected while tearing
                        // down; everything else is a fault.
                        if *state.lock() == AgentState::Stopping {
                            debug!("accept interrupted during shutdown: {}", e);
                            break;
                        }
                        error!("failed to accept connection: {}", e);
                    }
                }
            }
            _ = shutdown_rx.recv() => {
                debug!("stopped listening for connections");
                break;
            }
        }
    }
}
