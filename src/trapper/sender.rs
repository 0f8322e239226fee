//! Sender task and collector push framing.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use serde_json::json;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::Item;
use crate::metrics::MetricsRegistry;
use crate::protocol::codec;
use crate::store::AttributeStore;
use crate::{Result, ZbridgeError};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const ACK_TIMEOUT: Duration = Duration::from_secs(2);

/// Drain the queue one item at a time.
///
/// A failing item is logged and dropped, never retried; the loop only
/// ends when the queue is closed and empty.
pub(crate) async fn run(
    mut rx: mpsc::UnboundedReceiver<Item>,
    store: Arc<dyn AttributeStore>,
    target: SocketAddr,
    host: String,
    metrics: Arc<MetricsRegistry>,
) {
    while let Some(item) = rx.recv().await {
        let value = match item.resolve(store.as_ref()) {
            Ok(value) => value,
            Err(e) => {
                warn!("dropping item '{}': {}", item.key(), e);
                metrics.trapper.item_dropped();
                continue;
            }
        };
        match push(target, &host, item.key(), &value).await {
            Ok(()) => metrics.trapper.item_sent(),
            Err(e) => {
                warn!("push of '{}' to {} failed: {}", item.key(), target, e);
                metrics.trapper.item_dropped();
            }
        }
    }
    debug!("sender exits");
}

/// The collector's sender-data request: one item, JSON body, framed.
fn encode_push(host: &str, key: &str, value: &str) -> Bytes {
    let payload = json!({
        "request": "sender data",
        "data": [{ "host": host, "key": key, "value": value }],
    });
    codec::frame_payload(payload.to_string().as_bytes())
}

/// Push one item over a fresh connection, reading the acknowledgement
/// best-effort.
async fn push(target: SocketAddr, host: &str, key: &str, value: &str) -> Result<()> {
    let mut stream = tokio::time::timeout(CONNECT_TIMEOUT, TcpStream::connect(target))
        .await
        .map_err(|_| ZbridgeError::Transport(format!("connect to {} timed out", target)))??;
    stream.write_all(&encode_push(host, key, value)).await?;
    stream.flush().await?;

    // Collectors answer with a framed status blob; some just hang up.
    let mut ack = [0u8; 512];
    match tokio::time::timeout(ACK_TIMEOUT, stream.read(&mut ack)).await {
        Ok(Ok(n)) if n > 0 => debug!("collector acknowledged with {} bytes", n),
        _ => debug!("no acknowledgement from collector"),
    }
    Ok(())
}

/// Push a single literal item outside any trapper session. Backs the
/// passive listener's `trap[...]` form.
pub async fn push_once(server: &str, port: u16, host: &str, key: &str, value: &str) -> Result<()> {
    let target = tokio::net::lookup_host((server, port))
        .await?
        .next()
        .ok_or_else(|| {
            ZbridgeError::Config(format!("collector '{}' has no addresses", server))
        })?;
    push(target, host, key, value).await
}
