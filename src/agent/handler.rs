//! Per-connection query handling.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::io::{AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tracing::{debug, warn};

use crate::config::DEFAULT_COLLECTOR_PORT;
use crate::metrics::MetricsRegistry;
use crate::protocol::codec;
use crate::protocol::query::{self, ParsedRequest, Query, TrapPush};
use crate::protocol::{ProtocolVersion, AGENT_VERSION, NOT_SUPPORTED};
use crate::store::{self, AttributeStore, StoreError};
use crate::trapper;
use crate::Result;

/// Resolves parsed queries to response bodies.
///
/// One processor serves every connection of an agent. It owns the
/// attribute store handle, the process property table and the metrics
/// registry; cloning it is cheap and shares all three.
#[derive(Clone)]
pub struct QueryProcessor {
    store: Arc<dyn AttributeStore>,
    properties: Arc<DashMap<String, String>>,
    metrics: Arc<MetricsRegistry>,
}

impl QueryProcessor {
    pub fn new(store: Arc<dyn AttributeStore>) -> Self {
        Self {
            store,
            properties: Arc::new(DashMap::new()),
            metrics: Arc::new(MetricsRegistry::new()),
        }
    }

    /// Share a metrics registry with other components.
    pub fn with_metrics(mut self, metrics: Arc<MetricsRegistry>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Set a process property served by `system.property[...]` queries.
    pub fn set_property(&self, key: impl Into<String>, value: impl Into<String>) {
        self.properties.insert(key.into(), value.into());
    }

    pub fn metrics(&self) -> &Arc<MetricsRegistry> {
        &self.metrics
    }

    /// Produce the response body for one request line.
    ///
    /// Query-level failures never escape: they become the not-supported
    /// sentinel so the poller always gets a well-formed reply. An empty
    /// line gets an empty body.
    pub async fn respond(&self, line: &str) -> String {
        if line.is_empty() {
            return String::new();
        }
        match query::parse(line) {
            ParsedRequest::Query(query) => self.respond_query(query),
            ParsedRequest::Trap(push) => self.respond_trap(push).await,
        }
    }

    fn respond_query(&self, query: Query) -> String {
        let outcome = match query {
            Query::Attribute { object, attribute } => {
                store::resolve(self.store.as_ref(), &object, &attribute)
            }
            Query::Operation {
                object,
                operation,
                args_raw,
            } => self.invoke_operation(&object, &operation, &args_raw),
            Query::SystemProperty { key } => Ok(self
                .properties
                .get(&key)
                .map(|v| v.value().clone())
                .unwrap_or_default()),
            Query::Environment { key } => Ok(std::env::var(&key).unwrap_or_default()),
            Query::Ping => Ok("1".to_string()),
            Query::Version => Ok(AGENT_VERSION.to_string()),
            Query::Unrecognized => {
                self.metrics.agent.query_failed();
                return NOT_SUPPORTED.to_string();
            }
        };
        match outcome {
            Ok(body) => {
                self.metrics.agent.query_served();
                body
            }
            Err(e) => {
                debug!("query failed: {}", e);
                self.metrics.agent.query_failed();
                NOT_SUPPORTED.to_string()
            }
        }
    }

    fn invoke_operation(
        &self,
        object: &str,
        operation: &str,
        args_raw: &str,
    ) -> std::result::Result<String, StoreError> {
        let tokens = tokenize_args(args_raw);
        let signatures = self.store.operation_signatures(object, operation)?;
        let signature = signatures
            .into_iter()
            .find(|s| s.len() == tokens.len())
            .ok_or_else(|| StoreError::SignatureMismatch {
                operation: operation.to_string(),
                supplied: tokens.len(),
            })?;
        let args = signature
            .iter()
            .zip(&tokens)
            .map(|(kind, token)| kind.coerce(token))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        let value = self.store.invoke(object, operation, &args)?;
        Ok(store::format_value(&value))
    }

    async fn respond_trap(&self, push: TrapPush) -> String {
        // The server token may carry an explicit `host:port`; bare
        // names go to the default collector port.
        let (server, port) = match push.server.rsplit_once(':') {
            Some((host, port)) => match port.parse::<u16>() {
                Ok(port) => (host.to_string(), port),
                Err(_) => (push.server.clone(), DEFAULT_COLLECTOR_PORT),
            },
            None => (push.server.clone(), DEFAULT_COLLECTOR_PORT),
        };
        match trapper::push_once(&server, port, &push.host, &push.key, &push.value).await {
            Ok(()) => {
                self.metrics.agent.query_served();
                "1".to_string()
            }
            Err(e) => {
                warn!("trap push to {} failed: {}", push.server, e);
                self.metrics.agent.query_failed();
                NOT_SUPPORTED.to_string()
            }
        }
    }
}

/// Operation arguments arrive as one bracket group; tokens split on the
/// bracket and comma delimiters.
fn tokenize_args(raw: &str) -> Vec<String> {
    raw.split(|c| c == '[' || c == ']' || c == ',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// Serve one accepted connection.
///
/// Handles the first request, keeps going while the peer has more bytes
/// already buffered (pipelining), then closes unconditionally. The
/// connection never outlives one burst of requests.
pub(crate) async fn handle_connection(
    stream: TcpStream,
    processor: QueryProcessor,
    version: ProtocolVersion,
) -> Result<()> {
    stream.set_nodelay(true).ok();
    let mut reader = BufReader::new(stream);
    loop {
        let line = codec::read_request_line(&mut reader).await?;
        let body = match codec::strip_frame_header(&line, version) {
            Ok(text) => {
                debug!("received '{}'", text);
                processor.respond(&text).await
            }
            Err(e) => {
                debug!("rejecting malformed framed request: {}", e);
                processor.metrics().agent.query_failed();
                NOT_SUPPORTED.to_string()
            }
        };
        debug!("sending '{}'", body);
        let encoded = codec::encode_response(&body, version);
        reader.get_mut().write_all(&encoded).await?;
        reader.get_mut().flush().await?;
        if reader.buffer().is_empty() {
            break;
        }
    }
    Ok(())
}
