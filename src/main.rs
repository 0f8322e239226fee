use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::Parser;
use tokio::signal;
use tracing::{info, warn};

use zbridge::store::AttributeValue;
use zbridge::{
    AgentConfig, MemoryStore, PassiveAgent, ProtocolVersion, QueryProcessor, Trapper,
    TrapperConfig,
};

#[derive(Parser, Debug)]
#[command(name = "zbridge")]
#[command(about = "A Zabbix-compatible monitoring agent bridge")]
struct Args {
    /// Address to bind the passive listener to (default: any interface)
    #[arg(long)]
    bind: Option<String>,

    #[arg(short, long, default_value = "10052")]
    port: u16,

    /// Wire protocol served to pollers: "1.4" framed, "1.1" legacy
    #[arg(long, default_value = "1.4")]
    protocol: String,

    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Collector to push a periodic heartbeat to (no trapper when absent)
    #[arg(long)]
    collector: Option<String>,

    #[arg(long, default_value = "10051")]
    collector_port: u16,

    /// Host name pushed items are reported under
    #[arg(long, default_value = "localhost")]
    host_name: String,

    /// Heartbeat interval in seconds
    #[arg(long, default_value = "60")]
    heartbeat_secs: u64,
}

#[tokio::main]
async fn main() -> zbridge::Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_max_level(parse_log_level(&args.log_level))
        .init();

    let protocol: ProtocolVersion = args.protocol.parse()?;

    let store = Arc::new(MemoryStore::new());
    seed_runtime_object(&store);

    let processor = QueryProcessor::new(store.clone());
    processor.set_property("agent.name", "zbridge");
    processor.set_property("agent.version", zbridge::AGENT_VERSION);

    let mut config = AgentConfig::default()
        .with_port(args.port)
        .with_protocol(protocol);
    if let Some(bind) = args.bind.clone() {
        config = config.with_bind_address(bind);
    }

    info!(
        "starting agent on {}:{} (protocol {})",
        args.bind.as_deref().unwrap_or("*"),
        args.port,
        args.protocol
    );
    let agent = PassiveAgent::start(config, processor).await?;

    let trapper = match &args.collector {
        Some(collector) => {
            let trapper_config = TrapperConfig::new(collector.clone(), args.host_name.clone())
                .with_port(args.collector_port);
            let trapper = Trapper::start(trapper_config, store.clone()).await?;
            trapper.every(
                Duration::from_secs(args.heartbeat_secs),
                "agent.uptime",
                "zbridge:type=Runtime",
                "UptimeSecs",
            )?;
            info!("heartbeat every {}s to {}", args.heartbeat_secs, collector);
            Some(trapper)
        }
        None => None,
    };

    signal::ctrl_c().await?;
    info!("received ctrl-c, shutting down");

    if let Some(trapper) = trapper {
        trapper.stop().await;
    }
    agent.stop().await;

    info!("zbridge shut down");
    Ok(())
}

fn seed_runtime_object(store: &MemoryStore) {
    let started = Instant::now();
    store.set_attribute("zbridge:type=Runtime", "Pid", std::process::id() as i64);
    store.set_computed_attribute("zbridge:type=Runtime", "UptimeSecs", move || {
        AttributeValue::Int(started.elapsed().as_secs() as i64)
    });
}

fn parse_log_level(level: &str) -> tracing::Level {
    match level.to_lowercase().as_str() {
        "trace" => tracing::Level::TRACE,
        "debug" => tracing::Level::DEBUG,
        "info" => tracing::Level::INFO,
        "warn" => tracing::Level::WARN,
        "error" => tracing::Level::ERROR,
        _ => {
            warn!("invalid log level '{}', defaulting to 'info'", level);
            tracing::Level::INFO
        }
    }
}
