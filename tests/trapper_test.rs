use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::time::timeout;

use zbridge::protocol::codec;
use zbridge::{MemoryStore, Trapper, TrapperConfig, ZbridgeError};

/// Accept pushes until `expected` items have arrived, acknowledging
/// each one, and return the `(key, value)` pairs in arrival order.
async fn run_collector(listener: TcpListener, expected: usize) -> Vec<(String, String)> {
    let mut items = Vec::new();
    while items.len() < expected {
        let (mut stream, _) = listener.accept().await.expect("accept");

        let mut header = [0u8; 13];
        stream.read_exact(&mut header).await.expect("frame header");
        assert_eq!(&header[..4], b"ZBXD");
        let length = u64::from_le_bytes(header[5..13].try_into().unwrap()) as usize;
        let mut body = vec![0u8; length];
        stream.read_exact(&mut body).await.expect("frame body");

        let parsed: serde_json::Value = serde_json::from_slice(&body).expect("json payload");
        assert_eq!(parsed["request"], "sender data");
        items.push((
            parsed["data"][0]["key"].as_str().unwrap().to_string(),
            parsed["data"][0]["value"].as_str().unwrap().to_string(),
        ));

        let ack = codec::frame_payload(br#"{"response":"success","info":"processed: 1"}"#);
        stream.write_all(&ack).await.ok();
    }
    items
}

async fn start_collector(expected: usize) -> (u16, tokio::task::JoinHandle<Vec<(String, String)>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind collector");
    let port = listener.local_addr().unwrap().port();
    let handle = tokio::spawn(run_collector(listener, expected));
    (port, handle)
}

#[tokio::test]
async fn items_arrive_in_fifo_order() {
    let (port, collector) = start_collector(3).await;

    let store = Arc::new(MemoryStore::new());
    let config = TrapperConfig::new("127.0.0.1", "web01").with_port(port);
    let trapper = Trapper::start(config, store).await.expect("trapper starts");

    trapper.send("a", "1").unwrap();
    trapper.send("b", "2").unwrap();
    trapper.send("c", "3").unwrap();

    let items = timeout(Duration::from_secs(10), collector)
        .await
        .expect("collector finishes")
        .unwrap();
    assert_eq!(
        items,
        vec![
            ("a".to_string(), "1".to_string()),
            ("b".to_string(), "2".to_string()),
            ("c".to_string(), "3".to_string()),
        ]
    );

    assert!(trapper.send("   ", "value").is_err());

    trapper.stop().await;
}

#[tokio::test]
async fn literal_items_keep_order_among_periodic_traffic() {
    let (port, collector) = start_collector(8).await;

    let store = Arc::new(MemoryStore::new());
    store.set_attribute("obj", "Count", 7i64);
    let config = TrapperConfig::new("127.0.0.1", "web01").with_port(port);
    let trapper = Trapper::start(config, store).await.expect("trapper starts");

    trapper
        .every(Duration::from_millis(20), "tick", "obj", "Count")
        .unwrap();
    trapper.send("x", "1").unwrap();
    trapper.send("y", "2").unwrap();
    trapper.send("z", "3").unwrap();

    let items = timeout(Duration::from_secs(10), collector)
        .await
        .expect("collector finishes")
        .unwrap();

    let literals: Vec<&str> = items
        .iter()
        .map(|(key, _)| key.as_str())
        .filter(|key| *key != "tick")
        .collect();
    assert_eq!(literals, vec!["x", "y", "z"]);
    assert!(items.iter().any(|(key, _)| key == "tick"));

    trapper.stop().await;
}

#[tokio::test]
async fn stop_drains_everything_already_queued() {
    let (port, collector) = start_collector(5).await;

    let store = Arc::new(MemoryStore::new());
    let config = TrapperConfig::new("127.0.0.1", "web01").with_port(port);
    let trapper = Trapper::start(config, store).await.expect("trapper starts");

    for i in 0..5 {
        trapper.send(format!("key{}", i), format!("{}", i)).unwrap();
    }
    trapper.stop().await;

    let items = timeout(Duration::from_secs(10), collector)
        .await
        .expect("collector finishes")
        .unwrap();
    let keys: Vec<&str> = items.iter().map(|(key, _)| key.as_str()).collect();
    assert_eq!(keys, vec!["key0", "key1", "key2", "key3", "key4"]);
}

#[tokio::test]
async fn failing_resolution_drops_the_item_and_continues() {
    let (port, collector) = start_collector(2).await;

    let store = Arc::new(MemoryStore::new());
    let config = TrapperConfig::new("127.0.0.1", "web01").with_port(port);
    let trapper = Trapper::start(config, store).await.expect("trapper starts");
    let metrics = Arc::clone(trapper.metrics());

    trapper
        .send_attribute("broken", "no-such-object", "Attr")
        .unwrap();
    trapper.send("good1", "1").unwrap();
    trapper.send("good2", "2").unwrap();

    let items = timeout(Duration::from_secs(10), collector)
        .await
        .expect("collector finishes")
        .unwrap();
    let keys: Vec<&str> = items.iter().map(|(key, _)| key.as_str()).collect();
    assert_eq!(keys, vec!["good1", "good2"]);

    trapper.stop().await;
    let snapshot = metrics.snapshot();
    assert_eq!(snapshot.items_dropped, 1);
    assert_eq!(snapshot.items_sent, 2);
}

#[tokio::test]
async fn unresolvable_collector_fails_start() {
    let store = Arc::new(MemoryStore::new());
    let config = TrapperConfig::new("zbridge-nonexistent-host.invalid", "web01");
    let result = Trapper::start(config, store).await;
    assert!(matches!(result, Err(ZbridgeError::Config(_))));
}
