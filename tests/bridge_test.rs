mod common;

use common::quiet_context;
use jarvis::bridge;
use jarvis::platform::Platform;
use jarvis::tools::default_registry;
use serde_json::Value;
use std::time::Duration;

fn replies(raw: &[u8]) -> Vec<Value> {
    String::from_utf8_lossy(raw)
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect()
}

#[tokio::test]
async fn test_one_reply_per_request() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = quiet_context(dir.path(), Platform::Linux);
    let registry = default_registry();

    let input = concat!(
        "{\"id\": 1, \"name\": \"get_formatted_datetime\"}\n",
        "\n",
        "this is not json\n",
        "{\"id\": \"b\", \"name\": \"open_common_app\", \"arguments\": {\"app\": \"nope\"}}\n",
    );
    let mut out = Vec::new();
    bridge::serve(&registry, &ctx, input.as_bytes(), &mut out, std::future::pending())
        .await
        .unwrap();

    let replies = replies(&out);
    assert_eq!(replies.len(), 3);

    assert_eq!(replies[0]["id"], 1);
    assert_eq!(replies[0]["result"]["ok"], true);

    assert_eq!(replies[1]["id"], Value::Null);
    assert_eq!(replies[1]["result"]["kind"], "invalid_input");

    assert_eq!(replies[2]["id"], "b");
    assert_eq!(replies[2]["result"]["ok"], false);
    assert!(replies[2]["result"]["error"].as_str().unwrap().contains("nope"));

    println!("✅ Bridge answered {} requests", replies.len());
}

#[tokio::test]
async fn test_shutdown_stops_the_loop() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = quiet_context(dir.path(), Platform::Linux);
    let registry = default_registry();

    // The write half stays open, so only the shutdown signal can end the loop.
    let (_client, server) = tokio::io::duplex(1024);
    let reader = tokio::io::BufReader::new(server);
    let mut out = Vec::new();

    let shutdown = tokio::time::sleep(Duration::from_millis(50));
    let served = tokio::time::timeout(
        Duration::from_secs(2),
        bridge::serve(&registry, &ctx, reader, &mut out, shutdown),
    )
    .await;

    assert!(matches!(served, Ok(Ok(()))));
    assert!(out.is_empty());
}
