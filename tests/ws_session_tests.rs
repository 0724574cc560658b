mod common;

use binance_spot_stream::core::kernel::{StreamMode, WsConfig, WsSession};
use binance_spot_stream::exchanges::binance::BinanceCodec;
use common::{forward_frames, next_json, send_text, spawn_ws_server, Accepted};
use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::tungstenite::Message;

fn session(base_url: String) -> WsSession<BinanceCodec> {
    WsSession::new(base_url, "binance".to_string(), BinanceCodec)
}

#[tokio::test]
async fn test_replays_subscriptions_and_skips_acks() {
    let (frames_tx, mut frames_rx) = mpsc::unbounded_channel();
    let paths = Arc::new(Mutex::new(Vec::new()));
    let seen_paths = paths.clone();

    let url = spawn_ws_server(move |mut conn: Accepted| {
        let frames = frames_tx.clone();
        let paths = seen_paths.clone();
        async move {
            paths.lock().unwrap().push(conn.path.clone());
            if let Some(frame) = next_json(&mut conn.socket).await {
                let _ = frames.send(frame);
            }
            send_text(&mut conn.socket, r#"{"return":"ok"}"#).await;
            send_text(&mut conn.socket, r#"{"result":null,"id":1}"#).await;
            send_text(&mut conn.socket, r#"{"e":"trade","s":"BTCUSDT"}"#).await;
            let _ = conn.socket.close(None).await;
        }
    })
    .await;

    let ws = session(url);
    ws.add_subscriptions(&["btcusdt@trade".to_string()]).await;

    let messages: Vec<_> = ws.messages(StreamMode::Raw).collect().await;
    assert_eq!(messages, vec![json!({"e": "trade", "s": "BTCUSDT"})]);

    let subscribe = frames_rx.recv().await.unwrap();
    assert_eq!(subscribe["method"], "SUBSCRIBE");
    assert_eq!(subscribe["params"], json!(["btcusdt@trade"]));
    assert!(subscribe["id"].as_u64().unwrap() > 0);
    assert_eq!(*paths.lock().unwrap(), vec!["/ws".to_string()]);

    assert!(!ws.closed_by_error());
    assert!(!ws.is_connected().await);
}

#[tokio::test]
async fn test_combined_mode_uses_stream_path() {
    let paths = Arc::new(Mutex::new(Vec::new()));
    let seen_paths = paths.clone();

    let url = spawn_ws_server(move |mut conn: Accepted| {
        let paths = seen_paths.clone();
        async move {
            paths.lock().unwrap().push(conn.path.clone());
            send_text(
                &mut conn.socket,
                r#"{"stream":"btcusdt@trade","data":{"e":"trade"}}"#,
            )
            .await;
            let _ = conn.socket.close(None).await;
        }
    })
    .await;

    let ws = session(url);
    let messages: Vec<_> = ws.messages(StreamMode::Combined).collect().await;

    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0]["stream"], "btcusdt@trade");
    assert_eq!(*paths.lock().unwrap(), vec!["/stream".to_string()]);
}

#[tokio::test]
async fn test_live_subscription_changes_are_sent() {
    let (frames_tx, mut frames_rx) = mpsc::unbounded_channel();
    let (close_tx, close_rx) = oneshot::channel::<()>();
    let close_rx = Arc::new(Mutex::new(Some(close_rx)));

    let url = spawn_ws_server(move |mut conn: Accepted| {
        let frames = frames_tx.clone();
        let close = close_rx.lock().unwrap().take();
        async move {
            send_text(&mut conn.socket, r#"{"e":"hello"}"#).await;
            let close_requested = tokio::select! {
                _ = forward_frames(&mut conn.socket, &frames) => false,
                _ = async move {
                    if let Some(close) = close {
                        let _ = close.await;
                    }
                } => true,
            };
            if close_requested {
                let _ = conn.socket.close(None).await;
            }
        }
    })
    .await;

    let ws = session(url);
    let messages = ws.messages(StreamMode::Raw);
    tokio::pin!(messages);

    // the first message proves the connection is registered
    assert_eq!(messages.next().await, Some(json!({"e": "hello"})));
    assert!(ws.is_connected().await);

    ws.add_subscriptions(&["ethusdt@trade".to_string()]).await;
    ws.remove_subscriptions(&["ethusdt@trade".to_string()]).await;

    let subscribe = frames_rx.recv().await.unwrap();
    assert_eq!(subscribe["method"], "SUBSCRIBE");
    assert_eq!(subscribe["params"], json!(["ethusdt@trade"]));
    let unsubscribe = frames_rx.recv().await.unwrap();
    assert_eq!(unsubscribe["method"], "UNSUBSCRIBE");
    assert_eq!(unsubscribe["params"], json!(["ethusdt@trade"]));
    assert!(unsubscribe["id"].as_u64().unwrap() > subscribe["id"].as_u64().unwrap());
    assert!(ws.subscriptions().await.is_empty());

    close_tx.send(()).unwrap();
    assert_eq!(messages.next().await, None);
}

#[tokio::test]
async fn test_connect_failure_yields_empty_stream() {
    let ws = session("ws://127.0.0.1:1".to_string()).with_config(WsConfig {
        connect_timeout_ms: 2_000,
    });

    let messages: Vec<_> = ws.messages(StreamMode::Raw).collect().await;

    assert!(messages.is_empty());
    assert!(ws.closed_by_error());
    assert!(!ws.is_connected().await);
}

#[tokio::test]
async fn test_abrupt_drop_ends_stream() {
    let url = spawn_ws_server(|mut conn: Accepted| async move {
        send_text(&mut conn.socket, r#"{"e":"trade"}"#).await;
        // drop without a close handshake
        drop(conn);
    })
    .await;

    let ws = session(url);
    let messages: Vec<_> = ws.messages(StreamMode::Raw).collect().await;

    assert_eq!(messages, vec![json!({"e": "trade"})]);
    assert!(ws.closed_by_error());
    assert!(!ws.is_connected().await);
}

#[tokio::test]
async fn test_ping_is_answered_with_pong() {
    let (pong_tx, pong_rx) = oneshot::channel();
    let pong_tx = Arc::new(Mutex::new(Some(pong_tx)));

    let url = spawn_ws_server(move |mut conn: Accepted| {
        let pong_tx = pong_tx.lock().unwrap().take();
        async move {
            conn.socket.send(Message::Ping(b"beat".to_vec())).await.unwrap();
            send_text(&mut conn.socket, r#"{"e":"trade"}"#).await;
            while let Some(Ok(message)) = conn.socket.next().await {
                if let Message::Pong(data) = message {
                    if let Some(tx) = pong_tx {
                        let _ = tx.send(data);
                    }
                    break;
                }
            }
            let _ = conn.socket.close(None).await;
        }
    })
    .await;

    let ws = session(url);
    let messages = ws.messages(StreamMode::Raw);
    tokio::pin!(messages);

    assert_eq!(messages.next().await, Some(json!({"e": "trade"})));
    while messages.next().await.is_some() {}

    assert_eq!(pong_rx.await.unwrap(), b"beat".to_vec());
}

#[tokio::test]
async fn test_subscription_changes_on_dead_connection_fail_soft() {
    let url = spawn_ws_server(|mut conn: Accepted| async move {
        send_text(&mut conn.socket, r#"{"e":"trade"}"#).await;
        drop(conn);
    })
    .await;

    let ws = session(url);
    let messages = ws.messages(StreamMode::Raw);
    tokio::pin!(messages);

    assert_eq!(messages.next().await, Some(json!({"e": "trade"})));
    // the peer is gone but the receive loop has not noticed yet
    tokio::time::sleep(std::time::Duration::from_millis(200)).await;
    assert!(ws.is_connected().await);

    let streams = vec!["btcusdt@trade".to_string()];
    for _ in 0..5 {
        ws.add_subscriptions(&streams).await;
        ws.remove_subscriptions(&streams).await;
    }
    ws.add_subscriptions(&streams).await;
    assert_eq!(ws.subscriptions().await, streams);

    assert_eq!(messages.next().await, None);
    assert!(!ws.is_connected().await);
    assert!(ws.closed_by_error());
}
