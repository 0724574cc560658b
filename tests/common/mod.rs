//! Local websocket server for exercising the push-data session

#![allow(dead_code)]

use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use std::future::Future;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{accept_hdr_async, WebSocketStream};

pub type ServerSocket = WebSocketStream<TcpStream>;

/// One accepted connection: its index, request path and socket
pub struct Accepted {
    pub index: usize,
    pub path: String,
    pub socket: ServerSocket,
}

/// Start a server on an ephemeral port and run `handler` for every accepted
/// connection. Returns the `ws://` base URL.
pub async fn spawn_ws_server<F, Fut>(handler: F) -> String
where
    F: Fn(Accepted) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let mut index = 0;
        while let Ok((tcp, _)) = listener.accept().await {
            let (path_tx, path_rx) = std::sync::mpsc::channel();
            let callback =
                move |request: &Request, response: Response| -> Result<Response, ErrorResponse> {
                    let _ = path_tx.send(request.uri().path().to_string());
                    Ok(response)
                };
            let socket = accept_hdr_async(tcp, callback).await.unwrap();
            let path = path_rx.recv().unwrap_or_default();
            tokio::spawn(handler(Accepted {
                index,
                path,
                socket,
            }));
            index += 1;
        }
    });

    format!("ws://{}", addr)
}

/// Next text frame parsed as JSON, skipping anything else
pub async fn next_json(socket: &mut ServerSocket) -> Option<Value> {
    while let Some(Ok(message)) = socket.next().await {
        if let Message::Text(text) = message {
            return serde_json::from_str(&text).ok();
        }
    }
    None
}

pub async fn send_text(socket: &mut ServerSocket, text: &str) {
    socket.send(Message::Text(text.to_string())).await.unwrap();
}

/// Forward every control frame received on `socket` until it closes
pub async fn forward_frames(socket: &mut ServerSocket, frames: &mpsc::UnboundedSender<Value>) {
    while let Some(frame) = next_json(socket).await {
        if frames.send(frame).is_err() {
            break;
        }
    }
}

/// Poll `condition` until it holds, failing the test after five seconds
pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}
