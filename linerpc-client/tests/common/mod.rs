//! Common test utilities for linerpc-client integration tests
//!
//! A scripted line-delimited TCP server. Every request line is forwarded to
//! the test for inspection and answered according to a handler, and the
//! server counts how many connections it accepted and how many the client
//! closed.

#![allow(dead_code)]

use linerpc_client::{ClientBuilder, ConnectionManager};
use serde_json::{json, Map, Value};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokio::sync::mpsc;

/// What the mock server does with one request line
pub enum Reply {
    /// Answer with this line (the newline is added)
    Line(String),
    /// Wait, then answer with this line
    Delayed(Duration, String),
    /// Read the request and say nothing
    Silent,
    /// Answer, then hang up
    LineThenClose(String),
    /// Hang up without answering
    Close,
}

/// Mock line-delimited JSON-RPC server for client testing
pub struct MockLineServer {
    addr: SocketAddr,
    shutdown_tx: mpsc::Sender<()>,
    message_rx: mpsc::UnboundedReceiver<String>,
    accepted: Arc<AtomicUsize>,
    client_closed: Arc<AtomicUsize>,
}

impl MockLineServer {
    /// Server answering every request with `{"id", "jsonrpc", "result": <method>}`
    pub async fn echo() -> Self {
        Self::with_handler(|request| Reply::Line(reply_to(request, json!({"result": method_of(request)}))))
            .await
    }

    /// Server with a custom per-line handler
    pub async fn with_handler<F>(handler: F) -> Self
    where
        F: Fn(&str) -> Reply + Send + Sync + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);
        let (msg_tx, message_rx) = mpsc::unbounded_channel::<String>();
        let accepted = Arc::new(AtomicUsize::new(0));
        let client_closed = Arc::new(AtomicUsize::new(0));
        let handler = Arc::new(handler);

        let accepted_count = accepted.clone();
        let closed_count = client_closed.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => break,
                    accept_result = listener.accept() => {
                        let Ok((stream, _)) = accept_result else { continue };
                        accepted_count.fetch_add(1, Ordering::SeqCst);

                        let handler = handler.clone();
                        let msg_tx = msg_tx.clone();
                        let closed_count = closed_count.clone();
                        tokio::spawn(async move {
                            let (read, mut write) = stream.into_split();
                            let mut lines = BufReader::new(read).lines();

                            loop {
                                let line = match lines.next_line().await {
                                    Ok(Some(line)) => line,
                                    _ => {
                                        closed_count.fetch_add(1, Ordering::SeqCst);
                                        return;
                                    }
                                };
                                let _ = msg_tx.send(line.clone());

                                match (*handler)(&line) {
                                    Reply::Line(reply) => {
                                        if write.write_all(format!("{reply}\n").as_bytes()).await.is_err() {
                                            return;
                                        }
                                    }
                                    Reply::Delayed(delay, reply) => {
                                        tokio::time::sleep(delay).await;
                                        if write.write_all(format!("{reply}\n").as_bytes()).await.is_err() {
                                            return;
                                        }
                                    }
                                    Reply::Silent => {}
                                    Reply::LineThenClose(reply) => {
                                        let _ = write.write_all(format!("{reply}\n").as_bytes()).await;
                                        return;
                                    }
                                    Reply::Close => return,
                                }
                            }
                        });
                    }
                }
            }
        });

        Self {
            addr,
            shutdown_tx,
            message_rx,
            accepted,
            client_closed,
        }
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    /// Connections accepted so far
    pub fn accepted(&self) -> usize {
        self.accepted.load(Ordering::SeqCst)
    }

    /// Connections on which the server saw the client hang up
    pub fn client_closed(&self) -> usize {
        self.client_closed.load(Ordering::SeqCst)
    }

    /// Manager pointed at this server
    pub fn manager(&self, timeout: Duration, keepalive: Duration) -> ConnectionManager {
        ClientBuilder::new("127.0.0.1", self.port())
            .timeout(timeout)
            .keepalive(keepalive)
            .build()
            .unwrap()
    }

    /// Next request line received, or `None` after five seconds
    pub async fn wait_for_message(&mut self) -> Option<String> {
        tokio::time::timeout(Duration::from_secs(5), self.message_rx.recv())
            .await
            .ok()
            .flatten()
    }

    /// Stop accepting; established connections keep being served
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(()).await;
    }
}

/// Method name of a raw request line
pub fn method_of(request: &str) -> String {
    serde_json::from_str::<Value>(request)
        .ok()
        .and_then(|v| v.get("method").and_then(Value::as_str).map(str::to_owned))
        .unwrap_or_default()
}

/// Response line echoing the request's id, with `payload`'s members merged in
pub fn reply_to(request: &str, payload: Value) -> String {
    let id = serde_json::from_str::<Value>(request)
        .ok()
        .and_then(|v| v.get("id").cloned())
        .unwrap_or(Value::Null);

    let mut object = Map::new();
    object.insert("id".into(), id);
    object.insert("jsonrpc".into(), json!("2.0"));
    if let Value::Object(members) = payload {
        object.extend(members);
    }
    Value::Object(object).to_string()
}

/// Poll `condition` until it holds or `within` elapses
pub async fn eventually<F>(within: Duration, condition: F) -> bool
where
    F: Fn() -> bool,
{
    let deadline = tokio::time::Instant::now() + within;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}

