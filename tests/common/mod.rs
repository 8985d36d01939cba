//! Shared utilities for integration testing.
//!
//! [`MockNode`] is a minimal JSON-RPC over HTTP/1.1 endpoint: every request is
//! recorded and answered by a programmable handler.

#![allow(dead_code)]

use serde_json::{json, Value};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use bridge_portal::blockchain::ClientSettings;

/// One JSON-RPC call as the node saw it.
#[derive(Debug, Clone)]
pub struct RpcCall {
    pub method: String,
    pub params: Value,
    /// Lowercased header names.
    pub headers: HashMap<String, String>,
}

/// How the node answers a call.
pub enum Reply {
    Result(Value),
    Error(i64, &'static str),
    /// Bare HTTP status without a JSON-RPC body.
    Status(u16),
}

type Handler = dyn Fn(&RpcCall) -> Reply + Send + Sync;

pub struct MockNode {
    addr: SocketAddr,
    calls: Arc<Mutex<Vec<RpcCall>>>,
}

impl MockNode {
    /// Bind an ephemeral port and serve `handler` until the runtime stops.
    pub async fn start<F>(handler: F) -> Self
    where
        F: Fn(&RpcCall) -> Reply + Send + Sync + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let calls = Arc::new(Mutex::new(Vec::new()));
        let handler: Arc<Handler> = Arc::new(handler);

        let log = calls.clone();
        tokio::spawn(async move {
            loop {
                match listener.accept().await {
                    Ok((socket, _)) => {
                        let handler = handler.clone();
                        let log = log.clone();
                        tokio::spawn(async move {
                            let _ = serve(socket, handler, log).await;
                        });
                    }
                    Err(_) => break,
                }
            }
        });

        Self { addr, calls }
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn calls(&self) -> Vec<RpcCall> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn calls_to(&self, method: &str) -> Vec<RpcCall> {
        self.calls()
            .into_iter()
            .filter(|call| call.method == method)
            .collect()
    }
}

async fn serve(
    mut socket: TcpStream,
    handler: Arc<Handler>,
    log: Arc<Mutex<Vec<RpcCall>>>,
) -> std::io::Result<()> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];

    let header_end = loop {
        let n = socket.read(&mut chunk).await?;
        if n == 0 {
            return Ok(());
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
    let headers: HashMap<String, String> = head
        .lines()
        .skip(1)
        .filter_map(|line| line.split_once(':'))
        .map(|(name, value)| (name.trim().to_ascii_lowercase(), value.trim().to_string()))
        .collect();
    let length: usize = headers
        .get("content-length")
        .and_then(|v| v.parse().ok())
        .unwrap_or(0);

    while buf.len() < header_end + length {
        let n = socket.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }

    let request: Value = serde_json::from_slice(&buf[header_end..]).unwrap_or(Value::Null);
    let call = RpcCall {
        method: request["method"].as_str().unwrap_or_default().to_string(),
        params: request["params"].clone(),
        headers,
    };
    log.lock()
        .unwrap_or_else(PoisonError::into_inner)
        .push(call.clone());

    let id = request["id"].clone();
    let (status, body) = match handler(&call) {
        Reply::Result(result) => (200, json!({"jsonrpc": "2.0", "id": id, "result": result})),
        Reply::Error(code, message) => (
            200,
            json!({"jsonrpc": "2.0", "id": id, "error": {"code": code, "message": message}}),
        ),
        Reply::Status(status) => (status, json!({})),
    };
    let body = body.to_string();
    let status_text = match status {
        200 => "200 OK",
        403 => "403 Forbidden",
        500 => "500 Internal Server Error",
        503 => "503 Service Unavailable",
        _ => "200 OK",
    };
    let response = format!(
        "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status_text,
        body.len(),
        body
    );
    socket.write_all(response.as_bytes()).await?;
    socket.shutdown().await
}

/// Client settings pointing at a mock node, with short deadlines.
pub fn settings(label: &str, chain_id: u64, url: &str) -> ClientSettings {
    ClientSettings {
        label: label.to_string(),
        chain_id,
        rpc_url: url.to_string(),
        failover_urls: Vec::new(),
        timeout: Duration::from_secs(2),
        receipt_poll_interval: Duration::from_millis(20),
        receipt_timeout: Duration::from_secs(2),
        headers: HashMap::new(),
    }
}

/// Minimal successful receipt JSON as returned by `eth_getTransactionReceipt`.
pub fn receipt_json(hash: &str, from: &str, to: &str) -> Value {
    json!({
        "type": "0x0",
        "status": "0x1",
        "cumulativeGasUsed": "0x5208",
        "logs": [],
        "logsBloom": format!("0x{}", "0".repeat(512)),
        "transactionHash": hash,
        "transactionIndex": "0x0",
        "blockHash": format!("0x{}", "11".repeat(32)),
        "blockNumber": "0x10",
        "gasUsed": "0x5208",
        "effectiveGasPrice": "0x3b9aca00",
        "from": from,
        "to": to,
        "contractAddress": null
    })
}
