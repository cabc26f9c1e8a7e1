//! JSON-RPC transports for external tool servers.
//!
//! Three wire flavors:
//! - **stdio**: spawn the server and exchange newline-delimited JSON-RPC
//!   over its pipes
//! - **streamable**: POST each request; the server answers with plain JSON
//!   or a single SSE-framed response, and may assign a session id
//! - **sse** (legacy): a long-lived GET event stream delivers responses;
//!   requests are POSTed to the endpoint announced by the first event

use std::collections::HashMap;
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, bail, Context};
use async_trait::async_trait;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::oneshot;
use tracing::{debug, warn};

use relaybot_core::config::McpServerConfig;

// ─────────────────────────────────────────────
// JSON-RPC frames
// ─────────────────────────────────────────────

#[derive(Serialize)]
struct JsonRpcRequest<'a> {
    jsonrpc: &'static str,
    /// Absent for notifications.
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<u64>,
    method: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    params: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcResponse {
    #[serde(default)]
    id: Option<u64>,
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<JsonRpcError>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcError {
    code: i64,
    message: String,
}

impl JsonRpcResponse {
    fn into_result(self) -> anyhow::Result<Value> {
        if let Some(err) = self.error {
            bail!("server error {}: {}", err.code, err.message);
        }
        Ok(self.result.unwrap_or(Value::Null))
    }
}

fn encode_line(id: Option<u64>, method: &str, params: Option<Value>) -> anyhow::Result<String> {
    let mut line = serde_json::to_string(&JsonRpcRequest {
        jsonrpc: "2.0",
        id,
        method,
        params,
    })?;
    line.push('\n');
    Ok(line)
}

// ─────────────────────────────────────────────
// Transport trait + factory
// ─────────────────────────────────────────────

/// One JSON-RPC connection to a tool server.
#[async_trait]
pub trait McpTransport: Send + Sync {
    /// Send a request and wait for the matching response's `result`.
    async fn request(&self, method: &str, params: Option<Value>) -> anyhow::Result<Value>;

    /// Send a notification (no response expected).
    async fn notify(&self, method: &str, params: Option<Value>) -> anyhow::Result<()>;

    /// Tear the connection down.
    async fn close(&self) -> anyhow::Result<()>;
}

impl std::fmt::Debug for dyn McpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("McpTransport")
    }
}

/// Build the transport described by a server config.
///
/// Misconfiguration (missing command/url, unknown kind) fails here, before
/// anything is spawned or dialed.
pub async fn create_transport(cfg: &McpServerConfig) -> anyhow::Result<Box<dyn McpTransport>> {
    match cfg.transport.as_str() {
        "stdio" | "" => {
            if cfg.command.is_empty() {
                bail!("stdio transport requires 'command'");
            }
            Ok(Box::new(StdioTransport::spawn(
                &cfg.command,
                &cfg.args,
                &cfg.env,
            )?))
        }
        "sse" => {
            if cfg.url.is_empty() {
                bail!("sse transport requires 'url'");
            }
            Ok(Box::new(SseTransport::connect(&cfg.url).await?))
        }
        "streamable" => {
            if cfg.url.is_empty() {
                bail!("streamable transport requires 'url'");
            }
            Ok(Box::new(StreamableHttpTransport::new(&cfg.url)))
        }
        other => bail!("unknown transport type: {:?}", other),
    }
}

type PendingMap = Arc<Mutex<HashMap<u64, oneshot::Sender<JsonRpcResponse>>>>;

fn route_response(pending: &PendingMap, response: JsonRpcResponse) {
    if let Some(id) = response.id {
        let sender = pending.lock().unwrap().remove(&id);
        if let Some(tx) = sender {
            let _ = tx.send(response);
        } else {
            debug!(id, "dropping response for unknown request id");
        }
    }
}

// ─────────────────────────────────────────────
// Stdio
// ─────────────────────────────────────────────

/// Spawned child process speaking newline-delimited JSON-RPC on its pipes.
pub struct StdioTransport {
    child: tokio::sync::Mutex<tokio::process::Child>,
    stdin: tokio::sync::Mutex<tokio::process::ChildStdin>,
    pending: PendingMap,
    next_id: AtomicU64,
    reader: tokio::task::JoinHandle<()>,
}

impl StdioTransport {
    pub fn spawn(
        command: &str,
        args: &[String],
        env: &HashMap<String, String>,
    ) -> anyhow::Result<Self> {
        let mut child = tokio::process::Command::new(command)
            .args(args)
            .envs(env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("failed to spawn {:?}", command))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| anyhow!("child stdin not captured"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| anyhow!("child stdout not captured"))?;

        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
        let reader_pending = pending.clone();
        let reader = tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                match serde_json::from_str::<JsonRpcResponse>(&line) {
                    Ok(response) => route_response(&reader_pending, response),
                    Err(e) => debug!(error = %e, "ignoring unparseable server line"),
                }
            }
        });

        Ok(StdioTransport {
            child: tokio::sync::Mutex::new(child),
            stdin: tokio::sync::Mutex::new(stdin),
            pending,
            next_id: AtomicU64::new(1),
            reader,
        })
    }

    async fn write_line(&self, line: String) -> anyhow::Result<()> {
        let mut stdin = self.stdin.lock().await;
        stdin.write_all(line.as_bytes()).await?;
        stdin.flush().await?;
        Ok(())
    }
}

#[async_trait]
impl McpTransport for StdioTransport {
    async fn request(&self, method: &str, params: Option<Value>) -> anyhow::Result<Value> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        self.pending.lock().unwrap().insert(id, tx);

        self.write_line(encode_line(Some(id), method, params)?)
            .await?;

        let response = rx
            .await
            .map_err(|_| anyhow!("server closed before responding to {}", method))?;
        response.into_result()
    }

    async fn notify(&self, method: &str, params: Option<Value>) -> anyhow::Result<()> {
        self.write_line(encode_line(None, method, params)?).await
    }

    async fn close(&self) -> anyhow::Result<()> {
        self.reader.abort();
        let mut child = self.child.lock().await;
        let _ = child.kill().await;
        Ok(())
    }
}

// ─────────────────────────────────────────────
// Streamable HTTP
// ─────────────────────────────────────────────

/// Per-request POST transport. Understands plain-JSON and SSE-framed
/// responses and carries the server-assigned `Mcp-Session-Id`.
pub struct StreamableHttpTransport {
    client: reqwest::Client,
    url: String,
    session_id: Mutex<Option<String>>,
    next_id: AtomicU64,
}

impl StreamableHttpTransport {
    pub fn new(url: &str) -> Self {
        StreamableHttpTransport {
            client: reqwest::Client::new(),
            url: url.to_string(),
            session_id: Mutex::new(None),
            next_id: AtomicU64::new(1),
        }
    }

    async fn post(&self, id: Option<u64>, method: &str, params: Option<Value>)
        -> anyhow::Result<Option<JsonRpcResponse>> {
        let body = JsonRpcRequest {
            jsonrpc: "2.0",
            id,
            method,
            params,
        };

        let mut request = self
            .client
            .post(&self.url)
            .header("Accept", "application/json, text/event-stream")
            .json(&body);
        if let Some(session) = self.session_id.lock().unwrap().clone() {
            request = request.header("Mcp-Session-Id", session);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("server returned {}: {}", status, body);
        }

        if let Some(session) = response
            .headers()
            .get("mcp-session-id")
            .and_then(|v| v.to_str().ok())
        {
            *self.session_id.lock().unwrap() = Some(session.to_string());
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        let text = response.text().await?;

        if id.is_none() || text.is_empty() {
            return Ok(None);
        }

        if content_type.starts_with("text/event-stream") {
            // The response arrives as one or more SSE events; the JSON-RPC
            // reply is the first message event that parses.
            let mut parser = SseParser::new();
            for event in parser.feed(&text) {
                if let Ok(response) = serde_json::from_str::<JsonRpcResponse>(&event.data) {
                    return Ok(Some(response));
                }
            }
            bail!("no JSON-RPC response in event stream");
        }

        Ok(Some(serde_json::from_str(&text)?))
    }
}

#[async_trait]
impl McpTransport for StreamableHttpTransport {
    async fn request(&self, method: &str, params: Option<Value>) -> anyhow::Result<Value> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let response = self
            .post(Some(id), method, params)
            .await?
            .ok_or_else(|| anyhow!("empty response to {}", method))?;
        response.into_result()
    }

    async fn notify(&self, method: &str, params: Option<Value>) -> anyhow::Result<()> {
        self.post(None, method, params).await?;
        Ok(())
    }

    async fn close(&self) -> anyhow::Result<()> {
        // Best-effort session teardown
        let session = self.session_id.lock().unwrap().clone();
        if let Some(session) = session {
            let _ = self
                .client
                .delete(&self.url)
                .header("Mcp-Session-Id", session)
                .send()
                .await;
        }
        Ok(())
    }
}

// ─────────────────────────────────────────────
// Legacy SSE
// ─────────────────────────────────────────────

/// Long-lived GET event stream plus a POST endpoint announced by the
/// server's first `endpoint` event.
pub struct SseTransport {
    client: reqwest::Client,
    endpoint: String,
    pending: PendingMap,
    next_id: AtomicU64,
    reader: tokio::task::JoinHandle<()>,
}

impl SseTransport {
    pub async fn connect(url: &str) -> anyhow::Result<Self> {
        let client = reqwest::Client::new();
        let response = client
            .get(url)
            .header("Accept", "text/event-stream")
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            bail!("event stream returned {}", status);
        }

        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
        let (endpoint_tx, endpoint_rx) = oneshot::channel::<String>();

        let base = reqwest::Url::parse(url).context("invalid sse url")?;
        let reader_pending = pending.clone();
        let reader = tokio::spawn(async move {
            let mut endpoint_tx = Some(endpoint_tx);
            let mut parser = SseParser::new();
            let mut stream = response.bytes_stream();
            while let Some(chunk) = stream.next().await {
                let chunk = match chunk {
                    Ok(c) => c,
                    Err(e) => {
                        warn!(error = %e, "event stream failed");
                        break;
                    }
                };
                for event in parser.feed(&String::from_utf8_lossy(&chunk)) {
                    match event.event.as_str() {
                        "endpoint" => {
                            if let Some(tx) = endpoint_tx.take() {
                                let resolved = resolve_endpoint(&base, &event.data);
                                let _ = tx.send(resolved);
                            }
                        }
                        "message" | "" => {
                            match serde_json::from_str::<JsonRpcResponse>(&event.data) {
                                Ok(response) => route_response(&reader_pending, response),
                                Err(e) => {
                                    debug!(error = %e, "ignoring unparseable event")
                                }
                            }
                        }
                        _ => {}
                    }
                }
            }
        });

        let endpoint = endpoint_rx
            .await
            .map_err(|_| anyhow!("stream closed before endpoint event"))?;
        debug!(%endpoint, "sse endpoint received");

        Ok(SseTransport {
            client,
            endpoint,
            pending,
            next_id: AtomicU64::new(1),
            reader,
        })
    }

    async fn post(&self, id: Option<u64>, method: &str, params: Option<Value>)
        -> anyhow::Result<()> {
        let body = JsonRpcRequest {
            jsonrpc: "2.0",
            id,
            method,
            params,
        };
        let response = self.client.post(&self.endpoint).json(&body).send().await?;
        let status = response.status();
        if !status.is_success() {
            bail!("server returned {}", status);
        }
        Ok(())
    }
}

#[async_trait]
impl McpTransport for SseTransport {
    async fn request(&self, method: &str, params: Option<Value>) -> anyhow::Result<Value> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        self.pending.lock().unwrap().insert(id, tx);

        self.post(Some(id), method, params).await?;

        let response = rx
            .await
            .map_err(|_| anyhow!("stream closed before responding to {}", method))?;
        response.into_result()
    }

    async fn notify(&self, method: &str, params: Option<Value>) -> anyhow::Result<()> {
        self.post(None, method, params).await
    }

    async fn close(&self) -> anyhow::Result<()> {
        self.reader.abort();
        Ok(())
    }
}

/// Resolve the endpoint announced by the server against the stream URL.
fn resolve_endpoint(base: &reqwest::Url, data: &str) -> String {
    match base.join(data) {
        Ok(url) => url.to_string(),
        Err(_) => data.to_string(),
    }
}

// ─────────────────────────────────────────────
// SSE framing
// ─────────────────────────────────────────────

#[derive(Debug, PartialEq)]
struct SseEvent {
    event: String,
    data: String,
}

/// Incremental server-sent-events parser. Feed chunks in any split,
/// complete events come out.
struct SseParser {
    buffer: String,
    event: String,
    data: Vec<String>,
}

impl SseParser {
    fn new() -> Self {
        SseParser {
            buffer: String::new(),
            event: String::new(),
            data: Vec::new(),
        }
    }

    fn feed(&mut self, chunk: &str) -> Vec<SseEvent> {
        self.buffer.push_str(chunk);
        let mut events = Vec::new();

        while let Some(pos) = self.buffer.find('\n') {
            let line: String = self.buffer.drain(..=pos).collect();
            let line = line.trim_end_matches(['\n', '\r']);

            if line.is_empty() {
                if !self.data.is_empty() {
                    events.push(SseEvent {
                        event: std::mem::take(&mut self.event),
                        data: self.data.join("\n"),
                    });
                    self.data.clear();
                }
                self.event.clear();
            } else if let Some(value) = line.strip_prefix("event:") {
                self.event = value.trim_start().to_string();
            } else if let Some(value) = line.strip_prefix("data:") {
                self.data.push(value.trim_start().to_string());
            }
            // comments and other fields are ignored
        }

        events
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn stdio_config(command: &str) -> McpServerConfig {
        McpServerConfig {
            name: "test".to_string(),
            transport: "stdio".to_string(),
            command: command.to_string(),
            ..Default::default()
        }
    }

    // ── Factory validation ──

    #[tokio::test]
    async fn test_stdio_requires_command() {
        let cfg = stdio_config("");
        let err = create_transport(&cfg).await.unwrap_err();
        assert!(err.to_string().contains("requires 'command'"));
    }

    #[tokio::test]
    async fn test_sse_requires_url() {
        let cfg = McpServerConfig {
            name: "test".to_string(),
            transport: "sse".to_string(),
            ..Default::default()
        };
        let err = create_transport(&cfg).await.unwrap_err();
        assert!(err.to_string().contains("requires 'url'"));
    }

    #[tokio::test]
    async fn test_streamable_requires_url() {
        let cfg = McpServerConfig {
            name: "test".to_string(),
            transport: "streamable".to_string(),
            ..Default::default()
        };
        let err = create_transport(&cfg).await.unwrap_err();
        assert!(err.to_string().contains("requires 'url'"));
    }

    #[tokio::test]
    async fn test_unknown_transport_rejected() {
        let cfg = McpServerConfig {
            name: "test".to_string(),
            transport: "websocket".to_string(),
            ..Default::default()
        };
        let err = create_transport(&cfg).await.unwrap_err();
        assert!(err.to_string().contains("unknown transport type"));
    }

    #[tokio::test]
    async fn test_empty_transport_defaults_to_stdio() {
        let mut cfg = stdio_config("");
        cfg.transport = String::new();
        let err = create_transport(&cfg).await.unwrap_err();
        assert!(err.to_string().contains("requires 'command'"));
    }

    // ── JSON-RPC framing ──

    #[test]
    fn test_request_line_shape() {
        let line = encode_line(Some(7), "tools/list", None).unwrap();
        let parsed: Value = serde_json::from_str(&line).unwrap();
        assert_eq!(parsed["jsonrpc"], "2.0");
        assert_eq!(parsed["id"], 7);
        assert_eq!(parsed["method"], "tools/list");
        assert!(parsed.get("params").is_none());
    }

    #[test]
    fn test_notification_omits_id() {
        let line = encode_line(None, "notifications/initialized", None).unwrap();
        let parsed: Value = serde_json::from_str(&line).unwrap();
        assert!(parsed.get("id").is_none());
    }

    #[test]
    fn test_error_response_surfaces() {
        let response: JsonRpcResponse = serde_json::from_value(json!({
            "jsonrpc": "2.0", "id": 1,
            "error": {"code": -32601, "message": "method not found"}
        }))
        .unwrap();
        let err = response.into_result().unwrap_err();
        assert!(err.to_string().contains("method not found"));
    }

    // ── SSE framing ──

    #[test]
    fn test_sse_parser_single_event() {
        let mut parser = SseParser::new();
        let events = parser.feed("event: endpoint\ndata: /messages?session=1\n\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event, "endpoint");
        assert_eq!(events[0].data, "/messages?session=1");
    }

    #[test]
    fn test_sse_parser_split_across_chunks() {
        let mut parser = SseParser::new();
        assert!(parser.feed("event: mess").is_empty());
        assert!(parser.feed("age\ndata: {\"id\":1}").is_empty());
        let events = parser.feed("\n\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event, "message");
        assert_eq!(events[0].data, "{\"id\":1}");
    }

    #[test]
    fn test_sse_parser_multiline_data_and_default_event() {
        let mut parser = SseParser::new();
        let events = parser.feed("data: line1\ndata: line2\n\n: comment\n\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event, "");
        assert_eq!(events[0].data, "line1\nline2");
    }

    #[test]
    fn test_endpoint_resolution() {
        let base = reqwest::Url::parse("http://localhost:8931/sse").unwrap();
        assert_eq!(
            resolve_endpoint(&base, "/messages?sessionId=abc"),
            "http://localhost:8931/messages?sessionId=abc"
        );
        assert_eq!(
            resolve_endpoint(&base, "http://other:9000/rpc"),
            "http://other:9000/rpc"
        );
    }

    // ── Stdio round trip ──

    #[tokio::test]
    async fn test_stdio_request_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("server.sh");
        std::fs::write(
            &script,
            r#"#!/bin/sh
while IFS= read -r line; do
  case "$line" in
    *'"method":"ping"'*) printf '%s\n' '{"jsonrpc":"2.0","id":1,"result":{"ok":true}}' ;;
  esac
done
"#,
        )
        .unwrap();

        let transport = StdioTransport::spawn(
            "/bin/sh",
            &[script.to_string_lossy().into_owned()],
            &HashMap::new(),
        )
        .unwrap();

        let result = transport.request("ping", None).await.unwrap();
        assert_eq!(result["ok"], true);
        transport.close().await.unwrap();
    }
}
