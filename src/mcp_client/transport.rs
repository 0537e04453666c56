//! JSON-RPC over stdio transport.
//!
//! Handles low-level communication with tool server child processes:
//! - Writing JSON-RPC requests to stdin
//! - Reading JSON-RPC responses from stdout
//! - Line-delimited JSON protocol (one JSON object per line)
//!
//! One request is in flight at a time per transport; concurrent callers
//! queue on the exchange lock. Requests the server sends while a response is
//! pending are answered inline, by the request handler when one is set and
//! with `-32601` otherwise.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;

use super::errors::McpError;
use super::session::ServerRequestHandler;
use super::types::{
    error_codes, IncomingMessage, JsonRpcError, JsonRpcRequest, JsonRpcResponse,
    OutgoingResponse,
};

// ─── Request ID Generator ────────────────────────────────────────────────────

/// Global monotonic request ID counter.
static NEXT_REQUEST_ID: AtomicU64 = AtomicU64::new(1);

/// Generate a unique request ID.
pub fn next_request_id() -> u64 {
    NEXT_REQUEST_ID.fetch_add(1, Ordering::Relaxed)
}

// ─── Transport ───────────────────────────────────────────────────────────────

type Writer = Box<dyn AsyncWrite + Send + Unpin>;
type Reader = Box<dyn AsyncBufRead + Send + Unpin>;

/// Bi-directional JSON-RPC transport over a pair of byte streams
/// (a child process's stdin/stdout in production).
pub struct StdioTransport {
    server_name: String,
    /// Held for a full request/response exchange.
    exchange: Mutex<()>,
    writer: Mutex<Option<Writer>>,
    reader: Mutex<Reader>,
    handler: Option<Arc<dyn ServerRequestHandler>>,
}

impl StdioTransport {
    /// Create a new transport from a writer (server stdin) and a buffered
    /// reader (server stdout).
    pub fn new<W, R>(server_name: &str, writer: W, reader: R) -> Self
    where
        W: AsyncWrite + Send + Unpin + 'static,
        R: AsyncBufRead + Send + Unpin + 'static,
    {
        Self {
            server_name: server_name.to_string(),
            exchange: Mutex::new(()),
            writer: Mutex::new(Some(Box::new(writer))),
            reader: Mutex::new(Box::new(reader)),
            handler: None,
        }
    }

    /// Answer server-initiated requests (e.g. sampling) with `handler`.
    pub fn with_request_handler(mut self, handler: Arc<dyn ServerRequestHandler>) -> Self {
        self.handler = Some(handler);
        self
    }

    /// Send a JSON-RPC request and wait for the matching response.
    ///
    /// Server-initiated requests are answered while waiting. Notifications,
    /// stale responses and non-JSON lines (server log output) are skipped.
    pub async fn request(
        &self,
        method: &str,
        params: Option<serde_json::Value>,
    ) -> Result<JsonRpcResponse, McpError> {
        let _exchange = self.exchange.lock().await;

        let id = next_request_id();
        let req = JsonRpcRequest::new(id, method, params);

        let json = serde_json::to_string(&req).map_err(|e| self.transport_error(format!(
            "failed to serialize request: {e}"
        )))?;
        self.write_line(json).await?;

        let mut line_buf = String::new();
        let mut reader = self.reader.lock().await;

        loop {
            line_buf.clear();
            let bytes_read = reader
                .read_line(&mut line_buf)
                .await
                .map_err(|e| self.transport_error(format!("failed to read from stdout: {e}")))?;

            if bytes_read == 0 {
                return Err(self.transport_error(
                    "server stdout closed (process may have exited)".into(),
                ));
            }

            let trimmed = line_buf.trim();
            if trimmed.is_empty() {
                continue;
            }

            let msg = match serde_json::from_str::<IncomingMessage>(trimmed) {
                Ok(msg) => msg,
                Err(_) => {
                    tracing::trace!(
                        server = %self.server_name,
                        line = %trimmed,
                        "skipping non-JSON-RPC stdout line"
                    );
                    continue;
                }
            };

            match (msg.id, msg.method) {
                (Some(request_id), Some(method)) => {
                    self.answer(request_id, &method, msg.params).await?;
                }
                (None, Some(method)) => {
                    tracing::debug!(server = %self.server_name, method = %method, "skipping notification");
                }
                (Some(response_id), None) if response_id.as_u64() == Some(id) => {
                    return Ok(JsonRpcResponse {
                        id,
                        result: msg.result,
                        error: msg.error,
                    });
                }
                (other, None) => {
                    tracing::debug!(
                        server = %self.server_name,
                        id = ?other,
                        "skipping unrelated JSON-RPC message"
                    );
                }
            }
        }
    }

    /// Reply to one server-initiated request.
    async fn answer(
        &self,
        request_id: serde_json::Value,
        method: &str,
        params: Option<serde_json::Value>,
    ) -> Result<(), McpError> {
        tracing::debug!(server = %self.server_name, method, "server request");
        let outcome = match &self.handler {
            Some(handler) => handler.handle(&self.server_name, method, params).await,
            None => Err(JsonRpcError::new(
                error_codes::METHOD_NOT_FOUND,
                format!("client does not handle '{method}'"),
            )),
        };
        if let Err(e) = &outcome {
            tracing::warn!(
                server = %self.server_name,
                method,
                code = e.code,
                error = %e.message,
                "server request refused"
            );
        }

        let reply = OutgoingResponse::new(request_id, outcome);
        let json = serde_json::to_string(&reply).map_err(|e| {
            self.transport_error(format!("failed to serialize reply: {e}"))
        })?;
        self.write_line(json).await
    }

    /// Send a JSON-RPC notification (no response expected).
    pub async fn notify(
        &self,
        method: &str,
        params: Option<serde_json::Value>,
    ) -> Result<(), McpError> {
        let mut notification = serde_json::json!({
            "jsonrpc": "2.0",
            "method": method,
        });
        if let Some(params) = params {
            notification["params"] = params;
        }

        let json = serde_json::to_string(&notification).map_err(|e| {
            self.transport_error(format!("failed to serialize notification: {e}"))
        })?;
        self.write_line(json).await
    }

    /// Close the write half, signalling EOF to the server.
    ///
    /// Subsequent requests fail with a transport error.
    pub async fn close(&self) {
        let mut writer = self.writer.lock().await;
        if let Some(mut w) = writer.take() {
            let _ = w.shutdown().await;
        }
    }

    async fn write_line(&self, mut json: String) -> Result<(), McpError> {
        json.push('\n');

        let mut guard = self.writer.lock().await;
        let writer = guard
            .as_mut()
            .ok_or_else(|| self.transport_error("transport is closed".into()))?;
        writer
            .write_all(json.as_bytes())
            .await
            .map_err(|e| self.transport_error(format!("failed to write to stdin: {e}")))?;
        writer
            .flush()
            .await
            .map_err(|e| self.transport_error(format!("failed to flush stdin: {e}")))
    }

    fn transport_error(&self, reason: String) -> McpError {
        McpError::TransportError {
            server: self.server_name.clone(),
            reason,
        }
    }
}

// ─── Response Helpers ────────────────────────────────────────────────────────

/// Extract the result from a JSON-RPC response, converting errors to `McpError`.
pub fn extract_result(response: JsonRpcResponse) -> Result<serde_json::Value, McpError> {
    if let Some(err) = response.error {
        return Err(McpError::ServerError {
            code: err.code,
            message: err.message,
            data: err.data,
        });
    }

    response.result.ok_or(McpError::ServerError {
        code: error_codes::INTERNAL_ERROR,
        message: "response missing both result and error".into(),
        data: None,
    })
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{duplex, AsyncBufReadExt, AsyncWriteExt, BufReader};

    /// Wire a transport to an in-memory peer. Returns the transport plus the
    /// peer's reader (what the client wrote) and writer (what the client reads).
    fn in_memory_transport() -> (
        StdioTransport,
        BufReader<tokio::io::DuplexStream>,
        tokio::io::DuplexStream,
    ) {
        let (client_out, server_in) = duplex(64 * 1024);
        let (server_out, client_in) = duplex(64 * 1024);
        let transport = StdioTransport::new("test", client_out, BufReader::new(client_in));
        (transport, BufReader::new(server_in), server_out)
    }

    #[test]
    fn test_next_request_id_is_monotonic() {
        let id1 = next_request_id();
        let id2 = next_request_id();
        assert!(id2 > id1);
    }

    #[tokio::test]
    async fn test_request_skips_noise_and_matches_id() {
        let (transport, mut peer_in, mut peer_out) = in_memory_transport();

        let peer = tokio::spawn(async move {
            let mut line = String::new();
            peer_in.read_line(&mut line).await.unwrap();
            let req: serde_json::Value = serde_json::from_str(&line).unwrap();
            assert_eq!(req["method"], "tools/list");
            let id = req["id"].as_u64().unwrap();

            let noise = format!(
                "server booting...\n\
                 {{\"jsonrpc\":\"2.0\",\"method\":\"notifications/message\",\"params\":{{}}}}\n\
                 {{\"jsonrpc\":\"2.0\",\"id\":{},\"result\":{{\"stale\":true}}}}\n\
                 {{\"jsonrpc\":\"2.0\",\"id\":{id},\"result\":{{\"tools\":[]}}}}\n",
                id + 1000
            );
            peer_out.write_all(noise.as_bytes()).await.unwrap();
            peer_out.flush().await.unwrap();
        });

        let resp = transport.request("tools/list", None).await.unwrap();
        let result = extract_result(resp).unwrap();
        assert_eq!(result, serde_json::json!({"tools": []}));
        peer.await.unwrap();
    }

    #[tokio::test]
    async fn test_request_fails_when_stdout_closes() {
        let (transport, _peer_in, peer_out) = in_memory_transport();
        drop(peer_out);

        let err = transport.request("initialize", None).await.unwrap_err();
        assert!(matches!(err, McpError::TransportError { .. }));
    }

    #[tokio::test]
    async fn test_notify_omits_id() {
        let (transport, mut peer_in, _peer_out) = in_memory_transport();
        transport
            .notify("notifications/initialized", None)
            .await
            .unwrap();

        let mut line = String::new();
        peer_in.read_line(&mut line).await.unwrap();
        let msg: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert_eq!(msg["method"], "notifications/initialized");
        assert!(msg.get("id").is_none());
        assert!(msg.get("params").is_none());
    }

    #[tokio::test]
    async fn test_request_after_close_fails() {
        let (transport, _peer_in, _peer_out) = in_memory_transport();
        transport.close().await;
        let err = transport.request("tools/list", None).await.unwrap_err();
        match err {
            McpError::TransportError { reason, .. } => assert!(reason.contains("closed")),
            other => panic!("expected TransportError, got {other:?}"),
        }
    }

    #[test]
    fn test_extract_result_error() {
        let resp = JsonRpcResponse {
            id: 1,
            result: None,
            error: Some(JsonRpcError {
                code: -32601,
                message: "Method not found".into(),
                data: None,
            }),
        };
        let err = extract_result(resp).unwrap_err();
        assert!(err.is_method_not_found());
    }

    #[test]
    fn test_extract_result_missing_both() {
        let resp = JsonRpcResponse {
            id: 1,
            result: None,
            error: None,
        };
        let err = extract_result(resp).unwrap_err();
        assert!(matches!(err, McpError::ServerError { .. }));
    }

    /// Server side of one exchange that interrupts itself with a sampling
    /// request. Returns the client's reply to that request.
    async fn serve_with_sampling(
        mut peer_in: BufReader<tokio::io::DuplexStream>,
        mut peer_out: tokio::io::DuplexStream,
    ) -> serde_json::Value {
        let mut line = String::new();
        peer_in.read_line(&mut line).await.unwrap();
        let req: serde_json::Value = serde_json::from_str(&line).unwrap();
        let id = req["id"].as_u64().unwrap();

        let sampling = serde_json::json!({
            "jsonrpc": "2.0",
            "id": "s1",
            "method": "sampling/createMessage",
            "params": {"messages": [], "maxTokens": 10}
        });
        peer_out
            .write_all(format!("{sampling}\n").as_bytes())
            .await
            .unwrap();

        line.clear();
        peer_in.read_line(&mut line).await.unwrap();
        let reply: serde_json::Value = serde_json::from_str(&line).unwrap();

        let done = format!("{{\"jsonrpc\":\"2.0\",\"id\":{id},\"result\":{{\"ok\":true}}}}\n");
        peer_out.write_all(done.as_bytes()).await.unwrap();
        reply
    }

    #[tokio::test]
    async fn test_server_request_without_handler_gets_method_not_found() {
        let (transport, peer_in, peer_out) = in_memory_transport();
        let peer = tokio::spawn(serve_with_sampling(peer_in, peer_out));

        let resp = transport.request("tools/call", None).await.unwrap();
        assert_eq!(extract_result(resp).unwrap(), serde_json::json!({"ok": true}));

        let reply = peer.await.unwrap();
        assert_eq!(reply["id"], "s1");
        assert_eq!(reply["error"]["code"], error_codes::METHOD_NOT_FOUND);
    }

    struct Echo;

    #[async_trait::async_trait]
    impl ServerRequestHandler for Echo {
        async fn handle(
            &self,
            server: &str,
            method: &str,
            _params: Option<serde_json::Value>,
        ) -> Result<serde_json::Value, JsonRpcError> {
            Ok(serde_json::json!({ "server": server, "method": method }))
        }
    }

    #[tokio::test]
    async fn test_server_request_answered_by_handler() {
        let (client_out, server_in) = duplex(64 * 1024);
        let (server_out, client_in) = duplex(64 * 1024);
        let transport = StdioTransport::new("test", client_out, BufReader::new(client_in))
            .with_request_handler(Arc::new(Echo));
        let peer = tokio::spawn(serve_with_sampling(BufReader::new(server_in), server_out));

        transport.request("tools/call", None).await.unwrap();

        let reply = peer.await.unwrap();
        assert_eq!(reply["id"], "s1");
        assert_eq!(reply["result"]["server"], "test");
        assert_eq!(reply["result"]["method"], "sampling/createMessage");
        assert!(reply.get("error").is_none());
    }
}
