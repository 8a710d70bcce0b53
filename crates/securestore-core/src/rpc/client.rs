//! JSON-RPC client for communicating with remote secret managers
//!
//! Uses the LSP-style protocol with Content-Length headers over Unix sockets.
//! One connection is opened per request; the call blocks until the response
//! arrives or the configured timeout elapses.

use std::io::{BufRead, BufReader, Read, Write};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

#[cfg(unix)]
use std::os::unix::net::UnixStream;

use serde::{de::DeserializeOwned, Serialize};
use serde_json::{json, Value};
use thiserror::Error;

use crate::logging;

/// Default socket read/write timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(5000);

/// Largest message body accepted from a peer
///
/// Secrets and account lists are small; 4 MiB bounds the allocation a
/// misbehaving secret manager can force.
pub const MAX_MESSAGE_SIZE: usize = 4 * 1024 * 1024;

/// Errors that can occur during RPC operations
#[derive(Error, Debug)]
pub enum RpcError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("RPC error {code}: {message}")]
    RpcError { code: i64, message: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Timeout")]
    Timeout,
}

pub type RpcResult<T> = Result<T, RpcError>;

/// Blocking JSON-RPC client
pub struct RpcClient {
    socket_path: String,
    auth_token: String,
    timeout: Duration,
    request_id: AtomicU64,
}

impl RpcClient {
    /// Create a new RPC client
    pub fn new(socket_path: impl Into<String>, auth_token: impl Into<String>) -> Self {
        Self {
            socket_path: socket_path.into(),
            auth_token: auth_token.into(),
            timeout: DEFAULT_TIMEOUT,
            request_id: AtomicU64::new(0),
        }
    }

    /// Set the socket read/write timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn socket_path(&self) -> &str {
        &self.socket_path
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Make a JSON-RPC request
    ///
    /// The auth token is merged into `params`, which must serialize to an
    /// object or null.
    pub fn call<P: Serialize, R: DeserializeOwned>(&self, method: &str, params: P) -> RpcResult<R> {
        let id = self.request_id.fetch_add(1, Ordering::SeqCst);

        let params_with_auth = match serde_json::to_value(params)? {
            Value::Object(mut map) => {
                map.insert("auth".to_string(), json!(self.auth_token));
                Value::Object(map)
            }
            Value::Null => json!({ "auth": self.auth_token }),
            other => json!({ "auth": self.auth_token, "data": other }),
        };

        let request = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params_with_auth,
        });

        let response = self.send_request(&request)?;
        parse_response(response)
    }

    /// Check if the endpoint is reachable
    pub fn ping(&self) -> RpcResult<bool> {
        // Fast-fail: check if socket file exists first
        if !Path::new(&self.socket_path).exists() {
            return Err(RpcError::ConnectionFailed("Socket does not exist".to_string()));
        }

        #[derive(serde::Deserialize)]
        struct PingResult {
            ok: bool,
        }

        // Ping doesn't need auth for basic connectivity check
        let request = json!({
            "jsonrpc": "2.0",
            "id": 0,
            "method": "lifecycle/ping",
            "params": {}
        });

        let response = self.send_request(&request)?;
        let result: PingResult = parse_response(response)?;
        Ok(result.ok)
    }

    #[cfg(unix)]
    fn send_request(&self, request: &Value) -> RpcResult<Value> {
        logging::debug("rpc::client", &format!("Connecting to socket: {}", self.socket_path));

        let mut stream = UnixStream::connect(&self.socket_path).map_err(|e| {
            logging::error("rpc::client", &format!("Connection failed: {}", e));
            RpcError::ConnectionFailed(e.to_string())
        })?;

        stream.set_read_timeout(Some(self.timeout))?;
        stream.set_write_timeout(Some(self.timeout))?;

        // Log the method only; params carry the auth token and secrets
        let method = request.get("method").and_then(|m| m.as_str()).unwrap_or("unknown");
        logging::debug("rpc::client", &format!("Sending request: method={}", method));

        write_message(&mut stream, request).map_err(classify_io)?;

        let mut reader = BufReader::new(stream);
        let result = read_message(&mut reader).map_err(classify_io);

        match &result {
            Ok(_) => logging::debug("rpc::client", "Response received successfully"),
            Err(e) => logging::error("rpc::client", &format!("Response read failed: {}", e)),
        }

        result
    }

    #[cfg(not(unix))]
    fn send_request(&self, _request: &Value) -> RpcResult<Value> {
        Err(RpcError::ConnectionFailed(
            "Unix sockets are not supported on this platform".to_string(),
        ))
    }
}

/// Write one Content-Length framed JSON message
pub fn write_message<W: Write>(writer: &mut W, message: &Value) -> RpcResult<()> {
    let content = serde_json::to_string(message)?;
    let framed = format!("Content-Length: {}\r\n\r\n{}", content.len(), content);
    writer.write_all(framed.as_bytes())?;
    writer.flush()?;
    Ok(())
}

/// Read one Content-Length framed JSON message
pub fn read_message<R: BufRead>(reader: &mut R) -> RpcResult<Value> {
    // Read headers until we find Content-Length
    let mut content_length: Option<usize> = None;
    let mut line = String::new();

    loop {
        line.clear();
        let bytes_read = reader.read_line(&mut line)?;
        if bytes_read == 0 {
            return Err(RpcError::InvalidResponse("Connection closed".to_string()));
        }

        let line = line.trim();
        if line.is_empty() {
            // End of headers
            break;
        }

        if let Some(len_str) = line.strip_prefix("Content-Length:") {
            content_length = Some(
                len_str
                    .trim()
                    .parse()
                    .map_err(|_| RpcError::InvalidResponse("Invalid Content-Length".to_string()))?,
            );
        }
    }

    let length = content_length
        .ok_or_else(|| RpcError::InvalidResponse("Missing Content-Length header".to_string()))?;
    if length > MAX_MESSAGE_SIZE {
        return Err(RpcError::InvalidResponse(format!(
            "Content-Length {} exceeds limit of {} bytes",
            length, MAX_MESSAGE_SIZE
        )));
    }

    let mut content = vec![0u8; length];
    reader.read_exact(&mut content)?;

    Ok(serde_json::from_slice(&content)?)
}

fn parse_response<R: DeserializeOwned>(response: Value) -> RpcResult<R> {
    if let Some(error) = response.get("error") {
        let code = error.get("code").and_then(|c| c.as_i64()).unwrap_or(-1);
        let message = error
            .get("message")
            .and_then(|m| m.as_str())
            .unwrap_or("Unknown error")
            .to_string();
        return Err(RpcError::RpcError { code, message });
    }

    let result = response
        .get("result")
        .ok_or_else(|| RpcError::InvalidResponse("Missing result field".to_string()))?;

    serde_json::from_value(result.clone())
        .map_err(|e| RpcError::InvalidResponse(format!("Unexpected result shape: {}", e)))
}

/// Socket timeouts surface as `WouldBlock` or `TimedOut` depending on the platform
fn classify_io(err: RpcError) -> RpcError {
    match err {
        RpcError::Io(e)
            if matches!(e.kind(), std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut) =>
        {
            RpcError::Timeout
        }
        other => other,
    }
}
