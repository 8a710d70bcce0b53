//! RPC-backed secret storage
//!
//! Implements the BackendAdapter trait by making JSON-RPC calls to an
//! external secret manager. Scopes travel as their attribute maps plus the
//! canonical scope key; secret bytes travel base64-encoded.

use std::collections::BTreeMap;
use std::time::Duration;

use base64::engine::general_purpose::STANDARD as B64;
use base64::Engine as _;
use serde::{Deserialize, Serialize};

use super::client::{RpcClient, RpcError};
use crate::backends::{BackendAdapter, StoreError, StoreResult};
use crate::logging::file_logger as log;
use crate::query::AttributeSet;

/// Error codes a secret manager uses to classify failures
pub mod codes {
    pub const ACCESS_DENIED: i64 = -32001;
    pub const ENCODING_FAILURE: i64 = -32002;
    pub const BACKEND_UNAVAILABLE: i64 = -32003;
}

impl From<RpcError> for StoreError {
    fn from(err: RpcError) -> Self {
        match err {
            RpcError::ConnectionFailed(msg) => StoreError::unavailable(msg),
            RpcError::Timeout => StoreError::unavailable("secret manager timed out"),
            RpcError::Io(e) => StoreError::from(e),
            // A malformed reply is a protocol fault; secret decoding failures are
            // classified separately where the base64 is decoded
            RpcError::Json(e) => StoreError::unexpected(None, format!("malformed RPC payload: {}", e)),
            RpcError::InvalidResponse(msg) => StoreError::unexpected(None, msg),
            RpcError::RpcError { code, message } => match code {
                codes::ACCESS_DENIED => StoreError::access_denied(message),
                codes::ENCODING_FAILURE => StoreError::encoding(message),
                codes::BACKEND_UNAVAILABLE => StoreError::unavailable(message),
                _ => StoreError::unexpected(Some(code), message),
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScopeParams {
    pub class: String,
    pub key: String,
    pub attributes: BTreeMap<String, String>,
}

impl From<&AttributeSet> for ScopeParams {
    fn from(scope: &AttributeSet) -> Self {
        let scope = scope.without_account();
        Self {
            class: scope.item_class().as_str().to_string(),
            key: scope.scope_key(),
            attributes: scope
                .iter()
                .map(|(k, v)| (k.as_str().to_string(), v.to_string()))
                .collect(),
        }
    }
}

#[derive(Serialize)]
struct AccountParams {
    scope: ScopeParams,
    account: String,
}

#[derive(Serialize)]
struct UpsertParams {
    scope: ScopeParams,
    account: String,
    secret: String,
}

#[derive(Serialize)]
struct ScopeOnlyParams {
    scope: ScopeParams,
}

#[derive(Deserialize)]
struct FindResult {
    secret: Option<String>,
}

#[derive(Deserialize)]
struct AckResult {
    success: bool,
}

#[derive(Deserialize)]
struct AccountsResult {
    accounts: Vec<String>,
}

/// Backend that delegates to a remote secret manager over JSON-RPC
///
/// Methods: `secrets/find`, `secrets/upsert`, `secrets/delete`,
/// `secrets/deleteAll`, `secrets/accounts`. The server is responsible for
/// serializing concurrent upserts.
pub struct RpcBackend {
    name: String,
    client: RpcClient,
}

impl RpcBackend {
    /// Create an RPC backend for a socket path and auth token
    pub fn new(name: impl Into<String>, socket_path: impl Into<String>, auth_token: impl Into<String>) -> Self {
        Self {
            name: format!("rpc:{}", name.into()),
            client: RpcClient::new(socket_path, auth_token),
        }
    }

    /// Set the per-request timeout; an expired timeout reports `BackendUnavailable`
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.client = self.client.with_timeout(timeout);
        self
    }

    pub fn socket_path(&self) -> &str {
        self.client.socket_path()
    }

    fn expect_success(&self, operation: &str, ack: AckResult) -> StoreResult<()> {
        if ack.success {
            Ok(())
        } else {
            log::warn("RpcBackend", &format!("{} reported failure", operation));
            Err(StoreError::unexpected(None, format!("{} operation failed", operation)))
        }
    }
}

impl std::fmt::Debug for RpcBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpcBackend")
            .field("name", &self.name)
            .field("socket_path", &self.client.socket_path())
            .finish()
    }
}

impl BackendAdapter for RpcBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_available(&self) -> bool {
        self.client.ping().unwrap_or(false)
    }

    fn find(&self, scope: &AttributeSet, account: &str) -> StoreResult<Option<Vec<u8>>> {
        let result: FindResult = self.client.call(
            "secrets/find",
            AccountParams {
                scope: scope.into(),
                account: account.to_string(),
            },
        )?;

        result
            .secret
            .map(|encoded| {
                B64.decode(encoded)
                    .map_err(|e| StoreError::encoding(format!("secret base64 decode error: {}", e)))
            })
            .transpose()
    }

    fn insert_or_update(&self, scope: &AttributeSet, account: &str, secret: &[u8]) -> StoreResult<()> {
        let ack: AckResult = self.client.call(
            "secrets/upsert",
            UpsertParams {
                scope: scope.into(),
                account: account.to_string(),
                secret: B64.encode(secret),
            },
        )?;
        self.expect_success("upsert", ack)
    }

    fn delete(&self, scope: &AttributeSet, account: &str) -> StoreResult<()> {
        let ack: AckResult = self.client.call(
            "secrets/delete",
            AccountParams {
                scope: scope.into(),
                account: account.to_string(),
            },
        )?;
        self.expect_success("delete", ack)
    }

    fn delete_all(&self, scope: &AttributeSet) -> StoreResult<()> {
        let ack: AckResult = self
            .client
            .call("secrets/deleteAll", ScopeOnlyParams { scope: scope.into() })?;
        self.expect_success("deleteAll", ack)
    }

    fn accounts(&self, scope: &AttributeSet) -> StoreResult<Vec<String>> {
        let mut result: AccountsResult = self
            .client
            .call("secrets/accounts", ScopeOnlyParams { scope: scope.into() })?;
        result.accounts.sort();
        Ok(result.accounts)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::backends::ErrorKind;
    use crate::query::QueryDescriptor;
    use crate::rpc::client::{read_message, write_message};

    use std::collections::HashMap;
    use std::io::{BufReader, Write};
    use std::os::unix::net::{UnixListener, UnixStream};
    use std::path::PathBuf;
    use std::sync::{Arc, Mutex};
    use std::thread;

    use serde_json::{json, Value};
    use tempfile::TempDir;

    type Entries = Arc<Mutex<HashMap<(String, String), String>>>;

    /// Minimal secret manager serving one request per connection
    fn spawn_server(dir: &TempDir, locked: bool) -> PathBuf {
        let path = dir.path().join("secrets.sock");
        let listener = UnixListener::bind(&path).unwrap();
        let entries: Entries = Arc::new(Mutex::new(HashMap::new()));

        thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(stream) = stream else { break };
                handle(stream, &entries, locked);
            }
        });

        path
    }

    fn handle(stream: UnixStream, entries: &Entries, locked: bool) {
        let mut reader = BufReader::new(stream.try_clone().unwrap());
        let request = read_message(&mut reader).unwrap();
        let id = request["id"].clone();
        let params = &request["params"];
        let method = request["method"].as_str().unwrap_or_default();

        let response = if locked && method != "lifecycle/ping" {
            json!({ "jsonrpc": "2.0", "id": id, "error": { "code": codes::ACCESS_DENIED, "message": "vault locked" } })
        } else {
            let result = dispatch(method, params, entries);
            json!({ "jsonrpc": "2.0", "id": id, "result": result })
        };

        let mut stream = stream;
        write_message(&mut stream, &response).unwrap();
    }

    fn dispatch(method: &str, params: &Value, entries: &Entries) -> Value {
        let mut entries = entries.lock().unwrap();
        let scope = params["scope"]["key"].as_str().unwrap_or_default().to_string();
        let account = params["account"].as_str().unwrap_or_default().to_string();

        match method {
            "lifecycle/ping" => json!({ "ok": true }),
            "secrets/find" => json!({ "secret": entries.get(&(scope, account)) }),
            "secrets/upsert" => {
                let secret = params["secret"].as_str().unwrap_or_default().to_string();
                entries.insert((scope, account), secret);
                json!({ "success": true })
            }
            "secrets/delete" => {
                entries.remove(&(scope, account));
                json!({ "success": true })
            }
            "secrets/deleteAll" => {
                entries.retain(|(s, _), _| *s != scope);
                json!({ "success": true })
            }
            "secrets/accounts" => {
                let accounts: Vec<String> = entries
                    .keys()
                    .filter(|(s, _)| *s == scope)
                    .map(|(_, a)| a.clone())
                    .collect();
                json!({ "accounts": accounts })
            }
            _ => Value::Null,
        }
    }

    /// Server answering every request with the same raw bytes
    fn spawn_canned_server(dir: &TempDir, reply: Vec<u8>) -> PathBuf {
        let path = dir.path().join("canned.sock");
        let listener = UnixListener::bind(&path).unwrap();

        thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(mut stream) = stream else { break };
                let mut reader = BufReader::new(stream.try_clone().unwrap());
                if read_message(&mut reader).is_ok() {
                    let _ = stream.write_all(&reply);
                }
            }
        });

        path
    }

    fn framed(body: &str) -> Vec<u8> {
        format!("Content-Length: {}\r\n\r\n{}", body.len(), body).into_bytes()
    }

    fn scope(service: &str) -> AttributeSet {
        QueryDescriptor::generic(service).attributes_for_query(None)
    }

    #[test]
    fn test_rpc_backend_name() {
        let backend = RpcBackend::new("vault", "/tmp/test.sock", "token");
        assert_eq!(backend.name(), "rpc:vault");
    }

    #[test]
    fn test_scope_params_drop_account() {
        let params = ScopeParams::from(&scope("svc").with_account("user"));
        assert_eq!(params.class, "genp");
        assert_eq!(params.key, "genp|service=svc");
        assert_eq!(params.attributes.get("service").map(String::as_str), Some("svc"));
        assert!(!params.attributes.contains_key("account"));
    }

    #[test]
    fn test_round_trip_over_socket() {
        let dir = TempDir::new().unwrap();
        let path = spawn_server(&dir, false);
        let backend = RpcBackend::new("test", path.to_string_lossy(), "token");
        let s = scope("svc");

        assert!(backend.is_available());
        assert_eq!(backend.find(&s, "user").unwrap(), None);

        backend.insert_or_update(&s, "user", b"pwd_1234").unwrap();
        backend.insert_or_update(&s, "user", b"pwd_1235").unwrap();
        backend.insert_or_update(&s, "admin", b"root").unwrap();
        backend.insert_or_update(&scope("other"), "user", b"keep").unwrap();

        assert_eq!(backend.find(&s, "user").unwrap(), Some(b"pwd_1235".to_vec()));
        assert_eq!(backend.accounts(&s).unwrap(), vec!["admin".to_string(), "user".to_string()]);

        backend.delete(&s, "user").unwrap();
        assert_eq!(backend.find(&s, "user").unwrap(), None);

        backend.delete_all(&s).unwrap();
        assert!(backend.accounts(&s).unwrap().is_empty());
        assert_eq!(backend.find(&scope("other"), "user").unwrap(), Some(b"keep".to_vec()));
    }

    #[test]
    fn test_rpc_error_codes_are_classified() {
        let dir = TempDir::new().unwrap();
        let path = spawn_server(&dir, true);
        let backend = RpcBackend::new("locked", path.to_string_lossy(), "token");

        let err = backend.find(&scope("svc"), "user").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AccessDenied);
    }

    #[test]
    fn test_missing_socket_is_unavailable() {
        let backend = RpcBackend::new("gone", "/nonexistent/securestore.sock", "token");
        assert!(!backend.is_available());

        let err = backend.find(&scope("svc"), "user").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BackendUnavailable);
    }

    #[test]
    fn test_timeout_is_unavailable() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("silent.sock");
        // Accepts connections but never answers
        let listener = UnixListener::bind(&path).unwrap();
        thread::spawn(move || {
            let mut held = Vec::new();
            for stream in listener.incoming().flatten() {
                held.push(stream);
            }
        });

        let backend = RpcBackend::new("silent", path.to_string_lossy(), "token")
            .with_timeout(Duration::from_millis(100));

        let err = backend.find(&scope("svc"), "user").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BackendUnavailable);
    }

    #[test]
    fn test_oversized_reply_is_an_error_not_a_crash() {
        let dir = TempDir::new().unwrap();
        let path = spawn_canned_server(&dir, b"Content-Length: 18446744073709551615\r\n\r\n{}".to_vec());
        let backend = RpcBackend::new("huge", path.to_string_lossy(), "token");

        let err = backend.find(&scope("svc"), "user").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unexpected);
    }

    #[test]
    fn test_wrong_result_shape_is_unexpected() {
        let dir = TempDir::new().unwrap();
        let path = spawn_canned_server(&dir, framed(r#"{"jsonrpc":"2.0","id":0,"result":{"secret":5}}"#));
        let backend = RpcBackend::new("shape", path.to_string_lossy(), "token");

        let err = backend.find(&scope("svc"), "user").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unexpected);
    }

    #[test]
    fn test_undecodable_secret_is_encoding_failure() {
        let dir = TempDir::new().unwrap();
        let path = spawn_canned_server(&dir, framed(r#"{"jsonrpc":"2.0","id":0,"result":{"secret":"***not base64***"}}"#));
        let backend = RpcBackend::new("garbled", path.to_string_lossy(), "token");

        let err = backend.find(&scope("svc"), "user").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::EncodingFailure);
    }

    #[test]
    fn test_json_errors_map_to_unexpected() {
        let json_err = serde_json::from_str::<Value>("{").unwrap_err();
        let err: StoreError = RpcError::Json(json_err).into();
        assert_eq!(err.kind(), ErrorKind::Unexpected);
    }

    #[test]
    fn test_unknown_code_keeps_native_code() {
        let err: StoreError = RpcError::RpcError {
            code: 42,
            message: "odd".to_string(),
        }
        .into();
        assert_eq!(err.kind(), ErrorKind::Unexpected);
        assert_eq!(err.code(), Some(42));
    }
}
