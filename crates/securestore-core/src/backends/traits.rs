//! Core traits and types for secret storage backends

use thiserror::Error;

use crate::query::AttributeSet;

/// Coarse classification of a [`StoreError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    AccessDenied,
    EncodingFailure,
    BackendUnavailable,
    Unexpected,
}

/// Errors that can occur during secret store operations
///
/// "Not found" is never an error: lookups return `Ok(None)` and deletes of
/// missing entries succeed.
///
/// Messages never contain secret values.
#[derive(Error, Debug)]
pub enum StoreError {
    /// The backend refused the operation (permissions, lock state, bad passphrase)
    #[error("Access denied: {0}")]
    AccessDenied(String),

    /// Secret bytes could not be converted to or from the backend representation
    #[error("Encoding failure: {0}")]
    EncodingFailure(String),

    /// The storage medium could not be reached
    #[error("Backend unavailable: {0}")]
    BackendUnavailable(String),

    /// Backend failure not otherwise classified
    #[error("Unexpected backend error{}: {message}", .code.map(|c| format!(" ({})", c)).unwrap_or_default())]
    Unexpected { code: Option<i64>, message: String },
}

impl StoreError {
    pub fn access_denied(message: impl Into<String>) -> Self {
        Self::AccessDenied(message.into())
    }

    pub fn encoding(message: impl Into<String>) -> Self {
        Self::EncodingFailure(message.into())
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::BackendUnavailable(message.into())
    }

    /// Create an unexpected error carrying a native code
    pub fn unexpected(code: Option<i64>, message: impl Into<String>) -> Self {
        Self::Unexpected {
            code,
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            StoreError::AccessDenied(_) => ErrorKind::AccessDenied,
            StoreError::EncodingFailure(_) => ErrorKind::EncodingFailure,
            StoreError::BackendUnavailable(_) => ErrorKind::BackendUnavailable,
            StoreError::Unexpected { .. } => ErrorKind::Unexpected,
        }
    }

    /// Native backend code, when the backend reported one
    pub fn code(&self) -> Option<i64> {
        match self {
            StoreError::Unexpected { code, .. } => *code,
            _ => None,
        }
    }
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        use std::io::ErrorKind as Io;
        match err.kind() {
            Io::PermissionDenied => StoreError::AccessDenied(err.to_string()),
            Io::InvalidData | Io::UnexpectedEof => StoreError::EncodingFailure(err.to_string()),
            Io::NotFound | Io::TimedOut | Io::WouldBlock | Io::ConnectionRefused
            | Io::ConnectionReset | Io::BrokenPipe => StoreError::BackendUnavailable(err.to_string()),
            _ => StoreError::Unexpected {
                code: err.raw_os_error().map(i64::from),
                message: err.to_string(),
            },
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Trait for secret storage backends
///
/// A backend is the only component that touches the storage medium. Every
/// call receives the scope produced by a
/// [`QueryDescriptor`](crate::query::QueryDescriptor); entries are keyed by
/// `(scope.scope_key(), account)` and scopes never observe each other.
///
/// Implementations:
/// - In-memory for testing (`MemoryBackend`)
/// - OS keychain (`KeychainBackend`)
/// - Encrypted file (`FileBackend`)
/// - Remote secret manager over JSON-RPC (`RpcBackend`)
///
/// # Example
///
/// ```
/// use securestore_core::backends::{BackendAdapter, MemoryBackend};
/// use securestore_core::query::QueryDescriptor;
///
/// let backend = MemoryBackend::new();
/// let scope = QueryDescriptor::generic("someService").attributes_for_query(None);
///
/// backend.insert_or_update(&scope, "alice", b"pwd").unwrap();
/// assert_eq!(backend.find(&scope, "alice").unwrap(), Some(b"pwd".to_vec()));
/// ```
pub trait BackendAdapter: Send + Sync {
    /// Human-readable name of this backend
    fn name(&self) -> &str;

    /// Check if this backend is reachable
    ///
    /// For example, a keychain backend might not be available on a headless server.
    fn is_available(&self) -> bool {
        true
    }

    /// Retrieve the secret stored for `account` in `scope`
    ///
    /// Returns `Ok(None)` if no entry exists.
    fn find(&self, scope: &AttributeSet, account: &str) -> StoreResult<Option<Vec<u8>>>;

    /// Store a secret, replacing any previous value for the same account
    ///
    /// Concurrent calls for the same `(scope, account)` must behave as if
    /// applied in some serial order.
    fn insert_or_update(&self, scope: &AttributeSet, account: &str, secret: &[u8]) -> StoreResult<()>;

    /// Delete one entry
    ///
    /// Deleting a missing entry succeeds.
    fn delete(&self, scope: &AttributeSet, account: &str) -> StoreResult<()>;

    /// Delete every entry of `scope`, leaving other scopes untouched
    fn delete_all(&self, scope: &AttributeSet) -> StoreResult<()>;

    /// List the accounts stored in `scope`, sorted
    fn accounts(&self, scope: &AttributeSet) -> StoreResult<Vec<String>>;

    /// Check if an entry exists
    fn contains(&self, scope: &AttributeSet, account: &str) -> StoreResult<bool> {
        Ok(self.find(scope, account)?.is_some())
    }
}
