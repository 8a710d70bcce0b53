//! The secure store façade

use std::sync::Arc;

use crate::backends::{BackendAdapter, StoreError, StoreResult};
use crate::logging::{NoOpLogger, SharedLogger};
use crate::query::{AttributeSet, QueryDescriptor};
use crate::{log_debug, log_error};

/// String-oriented secret storage bound to one descriptor and one backend
///
/// Every operation is a direct round-trip to the backend scoped by the
/// descriptor; nothing is cached or buffered. Secrets are stored as UTF-8.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use securestore_core::backends::MemoryBackend;
/// use securestore_core::query::QueryDescriptor;
/// use securestore_core::store::SecureStore;
///
/// let store = SecureStore::new(
///     QueryDescriptor::generic("someService"),
///     Arc::new(MemoryBackend::new()),
/// );
///
/// store.set_value("pwd_1234", "genericPassword").unwrap();
/// assert_eq!(store.get_value("genericPassword").unwrap(), Some("pwd_1234".to_string()));
///
/// store.remove_value("genericPassword").unwrap();
/// assert_eq!(store.get_value("genericPassword").unwrap(), None);
/// ```
pub struct SecureStore {
    descriptor: QueryDescriptor,
    backend: Arc<dyn BackendAdapter>,
    logger: SharedLogger,
}

impl SecureStore {
    /// Bind a descriptor to a backend
    pub fn new(descriptor: QueryDescriptor, backend: Arc<dyn BackendAdapter>) -> Self {
        Self::with_logger(descriptor, backend, Arc::new(NoOpLogger::new()))
    }

    /// Bind a descriptor to a backend, logging operations to `logger`
    pub fn with_logger(
        descriptor: QueryDescriptor,
        backend: Arc<dyn BackendAdapter>,
        logger: SharedLogger,
    ) -> Self {
        Self {
            descriptor,
            backend,
            logger,
        }
    }

    pub fn descriptor(&self) -> &QueryDescriptor {
        &self.descriptor
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    fn scope(&self) -> AttributeSet {
        self.descriptor.attributes_for_query(None)
    }

    /// Store `secret` for `account`, replacing any previous value
    pub fn set_value(&self, secret: &str, account: &str) -> StoreResult<()> {
        self.set_bytes(secret.as_bytes(), account)
    }

    /// Store raw secret bytes for `account`
    pub fn set_bytes(&self, secret: &[u8], account: &str) -> StoreResult<()> {
        log_debug!(self.logger, "set {} in {} ({} bytes)", account, self.descriptor, secret.len());
        self.backend
            .insert_or_update(&self.scope(), account, secret)
            .map_err(|e| self.report("set", account, e))
    }

    /// Fetch the secret stored for `account`
    ///
    /// Returns `Ok(None)` if nothing is stored. Stored bytes that are not
    /// valid UTF-8 are reported as `EncodingFailure`.
    pub fn get_value(&self, account: &str) -> StoreResult<Option<String>> {
        match self.get_bytes(account)? {
            Some(bytes) => String::from_utf8(bytes)
                .map(Some)
                .map_err(|_| self.report("get", account, StoreError::encoding("stored secret is not valid UTF-8"))),
            None => Ok(None),
        }
    }

    /// Fetch the raw secret bytes stored for `account`
    pub fn get_bytes(&self, account: &str) -> StoreResult<Option<Vec<u8>>> {
        log_debug!(self.logger, "get {} in {}", account, self.descriptor);
        self.backend
            .find(&self.scope(), account)
            .map_err(|e| self.report("get", account, e))
    }

    /// Check if a secret is stored for `account`
    pub fn contains_value(&self, account: &str) -> StoreResult<bool> {
        Ok(self.get_bytes(account)?.is_some())
    }

    /// Remove the secret stored for `account`; a missing account is not an error
    pub fn remove_value(&self, account: &str) -> StoreResult<()> {
        log_debug!(self.logger, "remove {} in {}", account, self.descriptor);
        self.backend
            .delete(&self.scope(), account)
            .map_err(|e| self.report("remove", account, e))
    }

    /// Remove every secret under this store's descriptor
    ///
    /// Entries stored under other descriptors are left untouched, even on a
    /// shared backend.
    pub fn remove_all_values(&self) -> StoreResult<()> {
        log_debug!(self.logger, "remove all in {}", self.descriptor);
        self.backend
            .delete_all(&self.scope())
            .map_err(|e| self.report("remove all", "*", e))
    }

    /// Accounts with a stored secret, sorted
    pub fn accounts(&self) -> StoreResult<Vec<String>> {
        self.backend
            .accounts(&self.scope())
            .map_err(|e| self.report("list", "*", e))
    }

    fn report(&self, operation: &str, account: &str, err: StoreError) -> StoreError {
        log_error!(
            self.logger,
            "{} {} in {} failed on {}: {}",
            operation,
            account,
            self.descriptor,
            self.backend.name(),
            err
        );
        err
    }
}

impl std::fmt::Debug for SecureStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecureStore")
            .field("descriptor", &self.descriptor)
            .field("backend", &self.backend.name())
            .finish()
    }
}
