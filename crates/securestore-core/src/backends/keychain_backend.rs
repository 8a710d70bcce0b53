//! System keychain backend
//!
//! Uses the OS keychain for secure secret storage:
//! - macOS: Keychain
//! - Windows: Credential Manager
//! - Linux: Secret Service (GNOME Keyring, KWallet)

use std::collections::BTreeSet;

use keyring::Entry;
use parking_lot::Mutex;

use super::traits::{BackendAdapter, StoreError, StoreResult};
use crate::logging::file_logger as log;
use crate::query::AttributeSet;

const INDEX_USER: &str = "accounts";

/// Raw keychain access, one credential per (service, user)
trait Credentials: Send + Sync {
    fn get(&self, service: &str, user: &str) -> keyring::Result<Vec<u8>>;
    fn set(&self, service: &str, user: &str, secret: &[u8]) -> keyring::Result<()>;
    fn delete(&self, service: &str, user: &str) -> keyring::Result<()>;
}

/// The platform credential store
struct OsCredentials;

impl Credentials for OsCredentials {
    fn get(&self, service: &str, user: &str) -> keyring::Result<Vec<u8>> {
        Entry::new(service, user)?.get_secret()
    }

    fn set(&self, service: &str, user: &str, secret: &[u8]) -> keyring::Result<()> {
        Entry::new(service, user)?.set_secret(secret)
    }

    fn delete(&self, service: &str, user: &str) -> keyring::Result<()> {
        Entry::new(service, user)?.delete_credential()
    }
}

/// Backend storing secrets in the system keychain
///
/// Each scope maps to its own keychain service, `<prefix>:<scope key>`, and
/// each account to a user within that service. Keychain APIs cannot
/// enumerate entries, so the backend also keeps a per-scope index of account
/// names under the service `<prefix>-index:<scope key>`. The index is only
/// touched while holding a process-wide lock.
///
/// A new account is added to the index before its secret is written, and
/// taken out again if the secret write fails. An account with a secret is
/// therefore always listed, so `delete_all` never leaves a secret behind.
///
/// # Example
///
/// ```no_run
/// use securestore_core::backends::{BackendAdapter, KeychainBackend};
/// use securestore_core::query::QueryDescriptor;
///
/// let backend = KeychainBackend::new();
/// let scope = QueryDescriptor::generic("someService").attributes_for_query(None);
///
/// backend.insert_or_update(&scope, "genericPassword", b"pwd_1234").unwrap();
/// assert!(backend.find(&scope, "genericPassword").unwrap().is_some());
/// ```
pub struct KeychainBackend {
    service_prefix: String,
    index_lock: Mutex<()>,
    credentials: Box<dyn Credentials>,
}

impl KeychainBackend {
    /// Create a keychain backend with the default service prefix "securestore"
    pub fn new() -> Self {
        Self::with_prefix("securestore")
    }

    /// Create a keychain backend with a custom service prefix
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self::with_credentials(prefix, Box::new(OsCredentials))
    }

    fn with_credentials(prefix: impl Into<String>, credentials: Box<dyn Credentials>) -> Self {
        Self {
            service_prefix: prefix.into(),
            index_lock: Mutex::new(()),
            credentials,
        }
    }

    pub fn service_prefix(&self) -> &str {
        &self.service_prefix
    }

    fn service_for(&self, scope: &AttributeSet) -> String {
        format!("{}:{}", self.service_prefix, scope.scope_key())
    }

    fn index_service_for(&self, scope: &AttributeSet) -> String {
        format!("{}-index:{}", self.service_prefix, scope.scope_key())
    }

    fn delete_secret(&self, scope: &AttributeSet, account: &str) -> StoreResult<()> {
        match self.credentials.delete(&self.service_for(scope), account) {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(map_keyring_error(e)),
        }
    }

    fn read_index(&self, scope: &AttributeSet) -> StoreResult<BTreeSet<String>> {
        match self.credentials.get(&self.index_service_for(scope), INDEX_USER) {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .map_err(|e| StoreError::encoding(format!("Corrupt keychain account index: {}", e))),
            Err(keyring::Error::NoEntry) => Ok(BTreeSet::new()),
            Err(e) => Err(map_keyring_error(e)),
        }
    }

    fn write_index(&self, scope: &AttributeSet, accounts: &BTreeSet<String>) -> StoreResult<()> {
        let service = self.index_service_for(scope);
        if accounts.is_empty() {
            return match self.credentials.delete(&service, INDEX_USER) {
                Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
                Err(e) => Err(map_keyring_error(e)),
            };
        }
        let bytes = serde_json::to_vec(accounts)
            .map_err(|e| StoreError::encoding(format!("Failed to encode account index: {}", e)))?;
        self.credentials.set(&service, INDEX_USER, &bytes).map_err(map_keyring_error)
    }
}

impl Default for KeychainBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for KeychainBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeychainBackend")
            .field("service_prefix", &self.service_prefix)
            .finish()
    }
}

impl BackendAdapter for KeychainBackend {
    fn name(&self) -> &str {
        "keychain"
    }

    fn is_available(&self) -> bool {
        // Creating an entry fails on headless servers without a keychain daemon
        match Entry::new(&self.service_prefix, "__securestore_availability_check__") {
            Ok(_) => true,
            Err(e) => {
                log::warn("KeychainBackend", &format!("is_available() = false, error: {}", map_keyring_error(e)));
                false
            }
        }
    }

    fn find(&self, scope: &AttributeSet, account: &str) -> StoreResult<Option<Vec<u8>>> {
        log::debug("KeychainBackend", &format!("find() account='{}', scope='{}'", account, scope.scope_key()));
        match self.credentials.get(&self.service_for(scope), account) {
            Ok(secret) => Ok(Some(secret)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => {
                let err = map_keyring_error(e);
                log::warn("KeychainBackend", &format!("find() error: {}", err));
                Err(err)
            }
        }
    }

    fn insert_or_update(&self, scope: &AttributeSet, account: &str, secret: &[u8]) -> StoreResult<()> {
        log::info("KeychainBackend", &format!("insert_or_update() account='{}', scope='{}'", account, scope.scope_key()));
        let _guard = self.index_lock.lock();

        let mut index = self.read_index(scope)?;
        let added = index.insert(account.to_string());
        if added {
            self.write_index(scope, &index)?;
        }

        if let Err(e) = self.credentials.set(&self.service_for(scope), account, secret) {
            let err = map_keyring_error(e);
            log::error("KeychainBackend", &format!("set_secret FAILED: {}", err));
            if added {
                index.remove(account);
                if let Err(rollback) = self.write_index(scope, &index) {
                    log::warn("KeychainBackend", &format!("index rollback failed: {}", rollback));
                }
            }
            return Err(err);
        }
        Ok(())
    }

    fn delete(&self, scope: &AttributeSet, account: &str) -> StoreResult<()> {
        let _guard = self.index_lock.lock();
        self.delete_secret(scope, account)?;

        let mut index = self.read_index(scope)?;
        if index.remove(account) {
            self.write_index(scope, &index)?;
        }
        Ok(())
    }

    fn delete_all(&self, scope: &AttributeSet) -> StoreResult<()> {
        log::info("KeychainBackend", &format!("delete_all() scope='{}'", scope.scope_key()));
        let _guard = self.index_lock.lock();

        let index = self.read_index(scope)?;
        for account in &index {
            self.delete_secret(scope, account)?;
        }
        self.write_index(scope, &BTreeSet::new())
    }

    fn accounts(&self, scope: &AttributeSet) -> StoreResult<Vec<String>> {
        let _guard = self.index_lock.lock();
        Ok(self.read_index(scope)?.into_iter().collect())
    }
}

/// Classify a keyring failure
///
/// `BadEncoding` carries the raw stored bytes, which are never copied into
/// the error message.
fn map_keyring_error(err: keyring::Error) -> StoreError {
    match err {
        keyring::Error::NoStorageAccess(inner) => StoreError::access_denied(inner.to_string()),
        keyring::Error::BadEncoding(_) => {
            StoreError::encoding("keychain entry is not in the expected encoding")
        }
        keyring::Error::PlatformFailure(inner) => StoreError::unavailable(inner.to_string()),
        other => StoreError::unexpected(None, other.to_string()),
    }
}
