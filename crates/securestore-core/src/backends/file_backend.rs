//! Encrypted file backend
//!
//! All scopes live in one JSON document. Each secret is sealed with
//! AES-256-GCM under a key derived from a passphrase with Argon2; the
//! document itself only holds scope keys, account names, nonces and
//! ciphertexts.
//!
//! # Security
//!
//! - File permissions are set to 0600 on Unix (owner read/write only)
//! - All writes are atomic (write to a uniquely named temp file, then rename)
//! - Every read-modify-write holds an OS lock on a sidecar `.lock` file, so
//!   handles in different threads or processes never lose each other's writes
//! - A sealed verifier detects a wrong passphrase when the file is opened
//! - Secrets are never logged or included in error messages

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;

use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use argon2::Argon2;
use base64::engine::general_purpose::STANDARD as B64;
use base64::Engine as _;
use fs2::FileExt;
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use zeroize::Zeroizing;

use super::traits::{BackendAdapter, StoreError, StoreResult};
use crate::logging::file_logger as log;
use crate::query::AttributeSet;

const DOCUMENT_VERSION: u32 = 1;
const SALT_LEN: usize = 16;
const NONCE_LEN: usize = 12;
const KEY_LEN: usize = 32;
const VERIFIER_PLAINTEXT: &[u8] = b"securestore-verifier";
const VERIFIER_AAD: &[u8] = b"verifier";

/// How long an operation waits for another writer before giving up
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(10);

const LOCK_POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Options for opening a [`FileBackend`]
#[derive(Clone)]
pub struct FileBackendOptions {
    pub path: PathBuf,
    pub passphrase: String,
}

impl std::fmt::Debug for FileBackendOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileBackendOptions")
            .field("path", &self.path)
            .field("passphrase", &"[REDACTED]")
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Sealed {
    nonce: String,
    ciphertext: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Document {
    version: u32,
    salt: String,
    verifier: Sealed,
    /// scope key -> account -> sealed secret
    #[serde(default)]
    scopes: BTreeMap<String, BTreeMap<String, Sealed>>,
}

/// Backend persisting secrets in a passphrase-encrypted file
///
/// The file is re-read on every operation. Readers hold a shared lock and
/// writers an exclusive lock on `<path>.lock` for the whole
/// read-modify-write, so any number of handles, in one process or several,
/// may share a vault.
///
/// # Example
///
/// ```no_run
/// use securestore_core::backends::{BackendAdapter, FileBackend, FileBackendOptions};
/// use securestore_core::query::QueryDescriptor;
///
/// let backend = FileBackend::open(FileBackendOptions {
///     path: "/tmp/secrets.json".into(),
///     passphrase: "correct horse".to_string(),
/// }).unwrap();
///
/// let scope = QueryDescriptor::generic("someService").attributes_for_query(None);
/// backend.insert_or_update(&scope, "user", b"pwd").unwrap();
/// ```
pub struct FileBackend {
    path: PathBuf,
    lock_path: PathBuf,
    salt: [u8; SALT_LEN],
    key: Zeroizing<Vec<u8>>,
    lock_timeout: Duration,
}

/// OS lock on the sidecar file, released on drop
struct VaultLock {
    file: File,
}

impl VaultLock {
    fn acquire(path: &Path, exclusive: bool, timeout: Duration) -> StoreResult<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;
        #[cfg(unix)]
        file.set_permissions(fs::Permissions::from_mode(0o600))?;

        let deadline = Instant::now() + timeout;
        loop {
            let attempt = if exclusive {
                FileExt::try_lock_exclusive(&file)
            } else {
                FileExt::try_lock_shared(&file)
            };
            match attempt {
                Ok(()) => return Ok(Self { file }),
                Err(e) if e.kind() == fs2::lock_contended_error().kind() => {
                    if Instant::now() >= deadline {
                        return Err(StoreError::unavailable(format!(
                            "timed out waiting for lock on {}",
                            path.display()
                        )));
                    }
                    thread::sleep(LOCK_POLL_INTERVAL);
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}

impl Drop for VaultLock {
    fn drop(&mut self) {
        // Closing the file releases the lock too
        let _ = FileExt::unlock(&self.file);
    }
}

impl FileBackend {
    /// Open an existing secrets file, or create it
    ///
    /// Fails with `AccessDenied` if the file exists and was sealed with a
    /// different passphrase.
    pub fn open(opts: FileBackendOptions) -> StoreResult<Self> {
        if let Some(parent) = parent_dir(&opts.path) {
            fs::create_dir_all(parent)?;
        }
        let lock_path = sidecar_lock_path(&opts.path);

        // Exclusive so two handles racing to create the vault agree on one salt
        let _lock = VaultLock::acquire(&lock_path, true, DEFAULT_LOCK_TIMEOUT)?;

        if opts.path.exists() {
            let document = read_document(&opts.path)?;
            let salt = decode_salt(&document.salt)?;
            let key = derive_key(&opts.passphrase, &salt)?;
            let backend = Self {
                path: opts.path,
                lock_path,
                salt,
                key,
                lock_timeout: DEFAULT_LOCK_TIMEOUT,
            };
            backend
                .open_sealed(&document.verifier, VERIFIER_AAD)
                .map_err(|_| StoreError::access_denied("wrong passphrase for secrets file"))?;
            log::info("FileBackend", &format!("opened {}", backend.path.display()));
            Ok(backend)
        } else {
            let mut salt = [0u8; SALT_LEN];
            OsRng.fill_bytes(&mut salt);
            let key = derive_key(&opts.passphrase, &salt)?;
            let backend = Self {
                path: opts.path,
                lock_path,
                salt,
                key,
                lock_timeout: DEFAULT_LOCK_TIMEOUT,
            };
            let document = backend.empty_document()?;
            backend.write_document(&document)?;
            log::info("FileBackend", &format!("created {}", backend.path.display()));
            Ok(backend)
        }
    }

    /// Set how long operations wait for another writer; expiry reports `BackendUnavailable`
    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    fn shared(&self) -> StoreResult<VaultLock> {
        VaultLock::acquire(&self.lock_path, false, self.lock_timeout)
    }

    fn exclusive(&self) -> StoreResult<VaultLock> {
        VaultLock::acquire(&self.lock_path, true, self.lock_timeout)
    }

    /// Path to the secrets file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Verify file permissions are correct (Unix only)
    ///
    /// Returns true if the file doesn't exist or has 0600 permissions.
    #[cfg(unix)]
    pub fn verify_permissions(&self) -> StoreResult<bool> {
        if !self.path.exists() {
            return Ok(true);
        }
        let mode = fs::metadata(&self.path)?.permissions().mode() & 0o777;
        Ok(mode == 0o600)
    }

    /// Verify file permissions are correct (non-Unix always returns true)
    #[cfg(not(unix))]
    pub fn verify_permissions(&self) -> StoreResult<bool> {
        Ok(true)
    }

    fn cipher(&self) -> Aes256Gcm {
        Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&self.key))
    }

    fn seal(&self, plaintext: &[u8], aad: &[u8]) -> StoreResult<Sealed> {
        let mut nonce_bytes = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce_bytes);
        let ciphertext = self
            .cipher()
            .encrypt(Nonce::from_slice(&nonce_bytes), Payload { msg: plaintext, aad })
            .map_err(|_| StoreError::encoding("encrypt failed"))?;

        Ok(Sealed {
            nonce: B64.encode(nonce_bytes),
            ciphertext: B64.encode(ciphertext),
        })
    }

    fn open_sealed(&self, sealed: &Sealed, aad: &[u8]) -> StoreResult<Vec<u8>> {
        let nonce_bytes = B64
            .decode(&sealed.nonce)
            .map_err(|e| StoreError::encoding(format!("nonce base64 decode error: {}", e)))?;
        if nonce_bytes.len() != NONCE_LEN {
            return Err(StoreError::encoding("bad nonce length"));
        }
        let ciphertext = B64
            .decode(&sealed.ciphertext)
            .map_err(|e| StoreError::encoding(format!("ciphertext base64 decode error: {}", e)))?;

        self.cipher()
            .decrypt(Nonce::from_slice(&nonce_bytes), Payload { msg: &ciphertext, aad })
            .map_err(|_| StoreError::encoding("decrypt failed"))
    }

    fn empty_document(&self) -> StoreResult<Document> {
        Ok(Document {
            version: DOCUMENT_VERSION,
            salt: B64.encode(self.salt),
            verifier: self.seal(VERIFIER_PLAINTEXT, VERIFIER_AAD)?,
            scopes: BTreeMap::new(),
        })
    }

    /// Load the document, starting over if the file was wiped
    fn load(&self) -> StoreResult<Document> {
        if !self.path.exists() {
            return self.empty_document();
        }
        let document = read_document(&self.path)?;
        if decode_salt(&document.salt)? != self.salt {
            return Err(StoreError::access_denied("secrets file was re-created with a different key"));
        }
        Ok(document)
    }

    /// Caller must hold the exclusive lock
    fn write_document(&self, document: &Document) -> StoreResult<()> {
        let parent = parent_dir(&self.path).unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(parent)?;

        let content = serde_json::to_vec_pretty(document)
            .map_err(|e| StoreError::encoding(format!("cannot serialize secrets file: {}", e)))?;

        // NamedTempFile is created 0600 on Unix, before any content lands
        let mut temp = NamedTempFile::new_in(parent)?;
        temp.write_all(&content)?;
        temp.as_file().sync_all()?;
        temp.persist(&self.path).map_err(|e| StoreError::from(e.error))?;
        Ok(())
    }
}

impl std::fmt::Debug for FileBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileBackend")
            .field("path", &self.path)
            .finish()
    }
}

impl BackendAdapter for FileBackend {
    fn name(&self) -> &str {
        "file"
    }

    fn is_available(&self) -> bool {
        self.path.parent().map(|p| p.as_os_str().is_empty() || p.exists()).unwrap_or(true)
    }

    fn find(&self, scope: &AttributeSet, account: &str) -> StoreResult<Option<Vec<u8>>> {
        let _lock = self.shared()?;
        let scope_key = scope.scope_key();
        let document = self.load()?;

        match document.scopes.get(&scope_key).and_then(|entries| entries.get(account)) {
            Some(sealed) => {
                let plaintext = self.open_sealed(sealed, &entry_aad(&scope_key, account))?;
                Ok(Some(plaintext))
            }
            None => Ok(None),
        }
    }

    fn insert_or_update(&self, scope: &AttributeSet, account: &str, secret: &[u8]) -> StoreResult<()> {
        let _lock = self.exclusive()?;
        let scope_key = scope.scope_key();
        let mut document = self.load()?;

        let sealed = self.seal(secret, &entry_aad(&scope_key, account))?;
        document
            .scopes
            .entry(scope_key)
            .or_default()
            .insert(account.to_string(), sealed);

        log::debug("FileBackend", &format!("insert_or_update() account='{}'", account));
        self.write_document(&document)
    }

    fn delete(&self, scope: &AttributeSet, account: &str) -> StoreResult<()> {
        let _lock = self.exclusive()?;
        let scope_key = scope.scope_key();
        let mut document = self.load()?;

        let removed = match document.scopes.get_mut(&scope_key) {
            Some(entries) => {
                let removed = entries.remove(account).is_some();
                if entries.is_empty() {
                    document.scopes.remove(&scope_key);
                }
                removed
            }
            None => false,
        };

        if removed {
            self.write_document(&document)?;
        }
        Ok(())
    }

    fn delete_all(&self, scope: &AttributeSet) -> StoreResult<()> {
        let _lock = self.exclusive()?;
        let mut document = self.load()?;

        if document.scopes.remove(&scope.scope_key()).is_some() {
            self.write_document(&document)?;
        }
        Ok(())
    }

    fn accounts(&self, scope: &AttributeSet) -> StoreResult<Vec<String>> {
        let _lock = self.shared()?;
        let document = self.load()?;
        Ok(document
            .scopes
            .get(&scope.scope_key())
            .map(|entries| entries.keys().cloned().collect())
            .unwrap_or_default())
    }
}

fn parent_dir(path: &Path) -> Option<&Path> {
    path.parent().filter(|p| !p.as_os_str().is_empty())
}

fn sidecar_lock_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".lock");
    PathBuf::from(name)
}

/// Associated data binding a ciphertext to its slot
///
/// Length-prefixed so that no two `(scope, account)` pairs share it.
fn entry_aad(scope_key: &str, account: &str) -> Vec<u8> {
    format!("{}:{}:{}", scope_key.len(), scope_key, account).into_bytes()
}

fn read_document(path: &Path) -> StoreResult<Document> {
    let content = fs::read(path)?;
    let document: Document = serde_json::from_slice(&content)
        .map_err(|e| StoreError::encoding(format!("cannot parse secrets file: {}", e)))?;
    if document.version != DOCUMENT_VERSION {
        return Err(StoreError::unexpected(
            Some(i64::from(document.version)),
            "unsupported secrets file version",
        ));
    }
    Ok(document)
}

fn decode_salt(encoded: &str) -> StoreResult<[u8; SALT_LEN]> {
    let bytes = B64
        .decode(encoded)
        .map_err(|e| StoreError::encoding(format!("salt base64 decode error: {}", e)))?;
    bytes
        .try_into()
        .map_err(|_| StoreError::encoding("bad salt length"))
}

fn derive_key(passphrase: &str, salt: &[u8]) -> StoreResult<Zeroizing<Vec<u8>>> {
    let mut key = Zeroizing::new(vec![0u8; KEY_LEN]);
    Argon2::default()
        .hash_password_into(passphrase.as_bytes(), salt, &mut key)
        .map_err(|e| StoreError::unexpected(None, format!("kdf error: {}", e)))?;
    Ok(key)
}
