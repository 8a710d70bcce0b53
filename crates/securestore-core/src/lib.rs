//! SecureStore Core
//!
//! Account-keyed secret storage over pluggable backends.
//! A [`QueryDescriptor`] names where secrets live (a generic service, or a
//! network endpoint); a [`SecureStore`] binds one descriptor to one
//! [`BackendAdapter`] and exposes string set/get/remove operations.
//!
//! ## Backends
//!
//! - `MemoryBackend`: process-local, for tests
//! - `KeychainBackend`: the OS credential store via `keyring`
//! - `FileBackend`: an AES-256-GCM encrypted JSON vault
//! - `RpcBackend`: a secret manager in another process over JSON-RPC
//!
//! ```rust
//! use std::sync::Arc;
//! use securestore_core::{
//!     AuthenticationType, InternetProtocol, MemoryBackend, QueryDescriptor, SecureStore,
//! };
//!
//! let store = SecureStore::new(
//!     QueryDescriptor::endpoint(
//!         "someServer",
//!         8080,
//!         "somePath",
//!         "someDomain",
//!         InternetProtocol::Https,
//!         AuthenticationType::HttpBasic,
//!     ),
//!     Arc::new(MemoryBackend::new()),
//! );
//!
//! store.set_value("pwd_1234", "internetPassword").unwrap();
//! assert_eq!(store.get_value("internetPassword").unwrap().as_deref(), Some("pwd_1234"));
//!
//! store.remove_all_values().unwrap();
//! assert!(store.get_value("internetPassword").unwrap().is_none());
//! ```
//!
//! Which backend a process uses can also come from a YAML file, see
//! [`config::StoreConfig`] and [`config::open_backend`].

pub mod query;
pub mod backends;
pub mod store;
pub mod logging;
pub mod config;
pub mod rpc;

// Re-export commonly used types
pub use query::{
    AttributeKey, AttributeSet, AuthenticationType, EndpointDescriptor, InternetProtocol,
    ItemClass, QueryDescriptor,
};

pub use backends::{
    BackendAdapter, ErrorKind, StoreError, StoreResult,
    MemoryBackend, KeychainBackend, FileBackend, FileBackendOptions,
    register_backend, create_backend, list_backends,
};

pub use store::SecureStore;

pub use logging::{Logger, SharedLogger, NoOpLogger, FileLogger};

pub use config::{open_backend, BackendKind, ConfigError, ConfigResult, StoreConfig};

pub use rpc::{RpcBackend, RpcClient, RpcError};
