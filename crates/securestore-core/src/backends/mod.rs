//! Secret storage backends
//!
//! This module provides the storage side of the secure store:
//! - `BackendAdapter` trait for implementing custom backends
//! - Built-in implementations: `MemoryBackend`, `KeychainBackend`, `FileBackend`
//!   (the RPC backend lives in [`crate::rpc`])
//! - A registry for discovering and creating backends by name

mod traits;
mod memory_backend;
mod keychain_backend;
mod file_backend;
mod registry;

pub use traits::{BackendAdapter, ErrorKind, StoreError, StoreResult};
pub use memory_backend::MemoryBackend;
pub use keychain_backend::KeychainBackend;
pub use file_backend::{FileBackend, FileBackendOptions};
pub use registry::{
    create_backend, has_backend, list_backends, register_backend, unregister_backend,
    BackendDefinition, BackendFactory,
};
