//! Store configuration
//!
//! A YAML file selects which backend a process uses and how to reach it:
//! - `StoreConfig`: the parsed file, with per-backend sections
//! - `open_backend`: turns a `StoreConfig` into a ready backend

mod error;
mod file;
mod open;

pub use error::{ConfigError, ConfigResult};
pub use file::{BackendKind, FileSection, KeychainSection, RpcSection, StoreConfig};
pub use open::open_backend;
