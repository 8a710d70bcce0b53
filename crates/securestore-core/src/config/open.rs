//! Build a backend from configuration

use std::sync::Arc;
use std::time::Duration;

use crate::backends::{
    BackendAdapter, FileBackend, FileBackendOptions, KeychainBackend, MemoryBackend, StoreError,
    StoreResult,
};
use crate::logging::file_logger as log;
use crate::rpc::RpcBackend;

use super::file::{BackendKind, StoreConfig};

/// Open the backend a config selects
///
/// The file passphrase and RPC token are read from the environment
/// variables the config names. A missing passphrase is `AccessDenied`;
/// a missing token connects without one. A config that fails
/// [`StoreConfig::validate`] opens nothing and is `BackendUnavailable`.
pub fn open_backend(config: &StoreConfig) -> StoreResult<Arc<dyn BackendAdapter>> {
    open_backend_with_env(config, |name| std::env::var(name).ok())
}

pub(crate) fn open_backend_with_env<F>(config: &StoreConfig, env: F) -> StoreResult<Arc<dyn BackendAdapter>>
where
    F: Fn(&str) -> Option<String>,
{
    log::info("Config", &format!("opening {} backend", config.backend.as_str()));
    config.validate().map_err(|e| {
        log::error("Config", &format!("refusing to open backend: {}", e));
        StoreError::unavailable(e.to_string())
    })?;

    match config.backend {
        BackendKind::Memory => Ok(Arc::new(MemoryBackend::new())),
        BackendKind::Keychain => Ok(Arc::new(KeychainBackend::with_prefix(
            config.keychain.service_prefix.clone(),
        ))),
        BackendKind::File => {
            let var = &config.file.passphrase_env;
            let passphrase = env(var)
                .filter(|p| !p.is_empty())
                .ok_or_else(|| StoreError::access_denied(format!("passphrase variable {} is not set", var)))?;

            let backend = FileBackend::open(FileBackendOptions {
                path: config.file.resolved_path(),
                passphrase,
            })?;
            Ok(Arc::new(backend))
        }
        BackendKind::Rpc => {
            let socket_path = config
                .rpc
                .socket_path
                .clone()
                .ok_or_else(|| StoreError::unavailable("no rpc.socket_path configured"))?;
            let token = env(&config.rpc.auth_token_env).unwrap_or_default();

            let backend = RpcBackend::new("config", socket_path, token)
                .with_timeout(Duration::from_millis(config.rpc.timeout_ms));
            Ok(Arc::new(backend))
        }
    }
}
