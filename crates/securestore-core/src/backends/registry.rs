//! Backend registry for discovering and creating backends by name

use std::collections::HashMap;
use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::RwLock;

use super::keychain_backend::KeychainBackend;
use super::memory_backend::MemoryBackend;
use super::traits::BackendAdapter;

/// Factory function type for creating backends
pub type BackendFactory = Box<dyn Fn() -> Arc<dyn BackendAdapter> + Send + Sync>;

/// Definition of a registered backend
pub struct BackendDefinition {
    /// Unique name for this backend
    pub name: String,
    /// Human-readable description
    pub description: String,
    /// Factory function to create instances
    pub factory: BackendFactory,
}

impl std::fmt::Debug for BackendDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendDefinition")
            .field("name", &self.name)
            .field("description", &self.description)
            .finish()
    }
}

/// Global registry of backends
///
/// Only backends that need no options are pre-registered; the file and RPC
/// backends are built from configuration (see [`crate::config::open_backend`]).
static REGISTRY: Lazy<RwLock<HashMap<String, BackendDefinition>>> = Lazy::new(|| {
    let mut map = HashMap::new();

    map.insert(
        "memory".to_string(),
        BackendDefinition {
            name: "memory".to_string(),
            description: "In-memory storage for testing".to_string(),
            factory: Box::new(|| Arc::new(MemoryBackend::new())),
        },
    );

    map.insert(
        "keychain".to_string(),
        BackendDefinition {
            name: "keychain".to_string(),
            description: "System keychain (macOS Keychain, Windows Credential Manager, Linux Secret Service)".to_string(),
            factory: Box::new(|| Arc::new(KeychainBackend::new())),
        },
    );

    RwLock::new(map)
});

/// Register a backend type, replacing any previous one with the same name
///
/// # Example
///
/// ```
/// use securestore_core::backends::{register_backend, create_backend, MemoryBackend};
/// use std::sync::Arc;
///
/// register_backend(
///     "scratch",
///     "Scratch storage",
///     Box::new(|| Arc::new(MemoryBackend::new())),
/// );
/// assert!(create_backend("scratch").is_some());
/// ```
pub fn register_backend(name: &str, description: &str, factory: BackendFactory) {
    REGISTRY.write().insert(
        name.to_string(),
        BackendDefinition {
            name: name.to_string(),
            description: description.to_string(),
            factory,
        },
    );
}

/// Create a backend by name
///
/// Returns None if the name is not registered.
pub fn create_backend(name: &str) -> Option<Arc<dyn BackendAdapter>> {
    REGISTRY.read().get(name).map(|def| (def.factory)())
}

/// List all registered backends as (name, description) pairs, sorted by name
pub fn list_backends() -> Vec<(String, String)> {
    let mut backends: Vec<_> = REGISTRY
        .read()
        .values()
        .map(|def| (def.name.clone(), def.description.clone()))
        .collect();
    backends.sort();
    backends
}

/// Check if a backend is registered
pub fn has_backend(name: &str) -> bool {
    REGISTRY.read().contains_key(name)
}

/// Unregister a backend (mainly for testing)
pub fn unregister_backend(name: &str) -> bool {
    REGISTRY.write().remove(name).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_backends_registered() {
        assert!(has_backend("memory"));
        assert!(has_backend("keychain"));
    }

    #[test]
    fn test_create_memory_backend() {
        let backend = create_backend("memory").unwrap();
        assert_eq!(backend.name(), "memory");
    }

    #[test]
    fn test_create_unknown_backend() {
        assert!(create_backend("nonexistent_xyz").is_none());
    }

    #[test]
    fn test_list_backends() {
        let names: Vec<_> = list_backends().into_iter().map(|(n, _)| n).collect();
        assert!(names.contains(&"memory".to_string()));
        assert!(names.contains(&"keychain".to_string()));
    }

    #[test]
    fn test_register_custom_backend() {
        register_backend(
            "test_custom_backend",
            "A test backend",
            Box::new(|| Arc::new(MemoryBackend::new())),
        );

        assert!(has_backend("test_custom_backend"));
        let backend = create_backend("test_custom_backend").unwrap();
        assert_eq!(backend.name(), "memory");

        // Clean up
        assert!(unregister_backend("test_custom_backend"));
        assert!(!has_backend("test_custom_backend"));
    }
}
