//! In-memory backend

use std::collections::{BTreeMap, HashMap};

use parking_lot::RwLock;

use super::traits::{BackendAdapter, StoreResult};
use crate::query::AttributeSet;

type Scoped = BTreeMap<String, Vec<u8>>;

/// In-memory backend for testing and ephemeral use
///
/// Entries are partitioned by scope key, then by account. Secrets are lost
/// when the backend is dropped.
///
/// # Thread Safety
///
/// Every operation runs under a single `RwLock`, so concurrent upserts are
/// applied in lock order and readers never see a partial write.
///
/// # Example
///
/// ```
/// use securestore_core::backends::{BackendAdapter, MemoryBackend};
/// use securestore_core::query::QueryDescriptor;
///
/// let backend = MemoryBackend::new();
/// let scope = QueryDescriptor::generic("svc").attributes_for_query(None);
/// backend.insert_or_update(&scope, "user", b"secret").unwrap();
/// assert_eq!(backend.len(), 1);
/// ```
#[derive(Debug, Default)]
pub struct MemoryBackend {
    scopes: RwLock<HashMap<String, Scoped>>,
}

impl MemoryBackend {
    /// Create a new empty memory backend
    pub fn new() -> Self {
        Self {
            scopes: RwLock::new(HashMap::new()),
        }
    }

    /// Total number of entries across all scopes
    pub fn len(&self) -> usize {
        self.scopes.read().values().map(BTreeMap::len).sum()
    }

    /// Check if the backend holds no entries
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of scopes holding at least one entry
    pub fn scope_count(&self) -> usize {
        self.scopes.read().len()
    }

    /// Wipe every scope
    pub fn clear(&self) {
        self.scopes.write().clear();
    }
}

impl BackendAdapter for MemoryBackend {
    fn name(&self) -> &str {
        "memory"
    }

    fn find(&self, scope: &AttributeSet, account: &str) -> StoreResult<Option<Vec<u8>>> {
        let scopes = self.scopes.read();
        Ok(scopes
            .get(&scope.scope_key())
            .and_then(|entries| entries.get(account))
            .cloned())
    }

    fn insert_or_update(&self, scope: &AttributeSet, account: &str, secret: &[u8]) -> StoreResult<()> {
        let mut scopes = self.scopes.write();
        scopes
            .entry(scope.scope_key())
            .or_default()
            .insert(account.to_string(), secret.to_vec());
        Ok(())
    }

    fn delete(&self, scope: &AttributeSet, account: &str) -> StoreResult<()> {
        let mut scopes = self.scopes.write();
        let key = scope.scope_key();
        if let Some(entries) = scopes.get_mut(&key) {
            entries.remove(account);
            if entries.is_empty() {
                scopes.remove(&key);
            }
        }
        Ok(())
    }

    fn delete_all(&self, scope: &AttributeSet) -> StoreResult<()> {
        self.scopes.write().remove(&scope.scope_key());
        Ok(())
    }

    fn accounts(&self, scope: &AttributeSet) -> StoreResult<Vec<String>> {
        let scopes = self.scopes.read();
        Ok(scopes
            .get(&scope.scope_key())
            .map(|entries| entries.keys().cloned().collect())
            .unwrap_or_default())
    }
}

impl Clone for MemoryBackend {
    fn clone(&self) -> Self {
        Self {
            scopes: RwLock::new(self.scopes.read().clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::QueryDescriptor;

    fn scope(service: &str) -> AttributeSet {
        QueryDescriptor::generic(service).attributes_for_query(None)
    }

    #[test]
    fn test_memory_backend_name() {
        assert_eq!(MemoryBackend::new().name(), "memory");
    }

    #[test]
    fn test_memory_backend_crud() {
        let backend = MemoryBackend::new();
        let s = scope("svc");

        // Initially empty
        assert!(backend.is_empty());
        assert_eq!(backend.find(&s, "user").unwrap(), None);

        backend.insert_or_update(&s, "user", b"one").unwrap();
        assert_eq!(backend.len(), 1);
        assert_eq!(backend.find(&s, "user").unwrap(), Some(b"one".to_vec()));
        assert!(backend.contains(&s, "user").unwrap());

        // Update keeps a single entry
        backend.insert_or_update(&s, "user", b"two").unwrap();
        assert_eq!(backend.len(), 1);
        assert_eq!(backend.find(&s, "user").unwrap(), Some(b"two".to_vec()));

        backend.delete(&s, "user").unwrap();
        assert_eq!(backend.find(&s, "user").unwrap(), None);
        assert!(backend.is_empty());
        assert_eq!(backend.scope_count(), 0);
    }

    #[test]
    fn test_delete_missing_is_ok() {
        let backend = MemoryBackend::new();
        backend.delete(&scope("svc"), "ghost").unwrap();
        backend.delete_all(&scope("svc")).unwrap();
    }

    #[test]
    fn test_delete_all_is_scoped() {
        let backend = MemoryBackend::new();
        let a = scope("a");
        let b = scope("b");

        backend.insert_or_update(&a, "one", b"1").unwrap();
        backend.insert_or_update(&a, "two", b"2").unwrap();
        backend.insert_or_update(&b, "one", b"other").unwrap();

        backend.delete_all(&a).unwrap();

        assert_eq!(backend.find(&a, "one").unwrap(), None);
        assert_eq!(backend.find(&a, "two").unwrap(), None);
        assert_eq!(backend.find(&b, "one").unwrap(), Some(b"other".to_vec()));
    }

    #[test]
    fn test_delete_all_ignores_account_in_scope() {
        let backend = MemoryBackend::new();
        let s = scope("svc");
        backend.insert_or_update(&s, "one", b"1").unwrap();
        backend.insert_or_update(&s, "two", b"2").unwrap();

        backend.delete_all(&s.clone().with_account("one")).unwrap();
        assert!(backend.is_empty());
    }

    #[test]
    fn test_accounts_sorted() {
        let backend = MemoryBackend::new();
        let s = scope("svc");
        backend.insert_or_update(&s, "zed", b"z").unwrap();
        backend.insert_or_update(&s, "amy", b"a").unwrap();

        assert_eq!(backend.accounts(&s).unwrap(), vec!["amy".to_string(), "zed".to_string()]);
        assert!(backend.accounts(&scope("empty")).unwrap().is_empty());
    }

    #[test]
    fn test_memory_backend_clone() {
        let backend = MemoryBackend::new();
        let s = scope("svc");
        backend.insert_or_update(&s, "key", b"value").unwrap();

        let cloned = backend.clone();
        assert_eq!(cloned.find(&s, "key").unwrap(), Some(b"value".to_vec()));

        // Modifying clone doesn't affect original
        cloned.insert_or_update(&s, "key", b"modified").unwrap();
        assert_eq!(backend.find(&s, "key").unwrap(), Some(b"value".to_vec()));
    }

    #[test]
    fn test_clear() {
        let backend = MemoryBackend::new();
        backend.insert_or_update(&scope("a"), "k", b"v").unwrap();
        backend.insert_or_update(&scope("b"), "k", b"v").unwrap();
        backend.clear();
        assert!(backend.is_empty());
    }

    #[test]
    fn test_concurrent_upserts_are_serialized() {
        use std::sync::Arc;
        use std::thread;

        let backend = Arc::new(MemoryBackend::new());
        let s = scope("svc");
        let mut handles = vec![];

        for i in 0..10 {
            let backend = Arc::clone(&backend);
            let s = s.clone();
            handles.push(thread::spawn(move || {
                let value = format!("value_{}", i);
                backend.insert_or_update(&s, "shared", value.as_bytes()).unwrap();
                backend
                    .insert_or_update(&s, &format!("key_{}", i), value.as_bytes())
                    .unwrap();
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }

        // One shared entry plus one per thread
        assert_eq!(backend.len(), 11);
        let last = String::from_utf8(backend.find(&s, "shared").unwrap().unwrap()).unwrap();
        assert!(last.starts_with("value_"));
    }
}
