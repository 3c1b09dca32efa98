//! Persistent key/value storage seam

/// Scope a stored value is attached to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageScope {
    /// Scoped to the current workspace
    Workspace,
}

/// Scoped persistent key/value store
pub trait Storage: Send + Sync {
    /// Read a value, falling back to `default` when the key is absent
    fn get(&self, key: &str, scope: StorageScope, default: &str) -> String;

    /// Write a value
    fn store(&self, key: &str, value: &str, scope: StorageScope);

    /// Delete a key
    fn remove(&self, key: &str, scope: StorageScope);
}
