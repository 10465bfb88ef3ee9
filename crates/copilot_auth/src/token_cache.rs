use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use indexmap::IndexMap;
use tempfile::NamedTempFile;
use tracing::debug;

use crate::error::AuthError;
use crate::paths::default_token_cache_path;

/// Logins in file order; re-storing a login keeps its position.
type TokenMap = IndexMap<String, String>;

/// Persistent mapping from GitHub login to long-lived identity token.
///
/// `get(None)` returns the first entry in file order: a single-user
/// convenience, not an account selector.
pub trait TokenStore: Send + Sync {
    fn get(&self, identity: Option<&str>) -> Result<Option<String>, AuthError>;
    fn put(&self, identity: &str, token: &str) -> Result<(), AuthError>;
}

/// Token store backed by one JSON object on disk.
///
/// Every call is a whole-file read (and, for `put`, a whole-file write). The
/// write goes to a temporary sibling that is renamed into place, so a reader
/// never sees a torn file. There is no locking: two processes writing at once
/// can still lose one of the updates.
#[derive(Debug, Clone)]
pub struct FileTokenStore {
    path: PathBuf,
}

impl FileTokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn at_default_location() -> Result<Self, AuthError> {
        default_token_cache_path().map(Self::new)
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<TokenMap, AuthError> {
        if !self.path.exists() {
            self.save(&TokenMap::new())?;
        }

        let raw = fs::read_to_string(&self.path)
            .map_err(|source| AuthError::io("reading token cache", &self.path, source))?;
        serde_json::from_str::<TokenMap>(&raw).map_err(|source| AuthError::CacheCorrupt {
            path: self.path.clone(),
            source,
        })
    }

    fn save(&self, tokens: &TokenMap) -> Result<(), AuthError> {
        let parent = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&parent)
            .map_err(|source| AuthError::io("creating token cache directory", &parent, source))?;

        let encoded =
            serde_json::to_string(tokens).map_err(|source| AuthError::CacheSerialize {
                path: self.path.clone(),
                source,
            })?;

        let mut staged = NamedTempFile::new_in(&parent)
            .map_err(|source| AuthError::io("staging token cache", &parent, source))?;
        staged
            .write_all(encoded.as_bytes())
            .map_err(|source| AuthError::io("writing token cache", staged.path(), source))?;
        staged
            .persist(&self.path)
            .map_err(|error| AuthError::io("replacing token cache", &self.path, error.error))?;
        Ok(())
    }
}

impl TokenStore for FileTokenStore {
    fn get(&self, identity: Option<&str>) -> Result<Option<String>, AuthError> {
        let tokens = self.load()?;
        Ok(select(&tokens, identity))
    }

    fn put(&self, identity: &str, token: &str) -> Result<(), AuthError> {
        let mut tokens = self.load()?;
        tokens.insert(identity.to_owned(), token.to_owned());
        self.save(&tokens)?;
        debug!(path = %self.path.display(), "stored identity token");
        Ok(())
    }
}

/// Process-local token store for tests and ephemeral runs.
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    tokens: Mutex<TokenMap>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(identity: impl Into<String>, token: impl Into<String>) -> Self {
        let store = Self::default();
        lock_unpoisoned(&store.tokens).insert(identity.into(), token.into());
        store
    }

    pub fn len(&self) -> usize {
        lock_unpoisoned(&self.tokens).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl TokenStore for MemoryTokenStore {
    fn get(&self, identity: Option<&str>) -> Result<Option<String>, AuthError> {
        Ok(select(&lock_unpoisoned(&self.tokens), identity))
    }

    fn put(&self, identity: &str, token: &str) -> Result<(), AuthError> {
        lock_unpoisoned(&self.tokens).insert(identity.to_owned(), token.to_owned());
        Ok(())
    }
}

fn select(tokens: &TokenMap, identity: Option<&str>) -> Option<String> {
    match identity.filter(|identity| !identity.is_empty()) {
        Some(identity) => tokens.get(identity).cloned(),
        None => tokens.values().next().cloned(),
    }
}

fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_store_follows_cache_contract() {
        let store = MemoryTokenStore::new();
        assert_eq!(store.get(None).unwrap(), None);

        store.put("alice", "tok1").unwrap();
        assert_eq!(store.get(None).unwrap().as_deref(), Some("tok1"));
        assert_eq!(store.get(Some("alice")).unwrap().as_deref(), Some("tok1"));
        assert_eq!(store.get(Some("bob")).unwrap(), None);
    }

    #[test]
    fn empty_identity_behaves_like_none() {
        let store = MemoryTokenStore::with_token("alice", "tok1");
        assert_eq!(store.get(Some("")).unwrap().as_deref(), Some("tok1"));
    }
}
