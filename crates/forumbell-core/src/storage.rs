// ── Key-value persistence ──
//
// The registry persists two JSON blobs under fixed keys. Where they end up
// is the embedder's business: `FileStore` for the CLI, `MemoryStore` for
// tests and ephemeral use.

use std::collections::HashMap;
use std::io;
use std::path::PathBuf;
use std::sync::Mutex;

use async_trait::async_trait;
use tracing::debug;

/// Asynchronous string store addressed by key.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> io::Result<Option<String>>;
    async fn set(&self, key: &str, value: &str) -> io::Result<()>;
}

// ── MemoryStore ──────────────────────────────────────────────────────

/// In-process store. Counts writes per key so callers can observe
/// persistence behaviour.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

#[derive(Debug, Default)]
struct MemoryState {
    values: HashMap<String, String>,
    writes: HashMap<String, usize>,
    fail_writes: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> std::sync::MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Seed a value without counting it as a write.
    pub fn insert(&self, key: &str, value: &str) {
        self.state().values.insert(key.into(), value.into());
    }

    /// Current value under `key`.
    pub fn value(&self, key: &str) -> Option<String> {
        self.state().values.get(key).cloned()
    }

    /// Number of successful `set` calls for `key`.
    pub fn write_count(&self, key: &str) -> usize {
        self.state().writes.get(key).copied().unwrap_or(0)
    }

    /// Make every subsequent `set` fail with a permission error.
    pub fn fail_writes(&self, fail: bool) {
        self.state().fail_writes = fail;
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> io::Result<Option<String>> {
        Ok(self.value(key))
    }

    async fn set(&self, key: &str, value: &str) -> io::Result<()> {
        let mut state = self.state();
        if state.fail_writes {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                "store is read-only",
            ));
        }
        state.values.insert(key.into(), value.into());
        *state.writes.entry(key.into()).or_default() += 1;
        Ok(())
    }
}

// ── FileStore ────────────────────────────────────────────────────────

/// One `<key>.json` file per key inside a directory.
///
/// Writes go to a temporary file that is renamed into place, so a crash
/// mid-write never leaves a truncated collection behind.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, key: &str) -> io::Result<PathBuf> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
            && !key.starts_with('.');
        if !valid {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("invalid storage key '{key}'"),
            ));
        }
        Ok(self.dir.join(format!("{key}.json")))
    }
}

#[async_trait]
impl KeyValueStore for FileStore {
    async fn get(&self, key: &str) -> io::Result<Option<String>> {
        let path = self.path_for(key)?;
        match tokio::fs::read_to_string(&path).await {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn set(&self, key: &str, value: &str) -> io::Result<()> {
        let path = self.path_for(key)?;
        tokio::fs::create_dir_all(&self.dir).await?;

        let tmp = self.dir.join(format!(".{key}.json.tmp"));
        tokio::fs::write(&tmp, value).await?;

        // Key material lives here too.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            tokio::fs::set_permissions(&tmp, std::fs::Permissions::from_mode(0o600)).await?;
        }

        tokio::fs::rename(&tmp, &path).await?;
        debug!(path = %path.display(), bytes = value.len(), "persisted");
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn memory_store_counts_writes() {
        let store = MemoryStore::new();
        store.insert("sites", "[]");
        assert_eq!(store.write_count("sites"), 0);

        store.set("sites", "[1]").await.unwrap();
        store.set("sites", "[2]").await.unwrap();
        assert_eq!(store.write_count("sites"), 2);
        assert_eq!(store.get("sites").await.unwrap().as_deref(), Some("[2]"));
        assert_eq!(store.get("other").await.unwrap(), None);
    }

    #[tokio::test]
    async fn memory_store_can_refuse_writes() {
        let store = MemoryStore::new();
        store.fail_writes(true);
        let err = store.set("sites", "[]").await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::PermissionDenied);
        assert_eq!(store.write_count("sites"), 0);
    }

    #[tokio::test]
    async fn file_store_round_trip() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::new(dir.path().join("data"));

        assert_eq!(store.get("sites").await.unwrap(), None);
        store.set("sites", r#"[{"url":"https://a.example"}]"#).await.unwrap();
        assert_eq!(
            store.get("sites").await.unwrap().as_deref(),
            Some(r#"[{"url":"https://a.example"}]"#)
        );
        assert!(dir.path().join("data/sites.json").exists());
        assert!(!dir.path().join("data/.sites.json.tmp").exists());
    }

    #[tokio::test]
    async fn file_store_rejects_path_like_keys() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::new(dir.path());
        tokio_test::assert_err!(store.set("../escape", "x").await);
        tokio_test::assert_err!(store.get("").await);
        tokio_test::assert_ok!(store.get("sites.v2").await);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn file_store_writes_private_files() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let store = FileStore::new(dir.path());
        store.set("keypair", "{}").await.unwrap();

        let mode = std::fs::metadata(dir.path().join("keypair.json"))
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
