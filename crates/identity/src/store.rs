//! Key-value flag storage
//!
//! The console keeps a handful of string flags (currently only the anonymous
//! user id) that must survive restarts. `FileStore` persists them as a flat
//! JSON object; writes go through a temp file + rename so a crash never
//! leaves a truncated file behind. `MemoryStore` is the non-persistent
//! variant for tests and embedders that bring their own storage.

use std::collections::HashMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;

use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::{Error, Result};

/// String key-value storage shared by the identity components.
///
/// Uses `Pin<Box<dyn Future>>` return types so stores can be held as
/// `Arc<dyn KeyValueStore>`.
pub trait KeyValueStore: Send + Sync {
    fn get<'a>(
        &'a self,
        key: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Option<String>>> + Send + 'a>>;

    fn set<'a>(
        &'a self,
        key: &'a str,
        value: String,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>>;
}

/// In-process store, lost when the process exits.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get<'a>(
        &'a self,
        key: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Option<String>>> + Send + 'a>> {
        Box::pin(async move { Ok(self.entries.lock().await.get(key).cloned()) })
    }

    fn set<'a>(
        &'a self,
        key: &'a str,
        value: String,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(async move {
            self.entries.lock().await.insert(key.to_string(), value);
            Ok(())
        })
    }
}

/// JSON-file backed store.
///
/// The whole map is held in memory behind a tokio Mutex; every `set` rewrites
/// the file while the lock is held, so concurrent writers cannot interleave.
pub struct FileStore {
    path: PathBuf,
    state: Mutex<HashMap<String, String>>,
}

impl FileStore {
    /// Load the store from `path`, creating an empty `{}` file if none exists.
    pub async fn load(path: PathBuf) -> Result<Self> {
        let state = if path.exists() {
            let contents = tokio::fs::read_to_string(&path)
                .await
                .map_err(|e| Error::Io(format!("reading store file: {e}")))?;
            let entries: HashMap<String, String> = serde_json::from_str(&contents)
                .map_err(|e| Error::StoreParse(format!("parsing store file: {e}")))?;
            info!(path = %path.display(), entries = entries.len(), "loaded key-value store");
            entries
        } else {
            info!(path = %path.display(), "store file not found, starting empty");
            let entries = HashMap::new();
            write_atomic(&path, &entries).await?;
            entries
        };

        Ok(Self {
            path,
            state: Mutex::new(state),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl KeyValueStore for FileStore {
    fn get<'a>(
        &'a self,
        key: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Option<String>>> + Send + 'a>> {
        Box::pin(async move { Ok(self.state.lock().await.get(key).cloned()) })
    }

    fn set<'a>(
        &'a self,
        key: &'a str,
        value: String,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(async move {
            let mut state = self.state.lock().await;
            state.insert(key.to_string(), value);
            debug!(key, "stored value");
            write_atomic(&self.path, &state).await
        })
    }
}

/// Write the map to `path` via a sibling temp file and rename (0600 on unix).
async fn write_atomic(path: &Path, data: &HashMap<String, String>) -> Result<()> {
    let json = serde_json::to_string_pretty(data)
        .map_err(|e| Error::StoreParse(format!("serializing store: {e}")))?;

    let dir = path
        .parent()
        .ok_or_else(|| Error::Io("store path has no parent directory".into()))?;

    let file_name = path
        .file_name()
        .ok_or_else(|| Error::Io("store path has no file name".into()))?
        .to_string_lossy();
    // One temp file per target; several stores may share a directory.
    let tmp_path = dir.join(format!(".{file_name}.tmp.{}", std::process::id()));

    tokio::fs::write(&tmp_path, json.as_bytes())
        .await
        .map_err(|e| Error::Io(format!("writing temp store file: {e}")))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        tokio::fs::set_permissions(&tmp_path, perms)
            .await
            .map_err(|e| Error::Io(format!("setting store file permissions: {e}")))?;
    }

    tokio::fs::rename(&tmp_path, path)
        .await
        .map_err(|e| Error::Io(format!("renaming temp store file: {e}")))?;

    debug!(path = %path.display(), "persisted store");
    Ok(())
}
