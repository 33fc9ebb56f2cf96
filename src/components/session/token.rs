use crate::error::{storage_error, CalResult, Error};
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client as RedisClient, RedisResult};
use serde_json::{Map, Value};
use std::future::Future;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;
use tokio::fs;
use tokio::sync::OnceCell;
use tracing::debug;

/// Persistent storage for the session token.
///
/// Exactly one token lives under a fixed key.
#[async_trait]
pub trait TokenStore: Send + Sync {
    /// Read the persisted token, if any
    async fn load(&self) -> CalResult<Option<String>>;

    /// Persist a token, replacing any previous one
    async fn save(&self, token: &str) -> CalResult<()>;

    /// Remove the persisted token. Removing a missing token is not an error.
    async fn clear(&self) -> CalResult<()>;
}

/// Token kept in a small JSON file keyed by the token name
#[derive(Debug, Clone)]
pub struct FileTokenStore {
    path: PathBuf,
    key: String,
}

impl FileTokenStore {
    pub fn new(path: impl Into<PathBuf>, key: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            key: key.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_entries(&self) -> CalResult<Map<String, Value>> {
        let content = match fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Map::new()),
            Err(e) => return Err(e.into()),
        };

        match serde_json::from_str::<Value>(&content)? {
            Value::Object(entries) => Ok(entries),
            _ => Err(storage_error(&format!(
                "Token file {} is not a JSON object",
                self.path.display()
            ))),
        }
    }

    async fn write_entries(&self, entries: &Map<String, Value>) -> CalResult<()> {
        if entries.is_empty() {
            return match fs::remove_file(&self.path).await {
                Err(e) if e.kind() != ErrorKind::NotFound => Err(e.into()),
                _ => Ok(()),
            };
        }

        // Create the parent directory if it doesn't exist
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }

        let content = serde_json::to_string_pretty(entries)?;
        fs::write(&self.path, content).await?;
        Ok(())
    }
}

#[async_trait]
impl TokenStore for FileTokenStore {
    async fn load(&self) -> CalResult<Option<String>> {
        let entries = self.read_entries().await?;
        Ok(entries
            .get(&self.key)
            .and_then(|v| v.as_str())
            .map(|s| s.to_string()))
    }

    async fn save(&self, token: &str) -> CalResult<()> {
        let mut entries = self.read_entries().await?;
        entries.insert(self.key.clone(), Value::String(token.to_string()));
        self.write_entries(&entries).await?;
        debug!("Session token written to {}", self.path.display());
        Ok(())
    }

    async fn clear(&self) -> CalResult<()> {
        let mut entries = self.read_entries().await?;
        if entries.remove(&self.key).is_some() {
            self.write_entries(&entries).await?;
        }
        Ok(())
    }
}

/// Token kept in Redis under a fixed key.
///
/// The connection is opened on first use and reconnects on its own. Every
/// round trip is bounded by `timeout` so an unreachable server surfaces as
/// a storage error instead of stalling the session.
pub struct RedisTokenStore {
    client: RedisClient,
    connection: OnceCell<ConnectionManager>,
    key: String,
    timeout: Duration,
}

impl RedisTokenStore {
    pub fn new(redis_url: &str, key: impl Into<String>, timeout: Duration) -> CalResult<Self> {
        let client = RedisClient::open(redis_url)?;
        Ok(Self {
            client,
            connection: OnceCell::new(),
            key: key.into(),
            timeout,
        })
    }

    async fn bounded<T>(&self, op: impl Future<Output = RedisResult<T>>) -> CalResult<T> {
        match tokio::time::timeout(self.timeout, op).await {
            Ok(result) => result.map_err(Error::from),
            Err(_) => Err(storage_error(&format!(
                "Redis did not answer within {:?}",
                self.timeout
            ))),
        }
    }

    async fn connection(&self) -> CalResult<ConnectionManager> {
        let manager = self
            .connection
            .get_or_try_init(|| self.bounded(ConnectionManager::new(self.client.clone())))
            .await?;
        Ok(manager.clone())
    }
}

#[async_trait]
impl TokenStore for RedisTokenStore {
    async fn load(&self) -> CalResult<Option<String>> {
        let mut conn = self.connection().await?;
        self.bounded(conn.get::<_, Option<String>>(&self.key)).await
    }

    async fn save(&self, token: &str) -> CalResult<()> {
        let mut conn = self.connection().await?;
        self.bounded(conn.set::<_, _, ()>(&self.key, token)).await
    }

    async fn clear(&self) -> CalResult<()> {
        let mut conn = self.connection().await?;
        self.bounded(conn.del::<_, ()>(&self.key)).await
    }
}

/// Token kept only for the lifetime of the process
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    slot: Mutex<Option<String>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store preloaded with a token, as if persisted by an earlier run
    pub fn with_token(token: &str) -> Self {
        Self {
            slot: Mutex::new(Some(token.to_string())),
        }
    }

    fn replace(&self, token: Option<String>) -> CalResult<()> {
        let mut slot = self
            .slot
            .lock()
            .map_err(|_| storage_error("Token slot lock poisoned"))?;
        *slot = token;
        Ok(())
    }
}

#[async_trait]
impl TokenStore for MemoryTokenStore {
    async fn load(&self) -> CalResult<Option<String>> {
        let slot = self
            .slot
            .lock()
            .map_err(|_| storage_error("Token slot lock poisoned"))?;
        Ok(slot.clone())
    }

    async fn save(&self, token: &str) -> CalResult<()> {
        self.replace(Some(token.to_string()))
    }

    async fn clear(&self) -> CalResult<()> {
        self.replace(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_token_path(name: &str) -> PathBuf {
        std::env::temp_dir()
            .join(format!("kalenteri-{}-{}", name, uuid::Uuid::new_v4()))
            .join("session_token")
    }

    #[tokio::test]
    async fn test_file_store_lifecycle() {
        let path = temp_token_path("lifecycle");
        let store = FileTokenStore::new(&path, "token");

        assert_eq!(store.load().await.unwrap(), None);

        store.save("abc").await.unwrap();
        assert!(path.exists());
        assert_eq!(store.load().await.unwrap().as_deref(), Some("abc"));

        store.save("def").await.unwrap();
        assert_eq!(store.load().await.unwrap().as_deref(), Some("def"));

        store.clear().await.unwrap();
        assert_eq!(store.load().await.unwrap(), None);
        assert!(!path.exists());

        // Clearing twice is fine
        store.clear().await.unwrap();

        if let Some(dir) = path.parent() {
            let _ = std::fs::remove_dir_all(dir);
        }
    }

    #[tokio::test]
    async fn test_file_store_keeps_other_keys() {
        let path = temp_token_path("keys");
        let main = FileTokenStore::new(&path, "token");
        let other = FileTokenStore::new(&path, "staging_token");

        main.save("main").await.unwrap();
        other.save("staging").await.unwrap();
        main.clear().await.unwrap();

        assert_eq!(main.load().await.unwrap(), None);
        assert_eq!(other.load().await.unwrap().as_deref(), Some("staging"));

        if let Some(dir) = path.parent() {
            let _ = std::fs::remove_dir_all(dir);
        }
    }

    #[tokio::test]
    async fn test_file_store_rejects_garbage() {
        let path = temp_token_path("garbage");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "[1, 2, 3]").unwrap();

        let store = FileTokenStore::new(&path, "token");
        assert!(store.load().await.is_err());

        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[tokio::test]
    async fn test_memory_store() {
        let store = MemoryTokenStore::with_token("persisted");
        assert_eq!(store.load().await.unwrap().as_deref(), Some("persisted"));
        store.clear().await.unwrap();
        assert_eq!(store.load().await.unwrap(), None);
        store.save("fresh").await.unwrap();
        assert_eq!(store.load().await.unwrap().as_deref(), Some("fresh"));
    }

    #[test]
    fn test_redis_store_rejects_bad_url() {
        assert!(RedisTokenStore::new("not-a-redis-url", "token", Duration::from_secs(1)).is_err());
    }
}
