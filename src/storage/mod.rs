//! Flat JSON documents under `DATA_DIR`
//!
//! Every document is loaded fresh on use and rewritten wholesale on every
//! mutation. Writes go to a temp file that is renamed over the target, and
//! read-modify-write cycles on one document are serialized by a per-store
//! async mutex, so handlers running concurrently never lose each other's
//! updates or observe a half-written file.

pub mod admins;
pub mod audit;
pub mod bans;
pub mod channels;
pub mod links;
pub mod settings;
pub mod shortener;
pub mod users;

use std::fmt;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tokio::sync::Mutex;

use crate::core::error::AppResult;
use crate::core::utils::parse_timestamp;

pub use admins::{AdminsFile, PromoteOutcome};
pub use audit::AdminLog;
pub use bans::{BanRecord, BannedUsers};
pub use channels::{ForceSubChannel, ForceSubChannels};
pub use links::{BatchMarker, LinkRecord, LinkTarget, Links};
pub use settings::{SettingField, Settings};
pub use shortener::ShortenerConfig;
pub use users::{UserRecord, Users};

/// One JSON document on disk
pub struct JsonStore<T> {
    path: PathBuf,
    lock: Mutex<()>,
    _doc: PhantomData<fn() -> T>,
}

impl<T> fmt::Debug for JsonStore<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JsonStore").field("path", &self.path).finish()
    }
}

impl<T> JsonStore<T>
where
    T: Serialize + DeserializeOwned + Default,
{
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
            _doc: PhantomData,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the document; a missing or unparsable file yields the default value.
    pub async fn load(&self) -> T {
        self.read().await.0
    }

    /// The document plus whether the file exists but could not be parsed.
    async fn read(&self) -> (T, bool) {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => match serde_json::from_str(&raw) {
                Ok(value) => (value, false),
                Err(e) => {
                    log::warn!("Ignoring unreadable {}: {}", self.path.display(), e);
                    (T::default(), true)
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => (T::default(), false),
            Err(e) => {
                log::warn!("Failed to read {}: {}", self.path.display(), e);
                (T::default(), true)
            }
        }
    }

    /// Path of the copy kept when an unreadable document is overwritten
    pub fn backup_path(&self) -> PathBuf {
        PathBuf::from(format!("{}.bak", self.path.display()))
    }

    /// Replaces the document.
    pub async fn save(&self, value: &T) -> AppResult<()> {
        let _guard = self.lock.lock().await;
        self.write_atomic(value).await
    }

    /// Serialized read-modify-write. The closure's result is returned after
    /// the document has been written back.
    ///
    /// An unreadable file is copied to [`Self::backup_path`] before it is replaced.
    pub async fn update<R>(&self, f: impl FnOnce(&mut T) -> R) -> AppResult<R> {
        let _guard = self.lock.lock().await;
        let (mut value, unreadable) = self.read().await;
        if unreadable {
            let backup = self.backup_path();
            match tokio::fs::copy(&self.path, &backup).await {
                Ok(_) => log::warn!("Kept unreadable {} as {}", self.path.display(), backup.display()),
                Err(e) => log::error!("Could not back up {}: {}", self.path.display(), e),
            }
        }
        let result = f(&mut value);
        self.write_atomic(&value).await?;
        Ok(result)
    }

    /// Writes the default document if the file does not exist yet.
    ///
    /// Returns `true` when a file was created.
    pub async fn ensure_exists(&self) -> AppResult<bool> {
        let _guard = self.lock.lock().await;
        if tokio::fs::try_exists(&self.path).await? {
            return Ok(false);
        }
        self.write_atomic(&T::default()).await?;
        Ok(true)
    }

    async fn write_atomic(&self, value: &T) -> AppResult<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let content = serde_json::to_string_pretty(value)?;
        let temp_path = PathBuf::from(format!("{}.tmp.{}", self.path.display(), std::process::id()));

        tokio::fs::write(&temp_path, content).await?;
        if let Err(e) = tokio::fs::rename(&temp_path, &self.path).await {
            let _ = tokio::fs::remove_file(&temp_path).await;
            return Err(e.into());
        }
        Ok(())
    }
}

/// UTC instant stored as RFC 3339.
///
/// Deserialization also accepts naive ISO-8601 strings (no offset), which
/// older data files contain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(pub DateTime<Utc>);

impl Timestamp {
    pub fn now() -> Self {
        Self(Utc::now())
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(dt: DateTime<Utc>) -> Self {
        Self(dt)
    }
}

impl Serialize for Timestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0.to_rfc3339())
    }
}

impl<'de> Deserialize<'de> for Timestamp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse_timestamp(&raw)
            .map(Timestamp)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp: {}", raw)))
    }
}

/// Every document the bot persists, rooted at one data directory
#[derive(Debug)]
pub struct Storage {
    root: PathBuf,
    pub admins: JsonStore<AdminsFile>,
    pub users: JsonStore<Users>,
    pub banned: JsonStore<BannedUsers>,
    pub links: JsonStore<Links>,
    pub force_sub: JsonStore<ForceSubChannels>,
    pub settings: JsonStore<Settings>,
    pub shortener: JsonStore<ShortenerConfig>,
    pub admin_log: AdminLog,
}

pub type SharedStorage = Arc<Storage>;

impl Storage {
    pub fn open(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            admins: JsonStore::new(root.join("admins.json")),
            users: JsonStore::new(root.join("users.json")),
            banned: JsonStore::new(root.join("banned.json")),
            links: JsonStore::new(root.join("links.json")),
            force_sub: JsonStore::new(root.join("force_sub.json")),
            settings: JsonStore::new(root.join("settings.json")),
            shortener: JsonStore::new(root.join("shortener.json")),
            admin_log: AdminLog::new(root.join("admin_logs.txt")),
            root,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolves a path stored in a document (e.g. `img.jpg`) against the data directory.
    pub fn resolve(&self, stored: &str) -> PathBuf {
        let path = Path::new(stored);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }

    /// Creates every missing document with its default contents.
    ///
    /// Returns the names of the files that were created.
    pub async fn init_files(&self) -> AppResult<Vec<String>> {
        tokio::fs::create_dir_all(&self.root).await?;

        let mut created = Vec::new();
        let mut note = |created_now: bool, path: &Path| {
            if created_now {
                created.push(path.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_default());
            }
        };
        note(self.admins.ensure_exists().await?, self.admins.path());
        note(self.users.ensure_exists().await?, self.users.path());
        note(self.banned.ensure_exists().await?, self.banned.path());
        note(self.links.ensure_exists().await?, self.links.path());
        note(self.force_sub.ensure_exists().await?, self.force_sub.path());
        note(self.settings.ensure_exists().await?, self.settings.path());
        note(self.shortener.ensure_exists().await?, self.shortener.path());

        for name in &created {
            log::info!("Created {}", name);
        }
        Ok(created)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    type Doc = BTreeMap<String, u32>;

    #[tokio::test]
    async fn test_load_missing_file_yields_default() {
        let dir = TempDir::new().unwrap();
        let store: JsonStore<Doc> = JsonStore::new(dir.path().join("missing.json"));
        assert!(store.load().await.is_empty());
    }

    #[tokio::test]
    async fn test_load_corrupt_file_yields_default() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("corrupt.json");
        std::fs::write(&path, "{ not json").unwrap();
        let store: JsonStore<Doc> = JsonStore::new(path);
        assert!(store.load().await.is_empty());
    }

    #[tokio::test]
    async fn test_update_keeps_backup_of_corrupt_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("corrupt.json");
        std::fs::write(&path, "{ not json").unwrap();
        let store: JsonStore<Doc> = JsonStore::new(&path);

        store.update(|doc| doc.insert("a".to_string(), 1)).await.unwrap();

        assert_eq!(std::fs::read_to_string(store.backup_path()).unwrap(), "{ not json");
        assert_eq!(store.load().await.get("a"), Some(&1));
    }

    #[tokio::test]
    async fn test_update_of_valid_file_writes_no_backup() {
        let dir = TempDir::new().unwrap();
        let store: JsonStore<Doc> = JsonStore::new(dir.path().join("doc.json"));
        store.update(|doc| doc.insert("a".to_string(), 1)).await.unwrap();
        store.update(|doc| doc.insert("b".to_string(), 2)).await.unwrap();
        assert!(!store.backup_path().exists());
    }

    #[tokio::test]
    async fn test_save_leaves_no_temp_file() {
        let dir = TempDir::new().unwrap();
        let store: JsonStore<Doc> = JsonStore::new(dir.path().join("doc.json"));
        store.save(&Doc::from([("a".to_string(), 1)])).await.unwrap();

        let names: Vec<String> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["doc.json".to_string()]);
        assert_eq!(store.load().await.get("a"), Some(&1));
    }

    #[tokio::test]
    async fn test_concurrent_updates_are_not_lost() {
        let dir = TempDir::new().unwrap();
        let store: Arc<JsonStore<Doc>> = Arc::new(JsonStore::new(dir.path().join("counter.json")));

        let mut handles = Vec::new();
        for _ in 0..20 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                store
                    .update(|doc| *doc.entry("n".to_string()).or_insert(0) += 1)
                    .await
                    .unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(store.load().await.get("n"), Some(&20));
    }

    #[tokio::test]
    async fn test_ensure_exists_only_once() {
        let dir = TempDir::new().unwrap();
        let store: JsonStore<Doc> = JsonStore::new(dir.path().join("nested/doc.json"));
        assert!(store.ensure_exists().await.unwrap());
        assert!(!store.ensure_exists().await.unwrap());
        assert_eq!(std::fs::read_to_string(store.path()).unwrap(), "{}");
    }

    #[tokio::test]
    async fn test_init_files_creates_every_document() {
        let dir = TempDir::new().unwrap();
        let storage = Storage::open(dir.path());
        let mut created = storage.init_files().await.unwrap();
        created.sort();
        assert_eq!(
            created,
            vec![
                "admins.json",
                "banned.json",
                "force_sub.json",
                "links.json",
                "settings.json",
                "shortener.json",
                "users.json"
            ]
        );
        assert!(storage.init_files().await.unwrap().is_empty());
    }

    #[test]
    fn test_resolve_relative_and_absolute() {
        let storage = Storage::open("/data");
        assert_eq!(storage.resolve("img.jpg"), PathBuf::from("/data/img.jpg"));
        assert_eq!(storage.resolve("/srv/a.jpg"), PathBuf::from("/srv/a.jpg"));
    }

    #[test]
    fn test_timestamp_accepts_naive_and_writes_rfc3339() {
        let ts: Timestamp = serde_json::from_str("\"2025-02-01T08:00:00.123456\"").unwrap();
        let expected = Utc.with_ymd_and_hms(2025, 2, 1, 8, 0, 0).unwrap();
        assert_eq!(ts.0.timestamp(), expected.timestamp());

        let json = serde_json::to_string(&Timestamp(expected)).unwrap();
        assert_eq!(json, "\"2025-02-01T08:00:00+00:00\"");
        assert!(serde_json::from_str::<Timestamp>("\"soon\"").is_err());
    }
}
