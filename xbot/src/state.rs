//! Durable state storage.
//!
//! The bot keeps two small documents ("poster_state", "monitor_state") that
//! must survive restarts. `StateStore` hides the backend so policy code never
//! touches files or SQL directly: a JSON-file backend (one file per document,
//! written atomically via temp-file rename) and a SQLite backend (one
//! documents table).
//!
//! Save-after-every-mutation, never batched: a killed run loses at most the
//! in-flight action.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};
use rusqlite::Connection;
use serde::Serialize;
use serde::de::DeserializeOwned;

/// Backend-agnostic document store.
pub trait StateStore: Send + Sync {
    /// Load a document's raw JSON, or `None` if it was never saved.
    fn load(&self, doc: &str) -> Result<Option<String>>;
    /// Durably replace a document.
    fn save(&self, doc: &str, contents: &str) -> Result<()>;
}

/// Load and deserialize a document, defaulting when absent.
///
/// A corrupt document is logged and replaced with the default rather than
/// aborting the run.
pub fn load_doc<T: DeserializeOwned + Default>(store: &dyn StateStore, doc: &str) -> Result<T> {
    match store.load(doc)? {
        Some(raw) => match serde_json::from_str(&raw) {
            Ok(value) => Ok(value),
            Err(e) => {
                tracing::warn!(doc, error = %e, "Failed to parse saved state, starting fresh");
                Ok(T::default())
            }
        },
        None => Ok(T::default()),
    }
}

/// Serialize and save a document.
pub fn save_doc<T: Serialize>(store: &dyn StateStore, doc: &str, value: &T) -> Result<()> {
    let raw = serde_json::to_string_pretty(value)
        .with_context(|| format!("Failed to serialize {doc}"))?;
    store.save(doc, &raw)
}

/// One JSON file per document under a data directory.
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create state dir {}", dir.display()))?;
        Ok(Self { dir })
    }

    fn path_for(&self, doc: &str) -> PathBuf {
        self.dir.join(format!("{doc}.json"))
    }
}

impl StateStore for JsonFileStore {
    fn load(&self, doc: &str) -> Result<Option<String>> {
        let path = self.path_for(doc);
        if !path.exists() {
            return Ok(None);
        }
        let raw = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Ok(Some(raw))
    }

    fn save(&self, doc: &str, contents: &str) -> Result<()> {
        let path = self.path_for(doc);
        // Write-then-rename so a crash mid-save never truncates the document.
        let tmp = self.dir.join(format!("{doc}.json.tmp"));
        std::fs::write(&tmp, contents)
            .with_context(|| format!("Failed to write {}", tmp.display()))?;
        std::fs::rename(&tmp, &path)
            .with_context(|| format!("Failed to replace {}", path.display()))?;
        Ok(())
    }
}

/// SQLite-backed store: a single `documents` table keyed by name.
pub struct SqliteStore {
    db: Mutex<Connection>,
}

impl SqliteStore {
    /// Open or create the database at the given path.
    pub fn open(path: &Path) -> Result<Self> {
        let db = Connection::open(path).context("Failed to open state database")?;
        db.execute_batch(
            "CREATE TABLE IF NOT EXISTS documents (
                name TEXT PRIMARY KEY,
                contents TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );",
        )?;
        Ok(Self { db: Mutex::new(db) })
    }

    /// In-memory database (for testing).
    pub fn in_memory() -> Result<Self> {
        Self::open(Path::new(":memory:"))
    }
}

impl StateStore for SqliteStore {
    fn load(&self, doc: &str) -> Result<Option<String>> {
        let db = self.db.lock().unwrap();
        let mut stmt = db.prepare("SELECT contents FROM documents WHERE name = ?1")?;
        use rusqlite::OptionalExtension;
        let row = stmt
            .query_row(rusqlite::params![doc], |row| row.get::<_, String>(0))
            .optional()?;
        Ok(row)
    }

    fn save(&self, doc: &str, contents: &str) -> Result<()> {
        let db = self.db.lock().unwrap();
        let now = chrono::Utc::now().to_rfc3339();
        db.execute(
            "INSERT OR REPLACE INTO documents (name, contents, updated_at)
             VALUES (?1, ?2, ?3)",
            rusqlite::params![doc, contents, now],
        )?;
        Ok(())
    }
}
