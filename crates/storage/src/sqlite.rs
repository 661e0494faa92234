use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use rusqlite::{Connection, OptionalExtension};

use todadot_core::EntityId;

use crate::error::StorageError;
use crate::traits::{KeyValueStore, MemoStore};

/// SQLite-backed local store: the per-kind JSON blobs plus the memo side
/// table, behind one connection.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        crate::schema::init_schema(&conn)?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    pub fn open_in_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory()?;
        crate::schema::init_schema(&conn)?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, StorageError> {
        self.conn.lock().map_err(|_| StorageError::Poisoned)
    }

    /// Keys currently holding a blob, sorted.
    pub fn keys(&self) -> Result<Vec<String>, StorageError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT key FROM kv_store ORDER BY key")?;
        let keys = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(keys)
    }

    pub fn remove(&self, key: &str) -> Result<bool, StorageError> {
        let conn = self.conn()?;
        let changed = conn.execute("DELETE FROM kv_store WHERE key = ?1", rusqlite::params![key])?;
        Ok(changed > 0)
    }

    pub fn memo_count(&self) -> Result<u64, StorageError> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM memos", [], |row| row.get(0))?;
        Ok(count as u64)
    }
}

impl KeyValueStore for SqliteStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let conn = self.conn()?;
        let value = conn
            .query_row(
                "SELECT value FROM kv_store WHERE key = ?1",
                rusqlite::params![key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(value)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO kv_store (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value,
                 updated_at = CAST(unixepoch('now','subsec') * 1000 AS INTEGER)",
            rusqlite::params![key, value],
        )?;
        Ok(())
    }
}

impl MemoStore for SqliteStore {
    fn get_memo(&self, entity_id: &EntityId) -> Result<Option<String>, StorageError> {
        let conn = self.conn()?;
        let content = conn
            .query_row(
                "SELECT content FROM memos WHERE entity_id = ?1",
                rusqlite::params![entity_id.as_str()],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(content)
    }

    fn set_memo(&self, entity_id: &EntityId, content: &str) -> Result<(), StorageError> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO memos (entity_id, content) VALUES (?1, ?2)
             ON CONFLICT(entity_id) DO UPDATE SET content = excluded.content,
                 updated_at = CAST(unixepoch('now','subsec') * 1000 AS INTEGER)",
            rusqlite::params![entity_id.as_str(), content],
        )?;
        Ok(())
    }

    fn delete_memo(&self, entity_id: &EntityId) -> Result<(), StorageError> {
        let conn = self.conn()?;
        conn.execute(
            "DELETE FROM memos WHERE entity_id = ?1",
            rusqlite::params![entity_id.as_str()],
        )?;
        Ok(())
    }
}
