// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 kvidxkit

//! Single-file SQLite storage adapter for kvidxkit.
//!
//! A `records` table holds the main namespace, a `ttl` table holds
//! expirations. Keys are stored as `INTEGER PRIMARY KEY` after an
//! order-preserving transform ([`to_sql_key`]) because SQLite's native
//! integer column is signed 64-bit and keys here are unsigned
//! (`u64::MAX` must sort last, not as `-1`).

use std::path::{Path, PathBuf};

use kvidxkit_core::{Backend, Config, Error, JournalMode, Result, SyncMode, ValueRef};
use rusqlite::{params, Connection, OptionalExtension};

/// Flips the top bit so that ordering an `i64` column numerically matches
/// ordering the original `u64` key. Its own inverse.
fn to_sql_key(key: u64) -> i64 {
    (key ^ (1u64 << 63)) as i64
}

fn from_sql_key(value: i64) -> u64 {
    (value as u64) ^ (1u64 << 63)
}

fn map_err(err: rusqlite::Error) -> Error {
    use rusqlite::ErrorCode;
    match err {
        rusqlite::Error::QueryReturnedNoRows => Error::NotFound,
        rusqlite::Error::SqliteFailure(ffi, msg) => {
            let detail = msg.unwrap_or_default();
            match ffi.code {
                ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked => Error::Locked(detail),
                ErrorCode::DiskFull => Error::DiskFull,
                ErrorCode::ReadOnly => Error::Readonly,
                ErrorCode::OutOfMemory => Error::NoMem,
                ErrorCode::ConstraintViolation => Error::Constraint(detail),
                ErrorCode::DatabaseCorrupt | ErrorCode::NotADatabase => Error::Corrupt(detail),
                _ => Error::Internal(format!("sqlite: {detail}")),
            }
        }
        other => Error::Internal(other.to_string()),
    }
}

/// SQLite-backed [`Backend`]. One open connection per instance; the
/// single-writer contract means we never need a connection pool.
pub struct SqliteBackend {
    conn: Connection,
    path: PathBuf,
    writing: bool,
    read_only: bool,
}

impl SqliteBackend {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let conn = Connection::open(&path).map_err(map_err)?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS records (key INTEGER PRIMARY KEY, value BLOB NOT NULL);
             CREATE TABLE IF NOT EXISTS ttl (key INTEGER PRIMARY KEY, expiry_ms INTEGER NOT NULL);",
        )
        .map_err(map_err)?;
        tracing::debug!(path = %path.display(), "opened sqlite backend");
        Ok(Self { conn, path, writing: false, read_only: false })
    }
}

impl Backend for SqliteBackend {
    fn fsync(&self) -> Result<()> {
        self.conn.execute_batch("PRAGMA wal_checkpoint(PASSIVE);").map_err(map_err)
    }

    fn begin(&mut self) -> Result<()> {
        if self.writing {
            return Ok(());
        }
        if self.read_only {
            return Err(Error::Readonly);
        }
        self.conn.execute_batch("BEGIN IMMEDIATE;").map_err(map_err)?;
        self.writing = true;
        Ok(())
    }

    fn commit(&mut self) -> Result<()> {
        if !self.writing {
            return Ok(());
        }
        self.conn.execute_batch("COMMIT;").map_err(map_err)?;
        self.writing = false;
        Ok(())
    }

    fn abort(&mut self) -> Result<()> {
        if !self.writing {
            return Ok(());
        }
        self.conn.execute_batch("ROLLBACK;").map_err(map_err)?;
        self.writing = false;
        Ok(())
    }

    fn is_writing(&self) -> bool {
        self.writing
    }

    fn close(self: Box<Self>) -> Result<()> {
        let this = *self;
        this.conn.close().map_err(|(_, err)| map_err(err))
    }

    fn raw_get(&self, key: u64) -> Result<Option<ValueRef<'_>>> {
        let value: Option<Vec<u8>> = self
            .conn
            .query_row("SELECT value FROM records WHERE key = ?1", params![to_sql_key(key)], |row| row.get(0))
            .optional()
            .map_err(map_err)?;
        Ok(value.map(ValueRef::Owned))
    }

    fn raw_put(&mut self, key: u64, framed: &[u8]) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO records(key, value) VALUES (?1, ?2)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value",
                params![to_sql_key(key), framed],
            )
            .map_err(map_err)?;
        Ok(())
    }

    fn raw_delete(&mut self, key: u64) -> Result<bool> {
        let changed = self
            .conn
            .execute("DELETE FROM records WHERE key = ?1", params![to_sql_key(key)])
            .map_err(map_err)?;
        Ok(changed > 0)
    }

    fn raw_max_key(&self) -> Result<Option<u64>> {
        let raw: Option<i64> = self
            .conn
            .query_row("SELECT MAX(key) FROM records", [], |row| row.get(0))
            .map_err(map_err)?;
        Ok(raw.map(from_sql_key))
    }

    fn raw_min_key(&self) -> Result<Option<u64>> {
        let raw: Option<i64> = self
            .conn
            .query_row("SELECT MIN(key) FROM records", [], |row| row.get(0))
            .map_err(map_err)?;
        Ok(raw.map(from_sql_key))
    }

    fn raw_next_key(&self, key: u64) -> Result<Option<u64>> {
        let raw: Option<i64> = self
            .conn
            .query_row(
                "SELECT key FROM records WHERE key > ?1 ORDER BY key ASC LIMIT 1",
                params![to_sql_key(key)],
                |row| row.get(0),
            )
            .optional()
            .map_err(map_err)?
            .flatten();
        Ok(raw.map(from_sql_key))
    }

    fn raw_prev_key(&self, key: u64) -> Result<Option<u64>> {
        let raw: Option<i64> = self
            .conn
            .query_row(
                "SELECT key FROM records WHERE key < ?1 ORDER BY key DESC LIMIT 1",
                params![to_sql_key(key)],
                |row| row.get(0),
            )
            .optional()
            .map_err(map_err)?
            .flatten();
        Ok(raw.map(from_sql_key))
    }

    fn raw_key_count(&self) -> Result<u64> {
        let count: i64 =
            self.conn.query_row("SELECT COUNT(*) FROM records", [], |row| row.get(0)).map_err(map_err)?;
        Ok(count as u64)
    }

    fn ttl_get(&self, key: u64) -> Result<Option<u64>> {
        let raw: Option<i64> = self
            .conn
            .query_row("SELECT expiry_ms FROM ttl WHERE key = ?1", params![to_sql_key(key)], |row| row.get(0))
            .optional()
            .map_err(map_err)?;
        Ok(raw.map(|v| v as u64))
    }

    fn ttl_put(&mut self, key: u64, expiry_ms: u64) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO ttl(key, expiry_ms) VALUES (?1, ?2)
                 ON CONFLICT(key) DO UPDATE SET expiry_ms = excluded.expiry_ms",
                params![to_sql_key(key), expiry_ms as i64],
            )
            .map_err(map_err)?;
        Ok(())
    }

    fn ttl_delete(&mut self, key: u64) -> Result<()> {
        self.conn.execute("DELETE FROM ttl WHERE key = ?1", params![to_sql_key(key)]).map_err(map_err)?;
        Ok(())
    }

    fn ttl_scan_all(&self, limit: Option<u64>) -> Result<Vec<(u64, u64)>> {
        let sql = match limit {
            Some(n) => format!("SELECT key, expiry_ms FROM ttl ORDER BY key ASC LIMIT {n}"),
            None => "SELECT key, expiry_ms FROM ttl ORDER BY key ASC".to_string(),
        };
        let mut stmt = self.conn.prepare(&sql).map_err(map_err)?;
        let rows = stmt
            .query_map([], |row| {
                let key: i64 = row.get(0)?;
                let expiry: i64 = row.get(1)?;
                Ok((from_sql_key(key), expiry as u64))
            })
            .map_err(map_err)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(map_err)
    }

    fn file_size(&self) -> Result<u64> {
        Ok(std::fs::metadata(&self.path)?.len())
    }

    fn page_size(&self) -> Result<u64> {
        let size: i64 = self.conn.query_row("PRAGMA page_size", [], |row| row.get(0)).map_err(map_err)?;
        Ok(size as u64)
    }

    fn page_count(&self) -> Result<u64> {
        let count: i64 = self.conn.query_row("PRAGMA page_count", [], |row| row.get(0)).map_err(map_err)?;
        Ok(count as u64)
    }

    fn apply_config(&mut self, config: &Config) -> Result<()> {
        self.conn.pragma_update(None, "query_only", config.read_only).map_err(map_err)?;
        self.read_only = config.read_only;

        let journal_mode = match config.journal_mode {
            JournalMode::Delete => "DELETE",
            JournalMode::Truncate => "TRUNCATE",
            JournalMode::Persist => "PERSIST",
            JournalMode::Memory => "MEMORY",
            JournalMode::Wal => "WAL",
            JournalMode::Off => "OFF",
        };
        self.conn.pragma_update(None, "journal_mode", journal_mode).map_err(map_err)?;

        let sync_mode = match config.sync_mode {
            SyncMode::Off => "OFF",
            SyncMode::Normal => "NORMAL",
            SyncMode::Full => "FULL",
            SyncMode::Extra => "EXTRA",
        };
        self.conn.pragma_update(None, "synchronous", sync_mode).map_err(map_err)?;

        // cache_size is pages when positive, kibibytes when negative.
        let cache_kib = (config.cache_size_bytes / 1024).max(1) as i64;
        self.conn.pragma_update(None, "cache_size", -cache_kib).map_err(map_err)?;
        self.conn
            .pragma_update(None, "recursive_triggers", config.enable_recursive_triggers)
            .map_err(map_err)?;
        self.conn.pragma_update(None, "foreign_keys", config.enable_foreign_keys).map_err(map_err)?;
        self.conn.busy_timeout(std::time::Duration::from_millis(config.busy_timeout_ms as u64)).map_err(map_err)?;
        if config.mmap_size_bytes > 0 {
            self.conn.pragma_update(None, "mmap_size", config.mmap_size_bytes as i64).map_err(map_err)?;
        }
        if config.page_size > 0 {
            // Only takes effect on an empty database; SQLite silently
            // ignores it otherwise, which is fine: adapters may ignore
            // settings that no longer apply.
            if let Err(err) = self.conn.pragma_update(None, "page_size", config.page_size) {
                tracing::debug!(error = %err, "page_size pragma ignored (database already has pages)");
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kvidxkit_core::{decode_value, encode_value};
    use tempfile::tempdir;

    fn open_temp() -> (tempfile::TempDir, SqliteBackend) {
        let dir = tempdir().unwrap();
        let backend = SqliteBackend::open(dir.path().join("store.db")).unwrap();
        (dir, backend)
    }

    #[test]
    fn put_then_get_round_trips() {
        let (_dir, mut backend) = open_temp();
        backend.raw_put(42, &encode_value(1, 2, b"hello")).unwrap();
        let framed = backend.raw_get(42).unwrap().unwrap();
        let (term, cmd, payload) = decode_value(framed.as_slice());
        assert_eq!((term, cmd, payload), (1, 2, b"hello".as_slice()));
    }

    #[test]
    fn ordering_handles_high_bit_keys() {
        let (_dir, mut backend) = open_temp();
        backend.raw_put(1, &encode_value(0, 0, b"a")).unwrap();
        backend.raw_put(u64::MAX, &encode_value(0, 0, b"b")).unwrap();
        assert_eq!(backend.raw_max_key().unwrap(), Some(u64::MAX));
        assert_eq!(backend.raw_min_key().unwrap(), Some(1));
        assert_eq!(backend.raw_next_key(1).unwrap(), Some(u64::MAX));
        assert_eq!(backend.raw_prev_key(u64::MAX).unwrap(), Some(1));
    }

    #[test]
    fn begin_is_idempotent_while_writing() {
        let (_dir, mut backend) = open_temp();
        backend.begin().unwrap();
        backend.begin().unwrap();
        assert!(backend.is_writing());
        backend.commit().unwrap();
        assert!(!backend.is_writing());
    }
}
