// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 kvidxkit

//! Memory-mapped B+tree storage adapter for kvidxkit, backed by LMDB via
//! `heed`.
//!
//! Keys are encoded big-endian so LMDB's native lexicographic byte
//! ordering already matches unsigned numeric order — unlike the SQLite
//! adapter, no bit-flip transform is needed here.
//!
//! Write transactions borrow from the environment for their duration.
//! Since `Backend::begin`/`commit`/`abort` are separate calls on `&mut
//! self` rather than a single scoped closure, the open `RwTxn` is stored
//! across calls by leaking a clone of the (internally reference-counted)
//! `Env` handle and reclaiming it when the transaction ends — the same
//! technique production LMDB wrappers use to let a write transaction
//! outlive a single call into the API.

use std::ops::Bound;
use std::path::{Path, PathBuf};

use heed::types::Bytes;
use heed::{Database, Env, EnvOpenOptions, RoTxn, RwTxn};
use kvidxkit_core::{Backend, Config, Error, Result, ValueRef};

fn map_err(err: heed::Error) -> Error {
    use heed::MdbError;
    match err {
        heed::Error::Mdb(MdbError::MapFull) => Error::DiskFull,
        heed::Error::Mdb(MdbError::KeyExist) => Error::DuplicateKey,
        heed::Error::Mdb(MdbError::NotFound) => Error::NotFound,
        heed::Error::Mdb(MdbError::Corrupted) | heed::Error::Mdb(MdbError::Invalid) => {
            Error::Corrupt(err.to_string())
        }
        heed::Error::Mdb(MdbError::Panic) => Error::Internal(err.to_string()),
        heed::Error::Io(io_err) => Error::from(io_err),
        other => Error::Internal(other.to_string()),
    }
}

struct ActiveTxn {
    leaked_env: *mut Env,
    txn: RwTxn<'static>,
}

/// LMDB-backed [`Backend`]. See the module docs for the transaction
/// lifetime technique.
pub struct HeedBackend {
    env: Env,
    db: Database<Bytes, Bytes>,
    ttl_db: Database<Bytes, Bytes>,
    path: PathBuf,
    active: Option<ActiveTxn>,
    read_only: bool,
}

// The environment, its databases, and the raw pointer used to extend a
// write transaction's lifetime are all only ever touched by the thread
// that owns this `HeedBackend` value; nothing here is shared concurrently.
unsafe impl Send for HeedBackend {}

impl HeedBackend {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        std::fs::create_dir_all(&path)?;
        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(4 * 1024 * 1024 * 1024 * 1024) // 4 TiB address space, LMDB only commits used pages
                .max_dbs(2)
                .open(&path)
        }
        .map_err(map_err)?;

        let mut wtxn = env.write_txn().map_err(map_err)?;
        let db: Database<Bytes, Bytes> = env.create_database(&mut wtxn, Some("records")).map_err(map_err)?;
        let ttl_db: Database<Bytes, Bytes> = env.create_database(&mut wtxn, Some("ttl")).map_err(map_err)?;
        wtxn.commit().map_err(map_err)?;

        tracing::debug!(path = %path.display(), "opened heed backend");
        Ok(Self { env, db, ttl_db, path, active: None, read_only: false })
    }

    fn with_ro<T>(&self, f: impl FnOnce(&RoTxn) -> heed::Result<T>) -> Result<T> {
        match &self.active {
            Some(active) => f(&active.txn).map_err(map_err),
            None => {
                let txn = self.env.read_txn().map_err(map_err)?;
                f(&txn).map_err(map_err)
            }
        }
    }

    fn with_rw<T>(&mut self, f: impl FnOnce(&mut RwTxn) -> heed::Result<T>) -> Result<T> {
        let active = self.active.as_mut().ok_or(Error::NoTransaction)?;
        f(&mut active.txn).map_err(map_err)
    }
}

impl Backend for HeedBackend {
    fn fsync(&self) -> Result<()> {
        self.env.force_sync().map_err(map_err)
    }

    fn begin(&mut self) -> Result<()> {
        if self.active.is_some() {
            return Ok(());
        }
        if self.read_only {
            return Err(Error::Readonly);
        }
        let leaked: &'static Env = Box::leak(Box::new(self.env.clone()));
        match leaked.write_txn() {
            Ok(txn) => {
                let leaked_env = leaked as *const Env as *mut Env;
                self.active = Some(ActiveTxn { leaked_env, txn });
                Ok(())
            }
            Err(err) => {
                unsafe { drop(Box::from_raw(leaked as *const Env as *mut Env)) };
                Err(map_err(err))
            }
        }
    }

    fn commit(&mut self) -> Result<()> {
        let Some(active) = self.active.take() else { return Ok(()) };
        let result = active.txn.commit();
        unsafe { drop(Box::from_raw(active.leaked_env)) };
        result.map_err(map_err)
    }

    fn abort(&mut self) -> Result<()> {
        let Some(active) = self.active.take() else { return Ok(()) };
        active.txn.abort();
        unsafe { drop(Box::from_raw(active.leaked_env)) };
        Ok(())
    }

    fn is_writing(&self) -> bool {
        self.active.is_some()
    }

    fn close(self: Box<Self>) -> Result<()> {
        let mut this = *self;
        if this.active.is_some() {
            this.abort()?;
        }
        Ok(())
    }

    fn raw_get(&self, key: u64) -> Result<Option<ValueRef<'_>>> {
        let k = key.to_be_bytes();
        let value = self.with_ro(|txn| Ok(self.db.get(txn, &k)?.map(|v| v.to_vec())))?;
        Ok(value.map(ValueRef::Owned))
    }

    fn raw_put(&mut self, key: u64, framed: &[u8]) -> Result<()> {
        let k = key.to_be_bytes();
        let db = self.db;
        self.with_rw(|txn| db.put(txn, &k, framed))
    }

    fn raw_delete(&mut self, key: u64) -> Result<bool> {
        let k = key.to_be_bytes();
        let db = self.db;
        self.with_rw(|txn| db.delete(txn, &k))
    }

    fn raw_max_key(&self) -> Result<Option<u64>> {
        self.with_ro(|txn| Ok(self.db.last(txn)?.map(|(k, _)| decode_key(k))))
    }

    fn raw_min_key(&self) -> Result<Option<u64>> {
        self.with_ro(|txn| Ok(self.db.first(txn)?.map(|(k, _)| decode_key(k))))
    }

    fn raw_next_key(&self, key: u64) -> Result<Option<u64>> {
        let target = key.to_be_bytes();
        self.with_ro(|txn| {
            let mut range = self.db.range(txn, &(Bound::Excluded(target.as_slice()), Bound::Unbounded))?;
            Ok(range.next().transpose()?.map(|(k, _)| decode_key(k)))
        })
    }

    fn raw_prev_key(&self, key: u64) -> Result<Option<u64>> {
        let target = key.to_be_bytes();
        self.with_ro(|txn| {
            let mut range = self.db.rev_range(txn, &(Bound::Unbounded, Bound::Excluded(target.as_slice())))?;
            Ok(range.next().transpose()?.map(|(k, _)| decode_key(k)))
        })
    }

    fn raw_key_count(&self) -> Result<u64> {
        self.with_ro(|txn| self.db.len(txn))
    }

    fn ttl_get(&self, key: u64) -> Result<Option<u64>> {
        let k = key.to_be_bytes();
        self.with_ro(|txn| Ok(self.ttl_db.get(txn, &k)?.map(decode_key)))
    }

    fn ttl_put(&mut self, key: u64, expiry_ms: u64) -> Result<()> {
        let k = key.to_be_bytes();
        let v = expiry_ms.to_be_bytes();
        let db = self.ttl_db;
        self.with_rw(|txn| db.put(txn, &k, &v))
    }

    fn ttl_delete(&mut self, key: u64) -> Result<()> {
        let k = key.to_be_bytes();
        let db = self.ttl_db;
        self.with_rw(|txn| db.delete(txn, &k).map(|_| ()))
    }

    fn ttl_scan_all(&self, limit: Option<u64>) -> Result<Vec<(u64, u64)>> {
        self.with_ro(|txn| {
            let mut out = Vec::new();
            for item in self.ttl_db.iter(txn)? {
                let (k, v) = item?;
                out.push((decode_key(k), decode_key(v)));
                if let Some(limit) = limit {
                    if out.len() as u64 >= limit {
                        break;
                    }
                }
            }
            Ok(out)
        })
    }

    fn file_size(&self) -> Result<u64> {
        Ok(std::fs::metadata(self.path.join("data.mdb"))?.len())
    }

    fn page_size(&self) -> Result<u64> {
        Ok(self.env.stat().map_err(map_err)?.page_size as u64)
    }

    fn page_count(&self) -> Result<u64> {
        let stat = self.env.stat().map_err(map_err)?;
        Ok((stat.branch_pages + stat.leaf_pages + stat.overflow_pages) as u64)
    }

    fn apply_config(&mut self, config: &Config) -> Result<()> {
        self.read_only = config.read_only;
        tracing::debug!(
            "heed backend has no runtime-tunable journal/sync pragmas; most Config fields are ignored"
        );
        Ok(())
    }
}

fn decode_key(bytes: &[u8]) -> u64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&bytes[..8]);
    u64::from_be_bytes(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use kvidxkit_core::{decode_value, encode_value};
    use tempfile::tempdir;

    fn open_temp() -> (tempfile::TempDir, HeedBackend) {
        let dir = tempdir().unwrap();
        let backend = HeedBackend::open(dir.path()).unwrap();
        (dir, backend)
    }

    #[test]
    fn put_then_get_round_trips() {
        let (_dir, mut backend) = open_temp();
        backend.begin().unwrap();
        backend.raw_put(7, &encode_value(1, 2, b"hello")).unwrap();
        backend.commit().unwrap();

        let framed = backend.raw_get(7).unwrap().unwrap();
        let (term, cmd, payload) = decode_value(framed.as_slice());
        assert_eq!((term, cmd, payload), (1, 2, b"hello".as_slice()));
    }

    #[test]
    fn navigation_respects_unsigned_ordering() {
        let (_dir, mut backend) = open_temp();
        backend.begin().unwrap();
        backend.raw_put(1, &encode_value(0, 0, b"a")).unwrap();
        backend.raw_put(u64::MAX, &encode_value(0, 0, b"b")).unwrap();
        backend.commit().unwrap();

        assert_eq!(backend.raw_max_key().unwrap(), Some(u64::MAX));
        assert_eq!(backend.raw_next_key(1).unwrap(), Some(u64::MAX));
        assert_eq!(backend.raw_next_key(u64::MAX).unwrap(), None);
    }

    #[test]
    fn abort_discards_uncommitted_writes() {
        let (_dir, mut backend) = open_temp();
        backend.begin().unwrap();
        backend.raw_put(1, &encode_value(0, 0, b"a")).unwrap();
        backend.abort().unwrap();
        assert!(backend.raw_get(1).unwrap().is_none());
    }
}
