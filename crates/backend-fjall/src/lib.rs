// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 kvidxkit

//! Pure-Rust LSM storage adapter for kvidxkit, backed by `fjall`.
//!
//! `fjall` applies writes to a partition as soon as they're made rather
//! than staging them behind a transaction handle, so `begin`/`commit`/
//! `abort` are implemented with a small undo log instead: every
//! `raw_put`/`raw_delete` records the value it overwrote, and `abort`
//! replays that log backwards to restore the prior state. `commit` just
//! discards the log and flushes.

use std::path::{Path, PathBuf};

use fjall::{Config, Keyspace, PartitionCreateOptions, PartitionHandle, PersistMode};
use kvidxkit_core::{Backend, Error, Result, ValueRef};

fn map_err(err: fjall::Error) -> Error {
    match err {
        fjall::Error::Io(io_err) => Error::from(io_err),
        other => Error::Corrupt(other.to_string()),
    }
}

enum UndoOp {
    Main { key: u64, old: Option<Vec<u8>> },
    Ttl { key: u64, old: Option<u64> },
}

/// LSM-backed [`Backend`]. See the module docs for the undo-log
/// transaction technique.
pub struct FjallBackend {
    #[allow(dead_code)]
    keyspace: Keyspace,
    records: PartitionHandle,
    ttl: PartitionHandle,
    path: PathBuf,
    undo: Option<Vec<UndoOp>>,
    read_only: bool,
}

impl FjallBackend {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let keyspace = Config::new(&path).open().map_err(map_err)?;
        let records = keyspace
            .open_partition("records", PartitionCreateOptions::default())
            .map_err(map_err)?;
        let ttl = keyspace.open_partition("ttl", PartitionCreateOptions::default()).map_err(map_err)?;
        tracing::debug!(path = %path.display(), "opened fjall backend");
        Ok(Self { keyspace, records, ttl, path, undo: None, read_only: false })
    }

    fn require_txn(&mut self) -> Result<&mut Vec<UndoOp>> {
        self.undo.as_mut().ok_or(Error::NoTransaction)
    }
}

impl Backend for FjallBackend {
    fn fsync(&self) -> Result<()> {
        self.keyspace.persist(PersistMode::SyncAll).map_err(map_err)
    }

    fn begin(&mut self) -> Result<()> {
        if self.undo.is_some() {
            return Ok(());
        }
        if self.read_only {
            return Err(Error::Readonly);
        }
        self.undo = Some(Vec::new());
        Ok(())
    }

    fn commit(&mut self) -> Result<()> {
        if self.undo.take().is_none() {
            return Ok(());
        }
        self.keyspace.persist(PersistMode::SyncAll).map_err(map_err)
    }

    fn abort(&mut self) -> Result<()> {
        let Some(ops) = self.undo.take() else { return Ok(()) };
        for op in ops.into_iter().rev() {
            match op {
                UndoOp::Main { key, old } => match old {
                    Some(v) => self.records.insert(key.to_be_bytes(), v).map_err(map_err)?,
                    None => self.records.remove(key.to_be_bytes()).map_err(map_err)?,
                },
                UndoOp::Ttl { key, old } => match old {
                    Some(ms) => self.ttl.insert(key.to_be_bytes(), ms.to_be_bytes()).map_err(map_err)?,
                    None => self.ttl.remove(key.to_be_bytes()).map_err(map_err)?,
                },
            }
        }
        Ok(())
    }

    fn is_writing(&self) -> bool {
        self.undo.is_some()
    }

    fn close(self: Box<Self>) -> Result<()> {
        let mut this = *self;
        if this.undo.is_some() {
            this.abort()?;
        }
        Ok(())
    }

    fn raw_get(&self, key: u64) -> Result<Option<ValueRef<'_>>> {
        let value = self.records.get(key.to_be_bytes()).map_err(map_err)?;
        Ok(value.map(|slice| ValueRef::Owned(slice.to_vec())))
    }

    fn raw_put(&mut self, key: u64, framed: &[u8]) -> Result<()> {
        let old = self.records.get(key.to_be_bytes()).map_err(map_err)?.map(|s| s.to_vec());
        self.records.insert(key.to_be_bytes(), framed).map_err(map_err)?;
        self.require_txn()?.push(UndoOp::Main { key, old });
        Ok(())
    }

    fn raw_delete(&mut self, key: u64) -> Result<bool> {
        let old = self.records.get(key.to_be_bytes()).map_err(map_err)?.map(|s| s.to_vec());
        let existed = old.is_some();
        self.records.remove(key.to_be_bytes()).map_err(map_err)?;
        self.require_txn()?.push(UndoOp::Main { key, old });
        Ok(existed)
    }

    fn raw_max_key(&self) -> Result<Option<u64>> {
        Ok(self.records.last_key_value().map_err(map_err)?.map(|(k, _)| decode_key(&k)))
    }

    fn raw_min_key(&self) -> Result<Option<u64>> {
        Ok(self.records.first_key_value().map_err(map_err)?.map(|(k, _)| decode_key(&k)))
    }

    fn raw_next_key(&self, key: u64) -> Result<Option<u64>> {
        let target = key.to_be_bytes();
        let mut range = self.records.range((std::ops::Bound::Excluded(target.to_vec()), std::ops::Bound::Unbounded));
        match range.next() {
            Some(item) => {
                let (k, _) = item.map_err(map_err)?;
                Ok(Some(decode_key(&k)))
            }
            None => Ok(None),
        }
    }

    fn raw_prev_key(&self, key: u64) -> Result<Option<u64>> {
        let target = key.to_be_bytes();
        let mut range = self
            .records
            .range((std::ops::Bound::Unbounded, std::ops::Bound::Excluded(target.to_vec())))
            .rev();
        match range.next() {
            Some(item) => {
                let (k, _) = item.map_err(map_err)?;
                Ok(Some(decode_key(&k)))
            }
            None => Ok(None),
        }
    }

    fn raw_key_count(&self) -> Result<u64> {
        Ok(self.records.len().map_err(map_err)? as u64)
    }

    fn ttl_get(&self, key: u64) -> Result<Option<u64>> {
        Ok(self.ttl.get(key.to_be_bytes()).map_err(map_err)?.map(|v| decode_key(&v)))
    }

    fn ttl_put(&mut self, key: u64, expiry_ms: u64) -> Result<()> {
        let old = self.ttl.get(key.to_be_bytes()).map_err(map_err)?.map(|v| decode_key(&v));
        self.ttl.insert(key.to_be_bytes(), expiry_ms.to_be_bytes()).map_err(map_err)?;
        self.require_txn()?.push(UndoOp::Ttl { key, old });
        Ok(())
    }

    fn ttl_delete(&mut self, key: u64) -> Result<()> {
        let old = self.ttl.get(key.to_be_bytes()).map_err(map_err)?.map(|v| decode_key(&v));
        self.ttl.remove(key.to_be_bytes()).map_err(map_err)?;
        self.require_txn()?.push(UndoOp::Ttl { key, old });
        Ok(())
    }

    fn ttl_scan_all(&self, limit: Option<u64>) -> Result<Vec<(u64, u64)>> {
        let mut out = Vec::new();
        for item in self.ttl.iter() {
            let (k, v) = item.map_err(map_err)?;
            out.push((decode_key(&k), decode_key(&v)));
            if let Some(limit) = limit {
                if out.len() as u64 >= limit {
                    break;
                }
            }
        }
        Ok(out)
    }

    fn file_size(&self) -> Result<u64> {
        Ok(dir_size(&self.path)?)
    }

    /// `fjall`'s LSM layout has no fixed page size; both fields are left at
    /// zero per the "adapter cannot compute this" convention documented on
    /// [`kvidxkit_core::Stats`].
    fn page_size(&self) -> Result<u64> {
        Ok(0)
    }

    fn page_count(&self) -> Result<u64> {
        Ok(0)
    }

    fn apply_config(&mut self, config: &kvidxkit_core::Config) -> Result<()> {
        self.read_only = config.read_only;
        tracing::debug!("fjall backend has no runtime-tunable journal/sync pragmas; most Config fields are ignored");
        Ok(())
    }
}

fn decode_key(bytes: &[u8]) -> u64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&bytes[..8]);
    u64::from_be_bytes(buf)
}

fn dir_size(path: &Path) -> Result<u64> {
    let mut total = 0u64;
    for entry in std::fs::read_dir(path)? {
        let entry = entry?;
        let meta = entry.metadata()?;
        if meta.is_dir() {
            total += dir_size(&entry.path())?;
        } else {
            total += meta.len();
        }
    }
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use kvidxkit_core::{decode_value, encode_value};
    use tempfile::tempdir;

    fn open_temp() -> (tempfile::TempDir, FjallBackend) {
        let dir = tempdir().unwrap();
        let backend = FjallBackend::open(dir.path()).unwrap();
        (dir, backend)
    }

    #[test]
    fn put_then_get_round_trips() {
        let (_dir, mut backend) = open_temp();
        backend.begin().unwrap();
        backend.raw_put(3, &encode_value(1, 2, b"hi")).unwrap();
        backend.commit().unwrap();

        let framed = backend.raw_get(3).unwrap().unwrap();
        let (term, cmd, payload) = decode_value(framed.as_slice());
        assert_eq!((term, cmd, payload), (1, 2, b"hi".as_slice()));
    }

    #[test]
    fn abort_restores_previous_value_via_undo_log() {
        let (_dir, mut backend) = open_temp();
        backend.begin().unwrap();
        backend.raw_put(3, &encode_value(1, 2, b"original")).unwrap();
        backend.commit().unwrap();

        backend.begin().unwrap();
        backend.raw_put(3, &encode_value(1, 2, b"overwritten")).unwrap();
        backend.abort().unwrap();

        let framed = backend.raw_get(3).unwrap().unwrap();
        let (_, _, payload) = decode_value(framed.as_slice());
        assert_eq!(payload, b"original");
    }

    #[test]
    fn navigation_skips_to_next_existing_key() {
        let (_dir, mut backend) = open_temp();
        backend.begin().unwrap();
        backend.raw_put(1, &encode_value(0, 0, b"a")).unwrap();
        backend.raw_put(100, &encode_value(0, 0, b"b")).unwrap();
        backend.commit().unwrap();

        assert_eq!(backend.raw_next_key(1).unwrap(), Some(100));
        assert_eq!(backend.raw_prev_key(100).unwrap(), Some(1));
    }
}
