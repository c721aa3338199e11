// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 kvidxkit

//! The polymorphic backend interface and the default method bodies that
//! implement core CRUD, navigation, range operations, storage primitives,
//! and TTL once, atop a small required surface every adapter must
//! provide.

use crate::autocommit::AutoCommit;
use crate::bytes::ValueRef;
use crate::codec::{decode_value, encode_value};
use crate::condition::SetCondition;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::record::{OwnedRecord, Record};
use crate::stats::Stats;
use crate::ttl;

/// One implementation per storage engine. Every operation is a method
/// here and is reachable through `dyn Backend`; most have default bodies
/// so an adapter only needs to implement the required raw surface below.
pub trait Backend: Send {
    // ============================================================
    // Required: lifecycle, transactions
    // ============================================================

    /// Flushes any buffered writes to durable storage.
    fn fsync(&self) -> Result<()>;

    /// `Closed|Open(idle) -> Open(writing)`. A no-op if already writing.
    fn begin(&mut self) -> Result<()>;

    /// `Open(writing) -> Open(idle)`. A no-op if not writing.
    fn commit(&mut self) -> Result<()>;

    /// `Open(writing) -> Open(idle)`, discarding buffered changes. A no-op
    /// if not writing.
    fn abort(&mut self) -> Result<()>;

    /// True between `begin` and the matching `commit`/`abort`.
    fn is_writing(&self) -> bool;

    /// Releases the underlying environment. Any open write transaction is
    /// aborted and all borrowed read pointers are invalidated by virtue of
    /// `self` being consumed.
    fn close(self: Box<Self>) -> Result<()>;

    // ============================================================
    // Required: raw record storage, main namespace
    // ============================================================

    /// Fetches the framed `(term, cmd, payload)` blob for `key`, or `None`.
    fn raw_get(&self, key: u64) -> Result<Option<ValueRef<'_>>>;

    /// Unconditionally stores a pre-framed blob for `key`, overwriting any
    /// existing value.
    fn raw_put(&mut self, key: u64, framed: &[u8]) -> Result<()>;

    /// Deletes `key`, returning whether it was present.
    fn raw_delete(&mut self, key: u64) -> Result<bool>;

    /// The greatest stored key, or `None` if empty.
    fn raw_max_key(&self) -> Result<Option<u64>>;

    /// The smallest stored key, or `None` if empty.
    fn raw_min_key(&self) -> Result<Option<u64>>;

    /// The smallest stored key strictly greater than `key`.
    fn raw_next_key(&self, key: u64) -> Result<Option<u64>>;

    /// The greatest stored key strictly less than `key`.
    fn raw_prev_key(&self, key: u64) -> Result<Option<u64>>;

    /// Number of records in the main namespace.
    fn raw_key_count(&self) -> Result<u64>;

    // ============================================================
    // Required: TTL namespace
    // ============================================================

    fn ttl_get(&self, key: u64) -> Result<Option<u64>>;
    fn ttl_put(&mut self, key: u64, expiry_ms: u64) -> Result<()>;
    fn ttl_delete(&mut self, key: u64) -> Result<()>;

    /// Ascending-by-key scan of the TTL namespace, bounded by `limit`
    /// entries (`None` means unbounded). Used by `expire_scan`'s default
    /// implementation.
    fn ttl_scan_all(&self, limit: Option<u64>) -> Result<Vec<(u64, u64)>>;

    // ============================================================
    // Required: engine statistics and configuration
    // ============================================================

    fn file_size(&self) -> Result<u64>;
    fn page_size(&self) -> Result<u64>;
    fn page_count(&self) -> Result<u64>;
    fn apply_config(&mut self, config: &Config) -> Result<()>;

    // ============================================================
    // Default: core CRUD
    // ============================================================

    /// Returns `false` via `Ok(None)`, never modifies state.
    fn get(&self, key: u64) -> Result<Option<Record<'_>>> {
        match self.raw_get(key)? {
            None => Ok(None),
            Some(framed) => {
                let (term, cmd, payload) = decode_value(framed.as_slice());
                let payload = payload.to_vec();
                Ok(Some(Record::new(key, term, cmd, ValueRef::Owned(payload))))
            }
        }
    }

    /// Fails with `DuplicateKey` if `key` already exists.
    fn insert(&mut self, key: u64, term: u64, cmd: u64, payload: &[u8]) -> Result<()> {
        let mut guard = AutoCommit::new(self)?;
        if guard.backend().raw_get(key)?.is_some() {
            return Err(Error::DuplicateKey);
        }
        guard.backend().raw_put(key, &encode_value(term, cmd, payload))?;
        guard.commit()?;
        tracing::trace!(key, "inserted record");
        Ok(())
    }

    /// Idempotent: succeeds whether or not `key` existed. Also clears any
    /// TTL entry for the key, avoiding an immediately-stale TTL entry
    /// left behind.
    fn remove(&mut self, key: u64) -> Result<()> {
        let mut guard = AutoCommit::new(self)?;
        guard.backend().raw_delete(key)?;
        guard.backend().ttl_delete(key)?;
        guard.commit()
    }

    fn exists(&self, key: u64) -> Result<bool> {
        Ok(self.raw_get(key)?.is_some())
    }

    /// True iff the record exists *and* its stored term equals `term`.
    /// Defined only against `term`, not `cmd`; this asymmetry is intentional.
    fn exists_dual(&self, key: u64, term: u64) -> Result<bool> {
        match self.raw_get(key)? {
            None => Ok(false),
            Some(framed) => {
                let (stored_term, _, _) = decode_value(framed.as_slice());
                Ok(stored_term == term)
            }
        }
    }

    /// `Ok(None)` signals an empty store (vtable-boolean-false translation).
    fn max_key(&self) -> Result<Option<u64>> {
        self.raw_max_key()
    }

    /// `Err(NotFound)` signals an empty store — kept asymmetric with
    /// `max_key` for API-compatibility reasons (see `DESIGN.md`).
    fn min_key(&self) -> Result<u64> {
        self.raw_min_key()?.ok_or(Error::NotFound)
    }

    // ============================================================
    // Default: navigation
    // ============================================================

    /// `getNext(u64::MAX)` always fails: nothing is strictly greater.
    fn get_next(&self, key: u64) -> Result<Option<u64>> {
        self.raw_next_key(key)
    }

    fn get_prev(&self, key: u64) -> Result<Option<u64>> {
        self.raw_prev_key(key)
    }

    // ============================================================
    // Default: range operations
    // ============================================================

    /// Inclusive on both ends.
    fn count_range(&self, start: u64, end: u64) -> Result<u64> {
        if start > end {
            return Ok(0);
        }
        let mut count = 0u64;
        let mut cursor = self.raw_next_key(start.wrapping_sub(1))?;
        if start == 0 {
            // there is no "start - 1" to seek from; treat key 0 itself as the
            // first candidate.
            cursor = if self.raw_get(0)?.is_some() { Some(0) } else { self.raw_next_key(0)? };
        }
        while let Some(key) = cursor {
            if key > end {
                break;
            }
            count += 1;
            cursor = self.raw_next_key(key)?;
        }
        Ok(count)
    }

    fn exists_in_range(&self, start: u64, end: u64) -> Result<bool> {
        Ok(self.count_range(start, end)? > 0)
    }

    /// `start > end` after applying exclusivity is a no-op.
    fn remove_range(
        &mut self,
        start: u64,
        end: u64,
        start_inclusive: bool,
        end_inclusive: bool,
    ) -> Result<u64> {
        let lo = if start_inclusive { start } else { start.saturating_add(1) };
        let hi = if end_inclusive { end } else { end.saturating_sub(1) };
        if lo > hi {
            return Ok(0);
        }
        let mut guard = AutoCommit::new(self)?;
        let keys = collect_range_keys(guard.backend(), lo, hi)?;
        let mut deleted = 0u64;
        for key in keys {
            if guard.backend().raw_delete(key)? {
                guard.backend().ttl_delete(key)?;
                deleted += 1;
            }
        }
        guard.commit()?;
        Ok(deleted)
    }

    /// Deletes all keys `>= key`.
    fn remove_after_n_inclusive(&mut self, key: u64) -> Result<u64> {
        let max = match self.raw_max_key()? {
            Some(m) => m,
            None => return Ok(0),
        };
        self.remove_range(key, max, true, true)
    }

    /// Deletes all keys `<= key`.
    fn remove_before_n_inclusive(&mut self, key: u64) -> Result<u64> {
        let min = match self.raw_min_key()? {
            Some(m) => m,
            None => return Ok(0),
        };
        self.remove_range(min, key, true, true)
    }

    // ============================================================
    // Default: storage primitives
    // ============================================================

    fn insert_ex(
        &mut self,
        key: u64,
        term: u64,
        cmd: u64,
        payload: &[u8],
        condition: SetCondition,
    ) -> Result<()> {
        let mut guard = AutoCommit::new(self)?;
        let exists = guard.backend().raw_get(key)?.is_some();
        match condition {
            SetCondition::Always => {}
            SetCondition::IfNotExists if exists => return Err(Error::ConditionFailed),
            SetCondition::IfExists if !exists => return Err(Error::ConditionFailed),
            SetCondition::IfNotExists | SetCondition::IfExists => {}
        }
        guard.backend().raw_put(key, &encode_value(term, cmd, payload))?;
        guard.commit()
    }

    /// If `key` did not exist, inserts the new record and returns `None`
    /// for the old data.
    fn get_and_set(
        &mut self,
        key: u64,
        new_term: u64,
        new_cmd: u64,
        new_payload: &[u8],
    ) -> Result<Option<OwnedRecord>> {
        let mut guard = AutoCommit::new(self)?;
        let old = match guard.backend().raw_get(key)? {
            Some(framed) => {
                let (term, cmd, payload) = decode_value(framed.as_slice());
                Some(OwnedRecord::new(key, term, cmd, payload.to_vec()))
            }
            None => None,
        };
        guard.backend().raw_put(key, &encode_value(new_term, new_cmd, new_payload))?;
        guard.commit()?;
        Ok(old)
    }

    /// Fails with `NotFound` if `key` is absent.
    fn get_and_remove(&mut self, key: u64) -> Result<OwnedRecord> {
        let mut guard = AutoCommit::new(self)?;
        let framed = guard.backend().raw_get(key)?.ok_or(Error::NotFound)?;
        let (term, cmd, payload) = decode_value(framed.as_slice());
        let owned = OwnedRecord::new(key, term, cmd, payload.to_vec());
        guard.backend().raw_delete(key)?;
        guard.backend().ttl_delete(key)?;
        guard.commit()?;
        Ok(owned)
    }

    /// Empty `expected` matches an empty current payload. Fails with
    /// `NotFound` if `key` is absent.
    fn compare_and_swap(
        &mut self,
        key: u64,
        expected: &[u8],
        new_term: u64,
        new_cmd: u64,
        new_payload: &[u8],
    ) -> Result<bool> {
        let mut guard = AutoCommit::new(self)?;
        let framed = guard.backend().raw_get(key)?.ok_or(Error::NotFound)?;
        let (_, _, current_payload) = decode_value(framed.as_slice());
        let matches = current_payload == expected;
        if matches {
            guard.backend().raw_put(key, &encode_value(new_term, new_cmd, new_payload))?;
        }
        guard.commit()?;
        Ok(matches)
    }

    /// If `key` is absent, inserts a new record with the given term/cmd.
    /// If present, the existing term/cmd are preserved and `payload` is
    /// concatenated at the tail. Returns the new payload length.
    fn append(&mut self, key: u64, term: u64, cmd: u64, payload: &[u8]) -> Result<u64> {
        let mut guard = AutoCommit::new(self)?;
        let new_len = match guard.backend().raw_get(key)? {
            Some(framed) => {
                let (existing_term, existing_cmd, existing_payload) = decode_value(framed.as_slice());
                let mut combined = existing_payload.to_vec();
                combined.extend_from_slice(payload);
                let len = combined.len() as u64;
                guard.backend().raw_put(key, &encode_value(existing_term, existing_cmd, &combined))?;
                len
            }
            None => {
                guard.backend().raw_put(key, &encode_value(term, cmd, payload))?;
                payload.len() as u64
            }
        };
        guard.commit()?;
        Ok(new_len)
    }

    /// Like [`Backend::append`], but concatenates `payload` at the head.
    fn prepend(&mut self, key: u64, term: u64, cmd: u64, payload: &[u8]) -> Result<u64> {
        let mut guard = AutoCommit::new(self)?;
        let new_len = match guard.backend().raw_get(key)? {
            Some(framed) => {
                let (existing_term, existing_cmd, existing_payload) = decode_value(framed.as_slice());
                let mut combined = payload.to_vec();
                combined.extend_from_slice(existing_payload);
                let len = combined.len() as u64;
                guard.backend().raw_put(key, &encode_value(existing_term, existing_cmd, &combined))?;
                len
            }
            None => {
                guard.backend().raw_put(key, &encode_value(term, cmd, payload))?;
                payload.len() as u64
            }
        };
        guard.commit()?;
        Ok(new_len)
    }

    /// `length == 0` means read to end. If `offset >= payloadLen`,
    /// succeeds with an empty result.
    fn get_value_range(&self, key: u64, offset: u64, length: u64) -> Result<Vec<u8>> {
        let framed = self.raw_get(key)?.ok_or(Error::NotFound)?;
        let (_, _, payload) = decode_value(framed.as_slice());
        let offset = offset as usize;
        if offset >= payload.len() {
            return Ok(Vec::new());
        }
        let end = if length == 0 {
            payload.len()
        } else {
            (offset + length as usize).min(payload.len())
        };
        Ok(payload[offset..end].to_vec())
    }

    /// Extends the payload with zero bytes if `offset + data.len()` exceeds
    /// the current length. Preserves the record's term/cmd. Fails with
    /// `NotFound` if `key` is absent. Returns the new payload length.
    fn set_value_range(&mut self, key: u64, offset: u64, data: &[u8]) -> Result<u64> {
        let mut guard = AutoCommit::new(self)?;
        let framed = guard.backend().raw_get(key)?.ok_or(Error::NotFound)?;
        let (term, cmd, payload) = decode_value(framed.as_slice());
        let offset = offset as usize;
        let mut new_payload = payload.to_vec();
        if new_payload.len() < offset {
            new_payload.resize(offset, 0);
        }
        let end = offset + data.len();
        if new_payload.len() < end {
            new_payload.resize(end, 0);
        }
        new_payload[offset..end].copy_from_slice(data);
        let new_len = new_payload.len() as u64;
        guard.backend().raw_put(key, &encode_value(term, cmd, &new_payload))?;
        guard.commit()?;
        Ok(new_len)
    }

    // ============================================================
    // Default: TTL
    // ============================================================

    /// Fails with `NotFound` if `key` is absent from the main store.
    fn set_expire(&mut self, key: u64, ttl_ms: u64) -> Result<()> {
        self.set_expire_at(key, ttl::now_ms().saturating_add(ttl_ms))
    }

    fn set_expire_at(&mut self, key: u64, absolute_ms: u64) -> Result<()> {
        let mut guard = AutoCommit::new(self)?;
        if guard.backend().raw_get(key)?.is_none() {
            return Err(Error::NotFound);
        }
        guard.backend().ttl_put(key, absolute_ms)?;
        guard.commit()
    }

    /// `-1` (`TTL_NONE`) if the record exists without a TTL, `-2`
    /// (`TTL_NOT_FOUND`) if the record does not exist, `0` if already
    /// expired but not yet swept, otherwise milliseconds remaining.
    fn get_ttl(&self, key: u64) -> Result<i64> {
        if self.raw_get(key)?.is_none() {
            return Ok(ttl::TTL_NOT_FOUND);
        }
        match self.ttl_get(key)? {
            None => Ok(ttl::TTL_NONE),
            Some(expiry_ms) => {
                let now = ttl::now_ms();
                Ok(expiry_ms.saturating_sub(now) as i64)
            }
        }
    }

    /// Succeeds even if no TTL entry existed for `key`.
    fn persist(&mut self, key: u64) -> Result<()> {
        let mut guard = AutoCommit::new(self)?;
        guard.backend().ttl_delete(key)?;
        guard.commit()
    }

    /// `max_keys == 0` means unbounded. All deletions happen in a single
    /// transaction. Returns the number of records actually removed; a TTL
    /// entry whose key is already absent from the main store is
    /// dropped from the TTL namespace without counting toward the result.
    fn expire_scan(&mut self, max_keys: u64) -> Result<u64> {
        let limit = if max_keys == 0 { None } else { Some(max_keys) };
        let mut guard = AutoCommit::new(self)?;
        let entries = guard.backend().ttl_scan_all(limit)?;
        let now = ttl::now_ms();
        let mut removed = 0u64;
        let mut stale = 0u64;
        for (key, expiry_ms) in entries {
            if expiry_ms > now {
                continue;
            }
            let existed = guard.backend().raw_delete(key)?;
            guard.backend().ttl_delete(key)?;
            if existed {
                removed += 1;
            } else {
                stale += 1;
            }
        }
        guard.commit()?;
        if stale > 0 {
            tracing::warn!(stale, "ttl sweep found entries whose key was already absent");
        }
        Ok(removed)
    }

    // ============================================================
    // Default: statistics
    // ============================================================

    fn get_key_count(&self) -> Result<u64> {
        self.raw_key_count()
    }

    fn get_min_key(&self) -> Result<u64> {
        self.min_key()
    }

    /// Sum of payload lengths only, excluding the 16-byte framing header.
    /// A full scan; acceptable for the small-to-medium datasets this crate
    /// targets.
    fn get_data_size(&self) -> Result<u64> {
        let mut total = 0u64;
        let mut cursor = self.raw_min_key()?;
        while let Some(key) = cursor {
            if let Some(framed) = self.raw_get(key)? {
                let (_, _, payload) = decode_value(framed.as_slice());
                total += payload.len() as u64;
            }
            cursor = self.raw_next_key(key)?;
        }
        Ok(total)
    }

    fn get_stats(&self) -> Result<Stats> {
        Ok(Stats {
            total_keys: self.raw_key_count()?,
            min_key: self.raw_min_key()?.unwrap_or(0),
            max_key: self.raw_max_key()?.unwrap_or(0),
            total_data_bytes: self.get_data_size()?,
            database_file_size: self.file_size()?,
            page_size: self.page_size()?,
            page_count: self.page_count()?,
        })
    }
}

/// Collects every key in `[lo, hi]` (inclusive) by walking `raw_next_key`.
/// Shared by `remove_range` and the default range helpers.
fn collect_range_keys<B: Backend + ?Sized>(backend: &B, lo: u64, hi: u64) -> Result<Vec<u64>> {
    if lo > hi {
        return Ok(Vec::new());
    }
    let mut keys = Vec::new();
    let mut cursor = if backend.raw_get(lo)?.is_some() { Some(lo) } else { backend.raw_next_key(lo)? };
    while let Some(key) = cursor {
        if key > hi {
            break;
        }
        keys.push(key);
        cursor = backend.raw_next_key(key)?;
    }
    Ok(keys)
}
