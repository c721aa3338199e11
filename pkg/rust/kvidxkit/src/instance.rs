// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 kvidxkit

//! The facade: a thin wrapper around a chosen [`Backend`] that adds the
//! sticky last-error buffer every adapter instance carries on top of the
//! backend's own `Result` returns.

use std::cell::RefCell;

use kvidxkit_core::{
    Backend, Config, Error, OwnedRecord, Record, Result, SetCondition, Stats,
};

/// A single open store. Wraps whichever [`Backend`] the caller selected
/// (see [`crate::registry`]) and adds the per-instance sticky error every
/// adapter instance carries: a failing call updates
/// [`Instance::last_error`], but a *successful* call leaves a previously
/// recorded error in place until the caller explicitly clears it.
pub struct Instance {
    backend: Box<dyn Backend>,
    last_error: RefCell<Option<Error>>,
    config: Config,
}

impl Instance {
    /// Wraps an already-open backend. Adapter crates' `open` constructors
    /// (e.g. `SqliteBackend::open`) are the `Closed -> Open(idle)`
    /// transition; this just attaches facade bookkeeping.
    pub fn new(backend: Box<dyn Backend>) -> Self {
        Self { backend, last_error: RefCell::new(None), config: Config::default() }
    }

    /// Applies `config` and remembers it as the instance's current
    /// snapshot, returned later by [`Instance::config`].
    pub fn configure(&mut self, config: Config) -> Result<()> {
        let result = self.backend.apply_config(&config);
        if result.is_ok() {
            self.config = config;
        }
        self.record(result)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The most recent error recorded on this instance, or `None` if no
    /// call has failed since the last [`Instance::clear_error`].
    pub fn last_error(&self) -> Option<Error> {
        self.last_error.borrow().clone()
    }

    pub fn clear_error(&self) {
        *self.last_error.borrow_mut() = None;
    }

    fn record<T>(&self, result: Result<T>) -> Result<T> {
        if let Err(ref err) = result {
            tracing::debug!(error = %err, code = err.code(), "facade call failed");
            *self.last_error.borrow_mut() = Some(err.clone());
        }
        result
    }

    pub(crate) fn backend(&self) -> &dyn Backend {
        self.backend.as_ref()
    }

    pub(crate) fn backend_mut(&mut self) -> &mut dyn Backend {
        self.backend.as_mut()
    }

    // ============================================================
    // Lifecycle, transactions
    // ============================================================

    pub fn fsync(&self) -> Result<()> {
        self.record(self.backend.fsync())
    }

    pub fn begin(&mut self) -> Result<()> {
        let result = self.backend.begin();
        self.record(result)
    }

    pub fn commit(&mut self) -> Result<()> {
        let result = self.backend.commit();
        self.record(result)
    }

    pub fn abort(&mut self) -> Result<()> {
        let result = self.backend.abort();
        self.record(result)
    }

    pub fn is_writing(&self) -> bool {
        self.backend.is_writing()
    }

    /// Consumes the instance, releasing the underlying backend (the
    /// `Any -> Closed` transition).
    pub fn close(self) -> Result<()> {
        tracing::debug!("closing instance");
        self.backend.close()
    }

    // ============================================================
    // Core CRUD
    // ============================================================

    pub fn get(&self, key: u64) -> Result<Option<Record<'_>>> {
        self.record(self.backend.get(key))
    }

    pub fn insert(&mut self, key: u64, term: u64, cmd: u64, payload: &[u8]) -> Result<()> {
        let result = self.backend.insert(key, term, cmd, payload);
        self.record(result)
    }

    pub fn remove(&mut self, key: u64) -> Result<()> {
        let result = self.backend.remove(key);
        self.record(result)
    }

    pub fn exists(&self, key: u64) -> Result<bool> {
        self.record(self.backend.exists(key))
    }

    pub fn exists_dual(&self, key: u64, term: u64) -> Result<bool> {
        self.record(self.backend.exists_dual(key, term))
    }

    pub fn max_key(&self) -> Result<Option<u64>> {
        self.record(self.backend.max_key())
    }

    pub fn min_key(&self) -> Result<u64> {
        self.record(self.backend.min_key())
    }

    // ============================================================
    // Navigation
    // ============================================================

    pub fn get_next(&self, key: u64) -> Result<Option<u64>> {
        self.record(self.backend.get_next(key))
    }

    pub fn get_prev(&self, key: u64) -> Result<Option<u64>> {
        self.record(self.backend.get_prev(key))
    }

    // ============================================================
    // Range operations
    // ============================================================

    pub fn count_range(&self, start: u64, end: u64) -> Result<u64> {
        self.record(self.backend.count_range(start, end))
    }

    pub fn exists_in_range(&self, start: u64, end: u64) -> Result<bool> {
        self.record(self.backend.exists_in_range(start, end))
    }

    pub fn remove_range(
        &mut self,
        start: u64,
        end: u64,
        start_inclusive: bool,
        end_inclusive: bool,
    ) -> Result<u64> {
        let result = self.backend.remove_range(start, end, start_inclusive, end_inclusive);
        self.record(result)
    }

    pub fn remove_after_n_inclusive(&mut self, key: u64) -> Result<u64> {
        let result = self.backend.remove_after_n_inclusive(key);
        self.record(result)
    }

    pub fn remove_before_n_inclusive(&mut self, key: u64) -> Result<u64> {
        let result = self.backend.remove_before_n_inclusive(key);
        self.record(result)
    }

    // ============================================================
    // Storage primitives
    // ============================================================

    pub fn insert_ex(
        &mut self,
        key: u64,
        term: u64,
        cmd: u64,
        payload: &[u8],
        condition: SetCondition,
    ) -> Result<()> {
        let result = self.backend.insert_ex(key, term, cmd, payload, condition);
        self.record(result)
    }

    pub fn get_and_set(
        &mut self,
        key: u64,
        new_term: u64,
        new_cmd: u64,
        new_payload: &[u8],
    ) -> Result<Option<OwnedRecord>> {
        let result = self.backend.get_and_set(key, new_term, new_cmd, new_payload);
        self.record(result)
    }

    pub fn get_and_remove(&mut self, key: u64) -> Result<OwnedRecord> {
        let result = self.backend.get_and_remove(key);
        self.record(result)
    }

    pub fn compare_and_swap(
        &mut self,
        key: u64,
        expected: &[u8],
        new_term: u64,
        new_cmd: u64,
        new_payload: &[u8],
    ) -> Result<bool> {
        let result = self.backend.compare_and_swap(key, expected, new_term, new_cmd, new_payload);
        self.record(result)
    }

    pub fn append(&mut self, key: u64, term: u64, cmd: u64, payload: &[u8]) -> Result<u64> {
        let result = self.backend.append(key, term, cmd, payload);
        self.record(result)
    }

    pub fn prepend(&mut self, key: u64, term: u64, cmd: u64, payload: &[u8]) -> Result<u64> {
        let result = self.backend.prepend(key, term, cmd, payload);
        self.record(result)
    }

    pub fn get_value_range(&self, key: u64, offset: u64, length: u64) -> Result<Vec<u8>> {
        self.record(self.backend.get_value_range(key, offset, length))
    }

    pub fn set_value_range(&mut self, key: u64, offset: u64, data: &[u8]) -> Result<u64> {
        let result = self.backend.set_value_range(key, offset, data);
        self.record(result)
    }

    // ============================================================
    // TTL
    // ============================================================

    pub fn set_expire(&mut self, key: u64, ttl_ms: u64) -> Result<()> {
        let result = self.backend.set_expire(key, ttl_ms);
        self.record(result)
    }

    pub fn set_expire_at(&mut self, key: u64, absolute_ms: u64) -> Result<()> {
        let result = self.backend.set_expire_at(key, absolute_ms);
        self.record(result)
    }

    pub fn get_ttl(&self, key: u64) -> Result<i64> {
        self.record(self.backend.get_ttl(key))
    }

    pub fn persist(&mut self, key: u64) -> Result<()> {
        let result = self.backend.persist(key);
        self.record(result)
    }

    pub fn expire_scan(&mut self, max_keys: u64) -> Result<u64> {
        let result = self.backend.expire_scan(max_keys);
        self.record(result)
    }

    // ============================================================
    // Statistics
    // ============================================================

    pub fn get_stats(&self) -> Result<Stats> {
        self.record(self.backend.get_stats())
    }

    pub fn get_key_count(&self) -> Result<u64> {
        self.record(self.backend.get_key_count())
    }

    pub fn get_min_key(&self) -> Result<u64> {
        self.record(self.backend.get_min_key())
    }

    pub fn get_data_size(&self) -> Result<u64> {
        self.record(self.backend.get_data_size())
    }
}
