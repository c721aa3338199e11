// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 kvidxkit

//! The stateful forward/backward cursor, built entirely out of
//! `Instance::get_next`/`get_prev`/`exists` — it needs no adapter support
//! of its own.

use kvidxkit_core::{invalid_argument, Direction, Record, Result};

use crate::instance::Instance;

/// A cursor bound to `[start_key, end_key]` (inclusive) moving in one
/// direction. Borrows the instance for its lifetime, so a borrowed
/// [`Record`] handed back by [`RangeIterator::get`] cannot outlive a
/// mutating call on that same instance — the borrow checker enforces
/// this the same way it does for [`Instance::get`].
pub struct RangeIterator<'a> {
    instance: &'a Instance,
    start_key: u64,
    end_key: u64,
    direction: Direction,
    current: Option<u64>,
    started: bool,
}

impl<'a> RangeIterator<'a> {
    pub fn new(instance: &'a Instance, start_key: u64, end_key: u64, direction: Direction) -> Result<Self> {
        if start_key > end_key {
            return Err(invalid_argument("startKey must not exceed endKey"));
        }
        Ok(Self { instance, start_key, end_key, direction, current: None, started: false })
    }

    /// Advances the cursor. On the first call, seeks to the boundary
    /// appropriate to direction; afterward, moves by one. Returns `false`
    /// once the next key would fall outside the bound range.
    pub fn next(&mut self) -> Result<bool> {
        let candidate = if !self.started {
            self.started = true;
            match self.direction {
                Direction::Forward => self.seek_at_or_after(self.start_key)?,
                Direction::Backward => self.seek_at_or_before(self.end_key)?,
            }
        } else {
            match self.current {
                None => None,
                Some(key) => match self.direction {
                    Direction::Forward => self.instance.get_next(key)?,
                    Direction::Backward => self.instance.get_prev(key)?,
                },
            }
        };
        self.current = candidate.filter(|&k| k >= self.start_key && k <= self.end_key);
        Ok(self.current.is_some())
    }

    /// Repositions to exact `key` if it is present and inside the bound
    /// range; otherwise to the closest in-range key in the iteration
    /// direction. Returns whether such a key exists.
    pub fn seek(&mut self, key: u64) -> Result<bool> {
        self.started = true;
        if key < self.start_key || key > self.end_key {
            self.current = None;
            return Ok(false);
        }
        let candidate = match self.direction {
            Direction::Forward => self.seek_at_or_after(key)?,
            Direction::Backward => self.seek_at_or_before(key)?,
        };
        self.current = candidate.filter(|&k| k >= self.start_key && k <= self.end_key);
        Ok(self.current.is_some())
    }

    pub fn valid(&self) -> bool {
        self.current.is_some()
    }

    pub fn key(&self) -> Option<u64> {
        self.current
    }

    pub fn get(&self) -> Result<Option<Record<'_>>> {
        match self.current {
            Some(key) => self.instance.get(key),
            None => Ok(None),
        }
    }

    /// Releases the cursor. A plain drop has the same effect; this exists
    /// for parity with an explicit `destroy()`-style release.
    pub fn close(self) {}

    fn seek_at_or_after(&self, key: u64) -> Result<Option<u64>> {
        if self.instance.exists(key)? {
            Ok(Some(key))
        } else {
            self.instance.get_next(key)
        }
    }

    fn seek_at_or_before(&self, key: u64) -> Result<Option<u64>> {
        if self.instance.exists(key)? {
            Ok(Some(key))
        } else {
            self.instance.get_prev(key)
        }
    }
}
