// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 kvidxkit

use crate::bytes::ValueRef;

/// A single stored record: the fixed-width key, the two opaque metadata
/// fields, and the payload, borrowed from adapter-owned memory when
/// possible (see [`ValueRef`]).
#[derive(Debug, Clone, PartialEq)]
pub struct Record<'a> {
    pub key: u64,
    pub term: u64,
    pub cmd: u64,
    pub payload: ValueRef<'a>,
}

impl<'a> Record<'a> {
    pub fn new(key: u64, term: u64, cmd: u64, payload: ValueRef<'a>) -> Self {
        Self { key, term, cmd, payload }
    }

    pub fn to_owned(&self) -> OwnedRecord {
        OwnedRecord { key: self.key, term: self.term, cmd: self.cmd, payload: self.payload.as_slice().to_vec() }
    }
}

/// Heap-owned variant returned by the storage primitives that hand back
/// copies rather than borrows (`get_and_set`, `get_and_remove`,
/// `get_value_range`).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct OwnedRecord {
    pub key: u64,
    pub term: u64,
    pub cmd: u64,
    pub payload: Vec<u8>,
}

impl OwnedRecord {
    pub fn new(key: u64, term: u64, cmd: u64, payload: Vec<u8>) -> Self {
        Self { key, term, cmd, payload }
    }
}
