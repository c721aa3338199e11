// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 kvidxkit

//! Sentinel constants for `Backend::get_ttl`.

/// The record exists but carries no TTL entry.
pub const TTL_NONE: i64 = -1;

/// The record does not exist in the main store.
pub const TTL_NOT_FOUND: i64 = -2;

/// Milliseconds since the Unix epoch, used as the TTL clock. Adapters never
/// call this directly with a value they invent; it exists so
/// `Backend::set_expire`'s default method can compute `now + ttl_ms`
/// without every adapter reimplementing the same `SystemTime` dance.
pub fn now_ms() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis() as u64
}
