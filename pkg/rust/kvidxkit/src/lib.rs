// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 kvidxkit

//! kvidxkit: an embedded, ordered key-value store with a stable facade
//! ([`Instance`]) over pluggable storage backends, selected at open time
//! through the adapter [`registry`].
//!
//! ```no_run
//! use kvidxkit::{registry, Instance};
//!
//! let adapter = registry::find_adapter("sqlite")?;
//! let mut db = Instance::new(adapter.open("example.kvidx.sqlite3")?);
//! db.insert(1, 0, 0, b"hello")?;
//! # Ok::<(), kvidxkit::Error>(())
//! ```

mod export;
mod instance;
mod iterator;
pub mod registry;

pub use export::{export, import, ExportFormat, ExportOptions, ImportOptions, BINARY_VERSION, MAGIC};
pub use instance::Instance;
pub use iterator::RangeIterator;
pub use registry::{adapter_at, adapters, find_adapter, AdapterEntry};

pub use kvidxkit_core::{
    decode_value, encode_value, error_string, invalid_argument, now_ms, reframe_payload, Config, Direction, Error,
    JournalMode, OwnedRecord, Record, Result, SetCondition, Stats, SyncMode, ValueRef, HEADER_LEN, TTL_NONE,
    TTL_NOT_FOUND,
};
