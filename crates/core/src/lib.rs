// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 kvidxkit

//! Backend-abstraction layer for kvidxkit.
//!
//! This crate defines the data model ([`Record`], [`ValueRef`]), the closed
//! error taxonomy ([`Error`]), the stored-value framing ([`codec`]), and the
//! central [`Backend`] trait that every storage adapter implements. It has
//! no opinion about which storage engine is in use; `kvidxkit-backend-*`
//! crates provide that, and `kvidxkit` (the public facade) wires a chosen
//! adapter up to callers.

mod autocommit;
mod backend;
mod bytes;
mod codec;
mod condition;
mod config;
mod error;
mod record;
mod stats;
mod ttl;

pub use backend::Backend;
pub use bytes::ValueRef;
pub use codec::{decode_value, encode_value, reframe_payload, HEADER_LEN};
pub use condition::{Direction, SetCondition};
pub use config::{Config, JournalMode, SyncMode};
pub use error::{error_string, invalid_argument, Error, Result};
pub use record::{OwnedRecord, Record};
pub use stats::Stats;
pub use ttl::{now_ms, TTL_NONE, TTL_NOT_FOUND};
