// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 kvidxkit

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// Tunable knobs adapters may apply. Fields an adapter does not support
/// are silently ignored by [`crate::backend::Backend::apply_config`]
/// unless applying them would violate a constraint, in which case the
/// adapter returns `InvalidArgument`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    pub cache_size_bytes: u64,
    pub journal_mode: JournalMode,
    pub sync_mode: SyncMode,
    pub enable_recursive_triggers: bool,
    pub enable_foreign_keys: bool,
    pub read_only: bool,
    pub busy_timeout_ms: u32,
    pub mmap_size_bytes: u64,
    pub page_size: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cache_size_bytes: 32 * 1024 * 1024,
            journal_mode: JournalMode::Wal,
            sync_mode: SyncMode::Normal,
            enable_recursive_triggers: true,
            enable_foreign_keys: false,
            read_only: false,
            busy_timeout_ms: 5_000,
            mmap_size_bytes: 0,
            page_size: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JournalMode {
    Delete,
    Truncate,
    Persist,
    Memory,
    Wal,
    Off,
}

impl fmt::Display for JournalMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JournalMode::Delete => "delete",
            JournalMode::Truncate => "truncate",
            JournalMode::Persist => "persist",
            JournalMode::Memory => "memory",
            JournalMode::Wal => "wal",
            JournalMode::Off => "off",
        };
        f.write_str(s)
    }
}

impl FromStr for JournalMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "delete" => Ok(JournalMode::Delete),
            "truncate" => Ok(JournalMode::Truncate),
            "persist" => Ok(JournalMode::Persist),
            "memory" => Ok(JournalMode::Memory),
            "wal" => Ok(JournalMode::Wal),
            "off" => Ok(JournalMode::Off),
            other => Err(crate::error::invalid_argument(format!("unknown journal mode: {other}"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncMode {
    Off,
    Normal,
    Full,
    Extra,
}

impl fmt::Display for SyncMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SyncMode::Off => "off",
            SyncMode::Normal => "normal",
            SyncMode::Full => "full",
            SyncMode::Extra => "extra",
        };
        f.write_str(s)
    }
}

impl FromStr for SyncMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "off" => Ok(SyncMode::Off),
            "normal" => Ok(SyncMode::Normal),
            "full" => Ok(SyncMode::Full),
            "extra" => Ok(SyncMode::Extra),
            other => Err(crate::error::invalid_argument(format!("unknown sync mode: {other}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let cfg = Config::default();
        assert_eq!(cfg.cache_size_bytes, 32 * 1024 * 1024);
        assert_eq!(cfg.journal_mode, JournalMode::Wal);
        assert_eq!(cfg.sync_mode, SyncMode::Normal);
        assert!(cfg.enable_recursive_triggers);
        assert!(!cfg.enable_foreign_keys);
        assert!(!cfg.read_only);
        assert_eq!(cfg.busy_timeout_ms, 5_000);
        assert_eq!(cfg.mmap_size_bytes, 0);
        assert_eq!(cfg.page_size, 0);
    }

    #[test]
    fn journal_mode_round_trips_through_string() {
        for mode in [
            JournalMode::Delete,
            JournalMode::Truncate,
            JournalMode::Persist,
            JournalMode::Memory,
            JournalMode::Wal,
            JournalMode::Off,
        ] {
            assert_eq!(mode.to_string().parse::<JournalMode>().unwrap(), mode);
        }
    }
}
