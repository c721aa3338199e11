// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 kvidxkit

use serde::{Deserialize, Serialize};

/// Aggregate statistics returned by `Backend::get_stats`. Fields that an
/// adapter cannot compute for an empty store are left at zero rather than
/// wrapped in `Option`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stats {
    pub total_keys: u64,
    pub min_key: u64,
    pub max_key: u64,
    pub total_data_bytes: u64,
    pub database_file_size: u64,
    pub page_size: u64,
    pub page_count: u64,
}
