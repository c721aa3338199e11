// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 kvidxkit

/// Condition for `Backend::insert_ex`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetCondition {
    /// Unconditional upsert.
    Always,
    /// Fail with `ConditionFailed` if the key already exists.
    IfNotExists,
    /// Fail with `ConditionFailed` if the key is absent.
    IfExists,
}

/// Direction of a range iterator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Backward,
}
