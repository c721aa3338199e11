// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 kvidxkit

//! Scratch-directory helper shared by every adapter's tests and by the
//! conformance suite. A directory is used even for the single-file SQLite
//! adapter so every backend's test setup looks the same.

use std::path::{Path, PathBuf};

use tempfile::TempDir;

/// Creates a fresh temporary directory, hands `child_path` (a subpath
/// inside it, e.g. `"store.db"` or `"store"`) to `body`, and cleans the
/// directory up afterward regardless of outcome.
pub fn with_temp_path<T>(child_path: &str, body: impl FnOnce(&Path) -> T) -> T {
    let dir = TempDir::new().expect("failed to create temp dir for conformance test");
    let path: PathBuf = dir.path().join(child_path);
    body(&path)
}
