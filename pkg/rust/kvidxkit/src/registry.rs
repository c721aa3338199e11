// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 kvidxkit

//! Adapter discovery by name or index. The set of compiled-in adapters
//! is determined by Cargo features, one per backend.

use std::path::Path;

use kvidxkit_core::{Backend, Error, Result};

/// One compiled-in storage adapter: a display name, the path suffix the
/// registry's `is_directory` flag pairs with, and an opener.
pub struct AdapterEntry {
    pub name: &'static str,
    pub path_suffix: &'static str,
    pub is_directory: bool,
    open: fn(&Path) -> Result<Box<dyn Backend>>,
}

impl AdapterEntry {
    pub fn open(&self, path: impl AsRef<Path>) -> Result<Box<dyn Backend>> {
        (self.open)(path.as_ref())
    }
}

#[cfg(feature = "backend-sqlite")]
fn open_sqlite(path: &Path) -> Result<Box<dyn Backend>> {
    Ok(Box::new(kvidxkit_backend_sqlite::SqliteBackend::open(path)?))
}

#[cfg(feature = "backend-heed")]
fn open_heed(path: &Path) -> Result<Box<dyn Backend>> {
    Ok(Box::new(kvidxkit_backend_heed::HeedBackend::open(path)?))
}

#[cfg(feature = "backend-fjall")]
fn open_fjall(path: &Path) -> Result<Box<dyn Backend>> {
    Ok(Box::new(kvidxkit_backend_fjall::FjallBackend::open(path)?))
}

/// The adapters compiled into this build, in registration order. Lookup by
/// name is case-insensitive, matching lookup by index.
pub fn adapters() -> &'static [AdapterEntry] {
    static ENTRIES: std::sync::OnceLock<Vec<AdapterEntry>> = std::sync::OnceLock::new();
    ENTRIES.get_or_init(|| {
        #[allow(unused_mut)]
        let mut entries = Vec::new();
        #[cfg(feature = "backend-sqlite")]
        entries.push(AdapterEntry {
            name: "sqlite",
            path_suffix: ".kvidx.sqlite3",
            is_directory: false,
            open: open_sqlite,
        });
        #[cfg(feature = "backend-heed")]
        entries.push(AdapterEntry { name: "heed", path_suffix: ".kvidx-heed", is_directory: true, open: open_heed });
        #[cfg(feature = "backend-fjall")]
        entries.push(AdapterEntry {
            name: "fjall",
            path_suffix: ".kvidx-fjall",
            is_directory: true,
            open: open_fjall,
        });
        entries
    })
}

/// Finds a compiled-in adapter by case-insensitive name.
pub fn find_adapter(name: &str) -> Result<&'static AdapterEntry> {
    adapters()
        .iter()
        .find(|entry| entry.name.eq_ignore_ascii_case(name))
        .ok_or_else(|| Error::NotSupported(format!("no adapter named {name:?} is compiled in")))
}

/// Finds a compiled-in adapter by index into [`adapters`].
pub fn adapter_at(index: usize) -> Result<&'static AdapterEntry> {
    adapters().get(index).ok_or_else(|| Error::InvalidArgument(format!("adapter index {index} out of range")))
}
