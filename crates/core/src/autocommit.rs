// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 kvidxkit

use crate::backend::Backend;
use crate::error::Result;

/// Encodes the auto-commit scope rule: a primitive that finds no user
/// transaction open starts one for the duration of the call and must
/// commit it before returning, or abort it on the error path.
///
/// A guard object that commits on the normal return path and aborts on
/// the error path is the idiomatic translation of that rule.
/// `begin`/`commit`/`abort` on `Backend` are themselves idempotent
/// (`begin` while writing is a no-op; `commit`/`abort` while idle are
/// no-ops), so this guard never nests a transaction it does not own.
pub(crate) struct AutoCommit<'a, B: Backend + ?Sized> {
    backend: &'a mut B,
    owns: bool,
    done: bool,
}

impl<'a, B: Backend + ?Sized> AutoCommit<'a, B> {
    pub(crate) fn new(backend: &'a mut B) -> Result<Self> {
        let owns = !backend.is_writing();
        if owns {
            backend.begin()?;
        }
        Ok(Self { backend, owns, done: false })
    }

    pub(crate) fn backend(&mut self) -> &mut B {
        self.backend
    }

    /// Commits the transaction if this guard opened it. Must be called on
    /// every success path; `Drop` aborts if it was not.
    pub(crate) fn commit(mut self) -> Result<()> {
        if self.owns {
            self.backend.commit()?;
        }
        self.done = true;
        Ok(())
    }
}

impl<'a, B: Backend + ?Sized> Drop for AutoCommit<'a, B> {
    fn drop(&mut self) {
        if self.owns && !self.done {
            if let Err(err) = self.backend.abort() {
                tracing::warn!(error = %err, "auto-commit guard failed to abort transaction");
            }
        }
    }
}
