// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 kvidxkit

//! Backend-agnostic conformance suite and test helpers shared by every
//! `kvidxkit-backend-*` crate and by `kvidxkit` itself.

pub mod conformance;
pub mod tempdir;
