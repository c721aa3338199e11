// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 kvidxkit

use std::fmt;

/// The error taxonomy shared by every adapter. Every variant carries its
/// own message, so [`Error::code`] and [`Display`] are defined for all of
/// them — there is no reachable "unknown code" inside this process, only
/// errors translated from a foreign source via [`Error::Internal`].
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("key already exists")]
    DuplicateKey,

    #[error("key not found")]
    NotFound,

    #[error("disk full")]
    DiskFull,

    #[error("I/O error: {0}")]
    Io(String),

    #[error("corrupt data: {0}")]
    Corrupt(String),

    #[error("a write transaction is already active")]
    TransactionActive,

    #[error("no transaction is active")]
    NoTransaction,

    #[error("instance is read-only")]
    Readonly,

    #[error("storage is locked: {0}")]
    Locked(String),

    #[error("out of memory")]
    NoMem,

    #[error("value too large")]
    TooBig,

    #[error("constraint violation: {0}")]
    Constraint(String),

    #[error("schema error: {0}")]
    Schema(String),

    #[error("key out of range")]
    Range,

    #[error("operation not supported: {0}")]
    NotSupported(String),

    #[error("operation cancelled")]
    Cancelled,

    #[error("condition failed")]
    ConditionFailed,

    #[error("record has expired")]
    Expired,

    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Stable, machine-matchable tag for the variant, useful for callers
    /// that want to branch on the error kind without matching the whole
    /// enum.
    pub fn code(&self) -> &'static str {
        match self {
            Error::InvalidArgument(_) => "INVALID_ARGUMENT",
            Error::DuplicateKey => "DUPLICATE_KEY",
            Error::NotFound => "NOT_FOUND",
            Error::DiskFull => "DISK_FULL",
            Error::Io(_) => "IO",
            Error::Corrupt(_) => "CORRUPT",
            Error::TransactionActive => "TRANSACTION_ACTIVE",
            Error::NoTransaction => "NO_TRANSACTION",
            Error::Readonly => "READONLY",
            Error::Locked(_) => "LOCKED",
            Error::NoMem => "NO_MEM",
            Error::TooBig => "TOO_BIG",
            Error::Constraint(_) => "CONSTRAINT",
            Error::Schema(_) => "SCHEMA",
            Error::Range => "RANGE",
            Error::NotSupported(_) => "NOT_SUPPORTED",
            Error::Cancelled => "CANCELLED",
            Error::ConditionFailed => "CONDITION_FAILED",
            Error::Expired => "EXPIRED",
            Error::Internal(_) => "INTERNAL",
        }
    }
}

/// Stable, human-readable string for any error value, including ones this
/// process has never constructed (callers of the C-derived facade expect
/// `errorString` to never return null/empty). In a pure Rust API this is
/// just `Display`, kept as a free function for parity with the C-derived
/// facade's `errorString`.
pub fn error_string(err: &Error) -> String {
    err.to_string()
}

impl From<std::io::Error> for Error {
    fn from(value: std::io::Error) -> Self {
        use std::io::ErrorKind;
        match value.kind() {
            ErrorKind::NotFound => Error::NotFound,
            ErrorKind::PermissionDenied => Error::Readonly,
            ErrorKind::OutOfMemory => Error::NoMem,
            _ => Error::Io(value.to_string()),
        }
    }
}

/// Convenience constructor used throughout the default `Backend` methods.
pub fn invalid_argument(msg: impl fmt::Display) -> Error {
    Error::InvalidArgument(msg.to_string())
}

pub type Result<T> = std::result::Result<T, Error>;
