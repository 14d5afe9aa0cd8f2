// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 Tessel contributors

//! Error type shared by every archive operation.

use std::fmt;
use std::io;

/// Failure raised by an archive session.
///
/// Every variant is fatal to the session that produced it: the stream
/// position is unspecified afterwards and the archive must be discarded.
/// Partially reconstructed graphs stay droppable.
#[derive(Debug)]
pub enum ArchiveError {
    /// A value behind a trait reference had a concrete type that was never
    /// registered, or a reader met a type name missing from the registry.
    UnregisteredPolymorphic { type_name: String },
    /// A reader had to produce a fresh instance of a type that does not
    /// implement [`Archivable::fresh`](crate::Archivable::fresh).
    NotDefaultConstructible { type_name: &'static str },
    /// No registered base link leads from `from` to `to`; the hierarchy is
    /// not fully registered.
    CastFailure { from: String, to: &'static str },
    /// The underlying source or sink failed (short read, EOF, I/O error).
    Stream(io::Error),
    /// A consumed token cannot be interpreted in the current encoding.
    FormatMismatch { detail: String },
}

impl ArchiveError {
    pub(crate) fn unregistered(type_name: &str) -> Self {
        Self::UnregisteredPolymorphic {
            type_name: type_name.to_string(),
        }
    }

    pub(crate) fn format(detail: impl Into<String>) -> Self {
        Self::FormatMismatch {
            detail: detail.into(),
        }
    }
}

impl fmt::Display for ArchiveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnregisteredPolymorphic { type_name } => {
                write!(f, "polymorphic type {} not registered for archiving", type_name)
            }
            Self::NotDefaultConstructible { type_name } => {
                write!(f, "{} is not default constructible", type_name)
            }
            Self::CastFailure { from, to } => {
                write!(
                    f,
                    "no registered cast from {} to {}; hierarchy not fully registered",
                    from, to
                )
            }
            Self::Stream(err) => write!(f, "stream failure: {}", err),
            Self::FormatMismatch { detail } => write!(f, "format mismatch: {}", detail),
        }
    }
}

impl std::error::Error for ArchiveError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Stream(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for ArchiveError {
    fn from(err: io::Error) -> Self {
        Self::Stream(err)
    }
}

pub type Result<T> = std::result::Result<T, ArchiveError>;
