// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 Tessel contributors

//! Library version tuples and the process-wide version table.
//!
//! Libraries layered on the archive record their version here once at
//! startup. Writers stamp the whole table at the head of every stream;
//! readers expose the stamped table through
//! [`Archive::version_of`](crate::Archive::version_of) so that `archive`
//! hooks can branch when reading streams written by older releases.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use parking_lot::RwLock;

use crate::archive::Archive;
use crate::error::{ArchiveError, Result};
use crate::traits::Archivable;

/// Ordered version tuple, printed and parsed as a dotted decimal string
/// (`"6.2"`, `"6.2.2104"`, `"6.2.2104.1"`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VersionInfo {
    pub major: u32,
    pub minor: u32,
    pub release: u32,
    pub patch: u32,
}

impl VersionInfo {
    pub const fn new(major: u32, minor: u32, release: u32) -> Self {
        Self {
            major,
            minor,
            release,
            patch: 0,
        }
    }
}

impl fmt::Display for VersionInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.patch != 0 {
            write!(f, "{}.{}.{}.{}", self.major, self.minor, self.release, self.patch)
        } else if self.release != 0 {
            write!(f, "{}.{}.{}", self.major, self.minor, self.release)
        } else {
            write!(f, "{}.{}", self.major, self.minor)
        }
    }
}

impl FromStr for VersionInfo {
    type Err = ArchiveError;

    fn from_str(s: &str) -> Result<Self> {
        let digits = s.strip_prefix('v').unwrap_or(s);
        let mut parts = [0u32; 4];
        let mut count = 0;
        for piece in digits.split('.') {
            if count == parts.len() {
                return Err(ArchiveError::format(format!("version string '{}' has too many components", s)));
            }
            parts[count] = piece
                .parse::<u32>()
                .map_err(|_| ArchiveError::format(format!("invalid version component '{}' in '{}'", piece, s)))?;
            count += 1;
        }
        Ok(Self {
            major: parts[0],
            minor: parts[1],
            release: parts[2],
            patch: parts[3],
        })
    }
}

impl Archivable for VersionInfo {
    fn archive(&mut self, ar: &mut Archive) -> Result<()> {
        if ar.is_writing() {
            let mut repr = self.to_string();
            repr.archive(ar)
        } else {
            let mut repr = String::new();
            repr.archive(ar)?;
            *self = repr.parse()?;
            Ok(())
        }
    }

    fn fresh() -> Result<Self> {
        Ok(Self::default())
    }
}

static LIBRARY_VERSIONS: OnceLock<RwLock<BTreeMap<String, VersionInfo>>> = OnceLock::new();

fn table() -> &'static RwLock<BTreeMap<String, VersionInfo>> {
    LIBRARY_VERSIONS.get_or_init(|| RwLock::new(BTreeMap::new()))
}

/// Record `library`'s version in the process-wide table.
///
/// Call once per library before the first archive operation; later writers
/// stamp the table as-is.
pub fn set_library_version(library: &str, version: VersionInfo) {
    table().write().insert(library.to_string(), version);
}

/// Version of `library` in the process-wide table, all-zero if absent.
pub fn library_version(library: &str) -> VersionInfo {
    table().read().get(library).copied().unwrap_or_default()
}

/// Copy of the whole table, stamped by writers at stream start.
pub(crate) fn snapshot() -> BTreeMap<String, VersionInfo> {
    table().read().clone()
}
