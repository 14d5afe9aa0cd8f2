// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 Tessel contributors

//! `Archivable` for the supported standard containers.
//!
//! Sequences are length-prefixed with elements in index order. Mappings are
//! length-prefixed with entries in the writer's iteration order and rebuilt
//! by insertion, so equality after a round trip is by key set and values,
//! not by bucket layout.

use std::collections::{BTreeMap, HashMap};
use std::hash::Hash;

use num_complex::Complex;

use crate::archive::Archive;
use crate::error::Result;
use crate::traits::Archivable;

// ============================================================================
// Sequences
// ============================================================================

impl<T: Archivable> Archivable for Vec<T> {
    fn archive(&mut self, ar: &mut Archive) -> Result<()> {
        let mut len = self.len();
        len.archive(ar)?;
        if ar.is_reading() {
            self.clear();
            self.reserve(len);
            for _ in 0..len {
                self.push(T::fresh()?);
            }
        }
        T::archive_slice(self.as_mut_slice(), ar)
    }

    fn fresh() -> Result<Self> {
        Ok(Vec::new())
    }
}

/// Fixed-length arrays carry no length prefix; both sides know the shape.
impl<T: Archivable, const N: usize> Archivable for [T; N] {
    fn archive(&mut self, ar: &mut Archive) -> Result<()> {
        T::archive_slice(self, ar)
    }

    fn fresh() -> Result<Self> {
        let mut items = Vec::with_capacity(N);
        for _ in 0..N {
            items.push(T::fresh()?);
        }
        match items.try_into() {
            Ok(array) => Ok(array),
            Err(_) => unreachable!("vector length equals the array length"),
        }
    }
}

// ============================================================================
// Mappings
// ============================================================================

impl<K, V> Archivable for BTreeMap<K, V>
where
    K: Archivable + Ord + Clone,
    V: Archivable,
{
    fn archive(&mut self, ar: &mut Archive) -> Result<()> {
        let mut len = self.len();
        len.archive(ar)?;
        if ar.is_writing() {
            for (key, value) in self.iter_mut() {
                let mut key = key.clone();
                key.archive(ar)?;
                value.archive(ar)?;
            }
        } else {
            self.clear();
            for _ in 0..len {
                let mut key = K::fresh()?;
                key.archive(ar)?;
                let mut value = V::fresh()?;
                value.archive(ar)?;
                self.insert(key, value);
            }
        }
        Ok(())
    }

    fn fresh() -> Result<Self> {
        Ok(BTreeMap::new())
    }
}

impl<K, V> Archivable for HashMap<K, V>
where
    K: Archivable + Eq + Hash + Clone,
    V: Archivable,
{
    fn archive(&mut self, ar: &mut Archive) -> Result<()> {
        let mut len = self.len();
        len.archive(ar)?;
        if ar.is_writing() {
            for (key, value) in self.iter_mut() {
                let mut key = key.clone();
                key.archive(ar)?;
                value.archive(ar)?;
            }
        } else {
            self.clear();
            for _ in 0..len {
                let mut key = K::fresh()?;
                key.archive(ar)?;
                let mut value = V::fresh()?;
                value.archive(ar)?;
                self.insert(key, value);
            }
        }
        Ok(())
    }

    fn fresh() -> Result<Self> {
        Ok(HashMap::new())
    }
}

// ============================================================================
// Complex numbers
// ============================================================================

/// Real part first, then imaginary.
impl<T: Archivable> Archivable for Complex<T> {
    fn archive(&mut self, ar: &mut Archive) -> Result<()> {
        self.re.archive(ar)?;
        self.im.archive(ar)
    }

    fn fresh() -> Result<Self> {
        Ok(Complex {
            re: T::fresh()?,
            im: T::fresh()?,
        })
    }
}
