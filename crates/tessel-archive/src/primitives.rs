// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 Tessel contributors

//! `Archivable` for the primitive token kinds.

use std::ffi::CString;

use crate::archive::Archive;
use crate::error::Result;
use crate::traits::Archivable;

/// Primitive with element-wise slice transfer.
macro_rules! impl_archivable {
    ($ty:ty, $xfer:ident) => {
        impl Archivable for $ty {
            fn archive(&mut self, ar: &mut Archive) -> Result<()> {
                ar.$xfer(self)
            }

            fn fresh() -> Result<Self> {
                Ok(Self::default())
            }
        }
    };
}

/// Primitive whose slices take the codec's block path.
macro_rules! impl_archivable_block {
    ($ty:ty, $xfer:ident, $xfer_slice:ident) => {
        impl Archivable for $ty {
            fn archive(&mut self, ar: &mut Archive) -> Result<()> {
                ar.$xfer(self)
            }

            fn fresh() -> Result<Self> {
                Ok(Self::default())
            }

            fn archive_slice(data: &mut [Self], ar: &mut Archive) -> Result<()> {
                ar.$xfer_slice(data)
            }
        }
    };
}

impl_archivable_block!(f64, xfer_f64, xfer_f64_slice);
impl_archivable_block!(i32, xfer_i32, xfer_i32_slice);
impl_archivable_block!(usize, xfer_usize, xfer_usize_slice);
impl_archivable_block!(u8, xfer_u8, xfer_u8_slice);

impl_archivable!(i16, xfer_i16);
impl_archivable!(i64, xfer_i64);
impl_archivable!(bool, xfer_bool);

impl Archivable for String {
    fn archive(&mut self, ar: &mut Archive) -> Result<()> {
        ar.xfer_string(self)
    }

    fn fresh() -> Result<Self> {
        Ok(String::new())
    }
}

/// Optional owned C string; `None` round-trips as null.
impl Archivable for Option<CString> {
    fn archive(&mut self, ar: &mut Archive) -> Result<()> {
        ar.xfer_cstr(self)
    }

    fn fresh() -> Result<Self> {
        Ok(None)
    }
}
