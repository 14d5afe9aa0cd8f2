// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 Tessel contributors

//! Compact binary codec.
//!
//! Fixed-width little-endian values with a write-side coalescing buffer.
//! Strings are length-prefixed (`i32` byte count), optional C strings carry
//! an `i64` count with `-1` for null. There is no endianness or width tag:
//! streams are only portable between hosts of matching integer width and
//! byte order.

use std::ffi::{CStr, CString};
use std::io::{Read, Write};

use super::{Decoder, Encoder};
use crate::error::{ArchiveError, Result};

const BUFFER_SIZE: usize = 1024;

/// Generate little-endian write methods for fixed-width primitives.
macro_rules! impl_put_le {
    ($name:ident, $ty:ty) => {
        fn $name(&mut self, v: $ty) -> Result<()> {
            self.put_bytes(&v.to_le_bytes())
        }
    };
}

/// Generate little-endian read methods for fixed-width primitives.
macro_rules! impl_get_le {
    ($name:ident, $ty:ty) => {
        fn $name(&mut self) -> Result<$ty> {
            let mut bytes = [0u8; std::mem::size_of::<$ty>()];
            self.input.read_exact(&mut bytes)?;
            Ok(<$ty>::from_le_bytes(bytes))
        }
    };
}

/// Generate block read methods that absorb one contiguous byte run.
macro_rules! impl_get_le_slice {
    ($name:ident, $ty:ty) => {
        fn $name(&mut self, out: &mut [$ty]) -> Result<()> {
            const WIDTH: usize = std::mem::size_of::<$ty>();
            let mut raw = vec![0u8; out.len() * WIDTH];
            self.input.read_exact(&mut raw)?;
            for (v, chunk) in out.iter_mut().zip(raw.chunks_exact(WIDTH)) {
                let mut bytes = [0u8; WIDTH];
                bytes.copy_from_slice(chunk);
                *v = <$ty>::from_le_bytes(bytes);
            }
            Ok(())
        }
    };
}

/// Generate block write methods that emit one contiguous byte run.
macro_rules! impl_put_le_slice {
    ($name:ident, $ty:ty) => {
        fn $name(&mut self, data: &[$ty]) -> Result<()> {
            self.flush_buffer()?;
            let mut raw = Vec::with_capacity(data.len() * std::mem::size_of::<$ty>());
            for v in data {
                raw.extend_from_slice(&v.to_le_bytes());
            }
            self.out.write_all(&raw)?;
            Ok(())
        }
    };
}

/// Buffered binary writer.
///
/// Primitive writes coalesce in a fixed buffer; a write that would overflow
/// flushes the buffer first and restarts at offset zero. Variable-length
/// payloads (strings, slices) flush before hitting the sink directly so the
/// stream order stays unambiguous. Dropping the encoder flushes.
pub struct BinaryEncoder<W: Write> {
    out: W,
    buffer: [u8; BUFFER_SIZE],
    filled: usize,
}

impl<W: Write> BinaryEncoder<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            buffer: [0u8; BUFFER_SIZE],
            filled: 0,
        }
    }

    fn put_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        if self.filled + bytes.len() > BUFFER_SIZE {
            self.flush_buffer()?;
        }
        if bytes.len() > BUFFER_SIZE {
            // larger than the buffer itself, bypass it
            self.out.write_all(bytes)?;
            return Ok(());
        }
        self.buffer[self.filled..self.filled + bytes.len()].copy_from_slice(bytes);
        self.filled += bytes.len();
        Ok(())
    }

    fn flush_buffer(&mut self) -> Result<()> {
        if self.filled > 0 {
            self.out.write_all(&self.buffer[..self.filled])?;
            self.filled = 0;
        }
        Ok(())
    }
}

impl<W: Write> Encoder for BinaryEncoder<W> {
    impl_put_le!(put_f64, f64);
    impl_put_le!(put_i16, i16);
    impl_put_le!(put_i32, i32);
    impl_put_le!(put_i64, i64);
    impl_put_le!(put_usize, usize);

    fn put_u8(&mut self, v: u8) -> Result<()> {
        self.put_bytes(&[v])
    }

    fn put_bool(&mut self, v: bool) -> Result<()> {
        self.put_bytes(&[u8::from(v)])
    }

    fn put_str(&mut self, v: &str) -> Result<()> {
        let len = i32::try_from(v.len())
            .map_err(|_| ArchiveError::format(format!("string of {} bytes exceeds the length prefix", v.len())))?;
        self.put_i32(len)?;
        self.flush_buffer()?;
        if len > 0 {
            self.out.write_all(v.as_bytes())?;
        }
        Ok(())
    }

    fn put_cstr(&mut self, v: Option<&CStr>) -> Result<()> {
        match v {
            None => self.put_i64(-1),
            Some(c) => {
                let bytes = c.to_bytes();
                self.put_i64(bytes.len() as i64)?;
                self.flush_buffer()?;
                if !bytes.is_empty() {
                    self.out.write_all(bytes)?;
                }
                Ok(())
            }
        }
    }

    impl_put_le_slice!(put_f64_slice, f64);
    impl_put_le_slice!(put_i32_slice, i32);
    impl_put_le_slice!(put_usize_slice, usize);

    fn put_u8_slice(&mut self, data: &[u8]) -> Result<()> {
        self.flush_buffer()?;
        self.out.write_all(data)?;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.flush_buffer()?;
        self.out.flush()?;
        Ok(())
    }
}

impl<W: Write> Drop for BinaryEncoder<W> {
    fn drop(&mut self) {
        if Encoder::flush(self).is_err() {
            log::warn!("binary encoder dropped with unflushable buffered data");
        }
    }
}

/// Binary reader over any byte source.
pub struct BinaryDecoder<R: Read> {
    input: R,
}

impl<R: Read> BinaryDecoder<R> {
    pub fn new(input: R) -> Self {
        Self { input }
    }
}

impl<R: Read> Decoder for BinaryDecoder<R> {
    impl_get_le!(get_f64, f64);
    impl_get_le!(get_i16, i16);
    impl_get_le!(get_i32, i32);
    impl_get_le!(get_i64, i64);
    impl_get_le!(get_usize, usize);

    fn get_u8(&mut self) -> Result<u8> {
        let mut byte = [0u8; 1];
        self.input.read_exact(&mut byte)?;
        Ok(byte[0])
    }

    fn get_bool(&mut self) -> Result<bool> {
        match self.get_u8()? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(ArchiveError::format(format!("expected boolean byte, found {:#04x}", other))),
        }
    }

    fn get_str(&mut self) -> Result<String> {
        let len = self.get_i32()?;
        if len < 0 {
            return Err(ArchiveError::format(format!("negative string length {}", len)));
        }
        let mut bytes = vec![0u8; len as usize];
        self.input.read_exact(&mut bytes)?;
        String::from_utf8(bytes).map_err(|_| ArchiveError::format("string payload is not valid UTF-8"))
    }

    fn get_cstr(&mut self) -> Result<Option<CString>> {
        let len = self.get_i64()?;
        if len == -1 {
            return Ok(None);
        }
        if len < 0 {
            return Err(ArchiveError::format(format!("negative C string length {}", len)));
        }
        let mut bytes = vec![0u8; len as usize];
        self.input.read_exact(&mut bytes)?;
        CString::new(bytes)
            .map(Some)
            .map_err(|_| ArchiveError::format("C string payload contains an interior NUL"))
    }

    impl_get_le_slice!(get_f64_slice, f64);
    impl_get_le_slice!(get_i32_slice, i32);
    impl_get_le_slice!(get_usize_slice, usize);

    fn get_u8_slice(&mut self, out: &mut [u8]) -> Result<()> {
        self.input.read_exact(out)?;
        Ok(())
    }
}
