// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 Tessel contributors

//! Line-oriented text codec.
//!
//! Every atomic token sits on its own line: decimal numerals, `t`/`f`
//! booleans, `u8` as its integer value. Strings are a length line followed
//! by the raw payload bytes and a newline. The reader tokenizes on
//! whitespace; string payloads consume one separator and then exactly the
//! announced byte count, so payloads may themselves contain newlines.

use std::ffi::{CStr, CString};
use std::io::{ErrorKind, Read, Write};
use std::str::FromStr;

use super::{Decoder, Encoder};
use crate::error::{ArchiveError, Result};

/// Generate `Display`-based write methods for numeric tokens.
macro_rules! impl_put_token {
    ($name:ident, $ty:ty) => {
        fn $name(&mut self, v: $ty) -> Result<()> {
            writeln!(self.out, "{}", v)?;
            Ok(())
        }
    };
}

/// Generate `FromStr`-based read methods for numeric tokens.
macro_rules! impl_get_token {
    ($name:ident, $ty:ty) => {
        fn $name(&mut self) -> Result<$ty> {
            self.parse_token::<$ty>()
        }
    };
}

/// Text writer.
pub struct TextEncoder<W: Write> {
    out: W,
}

impl<W: Write> TextEncoder<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }
}

impl<W: Write> Encoder for TextEncoder<W> {
    impl_put_token!(put_f64, f64);
    impl_put_token!(put_i16, i16);
    impl_put_token!(put_i32, i32);
    impl_put_token!(put_i64, i64);
    impl_put_token!(put_u8, u8);
    impl_put_token!(put_usize, usize);

    fn put_bool(&mut self, v: bool) -> Result<()> {
        writeln!(self.out, "{}", if v { 't' } else { 'f' })?;
        Ok(())
    }

    fn put_str(&mut self, v: &str) -> Result<()> {
        writeln!(self.out, "{}", v.len())?;
        if !v.is_empty() {
            self.out.write_all(v.as_bytes())?;
            self.out.write_all(b"\n")?;
        }
        Ok(())
    }

    fn put_cstr(&mut self, v: Option<&CStr>) -> Result<()> {
        match v {
            None => self.put_i64(-1),
            Some(c) => {
                let bytes = c.to_bytes();
                writeln!(self.out, "{}", bytes.len())?;
                if !bytes.is_empty() {
                    self.out.write_all(bytes)?;
                    self.out.write_all(b"\n")?;
                }
                Ok(())
            }
        }
    }

    fn flush(&mut self) -> Result<()> {
        self.out.flush()?;
        Ok(())
    }
}

/// Text reader.
pub struct TextDecoder<R: Read> {
    input: R,
}

impl<R: Read> TextDecoder<R> {
    pub fn new(input: R) -> Self {
        Self { input }
    }

    fn next_byte(&mut self) -> Result<Option<u8>> {
        let mut byte = [0u8; 1];
        loop {
            match self.input.read(&mut byte) {
                Ok(0) => return Ok(None),
                Ok(_) => return Ok(Some(byte[0])),
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Next whitespace-delimited token. Consumes the terminating separator.
    fn read_token(&mut self) -> Result<String> {
        let mut token = Vec::new();
        loop {
            match self.next_byte()? {
                None if token.is_empty() => {
                    return Err(ArchiveError::Stream(std::io::Error::new(
                        ErrorKind::UnexpectedEof,
                        "end of stream where a token was expected",
                    )))
                }
                None => break,
                Some(b) if b.is_ascii_whitespace() => {
                    if !token.is_empty() {
                        break;
                    }
                }
                Some(b) => token.push(b),
            }
        }
        String::from_utf8(token).map_err(|_| ArchiveError::format("token is not valid UTF-8"))
    }

    fn parse_token<T: FromStr>(&mut self) -> Result<T> {
        let token = self.read_token()?;
        token
            .parse::<T>()
            .map_err(|_| ArchiveError::format(format!("cannot parse token '{}'", token)))
    }

    fn read_exact_payload(&mut self, len: usize) -> Result<Vec<u8>> {
        let mut bytes = vec![0u8; len];
        self.input.read_exact(&mut bytes)?;
        Ok(bytes)
    }
}

impl<R: Read> Decoder for TextDecoder<R> {
    impl_get_token!(get_f64, f64);
    impl_get_token!(get_i16, i16);
    impl_get_token!(get_i32, i32);
    impl_get_token!(get_i64, i64);
    impl_get_token!(get_u8, u8);
    impl_get_token!(get_usize, usize);

    fn get_bool(&mut self) -> Result<bool> {
        let token = self.read_token()?;
        match token.as_str() {
            "t" => Ok(true),
            "f" => Ok(false),
            other => Err(ArchiveError::format(format!("expected boolean token, found '{}'", other))),
        }
    }

    fn get_str(&mut self) -> Result<String> {
        let len = self.parse_token::<i32>()?;
        if len < 0 {
            return Err(ArchiveError::format(format!("negative string length {}", len)));
        }
        let bytes = self.read_exact_payload(len as usize)?;
        String::from_utf8(bytes).map_err(|_| ArchiveError::format("string payload is not valid UTF-8"))
    }

    fn get_cstr(&mut self) -> Result<Option<CString>> {
        let len = self.parse_token::<i64>()?;
        if len == -1 {
            return Ok(None);
        }
        if len < 0 {
            return Err(ArchiveError::format(format!("negative C string length {}", len)));
        }
        let bytes = self.read_exact_payload(len as usize)?;
        CString::new(bytes)
            .map(Some)
            .map_err(|_| ArchiveError::format("C string payload contains an interior NUL"))
    }
}
