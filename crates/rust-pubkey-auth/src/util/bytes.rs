//! SSH wire-format byte helpers.
//!
//! Encoding follows RFC 4251 §5: `string` is a `uint32` big-endian length
//! followed by the raw bytes, `boolean` is a single byte, and `name-list` is a
//! `string` of comma-separated names.

use std::fmt::Write as _;

use ::bytes::{Buf, BufMut};

use crate::error::{AuthError, Result};

/// Writing helpers for SSH wire types on any [`BufMut`].
pub trait SshBufMutExt: BufMut {
    /// Write a length-prefixed SSH `string`.
    fn put_ssh_string(&mut self, data: &[u8]) {
        self.put_u32(data.len() as u32);
        self.put_slice(data);
    }

    /// Write an SSH `boolean`.
    fn put_ssh_bool(&mut self, value: bool) {
        self.put_u8(u8::from(value));
    }

    /// Write an SSH `name-list`.
    fn put_name_list<S: AsRef<str>>(&mut self, names: &[S]) {
        let joined = names
            .iter()
            .map(AsRef::as_ref)
            .collect::<Vec<_>>()
            .join(",");
        self.put_ssh_string(joined.as_bytes());
    }
}

impl<B: BufMut + ?Sized> SshBufMutExt for B {}

/// Cursor over a decoded SSH message body.
///
/// Every read is bounds-checked; running past the end is reported as a
/// protocol violation rather than a panic.
#[derive(Debug, Clone)]
pub struct SshReader<'a> {
    buf: &'a [u8],
}

impl<'a> SshReader<'a> {
    /// Start reading at the beginning of `buf`.
    #[must_use]
    pub const fn new(buf: &'a [u8]) -> Self {
        Self { buf }
    }

    /// Bytes left to read.
    #[must_use]
    pub const fn remaining(&self) -> usize {
        self.buf.len()
    }

    /// Whether the whole buffer has been consumed.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    fn need(&self, n: usize, what: &str) -> Result<()> {
        if self.buf.remaining() < n {
            return Err(AuthError::protocol(format!(
                "truncated {what}: need {n} bytes, have {}",
                self.buf.remaining()
            )));
        }
        Ok(())
    }

    /// Read a single byte.
    pub fn read_u8(&mut self) -> Result<u8> {
        self.need(1, "byte")?;
        Ok(self.buf.get_u8())
    }

    /// Read an SSH `boolean`; any non-zero value is true.
    pub fn read_bool(&mut self) -> Result<bool> {
        Ok(self.read_u8()? != 0)
    }

    /// Read a big-endian `uint32`.
    pub fn read_u32(&mut self) -> Result<u32> {
        self.need(4, "uint32")?;
        Ok(self.buf.get_u32())
    }

    /// Read a length-prefixed SSH `string` as raw bytes.
    pub fn read_string(&mut self) -> Result<&'a [u8]> {
        let len = self.read_u32()? as usize;
        self.need(len, "string")?;
        let (head, tail) = self.buf.split_at(len);
        self.buf = tail;
        Ok(head)
    }

    /// Read an SSH `string` that must be valid UTF-8.
    pub fn read_utf8(&mut self) -> Result<&'a str> {
        let raw = self.read_string()?;
        std::str::from_utf8(raw)
            .map_err(|e| AuthError::protocol(format!("string is not valid UTF-8: {e}")))
    }

    /// Read an SSH `name-list`.
    pub fn read_name_list(&mut self) -> Result<Vec<String>> {
        let joined = self.read_utf8()?;
        if joined.is_empty() {
            return Ok(Vec::new());
        }
        Ok(joined.split(',').map(str::to_string).collect())
    }

    /// Fail unless every byte has been consumed.
    pub fn finish(&self, message: &str) -> Result<()> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(AuthError::protocol(format!(
                "{} trailing bytes after {message}",
                self.remaining()
            )))
        }
    }
}

/// Lowercase hex rendering of a byte slice, for logs and `Debug` output.
#[must_use]
pub fn to_hex(data: &[u8]) -> String {
    let mut out = String::with_capacity(data.len() * 2);
    for byte in data {
        let _ = write!(out, "{byte:02x}");
    }
    out
}
