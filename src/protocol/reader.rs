//! Bounds-checked cursor shared by both protocols.

use crate::protocol::error::CodecError;
use crate::protocol::MAX_DEPTH;

pub(crate) struct Reader<'a> {
    buf: &'a [u8],
    depth: usize,
}

impl<'a> Reader<'a> {
    pub(crate) fn new(buf: &'a [u8]) -> Self {
        Self { buf, depth: 0 }
    }

    pub(crate) fn remaining(&self) -> usize {
        self.buf.len()
    }

    pub(crate) fn take(&mut self, n: usize) -> Result<&'a [u8], CodecError> {
        if self.buf.len() < n {
            return Err(CodecError::Truncated {
                needed: n,
                remaining: self.buf.len(),
            });
        }
        let (head, tail) = self.buf.split_at(n);
        self.buf = tail;
        Ok(head)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N], CodecError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    pub(crate) fn u8(&mut self) -> Result<u8, CodecError> {
        Ok(self.take(1)?[0])
    }

    pub(crate) fn i16_be(&mut self) -> Result<i16, CodecError> {
        Ok(i16::from_be_bytes(self.array()?))
    }

    pub(crate) fn i32_be(&mut self) -> Result<i32, CodecError> {
        Ok(i32::from_be_bytes(self.array()?))
    }

    pub(crate) fn i64_be(&mut self) -> Result<i64, CodecError> {
        Ok(i64::from_be_bytes(self.array()?))
    }

    pub(crate) fn f64_be(&mut self) -> Result<f64, CodecError> {
        Ok(f64::from_be_bytes(self.array()?))
    }

    pub(crate) fn f64_le(&mut self) -> Result<f64, CodecError> {
        Ok(f64::from_le_bytes(self.array()?))
    }

    /// Unsigned LEB128, at most `max_bytes` long.
    pub(crate) fn varint(&mut self, max_bytes: usize) -> Result<u64, CodecError> {
        let mut result = 0u64;
        for i in 0..max_bytes {
            let byte = self.u8()?;
            result |= u64::from(byte & 0x7f) << (7 * i);
            if byte & 0x80 == 0 {
                return Ok(result);
            }
        }
        Err(CodecError::VarintOverflow)
    }

    /// Validate a declared element count against what is left to read.
    ///
    /// Every element occupies at least one byte, except that compact bools in
    /// struct fields never reach here.
    pub(crate) fn checked_size(&self, size: i64) -> Result<usize, CodecError> {
        if size < 0 {
            return Err(CodecError::NegativeSize(size));
        }
        let size = size as usize;
        if size > self.buf.len() {
            return Err(CodecError::SizeExceedsInput {
                size,
                remaining: self.buf.len(),
            });
        }
        Ok(size)
    }

    pub(crate) fn enter(&mut self) -> Result<(), CodecError> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(CodecError::DepthLimit(MAX_DEPTH));
        }
        Ok(())
    }

    pub(crate) fn leave(&mut self) {
        self.depth -= 1;
    }

    pub(crate) fn finish(self) -> Result<(), CodecError> {
        if self.buf.is_empty() {
            Ok(())
        } else {
            Err(CodecError::TrailingBytes(self.buf.len()))
        }
    }
}

pub(crate) fn method_name(raw: &[u8]) -> Result<String, CodecError> {
    std::str::from_utf8(raw)
        .map(str::to_owned)
        .map_err(|_| CodecError::InvalidMethodName)
}
