//! Bounded, window-relative view over caller-supplied bytes.
//!
//! Every structural read in the crate goes through a [`ByteWindow`]. Offsets
//! are always relative to the window start, and every accessor checks
//! against the window end, so a parser handed a sub-range of a larger
//! allocation can never observe bytes outside that range.

use byteorder::{ByteOrder, LittleEndian};

use crate::error::{MsgError, Result};

/// A `(backing, start, length)` triple with bounds-checked accessors.
#[derive(Debug, Clone, Copy)]
pub struct ByteWindow<'a> {
    backing: &'a [u8],
    start: usize,
    len: usize,
}

impl<'a> ByteWindow<'a> {
    /// Window covering all of `bytes`.
    pub fn new(bytes: &'a [u8]) -> Self {
        Self {
            backing: bytes,
            start: 0,
            len: bytes.len(),
        }
    }

    /// Window covering `[offset, offset + length)` of `backing`.
    ///
    /// Fails if the range does not lie entirely inside `backing`.
    pub fn with_range(backing: &'a [u8], offset: usize, length: usize) -> Result<Self> {
        match offset.checked_add(length) {
            Some(end) if end <= backing.len() => Ok(Self {
                backing,
                start: offset,
                len: length,
            }),
            _ => Err(MsgError::InvalidWindow {
                offset,
                length,
                available: backing.len(),
            }),
        }
    }

    /// Length of the window in bytes.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The window's bytes.
    pub fn as_slice(&self) -> &'a [u8] {
        &self.backing[self.start..self.start + self.len]
    }

    /// Whether the window begins with `prefix`.
    pub fn starts_with(&self, prefix: &[u8]) -> bool {
        self.as_slice().starts_with(prefix)
    }

    /// Exactly `length` bytes at `offset`, or `OutOfBounds`.
    pub fn slice(&self, offset: usize, length: usize) -> Result<&'a [u8]> {
        match offset.checked_add(length) {
            Some(end) if end <= self.len => Ok(&self.as_slice()[offset..end]),
            _ => Err(MsgError::OutOfBounds { offset, length }),
        }
    }

    /// Up to `length` bytes at `offset`; shorter (possibly empty) when the
    /// window ends first.
    pub fn slice_clamped(&self, offset: usize, length: usize) -> &'a [u8] {
        if offset >= self.len {
            return &[];
        }
        let end = offset.saturating_add(length).min(self.len);
        &self.as_slice()[offset..end]
    }

    /// A narrower window over `[offset, offset + length)` of this one.
    pub fn sub_window(&self, offset: usize, length: usize) -> Result<ByteWindow<'a>> {
        self.slice(offset, length)?;
        Ok(Self {
            backing: self.backing,
            start: self.start + offset,
            len: length,
        })
    }

    pub fn read_u8(&self, offset: usize) -> Result<u8> {
        Ok(self.slice(offset, 1)?[0])
    }

    pub fn read_u16(&self, offset: usize) -> Result<u16> {
        Ok(LittleEndian::read_u16(self.slice(offset, 2)?))
    }

    pub fn read_u32(&self, offset: usize) -> Result<u32> {
        Ok(LittleEndian::read_u32(self.slice(offset, 4)?))
    }

    pub fn read_u64(&self, offset: usize) -> Result<u64> {
        Ok(LittleEndian::read_u64(self.slice(offset, 8)?))
    }
}

impl<'a> From<&'a [u8]> for ByteWindow<'a> {
    fn from(bytes: &'a [u8]) -> Self {
        Self::new(bytes)
    }
}

impl<'a> From<&'a Vec<u8>> for ByteWindow<'a> {
    fn from(bytes: &'a Vec<u8>) -> Self {
        Self::new(bytes.as_slice())
    }
}
