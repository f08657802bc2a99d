//! The `__properties_version1.0` stream.
//!
//! ```text
//! header: 32 bytes at the message root, 8 bytes in recipient and
//!         attachment storages
//! entry:  type u16 | id u16 | flags u32 | value [u8; 8]
//! ```
//!
//! Fixed-width values (integers, booleans, times) are stored inline; for
//! variable-width types the value holds the size of the matching
//! `__substg1.0_` stream and is of no use here.

use chrono::{DateTime, Utc};
use tracing::debug;

use super::tag::PropertyType;

/// Header size of the stream at the message root.
pub const ROOT_HEADER_SIZE: usize = 32;
/// Header size of the stream inside recipient storages.
pub const RECIPIENT_HEADER_SIZE: usize = 8;

const ENTRY_SIZE: usize = 16;

/// Seconds between 1601-01-01 and 1970-01-01.
const FILETIME_UNIX_OFFSET: i64 = 11_644_473_600;
const FILETIME_TICKS_PER_SECOND: u64 = 10_000_000;

/// One fixed-length property entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedEntry {
    pub tag: u16,
    pub kind: PropertyType,
    pub flags: u32,
    pub value: [u8; 8],
}

impl FixedEntry {
    fn parse(raw: &[u8]) -> Option<Self> {
        let raw: &[u8; ENTRY_SIZE] = raw.try_into().ok()?;
        let mut value = [0u8; 8];
        value.copy_from_slice(&raw[8..16]);
        Some(Self {
            kind: PropertyType::from(u16::from_le_bytes([raw[0], raw[1]])),
            tag: u16::from_le_bytes([raw[2], raw[3]]),
            flags: u32::from_le_bytes([raw[4], raw[5], raw[6], raw[7]]),
            value,
        })
    }

    pub fn as_i32(&self) -> Option<i32> {
        match self.kind {
            PropertyType::Int32 => Some(i32::from_le_bytes([
                self.value[0],
                self.value[1],
                self.value[2],
                self.value[3],
            ])),
            PropertyType::Int16 => Some(i32::from(i16::from_le_bytes([self.value[0], self.value[1]]))),
            _ => None,
        }
    }

    pub fn as_time(&self) -> Option<DateTime<Utc>> {
        if self.kind != PropertyType::SysTime {
            return None;
        }
        filetime_to_datetime(u64::from_le_bytes(self.value))
    }
}

/// Parsed fixed-length property table.
#[derive(Debug, Clone, Default)]
pub struct FixedProperties {
    entries: Vec<FixedEntry>,
}

impl FixedProperties {
    /// Parse `data`, skipping a header of `header_size` bytes. A trailing
    /// partial entry is ignored.
    pub fn parse(data: &[u8], header_size: usize) -> Self {
        let Some(body) = data.get(header_size..) else {
            debug!(len = data.len(), header_size, "Property stream shorter than its header");
            return Self::default();
        };
        let entries = body
            .chunks_exact(ENTRY_SIZE)
            .filter_map(FixedEntry::parse)
            .collect();
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, tag: u16) -> Option<&FixedEntry> {
        self.entries.iter().find(|e| e.tag == tag)
    }

    pub fn get_i32(&self, tag: u16) -> Option<i32> {
        self.get(tag).and_then(FixedEntry::as_i32)
    }

    pub fn get_time(&self, tag: u16) -> Option<DateTime<Utc>> {
        self.get(tag).and_then(FixedEntry::as_time)
    }
}

/// Convert a Windows FILETIME (100 ns ticks since 1601-01-01 UTC).
///
/// Zero, which Outlook uses for "not set", maps to `None`.
pub fn filetime_to_datetime(ticks: u64) -> Option<DateTime<Utc>> {
    if ticks == 0 {
        return None;
    }
    let secs = i64::try_from(ticks / FILETIME_TICKS_PER_SECOND).ok()? - FILETIME_UNIX_OFFSET;
    let nanos = (ticks % FILETIME_TICKS_PER_SECOND) as u32 * 100;
    DateTime::from_timestamp(secs, nanos)
}
