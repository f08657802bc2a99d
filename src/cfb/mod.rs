//! OLE Compound File Binary (CFB) structural reader.
//!
//! A compound file is a small FAT file system packed into one buffer:
//!
//! ```text
//! ┌────────────────────────────┐ offset 0
//! │ HEADER (512 bytes)         │ signature, sector shifts, FAT/Mini-FAT/DIF
//! │                            │ locations, first 109 FAT sector ids
//! ├────────────────────────────┤ sector 0
//! │ SECTORS (2^shift bytes)    │ FAT, DIF, Mini-FAT, directory and stream
//! │ ...                        │ data, linked into chains by the FAT
//! └────────────────────────────┘
//! ```
//!
//! Streams smaller than [`MINI_STREAM_CUTOFF`] live in the *mini-stream*, a
//! regular stream owned by the root entry and carved into 64-byte
//! mini-sectors chained by the Mini-FAT.

pub mod directory;
pub mod fat;
pub mod file;
pub mod header;

pub use directory::{DirectoryEntry, EntryType};
pub use file::CompoundFile;
pub use header::CfbHeader;

use crate::buffer::ByteWindow;

/// Magic bytes at offset 0 of every compound file.
pub const SIGNATURE: [u8; 8] = [0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];

/// Size of the header region in bytes.
pub const HEADER_SIZE: usize = 512;

/// Size of one directory entry in bytes.
pub const DIR_ENTRY_SIZE: usize = 128;

/// Streams of at least this many bytes are stored in regular sectors.
pub const MINI_STREAM_CUTOFF: u64 = 4096;

/// Number of FAT sector ids stored inline in the header.
pub const HEADER_DIFAT_ENTRIES: usize = 109;

/// Largest regular sector id; everything above is a marker.
pub const MAX_REG_SECT: u32 = 0xFFFF_FFFA;
/// Marks a DIF sector in the FAT.
pub const DIFSECT: u32 = 0xFFFF_FFFC;
/// Marks a FAT sector in the FAT.
pub const FATSECT: u32 = 0xFFFF_FFFD;
/// Terminates a sector chain.
pub const ENDOFCHAIN: u32 = 0xFFFF_FFFE;
/// Unallocated sector.
pub const FREESECT: u32 = 0xFFFF_FFFF;
/// Empty sibling/child pointer in a directory entry.
pub const NOSTREAM: u32 = 0xFFFF_FFFF;

/// Default cap on the number of hops taken along any one sector chain.
pub const DEFAULT_MAX_CHAIN_STEPS: usize = 5000;

/// Default upper bound for the sector and mini-sector shifts.
pub const DEFAULT_MAX_SECTOR_SHIFT: u16 = 20;

/// Limits applied while reading a compound file.
#[derive(Debug, Clone, Copy)]
pub struct CfbOptions {
    /// Maximum hops along a single sector chain before giving up.
    pub max_chain_steps: usize,
    /// Largest accepted sector shift (and mini-sector shift).
    pub max_sector_shift: u16,
}

impl Default for CfbOptions {
    fn default() -> Self {
        Self {
            max_chain_steps: DEFAULT_MAX_CHAIN_STEPS,
            max_sector_shift: DEFAULT_MAX_SECTOR_SHIFT,
        }
    }
}

/// Whether the window starts with the compound file signature.
pub fn is_cfb(window: &ByteWindow<'_>) -> bool {
    window.starts_with(&SIGNATURE)
}
