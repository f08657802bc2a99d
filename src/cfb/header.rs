//! Compound file header (first 512 bytes).
//!
//! ```text
//! offset  size  field
//!      0     8  signature
//!     30     2  sector shift (9 → 512-byte sectors)
//!     32     2  mini-sector shift (6 → 64-byte mini-sectors)
//!     44     4  number of FAT sectors
//!     48     4  first directory sector
//!     60     4  first Mini-FAT sector
//!     64     4  number of Mini-FAT sectors
//!     68     4  first DIF sector
//!     72     4  number of DIF sectors
//!     76   436  first 109 FAT sector ids
//! ```

use serde::Serialize;

use crate::buffer::ByteWindow;
use crate::error::{MsgError, Result};

use super::{HEADER_DIFAT_ENTRIES, MAX_REG_SECT, SIGNATURE};

const OFF_SECTOR_SHIFT: usize = 30;
const OFF_MINI_SECTOR_SHIFT: usize = 32;
const OFF_NUM_FAT_SECTORS: usize = 44;
const OFF_FIRST_DIR_SECTOR: usize = 48;
const OFF_FIRST_MINI_FAT_SECTOR: usize = 60;
const OFF_NUM_MINI_FAT_SECTORS: usize = 64;
const OFF_FIRST_DIF_SECTOR: usize = 68;
const OFF_NUM_DIF_SECTORS: usize = 72;
const OFF_DIFAT: usize = 76;

/// Smallest usable sector shift: one sector must hold a directory entry.
const MIN_SECTOR_SHIFT: u16 = 7;

/// Parsed header fields.
#[derive(Debug, Clone, Serialize)]
pub struct CfbHeader {
    pub sector_shift: u16,
    pub mini_sector_shift: u16,
    pub num_fat_sectors: u32,
    pub first_dir_sector: u32,
    pub first_mini_fat_sector: u32,
    pub num_mini_fat_sectors: u32,
    pub first_dif_sector: u32,
    pub num_dif_sectors: u32,
    /// FAT sector ids from the header, up to the first marker value.
    pub header_fat_sectors: Vec<u32>,
}

impl CfbHeader {
    /// Parse the header at the start of `window`.
    ///
    /// A window too short to hold the fixed fields is fatal
    /// ([`MsgError::TruncatedHeader`]). Out-of-range shifts yield
    /// [`MsgError::InvalidHeader`] so the caller can try another strategy.
    pub fn parse(window: &ByteWindow<'_>, max_shift: u16) -> Result<Self> {
        if !window.starts_with(&SIGNATURE) {
            return Err(MsgError::InvalidHeader("missing signature".into()));
        }
        if window.len() < OFF_DIFAT {
            return Err(MsgError::TruncatedHeader {
                needed: OFF_DIFAT,
                available: window.len(),
            });
        }

        let sector_shift = window.read_u16(OFF_SECTOR_SHIFT)?;
        let mini_sector_shift = window.read_u16(OFF_MINI_SECTOR_SHIFT)?;
        if !(MIN_SECTOR_SHIFT..=max_shift).contains(&sector_shift) {
            return Err(MsgError::InvalidHeader(format!(
                "sector shift {sector_shift} outside {MIN_SECTOR_SHIFT}..={max_shift}"
            )));
        }
        if mini_sector_shift == 0 || mini_sector_shift > sector_shift {
            return Err(MsgError::InvalidHeader(format!(
                "mini-sector shift {mini_sector_shift} outside 1..={sector_shift}"
            )));
        }

        // Entries past the window end are treated as absent.
        let header_fat_sectors = (0..HEADER_DIFAT_ENTRIES)
            .map_while(|i| window.read_u32(OFF_DIFAT + i * 4).ok())
            .take_while(|&sector| sector < MAX_REG_SECT)
            .collect();

        Ok(Self {
            sector_shift,
            mini_sector_shift,
            num_fat_sectors: window.read_u32(OFF_NUM_FAT_SECTORS)?,
            first_dir_sector: window.read_u32(OFF_FIRST_DIR_SECTOR)?,
            first_mini_fat_sector: window.read_u32(OFF_FIRST_MINI_FAT_SECTOR)?,
            num_mini_fat_sectors: window.read_u32(OFF_NUM_MINI_FAT_SECTORS)?,
            first_dif_sector: window.read_u32(OFF_FIRST_DIF_SECTOR)?,
            num_dif_sectors: window.read_u32(OFF_NUM_DIF_SECTORS)?,
            header_fat_sectors,
        })
    }

    /// Sector size in bytes (`2^sector_shift`).
    pub fn sector_size(&self) -> usize {
        1usize << self.sector_shift
    }

    /// Mini-sector size in bytes (`2^mini_sector_shift`).
    pub fn mini_sector_size(&self) -> usize {
        1usize << self.mini_sector_shift
    }

    /// Byte offset of a regular sector within the file.
    ///
    /// The header occupies the first sector-sized slot, which is exactly
    /// 512 bytes for the common 512-byte sector size.
    pub fn sector_offset(&self, sector: u32) -> usize {
        (sector as usize)
            .saturating_add(1)
            .saturating_mul(self.sector_size())
    }
}
