//! Compound file reader: FAT assembly, directory scan and stream
//! materialization over a [`ByteWindow`].

use std::cell::OnceCell;
use std::collections::HashSet;

use tracing::{debug, warn};

use crate::buffer::ByteWindow;
use crate::error::Result;

use super::directory::{DirectoryEntry, DirectoryTree, EntryType};
use super::fat::{AllocationTable, Chain, ChainEnd};
use super::header::CfbHeader;
use super::{CfbOptions, DIR_ENTRY_SIZE, MAX_REG_SECT, MINI_STREAM_CUTOFF};

/// A parsed compound file.
///
/// Holds the allocation tables and directory; stream contents are read
/// on demand. The mini-stream is materialized at most once.
#[derive(Debug)]
pub struct CompoundFile<'a> {
    window: ByteWindow<'a>,
    header: CfbHeader,
    fat: AllocationTable,
    mini_fat: AllocationTable,
    entries: Vec<DirectoryEntry>,
    tree: DirectoryTree,
    root: Option<u32>,
    mini_stream: OnceCell<Vec<u8>>,
    options: CfbOptions,
}

impl<'a> CompoundFile<'a> {
    /// Parse header, FAT, Mini-FAT and directory.
    ///
    /// Only header problems are reported as errors. Damage further in
    /// (truncated sectors, broken chains) is logged and leaves the affected
    /// table or stream short.
    pub fn open(window: ByteWindow<'a>, options: CfbOptions) -> Result<Self> {
        let header = CfbHeader::parse(&window, options.max_sector_shift)?;
        debug!(
            sector_size = header.sector_size(),
            mini_sector_size = header.mini_sector_size(),
            fat_sectors = header.num_fat_sectors,
            dif_sectors = header.num_dif_sectors,
            "Parsed compound file header"
        );

        let mut file = Self {
            window,
            header,
            fat: AllocationTable::default(),
            mini_fat: AllocationTable::default(),
            entries: Vec::new(),
            tree: DirectoryTree::default(),
            root: None,
            mini_stream: OnceCell::new(),
            options,
        };

        file.fat = file.load_fat();
        file.mini_fat = file.load_mini_fat();
        file.entries = file.load_directory();
        file.root = file
            .entries
            .iter()
            .find(|e| e.entry_type == EntryType::Root)
            .map(|e| e.id);
        if let Some(root) = file.root {
            file.tree = DirectoryTree::build(&file.entries, root);
        } else {
            warn!("Compound file has no root entry");
        }

        debug!(
            fat_entries = file.fat.len(),
            mini_fat_entries = file.mini_fat.len(),
            directory_entries = file.entries.len(),
            "Loaded compound file structure"
        );
        Ok(file)
    }

    pub fn header(&self) -> &CfbHeader {
        &self.header
    }

    /// All directory entries in scan order, including unallocated slots.
    pub fn entries(&self) -> &[DirectoryEntry] {
        &self.entries
    }

    pub fn entry(&self, id: u32) -> Option<&DirectoryEntry> {
        self.entries.get(id as usize)
    }

    /// The root storage entry.
    pub fn root(&self) -> Option<&DirectoryEntry> {
        self.root.and_then(|id| self.entry(id))
    }

    /// Child entries of a storage, in scan order.
    pub fn children(&self, parent: u32) -> impl Iterator<Item = &DirectoryEntry> + '_ {
        self.tree
            .children(parent)
            .iter()
            .filter_map(move |&id| self.entry(id))
    }

    /// The storage that contains `id`.
    pub fn parent(&self, id: u32) -> Option<u32> {
        self.tree.parent(id)
    }

    /// The full contents of a stream entry.
    ///
    /// Streams below the mini-stream cutoff are read from the mini-stream;
    /// everything else (and the root entry itself) from regular sectors. A
    /// chain that breaks early yields a short stream.
    pub fn read_stream(&self, entry: &DirectoryEntry) -> Vec<u8> {
        if entry.size == 0 {
            return Vec::new();
        }
        if entry.entry_type == EntryType::Root || entry.size >= MINI_STREAM_CUTOFF {
            self.read_regular(entry.start_sector, entry.size)
        } else {
            self.read_mini(entry.start_sector, entry.size)
        }
    }

    fn read_regular(&self, start: u32, size: u64) -> Vec<u8> {
        let chain = self.walk(&self.fat, start, "stream");
        let sector_size = self.header.sector_size();
        let wanted = clamp_size(size, self.window.len());
        let mut data = Vec::with_capacity(wanted);

        for &sector in &chain.sectors {
            if data.len() >= wanted {
                break;
            }
            let bytes = self.sector(sector);
            data.extend_from_slice(bytes);
            if bytes.len() < sector_size {
                warn!(sector, read = bytes.len(), "Sector truncated by end of buffer");
                break;
            }
        }
        data.truncate(wanted);
        data
    }

    fn read_mini(&self, start: u32, size: u64) -> Vec<u8> {
        let mini_stream = self.mini_stream();
        let chain = self.walk(&self.mini_fat, start, "mini stream");
        let mini_size = self.header.mini_sector_size();
        let wanted = clamp_size(size, mini_stream.len());
        let mut data = Vec::with_capacity(wanted);

        for &sector in &chain.sectors {
            if data.len() >= wanted {
                break;
            }
            let offset = sector as usize * mini_size;
            let end = (offset + mini_size).min(mini_stream.len());
            if offset >= end {
                warn!(sector, "Mini-sector lies outside the mini-stream");
                break;
            }
            data.extend_from_slice(&mini_stream[offset..end]);
            if end - offset < mini_size {
                break;
            }
        }
        data.truncate(wanted);
        data
    }

    /// The mini-stream, read from the root entry's regular chain on first use.
    fn mini_stream(&self) -> &[u8] {
        self.mini_stream.get_or_init(|| match self.root() {
            Some(root) if root.size > 0 => {
                let bytes = self.read_regular(root.start_sector, root.size);
                debug!(size = bytes.len(), "Materialized mini-stream");
                bytes
            }
            _ => Vec::new(),
        })
    }

    /// Bytes of one regular sector, clamped at the window end.
    fn sector(&self, sector: u32) -> &'a [u8] {
        self.window
            .slice_clamped(self.header.sector_offset(sector), self.header.sector_size())
    }

    fn walk(&self, table: &AllocationTable, start: u32, what: &str) -> Chain {
        let chain = table.walk(start, self.options.max_chain_steps);
        match chain.end {
            ChainEnd::EndOfChain => {}
            ChainEnd::Cycle(sector) => warn!(what, start, sector, "Cyclic sector chain"),
            ChainEnd::OutOfRange(sector) => {
                warn!(what, start, sector, "Sector chain leaves the allocation table")
            }
            ChainEnd::FreeSector(sector) => {
                warn!(what, start, sector, "Sector chain runs into a free sector")
            }
            ChainEnd::StepLimit => warn!(
                what,
                start,
                limit = self.options.max_chain_steps,
                "Sector chain exceeded step limit"
            ),
        }
        chain
    }

    fn load_fat(&self) -> AllocationTable {
        let sector_size = self.header.sector_size();
        let entries_per_sector = sector_size / 4;
        // A FAT cannot name more distinct sectors than the window holds.
        let limit = self
            .options
            .max_chain_steps
            .min(self.window.len() / sector_size + 1);
        let mut list = FatSectorList::new(limit);

        for &id in &self.header.header_fat_sectors {
            if !list.push(id) {
                break;
            }
        }

        // DIF sectors: entries_per_sector - 1 FAT sector ids, then the next DIF sector.
        let mut dif = self.header.first_dif_sector;
        let mut dif_seen = HashSet::new();
        'dif: while !list.is_full()
            && dif < MAX_REG_SECT
            && dif_seen.len() < (self.header.num_dif_sectors as usize).min(limit)
        {
            if !dif_seen.insert(dif) {
                warn!(sector = dif, "Cyclic DIF chain");
                break;
            }
            let ids = ByteWindow::new(self.sector(dif));
            for i in 0..entries_per_sector.saturating_sub(1) {
                match ids.read_u32(i * 4) {
                    Ok(id) if id < MAX_REG_SECT => {
                        if !list.push(id) {
                            break 'dif;
                        }
                    }
                    _ => break,
                }
            }
            dif = match ids.read_u32((entries_per_sector - 1) * 4) {
                Ok(next) => next,
                Err(_) => {
                    warn!(sector = dif, "DIF sector truncated by end of buffer");
                    break;
                }
            };
        }

        if list.repeated > 0 {
            warn!(count = list.repeated, "Repeated FAT sector ids ignored");
        }
        if list.dropped {
            warn!(limit, "Too many FAT sectors, ignoring the excess");
        }

        let sectors: Vec<&[u8]> = list.sectors.iter().map(|&id| self.sector(id)).collect();
        let mut raw = Vec::with_capacity(sectors.iter().map(|b| b.len()).sum());
        for (&sector, bytes) in list.sectors.iter().zip(&sectors) {
            if bytes.len() < sector_size {
                warn!(sector, "FAT sector truncated by end of buffer");
            }
            raw.extend_from_slice(bytes);
        }
        AllocationTable::from_le_bytes(&raw)
    }

    fn load_mini_fat(&self) -> AllocationTable {
        let first = self.header.first_mini_fat_sector;
        let count = self.header.num_mini_fat_sectors as usize;
        if first >= MAX_REG_SECT || count == 0 {
            return AllocationTable::default();
        }
        let chain = self.walk(&self.fat, first, "mini FAT");
        let mut raw = Vec::new();
        for &sector in chain.sectors.iter().take(count) {
            raw.extend_from_slice(self.sector(sector));
        }
        AllocationTable::from_le_bytes(&raw)
    }

    fn load_directory(&self) -> Vec<DirectoryEntry> {
        let chain = self.walk(&self.fat, self.header.first_dir_sector, "directory");
        let wide_size = self.header.sector_size() > 512;
        let mut entries = Vec::new();

        for &sector in &chain.sectors {
            let bytes = ByteWindow::new(self.sector(sector));
            for slot in 0..bytes.len() / DIR_ENTRY_SIZE {
                let id = entries.len() as u32;
                let Ok(raw) = bytes.sub_window(slot * DIR_ENTRY_SIZE, DIR_ENTRY_SIZE) else {
                    break;
                };
                match DirectoryEntry::parse(&raw, id, wide_size) {
                    Some(entry) => entries.push(entry),
                    None => break,
                }
            }
        }
        entries
    }
}

/// FAT sector ids in listing order, without repeats and capped at `limit`.
struct FatSectorList {
    sectors: Vec<u32>,
    seen: HashSet<u32>,
    limit: usize,
    repeated: usize,
    dropped: bool,
}

impl FatSectorList {
    fn new(limit: usize) -> Self {
        Self {
            sectors: Vec::new(),
            seen: HashSet::new(),
            limit,
            repeated: 0,
            dropped: false,
        }
    }

    fn is_full(&self) -> bool {
        self.dropped
    }

    /// Returns `false` once the list is full and `id` was dropped.
    fn push(&mut self, id: u32) -> bool {
        if self.seen.contains(&id) {
            self.repeated += 1;
            return true;
        }
        if self.sectors.len() >= self.limit {
            self.dropped = true;
            return false;
        }
        self.seen.insert(id);
        self.sectors.push(id);
        true
    }
}

/// Bound a declared stream size by what the buffer could possibly hold.
fn clamp_size(size: u64, available: usize) -> usize {
    usize::try_from(size).unwrap_or(usize::MAX).min(available)
}
