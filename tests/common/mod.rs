//! In-memory compound file writer for tests and benches.
//!
//! Lays out FAT sectors, DIF sectors, the directory, the Mini-FAT, the
//! mini-stream and regular stream sectors in that order, with 512-byte
//! sectors and 64-byte mini-sectors.

#![allow(dead_code)]

pub const SIGNATURE: [u8; 8] = [0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];

pub const ENDOFCHAIN: u32 = 0xFFFF_FFFE;
pub const FREESECT: u32 = 0xFFFF_FFFF;
pub const FATSECT: u32 = 0xFFFF_FFFD;
pub const DIFSECT: u32 = 0xFFFF_FFFC;
pub const NOSTREAM: u32 = 0xFFFF_FFFF;

pub const SECTOR: usize = 512;
pub const MINI_SECTOR: usize = 64;
pub const MINI_CUTOFF: usize = 4096;

const IDS_PER_SECTOR: usize = SECTOR / 4;
const HEADER_FAT_SLOTS: usize = 109;

/// Id of the root storage in every builder.
pub const ROOT: usize = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Root,
    Storage,
    Stream,
}

#[derive(Debug, Clone)]
struct Node {
    name: String,
    kind: Kind,
    data: Vec<u8>,
    children: Vec<usize>,
}

/// Where things ended up, for tests that corrupt a built file.
#[derive(Debug, Clone, Default)]
pub struct Layout {
    pub fat_sectors: Vec<u32>,
    pub dif_sectors: Vec<u32>,
    pub dir_sectors: Vec<u32>,
    pub mini_fat_sectors: Vec<u32>,
    /// Regular sectors of each node's stream (empty for mini streams).
    pub stream_sectors: Vec<Vec<u32>>,
    /// First mini-sector of each node's stream (`ENDOFCHAIN` for regular ones).
    pub mini_start: Vec<u32>,
}

impl Layout {
    /// Byte offset of FAT entry `sector` in the built file.
    pub fn fat_entry_offset(&self, sector: u32) -> usize {
        let fat_sector = self.fat_sectors[sector as usize / IDS_PER_SECTOR] as usize;
        (fat_sector + 1) * SECTOR + (sector as usize % IDS_PER_SECTOR) * 4
    }

    /// Byte offset of Mini-FAT entry `mini_sector` in the built file.
    pub fn mini_fat_entry_offset(&self, mini_sector: u32) -> usize {
        let fat_sector = self.mini_fat_sectors[mini_sector as usize / IDS_PER_SECTOR] as usize;
        (fat_sector + 1) * SECTOR + (mini_sector as usize % IDS_PER_SECTOR) * 4
    }
}

#[derive(Debug, Clone)]
pub struct CfbBuilder {
    nodes: Vec<Node>,
    /// FAT sector ids written into the header; the rest go to DIF sectors.
    header_fat_limit: usize,
}

impl Default for CfbBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl CfbBuilder {
    pub fn new() -> Self {
        Self {
            nodes: vec![Node {
                name: "Root Entry".to_string(),
                kind: Kind::Root,
                data: Vec::new(),
                children: Vec::new(),
            }],
            header_fat_limit: HEADER_FAT_SLOTS,
        }
    }

    /// Keep only `limit` FAT sector ids in the header and chain the rest
    /// through DIF sectors.
    pub fn header_fat_limit(mut self, limit: usize) -> Self {
        self.header_fat_limit = limit.min(HEADER_FAT_SLOTS);
        self
    }

    pub fn storage(&mut self, parent: usize, name: &str) -> usize {
        self.add(parent, name, Kind::Storage, Vec::new())
    }

    pub fn stream(&mut self, parent: usize, name: &str, data: Vec<u8>) -> usize {
        self.add(parent, name, Kind::Stream, data)
    }

    fn add(&mut self, parent: usize, name: &str, kind: Kind, data: Vec<u8>) -> usize {
        let id = self.nodes.len();
        self.nodes.push(Node {
            name: name.to_string(),
            kind,
            data,
            children: Vec::new(),
        });
        self.nodes[parent].children.push(id);
        id
    }

    pub fn build(&self) -> Vec<u8> {
        self.build_with_layout().0
    }

    pub fn build_with_layout(&self) -> (Vec<u8>, Layout) {
        // Mini-stream and Mini-FAT.
        let mut mini_stream = Vec::new();
        let mut mini_fat: Vec<u32> = Vec::new();
        let mut mini_start = vec![ENDOFCHAIN; self.nodes.len()];
        for (id, node) in self.nodes.iter().enumerate() {
            if node.kind != Kind::Stream || node.data.is_empty() || node.data.len() >= MINI_CUTOFF {
                continue;
            }
            let first = mini_fat.len() as u32;
            let count = node.data.len().div_ceil(MINI_SECTOR);
            for i in 0..count {
                let next = if i + 1 == count { ENDOFCHAIN } else { first + i as u32 + 1 };
                mini_fat.push(next);
            }
            mini_start[id] = first;
            mini_stream.extend_from_slice(&node.data);
            mini_stream.resize(mini_fat.len() * MINI_SECTOR, 0);
        }

        // Content sectors, in allocation order after FAT and DIF.
        let dir_count = self.nodes.len().div_ceil(SECTOR / 128);
        let mini_fat_count = (mini_fat.len() * 4).div_ceil(SECTOR);
        let mini_stream_count = mini_stream.len().div_ceil(SECTOR);
        let big: Vec<usize> = self
            .nodes
            .iter()
            .enumerate()
            .filter(|(_, n)| n.kind == Kind::Stream && n.data.len() >= MINI_CUTOFF)
            .map(|(id, _)| id)
            .collect();
        let big_count: usize = big
            .iter()
            .map(|&id| self.nodes[id].data.len().div_ceil(SECTOR))
            .sum();
        let content = dir_count + mini_fat_count + mini_stream_count + big_count;

        let mut fat_count: usize = 1;
        let dif_count = loop {
            let overflow = fat_count.saturating_sub(self.header_fat_limit);
            let dif = overflow.div_ceil(IDS_PER_SECTOR - 1);
            if fat_count * IDS_PER_SECTOR >= content + fat_count + dif {
                break dif;
            }
            fat_count += 1;
        };

        let total = fat_count + dif_count + content;
        let mut fat = vec![FREESECT; fat_count * IDS_PER_SECTOR];
        let mut next_sector = 0u32;
        let mut alloc = |count: usize, fat: &mut Vec<u32>| -> Vec<u32> {
            let ids: Vec<u32> = (0..count as u32).map(|i| next_sector + i).collect();
            next_sector += count as u32;
            for pair in ids.windows(2) {
                fat[pair[0] as usize] = pair[1];
            }
            if let Some(&last) = ids.last() {
                fat[last as usize] = ENDOFCHAIN;
            }
            ids
        };

        let mut layout = Layout {
            stream_sectors: vec![Vec::new(); self.nodes.len()],
            ..Layout::default()
        };
        layout.fat_sectors = alloc(fat_count, &mut fat);
        for &s in &layout.fat_sectors {
            fat[s as usize] = FATSECT;
        }
        layout.dif_sectors = alloc(dif_count, &mut fat);
        for &s in &layout.dif_sectors {
            fat[s as usize] = DIFSECT;
        }
        layout.dir_sectors = alloc(dir_count, &mut fat);
        let mini_fat_sectors = alloc(mini_fat_count, &mut fat);
        layout.mini_fat_sectors = mini_fat_sectors.clone();
        layout.mini_start = mini_start.clone();
        let mini_stream_sectors = alloc(mini_stream_count, &mut fat);
        for &id in &big {
            layout.stream_sectors[id] = alloc(self.nodes[id].data.len().div_ceil(SECTOR), &mut fat);
        }

        let mut out = vec![0u8; SECTOR * (total + 1)];
        let write_sector = |out: &mut Vec<u8>, sector: u32, bytes: &[u8]| {
            let start = (sector as usize + 1) * SECTOR;
            out[start..start + bytes.len()].copy_from_slice(bytes);
        };
        let write_ids = |out: &mut Vec<u8>, sectors: &[u32], ids: &[u32]| {
            let bytes: Vec<u8> = ids.iter().flat_map(|v| v.to_le_bytes()).collect();
            for (chunk, &sector) in bytes.chunks(SECTOR).zip(sectors) {
                write_sector(out, sector, chunk);
            }
        };

        // Header.
        out[..8].copy_from_slice(&SIGNATURE);
        put_u16(&mut out, 24, 0x003E);
        put_u16(&mut out, 26, 3);
        put_u16(&mut out, 28, 0xFFFE);
        put_u16(&mut out, 30, 9);
        put_u16(&mut out, 32, 6);
        put_u32(&mut out, 44, fat_count as u32);
        put_u32(&mut out, 48, layout.dir_sectors[0]);
        put_u32(&mut out, 56, MINI_CUTOFF as u32);
        put_u32(&mut out, 60, mini_fat_sectors.first().copied().unwrap_or(ENDOFCHAIN));
        put_u32(&mut out, 64, mini_fat_count as u32);
        put_u32(&mut out, 68, layout.dif_sectors.first().copied().unwrap_or(ENDOFCHAIN));
        put_u32(&mut out, 72, dif_count as u32);
        for slot in 0..HEADER_FAT_SLOTS {
            let id = if slot < self.header_fat_limit {
                layout.fat_sectors.get(slot).copied().unwrap_or(FREESECT)
            } else {
                FREESECT
            };
            put_u32(&mut out, 76 + slot * 4, id);
        }

        // DIF sectors.
        let overflow: Vec<u32> = layout
            .fat_sectors
            .iter()
            .skip(self.header_fat_limit)
            .copied()
            .collect();
        for (i, &dif) in layout.dif_sectors.iter().enumerate() {
            let mut ids: Vec<u32> = overflow
                .iter()
                .skip(i * (IDS_PER_SECTOR - 1))
                .take(IDS_PER_SECTOR - 1)
                .copied()
                .collect();
            ids.resize(IDS_PER_SECTOR - 1, FREESECT);
            ids.push(layout.dif_sectors.get(i + 1).copied().unwrap_or(ENDOFCHAIN));
            write_ids(&mut out, &[dif], &ids);
        }

        write_ids(&mut out, &layout.fat_sectors, &fat);
        write_ids(&mut out, &mini_fat_sectors, &mini_fat);
        for (chunk, &sector) in mini_stream.chunks(SECTOR).zip(&mini_stream_sectors) {
            write_sector(&mut out, sector, chunk);
        }
        for &id in &big {
            for (chunk, &sector) in self.nodes[id].data.chunks(SECTOR).zip(&layout.stream_sectors[id]) {
                write_sector(&mut out, sector, chunk);
            }
        }

        // Directory: each storage's children form a right-leaning chain.
        let mut dir = Vec::with_capacity(dir_count * SECTOR);
        for (id, node) in self.nodes.iter().enumerate() {
            let right = self
                .nodes
                .iter()
                .find_map(|p| {
                    let pos = p.children.iter().position(|&c| c == id)?;
                    p.children.get(pos + 1).copied()
                })
                .map_or(NOSTREAM, |c| c as u32);
            let child = node.children.first().map_or(NOSTREAM, |&c| c as u32);
            let (start, size) = match node.kind {
                Kind::Root => (
                    mini_stream_sectors.first().copied().unwrap_or(ENDOFCHAIN),
                    mini_stream.len(),
                ),
                Kind::Storage => (0, 0),
                Kind::Stream if node.data.len() >= MINI_CUTOFF => {
                    (layout.stream_sectors[id][0], node.data.len())
                }
                Kind::Stream => (mini_start[id], node.data.len()),
            };
            let kind = match node.kind {
                Kind::Root => 5,
                Kind::Storage => 1,
                Kind::Stream => 2,
            };
            dir.extend(dir_entry(&node.name, kind, NOSTREAM, right, child, start, size as u32));
        }
        while dir.len() < dir_count * SECTOR {
            dir.extend(dir_entry("", 0, NOSTREAM, NOSTREAM, NOSTREAM, 0, 0));
        }
        for (chunk, &sector) in dir.chunks(SECTOR).zip(&layout.dir_sectors) {
            write_sector(&mut out, sector, chunk);
        }

        (out, layout)
    }
}

fn dir_entry(name: &str, kind: u8, left: u32, right: u32, child: u32, start: u32, size: u32) -> Vec<u8> {
    let mut raw = vec![0u8; 128];
    if !name.is_empty() {
        let units = utf16(name);
        raw[..units.len()].copy_from_slice(&units);
        put_u16(&mut raw, 64, (units.len() + 2) as u16);
    }
    raw[66] = kind;
    raw[67] = 1;
    put_u32(&mut raw, 68, left);
    put_u32(&mut raw, 72, right);
    put_u32(&mut raw, 76, child);
    put_u32(&mut raw, 116, start);
    put_u32(&mut raw, 120, size);
    raw
}

pub fn put_u16(buf: &mut [u8], offset: usize, value: u16) {
    buf[offset..offset + 2].copy_from_slice(&value.to_le_bytes());
}

pub fn put_u32(buf: &mut [u8], offset: usize, value: u32) {
    buf[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
}

pub fn utf16(s: &str) -> Vec<u8> {
    s.encode_utf16().flat_map(u16::to_le_bytes).collect()
}

// ── MSG layer ───────────────────────────────────────────────────

pub const PT_INT32: u16 = 0x0003;
pub const PT_BOOLEAN: u16 = 0x000B;
pub const PT_STRING8: u16 = 0x001E;
pub const PT_UNICODE: u16 = 0x001F;
pub const PT_SYSTIME: u16 = 0x0040;
pub const PT_BINARY: u16 = 0x0102;

pub fn substg(tag: u16, kind: u16) -> String {
    format!("__substg1.0_{tag:04X}{kind:04X}")
}

/// One `__properties_version1.0` entry.
pub fn fixed_entry(tag: u16, kind: u16, value: u64) -> [u8; 16] {
    let mut raw = [0u8; 16];
    raw[..2].copy_from_slice(&kind.to_le_bytes());
    raw[2..4].copy_from_slice(&tag.to_le_bytes());
    raw[4..8].copy_from_slice(&6u32.to_le_bytes());
    raw[8..].copy_from_slice(&value.to_le_bytes());
    raw
}

/// Builds an MSG-shaped compound file: property streams at the root plus
/// recipient storages.
#[derive(Debug, Clone, Default)]
pub struct MsgBuilder {
    pub cfb: CfbBuilder,
    fixed: Vec<[u8; 16]>,
    recipients: usize,
}

impl MsgBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cfb(cfb: CfbBuilder) -> Self {
        Self {
            cfb,
            ..Self::default()
        }
    }

    pub fn unicode(mut self, tag: u16, value: &str) -> Self {
        self.cfb.stream(ROOT, &substg(tag, PT_UNICODE), utf16(value));
        self
    }

    pub fn ansi(mut self, tag: u16, value: &[u8]) -> Self {
        self.cfb.stream(ROOT, &substg(tag, PT_STRING8), value.to_vec());
        self
    }

    pub fn binary(mut self, tag: u16, value: &[u8]) -> Self {
        self.cfb.stream(ROOT, &substg(tag, PT_BINARY), value.to_vec());
        self
    }

    pub fn raw_stream(mut self, name: &str, value: Vec<u8>) -> Self {
        self.cfb.stream(ROOT, name, value);
        self
    }

    pub fn fixed(mut self, tag: u16, kind: u16, value: u64) -> Self {
        self.fixed.push(fixed_entry(tag, kind, value));
        self
    }

    /// Add a recipient storage. `kind` goes into the storage's fixed
    /// property table as `PR_RECIPIENT_TYPE`.
    pub fn recipient(mut self, name: &str, email: &str, kind: i32) -> Self {
        let storage = self
            .cfb
            .storage(ROOT, &format!("__recip_version1.0_#{:08X}", self.recipients));
        self.recipients += 1;
        self.cfb.stream(storage, &substg(0x3001, PT_UNICODE), utf16(name));
        self.cfb.stream(storage, &substg(0x3003, PT_UNICODE), utf16(email));
        let mut props = vec![0u8; 8];
        props.extend_from_slice(&fixed_entry(0x0C15, PT_INT32, kind as u32 as u64));
        self.cfb.stream(storage, "__properties_version1.0", props);
        self
    }

    pub fn build(mut self) -> Vec<u8> {
        if !self.fixed.is_empty() {
            let mut props = vec![0u8; 32];
            for entry in &self.fixed {
                props.extend_from_slice(entry);
            }
            self.cfb.stream(ROOT, "__properties_version1.0", props);
        }
        self.cfb.build()
    }
}
