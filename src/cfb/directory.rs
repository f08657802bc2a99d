//! Directory entries and the storage tree they form.
//!
//! Each storage's children are kept in a red-black tree threaded through
//! the entries' left/right sibling pointers; the storage itself only points
//! at one node of that tree. Entries are addressed by their position in the
//! directory stream and are never mutated after parsing.

use std::collections::HashMap;

use serde::Serialize;
use tracing::warn;

use crate::buffer::ByteWindow;
use crate::codec::text::{decode_text, TextEncoding};

use super::{DIR_ENTRY_SIZE, NOSTREAM};

const OFF_NAME_LEN: usize = 64;
const OFF_TYPE: usize = 66;
const OFF_LEFT: usize = 68;
const OFF_RIGHT: usize = 72;
const OFF_CHILD: usize = 76;
const OFF_START_SECTOR: usize = 116;
const OFF_SIZE: usize = 120;

/// Maximum name length in bytes (32 UTF-16 code units).
const MAX_NAME_BYTES: usize = 64;

/// Object type of a directory entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryType {
    Unallocated,
    Storage,
    Stream,
    Root,
    Unknown(u8),
}

impl From<u8> for EntryType {
    fn from(value: u8) -> Self {
        match value {
            0 => Self::Unallocated,
            1 => Self::Storage,
            2 => Self::Stream,
            5 => Self::Root,
            other => Self::Unknown(other),
        }
    }
}

impl EntryType {
    /// Whether entries of this type can have children.
    pub fn is_container(&self) -> bool {
        matches!(self, Self::Storage | Self::Root)
    }
}

/// One 128-byte directory entry.
#[derive(Debug, Clone, Serialize)]
pub struct DirectoryEntry {
    /// Position in the directory stream.
    pub id: u32,
    pub name: String,
    pub entry_type: EntryType,
    pub left: u32,
    pub right: u32,
    pub child: u32,
    pub start_sector: u32,
    /// Stream size in bytes.
    pub size: u64,
}

impl DirectoryEntry {
    /// Parse the entry at the start of `raw`.
    ///
    /// `wide_size` selects the full 64-bit size field (4096-byte sectors);
    /// otherwise only the low 32 bits are meaningful. Returns `None` when
    /// `raw` is shorter than one entry.
    pub fn parse(raw: &ByteWindow<'_>, id: u32, wide_size: bool) -> Option<Self> {
        if raw.len() < DIR_ENTRY_SIZE {
            return None;
        }
        let entry_type = EntryType::from(raw.read_u8(OFF_TYPE).ok()?);
        let name_len = raw.read_u16(OFF_NAME_LEN).ok()? as usize;
        let name = if entry_type == EntryType::Unallocated {
            String::new()
        } else {
            let name_bytes = raw.slice(0, name_len.min(MAX_NAME_BYTES)).ok()?;
            decode_text(name_bytes, TextEncoding::Utf16Le)
        };
        let size = if wide_size {
            raw.read_u64(OFF_SIZE).ok()?
        } else {
            u64::from(raw.read_u32(OFF_SIZE).ok()?)
        };

        Some(Self {
            id,
            name,
            entry_type,
            left: raw.read_u32(OFF_LEFT).ok()?,
            right: raw.read_u32(OFF_RIGHT).ok()?,
            child: raw.read_u32(OFF_CHILD).ok()?,
            start_sector: raw.read_u32(OFF_START_SECTOR).ok()?,
            size,
        })
    }

    pub fn is_stream(&self) -> bool {
        self.entry_type == EntryType::Stream
    }

    pub fn is_storage(&self) -> bool {
        self.entry_type == EntryType::Storage
    }
}

/// Parent/child index over a flat entry list.
#[derive(Debug, Clone, Default)]
pub struct DirectoryTree {
    children: HashMap<u32, Vec<u32>>,
    parents: HashMap<u32, u32>,
}

impl DirectoryTree {
    /// Index `entries` starting from `root`.
    ///
    /// Every entry is claimed by at most one parent, so malformed sibling
    /// pointers (cycles, shared subtrees, out-of-range ids) cannot cause
    /// infinite loops or duplicate children. Children are listed in
    /// directory scan order.
    pub fn build(entries: &[DirectoryEntry], root: u32) -> Self {
        let mut tree = Self::default();
        let mut claimed = vec![false; entries.len()];
        let mut pending = vec![root];
        if let Some(slot) = claimed.get_mut(root as usize) {
            *slot = true;
        }

        while let Some(parent) = pending.pop() {
            let Some(parent_entry) = entries.get(parent as usize) else {
                continue;
            };
            if !parent_entry.entry_type.is_container() {
                continue;
            }

            let mut kids = Vec::new();
            let mut stack = vec![parent_entry.child];
            while let Some(id) = stack.pop() {
                if id == NOSTREAM {
                    continue;
                }
                let Some(entry) = entries.get(id as usize) else {
                    warn!(id, parent, "Sibling pointer outside directory");
                    continue;
                };
                if claimed[id as usize] {
                    warn!(id, parent, "Directory entry reached twice, ignoring");
                    continue;
                }
                claimed[id as usize] = true;
                if entry.entry_type == EntryType::Unallocated {
                    continue;
                }
                kids.push(id);
                stack.push(entry.left);
                stack.push(entry.right);
            }

            kids.sort_unstable();
            for &kid in &kids {
                tree.parents.insert(kid, parent);
                if entries[kid as usize].entry_type.is_container() {
                    pending.push(kid);
                }
            }
            tree.children.insert(parent, kids);
        }

        tree
    }

    /// Children of `parent` in scan order.
    pub fn children(&self, parent: u32) -> &[u32] {
        self.children.get(&parent).map_or(&[], Vec::as_slice)
    }

    /// The storage that owns `id`.
    pub fn parent(&self, id: u32) -> Option<u32> {
        self.parents.get(&id).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: u32, name: &str, ty: EntryType, left: u32, right: u32, child: u32) -> DirectoryEntry {
        DirectoryEntry {
            id,
            name: name.to_string(),
            entry_type: ty,
            left,
            right,
            child,
            start_sector: 0,
            size: 0,
        }
    }

    fn raw_entry(name: &str, ty: u8, size: u32) -> Vec<u8> {
        let mut raw = vec![0u8; DIR_ENTRY_SIZE];
        let units: Vec<u8> = name.encode_utf16().flat_map(|u| u.to_le_bytes()).collect();
        raw[..units.len()].copy_from_slice(&units);
        let name_len = (units.len() + 2) as u16;
        raw[OFF_NAME_LEN..OFF_NAME_LEN + 2].copy_from_slice(&name_len.to_le_bytes());
        raw[OFF_TYPE] = ty;
        for off in [OFF_LEFT, OFF_RIGHT, OFF_CHILD] {
            raw[off..off + 4].copy_from_slice(&NOSTREAM.to_le_bytes());
        }
        raw[OFF_START_SECTOR..OFF_START_SECTOR + 4].copy_from_slice(&3u32.to_le_bytes());
        raw[OFF_SIZE..OFF_SIZE + 4].copy_from_slice(&size.to_le_bytes());
        raw
    }

    #[test]
    fn test_parse_entry_fields() {
        let raw = raw_entry("__substg1.0_0037001F", 2, 42);
        let parsed = DirectoryEntry::parse(&ByteWindow::new(&raw), 7, false).unwrap();
        assert_eq!(parsed.id, 7);
        assert_eq!(parsed.name, "__substg1.0_0037001F");
        assert_eq!(parsed.entry_type, EntryType::Stream);
        assert_eq!(parsed.left, NOSTREAM);
        assert_eq!(parsed.start_sector, 3);
        assert_eq!(parsed.size, 42);
    }

    #[test]
    fn test_parse_ignores_high_size_bits_for_small_sectors() {
        let mut raw = raw_entry("x", 2, 10);
        raw[OFF_SIZE + 4] = 0xFF;
        let narrow = DirectoryEntry::parse(&ByteWindow::new(&raw), 0, false).unwrap();
        assert_eq!(narrow.size, 10);
        let wide = DirectoryEntry::parse(&ByteWindow::new(&raw), 0, true).unwrap();
        assert!(wide.size > u64::from(u32::MAX));
    }

    #[test]
    fn test_overlong_name_length_is_clamped() {
        let mut raw = raw_entry("Root Entry", 5, 0);
        raw[OFF_NAME_LEN..OFF_NAME_LEN + 2].copy_from_slice(&500u16.to_le_bytes());
        let parsed = DirectoryEntry::parse(&ByteWindow::new(&raw), 0, false).unwrap();
        assert_eq!(parsed.name, "Root Entry");
    }

    #[test]
    fn test_tree_collects_sibling_tree_in_scan_order() {
        // root -> 2; 2 has left 1, right 3; 3 is a storage with child 4.
        let entries = vec![
            entry(0, "Root Entry", EntryType::Root, NOSTREAM, NOSTREAM, 2),
            entry(1, "a", EntryType::Stream, NOSTREAM, NOSTREAM, NOSTREAM),
            entry(2, "b", EntryType::Stream, 1, 3, NOSTREAM),
            entry(3, "c", EntryType::Storage, NOSTREAM, NOSTREAM, 4),
            entry(4, "d", EntryType::Stream, NOSTREAM, NOSTREAM, NOSTREAM),
        ];
        let tree = DirectoryTree::build(&entries, 0);
        assert_eq!(tree.children(0), &[1, 2, 3]);
        assert_eq!(tree.children(3), &[4]);
        assert_eq!(tree.parent(4), Some(3));
        assert!(tree.children(1).is_empty());
    }

    #[test]
    fn test_tree_survives_sibling_cycle() {
        let entries = vec![
            entry(0, "Root Entry", EntryType::Root, NOSTREAM, NOSTREAM, 1),
            entry(1, "a", EntryType::Stream, 2, NOSTREAM, NOSTREAM),
            entry(2, "b", EntryType::Stream, 1, 0, NOSTREAM),
        ];
        let tree = DirectoryTree::build(&entries, 0);
        assert_eq!(tree.children(0), &[1, 2]);
    }

    #[test]
    fn test_tree_handles_degenerate_chain() {
        // A fully right-leaning sibling "tree" of 200 nodes.
        let mut entries = vec![entry(0, "Root Entry", EntryType::Root, NOSTREAM, NOSTREAM, 1)];
        for id in 1..=200u32 {
            let right = if id == 200 { NOSTREAM } else { id + 1 };
            entries.push(entry(id, "s", EntryType::Stream, NOSTREAM, right, NOSTREAM));
        }
        let tree = DirectoryTree::build(&entries, 0);
        assert_eq!(tree.children(0).len(), 200);
    }

    #[test]
    fn test_tree_skips_out_of_range_pointers() {
        let entries = vec![
            entry(0, "Root Entry", EntryType::Root, NOSTREAM, NOSTREAM, 1),
            entry(1, "a", EntryType::Stream, 99, NOSTREAM, NOSTREAM),
        ];
        let tree = DirectoryTree::build(&entries, 0);
        assert_eq!(tree.children(0), &[1]);
    }
}
