//! Sector allocation tables (FAT and Mini-FAT) and bounded chain walking.

use super::{ENDOFCHAIN, FREESECT, MAX_REG_SECT};

/// How a chain walk ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainEnd {
    /// Reached `ENDOFCHAIN` (or another marker) normally.
    EndOfChain,
    /// A sector was visited twice.
    Cycle(u32),
    /// Pointed past the end of the table.
    OutOfRange(u32),
    /// Pointed at a free sector.
    FreeSector(u32),
    /// Gave up after the configured number of hops.
    StepLimit,
}

/// The sectors of one chain, in order, plus how the walk stopped.
#[derive(Debug, Clone)]
pub struct Chain {
    pub sectors: Vec<u32>,
    pub end: ChainEnd,
}

/// An allocation table: entry `i` holds the sector that follows sector `i`.
#[derive(Debug, Clone, Default)]
pub struct AllocationTable {
    entries: Vec<u32>,
}

impl AllocationTable {
    pub fn new(entries: Vec<u32>) -> Self {
        Self { entries }
    }

    /// Build a table from little-endian `u32` entries; a trailing partial
    /// entry is ignored.
    pub fn from_le_bytes(bytes: &[u8]) -> Self {
        let entries = bytes
            .chunks_exact(4)
            .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect();
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The entry for `sector`, if the table covers it.
    pub fn next(&self, sector: u32) -> Option<u32> {
        self.entries.get(sector as usize).copied()
    }

    /// Follow the chain starting at `start` for at most `max_steps` sectors.
    ///
    /// Never loops: revisiting a sector, leaving the table, or exhausting
    /// the step budget all stop the walk and return what was collected.
    pub fn walk(&self, start: u32, max_steps: usize) -> Chain {
        let mut sectors = Vec::new();
        let mut visited = vec![false; self.entries.len()];
        let mut current = start;

        loop {
            if current > MAX_REG_SECT {
                return Chain {
                    sectors,
                    end: ChainEnd::EndOfChain,
                };
            }
            let idx = current as usize;
            if idx >= self.entries.len() {
                return Chain {
                    sectors,
                    end: ChainEnd::OutOfRange(current),
                };
            }
            if visited[idx] {
                return Chain {
                    sectors,
                    end: ChainEnd::Cycle(current),
                };
            }
            if sectors.len() >= max_steps {
                return Chain {
                    sectors,
                    end: ChainEnd::StepLimit,
                };
            }
            visited[idx] = true;
            sectors.push(current);

            current = self.entries[idx];
            if current == FREESECT {
                return Chain {
                    sectors,
                    end: ChainEnd::FreeSector(idx as u32),
                };
            }
            if current == ENDOFCHAIN {
                return Chain {
                    sectors,
                    end: ChainEnd::EndOfChain,
                };
            }
        }
    }
}
