//! Compressed RTF (`PR_RTF_COMPRESSED`, MS-OXRTFCP).
//!
//! ```text
//! header: compressed size u32 | raw size u32 | "LZFu" or "MELA" | crc u32
//! ```
//!
//! `LZFu` content is a run of control bytes, each followed by eight tokens
//! (LSB first): a clear bit is a literal byte, a set bit a big-endian
//! reference of 12-bit dictionary offset and 4-bit length (minus 2). The
//! dictionary is a 4096-byte ring seeded with a fixed RTF prefix. A
//! reference to the current write position ends the data. `MELA` content
//! is stored uncompressed.

use tracing::debug;

const HEADER_SIZE: usize = 16;
const COMPRESSED: &[u8; 4] = b"LZFu";
const UNCOMPRESSED: &[u8; 4] = b"MELA";

const INIT_DICT: &[u8] = b"{\\rtf1\\ansi\\mac\\deff0\\deftab720{\\fonttbl;}\
{\\f0\\fnil \\froman \\fswiss \\fmodern \\fscript \\fdecor MS Sans SerifSymbolArial\
Times New RomanCourier{\\colortbl\\red0\\green0\\blue0\r\n\\par \\pard\\plain\\f0\\fs20\
\\b\\i\\u\\tab\\tx";
const DICT_SIZE: usize = 4096;

/// Upper bound on the output buffer reserved up front, whatever the header
/// claims.
const MAX_PREALLOC: usize = 1 << 20;

/// Whether `data` starts with a compressed RTF header.
pub fn is_compressed_rtf(data: &[u8]) -> bool {
    data.len() >= HEADER_SIZE && (&data[8..12] == COMPRESSED || &data[8..12] == UNCOMPRESSED)
}

/// Decompress a `PR_RTF_COMPRESSED` value.
///
/// Returns `None` for a short buffer or an unknown signature. Truncated
/// `LZFu` data yields what was decoded before the input ran out. The CRC is
/// not verified.
pub fn decompress(data: &[u8]) -> Option<Vec<u8>> {
    if !is_compressed_rtf(data) {
        debug!(len = data.len(), "Not a compressed RTF stream");
        return None;
    }
    let compressed_size = u32::from_le_bytes([data[0], data[1], data[2], data[3]]) as usize;
    let raw_size = u32::from_le_bytes([data[4], data[5], data[6], data[7]]) as usize;
    // The compressed size counts everything after its own field.
    let end = compressed_size.saturating_add(4).clamp(HEADER_SIZE, data.len());
    let payload = &data[HEADER_SIZE..end];

    if &data[8..12] == UNCOMPRESSED {
        return Some(payload[..raw_size.min(payload.len())].to_vec());
    }
    let mut output = decompress_lzfu(payload, raw_size);
    if output.len() > raw_size {
        debug!(decoded = output.len(), raw_size, "Dropping bytes past the declared size");
        output.truncate(raw_size);
    }
    Some(output)
}

fn decompress_lzfu(payload: &[u8], raw_size: usize) -> Vec<u8> {
    let mut dict = [b' '; DICT_SIZE];
    dict[..INIT_DICT.len()].copy_from_slice(INIT_DICT);
    let mut write = INIT_DICT.len();
    let mut output = Vec::with_capacity(raw_size.min(MAX_PREALLOC));
    let mut input = payload.iter().copied();

    while let Some(control) = input.next() {
        for bit in 0..8 {
            if control & (1 << bit) == 0 {
                let Some(byte) = input.next() else {
                    return output;
                };
                output.push(byte);
                dict[write] = byte;
                write = (write + 1) % DICT_SIZE;
                continue;
            }

            let (Some(hi), Some(lo)) = (input.next(), input.next()) else {
                return output;
            };
            let token = u16::from_be_bytes([hi, lo]);
            let offset = usize::from(token >> 4);
            let length = usize::from(token & 0x0F) + 2;
            if offset == write {
                return output;
            }
            for step in 0..length {
                let byte = dict[(offset + step) % DICT_SIZE];
                output.push(byte);
                dict[write] = byte;
                write = (write + 1) % DICT_SIZE;
            }
        }
    }
    output
}
