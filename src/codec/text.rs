//! Permissive text decoding.
//!
//! Nothing in this module fails: undecodable sequences become U+FFFD.

use encoding_rs::Encoding;

/// A text encoding the reader knows how to decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextEncoding {
    /// UTF-16 little-endian, NUL-terminated.
    Utf16Le,
    Utf8,
    /// Windows-1252 (also used for ISO-8859-1 and US-ASCII labels).
    Windows1252,
    /// Any other charset `encoding_rs` supports.
    Other(&'static Encoding),
}

impl TextEncoding {
    /// Wrap an `encoding_rs` encoding, folding the well-known ones onto
    /// their dedicated variants.
    pub fn from_encoding(encoding: &'static Encoding) -> Self {
        if encoding == encoding_rs::UTF_8 {
            Self::Utf8
        } else if encoding == encoding_rs::WINDOWS_1252 {
            Self::Windows1252
        } else if encoding == encoding_rs::UTF_16LE {
            Self::Utf16Le
        } else {
            Self::Other(encoding)
        }
    }

    /// Human-readable label.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Utf16Le => "UTF-16LE",
            Self::Utf8 => "UTF-8",
            Self::Windows1252 => "windows-1252",
            Self::Other(enc) => enc.name(),
        }
    }
}

/// Decode `bytes` with `encoding`.
///
/// UTF-16LE stops at the first NUL code unit and ignores a dangling odd
/// byte. The 8-bit encodings decode the whole input.
pub fn decode_text(bytes: &[u8], encoding: TextEncoding) -> String {
    match encoding {
        TextEncoding::Utf16Le => decode_utf16le(bytes),
        TextEncoding::Utf8 => decode_with(encoding_rs::UTF_8, bytes),
        TextEncoding::Windows1252 => decode_with(encoding_rs::WINDOWS_1252, bytes),
        TextEncoding::Other(enc) => decode_with(enc, bytes),
    }
}

/// Decode a NUL-terminated string stored in a fixed-size buffer.
///
/// Everything from the first NUL onwards is discarded, whatever the
/// encoding.
pub fn decode_nul_terminated(bytes: &[u8], encoding: TextEncoding) -> String {
    if encoding == TextEncoding::Utf16Le {
        return decode_utf16le(bytes);
    }
    let end = memchr::memchr(0, bytes).unwrap_or(bytes.len());
    decode_text(&bytes[..end], encoding)
}

fn decode_with(encoding: &'static Encoding, bytes: &[u8]) -> String {
    let (decoded, _had_errors) = encoding.decode_without_bom_handling(bytes);
    decoded.into_owned()
}

fn decode_utf16le(bytes: &[u8]) -> String {
    let units = bytes
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
        .take_while(|&unit| unit != 0);
    char::decode_utf16(units)
        .map(|r| r.unwrap_or(char::REPLACEMENT_CHARACTER))
        .collect()
}

/// Fraction of characters that are printable ASCII or common whitespace.
///
/// Returns 0.0 for an empty string.
pub fn printability_score(text: &str) -> f64 {
    let mut total = 0usize;
    let mut printable = 0usize;
    for ch in text.chars() {
        total += 1;
        if matches!(ch, ' '..='~' | '\t' | '\n' | '\r') {
            printable += 1;
        }
    }
    if total == 0 {
        0.0
    } else {
        printable as f64 / total as f64
    }
}

/// Decode bytes whose encoding was never declared.
///
/// Tries UTF-8 (only when the bytes are valid UTF-8), the `fallback`
/// 8-bit encoding and UTF-16LE, and keeps the candidate with the best
/// printability score. Ties go to the earlier candidate. Trailing NULs are
/// dropped from the 8-bit candidates; embedded ones count against them.
pub fn decode_best_effort(bytes: &[u8], fallback: TextEncoding) -> String {
    let trimmed = trim_trailing_nuls(bytes);
    let mut candidates: Vec<String> = Vec::with_capacity(3);
    if let Ok(utf8) = std::str::from_utf8(trimmed) {
        candidates.push(utf8.to_string());
    }
    if fallback != TextEncoding::Utf16Le {
        candidates.push(decode_text(trimmed, fallback));
    }
    if bytes.len() >= 2 {
        candidates.push(decode_utf16le(bytes));
    }

    let mut best: Option<(f64, String)> = None;
    for candidate in candidates {
        let score = printability_score(&candidate);
        match &best {
            Some((best_score, _)) if *best_score >= score => {}
            _ => best = Some((score, candidate)),
        }
    }
    let text = best.map(|(_, text)| text).unwrap_or_default();
    text.replace('\0', "")
}

fn trim_trailing_nuls(bytes: &[u8]) -> &[u8] {
    let end = bytes.iter().rposition(|&b| b != 0).map_or(0, |p| p + 1);
    &bytes[..end]
}

/// Map a Windows codepage identifier to an encoding.
///
/// Returns `None` for codepages `encoding_rs` cannot decode.
pub fn encoding_for_codepage(codepage: u32) -> Option<TextEncoding> {
    let encoding = match codepage {
        1200 => return Some(TextEncoding::Utf16Le),
        65001 => return Some(TextEncoding::Utf8),
        1252 | 20127 | 28591 => return Some(TextEncoding::Windows1252),
        866 => encoding_rs::IBM866,
        874 => encoding_rs::WINDOWS_874,
        932 => encoding_rs::SHIFT_JIS,
        936 => encoding_rs::GBK,
        949 => encoding_rs::EUC_KR,
        950 => encoding_rs::BIG5,
        1250 => encoding_rs::WINDOWS_1250,
        1251 => encoding_rs::WINDOWS_1251,
        1253 => encoding_rs::WINDOWS_1253,
        1254 => encoding_rs::WINDOWS_1254,
        1255 => encoding_rs::WINDOWS_1255,
        1256 => encoding_rs::WINDOWS_1256,
        1257 => encoding_rs::WINDOWS_1257,
        1258 => encoding_rs::WINDOWS_1258,
        10000 => encoding_rs::MACINTOSH,
        20866 => encoding_rs::KOI8_R,
        21866 => encoding_rs::KOI8_U,
        28592 => encoding_rs::ISO_8859_2,
        28595 => encoding_rs::ISO_8859_5,
        28597 => encoding_rs::ISO_8859_7,
        28598 => encoding_rs::ISO_8859_8,
        28605 => encoding_rs::ISO_8859_15,
        50220 | 50221 | 50222 => encoding_rs::ISO_2022_JP,
        51932 => encoding_rs::EUC_JP,
        54936 => encoding_rs::GB18030,
        _ => return None,
    };
    Some(TextEncoding::from_encoding(encoding))
}
