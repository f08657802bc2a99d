//! Quoted-Printable decoder for Content-Transfer-Encoding (RFC 2045 §6.7).

use super::charset::encoding_for_charset;
use super::text::decode_text;

const HEX_DECODE: [i8; 256] = {
    let mut t = [-1i8; 256];
    let mut i = 0u8;
    while i < 10 {
        t[(b'0' + i) as usize] = i as i8;
        i += 1;
    }
    let mut i = 0u8;
    while i < 6 {
        t[(b'A' + i) as usize] = (10 + i) as i8;
        t[(b'a' + i) as usize] = (10 + i) as i8;
        i += 1;
    }
    t
};

/// Decode quoted-printable bytes.
///
/// `=XY` becomes the byte `0xXY`; soft line breaks (`=\r\n`, `=\n`) are
/// removed. A lone `=` that starts neither is kept literally.
pub fn decode_bytes(src: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(src.len());
    let mut i = 0;
    while i < src.len() {
        let b = src[i];
        if b != b'=' {
            out.push(b);
            i += 1;
            continue;
        }
        match (src.get(i + 1).copied(), src.get(i + 2).copied()) {
            (Some(b'\r'), Some(b'\n')) => i += 3,
            (Some(b'\n'), _) => i += 2,
            (Some(h1), Some(h2)) if HEX_DECODE[h1 as usize] >= 0 && HEX_DECODE[h2 as usize] >= 0 => {
                out.push(((HEX_DECODE[h1 as usize] << 4) | HEX_DECODE[h2 as usize]) as u8);
                i += 3;
            }
            _ => {
                out.push(b);
                i += 1;
            }
        }
    }
    out
}

/// Decode quoted-printable text and interpret the bytes in `charset`.
///
/// A missing or unknown charset decodes as UTF-8.
pub fn decode_quoted_printable(text: &str, charset: Option<&str>) -> String {
    let bytes = decode_bytes(text.as_bytes());
    decode_text(&bytes, encoding_for_charset(charset))
}
