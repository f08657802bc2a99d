//! Charset resolution from MIME header values.

use tracing::warn;

use super::text::TextEncoding;

/// Resolve a MIME charset label.
///
/// `None`, blank, and unrecognized labels resolve to UTF-8. `us-ascii` is
/// also treated as UTF-8: it is a strict subset, and mislabeled UTF-8 is far
/// more common in the wild than genuine 8-bit ASCII.
pub fn encoding_for_charset(label: Option<&str>) -> TextEncoding {
    let Some(label) = label.map(str::trim).filter(|l| !l.is_empty()) else {
        return TextEncoding::Utf8;
    };
    match label.to_ascii_lowercase().as_str() {
        "utf-8" | "utf8" | "us-ascii" | "ascii" => TextEncoding::Utf8,
        "iso-8859-1" | "latin1" | "latin-1" | "windows-1252" | "cp1252" => {
            TextEncoding::Windows1252
        }
        _ => match encoding_rs::Encoding::for_label(label.as_bytes()) {
            Some(encoding) => TextEncoding::from_encoding(encoding),
            None => {
                warn!(charset = label, "Unknown charset, falling back to UTF-8");
                TextEncoding::Utf8
            }
        },
    }
}

/// Extract a parameter from a structured header value such as
/// `text/plain; charset="iso-8859-1"; format=flowed`.
///
/// Parameter names match case-insensitively; surrounding quotes are removed.
pub fn header_param(value: &str, name: &str) -> Option<String> {
    split_params(value).skip(1).find_map(|param| {
        let (key, val) = param.split_once('=')?;
        if !key.trim().eq_ignore_ascii_case(name) {
            return None;
        }
        let val = val.trim();
        let val = val
            .strip_prefix('"')
            .and_then(|v| v.strip_suffix('"'))
            .unwrap_or(val);
        Some(val.to_string())
    })
}

/// The `charset` parameter of a `Content-Type` value.
pub fn charset_from_content_type(value: &str) -> Option<String> {
    header_param(value, "charset").filter(|c| !c.is_empty())
}

/// The lowercase `type/subtype` of a `Content-Type` value.
pub fn mime_type(value: &str) -> String {
    split_params(value)
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase()
}

/// Split on `;` outside double quotes.
fn split_params(value: &str) -> impl Iterator<Item = &str> {
    let mut parts = Vec::new();
    let mut in_quotes = false;
    let mut start = 0;
    for (i, ch) in value.char_indices() {
        match ch {
            '"' => in_quotes = !in_quotes,
            ';' if !in_quotes => {
                parts.push(&value[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&value[start..]);
    parts.into_iter()
}
