//! RFC 5322 header parsing: folding, encoded-words (RFC 2047), and date parsing.

use base64::Engine;
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use tracing::{debug, warn};

use crate::codec::charset::encoding_for_charset;
use crate::codec::quoted_printable;
use crate::codec::text::decode_text;
use crate::codec::transfer::LENIENT_BASE64;

/// Unfolded header fields in source order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    fields: Vec<(String, String)>,
}

impl Headers {
    /// Unfold and split a header block.
    ///
    /// Continuation lines (leading space or tab) are joined to the previous
    /// field with a single space. Lines that are neither a field nor a
    /// continuation are skipped.
    pub fn parse(text: &str) -> Self {
        let mut fields: Vec<(String, String)> = Vec::new();

        for line in text.lines() {
            if line.starts_with(' ') || line.starts_with('\t') {
                if let Some(last) = fields.last_mut() {
                    let piece = line.trim();
                    if !piece.is_empty() {
                        last.1.push(' ');
                        last.1.push_str(piece);
                    }
                }
                continue;
            }
            match split_field(line) {
                Some((name, value)) => {
                    fields.push((name.to_ascii_lowercase(), value.trim().to_string()))
                }
                None if line.trim().is_empty() => {}
                None => debug!(line, "Skipping malformed header line"),
            }
        }

        Self { fields }
    }

    /// First value of a header (case-insensitive).
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// Split `Name: value`. The name must be non-empty printable ASCII without
/// spaces (RFC 5322 `ftext`).
fn split_field(line: &str) -> Option<(&str, &str)> {
    let (name, value) = line.split_once(':')?;
    let valid = !name.is_empty() && name.bytes().all(|b| (33..=126).contains(&b));
    valid.then_some((name, value))
}

/// Whether `line` looks like a header field.
pub fn is_header_line(line: &str) -> bool {
    split_field(line).is_some()
}

/// Decode RFC 2047 encoded-words in a header value.
///
/// Example: `"=?UTF-8?B?SG9sYQ==?= =?UTF-8?B?IG11bmRv?="` → `"Hola mundo"`
///
/// Whitespace between adjacent encoded-words is dropped. Malformed words
/// are kept verbatim.
pub fn decode_encoded_words(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    let mut remaining = input;
    let mut last_was_encoded = false;

    while let Some(start) = remaining.find("=?") {
        let before = &remaining[..start];
        if !last_was_encoded || !before.trim().is_empty() {
            result.push_str(before);
        }

        let after_start = &remaining[start + 2..];
        match decode_one_word(after_start) {
            Some((text, consumed)) => {
                result.push_str(&text);
                remaining = &after_start[consumed..];
                last_was_encoded = true;
            }
            None => {
                result.push_str("=?");
                remaining = after_start;
                last_was_encoded = false;
            }
        }
    }

    result.push_str(remaining);
    result
}

/// Decode `charset?encoding?text?=` (the part after `=?`). Returns the text
/// and the number of bytes consumed.
fn decode_one_word(s: &str) -> Option<(String, usize)> {
    let (charset, rest) = s.split_once('?')?;
    let (encoding, rest) = rest.split_once('?')?;
    let end = rest.find("?=")?;
    let encoded = &rest[..end];
    if charset.is_empty() || charset.contains(char::is_whitespace) {
        return None;
    }

    let bytes = match encoding {
        "B" | "b" => LENIENT_BASE64.decode(encoded.trim()).ok()?,
        "Q" | "q" => quoted_printable::decode_bytes(encoded.replace('_', " ").as_bytes()),
        _ => return None,
    };

    let consumed = charset.len() + 1 + encoding.len() + 1 + end + 2;
    // RFC 2231 language suffix: "utf-8*en"
    let charset = charset.split('*').next().unwrap_or(charset);
    let text = decode_text(&bytes, encoding_for_charset(Some(charset)));
    Some((text, consumed))
}

const DATE_FORMATS: &[&str] = &[
    "%d %b %Y %H:%M:%S %z",
    "%d %b %Y %H:%M %z",
    "%d %b %Y %H:%M:%S",
    "%b %d %H:%M:%S %Y",
    "%Y-%m-%dT%H:%M:%S%z",
    "%Y-%m-%d %H:%M:%S %z",
    "%Y-%m-%d %H:%M:%S",
    "%d/%m/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M:%S",
];

const NAMED_ZONES: &[(&str, &str)] = &[
    ("EST", "-0500"),
    ("EDT", "-0400"),
    ("CST", "-0600"),
    ("CDT", "-0500"),
    ("MST", "-0700"),
    ("MDT", "-0600"),
    ("PST", "-0800"),
    ("PDT", "-0700"),
    ("GMT", "+0000"),
    ("UTC", "+0000"),
    ("UT", "+0000"),
    ("CET", "+0100"),
    ("CEST", "+0200"),
    ("JST", "+0900"),
];

/// Parse a `Date:` header value.
///
/// Accepts RFC 2822, RFC 3339 and the usual broken variants (missing
/// weekday, named zones, trailing `(comment)`, IMAP-style dashes).
pub fn parse_date(date_str: &str) -> Option<DateTime<Utc>> {
    let trimmed = date_str.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(trimmed) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt.with_timezone(&Utc));
    }

    let cleaned = strip_zone_comment(strip_day_of_week(trimmed));
    let candidates = [
        cleaned.to_string(),
        normalize_dashed_date(cleaned),
        replace_named_zone(cleaned),
        replace_named_zone(&normalize_dashed_date(cleaned)),
    ];
    for candidate in &candidates {
        if let Some(dt) = parse_with_formats(candidate) {
            return Some(dt);
        }
    }

    if let Some(dt) = mail_parser_date(trimmed) {
        return Some(dt);
    }

    warn!(date = trimmed, "Could not parse date");
    None
}

fn parse_with_formats(candidate: &str) -> Option<DateTime<Utc>> {
    DATE_FORMATS.iter().find_map(|fmt| {
        DateTime::parse_from_str(candidate, fmt)
            .map(|dt| dt.with_timezone(&Utc))
            .ok()
            .or_else(|| {
                NaiveDateTime::parse_from_str(candidate, fmt)
                    .ok()
                    .map(|ndt| Utc.from_utc_datetime(&ndt))
            })
    })
}

/// Last resort: let `mail-parser` have a go.
fn mail_parser_date(input: &str) -> Option<DateTime<Utc>> {
    let wrapped = format!("Date: {input}\n\n");
    let parsed = mail_parser::MessageParser::default().parse(wrapped.as_bytes())?;
    let rfc3339 = parsed.date()?.to_rfc3339();
    DateTime::parse_from_rfc3339(&rfc3339)
        .ok()
        .map(|d| d.with_timezone(&Utc))
}

/// `"Thu, 04 Jan 2024 ..."` → `"04 Jan 2024 ..."`.
fn strip_day_of_week(s: &str) -> &str {
    const DAYS: [&str; 7] = ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"];
    for day in DAYS {
        if let Some(rest) = s.strip_prefix(day) {
            let rest = rest.trim_start_matches(|c: char| c.is_ascii_alphabetic());
            return rest.trim_start_matches(',').trim_start();
        }
    }
    s
}

/// `"... +0000 (UTC)"` → `"... +0000"`.
fn strip_zone_comment(s: &str) -> &str {
    match s.rfind('(') {
        Some(open) if s.ends_with(')') => s[..open].trim_end(),
        _ => s,
    }
}

/// `"16-JUL-2025 03:01:03"` → `"16 Jul 2025 03:01:03"`.
fn normalize_dashed_date(s: &str) -> String {
    const MONTHS: [&str; 12] = [
        "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
    ];
    let mut parts = s.splitn(3, '-');
    let (Some(day), Some(month), Some(rest)) = (parts.next(), parts.next(), parts.next()) else {
        return s.to_string();
    };
    if !day.bytes().all(|b| b.is_ascii_digit()) {
        return s.to_string();
    }
    match MONTHS.iter().find(|m| m.eq_ignore_ascii_case(month)) {
        Some(month) => format!("{day} {month} {rest}"),
        None => s.to_string(),
    }
}

/// Replace a trailing zone abbreviation with its numeric offset.
fn replace_named_zone(s: &str) -> String {
    let Some((head, zone)) = s.rsplit_once(' ') else {
        return s.to_string();
    };
    match NAMED_ZONES.iter().find(|(name, _)| name.eq_ignore_ascii_case(zone)) {
        Some((_, offset)) => format!("{head} {offset}"),
        None => s.to_string(),
    }
}
