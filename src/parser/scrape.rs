//! Last-resort field recovery for compound files whose structure cannot be
//! read.
//!
//! Stream names are stored as UTF-16LE in directory entries. When a
//! property's name is found, the longest printable UTF-16 run in the bytes
//! that follow is taken as its value. This often recovers short strings
//! such as the subject; it is a heuristic and may return neighbouring text.

use tracing::debug;

use crate::buffer::ByteWindow;
use crate::mapi::property::SUBSTG_PREFIX;
use crate::mapi::tag;
use crate::model::message::{MessageSource, ParsedMessage, Recipient, RecipientType};

/// Bytes skipped after a marker: the rest of the 64-byte name field.
const NAME_FIELD: usize = 64;
/// How far past the marker to look.
const SEARCH_SPAN: usize = 2048;
/// A run at least this long ends the search early.
const GOOD_ENOUGH: usize = 6;

/// Scrape what fields can be found. Returns `None` if nothing was found.
pub fn scrape(window: &ByteWindow<'_>) -> Option<ParsedMessage> {
    let data = window.as_slice();
    let field = |tag: u16| harvest(data, tag);

    let mut message = ParsedMessage::empty(MessageSource::Scrape);
    message.subject = field(tag::SUBJECT);
    message.body = field(tag::BODY);

    let to = field(tag::DISPLAY_TO).or_else(|| field(tag::DISPLAY_NAME));
    let cc = field(tag::DISPLAY_CC);
    message.recipients = [(to, RecipientType::To), (cc, RecipientType::Cc)]
        .into_iter()
        .filter_map(|(list, kind)| list.map(|l| (l, kind)))
        .flat_map(|(list, kind)| names_to_recipients(&list, kind))
        .collect();

    let sender_name = field(tag::SENDER_NAME);
    let sender_email = field(tag::SENDER_EMAIL_ADDRESS);
    if sender_name.is_some() || sender_email.is_some() {
        message.sender = Some(Recipient {
            name: sender_name,
            email: sender_email,
            recipient_type: RecipientType::To,
        });
    }

    if message.is_empty() {
        debug!("No fields recovered by scraping");
        return None;
    }
    Some(message)
}

fn names_to_recipients(list: &str, kind: RecipientType) -> Vec<Recipient> {
    list.split(';')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(|name| Recipient {
            name: Some(name.to_string()),
            email: None,
            recipient_type: kind,
        })
        .collect()
}

/// UTF-16LE bytes of `__substg1.0_TTTT`.
fn marker(tag: u16) -> Vec<u8> {
    format!("{SUBSTG_PREFIX}{tag:04X}")
        .encode_utf16()
        .flat_map(u16::to_le_bytes)
        .collect()
}

fn harvest(data: &[u8], tag: u16) -> Option<String> {
    let needle = marker(tag);
    let index = memchr::memmem::find(data, &needle)?;
    let start = index + NAME_FIELD;
    let end = start.saturating_add(SEARCH_SPAN).min(data.len());
    let best = longest_run(data.get(start..end)?);
    let best = best.trim();
    if best.is_empty() {
        None
    } else {
        debug!(tag, len = best.len(), "Scraped field");
        Some(best.to_string())
    }
}

/// Longest run of printable UTF-16LE characters in `region`, skipping runs
/// that are themselves stream names.
fn longest_run(region: &[u8]) -> String {
    let mut best = String::new();
    let mut current = String::new();

    for pair in region.chunks_exact(2) {
        let unit = u16::from_le_bytes([pair[0], pair[1]]);
        match char::from_u32(u32::from(unit)) {
            Some(ch) if unit >= 0x20 && unit != 0x7F => current.push(ch),
            _ => {
                let terminated = unit == 0;
                flush(&mut current, &mut best);
                if terminated && best.chars().count() >= GOOD_ENOUGH {
                    break;
                }
            }
        }
    }
    flush(&mut current, &mut best);
    best
}

fn flush(current: &mut String, best: &mut String) {
    if current.chars().count() > best.chars().count() && !is_structural_name(current) {
        *best = std::mem::take(current);
    }
    current.clear();
}

fn is_structural_name(run: &str) -> bool {
    run.starts_with("__") || run == "Root Entry"
}
