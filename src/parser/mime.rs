//! RFC 5322 / MIME text parsing.
//!
//! Two entry points:
//! - [`parse_message`] treats the whole window as one message: headers up to
//!   the first blank line, then a single opaque body.
//! - [`scan_embedded`] looks for header fields anywhere in a binary buffer,
//!   for compound files that carry a MIME copy of the message.

use tracing::debug;

use crate::buffer::ByteWindow;
use crate::codec::charset::{charset_from_content_type, encoding_for_charset, mime_type};
use crate::codec::text::{decode_text, TextEncoding};
use crate::codec::transfer::{decode_body, TransferEncoding};
use crate::model::address::Mailbox;
use crate::model::message::{non_empty, MessageSource, ParsedMessage, Recipient, RecipientType};

use super::header::{decode_encoded_words, is_header_line, parse_date, Headers};

const ADDRESS_HEADERS: [(&str, RecipientType); 3] = [
    ("to", RecipientType::To),
    ("cc", RecipientType::Cc),
    ("bcc", RecipientType::Bcc),
];

/// Parse the window as a single RFC 5322 message.
///
/// Never fails. Without a blank line, or when the text before it does not
/// start with a header field, the whole text becomes the body.
pub fn parse_message(window: &ByteWindow<'_>) -> ParsedMessage {
    let data = skip_from_line(window.as_slice());
    let mut message = ParsedMessage::empty(MessageSource::Mime);

    let split = find_blank_line(data).filter(|&(header_end, _)| {
        let first_line = data[..header_end].split(|&b| b == b'\n').next().unwrap_or(&[]);
        is_header_line(&decode_header_bytes(first_line))
    });
    let Some((header_end, body_start)) = split else {
        debug!(len = data.len(), "No header block, treating text as body");
        message.body = clean_body(decode_text(data, TextEncoding::Utf8));
        return message;
    };

    let headers = Headers::parse(&decode_header_bytes(&data[..header_end]));
    debug!(fields = headers.len(), "Parsed message headers");
    apply_headers(&mut message, &headers);

    let content_type = headers.get("content-type").unwrap_or("text/plain");
    let charset = charset_from_content_type(content_type);
    let transfer = headers
        .get("content-transfer-encoding")
        .map(TransferEncoding::parse)
        .unwrap_or_default();
    let body = decode_body_bytes(&data[body_start..], transfer, charset.as_deref());

    message.body = clean_body(body);
    if mime_type(content_type) == "text/html" {
        message.body_html = message.body.clone();
    }
    message
}

/// Scan a binary buffer for embedded header fields.
///
/// Returns `None` unless a `Subject:`, `To:`, `Cc:` or `From:` field is
/// found. The body is the first `text/plain` part, or else the text after
/// the first blank line that follows a found field.
pub fn scan_embedded(window: &ByteWindow<'_>) -> Option<ParsedMessage> {
    let text = decode_text(window.as_slice(), TextEncoding::Utf8);
    let lower = text.to_ascii_lowercase();

    let subject = find_field(&text, &lower, "subject");
    let from = find_field(&text, &lower, "from");
    let addresses: Vec<_> = ADDRESS_HEADERS
        .iter()
        .filter(|(name, _)| *name != "bcc")
        .filter_map(|&(name, kind)| find_field(&text, &lower, name).map(|f| (f, kind)))
        .collect();
    if subject.is_none() && from.is_none() && addresses.is_empty() {
        return None;
    }

    let mut message = ParsedMessage::empty(MessageSource::Mime);
    message.subject = subject
        .as_ref()
        .and_then(|f| non_empty(decode_encoded_words(&f.value)));
    message.sender = from
        .as_ref()
        .and_then(|f| parse_mailboxes(&f.value, RecipientType::To).into_iter().next());
    message.recipients = addresses
        .iter()
        .flat_map(|(f, kind)| parse_mailboxes(&f.value, *kind))
        .collect();

    let first_field = [subject.as_ref(), from.as_ref()]
        .into_iter()
        .flatten()
        .chain(addresses.iter().map(|(f, _)| f))
        .map(|f| f.start)
        .min()
        .unwrap_or(0);
    let part_start = lower.find("content-type: text/plain").unwrap_or(first_field);
    message.body = scan_part_body(&text[part_start..]);

    debug!(
        subject = message.subject.is_some(),
        recipients = message.recipients.len(),
        "Found embedded MIME headers"
    );
    Some(message)
}

fn apply_headers(message: &mut ParsedMessage, headers: &Headers) {
    message.subject = headers
        .get("subject")
        .and_then(|s| non_empty(decode_encoded_words(s)));
    message.sender = headers
        .get("from")
        .and_then(|v| parse_mailboxes(v, RecipientType::To).into_iter().next());
    message.date = headers.get("date").and_then(parse_date);
    message.recipients = ADDRESS_HEADERS
        .iter()
        .filter_map(|&(name, kind)| headers.get(name).map(|v| (v, kind)))
        .flat_map(|(value, kind)| parse_mailboxes(value, kind))
        .collect();
}

/// Split an address header and decode encoded-words in display names.
///
/// Names are decoded after splitting so an encoded comma cannot split an
/// address.
fn parse_mailboxes(value: &str, kind: RecipientType) -> Vec<Recipient> {
    Mailbox::parse_list(value)
        .into_iter()
        .map(|mut mailbox| {
            mailbox.name = mailbox
                .name
                .and_then(|n| non_empty(decode_encoded_words(&n)));
            mailbox.into_recipient(kind)
        })
        .collect()
}

fn decode_body_bytes(raw: &[u8], transfer: TransferEncoding, charset: Option<&str>) -> String {
    match transfer {
        TransferEncoding::QuotedPrintable | TransferEncoding::Base64 => {
            decode_body(&decode_text(raw, TextEncoding::Utf8), transfer, charset)
        }
        TransferEncoding::SevenBit | TransferEncoding::EightBit | TransferEncoding::Binary => {
            decode_text(raw, encoding_for_charset(charset))
        }
    }
}

/// Strip surrounding line breaks; `None` if nothing is left.
fn clean_body(body: String) -> Option<String> {
    let trimmed = body.trim_matches(|c| c == '\r' || c == '\n');
    if trimmed.trim().is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Header bytes as text: UTF-8, or Windows-1252 when that fails.
fn decode_header_bytes(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => decode_text(bytes, TextEncoding::Windows1252),
    }
}

/// Skip a UTF-8 BOM and an mbox `From ` separator line.
fn skip_from_line(data: &[u8]) -> &[u8] {
    let data = data.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(data);
    if data.starts_with(b"From ") {
        if let Some(pos) = memchr::memchr(b'\n', data) {
            return &data[pos + 1..];
        }
    }
    data
}

/// Locate the first blank line (`\n\n`, `\r\n\r\n` or a mix).
///
/// Returns the end of the header block and the start of the body.
fn find_blank_line(data: &[u8]) -> Option<(usize, usize)> {
    let mut line_start = 0;
    for newline in memchr::memchr_iter(b'\n', data) {
        let line = &data[line_start..newline];
        if line.is_empty() || line == b"\r" {
            return Some((line_start, newline + 1));
        }
        line_start = newline + 1;
    }
    None
}

#[derive(Debug)]
struct Field {
    start: usize,
    value: String,
}

/// Find `name:` at a word boundary and return its (unfolded) value.
fn find_field(text: &str, lower: &str, name: &str) -> Option<Field> {
    let needle = format!("{name}:");
    let mut from = 0;
    while let Some(pos) = lower[from..].find(&needle) {
        let start = from + pos;
        let boundary = lower[..start]
            .chars()
            .next_back()
            .map_or(true, |c| !c.is_alphanumeric() && c != '-');
        if boundary {
            let value = field_value(&text[start + needle.len()..]);
            if !value.is_empty() {
                return Some(Field { start, value });
            }
        }
        from = start + needle.len();
    }
    None
}

/// The value up to the end of the line, with folded continuation lines.
fn field_value(rest: &str) -> String {
    let rest = rest.split('\0').next().unwrap_or("");
    let mut lines = rest.split('\n');
    let mut value = lines.next().unwrap_or("").trim().to_string();
    for line in lines {
        if !(line.starts_with(' ') || line.starts_with('\t')) {
            break;
        }
        let piece = line.trim();
        if !piece.is_empty() {
            value.push(' ');
            value.push_str(piece);
        }
    }
    value
}

/// Body of the part starting at `part`: after its blank line, up to the
/// next boundary line or NUL.
fn scan_part_body(part: &str) -> Option<String> {
    let (header_end, body_start) = find_blank_line(part.as_bytes())?;
    let headers = Headers::parse(&part[..header_end]);
    let body = &part[body_start..];
    let body = body.split('\0').next().unwrap_or("");
    let end = body
        .match_indices("\n--")
        .map(|(i, _)| i)
        .next()
        .unwrap_or(body.len());
    let body = if body.starts_with("--") { "" } else { &body[..end] };

    let transfer = headers
        .get("content-transfer-encoding")
        .map(TransferEncoding::parse)
        .unwrap_or_default();
    let charset = headers.get("content-type").and_then(charset_from_content_type);
    clean_body(decode_body(body, transfer, charset.as_deref()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> ParsedMessage {
        parse_message(&ByteWindow::new(text.as_bytes()))
    }

    #[test]
    fn test_basic_message() {
        let msg = parse(
            "From: Alice <alice@example.com>\r\nTo: bob@example.com\r\nSubject: Hi\r\nDate: Thu, 04 Jan 2024 10:00:00 +0000\r\n\r\nHello Bob\r\n",
        );
        assert_eq!(msg.subject.as_deref(), Some("Hi"));
        assert_eq!(msg.body.as_deref(), Some("Hello Bob"));
        assert_eq!(msg.recipients.len(), 1);
        assert_eq!(msg.recipients[0].email.as_deref(), Some("bob@example.com"));
        let sender = msg.sender.unwrap();
        assert_eq!(sender.name.as_deref(), Some("Alice"));
        assert!(msg.date.is_some());
        assert_eq!(msg.source, MessageSource::Mime);
    }

    #[test]
    fn test_recipient_types_in_header_order() {
        let msg = parse("Subject: x\nBcc: c@x.com\nCc: b@x.com\nTo: a@x.com\n\nbody");
        let kinds: Vec<_> = msg.recipients.iter().map(|r| r.recipient_type).collect();
        assert_eq!(kinds, [RecipientType::To, RecipientType::Cc, RecipientType::Bcc]);
    }

    #[test]
    fn test_mixed_line_endings_boundary() {
        let msg = parse("Subject: mixed\r\n\nBody text");
        assert_eq!(msg.subject.as_deref(), Some("mixed"));
        assert_eq!(msg.body.as_deref(), Some("Body text"));
    }

    #[test]
    fn test_headerless_text() {
        let msg = parse("Hello World");
        assert_eq!(msg.subject, None);
        assert!(msg.recipients.is_empty());
        assert_eq!(msg.body.as_deref(), Some("Hello World"));

        let prose = parse("Dear team,\n\nPlease see: the attached.\n");
        assert_eq!(prose.subject, None);
        assert!(prose.body.unwrap().starts_with("Dear team,"));
    }

    #[test]
    fn test_quoted_printable_latin1_body() {
        let msg = parse(
            "Subject: qp\nContent-Type: text/plain; charset=\"iso-8859-1\"\nContent-Transfer-Encoding: quoted-printable\n\ncaf=E9 cr=\n=E8me\n",
        );
        assert_eq!(msg.body.as_deref(), Some("café crème"));
    }

    #[test]
    fn test_base64_body() {
        let msg = parse(
            "Subject: b64\nContent-Type: text/plain; charset=utf-8\nContent-Transfer-Encoding: base64\n\nSG9s\nYSBtdW5kbw==\n",
        );
        assert_eq!(msg.body.as_deref(), Some("Hola mundo"));
    }

    #[test]
    fn test_8bit_body_uses_declared_charset() {
        let mut raw = b"Subject: x\nContent-Type: text/plain; charset=windows-1252\n\n".to_vec();
        raw.extend_from_slice(b"\x93quoted\x94");
        let msg = parse_message(&ByteWindow::new(&raw));
        assert_eq!(msg.body.as_deref(), Some("\u{201C}quoted\u{201D}"));
    }

    #[test]
    fn test_html_body() {
        let msg = parse("Subject: h\nContent-Type: text/html; charset=utf-8\n\n<p>Hi</p>\n");
        assert_eq!(msg.body_html.as_deref(), Some("<p>Hi</p>"));
    }

    #[test]
    fn test_encoded_words() {
        let msg = parse(
            "Subject: =?UTF-8?B?SG9sYSBtdW5kbw==?=\nTo: =?ISO-8859-1?Q?Jos=E9?= <jose@example.com>\n\nx",
        );
        assert_eq!(msg.subject.as_deref(), Some("Hola mundo"));
        assert_eq!(msg.recipients[0].name.as_deref(), Some("José"));
    }

    #[test]
    fn test_mbox_from_line_and_bom() {
        let mut raw = vec![0xEF, 0xBB, 0xBF];
        raw.extend_from_slice(b"From someone Thu Jan 01 00:00:00 2024\nSubject: Test\n\nBody\n");
        let msg = parse_message(&ByteWindow::new(&raw));
        assert_eq!(msg.subject.as_deref(), Some("Test"));
        assert_eq!(msg.body.as_deref(), Some("Body"));
    }

    #[test]
    fn test_empty_body_is_none() {
        let msg = parse("Subject: nothing\n\n\r\n");
        assert_eq!(msg.body, None);
    }

    #[test]
    fn test_find_blank_line() {
        assert_eq!(find_blank_line(b"A: b\n\nbody"), Some((5, 6)));
        assert_eq!(find_blank_line(b"A: b\r\n\r\nbody"), Some((6, 8)));
        assert_eq!(find_blank_line(b"A: b\r\nC: d"), None);
    }

    #[test]
    fn test_scan_embedded_headers() {
        let mut raw = crate::cfb::SIGNATURE.to_vec();
        raw.extend_from_slice(&[0u8; 40]);
        raw.extend_from_slice(
            b"junk\r\nSubject: Embedded report\r\nTo: \"Doe, John\" <john@example.com>\r\nContent-Type: text/plain\r\n\r\nThe body.\r\n--boundary--\r\n\0\0\0",
        );
        let msg = scan_embedded(&ByteWindow::new(&raw)).unwrap();
        assert_eq!(msg.subject.as_deref(), Some("Embedded report"));
        assert_eq!(msg.recipients.len(), 1);
        assert_eq!(msg.recipients[0].name.as_deref(), Some("Doe, John"));
        assert_eq!(msg.body.as_deref(), Some("The body."));
    }

    #[test]
    fn test_scan_requires_word_boundary() {
        let raw = b"\xD0\xCF\x11\xE0\xA1\xB1\x1A\xE1 mysubject: nope\0 x-to: nope\0";
        assert!(scan_embedded(&ByteWindow::new(raw)).is_none());
    }
}
