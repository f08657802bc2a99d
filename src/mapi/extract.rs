//! Builds a [`ParsedMessage`] from a compound file's property streams.

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::cfb::{CompoundFile, DirectoryEntry};
use crate::codec::text::{
    decode_best_effort, decode_nul_terminated, decode_text, encoding_for_codepage, TextEncoding,
};
use crate::model::message::{non_empty, MessageSource, ParsedMessage, Recipient, RecipientType};

use super::fixed::{filetime_to_datetime, FixedProperties, RECIPIENT_HEADER_SIZE, ROOT_HEADER_SIZE};
use super::property::{is_recipient_storage, PropertyId, PropertyStream, PROPERTIES_STREAM};
use super::rtf;
use super::tag::{self, PropertyType};

/// How 8-bit strings in one message are decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextPolicy {
    /// Encoding named by the message's codepage properties.
    pub declared: Option<TextEncoding>,
    /// Used, with detection, when nothing is declared.
    pub fallback: TextEncoding,
}

impl TextPolicy {
    /// Policy for a message with no codepage information.
    pub fn undeclared(default_codepage: u32) -> Self {
        Self {
            declared: None,
            fallback: fallback_encoding(default_codepage),
        }
    }

    fn decode_ansi(&self, bytes: &[u8]) -> String {
        match self.declared {
            Some(encoding) => decode_nul_terminated(bytes, encoding),
            None => decode_best_effort(bytes, self.fallback),
        }
    }

    fn decode_binary_text(&self, bytes: &[u8]) -> String {
        let end = bytes.iter().rposition(|&b| b != 0).map_or(0, |p| p + 1);
        let bytes = &bytes[..end];
        if std::str::from_utf8(bytes).is_ok() {
            return decode_text(bytes, TextEncoding::Utf8);
        }
        decode_text(bytes, self.declared.unwrap_or(self.fallback))
    }
}

fn fallback_encoding(codepage: u32) -> TextEncoding {
    match encoding_for_codepage(codepage) {
        Some(TextEncoding::Utf16Le) | None => {
            warn!(codepage, "Unusable default codepage, using windows-1252");
            TextEncoding::Windows1252
        }
        Some(encoding) => encoding,
    }
}

/// The properties of one storage: its `__substg1.0_` streams plus its
/// fixed-length property table.
pub struct PropertyStorage<'f, 'a> {
    file: &'f CompoundFile<'a>,
    storage: u32,
    fixed: FixedProperties,
}

impl<'f, 'a> PropertyStorage<'f, 'a> {
    /// Open the storage with directory id `storage`. `header_size` is the
    /// header length of its `__properties_version1.0` stream.
    pub fn new(file: &'f CompoundFile<'a>, storage: u32, header_size: usize) -> Self {
        let fixed = file
            .children(storage)
            .find(|e| e.is_stream() && e.name == PROPERTIES_STREAM)
            .map(|e| FixedProperties::parse(&file.read_stream(e), header_size))
            .unwrap_or_default();
        Self {
            file,
            storage,
            fixed,
        }
    }

    /// The directory entry holding `tag`. When the property is stored under
    /// several types, Unicode wins over 8-bit strings, which win over the
    /// rest; otherwise the first in scan order.
    fn find(&self, tag: u16) -> Option<(&'f DirectoryEntry, PropertyId)> {
        let rank = |kind: PropertyType| match kind {
            PropertyType::StringUnicode => 0,
            kind if kind.is_string() => 1,
            _ => 2,
        };
        self.file
            .children(self.storage)
            .filter(|e| e.is_stream())
            .filter_map(|e| PropertyId::from_stream_name(&e.name).map(|id| (e, id)))
            .filter(|(_, id)| id.tag == tag)
            .min_by_key(|(_, id)| rank(id.kind))
    }

    /// Materialize the stream holding `tag`.
    pub fn stream(&self, tag: u16) -> Option<PropertyStream> {
        let (entry, id) = self.find(tag)?;
        Some(PropertyStream {
            name: entry.name.clone(),
            id,
            data: self.file.read_stream(entry),
        })
    }

    /// A string property, decoded per its type code. Empty strings are
    /// `None`.
    pub fn string(&self, tag: u16, policy: &TextPolicy) -> Option<String> {
        let stream = self.stream(tag)?;
        let text = match stream.id.kind {
            PropertyType::StringUnicode => decode_text(&stream.data, TextEncoding::Utf16Le),
            PropertyType::StringAnsi => policy.decode_ansi(&stream.data),
            PropertyType::Binary => policy.decode_binary_text(&stream.data),
            other => {
                debug!(name = %stream.name, ?other, "Property is not text");
                return None;
            }
        };
        non_empty(text)
    }

    pub fn binary(&self, tag: u16) -> Option<Vec<u8>> {
        self.stream(tag).map(|s| s.data)
    }

    /// A 32-bit integer: a `__substg1.0_` stream if one exists, else the
    /// fixed-length table.
    pub fn int32(&self, tag: u16) -> Option<i32> {
        if let Some(stream) = self.stream(tag) {
            match stream.data.get(..4) {
                Some(b) => return Some(i32::from_le_bytes([b[0], b[1], b[2], b[3]])),
                None => debug!(name = %stream.name, len = stream.data.len(), "Integer stream too short"),
            }
        }
        self.fixed.get_i32(tag)
    }

    pub fn time(&self, tag: u16) -> Option<DateTime<Utc>> {
        if let Some(stream) = self.stream(tag) {
            if let Some(b) = stream.data.get(..8) {
                let mut raw = [0u8; 8];
                raw.copy_from_slice(b);
                return filetime_to_datetime(u64::from_le_bytes(raw));
            }
        }
        self.fixed.get_time(tag)
    }

    /// Resolve the message codepage: `PR_INTERNET_CPID`, then
    /// `PR_MESSAGE_CODEPAGE`.
    pub fn text_policy(&self, default_codepage: u32) -> TextPolicy {
        let declared = [tag::INTERNET_CPID, tag::MESSAGE_CODEPAGE]
            .into_iter()
            .filter_map(|t| self.int32(t))
            .find_map(|cp| {
                let encoding = u32::try_from(cp).ok().and_then(encoding_for_codepage);
                if encoding.is_none() {
                    warn!(codepage = cp, "Unsupported message codepage");
                }
                encoding
            });
        TextPolicy {
            declared,
            ..TextPolicy::undeclared(default_codepage)
        }
    }
}

/// Extract every supported field from an opened compound file.
///
/// Missing properties are left empty. A file without a root entry yields an
/// empty message.
pub fn extract_message(file: &CompoundFile<'_>, default_codepage: u32) -> ParsedMessage {
    let mut message = ParsedMessage::empty(MessageSource::Cfb);
    let Some(root) = file.root().map(|r| r.id) else {
        return message;
    };

    let props = PropertyStorage::new(file, root, ROOT_HEADER_SIZE);
    let policy = props.text_policy(default_codepage);
    debug!(
        declared = policy.declared.map(|e| e.name()),
        fallback = policy.fallback.name(),
        "Resolved message text encoding"
    );

    message.subject = props.string(tag::SUBJECT, &policy);
    message.body = props.string(tag::BODY, &policy);
    message.body_html = props.string(tag::BODY_HTML, &policy);
    message.body_rtf = props
        .binary(tag::RTF_COMPRESSED)
        .and_then(|data| rtf::decompress(&data))
        .and_then(|raw| non_empty(decode_text(&raw, TextEncoding::Windows1252)));
    message.sender = sender(&props, &policy);
    message.date = props
        .time(tag::CLIENT_SUBMIT_TIME)
        .or_else(|| props.time(tag::MESSAGE_DELIVERY_TIME));

    message.recipients = file
        .children(root)
        .filter(|e| e.is_storage() && is_recipient_storage(&e.name))
        .map(|e| recipient(&PropertyStorage::new(file, e.id, RECIPIENT_HEADER_SIZE), &policy))
        .collect();
    if message.recipients.is_empty() {
        message.recipients = display_recipients(&props, &policy);
    }

    debug!(
        subject = message.subject.is_some(),
        body = message.body.is_some(),
        html = message.body_html.is_some(),
        rtf = message.body_rtf.is_some(),
        recipients = message.recipients.len(),
        "Extracted MAPI properties"
    );
    message
}

fn recipient(props: &PropertyStorage<'_, '_>, policy: &TextPolicy) -> Recipient {
    let kind = props
        .int32(tag::RECIPIENT_TYPE)
        .and_then(RecipientType::from_mapi)
        .unwrap_or(RecipientType::To);
    Recipient {
        name: props.string(tag::DISPLAY_NAME, policy),
        email: prefer_smtp(
            props.string(tag::EMAIL_ADDRESS, policy),
            props.string(tag::SMTP_ADDRESS, policy),
        ),
        recipient_type: kind,
    }
}

fn sender(props: &PropertyStorage<'_, '_>, policy: &TextPolicy) -> Option<Recipient> {
    let name = props.string(tag::SENDER_NAME, policy);
    let email = prefer_smtp(
        props.string(tag::SENDER_EMAIL_ADDRESS, policy),
        props.string(tag::SENDER_SMTP_ADDRESS, policy),
    );
    if name.is_none() && email.is_none() {
        return None;
    }
    Some(Recipient {
        name,
        email,
        recipient_type: RecipientType::To,
    })
}

/// Exchange stores X.500 DNs in the address property; use the SMTP
/// address instead when there is one.
fn prefer_smtp(address: Option<String>, smtp: Option<String>) -> Option<String> {
    match (address, smtp) {
        (Some(address), Some(smtp)) if !address.contains('@') => Some(smtp),
        (None, smtp) => smtp,
        (address, _) => address,
    }
}

/// Name-only recipients from `PR_DISPLAY_TO` / `PR_DISPLAY_CC`, for
/// messages saved without a recipient table.
fn display_recipients(props: &PropertyStorage<'_, '_>, policy: &TextPolicy) -> Vec<Recipient> {
    [(tag::DISPLAY_TO, RecipientType::To), (tag::DISPLAY_CC, RecipientType::Cc)]
        .into_iter()
        .filter_map(|(t, kind)| props.string(t, policy).map(|list| (list, kind)))
        .flat_map(|(list, kind)| {
            list.split(';')
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .map(|name| Recipient {
                    name: Some(name.to_string()),
                    email: None,
                    recipient_type: kind,
                })
                .collect::<Vec<_>>()
        })
        .collect()
}
