//! The reader's result record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// How a recipient was addressed (mirrors the MAPI recipient-type values).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum RecipientType {
    To = 1,
    Cc = 2,
    Bcc = 3,
}

impl RecipientType {
    /// Map a MAPI `PR_RECIPIENT_TYPE` value, ignoring the high flag bits
    /// Outlook ORs in (e.g. `MAPI_SUBMITTED`).
    pub fn from_mapi(value: i32) -> Option<Self> {
        Self::try_from((value & 0xFF) as u8).ok()
    }

    /// Header name used for this type in RFC 5322 messages.
    pub fn header_name(&self) -> &'static str {
        match self {
            Self::To => "To",
            Self::Cc => "Cc",
            Self::Bcc => "Bcc",
        }
    }
}

impl From<RecipientType> for u8 {
    fn from(value: RecipientType) -> Self {
        value as u8
    }
}

impl TryFrom<u8> for RecipientType {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::To),
            2 => Ok(Self::Cc),
            3 => Ok(Self::Bcc),
            other => Err(format!("invalid recipient type {other}")),
        }
    }
}

/// One recipient (or the sender).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipient {
    pub name: Option<String>,
    pub email: Option<String>,
    #[serde(rename = "recipientType")]
    pub recipient_type: RecipientType,
}

impl Recipient {
    /// Format for display: `"Name <email>"`, or whichever half is present.
    pub fn display(&self) -> String {
        match (&self.name, &self.email) {
            (Some(name), Some(email)) => format!("{name} <{email}>"),
            (Some(name), None) => name.clone(),
            (None, Some(email)) => email.clone(),
            (None, None) => String::new(),
        }
    }
}

impl std::fmt::Display for Recipient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display())
    }
}

/// Which strategy produced a [`ParsedMessage`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageSource {
    /// Read from the compound file structure.
    Cfb,
    /// Parsed as RFC 5322 / MIME text.
    Mime,
    /// Scraped from raw bytes after structural parsing failed.
    Scrape,
    /// No strategy applied.
    #[default]
    Empty,
}

impl MessageSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cfb => "cfb",
            Self::Mime => "mime",
            Self::Scrape => "scrape",
            Self::Empty => "empty",
        }
    }
}

/// Everything the reader extracts from one message.
///
/// Absent fields are `None` (or an empty list); absence is never an error.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParsedMessage {
    pub subject: Option<String>,
    /// Plain-text body.
    pub body: Option<String>,
    #[serde(rename = "bodyHTML")]
    pub body_html: Option<String>,
    /// Decompressed RTF body.
    #[serde(rename = "bodyRTF")]
    pub body_rtf: Option<String>,
    /// Recipients in the order they appear in the source.
    pub recipients: Vec<Recipient>,
    pub sender: Option<Recipient>,
    pub date: Option<DateTime<Utc>>,
    pub source: MessageSource,
}

impl ParsedMessage {
    /// An empty result attributed to `source`.
    pub fn empty(source: MessageSource) -> Self {
        Self {
            source,
            ..Self::default()
        }
    }

    /// Recipients of one type, in order.
    pub fn recipients_of(&self, kind: RecipientType) -> impl Iterator<Item = &Recipient> {
        self.recipients
            .iter()
            .filter(move |r| r.recipient_type == kind)
    }

    /// Whether any field was populated.
    pub fn is_empty(&self) -> bool {
        self.subject.is_none()
            && self.body.is_none()
            && self.body_html.is_none()
            && self.body_rtf.is_none()
            && self.recipients.is_empty()
            && self.sender.is_none()
            && self.date.is_none()
    }
}

/// `Some(text)` unless `text` is empty.
pub(crate) fn non_empty(text: String) -> Option<String> {
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}
