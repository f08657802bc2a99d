//! MAPI property tags and type codes used by the reader.

use serde::Serialize;

pub const SUBJECT: u16 = 0x0037;
pub const CLIENT_SUBMIT_TIME: u16 = 0x0039;
pub const SENDER_NAME: u16 = 0x0C1A;
pub const SENDER_EMAIL_ADDRESS: u16 = 0x0C1F;
pub const RECIPIENT_TYPE: u16 = 0x0C15;
pub const DISPLAY_CC: u16 = 0x0E03;
pub const DISPLAY_TO: u16 = 0x0E04;
pub const MESSAGE_DELIVERY_TIME: u16 = 0x0E06;
pub const BODY: u16 = 0x1000;
pub const RTF_COMPRESSED: u16 = 0x1009;
pub const BODY_HTML: u16 = 0x1013;
pub const DISPLAY_NAME: u16 = 0x3001;
pub const EMAIL_ADDRESS: u16 = 0x3003;
pub const SMTP_ADDRESS: u16 = 0x39FE;
/// PR_INTERNET_CPID: codepage of the message's text properties.
pub const INTERNET_CPID: u16 = 0x3FDE;
/// PR_MESSAGE_CODEPAGE.
pub const MESSAGE_CODEPAGE: u16 = 0x3FFD;
pub const SENDER_SMTP_ADDRESS: u16 = 0x5D01;

/// Value type of a MAPI property (the low 16 bits of a property tag).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum PropertyType {
    Int16,
    Int32,
    Boolean,
    Int64,
    /// PT_STRING8: 8-bit text in the message codepage.
    StringAnsi,
    /// PT_UNICODE: UTF-16LE text.
    StringUnicode,
    /// PT_SYSTIME: FILETIME.
    SysTime,
    Binary,
    Unknown(u16),
}

impl From<u16> for PropertyType {
    fn from(code: u16) -> Self {
        match code {
            0x0002 => Self::Int16,
            0x0003 => Self::Int32,
            0x000B => Self::Boolean,
            0x0014 => Self::Int64,
            0x001E => Self::StringAnsi,
            0x001F => Self::StringUnicode,
            0x0040 => Self::SysTime,
            0x0102 => Self::Binary,
            other => Self::Unknown(other),
        }
    }
}

impl PropertyType {
    pub fn code(&self) -> u16 {
        match self {
            Self::Int16 => 0x0002,
            Self::Int32 => 0x0003,
            Self::Boolean => 0x000B,
            Self::Int64 => 0x0014,
            Self::StringAnsi => 0x001E,
            Self::StringUnicode => 0x001F,
            Self::SysTime => 0x0040,
            Self::Binary => 0x0102,
            Self::Unknown(code) => *code,
        }
    }

    pub fn is_string(&self) -> bool {
        matches!(self, Self::StringAnsi | Self::StringUnicode)
    }
}
