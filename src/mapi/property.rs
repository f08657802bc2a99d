//! Property stream naming and classification.
//!
//! Variable-length properties live in streams named
//! `__substg1.0_TTTTYYYY`, where `TTTT` is the property id and `YYYY` the
//! type code, both as upper-case hex.

use serde::Serialize;

use super::tag::PropertyType;

/// Name prefix of a variable-length property stream.
pub const SUBSTG_PREFIX: &str = "__substg1.0_";
/// Name prefix of a recipient storage (`__recip_version1.0_#00000000`).
pub const RECIP_PREFIX: &str = "__recip_version1.0_#";
/// Name of the fixed-length property stream.
pub const PROPERTIES_STREAM: &str = "__properties_version1.0";

/// A property tag split into id and type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct PropertyId {
    pub tag: u16,
    pub kind: PropertyType,
}

impl PropertyId {
    pub fn new(tag: u16, kind: PropertyType) -> Self {
        Self { tag, kind }
    }

    /// Classify a directory entry name. Returns `None` for anything that is
    /// not a `__substg1.0_` stream with eight hex digits.
    pub fn from_stream_name(name: &str) -> Option<Self> {
        let hex = name.strip_prefix(SUBSTG_PREFIX)?;
        if hex.len() != 8 || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            return None;
        }
        let tag = u16::from_str_radix(&hex[..4], 16).ok()?;
        let code = u16::from_str_radix(&hex[4..], 16).ok()?;
        Some(Self::new(tag, PropertyType::from(code)))
    }

    /// The stream name this property would be stored under.
    pub fn stream_name(&self) -> String {
        format!("{SUBSTG_PREFIX}{:04X}{:04X}", self.tag, self.kind.code())
    }
}

/// A property stream resolved to its bytes.
#[derive(Debug, Clone)]
pub struct PropertyStream {
    pub name: String,
    pub id: PropertyId,
    pub data: Vec<u8>,
}

/// Whether `name` is a recipient storage.
pub fn is_recipient_storage(name: &str) -> bool {
    name.starts_with(RECIP_PREFIX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_stream_name() {
        let id = PropertyId::from_stream_name("__substg1.0_0037001F").unwrap();
        assert_eq!(id.tag, 0x0037);
        assert_eq!(id.kind, PropertyType::StringUnicode);
        assert_eq!(id.stream_name(), "__substg1.0_0037001F");

        let lower = PropertyId::from_stream_name("__substg1.0_1013001e").unwrap();
        assert_eq!(lower.tag, 0x1013);
        assert_eq!(lower.kind, PropertyType::StringAnsi);
    }

    #[test]
    fn test_rejects_non_property_names() {
        assert!(PropertyId::from_stream_name("__properties_version1.0").is_none());
        assert!(PropertyId::from_stream_name("__substg1.0_0037").is_none());
        assert!(PropertyId::from_stream_name("__substg1.0_0037001G").is_none());
        assert!(PropertyId::from_stream_name("__substg1.0_0037001F-0000").is_none());
    }

    #[test]
    fn test_recipient_storage_names() {
        assert!(is_recipient_storage("__recip_version1.0_#00000000"));
        assert!(!is_recipient_storage("__attach_version1.0_#00000000"));
    }
}
