//! Content-Transfer-Encoding handling for single-part bodies.

use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig};
use base64::engine::DecodePaddingMode;
use base64::Engine;
use tracing::debug;

use super::charset::encoding_for_charset;
use super::quoted_printable;
use super::text::decode_text;

/// Base64 engine that tolerates missing padding and stray trailing bits.
pub(crate) const LENIENT_BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new()
        .with_decode_padding_mode(DecodePaddingMode::Indifferent)
        .with_decode_allow_trailing_bits(true),
);

/// A `Content-Transfer-Encoding` value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransferEncoding {
    #[default]
    SevenBit,
    EightBit,
    Binary,
    QuotedPrintable,
    Base64,
}

impl TransferEncoding {
    /// Parse a header value; unknown values are treated as `7bit`.
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "quoted-printable" => Self::QuotedPrintable,
            "base64" => Self::Base64,
            "8bit" => Self::EightBit,
            "binary" => Self::Binary,
            _ => Self::SevenBit,
        }
    }
}

/// Decode a body that was already read as text.
///
/// Identity encodings return the text untouched; the charset only applies
/// to encodings that produce raw bytes.
pub fn decode_body(text: &str, encoding: TransferEncoding, charset: Option<&str>) -> String {
    match encoding {
        TransferEncoding::QuotedPrintable => {
            quoted_printable::decode_quoted_printable(text, charset)
        }
        TransferEncoding::Base64 => {
            let compact: Vec<u8> = text
                .bytes()
                .filter(|b| !b.is_ascii_whitespace())
                .collect();
            match LENIENT_BASE64.decode(&compact) {
                Ok(bytes) => decode_text(&bytes, encoding_for_charset(charset)),
                Err(e) => {
                    debug!(error = %e, "Base64 body did not decode, keeping raw text");
                    text.to_string()
                }
            }
        }
        TransferEncoding::SevenBit | TransferEncoding::EightBit | TransferEncoding::Binary => {
            text.to_string()
        }
    }
}
