//! Byte and text codecs: UTF-16LE / UTF-8 / Windows codepages, quoted-printable,
//! base64 transfer encoding, and MIME charset resolution.

pub mod charset;
pub mod quoted_printable;
pub mod text;
pub mod transfer;
