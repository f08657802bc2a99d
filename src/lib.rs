//! `msgpeek`: a reader for Outlook MSG/OFT files and RFC 5322 messages.
//!
//! The crate turns a byte buffer into a [`ParsedMessage`]: subject, bodies
//! (plain, HTML, RTF), recipients, sender and date. Compound files are read
//! through their MAPI property streams; anything else is parsed as MIME
//! text. Damaged inputs fall through a ladder of weaker strategies instead
//! of failing, so a read only errors on a bad window or a truncated
//! compound file header.
//!
//! ```
//! let msg = msgpeek::read(b"Subject: Hi\r\nTo: a@example.com\r\n\r\nHello").unwrap();
//! assert_eq!(msg.subject.as_deref(), Some("Hi"));
//! assert_eq!(msg.recipients.len(), 1);
//! ```

pub mod buffer;
pub mod cfb;
pub mod codec;
pub mod config;
pub mod error;
pub mod mapi;
pub mod model;
pub mod parser;
pub mod reader;

pub use buffer::ByteWindow;
pub use error::{MsgError, Result};
pub use model::message::{MessageSource, ParsedMessage, Recipient, RecipientType};
pub use reader::{read, MsgReader, ReaderOptions};
