//! Public entry point: turn bytes into a [`ParsedMessage`].

use tracing::debug;

use crate::buffer::ByteWindow;
use crate::cfb::CfbOptions;
use crate::error::Result;
use crate::model::message::ParsedMessage;
use crate::parser::strategy::{CfbStrategy, Ladder, MimeStrategy, ScrapeStrategy, Strategy};

/// Codepage assumed for 8-bit strings when a message declares none.
pub const DEFAULT_CODEPAGE: u32 = 1252;

/// Knobs for [`MsgReader`].
#[derive(Debug, Clone, Copy)]
pub struct ReaderOptions {
    /// Limits for the compound file reader.
    pub cfb: CfbOptions,
    /// Windows codepage used for undeclared 8-bit strings.
    pub default_codepage: u32,
    /// Whether to fall back to UTF-16 scraping of damaged compound files.
    pub enable_scrape: bool,
}

impl Default for ReaderOptions {
    fn default() -> Self {
        Self {
            cfb: CfbOptions::default(),
            default_codepage: DEFAULT_CODEPAGE,
            enable_scrape: true,
        }
    }
}

/// Reads MSG/OFT compound files and RFC 5322 messages.
///
/// The reader holds no per-message state and can be shared across threads.
#[derive(Debug)]
pub struct MsgReader {
    options: ReaderOptions,
    ladder: Ladder,
}

impl MsgReader {
    pub fn new(options: ReaderOptions) -> Self {
        let mut strategies: Vec<Box<dyn Strategy>> = vec![
            Box::new(CfbStrategy {
                options: options.cfb,
                default_codepage: options.default_codepage,
            }),
            Box::new(MimeStrategy),
        ];
        if options.enable_scrape {
            strategies.push(Box::new(ScrapeStrategy));
        }
        Self {
            options,
            ladder: Ladder::new(strategies),
        }
    }

    pub fn options(&self) -> &ReaderOptions {
        &self.options
    }

    /// Parse all of `bytes`.
    pub fn read(&self, bytes: &[u8]) -> Result<ParsedMessage> {
        self.read_window(ByteWindow::new(bytes))
    }

    /// Parse `length` bytes of `backing` starting at `offset`. Nothing
    /// outside that range is read.
    ///
    /// # Errors
    ///
    /// [`crate::error::MsgError::InvalidWindow`] if the range does not fit.
    pub fn read_range(&self, backing: &[u8], offset: usize, length: usize) -> Result<ParsedMessage> {
        self.read_window(ByteWindow::with_range(backing, offset, length)?)
    }

    pub fn read_window(&self, window: ByteWindow<'_>) -> Result<ParsedMessage> {
        debug!(bytes = window.len(), "Reading message");
        self.ladder.run(&window)
    }
}

impl Default for MsgReader {
    fn default() -> Self {
        Self::new(ReaderOptions::default())
    }
}

/// Parse `bytes` with default options.
///
/// ```
/// let msg = msgpeek::read(b"Subject: Hello\r\n\r\nHi there\r\n").unwrap();
/// assert_eq!(msg.subject.as_deref(), Some("Hello"));
/// assert_eq!(msg.body.as_deref(), Some("Hi there"));
/// ```
pub fn read(bytes: &[u8]) -> Result<ParsedMessage> {
    MsgReader::default().read(bytes)
}
