//! The fallback ladder: an ordered list of parsing strategies, each of
//! which either produces a message or declines.

use tracing::{debug, warn};

use crate::buffer::ByteWindow;
use crate::cfb::{self, CfbOptions, CompoundFile};
use crate::error::Result;
use crate::mapi::extract_message;
use crate::model::message::{MessageSource, ParsedMessage};

use super::{mime, scrape};

/// Outcome of one strategy.
#[derive(Debug, Clone, PartialEq)]
pub enum Attempt {
    Parsed(ParsedMessage),
    /// The input is not something this strategy handles.
    NotApplicable,
}

impl From<Option<ParsedMessage>> for Attempt {
    fn from(value: Option<ParsedMessage>) -> Self {
        value.map_or(Self::NotApplicable, Self::Parsed)
    }
}

/// One way of reading a message.
///
/// A recoverable `Err` is logged and the next strategy is tried; a fatal
/// one (see [`crate::error::MsgError::is_fatal`]) stops the ladder.
pub trait Strategy: Send + Sync {
    fn name(&self) -> &'static str;
    fn attempt(&self, window: &ByteWindow<'_>) -> Result<Attempt>;
}

/// Compound file structure plus MAPI properties.
#[derive(Debug, Clone)]
pub struct CfbStrategy {
    pub options: CfbOptions,
    pub default_codepage: u32,
}

impl Strategy for CfbStrategy {
    fn name(&self) -> &'static str {
        "cfb"
    }

    fn attempt(&self, window: &ByteWindow<'_>) -> Result<Attempt> {
        if !cfb::is_cfb(window) {
            return Ok(Attempt::NotApplicable);
        }
        let file = CompoundFile::open(*window, self.options)?;
        if file.root().is_none() {
            return Ok(Attempt::NotApplicable);
        }
        let message = extract_message(&file, self.default_codepage);
        if message.is_empty() {
            debug!("Compound file has no readable message properties");
            return Ok(Attempt::NotApplicable);
        }
        Ok(Attempt::Parsed(message))
    }
}

/// RFC 5322 text. Compound files are only scanned for embedded headers.
#[derive(Debug, Clone, Default)]
pub struct MimeStrategy;

impl Strategy for MimeStrategy {
    fn name(&self) -> &'static str {
        "mime"
    }

    fn attempt(&self, window: &ByteWindow<'_>) -> Result<Attempt> {
        if cfb::is_cfb(window) {
            return Ok(mime::scan_embedded(window).into());
        }
        Ok(Attempt::Parsed(mime::parse_message(window)))
    }
}

/// UTF-16 stream-name scraping for damaged compound files.
#[derive(Debug, Clone, Default)]
pub struct ScrapeStrategy;

impl Strategy for ScrapeStrategy {
    fn name(&self) -> &'static str {
        "scrape"
    }

    fn attempt(&self, window: &ByteWindow<'_>) -> Result<Attempt> {
        if !cfb::is_cfb(window) {
            return Ok(Attempt::NotApplicable);
        }
        Ok(scrape::scrape(window).into())
    }
}

/// Strategies tried in order; the first `Parsed` wins.
pub struct Ladder {
    strategies: Vec<Box<dyn Strategy>>,
}

impl Ladder {
    pub fn new(strategies: Vec<Box<dyn Strategy>>) -> Self {
        Self { strategies }
    }

    /// Names of the configured strategies, in order.
    pub fn names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    /// Run the ladder. If every strategy declines, the result is an empty
    /// message with source [`MessageSource::Empty`].
    pub fn run(&self, window: &ByteWindow<'_>) -> Result<ParsedMessage> {
        for strategy in &self.strategies {
            match strategy.attempt(window) {
                Ok(Attempt::Parsed(message)) => {
                    debug!(strategy = strategy.name(), "Strategy produced a message");
                    return Ok(message);
                }
                Ok(Attempt::NotApplicable) => {
                    debug!(strategy = strategy.name(), "Strategy not applicable");
                }
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    warn!(strategy = strategy.name(), error = %e, "Strategy failed, trying next");
                }
            }
        }
        Ok(ParsedMessage::empty(MessageSource::Empty))
    }
}

impl std::fmt::Debug for Ladder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ladder")
            .field("strategies", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MsgError;

    struct Fixed(&'static str, fn() -> Result<Attempt>);

    impl Strategy for Fixed {
        fn name(&self) -> &'static str {
            self.0
        }
        fn attempt(&self, _: &ByteWindow<'_>) -> Result<Attempt> {
            (self.1)()
        }
    }

    fn subject(text: &str) -> ParsedMessage {
        ParsedMessage {
            subject: Some(text.to_string()),
            ..ParsedMessage::default()
        }
    }

    #[test]
    fn test_first_parsed_wins() {
        let strategies: Vec<Box<dyn Strategy>> = vec![
            Box::new(Fixed("skip", || Ok(Attempt::NotApplicable))),
            Box::new(Fixed("one", || Ok(Attempt::Parsed(subject("one"))))),
            Box::new(Fixed("two", || Ok(Attempt::Parsed(subject("two"))))),
        ];
        let ladder = Ladder::new(strategies);
        assert_eq!(ladder.names(), ["skip", "one", "two"]);
        let msg = ladder.run(&ByteWindow::new(b"x")).unwrap();
        assert_eq!(msg.subject.as_deref(), Some("one"));
    }

    #[test]
    fn test_recoverable_error_falls_through() {
        let strategies: Vec<Box<dyn Strategy>> = vec![
            Box::new(Fixed("bad", || Err(MsgError::InvalidHeader("shift".into())))),
            Box::new(Fixed("good", || Ok(Attempt::Parsed(subject("ok"))))),
        ];
        let ladder = Ladder::new(strategies);
        let msg = ladder.run(&ByteWindow::new(b"x")).unwrap();
        assert_eq!(msg.subject.as_deref(), Some("ok"));
    }

    #[test]
    fn test_fatal_error_stops() {
        let strategies: Vec<Box<dyn Strategy>> = vec![
            Box::new(Fixed("fatal", || {
                Err(MsgError::TruncatedHeader {
                    needed: 76,
                    available: 10,
                })
            })),
            Box::new(Fixed("never", || Ok(Attempt::Parsed(subject("no"))))),
        ];
        let ladder = Ladder::new(strategies);
        assert!(ladder.run(&ByteWindow::new(b"x")).is_err());
    }

    #[test]
    fn test_all_decline_gives_empty() {
        let strategies: Vec<Box<dyn Strategy>> =
            vec![Box::new(Fixed("skip", || Ok(Attempt::NotApplicable)))];
        let ladder = Ladder::new(strategies);
        let msg = ladder.run(&ByteWindow::new(b"x")).unwrap();
        assert!(msg.is_empty());
        assert_eq!(msg.source, MessageSource::Empty);
    }

    #[test]
    fn test_strategies_decline_foreign_input() {
        let text = ByteWindow::new(b"Subject: hi\n\nbody");
        let cfb = CfbStrategy {
            options: CfbOptions::default(),
            default_codepage: 1252,
        };
        assert_eq!(cfb.attempt(&text).unwrap(), Attempt::NotApplicable);
        assert_eq!(ScrapeStrategy.attempt(&text).unwrap(), Attempt::NotApplicable);
        assert!(matches!(MimeStrategy.attempt(&text).unwrap(), Attempt::Parsed(_)));
    }
}
