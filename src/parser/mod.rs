//! Message parsing: RFC 5322 header decoding, the MIME reader, the
//! compound-file scraper, and the fallback ladder that ties them to the
//! MAPI extractor.

pub mod header;
pub mod mime;
pub mod scrape;
pub mod strategy;

pub use strategy::{Attempt, CfbStrategy, Ladder, MimeStrategy, ScrapeStrategy, Strategy};
