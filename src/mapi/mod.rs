//! MAPI property extraction from Outlook `.msg` / `.oft` compound files.
//!
//! A message is a CFB storage whose streams are MAPI properties:
//!
//! ```text
//! Root Entry
//! ├── __substg1.0_0037001F        subject (Unicode)
//! ├── __substg1.0_1000001F        plain-text body
//! ├── __substg1.0_10090102        compressed RTF body
//! ├── __properties_version1.0     fixed-width properties
//! └── __recip_version1.0_#00000000
//!     ├── __substg1.0_3001001F    display name
//!     ├── __substg1.0_3003001F    email address
//!     └── __properties_version1.0 recipient type, ...
//! ```

pub mod extract;
pub mod fixed;
pub mod property;
pub mod rtf;
pub mod tag;

pub use extract::{extract_message, PropertyStorage, TextPolicy};
pub use property::{PropertyId, PropertyStream};
pub use tag::PropertyType;
