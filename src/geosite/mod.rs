//! Geosite domain database.
//!
//! # File Structure
//!
//! ```text
//! +------------------+
//! |  VERSION (u8=0)  |
//! +------------------+
//! |   CODE COUNT     |  uvarint
//! +------------------+
//! |   CODE INDEX     |  per code: string name, uvarint offset, uvarint count
//! +------------------+
//! |     ITEMS        |  per item: u8 type, string value
//! +------------------+
//! ```
//!
//! Strings are a uvarint length followed by UTF-8 bytes. Codes are written in
//! sorted order and their offsets point into the item section.

mod reader;
mod writer;

pub use reader::GeositeReader;
pub use writer::GeositeWriter;

/// Current geosite format version.
pub const FORMAT_VERSION: u8 = 0;
