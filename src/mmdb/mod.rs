//! MaxMind DB writer for prefix tries.
//!
//! # File Structure
//!
//! ```text
//! +------------------+
//! |   SEARCH TREE    |  node_count * record_size / 4 bytes
//! +------------------+
//! |   SEPARATOR      |  16 zero bytes
//! +------------------+
//! |   DATA SECTION   |  one encoded value per distinct label
//! +------------------+
//! | METADATA MARKER  |  "\xAB\xCD\xEFMaxMind.com"
//! +------------------+
//! |    METADATA      |  encoded map
//! +------------------+
//! ```
//!
//! Every node holds two records (bit 0, bit 1). A record below `node_count`
//! points at another node, `node_count` itself means "no data", and larger
//! values point into the data section at `record - node_count - 16`.

mod format;
mod writer;

pub use format::*;
pub use writer::MmdbWriter;
