//! Search tree and metadata writer.

use ahash::AHashMap;
use std::collections::BTreeMap;

use super::format::*;
use crate::trie::{NodeId, PrefixTrie};
use crate::{Error, Result};

/// Where a search tree record points.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Record<'a> {
    Empty,
    Node(usize),
    Data(&'a str),
}

/// Writer turning a labelled prefix trie into a MaxMind DB.
#[derive(Debug, Clone)]
pub struct MmdbWriter {
    languages: Vec<String>,
    description: BTreeMap<String, String>,
    build_epoch: u64,
}

impl MmdbWriter {
    /// Create a writer whose single language tag is `language`.
    pub fn new(language: &str) -> Self {
        Self {
            languages: vec![language.to_string()],
            description: BTreeMap::new(),
            build_epoch: std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap_or_default()
                .as_secs(),
        }
    }

    pub fn with_description(mut self, language: &str, text: &str) -> Self {
        self.description.insert(language.to_string(), text.to_string());
        self
    }

    /// Fix the build timestamp for reproducible output.
    pub fn with_build_epoch(mut self, epoch: u64) -> Self {
        self.build_epoch = epoch;
        self
    }

    /// Serialize the trie in a single pass.
    pub fn write(&self, trie: &PrefixTrie<String>) -> Result<Vec<u8>> {
        let records = flatten(trie);
        let node_count = records.len();

        // One data entry per distinct label.
        let mut data = DataEncoder::new();
        let mut offsets: AHashMap<&str, usize> = AHashMap::new();
        for pair in &records {
            for record in pair {
                if let Record::Data(label) = record {
                    if !offsets.contains_key(label) {
                        offsets.insert(*label, data.len());
                        data.string(label);
                    }
                }
            }
        }

        let max_value = node_count + DATA_SECTION_SEPARATOR_SIZE + data.len();
        let record_size = record_size_for(max_value)?;

        let resolve = |record: &Record<'_>| -> u32 {
            match record {
                Record::Empty => node_count as u32,
                Record::Node(id) => *id as u32,
                Record::Data(label) => {
                    let offset = offsets.get(label).copied().unwrap_or_default();
                    (node_count + DATA_SECTION_SEPARATOR_SIZE + offset) as u32
                }
            }
        };

        let tree_size = node_count * record_size as usize / 4;
        let mut output = Vec::with_capacity(tree_size + DATA_SECTION_SEPARATOR_SIZE + data.len() + 256);

        for [left, right] in &records {
            write_node(&mut output, record_size, resolve(left), resolve(right));
        }
        output.extend_from_slice(&[0u8; DATA_SECTION_SEPARATOR_SIZE]);
        output.extend_from_slice(&data.into_bytes());

        output.extend_from_slice(METADATA_MARKER);
        output.extend_from_slice(&self.metadata(node_count as u32, record_size));

        log::debug!(
            "Built IP database: {} nodes, {}-bit records, {} bytes",
            node_count,
            record_size,
            output.len()
        );

        Ok(output)
    }

    fn metadata(&self, node_count: u32, record_size: u16) -> Vec<u8> {
        let mut enc = DataEncoder::new();
        enc.map_header(9);

        enc.string("binary_format_major_version");
        enc.uint16(BINARY_FORMAT_MAJOR_VERSION);
        enc.string("binary_format_minor_version");
        enc.uint16(BINARY_FORMAT_MINOR_VERSION);
        enc.string("build_epoch");
        enc.uint64(self.build_epoch);
        enc.string("database_type");
        enc.string(DATABASE_TYPE);

        enc.string("description");
        enc.map_header(self.description.len());
        for (language, text) in &self.description {
            enc.string(language);
            enc.string(text);
        }

        enc.string("ip_version");
        enc.uint16(6);

        enc.string("languages");
        enc.array_header(self.languages.len());
        for language in &self.languages {
            enc.string(language);
        }

        enc.string("node_count");
        enc.uint32(node_count);
        enc.string("record_size");
        enc.uint16(record_size);

        enc.into_bytes()
    }
}

/// Convert the trie into search tree records, root first.
///
/// Labels are pushed down to the records below them, so a record pointing
/// to data always carries the label of its deepest labelled ancestor.
fn flatten(trie: &PrefixTrie<String>) -> Vec<[Record<'_>; 2]> {
    let mut records = vec![[Record::Empty, Record::Empty]];
    let root = trie.node(trie.root());
    let inherited = root.label.as_deref();

    for bit in 0..2 {
        let record = child_record(trie, root.children[bit], inherited, &mut records);
        records[0][bit] = record;
    }
    records
}

fn child_record<'a>(
    trie: &'a PrefixTrie<String>,
    child: Option<NodeId>,
    inherited: Option<&'a str>,
    records: &mut Vec<[Record<'a>; 2]>,
) -> Record<'a> {
    let Some(id) = child else {
        return inherited.map_or(Record::Empty, Record::Data);
    };

    let node = trie.node(id);
    let effective = node.label.as_deref().or(inherited);
    if node.is_leaf() {
        return effective.map_or(Record::Empty, Record::Data);
    }

    let index = records.len();
    records.push([Record::Empty, Record::Empty]);
    for bit in 0..2 {
        let record = child_record(trie, node.children[bit], effective, records);
        records[index][bit] = record;
    }
    Record::Node(index)
}

fn record_size_for(max_value: usize) -> Result<u16> {
    if max_value < 1 << 24 {
        Ok(24)
    } else if max_value < 1 << 28 {
        Ok(28)
    } else if max_value <= u32::MAX as usize {
        Ok(32)
    } else {
        Err(Error::Mmdb(format!("search tree too large: {} records", max_value)))
    }
}

fn write_node(output: &mut Vec<u8>, record_size: u16, left: u32, right: u32) {
    match record_size {
        24 => {
            output.extend_from_slice(&left.to_be_bytes()[1..]);
            output.extend_from_slice(&right.to_be_bytes()[1..]);
        }
        28 => {
            let left_bytes = left.to_be_bytes();
            let right_bytes = right.to_be_bytes();
            output.extend_from_slice(&left_bytes[1..]);
            output.push(((left_bytes[0] & 0x0F) << 4) | (right_bytes[0] & 0x0F));
            output.extend_from_slice(&right_bytes[1..]);
        }
        _ => {
            output.extend_from_slice(&left.to_be_bytes());
            output.extend_from_slice(&right.to_be_bytes());
        }
    }
}
