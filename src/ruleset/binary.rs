//! Compiled rule-set encoding.
//!
//! ```text
//! +------------------+
//! |  MAGIC "AZRS"    |
//! +------------------+
//! |  VERSION (u8)    |
//! +------------------+
//! |  ZLIB STREAM     |  uvarint rule count, then per rule:
//! |                  |    u8 rule type, items, u8 0xFF, u8 invert
//! +------------------+
//! ```
//!
//! An item is `u8 item type, uvarint count, count x string`.
//!
//! The layout borrows sing-box rule-set item codes but is not compatible
//! with sing-box `.srs` files.

use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use std::io::{Read, Write};

use super::{DefaultRule, Rule, RuleDocument};
use crate::codec::{put_string, put_uvarint, ByteCursor};
use crate::{Error, Result};

/// Magic bytes for compiled rule-sets.
pub const MAGIC: [u8; 4] = *b"AZRS";

/// Current compiled format version.
pub const FORMAT_VERSION: u8 = 1;

const RULE_TYPE_DEFAULT: u8 = 0;

const ITEM_DOMAIN: u8 = 2;
const ITEM_DOMAIN_SUFFIX: u8 = 3;
const ITEM_IP_CIDR: u8 = 6;
const ITEM_FINAL: u8 = 0xFF;

/// Encode a document into the compiled form.
pub fn encode(document: &RuleDocument) -> Result<Vec<u8>> {
    let mut body = Vec::new();
    put_uvarint(&mut body, document.rules.len() as u64);

    for rule in &document.rules {
        match rule {
            Rule::Default(default) => {
                body.push(RULE_TYPE_DEFAULT);
                put_item(&mut body, ITEM_IP_CIDR, &default.ip_cidr);
                put_item(&mut body, ITEM_DOMAIN, &default.domain);
                put_item(&mut body, ITEM_DOMAIN_SUFFIX, &default.domain_suffix);
                body.push(ITEM_FINAL);
                // invert
                body.push(0);
            }
        }
    }

    let mut output = Vec::with_capacity(body.len() / 2 + 8);
    output.extend_from_slice(&MAGIC);
    output.push(FORMAT_VERSION);

    let mut encoder = ZlibEncoder::new(output, Compression::best());
    encoder.write_all(&body)?;
    Ok(encoder.finish()?)
}

/// Decode a compiled rule-set back into its document.
pub fn decode(data: &[u8]) -> Result<RuleDocument> {
    if data.len() < MAGIC.len() + 1 {
        return Err(Error::InvalidRuleSet("file too small".to_string()));
    }
    if data[..MAGIC.len()] != MAGIC {
        return Err(Error::InvalidMagic);
    }
    let version = data[MAGIC.len()];
    if version != FORMAT_VERSION {
        return Err(Error::UnsupportedVersion(version as u32));
    }

    let mut body = Vec::new();
    ZlibDecoder::new(&data[MAGIC.len() + 1..]).read_to_end(&mut body)?;

    let mut cursor = ByteCursor::new(&body);
    let count = cursor.uvarint().ok_or_else(|| truncated("rule count"))?;

    let mut rules = Vec::new();
    for _ in 0..count {
        let rule_type = cursor.u8().ok_or_else(|| truncated("rule type"))?;
        if rule_type != RULE_TYPE_DEFAULT {
            return Err(Error::InvalidRuleSet(format!("unknown rule type {}", rule_type)));
        }
        rules.push(Rule::Default(read_default_rule(&mut cursor)?));
    }

    if !cursor.is_empty() {
        return Err(Error::InvalidRuleSet("trailing data".to_string()));
    }

    Ok(RuleDocument {
        version: super::DOCUMENT_VERSION,
        rules,
    })
}

fn put_item(buf: &mut Vec<u8>, item_type: u8, values: &[String]) {
    if values.is_empty() {
        return;
    }
    buf.push(item_type);
    put_uvarint(buf, values.len() as u64);
    for value in values {
        put_string(buf, value);
    }
}

fn read_default_rule(cursor: &mut ByteCursor<'_>) -> Result<DefaultRule> {
    let mut rule = DefaultRule::default();

    loop {
        let item_type = cursor.u8().ok_or_else(|| truncated("item type"))?;
        let target = match item_type {
            ITEM_FINAL => break,
            ITEM_IP_CIDR => &mut rule.ip_cidr,
            ITEM_DOMAIN => &mut rule.domain,
            ITEM_DOMAIN_SUFFIX => &mut rule.domain_suffix,
            other => return Err(Error::InvalidRuleSet(format!("unknown item type {}", other))),
        };

        let count = cursor.uvarint().ok_or_else(|| truncated("item count"))?;
        for _ in 0..count {
            target.push(cursor.string().ok_or_else(|| truncated("item value"))?);
        }
    }

    let invert = cursor.u8().ok_or_else(|| truncated("invert flag"))?;
    if invert != 0 {
        return Err(Error::InvalidRuleSet("inverted rules are not supported".to_string()));
    }

    Ok(rule)
}

fn truncated(what: &str) -> Error {
    Error::InvalidRuleSet(format!("truncated {}", what))
}
