//! Geosite file reader.

use std::collections::BTreeMap;

use super::FORMAT_VERSION;
use crate::codec::ByteCursor;
use crate::rule_type::RuleItemKind;
use crate::{Error, Result, RuleItem};

/// Decoded geosite database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeositeReader {
    codes: BTreeMap<String, Vec<RuleItem>>,
}

impl GeositeReader {
    /// Decode a complete geosite file.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let mut cursor = ByteCursor::new(data);

        let version = cursor.u8().ok_or_else(|| truncated("version"))?;
        if version != FORMAT_VERSION {
            return Err(Error::UnsupportedVersion(version as u32));
        }

        let count = cursor.uvarint().ok_or_else(|| truncated("code count"))?;
        let mut index = Vec::new();
        for _ in 0..count {
            let code = cursor.string().ok_or_else(|| truncated("code name"))?;
            let offset = cursor.uvarint().ok_or_else(|| truncated("code offset"))?;
            let items = cursor.uvarint().ok_or_else(|| truncated("item count"))?;
            index.push((code, offset as usize, items));
        }

        let item_section = &data[cursor.position()..];
        let mut codes = BTreeMap::new();
        for (code, offset, count) in index {
            let section = item_section
                .get(offset..)
                .ok_or_else(|| Error::InvalidGeosite(format!("offset {} out of range", offset)))?;
            let mut items_cursor = ByteCursor::new(section);
            let mut items = Vec::new();
            for _ in 0..count {
                let kind = items_cursor.u8().ok_or_else(|| truncated("item type"))?;
                let kind = RuleItemKind::from_u8(kind)
                    .ok_or_else(|| Error::InvalidGeosite(format!("unknown item type {}", kind)))?;
                let value = items_cursor.string().ok_or_else(|| truncated("item value"))?;
                items.push(RuleItem { kind, value });
            }
            codes.insert(code, items);
        }

        Ok(Self { codes })
    }

    /// Items of a code, if present.
    pub fn items(&self, code: &str) -> Option<&[RuleItem]> {
        self.codes.get(code).map(|items| items.as_slice())
    }

    /// Code names in sorted order.
    pub fn codes(&self) -> impl Iterator<Item = &str> {
        self.codes.keys().map(|code| code.as_str())
    }
}

fn truncated(what: &str) -> Error {
    Error::InvalidGeosite(format!("truncated {}", what))
}
