//! Geosite file writer.

use std::collections::BTreeMap;

use super::FORMAT_VERSION;
use crate::codec::{put_string, put_uvarint};
use crate::{Result, RuleItem};

/// Builder for geosite files.
#[derive(Debug, Default)]
pub struct GeositeWriter {
    codes: BTreeMap<String, Vec<RuleItem>>,
}

impl GeositeWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append items to a code, creating it if needed.
    pub fn add_items<I>(&mut self, code: &str, items: I)
    where
        I: IntoIterator<Item = RuleItem>,
    {
        self.codes.entry(code.to_string()).or_default().extend(items);
    }

    /// Build the final binary data.
    pub fn build(&self) -> Result<Vec<u8>> {
        let mut items = Vec::new();
        let mut index = Vec::with_capacity(self.codes.len());

        for (code, code_items) in &self.codes {
            index.push((code.as_str(), items.len(), code_items.len()));
            for item in code_items {
                items.push(item.kind.as_u8());
                put_string(&mut items, &item.value);
            }
        }

        let mut output = Vec::with_capacity(items.len() + 64);
        output.push(FORMAT_VERSION);
        put_uvarint(&mut output, index.len() as u64);
        for (code, offset, count) in index {
            put_string(&mut output, code);
            put_uvarint(&mut output, offset as u64);
            put_uvarint(&mut output, count as u64);
        }
        output.extend_from_slice(&items);

        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_empty() {
        let data = GeositeWriter::new().build().unwrap();
        assert_eq!(data, vec![FORMAT_VERSION, 0]);
    }

    #[test]
    fn test_write_single_code_layout() {
        let mut writer = GeositeWriter::new();
        writer.add_items(
            "az",
            vec![RuleItem::suffix(".a.io"), RuleItem::domain("a.io")],
        );

        let data = writer.build().unwrap();
        let expected: Vec<u8> = [
            &[FORMAT_VERSION, 1][..],
            &[2, b'a', b'z', 0, 2],
            &[1, 5, b'.', b'a', b'.', b'i', b'o'],
            &[0, 4, b'a', b'.', b'i', b'o'],
        ]
        .concat();
        assert_eq!(data, expected);
    }

    #[test]
    fn test_codes_are_sorted() {
        let mut writer = GeositeWriter::new();
        writer.add_items("zz", vec![RuleItem::domain("z.io")]);
        writer.add_items("aa", vec![RuleItem::domain("a.io")]);

        let data = writer.build().unwrap();
        // first code name starts right after version and count
        assert_eq!(&data[2..5], &[2, b'a', b'a']);
    }
}
