//! Streaming parser for the blocklist dump.
//!
//! The dump is published in Windows-1251. Each row is `;`-separated:
//!
//! ```text
//! Updated: 2024-05-01 12:00:00 +0000
//! 1.2.3.4 | 5.6.7.0/24;*.example.com;;Authority;27-31-2018/Id204;2018-01-01
//! ```
//!
//! Field 0 holds `|`-joined addresses and networks, field 1 the domain. The
//! remaining fields vary from row to row and are ignored.

use csv::StringRecord;
use encoding_rs_io::{DecodeReaderBytes, DecodeReaderBytesBuilder};
use std::io::Read;

use crate::{Error, Result};

/// Upstream location of the dump.
pub const DEFAULT_DUMP_URL: &str = "https://raw.githubusercontent.com/zapret-info/z-i/master/dump.csv";

/// One parsed dump row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRecord {
    /// `|`-separated address and CIDR tokens
    pub ip_field: String,
    /// Domain, possibly empty or `*`-prefixed
    pub domain_field: String,
    /// 1-based line number in the dump
    pub line: u64,
}

impl RawRecord {
    pub fn new(ip_field: impl Into<String>, domain_field: impl Into<String>) -> Self {
        Self {
            ip_field: ip_field.into(),
            domain_field: domain_field.into(),
            line: 0,
        }
    }
}

/// Iterator over the records of a Windows-1251 encoded dump.
pub struct DumpReader<R: Read> {
    csv: csv::Reader<DecodeReaderBytes<R, Vec<u8>>>,
    record: StringRecord,
    first: bool,
    done: bool,
}

impl<R: Read> DumpReader<R> {
    /// Wrap a byte source holding the raw dump.
    pub fn new(source: R) -> Self {
        let decoded = DecodeReaderBytesBuilder::new()
            .encoding(Some(encoding_rs::WINDOWS_1251))
            .build(source);

        let csv = csv::ReaderBuilder::new()
            .delimiter(b';')
            .has_headers(false)
            .flexible(true)
            .from_reader(decoded);

        Self {
            csv,
            record: StringRecord::new(),
            first: true,
            done: false,
        }
    }

    fn read_next(&mut self) -> Result<Option<RawRecord>> {
        loop {
            if !self.csv.read_record(&mut self.record)? {
                return Ok(None);
            }

            let line = self.record.position().map(|p| p.line()).unwrap_or(0);
            let first = std::mem::replace(&mut self.first, false);

            if self.record.len() < 2 {
                if first {
                    log::debug!("Skipping dump header: {:?}", self.record.get(0).unwrap_or(""));
                    continue;
                }
                return Err(Error::MalformedRecord {
                    line,
                    fields: self.record.len(),
                });
            }

            return Ok(Some(RawRecord {
                ip_field: self.record[0].to_string(),
                domain_field: self.record[1].to_string(),
                line,
            }));
        }
    }
}

impl<R: Read> Iterator for DumpReader<R> {
    type Item = Result<RawRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.read_next() {
            Ok(Some(record)) => Some(Ok(record)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}
