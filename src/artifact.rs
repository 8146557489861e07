//! Output artifacts and their checksum sidecars.

use bitflags::bitflags;
use sha2::{Digest, Sha256};
use std::fmt;
use std::io::{self, Write};

use crate::{Error, Result};

bitflags! {
    /// Selection of artifacts a run produces.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Artifacts: u8 {
        /// Geosite domain database.
        const GEOSITE = 0b0001;
        /// MaxMind DB of blocked networks.
        const GEOIP = 0b0010;
        /// Rule-set JSON source document.
        const RULESET_JSON = 0b0100;
        /// Compiled binary rule-set.
        const RULESET_BINARY = 0b1000;
    }
}

impl Artifacts {
    /// Parse a comma-separated list such as `geosite,geoip`.
    ///
    /// `all` selects every artifact.
    pub fn parse(s: &str) -> Result<Self> {
        let mut selected = Artifacts::empty();
        for name in s.split(',').map(str::trim).filter(|n| !n.is_empty()) {
            selected |= match name.to_lowercase().as_str() {
                "geosite" => Artifacts::GEOSITE,
                "geoip" => Artifacts::GEOIP,
                "ruleset-json" | "json" => Artifacts::RULESET_JSON,
                "ruleset-binary" | "ruleset" | "azrs" => Artifacts::RULESET_BINARY,
                "all" => Artifacts::all(),
                other => return Err(Error::Config(format!("unknown artifact: {}", other))),
            };
        }
        if selected.is_empty() {
            return Err(Error::Config("no artifacts selected".to_string()));
        }
        Ok(selected)
    }
}

impl Default for Artifacts {
    fn default() -> Self {
        Artifacts::all()
    }
}

/// One produced output file held in memory.
#[derive(Clone, PartialEq, Eq)]
pub struct Artifact {
    pub kind: Artifacts,
    pub name: String,
    pub data: Vec<u8>,
}

impl Artifact {
    pub fn new(kind: Artifacts, name: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            kind,
            name: name.into(),
            data,
        }
    }

    /// Hex SHA-256 of the content.
    pub fn sha256_hex(&self) -> String {
        hex::encode(Sha256::digest(&self.data))
    }

    /// Name of the checksum sidecar.
    pub fn sidecar_name(&self) -> String {
        format!("{}.sha256sum", self.name)
    }

    /// Sidecar content in `sha256sum` format.
    pub fn sidecar(&self) -> String {
        sidecar_line(&self.sha256_hex(), &self.name)
    }
}

impl fmt::Debug for Artifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Artifact")
            .field("kind", &self.kind)
            .field("name", &self.name)
            .field("len", &self.data.len())
            .finish()
    }
}

/// `<hex-digest>  <filename>\n`
pub fn sidecar_line(hex_digest: &str, file_name: &str) -> String {
    format!("{}  {}\n", hex_digest, file_name)
}

/// Writer that feeds every byte to a SHA-256 accumulator on its way through.
pub struct HashingWriter<W: Write> {
    inner: W,
    hasher: Sha256,
}

impl<W: Write> HashingWriter<W> {
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            hasher: Sha256::new(),
        }
    }

    /// Consume the writer, returning the inner writer and the hex digest.
    pub fn finish(self) -> (W, String) {
        (self.inner, hex::encode(self.hasher.finalize()))
    }
}

impl<W: Write> Write for HashingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let written = self.inner.write(buf)?;
        self.hasher.update(&buf[..written]);
        Ok(written)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EMPTY_SHA256: &str = "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";

    #[test]
    fn test_parse_artifacts() {
        assert_eq!(
            Artifacts::parse("geosite, geoip").unwrap(),
            Artifacts::GEOSITE | Artifacts::GEOIP
        );
        assert_eq!(Artifacts::parse("all").unwrap(), Artifacts::all());
        assert_eq!(Artifacts::parse("json,azrs").unwrap().bits(), 0b1100);
        assert!(Artifacts::parse("geosite,bogus").is_err());
        assert!(Artifacts::parse("").is_err());
    }

    #[test]
    fn test_sidecar_format() {
        let artifact = Artifact::new(Artifacts::GEOSITE, "geosite.db", Vec::new());
        assert_eq!(artifact.sidecar_name(), "geosite.db.sha256sum");
        assert_eq!(artifact.sidecar(), format!("{}  geosite.db\n", EMPTY_SHA256));
    }

    #[test]
    fn test_hashing_writer_tees() {
        let mut writer = HashingWriter::new(Vec::new());
        writer.write_all(b"hello ").unwrap();
        writer.write_all(b"world").unwrap();
        let (inner, digest) = writer.finish();

        assert_eq!(inner, b"hello world");
        assert_eq!(digest, hex::encode(Sha256::digest(b"hello world")));
    }
}
