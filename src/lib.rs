//! antizapret-rules - compiles the antizapret blocklist into routing databases.
//!
//! The crate downloads the Roskomnadzor blocklist dump together with the
//! antizapret include/exclude policy, classifies every record into IP
//! networks and domain rules, and serializes the result into formats
//! consumed by sing-box style proxies.
//!
//! # Outputs
//!
//! - **geosite.db**: domain database with one `antizapret` code holding
//!   exact and suffix domain items
//! - **geoip.db**: MaxMind DB mapping every blocked network to `antizapret`
//! - **antizapret.json**: rule-set source document (`ip_cidr`, `domain`,
//!   `domain_suffix`)
//! - **antizapret.azrs**: the same rule-set in a compact zlib-compressed
//!   binary form. This is this crate's own format (see [`ruleset::binary`]);
//!   it is not a sing-box `.srs` file and only [`RuleDocument::decompile`]
//!   reads it. Feed sing-box the JSON document instead.
//!
//! # Quick Start
//!
//! ```ignore
//! use antizapret_rules::{DirectorySink, ArtifactSink, Generator, GeneratorConfig, HttpFetcher};
//!
//! let generator = Generator::new(HttpFetcher::new()?, GeneratorConfig::default());
//! let artifacts = generator.run()?;
//!
//! DirectorySink::new("output").publish(&artifacts)?;
//! ```
//!
//! # Pipeline
//!
//! 1. Policy feeds are fetched into a [`FilterSet`]
//! 2. The dump is streamed through [`DumpReader`] (Windows-1251, `;`-separated)
//! 3. [`Classifier`] folds each record into an [`Accumulator`]
//! 4. Networks are inserted into a [`PrefixTrie`]
//! 5. Each selected [`Artifacts`] entry is serialized; any failure aborts the run
//!
//! # Host exclusions
//!
//! The exclude-hosts and exclude-regexp feeds are loaded but do not change the
//! output unless [`GeneratorConfig::with_host_exclusions`] is enabled. The
//! exclude-hosts-by-ips feed is always applied.

mod error;
mod rule_type;

pub mod artifact;
pub mod classify;
pub mod codec;
pub mod dump;
pub mod fetch;
pub mod generator;
pub mod geosite;
pub mod mmdb;
pub mod policy;
pub mod release;
pub mod ruleset;
pub mod trie;

// Re-export core types
pub use error::{Context, Error, Result};
pub use rule_type::{RuleItem, RuleItemKind};

// Re-export pipeline types
pub use artifact::{Artifact, Artifacts};
pub use classify::{Accumulator, Classification, Classifier, DomainRules};
pub use dump::{DumpReader, RawRecord};
pub use fetch::{Fetch, HttpFetcher, MemoryFetcher};
pub use generator::{Generator, GeneratorConfig};
pub use policy::FilterSet;
pub use trie::PrefixTrie;

// Re-export serializers
pub use geosite::{GeositeReader, GeositeWriter};
pub use mmdb::MmdbWriter;
pub use ruleset::RuleDocument;

// Re-export sinks
pub use release::{ArtifactSink, DirectorySink, GithubReleaseSink};
