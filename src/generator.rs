//! End-to-end pipeline: policy, dump, classification, trie, serialization.

use std::io::Read;

use crate::artifact::{Artifact, Artifacts};
use crate::classify::{Accumulator, Classifier};
use crate::dump::{DumpReader, DEFAULT_DUMP_URL};
use crate::fetch::Fetch;
use crate::geosite::GeositeWriter;
use crate::mmdb::MmdbWriter;
use crate::policy::{self, FilterSet, DEFAULT_POLICY_BASE_URL};
use crate::ruleset::RuleDocument;
use crate::trie::PrefixTrie;
use crate::{Context, Result};

/// Dataset identifier used as geosite code, IP database label and file stem.
pub const DEFAULT_DATASET: &str = "antizapret";

/// File name of the geosite artifact.
pub const GEOSITE_FILE: &str = "geosite.db";

/// File name of the IP database artifact.
pub const GEOIP_FILE: &str = "geoip.db";

/// Generator configuration.
#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    pub dump_url: String,
    pub policy_base_url: String,
    pub dataset: String,
    pub artifacts: Artifacts,
    /// Apply the exclude-hosts and exclude-regexp feeds to domain rules
    pub apply_host_exclusions: bool,
    /// Fixed IP database build time; `None` uses the current time
    pub build_epoch: Option<u64>,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            dump_url: DEFAULT_DUMP_URL.to_string(),
            policy_base_url: DEFAULT_POLICY_BASE_URL.to_string(),
            dataset: DEFAULT_DATASET.to_string(),
            artifacts: Artifacts::all(),
            apply_host_exclusions: false,
            build_epoch: None,
        }
    }
}

impl GeneratorConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_dump_url(mut self, url: &str) -> Self {
        self.dump_url = url.to_string();
        self
    }

    pub fn with_policy_base_url(mut self, url: &str) -> Self {
        self.policy_base_url = url.to_string();
        self
    }

    pub fn with_dataset(mut self, dataset: &str) -> Self {
        self.dataset = dataset.to_string();
        self
    }

    pub fn with_artifacts(mut self, artifacts: Artifacts) -> Self {
        self.artifacts = artifacts;
        self
    }

    pub fn with_host_exclusions(mut self, enabled: bool) -> Self {
        self.apply_host_exclusions = enabled;
        self
    }

    pub fn with_build_epoch(mut self, epoch: u64) -> Self {
        self.build_epoch = Some(epoch);
        self
    }

    /// File name of the rule-set JSON artifact.
    pub fn ruleset_json_file(&self) -> String {
        format!("{}.json", self.dataset)
    }

    /// File name of the compiled rule-set artifact.
    pub fn ruleset_binary_file(&self) -> String {
        format!("{}.azrs", self.dataset)
    }
}

/// Generator runs the pipeline against a fetcher.
pub struct Generator<F: Fetch> {
    fetcher: F,
    config: GeneratorConfig,
}

impl<F: Fetch> Generator<F> {
    pub fn new(fetcher: F, config: GeneratorConfig) -> Self {
        Self { fetcher, config }
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    /// Fetch the policy and the dump, then compile all selected artifacts.
    pub fn run(&self) -> Result<Vec<Artifact>> {
        let filters = self.load_policy()?;

        log::info!("Downloading dump from {}", self.config.dump_url);
        let dump = self.fetcher.fetch(&self.config.dump_url).stage("cannot fetch dump")?;

        self.compile(dump, &filters)
    }

    /// Like [`Generator::run`], but reads the dump from a local source.
    pub fn run_with_dump<R: Read>(&self, dump: R) -> Result<Vec<Artifact>> {
        let filters = self.load_policy()?;
        self.compile(dump, &filters)
    }

    /// Fetch the policy feeds.
    pub fn load_policy(&self) -> Result<FilterSet> {
        log::info!("Loading policy from {}", self.config.policy_base_url);
        policy::load(&self.fetcher, &self.config.policy_base_url).stage("cannot fetch policy")
    }

    /// Parse, classify and serialize a dump against an already loaded policy.
    ///
    /// Either every selected artifact is produced or an error is returned.
    pub fn compile<R: Read>(&self, dump: R, filters: &FilterSet) -> Result<Vec<Artifact>> {
        let classifier = Classifier::new(filters).with_host_exclusions(self.config.apply_host_exclusions);

        let mut acc = Accumulator::new();
        for record in DumpReader::new(dump) {
            let record = record.stage("cannot parse dump")?;
            classifier.classify_into(&record, &mut acc);
        }
        classifier.finish(&mut acc);

        let mut trie = PrefixTrie::new();
        trie.extend(acc.networks.iter().map(|net| (*net, self.config.dataset.clone())));

        log::info!(
            "Classified {} records: {} networks ({} distinct), {} domains, {} suffixes",
            acc.records,
            acc.networks.len(),
            trie.len(),
            acc.rules.exact_count(),
            acc.rules.suffix_count()
        );

        self.serialize(&acc, &trie)
    }

    fn serialize(&self, acc: &Accumulator, trie: &PrefixTrie<String>) -> Result<Vec<Artifact>> {
        let selected = self.config.artifacts;
        let dataset = self.config.dataset.as_str();
        let mut artifacts = Vec::new();

        if selected.contains(Artifacts::GEOSITE) {
            let mut writer = GeositeWriter::new();
            writer.add_items(dataset, acc.rules.items().iter().cloned());
            let data = writer.build().stage("cannot write geosite")?;
            artifacts.push(Artifact::new(Artifacts::GEOSITE, GEOSITE_FILE, data));
        }

        if selected.contains(Artifacts::GEOIP) {
            let mut writer = MmdbWriter::new(dataset);
            if let Some(epoch) = self.config.build_epoch {
                writer = writer.with_build_epoch(epoch);
            }
            let data = writer.write(trie).stage("cannot write geoip")?;
            artifacts.push(Artifact::new(Artifacts::GEOIP, GEOIP_FILE, data));
        }

        if selected.intersects(Artifacts::RULESET_JSON | Artifacts::RULESET_BINARY) {
            let document = RuleDocument::build(&acc.networks, &acc.rules);

            if selected.contains(Artifacts::RULESET_JSON) {
                let data = document.to_json().stage("cannot write rule-set")?;
                artifacts.push(Artifact::new(
                    Artifacts::RULESET_JSON,
                    self.config.ruleset_json_file(),
                    data,
                ));
            }
            if selected.contains(Artifacts::RULESET_BINARY) {
                let data = document.compile().stage("cannot compile rule-set")?;
                artifacts.push(Artifact::new(
                    Artifacts::RULESET_BINARY,
                    self.config.ruleset_binary_file(),
                    data,
                ));
            }
        }

        for artifact in &artifacts {
            log::debug!("Serialized {} ({} bytes)", artifact.name, artifact.data.len());
        }

        Ok(artifacts)
    }
}
