//! Portable rule-set document.
//!
//! The same content is published twice: as a JSON source document and as a
//! compiled binary (see [`binary`]). Both decode to an identical
//! [`RuleDocument`].

pub mod binary;

use ipnet::IpNet;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::classify::DomainRules;
use crate::Result;

/// Current rule document version.
pub const DOCUMENT_VERSION: u8 = 1;

/// Top-level rule-set document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleDocument {
    pub version: u8,
    pub rules: Vec<Rule>,
}

/// A rule inside the document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Rule {
    Default(DefaultRule),
}

/// Default rule: matches if any of its lists match.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefaultRule {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ip_cidr: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub domain: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub domain_suffix: Vec<String>,
}

impl DefaultRule {
    /// Build a rule from deduplicated sets; list order is lexicographic.
    pub fn from_sets(
        ip_cidr: BTreeSet<String>,
        domain: BTreeSet<String>,
        domain_suffix: BTreeSet<String>,
    ) -> Self {
        Self {
            ip_cidr: ip_cidr.into_iter().collect(),
            domain: domain.into_iter().collect(),
            domain_suffix: domain_suffix.into_iter().collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.ip_cidr.is_empty() && self.domain.is_empty() && self.domain_suffix.is_empty()
    }
}

impl RuleDocument {
    /// Build the document from the classified networks and domain rules.
    ///
    /// Host bits are cleared, so `5.6.7.99/24` and `5.6.7.0/24` collapse
    /// into one entry the same way they share one trie node.
    pub fn build<'a, I>(networks: I, rules: &DomainRules) -> Self
    where
        I: IntoIterator<Item = &'a IpNet>,
    {
        let ip_cidr: BTreeSet<String> = networks
            .into_iter()
            .map(|net| net.trunc().to_string())
            .collect();
        let domain: BTreeSet<String> = rules.domains().map(str::to_string).collect();
        let domain_suffix: BTreeSet<String> = rules.suffixes().map(str::to_string).collect();

        Self::with_rule(DefaultRule::from_sets(ip_cidr, domain, domain_suffix))
    }

    /// Document holding a single default rule.
    pub fn with_rule(rule: DefaultRule) -> Self {
        Self {
            version: DOCUMENT_VERSION,
            rules: vec![Rule::Default(rule)],
        }
    }

    /// Pretty-printed JSON source form.
    pub fn to_json(&self) -> Result<Vec<u8>> {
        let mut data = serde_json::to_vec_pretty(self)?;
        data.push(b'\n');
        Ok(data)
    }

    pub fn from_json(data: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(data)?)
    }

    /// Compiled binary form.
    pub fn compile(&self) -> Result<Vec<u8>> {
        binary::encode(self)
    }

    pub fn decompile(data: &[u8]) -> Result<Self> {
        binary::decode(data)
    }

    /// Union of all CIDR strings across rules.
    pub fn ip_cidr_set(&self) -> BTreeSet<&str> {
        self.default_rules().flat_map(|r| r.ip_cidr.iter().map(String::as_str)).collect()
    }

    /// Union of all exact domains across rules.
    pub fn domain_set(&self) -> BTreeSet<&str> {
        self.default_rules().flat_map(|r| r.domain.iter().map(String::as_str)).collect()
    }

    /// Union of all domain suffixes across rules.
    pub fn domain_suffix_set(&self) -> BTreeSet<&str> {
        self.default_rules()
            .flat_map(|r| r.domain_suffix.iter().map(String::as_str))
            .collect()
    }

    fn default_rules(&self) -> impl Iterator<Item = &DefaultRule> {
        self.rules.iter().map(|rule| match rule {
            Rule::Default(default) => default,
        })
    }
}
