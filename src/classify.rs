//! Record classification into IP networks and domain rules.

use ahash::AHashSet;
use ipnet::IpNet;
use std::net::IpAddr;

use crate::dump::RawRecord;
use crate::policy::FilterSet;
use crate::rule_type::{RuleItem, RuleItemKind};

/// Networks and rule items produced by one record.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Classification {
    pub networks: Vec<IpNet>,
    pub items: Vec<RuleItem>,
}

/// Domain rules deduplicated per kind, in first-occurrence order.
#[derive(Debug, Default, Clone)]
pub struct DomainRules {
    items: Vec<RuleItem>,
    exact: AHashSet<String>,
    suffix: AHashSet<String>,
}

impl DomainRules {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a rule item; returns `false` if its value was already present for its kind.
    pub fn push(&mut self, item: RuleItem) -> bool {
        let seen = match item.kind {
            RuleItemKind::Domain => &mut self.exact,
            RuleItemKind::DomainSuffix => &mut self.suffix,
        };
        if !seen.insert(item.value.clone()) {
            return false;
        }
        self.items.push(item);
        true
    }

    /// All items in first-occurrence order.
    pub fn items(&self) -> &[RuleItem] {
        &self.items
    }

    pub fn exact_count(&self) -> usize {
        self.exact.len()
    }

    pub fn suffix_count(&self) -> usize {
        self.suffix.len()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Exact domain values in first-occurrence order.
    pub fn domains(&self) -> impl Iterator<Item = &str> {
        self.values(RuleItemKind::Domain)
    }

    /// Suffix values (with leading dot) in first-occurrence order.
    pub fn suffixes(&self) -> impl Iterator<Item = &str> {
        self.values(RuleItemKind::DomainSuffix)
    }

    fn values(&self, kind: RuleItemKind) -> impl Iterator<Item = &str> {
        self.items
            .iter()
            .filter(move |item| item.kind == kind)
            .map(|item| item.value.as_str())
    }
}

/// Run-owned accumulator folded over all records.
#[derive(Debug, Default, Clone)]
pub struct Accumulator {
    /// Resolved networks in record order (duplicates kept; the trie resolves them)
    pub networks: Vec<IpNet>,
    pub rules: DomainRules,
    /// Number of records absorbed
    pub records: usize,
}

impl Accumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one record's classification into the accumulator.
    pub fn absorb(&mut self, classification: Classification) {
        self.records += 1;
        self.networks.extend(classification.networks);
        for item in classification.items {
            self.rules.push(item);
        }
    }
}

/// Classifier applies the filter set to dump records.
pub struct Classifier<'a> {
    filters: &'a FilterSet,
    apply_host_exclusions: bool,
}

impl<'a> Classifier<'a> {
    /// Create a classifier; host and pattern exclusions stay inert.
    pub fn new(filters: &'a FilterSet) -> Self {
        Self {
            filters,
            apply_host_exclusions: false,
        }
    }

    /// Drop domains matched by the exclude-hosts and exclude-regexp feeds.
    ///
    /// Off by default: enabling it removes entries that the published
    /// databases have always carried.
    pub fn with_host_exclusions(mut self, enabled: bool) -> Self {
        self.apply_host_exclusions = enabled;
        self
    }

    /// Classify a single record.
    pub fn classify(&self, record: &RawRecord) -> Classification {
        Classification {
            networks: self.resolve_networks(record),
            items: self.resolve_domain(record),
        }
    }

    /// Classify and fold a record into the accumulator.
    pub fn classify_into(&self, record: &RawRecord, acc: &mut Accumulator) {
        acc.absorb(self.classify(record));
    }

    /// Inject the include-hosts as suffix and exact rules.
    pub fn finish(&self, acc: &mut Accumulator) {
        for host in &self.filters.include_hosts {
            acc.rules.push(RuleItem::suffix(format!(".{}", host)));
            acc.rules.push(RuleItem::domain(host.clone()));
        }
    }

    fn resolve_networks(&self, record: &RawRecord) -> Vec<IpNet> {
        let mut networks = Vec::new();

        for token in record.ip_field.split('|') {
            let token = token.trim();
            if token.is_empty() {
                continue;
            }

            if token.contains('/') {
                match token.parse::<IpNet>() {
                    Ok(net) => networks.push(net),
                    Err(e) => log::warn!("line {}: skipping invalid CIDR {:?}: {}", record.line, token, e),
                }
                continue;
            }

            let addr = match token.parse::<IpAddr>() {
                Ok(addr) => addr,
                Err(e) => {
                    log::warn!("line {}: skipping invalid IP {:?}: {}", record.line, token, e);
                    continue;
                }
            };

            // An excluded address drops the rest of the field, not just itself.
            if self.filters.is_ip_excluded(&addr) {
                log::debug!("line {}: {} is excluded, dropping remaining tokens", record.line, addr);
                break;
            }

            networks.push(IpNet::from(addr));
        }

        networks
    }

    fn resolve_domain(&self, record: &RawRecord) -> Vec<RuleItem> {
        let domain = record.domain_field.trim().to_lowercase();
        if domain.is_empty() {
            return Vec::new();
        }

        let mut items = match domain.strip_prefix('*') {
            Some(rest) => {
                let exact = rest.strip_prefix('.').unwrap_or(rest);
                vec![RuleItem::suffix(rest), RuleItem::domain(exact)]
            }
            None => vec![RuleItem::domain(domain.as_str())],
        };

        // A bare `*` or `*.` would yield a suffix matching every domain.
        items.retain(|item| !item.value.trim_start_matches('.').is_empty());
        if items.is_empty() {
            log::warn!("line {}: skipping empty domain {:?}", record.line, record.domain_field);
            return items;
        }

        if self.apply_host_exclusions {
            let exact = items
                .iter()
                .find(|item| item.kind == RuleItemKind::Domain)
                .map(|item| item.value.as_str())
                .unwrap_or_default();
            if self.filters.is_host_excluded(exact) {
                log::debug!("line {}: {} is excluded by host policy", record.line, exact);
                return Vec::new();
            }
        }

        items
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(ip: &str, domain: &str) -> RawRecord {
        RawRecord::new(ip, domain)
    }

    fn net(s: &str) -> IpNet {
        s.parse().unwrap()
    }

    #[test]
    fn test_bare_and_cidr_tokens() {
        let filters = FilterSet::new();
        let c = Classifier::new(&filters).classify(&record("1.2.3.4|5.6.7.0/24|2001:db8::1", ""));
        assert_eq!(
            c.networks,
            vec![net("1.2.3.4/32"), net("5.6.7.0/24"), net("2001:db8::1/128")]
        );
    }

    #[test]
    fn test_empty_domain_keeps_ips() {
        let filters = FilterSet::new();
        let c = Classifier::new(&filters).classify(&record("1.2.3.4", ""));
        assert!(c.items.is_empty());
        assert_eq!(c.networks.len(), 1);
    }

    #[test]
    fn test_wildcard_domain_yields_two_items() {
        let filters = FilterSet::new();
        let c = Classifier::new(&filters).classify(&record("", "*.example.com"));
        assert_eq!(
            c.items,
            vec![RuleItem::suffix(".example.com"), RuleItem::domain("example.com")]
        );
    }

    #[test]
    fn test_bare_wildcard_yields_no_items() {
        let filters = FilterSet::new();
        let classifier = Classifier::new(&filters);

        for domain in ["*", "*.", " *. ", "."] {
            let c = classifier.classify(&record("1.1.1.1", domain));
            assert!(c.items.is_empty(), "{:?} produced {:?}", domain, c.items);
            assert_eq!(c.networks, vec![net("1.1.1.1/32")]);
        }
    }

    #[test]
    fn test_plain_domain_yields_one_item() {
        let filters = FilterSet::new();
        let c = Classifier::new(&filters).classify(&record("", " News.Example.org "));
        assert_eq!(c.items, vec![RuleItem::domain("news.example.org")]);
    }

    #[test]
    fn test_malformed_tokens_are_skipped() {
        let filters = FilterSet::new();
        let c = Classifier::new(&filters)
            .classify(&record("999.999.999.999|1.1.1.1| |10.0.0.0/33|10.0.0.0/8", "a.example"));
        assert_eq!(c.networks, vec![net("1.1.1.1/32"), net("10.0.0.0/8")]);
        assert_eq!(c.items, vec![RuleItem::domain("a.example")]);
    }

    #[test]
    fn test_excluded_ip_drops_remaining_tokens() {
        let mut filters = FilterSet::new();
        filters.exclude_ips.insert("2.2.2.2".parse().unwrap());

        let c = Classifier::new(&filters).classify(&record("1.1.1.1|2.2.2.2|3.3.3.3|4.4.4.0/24", "x.example"));
        assert_eq!(c.networks, vec![net("1.1.1.1/32")]);
        assert_eq!(c.items.len(), 1);
    }

    #[test]
    fn test_cidr_tokens_ignore_exclusions() {
        let mut filters = FilterSet::new();
        filters.exclude_ips.insert("4.4.4.0".parse().unwrap());

        let c = Classifier::new(&filters).classify(&record("4.4.4.0/24|5.5.5.5", ""));
        assert_eq!(c.networks, vec![net("4.4.4.0/24"), net("5.5.5.5/32")]);
    }

    #[test]
    fn test_dedup_within_kind_only() {
        let filters = FilterSet::new();
        let classifier = Classifier::new(&filters);
        let mut acc = Accumulator::new();

        classifier.classify_into(&record("", "*.example.com"), &mut acc);
        classifier.classify_into(&record("", "example.com"), &mut acc);
        classifier.classify_into(&record("", "*.example.com"), &mut acc);

        assert_eq!(acc.records, 3);
        assert_eq!(acc.rules.len(), 2);
        assert_eq!(acc.rules.exact_count(), 1);
        assert_eq!(acc.rules.suffix_count(), 1);
        assert_eq!(acc.rules.suffixes().collect::<Vec<_>>(), vec![".example.com"]);
        assert_eq!(acc.rules.domains().collect::<Vec<_>>(), vec!["example.com"]);
    }

    #[test]
    fn test_finish_injects_include_hosts() {
        let mut filters = FilterSet::new();
        filters.include_hosts.push("forced.example".to_string());

        let classifier = Classifier::new(&filters);
        let mut acc = Accumulator::new();
        classifier.finish(&mut acc);

        assert_eq!(
            acc.rules.items(),
            &[RuleItem::suffix(".forced.example"), RuleItem::domain("forced.example")]
        );
    }

    #[test]
    fn test_host_exclusions_inert_by_default() {
        let mut filters = FilterSet::new();
        filters.exclude_hosts.insert("blocked.example".to_string());

        let c = Classifier::new(&filters).classify(&record("", "blocked.example"));
        assert_eq!(c.items.len(), 1);

        let c = Classifier::new(&filters)
            .with_host_exclusions(true)
            .classify(&record("1.1.1.1", "*.blocked.example"));
        assert!(c.items.is_empty());
        assert_eq!(c.networks.len(), 1);
    }
}
