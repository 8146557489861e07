//! Policy feed loading.
//!
//! Four plain-text feeds published next to the antizapret PAC generator
//! configure which entries of the dump are excluded and which hosts are
//! always included:
//!
//! | file                            | content                        |
//! |---------------------------------|--------------------------------|
//! | `exclude-hosts-by-ips-dist.txt` | escaped IP anchors (`^1\.2\.3\.4;`) |
//! | `exclude-hosts-dist.txt`        | one host per line              |
//! | `exclude-regexp-dist.awk`       | awk patterns (`(/re/) {next}`)  |
//! | `include-hosts-dist.txt`        | one host per line              |

use ahash::AHashSet;
use regex::Regex;
use std::io::{BufRead, BufReader};
use std::net::IpAddr;

use crate::fetch::Fetch;
use crate::{Error, Result};

/// Upstream location of the policy feeds.
pub const DEFAULT_POLICY_BASE_URL: &str =
    "https://bitbucket.org/anticensority/antizapret-pac-generator-light/raw/master/config/";

pub const EXCLUDE_HOSTS_BY_IPS: &str = "exclude-hosts-by-ips-dist.txt";
pub const EXCLUDE_HOSTS: &str = "exclude-hosts-dist.txt";
pub const EXCLUDE_REGEXP: &str = "exclude-regexp-dist.awk";
pub const INCLUDE_HOSTS: &str = "include-hosts-dist.txt";

/// How the lines of a feed are interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedKind {
    Hosts,
    HostsByIps,
    Regexp,
}

/// One policy feed: file name, line format and direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PolicyFeed {
    pub file: &'static str,
    pub kind: FeedKind,
    pub exclude: bool,
}

/// The feeds every run loads, in load order.
pub const POLICY_FEEDS: [PolicyFeed; 4] = [
    PolicyFeed {
        file: EXCLUDE_HOSTS_BY_IPS,
        kind: FeedKind::HostsByIps,
        exclude: true,
    },
    PolicyFeed {
        file: EXCLUDE_HOSTS,
        kind: FeedKind::Hosts,
        exclude: true,
    },
    PolicyFeed {
        file: EXCLUDE_REGEXP,
        kind: FeedKind::Regexp,
        exclude: true,
    },
    PolicyFeed {
        file: INCLUDE_HOSTS,
        kind: FeedKind::Hosts,
        exclude: false,
    },
];

/// Include/exclude policy consumed read-only by the classifier.
#[derive(Debug, Default, Clone)]
pub struct FilterSet {
    /// Hosts excluded from the domain rules (inert unless host exclusions are enabled)
    pub exclude_hosts: AHashSet<String>,
    /// Addresses that cut off the rest of a record's IP field
    pub exclude_ips: AHashSet<IpAddr>,
    /// Patterns excluded from the domain rules (inert unless host exclusions are enabled)
    pub exclude_regexps: Vec<Regex>,
    /// Hosts always emitted as exact and suffix rules, in feed order
    pub include_hosts: Vec<String>,
}

impl FilterSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check whether a domain is excluded by host or pattern.
    pub fn is_host_excluded(&self, domain: &str) -> bool {
        self.exclude_hosts.contains(domain) || self.exclude_regexps.iter().any(|rx| rx.is_match(domain))
    }

    /// Check whether an address is in the exclude-IP set.
    pub fn is_ip_excluded(&self, addr: &IpAddr) -> bool {
        self.exclude_ips.contains(addr)
    }

    /// Add the lines of one feed.
    ///
    /// Unparsable addresses and patterns are logged and skipped; a read
    /// failure aborts the feed.
    pub fn load_feed<R: BufRead>(&mut self, feed: PolicyFeed, reader: R) -> Result<()> {
        for line in reader.lines() {
            let line = line?;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            match (feed.kind, feed.exclude) {
                // Hosts are compared against lowercased dump domains.
                (FeedKind::Hosts, true) => {
                    self.exclude_hosts.insert(line.to_lowercase());
                }
                (FeedKind::Hosts, false) => {
                    let host = line.to_lowercase();
                    if !self.include_hosts.contains(&host) {
                        self.include_hosts.push(host);
                    }
                }
                (FeedKind::HostsByIps, true) => match parse_host_ip(line) {
                    Some(addr) => {
                        self.exclude_ips.insert(addr);
                    }
                    None => log::warn!("{}: skipping invalid IP line {:?}", feed.file, line),
                },
                (FeedKind::Regexp, true) => match parse_regexp(line) {
                    Ok(rx) => self.exclude_regexps.push(rx),
                    Err(e) => log::warn!("{}: skipping invalid pattern {:?}: {}", feed.file, line, e),
                },
                // Include feeds only carry hosts.
                (FeedKind::HostsByIps, false) | (FeedKind::Regexp, false) => {}
            }
        }

        Ok(())
    }
}

/// Strip the escaping of an exclude-hosts-by-ips line and parse the address.
///
/// `^104\.16\.0\.1;` becomes `104.16.0.1`.
pub fn parse_host_ip(line: &str) -> Option<IpAddr> {
    let cleaned = line.replace('\\', "").replacen('^', "", 1).replacen(';', "", 1);
    cleaned.trim().parse().ok()
}

/// Unwrap an awk exclusion line and compile the pattern.
///
/// `(/\.example\.com$/) {next}` becomes `\.example\.com$`.
pub fn parse_regexp(line: &str) -> std::result::Result<Regex, regex::Error> {
    let pattern = line.replacen("/) {next}", "", 1).replacen("(/", "", 1);
    Regex::new(&pattern)
}

/// Fetch and parse all policy feeds below `base_url`.
///
/// A fetch failure of any single feed fails the whole load.
pub fn load<F: Fetch + ?Sized>(fetcher: &F, base_url: &str) -> Result<FilterSet> {
    let mut filters = FilterSet::new();

    for feed in POLICY_FEEDS {
        let url = join_url(base_url, feed.file);
        let body = fetcher.fetch(&url)?;
        filters.load_feed(feed, BufReader::new(body)).map_err(|e| match e {
            Error::Io(source) => Error::Read {
                url: url.clone(),
                source,
            },
            other => other,
        })?;
        log::debug!("Loaded policy feed {}", url);
    }

    log::info!(
        "Loaded policy: {} excluded hosts, {} excluded IPs, {} excluded patterns, {} included hosts",
        filters.exclude_hosts.len(),
        filters.exclude_ips.len(),
        filters.exclude_regexps.len(),
        filters.include_hosts.len()
    );

    Ok(filters)
}

/// Join a feed file name onto a base URL.
pub fn join_url(base: &str, file: &str) -> String {
    if base.ends_with('/') {
        format!("{}{}", base, file)
    } else {
        format!("{}/{}", base, file)
    }
}
