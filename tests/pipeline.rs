//! End-to-end tests for the generator pipeline.

use antizapret_rules::policy::{join_url, EXCLUDE_HOSTS, EXCLUDE_HOSTS_BY_IPS, EXCLUDE_REGEXP, INCLUDE_HOSTS};
use antizapret_rules::{
    Artifact, ArtifactSink, Artifacts, DirectorySink, Error, GeneratorConfig, Generator, GeositeReader,
    MemoryFetcher, RuleDocument, RuleItem,
};
use std::collections::BTreeSet;
use std::net::IpAddr;

const POLICY: &str = "mem://policy/";
const DUMP: &str = "mem://dump.csv";

#[derive(Default)]
struct Policy<'a> {
    exclude_ips: &'a str,
    exclude_hosts: &'a str,
    exclude_regexp: &'a str,
    include_hosts: &'a str,
}

fn fetcher(policy: Policy<'_>, dump: &[u8]) -> MemoryFetcher {
    MemoryFetcher::new()
        .with(join_url(POLICY, EXCLUDE_HOSTS_BY_IPS), policy.exclude_ips)
        .with(join_url(POLICY, EXCLUDE_HOSTS), policy.exclude_hosts)
        .with(join_url(POLICY, EXCLUDE_REGEXP), policy.exclude_regexp)
        .with(join_url(POLICY, INCLUDE_HOSTS), policy.include_hosts)
        .with(DUMP, dump.to_vec())
}

fn config() -> GeneratorConfig {
    GeneratorConfig::new()
        .with_policy_base_url(POLICY)
        .with_dump_url(DUMP)
        .with_build_epoch(1_700_000_000)
}

fn run(policy: Policy<'_>, dump: &[u8]) -> Vec<Artifact> {
    Generator::new(fetcher(policy, dump), config()).run().unwrap()
}

fn artifact<'a>(artifacts: &'a [Artifact], name: &str) -> &'a Artifact {
    artifacts
        .iter()
        .find(|a| a.name == name)
        .unwrap_or_else(|| panic!("missing artifact {}", name))
}

fn document(artifacts: &[Artifact]) -> RuleDocument {
    RuleDocument::from_json(&artifact(artifacts, "antizapret.json").data).unwrap()
}

fn set(values: &[&'static str]) -> BTreeSet<&'static str> {
    values.iter().copied().collect()
}

#[test]
fn test_two_line_dump() {
    let artifacts = run(
        Policy::default(),
        b"Updated: 2024-05-01 12:00:00 +0000\n1.2.3.4|5.6.7.0/24;*.example.com;ignored\n",
    );
    assert_eq!(artifacts.len(), 4);

    let doc = document(&artifacts);
    assert_eq!(doc.ip_cidr_set(), set(&["1.2.3.4/32", "5.6.7.0/24"]));
    assert_eq!(doc.domain_set(), set(&["example.com"]));
    assert_eq!(doc.domain_suffix_set(), set(&[".example.com"]));
}

#[test]
fn test_compiled_ruleset_matches_json() {
    let artifacts = run(
        Policy {
            include_hosts: "rutracker.org\n",
            ..Default::default()
        },
        b"h\n1.2.3.4|2001:db8::/32;*.example.com\n10.0.0.0/8;plain.example\n;only-domain.example\n",
    );

    let json = document(&artifacts);
    let compiled = RuleDocument::decompile(&artifact(&artifacts, "antizapret.azrs").data).unwrap();

    assert_eq!(compiled.ip_cidr_set(), json.ip_cidr_set());
    assert_eq!(compiled.domain_set(), json.domain_set());
    assert_eq!(compiled.domain_suffix_set(), json.domain_suffix_set());
    assert_eq!(json.ip_cidr_set().len(), 3);
}

#[test]
fn test_include_hosts_are_injected() {
    let artifacts = run(
        Policy {
            include_hosts: "rutracker.org\n\nlinkedin.com\nrutracker.org\n",
            ..Default::default()
        },
        b"h\n1.2.3.4;example.com\n",
    );

    let doc = document(&artifacts);
    assert_eq!(doc.domain_set(), set(&["example.com", "linkedin.com", "rutracker.org"]));
    assert_eq!(doc.domain_suffix_set(), set(&[".linkedin.com", ".rutracker.org"]));

    let geosite = GeositeReader::from_bytes(&artifact(&artifacts, "geosite.db").data).unwrap();
    let items = geosite.items("antizapret").unwrap();
    assert_eq!(
        items,
        &[
            RuleItem::domain("example.com"),
            RuleItem::suffix(".rutracker.org"),
            RuleItem::domain("rutracker.org"),
            RuleItem::suffix(".linkedin.com"),
            RuleItem::domain("linkedin.com"),
        ]
    );
}

#[test]
fn test_excluded_ip_drops_rest_of_row() {
    let artifacts = run(
        Policy {
            exclude_ips: "^1\\.1\\.1\\.1;\n",
            ..Default::default()
        },
        b"h\n2.2.2.2|1.1.1.1|3.3.3.3;x.example\n3.3.3.3|4.4.4.4;y.example\n",
    );

    let doc = document(&artifacts);
    assert_eq!(doc.ip_cidr_set(), set(&["2.2.2.2/32", "3.3.3.3/32", "4.4.4.4/32"]));
    assert_eq!(doc.domain_set(), set(&["x.example", "y.example"]));
}

#[test]
fn test_malformed_token_is_skipped() {
    let artifacts = run(Policy::default(), b"h\n999.999.999.999|4.4.4.4|1.2.3.0/99;kept.example\n");

    let doc = document(&artifacts);
    assert_eq!(doc.ip_cidr_set(), set(&["4.4.4.4/32"]));
    assert_eq!(doc.domain_set(), set(&["kept.example"]));
}

#[test]
fn test_geoip_lookup() {
    let artifacts = run(Policy::default(), b"h\n1.2.3.4|5.6.7.0/24|2001:db8::/32;a.example\n");
    let data = artifact(&artifacts, "geoip.db").data.clone();
    let reader = maxminddb::Reader::from_source(data).unwrap();

    let found = |ip: &str| reader.lookup::<String>(ip.parse::<IpAddr>().unwrap()).ok();
    assert_eq!(found("1.2.3.4").as_deref(), Some("antizapret"));
    assert_eq!(found("5.6.7.99").as_deref(), Some("antizapret"));
    assert_eq!(found("2001:db8:1::1").as_deref(), Some("antizapret"));
    assert_eq!(found("1.2.3.5"), None);
    assert_eq!(found("8.8.8.8"), None);

    assert_eq!(reader.metadata.database_type, "sing-geoip");
    assert_eq!(reader.metadata.languages, vec!["antizapret".to_string()]);
    assert_eq!(reader.metadata.build_epoch, 1_700_000_000);
}

#[test]
fn test_windows_1251_domain() {
    let (encoded, _, had_errors) = encoding_rs::WINDOWS_1251.encode("h\n1.2.3.4;*.пример.рф\n");
    assert!(!had_errors);

    let artifacts = run(Policy::default(), &encoded);
    let doc = document(&artifacts);
    assert_eq!(doc.domain_set(), set(&["пример.рф"]));
    assert_eq!(doc.domain_suffix_set(), set(&[".пример.рф"]));
}

#[test]
fn test_host_exclusions_are_opt_in() {
    let policy = || Policy {
        exclude_hosts: "blocked.example\n",
        exclude_regexp: "(/\\.ads\\.example$/) {next}\n",
        ..Default::default()
    };
    let dump: &[u8] = b"h\n1.2.3.4;blocked.example\n;x.ads.example\n;kept.example\n";

    let doc = document(&run(policy(), dump));
    assert_eq!(doc.domain_set().len(), 3);

    let generator = Generator::new(fetcher(policy(), dump), config().with_host_exclusions(true));
    let doc = document(&generator.run().unwrap());
    assert_eq!(doc.domain_set(), set(&["kept.example"]));
    assert_eq!(doc.ip_cidr_set(), set(&["1.2.3.4/32"]));
}

#[test]
fn test_custom_dataset_label() {
    let generator = Generator::new(
        fetcher(Policy::default(), b"h\n10.0.0.0/8;a.example\n"),
        config().with_dataset("custom").with_artifacts(Artifacts::GEOIP),
    );
    let artifacts = generator.run().unwrap();
    assert_eq!(artifacts.len(), 1);

    let reader = maxminddb::Reader::from_source(artifacts[0].data.clone()).unwrap();
    let label: String = reader.lookup("10.20.30.40".parse::<IpAddr>().unwrap()).unwrap();
    assert_eq!(label, "custom");
}

#[test]
fn test_structural_error_aborts_run() {
    let generator = Generator::new(fetcher(Policy::default(), b"h\n1.2.3.4;a.example\nbroken\n"), config());
    match generator.run() {
        Err(Error::Stage { stage, source }) => {
            assert_eq!(stage, "cannot parse dump");
            assert!(matches!(*source, Error::MalformedRecord { line: 3, fields: 1 }));
        }
        other => panic!("expected a parse failure, got {:?}", other.map(|a| a.len())),
    }
}

#[test]
fn test_directory_sink_end_to_end() {
    let artifacts = run(Policy::default(), b"h\n1.2.3.4;example.com\n");
    let dir = tempfile::tempdir().unwrap();
    DirectorySink::new(dir.path()).publish(&artifacts).unwrap();

    for name in ["geosite.db", "geoip.db", "antizapret.json", "antizapret.azrs"] {
        let data = std::fs::read(dir.path().join(name)).unwrap();
        assert_eq!(data, artifact(&artifacts, name).data);

        let sidecar = std::fs::read_to_string(dir.path().join(format!("{}.sha256sum", name))).unwrap();
        assert_eq!(sidecar, artifact(&artifacts, name).sidecar());
        assert!(sidecar.ends_with(&format!("  {}\n", name)));
    }
}

#[test]
fn test_networks_with_host_bits_collapse() {
    let artifacts = run(Policy::default(), b"h\n5.6.7.0/24;a.example\n5.6.7.99/24;b.example\n");

    let doc = document(&artifacts);
    assert_eq!(doc.ip_cidr_set(), set(&["5.6.7.0/24"]));

    let compiled = RuleDocument::decompile(&artifact(&artifacts, "antizapret.azrs").data).unwrap();
    assert_eq!(compiled.ip_cidr_set(), set(&["5.6.7.0/24"]));
}

#[test]
fn test_include_hosts_are_lowercased() {
    let artifacts = run(
        Policy {
            include_hosts: "RuTracker.org\n",
            ..Default::default()
        },
        b"h\n1.1.1.1;rutracker.org\n",
    );

    let doc = document(&artifacts);
    assert_eq!(doc.domain_set(), set(&["rutracker.org"]));
    assert_eq!(doc.domain_suffix_set(), set(&[".rutracker.org"]));
}

#[test]
fn test_bare_wildcard_row_adds_no_domain_rules() {
    let artifacts = run(Policy::default(), b"h\n1.1.1.1;*\n2.2.2.2;*.\n;kept.example\n");

    let doc = document(&artifacts);
    assert_eq!(doc.domain_set(), set(&["kept.example"]));
    assert!(doc.domain_suffix_set().is_empty());
    assert_eq!(doc.ip_cidr_set(), set(&["1.1.1.1/32", "2.2.2.2/32"]));

    let geosite = GeositeReader::from_bytes(&artifact(&artifacts, "geosite.db").data).unwrap();
    assert_eq!(geosite.items("antizapret").unwrap(), &[RuleItem::domain("kept.example")]);
}
