//! antizapret-gen: CLI tool for compiling the antizapret blocklist into routing databases.

use antizapret_rules::dump::DEFAULT_DUMP_URL;
use antizapret_rules::policy::DEFAULT_POLICY_BASE_URL;
use antizapret_rules::{
    Artifact, ArtifactSink, Artifacts, DirectorySink, Generator, GeneratorConfig, GithubReleaseSink,
    HttpFetcher,
};
use clap::{Args, Parser, Subcommand};
use std::fs;
use std::net::IpAddr;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "antizapret-gen")]
#[command(version)]
#[command(about = "Compile the antizapret blocklist into geosite, geoip and rule-set databases", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate databases into a local directory
    Generate {
        /// Output directory
        #[arg(short, long, default_value = "output")]
        output_dir: PathBuf,

        /// Read the dump from a local file instead of downloading it
        #[arg(long)]
        dump_file: Option<PathBuf>,

        #[command(flatten)]
        source: SourceArgs,
    },

    /// Generate databases and publish them as a GitHub release
    Release {
        /// Personal access token used to create the release and upload assets
        #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
        token: Option<String>,

        /// Repository owner
        #[arg(long)]
        owner: String,

        /// Repository name
        #[arg(long)]
        repo: String,

        #[command(flatten)]
        source: SourceArgs,
    },

    /// Look up addresses in a generated IP database
    Lookup {
        /// Path to geoip.db
        #[arg(short, long, default_value = "output/geoip.db")]
        database: PathBuf,

        /// Addresses to look up
        #[arg(required = true)]
        ips: Vec<IpAddr>,
    },
}

#[derive(Args)]
struct SourceArgs {
    /// Dump URL
    #[arg(long, default_value = DEFAULT_DUMP_URL)]
    dump_url: String,

    /// Base URL of the policy feeds
    #[arg(long, default_value = DEFAULT_POLICY_BASE_URL)]
    policy_url: String,

    /// Comma-separated artifacts: geosite, geoip, json, azrs or all
    #[arg(short, long, default_value = "all")]
    artifacts: String,

    /// Drop domains matched by the exclude-hosts and exclude-regexp feeds
    #[arg(long)]
    apply_host_exclusions: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

impl SourceArgs {
    fn config(&self) -> antizapret_rules::Result<GeneratorConfig> {
        Ok(GeneratorConfig::new()
            .with_dump_url(&self.dump_url)
            .with_policy_base_url(&self.policy_url)
            .with_artifacts(Artifacts::parse(&self.artifacts)?)
            .with_host_exclusions(self.apply_host_exclusions))
    }
}

fn main() {
    let cli = Cli::parse();

    let verbose = match &cli.command {
        Commands::Generate { source, .. } | Commands::Release { source, .. } => source.verbose,
        Commands::Lookup { .. } => false,
    };
    let default_filter = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter)).init();

    let result = match cli.command {
        Commands::Generate {
            output_dir,
            dump_file,
            source,
        } => generate(&output_dir, dump_file.as_deref(), &source),
        Commands::Release {
            token,
            owner,
            repo,
            source,
        } => release(token, &owner, &repo, &source),
        Commands::Lookup { database, ips } => lookup(&database, &ips),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn build(dump_file: Option<&Path>, source: &SourceArgs) -> Result<Vec<Artifact>, Box<dyn std::error::Error>> {
    let generator = Generator::new(HttpFetcher::new()?, source.config()?);

    let artifacts = match dump_file {
        Some(path) => {
            log::info!("Reading dump from {:?}", path);
            generator.run_with_dump(fs::File::open(path)?)?
        }
        None => generator.run()?,
    };
    Ok(artifacts)
}

fn generate(
    output_dir: &Path,
    dump_file: Option<&Path>,
    source: &SourceArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    let artifacts = build(dump_file, source)?;

    DirectorySink::new(output_dir).publish(&artifacts)?;

    println!("Generated {} artifacts in {:?}", artifacts.len(), output_dir);
    Ok(())
}

fn release(
    token: Option<String>,
    owner: &str,
    repo: &str,
    source: &SourceArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    // Fail on missing credentials before downloading anything.
    let mut sink = GithubReleaseSink::new(token, owner, repo)?;

    let artifacts = build(None, source)?;
    sink.publish(&artifacts)?;

    println!("Published {} artifacts to {}/{}", artifacts.len(), owner, repo);
    Ok(())
}

fn lookup(database: &Path, ips: &[IpAddr]) -> Result<(), Box<dyn std::error::Error>> {
    let reader = maxminddb::Reader::open_readfile(database)?;

    for ip in ips {
        match reader.lookup::<String>(*ip) {
            Ok(label) => println!("{}\t{}", ip, label),
            Err(maxminddb::MaxMindDBError::AddressNotFoundError(_)) => println!("{}\t-", ip),
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}
