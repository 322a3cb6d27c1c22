//! ordering-ack entry point.
//!
//! Runs the gRIBI ordering and acknowledgment cases against the simulated
//! testbed and exits non-zero when any case fails.

use anyhow::Context;
use clap::{Parser, ValueEnum};
use feature_profile::{bundled, ProfileRegistry};
use gribi_common::Persistence;
use log::{error, info};
use ordering_ack::{Suite, SuiteConfig, ALL_PERSISTENCE};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum PersistenceArg {
    Preserve,
    Delete,
    Both,
}

impl PersistenceArg {
    fn modes(self) -> Vec<Persistence> {
        match self {
            PersistenceArg::Preserve => vec![Persistence::Preserve],
            PersistenceArg::Delete => vec![Persistence::Delete],
            PersistenceArg::Both => ALL_PERSISTENCE.to_vec(),
        }
    }
}

/// gRIBI operation ordering and acknowledgment conformance suite
#[derive(Parser, Debug)]
#[command(name = "ordering-ack")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Suite configuration file (TOML)
    #[arg(short = 'c', long, default_value = "ordering-ack.toml")]
    config: PathBuf,

    /// Persistence modes to run
    #[arg(short = 'p', long, value_enum, default_value = "both")]
    persistence: PersistenceArg,

    /// Directory of feature profiles to check against the DUT
    #[arg(long)]
    profile_dir: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'l', long, default_value = "info")]
    log_level: String,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,
}

async fn run(args: &Args) -> anyhow::Result<bool> {
    let config = SuiteConfig::load_or_default(&args.config)
        .with_context(|| format!("loading {}", args.config.display()))?;
    info!("Deviations: {:?}", config.deviations);

    let mut suite = Suite::new(config).context("setting up the testbed")?;

    let registry = match args.profile_dir {
        Some(ref dir) => ProfileRegistry::load_dir(dir)
            .with_context(|| format!("loading profiles from {}", dir.display()))?,
        None => bundled::registry().context("loading bundled profiles")?,
    };
    let profiles = suite.check_profiles(&registry)?;

    let mut report = suite.run(&args.persistence.modes()).await;
    report.profiles = profiles;

    if args.json {
        println!("{}", report.to_json()?);
    } else {
        println!("{}", report);
    }
    Ok(report.is_passed())
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&args.log_level))
        .init();

    info!("Starting ordering-ack");
    match run(&args).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => {
            error!("ordering-ack: one or more cases failed");
            ExitCode::FAILURE
        }
        Err(e) => {
            error!("ordering-ack: {:#}", e);
            ExitCode::from(2)
        }
    }
}
