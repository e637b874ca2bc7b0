//! portalloc entry point.
//!
//! Restores the cluster port allocator from a state file and runs one
//! request against it.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use netalloc_cli::{load_config, load_spec, ClusterState, Session};
use netalloc_types::Protocol;

/// Cluster ingress port allocator tool
#[derive(Parser, Debug)]
#[command(name = "portalloc")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Cluster state file (JSON)
    #[arg(short = 's', long, default_value = "portalloc-state.json")]
    state: PathBuf,

    /// Allocator configuration file (YAML)
    #[arg(short = 'c', long)]
    config: Option<PathBuf>,

    /// Log filter (trace, debug, info, warn, error), overridden by RUST_LOG
    #[arg(short = 'l', long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print every reserved published port and dynamic range usage
    List {
        /// Only show ports of this protocol (tcp, udp, sctp)
        #[arg(short = 'p', long)]
        protocol: Option<Protocol>,
    },

    /// Propose published ports for a service
    Allocate {
        /// Service name
        service: String,

        /// Endpoint spec file (JSON, or YAML by extension)
        #[arg(long)]
        spec: PathBuf,

        /// Apply the proposal and write the state file
        #[arg(long)]
        commit: bool,
    },

    /// Propose releasing every published port of a service
    Deallocate {
        /// Service name
        service: String,

        /// Apply the proposal and write the state file
        #[arg(long)]
        commit: bool,
    },

    /// Report whether a service already matches a spec
    Check {
        /// Service name
        service: String,

        /// Endpoint spec file (JSON, or YAML by extension)
        #[arg(long)]
        spec: PathBuf,
    },
}

fn run(args: Args) -> Result<()> {
    let config = load_config(args.config.as_deref())?;
    let state = ClusterState::load(&args.state)?;
    let mut session = Session::open(state, config)?;

    match args.command {
        Command::List { protocol } => {
            for reserved in session.list(protocol) {
                println!(
                    "{}\t{}\t{}",
                    reserved.key,
                    reserved.service.as_deref().unwrap_or("-"),
                    reserved.origin
                );
            }
            let protocols = match protocol {
                Some(p) => vec![p],
                None => Protocol::ALL.to_vec(),
            };
            for protocol in protocols {
                let usage = session.dynamic_usage(protocol);
                println!(
                    "# dynamic {}: {}/{} in use",
                    usage.protocol, usage.used, usage.capacity
                );
            }
        }
        Command::Allocate {
            service,
            spec,
            commit,
        } => {
            let spec = load_spec(&spec)?;
            let ports = session.allocate(&service, spec, commit)?;
            let json =
                serde_json::to_string_pretty(&ports).context("Failed to serialize ports")?;
            println!("{}", json);
        }
        Command::Deallocate { service, commit } => {
            for key in session.deallocate(&service, commit)? {
                println!("{}", key);
            }
        }
        Command::Check { service, spec } => {
            let spec = load_spec(&spec)?;
            println!("{}", session.check(&service, &spec));
        }
    }

    if session.is_dirty() {
        session.state().save(&args.state)?;
        info!("State written to {:?}", args.state);
    }
    Ok(())
}

/// Initialize tracing/logging. Logs go to stderr so stdout stays parseable.
fn init_logging(log_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

fn main() -> ExitCode {
    let args = Args::parse();

    init_logging(&args.log_level);

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("portalloc error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
