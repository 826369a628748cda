use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};
use gnames_core::{SearchConfig, StructureKind, load_config};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

mod commands;
mod output;
mod retry;
mod shutdown;

use commands::{SearchOptions, Target};
use retry::RetryPolicy;

/// Read from the working directory when `--config` is not given
const DEFAULT_CONFIG: &str = "gnames.json";

#[derive(Parser)]
#[command(name = "gnames", version)]
#[command(about = "Locate the global name table of an Unreal Engine game")]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Search configuration (JSON), defaults to ./gnames.json when present
    #[arg(short, long, global = true, env = "GNAMES_CONFIG")]
    config: Option<PathBuf>,

    /// Override the per-strategy occurrence ceiling
    #[arg(long, global = true)]
    max_occurrences: Option<usize>,

    /// Strategies to run, in order (name-pool, name-array)
    #[arg(long, global = true, value_delimiter = ',')]
    strategy: Vec<StructureKind>,

    /// Print the report as JSON instead of a summary
    #[arg(long, global = true)]
    json: bool,

    /// Also write the JSON report to this file
    #[arg(short, long, global = true)]
    output: Option<PathBuf>,

    /// Number of names to decode from a located table
    #[arg(long, global = true, default_value_t = 8)]
    preview: usize,

    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Search the main module of a running process
    Find {
        /// Executable name, e.g. Game-Win64-Shipping.exe
        #[arg(short, long, conflicts_with = "pid")]
        name: Option<String>,

        /// Process ID
        #[arg(short, long)]
        pid: Option<u32>,

        /// Repeat a failed search this many times
        #[arg(long, default_value_t = 0)]
        retries: u32,

        /// Seconds between attempts
        #[arg(long, default_value_t = 5)]
        interval: u64,
    },
    /// Search a module image dumped to disk
    Image {
        path: PathBuf,

        /// Address the image was dumped from (hex)
        #[arg(long, default_value = "0x140000000")]
        base: String,
    },
    /// Dump process memory in hexdump format
    Hexdump {
        /// Start address (hex)
        address: String,

        /// Number of bytes
        #[arg(default_value_t = 256)]
        size: usize,

        #[arg(short, long, conflicts_with = "pid")]
        name: Option<String>,

        #[arg(short, long)]
        pid: Option<u32>,

        /// Show the ASCII column
        #[arg(long)]
        ascii: bool,
    },
}

fn main() -> Result<ExitCode> {
    let args = Args::parse();

    let level = if args.verbose { "gnames=debug" } else { "gnames=info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(level.parse()?))
        .with_writer(std::io::stderr)
        .init();

    let found = match args.command {
        Command::Find {
            ref name,
            pid,
            retries,
            interval,
        } => {
            let target = Target::from_args(name.as_deref(), pid)?;
            let policy = RetryPolicy {
                retries,
                interval: Duration::from_secs(interval),
            };
            commands::find::run(&target, &policy, &search_options(&args)?)?
        }
        Command::Image { ref path, ref base } => {
            commands::image::run(path, base, &search_options(&args)?)?
        }
        Command::Hexdump {
            ref address,
            size,
            ref name,
            pid,
            ascii,
        } => {
            let target = Target::from_args(name.as_deref(), pid)?;
            commands::hexdump::run(address, size, ascii, &target)?;
            true
        }
    };

    Ok(if found {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn search_options(args: &Args) -> Result<SearchOptions> {
    let mut config = match &args.config {
        Some(path) => {
            let config = load_config(path)?;
            info!("Loaded config from {}", path.display());
            config
        }
        None => match load_config(DEFAULT_CONFIG) {
            Ok(config) => {
                info!("Loaded config from {}", DEFAULT_CONFIG);
                config
            }
            Err(e) if e.is_not_found() => SearchConfig::default(),
            Err(e) => {
                warn!("Ignoring {}: {}", DEFAULT_CONFIG, e);
                SearchConfig::default()
            }
        },
    };
    if let Some(max) = args.max_occurrences {
        config.limits.max_occurrences = max;
    }
    config.validate()?;
    debug!("Search limits: {:?}", config.limits);

    Ok(SearchOptions {
        config,
        strategies: args.strategy.clone(),
        json: args.json,
        output: args.output.clone(),
        preview: args.preview,
    })
}
