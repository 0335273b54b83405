//! Command line front end for the aero telemetry link.
//!
//! Subcommands:
//! - `registry`: print the signature table
//! - `encode`: build a frame from a YAML or JSON payload list and print it as hex
//! - `decode`: validate and parse a hex frame, print it as JSON
//! - `monitor`: run a link session over a file, stdin or TCP stream

use std::path::PathBuf;

use aero_link::LinkConfig;
use aero_protocol::Endpoint;
use clap::{Parser, Subcommand};
use tracing::level_filters::LevelFilter;

mod commands;
mod error;

pub use commands::{
    decode_frame, encode_frame, load_payloads, monitor, parse_payloads, registry_table,
    DecodeReport, PayloadFormat, ReadOnly, RegistryRow,
};
pub use error::{CliError, CliResult};

#[derive(Parser, Debug)]
#[command(name = "aero", version, about = "Aero telemetry link tools", long_about = None)]
pub struct Cli {
    /// Link config file (YAML)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Override the payload capacity from the config
    #[arg(long, global = true)]
    pub capacity: Option<usize>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Serve Prometheus metrics on this address
    #[cfg(feature = "prometheus")]
    #[arg(long, global = true)]
    pub metrics_listen: Option<std::net::SocketAddr>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print signature sizes and arena offsets
    Registry,

    /// Build a frame and print it as hex
    Encode {
        /// Sending endpoint
        #[arg(long, default_value = "ground")]
        from: Endpoint,

        /// Receiving endpoint
        #[arg(long, default_value = "plane")]
        to: Endpoint,

        /// Payload list (.yaml, .yml or .json); empty frame if omitted
        #[arg(short, long)]
        input: Option<PathBuf>,
    },

    /// Validate and parse a hex encoded frame
    Decode {
        /// Frame bytes as hex; whitespace is ignored
        hex: String,
    },

    /// Print every message received on a stream as a JSON line
    Monitor {
        /// Read from a file instead of stdin
        #[arg(short, long, conflicts_with = "connect")]
        input: Option<PathBuf>,

        /// Connect to a TCP endpoint (host:port)
        #[arg(long)]
        connect: Option<String>,
    },
}

impl Cli {
    /// Link config from `--config`, with flag overrides applied.
    pub fn link_config(&self) -> CliResult<LinkConfig> {
        let mut config = match &self.config {
            Some(path) => LinkConfig::load(path)?,
            None => LinkConfig::default(),
        };
        if let Some(capacity) = self.capacity {
            config.payload_capacity = capacity;
        }
        config.validate()?;
        Ok(config)
    }

    /// Default log level for the verbosity flag.
    pub fn log_level(&self) -> LevelFilter {
        match self.verbose {
            0 => LevelFilter::WARN,
            1 => LevelFilter::INFO,
            2 => LevelFilter::DEBUG,
            _ => LevelFilter::TRACE,
        }
    }
}

/// Execute the parsed command line, writing results to stdout.
pub fn run(cli: Cli) -> CliResult<()> {
    let config = cli.link_config()?;
    let stdout = std::io::stdout();
    let mut out = stdout.lock();

    commands::execute(&cli.command, &config, &mut out)
}
