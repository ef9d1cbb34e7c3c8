// src/cli.rs

//! Command line interface definitions.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "advisor")]
#[command(author, version, about = "Update and advisory resolution service", long_about = None)]
pub struct Cli {
    /// Path to a TOML configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the convergence protocol server
    Convergence {
        /// Bind address override
        #[arg(long)]
        bind: Option<String>,
    },
    /// Run a query replica: load the snapshot and join the fleet
    Replica {
        /// Convergence server address override
        #[arg(long)]
        server: Option<String>,
        /// Local artifact path override
        #[arg(long)]
        dump: Option<PathBuf>,
        /// Remote artifact URL override
        #[arg(long)]
        remote_url: Option<String>,
    },
    /// Fetch the remote artifact once and validate it
    Fetch {
        /// Remote artifact URL override
        #[arg(long)]
        remote_url: Option<String>,
        /// Local artifact path override
        #[arg(long)]
        dump: Option<PathBuf>,
    },
    /// Resolve updates for NEVRAs against a local artifact
    Resolve {
        /// Input NEVRA strings
        #[arg(required = true)]
        packages: Vec<String>,
        /// Local artifact path override
        #[arg(long)]
        dump: Option<PathBuf>,
        /// Restrict to these repository labels
        #[arg(long = "repository")]
        repositories: Vec<String>,
        #[arg(long)]
        releasever: Option<String>,
        #[arg(long)]
        basearch: Option<String>,
        /// Enabled module streams as name:stream pairs
        #[arg(long = "module", value_parser = parse_module)]
        modules: Vec<(String, String)>,
        /// Keep only security advisories
        #[arg(long)]
        security_only: bool,
        /// Keep only the latest EVR per input name
        #[arg(long)]
        latest_only: bool,
        /// Output view
        #[arg(long, value_enum, default_value_t = View::Updates)]
        view: View,
    },
    /// Announce a snapshot version to the fleet and start a refresh round
    Notify {
        /// Convergence server address override
        #[arg(long)]
        server: Option<String>,
        /// Snapshot export timestamp (RFC 3339)
        #[arg(long)]
        version: String,
    },
}

#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum View {
    Updates,
    Vulnerabilities,
    Patches,
}

impl std::fmt::Display for View {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            View::Updates => "updates",
            View::Vulnerabilities => "vulnerabilities",
            View::Patches => "patches",
        };
        write!(f, "{name}")
    }
}

fn parse_module(value: &str) -> Result<(String, String), String> {
    value
        .split_once(':')
        .map(|(name, stream)| (name.to_string(), stream.to_string()))
        .ok_or_else(|| format!("expected name:stream, got '{value}'"))
}
