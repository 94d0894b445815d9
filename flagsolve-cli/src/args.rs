//! Command-line arguments

use clap::Parser;
use std::path::PathBuf;

/// LLM-powered multi-agent CTF solver
#[derive(Debug, Parser)]
#[command(name = "flagsolve", version, about)]
pub struct Args {
    /// Target host or URL; prepended to the first message of a new session
    pub target: Option<String>,

    /// Path to a config file (defaults to ./flagsolve.toml, then
    /// ~/.flagsolve/config.toml)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Override the coordinator model
    #[arg(long)]
    pub model: Option<String>,

    /// Resume a session by id instead of starting a new one
    #[arg(long)]
    pub session: Option<String>,

    /// Override the coordinator step limit per turn
    #[arg(long)]
    pub steps: Option<u32>,

    /// Disable delegation: the coordinator runs every command itself
    #[arg(long)]
    pub no_delegation: bool,
}
