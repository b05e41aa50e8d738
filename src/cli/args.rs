//! CLI argument definitions using clap derive

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;

/// Replica - concurrent file copy engine
///
/// Copies every file of a source directory into one or more target
/// directories, skipping copies that are already up to date, while capping
/// memory use and concurrent disk operations.
#[derive(Parser, Debug)]
#[command(name = "replica")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Configuration file path
    #[arg(short, long, global = true, env = "REPLICA_CONFIG")]
    pub config: Option<PathBuf>,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Copy a directory's files into target directories
    Copy(CopyArgs),

    /// Show or initialize configuration
    Config(ConfigArgs),
}

/// Arguments for the copy command
#[derive(Parser, Debug)]
pub struct CopyArgs {
    /// Directory whose regular files are copied
    #[arg(default_value = "foo")]
    pub source: PathBuf,

    /// Directories receiving a copy of every file
    #[arg(default_values = ["bar1", "bar2"])]
    pub targets: Vec<PathBuf>,

    /// Memory budget in bytes (overrides limits.memory_bytes)
    #[arg(short, long)]
    pub memory: Option<u64>,

    /// Concurrent disk operations (overrides limits.disk_ops)
    #[arg(short, long)]
    pub disk_ops: Option<usize>,

    /// Don't print progress while copying
    #[arg(long)]
    pub no_progress: bool,
}

/// Arguments for the config command
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    /// Config action
    #[command(subcommand)]
    pub action: Option<ConfigAction>,
}

/// Config subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Show configuration file path
    Path,

    /// Write a default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },
}
