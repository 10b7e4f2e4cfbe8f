//! CLI arguments and subcommands for gpu-memtrack.
//!
//! This module defines the command-line interface structure using the clap library,
//! including all flags, options, and subcommands.

use clap::{Parser, Subcommand, ValueEnum};
use gpu_memtrack::{MemtrackType, ObjinfoRevision, ProviderKind};
use std::path::PathBuf;

/// Log level options for CLI parsing
#[derive(Debug, Clone, ValueEnum)]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Configuration format options for output
#[derive(Debug, Clone, ValueEnum)]
pub enum ConfigFormat {
    Yaml,
    Json,
    Toml,
}

/// Object-info table revision as accepted on the command line
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum RevisionArg {
    Legacy,
    Revised,
}

impl From<RevisionArg> for ObjinfoRevision {
    fn from(arg: RevisionArg) -> Self {
        match arg {
            RevisionArg::Legacy => ObjinfoRevision::Legacy,
            RevisionArg::Revised => ObjinfoRevision::Revised,
        }
    }
}

/// Main CLI arguments structure
#[derive(Parser, Debug)]
#[command(
    name = "gpu-memtrack",
    about = "Per-process GPU memory not accounted for by smaps",
    long_about = "Per-process GPU memory not accounted for by smaps.\n\n\
                  Reads GPU driver debug tables (i915 object info, Mali, ION, HMM pools, zram) \
                  and subtracts what /proc/<pid>/smaps already reports, producing one \
                  unaccounted byte count per process and memory type.",
    version = "0.1.0",
    propagate_version = true
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Log level (overrides log_level from the config file)
    #[arg(long, value_enum)]
    pub log_level: Option<LogLevel>,

    /// Config file (YAML/JSON/TOML)
    #[arg(short = 'c', long)]
    pub config: Option<PathBuf>,

    /// Disable all config file loading
    #[arg(long)]
    pub no_config: bool,

    /// Print effective merged config and exit
    #[arg(long)]
    pub show_config: bool,

    /// Output format for --show-config
    #[arg(long, value_enum, default_value = "yaml")]
    pub config_format: ConfigFormat,

    /// Validate config and exit (return code 1 on error)
    #[arg(long)]
    pub check_config: bool,

    /// Override the sysfs mount point
    #[arg(long)]
    pub sysfs_root: Option<PathBuf>,

    /// Override the procfs mount point
    #[arg(long)]
    pub procfs_root: Option<PathBuf>,

    /// Override the debugfs mount point
    #[arg(long)]
    pub debugfs_root: Option<PathBuf>,

    /// DRM card name under /sys/class/drm
    #[arg(long)]
    pub drm_card: Option<String>,

    /// i915 object-info table revision
    #[arg(long, value_enum)]
    pub objinfo_revision: Option<RevisionArg>,

    /// Enabled providers (comma-separated, e.g. i915-objinfo,zram)
    #[arg(long)]
    pub providers: Option<String>,

    /// Parallel processing threads for scan (0 = auto)
    #[arg(long)]
    pub parallelism: Option<usize>,

    /// Maximum number of processes to scan
    #[arg(long)]
    pub max_processes: Option<usize>,
}

/// Subcommands for additional functionality
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Query the unaccounted GPU memory of one process
    Query {
        /// Process id
        #[arg(short = 'p', long)]
        pid: u32,

        /// Memory type (other, gl, graphics, multimedia, camera)
        #[arg(short = 't', long = "type", default_value = "graphics")]
        mem_type: MemtrackType,

        /// Query only this provider
        #[arg(long)]
        provider: Option<ProviderKind>,

        /// Output format
        #[arg(long, value_enum, default_value = "yaml")]
        format: ConfigFormat,
    },

    /// Query every process and list the largest consumers
    Scan {
        /// Memory type (other, gl, graphics, multimedia, camera)
        #[arg(short = 't', long = "type", default_value = "graphics")]
        mem_type: MemtrackType,

        /// Number of processes to list
        #[arg(short = 'n', long, default_value_t = 10)]
        top: usize,

        /// Show per-provider failures
        #[arg(long)]
        verbose: bool,
    },

    /// Check which kernel interfaces of the enabled providers are available
    Check {
        /// Process id used for per-process interfaces (default: own pid)
        #[arg(short = 'p', long)]
        pid: Option<u32>,

        /// Check every known provider, not only the enabled ones
        #[arg(long)]
        all: bool,
    },

    /// Generate configuration files
    Config {
        /// Output file path
        #[arg(short = 'o', long)]
        output: Option<PathBuf>,

        /// Output format
        #[arg(long, value_enum, default_value = "yaml")]
        format: ConfigFormat,

        /// Include comments and examples
        #[arg(long)]
        commented: bool,
    },
}
