//! CLI command implementations for gpu-memtrack.
//!
//! This module provides implementations for all CLI subcommands:
//! - `query`: Records of one process
//! - `scan`: Largest consumers across all processes
//! - `check`: Kernel interface availability
//! - `config`: Configuration file generation

pub mod check;
pub mod config;
pub mod query;
pub mod scan;

use gpu_memtrack::{build_source, MemorySource, ProviderKind};

use crate::config::Config;

// Re-export command functions
pub use check::command_check;
pub use config::command_config;
pub use query::command_query;
pub use scan::command_scan;

/// Builds the enabled providers, or only `only` when given.
pub(crate) fn build_sources(
    config: &Config,
    only: Option<ProviderKind>,
) -> Vec<(ProviderKind, Box<dyn MemorySource>)> {
    let settings = config.provider_settings();
    let kinds = match only {
        Some(kind) => vec![kind],
        None => config.enabled_providers(),
    };
    kinds
        .into_iter()
        .map(|kind| (kind, build_source(kind, &settings)))
        .collect()
}
