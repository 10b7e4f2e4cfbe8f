//! gpu-memtrack - version 0.1.0
//!
//! Per-process GPU memory that smaps does not account for, with tracing logging.
//! This is the main entry point that resolves configuration and dispatches subcommands.

mod cli;
mod commands;
mod config;
mod process;
mod startup_checks;

use clap::{CommandFactory, Parser, ValueEnum};
use tracing::{debug, error, info, warn, Level};

use cli::{Args, Commands, LogLevel};
use commands::{command_check, command_config, command_query, command_scan};
use config::{resolve_config, show_config, validate_effective_config, Config};

/// Effective log level: CLI flag, then config file, then warn.
fn effective_log_level(config: &Config, args: &Args) -> LogLevel {
    if let Some(level) = &args.log_level {
        return level.clone();
    }
    config
        .log_level
        .as_deref()
        .and_then(|s| LogLevel::from_str(s, true).ok())
        .unwrap_or(LogLevel::Warn)
}

/// Initializes tracing logging subsystem with configured log level.
fn setup_logging(config: &Config, args: &Args) {
    let log_level = match effective_log_level(config, args) {
        LogLevel::Off => return,
        LogLevel::Error => Level::ERROR,
        LogLevel::Warn => Level::WARN,
        LogLevel::Info => Level::INFO,
        LogLevel::Debug => Level::DEBUG,
        LogLevel::Trace => Level::TRACE,
    };

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return;
    }

    debug!("Logging initialized with level: {}", log_level);
}

/// Helper function to load and validate configuration.
/// Exits the process with error code 1 if validation fails.
fn load_validated_config(args: &Args) -> Result<Config, Box<dyn std::error::Error>> {
    let config = resolve_config(args)?;
    if let Err(e) = validate_effective_config(&config) {
        eprintln!("❌ Configuration invalid: {}", e);
        std::process::exit(1);
    }
    Ok(config)
}

/// Configures the global rayon pool used by the scan command.
fn configure_parallelism(config: &Config) {
    if let Some(threads) = config.parallelism {
        if threads > 0 {
            rayon::ThreadPoolBuilder::new()
                .num_threads(threads)
                .build_global()
                .unwrap_or_else(|e| error!("Failed to set rayon thread pool: {}", e));
            debug!("Rayon thread pool configured with {} threads", threads);
        }
    }
}

/// Main application entry point.
fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Early config resolution for show/check modes
    if args.show_config || args.check_config {
        let config = resolve_config(&args)?;

        if args.check_config {
            if let Err(e) = validate_effective_config(&config) {
                eprintln!("❌ Configuration invalid: {}", e);
                std::process::exit(1);
            }
            println!("✅ Configuration is valid");
            return Ok(());
        }

        return show_config(&config, args.config_format.clone());
    }

    let Some(command) = &args.command else {
        Args::command().print_help()?;
        return Ok(());
    };

    // Generating a default config needs no effective config
    if let Commands::Config {
        output,
        format,
        commented,
    } = command
    {
        return command_config(output.clone(), format.clone(), *commented);
    }

    let config = load_validated_config(&args)?;
    setup_logging(&config, &args);

    info!("Starting gpu-memtrack");

    let settings = config.provider_settings();
    if let Err(e) =
        startup_checks::validate_requirements(&settings.paths, &config.enabled_providers())
    {
        warn!("Startup validation failed: {}", e);
        warn!("   Queries of the affected providers will fail");
    }

    match command {
        Commands::Query {
            pid,
            mem_type,
            provider,
            format,
        } => command_query(*pid, *mem_type, *provider, format.clone(), &config),

        Commands::Scan {
            mem_type,
            top,
            verbose,
        } => {
            configure_parallelism(&config);
            command_scan(*mem_type, *top, *verbose, &config)
        }

        Commands::Check { pid, all } => command_check(*pid, *all, &config),

        Commands::Config { .. } => unreachable!("Config handled above"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_cli_overrides_config() {
        let mut config = Config::default();
        config.log_level = Some("debug".into());

        let args = Args::parse_from(["gpu-memtrack", "--no-config"]);
        assert!(matches!(effective_log_level(&config, &args), LogLevel::Debug));

        let args = Args::parse_from(["gpu-memtrack", "--log-level", "trace"]);
        assert!(matches!(effective_log_level(&config, &args), LogLevel::Trace));
    }

    #[test]
    fn test_log_level_unparsable_falls_back_to_warn() {
        let mut config = Config::default();
        config.log_level = Some("loud".into());
        let args = Args::parse_from(["gpu-memtrack"]);
        assert!(matches!(effective_log_level(&config, &args), LogLevel::Warn));
    }
}
