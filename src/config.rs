//! Configuration management for gpu-memtrack.
//!
//! This module handles loading, merging, and validating configuration from files
//! and CLI arguments. It supports YAML, JSON, and TOML formats.

use crate::cli::{Args, ConfigFormat};
use gpu_memtrack::providers::ion::DEFAULT_ION_HEAPS;
use gpu_memtrack::{KernelPaths, ObjinfoRevision, ProviderKind, ProviderSettings};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// Enhanced configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    // Kernel interface locations
    #[serde(alias = "sysfs-root")]
    pub sysfs_root: Option<PathBuf>,
    #[serde(alias = "procfs-root")]
    pub procfs_root: Option<PathBuf>,
    #[serde(alias = "debugfs-root")]
    pub debugfs_root: Option<PathBuf>,
    #[serde(alias = "drm-card")]
    pub drm_card: Option<String>,
    /// HMM device directory, relative to the sysfs root
    #[serde(alias = "hmm-device")]
    pub hmm_device: Option<PathBuf>,

    // Providers
    pub providers: Option<Vec<ProviderKind>>,
    #[serde(alias = "objinfo-revision")]
    pub objinfo_revision: Option<ObjinfoRevision>,
    #[serde(alias = "ion-heaps")]
    pub ion_heaps: Option<Vec<String>>,

    // Scan
    pub parallelism: Option<usize>,
    #[serde(alias = "max-processes")]
    pub max_processes: Option<usize>,

    // Logging
    pub log_level: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        let paths = KernelPaths::default();
        Self {
            sysfs_root: Some(paths.sysfs_root),
            procfs_root: Some(paths.procfs_root),
            debugfs_root: Some(paths.debugfs_root),
            drm_card: Some(paths.drm_card),
            hmm_device: Some(paths.hmm_device),
            providers: Some(vec![ProviderKind::I915Objinfo]),
            objinfo_revision: Some(ObjinfoRevision::default()),
            ion_heaps: Some(DEFAULT_ION_HEAPS.iter().map(|h| h.to_string()).collect()),
            parallelism: None,
            max_processes: None,
            log_level: Some("warn".into()),
        }
    }
}

impl Config {
    /// Enabled providers, falling back to the default set.
    pub fn enabled_providers(&self) -> Vec<ProviderKind> {
        self.providers
            .clone()
            .unwrap_or_else(|| vec![ProviderKind::I915Objinfo])
    }

    /// Builds the provider settings, filling unset fields with defaults.
    pub fn provider_settings(&self) -> ProviderSettings {
        let defaults = KernelPaths::default();
        ProviderSettings {
            paths: KernelPaths {
                sysfs_root: self.sysfs_root.clone().unwrap_or(defaults.sysfs_root),
                procfs_root: self.procfs_root.clone().unwrap_or(defaults.procfs_root),
                debugfs_root: self.debugfs_root.clone().unwrap_or(defaults.debugfs_root),
                drm_card: self.drm_card.clone().unwrap_or(defaults.drm_card),
                hmm_device: self.hmm_device.clone().unwrap_or(defaults.hmm_device),
            },
            objinfo_revision: self.objinfo_revision.unwrap_or_default(),
            ion_heaps: self.ion_heaps.clone().unwrap_or_default(),
        }
    }
}

/// Validate effective config (used by --check-config and at startup)
pub fn validate_effective_config(cfg: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let providers = cfg.enabled_providers();
    if providers.is_empty() {
        return Err("At least one provider must be enabled".into());
    }

    if providers.contains(&ProviderKind::Ion)
        && cfg.ion_heaps.as_ref().is_some_and(|h| h.is_empty())
    {
        return Err("Provider 'ion' is enabled but ion_heaps is empty".into());
    }

    let roots = [
        ("sysfs_root", &cfg.sysfs_root),
        ("procfs_root", &cfg.procfs_root),
        ("debugfs_root", &cfg.debugfs_root),
    ];
    for (name, root) in roots {
        if let Some(path) = root {
            if !path.is_absolute() {
                return Err(format!("{} must be an absolute path: {}", name, path.display()).into());
            }
        }
    }

    if let Some(card) = cfg.drm_card.as_deref() {
        if card.is_empty() || card.contains('/') {
            return Err(format!("Invalid drm_card '{}'", card).into());
        }
    }

    if let Some(device) = &cfg.hmm_device {
        if device.is_absolute() {
            return Err(format!(
                "hmm_device must be relative to sysfs_root: {}",
                device.display()
            )
            .into());
        }
    }

    Ok(())
}

/// Resolves configuration from CLI args, config file, and defaults.
/// This enforces precedence: CLI (if provided) > config file > default.
pub fn resolve_config(args: &Args) -> Result<Config, Box<dyn std::error::Error>> {
    let mut config = if args.no_config {
        Config::default()
    } else {
        load_config(args.config.as_deref().and_then(|p| p.to_str()))?
    };

    // Kernel interface locations
    if let Some(root) = &args.sysfs_root {
        config.sysfs_root = Some(root.clone());
    }
    if let Some(root) = &args.procfs_root {
        config.procfs_root = Some(root.clone());
    }
    if let Some(root) = &args.debugfs_root {
        config.debugfs_root = Some(root.clone());
    }
    if let Some(card) = &args.drm_card {
        config.drm_card = Some(card.clone());
    }

    // Providers: parse comma-separated names
    if let Some(list) = &args.providers {
        let providers = list
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::parse::<ProviderKind>)
            .collect::<Result<Vec<_>, _>>()?;
        config.providers = Some(providers);
    }
    if let Some(revision) = args.objinfo_revision {
        config.objinfo_revision = Some(revision.into());
    }

    // Scan settings
    if args.parallelism.is_some() {
        config.parallelism = args.parallelism;
    }
    if args.max_processes.is_some() {
        config.max_processes = args.max_processes;
    }

    Ok(config)
}

/// Enhanced configuration loading with multiple format support
pub fn load_config(path: Option<&str>) -> Result<Config, Box<dyn std::error::Error>> {
    let path = if let Some(p) = path {
        PathBuf::from(p)
    } else {
        // Try default locations
        let defaults = [
            "/etc/gpu-memtrack/gpu-memtrack.yaml",
            "/etc/gpu-memtrack/gpu-memtrack.yml",
            "/etc/gpu-memtrack/gpu-memtrack.json",
            "./gpu-memtrack.yaml",
            "./gpu-memtrack.yml",
            "./gpu-memtrack.json",
        ];

        defaults
            .iter()
            .find(|p| Path::new(p).exists())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(""))
    };

    if !path.exists() || path.to_string_lossy().is_empty() {
        return Ok(Config::default());
    }

    let content = fs::read_to_string(&path)?;
    parse_config(&path, &content)
}

/// Parses `content` according to the extension of `path` (YAML by default).
fn parse_config(path: &Path, content: &str) -> Result<Config, Box<dyn std::error::Error>> {
    match path.extension().and_then(|s| s.to_str()) {
        Some("json") => {
            let config: Config = serde_json::from_str(content)?;
            info!("Loaded JSON configuration from: {}", path.display());
            Ok(config)
        }
        Some("toml") => {
            let config: Config = toml::from_str(content)?;
            info!("Loaded TOML configuration from: {}", path.display());
            Ok(config)
        }
        _ => {
            let config: Config = serde_yaml::from_str(content)?;
            info!("Loaded YAML configuration from: {}", path.display());
            Ok(config)
        }
    }
}

/// Serializes configuration in the requested format
pub fn render_config(config: &Config, format: &ConfigFormat) -> Result<String, Box<dyn std::error::Error>> {
    Ok(match format {
        ConfigFormat::Json => serde_json::to_string_pretty(config)?,
        ConfigFormat::Toml => toml::to_string_pretty(config)?,
        ConfigFormat::Yaml => serde_yaml::to_string(config)?,
    })
}

/// Shows configuration in requested format
pub fn show_config(config: &Config, format: ConfigFormat) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", render_config(config, &format)?);
    Ok(())
}
