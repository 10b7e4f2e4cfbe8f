//! Query command implementation.
//!
//! Runs the discover-then-fill sequence of every enabled provider for one pid.

use gpu_memtrack::{query_records, MemtrackType, ProviderKind};
use serde::Serialize;
use tracing::{debug, warn};

use super::build_sources;
use crate::cli::ConfigFormat;
use crate::config::Config;

/// Result of one provider for the queried process.
#[derive(Debug, Serialize)]
pub struct ProviderReport {
    pub provider: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errno: Option<i32>,
    /// Kernel file whose access failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    // Tables last for TOML output
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub records: Vec<RecordReport>,
}

#[derive(Debug, Serialize)]
pub struct RecordReport {
    pub size_in_bytes: u64,
    pub flags: String,
}

#[derive(Debug, Serialize)]
pub struct QueryReport {
    pub pid: u32,
    #[serde(rename = "type")]
    pub mem_type: String,
    pub providers: Vec<ProviderReport>,
}

/// Builds the report for `pid` without printing it.
pub fn build_report(
    pid: u32,
    mem_type: MemtrackType,
    provider: Option<ProviderKind>,
    config: &Config,
) -> QueryReport {
    let providers = build_sources(config, provider)
        .into_iter()
        .map(|(kind, source)| match query_records(source.as_ref(), pid, mem_type) {
            Ok(records) => {
                debug!("{}: {} record(s) for pid {}", kind, records.len(), pid);
                ProviderReport {
                    provider: kind.to_string(),
                    records: records
                        .iter()
                        .map(|r| RecordReport {
                            size_in_bytes: r.size_in_bytes,
                            flags: r.flags.to_string(),
                        })
                        .collect(),
                    error: None,
                    errno: None,
                    path: None,
                }
            }
            Err(e) => {
                warn!("{} failed for pid {}: {}", kind, pid, e);
                ProviderReport {
                    provider: kind.to_string(),
                    records: Vec::new(),
                    error: Some(e.to_string()),
                    errno: Some(e.errno()),
                    path: Some(e.path().display().to_string()),
                }
            }
        })
        .collect();

    QueryReport {
        pid,
        mem_type: mem_type.to_string(),
        providers,
    }
}

/// Prints the records of every enabled provider for `pid`.
/// Exits with status 1 when any provider failed.
pub fn command_query(
    pid: u32,
    mem_type: MemtrackType,
    provider: Option<ProviderKind>,
    format: ConfigFormat,
    config: &Config,
) -> Result<(), Box<dyn std::error::Error>> {
    let report = build_report(pid, mem_type, provider, config);

    let text = match format {
        ConfigFormat::Json => serde_json::to_string_pretty(&report)?,
        ConfigFormat::Toml => toml::to_string_pretty(&report)?,
        ConfigFormat::Yaml => serde_yaml::to_string(&report)?,
    };
    println!("{}", text.trim_end());

    if report.providers.iter().any(|p| p.error.is_some()) {
        std::process::exit(1);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn config_in(dir: &TempDir, providers: Vec<ProviderKind>) -> Config {
        Config {
            sysfs_root: Some(dir.path().join("sys")),
            procfs_root: Some(dir.path().join("proc")),
            debugfs_root: Some(dir.path().join("debug")),
            providers: Some(providers),
            ..Config::default()
        }
    }

    #[test]
    fn test_report_collects_errno_of_failing_provider() {
        let dir = TempDir::new().unwrap();
        let cfg = config_in(&dir, vec![ProviderKind::I915Objinfo]);
        let report = build_report(42, MemtrackType::Gl, None, &cfg);
        assert_eq!(report.providers.len(), 1);
        assert_eq!(report.providers[0].errno, Some(-libc::ENOENT));
        assert_eq!(
            report.providers[0].path.as_deref(),
            Some(
                dir.path()
                    .join("sys/class/drm/card0/i915_gem_objinfo")
                    .to_str()
                    .unwrap()
            )
        );
        assert!(report.providers[0].records.is_empty());
    }

    #[test]
    fn test_report_single_provider_override() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("proc/42")).unwrap();
        fs::write(dir.path().join("proc/42/smaps"), "").unwrap();
        let cfg = config_in(&dir, vec![ProviderKind::I915Objinfo]);

        let report = build_report(42, MemtrackType::Other, Some(ProviderKind::Zram), &cfg);
        assert_eq!(report.providers.len(), 1);
        assert_eq!(report.providers[0].provider, "zram");
        assert_eq!(report.providers[0].records.len(), 1);
        assert_eq!(report.providers[0].records[0].size_in_bytes, 0);
        assert_eq!(
            report.providers[0].records[0].flags,
            "smaps_unaccounted|private|nonsecure"
        );
    }

    #[test]
    fn test_report_serializes_type_field() {
        let dir = TempDir::new().unwrap();
        let cfg = config_in(&dir, vec![ProviderKind::I915Objinfo]);
        let report = build_report(1, MemtrackType::Graphics, None, &cfg);
        let json = serde_json::to_string(&report).unwrap();
        assert!(json.contains("\"type\":\"graphics\""));
    }
}
