//! Config command implementation.
//!
//! Generates configuration files in various formats.

use std::fs;
use std::path::PathBuf;

use crate::cli::ConfigFormat;
use crate::config::{render_config, Config};

/// Generates configuration files.
pub fn command_config(
    output: Option<PathBuf>,
    format: ConfigFormat,
    commented: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::default();
    let output = match output {
        Some(path) => path,
        None => PathBuf::from("gpu-memtrack.yaml"),
    };

    let mut content = render_config(&config, &format)?;
    if commented && matches!(format, ConfigFormat::Yaml) {
        content = add_config_comments(content);
    }

    if output.to_string_lossy() == "-" {
        print!("{}", content);
    } else {
        fs::write(&output, content)?;
        println!("✅ Configuration written to: {}", output.display());
    }

    Ok(())
}

/// Adds comments to YAML configuration.
fn add_config_comments(yaml: String) -> String {
    let comments = r#"# gpu-memtrack Configuration
# ==========================
#
# Kernel Interfaces
# -----------------
# sysfs_root: /sys                 # sysfs mount point
# procfs_root: /proc               # procfs mount point
# debugfs_root: /sys/kernel/debug  # debugfs mount point (mali, ion, mali-midgard)
# drm_card: card0                  # DRM card under /sys/class/drm
# hmm_device: devices/pci0000:00/0000:00:03.0  # HMM device, relative to sysfs_root
#
# Providers
# ---------
# providers: [i915-objinfo]        # i915-objinfo, gfx-memtrack, mali, ion,
#                                  # mali-midgard, hmm, zram
# objinfo_revision: revised        # legacy: charge size - Pss per mapping
#                                  # revised: charge size / sharers - Pss per mapping
# ion_heaps: [cma-heap, system-heap]  # heaps under <debugfs>/ion/heaps
#
# Scan
# ----
# parallelism: null                # Parallel threads (null = auto)
# max_processes: null              # Maximum processes to scan
#
# Logging
# -------
# log_level: warn                  # off, error, warn, info, debug, trace
"#;

    format!("{comments}\n{yaml}")
}
