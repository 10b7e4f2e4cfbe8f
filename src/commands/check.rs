//! Check command implementation.
//!
//! Reports which kernel interfaces the providers read are present.

use std::path::Path;

use gpu_memtrack::ProviderKind;
use nix::unistd::geteuid;

use super::build_sources;
use crate::config::{validate_effective_config, Config};
use crate::process::collect_proc_entries;

/// Availability of one kernel interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterfaceState {
    Readable,
    Missing,
    Unreadable,
}

pub fn interface_state(path: &Path) -> InterfaceState {
    match std::fs::metadata(path) {
        Ok(meta) if meta.is_dir() => match std::fs::read_dir(path) {
            Ok(_) => InterfaceState::Readable,
            Err(_) => InterfaceState::Unreadable,
        },
        Ok(_) => match std::fs::File::open(path) {
            Ok(_) => InterfaceState::Readable,
            Err(_) => InterfaceState::Unreadable,
        },
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => InterfaceState::Missing,
        Err(_) => InterfaceState::Unreadable,
    }
}

/// Validates configuration and kernel interface availability.
pub fn command_check(
    pid: Option<u32>,
    all: bool,
    config: &Config,
) -> Result<(), Box<dyn std::error::Error>> {
    println!("🔍 gpu-memtrack - System Check");
    println!("==============================");

    let mut all_ok = true;
    let pid = pid.unwrap_or_else(std::process::id);
    let settings = config.provider_settings();

    println!("\n👤 Privileges...");
    if geteuid().is_root() {
        println!("   ✅ Running as root");
    } else {
        println!("   ⚠️  Not running as root - debugfs and other processes' smaps may be unreadable");
    }

    println!("\n📁 Checking {}...", settings.paths.procfs_root.display());
    let proc_entries = collect_proc_entries(&settings.paths.procfs_root, Some(5));
    if proc_entries.is_empty() {
        println!("   ❌ Cannot read any process entries");
        all_ok = false;
    } else {
        println!("   ✅ Can read {} process entries", proc_entries.len());
    }

    let only_enabled = config.enabled_providers();
    let sources: Vec<_> = if all {
        ProviderKind::ALL
            .into_iter()
            .flat_map(|kind| build_sources(config, Some(kind)))
            .collect()
    } else {
        build_sources(config, None)
    };

    println!("\n🎮 Provider interfaces (pid {})...", pid);
    for (kind, source) in &sources {
        let enabled = only_enabled.contains(kind);
        println!(
            "   {} {}",
            kind,
            if enabled { "(enabled)" } else { "(disabled)" }
        );
        for path in source.interfaces(pid) {
            let state = interface_state(&path);
            let marker = match state {
                InterfaceState::Readable => "✅",
                InterfaceState::Missing => "❌",
                InterfaceState::Unreadable => "🔒",
            };
            println!("      {} {}", marker, path.display());
            if enabled && state != InterfaceState::Readable {
                all_ok = false;
            }
        }
    }

    println!("\n⚙️  Checking configuration...");
    match validate_effective_config(config) {
        Ok(_) => {
            println!("   ✅ Configuration is valid");
        }
        Err(e) => {
            println!("   ❌ Configuration invalid: {}", e);
            all_ok = false;
        }
    }

    println!("\n📋 Summary:");
    if all_ok {
        println!("   ✅ All checks passed - enabled providers can be queried");
        Ok(())
    } else {
        println!("   ❌ Some checks failed - please review the list above");
        std::process::exit(1);
    }
}
