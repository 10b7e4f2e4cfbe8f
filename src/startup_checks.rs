//! Startup requirement validation for gpu-memtrack.
//!
//! This module validates that the kernel interfaces the enabled providers
//! depend on are mounted and readable before any query runs.

use gpu_memtrack::{KernelPaths, ProviderKind};
use nix::unistd::geteuid;
use std::fs;
use std::path::PathBuf;
use tracing::{debug, error, info, warn};

/// Validate all runtime requirements
pub fn validate_requirements(
    paths: &KernelPaths,
    providers: &[ProviderKind],
) -> Result<(), ValidationError> {
    debug!("Validating runtime requirements...");

    check_user_privileges();
    check_procfs(paths)?;

    if providers.iter().any(|p| needs_debugfs(*p)) {
        check_debugfs(paths)?;
    }

    debug!("All runtime requirements validated");
    Ok(())
}

/// Whether a provider reads from debugfs.
pub fn needs_debugfs(kind: ProviderKind) -> bool {
    matches!(
        kind,
        ProviderKind::Mali | ProviderKind::Ion | ProviderKind::MaliMidgard
    )
}

/// Check if running with sufficient privileges
fn check_user_privileges() {
    if !geteuid().is_root() {
        warn!("Not running as root - driver tables and other processes' smaps may be unreadable");
    } else {
        debug!("Running as root (uid=0)");
    }
}

/// Check the procfs root looks like a mounted procfs
fn check_procfs(paths: &KernelPaths) -> Result<(), ValidationError> {
    if !paths.procfs_root.is_dir() {
        error!("procfs root {} not found", paths.procfs_root.display());
        return Err(ValidationError::ProcfsMissing(paths.procfs_root.clone()));
    }

    // Own smaps is always readable on a real procfs
    let own = paths.proc_file(std::process::id(), "smaps");
    match fs::metadata(&own) {
        Ok(_) => info!("procfs access: {} readable", own.display()),
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            error!("Cannot read {} - insufficient permissions", own.display());
            return Err(ValidationError::InsufficientPermissions(e.to_string()));
        }
        Err(e) => debug!("Could not test procfs access via {}: {}", own.display(), e),
    }
    Ok(())
}

/// Check debugfs is mounted
fn check_debugfs(paths: &KernelPaths) -> Result<(), ValidationError> {
    match fs::read_dir(&paths.debugfs_root) {
        Ok(_) => {
            debug!("debugfs accessible at {}", paths.debugfs_root.display());
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            error!("Cannot read {} - debugfs requires root", paths.debugfs_root.display());
            Err(ValidationError::InsufficientPermissions(e.to_string()))
        }
        Err(_) => {
            error!("debugfs not mounted at {}", paths.debugfs_root.display());
            error!("   Solution: mount -t debugfs none {}", paths.debugfs_root.display());
            Err(ValidationError::DebugfsNotMounted(paths.debugfs_root.clone()))
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("Insufficient permissions: {0}")]
    InsufficientPermissions(String),

    #[error("procfs not found at {}", .0.display())]
    ProcfsMissing(PathBuf),

    #[error("debugfs not mounted at {}", .0.display())]
    DebugfsNotMounted(PathBuf),
}
