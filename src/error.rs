//! Error type returned by memory-source queries.

use std::io;
use std::path::{Path, PathBuf};

/// Failure of a whole query. Malformed lines never end up here; they are
/// skipped by the parsers.
#[derive(Debug, thiserror::Error)]
pub enum MemtrackError {
    #[error("failed to open {}: {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl MemtrackError {
    pub fn open(path: &Path, source: io::Error) -> Self {
        MemtrackError::Open {
            path: path.to_path_buf(),
            source,
        }
    }

    pub fn read(path: &Path, source: io::Error) -> Self {
        MemtrackError::Read {
            path: path.to_path_buf(),
            source,
        }
    }

    pub fn path(&self) -> &Path {
        match self {
            MemtrackError::Open { path, .. } | MemtrackError::Read { path, .. } => path,
        }
    }

    /// Negative OS error code, the value a C caller would see as the status.
    pub fn errno(&self) -> i32 {
        let source = match self {
            MemtrackError::Open { source, .. } | MemtrackError::Read { source, .. } => source,
        };
        -source.raw_os_error().unwrap_or(libc::EIO)
    }
}
