//! Helpers for reading kernel pseudo-files line by line.
//!
//! Debugfs and sysfs tables are small but not guaranteed to be valid UTF-8
//! (process names, mapping paths), so lines are read as bytes and decoded
//! lossily.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::error::MemtrackError;

/// Read buffer for kernel tables, in KiB.
pub const DEFAULT_BUFFER_KB: usize = 64;

/// Opens `path` behind a buffered reader, mapping the failure to a query error.
pub fn open_buffered(path: &Path) -> Result<BufReader<File>, MemtrackError> {
    let file = File::open(path).map_err(|e| MemtrackError::open(path, e))?;
    Ok(BufReader::with_capacity(DEFAULT_BUFFER_KB * 1024, file))
}

/// Calls `f` for every line of `reader` (newline stripped). Stops early when
/// `f` returns `false`.
pub fn for_each_line<R, F>(reader: &mut R, path: &Path, mut f: F) -> Result<(), MemtrackError>
where
    R: BufRead,
    F: FnMut(&str) -> bool,
{
    let mut buf = Vec::with_capacity(256);
    loop {
        buf.clear();
        let n = reader
            .read_until(b'\n', &mut buf)
            .map_err(|e| MemtrackError::read(path, e))?;
        if n == 0 {
            return Ok(());
        }
        let line = String::from_utf8_lossy(&buf);
        if !f(line.trim_end_matches(|c| c == '\n' || c == '\r')) {
            return Ok(());
        }
    }
}

/// Opens `path` and calls `f` for every line.
pub fn scan_lines<F>(path: &Path, f: F) -> Result<(), MemtrackError>
where
    F: FnMut(&str) -> bool,
{
    let mut reader = open_buffered(path)?;
    for_each_line(&mut reader, path, f)
}
