//! Process scanning utilities for discovering process entries under procfs.
//!
//! This module provides functions to scan the procfs root for process entries
//! and read process names for display.

use std::fs;
use std::path::{Path, PathBuf};

/// Process entry representing a directory in the procfs root.
#[derive(Debug, Clone)]
pub struct ProcEntry {
    pub pid: u32,
    pub proc_path: PathBuf,
}

/// Scans the procfs root for process entries with numeric PIDs and a readable smaps.
pub fn collect_proc_entries(root: &Path, max: Option<usize>) -> Vec<ProcEntry> {
    let mut out = Vec::new();
    if let Ok(entries) = fs::read_dir(root) {
        for entry in entries.flatten() {
            let p = entry.path();
            let name = match p.file_name().and_then(|s| s.to_str()) {
                Some(v) => v,
                None => continue,
            };
            if name.is_empty() || !name.chars().all(|c| c.is_ascii_digit()) {
                continue;
            }
            if !p.join("smaps").exists() {
                continue;
            }
            let pid: u32 = match name.parse() {
                Ok(v) => v,
                Err(_) => continue,
            };
            out.push(ProcEntry { pid, proc_path: p });
            if let Some(maxp) = max {
                if out.len() >= maxp {
                    break;
                }
            }
        }
    }
    out.sort_by_key(|e| e.pid);
    out
}

/// Reads process name from comm file or extracts from cmdline.
pub fn read_process_name(proc_path: &Path) -> Option<String> {
    let comm = proc_path.join("comm");
    if let Ok(s) = fs::read_to_string(&comm) {
        let t = s.trim();
        if !t.is_empty() {
            return Some(t.into());
        }
    }

    let cmd = proc_path.join("cmdline");
    if let Ok(content) = fs::read(&cmd) {
        let first = content
            .split(|&b| b == 0u8)
            .find_map(|s| std::str::from_utf8(s).ok().filter(|s| !s.is_empty()))?;
        return Path::new(first)
            .file_name()
            .and_then(|n| n.to_str())
            .map(|s| s.to_string());
    }
    None
}
