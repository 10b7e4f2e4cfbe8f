//! Scan command implementation.
//!
//! Queries every process under the procfs root and lists the largest consumers.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

use gpu_memtrack::{query_records, MemorySource, MemtrackType, ProviderKind};
use rayon::prelude::*;
use tracing::debug;

use super::build_sources;
use crate::config::Config;
use crate::process::{collect_proc_entries, read_process_name, ProcEntry};

/// Unaccounted memory of one process summed over the enabled providers.
#[derive(Debug, Clone)]
pub struct ScanEntry {
    pub pid: u32,
    pub name: String,
    pub bytes: u64,
    pub failed_providers: Vec<String>,
}

/// Queries every entry in parallel, largest consumers first.
pub fn scan_entries(
    entries: &[ProcEntry],
    sources: &[(ProviderKind, Box<dyn MemorySource>)],
    mem_type: MemtrackType,
) -> (Vec<ScanEntry>, usize) {
    let error_count = AtomicUsize::new(0);

    let mut results: Vec<ScanEntry> = entries
        .par_iter()
        .map(|entry| {
            let mut bytes = 0u64;
            let mut failed_providers = Vec::new();
            for (kind, source) in sources {
                match query_records(source.as_ref(), entry.pid, mem_type) {
                    Ok(records) => {
                        bytes += records.iter().map(|r| r.size_in_bytes).sum::<u64>();
                    }
                    Err(e) => {
                        debug!("{} failed for pid {}: {}", kind, entry.pid, e);
                        error_count.fetch_add(1, Ordering::Relaxed);
                        failed_providers.push(format!("{} ({})", kind, e.errno()));
                    }
                }
            }
            ScanEntry {
                pid: entry.pid,
                name: read_process_name(&entry.proc_path).unwrap_or_else(|| "?".into()),
                bytes,
                failed_providers,
            }
        })
        .collect();

    results.sort_by(|a, b| b.bytes.cmp(&a.bytes).then(a.pid.cmp(&b.pid)));
    (results, error_count.into_inner())
}

/// Lists the `top` processes with the most unaccounted memory.
pub fn command_scan(
    mem_type: MemtrackType,
    top: usize,
    verbose: bool,
    config: &Config,
) -> Result<(), Box<dyn std::error::Error>> {
    let settings = config.provider_settings();
    let sources = build_sources(config, None);

    let start = Instant::now();
    let entries = collect_proc_entries(&settings.paths.procfs_root, config.max_processes);
    println!(
        "Found {} process entries under {}",
        entries.len(),
        settings.paths.procfs_root.display()
    );

    let (results, error_count) = scan_entries(&entries, &sources, mem_type);

    let duration = start.elapsed();
    println!(
        "Scan duration: {:.2}ms, provider errors: {}",
        duration.as_secs_f64() * 1000.0,
        error_count
    );

    let total: u64 = results.iter().map(|r| r.bytes).sum();
    println!("Total unaccounted {}: {} KiB\n", mem_type, total / 1024);

    println!("{:>8}  {:>12}  NAME", "PID", "KIB");
    for entry in results.iter().take(top) {
        println!("{:>8}  {:>12}  {}", entry.pid, entry.bytes / 1024, entry.name);
        if verbose {
            for failure in &entry.failed_providers {
                println!("{:>8}  {:>12}  failed: {}", "", "", failure);
            }
        }
    }

    Ok(())
}
