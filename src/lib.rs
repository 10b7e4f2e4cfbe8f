//! GPU Memtrack Library
//!
//! Estimates per-process GPU memory on Linux embedded platforms from kernel
//! driver debug tables, subtracting what `/proc/<pid>/smaps` already reports
//! so that a memory-reporting service does not count it twice.
//!
//! # Features
//!
//! - **Shared-object attribution**: i915 GEM objects shared between processes
//!   are split evenly or cross-referenced against the Pss of their mappings
//! - **Deduplication**: each kernel object contributes at most once per query
//! - **Pluggable providers**: Mali, Midgard, ION, HMM pools, `gfx_memtrack`
//!   tables and zram behind one [`MemorySource`] trait
//!
//! # Usage
//!
//! ```rust,no_run
//! use gpu_memtrack::{
//!     build_source, MemorySource, MemtrackRecord, MemtrackType, ProviderKind, ProviderSettings,
//! };
//!
//! let source = build_source(ProviderKind::I915Objinfo, &ProviderSettings::default());
//!
//! // Discover how many records the provider defines, then fill them.
//! let count = source.query(1234, MemtrackType::Graphics, &mut []).unwrap();
//! let mut records = vec![MemtrackRecord::default(); count];
//! match source.query(1234, MemtrackType::Graphics, &mut records) {
//!     Ok(_) => println!("unaccounted: {} bytes", records[0].size_in_bytes),
//!     Err(e) => eprintln!("query failed ({}): {}", e.errno(), e),
//! }
//! ```

pub mod error;
pub mod kernel_file;
pub mod objinfo;
pub mod providers;
pub mod record;
pub mod smaps;

// Re-export main types for convenience
pub use error::MemtrackError;
pub use objinfo::ObjinfoRevision;
pub use providers::{
    build_source, query_records, KernelPaths, MemorySource, ProviderKind, ProviderSettings,
};
pub use record::{MemtrackRecord, MemtrackType, RecordFlags};
