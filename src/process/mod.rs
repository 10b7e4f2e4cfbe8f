//! Process discovery under the procfs root.
//!
//! This module provides:
//! - `scanner`: Process discovery and name lookup

pub mod scanner;

pub use scanner::{collect_proc_entries, read_process_name, ProcEntry};
