//! Per-query record of kernel objects that were already scanned.

use ahash::AHashMap as HashMap;

/// Kernel address → size (KiB) of every object seen during one query.
///
/// The driver may list an object once per mapping; the first occurrence is
/// the only one that is ever attributed.
#[derive(Debug, Default)]
pub struct SeenSet {
    objects: HashMap<String, u64>,
}

impl SeenSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seen(&self, kernel_address: &str) -> bool {
        self.objects.contains_key(kernel_address)
    }

    /// Records `kernel_address`; returns `false` if it was already present.
    pub fn mark(&mut self, kernel_address: &str, size_kib: u64) -> bool {
        if self.seen(kernel_address) {
            return false;
        }
        self.objects.insert(kernel_address.to_string(), size_kib);
        true
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Sum of the declared sizes of all distinct objects seen.
    pub fn total_kib(&self) -> u64 {
        self.objects
            .values()
            .fold(0u64, |total, kib| total.saturating_add(*kib))
    }
}
