//! Result records handed back to the memory-reporting caller.
//!
//! Every provider fills a caller-owned slice of [`MemtrackRecord`]s. The
//! layout mirrors the memtrack HAL: one aggregate byte count per record plus a
//! set of classification flags that are constant per provider.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::BitOr;
use std::str::FromStr;

/// Classification bits attached to a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordFlags(u32);

impl RecordFlags {
    pub const SMAPS_ACCOUNTED: Self = Self(1 << 1);
    pub const SMAPS_UNACCOUNTED: Self = Self(1 << 2);
    pub const SHARED: Self = Self(1 << 3);
    pub const SHARED_PSS: Self = Self(1 << 4);
    pub const PRIVATE: Self = Self(1 << 5);
    pub const SYSTEM: Self = Self(1 << 6);
    pub const DEDICATED: Self = Self(1 << 7);
    pub const NONSECURE: Self = Self(1 << 8);
    pub const SECURE: Self = Self(1 << 9);

    pub const fn empty() -> Self {
        Self(0)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for RecordFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        self.union(rhs)
    }
}

impl fmt::Display for RecordFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const NAMES: [(RecordFlags, &str); 9] = [
            (RecordFlags::SMAPS_ACCOUNTED, "smaps_accounted"),
            (RecordFlags::SMAPS_UNACCOUNTED, "smaps_unaccounted"),
            (RecordFlags::SHARED, "shared"),
            (RecordFlags::SHARED_PSS, "shared_pss"),
            (RecordFlags::PRIVATE, "private"),
            (RecordFlags::SYSTEM, "system"),
            (RecordFlags::DEDICATED, "dedicated"),
            (RecordFlags::NONSECURE, "nonsecure"),
            (RecordFlags::SECURE, "secure"),
        ];

        let names: Vec<&str> = NAMES
            .iter()
            .filter(|(flag, _)| self.contains(*flag))
            .map(|(_, name)| *name)
            .collect();

        if names.is_empty() {
            write!(f, "none")
        } else {
            write!(f, "{}", names.join("|"))
        }
    }
}

/// One output slot: an aggregate size plus its classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MemtrackRecord {
    pub size_in_bytes: u64,
    pub flags: RecordFlags,
}

impl MemtrackRecord {
    pub const fn template(flags: RecordFlags) -> Self {
        Self {
            size_in_bytes: 0,
            flags,
        }
    }
}

/// Template shared by every provider in this crate: memory that generic smaps
/// accounting does not see, private to the process, non-secure.
pub const UNACCOUNTED_PRIVATE_TEMPLATES: [MemtrackRecord; 1] = [MemtrackRecord::template(
    RecordFlags::SMAPS_UNACCOUNTED
        .union(RecordFlags::PRIVATE)
        .union(RecordFlags::NONSECURE),
)];

/// Memory categories a caller may ask about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemtrackType {
    Other,
    Gl,
    Graphics,
    Multimedia,
    Camera,
}

impl fmt::Display for MemtrackType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MemtrackType::Other => "other",
            MemtrackType::Gl => "gl",
            MemtrackType::Graphics => "graphics",
            MemtrackType::Multimedia => "multimedia",
            MemtrackType::Camera => "camera",
        };
        f.write_str(name)
    }
}

impl FromStr for MemtrackType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "other" => Ok(MemtrackType::Other),
            "gl" => Ok(MemtrackType::Gl),
            "graphics" => Ok(MemtrackType::Graphics),
            "multimedia" => Ok(MemtrackType::Multimedia),
            "camera" => Ok(MemtrackType::Camera),
            other => Err(format!(
                "unknown memory type '{}', expected other, gl, graphics, multimedia or camera",
                other
            )),
        }
    }
}

/// KiB value as a signed quantity, clamped to `i64::MAX`.
pub fn saturating_kib(kib: u64) -> i64 {
    i64::try_from(kib).unwrap_or(i64::MAX)
}

/// Converts a signed KiB aggregate into the byte count written to a record.
///
/// Individual objects may push the aggregate below zero when smaps reports
/// more than the driver declared; such a total is written as zero.
pub fn kib_to_record_bytes(total_kib: i64) -> u64 {
    u64::try_from(total_kib).unwrap_or(0).saturating_mul(1024)
}
