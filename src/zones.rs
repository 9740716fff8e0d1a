//! Zone Reference Data
//!
//! Loads the set of valid zone identifiers from the authoritative lookup
//! table. When the lookup is missing or incomplete, the catalog falls back
//! to the full contiguous range `1..=expected_count`. The fallback is never
//! silent: it may mask a genuinely incomplete reference file, so it is
//! surfaced as a warning with both counts.

use crate::models::RawRecord;
use std::collections::BTreeSet;
use std::path::Path;
use tracing::{info, warn};

/// Read-only set of valid zone ids, shared by the validator.
#[derive(Debug, Clone)]
pub struct ZoneCatalog {
    ids: BTreeSet<i64>,
    used_fallback: bool,
}

impl ZoneCatalog {
    /// Load zone ids from a lookup CSV with a `LocationID` column. Missing
    /// file, unreadable rows, or fewer than `expected_count` distinct ids
    /// all recover to the contiguous range; none of them is fatal.
    pub fn load(path: &Path, expected_count: i64) -> Self {
        let mut ids = BTreeSet::new();

        let mut reader = match csv::Reader::from_path(path) {
            Ok(reader) => reader,
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "Zone lookup unavailable, using full contiguous range"
                );
                return Self::from_range(expected_count);
            }
        };

        for row in reader.deserialize::<RawRecord>() {
            let Ok(row) = row else { continue };
            if let Some(raw) = row.get("LocationID") {
                if let Ok(id) = raw.trim().parse::<i64>() {
                    ids.insert(id);
                }
            }
        }

        if (ids.len() as i64) < expected_count {
            warn!(
                loaded = ids.len(),
                expected = expected_count,
                "Zone lookup incomplete, using full contiguous range"
            );
            return Self::from_range(expected_count);
        }

        info!(zone_count = ids.len(), "Loaded zone ids from lookup table");
        Self {
            ids,
            used_fallback: false,
        }
    }

    /// Catalog covering the full contiguous range `1..=expected_count`.
    pub fn from_range(expected_count: i64) -> Self {
        Self {
            ids: (1..=expected_count).collect(),
            used_fallback: true,
        }
    }

    pub fn contains(&self, zone_id: i64) -> bool {
        self.ids.contains(&zone_id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn used_fallback(&self) -> bool {
        self.used_fallback
    }
}
