//! Per-pass location dedup.
//!
//! Multiple races often share a venue; within one pass each distinct location
//! is fetched exactly once and every race at that location is reconciled from
//! the same payload.

use std::collections::HashSet;

use common::Location;

/// Tracks which locations have already been served in the current pass.
///
/// Lifetime is exactly one pass; the scheduler builds a fresh one each time.
/// Identity is exact string equality on `(lat, lon)`.
#[derive(Debug, Default)]
pub struct LocationDedup {
    served: HashSet<Location>,
}

impl LocationDedup {
    pub fn new() -> Self {
        Self::default()
    }

    /// True until `mark_served` has been called for this location.
    pub fn needs_fetch(&self, location: &Location) -> bool {
        !self.served.contains(location)
    }

    pub fn mark_served(&mut self, location: Location) {
        self.served.insert(location);
    }
}
