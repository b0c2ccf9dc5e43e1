//! Aggregate version for optimistic concurrency control.

use serde::{Deserialize, Serialize};

/// Monotonically increasing version of an inventory item.
///
/// A freshly created item is at version 1. Every successful mutating
/// operation increments the version by exactly 1, and the conditional
/// update in the store compares against [`Version::prev`] — the version
/// the writer originally read.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Version(i64);

impl Version {
    /// Returns the version of a freshly created item.
    pub fn initial() -> Self {
        Self(1)
    }

    /// Creates a version from a raw value.
    pub fn new(value: i64) -> Self {
        Self(value)
    }

    /// Returns the raw version value.
    pub fn as_i64(&self) -> i64 {
        self.0
    }

    /// Returns the version this one was incremented from.
    pub fn prev(&self) -> Self {
        Self(self.0 - 1)
    }

    /// Advances to the next version.
    pub fn increment(&mut self) {
        self.0 += 1;
    }
}

impl Default for Version {
    fn default() -> Self {
        Self::initial()
    }
}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
