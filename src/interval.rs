//! Genomic interval arithmetic.
//!
//! A [`GenomeInterval`] is a half-open range `[begin, end)` on one
//! chromosome. The derived ordering (tid, then begin, then end) is the
//! key order of the spatial index, so intervals sort into the
//! left-to-right scan order used by intersection queries.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A half-open genomic interval `[begin, end)` on chromosome `tid`.
///
/// # Example
///
/// ```
/// use locusgraph::GenomeInterval;
///
/// let a = GenomeInterval::new(0, 10, 30);
/// let b = GenomeInterval::new(0, 20, 40);
/// assert!(a.intersects(&b));
/// assert_eq!(a.size(), 20);
/// ```
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct GenomeInterval {
    /// Chromosome identifier.
    pub tid: i32,
    /// Inclusive start position.
    pub begin: i64,
    /// Exclusive end position.
    pub end: i64,
}

impl GenomeInterval {
    /// Create a new interval.
    ///
    /// # Panics
    ///
    /// Panics if `begin >= end`.
    pub fn new(tid: i32, begin: i64, end: i64) -> Self {
        assert!(begin < end, "interval [{begin},{end}) is empty or inverted");
        Self { tid, begin, end }
    }

    /// True if the two intervals share a chromosome and their ranges overlap.
    pub fn intersects(&self, other: &GenomeInterval) -> bool {
        self.tid == other.tid && self.begin < other.end && other.begin < self.end
    }

    /// True if `self` covers all of `other` on the same chromosome.
    pub fn is_superset_of(&self, other: &GenomeInterval) -> bool {
        self.tid == other.tid && self.begin <= other.begin && self.end >= other.end
    }

    /// Expand `self` to the union of both ranges. Requires a shared chromosome.
    pub fn merge(&mut self, other: &GenomeInterval) {
        debug_assert_eq!(self.tid, other.tid, "cannot merge intervals across chromosomes");
        self.begin = self.begin.min(other.begin);
        self.end = self.end.max(other.end);
    }

    /// Number of positions covered.
    pub fn size(&self) -> u64 {
        (self.end - self.begin) as u64
    }
}

impl fmt::Display for GenomeInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:[{},{})", self.tid, self.begin, self.end)
    }
}
