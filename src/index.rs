//! Global spatial index over every vertex of every locus.
//!
//! The index is an ordered set of [`IndexEntry`] values keyed by
//! (interval, address). At rest, entries on one chromosome are pairwise
//! disjoint, so an intersection query is a contiguous run around the
//! probe position: seed at the probe entry, extend forward and backward,
//! and stop at the first non-intersecting entry from an unrelated locus.
//! Entries from the probe's own locus (or from an explicitly filtered
//! locus) may overlap mid-merge and are skipped without terminating the
//! scan.
//!
//! Each entry carries a copy of the referenced vertex's interval; the
//! locus mutators keep the copy exact by erasing and re-inserting
//! entries on every vertex creation, removal, relocation, and interval
//! change.

use crate::interval::GenomeInterval;
use std::collections::BTreeSet;
use std::fmt;

/// Stable address of a vertex: (locus slot, vertex slot).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VertexAddr {
    /// Slot of the owning locus in the slab.
    pub locus: usize,
    /// Slot of the vertex within its locus.
    pub vertex: usize,
}

impl VertexAddr {
    /// Create a new address.
    pub fn new(locus: usize, vertex: usize) -> Self {
        Self { locus, vertex }
    }
}

impl fmt::Display for VertexAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}:{})", self.locus, self.vertex)
    }
}

/// One spatial-index entry: a vertex address keyed by its interval.
///
/// The derived ordering (interval first, address as tiebreak) realizes
/// the index comparator: tid, begin, end, locus slot, vertex slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct IndexEntry {
    /// Interval of the referenced vertex at the time of insertion.
    pub interval: GenomeInterval,
    /// Address of the referenced vertex.
    pub addr: VertexAddr,
}

impl IndexEntry {
    /// Create a new entry.
    pub fn new(interval: GenomeInterval, addr: VertexAddr) -> Self {
        Self { interval, addr }
    }
}

impl fmt::Display for IndexEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.interval, self.addr)
    }
}

/// Ordered set of vertex addresses keyed by interval.
#[derive(Debug, Clone, Default)]
pub struct VertexIndex {
    entries: BTreeSet<IndexEntry>,
}

impl VertexIndex {
    /// Create an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of indexed vertices.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if no vertex is indexed.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Insert an entry. Returns false if it was already present.
    pub fn insert(&mut self, entry: IndexEntry) -> bool {
        self.entries.insert(entry)
    }

    /// Remove an entry. Returns false if it was absent.
    pub fn remove(&mut self, entry: &IndexEntry) -> bool {
        self.entries.remove(entry)
    }

    /// True if the exact entry is present.
    pub fn contains(&self, entry: &IndexEntry) -> bool {
        self.entries.contains(entry)
    }

    /// Iterate entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = &IndexEntry> {
        self.entries.iter()
    }

    /// Drop every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// All entries intersecting `query`, excluding the query's own locus.
    ///
    /// The probe does not require `query` to be present; its key is only
    /// the seed position for the bidirectional extension.
    pub fn find_intersecting(&self, query: IndexEntry) -> BTreeSet<IndexEntry> {
        self.find_intersecting_filtered(query, query.addr.locus)
    }

    /// All entries intersecting `query`, excluding entries whose locus is
    /// `filter_locus`.
    ///
    /// The merge engine probes with the stage slot as the filter, so that
    /// once the input has migrated out of the stage its own entry is
    /// visible to the probe. In each scan direction, entries are handled
    /// as:
    ///
    /// - in `filter_locus`: never yielded, never a terminator;
    /// - intersecting: yielded;
    /// - non-intersecting but in the query's own locus: skipped, since
    ///   only that locus may hold overlapping intervals mid-merge;
    /// - otherwise: terminates the direction.
    pub fn find_intersecting_filtered(
        &self,
        query: IndexEntry,
        filter_locus: usize,
    ) -> BTreeSet<IndexEntry> {
        let mut hits = BTreeSet::new();
        Self::scan(query, filter_locus, self.entries.range(query..), &mut hits);
        Self::scan(
            query,
            filter_locus,
            self.entries.range(..query).rev(),
            &mut hits,
        );
        hits
    }

    fn scan<'a>(
        query: IndexEntry,
        filter_locus: usize,
        entries: impl Iterator<Item = &'a IndexEntry>,
        hits: &mut BTreeSet<IndexEntry>,
    ) {
        for entry in entries {
            if entry.addr.locus == filter_locus {
                continue;
            }
            if entry.interval.intersects(&query.interval) {
                hits.insert(*entry);
            } else if entry.addr.locus != query.addr.locus {
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(tid: i32, begin: i64, end: i64, locus: usize, vertex: usize) -> IndexEntry {
        IndexEntry::new(
            GenomeInterval::new(tid, begin, end),
            VertexAddr::new(locus, vertex),
        )
    }

    fn index_of(entries: &[IndexEntry]) -> VertexIndex {
        let mut index = VertexIndex::new();
        for &e in entries {
            assert!(index.insert(e));
        }
        index
    }

    #[test]
    fn test_insert_remove_contains() {
        let mut index = VertexIndex::new();
        let e = entry(0, 10, 20, 0, 0);
        assert!(index.insert(e));
        assert!(!index.insert(e));
        assert!(index.contains(&e));
        assert!(index.remove(&e));
        assert!(!index.remove(&e));
        assert!(index.is_empty());
    }

    #[test]
    fn test_find_intersecting_excludes_own_locus() {
        let q = entry(0, 20, 40, 2, 0);
        let index = index_of(&[
            entry(0, 0, 10, 0, 0),
            entry(0, 15, 25, 0, 1),
            q,
            entry(0, 35, 50, 1, 0),
            entry(0, 60, 70, 1, 1),
        ]);
        let hits = index.find_intersecting(q);
        let addrs: Vec<VertexAddr> = hits.iter().map(|e| e.addr).collect();
        assert_eq!(addrs, vec![VertexAddr::new(0, 1), VertexAddr::new(1, 0)]);
    }

    #[test]
    fn test_filtered_probe_sees_own_entry() {
        // After migration the probe filters the (empty) stage slot, so the
        // query's own entry must come back along with the true hits.
        let q = entry(0, 20, 40, 0, 2);
        let index = index_of(&[entry(0, 10, 22, 0, 0), q, entry(0, 100, 110, 0, 1)]);
        let hits = index.find_intersecting_filtered(q, 7);
        assert!(hits.contains(&q));
        assert!(hits.contains(&entry(0, 10, 22, 0, 0)));
        assert_eq!(hits.len(), 2);
    }

    #[test]
    fn test_reverse_scan_skips_own_locus_entry() {
        // A non-intersecting entry from the query's own locus sits between
        // the query and a true hit in reverse key order; it must be
        // skipped, not treated as a terminator.
        let q = entry(0, 10, 40, 3, 0);
        let blocker = entry(0, 8, 9, 3, 1); // own locus, no overlap with q
        let hit = entry(0, 5, 15, 1, 0);
        let index = index_of(&[hit, blocker, q, entry(0, 200, 210, 2, 0)]);
        let hits = index.find_intersecting_filtered(q, 9);
        assert!(hits.contains(&hit));
        assert!(hits.contains(&q));
        assert!(!hits.contains(&blocker));
    }

    #[test]
    fn test_scan_stops_at_disjoint_foreign_entry() {
        let q = entry(0, 50, 60, 0, 0);
        let index = index_of(&[
            entry(0, 0, 10, 1, 0), // unreachable: scan breaks at [20,30)
            entry(0, 20, 30, 2, 0),
            q,
            entry(0, 70, 80, 3, 0),
            entry(0, 75, 90, 3, 1), // unreachable in the forward direction
        ]);
        assert!(index.find_intersecting(q).is_empty());
    }

    #[test]
    fn test_probe_does_not_cross_chromosomes() {
        let q = entry(1, 10, 20, 0, 0);
        let index = index_of(&[entry(0, 10, 20, 1, 0), q, entry(2, 10, 20, 2, 0)]);
        assert!(index.find_intersecting(q).is_empty());
    }
}
