//! The locus set: the container owning the slab, the spatial index, and
//! the merge engine.
//!
//! A merge stages the input locus into a slab slot, then walks the input
//! vertices in interval order. Each vertex is probed against the spatial
//! index; on a hit, every involved locus is unified into the
//! lowest-numbered slot and the mutually intersecting vertices are
//! coalesced into one. The stage slot is cleared as soon as the input
//! migrates, so a completed merge leaves either the staged locus itself
//! (no intersections) or a single consolidated locus plus recycled
//! slots.

use crate::error::{LocusError, Result};
use crate::index::{IndexEntry, VertexAddr, VertexIndex};
use crate::interval::GenomeInterval;
use crate::locus::{Locus, LocusVertex};
use crate::slab::LocusSlab;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::io::{Read, Write};
use tracing::{debug, error};

/// On-disk stream format version.
const FORMAT_VERSION: u32 = 1;

/// Header written ahead of the loci by [`LocusSet::save`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocusSetHeader {
    /// Stream format version.
    pub version: u32,
    /// Identifier of this container, reported when a nested merge fails.
    pub source: String,
}

impl Default for LocusSetHeader {
    fn default() -> Self {
        Self {
            version: FORMAT_VERSION,
            source: String::new(),
        }
    }
}

/// A collection of disjoint loci with incremental interval-driven
/// merging, range queries, and persistence.
///
/// # Example
///
/// ```
/// use locusgraph::{Locus, LocusSet};
///
/// let mut set = LocusSet::new();
///
/// let mut a = Locus::new();
/// a.add_vertex(0, 10, 30);
/// set.merge_locus(a).unwrap();
///
/// let mut b = Locus::new();
/// b.add_vertex(0, 20, 40);
/// set.merge_locus(b).unwrap();
///
/// // the overlapping vertices coalesced into one
/// let hits = set.get_region_intersect(0, 0, 1000);
/// assert_eq!(hits.len(), 1);
/// set.check_state(true).unwrap();
/// ```
#[derive(Debug, Clone, Default)]
pub struct LocusSet {
    slab: LocusSlab,
    index: VertexIndex,
    header: LocusSetHeader,
}

impl LocusSet {
    /// Create an empty container.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty container carrying a source identifier.
    pub fn with_source(source: impl Into<String>) -> Self {
        Self {
            header: LocusSetHeader {
                source: source.into(),
                ..LocusSetHeader::default()
            },
            ..Self::default()
        }
    }

    /// The persistence header.
    pub fn header(&self) -> &LocusSetHeader {
        &self.header
    }

    /// Total number of slab slots, empty ones included.
    pub fn slot_count(&self) -> usize {
        self.slab.len()
    }

    /// Number of non-empty loci.
    pub fn locus_count(&self) -> usize {
        self.slab.non_empty().count()
    }

    /// Total number of vertices across all loci.
    pub fn vertex_count(&self) -> usize {
        self.index.len()
    }

    /// The locus at `slot`, if the slot exists (it may be empty).
    pub fn locus(&self, slot: usize) -> Option<&Locus> {
        self.slab.get(slot)
    }

    /// Iterate the non-empty loci in slot order.
    pub fn loci(&self) -> impl Iterator<Item = &Locus> {
        self.slab.non_empty()
    }

    /// The spatial index.
    pub fn index(&self) -> &VertexIndex {
        &self.index
    }

    /// The vertex at `addr`, if it exists.
    pub fn vertex(&self, addr: VertexAddr) -> Option<&LocusVertex> {
        self.slab.get(addr.locus)?.vertex(addr.vertex)
    }

    /// Drop every locus and index entry; the header is kept.
    pub fn clear(&mut self) {
        self.slab = LocusSlab::new();
        self.index.clear();
    }

    /// Merge `input` into the container, fusing it with every existing
    /// locus it intersects.
    ///
    /// An error mid-merge leaves the container structurally valid
    /// (`check_state` passes) but possibly between the pre-merge and
    /// fully consolidated states; callers needing all-or-nothing should
    /// [`save`](Self::save) first.
    pub fn merge_locus(&mut self, mut input: Locus) -> Result<()> {
        if input.is_empty() {
            return Ok(());
        }
        input.merge_self_overlap();

        // left-to-right per chromosome, so index probes are local scans
        let mut order: Vec<(GenomeInterval, usize)> = input
            .vertices()
            .map(|(slot, v)| (v.interval, slot))
            .collect();
        order.sort();

        let input_count = input.vertex_count();
        let stage_slot = self.insert_locus(input);
        let mut head_slot = stage_slot;
        // current vertex slot of each input vertex, maintained across
        // unification offsets and swap-with-last relocations
        let mut cur_slot: Vec<usize> = (0..input_count).collect();
        debug!(stage = stage_slot, vertices = input_count, "staged input locus");

        for (interval, input_vertex) in order {
            let query = IndexEntry::new(
                interval,
                VertexAddr::new(head_slot, cur_slot[input_vertex]),
            );
            let intersect = self.index.find_intersecting_filtered(query, stage_slot);

            if head_slot == stage_slot {
                if intersect.is_empty() {
                    continue;
                }
            } else {
                // once consolidation has started the migrated vertex must
                // see at least its own entry
                if intersect.is_empty() {
                    return Err(LocusError::InvariantViolation(format!(
                        "migrated vertex {} at {} has no index presence",
                        query.addr, interval
                    )));
                }
                debug_assert!(intersect.contains(&query), "self-entry missing from probe");
                if intersect.len() == 1 {
                    continue;
                }
            }

            // unify every involved locus into the lowest slot, stage excluded
            let mut involved: BTreeSet<usize> =
                intersect.iter().map(|e| e.addr.locus).collect();
            involved.insert(head_slot);
            let target = involved
                .iter()
                .copied()
                .find(|&slot| slot != stage_slot)
                .ok_or_else(|| {
                    LocusError::InvariantViolation(format!(
                        "no unification target for vertex at {interval}"
                    ))
                })?;
            for slot in involved {
                if slot == target {
                    continue;
                }
                let offset = self.move_locus(slot, target);
                if slot == head_slot {
                    for current in cur_slot.iter_mut() {
                        *current += offset;
                    }
                }
            }
            head_slot = target;

            // re-probe from the vertex's post-unification address
            let query = IndexEntry::new(
                interval,
                VertexAddr::new(head_slot, cur_slot[input_vertex]),
            );
            let intersect = self.index.find_intersecting_filtered(query, stage_slot);
            if intersect.is_empty() {
                return Err(LocusError::InvariantViolation(format!(
                    "empty intersection after unifying into slot {head_slot} for {interval}"
                )));
            }

            // the anchor covers the probed interval; after unification the
            // input vertex is present verbatim or already absorbed, so a
            // superset entry must exist
            let anchor = intersect
                .iter()
                .copied()
                .find(|e| e.interval.is_superset_of(&interval))
                .ok_or_else(|| {
                    LocusError::InvariantViolation(format!(
                        "no superset anchor for {interval} in slot {head_slot}"
                    ))
                })?;

            // coalesce the rest into the anchor, highest slot first so
            // pending removals stay valid under swap-with-last
            let mut rest: Vec<IndexEntry> = intersect
                .iter()
                .copied()
                .filter(|e| *e != anchor)
                .collect();
            rest.sort_by_key(|e| std::cmp::Reverse((e.addr.vertex, e.addr.locus)));

            let mut anchor_vertex = anchor.addr.vertex;
            for entry in rest {
                debug_assert_eq!(entry.addr.locus, head_slot);
                let (to, from) = if entry.addr.vertex < anchor_vertex {
                    (entry.addr.vertex, anchor_vertex)
                } else {
                    (anchor_vertex, entry.addr.vertex)
                };
                let report = self.slab[head_slot].merge_vertices(from, to, &mut self.index);
                for current in cur_slot.iter_mut() {
                    if *current == from {
                        *current = to;
                    } else if Some(*current) == report.relocated {
                        *current = report.removed;
                    }
                }
                anchor_vertex = to;
            }
        }

        // the input either migrated (stage cleared during unification) or
        // still stands alone in the stage slot
        if head_slot != stage_slot {
            self.clear_locus(stage_slot);
        }
        Ok(())
    }

    /// Fold every locus of `other` into this container.
    ///
    /// Failures are wrapped in [`LocusError::MergeFailure`] naming
    /// `other`'s source and the offending slot.
    pub fn merge_set(&mut self, other: &LocusSet) -> Result<()> {
        for locus in other.loci() {
            if let Err(cause) = self.merge_locus(locus.clone()) {
                let err = LocusError::MergeFailure {
                    source_id: other.header.source.clone(),
                    locus: locus.slot(),
                    cause: Box::new(cause),
                };
                error!(error = %err, "locus set merge failed");
                return Err(err);
            }
        }
        Ok(())
    }

    /// Addresses of all vertices whose interval intersects
    /// `[begin, end)` on `tid`.
    ///
    /// Implemented by staging a synthetic one-vertex locus at the query
    /// interval and probing from it, so the probe seeds at a real index
    /// position; the stage is cleared before returning.
    pub fn get_region_intersect(
        &mut self,
        tid: i32,
        begin: i64,
        end: i64,
    ) -> BTreeSet<VertexAddr> {
        let mut probe = Locus::new();
        probe.add_vertex(tid, begin, end);
        let slot = self.insert_locus(probe);
        let entry = IndexEntry::new(
            GenomeInterval::new(tid, begin, end),
            VertexAddr::new(slot, 0),
        );
        let hits = self
            .index
            .find_intersecting(entry)
            .iter()
            .map(|e| e.addr)
            .collect();
        self.clear_locus(slot);
        hits
    }

    /// Serialize the header, then every non-empty locus in slot order, as
    /// a stream of concatenated JSON values.
    pub fn save<W: Write>(&self, mut writer: W) -> Result<()> {
        serde_json::to_writer(&mut writer, &self.header)
            .map_err(|e| LocusError::Serialization(format!("header: {e}")))?;
        writer
            .write_all(b"\n")
            .map_err(|e| LocusError::Io(e.to_string()))?;
        for locus in self.loci() {
            serde_json::to_writer(&mut writer, locus)
                .map_err(|e| LocusError::Serialization(format!("locus {}: {e}", locus.slot())))?;
            writer
                .write_all(b"\n")
                .map_err(|e| LocusError::Io(e.to_string()))?;
        }
        debug!(loci = self.locus_count(), "saved locus set");
        Ok(())
    }

    /// Replace this container's contents with a stream written by
    /// [`save`](Self::save).
    ///
    /// Loci are assigned fresh slots `0..M-1` in stream order; the
    /// spatial index is rebuilt and a full `check_state(true)` runs
    /// before returning.
    pub fn load<R: Read>(&mut self, reader: R) -> Result<()> {
        self.clear();
        let mut de = serde_json::Deserializer::from_reader(reader);
        self.header = LocusSetHeader::deserialize(&mut de)
            .map_err(|e| LocusError::Serialization(format!("header: {e}")))?;
        if self.header.version != FORMAT_VERSION {
            return Err(LocusError::Serialization(format!(
                "unsupported stream version {}",
                self.header.version
            )));
        }
        for record in de.into_iter::<Locus>() {
            let locus =
                record.map_err(|e| LocusError::Serialization(format!("locus record: {e}")))?;
            if locus.is_empty() {
                continue;
            }
            self.insert_locus(locus);
        }
        debug!(loci = self.locus_count(), "loaded locus set");
        self.check_state(true)
    }

    /// Validate the whole structure.
    ///
    /// Checks that every vertex has exactly its one index entry and vice
    /// versa, that intervals are non-empty, that the free set matches the
    /// empty slots, that each locus is locally consistent, and, when
    /// `check_overlap` is set, that indexed intervals on one chromosome
    /// are pairwise disjoint.
    pub fn check_state(&self, check_overlap: bool) -> Result<()> {
        let mut vertex_total = 0usize;
        for (slot, locus) in self.slab.iter().enumerate() {
            if locus.slot() != slot {
                return Err(LocusError::InvariantViolation(format!(
                    "locus at slot {slot} carries slot identity {}",
                    locus.slot()
                )));
            }
            if locus.is_empty() != self.slab.is_free(slot) {
                return Err(LocusError::InvariantViolation(format!(
                    "slot {slot}: empty={} but free={}",
                    locus.is_empty(),
                    self.slab.is_free(slot)
                )));
            }
            locus.check()?;
            for (vertex, payload) in locus.vertices() {
                let entry =
                    IndexEntry::new(payload.interval, VertexAddr::new(slot, vertex));
                if !self.index.contains(&entry) {
                    return Err(LocusError::InvariantViolation(format!(
                        "missing index entry {entry}"
                    )));
                }
                vertex_total += 1;
            }
        }
        if self.index.len() != vertex_total {
            return Err(LocusError::InvariantViolation(format!(
                "index holds {} entries for {} vertices",
                self.index.len(),
                vertex_total
            )));
        }
        for entry in self.index.iter() {
            let live = self
                .vertex(entry.addr)
                .is_some_and(|v| v.interval == entry.interval);
            if !live {
                return Err(LocusError::InvariantViolation(format!(
                    "stale index entry {entry}"
                )));
            }
        }
        if check_overlap {
            let mut previous: Option<&IndexEntry> = None;
            for entry in self.index.iter() {
                if let Some(prev) = previous {
                    if prev.interval.intersects(&entry.interval) {
                        return Err(LocusError::InvariantViolation(format!(
                            "overlapping index entries {prev} and {entry}"
                        )));
                    }
                }
                previous = Some(entry);
            }
        }
        Ok(())
    }

    /// Write a human-readable rendering of every non-empty locus.
    pub fn dump<W: Write>(&self, mut writer: W) -> Result<()> {
        writeln!(
            writer,
            "LocusSet source='{}' slots={} loci={} vertices={}",
            self.header.source,
            self.slot_count(),
            self.locus_count(),
            self.vertex_count()
        )
        .map_err(|e| LocusError::Io(e.to_string()))?;
        for locus in self.loci() {
            write!(writer, "{locus}").map_err(|e| LocusError::Io(e.to_string()))?;
        }
        Ok(())
    }

    /// Write every vertex intersecting `[begin, end)` on `tid`.
    pub fn dump_region<W: Write>(
        &mut self,
        mut writer: W,
        tid: i32,
        begin: i64,
        end: i64,
    ) -> Result<()> {
        for addr in self.get_region_intersect(tid, begin, end) {
            let vertex = self.vertex(addr).ok_or_else(|| {
                LocusError::InvariantViolation(format!("region hit {addr} has no vertex"))
            })?;
            writeln!(
                writer,
                "{} {} obs={}",
                vertex.interval, addr, vertex.observations
            )
            .map_err(|e| LocusError::Io(e.to_string()))?;
        }
        Ok(())
    }

    /// Write the spatial index in key order.
    pub fn dump_index<W: Write>(&self, mut writer: W) -> Result<()> {
        for entry in self.index.iter() {
            writeln!(writer, "{entry}").map_err(|e| LocusError::Io(e.to_string()))?;
        }
        Ok(())
    }

    /// Write per-slot statistics as tab-separated values, one row per
    /// slab slot (empty slots report zero counts).
    pub fn dump_stats<W: Write>(&self, mut writer: W) -> Result<()> {
        writeln!(
            writer,
            "locusIndex\tnodeCount\tnodeObsCount\tmaxNodeObsCount\tregionSize\t\
             maxRegionSize\tedgeCount\tmaxEdgeCount\tedgeObsCount\tmaxEdgeObsCount"
        )
        .map_err(|e| LocusError::Io(e.to_string()))?;
        for (slot, locus) in self.slab.iter().enumerate() {
            let mut node_obs = 0u64;
            let mut max_node_obs = 0u64;
            let mut region_size = 0u64;
            let mut max_region_size = 0u64;
            let mut edge_count = 0usize;
            let mut max_edge_count = 0usize;
            let mut edge_obs = 0u64;
            let mut max_edge_obs = 0u64;
            for (vertex, payload) in locus.vertices() {
                node_obs += payload.observations;
                max_node_obs = max_node_obs.max(payload.observations);
                region_size += payload.interval.size();
                max_region_size = max_region_size.max(payload.interval.size());
                let mut out_count = 0usize;
                for (_, edge) in locus.out_edges(vertex) {
                    out_count += 1;
                    edge_obs += edge.observations;
                    max_edge_obs = max_edge_obs.max(edge.observations);
                }
                edge_count += out_count;
                max_edge_count = max_edge_count.max(out_count);
            }
            writeln!(
                writer,
                "{slot}\t{}\t{node_obs}\t{max_node_obs}\t{region_size}\t{max_region_size}\t\
                 {edge_count}\t{max_edge_count}\t{edge_obs}\t{max_edge_obs}",
                locus.vertex_count()
            )
            .map_err(|e| LocusError::Io(e.to_string()))?;
        }
        Ok(())
    }

    /// Store `locus` in the slab and index all its vertices.
    fn insert_locus(&mut self, locus: Locus) -> usize {
        let slot = self.slab.insert(locus);
        for (vertex, payload) in self.slab[slot].vertices() {
            self.index
                .insert(IndexEntry::new(payload.interval, VertexAddr::new(slot, vertex)));
        }
        slot
    }

    /// Drop `slot`'s vertices from the index, empty it, and mark it free.
    fn clear_locus(&mut self, slot: usize) {
        for (vertex, payload) in self.slab[slot].vertices() {
            self.index
                .remove(&IndexEntry::new(payload.interval, VertexAddr::new(slot, vertex)));
        }
        self.slab.clear_slot(slot);
    }

    /// Append `from`'s contents onto `to`, retire `from`, and return the
    /// vertex-slot offset of the moved block.
    fn move_locus(&mut self, from: usize, to: usize) -> usize {
        debug_assert_ne!(from, to);
        let source = self.slab.take(from);
        for (vertex, payload) in source.vertices() {
            self.index
                .remove(&IndexEntry::new(payload.interval, VertexAddr::new(from, vertex)));
        }
        let offset = self.slab[to].copy_from(&source, &mut self.index);
        self.slab.clear_slot(from);
        offset
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn locus_of(intervals: &[(i32, i64, i64)]) -> Locus {
        let mut locus = Locus::new();
        for &(tid, begin, end) in intervals {
            let v = locus.add_vertex(tid, begin, end);
            locus.set_observations(v, 1);
        }
        locus
    }

    #[test]
    fn test_first_merge_stays_in_stage_slot() {
        let mut set = LocusSet::new();
        set.merge_locus(locus_of(&[(0, 10, 20)])).unwrap();
        assert_eq!(set.slot_count(), 1);
        assert_eq!(set.locus_count(), 1);
        assert_eq!(set.vertex_count(), 1);
        set.check_state(true).unwrap();
    }

    #[test]
    fn test_empty_input_is_a_noop() {
        let mut set = LocusSet::new();
        set.merge_locus(Locus::new()).unwrap();
        assert_eq!(set.slot_count(), 0);
        assert!(set.index().is_empty());
    }

    #[test]
    fn test_region_probe_stage_is_recycled() {
        let mut set = LocusSet::new();
        set.merge_locus(locus_of(&[(0, 10, 20)])).unwrap();
        let hits = set.get_region_intersect(0, 0, 100);
        assert_eq!(hits.len(), 1);
        // the synthetic stage slot is cleared and back in the free set
        assert_eq!(set.slot_count(), 2);
        assert_eq!(set.locus_count(), 1);
        assert_eq!(set.slab.free_slots().collect::<Vec<_>>(), vec![1]);
        set.check_state(true).unwrap();
    }

    #[test]
    fn test_overlapping_input_is_normalized() {
        // an input whose own vertices overlap must not leave overlapping
        // vertices behind
        let mut set = LocusSet::new();
        set.merge_locus(locus_of(&[(0, 10, 30), (0, 20, 40)])).unwrap();
        assert_eq!(set.vertex_count(), 1);
        let addr = *set.get_region_intersect(0, 0, 100).iter().next().unwrap();
        assert_eq!(
            set.vertex(addr).unwrap().interval,
            GenomeInterval::new(0, 10, 40)
        );
        set.check_state(true).unwrap();
    }

    #[test]
    fn test_dump_stats_has_one_row_per_slot() {
        let mut set = LocusSet::new();
        set.merge_locus(locus_of(&[(0, 10, 20)])).unwrap();
        set.merge_locus(locus_of(&[(0, 15, 25)])).unwrap();
        let mut out = Vec::new();
        set.dump_stats(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        // header plus one row per slot (slot 1 is the cleared stage)
        assert_eq!(lines.len(), 1 + set.slot_count());
        assert!(lines[0].starts_with("locusIndex\tnodeCount"));
        assert!(lines[2].starts_with("1\t0\t0"));
    }
}
