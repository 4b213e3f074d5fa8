//! A locus: one connected subgraph of interval-labeled vertices.
//!
//! Each locus wraps a directed petgraph graph whose node weights are
//! [`LocusVertex`] values and whose edge weights are [`LocusEdge`]
//! observation counts. Vertex slots are the graph's node indices
//! `0..N-1`; removal swaps the last vertex into the freed slot, which is
//! the slot discipline the merge engine is built around
//! (`petgraph::graph::Graph::remove_node` does exactly this).
//!
//! A locus that has been inserted into a container is *registered*: its
//! slot identity is set and every mutation that creates, destroys,
//! relocates, or relabels a vertex must notify the container's
//! [`VertexIndex`], which the registered mutators take as an explicit
//! parameter. A locus still being built by a caller is unregistered and
//! uses the plain builders.

use crate::error::{LocusError, Result};
use crate::index::{IndexEntry, VertexAddr, VertexIndex};
use crate::interval::GenomeInterval;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// A vertex: a genomic interval plus its supporting observation count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocusVertex {
    /// The interval this vertex covers.
    pub interval: GenomeInterval,
    /// Opaque evidence count; summed when vertices coalesce.
    pub observations: u64,
}

/// A directed edge payload. Self-edges are permitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LocusEdge {
    /// Opaque evidence count; summed when parallel paths collapse.
    pub observations: u64,
}

/// Outcome of a vertex merge, describing the swap-with-last removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VertexMergeReport {
    /// Slot of the absorbed vertex (now holding the relocated vertex, if any).
    pub removed: usize,
    /// Previous slot of the vertex swapped into `removed`; `None` when the
    /// absorbed vertex occupied the last slot.
    pub relocated: Option<usize>,
}

/// A connected subgraph of interval-labeled vertices with directed,
/// weighted edges.
///
/// # Example
///
/// ```
/// use locusgraph::Locus;
///
/// let mut locus = Locus::new();
/// let v0 = locus.add_vertex(0, 10, 20);
/// let v1 = locus.add_vertex(0, 100, 110);
/// locus.add_edge(v0, v1, 1);
/// assert_eq!(locus.vertex_count(), 2);
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Locus {
    graph: DiGraph<LocusVertex, LocusEdge>,
    /// Slot identity within the owning container; meaningless until the
    /// locus is inserted, re-assigned on load.
    #[serde(skip)]
    slot: usize,
}

impl Locus {
    /// Create an empty locus.
    pub fn new() -> Self {
        Self::default()
    }

    /// Slot of this locus within its container.
    pub fn slot(&self) -> usize {
        self.slot
    }

    pub(crate) fn set_slot(&mut self, slot: usize) {
        self.slot = slot;
    }

    /// Number of vertices.
    pub fn vertex_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Number of directed edges.
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// True if the locus holds no vertices.
    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    /// The vertex at `slot`, if present.
    pub fn vertex(&self, slot: usize) -> Option<&LocusVertex> {
        self.graph.node_weight(NodeIndex::new(slot))
    }

    /// Iterate vertices as (slot, vertex) in slot order.
    pub fn vertices(&self) -> impl Iterator<Item = (usize, &LocusVertex)> {
        self.graph
            .node_indices()
            .map(|ix| (ix.index(), &self.graph[ix]))
    }

    /// Iterate every directed edge as (from, to, edge).
    pub fn edges(&self) -> impl Iterator<Item = (usize, usize, &LocusEdge)> {
        self.graph
            .edge_references()
            .map(|e| (e.source().index(), e.target().index(), e.weight()))
    }

    /// Iterate the outgoing edges of `slot` as (target, edge).
    pub fn out_edges(&self, slot: usize) -> impl Iterator<Item = (usize, &LocusEdge)> {
        self.graph
            .edges(NodeIndex::new(slot))
            .map(|e| (e.target().index(), e.weight()))
    }

    /// The edge `from -> to`, if present.
    pub fn edge(&self, from: usize, to: usize) -> Option<&LocusEdge> {
        self.graph
            .find_edge(NodeIndex::new(from), NodeIndex::new(to))
            .map(|e| &self.graph[e])
    }

    /// Append a vertex covering `[begin, end)` on `tid` with zero
    /// observations; returns its slot.
    ///
    /// # Panics
    ///
    /// Panics if `begin >= end`.
    pub fn add_vertex(&mut self, tid: i32, begin: i64, end: i64) -> usize {
        let interval = GenomeInterval::new(tid, begin, end);
        self.graph
            .add_node(LocusVertex {
                interval,
                observations: 0,
            })
            .index()
    }

    /// Set the observation count of the vertex at `slot`.
    pub fn set_observations(&mut self, slot: usize, observations: u64) {
        self.graph[NodeIndex::new(slot)].observations = observations;
    }

    /// Add `observations` to the directed edge `from -> to`, creating it
    /// if absent. Self-edges (`from == to`) are allowed.
    pub fn add_edge(&mut self, from: usize, to: usize, observations: u64) {
        let (a, b) = (NodeIndex::new(from), NodeIndex::new(to));
        match self.graph.find_edge(a, b) {
            Some(e) => self.graph[e].observations += observations,
            None => {
                self.graph.add_edge(a, b, LocusEdge { observations });
            }
        }
    }

    /// Append every vertex and edge of `other`, translating edge targets
    /// to the new slots; returns the slot offset of the appended block.
    ///
    /// `other` is not modified. Must only be called on a registered
    /// locus: each appended vertex is announced to `index`.
    pub fn copy_from(&mut self, other: &Locus, index: &mut VertexIndex) -> usize {
        let offset = self.graph.node_count();
        for ix in other.graph.node_indices() {
            let vertex = other.graph[ix];
            let slot = self.graph.add_node(vertex).index();
            debug_assert_eq!(slot, offset + ix.index());
            index.insert(IndexEntry::new(
                vertex.interval,
                VertexAddr::new(self.slot, slot),
            ));
        }
        for e in other.graph.edge_references() {
            self.graph.add_edge(
                NodeIndex::new(offset + e.source().index()),
                NodeIndex::new(offset + e.target().index()),
                *e.weight(),
            );
        }
        offset
    }

    /// Merge the vertex at `from` into the vertex at `to`.
    ///
    /// `to`'s interval becomes the union, its observation count gains
    /// `from`'s, and `from`'s edges are re-targeted onto `to`, summed
    /// with any existing edge to the same peer (edges between the pair
    /// collapse into a self-edge). `from` is then removed; the last
    /// vertex is swapped into its slot, as recorded in the returned
    /// report.
    ///
    /// Must only be called on a registered locus; all entry updates are
    /// pushed into `index`.
    ///
    /// # Panics
    ///
    /// Panics unless `to < from`; the merge target must keep the lower,
    /// stable slot.
    pub fn merge_vertices(
        &mut self,
        from: usize,
        to: usize,
        index: &mut VertexIndex,
    ) -> VertexMergeReport {
        let from_interval = self.graph[NodeIndex::new(from)].interval;
        let to_old = self.graph[NodeIndex::new(to)].interval;
        let last = self.graph.node_count() - 1;
        let moved_interval = (from != last).then(|| self.graph[NodeIndex::new(last)].interval);

        let report = self.merge_vertices_inner(from, to);

        let to_new = self.graph[NodeIndex::new(to)].interval;
        index.remove(&IndexEntry::new(to_old, VertexAddr::new(self.slot, to)));
        index.insert(IndexEntry::new(to_new, VertexAddr::new(self.slot, to)));
        index.remove(&IndexEntry::new(
            from_interval,
            VertexAddr::new(self.slot, from),
        ));
        if let Some((old_slot, interval)) = report.relocated.zip(moved_interval) {
            index.remove(&IndexEntry::new(interval, VertexAddr::new(self.slot, old_slot)));
            index.insert(IndexEntry::new(interval, VertexAddr::new(self.slot, from)));
        }
        report
    }

    /// Coalesce mutually intersecting vertices within this locus.
    ///
    /// Inputs handed to the merge engine may carry overlapping vertices;
    /// the engine's intersection protocol assumes the vertices of one
    /// locus are pairwise disjoint once it finishes, so every input is
    /// normalized with this before staging. Must only be called on an
    /// unregistered locus.
    pub fn merge_self_overlap(&mut self) {
        loop {
            let mut order: Vec<(GenomeInterval, usize)> =
                self.vertices().map(|(slot, v)| (v.interval, slot)).collect();
            order.sort();
            let overlap = order
                .windows(2)
                .find(|w| w[0].0.intersects(&w[1].0))
                .map(|w| (w[0].1, w[1].1));
            match overlap {
                Some((a, b)) => {
                    self.merge_vertices_inner(a.max(b), a.min(b));
                }
                None => break,
            }
        }
    }

    fn merge_vertices_inner(&mut self, from: usize, to: usize) -> VertexMergeReport {
        assert!(to < from, "merge target must occupy the lower slot");
        let from_ix = NodeIndex::new(from);
        let to_ix = NodeIndex::new(to);
        debug_assert_eq!(
            self.graph[from_ix].interval.tid,
            self.graph[to_ix].interval.tid,
            "vertex merge requires a shared chromosome"
        );

        let outgoing: Vec<(usize, u64)> = self
            .graph
            .edges(from_ix)
            .map(|e| (e.target().index(), e.weight().observations))
            .collect();
        let incoming: Vec<(usize, u64)> = self
            .graph
            .edges_directed(from_ix, Direction::Incoming)
            .filter(|e| e.source() != from_ix)
            .map(|e| (e.source().index(), e.weight().observations))
            .collect();
        for (target, observations) in outgoing {
            let target = if target == from { to } else { target };
            self.add_edge(to, target, observations);
        }
        for (source, observations) in incoming {
            self.add_edge(source, to, observations);
        }

        let absorbed = self.graph[from_ix];
        self.graph[to_ix].interval.merge(&absorbed.interval);
        self.graph[to_ix].observations += absorbed.observations;

        let last = self.graph.node_count() - 1;
        self.graph.remove_node(from_ix);
        VertexMergeReport {
            removed: from,
            relocated: (from != last).then_some(last),
        }
    }

    pub(crate) fn clear(&mut self) {
        self.graph.clear();
    }

    /// Validate the locus in isolation: intervals are non-empty and no
    /// ordered vertex pair carries more than one edge. (Dangling edge
    /// targets are unrepresentable in the underlying graph.)
    pub fn check(&self) -> Result<()> {
        for (slot, vertex) in self.vertices() {
            if vertex.interval.begin >= vertex.interval.end {
                return Err(LocusError::InvariantViolation(format!(
                    "locus {} vertex {} has empty interval {}",
                    self.slot, slot, vertex.interval
                )));
            }
        }
        let mut seen = HashSet::new();
        for (from, to, _) in self.edges() {
            if !seen.insert((from, to)) {
                return Err(LocusError::InvariantViolation(format!(
                    "locus {} has parallel edges {} -> {}",
                    self.slot, from, to
                )));
            }
        }
        Ok(())
    }
}

impl PartialEq for Locus {
    /// Content equality: same vertices and edges, slot identity ignored.
    fn eq(&self, other: &Self) -> bool {
        self.vertex_count() == other.vertex_count()
            && self.edge_count() == other.edge_count()
            && self.vertices().zip(other.vertices()).all(|(a, b)| a == b)
            && {
                let mut left: Vec<_> = self.edges().map(|(f, t, e)| (f, t, *e)).collect();
                let mut right: Vec<_> = other.edges().map(|(f, t, e)| (f, t, *e)).collect();
                left.sort_by_key(|&(f, t, _)| (f, t));
                right.sort_by_key(|&(f, t, _)| (f, t));
                left == right
            }
    }
}

impl fmt::Display for Locus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "locus {}: {} vertices, {} edges",
            self.slot,
            self.vertex_count(),
            self.edge_count()
        )?;
        for (slot, vertex) in self.vertices() {
            writeln!(
                f,
                "  vertex {} {} obs={}",
                slot, vertex.interval, vertex.observations
            )?;
            for (target, edge) in self.out_edges(slot) {
                writeln!(f, "    -> {} obs={}", target, edge.observations)?;
            }
        }
        Ok(())
    }
}
