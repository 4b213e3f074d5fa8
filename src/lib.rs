//! # locusgraph
//!
//! An online, interval-keyed graph-merging engine. The container
//! ([`LocusSet`]) maintains disjoint connected subgraphs ([`Locus`])
//! whose vertices are labeled by non-overlapping genomic intervals.
//! Merging a new locus finds every existing vertex intersecting it,
//! unifies the involved loci into one slab slot, and coalesces each
//! group of mutually intersecting vertices into a single vertex whose
//! interval is the union and whose edges are the weight-summed union.
//!
//! ## Features
//!
//! - **Incremental merging**: loci arrive one at a time; intersections
//!   are discovered through a global spatial index ordered so each
//!   probe is a contiguous scan.
//! - **Stable addressing**: vertices are addressed by
//!   (locus slot, vertex slot); cleared slots are recycled
//!   deterministically.
//! - **Range queries**: all vertices intersecting a region.
//! - **Persistence**: header-plus-loci stream with full revalidation on
//!   load.
//! - **Self-checking**: `check_state` validates every structural
//!   invariant on demand.
//!
//! ## Example
//!
//! ```
//! use locusgraph::{Locus, LocusSet};
//!
//! let mut set = LocusSet::new();
//!
//! // two breakend regions connected by an edge
//! let mut a = Locus::new();
//! let a0 = a.add_vertex(0, 10, 20);
//! let a1 = a.add_vertex(0, 100, 110);
//! a.set_observations(a0, 1);
//! a.add_edge(a0, a1, 1);
//! set.merge_locus(a).unwrap();
//!
//! // overlapping evidence fuses into the same locus
//! let mut b = Locus::new();
//! let b0 = b.add_vertex(0, 15, 25);
//! let b1 = b.add_vertex(0, 105, 115);
//! b.set_observations(b0, 1);
//! b.add_edge(b0, b1, 1);
//! set.merge_locus(b).unwrap();
//!
//! assert_eq!(set.locus_count(), 1);
//! assert_eq!(set.vertex_count(), 2);
//! assert_eq!(set.get_region_intersect(0, 0, 50).len(), 1);
//! set.check_state(true).unwrap();
//! ```

pub mod error;
pub mod index;
pub mod interval;
pub mod io;
pub mod locus;
pub mod set;
pub mod slab;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::error::{LocusError, Result};
    pub use crate::index::{IndexEntry, VertexAddr, VertexIndex};
    pub use crate::interval::GenomeInterval;
    pub use crate::io::{load_locus_set, save_locus_set};
    pub use crate::locus::{Locus, LocusEdge, LocusVertex, VertexMergeReport};
    pub use crate::set::{LocusSet, LocusSetHeader};
    pub use crate::slab::LocusSlab;
}

// Re-export commonly used items at crate root
pub use error::{LocusError, Result};
pub use index::{IndexEntry, VertexAddr, VertexIndex};
pub use interval::GenomeInterval;
pub use locus::{Locus, LocusEdge, LocusVertex};
pub use set::{LocusSet, LocusSetHeader};
