//! Property-based tests using proptest.
//!
//! These exercise the algebraic laws of the merge engine (structural
//! idempotence, commutativity for untouching inputs, save/load round
//! trips, and region-query correctness) with a full invariant check as
//! the universal postcondition.

use locusgraph::{GenomeInterval, Locus, LocusEdge, LocusSet, VertexAddr};
use proptest::prelude::*;
use std::collections::BTreeSet;

/// Strategy for a locus of 1..=`max_vertices` chained vertices on `tid`.
/// Vertices may overlap each other; the engine normalizes them.
fn locus_strategy(tid: i32, max_vertices: usize) -> impl Strategy<Value = Locus> {
    prop::collection::vec((0i64..400, 1i64..40), 1..=max_vertices).prop_map(move |spans| {
        let mut locus = Locus::new();
        let mut slots = Vec::new();
        for (begin, len) in spans {
            let v = locus.add_vertex(tid, begin, begin + len);
            locus.set_observations(v, 1);
            slots.push(v);
        }
        for pair in slots.windows(2) {
            locus.add_edge(pair[0], pair[1], 1);
        }
        locus
    })
}

/// Content snapshot invariant under slot relabelling: per-locus sorted
/// vertex and edge multisets, loci sorted.
type Canonical = Vec<(Vec<(GenomeInterval, u64)>, Vec<(usize, usize, LocusEdge)>)>;

fn canonical(set: &LocusSet) -> Canonical {
    let mut loci: Canonical = set
        .loci()
        .map(|locus| {
            let vertices: Vec<_> = locus
                .vertices()
                .map(|(_, v)| (v.interval, v.observations))
                .collect();
            let mut edges: Vec<_> = locus.edges().map(|(f, t, e)| (f, t, *e)).collect();
            edges.sort_by_key(|&(f, t, _)| (f, t));
            (vertices, edges)
        })
        .collect();
    loci.sort();
    loci
}

/// Brute-force reference for the region query.
fn region_by_scan(set: &LocusSet, tid: i32, begin: i64, end: i64) -> BTreeSet<VertexAddr> {
    let probe = GenomeInterval::new(tid, begin, end);
    set.loci()
        .flat_map(|locus| {
            let slot = locus.slot();
            locus
                .vertices()
                .filter(|(_, v)| v.interval.intersects(&probe))
                .map(move |(vertex, _)| VertexAddr::new(slot, vertex))
        })
        .collect()
}

proptest! {
    /// Any sequence of merges leaves every structural invariant intact.
    #[test]
    fn merges_preserve_invariants(
        loci in prop::collection::vec(locus_strategy(0, 4), 1..6),
    ) {
        let mut set = LocusSet::new();
        for locus in loci {
            set.merge_locus(locus).unwrap();
            prop_assert!(set.check_state(true).is_ok());
        }
    }

    /// Re-merging the container's own locus keeps the structure and
    /// doubles every observation count.
    #[test]
    fn remerge_doubles_counts(input in locus_strategy(0, 4)) {
        let mut set = LocusSet::new();
        set.merge_locus(input).unwrap();
        let resident = set.loci().next().unwrap().clone();
        let before = canonical(&set);

        set.merge_locus(resident).unwrap();
        set.check_state(true).unwrap();

        let doubled: Canonical = before
            .into_iter()
            .map(|(vertices, edges)| {
                (
                    vertices.into_iter().map(|(ivl, obs)| (ivl, obs * 2)).collect(),
                    edges
                        .into_iter()
                        .map(|(f, t, e)| (f, t, LocusEdge { observations: e.observations * 2 }))
                        .collect(),
                )
            })
            .collect();
        prop_assert_eq!(canonical(&set), doubled);
    }

    /// Inputs on different chromosomes never touch, so merge order does
    /// not matter structurally.
    #[test]
    fn untouching_merges_commute(
        a in locus_strategy(0, 4),
        b in locus_strategy(1, 4),
    ) {
        let mut forward = LocusSet::new();
        forward.merge_locus(a.clone()).unwrap();
        forward.merge_locus(b.clone()).unwrap();

        let mut backward = LocusSet::new();
        backward.merge_locus(b).unwrap();
        backward.merge_locus(a).unwrap();

        prop_assert_eq!(canonical(&forward), canonical(&backward));
        forward.check_state(true).unwrap();
        backward.check_state(true).unwrap();
    }

    /// Save then load reproduces the container up to slot relabelling.
    #[test]
    fn save_load_round_trips(
        loci in prop::collection::vec(locus_strategy(0, 3), 1..5),
    ) {
        let mut set = LocusSet::with_source("prop");
        for locus in loci {
            set.merge_locus(locus).unwrap();
        }

        let mut buffer = Vec::new();
        set.save(&mut buffer).unwrap();
        let mut loaded = LocusSet::new();
        loaded.load(buffer.as_slice()).unwrap();

        prop_assert_eq!(canonical(&loaded), canonical(&set));
        prop_assert_eq!(loaded.header(), set.header());
    }

    /// The region query returns exactly the brute-force intersection set.
    #[test]
    fn region_query_matches_scan(
        loci in prop::collection::vec(locus_strategy(0, 3), 1..5),
        begin in 0i64..450,
        len in 1i64..60,
    ) {
        let mut set = LocusSet::new();
        for locus in loci {
            set.merge_locus(locus).unwrap();
        }
        let expected = region_by_scan(&set, 0, begin, begin + len);
        prop_assert_eq!(set.get_region_intersect(0, begin, begin + len), expected);
    }
}
