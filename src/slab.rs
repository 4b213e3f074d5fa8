//! Dense storage of loci with reusable slots.
//!
//! Cleared slots are emptied in place and recorded in an ordered free
//! set, so slot indices stay stable for the spatial index and recycling
//! order is deterministic for reproducible serialization. The slab only
//! grows.

use crate::locus::Locus;
use std::collections::BTreeSet;

/// Append-addressable array of loci plus the set of empty slots.
#[derive(Debug, Clone, Default)]
pub struct LocusSlab {
    loci: Vec<Locus>,
    free: BTreeSet<usize>,
}

impl LocusSlab {
    /// Create an empty slab.
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of slots, empty ones included.
    pub fn len(&self) -> usize {
        self.loci.len()
    }

    /// True if the slab has no slots at all.
    pub fn is_empty(&self) -> bool {
        self.loci.is_empty()
    }

    /// Store `locus`, preferring the lowest recycled slot over growth;
    /// returns the slot and stamps it onto the locus.
    pub fn insert(&mut self, mut locus: Locus) -> usize {
        match self.free.pop_first() {
            Some(slot) => {
                locus.set_slot(slot);
                self.loci[slot] = locus;
                slot
            }
            None => {
                let slot = self.loci.len();
                locus.set_slot(slot);
                self.loci.push(locus);
                slot
            }
        }
    }

    /// Empty `slot` in place and mark it reusable.
    pub fn clear_slot(&mut self, slot: usize) {
        self.loci[slot].clear();
        self.free.insert(slot);
    }

    /// Replace `slot` with an empty locus and hand back its contents.
    /// The slot is not freed; the caller decides its fate.
    pub(crate) fn take(&mut self, slot: usize) -> Locus {
        let mut empty = Locus::new();
        empty.set_slot(slot);
        std::mem::replace(&mut self.loci[slot], empty)
    }

    /// The locus at `slot`, if the slot exists (it may be empty).
    pub fn get(&self, slot: usize) -> Option<&Locus> {
        self.loci.get(slot)
    }

    /// Iterate every slot in order, empty loci included.
    pub fn iter(&self) -> impl Iterator<Item = &Locus> {
        self.loci.iter()
    }

    /// Iterate the non-empty loci in slot order.
    pub fn non_empty(&self) -> impl Iterator<Item = &Locus> {
        self.loci.iter().filter(|l| !l.is_empty())
    }

    /// True if `slot` is in the free set.
    pub fn is_free(&self, slot: usize) -> bool {
        self.free.contains(&slot)
    }

    /// Iterate the free slots in ascending order.
    pub fn free_slots(&self) -> impl Iterator<Item = usize> + '_ {
        self.free.iter().copied()
    }
}

impl std::ops::Index<usize> for LocusSlab {
    type Output = Locus;

    fn index(&self, slot: usize) -> &Locus {
        &self.loci[slot]
    }
}

impl std::ops::IndexMut<usize> for LocusSlab {
    fn index_mut(&mut self, slot: usize) -> &mut Locus {
        &mut self.loci[slot]
    }
}
