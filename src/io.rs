//! File-level persistence helpers.
//!
//! Thin wrappers over [`LocusSet::save`] and [`LocusSet::load`] that
//! handle file creation and buffering.

use crate::error::{LocusError, Result};
use crate::set::LocusSet;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

/// Write a locus set to a file.
///
/// # Example
///
/// ```no_run
/// use locusgraph::{io::save_locus_set, Locus, LocusSet};
///
/// let mut set = LocusSet::new();
/// let mut locus = Locus::new();
/// locus.add_vertex(0, 10, 20);
/// set.merge_locus(locus).unwrap();
/// save_locus_set(&set, "loci.json").unwrap();
/// ```
pub fn save_locus_set<P: AsRef<Path>>(set: &LocusSet, path: P) -> Result<()> {
    let file = File::create(path.as_ref())
        .map_err(|e| LocusError::Io(format!("failed to create {}: {e}", path.as_ref().display())))?;
    set.save(BufWriter::new(file))
}

/// Read a locus set from a file written by [`save_locus_set`].
///
/// The loaded container is fully validated (`check_state(true)`) before
/// it is returned.
pub fn load_locus_set<P: AsRef<Path>>(path: P) -> Result<LocusSet> {
    let file = File::open(path.as_ref())
        .map_err(|e| LocusError::Io(format!("failed to open {}: {e}", path.as_ref().display())))?;
    let mut set = LocusSet::new();
    set.load(BufReader::new(file))?;
    Ok(set)
}
