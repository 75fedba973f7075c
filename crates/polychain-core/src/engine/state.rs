//! Defines opaque position snapshots for save/restore of chain geometry.

use crate::core::models::ids::AtomId;
use crate::core::utils::geometry;
use crate::engine::chain::ChainSystem;
use nalgebra::Point3;

/// A captured set of atom positions from one chain (or a sub-range of one).
///
/// The snapshot is opaque: callers can only hand it back to
/// [`ChainSystem::restore_state`](crate::engine::chain::ChainSystem::restore_state).
/// It is only meaningful for the system it was captured from.
#[derive(Debug, Clone)]
pub struct ChainSnapshot {
    pub(crate) positions: Vec<(AtomId, Point3<f64>)>,
}

impl ChainSnapshot {
    /// Number of atom positions captured in this snapshot.
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Root-mean-square deviation between the captured positions and the
    /// same atoms' current positions, in angstroms.
    ///
    /// Used to score how far a speculative move drifted before deciding to
    /// roll back. Returns `None` for an empty snapshot or when a captured
    /// atom no longer exists.
    pub fn rmsd_from(&self, system: &ChainSystem) -> Option<f64> {
        let captured: Vec<Point3<f64>> = self.positions.iter().map(|&(_, p)| p).collect();
        let current: Vec<Point3<f64>> = self
            .positions
            .iter()
            .map(|&(id, _)| system.polymer().atom(id).map(|a| a.position))
            .collect::<Option<Vec<_>>>()?;
        geometry::calculate_rmsd(&captured, &current)
    }
}
