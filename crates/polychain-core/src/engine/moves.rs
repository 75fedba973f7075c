//! Defines the descriptors that drive chain manipulation.
//!
//! A [`ChainMove`] names one rotatable degree of freedom and an angle; it is
//! plain data so that candidate conformations can be serialized, replayed,
//! and inverted. [`GridUpdatePolicy`] decides whether a geometric operation
//! keeps the spatial grids in sync or deliberately leaves them stale.

use crate::core::models::atom::BlockKind;
use crate::core::models::topology::BondDirection;
use serde::{Deserialize, Serialize};

/// A single rotation applied to one degree of freedom of a chain.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChainMove {
    /// Which block's degree-of-freedom list to index into.
    pub block: BlockKind,
    /// Index of the rotatable bond within that block's traversal order.
    pub dof_index: usize,
    /// Which side of the bond moves.
    pub direction: BondDirection,
    /// Rotation angle in degrees; sign follows the right-hand rule.
    pub degrees: f64,
}

impl ChainMove {
    pub fn new(block: BlockKind, dof_index: usize, direction: BondDirection, degrees: f64) -> Self {
        Self {
            block,
            dof_index,
            direction,
            degrees,
        }
    }

    /// Returns the move that exactly undoes this one.
    ///
    /// The rotation axis passes through both bond endpoints, so rotating by
    /// the negated angle about the same bond restores every moved atom.
    pub fn inverse(&self) -> Self {
        Self {
            degrees: -self.degrees,
            ..*self
        }
    }
}

/// Whether a position-changing operation keeps the spatial grids in sync.
///
/// `Skip` is for speculative work: apply a move, score it without touching
/// the grids, and undo it before the next grid-consistent operation runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GridUpdatePolicy {
    /// Relocate every moved atom in its controlling chain's grid.
    Update,
    /// Change positions only; the grids keep their previous view.
    Skip,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inverse_negates_angle_and_keeps_addressing() {
        let mv = ChainMove::new(BlockKind::Backbone, 2, BondDirection::Forward, 35.0);
        let inv = mv.inverse();

        assert_eq!(inv.block, BlockKind::Backbone);
        assert_eq!(inv.dof_index, 2);
        assert_eq!(inv.direction, BondDirection::Forward);
        assert_eq!(inv.degrees, -35.0);
    }

    #[test]
    fn double_inverse_is_identity() {
        let mv = ChainMove::new(BlockKind::Sidechain, 0, BondDirection::Backward, -12.5);
        assert_eq!(mv.inverse().inverse(), mv);
    }
}
