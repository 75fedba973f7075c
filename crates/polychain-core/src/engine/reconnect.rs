//! Implements rigid reconnection of a detached atom block to an anchor.
//!
//! A [`BlockReconnector`] captures, at construction time, the pose of a
//! block of atoms together with the frame spanned by three anchor atoms.
//! When the anchor atoms later move (through rotations or arbitrary
//! repositioning), the reconnector computes the one rigid transform that
//! carries the captured anchor frame onto its current frame and rebuilds
//! the block's absolute positions from its captured pose. Reconnection is
//! therefore idempotent: it depends only on where the anchor is now, never
//! on where the block drifted to in between.

use crate::core::models::ids::AtomId;
use crate::core::utils::geometry;
use crate::engine::chain::ChainSystem;
use crate::engine::error::ChainError;
use crate::engine::moves::GridUpdatePolicy;
use nalgebra::{Point3, Rotation3, Vector3};
use tracing::debug;

/// Realigns a fixed set of atoms to follow three anchor atoms rigidly.
#[derive(Debug, Clone)]
pub struct BlockReconnector {
    anchor: [AtomId; 3],
    /// The block's pose at capture time.
    block: Vec<(AtomId, Point3<f64>)>,
    original_rotation: Rotation3<f64>,
    original_origin: Point3<f64>,
}

impl BlockReconnector {
    /// Captures the anchor frame and the block's pose as they are now.
    ///
    /// # Arguments
    ///
    /// * `system` - The system the anchor and block atoms live in.
    /// * `anchor` - Three atoms defining a reference frame; they must not
    ///   be collinear.
    /// * `detached` - The atoms to realign on reconnection.
    ///
    /// # Errors
    ///
    /// Fails when an anchor or block atom does not exist, or when the
    /// anchor is geometrically degenerate.
    pub fn new(
        system: &ChainSystem,
        anchor: [AtomId; 3],
        detached: Vec<AtomId>,
    ) -> Result<Self, ChainError> {
        let [p0, p1, p2] = Self::anchor_positions(system, &anchor)?;
        let original_rotation =
            geometry::frame_from_points(&p0, &p1, &p2).ok_or(ChainError::DegenerateAnchor)?;

        let mut block = Vec::with_capacity(detached.len());
        for atom_id in detached {
            let position = system
                .polymer()
                .atom(atom_id)
                .ok_or(ChainError::AtomNotFound)?
                .position;
            block.push((atom_id, position));
        }

        Ok(Self {
            anchor,
            block,
            original_rotation,
            original_origin: p0,
        })
    }

    pub fn anchor(&self) -> &[AtomId; 3] {
        &self.anchor
    }

    /// The atoms this reconnector realigns.
    pub fn block_atoms(&self) -> impl Iterator<Item = AtomId> + '_ {
        self.block.iter().map(|&(id, _)| id)
    }

    /// The rigid transform carrying the captured anchor frame onto the
    /// anchor's current frame, as `p' = rotation * p + translation`.
    pub fn reconnect_transform(
        &self,
        system: &ChainSystem,
    ) -> Result<(Rotation3<f64>, Vector3<f64>), ChainError> {
        let [p0, p1, p2] = Self::anchor_positions(system, &self.anchor)?;
        let current_rotation =
            geometry::frame_from_points(&p0, &p1, &p2).ok_or(ChainError::DegenerateAnchor)?;
        Ok(geometry::rigid_transform_between_frames(
            &self.original_rotation,
            &self.original_origin,
            &current_rotation,
            &p0,
        ))
    }

    /// Moves every block atom to its captured pose re-expressed in the
    /// anchor's current frame.
    ///
    /// If the anchor has not moved since capture this restores the block
    /// exactly, up to floating-point rounding.
    pub fn reconnect(
        &self,
        system: &mut ChainSystem,
        policy: GridUpdatePolicy,
    ) -> Result<(), ChainError> {
        let (rotation, translation) = self.reconnect_transform(system)?;
        debug!(atoms = self.block.len(), "Reconnecting block to anchor frame");
        for &(atom_id, captured) in &self.block {
            let moved = Point3::from(rotation * captured.coords + translation);
            system.set_atom_position(atom_id, moved, policy)?;
        }
        Ok(())
    }

    fn anchor_positions(
        system: &ChainSystem,
        anchor: &[AtomId; 3],
    ) -> Result<[Point3<f64>; 3], ChainError> {
        let mut positions = [Point3::origin(); 3];
        for (slot, &atom_id) in positions.iter_mut().zip(anchor.iter()) {
            *slot = system
                .polymer()
                .atom(atom_id)
                .ok_or(ChainError::AtomNotFound)?
                .position;
        }
        Ok(positions)
    }
}
