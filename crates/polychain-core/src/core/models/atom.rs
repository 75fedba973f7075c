use super::ids::ResidueId;
use nalgebra::Point3;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Identifies the block a chain atom belongs to.
///
/// Blocks partition a residue into named groups of atoms that are
/// manipulated together: degree-of-freedom caches, atom-traversal caches,
/// and rotation lookups are all keyed by this kind.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum BlockKind {
    /// Main-chain (backbone) block of a residue.
    Backbone,
    /// Side-group block hanging off the backbone.
    Sidechain,
    /// Any other named block (capping groups, prosthetic groups, ...).
    #[default]
    Other,
}

/// Represents an atom of a polymer chain.
///
/// An atom is a point mass with a position, a covalent and a van-der-Waals
/// radius class, and an active flag. Inactive atoms stay structurally
/// present (bonds, blocks, grid registration) but are excluded from every
/// collision scan. The position is never mutated directly by callers;
/// all position changes go through the owning chain system so that grid
/// membership stays consistent.
#[derive(Debug, Clone, PartialEq)]
pub struct Atom {
    /// The name of the atom within its residue (e.g., "CA", "N").
    pub name: String,
    /// The chemical element symbol (e.g., "C", "N", "S").
    pub element: String,
    /// The ID of the parent residue this atom belongs to.
    pub residue_id: ResidueId,
    /// The block this atom belongs to within its residue.
    pub role: BlockKind,
    /// The 3D coordinates of the atom in Angstroms.
    pub position: Point3<f64>,
    /// The covalent radius in Angstroms, used for hard-overlap detection.
    pub covalent_radius: f64,
    /// The van-der-Waals radius in Angstroms, used for scaled soft-overlap detection.
    pub vdw_radius: f64,
    /// Whether the atom participates in collision scans.
    pub active: bool,
}

impl Atom {
    /// Creates a new active `Atom` with zero radii and the default role.
    ///
    /// Radii and role are normally filled in from the shell catalog right
    /// after construction.
    ///
    /// # Arguments
    ///
    /// * `name` - The name of the atom.
    /// * `residue_id` - The ID of the residue this atom belongs to.
    /// * `position` - The 3D coordinates of the atom.
    pub fn new(name: &str, residue_id: ResidueId, position: Point3<f64>) -> Self {
        Self {
            name: name.to_string(),
            element: String::new(),
            residue_id,
            role: BlockKind::default(),
            position,
            covalent_radius: 0.0,
            vdw_radius: 0.0,
            active: true,
        }
    }
}

impl FromStr for BlockKind {
    type Err = ();

    /// Parses a string into a `BlockKind`.
    ///
    /// Case-insensitive; supports the common separators for "side-chain".
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "backbone" => Ok(BlockKind::Backbone),
            "sidechain" | "side-chain" | "side_chain" => Ok(BlockKind::Sidechain),
            "other" => Ok(BlockKind::Other),
            _ => Err(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::ids::ResidueId;
    use nalgebra::Point3;

    #[test]
    fn new_atom_has_expected_default_fields() {
        let residue_id = ResidueId::default();
        let atom = Atom::new("CA", residue_id, Point3::new(1.0, 2.0, 3.0));

        assert_eq!(atom.name, "CA");
        assert_eq!(atom.element, "");
        assert_eq!(atom.residue_id, residue_id);
        assert_eq!(atom.position, Point3::new(1.0, 2.0, 3.0));
        assert_eq!(atom.role, BlockKind::Other);
        assert_eq!(atom.covalent_radius, 0.0);
        assert_eq!(atom.vdw_radius, 0.0);
        assert!(atom.active);
    }

    #[test]
    fn atom_equality_and_clone_works() {
        let residue_id = ResidueId::default();
        let mut atom1 = Atom::new("N", residue_id, Point3::new(0.0, 0.0, 0.0));
        atom1.role = BlockKind::Backbone;
        let atom2 = atom1.clone();
        assert_eq!(atom1, atom2);
    }

    #[test]
    fn from_str_parses_valid_kinds() {
        assert_eq!(BlockKind::from_str("backbone"), Ok(BlockKind::Backbone));
        assert_eq!(BlockKind::from_str("sidechain"), Ok(BlockKind::Sidechain));
        assert_eq!(BlockKind::from_str("side-chain"), Ok(BlockKind::Sidechain));
        assert_eq!(BlockKind::from_str("side_chain"), Ok(BlockKind::Sidechain));
        assert_eq!(BlockKind::from_str("other"), Ok(BlockKind::Other));
    }

    #[test]
    fn from_str_is_case_insensitive() {
        assert_eq!(BlockKind::from_str("BACKBONE"), Ok(BlockKind::Backbone));
        assert_eq!(BlockKind::from_str("SideChain"), Ok(BlockKind::Sidechain));
    }

    #[test]
    fn from_str_returns_err_for_invalid_kind() {
        assert_eq!(BlockKind::from_str("foo"), Err(()));
        assert_eq!(BlockKind::from_str(""), Err(()));
    }
}
