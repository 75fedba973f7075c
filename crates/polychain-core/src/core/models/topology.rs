use super::ids::AtomId;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Classifies a bond as a rotatable degree of freedom or a fixed edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum BondKind {
    Fixed,
    Rotatable,
}

impl Default for BondKind {
    fn default() -> Self {
        BondKind::Fixed
    }
}

#[derive(Debug, Error)]
#[error("Invalid bond kind string")]
pub struct ParseBondKindError;

impl FromStr for BondKind {
    type Err = ParseBondKindError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "fixed" | "rigid" => Ok(Self::Fixed),
            "rotatable" | "dof" => Ok(Self::Rotatable),
            _ => Err(ParseBondKindError),
        }
    }
}

impl fmt::Display for BondKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Self::Fixed => "Fixed",
                Self::Rotatable => "Rotatable",
            }
        )
    }
}

/// Which side of a degree-of-freedom bond moves during a rotation.
///
/// `Forward` rotates the `atom2` side of the bond (toward the chain end),
/// `Backward` the `atom1` side (toward the chain start). The rotation axis
/// runs from the stationary endpoint to the moving endpoint, so applying a
/// move and then the same move with a negated angle is an exact inverse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BondDirection {
    Forward,
    Backward,
}

/// An immutable edge between two atoms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Bond {
    pub atom1_id: AtomId, // ID of the first atom
    pub atom2_id: AtomId, // ID of the second atom
    pub kind: BondKind,   // Rotatable degree of freedom or fixed edge
}

impl Bond {
    pub fn new(atom1_id: AtomId, atom2_id: AtomId, kind: BondKind) -> Self {
        Self {
            atom1_id,
            atom2_id,
            kind,
        }
    }

    pub fn contains(&self, atom_id: AtomId) -> bool {
        self.atom1_id == atom_id || self.atom2_id == atom_id
    }

    /// Returns the other endpoint of the bond, or `None` if `atom_id` is
    /// not an endpoint.
    pub fn partner(&self, atom_id: AtomId) -> Option<AtomId> {
        if atom_id == self.atom1_id {
            Some(self.atom2_id)
        } else if atom_id == self.atom2_id {
            Some(self.atom1_id)
        } else {
            None
        }
    }

    pub fn is_rotatable(&self) -> bool {
        self.kind == BondKind::Rotatable
    }
}
