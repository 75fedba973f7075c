//! # Core Models Module
//!
//! Data structures representing a polymer at rest: atoms, bonds, blocks,
//! residues, and the [`system::Polymer`] arena that owns all of them.
//!
//! ## Key Components
//!
//! - [`atom`] - Individual atom representation with position, radii, and block role
//! - [`topology`] - Immutable bond edges and rotation direction semantics
//! - [`residue`] - Residues and the named atom blocks they aggregate
//! - [`system`] - The arena owning every atom, residue, and bond, plus the bond-graph queries
//! - [`ids`] - Stable identifier types for atoms, residues, and chain nodes

pub mod atom;
pub mod ids;
pub mod residue;
pub mod system;
pub mod topology;
