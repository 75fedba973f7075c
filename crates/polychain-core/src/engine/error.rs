//! Defines the error types for chain construction and manipulation.
//!
//! Every structural invariant the engine enforces maps to its own variant,
//! so callers can match on the precise failure instead of parsing messages.

use crate::core::models::atom::BlockKind;
use thiserror::Error;

/// Errors that can occur while building or manipulating a chain system.
#[derive(Debug, Error)]
pub enum ChainError {
    /// An operation that requires a finalized chain was called before `finalize`.
    #[error("Chain is not finalized; call finalize() before manipulating it")]
    NotFinalized,

    /// A construction-phase operation was called after `finalize`.
    #[error("Chain is already finalized; no further residues can be added")]
    AlreadyFinalized,

    /// A requested sub-chain range overlaps an existing sibling sub-chain.
    #[error("Sub-chain range [{start}, {end}] overlaps an existing sibling sub-chain")]
    OverlappingSubchain { start: usize, end: usize },

    /// A residue range does not fit within the target chain.
    #[error("Residue range [{start}, {end}] is out of bounds for a chain of {len} residues")]
    RangeOutOfBounds { start: usize, end: usize, len: usize },

    /// A residue transfer was requested for residues the chain does not control.
    #[error("Residue range [{start}, {end}] is not controlled by the expected chain")]
    UnownedRange { start: usize, end: usize },

    /// A residue transfer was requested on a chain with no parent.
    #[error("The root chain has no parent to exchange residues with")]
    NoParent,

    /// A residue template name was not found in the shell registry.
    #[error("Residue shell '{name}' is not present in the registry")]
    UnknownShell { name: String },

    /// A residue template is internally inconsistent.
    #[error("Residue shell '{shell}' is malformed: {message}")]
    MalformedShell { shell: String, message: String },

    /// An explicit position override omitted one of the template's atoms.
    #[error("Position override for shell '{shell}' is missing atom '{atom}'")]
    MissingOverride { shell: String, atom: String },

    /// A rotation addressed a degree of freedom the chain does not have.
    #[error("Degree-of-freedom index {index} is out of range for the {block:?} block")]
    DofOutOfRange { block: BlockKind, index: usize },

    /// A chain identifier does not name a live chain in this system.
    #[error("Chain identifier does not refer to a chain in this system")]
    InvalidChain,

    /// An atom identifier does not name a live atom in this system.
    #[error("Atom identifier does not refer to an atom in this system")]
    AtomNotFound,

    /// The three anchor atoms of a reconnector are collinear or coincident.
    #[error("Anchor atoms are degenerate and do not define an orientation frame")]
    DegenerateAnchor,

    /// An unexpected internal state, indicating a bug in the engine.
    #[error("Internal error: {0}")]
    Internal(String),
}
