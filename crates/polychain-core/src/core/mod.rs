//! # Core Module
//!
//! Fundamental building blocks for polymer-chain modeling: the molecular
//! data structures, the shell catalog that templates residue construction,
//! and the geometry utilities shared by the engine layer.
//!
//! ## Architecture
//!
//! - **Molecular Representation** ([`models`]) - Atoms, bonds, blocks, residues, and the arena that owns them
//! - **Shell Catalog** ([`shells`]) - The static residue/atom/bond template registry
//! - **Utilities** ([`utils`]) - Rotation and rigid-frame geometry, element parameter tables

pub mod models;
pub mod shells;
pub mod utils;
