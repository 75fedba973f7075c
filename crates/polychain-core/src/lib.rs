//! # Polychain Core Library
//!
//! A library for kinematic manipulation of hierarchical polymer chains:
//! residue/atom data models, degree-of-freedom rotations about chemical
//! bonds, and spatial-hash collision detection fast enough for iterative
//! conformational search.
//!
//! ## Architectural Philosophy
//!
//! The library is split into two layers with a strict dependency direction:
//!
//! - **[`core`]: The Foundation.** Stateless data models (the [`core::models::system::Polymer`]
//!   arena of atoms, residues, and bonds), the shell catalog that templates
//!   residue construction, and pure geometry utilities.
//!
//! - **[`engine`]: The Logic Core.** The stateful layer that owns the chain
//!   hierarchy: sub-chain ranges over the residue arena, per-chain spatial
//!   grids with O(1) membership maintenance, degree-of-freedom rotation,
//!   self/static collision classification, and rigid block reconnection.
//!
//! The kernel is single-threaded by design: every operation runs to
//! completion before returning, and no caller can observe a partially
//! rotated chain.

pub mod core;
pub mod engine;
