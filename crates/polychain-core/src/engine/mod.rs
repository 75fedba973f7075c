//! # Engine Module
//!
//! The stateful layer that owns a chain hierarchy and keeps it consistent
//! while it is reshaped: sub-chain ranges over the residue arena, per-chain
//! spatial grids, degree-of-freedom rotation, collision classification, and
//! rigid block reconnection.
//!
//! ## Architecture
//!
//! - **Chain Hierarchy** ([`chain`]) - The [`chain::ChainSystem`]: residue construction, finalize, sub-chains, rotation, attach/detach
//! - **Spatial Grid** ([`grid`]) - Uniform spatial hash with O(1) membership maintenance
//! - **Collision Queries** ([`collision`]) - Self/static classification, proximity and occupancy queries
//! - **Reconnection** ([`reconnect`]) - Rigid realignment of a detached block to its anchor frame
//! - **Move Descriptors** ([`moves`]) - The serializable unit of rotational work
//! - **Snapshots** ([`state`]) - Opaque position captures for try-then-roll-back patterns
//! - **Error Handling** ([`error`]) - One error variant per structural invariant

pub mod chain;
pub mod collision;
pub mod error;
pub mod grid;
pub mod moves;
pub mod reconnect;
pub mod state;
