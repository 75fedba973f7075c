//! # Shell Catalog Module
//!
//! The static, process-wide catalog of residue templates ("shells"):
//! atom sets with default relative geometry, bond graphs with
//! degree-of-freedom flags, block membership, and inter-residue link
//! geometry. Loaded once at start-up and read-only afterwards.

pub mod registry;
