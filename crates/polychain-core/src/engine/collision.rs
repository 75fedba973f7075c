//! Implements collision detection and spatial queries over a chain system.
//!
//! All queries read the grids' registered positions rather than the arena:
//! the grids are the collision engine's view of the world, and a move made
//! under [`GridUpdatePolicy::Skip`](crate::engine::moves::GridUpdatePolicy)
//! stays invisible here until a grid-updating operation runs.
//!
//! A found pair is classified by where the partner residue sits: *self*
//! when it lies inside the querying chain's residue span, *static* when it
//! belongs to the rest of the molecule. Two atoms collide when their
//! covalent spheres overlap (direct bond partners excluded) or when their
//! van der Waals spheres scaled by the clash factor overlap (pairs within
//! the bonded exclusion distance excluded). Inactive atoms never collide.

use crate::core::models::atom::Atom;
use crate::core::models::ids::{AtomId, ChainId};
use crate::core::utils::geometry;
use crate::engine::chain::ChainSystem;
use crate::engine::error::ChainError;
use crate::engine::grid::CellCoord;
use itertools::Itertools;
use nalgebra::Point3;
use std::collections::HashSet;

/// Which class of collision a query looks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollisionKind {
    /// Partner outside the querying chain's residue span.
    Static,
    /// Partner inside the querying chain's residue span.
    SelfChain,
    /// Either class.
    Any,
}

/// A coarse map of which grid cells a chain's atoms can reach.
///
/// Cells are marked occupied when any registered atom's van der Waals
/// sphere intersects them; the bounds extend one cell beyond the occupied
/// region on every axis.
#[derive(Debug, Clone)]
pub struct OccupancyMap {
    cell_size: f64,
    min: CellCoord,
    max: CellCoord,
    occupied: HashSet<CellCoord>,
}

impl OccupancyMap {
    pub fn cell_size(&self) -> f64 {
        self.cell_size
    }

    /// Inclusive cell bounds of the mapped region.
    pub fn bounds(&self) -> (CellCoord, CellCoord) {
        (self.min, self.max)
    }

    pub fn is_occupied(&self, cell: &CellCoord) -> bool {
        self.occupied.contains(cell)
    }

    pub fn occupied_cells(&self) -> impl Iterator<Item = &CellCoord> {
        self.occupied.iter()
    }

    pub fn occupied_count(&self) -> usize {
        self.occupied.len()
    }
}

impl ChainSystem {
    /// True if any atom in the (optionally range-restricted) chain collides
    /// with an atom outside the chain's residue span.
    pub fn in_static_collision(
        &self,
        chain: ChainId,
        range: Option<(usize, usize)>,
    ) -> Result<bool, ChainError> {
        Ok(self.find_collision(chain, CollisionKind::Static, range)?.is_some())
    }

    /// True if any two atoms inside the chain's residue span collide.
    pub fn in_self_collision(
        &self,
        chain: ChainId,
        range: Option<(usize, usize)>,
    ) -> Result<bool, ChainError> {
        Ok(self.find_collision(chain, CollisionKind::SelfChain, range)?.is_some())
    }

    /// True if any atom in the chain collides with anything at all.
    pub fn in_any_collision(
        &self,
        chain: ChainId,
        range: Option<(usize, usize)>,
    ) -> Result<bool, ChainError> {
        Ok(self.find_collision(chain, CollisionKind::Any, range)?.is_some())
    }

    /// The first colliding pair found, or `None` when the chain is clear.
    ///
    /// The first element of the pair is always the atom from the scanned
    /// range. `range` is local to the chain and inclusive; `None` scans the
    /// whole span.
    pub fn find_collision(
        &self,
        chain: ChainId,
        kind: CollisionKind,
        range: Option<(usize, usize)>,
    ) -> Result<Option<(AtomId, AtomId)>, ChainError> {
        let pairs = self.scan_collisions(chain, kind, range, true)?;
        Ok(pairs.into_iter().next())
    }

    /// Every colliding pair in the scanned range, deduplicated.
    ///
    /// Pairs are canonicalized so a collision found from both of its
    /// endpoints is reported once.
    pub fn all_collisions(
        &self,
        chain: ChainId,
        kind: CollisionKind,
        range: Option<(usize, usize)>,
    ) -> Result<Vec<(AtomId, AtomId)>, ChainError> {
        let pairs = self.scan_collisions(chain, kind, range, false)?;
        Ok(pairs
            .into_iter()
            .map(|(a, b)| if b < a { (b, a) } else { (a, b) })
            .unique()
            .collect())
    }

    /// Every atom registered within `distance` of a point, across all
    /// grids. Pure proximity: active flags and bonding are ignored.
    pub fn atoms_near_point(&self, point: &Point3<f64>, distance: f64) -> Vec<AtomId> {
        let cell_size = self.config().cell_size;
        let cell = CellCoord::from_position(point, cell_size);
        let delta = (distance / cell_size).floor() as i32 + 1;
        let dist_sq = distance * distance;

        let mut found = Vec::new();
        for (_, node) in self.chains() {
            for candidate in node.grid().candidates_near(cell, delta) {
                if let Some(position) = node.grid().position(candidate) {
                    if (position - point).norm_squared() <= dist_sq {
                        found.push(candidate);
                    }
                }
            }
        }
        found
    }

    /// Builds the coarse occupancy map of one chain's grid, or `None` when
    /// the chain controls no atoms.
    pub fn occupancy(&self, chain: ChainId) -> Result<Option<OccupancyMap>, ChainError> {
        let node = self.node(chain).ok_or(ChainError::InvalidChain)?;
        let grid = node.grid();
        let Some((lo, hi)) = grid.occupied_bounds() else {
            return Ok(None);
        };
        let cell_size = grid.cell_size();

        let mut occupied = HashSet::new();
        for (atom_id, position) in grid.iter_atoms() {
            let Some(atom) = self.polymer().atom(atom_id) else {
                continue;
            };
            let home = CellCoord::from_position(position, cell_size);
            // The cell side is at least one atom diameter, so a sphere can
            // only reach the 27-cell neighborhood of its home cell.
            for dx in -1..=1 {
                for dy in -1..=1 {
                    for dz in -1..=1 {
                        let cell = home.offset(dx, dy, dz);
                        if geometry::sphere_intersects_cell(
                            position,
                            atom.vdw_radius,
                            &cell.min_corner(cell_size),
                            cell_size,
                        ) {
                            occupied.insert(cell);
                        }
                    }
                }
            }
        }

        Ok(Some(OccupancyMap {
            cell_size,
            min: lo.offset(-1, -1, -1),
            max: hi.offset(1, 1, 1),
            occupied,
        }))
    }

    /// World-space axis-aligned bounding box of a chain's occupied cells.
    pub fn global_bounding_box(
        &self,
        chain: ChainId,
    ) -> Result<Option<(Point3<f64>, Point3<f64>)>, ChainError> {
        let node = self.node(chain).ok_or(ChainError::InvalidChain)?;
        let grid = node.grid();
        Ok(grid.occupied_bounds().map(|(lo, hi)| {
            let cell_size = grid.cell_size();
            (lo.min_corner(cell_size), hi.offset(1, 1, 1).min_corner(cell_size))
        }))
    }

    fn scan_collisions(
        &self,
        chain: ChainId,
        kind: CollisionKind,
        range: Option<(usize, usize)>,
        stop_at_first: bool,
    ) -> Result<Vec<(AtomId, AtomId)>, ChainError> {
        if !self.is_finalized() {
            return Err(ChainError::NotFinalized);
        }
        let node = self.node(chain).ok_or(ChainError::InvalidChain)?;
        let (span_start, span_len) = (node.start(), node.len());
        let (start, end) = match range {
            None => {
                if span_len == 0 {
                    return Ok(Vec::new());
                }
                (0, span_len - 1)
            }
            Some((s, e)) => {
                if s > e || e >= span_len {
                    return Err(ChainError::RangeOutOfBounds {
                        start: s,
                        end: e,
                        len: span_len,
                    });
                }
                (s, e)
            }
        };

        let mut found = Vec::new();
        for local in start..=end {
            let Some(residue_id) = self.polymer().residue_at(span_start + local) else {
                continue;
            };
            let Some(residue) = self.polymer().residue(residue_id) else {
                continue;
            };
            for &atom_id in residue.atoms() {
                self.collisions_for_atom(
                    atom_id,
                    span_start,
                    span_len,
                    kind,
                    stop_at_first,
                    &mut found,
                );
                if stop_at_first && !found.is_empty() {
                    return Ok(found);
                }
            }
        }
        Ok(found)
    }

    fn collisions_for_atom(
        &self,
        atom_id: AtomId,
        span_start: usize,
        span_len: usize,
        kind: CollisionKind,
        stop_at_first: bool,
        out: &mut Vec<(AtomId, AtomId)>,
    ) {
        let Some(atom) = self.polymer().atom(atom_id) else {
            return;
        };
        if !atom.active {
            return;
        }
        let Some(position) = self.registered_position(atom_id) else {
            return;
        };
        let cell = CellCoord::from_position(&position, self.config().cell_size);
        let delta = self.config().search_delta();

        for (_, node) in self.chains() {
            for candidate in node.grid().candidates_near(cell, delta) {
                if candidate == atom_id {
                    continue;
                }
                let Some(other) = self.polymer().atom(candidate) else {
                    continue;
                };
                if !other.active {
                    continue;
                }
                let Some(partner_index) = self.polymer().residue_index(other.residue_id) else {
                    continue;
                };
                let is_self =
                    partner_index >= span_start && partner_index < span_start + span_len;
                match kind {
                    CollisionKind::Static if is_self => continue,
                    CollisionKind::SelfChain if !is_self => continue,
                    _ => {}
                }
                let Some(other_position) = node.grid().position(candidate) else {
                    continue;
                };
                if self.atoms_overlap(atom_id, &position, atom, candidate, &other_position, other)
                {
                    out.push((atom_id, candidate));
                    if stop_at_first {
                        return;
                    }
                }
            }
        }
    }

    /// The collision engine's view of an atom: the position registered in
    /// its controller's grid, falling back to the arena.
    fn registered_position(&self, atom_id: AtomId) -> Option<Point3<f64>> {
        let atom = self.polymer().atom(atom_id)?;
        self.controller_of(atom.residue_id)
            .and_then(|owner| self.node(owner))
            .and_then(|node| node.grid().position(atom_id))
            .or(Some(atom.position))
    }

    fn atoms_overlap(
        &self,
        a_id: AtomId,
        a_pos: &Point3<f64>,
        a: &Atom,
        b_id: AtomId,
        b_pos: &Point3<f64>,
        b: &Atom,
    ) -> bool {
        let dist_sq = (a_pos - b_pos).norm_squared();

        let covalent = a.covalent_radius + b.covalent_radius;
        if dist_sq < covalent * covalent && !self.polymer().within_bond_distance(a_id, b_id, 1) {
            return true;
        }

        let vdw = self.config().clash_factor * (a.vdw_radius + b.vdw_radius);
        dist_sq < vdw * vdw
            && !self
                .polymer()
                .within_bond_distance(a_id, b_id, self.config().bonded_exclusion)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::shells::registry::ShellRegistry;
    use crate::engine::grid::GridConfig;
    use crate::engine::moves::GridUpdatePolicy;
    use std::collections::HashMap;

    const CHAIN_SHELLS: &str = r#"
[AA]
atoms = [
  { name = "N",  element = "N", position = [0.0, 0.0, 0.0], block = "backbone" },
  { name = "CA", element = "C", position = [1.5, 0.0, 0.0], block = "backbone" },
  { name = "C",  element = "C", position = [3.0, 0.0, 0.0], block = "backbone" },
  { name = "CB", element = "C", position = [1.5, 1.5, 0.0], block = "sidechain" },
]
bonds = [
  { a = "N",  b = "CA", rotatable = true },
  { a = "CA", b = "C",  rotatable = true },
  { a = "CA", b = "CB" },
]
start_atoms = { backbone = "N", sidechain = "CB" }
link = { tail = "C", head = "N", offset = [1.4, 0.0, 0.0] }
"#;

    const ION_SHELLS: &str = r#"
[ION]
atoms = [
  { name = "X", element = "C", position = [0.0, 0.0, 0.0], block = "other", covalent_radius = 1.0, vdw_radius = 1.0 },
]
bonds = []
"#;

    fn chain_system(residues: usize) -> ChainSystem {
        let registry = ShellRegistry::from_toml_str(CHAIN_SHELLS).unwrap();
        let config = GridConfig::from_registry(&registry, 0.8);
        let mut system = ChainSystem::new(registry, config);
        for _ in 0..residues {
            system.add_residue("AA", None).unwrap();
        }
        system.finalize().unwrap();
        system
    }

    /// Two unbonded single-atom residues at a controlled separation.
    fn ion_pair(separation: f64) -> (ChainSystem, AtomId, AtomId) {
        let registry = ShellRegistry::from_toml_str(ION_SHELLS).unwrap();
        let config = GridConfig::from_registry(&registry, 0.8);
        let mut system = ChainSystem::new(registry, config);
        let first = system.add_residue("ION", None).unwrap();
        let overrides = HashMap::from([(
            "X".to_string(),
            Point3::new(separation, 0.0, 0.0),
        )]);
        let second = system.add_residue("ION", Some(&overrides)).unwrap();
        system.finalize().unwrap();

        let a = system.polymer().residue(first).unwrap().atoms()[0];
        let b = system.polymer().residue(second).unwrap().atoms()[0];
        (system, a, b)
    }

    #[test]
    fn extended_chain_is_collision_free() {
        let system = chain_system(10);
        let root = system.root();

        assert!(!system.in_any_collision(root, None).unwrap());
        assert!(system.all_collisions(root, CollisionKind::Any, None).unwrap().is_empty());
    }

    #[test]
    fn covalent_overlap_between_unbonded_atoms_collides() {
        let (system, a, b) = ion_pair(1.5);
        let root = system.root();

        let pairs = system.all_collisions(root, CollisionKind::Any, None).unwrap();
        let expected = if b < a { (b, a) } else { (a, b) };
        assert_eq!(pairs, vec![expected]);

        // Both residues sit in the root's span, so the pair is a self collision.
        assert!(system.in_self_collision(root, None).unwrap());
        assert!(!system.in_static_collision(root, None).unwrap());
    }

    #[test]
    fn separated_atoms_do_not_collide() {
        let (system, _, _) = ion_pair(2.1);
        let root = system.root();
        // Just past the covalent sum (2.0) and the scaled vdW sum (1.6).
        assert!(!system.in_any_collision(root, None).unwrap());
    }

    #[test]
    fn classification_depends_on_the_querying_chain() {
        let (mut system, _, _) = ion_pair(1.5);
        let root = system.root();
        let sub = system.subchain(root, 1, 1).unwrap();

        // From the sub-chain the partner lies outside its span.
        assert!(system.in_static_collision(sub, None).unwrap());
        assert!(!system.in_self_collision(sub, None).unwrap());

        // Every collision is either self or static, never both.
        let any = system.all_collisions(sub, CollisionKind::Any, None).unwrap();
        let stat = system.all_collisions(sub, CollisionKind::Static, None).unwrap();
        let selfc = system.all_collisions(sub, CollisionKind::SelfChain, None).unwrap();
        assert_eq!(any.len(), stat.len() + selfc.len());
        assert_eq!(any, stat);
    }

    #[test]
    fn bonded_atoms_are_excluded_from_collision() {
        // Adjacent backbone atoms overlap at full radii but are bonded.
        let system = chain_system(2);
        let root = system.root();
        assert!(!system.in_any_collision(root, None).unwrap());
    }

    #[test]
    fn inactive_atoms_never_collide() {
        let (mut system, a, _) = ion_pair(1.5);
        let root = system.root();

        system.set_atom_active(a, false).unwrap();
        assert!(!system.in_any_collision(root, None).unwrap());

        system.set_atom_active(a, true).unwrap();
        assert!(system.in_any_collision(root, None).unwrap());
    }

    #[test]
    fn skipped_moves_are_invisible_until_the_grid_updates() {
        let (mut system, _, b) = ion_pair(10.0);
        let root = system.root();
        assert!(!system.in_any_collision(root, None).unwrap());

        system
            .set_atom_position(b, Point3::new(1.5, 0.0, 0.0), GridUpdatePolicy::Skip)
            .unwrap();
        assert!(!system.in_any_collision(root, None).unwrap());

        system
            .set_atom_position(b, Point3::new(1.5, 0.0, 0.0), GridUpdatePolicy::Update)
            .unwrap();
        assert!(system.in_any_collision(root, None).unwrap());
    }

    #[test]
    fn range_restricted_scan_only_sees_its_residues() {
        let (system, _, _) = ion_pair(1.5);
        let root = system.root();

        assert!(system.in_any_collision(root, Some((0, 0))).unwrap());
        assert!(system.in_any_collision(root, Some((1, 1))).unwrap());
        assert!(matches!(
            system.in_any_collision(root, Some((1, 2))),
            Err(ChainError::RangeOutOfBounds { .. })
        ));
    }

    #[test]
    fn atoms_near_point_filters_by_distance() {
        let (system, a, b) = ion_pair(10.0);

        let near_a = system.atoms_near_point(&Point3::new(0.5, 0.0, 0.0), 1.0);
        assert_eq!(near_a, vec![a]);

        let near_none = system.atoms_near_point(&Point3::new(5.0, 0.0, 0.0), 1.0);
        assert!(near_none.is_empty());

        let mut near_both = system.atoms_near_point(&Point3::new(5.0, 0.0, 0.0), 6.0);
        near_both.sort();
        let mut expected = vec![a, b];
        expected.sort();
        assert_eq!(near_both, expected);
    }

    #[test]
    fn occupancy_marks_cells_reached_by_vdw_spheres() {
        let (system, _, _) = ion_pair(10.0);
        let root = system.root();

        let map = system.occupancy(root).unwrap().unwrap();
        assert_eq!(map.cell_size(), 2.0);
        // The unit sphere at the origin touches every cell sharing that corner.
        assert!(map.is_occupied(&CellCoord { x: 0, y: 0, z: 0 }));
        assert!(map.is_occupied(&CellCoord { x: -1, y: -1, z: -1 }));
        assert!(!map.is_occupied(&CellCoord { x: 1, y: 0, z: 0 }));

        let (lo, hi) = map.bounds();
        assert_eq!(lo, CellCoord { x: -1, y: -1, z: -1 });
        assert_eq!(hi, CellCoord { x: 6, y: 1, z: 1 });
    }

    #[test]
    fn occupancy_of_an_empty_chain_is_none() {
        let (mut system, _, _) = ion_pair(10.0);
        let root = system.root();
        let sub = system.subchain(root, 1, 1).unwrap();
        assert!(system.occupancy(sub).unwrap().is_none());
    }

    #[test]
    fn bounding_box_spans_occupied_cells() {
        let (system, _, _) = ion_pair(10.0);
        let root = system.root();

        let (lo, hi) = system.global_bounding_box(root).unwrap().unwrap();
        assert_eq!(lo, Point3::new(0.0, 0.0, 0.0));
        assert_eq!(hi, Point3::new(12.0, 2.0, 2.0));
    }
}
