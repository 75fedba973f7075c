//! Implements the uniform spatial hash grid that backs collision queries.
//!
//! Space is divided into cubic cells of a fixed side length. Each chain owns
//! one [`SpatialGrid`] holding the atoms of the residues it currently
//! controls, keyed by the integer cell their registered position falls in.
//! Insert, remove, and relocate are all O(1) in the number of grid atoms, so
//! the grids can be kept in sync incrementally as atoms move.
//!
//! The grid stores its own copy of each atom's position at registration
//! time. Collision queries read that registered view, which is what makes
//! [`GridUpdatePolicy::Skip`](crate::engine::moves::GridUpdatePolicy::Skip)
//! moves invisible to them until a grid-updating operation runs.

use crate::core::models::ids::AtomId;
use crate::core::shells::registry::ShellRegistry;
use nalgebra::Point3;
use serde::{Deserialize, Serialize};
use slotmap::SecondaryMap;
use std::collections::HashMap;

/// Tunable parameters shared by every grid in one chain system.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridConfig {
    /// Side length of a cubic grid cell, in angstroms.
    pub cell_size: f64,
    /// Largest center-to-center distance at which any atom pair can collide.
    pub cutoff: f64,
    /// Scale applied to summed van der Waals radii in the clash test.
    pub clash_factor: f64,
    /// Bond-path length (in bonds) within which the vdW clash test is waived.
    pub bonded_exclusion: usize,
}

impl GridConfig {
    pub const DEFAULT_CLASH_FACTOR: f64 = 0.8;
    pub const DEFAULT_BONDED_EXCLUSION: usize = 3;

    /// Derives a configuration from the largest atom in a shell registry.
    ///
    /// The cell side is the diameter of the largest atom, so two atoms can
    /// only overlap at full radii if they sit in the same or an adjacent
    /// cell. The cutoff scales with `clash_factor` when it exceeds one.
    pub fn from_registry(registry: &ShellRegistry, clash_factor: f64) -> Self {
        let diameter = registry.max_atom_diameter();
        let cell_size = if diameter > 0.0 { diameter } else { 1.0 };
        Self {
            cell_size,
            cutoff: cell_size * clash_factor.max(1.0),
            clash_factor,
            bonded_exclusion: Self::DEFAULT_BONDED_EXCLUSION,
        }
    }

    /// Number of cells to scan outward from a query cell along each axis.
    ///
    /// Two points within `cutoff` of each other can differ by at most
    /// `floor(cutoff / cell_size) + 1` cell indices per axis, so scanning
    /// this far in every direction covers every possible partner.
    pub fn search_delta(&self) -> i32 {
        (self.cutoff / self.cell_size).floor() as i32 + 1
    }
}

/// Integer coordinates of one grid cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellCoord {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl CellCoord {
    /// Maps a point in space to the cell containing it.
    pub fn from_position(position: &Point3<f64>, cell_size: f64) -> Self {
        Self {
            x: (position.x / cell_size).floor() as i32,
            y: (position.y / cell_size).floor() as i32,
            z: (position.z / cell_size).floor() as i32,
        }
    }

    /// The corner of this cell with the smallest coordinates.
    pub fn min_corner(&self, cell_size: f64) -> Point3<f64> {
        Point3::new(
            f64::from(self.x) * cell_size,
            f64::from(self.y) * cell_size,
            f64::from(self.z) * cell_size,
        )
    }

    pub fn offset(&self, dx: i32, dy: i32, dz: i32) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
            z: self.z + dz,
        }
    }
}

/// A uniform spatial hash over the atoms one chain controls.
#[derive(Debug, Clone)]
pub struct SpatialGrid {
    cell_size: f64,
    cells: HashMap<CellCoord, Vec<AtomId>>,
    positions: SecondaryMap<AtomId, Point3<f64>>,
}

impl SpatialGrid {
    pub fn new(cell_size: f64) -> Self {
        Self {
            cell_size,
            cells: HashMap::new(),
            positions: SecondaryMap::new(),
        }
    }

    pub fn cell_size(&self) -> f64 {
        self.cell_size
    }

    /// The cell a point falls into at this grid's resolution.
    pub fn cell_of(&self, position: &Point3<f64>) -> CellCoord {
        CellCoord::from_position(position, self.cell_size)
    }

    /// Registers an atom at the given position.
    ///
    /// Re-inserting an already registered atom relocates it instead of
    /// duplicating its cell entry.
    pub fn insert(&mut self, atom_id: AtomId, position: Point3<f64>) {
        if self.positions.contains_key(atom_id) {
            self.relocate(atom_id, position);
            return;
        }
        let cell = self.cell_of(&position);
        self.cells.entry(cell).or_default().push(atom_id);
        self.positions.insert(atom_id, position);
    }

    /// Removes an atom, returning its registered position if it was present.
    pub fn remove(&mut self, atom_id: AtomId) -> Option<Point3<f64>> {
        let position = self.positions.remove(atom_id)?;
        let cell = self.cell_of(&position);
        if let Some(atoms) = self.cells.get_mut(&cell) {
            atoms.retain(|&id| id != atom_id);
            if atoms.is_empty() {
                self.cells.remove(&cell);
            }
        }
        Some(position)
    }

    /// Moves a registered atom to a new position, updating its cell only
    /// when the cell actually changes. Unregistered atoms are inserted.
    pub fn relocate(&mut self, atom_id: AtomId, position: Point3<f64>) {
        let Some(&old) = self.positions.get(atom_id) else {
            self.insert(atom_id, position);
            return;
        };
        let old_cell = self.cell_of(&old);
        let new_cell = self.cell_of(&position);
        if old_cell != new_cell {
            if let Some(atoms) = self.cells.get_mut(&old_cell) {
                atoms.retain(|&id| id != atom_id);
                if atoms.is_empty() {
                    self.cells.remove(&old_cell);
                }
            }
            self.cells.entry(new_cell).or_default().push(atom_id);
        }
        self.positions.insert(atom_id, position);
    }

    /// The position this grid last registered for an atom.
    pub fn position(&self, atom_id: AtomId) -> Option<Point3<f64>> {
        self.positions.get(atom_id).copied()
    }

    pub fn contains(&self, atom_id: AtomId) -> bool {
        self.positions.contains_key(atom_id)
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Atoms registered in the cell cube of half-width `delta` around a cell.
    pub fn candidates_near(&self, center: CellCoord, delta: i32) -> Vec<AtomId> {
        let mut found = Vec::new();
        for dx in -delta..=delta {
            for dy in -delta..=delta {
                for dz in -delta..=delta {
                    if let Some(atoms) = self.cells.get(&center.offset(dx, dy, dz)) {
                        found.extend_from_slice(atoms);
                    }
                }
            }
        }
        found
    }

    /// Iterates over every registered atom and its registered position.
    pub fn iter_atoms(&self) -> impl Iterator<Item = (AtomId, &Point3<f64>)> {
        self.positions.iter()
    }

    /// The smallest and largest occupied cell coordinates per axis, or
    /// `None` when the grid is empty.
    pub fn occupied_bounds(&self) -> Option<(CellCoord, CellCoord)> {
        let mut cells = self.cells.keys();
        let first = *cells.next()?;
        let mut min = first;
        let mut max = first;
        for cell in cells {
            min.x = min.x.min(cell.x);
            min.y = min.y.min(cell.y);
            min.z = min.z.min(cell.z);
            max.x = max.x.max(cell.x);
            max.y = max.y.max(cell.y);
            max.z = max.z.max(cell.z);
        }
        Some((min, max))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slotmap::KeyData;

    fn dummy_atom_id(id: u64) -> AtomId {
        AtomId::from(KeyData::from_ffi(id))
    }

    #[test]
    fn cell_coord_floors_negative_positions() {
        let cell = CellCoord::from_position(&Point3::new(-0.1, 3.4, 7.0), 3.4);
        assert_eq!(cell, CellCoord { x: -1, y: 1, z: 2 });
    }

    #[test]
    fn insert_and_remove_round_trip() {
        let mut grid = SpatialGrid::new(2.0);
        let a = dummy_atom_id(1);
        grid.insert(a, Point3::new(1.0, 1.0, 1.0));

        assert_eq!(grid.len(), 1);
        assert!(grid.contains(a));
        assert_eq!(grid.position(a), Some(Point3::new(1.0, 1.0, 1.0)));

        let removed = grid.remove(a);
        assert_eq!(removed, Some(Point3::new(1.0, 1.0, 1.0)));
        assert!(grid.is_empty());
        assert!(grid.occupied_bounds().is_none());
    }

    #[test]
    fn relocate_within_cell_keeps_cell_membership() {
        let mut grid = SpatialGrid::new(2.0);
        let a = dummy_atom_id(1);
        grid.insert(a, Point3::new(0.1, 0.1, 0.1));
        grid.relocate(a, Point3::new(1.9, 1.9, 1.9));

        let cell = grid.cell_of(&Point3::new(0.5, 0.5, 0.5));
        assert_eq!(grid.candidates_near(cell, 0), vec![a]);
        assert_eq!(grid.position(a), Some(Point3::new(1.9, 1.9, 1.9)));
    }

    #[test]
    fn relocate_across_cells_moves_membership() {
        let mut grid = SpatialGrid::new(2.0);
        let a = dummy_atom_id(1);
        grid.insert(a, Point3::new(0.5, 0.5, 0.5));
        grid.relocate(a, Point3::new(10.5, 0.5, 0.5));

        let old_cell = CellCoord { x: 0, y: 0, z: 0 };
        let new_cell = CellCoord { x: 5, y: 0, z: 0 };
        assert!(grid.candidates_near(old_cell, 0).is_empty());
        assert_eq!(grid.candidates_near(new_cell, 0), vec![a]);
    }

    #[test]
    fn reinsert_does_not_duplicate() {
        let mut grid = SpatialGrid::new(2.0);
        let a = dummy_atom_id(1);
        grid.insert(a, Point3::new(0.5, 0.5, 0.5));
        grid.insert(a, Point3::new(0.6, 0.5, 0.5));

        assert_eq!(grid.len(), 1);
        let cell = CellCoord { x: 0, y: 0, z: 0 };
        assert_eq!(grid.candidates_near(cell, 0).len(), 1);
    }

    #[test]
    fn candidates_near_scans_the_cube() {
        let mut grid = SpatialGrid::new(1.0);
        let a = dummy_atom_id(1);
        let b = dummy_atom_id(2);
        let c = dummy_atom_id(3);
        grid.insert(a, Point3::new(0.5, 0.5, 0.5));
        grid.insert(b, Point3::new(1.5, 0.5, 0.5));
        grid.insert(c, Point3::new(4.5, 0.5, 0.5));

        let center = CellCoord { x: 0, y: 0, z: 0 };
        let mut near = grid.candidates_near(center, 1);
        near.sort();
        let mut expected = vec![a, b];
        expected.sort();
        assert_eq!(near, expected);
    }

    #[test]
    fn occupied_bounds_span_all_cells() {
        let mut grid = SpatialGrid::new(1.0);
        grid.insert(dummy_atom_id(1), Point3::new(-2.5, 0.5, 0.5));
        grid.insert(dummy_atom_id(2), Point3::new(3.5, 4.5, -1.5));

        let (min, max) = grid.occupied_bounds().unwrap();
        assert_eq!(min, CellCoord { x: -3, y: 0, z: -2 });
        assert_eq!(max, CellCoord { x: 3, y: 4, z: 0 });
    }

    #[test]
    fn search_delta_covers_the_cutoff() {
        let config = GridConfig {
            cell_size: 3.4,
            cutoff: 3.4,
            clash_factor: 0.8,
            bonded_exclusion: 3,
        };
        assert_eq!(config.search_delta(), 2);

        let wide = GridConfig {
            cell_size: 1.0,
            cutoff: 4.5,
            clash_factor: 1.5,
            bonded_exclusion: 3,
        };
        assert_eq!(wide.search_delta(), 5);
    }
}
