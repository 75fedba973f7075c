use super::atom::{Atom, BlockKind};
use super::ids::{AtomId, ResidueId};
use super::residue::Residue;
use super::topology::{Bond, BondKind};
use slotmap::{SecondaryMap, SlotMap};
use std::collections::{HashMap, HashSet, VecDeque};

/// The arena owning every atom, residue, and bond of a polymer.
///
/// This is the single source of truth for structure: the top-level chain
/// owns one `Polymer`, and sub-chains reference residues by index range
/// into the arena order. The arena also caches bond adjacency so that
/// downstream-atom discovery and bonded-distance queries are cheap.
#[derive(Debug, Clone, Default)]
pub struct Polymer {
    /// Primary storage for atoms using a slot map for stable IDs.
    atoms: SlotMap<AtomId, Atom>,
    /// Primary storage for residues using a slot map for stable IDs.
    residues: SlotMap<ResidueId, Residue>,
    /// Arena order of residues; a residue's persisted index is its position here.
    residue_order: Vec<ResidueId>,
    /// Reverse lookup from residue ID to its persisted index.
    residue_index: SecondaryMap<ResidueId, usize>,
    /// List of all bonds in the polymer.
    bonds: Vec<Bond>,
    /// Cached adjacency list for bond connectivity, indexed by atom ID.
    bond_adjacency: SecondaryMap<AtomId, Vec<AtomId>>,
}

impl Polymer {
    /// Creates a new, empty polymer arena.
    pub fn new() -> Self {
        Self::default()
    }

    /// Retrieves an immutable reference to an atom by its ID.
    pub fn atom(&self, id: AtomId) -> Option<&Atom> {
        self.atoms.get(id)
    }

    /// Retrieves a mutable reference to an atom by its ID.
    pub(crate) fn atom_mut(&mut self, id: AtomId) -> Option<&mut Atom> {
        self.atoms.get_mut(id)
    }

    /// Returns an iterator over all atoms in the arena.
    pub fn atoms_iter(&self) -> impl Iterator<Item = (AtomId, &Atom)> {
        self.atoms.iter()
    }

    /// Retrieves an immutable reference to a residue by its ID.
    pub fn residue(&self, id: ResidueId) -> Option<&Residue> {
        self.residues.get(id)
    }

    pub(crate) fn residue_mut(&mut self, id: ResidueId) -> Option<&mut Residue> {
        self.residues.get_mut(id)
    }

    /// Returns the residue IDs in arena order.
    pub fn residue_ids(&self) -> &[ResidueId] {
        &self.residue_order
    }

    /// Returns the residue at a persisted index, if in range.
    pub fn residue_at(&self, index: usize) -> Option<ResidueId> {
        self.residue_order.get(index).copied()
    }

    /// Returns the persisted index of a residue.
    pub fn residue_index(&self, id: ResidueId) -> Option<usize> {
        self.residue_index.get(id).copied()
    }

    pub fn residue_count(&self) -> usize {
        self.residue_order.len()
    }

    /// Returns a slice of all bonds in the polymer.
    pub fn bonds(&self) -> &[Bond] {
        &self.bonds
    }

    /// Appends a new residue to the arena and returns its ID.
    pub(crate) fn add_residue(&mut self, number: isize, name: &str) -> ResidueId {
        let residue = Residue::new(number, name);
        let id = self.residues.insert(residue);
        self.residue_index.insert(id, self.residue_order.len());
        self.residue_order.push(id);
        id
    }

    /// Adds an atom to a residue, registering it with the named block.
    ///
    /// Returns `None` if the residue does not exist.
    pub(crate) fn add_atom_to_residue(
        &mut self,
        residue_id: ResidueId,
        atom: Atom,
        kind: BlockKind,
    ) -> Option<AtomId> {
        if !self.residues.contains_key(residue_id) {
            return None;
        }

        let name = atom.name.clone();
        let atom_id = self.atoms.insert(atom);
        self.bond_adjacency.insert(atom_id, Vec::new());

        let residue = self.residues.get_mut(residue_id)?;
        residue.add_atom(&name, atom_id, kind);

        Some(atom_id)
    }

    /// Adds a bond between two atoms and updates the adjacency cache.
    ///
    /// Idempotent: adding an existing bond succeeds without duplicating it.
    /// Returns `None` if either atom does not exist.
    pub(crate) fn add_bond(
        &mut self,
        atom1_id: AtomId,
        atom2_id: AtomId,
        kind: BondKind,
    ) -> Option<()> {
        if !self.atoms.contains_key(atom1_id) || !self.atoms.contains_key(atom2_id) {
            return None;
        }

        if let Some(neighbors) = self.bond_adjacency.get(atom1_id) {
            if neighbors.contains(&atom2_id) {
                return Some(());
            }
        }

        self.bonds.push(Bond::new(atom1_id, atom2_id, kind));
        self.bond_adjacency[atom1_id].push(atom2_id);
        self.bond_adjacency[atom2_id].push(atom1_id);
        Some(())
    }

    /// Finds the bond between two atoms, if one exists.
    pub fn bond_between(&self, atom1_id: AtomId, atom2_id: AtomId) -> Option<&Bond> {
        self.bonds
            .iter()
            .find(|b| b.contains(atom1_id) && b.contains(atom2_id))
    }

    /// Retrieves the bonded neighbors of an atom from the adjacency cache.
    pub fn get_bonded_neighbors(&self, atom_id: AtomId) -> Option<&[AtomId]> {
        self.bond_adjacency.get(atom_id).map(|v| v.as_slice())
    }

    /// Breadth-first search over the bond graph from `from` to any atom in
    /// `goals`, bounded by `max_len` bond hops.
    ///
    /// Returns the atoms along the path including both endpoints, or an
    /// empty vector when no bond path of that length exists. `extend_num`
    /// walks up to that many additional un-visited neighbors past the goal,
    /// which callers use to collect extra atoms for local reference frames.
    pub fn shortest_bond_path(
        &self,
        from: AtomId,
        goals: &HashSet<AtomId>,
        max_len: usize,
        extend_num: usize,
    ) -> Vec<AtomId> {
        if !self.atoms.contains_key(from) {
            return Vec::new();
        }

        let mut path = if goals.contains(&from) {
            vec![from]
        } else {
            let mut parents: HashMap<AtomId, AtomId> = HashMap::new();
            let mut visited: HashSet<AtomId> = HashSet::from([from]);
            let mut queue: VecDeque<(AtomId, usize)> = VecDeque::from([(from, 0)]);
            let mut reached = None;

            'search: while let Some((current, depth)) = queue.pop_front() {
                if depth == max_len {
                    continue;
                }
                if let Some(neighbors) = self.bond_adjacency.get(current) {
                    for &next in neighbors {
                        if !visited.insert(next) {
                            continue;
                        }
                        parents.insert(next, current);
                        if goals.contains(&next) {
                            reached = Some(next);
                            break 'search;
                        }
                        queue.push_back((next, depth + 1));
                    }
                }
            }

            let Some(goal) = reached else {
                return Vec::new();
            };

            let mut path = vec![goal];
            let mut current = goal;
            while let Some(&parent) = parents.get(&current) {
                path.push(parent);
                current = parent;
            }
            path.reverse();
            path
        };

        for _ in 0..extend_num {
            let last = *path.last().unwrap_or(&from);
            let Some(neighbors) = self.bond_adjacency.get(last) else {
                break;
            };
            match neighbors.iter().find(|n| !path.contains(n)) {
                Some(&next) => path.push(next),
                None => break,
            }
        }

        path
    }

    /// Returns true if `a` and `b` are within `max_hops` bonds of each
    /// other. Used to exclude covalently adjacent atoms from collision
    /// checks.
    pub fn within_bond_distance(&self, a: AtomId, b: AtomId, max_hops: usize) -> bool {
        if a == b {
            return true;
        }
        !self
            .shortest_bond_path(a, &HashSet::from([b]), max_hops, 0)
            .is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Point3;

    struct TestRefs {
        res1: ResidueId,
        n1: AtomId,
        ca1: AtomId,
        c1: AtomId,
        res2: ResidueId,
        n2: AtomId,
        ca2: AtomId,
    }

    fn create_two_residue_polymer() -> (Polymer, TestRefs) {
        let mut polymer = Polymer::new();

        let res1 = polymer.add_residue(1, "AA");
        let n1 = polymer
            .add_atom_to_residue(res1, Atom::new("N", res1, Point3::origin()), BlockKind::Backbone)
            .unwrap();
        let ca1 = polymer
            .add_atom_to_residue(
                res1,
                Atom::new("CA", res1, Point3::new(1.5, 0.0, 0.0)),
                BlockKind::Backbone,
            )
            .unwrap();
        let c1 = polymer
            .add_atom_to_residue(
                res1,
                Atom::new("C", res1, Point3::new(3.0, 0.0, 0.0)),
                BlockKind::Backbone,
            )
            .unwrap();
        polymer.add_bond(n1, ca1, BondKind::Rotatable).unwrap();
        polymer.add_bond(ca1, c1, BondKind::Rotatable).unwrap();

        let res2 = polymer.add_residue(2, "AA");
        let n2 = polymer
            .add_atom_to_residue(
                res2,
                Atom::new("N", res2, Point3::new(4.4, 0.0, 0.0)),
                BlockKind::Backbone,
            )
            .unwrap();
        let ca2 = polymer
            .add_atom_to_residue(
                res2,
                Atom::new("CA", res2, Point3::new(5.9, 0.0, 0.0)),
                BlockKind::Backbone,
            )
            .unwrap();
        polymer.add_bond(c1, n2, BondKind::Fixed).unwrap();
        polymer.add_bond(n2, ca2, BondKind::Rotatable).unwrap();

        let refs = TestRefs {
            res1,
            n1,
            ca1,
            c1,
            res2,
            n2,
            ca2,
        };
        (polymer, refs)
    }

    #[test]
    fn arena_tracks_residue_order_and_indices() {
        let (polymer, refs) = create_two_residue_polymer();

        assert_eq!(polymer.residue_count(), 2);
        assert_eq!(polymer.residue_ids(), &[refs.res1, refs.res2]);
        assert_eq!(polymer.residue_at(0), Some(refs.res1));
        assert_eq!(polymer.residue_at(1), Some(refs.res2));
        assert_eq!(polymer.residue_at(2), None);
        assert_eq!(polymer.residue_index(refs.res1), Some(0));
        assert_eq!(polymer.residue_index(refs.res2), Some(1));
    }

    #[test]
    fn add_bond_is_idempotent() {
        let (mut polymer, refs) = create_two_residue_polymer();
        let before = polymer.bonds().len();

        polymer.add_bond(refs.n1, refs.ca1, BondKind::Rotatable).unwrap();
        polymer.add_bond(refs.ca1, refs.n1, BondKind::Rotatable).unwrap();

        assert_eq!(polymer.bonds().len(), before);
        assert_eq!(polymer.get_bonded_neighbors(refs.n1).unwrap().len(), 1);
    }

    #[test]
    fn add_bond_returns_none_for_missing_atom() {
        let (mut polymer, refs) = create_two_residue_polymer();
        assert!(polymer.add_bond(refs.n1, AtomId::default(), BondKind::Fixed).is_none());
    }

    #[test]
    fn bond_between_finds_existing_edge_only() {
        let (polymer, refs) = create_two_residue_polymer();
        assert!(polymer.bond_between(refs.n1, refs.ca1).is_some());
        assert!(polymer.bond_between(refs.ca1, refs.n1).is_some());
        assert!(polymer.bond_between(refs.n1, refs.c1).is_none());
    }

    #[test]
    fn get_bonded_neighbors_returns_correct_neighbors() {
        let (polymer, refs) = create_two_residue_polymer();

        let ca1_neighbors = polymer.get_bonded_neighbors(refs.ca1).unwrap();
        assert_eq!(ca1_neighbors.len(), 2);
        assert!(ca1_neighbors.contains(&refs.n1));
        assert!(ca1_neighbors.contains(&refs.c1));

        let ca2_neighbors = polymer.get_bonded_neighbors(refs.ca2).unwrap();
        assert_eq!(ca2_neighbors, &[refs.n2]);
    }

    #[test]
    fn shortest_bond_path_finds_bounded_path() {
        let (polymer, refs) = create_two_residue_polymer();

        let goals = HashSet::from([refs.n2]);
        let path = polymer.shortest_bond_path(refs.n1, &goals, 3, 0);
        assert_eq!(path, vec![refs.n1, refs.ca1, refs.c1, refs.n2]);
    }

    #[test]
    fn shortest_bond_path_returns_empty_when_too_far() {
        let (polymer, refs) = create_two_residue_polymer();

        let goals = HashSet::from([refs.ca2]);
        assert!(polymer.shortest_bond_path(refs.n1, &goals, 3, 0).is_empty());
        assert_eq!(
            polymer.shortest_bond_path(refs.n1, &goals, 4, 0).len(),
            5
        );
    }

    #[test]
    fn shortest_bond_path_handles_goal_equal_to_start() {
        let (polymer, refs) = create_two_residue_polymer();
        let goals = HashSet::from([refs.n1]);
        assert_eq!(polymer.shortest_bond_path(refs.n1, &goals, 5, 0), vec![refs.n1]);
    }

    #[test]
    fn shortest_bond_path_extends_past_goal() {
        let (polymer, refs) = create_two_residue_polymer();

        let goals = HashSet::from([refs.ca1]);
        let path = polymer.shortest_bond_path(refs.n1, &goals, 2, 2);
        assert_eq!(path, vec![refs.n1, refs.ca1, refs.c1, refs.n2]);
    }

    #[test]
    fn within_bond_distance_respects_hop_limit() {
        let (polymer, refs) = create_two_residue_polymer();

        assert!(polymer.within_bond_distance(refs.n1, refs.n1, 0));
        assert!(polymer.within_bond_distance(refs.n1, refs.ca1, 1));
        assert!(polymer.within_bond_distance(refs.n1, refs.n2, 3));
        assert!(!polymer.within_bond_distance(refs.n1, refs.n2, 2));
        assert!(!polymer.within_bond_distance(refs.n1, refs.ca2, 3));
    }
}
