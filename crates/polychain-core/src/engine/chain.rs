//! Implements the chain hierarchy and its manipulation operations.
//!
//! A [`ChainSystem`] owns one [`Polymer`] arena plus a tree of
//! [`ChainNode`]s. The root node spans every residue; each sub-chain is a
//! contiguous index range into the same arena, so parent and child chains
//! literally share residues and atoms rather than aliasing copies of them.
//! Sibling sub-chains never overlap, and a child's range always lies inside
//! its parent's.
//!
//! Every residue is *controlled* by exactly one node at a time, which
//! decides whose spatial grid its atoms are registered in. Control starts
//! at the root and moves down or up the tree through
//! [`ChainSystem::detach_residues`] and [`ChainSystem::attach_residues`].
//! All position changes funnel through a single internal move routine so
//! the controlling grid can never silently go stale.

use crate::core::models::atom::{Atom, BlockKind};
use crate::core::models::ids::{AtomId, ChainId, ResidueId};
use crate::core::models::system::Polymer;
use crate::core::models::topology::{BondDirection, BondKind};
use crate::core::shells::registry::ShellRegistry;
use crate::core::utils::geometry;
use crate::engine::error::ChainError;
use crate::engine::grid::{GridConfig, SpatialGrid};
use crate::engine::moves::{ChainMove, GridUpdatePolicy};
use crate::engine::state::ChainSnapshot;
use nalgebra::{Point3, Vector3};
use slotmap::{SecondaryMap, SlotMap};
use std::collections::{HashMap, HashSet, VecDeque};
use tracing::{debug, info, trace};

/// One rotatable degree of freedom: the bond from `atom1` to `atom2`,
/// with `atom1` the endpoint nearer the block's traversal start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dof {
    pub atom1: AtomId,
    pub atom2: AtomId,
}

/// A node of the chain hierarchy spanning a contiguous residue range.
#[derive(Debug, Clone)]
pub struct ChainNode {
    parent: Option<ChainId>,                     // None only for the root
    children: Vec<ChainId>,                      // Non-overlapping sub-chains
    start: usize,                                // First arena residue index
    len: usize,                                  // Number of residues spanned
    grid: SpatialGrid,                           // Atoms of controlled residues
    dofs: HashMap<BlockKind, Vec<Dof>>,          // Rotatable bonds per block, in traversal order
    block_atoms: HashMap<BlockKind, Vec<AtomId>>, // Atom traversal cache per block
}

impl ChainNode {
    pub fn parent(&self) -> Option<ChainId> {
        self.parent
    }

    pub fn children(&self) -> &[ChainId] {
        &self.children
    }

    /// Arena index of the first residue this chain spans.
    pub fn start(&self) -> usize {
        self.start
    }

    /// Number of residues this chain spans.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The rotatable degrees of freedom of one block, in traversal order.
    pub fn dofs(&self, kind: BlockKind) -> &[Dof] {
        self.dofs.get(&kind).map_or(&[], |v| v.as_slice())
    }

    pub fn dof_count(&self, kind: BlockKind) -> usize {
        self.dofs(kind).len()
    }

    /// The atoms of one block across the spanned range, in traversal order.
    pub fn block_atoms(&self, kind: BlockKind) -> &[AtomId] {
        self.block_atoms.get(&kind).map_or(&[], |v| v.as_slice())
    }

    /// The spatial grid holding the atoms this chain currently controls.
    pub fn grid(&self) -> &SpatialGrid {
        &self.grid
    }
}

/// The owner of a polymer arena and the chain hierarchy built over it.
pub struct ChainSystem {
    polymer: Polymer,
    registry: ShellRegistry,
    config: GridConfig,
    nodes: SlotMap<ChainId, ChainNode>,
    root: ChainId,
    /// Which node currently controls each residue's grid registration.
    controller: SecondaryMap<ResidueId, ChainId>,
    finalized: bool,
}

impl ChainSystem {
    /// Creates an empty system over a shell catalog.
    ///
    /// The system starts in the construction phase: residues can be
    /// appended, but no geometric manipulation is possible until
    /// [`finalize`](Self::finalize) is called.
    pub fn new(registry: ShellRegistry, config: GridConfig) -> Self {
        let mut nodes = SlotMap::with_key();
        let root = nodes.insert(ChainNode {
            parent: None,
            children: Vec::new(),
            start: 0,
            len: 0,
            grid: SpatialGrid::new(config.cell_size),
            dofs: HashMap::new(),
            block_atoms: HashMap::new(),
        });
        Self {
            polymer: Polymer::new(),
            registry,
            config,
            nodes,
            root,
            controller: SecondaryMap::new(),
            finalized: false,
        }
    }

    pub fn root(&self) -> ChainId {
        self.root
    }

    pub fn polymer(&self) -> &Polymer {
        &self.polymer
    }

    pub fn registry(&self) -> &ShellRegistry {
        &self.registry
    }

    pub fn config(&self) -> &GridConfig {
        &self.config
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    pub fn node(&self, chain: ChainId) -> Option<&ChainNode> {
        self.nodes.get(chain)
    }

    /// Iterates over every chain node in the hierarchy.
    pub fn chains(&self) -> impl Iterator<Item = (ChainId, &ChainNode)> {
        self.nodes.iter()
    }

    /// Resolves a chain-local residue index to the residue's stable ID.
    pub fn residue_at(&self, chain: ChainId, local_index: usize) -> Option<ResidueId> {
        let node = self.nodes.get(chain)?;
        if local_index >= node.len {
            return None;
        }
        self.polymer.residue_at(node.start + local_index)
    }

    /// The node currently controlling a residue's grid registration.
    pub fn controller_of(&self, residue_id: ResidueId) -> Option<ChainId> {
        self.controller.get(residue_id).copied()
    }

    /// Bounded shortest bond path between an atom and a goal set.
    ///
    /// Delegates to the arena; see [`Polymer::shortest_bond_path`].
    pub fn shortest_bond_path(
        &self,
        from: AtomId,
        goals: &HashSet<AtomId>,
        max_len: usize,
        extend_num: usize,
    ) -> Vec<AtomId> {
        self.polymer.shortest_bond_path(from, goals, max_len, extend_num)
    }

    /// Appends one residue to the end of the root chain.
    ///
    /// With `positions = None` the residue is placed by default link
    /// geometry: the shell's `head` atom lands at the previous residue's
    /// `tail` atom plus the link offset, and every other atom keeps its
    /// template offset from the head. An explicit `positions` map instead
    /// pins every atom of the shell to an absolute position and must cover
    /// all of them.
    ///
    /// # Arguments
    ///
    /// * `name` - Shell name to instantiate from the registry.
    /// * `positions` - Optional absolute position per atom name.
    ///
    /// # Errors
    ///
    /// Fails after `finalize`, for unknown or malformed shells, and for
    /// incomplete position overrides.
    pub fn add_residue(
        &mut self,
        name: &str,
        positions: Option<&HashMap<String, Point3<f64>>>,
    ) -> Result<ResidueId, ChainError> {
        if self.finalized {
            return Err(ChainError::AlreadyFinalized);
        }
        let shell = self
            .registry
            .get(name)
            .cloned()
            .ok_or_else(|| ChainError::UnknownShell {
                name: name.to_string(),
            })?;
        if shell.atoms.is_empty() {
            return Err(ChainError::MalformedShell {
                shell: name.to_string(),
                message: "shell has no atoms".to_string(),
            });
        }

        let previous = self.polymer.residue_ids().last().copied();
        let translation = match (positions, previous) {
            (None, Some(prev_id)) => {
                let link = shell.link.as_ref().ok_or_else(|| ChainError::MalformedShell {
                    shell: name.to_string(),
                    message: "no link geometry for default placement".to_string(),
                })?;
                let tail_id = self
                    .polymer
                    .residue(prev_id)
                    .and_then(|r| r.get_atom_id_by_name(&link.tail))
                    .ok_or_else(|| ChainError::MalformedShell {
                        shell: name.to_string(),
                        message: format!(
                            "link tail atom '{}' is missing from the previous residue",
                            link.tail
                        ),
                    })?;
                let tail_position = self
                    .polymer
                    .atom(tail_id)
                    .ok_or(ChainError::AtomNotFound)?
                    .position;
                let head = shell.atom(&link.head).ok_or_else(|| ChainError::MalformedShell {
                    shell: name.to_string(),
                    message: format!("link head atom '{}' is not in the shell", link.head),
                })?;
                (tail_position + Vector3::from(link.offset)) - Point3::from(head.position)
            }
            _ => Vector3::zeros(),
        };

        let number = self.polymer.residue_count() as isize + 1;
        let residue_id = self.polymer.add_residue(number, name);

        for atom_shell in &shell.atoms {
            let position = match positions {
                Some(map) => *map.get(&atom_shell.name).ok_or_else(|| {
                    ChainError::MissingOverride {
                        shell: name.to_string(),
                        atom: atom_shell.name.clone(),
                    }
                })?,
                None => Point3::from(atom_shell.position) + translation,
            };
            let role: BlockKind = atom_shell.block.parse().unwrap_or_default();
            let mut atom = Atom::new(&atom_shell.name, residue_id, position);
            atom.element = atom_shell.element.clone();
            atom.role = role;
            atom.covalent_radius = atom_shell.covalent_radius();
            atom.vdw_radius = atom_shell.vdw_radius();
            self.polymer
                .add_atom_to_residue(residue_id, atom, role)
                .ok_or_else(|| {
                    ChainError::Internal("residue vanished during construction".to_string())
                })?;
        }

        for bond_shell in &shell.bonds {
            let a = self.named_atom(residue_id, &bond_shell.a, name)?;
            let b = self.named_atom(residue_id, &bond_shell.b, name)?;
            let kind = if bond_shell.rotatable {
                BondKind::Rotatable
            } else {
                BondKind::Fixed
            };
            self.polymer.add_bond(a, b, kind).ok_or_else(|| {
                ChainError::Internal("bond endpoints vanished during construction".to_string())
            })?;
        }

        for (block_name, atom_name) in &shell.start_atoms {
            let kind: BlockKind =
                block_name
                    .parse()
                    .map_err(|()| ChainError::MalformedShell {
                        shell: name.to_string(),
                        message: format!("unknown block '{block_name}' in start_atoms"),
                    })?;
            let atom_id = self.named_atom(residue_id, atom_name, name)?;
            let block = self
                .polymer
                .residue_mut(residue_id)
                .and_then(|r| r.block_mut(kind))
                .ok_or_else(|| ChainError::MalformedShell {
                    shell: name.to_string(),
                    message: format!("start atom names empty block '{block_name}'"),
                })?;
            block.start_atom = Some(atom_id);
        }

        // Topological link to the previous residue; independent of whether
        // placement came from the template or an explicit override.
        if let (Some(prev_id), Some(link)) = (previous, shell.link.as_ref()) {
            if let Some(tail_id) = self
                .polymer
                .residue(prev_id)
                .and_then(|r| r.get_atom_id_by_name(&link.tail))
            {
                let head_id = self.named_atom(residue_id, &link.head, name)?;
                let kind = if link.rotatable {
                    BondKind::Rotatable
                } else {
                    BondKind::Fixed
                };
                self.polymer.add_bond(tail_id, head_id, kind).ok_or_else(|| {
                    ChainError::Internal("link endpoints vanished during construction".to_string())
                })?;
            }
        }

        self.controller.insert(residue_id, self.root);
        self.nodes[self.root].len += 1;
        debug!(residue = name, index = number - 1, "Appended residue to root chain");
        Ok(residue_id)
    }

    /// Ends the construction phase.
    ///
    /// Builds the root chain's degree-of-freedom and block-traversal
    /// caches and registers every atom in the root grid. After this call
    /// the residue sequence is frozen and manipulation operations become
    /// available.
    pub fn finalize(&mut self) -> Result<(), ChainError> {
        if self.finalized {
            return Err(ChainError::AlreadyFinalized);
        }
        let len = self.polymer.residue_count();
        let (dofs, block_atoms) = self.build_caches(0, len);
        let entries: Vec<(AtomId, Point3<f64>)> = self
            .polymer
            .atoms_iter()
            .map(|(id, atom)| (id, atom.position))
            .collect();

        let root = self.nodes.get_mut(self.root).ok_or(ChainError::InvalidChain)?;
        root.dofs = dofs;
        root.block_atoms = block_atoms;
        for (atom_id, position) in entries {
            root.grid.insert(atom_id, position);
        }
        self.finalized = true;
        info!(residues = len, atoms = root.grid.len(), "Chain finalized");
        Ok(())
    }

    /// Creates a sub-chain over a contiguous local residue range of
    /// `parent`, inclusive on both ends.
    ///
    /// The sub-chain shares the parent's residues; it gets its own
    /// degree-of-freedom caches (restricted to the range) and an empty
    /// grid. It controls no residues until
    /// [`detach_residues`](Self::detach_residues) hands some over.
    ///
    /// # Errors
    ///
    /// Fails before `finalize`, for ranges outside the parent, and for
    /// ranges overlapping an existing sibling sub-chain.
    pub fn subchain(
        &mut self,
        parent: ChainId,
        start: usize,
        end: usize,
    ) -> Result<ChainId, ChainError> {
        if !self.finalized {
            return Err(ChainError::NotFinalized);
        }
        let pnode = self.nodes.get(parent).ok_or(ChainError::InvalidChain)?;
        if start > end || end >= pnode.len {
            return Err(ChainError::RangeOutOfBounds {
                start,
                end,
                len: pnode.len,
            });
        }
        let abs_start = pnode.start + start;
        let abs_end = pnode.start + end;
        for &child_id in &pnode.children {
            if let Some(child) = self.nodes.get(child_id) {
                let child_end = child.start + child.len - 1;
                if abs_start <= child_end && child.start <= abs_end {
                    return Err(ChainError::OverlappingSubchain { start, end });
                }
            }
        }

        let len = abs_end - abs_start + 1;
        let (dofs, block_atoms) = self.build_caches(abs_start, len);
        let id = self.nodes.insert(ChainNode {
            parent: Some(parent),
            children: Vec::new(),
            start: abs_start,
            len,
            grid: SpatialGrid::new(self.config.cell_size),
            dofs,
            block_atoms,
        });
        self.nodes[parent].children.push(id);
        debug!(start = abs_start, len, "Created sub-chain over residue range");
        Ok(id)
    }

    /// Hands control of a local residue range from `chain`'s parent down
    /// to `chain`, moving the atoms' grid registration with it.
    ///
    /// `range` is local to `chain` and inclusive; `None` means the whole
    /// chain. The parent must currently control every residue in range.
    pub fn detach_residues(
        &mut self,
        chain: ChainId,
        range: Option<(usize, usize)>,
    ) -> Result<(), ChainError> {
        self.transfer_residues(chain, range, true)
    }

    /// Hands control of a local residue range back from `chain` to its
    /// parent, moving the atoms' grid registration with it.
    pub fn attach_residues(
        &mut self,
        chain: ChainId,
        range: Option<(usize, usize)>,
    ) -> Result<(), ChainError> {
        self.transfer_residues(chain, range, false)
    }

    /// Rotates one degree of freedom of a chain.
    ///
    /// The axis runs through both endpoints of the addressed bond, so the
    /// endpoints themselves never move. `Forward` moves the side past the
    /// bond's second atom; `Backward` moves the side past the first.
    /// Atoms outside the chain's residue range are never moved and also
    /// fence the downstream walk, so a sub-chain rotation can never leak
    /// into its parent's exclusive residues.
    ///
    /// # Arguments
    ///
    /// * `chain` - The chain whose degree-of-freedom list is addressed.
    /// * `mv` - Block, index, direction, and angle of the rotation.
    /// * `policy` - Whether moved atoms are relocated in their grids.
    pub fn rotate(
        &mut self,
        chain: ChainId,
        mv: &ChainMove,
        policy: GridUpdatePolicy,
    ) -> Result<(), ChainError> {
        if !self.finalized {
            return Err(ChainError::NotFinalized);
        }
        let node = self.nodes.get(chain).ok_or(ChainError::InvalidChain)?;
        let dof = node
            .dofs
            .get(&mv.block)
            .and_then(|d| d.get(mv.dof_index))
            .copied()
            .ok_or(ChainError::DofOutOfRange {
                block: mv.block,
                index: mv.dof_index,
            })?;
        let (start, len) = (node.start, node.len);

        let (origin_atom, seed) = match mv.direction {
            BondDirection::Forward => (dof.atom1, dof.atom2),
            BondDirection::Backward => (dof.atom2, dof.atom1),
        };
        let origin = self
            .polymer
            .atom(origin_atom)
            .ok_or(ChainError::AtomNotFound)?
            .position;
        let tip = self.polymer.atom(seed).ok_or(ChainError::AtomNotFound)?.position;
        let axis = tip - origin;
        if axis.norm_squared() < 1e-24 {
            return Err(ChainError::Internal(
                "rotation axis endpoints coincide".to_string(),
            ));
        }

        let rotation = geometry::rotation_from_axis_angle(&axis, mv.degrees);
        let moved = self.downstream_atoms(seed, origin_atom, start, len);
        trace!(
            block = ?mv.block,
            dof = mv.dof_index,
            degrees = mv.degrees,
            atoms = moved.len(),
            "Rotating degree of freedom"
        );
        for atom_id in moved {
            let Some(atom) = self.polymer.atom(atom_id) else {
                continue;
            };
            let new_position = origin + rotation * (atom.position - origin);
            self.apply_move(atom_id, new_position, policy);
        }
        Ok(())
    }

    /// Applies a sequence of moves in order.
    pub fn multi_rotate(
        &mut self,
        chain: ChainId,
        moves: &[ChainMove],
        policy: GridUpdatePolicy,
    ) -> Result<(), ChainError> {
        for mv in moves {
            self.rotate(chain, mv, policy)?;
        }
        Ok(())
    }

    /// Exactly undoes a previous [`multi_rotate`](Self::multi_rotate) of
    /// the same move sequence: inverse moves, in reverse order.
    pub fn anti_multi_rotate(
        &mut self,
        chain: ChainId,
        moves: &[ChainMove],
        policy: GridUpdatePolicy,
    ) -> Result<(), ChainError> {
        for mv in moves.iter().rev() {
            self.rotate(chain, &mv.inverse(), policy)?;
        }
        Ok(())
    }

    /// Moves a single atom to an absolute position.
    ///
    /// This is the only entry point for arbitrary position changes; with
    /// `GridUpdatePolicy::Update` the atom is relocated in its controlling
    /// chain's grid in the same step.
    pub fn set_atom_position(
        &mut self,
        atom_id: AtomId,
        position: Point3<f64>,
        policy: GridUpdatePolicy,
    ) -> Result<(), ChainError> {
        if self.polymer.atom(atom_id).is_none() {
            return Err(ChainError::AtomNotFound);
        }
        self.apply_move(atom_id, position, policy);
        Ok(())
    }

    /// Toggles whether an atom participates in collision scans.
    ///
    /// Inactive atoms keep their bonds, block membership, and grid
    /// registration; only the collision queries skip them.
    pub fn set_atom_active(&mut self, atom_id: AtomId, active: bool) -> Result<(), ChainError> {
        let atom = self.polymer.atom_mut(atom_id).ok_or(ChainError::AtomNotFound)?;
        atom.active = active;
        Ok(())
    }

    /// Captures the positions of every atom a chain spans.
    pub fn save_state(&self, chain: ChainId) -> Result<ChainSnapshot, ChainError> {
        let node = self.nodes.get(chain).ok_or(ChainError::InvalidChain)?;
        Ok(self.capture(node.start, node.len))
    }

    /// Captures the positions of a local residue sub-range of a chain,
    /// inclusive on both ends.
    pub fn save_partial_state(
        &self,
        chain: ChainId,
        start: usize,
        end: usize,
    ) -> Result<ChainSnapshot, ChainError> {
        let node = self.nodes.get(chain).ok_or(ChainError::InvalidChain)?;
        if start > end || end >= node.len {
            return Err(ChainError::RangeOutOfBounds {
                start,
                end,
                len: node.len,
            });
        }
        Ok(self.capture(node.start + start, end - start + 1))
    }

    /// Restores every position a snapshot captured, keeping grids in sync.
    ///
    /// Atoms that no longer exist are skipped.
    pub fn restore_state(&mut self, snapshot: &ChainSnapshot) {
        for &(atom_id, position) in &snapshot.positions {
            self.apply_move(atom_id, position, GridUpdatePolicy::Update);
        }
    }

    /// Replaces the grid configuration and rebuilds every grid from the
    /// arena positions under the new cell size.
    pub fn set_grid_config(&mut self, config: GridConfig) {
        self.config = config;
        let node_ids: Vec<ChainId> = self.nodes.keys().collect();
        for id in node_ids {
            if let Some(node) = self.nodes.get_mut(id) {
                node.grid = SpatialGrid::new(config.cell_size);
            }
        }
        if !self.finalized {
            return;
        }
        let entries: Vec<(ChainId, AtomId, Point3<f64>)> = self
            .polymer
            .atoms_iter()
            .filter_map(|(id, atom)| {
                self.controller
                    .get(atom.residue_id)
                    .map(|&owner| (owner, id, atom.position))
            })
            .collect();
        for (owner, atom_id, position) in entries {
            if let Some(node) = self.nodes.get_mut(owner) {
                node.grid.insert(atom_id, position);
            }
        }
        debug!(
            cell_size = config.cell_size,
            cutoff = config.cutoff,
            "Rebuilt spatial grids with new configuration"
        );
    }

    /// Writes a new position into the arena and, when requested and the
    /// system is finalized, relocates the atom in its controller's grid.
    pub(crate) fn apply_move(
        &mut self,
        atom_id: AtomId,
        position: Point3<f64>,
        policy: GridUpdatePolicy,
    ) {
        let Some(atom) = self.polymer.atom_mut(atom_id) else {
            return;
        };
        atom.position = position;
        let residue_id = atom.residue_id;
        if policy == GridUpdatePolicy::Skip || !self.finalized {
            return;
        }
        let Some(&owner) = self.controller.get(residue_id) else {
            return;
        };
        if let Some(node) = self.nodes.get_mut(owner) {
            node.grid.relocate(atom_id, position);
        }
    }

    fn named_atom(
        &self,
        residue_id: ResidueId,
        atom_name: &str,
        shell: &str,
    ) -> Result<AtomId, ChainError> {
        self.polymer
            .residue(residue_id)
            .and_then(|r| r.get_atom_id_by_name(atom_name))
            .ok_or_else(|| ChainError::MalformedShell {
                shell: shell.to_string(),
                message: format!("references unknown atom '{atom_name}'"),
            })
    }

    /// Builds the per-block degree-of-freedom and traversal caches for a
    /// residue range.
    ///
    /// Within each residue, each block is walked breadth-first from its
    /// designated start atom (falling back to the block's first atom),
    /// restricted to the block's own atoms. Rotatable bonds are recorded
    /// in discovery order, which makes DOF indices deterministic.
    ///
    /// A rotatable inter-residue link bond is recorded under the block its
    /// head atom belongs to, just before that residue's own bonds. Links
    /// whose tail residue lies outside the range are skipped, since their
    /// pivot is not part of the chain.
    fn build_caches(
        &self,
        start: usize,
        len: usize,
    ) -> (HashMap<BlockKind, Vec<Dof>>, HashMap<BlockKind, Vec<AtomId>>) {
        let mut dofs: HashMap<BlockKind, Vec<Dof>> = HashMap::new();
        let mut block_atoms: HashMap<BlockKind, Vec<AtomId>> = HashMap::new();

        for index in start..start + len {
            let Some(residue_id) = self.polymer.residue_at(index) else {
                continue;
            };
            let Some(residue) = self.polymer.residue(residue_id) else {
                continue;
            };
            if index > start {
                if let Some((kind, dof)) = self.link_dof(index) {
                    dofs.entry(kind).or_default().push(dof);
                }
            }
            for block in residue.blocks() {
                let members: HashSet<AtomId> = block.atoms().iter().copied().collect();
                let Some(seed) = block
                    .start_atom
                    .or_else(|| block.atoms().first().copied())
                else {
                    continue;
                };

                let mut visited = HashSet::from([seed]);
                let mut order = vec![seed];
                let mut queue = VecDeque::from([seed]);
                while let Some(current) = queue.pop_front() {
                    let Some(neighbors) = self.polymer.get_bonded_neighbors(current) else {
                        continue;
                    };
                    for &next in neighbors {
                        if !members.contains(&next) || !visited.insert(next) {
                            continue;
                        }
                        if let Some(bond) = self.polymer.bond_between(current, next) {
                            if bond.is_rotatable() {
                                dofs.entry(block.kind).or_default().push(Dof {
                                    atom1: current,
                                    atom2: next,
                                });
                            }
                        }
                        order.push(next);
                        queue.push_back(next);
                    }
                }
                // Block atoms unreachable from the start atom still belong
                // to the traversal cache, in shell order.
                for &atom in block.atoms() {
                    if !visited.contains(&atom) {
                        order.push(atom);
                    }
                }
                block_atoms.entry(block.kind).or_default().extend(order);
            }
        }

        (dofs, block_atoms)
    }

    /// Finds the rotatable bond arriving at a residue from its arena
    /// predecessor, keyed by the block of its head atom. `None` when the
    /// shell catalog declared the link fixed.
    fn link_dof(&self, index: usize) -> Option<(BlockKind, Dof)> {
        let prev_id = self.polymer.residue_at(index - 1)?;
        let prev_atoms: HashSet<AtomId> =
            self.polymer.residue(prev_id)?.atoms().iter().copied().collect();
        let residue_id = self.polymer.residue_at(index)?;
        let residue = self.polymer.residue(residue_id)?;
        for block in residue.blocks() {
            for &head in block.atoms() {
                let Some(neighbors) = self.polymer.get_bonded_neighbors(head) else {
                    continue;
                };
                for &tail in neighbors {
                    if !prev_atoms.contains(&tail) {
                        continue;
                    }
                    if self
                        .polymer
                        .bond_between(tail, head)
                        .is_some_and(|bond| bond.is_rotatable())
                    {
                        return Some((block.kind, Dof { atom1: tail, atom2: head }));
                    }
                }
            }
        }
        None
    }

    /// Collects the atoms on the moving side of a bond, fenced to an
    /// absolute residue index range.
    fn downstream_atoms(
        &self,
        seed: AtomId,
        pivot: AtomId,
        start: usize,
        len: usize,
    ) -> Vec<AtomId> {
        let mut moved = Vec::new();
        let mut visited = HashSet::from([seed, pivot]);
        let mut queue = VecDeque::from([seed]);
        while let Some(current) = queue.pop_front() {
            moved.push(current);
            let Some(neighbors) = self.polymer.get_bonded_neighbors(current) else {
                continue;
            };
            for &next in neighbors {
                if !visited.insert(next) {
                    continue;
                }
                let in_range = self
                    .polymer
                    .atom(next)
                    .and_then(|a| self.polymer.residue_index(a.residue_id))
                    .is_some_and(|i| i >= start && i < start + len);
                if in_range {
                    queue.push_back(next);
                }
            }
        }
        moved
    }

    fn capture(&self, start: usize, len: usize) -> ChainSnapshot {
        let mut positions = Vec::new();
        for index in start..start + len {
            let Some(residue_id) = self.polymer.residue_at(index) else {
                continue;
            };
            let Some(residue) = self.polymer.residue(residue_id) else {
                continue;
            };
            for &atom_id in residue.atoms() {
                if let Some(atom) = self.polymer.atom(atom_id) {
                    positions.push((atom_id, atom.position));
                }
            }
        }
        ChainSnapshot { positions }
    }

    fn transfer_residues(
        &mut self,
        chain: ChainId,
        range: Option<(usize, usize)>,
        to_chain: bool,
    ) -> Result<(), ChainError> {
        if !self.finalized {
            return Err(ChainError::NotFinalized);
        }
        let node = self.nodes.get(chain).ok_or(ChainError::InvalidChain)?;
        let parent = node.parent.ok_or(ChainError::NoParent)?;
        let (start, end) = range.unwrap_or((0, node.len.saturating_sub(1)));
        if node.len == 0 || start > end || end >= node.len {
            return Err(ChainError::RangeOutOfBounds {
                start,
                end,
                len: node.len,
            });
        }
        let abs_start = node.start + start;
        let abs_end = node.start + end;
        let (source, target) = if to_chain { (parent, chain) } else { (chain, parent) };

        let mut residues = Vec::with_capacity(abs_end - abs_start + 1);
        for index in abs_start..=abs_end {
            let residue_id = self.polymer.residue_at(index).ok_or_else(|| {
                ChainError::Internal("residue index outside arena".to_string())
            })?;
            match self.controller.get(residue_id) {
                Some(&owner) if owner == source => residues.push(residue_id),
                _ => return Err(ChainError::UnownedRange { start, end }),
            }
        }

        for residue_id in residues {
            let atom_ids: Vec<AtomId> = self
                .polymer
                .residue(residue_id)
                .map(|r| r.atoms().to_vec())
                .unwrap_or_default();
            for atom_id in atom_ids {
                let position = match self.nodes[source].grid.remove(atom_id) {
                    Some(registered) => registered,
                    None => match self.polymer.atom(atom_id) {
                        Some(atom) => atom.position,
                        None => continue,
                    },
                };
                self.nodes[target].grid.insert(atom_id, position);
            }
            self.controller.insert(residue_id, target);
        }
        debug!(
            start = abs_start,
            end = abs_end,
            detached = to_chain,
            "Transferred residue control"
        );
        Ok(())
    }
}
