use super::atom::BlockKind;
use super::ids::AtomId;
use std::collections::HashMap;

/// A named group of atoms within a residue, instantiated from a catalog
/// shell. Degree-of-freedom discovery starts at the block's designated
/// start atom.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub kind: BlockKind,                 // Which block of the residue this is
    pub(crate) atoms: Vec<AtomId>,       // Atoms belonging to this block, in shell order
    pub start_atom: Option<AtomId>,      // Designated traversal start atom
}

impl Block {
    pub(crate) fn new(kind: BlockKind) -> Self {
        Self {
            kind,
            atoms: Vec::new(),
            start_atom: None,
        }
    }

    pub fn atoms(&self) -> &[AtomId] {
        &self.atoms
    }
}

/// A residue: an ordered set of atoms aggregated into one or more blocks.
///
/// Residues are passive containers built once from catalog data and never
/// restructured afterwards; only their atoms' positions change. The
/// persisted sequence number (`number`) comes from the source numbering
/// and is independent of the residue's index local to whichever sub-chain
/// is currently manipulating it.
#[derive(Debug, Clone, PartialEq)]
pub struct Residue {
    pub number: isize,                      // Persisted sequence number from the source
    pub name: String,                       // Shell name (e.g., "ALA")
    pub(crate) atoms: Vec<AtomId>,          // Atoms belonging to this residue, in shell order
    pub(crate) blocks: Vec<Block>,          // Blocks aggregating the atoms
    atom_name_map: HashMap<String, AtomId>, // Map from atom name to its stable ID
}

impl Residue {
    pub(crate) fn new(number: isize, name: &str) -> Self {
        Self {
            number,
            name: name.to_string(),
            atoms: Vec::new(),
            blocks: Vec::new(),
            atom_name_map: HashMap::new(),
        }
    }

    pub(crate) fn add_atom(&mut self, atom_name: &str, atom_id: AtomId, kind: BlockKind) {
        self.atoms.push(atom_id);
        self.atom_name_map.insert(atom_name.to_string(), atom_id);
        match self.blocks.iter_mut().find(|b| b.kind == kind) {
            Some(block) => block.atoms.push(atom_id),
            None => {
                let mut block = Block::new(kind);
                block.atoms.push(atom_id);
                self.blocks.push(block);
            }
        }
    }

    pub fn atoms(&self) -> &[AtomId] {
        &self.atoms
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn block(&self, kind: BlockKind) -> Option<&Block> {
        self.blocks.iter().find(|b| b.kind == kind)
    }

    pub(crate) fn block_mut(&mut self, kind: BlockKind) -> Option<&mut Block> {
        self.blocks.iter_mut().find(|b| b.kind == kind)
    }

    pub fn get_atom_id_by_name(&self, name: &str) -> Option<AtomId> {
        self.atom_name_map.get(name).copied()
    }
}
