use crate::core::utils::elements;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

/// Template for a single atom of a residue shell.
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct AtomShell {
    pub name: String,
    pub element: String,
    /// Default position relative to the shell's local origin.
    pub position: [f64; 3],
    /// Block membership ("backbone", "sidechain", ...).
    pub block: String,
    /// Explicit covalent radius; falls back to the element table when absent.
    pub covalent_radius: Option<f64>,
    /// Explicit van-der-Waals radius; falls back to the element table when absent.
    pub vdw_radius: Option<f64>,
}

impl AtomShell {
    pub fn covalent_radius(&self) -> f64 {
        self.covalent_radius
            .unwrap_or_else(|| elements::covalent_radius(&self.element))
    }

    pub fn vdw_radius(&self) -> f64 {
        self.vdw_radius
            .unwrap_or_else(|| elements::vdw_radius(&self.element))
    }
}

/// Template for a bond between two named atoms of the same shell.
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct BondShell {
    pub a: String,
    pub b: String,
    /// Marks this bond as a rotatable degree of freedom.
    #[serde(default)]
    pub rotatable: bool,
}

/// Default inter-residue link geometry: when a residue is appended with no
/// explicit positions, its `head` atom is placed at the previous residue's
/// `tail` atom plus `offset`, and a bond `tail - head` is created.
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct LinkShell {
    pub tail: String,
    pub head: String,
    pub offset: [f64; 3],
    #[serde(default)]
    pub rotatable: bool,
}

/// A complete residue template: atoms, bond graph, per-block traversal
/// start atoms, and link geometry.
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ResidueShell {
    pub atoms: Vec<AtomShell>,
    pub bonds: Vec<BondShell>,
    /// Map from block name to the atom the DOF traversal starts at.
    #[serde(default)]
    pub start_atoms: HashMap<String, String>,
    pub link: Option<LinkShell>,
}

impl ResidueShell {
    pub fn atom(&self, name: &str) -> Option<&AtomShell> {
        self.atoms.iter().find(|a| a.name == name)
    }
}

/// The process-wide residue shell catalog, keyed by residue name.
#[derive(Debug, Clone, Default)]
pub struct ShellRegistry {
    registry: HashMap<String, ResidueShell>,
}

impl ShellRegistry {
    pub fn load(path: &Path) -> Result<Self, ShellLoadError> {
        let content = std::fs::read_to_string(path).map_err(|e| ShellLoadError::Io {
            path: path.to_string_lossy().to_string(),
            source: e,
        })?;
        Self::from_toml_str(&content).map_err(|e| ShellLoadError::Toml {
            path: path.to_string_lossy().to_string(),
            source: e,
        })
    }

    pub fn from_toml_str(content: &str) -> Result<Self, toml::de::Error> {
        let registry: HashMap<String, ResidueShell> = toml::from_str(content)?;
        Ok(Self { registry })
    }

    pub fn get(&self, residue_name: &str) -> Option<&ResidueShell> {
        self.registry.get(residue_name)
    }

    pub fn is_empty(&self) -> bool {
        self.registry.is_empty()
    }

    /// The largest atom diameter across the whole catalog.
    ///
    /// This is the grid cell-size input: with cells at least this wide, two
    /// atoms whose van-der-Waals spheres might touch can never be more than
    /// one cell apart.
    pub fn max_atom_diameter(&self) -> f64 {
        self.registry
            .values()
            .flat_map(|shell| shell.atoms.iter())
            .map(|atom| 2.0 * atom.vdw_radius())
            .fold(0.0, f64::max)
    }
}

#[derive(Debug, Error)]
pub enum ShellLoadError {
    #[error("File I/O error for '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("TOML parsing error for '{path}': {source}")]
    Toml {
        path: String,
        source: toml::de::Error,
    },
}
