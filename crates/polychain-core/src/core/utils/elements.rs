use phf::{Map, phf_map};

// Fallback per-element radii (Angstroms) used when a shell omits explicit
// values. Covalent radii after Cordero et al., van-der-Waals after Bondi.
static COVALENT_RADII: Map<&'static str, f64> = phf_map! {
    "H" => 0.31,
    "C" => 0.76,
    "N" => 0.71,
    "O" => 0.66,
    "F" => 0.57,
    "P" => 1.07,
    "S" => 1.05,
    "CL" => 1.02,
    "BR" => 1.20,
    "I" => 1.39,
    "SE" => 1.20,
};

static VDW_RADII: Map<&'static str, f64> = phf_map! {
    "H" => 1.20,
    "C" => 1.70,
    "N" => 1.55,
    "O" => 1.52,
    "F" => 1.47,
    "P" => 1.80,
    "S" => 1.80,
    "CL" => 1.75,
    "BR" => 1.85,
    "I" => 1.98,
    "SE" => 1.90,
};

const DEFAULT_COVALENT_RADIUS: f64 = 0.77;
const DEFAULT_VDW_RADIUS: f64 = 1.70;

pub fn covalent_radius(element: &str) -> f64 {
    COVALENT_RADII
        .get(element.trim().to_ascii_uppercase().as_str())
        .copied()
        .unwrap_or(DEFAULT_COVALENT_RADIUS)
}

pub fn vdw_radius(element: &str) -> f64 {
    VDW_RADII
        .get(element.trim().to_ascii_uppercase().as_str())
        .copied()
        .unwrap_or(DEFAULT_VDW_RADIUS)
}
