//! Material definitions and the material database
//!
//! The database is filled from a plain-text table:
//!
//! ```text
//! # comment
//! Water: d=1.00 g/cm3 ; n=2
//!     +el: name=Hydrogen ; f=0.111894
//!     +el: name=Oxygen   ; f=0.888106
//! ```
//!
//! Loading replaces the whole table (last load wins). Consumers built from an
//! earlier load can compare [`MaterialDatabase::generation`] to notice it.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::elements::{AVOGADRO, ELEMENTS, Element, FINE_STRUCTURE, CLASSICAL_ELECTRON_RADIUS_MM};
use crate::interactions::{
    klein_nishina_per_electron, photoelectric_per_atom, solve_increasing,
};
use crate::particle::ParticleType;
use crate::units::{Dimension, UnitError, UnitValue};

/// Lowest energy the transport engine tabulates (MeV)
pub const MIN_TABLE_ENERGY_MEV: f64 = 990.0e-6;
/// Highest energy the transport engine tabulates (MeV)
pub const MAX_TABLE_ENERGY_MEV: f64 = 250.0;

/// Photon cuts are placed where the attenuation length is this many range cuts
const PHOTON_CUT_ABSORPTION_LENGTHS: f64 = 5.0;
const FRACTION_TOLERANCE: f64 = 1.0e-3;

#[derive(Debug, Error)]
pub enum MaterialError {
    #[error("material table line {line}: {reason}")]
    Parse { line: usize, reason: String },
    #[error("unknown material '{0}'")]
    UnknownMaterial(String),
    #[error("material database has not been loaded")]
    NotLoaded,
    #[error("range cut must be strictly positive, got {0} mm")]
    InvalidCut(f64),
    #[error(transparent)]
    Unit(#[from] UnitError),
    #[error("failed to read material table {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// One element of a material's composition
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Component {
    pub element: String,
    pub mass_fraction: f64,
}

/// Definition of a material's properties
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Material {
    pub name: String,
    /// Density (g/cm³)
    pub density: f64,
    /// Elements in declaration order
    pub composition: Vec<Component>,
}

impl Material {
    fn elements(&self) -> impl Iterator<Item = (&'static Element, f64)> + '_ {
        // Compositions are validated on load, unknown elements cannot occur here
        self.composition
            .iter()
            .filter_map(|c| Element::by_name(&c.element).map(|e| (e, c.mass_fraction)))
    }

    /// Density in g/mm³
    fn density_per_mm3(&self) -> f64 {
        self.density * 1.0e-3
    }

    /// Number of atoms of each element per mm³
    pub fn atom_densities(&self) -> Vec<(&'static Element, f64)> {
        let rho = self.density_per_mm3();
        self.elements()
            .map(|(e, f)| (e, AVOGADRO * rho * f / e.molar_mass))
            .collect()
    }

    /// Total number of atoms per mm³
    pub fn atomic_number_density(&self) -> f64 {
        self.atom_densities().iter().map(|(_, n)| n).sum()
    }

    /// Electrons per mm³
    pub fn electron_density(&self) -> f64 {
        self.atom_densities()
            .iter()
            .map(|(e, n)| n * f64::from(e.atomic_number))
            .sum()
    }

    /// Radiation length (mm), Tsai's expression with Coulomb correction
    pub fn radiation_length(&self) -> f64 {
        const L_RAD_LIGHT: [f64; 4] = [5.31, 4.79, 4.74, 4.71];
        const LP_RAD_LIGHT: [f64; 4] = [6.144, 5.621, 5.805, 5.924];
        const K1: f64 = 0.00830;
        const K2: f64 = 0.20206;
        const K3: f64 = 0.00200;
        const K4: f64 = 0.03690;
        let alpha_rcl2 =
            FINE_STRUCTURE * CLASSICAL_ELECTRON_RADIUS_MM * CLASSICAL_ELECTRON_RADIUS_MM;

        let mut inverse = 0.0;
        for (element, atoms) in self.atom_densities() {
            let z = f64::from(element.atomic_number);
            let az2 = (FINE_STRUCTURE * z) * (FINE_STRUCTURE * z);
            let az4 = az2 * az2;
            let coulomb = (K1 * az4 + K2 + 1.0 / (1.0 + az2)) * az2 - (K3 * az4 + K4) * az4;

            let log_z3 = z.ln() / 3.0;
            let (l_rad, lp_rad) = match usize::from(element.atomic_number) {
                iz @ 1..=4 => (L_RAD_LIGHT[iz - 1], LP_RAD_LIGHT[iz - 1]),
                _ => (184.15_f64.ln() - log_z3, 1194.0_f64.ln() - 2.0 * log_z3),
            };
            let tsai = 4.0 * alpha_rcl2 * z * (z * (l_rad - coulomb) + lp_rad);
            inverse += atoms * tsai;
        }

        if inverse <= 0.0 {
            f64::MAX
        } else {
            1.0 / inverse
        }
    }

    /// Linear attenuation from Compton and photoelectric absorption (1/mm)
    pub fn photon_absorption(&self, energy_mev: f64) -> f64 {
        let compton = self.electron_density() * klein_nishina_per_electron(energy_mev);
        let photo: f64 = self
            .atom_densities()
            .iter()
            .map(|(e, n)| n * photoelectric_per_atom(e.atomic_number, energy_mev))
            .sum();
        compton + photo
    }

    /// CSDA range of a charged particle (mm), Katz–Penfold relation
    pub fn charged_range(&self, energy_mev: f64) -> f64 {
        let areal = if energy_mev <= 2.5 {
            0.412 * energy_mev.powf(1.265 - 0.0954 * energy_mev.ln())
        } else {
            0.530 * energy_mev - 0.106
        };
        // g/cm² -> cm -> mm
        areal / self.density * 10.0
    }
}

/// Derived quantities of one material, as listed by catalogue queries
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MaterialProperties {
    pub name: String,
    /// g/cm³
    pub density: f64,
    pub element_count: usize,
    /// Atoms per mm³
    pub atomic_number_density: f64,
    /// Electrons per mm³
    pub electron_density: f64,
    /// mm
    pub radiation_length: f64,
}

impl fmt::Display for MaterialProperties {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: density {} g/cm3, {} elements, {:.4e} atoms/mm3, {:.4e} electrons/mm3, radiation length {:.2} mm",
            self.name,
            self.density,
            self.element_count,
            self.atomic_number_density,
            self.electron_density,
            self.radiation_length
        )
    }
}

/// Registry of all materials loaded from a table
#[derive(Debug, Default)]
pub struct MaterialDatabase {
    materials: BTreeMap<String, Material>,
    source_file: Option<PathBuf>,
    generation: u64,
}

impl MaterialDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a material table from disk, replacing any previous table
    pub fn load(&mut self, path: impl AsRef<Path>) -> Result<(), MaterialError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| MaterialError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        self.load_str(&text)?;
        self.source_file = Some(path.to_path_buf());
        Ok(())
    }

    /// Load a material table from text, replacing any previous table
    ///
    /// Nothing is replaced when parsing fails.
    pub fn load_str(&mut self, text: &str) -> Result<(), MaterialError> {
        let materials = parse_table(text)?;
        if self.is_loaded() {
            log::warn!(
                "Material database reloaded ({} -> {} materials); tables built from the previous load are stale",
                self.materials.len(),
                materials.len()
            );
        }
        log::info!("Loaded {} materials", materials.len());
        for material in materials.values() {
            log::trace!("  material {} ({} g/cm3)", material.name, material.density);
        }
        self.materials = materials;
        self.source_file = None;
        self.generation += 1;
        Ok(())
    }

    pub fn is_loaded(&self) -> bool {
        self.generation > 0
    }

    /// Incremented by every successful load
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn source_file(&self) -> Option<&Path> {
        self.source_file.as_deref()
    }

    pub fn len(&self) -> usize {
        self.materials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.materials.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.materials.contains_key(name)
    }

    /// Get material definition by name
    pub fn get(&self, name: &str) -> Result<&Material, MaterialError> {
        self.materials
            .get(name)
            .ok_or_else(|| MaterialError::UnknownMaterial(name.to_string()))
    }

    /// Materials in name order
    pub fn materials(&self) -> impl Iterator<Item = &Material> {
        self.materials.values()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.materials.keys().map(String::as_str)
    }

    /// Density in g/cm³
    pub fn density_of(&self, name: &str) -> Result<f64, MaterialError> {
        Ok(self.get(name)?.density)
    }

    /// Atoms per mm³
    pub fn atomic_number_density_of(&self, name: &str) -> Result<f64, MaterialError> {
        Ok(self.get(name)?.atomic_number_density())
    }

    /// Electrons per mm³
    pub fn electron_density_of(&self, name: &str) -> Result<f64, MaterialError> {
        Ok(self.get(name)?.electron_density())
    }

    /// Radiation length in mm
    pub fn radiation_length_of(&self, name: &str) -> Result<f64, MaterialError> {
        Ok(self.get(name)?.radiation_length())
    }

    /// Summary of one material's derived quantities
    pub fn material_properties(&self, name: &str) -> Result<MaterialProperties, MaterialError> {
        let material = self.get(name)?;
        Ok(MaterialProperties {
            name: material.name.clone(),
            density: material.density,
            element_count: material.composition.len(),
            atomic_number_density: material.atomic_number_density(),
            electron_density: material.electron_density(),
            radiation_length: material.radiation_length(),
        })
    }

    /// Elements material compositions may reference, by atomic number
    pub fn available_elements() -> &'static [Element] {
        &ELEMENTS
    }

    pub fn print_available_elements() {
        log::info!("Available chemical elements:");
        for element in Self::available_elements() {
            log::info!(
                "  {:>3} {} ({} g/mol, I = {} eV)",
                element.atomic_number,
                element.name,
                element.molar_mass,
                element.mean_excitation_energy
            );
        }
    }

    pub fn print_available_materials(&self) -> Result<(), MaterialError> {
        if !self.is_loaded() {
            return Err(MaterialError::NotLoaded);
        }
        log::info!("Material database: {} materials", self.len());
        for name in self.names() {
            log::info!("  {}", self.material_properties(name)?);
        }
        Ok(())
    }

    pub fn print_material_properties(&self, name: &str) -> Result<(), MaterialError> {
        log::info!("{}", self.material_properties(name)?);
        Ok(())
    }

    /// Convert a range cut into the production threshold energy in a material
    pub fn energy_cut_of(
        &self,
        name: &str,
        particle: ParticleType,
        range: UnitValue,
    ) -> Result<UnitValue, MaterialError> {
        if !self.is_loaded() {
            return Err(MaterialError::NotLoaded);
        }
        let material = self.get(name)?;
        let range_mm = range.expect(Dimension::Length)?;
        if range_mm <= 0.0 {
            return Err(MaterialError::InvalidCut(range_mm));
        }

        let energy = if particle.is_charged() {
            solve_increasing(
                |e| material.charged_range(e),
                MIN_TABLE_ENERGY_MEV,
                MAX_TABLE_ENERGY_MEV,
                range_mm,
            )
        } else {
            // Attenuation length grows with energy
            let target = PHOTON_CUT_ABSORPTION_LENGTHS * range_mm;
            solve_increasing(
                |e| 1.0 / material.photon_absorption(e),
                MIN_TABLE_ENERGY_MEV,
                MAX_TABLE_ENERGY_MEV,
                target,
            )
        };
        log::debug!(
            "Energy cut for {} in {}: {} mm -> {:.6} MeV",
            particle,
            name,
            range_mm,
            energy
        );
        Ok(UnitValue::mev(energy))
    }
}

fn parse_error(line: usize, reason: impl Into<String>) -> MaterialError {
    MaterialError::Parse {
        line,
        reason: reason.into(),
    }
}

/// Split `key=value ; key=value` fields, whitespace removed
fn fields(text: &str) -> Vec<(String, String)> {
    text.split(';')
        .filter_map(|field| {
            let compact: String = field.chars().filter(|c| !c.is_whitespace()).collect();
            let (key, value) = compact.split_once('=')?;
            Some((key.to_lowercase(), value.to_string()))
        })
        .collect()
}

fn parse_density(line: usize, value: &str) -> Result<f64, MaterialError> {
    let split = value
        .find(|c: char| !(c.is_ascii_digit() || c == '.' || c == 'e' || c == 'E' || c == '-' || c == '+'))
        .unwrap_or(value.len());
    let (number, unit) = value.split_at(split);
    let number: f64 = number
        .parse()
        .map_err(|_| parse_error(line, format!("invalid density '{value}'")))?;
    let scale = match unit {
        "" | "g/cm3" => 1.0,
        "mg/cm3" => 1.0e-3,
        "kg/m3" => 1.0e-3,
        other => return Err(parse_error(line, format!("unknown density unit '{other}'"))),
    };
    let density = number * scale;
    if !(density > 0.0 && density.is_finite()) {
        return Err(parse_error(line, format!("density must be positive, got {density}")));
    }
    Ok(density)
}

fn parse_component(line: usize, text: &str) -> Result<Component, MaterialError> {
    let body = text
        .trim()
        .strip_prefix("+el:")
        .ok_or_else(|| parse_error(line, "expected an element line starting with '+el:'"))?;
    let mut element = None;
    let mut fraction = None;
    for (key, value) in fields(body) {
        match key.as_str() {
            "name" => element = Some(value),
            "f" => {
                fraction = Some(
                    value
                        .parse::<f64>()
                        .map_err(|_| parse_error(line, format!("invalid fraction '{value}'")))?,
                )
            }
            _ => {}
        }
    }
    let element = element.ok_or_else(|| parse_error(line, "element line without name="))?;
    let fraction = fraction.ok_or_else(|| parse_error(line, "element line without f="))?;
    if Element::by_name(&element).is_none() {
        return Err(parse_error(line, format!("unknown chemical element '{element}'")));
    }
    if !(fraction > 0.0 && fraction <= 1.0) {
        return Err(parse_error(line, format!("mass fraction {fraction} outside (0, 1]")));
    }
    Ok(Component {
        element,
        mass_fraction: fraction,
    })
}

fn parse_table(text: &str) -> Result<BTreeMap<String, Material>, MaterialError> {
    let mut materials = BTreeMap::new();
    let mut lines = text
        .lines()
        .enumerate()
        .map(|(i, l)| (i + 1, l.trim()))
        .filter(|(_, l)| !l.is_empty() && !l.starts_with('#'));

    while let Some((line_no, line)) = lines.next() {
        let (name, rest) = line
            .split_once(':')
            .ok_or_else(|| parse_error(line_no, "expected 'Name: d=... ; n=...'"))?;
        let name = name.trim();
        if name.is_empty() {
            return Err(parse_error(line_no, "material without a name"));
        }
        if name.starts_with('+') {
            return Err(parse_error(line_no, "element line outside of a material"));
        }

        let mut density = None;
        let mut count = None;
        for (key, value) in fields(rest) {
            match key.as_str() {
                "d" => density = Some(parse_density(line_no, &value)?),
                "n" => {
                    count = Some(value.parse::<usize>().map_err(|_| {
                        parse_error(line_no, format!("invalid element count '{value}'"))
                    })?)
                }
                _ => {}
            }
        }
        let density =
            density.ok_or_else(|| parse_error(line_no, format!("material '{name}' has no density")))?;
        let count = match count {
            Some(n) if n > 0 => n,
            _ => {
                return Err(parse_error(
                    line_no,
                    format!("material '{name}' has no composition"),
                ))
            }
        };

        let mut composition = Vec::with_capacity(count);
        for _ in 0..count {
            let (element_line, text) = lines.next().ok_or_else(|| {
                parse_error(line_no, format!("material '{name}' declares {count} elements"))
            })?;
            composition.push(parse_component(element_line, text)?);
        }

        let total: f64 = composition.iter().map(|c| c.mass_fraction).sum();
        if (total - 1.0).abs() > FRACTION_TOLERANCE {
            return Err(parse_error(
                line_no,
                format!("mass fractions of '{name}' sum to {total:.6}"),
            ));
        }

        let material = Material {
            name: name.to_string(),
            density,
            composition,
        };
        if materials.insert(name.to_string(), material).is_some() {
            return Err(parse_error(line_no, format!("duplicate material '{name}'")));
        }
    }

    Ok(materials)
}
