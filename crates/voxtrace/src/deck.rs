//! Simulation deck definition and RON file loading
//!
//! A deck describes one complete run: the material table, an optional phantom to
//! voxelize, navigators, physics, sources and cuts. Relative paths are resolved
//! against the deck file's directory.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use voxtrace_core::phantom::PhantomFiles;
use voxtrace_core::{
    AnalyticalVolume, CutScope, Cuboid, EnergyModel, PhantomBuilder, Simulation, Sphere, Tube,
    VerbosityFlags, VoxelDataType, VoxelizedNavigator, XRaySource,
};
use voxtrace_physics::{ParticleType, PhysicsProcess, UnitValue};

/// Top-level deck loaded from RON files
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Deck {
    /// Deck name
    pub name: String,

    #[serde(default)]
    pub description: String,

    /// Material table file
    pub materials: PathBuf,

    /// Phantom to voxelize and register before the other navigators
    #[serde(default)]
    pub phantom: Option<PhantomDeck>,

    /// Prebuilt voxelized navigators
    #[serde(default)]
    pub navigators: Vec<VoxelizedNavigator>,

    #[serde(default)]
    pub cross_sections: CrossSectionDeck,

    pub sources: Vec<SourceDeck>,

    #[serde(default)]
    pub cuts: Vec<CutDeck>,

    /// Subsystems whose details are logged during initialization
    #[serde(default)]
    pub verbosity: VerbosityFlags,

    #[serde(default)]
    pub seed: Option<u32>,
}

/// Analytical phantom, drawn in order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhantomDeck {
    /// Name of the navigator registered for the written phantom
    pub name: String,
    pub dimensions: [u32; 3],
    pub element_size: [UnitValue; 3],
    pub image_file: PathBuf,
    pub range_file: PathBuf,
    #[serde(default)]
    pub isocenter: Option<[UnitValue; 3]>,
    #[serde(default)]
    pub background: Option<String>,
    /// Scalar type of the written image, e.g. `"MET_UCHAR"`
    #[serde(default)]
    pub data_type: VoxelDataType,
    pub primitives: Vec<PrimitiveDeck>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum PrimitiveDeck {
    Tube {
        radius: UnitValue,
        height: UnitValue,
        label: f32,
        material: String,
        #[serde(default)]
        position: Option<[UnitValue; 3]>,
    },
    Box {
        size: [UnitValue; 3],
        label: f32,
        material: String,
        #[serde(default)]
        position: Option<[UnitValue; 3]>,
    },
    Sphere {
        radius: UnitValue,
        label: f32,
        material: String,
        #[serde(default)]
        position: Option<[UnitValue; 3]>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrossSectionDeck {
    #[serde(default = "all_processes")]
    pub processes: Vec<PhysicsProcess>,
    /// Materials to tabulate; every database material when empty
    #[serde(default)]
    pub materials: Vec<String>,
    #[serde(default)]
    pub energy_range: Option<(UnitValue, UnitValue)>,
    #[serde(default)]
    pub bins: Option<u16>,
}

impl Default for CrossSectionDeck {
    fn default() -> Self {
        Self {
            processes: all_processes(),
            materials: Vec::new(),
            energy_range: None,
            bins: None,
        }
    }
}

fn all_processes() -> Vec<PhysicsProcess> {
    PhysicsProcess::ALL.to_vec()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceDeck {
    pub name: String,
    #[serde(default = "photon")]
    pub particle: ParticleType,
    pub particles: u64,
    pub energy: EnergyModel,
    #[serde(default)]
    pub position: Option<[UnitValue; 3]>,
    #[serde(default)]
    pub rotation: Option<[UnitValue; 3]>,
    #[serde(default)]
    pub beam_aperture: Option<UnitValue>,
    #[serde(default)]
    pub focal_spot: Option<[UnitValue; 3]>,
    /// Rows of the local axis matrix
    #[serde(default)]
    pub local_axis: Option<[[f64; 3]; 3]>,
}

fn photon() -> ParticleType {
    ParticleType::Photon
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CutDeck {
    pub particle: ParticleType,
    /// Range (length) or threshold (energy)
    pub value: UnitValue,
    /// Navigator name or `all`
    #[serde(default = "all_scope")]
    pub scope: String,
}

fn all_scope() -> String {
    "all".to_string()
}

fn resolve(base: &Path, path: &mut PathBuf) {
    if path.is_relative() {
        *path = base.join(&*path);
    }
}

impl Deck {
    /// Load deck from RON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read deck file: {}", path.display()))?;

        let mut deck: Deck = ron::from_str(&content)
            .with_context(|| format!("Failed to parse RON deck: {}", path.display()))?;

        if let Some(base) = path.parent() {
            deck.resolve_paths(base);
        }
        Ok(deck)
    }

    /// Save deck to RON file
    pub fn to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let ron = ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
            .context("Failed to serialize deck to RON")?;

        std::fs::write(path.as_ref(), ron)
            .with_context(|| format!("Failed to write deck file: {}", path.as_ref().display()))?;

        Ok(())
    }

    /// Make every relative path in the deck relative to `base`
    pub fn resolve_paths(&mut self, base: &Path) {
        resolve(base, &mut self.materials);
        if let Some(phantom) = &mut self.phantom {
            resolve(base, &mut phantom.image_file);
            resolve(base, &mut phantom.range_file);
        }
        for navigator in &mut self.navigators {
            resolve(base, &mut navigator.image_file);
            resolve(base, &mut navigator.range_file);
        }
        for source in &mut self.sources {
            if let EnergyModel::Poly(spectrum) = &mut source.energy {
                resolve(base, spectrum);
            }
        }
    }

    /// Configure a simulation in dependency order
    ///
    /// The compute context is left alone; select it before or after.
    pub fn apply(&self, sim: &mut Simulation) -> Result<()> {
        log::info!("Applying deck '{}'", self.name);

        sim.materials_mut()?
            .load(&self.materials)
            .with_context(|| format!("Failed to load materials: {}", self.materials.display()))?;

        if let Some(phantom) = &self.phantom {
            let files = phantom.build().with_context(|| {
                format!("Failed to build phantom '{}'", phantom.name)
            })?;
            sim.geometry_mut()?
                .register_voxelized(files.navigator(phantom.name.as_str()))?;
        }
        for navigator in &self.navigators {
            sim.geometry_mut()?
                .register_voxelized(navigator.clone())
                .with_context(|| format!("Failed to register navigator '{}'", navigator.name))?;
        }

        let cross_sections = sim.cross_sections_mut()?;
        for &process in &self.cross_sections.processes {
            cross_sections.add_process(process, process.particle())?;
        }
        for material in &self.cross_sections.materials {
            cross_sections.add_material(material)?;
        }
        if let Some((min, max)) = self.cross_sections.energy_range {
            cross_sections.set_energy_range(min, max)?;
        }
        if let Some(bins) = self.cross_sections.bins {
            cross_sections.set_bin_count(bins)?;
        }

        for source in &self.sources {
            let source = source
                .build()
                .with_context(|| format!("Invalid source '{}'", source.name))?;
            sim.sources_mut()?.add(source);
        }

        for cut in &self.cuts {
            sim.range_cuts_mut()?
                .set_cut(cut.particle, cut.value, CutScope::parse(&cut.scope))
                .with_context(|| format!("Invalid {} cut for '{}'", cut.particle, cut.scope))?;
        }

        sim.set_verbosity_flags(self.verbosity);
        if let Some(seed) = self.seed {
            sim.set_seed(seed)?;
        }
        Ok(())
    }
}

impl PhantomDeck {
    /// Voxelize the primitives and write the image and range files
    pub fn build(&self) -> Result<PhantomFiles> {
        for file in [&self.image_file, &self.range_file] {
            if let Some(dir) = file.parent().filter(|dir| !dir.as_os_str().is_empty()) {
                std::fs::create_dir_all(dir)
                    .with_context(|| format!("Failed to create {}", dir.display()))?;
            }
        }

        let [w, h, d] = self.dimensions;
        let mut builder = PhantomBuilder::new();
        builder.set_dimensions(w, h, d);
        builder.set_element_size(self.element_size)?;
        builder.set_output_paths(&self.image_file, &self.range_file);
        if let Some(isocenter) = self.isocenter {
            builder.set_isocenter(isocenter)?;
        }
        if let Some(background) = &self.background {
            builder.set_background_material(background.as_str());
        }
        builder.set_data_type(self.data_type);
        builder.initialize()?;

        for primitive in &self.primitives {
            primitive.draw(&mut builder)?;
        }
        Ok(builder.write()?)
    }
}

impl PrimitiveDeck {
    fn draw(&self, builder: &mut PhantomBuilder) -> Result<()> {
        match self {
            PrimitiveDeck::Tube {
                radius,
                height,
                label,
                material,
                position,
            } => {
                let mut tube = Tube::new(*radius, *height, *label, material.as_str())?;
                if let Some(position) = position {
                    tube = tube.at(*position)?;
                }
                tube.draw(builder)?;
            }
            PrimitiveDeck::Box {
                size,
                label,
                material,
                position,
            } => {
                let mut cuboid = Cuboid::new(*size, *label, material.as_str())?;
                if let Some(position) = position {
                    cuboid = cuboid.at(*position)?;
                }
                cuboid.draw(builder)?;
            }
            PrimitiveDeck::Sphere {
                radius,
                label,
                material,
                position,
            } => {
                let mut sphere = Sphere::new(*radius, *label, material.as_str())?;
                if let Some(position) = position {
                    sphere = sphere.at(*position)?;
                }
                sphere.draw(builder)?;
            }
        }
        Ok(())
    }
}

impl SourceDeck {
    pub fn build(&self) -> Result<XRaySource> {
        let mut source = XRaySource::new(self.name.as_str());
        source.set_particle_type(self.particle);
        source.set_number_of_particles(self.particles)?;
        source.set_energy_model(self.energy.clone())?;
        if let Some(position) = self.position {
            source.set_position(position)?;
        }
        if let Some(rotation) = self.rotation {
            source.set_rotation(rotation)?;
        }
        if let Some(aperture) = self.beam_aperture {
            source.set_beam_aperture(aperture)?;
        }
        if let Some(focal_spot) = self.focal_spot {
            source.set_focal_spot_size(focal_spot)?;
        }
        if let Some(rows) = self.local_axis {
            source.set_local_axis(rows);
        }
        Ok(source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DECK: &str = r#"(
        name: "tube",
        materials: "materials.dat",
        phantom: Some((
            name: "phantom",
            dimensions: (16, 16, 16),
            element_size: ((magnitude: 1.0, unit: "mm"), (magnitude: 1.0, unit: "mm"), (magnitude: 1.0, unit: "mm")),
            image_file: "phantom.mhd",
            range_file: "range_phantom.txt",
            primitives: [
                Tube(radius: (magnitude: 4.0, unit: "mm"), height: (magnitude: 8.0, unit: "mm"), label: 1.0, material: "Water"),
            ],
        )),
        sources: [
            (name: "xray", particles: 100, energy: Poly("spectrum.dat")),
        ],
        cuts: [
            (particle: electron, value: (magnitude: 0.5, unit: "mm")),
        ],
        verbosity: "SOURCE | MEMORY",
    )"#;

    #[test]
    fn test_defaults_fill_omitted_sections() {
        let deck: Deck = ron::from_str(DECK).unwrap();
        assert_eq!(deck.cross_sections.processes, PhysicsProcess::ALL.to_vec());
        assert!(deck.cross_sections.materials.is_empty());
        assert_eq!(deck.sources[0].particle, ParticleType::Photon);
        assert_eq!(deck.cuts[0].scope, "all");
        assert_eq!(deck.verbosity, VerbosityFlags::SOURCE | VerbosityFlags::MEMORY);
        assert!(deck.seed.is_none());
        assert!(deck.navigators.is_empty());
        assert_eq!(deck.phantom.unwrap().data_type, VoxelDataType::Float);
    }

    #[test]
    fn test_phantom_data_type_by_tag() {
        let text = DECK.replace(
            "range_file: \"range_phantom.txt\",",
            "range_file: \"range_phantom.txt\", data_type: \"MET_USHORT\",",
        );
        let deck: Deck = ron::from_str(&text).unwrap();
        assert_eq!(deck.phantom.unwrap().data_type, VoxelDataType::UShort);

        let text = DECK.replace(
            "range_file: \"range_phantom.txt\",",
            "range_file: \"range_phantom.txt\", data_type: \"MET_DOUBLE\",",
        );
        assert!(ron::from_str::<Deck>(&text).is_err());
    }

    #[test]
    fn test_relative_paths_resolved_against_deck() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tube.ron");
        std::fs::write(&path, DECK).unwrap();

        let deck = Deck::from_file(&path).unwrap();
        assert_eq!(deck.materials, dir.path().join("materials.dat"));
        let phantom = deck.phantom.as_ref().unwrap();
        assert_eq!(phantom.image_file, dir.path().join("phantom.mhd"));
        assert!(matches!(
            &deck.sources[0].energy,
            EnergyModel::Poly(p) if *p == dir.path().join("spectrum.dat")
        ));
    }

    #[test]
    fn test_unknown_unit_rejected() {
        let text = DECK.replace("unit: \"mm\"), height", "unit: \"furlong\"), height");
        assert!(ron::from_str::<Deck>(&text).is_err());
    }

    #[test]
    fn test_deck_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let mut deck: Deck = ron::from_str(DECK).unwrap();
        deck.seed = Some(3);
        let path = dir.path().join("saved.ron");
        deck.to_file(&path).unwrap();

        let loaded = Deck::from_file(&path).unwrap();
        assert_eq!(loaded.name, "tube");
        assert_eq!(loaded.seed, Some(3));
        assert_eq!(loaded.phantom.unwrap().primitives.len(), 1);
    }

    #[test]
    fn test_missing_file() {
        let err = Deck::from_file("/nonexistent/deck.ron").unwrap_err();
        assert!(err.to_string().contains("Failed to read deck file"));
    }
}
