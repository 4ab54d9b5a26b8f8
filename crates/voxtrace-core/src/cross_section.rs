//! Physics process selection and per-material cross-section tables

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use voxtrace_physics::{
    Dimension, MAX_TABLE_ENERGY_MEV, MIN_TABLE_ENERGY_MEV, MaterialDatabase, ParticleType,
    PhysicsProcess, Unit, UnitValue,
};

use crate::engine::TransportEngine;
use crate::error::{SimError, SimResult};

pub const DEFAULT_BIN_COUNT: u16 = 220;
pub const DEFAULT_ENERGY_MIN: UnitValue = UnitValue::new(990.0, Unit::ElectronVolt);
pub const DEFAULT_ENERGY_MAX: UnitValue = UnitValue::mev(250.0);

struct BuiltTables {
    /// Log-spaced energies (MeV)
    energies: Vec<f64>,
    /// material -> process -> cross section (1/mm) at each energy
    values: BTreeMap<String, BTreeMap<PhysicsProcess, Vec<f64>>>,
    /// Database generation the tables were computed from
    generation: u64,
}

pub struct CrossSectionTable {
    processes: BTreeSet<(PhysicsProcess, ParticleType)>,
    materials: Vec<String>,
    energy_min: UnitValue,
    energy_max: UnitValue,
    bin_count: u16,
    built: Option<BuiltTables>,
}

impl Default for CrossSectionTable {
    fn default() -> Self {
        Self::new()
    }
}

impl CrossSectionTable {
    pub fn new() -> Self {
        Self {
            processes: BTreeSet::new(),
            materials: Vec::new(),
            energy_min: DEFAULT_ENERGY_MIN,
            energy_max: DEFAULT_ENERGY_MAX,
            bin_count: DEFAULT_BIN_COUNT,
            built: None,
        }
    }

    fn check_configurable(&self) -> SimResult<()> {
        if self.built.is_some() {
            return Err(SimError::AlreadyInitialized("cross-section table"));
        }
        Ok(())
    }

    /// Every process the engine implements, with the particle it applies to
    pub fn available_processes() -> impl Iterator<Item = (PhysicsProcess, ParticleType)> {
        PhysicsProcess::ALL.into_iter().map(|p| (p, p.particle()))
    }

    pub fn print_available_processes() {
        log::info!("Available processes:");
        for (process, particle) in Self::available_processes() {
            log::info!("  {process} ({particle})");
        }
    }

    /// Register a process for a particle; registering it twice has no effect
    pub fn add_process(&mut self, process: PhysicsProcess, particle: ParticleType) -> SimResult<()> {
        self.check_configurable()?;
        if process.particle() != particle {
            return Err(SimError::IncompatibleProcess { process, particle });
        }
        if self.processes.insert((process, particle)) {
            log::debug!("Added process {process} for {particle}");
        }
        Ok(())
    }

    /// Restrict tabulation to the named materials; with no selection, every
    /// database material is tabulated
    pub fn add_material(&mut self, name: &str) -> SimResult<()> {
        self.check_configurable()?;
        if !self.materials.iter().any(|m| m == name) {
            self.materials.push(name.to_string());
        }
        Ok(())
    }

    pub fn set_energy_range(&mut self, min: UnitValue, max: UnitValue) -> SimResult<()> {
        self.check_configurable()?;
        let lo = min.expect(Dimension::Energy)?;
        let hi = max.expect(Dimension::Energy)?;
        if lo < MIN_TABLE_ENERGY_MEV || hi > MAX_TABLE_ENERGY_MEV {
            log::warn!(
                "Cross-section range [{min}, {max}] extends past [{}, {}], engine accuracy is not guaranteed there",
                DEFAULT_ENERGY_MIN,
                DEFAULT_ENERGY_MAX
            );
        }
        self.energy_min = min;
        self.energy_max = max;
        Ok(())
    }

    pub fn set_bin_count(&mut self, bins: u16) -> SimResult<()> {
        self.check_configurable()?;
        if bins < 2 {
            return Err(SimError::InvalidBinCount(bins));
        }
        self.bin_count = bins;
        Ok(())
    }

    pub fn processes(&self) -> impl Iterator<Item = (PhysicsProcess, ParticleType)> + '_ {
        self.processes.iter().copied()
    }

    /// Explicitly selected materials, in selection order
    pub fn selected_materials(&self) -> &[String] {
        &self.materials
    }

    pub fn energy_range(&self) -> (UnitValue, UnitValue) {
        (self.energy_min, self.energy_max)
    }

    pub fn bin_count(&self) -> u16 {
        self.bin_count
    }

    pub fn is_initialized(&self) -> bool {
        self.built.is_some()
    }

    /// True when the database was reloaded after the tables were computed
    pub fn is_stale(&self, database: &MaterialDatabase) -> bool {
        self.built
            .as_ref()
            .is_some_and(|built| built.generation != database.generation())
    }

    /// Materials that will be (or were) tabulated
    pub fn tabulated_materials(&self, database: &MaterialDatabase) -> Vec<String> {
        if let Some(built) = &self.built {
            return built.values.keys().cloned().collect();
        }
        if self.materials.is_empty() {
            database.names().map(str::to_string).collect()
        } else {
            self.materials.clone()
        }
    }

    /// Every selected material must exist in the database
    pub fn validate_materials(&self, database: &MaterialDatabase) -> SimResult<()> {
        for name in &self.materials {
            if !database.contains(name) {
                return Err(SimError::UnknownMaterial {
                    material: name.clone(),
                });
            }
        }
        Ok(())
    }

    fn energy_bounds(&self) -> SimResult<(f64, f64)> {
        let min = self.energy_min.expect(Dimension::Energy)?;
        let max = self.energy_max.expect(Dimension::Energy)?;
        if !(min > 0.0 && max > 0.0 && min < max) {
            return Err(SimError::InvalidEnergyRange { min, max });
        }
        Ok((min, max))
    }

    /// Compute a table for every (material, process) pair
    pub fn initialize(
        &mut self,
        database: &MaterialDatabase,
        engine: &dyn TransportEngine,
    ) -> SimResult<()> {
        self.check_configurable()?;
        if !database.is_loaded() {
            return Err(SimError::MissingMaterialDatabase);
        }
        let (min, max) = self.energy_bounds()?;
        self.validate_materials(database)?;

        let bins = usize::from(self.bin_count);
        let (log_min, log_max) = (min.ln(), max.ln());
        let step = (log_max - log_min) / (bins - 1) as f64;
        let mut energies: Vec<f64> = (0..bins)
            .map(|i| (log_min + step * i as f64).exp())
            .collect();
        energies[0] = min;
        energies[bins - 1] = max;

        if self.processes.is_empty() {
            log::warn!("No physics process registered, cross-section tables are empty");
        }

        let mut values = BTreeMap::new();
        for name in self.tabulated_materials(database) {
            let material = database.get(&name)?;
            let mut per_process = BTreeMap::new();
            for (process, _) in &self.processes {
                let table = engine.tabulate(material, *process, &energies)?;
                if table.len() != energies.len() {
                    return Err(SimError::Native(format!(
                        "engine returned {} values for {} energies",
                        table.len(),
                        energies.len()
                    )));
                }
                per_process.insert(*process, table);
            }
            values.insert(name, per_process);
        }

        log::info!(
            "Cross sections computed: {} materials x {} processes, {} bins",
            values.len(),
            self.processes.len(),
            bins
        );
        self.built = Some(BuiltTables {
            energies,
            values,
            generation: database.generation(),
        });
        Ok(())
    }

    /// Interpolated cross section (1/mm) of a process in a material
    pub fn cross_section_at(
        &self,
        process: PhysicsProcess,
        material: &str,
        energy: UnitValue,
    ) -> SimResult<f64> {
        let built = self
            .built
            .as_ref()
            .ok_or(SimError::NotInitialized("cross-section table"))?;
        let energy = energy.expect(Dimension::Energy)?;

        let per_process = built
            .values
            .get(material)
            .ok_or_else(|| SimError::UnknownMaterial {
                material: material.to_string(),
            })?;
        let table = per_process
            .get(&process)
            .ok_or(SimError::ProcessNotRegistered { process })?;

        let energies = &built.energies;
        let (min, max) = (energies[0], energies[energies.len() - 1]);
        if !(min..=max).contains(&energy) {
            return Err(SimError::EnergyOutOfRange { energy, min, max });
        }

        let upper = energies.partition_point(|&e| e <= energy);
        let i = upper.saturating_sub(1).min(energies.len() - 2);
        Ok(interpolate_log_log(
            (energies[i], table[i]),
            (energies[i + 1], table[i + 1]),
            energy,
        ))
    }

    pub(crate) fn print_infos(&self) {
        log::info!("Cross-section table");
        log::info!("  energy range: [{}, {}]", self.energy_min, self.energy_max);
        log::info!("  bins: {}", self.bin_count);
        for (process, particle) in &self.processes {
            log::info!("  process: {process} ({particle})");
        }
        if let Some(built) = &self.built {
            for name in built.values.keys() {
                log::info!("  tabulated material: {name}");
            }
        }
    }
}

fn interpolate_log_log((e0, y0): (f64, f64), (e1, y1): (f64, f64), energy: f64) -> f64 {
    let t = (energy.ln() - e0.ln()) / (e1.ln() - e0.ln());
    if y0 > 0.0 && y1 > 0.0 {
        (y0.ln() + t * (y1.ln() - y0.ln())).exp()
    } else {
        y0 + t * (y1 - y0)
    }
}

impl fmt::Debug for CrossSectionTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CrossSectionTable")
            .field("processes", &self.processes)
            .field("materials", &self.materials)
            .field("energy_min", &self.energy_min)
            .field("energy_max", &self.energy_max)
            .field("bin_count", &self.bin_count)
            .field("initialized", &self.is_initialized())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reference_engine::CpuReferenceEngine;

    const WATER: &str = "Water: d=1.00 g/cm3 ; n=2\n +el: name=Hydrogen ; f=0.111894\n +el: name=Oxygen ; f=0.888106\n";

    #[test]
    fn test_available_processes_all_registrable() {
        let available: Vec<_> = CrossSectionTable::available_processes().collect();
        assert_eq!(available.len(), PhysicsProcess::ALL.len());
        let mut table = CrossSectionTable::new();
        for (process, particle) in available {
            assert_eq!(particle, ParticleType::Photon);
            table.add_process(process, particle).unwrap();
        }
        assert_eq!(table.processes().count(), PhysicsProcess::ALL.len());
    }

    fn database() -> MaterialDatabase {
        let mut db = MaterialDatabase::new();
        db.load_str(WATER).unwrap();
        db
    }

    #[test]
    fn test_add_process_is_idempotent() {
        let mut table = CrossSectionTable::new();
        table.add_process(PhysicsProcess::Compton, ParticleType::Photon).unwrap();
        table.add_process(PhysicsProcess::Compton, ParticleType::Photon).unwrap();
        assert_eq!(table.processes().count(), 1);
    }

    #[test]
    fn test_incompatible_process() {
        let mut table = CrossSectionTable::new();
        assert!(matches!(
            table.add_process(PhysicsProcess::Rayleigh, ParticleType::Electron),
            Err(SimError::IncompatibleProcess { .. })
        ));
    }

    #[test]
    fn test_initialize_without_database() {
        let engine = CpuReferenceEngine::new(1);
        let mut table = CrossSectionTable::new();
        let err = table.initialize(&MaterialDatabase::new(), &engine).unwrap_err();
        assert!(matches!(err, SimError::MissingMaterialDatabase));
        assert!(!table.is_initialized());
    }

    #[test]
    fn test_invalid_energy_range() {
        let engine = CpuReferenceEngine::new(1);
        let mut table = CrossSectionTable::new();
        table
            .set_energy_range(UnitValue::mev(1.0), UnitValue::kev(10.0))
            .unwrap();
        assert!(matches!(
            table.initialize(&database(), &engine),
            Err(SimError::InvalidEnergyRange { .. })
        ));

        assert!(table
            .set_energy_range(UnitValue::mm(1.0), UnitValue::mev(1.0))
            .is_err());
    }

    #[test]
    fn test_configuration_locked_after_initialize() {
        let engine = CpuReferenceEngine::new(1);
        let mut table = CrossSectionTable::new();
        table.initialize(&database(), &engine).unwrap();
        assert!(matches!(
            table.set_bin_count(10),
            Err(SimError::AlreadyInitialized(_))
        ));
        assert!(matches!(
            table.set_energy_range(UnitValue::kev(1.0), UnitValue::mev(1.0)),
            Err(SimError::AlreadyInitialized(_))
        ));
    }

    #[test]
    fn test_bin_count_minimum() {
        let mut table = CrossSectionTable::new();
        assert!(matches!(table.set_bin_count(1), Err(SimError::InvalidBinCount(1))));
        table.set_bin_count(2).unwrap();
    }

    #[test]
    fn test_lookup_before_initialize() {
        let table = CrossSectionTable::new();
        assert!(matches!(
            table.cross_section_at(PhysicsProcess::Compton, "Water", UnitValue::kev(60.0)),
            Err(SimError::NotInitialized(_))
        ));
    }

    #[test]
    fn test_interpolated_lookup() {
        let engine = CpuReferenceEngine::new(1);
        let db = database();
        let mut table = CrossSectionTable::new();
        table.add_process(PhysicsProcess::Compton, ParticleType::Photon).unwrap();
        table
            .set_energy_range(UnitValue::kev(10.0), UnitValue::mev(1.0))
            .unwrap();
        table.set_bin_count(50).unwrap();
        table.initialize(&db, &engine).unwrap();

        // Water attenuation from Compton at 100 keV is about 0.017 /mm
        let mu = table
            .cross_section_at(PhysicsProcess::Compton, "Water", UnitValue::kev(100.0))
            .unwrap();
        assert!(mu > 0.01 && mu < 0.03, "mu = {mu}");

        let at_max = table
            .cross_section_at(PhysicsProcess::Compton, "Water", UnitValue::mev(1.0))
            .unwrap();
        assert!(at_max < mu);

        assert!(matches!(
            table.cross_section_at(PhysicsProcess::Compton, "Water", UnitValue::mev(2.0)),
            Err(SimError::EnergyOutOfRange { .. })
        ));
        assert!(matches!(
            table.cross_section_at(PhysicsProcess::Rayleigh, "Water", UnitValue::kev(100.0)),
            Err(SimError::ProcessNotRegistered { .. })
        ));
        assert!(matches!(
            table.cross_section_at(PhysicsProcess::Compton, "Lead", UnitValue::kev(100.0)),
            Err(SimError::UnknownMaterial { .. })
        ));
    }

    #[test]
    fn test_unknown_selected_material() {
        let engine = CpuReferenceEngine::new(1);
        let mut table = CrossSectionTable::new();
        table.add_material("Bone").unwrap();
        assert!(matches!(
            table.initialize(&database(), &engine),
            Err(SimError::UnknownMaterial { material }) if material == "Bone"
        ));
    }

    #[test]
    fn test_stale_after_reload() {
        let engine = CpuReferenceEngine::new(1);
        let mut db = database();
        let mut table = CrossSectionTable::new();
        table.initialize(&db, &engine).unwrap();
        assert!(!table.is_stale(&db));

        db.load_str(WATER).unwrap();
        assert!(table.is_stale(&db));
    }

    #[test]
    fn test_interpolate_log_log_power_law() {
        // y = x^-2 is a straight line in log-log space
        let y = interpolate_log_log((1.0, 1.0), (10.0, 0.01), 10f64.sqrt());
        assert!((y - 0.1).abs() < 1e-12);
    }
}
