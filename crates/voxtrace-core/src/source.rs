//! Particle sources
//!
//! An [`XRaySource`] is a cone beam emitted from a focal spot. Its energy model is
//! either a single energy or a spectrum file; whichever is set last wins, and the
//! file is only read by [`XRaySource::initialize`].

use std::path::{Path, PathBuf};

use glam::DMat3;
use serde::{Deserialize, Serialize};

use voxtrace_physics::{Dimension, ParticleType, UnitValue};

use crate::boundary::{NativeEnergy, NativeQuantity, NativeSource, native_string};
use crate::error::{SimError, SimResult};

/// Source frame used when none is given
pub const DEFAULT_LOCAL_AXIS: [[f64; 3]; 3] = [[0.0, 0.0, -1.0], [0.0, 1.0, 0.0], [1.0, 0.0, 0.0]];

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum EnergyModel {
    Mono(UnitValue),
    /// Spectrum file with one `energy weight` pair (MeV) per line
    Poly(PathBuf),
}

/// Discrete energy distribution sampled through its cumulative distribution
#[derive(Clone, Debug, PartialEq)]
pub struct Spectrum {
    energies: Vec<f64>,
    cdf: Vec<f64>,
}

impl Spectrum {
    /// Two identical bins, so the engine always sees a tabulated spectrum
    pub fn mono(energy_mev: f64) -> Self {
        Self {
            energies: vec![energy_mev; 2],
            cdf: vec![1.0; 2],
        }
    }

    pub fn parse(text: &str, path: &Path) -> SimResult<Self> {
        let error = |reason: String| SimError::SpectrumParse {
            path: path.to_path_buf(),
            reason,
        };
        let mut energies = Vec::new();
        let mut weights = Vec::new();
        for (index, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let mut parts = line.split_whitespace().map(str::parse::<f64>);
            let (Some(Ok(energy)), Some(Ok(weight))) = (parts.next(), parts.next()) else {
                return Err(error(format!("line {}: expected 'energy weight'", index + 1)));
            };
            if !(energy > 0.0) || !(weight >= 0.0) {
                return Err(error(format!(
                    "line {}: energy must be positive and weight non-negative",
                    index + 1
                )));
            }
            energies.push(energy);
            weights.push(weight);
        }

        let total: f64 = weights.iter().sum();
        if energies.is_empty() || total <= 0.0 {
            return Err(error("spectrum has no weight".to_string()));
        }

        let mut running = 0.0;
        let mut cdf: Vec<f64> = weights
            .iter()
            .map(|w| {
                running += w / total;
                running
            })
            .collect();
        if let Some(last) = cdf.last_mut() {
            *last = 1.0;
        }
        Ok(Self { energies, cdf })
    }

    pub fn read(path: impl AsRef<Path>) -> SimResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| SimError::SpectrumFileNotFound {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text, path)
    }

    /// Bin energies in MeV
    pub fn energies(&self) -> &[f64] {
        &self.energies
    }

    pub fn cdf(&self) -> &[f64] {
        &self.cdf
    }

    /// Energy of the bin selected by a uniform number in `[0, 1)`
    pub fn sample(&self, uniform: f64) -> f64 {
        let index = self.cdf.partition_point(|&c| c < uniform);
        self.energies[index.min(self.energies.len() - 1)]
    }

    pub fn mean_energy(&self) -> f64 {
        let mut previous = 0.0;
        self.energies
            .iter()
            .zip(&self.cdf)
            .map(|(e, &c)| {
                let p = c - previous;
                previous = c;
                e * p
            })
            .sum()
    }
}

#[derive(Clone, Debug)]
pub struct XRaySource {
    name: String,
    particle: ParticleType,
    particle_count: Option<u64>,
    position: [UnitValue; 3],
    rotation: [UnitValue; 3],
    beam_aperture: UnitValue,
    focal_spot: [UnitValue; 3],
    local_axis: DMat3,
    energy: Option<EnergyModel>,
    spectrum: Option<Spectrum>,
}

fn check_triple(values: &[UnitValue; 3], dimension: Dimension) -> SimResult<()> {
    for value in values {
        value.expect(dimension)?;
    }
    Ok(())
}

impl XRaySource {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            particle: ParticleType::Photon,
            particle_count: None,
            position: [UnitValue::mm(0.0); 3],
            rotation: [UnitValue::degrees(0.0); 3],
            beam_aperture: UnitValue::degrees(0.0),
            focal_spot: [UnitValue::mm(0.0); 3],
            local_axis: DMat3::from_cols_array_2d(&DEFAULT_LOCAL_AXIS).transpose(),
            energy: None,
            spectrum: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_particle_type(&mut self, particle: ParticleType) {
        self.particle = particle;
        self.spectrum = None;
    }

    pub fn particle_type(&self) -> ParticleType {
        self.particle
    }

    pub fn set_number_of_particles(&mut self, count: u64) -> SimResult<()> {
        if count == 0 {
            return Err(SimError::InvalidParticleCount);
        }
        self.particle_count = Some(count);
        self.spectrum = None;
        Ok(())
    }

    pub fn particle_count(&self) -> Option<u64> {
        self.particle_count
    }

    pub fn set_position(&mut self, position: [UnitValue; 3]) -> SimResult<()> {
        check_triple(&position, Dimension::Length)?;
        self.position = position;
        self.spectrum = None;
        Ok(())
    }

    pub fn set_rotation(&mut self, rotation: [UnitValue; 3]) -> SimResult<()> {
        check_triple(&rotation, Dimension::Angle)?;
        self.rotation = rotation;
        self.spectrum = None;
        Ok(())
    }

    /// Full opening angle of the cone beam
    pub fn set_beam_aperture(&mut self, aperture: UnitValue) -> SimResult<()> {
        aperture.expect(Dimension::Angle)?;
        self.beam_aperture = aperture;
        self.spectrum = None;
        Ok(())
    }

    pub fn set_focal_spot_size(&mut self, size: [UnitValue; 3]) -> SimResult<()> {
        check_triple(&size, Dimension::Length)?;
        self.focal_spot = size;
        self.spectrum = None;
        Ok(())
    }

    /// Row-major source frame
    pub fn set_local_axis(&mut self, rows: [[f64; 3]; 3]) {
        self.local_axis = DMat3::from_cols_array_2d(&rows).transpose();
        self.spectrum = None;
    }

    pub fn local_axis(&self) -> DMat3 {
        self.local_axis
    }

    /// Replace the energy model; any previously resolved spectrum is discarded
    pub fn set_energy_model(&mut self, model: EnergyModel) -> SimResult<()> {
        if let EnergyModel::Mono(energy) = &model {
            energy.expect(Dimension::Energy)?;
        }
        self.energy = Some(model);
        self.spectrum = None;
        Ok(())
    }

    pub fn set_monoenergy(&mut self, energy: UnitValue) -> SimResult<()> {
        self.set_energy_model(EnergyModel::Mono(energy))
    }

    pub fn set_polyenergy(&mut self, spectrum_file: impl Into<PathBuf>) -> SimResult<()> {
        self.set_energy_model(EnergyModel::Poly(spectrum_file.into()))
    }

    pub fn energy_model(&self) -> Option<&EnergyModel> {
        self.energy.as_ref()
    }

    pub fn is_initialized(&self) -> bool {
        self.spectrum.is_some()
    }

    pub fn spectrum(&self) -> Option<&Spectrum> {
        self.spectrum.as_ref()
    }

    /// Check mandatory parameters and resolve the energy spectrum
    pub fn initialize(&mut self) -> SimResult<()> {
        if self.particle_count.is_none() {
            return Err(SimError::MissingParticleCount(self.name.clone()));
        }
        let model = self
            .energy
            .as_ref()
            .ok_or_else(|| SimError::MissingEnergyModel(self.name.clone()))?;

        let aperture = self.beam_aperture.expect(Dimension::Angle)?;
        if aperture < 0.0 {
            return Err(SimError::InvalidSourceParameter(format!(
                "beam aperture of '{}' must be >= 0, got {}",
                self.name, self.beam_aperture
            )));
        }
        for component in &self.focal_spot {
            if component.expect(Dimension::Length)? < 0.0 {
                return Err(SimError::InvalidSourceParameter(format!(
                    "focal spot of '{}' must be >= 0, got {component}",
                    self.name
                )));
            }
        }

        let spectrum = match model {
            EnergyModel::Mono(energy) => {
                let mev = energy.expect(Dimension::Energy)?;
                if mev <= 0.0 {
                    return Err(SimError::InvalidSourceParameter(format!(
                        "energy of '{}' must be positive, got {energy}",
                        self.name
                    )));
                }
                Spectrum::mono(mev)
            }
            EnergyModel::Poly(path) => Spectrum::read(path)?,
        };
        log::info!(
            "Source '{}' initialized: {} bins, mean energy {:.4} MeV",
            self.name,
            spectrum.energies().len(),
            spectrum.mean_energy()
        );
        self.spectrum = Some(spectrum);
        Ok(())
    }

    pub fn to_native(&self) -> SimResult<NativeSource> {
        let spectrum = self
            .spectrum
            .as_ref()
            .ok_or(SimError::NotInitialized("source"))?;
        let count = self
            .particle_count
            .ok_or_else(|| SimError::MissingParticleCount(self.name.clone()))?;

        let energy = match &self.energy {
            Some(EnergyModel::Mono(value)) => NativeEnergy::Mono(NativeQuantity::new(*value)?),
            _ => NativeEnergy::Spectrum {
                energies: spectrum.energies().iter().map(|&e| e as f32).collect(),
                cdf: spectrum.cdf().iter().map(|&c| c as f32).collect(),
            },
        };
        let rows = self.local_axis.transpose().to_cols_array();
        Ok(NativeSource {
            name: native_string(&self.name)?,
            particle: native_string(self.particle.name())?,
            particle_count: count,
            position: NativeQuantity::triple(self.position)?,
            rotation: NativeQuantity::triple(self.rotation)?,
            beam_aperture: NativeQuantity::new(self.beam_aperture)?,
            focal_spot: NativeQuantity::triple(self.focal_spot)?,
            local_axis: rows.map(|v| v as f32),
            energy,
        })
    }

    pub(crate) fn print_infos(&self) {
        log::info!("Source '{}'", self.name);
        log::info!("  particle: {}", self.particle);
        match self.particle_count {
            Some(count) => log::info!("  particles: {count}"),
            None => log::info!("  particles: unset"),
        }
        let [x, y, z] = &self.position;
        log::info!("  position: ({x}, {y}, {z})");
        let [rx, ry, rz] = &self.rotation;
        log::info!("  rotation: ({rx}, {ry}, {rz})");
        log::info!("  beam aperture: {}", self.beam_aperture);
        let [fx, fy, fz] = &self.focal_spot;
        log::info!("  focal spot: ({fx}, {fy}, {fz})");
        log::info!("  local axis: {:?}", self.local_axis.transpose().to_cols_array_2d());
        match &self.energy {
            Some(EnergyModel::Mono(e)) => log::info!("  energy: {e}"),
            Some(EnergyModel::Poly(path)) => log::info!("  spectrum: {}", path.display()),
            None => log::info!("  energy: unset"),
        }
    }
}

/// Registered sources in registration order
#[derive(Debug, Default)]
pub struct SourceRegistry {
    sources: Vec<XRaySource>,
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a source; names are not checked for uniqueness
    pub fn add(&mut self, source: XRaySource) {
        if !self.sources.is_empty() {
            log::warn!(
                "Registering source '{}' next to {} existing source(s); all of them emit in one run",
                source.name,
                self.sources.len()
            );
        }
        log::info!("Registered source '{}'", source.name);
        self.sources.push(source);
    }

    pub fn sources(&self) -> &[XRaySource] {
        &self.sources
    }

    pub fn get(&self, name: &str) -> Option<&XRaySource> {
        self.sources.iter().find(|s| s.name == name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut XRaySource> {
        self.sources.iter_mut().find(|s| s.name == name)
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Every source must have an energy model
    pub fn validate_energy_models(&self) -> SimResult<()> {
        match self.sources.iter().find(|s| s.energy.is_none()) {
            Some(source) => Err(SimError::MissingEnergyModel(source.name.clone())),
            None => Ok(()),
        }
    }

    /// Validate every source again and resolve its spectrum
    ///
    /// Sources resolved by an earlier, failed attempt are checked again, so
    /// edits made between attempts are never dispatched unchecked.
    pub fn initialize(&mut self) -> SimResult<()> {
        for source in &mut self.sources {
            source.initialize()?;
        }
        Ok(())
    }

    pub(crate) fn print_infos(&self) {
        for source in &self.sources {
            source.print_infos();
        }
    }
}
