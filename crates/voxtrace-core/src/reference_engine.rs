//! CPU reference implementation of the transport engine
//!
//! Used for development and tests when no GPU engine is linked. Cross sections
//! come from the closed-form models in `voxtrace_physics::interactions` and a run
//! only samples primary energies; nothing is transported.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256StarStar;

use voxtrace_physics::interactions::{
    klein_nishina_per_electron, photoelectric_per_atom, rayleigh_per_atom,
};
use voxtrace_physics::{Dimension, Material, PhysicsProcess, UnitValue};

use crate::boundary::{NativeEnergy, NativeQuantity, RunConfiguration};
use crate::engine::{ContextHandle, EngineError, RunReport, TransportEngine};

/// Primaries actually sampled per source; larger counts are extrapolated
const MAX_SAMPLED_PRIMARIES: u64 = 1 << 20;
/// Device bytes per primary record (position, direction, energy, weight)
const PRIMARY_RECORD_BYTES: u64 = 32;

#[derive(Debug)]
struct ContextSlot {
    device: u32,
    allocated: u64,
}

#[derive(Debug)]
pub struct CpuReferenceEngine {
    devices: Vec<String>,
    next_handle: AtomicU64,
    contexts: Mutex<HashMap<u64, ContextSlot>>,
}

impl Default for CpuReferenceEngine {
    fn default() -> Self {
        Self::new(1)
    }
}

impl CpuReferenceEngine {
    pub fn new(device_count: u32) -> Self {
        let threads = rayon::current_num_threads();
        Self {
            devices: (0..device_count)
                .map(|i| format!("CPU reference device {i} ({threads} threads)"))
                .collect(),
            next_handle: AtomicU64::new(1),
            contexts: Mutex::new(HashMap::new()),
        }
    }

    /// Number of contexts acquired and not yet released
    pub fn live_contexts(&self) -> usize {
        self.contexts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

fn quantity_mev(quantity: &NativeQuantity) -> Result<f64, EngineError> {
    let tag = quantity
        .unit
        .to_str()
        .map_err(|_| EngineError("unit tag is not valid UTF-8".to_string()))?;
    UnitValue::parse(f64::from(quantity.magnitude), tag)
        .and_then(|v| v.expect(Dimension::Energy))
        .map_err(|e| EngineError(e.to_string()))
}

fn sample_energy(energy: &NativeEnergy, rng: &mut impl Rng) -> Result<f64, EngineError> {
    match energy {
        NativeEnergy::Mono(quantity) => quantity_mev(quantity),
        NativeEnergy::Spectrum { energies, cdf } => {
            let u: f32 = rng.gen();
            let index = cdf.partition_point(|&c| c < u).min(energies.len().saturating_sub(1));
            energies
                .get(index)
                .map(|&e| f64::from(e))
                .ok_or_else(|| EngineError("empty energy spectrum".to_string()))
        }
    }
}

impl TransportEngine for CpuReferenceEngine {
    fn device_count(&self) -> u32 {
        self.devices.len() as u32
    }

    fn device_name(&self, index: u32) -> Option<String> {
        self.devices.get(index as usize).cloned()
    }

    fn acquire_context(&self, index: u32) -> Result<ContextHandle, EngineError> {
        if index as usize >= self.devices.len() {
            return Err(EngineError(format!("no device {index}")));
        }
        let handle = self.next_handle.fetch_add(1, Ordering::Relaxed);
        self.contexts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(
                handle,
                ContextSlot {
                    device: index,
                    allocated: 0,
                },
            );
        log::trace!("Acquired context handle {handle} on device {index}");
        Ok(ContextHandle(handle))
    }

    fn release_context(&self, handle: ContextHandle) {
        let removed = self
            .contexts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&handle.0);
        match removed {
            Some(slot) => log::trace!("Released context handle {} on device {}", handle.0, slot.device),
            None => log::warn!("Release of unknown context handle {}", handle.0),
        }
    }

    fn allocated_bytes(&self, handle: ContextHandle) -> Result<u64, EngineError> {
        self.contexts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&handle.0)
            .map(|slot| slot.allocated)
            .ok_or_else(|| EngineError(format!("unknown context handle {}", handle.0)))
    }

    fn tabulate(
        &self,
        material: &Material,
        process: PhysicsProcess,
        energies_mev: &[f64],
    ) -> Result<Vec<f64>, EngineError> {
        let atoms = material.atom_densities();
        let electrons = material.electron_density();
        Ok(energies_mev
            .iter()
            .map(|&e| match process {
                PhysicsProcess::Compton => electrons * klein_nishina_per_electron(e),
                PhysicsProcess::Photoelectric => atoms
                    .iter()
                    .map(|(el, n)| n * photoelectric_per_atom(el.atomic_number, e))
                    .sum(),
                PhysicsProcess::Rayleigh => atoms
                    .iter()
                    .map(|(el, n)| n * rayleigh_per_atom(el.atomic_number, e))
                    .sum(),
            })
            .collect())
    }

    fn run(&self, config: &RunConfiguration) -> Result<RunReport, EngineError> {
        if !self
            .contexts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(&config.context.0)
        {
            return Err(EngineError(format!(
                "run on unknown context handle {}",
                config.context.0
            )));
        }
        if config.sources.is_empty() {
            return Err(EngineError("no source to emit primaries".to_string()));
        }

        let mut rng = Xoshiro256StarStar::seed_from_u64(u64::from(config.seed));
        let mut primaries = 0u64;
        let mut sampled = 0u64;
        let mut energy_sum = 0.0;
        for source in &config.sources {
            primaries = primaries
                .checked_add(source.particle_count)
                .ok_or_else(|| EngineError("total primary count overflows u64".to_string()))?;
            let n = source.particle_count.min(MAX_SAMPLED_PRIMARIES);
            for _ in 0..n {
                energy_sum += sample_energy(&source.energy, &mut rng)?;
            }
            sampled += n;
        }

        if let Some(slot) = self
            .contexts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get_mut(&config.context.0)
        {
            slot.allocated = sampled * PRIMARY_RECORD_BYTES;
        }

        let report = RunReport {
            seed: config.seed,
            primaries,
            mean_primary_energy_mev: if sampled > 0 {
                energy_sum / sampled as f64
            } else {
                0.0
            },
            navigators: config.navigators.len(),
            sources: config.sources.len(),
        };
        log::info!(
            "Reference run finished: {} primaries, mean energy {:.4} MeV",
            report.primaries,
            report.mean_primary_energy_mev
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::boundary::{NativeSource, native_string};
    use voxtrace_physics::MaterialDatabase;

    #[test]
    fn test_context_bookkeeping() {
        let engine = CpuReferenceEngine::new(2);
        assert_eq!(engine.device_count(), 2);
        assert!(engine.device_name(2).is_none());
        assert!(engine.acquire_context(2).is_err());

        let a = engine.acquire_context(0).unwrap();
        let b = engine.acquire_context(1).unwrap();
        assert_ne!(a, b);
        assert_eq!(engine.live_contexts(), 2);
        assert_eq!(engine.allocated_bytes(a).unwrap(), 0);

        engine.release_context(a);
        assert_eq!(engine.live_contexts(), 1);
        assert!(engine.allocated_bytes(a).is_err());
    }

    #[test]
    fn test_lead_attenuates_more_than_water() {
        let mut db = MaterialDatabase::new();
        db.load_str(
            "Water: d=1.0 g/cm3 ; n=2\n +el: name=Hydrogen ; f=0.111894\n +el: name=Oxygen ; f=0.888106\n\
             Lead: d=11.35 g/cm3 ; n=1\n +el: name=Lead ; f=1\n",
        )
        .unwrap();
        let engine = CpuReferenceEngine::default();
        let energies = [0.03, 0.1, 1.0];
        for process in PhysicsProcess::ALL {
            let water = engine
                .tabulate(db.get("Water").unwrap(), process, &energies)
                .unwrap();
            let lead = engine
                .tabulate(db.get("Lead").unwrap(), process, &energies)
                .unwrap();
            assert_eq!(water.len(), 3);
            for (w, l) in water.iter().zip(&lead) {
                assert!(l > w, "{process}: lead {l} <= water {w}");
            }
        }
    }

    fn mono_source(name: &str, particle_count: u64) -> NativeSource {
        let mm = || NativeQuantity::new(UnitValue::mm(0.0)).unwrap();
        NativeSource {
            name: native_string(name).unwrap(),
            particle: native_string("photon").unwrap(),
            particle_count,
            position: [mm(), mm(), mm()],
            rotation: [mm(), mm(), mm()],
            beam_aperture: NativeQuantity::new(UnitValue::degrees(0.0)).unwrap(),
            focal_spot: [mm(), mm(), mm()],
            local_axis: [0.0, 0.0, -1.0, 0.0, 1.0, 0.0, 1.0, 0.0, 0.0],
            energy: NativeEnergy::Mono(NativeQuantity::new(UnitValue::kev(60.0)).unwrap()),
        }
    }

    fn run_configuration(context: ContextHandle, sources: Vec<NativeSource>) -> RunConfiguration {
        RunConfiguration {
            context,
            seed: 1,
            verbosity: 0,
            tracking: false,
            materials_file: None,
            materials: Vec::new(),
            processes: Vec::new(),
            energy_min: NativeQuantity::new(UnitValue::kev(10.0)).unwrap(),
            energy_max: NativeQuantity::new(UnitValue::mev(1.0)).unwrap(),
            bin_count: 2,
            navigators: Vec::new(),
            sources,
            cuts: Vec::new(),
        }
    }

    #[test]
    fn test_primary_count_sums_sources() {
        let engine = CpuReferenceEngine::new(1);
        let context = engine.acquire_context(0).unwrap();
        let config = run_configuration(context, vec![mono_source("a", 10), mono_source("b", 5)]);
        let report = engine.run(&config).unwrap();
        assert_eq!(report.primaries, 15);
        assert_eq!(report.sources, 2);
        assert!((report.mean_primary_energy_mev - 0.06).abs() < 1e-6);
    }

    #[test]
    fn test_primary_count_overflow_is_an_error() {
        let engine = CpuReferenceEngine::new(1);
        let context = engine.acquire_context(0).unwrap();
        let config = run_configuration(
            context,
            vec![mono_source("a", u64::MAX), mono_source("b", 1)],
        );
        let err = engine.run(&config).unwrap_err();
        assert!(err.0.contains("overflows"));
    }

    #[test]
    fn test_spectrum_sampling() {
        let mut rng = Xoshiro256StarStar::seed_from_u64(7);
        let energy = NativeEnergy::Spectrum {
            energies: vec![0.02, 0.04],
            cdf: vec![0.5, 1.0],
        };
        let mut seen = [false; 2];
        for _ in 0..100 {
            let e = sample_energy(&energy, &mut rng).unwrap();
            seen[usize::from(e > 0.03)] = true;
        }
        assert_eq!(seen, [true, true]);
    }
}
