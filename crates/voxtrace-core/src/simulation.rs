//! Simulation orchestrator
//!
//! [`Simulation`] owns one instance of every subsystem and drives the one-way
//! lifecycle `Configuring -> Initialized -> Running -> Finished`. Subsystems are
//! only mutable while configuring; `initialize` checks the whole dependency graph
//! before anything is handed to the engine.

use std::fmt;
use std::sync::Arc;

use bitflags::bitflags;
use rand::Rng;
use serde::{Deserialize, Serialize};

use voxtrace_physics::MaterialDatabase;

use crate::boundary::{
    NativeNavigator, NativeProcess, NativeQuantity, RunConfiguration, native_path, native_string,
};
use crate::compute::ComputeContext;
use crate::cross_section::CrossSectionTable;
use crate::engine::{RunReport, TransportEngine};
use crate::error::{Dependency, SimError, SimResult};
use crate::geometry::GeometryRegistry;
use crate::range_cuts::RangeCutPolicy;
use crate::source::SourceRegistry;

bitflags! {
    /// Subsystems whose details are logged during initialization
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct VerbosityFlags: u16 {
        const COMPUTE = 1 << 0;
        const MATERIALS = 1 << 1;
        const GEOMETRY = 1 << 2;
        const SOURCE = 1 << 3;
        const PROCESSES = 1 << 4;
        const RANGE_CUTS = 1 << 5;
        const MEMORY = 1 << 6;
        const RANDOM = 1 << 7;
        /// Forwarded to the engine; very verbose
        const TRACKING = 1 << 8;
    }
}

/// Highest process-wide verbosity level
pub const MAX_VERBOSITY: u8 = 3;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RunStatus {
    Succeeded,
    Failed,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Lifecycle {
    Configuring,
    Initialized,
    Running,
    Finished(RunStatus),
}

impl fmt::Display for Lifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Lifecycle::Configuring => f.write_str("Configuring"),
            Lifecycle::Initialized => f.write_str("Initialized"),
            Lifecycle::Running => f.write_str("Running"),
            Lifecycle::Finished(RunStatus::Succeeded) => f.write_str("Finished (succeeded)"),
            Lifecycle::Finished(RunStatus::Failed) => f.write_str("Finished (failed)"),
        }
    }
}

pub struct Simulation {
    engine: Arc<dyn TransportEngine>,
    compute: ComputeContext,
    materials: MaterialDatabase,
    cross_sections: CrossSectionTable,
    geometry: GeometryRegistry,
    sources: SourceRegistry,
    range_cuts: RangeCutPolicy,
    seed: Option<u32>,
    verbosity_level: u8,
    verbosity_flags: VerbosityFlags,
    lifecycle: Lifecycle,
    report: Option<RunReport>,
}

impl Simulation {
    pub fn new(engine: Arc<dyn TransportEngine>) -> Self {
        Self {
            compute: ComputeContext::new(Arc::clone(&engine)),
            engine,
            materials: MaterialDatabase::new(),
            cross_sections: CrossSectionTable::new(),
            geometry: GeometryRegistry::new(),
            sources: SourceRegistry::new(),
            range_cuts: RangeCutPolicy::new(),
            seed: None,
            verbosity_level: 0,
            verbosity_flags: VerbosityFlags::empty(),
            lifecycle: Lifecycle::Configuring,
            report: None,
        }
    }

    pub fn engine(&self) -> &Arc<dyn TransportEngine> {
        &self.engine
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }

    fn configuring(&self, subsystem: &'static str) -> SimResult<()> {
        match self.lifecycle {
            Lifecycle::Configuring => Ok(()),
            _ => Err(SimError::AlreadyInitialized(subsystem)),
        }
    }

    // Subsystem access; mutation is only possible while configuring

    pub fn compute(&self) -> &ComputeContext {
        &self.compute
    }

    pub fn compute_mut(&mut self) -> SimResult<&mut ComputeContext> {
        self.configuring("compute context")?;
        Ok(&mut self.compute)
    }

    /// Release the compute context, whatever the lifecycle state
    pub fn release_context(&mut self) {
        self.compute.release();
    }

    pub fn materials(&self) -> &MaterialDatabase {
        &self.materials
    }

    pub fn materials_mut(&mut self) -> SimResult<&mut MaterialDatabase> {
        self.configuring("material database")?;
        Ok(&mut self.materials)
    }

    pub fn cross_sections(&self) -> &CrossSectionTable {
        &self.cross_sections
    }

    pub fn cross_sections_mut(&mut self) -> SimResult<&mut CrossSectionTable> {
        self.configuring("cross-section table")?;
        Ok(&mut self.cross_sections)
    }

    pub fn geometry(&self) -> &GeometryRegistry {
        &self.geometry
    }

    pub fn geometry_mut(&mut self) -> SimResult<&mut GeometryRegistry> {
        self.configuring("geometry registry")?;
        Ok(&mut self.geometry)
    }

    pub fn sources(&self) -> &SourceRegistry {
        &self.sources
    }

    pub fn sources_mut(&mut self) -> SimResult<&mut SourceRegistry> {
        self.configuring("source registry")?;
        Ok(&mut self.sources)
    }

    pub fn range_cuts(&self) -> &RangeCutPolicy {
        &self.range_cuts
    }

    pub fn range_cuts_mut(&mut self) -> SimResult<&mut RangeCutPolicy> {
        self.configuring("range cuts")?;
        Ok(&mut self.range_cuts)
    }

    /// Cross sections for the current database, initializing the table first
    /// if needed
    fn initialize_cross_sections(&mut self) -> SimResult<()> {
        if !self.cross_sections.is_initialized() {
            self.cross_sections
                .initialize(&self.materials, self.engine.as_ref())?;
        } else if self.cross_sections.is_stale(&self.materials) {
            log::warn!("Material database was reloaded after cross sections were computed");
        }
        Ok(())
    }

    pub fn set_seed(&mut self, seed: u32) -> SimResult<()> {
        self.configuring("seed")?;
        self.seed = Some(seed);
        Ok(())
    }

    pub fn seed(&self) -> Option<u32> {
        self.seed
    }

    /// Level 0 (minimal) to 3 (maximal), clamped
    pub fn set_verbosity_level(&mut self, level: u8) {
        self.verbosity_level = level.min(MAX_VERBOSITY);
    }

    pub fn verbosity_level(&self) -> u8 {
        self.verbosity_level
    }

    pub fn set_verbosity_flags(&mut self, flags: VerbosityFlags) {
        self.verbosity_flags = flags;
    }

    pub fn verbosity_flags(&self) -> VerbosityFlags {
        self.verbosity_flags
    }

    pub fn report(&self) -> Option<&RunReport> {
        self.report.as_ref()
    }

    fn check_dependencies(&self) -> SimResult<()> {
        if !self.compute.is_selected() {
            if self.compute.is_released() {
                return Err(SimError::ContextReleased);
            }
            return Err(SimError::MissingDependency(Dependency::ComputeContext));
        }
        if !self.materials.is_loaded() {
            return Err(SimError::MissingDependency(Dependency::MaterialDatabase));
        }
        if self.geometry.is_empty() {
            return Err(SimError::MissingDependency(Dependency::Navigator));
        }
        if self.sources.is_empty() {
            return Err(SimError::MissingDependency(Dependency::Source));
        }
        self.sources.validate_energy_models()?;
        self.cross_sections.validate_materials(&self.materials)?;
        self.geometry.validate_range_files(&self.materials)?;
        self.range_cuts.validate_scopes(&self.geometry)?;
        Ok(())
    }

    /// Validate the configuration and move to `Initialized`
    ///
    /// On failure the simulation stays `Configuring` and can be fixed and
    /// initialized again.
    pub fn initialize(&mut self) -> SimResult<()> {
        if self.lifecycle != Lifecycle::Configuring {
            return Err(SimError::InvalidState {
                expected: "Configuring",
                actual: self.lifecycle.to_string(),
            });
        }
        self.check_dependencies()?;

        self.sources.initialize()?;
        self.initialize_cross_sections()?;
        let cuts = self.range_cuts.resolve(&self.geometry, &self.materials)?;

        let seed = match self.seed {
            Some(seed) => seed,
            None => {
                let seed = rand::thread_rng().gen();
                log::debug!("No seed set, drew {seed} from entropy");
                seed
            }
        };
        self.seed = Some(seed);

        let flags = self.verbosity_flags;
        if flags.contains(VerbosityFlags::COMPUTE) {
            self.compute.print_infos();
        }
        if flags.contains(VerbosityFlags::MATERIALS) {
            self.materials.print_available_materials()?;
        }
        if flags.contains(VerbosityFlags::PROCESSES) {
            self.cross_sections.print_infos();
        }
        if flags.contains(VerbosityFlags::GEOMETRY) {
            self.geometry.print_infos();
        }
        if flags.contains(VerbosityFlags::SOURCE) {
            self.sources.print_infos();
        }
        if flags.contains(VerbosityFlags::RANGE_CUTS) {
            self.range_cuts.print_infos();
            for cut in &cuts {
                log::info!(
                    "  {} / {} / {}: {}",
                    cut.navigator,
                    cut.material,
                    cut.particle,
                    cut.energy
                );
            }
        }
        if flags.contains(VerbosityFlags::MEMORY) {
            log::info!("{}", self.compute.report_memory_usage()?);
        }
        if flags.contains(VerbosityFlags::RANDOM) {
            log::info!("Seed: {seed}");
        }

        self.lifecycle = Lifecycle::Initialized;
        log::info!("Simulation initialized");
        Ok(())
    }

    /// Wire form of the validated configuration
    pub fn run_configuration(&self) -> SimResult<RunConfiguration> {
        let seed = self
            .seed
            .ok_or(SimError::NotInitialized("simulation"))?;
        let (energy_min, energy_max) = self.cross_sections.energy_range();

        let materials = self
            .cross_sections
            .tabulated_materials(&self.materials)
            .iter()
            .map(|name| native_string(name))
            .collect::<SimResult<Vec<_>>>()?;
        let processes = self
            .cross_sections
            .processes()
            .map(|(process, particle)| {
                Ok(NativeProcess {
                    process: native_string(process.name())?,
                    particle: native_string(particle.name())?,
                })
            })
            .collect::<SimResult<Vec<_>>>()?;
        let navigators = self
            .geometry
            .navigators()
            .iter()
            .map(|navigator| {
                Ok(NativeNavigator {
                    name: native_string(&navigator.name)?,
                    image_file: native_path(&navigator.image_file)?,
                    range_file: native_path(&navigator.range_file)?,
                    tolerance: NativeQuantity::new(navigator.tolerance)?,
                    offset: NativeQuantity::triple(navigator.offset)?,
                })
            })
            .collect::<SimResult<Vec<_>>>()?;
        let sources = self
            .sources
            .sources()
            .iter()
            .map(|source| source.to_native())
            .collect::<SimResult<Vec<_>>>()?;

        Ok(RunConfiguration {
            context: self.compute.handle()?,
            seed,
            verbosity: self.verbosity_level,
            tracking: self.verbosity_flags.contains(VerbosityFlags::TRACKING),
            materials_file: self.materials.source_file().map(native_path).transpose()?,
            materials,
            processes,
            energy_min: NativeQuantity::new(energy_min)?,
            energy_max: NativeQuantity::new(energy_max)?,
            bin_count: self.cross_sections.bin_count(),
            navigators,
            sources,
            cuts: self.range_cuts.to_native()?,
        })
    }

    /// Dispatch to the engine and block until it returns
    ///
    /// Only valid once, from `Initialized`. The simulation is `Finished`
    /// afterwards whatever the outcome.
    pub fn run(&mut self) -> SimResult<RunReport> {
        if self.lifecycle != Lifecycle::Initialized {
            return Err(SimError::InvalidState {
                expected: "Initialized",
                actual: self.lifecycle.to_string(),
            });
        }
        let config = self.run_configuration()?;

        self.lifecycle = Lifecycle::Running;
        log::info!(
            "Running {} source(s) through {} navigator(s)",
            config.sources.len(),
            config.navigators.len()
        );
        match self.engine.run(&config) {
            Ok(report) => {
                self.lifecycle = Lifecycle::Finished(RunStatus::Succeeded);
                self.report = Some(report.clone());
                Ok(report)
            }
            Err(err) => {
                self.lifecycle = Lifecycle::Finished(RunStatus::Failed);
                log::error!("Run failed: {err}");
                Err(err.into())
            }
        }
    }
}

impl fmt::Debug for Simulation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Simulation")
            .field("lifecycle", &self.lifecycle)
            .field("compute", &self.compute)
            .field("materials", &self.materials.len())
            .field("navigators", &self.geometry.len())
            .field("sources", &self.sources.len())
            .field("seed", &self.seed)
            .finish()
    }
}
