//! Control plane for the voxtrace transport engine
//!
//! Each subsystem is an independently constructible manager; [`Simulation`]
//! owns one of each and validates the configuration before a run.

pub mod boundary;
pub mod compute;
pub mod cross_section;
pub mod engine;
pub mod error;
pub mod geometry;
pub mod phantom;
pub mod range_cuts;
pub mod reference_engine;
pub mod simulation;
pub mod source;

pub use compute::{ComputeContext, MemoryReport};
pub use cross_section::CrossSectionTable;
pub use engine::{ContextHandle, EngineError, RunReport, TransportEngine};
pub use error::{Dependency, ErrorKind, SimError, SimResult};
pub use geometry::{GeometryRegistry, RangeMaterialMap, VoxelizedNavigator};
pub use phantom::{
    AnalyticalVolume, Cuboid, PhantomBuilder, PhantomFiles, Sphere, Tube, VoxelDataType,
};
pub use range_cuts::{CutScope, RangeCutPolicy};
pub use reference_engine::CpuReferenceEngine;
pub use simulation::{Lifecycle, RunStatus, Simulation, VerbosityFlags};
pub use source::{EnergyModel, SourceRegistry, Spectrum, XRaySource};

// Physical data types used throughout the public API
pub use voxtrace_physics as physics;
