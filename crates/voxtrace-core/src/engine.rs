//! Seam between the control plane and the transport engine
//!
//! Everything the control plane needs from the engine goes through
//! [`TransportEngine`]. The engine owns every native handle; the control plane
//! only holds [`ContextHandle`] values it was given and hands them back on release.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use voxtrace_physics::{Material, PhysicsProcess};

use crate::boundary::RunConfiguration;
use crate::error::SimError;

/// Failure reported by the engine, surfaced verbatim
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct EngineError(pub String);

impl From<EngineError> for SimError {
    fn from(err: EngineError) -> Self {
        SimError::Native(err.0)
    }
}

/// Opaque handle to an execution context owned by the engine
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ContextHandle(pub u64);

/// Summary the engine returns after a completed run
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub seed: u32,
    pub primaries: u64,
    pub mean_primary_energy_mev: f64,
    pub navigators: usize,
    pub sources: usize,
}

/// Transport engine backing a simulation
pub trait TransportEngine: Send + Sync {
    /// Number of execution devices the engine can bind
    fn device_count(&self) -> u32;

    /// Human-readable device name, `None` past the last device
    fn device_name(&self, index: u32) -> Option<String>;

    /// Bind the device at `index` and return a handle to it
    fn acquire_context(&self, index: u32) -> Result<ContextHandle, EngineError>;

    /// Free a context; the handle must not be used afterwards
    fn release_context(&self, handle: ContextHandle);

    /// Bytes currently allocated on the context's device
    fn allocated_bytes(&self, handle: ContextHandle) -> Result<u64, EngineError>;

    /// Macroscopic cross section (1/mm) of a material at each energy (MeV)
    fn tabulate(
        &self,
        material: &Material,
        process: PhysicsProcess,
        energies_mev: &[f64],
    ) -> Result<Vec<f64>, EngineError>;

    /// Transport every primary; blocks until the engine finishes or fails
    fn run(&self, config: &RunConfiguration) -> Result<RunReport, EngineError>;
}
