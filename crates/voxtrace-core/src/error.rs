//! Error taxonomy for the control plane

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

use voxtrace_physics::{Dimension, MaterialError, ParticleType, PhysicsProcess, UnitError};

use crate::phantom::VoxelDataType;

/// Broad classification of every [`SimError`]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Missing or invalid dependency; fix and retry
    Configuration,
    /// Native handle invalid or already released
    Resource,
    /// Bad input rejected by the call that received it
    Validation,
    /// The run dispatch itself failed
    NativeEngine,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::Configuration => "configuration error",
            ErrorKind::Resource => "resource error",
            ErrorKind::Validation => "validation error",
            ErrorKind::NativeEngine => "native engine error",
        };
        f.write_str(name)
    }
}

/// Subsystem a simulation cannot start without
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Dependency {
    ComputeContext,
    MaterialDatabase,
    Navigator,
    Source,
}

impl fmt::Display for Dependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Dependency::ComputeContext => "a selected compute context",
            Dependency::MaterialDatabase => "a loaded material database",
            Dependency::Navigator => "at least one geometry navigator",
            Dependency::Source => "at least one particle source",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum SimError {
    // Configuration
    #[error("simulation requires {0}")]
    MissingDependency(Dependency),
    #[error("cross sections require a loaded material database")]
    MissingMaterialDatabase,
    #[error("{0} is not initialized")]
    NotInitialized(&'static str),
    #[error("{0} is already initialized")]
    AlreadyInitialized(&'static str),
    #[error("operation requires state {expected}, simulation is {actual}")]
    InvalidState {
        expected: &'static str,
        actual: String,
    },
    #[error("material '{material}' is not in the material database")]
    UnknownMaterial { material: String },
    #[error("range cut scope '{0}' does not name a registered navigator")]
    UnknownNavigator(String),
    #[error("process {process} was not registered")]
    ProcessNotRegistered { process: PhysicsProcess },
    #[error("source '{0}' has no energy model")]
    MissingEnergyModel(String),
    #[error("source '{0}' has no particle count")]
    MissingParticleCount(String),

    // Resource
    #[error("compute context was released, select a context again")]
    ContextReleased,
    #[error("no compute context selected")]
    NoContext,
    #[error("spectrum file not found: {path}")]
    SpectrumFileNotFound {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("i/o error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // Validation
    #[error("context index {index} out of range ({available} devices available)")]
    InvalidContextIndex { index: u32, available: u32 },
    #[error("invalid energy range [{min}, {max}] MeV")]
    InvalidEnergyRange { min: f64, max: f64 },
    #[error("bin count must be at least 2, got {0}")]
    InvalidBinCount(u16),
    #[error("energy {energy} MeV outside table range [{min}, {max}] MeV")]
    EnergyOutOfRange { energy: f64, min: f64, max: f64 },
    #[error("process {process} does not apply to {particle}")]
    IncompatibleProcess {
        process: PhysicsProcess,
        particle: ParticleType,
    },
    #[error("navigator '{0}' is already registered")]
    DuplicateNavigatorName(String),
    #[error("tolerance must be strictly positive, got {0} mm")]
    InvalidTolerance(f64),
    #[error("invalid dimensions {0:?}")]
    InvalidDimensions([u32; 3]),
    #[error("invalid element size {0:?} mm")]
    InvalidElementSize([f64; 3]),
    #[error("phantom output paths are not set")]
    MissingOutputPaths,
    #[error("label {label} is already bound to material '{existing}', cannot rebind to '{requested}'")]
    LabelConflict {
        label: f32,
        existing: String,
        requested: String,
    },
    #[error("label {label} cannot be stored as {data_type}")]
    UnrepresentableLabel {
        label: f32,
        data_type: VoxelDataType,
    },
    #[error("invalid shape parameter: {0}")]
    InvalidShape(String),
    #[error("number of particles must be positive")]
    InvalidParticleCount,
    #[error("invalid source parameter: {0}")]
    InvalidSourceParameter(String),
    #[error("unit must be a {expected}, got {found}")]
    InvalidUnit {
        expected: &'static str,
        found: Dimension,
    },
    #[error(transparent)]
    Unit(#[from] UnitError),
    #[error(transparent)]
    Material(#[from] MaterialError),
    #[error("{path}:{line}: {reason}")]
    Parse {
        path: PathBuf,
        line: usize,
        reason: String,
    },
    #[error("spectrum {path}: {reason}")]
    SpectrumParse { path: PathBuf, reason: String },
    #[error("string contains an interior nul byte: {0:?}")]
    InteriorNul(String),
    #[error("path is not valid UTF-8: {0:?}")]
    NonUtf8Path(PathBuf),

    // Native engine
    #[error("native engine: {0}")]
    Native(String),
}

impl SimError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SimError::MissingDependency(_)
            | SimError::MissingMaterialDatabase
            | SimError::NotInitialized(_)
            | SimError::AlreadyInitialized(_)
            | SimError::InvalidState { .. }
            | SimError::UnknownMaterial { .. }
            | SimError::UnknownNavigator(_)
            | SimError::ProcessNotRegistered { .. }
            | SimError::MissingEnergyModel(_)
            | SimError::MissingParticleCount(_) => ErrorKind::Configuration,

            SimError::ContextReleased
            | SimError::NoContext
            | SimError::SpectrumFileNotFound { .. }
            | SimError::Io { .. } => ErrorKind::Resource,

            SimError::Material(MaterialError::NotLoaded) => ErrorKind::Configuration,
            SimError::Material(MaterialError::UnknownMaterial(_)) => ErrorKind::Configuration,
            SimError::Material(MaterialError::Io { .. }) => ErrorKind::Resource,

            SimError::Native(_) => ErrorKind::NativeEngine,

            _ => ErrorKind::Validation,
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        SimError::Io {
            path: path.into(),
            source,
        }
    }
}

pub type SimResult<T> = Result<T, SimError>;
