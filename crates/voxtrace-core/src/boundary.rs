//! Wire form of a validated configuration
//!
//! Strings cross as nul-terminated byte sequences and quantities as
//! `(f32 magnitude, unit tag)` pairs. Nothing here is interpreted by the control
//! plane after it has been assembled.

use std::ffi::CString;
use std::path::Path;

use voxtrace_physics::UnitValue;

use crate::engine::ContextHandle;
use crate::error::{SimError, SimResult};

/// Convert a string for the engine, rejecting interior nul bytes
pub fn native_string(value: &str) -> SimResult<CString> {
    CString::new(value).map_err(|_| SimError::InteriorNul(value.to_string()))
}

/// Convert a path byte for byte, never substituting invalid sequences
#[cfg(unix)]
pub fn native_path(path: &Path) -> SimResult<CString> {
    use std::os::unix::ffi::OsStrExt;

    CString::new(path.as_os_str().as_bytes())
        .map_err(|_| SimError::InteriorNul(path.display().to_string()))
}

/// Convert a path, rejecting paths that are not valid UTF-8
#[cfg(not(unix))]
pub fn native_path(path: &Path) -> SimResult<CString> {
    let value = path
        .to_str()
        .ok_or_else(|| SimError::NonUtf8Path(path.to_path_buf()))?;
    native_string(value)
}

/// A physical quantity as the engine receives it
#[derive(Clone, Debug, PartialEq)]
pub struct NativeQuantity {
    pub magnitude: f32,
    pub unit: CString,
}

impl NativeQuantity {
    pub fn new(value: UnitValue) -> SimResult<Self> {
        let (magnitude, tag) = value.to_native();
        Ok(Self {
            magnitude,
            unit: native_string(tag)?,
        })
    }

    pub fn triple(values: [UnitValue; 3]) -> SimResult<[NativeQuantity; 3]> {
        let [x, y, z] = values;
        Ok([Self::new(x)?, Self::new(y)?, Self::new(z)?])
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct NativeProcess {
    pub process: CString,
    pub particle: CString,
}

#[derive(Clone, Debug, PartialEq)]
pub struct NativeNavigator {
    pub name: CString,
    pub image_file: CString,
    pub range_file: CString,
    pub tolerance: NativeQuantity,
    pub offset: [NativeQuantity; 3],
}

#[derive(Clone, Debug, PartialEq)]
pub enum NativeEnergy {
    Mono(NativeQuantity),
    /// Bin energies in MeV with their cumulative distribution
    Spectrum { energies: Vec<f32>, cdf: Vec<f32> },
}

#[derive(Clone, Debug, PartialEq)]
pub struct NativeSource {
    pub name: CString,
    pub particle: CString,
    pub particle_count: u64,
    pub position: [NativeQuantity; 3],
    pub rotation: [NativeQuantity; 3],
    pub beam_aperture: NativeQuantity,
    pub focal_spot: [NativeQuantity; 3],
    /// Row-major 3×3 local axis
    pub local_axis: [f32; 9],
    pub energy: NativeEnergy,
}

#[derive(Clone, Debug, PartialEq)]
pub struct NativeCut {
    pub scope: CString,
    pub particle: CString,
    pub threshold: NativeQuantity,
}

/// Complete configuration dispatched by a run
#[derive(Clone, Debug, PartialEq)]
pub struct RunConfiguration {
    pub context: ContextHandle,
    pub seed: u32,
    pub verbosity: u8,
    /// Log every particle step
    pub tracking: bool,
    pub materials_file: Option<CString>,
    pub materials: Vec<CString>,
    pub processes: Vec<NativeProcess>,
    pub energy_min: NativeQuantity,
    pub energy_max: NativeQuantity,
    pub bin_count: u16,
    pub navigators: Vec<NativeNavigator>,
    pub sources: Vec<NativeSource>,
    pub cuts: Vec<NativeCut>,
}
