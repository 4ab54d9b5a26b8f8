//! Particle species and the physics processes acting on them

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {kind} '{name}'")]
pub struct UnknownName {
    pub kind: &'static str,
    pub name: String,
}

/// Particle species transported by the engine
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParticleType {
    Photon,
    Electron,
    Positron,
}

impl ParticleType {
    pub const ALL: [ParticleType; 3] = [
        ParticleType::Photon,
        ParticleType::Electron,
        ParticleType::Positron,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ParticleType::Photon => "photon",
            ParticleType::Electron => "electron",
            ParticleType::Positron => "positron",
        }
    }

    pub fn is_charged(self) -> bool {
        !matches!(self, ParticleType::Photon)
    }
}

impl fmt::Display for ParticleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ParticleType {
    type Err = UnknownName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "photon" | "gamma" => Ok(ParticleType::Photon),
            "electron" | "e-" => Ok(ParticleType::Electron),
            "positron" | "e+" => Ok(ParticleType::Positron),
            _ => Err(UnknownName {
                kind: "particle",
                name: s.to_string(),
            }),
        }
    }
}

/// Interaction processes with tabulated cross sections
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PhysicsProcess {
    Compton,
    Rayleigh,
    Photoelectric,
}

impl PhysicsProcess {
    pub const ALL: [PhysicsProcess; 3] = [
        PhysicsProcess::Compton,
        PhysicsProcess::Rayleigh,
        PhysicsProcess::Photoelectric,
    ];

    pub fn name(self) -> &'static str {
        match self {
            PhysicsProcess::Compton => "Compton",
            PhysicsProcess::Rayleigh => "Rayleigh",
            PhysicsProcess::Photoelectric => "Photoelectric",
        }
    }

    /// The particle species this process applies to
    pub fn particle(self) -> ParticleType {
        ParticleType::Photon
    }
}

impl fmt::Display for PhysicsProcess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for PhysicsProcess {
    type Err = UnknownName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "compton" => Ok(PhysicsProcess::Compton),
            "rayleigh" => Ok(PhysicsProcess::Rayleigh),
            "photoelectric" => Ok(PhysicsProcess::Photoelectric),
            _ => Err(UnknownName {
                kind: "process",
                name: s.to_string(),
            }),
        }
    }
}
