//! Physical data for voxtrace
//!
//! This crate provides the foundational data types of the transport control plane:
//! - Unit-tagged quantities (Unit, UnitValue, Dimension)
//! - Particle species and physics processes (ParticleType, PhysicsProcess)
//! - The periodic table (Element, ELEMENTS)
//! - Material definitions and the material database (Material, MaterialDatabase)

mod elements;
pub mod interactions;
mod materials;
mod particle;
mod units;

pub use elements::{
    AVOGADRO, CLASSICAL_ELECTRON_RADIUS_MM, ELECTRON_MASS_MEV, ELEMENTS, Element, FINE_STRUCTURE,
};
pub use materials::{
    Component, MAX_TABLE_ENERGY_MEV, MIN_TABLE_ENERGY_MEV, Material, MaterialDatabase,
    MaterialError, MaterialProperties,
};
pub use particle::{ParticleType, PhysicsProcess, UnknownName};
pub use units::{Dimension, Unit, UnitError, UnitValue};
