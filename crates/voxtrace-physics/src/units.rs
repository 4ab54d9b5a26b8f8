//! Physical quantities tagged with their unit
//!
//! Every quantity that crosses a component boundary is a [`UnitValue`]. Unit tags
//! are a closed enumeration; converting to the canonical unit of a dimension
//! (millimeter, degree, MeV, nanosecond) happens explicitly through
//! [`UnitValue::canonical`] or [`UnitValue::expect`].

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Physical dimension of a unit
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Dimension {
    Length,
    Angle,
    Energy,
    Time,
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Dimension::Length => "length",
            Dimension::Angle => "angle",
            Dimension::Energy => "energy",
            Dimension::Time => "time",
        };
        f.write_str(name)
    }
}

/// Errors raised while interpreting unit tags and quantities
#[derive(Debug, Clone, PartialEq, Error)]
pub enum UnitError {
    #[error("unknown unit tag '{0}'")]
    UnknownUnit(String),
    #[error("expected a {expected} unit, got '{unit}' ({found})")]
    DimensionMismatch {
        expected: Dimension,
        found: Dimension,
        unit: Unit,
    },
    #[error("quantity {0} is not a finite number")]
    NonFinite(f64),
}

/// Closed set of unit tags understood by the control plane
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Unit {
    Nanometer,
    Micrometer,
    Millimeter,
    Centimeter,
    Meter,
    Kilometer,
    Radian,
    Milliradian,
    Degree,
    ElectronVolt,
    KiloElectronVolt,
    MegaElectronVolt,
    GigaElectronVolt,
    Picosecond,
    Nanosecond,
    Microsecond,
    Millisecond,
    Second,
}

impl Unit {
    pub const ALL: [Unit; 18] = [
        Unit::Nanometer,
        Unit::Micrometer,
        Unit::Millimeter,
        Unit::Centimeter,
        Unit::Meter,
        Unit::Kilometer,
        Unit::Radian,
        Unit::Milliradian,
        Unit::Degree,
        Unit::ElectronVolt,
        Unit::KiloElectronVolt,
        Unit::MegaElectronVolt,
        Unit::GigaElectronVolt,
        Unit::Picosecond,
        Unit::Nanosecond,
        Unit::Microsecond,
        Unit::Millisecond,
        Unit::Second,
    ];

    pub fn dimension(self) -> Dimension {
        match self {
            Unit::Nanometer
            | Unit::Micrometer
            | Unit::Millimeter
            | Unit::Centimeter
            | Unit::Meter
            | Unit::Kilometer => Dimension::Length,
            Unit::Radian | Unit::Milliradian | Unit::Degree => Dimension::Angle,
            Unit::ElectronVolt
            | Unit::KiloElectronVolt
            | Unit::MegaElectronVolt
            | Unit::GigaElectronVolt => Dimension::Energy,
            Unit::Picosecond
            | Unit::Nanosecond
            | Unit::Microsecond
            | Unit::Millisecond
            | Unit::Second => Dimension::Time,
        }
    }

    /// Multiplier converting a magnitude in this unit to the canonical unit
    pub fn canonical_factor(self) -> f64 {
        match self {
            Unit::Nanometer => 1.0e-6,
            Unit::Micrometer => 1.0e-3,
            Unit::Millimeter => 1.0,
            Unit::Centimeter => 10.0,
            Unit::Meter => 1.0e3,
            Unit::Kilometer => 1.0e6,
            Unit::Radian => 180.0 / std::f64::consts::PI,
            Unit::Milliradian => 0.18 / std::f64::consts::PI,
            Unit::Degree => 1.0,
            Unit::ElectronVolt => 1.0e-6,
            Unit::KiloElectronVolt => 1.0e-3,
            Unit::MegaElectronVolt => 1.0,
            Unit::GigaElectronVolt => 1.0e3,
            Unit::Picosecond => 1.0e-3,
            Unit::Nanosecond => 1.0,
            Unit::Microsecond => 1.0e3,
            Unit::Millisecond => 1.0e6,
            Unit::Second => 1.0e9,
        }
    }

    /// Canonical unit of a dimension
    pub fn canonical(dimension: Dimension) -> Unit {
        match dimension {
            Dimension::Length => Unit::Millimeter,
            Dimension::Angle => Unit::Degree,
            Dimension::Energy => Unit::MegaElectronVolt,
            Dimension::Time => Unit::Nanosecond,
        }
    }

    pub fn tag(self) -> &'static str {
        match self {
            Unit::Nanometer => "nm",
            Unit::Micrometer => "um",
            Unit::Millimeter => "mm",
            Unit::Centimeter => "cm",
            Unit::Meter => "m",
            Unit::Kilometer => "km",
            Unit::Radian => "rad",
            Unit::Milliradian => "mrad",
            Unit::Degree => "degree",
            Unit::ElectronVolt => "eV",
            Unit::KiloElectronVolt => "keV",
            Unit::MegaElectronVolt => "MeV",
            Unit::GigaElectronVolt => "GeV",
            Unit::Picosecond => "ps",
            Unit::Nanosecond => "ns",
            Unit::Microsecond => "us",
            Unit::Millisecond => "ms",
            Unit::Second => "s",
        }
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for Unit {
    type Err = UnitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let unit = match s.trim() {
            "nm" => Unit::Nanometer,
            "um" | "µm" => Unit::Micrometer,
            "mm" => Unit::Millimeter,
            "cm" => Unit::Centimeter,
            "m" => Unit::Meter,
            "km" => Unit::Kilometer,
            "rad" => Unit::Radian,
            "mrad" => Unit::Milliradian,
            "deg" | "degree" => Unit::Degree,
            "eV" => Unit::ElectronVolt,
            "keV" => Unit::KiloElectronVolt,
            "MeV" => Unit::MegaElectronVolt,
            "GeV" => Unit::GigaElectronVolt,
            "ps" => Unit::Picosecond,
            "ns" => Unit::Nanosecond,
            "us" | "µs" => Unit::Microsecond,
            "ms" => Unit::Millisecond,
            "s" => Unit::Second,
            other => return Err(UnitError::UnknownUnit(other.to_string())),
        };
        Ok(unit)
    }
}

impl TryFrom<String> for Unit {
    type Error = UnitError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Unit> for String {
    fn from(unit: Unit) -> Self {
        unit.tag().to_string()
    }
}

/// A magnitude paired with its unit
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct UnitValue {
    pub magnitude: f64,
    pub unit: Unit,
}

impl UnitValue {
    pub const fn new(magnitude: f64, unit: Unit) -> Self {
        Self { magnitude, unit }
    }

    /// Build from a string tag such as `"mm"` or `"keV"`
    pub fn parse(magnitude: f64, tag: &str) -> Result<Self, UnitError> {
        Ok(Self::new(magnitude, tag.parse()?))
    }

    pub const fn mm(magnitude: f64) -> Self {
        Self::new(magnitude, Unit::Millimeter)
    }

    pub const fn mev(magnitude: f64) -> Self {
        Self::new(magnitude, Unit::MegaElectronVolt)
    }

    pub const fn kev(magnitude: f64) -> Self {
        Self::new(magnitude, Unit::KiloElectronVolt)
    }

    pub const fn degrees(magnitude: f64) -> Self {
        Self::new(magnitude, Unit::Degree)
    }

    pub fn dimension(&self) -> Dimension {
        self.unit.dimension()
    }

    /// Magnitude expressed in the canonical unit of this quantity's dimension
    pub fn canonical(&self) -> f64 {
        self.magnitude * self.unit.canonical_factor()
    }

    /// Canonical magnitude, provided the quantity has the expected dimension
    pub fn expect(&self, dimension: Dimension) -> Result<f64, UnitError> {
        if self.unit.dimension() != dimension {
            return Err(UnitError::DimensionMismatch {
                expected: dimension,
                found: self.unit.dimension(),
                unit: self.unit,
            });
        }
        if !self.magnitude.is_finite() {
            return Err(UnitError::NonFinite(self.magnitude));
        }
        Ok(self.canonical())
    }

    /// Re-express in another unit of the same dimension
    pub fn in_unit(&self, unit: Unit) -> Result<f64, UnitError> {
        let canonical = self.expect(unit.dimension())?;
        Ok(canonical / unit.canonical_factor())
    }

    /// The `(magnitude, tag)` pair handed across the native boundary
    pub fn to_native(&self) -> (f32, &'static str) {
        (self.magnitude as f32, self.unit.tag())
    }
}

impl fmt::Display for UnitValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.magnitude, self.unit)
    }
}
