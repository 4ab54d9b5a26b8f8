//! Secondary-production thresholds per particle and navigator

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use voxtrace_physics::{Dimension, MaterialDatabase, MaterialError, ParticleType, UnitValue};

use crate::boundary::{NativeCut, NativeQuantity, native_string};
use crate::error::{SimError, SimResult};
use crate::geometry::{GeometryRegistry, RangeMaterialMap};

/// Cut applied where nothing more specific is configured
pub const DEFAULT_RANGE_CUT: UnitValue = UnitValue::mm(0.7);

/// Navigators a cut applies to
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CutScope {
    All,
    Navigator(String),
}

impl CutScope {
    /// `"all"` (any case) or a navigator name
    pub fn parse(scope: &str) -> Self {
        if scope.eq_ignore_ascii_case("all") {
            CutScope::All
        } else {
            CutScope::Navigator(scope.to_string())
        }
    }
}

impl fmt::Display for CutScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CutScope::All => f.write_str("all"),
            CutScope::Navigator(name) => f.write_str(name),
        }
    }
}

/// A cut converted to a production threshold in one material
#[derive(Clone, Debug, PartialEq)]
pub struct MaterialCut {
    pub navigator: String,
    pub material: String,
    pub particle: ParticleType,
    pub energy: UnitValue,
}

#[derive(Debug, Default)]
pub struct RangeCutPolicy {
    cuts: BTreeMap<(CutScope, ParticleType), UnitValue>,
}

impl RangeCutPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite the cut for `(scope, particle)`
    ///
    /// A length is a range cut, an energy is used as the threshold directly.
    pub fn set_cut(&mut self, particle: ParticleType, value: UnitValue, scope: CutScope) -> SimResult<()> {
        match value.dimension() {
            Dimension::Length | Dimension::Energy => {
                let canonical = value.expect(value.dimension())?;
                if canonical <= 0.0 {
                    return Err(MaterialError::InvalidCut(canonical).into());
                }
            }
            found => {
                return Err(SimError::InvalidUnit {
                    expected: "length or energy",
                    found,
                });
            }
        }
        log::debug!("Range cut for {particle} in {scope}: {value}");
        self.cuts.insert((scope, particle), value);
        Ok(())
    }

    pub fn get(&self, scope: &CutScope, particle: ParticleType) -> Option<UnitValue> {
        self.cuts.get(&(scope.clone(), particle)).copied()
    }

    /// Specific entry, else the `all` entry, else [`DEFAULT_RANGE_CUT`]
    pub fn effective_cut(&self, navigator: &str, particle: ParticleType) -> UnitValue {
        self.get(&CutScope::Navigator(navigator.to_string()), particle)
            .or_else(|| self.get(&CutScope::All, particle))
            .unwrap_or(DEFAULT_RANGE_CUT)
    }

    pub fn cuts(&self) -> impl Iterator<Item = (&CutScope, ParticleType, UnitValue)> {
        self.cuts.iter().map(|((scope, particle), value)| (scope, *particle, *value))
    }

    pub fn len(&self) -> usize {
        self.cuts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cuts.is_empty()
    }

    /// Every navigator-scoped cut must name a registered navigator
    pub fn validate_scopes(&self, geometry: &GeometryRegistry) -> SimResult<()> {
        for (scope, _) in self.cuts.keys() {
            if let CutScope::Navigator(name) = scope {
                if !geometry.contains(name) {
                    return Err(SimError::UnknownNavigator(name.clone()));
                }
            }
        }
        Ok(())
    }

    /// Production thresholds for every navigator, material and particle
    pub fn resolve(
        &self,
        geometry: &GeometryRegistry,
        database: &MaterialDatabase,
    ) -> SimResult<Vec<MaterialCut>> {
        let mut resolved = Vec::new();
        for navigator in geometry.navigators() {
            let map = RangeMaterialMap::read(&navigator.range_file)?;
            for material in map.materials() {
                for particle in ParticleType::ALL {
                    let cut = self.effective_cut(&navigator.name, particle);
                    let energy = match cut.dimension() {
                        Dimension::Energy => cut,
                        _ => database.energy_cut_of(material, particle, cut)?,
                    };
                    resolved.push(MaterialCut {
                        navigator: navigator.name.clone(),
                        material: material.to_string(),
                        particle,
                        energy,
                    });
                }
            }
        }
        Ok(resolved)
    }

    pub fn to_native(&self) -> SimResult<Vec<NativeCut>> {
        self.cuts
            .iter()
            .map(|((scope, particle), value)| {
                Ok(NativeCut {
                    scope: native_string(&scope.to_string())?,
                    particle: native_string(particle.name())?,
                    threshold: NativeQuantity::new(*value)?,
                })
            })
            .collect()
    }

    pub(crate) fn print_infos(&self) {
        log::info!("Range cuts (default {DEFAULT_RANGE_CUT})");
        for ((scope, particle), value) in &self.cuts {
            log::info!("  {scope} / {particle}: {value}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use voxtrace_physics::UnitError;

    #[test]
    fn test_resolution_order() {
        let mut policy = RangeCutPolicy::new();
        assert_eq!(policy.effective_cut("phantom", ParticleType::Photon), DEFAULT_RANGE_CUT);

        policy
            .set_cut(ParticleType::Photon, UnitValue::mm(1.0), CutScope::All)
            .unwrap();
        assert_eq!(policy.effective_cut("phantom", ParticleType::Photon), UnitValue::mm(1.0));
        assert_eq!(policy.effective_cut("phantom", ParticleType::Electron), DEFAULT_RANGE_CUT);

        policy
            .set_cut(
                ParticleType::Photon,
                UnitValue::mm(0.1),
                CutScope::Navigator("phantom".into()),
            )
            .unwrap();
        assert_eq!(policy.effective_cut("phantom", ParticleType::Photon), UnitValue::mm(0.1));
        assert_eq!(policy.effective_cut("other", ParticleType::Photon), UnitValue::mm(1.0));
    }

    #[test]
    fn test_later_call_overwrites() {
        let mut policy = RangeCutPolicy::new();
        policy
            .set_cut(ParticleType::Electron, UnitValue::mm(1.0), CutScope::All)
            .unwrap();
        policy
            .set_cut(ParticleType::Electron, UnitValue::kev(10.0), CutScope::All)
            .unwrap();
        assert_eq!(policy.len(), 1);
        assert_eq!(policy.get(&CutScope::All, ParticleType::Electron), Some(UnitValue::kev(10.0)));
    }

    #[test]
    fn test_invalid_unit() {
        let mut policy = RangeCutPolicy::new();
        assert!(matches!(
            policy.set_cut(ParticleType::Photon, UnitValue::degrees(1.0), CutScope::All),
            Err(SimError::InvalidUnit { found: Dimension::Angle, .. })
        ));
        assert!(policy.is_empty());
    }

    #[test]
    fn test_non_positive_cut_rejected() {
        let mut policy = RangeCutPolicy::new();
        assert!(matches!(
            policy.set_cut(ParticleType::Electron, UnitValue::mm(0.0), CutScope::All),
            Err(SimError::Material(MaterialError::InvalidCut(_)))
        ));
        assert!(policy.is_empty());
    }

    #[test]
    fn test_non_finite_cut_rejected() {
        let mut policy = RangeCutPolicy::new();
        assert!(matches!(
            policy.set_cut(ParticleType::Photon, UnitValue::kev(f64::NAN), CutScope::All),
            Err(SimError::Unit(UnitError::NonFinite(_)))
        ));
        assert!(matches!(
            policy.set_cut(ParticleType::Electron, UnitValue::mm(f64::INFINITY), CutScope::All),
            Err(SimError::Unit(UnitError::NonFinite(_)))
        ));
        assert!(policy.is_empty());
    }

    #[test]
    fn test_scope_parse() {
        assert_eq!(CutScope::parse("all"), CutScope::All);
        assert_eq!(CutScope::parse("ALL"), CutScope::All);
        assert_eq!(CutScope::parse("phantom"), CutScope::Navigator("phantom".into()));
    }

    #[test]
    fn test_unknown_scope() {
        let mut policy = RangeCutPolicy::new();
        policy
            .set_cut(ParticleType::Photon, UnitValue::mm(1.0), CutScope::parse("ghost"))
            .unwrap();
        assert!(matches!(
            policy.validate_scopes(&GeometryRegistry::new()),
            Err(SimError::UnknownNavigator(name)) if name == "ghost"
        ));
    }

    #[test]
    fn test_native_form() {
        let mut policy = RangeCutPolicy::new();
        policy
            .set_cut(ParticleType::Positron, UnitValue::mm(0.5), CutScope::All)
            .unwrap();
        let native = policy.to_native().unwrap();
        assert_eq!(native.len(), 1);
        assert_eq!(native[0].scope.as_bytes(), b"all");
        assert_eq!(native[0].particle.as_bytes(), b"positron");
        assert_eq!(native[0].threshold.magnitude, 0.5);
    }
}
