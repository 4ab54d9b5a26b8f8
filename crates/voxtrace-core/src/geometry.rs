//! Voxelized navigators and the registry that orders them

use std::collections::BTreeSet;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use voxtrace_physics::{Dimension, MaterialDatabase, UnitValue};

use crate::error::{SimError, SimResult};

/// Distance below which the engine treats a particle as sitting on a boundary
pub const DEFAULT_TOLERANCE: UnitValue = UnitValue::mm(1.0e-5);

/// Voxel labels in `[first, last]` are made of `material`
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LabelRange {
    pub first: f32,
    pub last: f32,
    pub material: String,
}

/// Mapping from voxel label ranges to material names
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RangeMaterialMap {
    ranges: Vec<LabelRange>,
}

impl RangeMaterialMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, first: f32, last: f32, material: impl Into<String>) {
        self.ranges.push(LabelRange {
            first,
            last,
            material: material.into(),
        });
    }

    pub fn ranges(&self) -> &[LabelRange] {
        &self.ranges
    }

    /// Material of the first range containing `label`
    pub fn material_for(&self, label: f32) -> Option<&str> {
        self.ranges
            .iter()
            .find(|r| r.first <= label && label <= r.last)
            .map(|r| r.material.as_str())
    }

    /// Distinct material names in name order
    pub fn materials(&self) -> BTreeSet<&str> {
        self.ranges.iter().map(|r| r.material.as_str()).collect()
    }

    /// Parse lines of `first last material`; `path` is only used in errors
    pub fn parse(text: &str, path: &Path) -> SimResult<Self> {
        let mut map = Self::new();
        for (index, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let error = |reason: String| SimError::Parse {
                path: path.to_path_buf(),
                line: index + 1,
                reason,
            };
            let mut parts = line.split_whitespace();
            let (Some(first), Some(last), Some(material), None) =
                (parts.next(), parts.next(), parts.next(), parts.next())
            else {
                return Err(error(format!("expected 'first last material', got '{line}'")));
            };
            let first: f32 = first
                .parse()
                .map_err(|_| error(format!("invalid label '{first}'")))?;
            let last: f32 = last
                .parse()
                .map_err(|_| error(format!("invalid label '{last}'")))?;
            if first > last {
                return Err(error(format!("empty label range [{first}, {last}]")));
            }
            map.push(first, last, material);
        }
        if map.ranges.is_empty() {
            return Err(SimError::Parse {
                path: path.to_path_buf(),
                line: 0,
                reason: "range file defines no label range".to_string(),
            });
        }
        Ok(map)
    }

    pub fn read(path: impl AsRef<Path>) -> SimResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| SimError::io(path, e))?;
        Self::parse(&text, path)
    }

    pub fn to_text(&self) -> String {
        let mut text = String::new();
        for range in &self.ranges {
            // Writing to a String cannot fail
            let _ = writeln!(text, "{} {} {}", range.first, range.last, range.material);
        }
        text
    }

    pub fn write(&self, path: impl AsRef<Path>) -> SimResult<()> {
        let path = path.as_ref();
        std::fs::write(path, self.to_text()).map_err(|e| SimError::io(path, e))
    }
}

/// A voxelized volume the engine can navigate through
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VoxelizedNavigator {
    pub name: String,
    pub image_file: PathBuf,
    pub range_file: PathBuf,
    #[serde(default = "default_tolerance")]
    pub tolerance: UnitValue,
    #[serde(default = "zero_offset")]
    pub offset: [UnitValue; 3],
}

fn default_tolerance() -> UnitValue {
    DEFAULT_TOLERANCE
}

fn zero_offset() -> [UnitValue; 3] {
    [UnitValue::mm(0.0); 3]
}

impl VoxelizedNavigator {
    /// Navigator with the default tolerance and no offset
    pub fn new(
        name: impl Into<String>,
        image_file: impl Into<PathBuf>,
        range_file: impl Into<PathBuf>,
    ) -> Self {
        Self {
            name: name.into(),
            image_file: image_file.into(),
            range_file: range_file.into(),
            tolerance: DEFAULT_TOLERANCE,
            offset: zero_offset(),
        }
    }

    pub fn with_tolerance(mut self, tolerance: UnitValue) -> Self {
        self.tolerance = tolerance;
        self
    }

    pub fn with_offset(mut self, offset: [UnitValue; 3]) -> Self {
        self.offset = offset;
        self
    }

    /// Tolerance in mm
    pub fn tolerance_mm(&self) -> SimResult<f64> {
        Ok(self.tolerance.expect(Dimension::Length)?)
    }

    fn validate(&self) -> SimResult<()> {
        let tolerance = self.tolerance_mm()?;
        if tolerance <= 0.0 {
            return Err(SimError::InvalidTolerance(tolerance));
        }
        for component in &self.offset {
            component.expect(Dimension::Length)?;
        }
        Ok(())
    }
}

/// Navigators in registration order
#[derive(Debug, Default)]
pub struct GeometryRegistry {
    navigators: Vec<VoxelizedNavigator>,
}

impl GeometryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a navigator; names are unique across the registry
    pub fn register_voxelized(&mut self, navigator: VoxelizedNavigator) -> SimResult<()> {
        if self.contains(&navigator.name) {
            return Err(SimError::DuplicateNavigatorName(navigator.name));
        }
        navigator.validate()?;
        log::info!(
            "Registered navigator '{}' ({})",
            navigator.name,
            navigator.image_file.display()
        );
        self.navigators.push(navigator);
        Ok(())
    }

    pub fn navigators(&self) -> &[VoxelizedNavigator] {
        &self.navigators
    }

    pub fn get(&self, name: &str) -> Option<&VoxelizedNavigator> {
        self.navigators.iter().find(|n| n.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.navigators.iter().map(|n| n.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.navigators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.navigators.is_empty()
    }

    /// Every range file must parse and name only database materials
    pub fn validate_range_files(&self, database: &MaterialDatabase) -> SimResult<()> {
        for navigator in &self.navigators {
            let map = RangeMaterialMap::read(&navigator.range_file)?;
            for material in map.materials() {
                if !database.contains(material) {
                    return Err(SimError::UnknownMaterial {
                        material: material.to_string(),
                    });
                }
            }
        }
        Ok(())
    }

    pub(crate) fn print_infos(&self) {
        log::info!("Geometry: {} navigator(s)", self.navigators.len());
        for navigator in &self.navigators {
            log::info!("  navigator: {}", navigator.name);
            log::info!("    image: {}", navigator.image_file.display());
            log::info!("    ranges: {}", navigator.range_file.display());
            log::info!("    tolerance: {}", navigator.tolerance);
            let [x, y, z] = &navigator.offset;
            log::info!("    offset: ({x}, {y}, {z})");
        }
    }
}
