//! Analytical primitives that can be rasterized into a phantom

use glam::DVec3;

use voxtrace_physics::{Dimension, UnitValue};

use super::PhantomBuilder;
use crate::error::{SimError, SimResult};

/// A solid shape with a label value and a material
pub trait AnalyticalVolume: Send + Sync {
    /// Shape name for logs
    fn kind(&self) -> &'static str;

    /// Label written into every voxel the shape covers
    fn label(&self) -> f32;

    fn material(&self) -> &str;

    /// Whether a point (mm) lies inside the shape
    fn contains(&self, point: DVec3) -> bool;

    /// Axis-aligned bounding box (mm)
    fn bounds(&self) -> (DVec3, DVec3);

    /// Rasterize into the builder's grid, overwriting earlier primitives
    fn draw(&self, builder: &mut PhantomBuilder) -> SimResult<()>
    where
        Self: Sized,
    {
        builder.draw(self)
    }
}

fn positive_length(what: &str, value: UnitValue) -> SimResult<f64> {
    let mm = value.expect(Dimension::Length)?;
    if mm <= 0.0 {
        return Err(SimError::InvalidShape(format!("{what} must be positive, got {value}")));
    }
    Ok(mm)
}

fn position_mm(position: [UnitValue; 3]) -> SimResult<DVec3> {
    let [x, y, z] = position;
    Ok(DVec3::new(
        x.expect(Dimension::Length)?,
        y.expect(Dimension::Length)?,
        z.expect(Dimension::Length)?,
    ))
}

/// Solid cylinder with its axis along z
#[derive(Clone, Debug, PartialEq)]
pub struct Tube {
    radius: f64,
    height: f64,
    center: DVec3,
    label: f32,
    material: String,
}

impl Tube {
    pub fn new(
        radius: UnitValue,
        height: UnitValue,
        label: f32,
        material: impl Into<String>,
    ) -> SimResult<Self> {
        Ok(Self {
            radius: positive_length("tube radius", radius)?,
            height: positive_length("tube height", height)?,
            center: DVec3::ZERO,
            label,
            material: material.into(),
        })
    }

    /// Move the tube's center
    pub fn at(mut self, position: [UnitValue; 3]) -> SimResult<Self> {
        self.center = position_mm(position)?;
        Ok(self)
    }
}

impl AnalyticalVolume for Tube {
    fn kind(&self) -> &'static str {
        "tube"
    }

    fn label(&self) -> f32 {
        self.label
    }

    fn material(&self) -> &str {
        &self.material
    }

    fn contains(&self, point: DVec3) -> bool {
        let d = point - self.center;
        d.x * d.x + d.y * d.y <= self.radius * self.radius && d.z.abs() <= self.height * 0.5
    }

    fn bounds(&self) -> (DVec3, DVec3) {
        let half = DVec3::new(self.radius, self.radius, self.height * 0.5);
        (self.center - half, self.center + half)
    }
}

/// Axis-aligned box
#[derive(Clone, Debug, PartialEq)]
pub struct Cuboid {
    half_size: DVec3,
    center: DVec3,
    label: f32,
    material: String,
}

impl Cuboid {
    pub fn new(size: [UnitValue; 3], label: f32, material: impl Into<String>) -> SimResult<Self> {
        let [x, y, z] = size;
        let size = DVec3::new(
            positive_length("box width", x)?,
            positive_length("box height", y)?,
            positive_length("box depth", z)?,
        );
        Ok(Self {
            half_size: size * 0.5,
            center: DVec3::ZERO,
            label,
            material: material.into(),
        })
    }

    pub fn at(mut self, position: [UnitValue; 3]) -> SimResult<Self> {
        self.center = position_mm(position)?;
        Ok(self)
    }
}

impl AnalyticalVolume for Cuboid {
    fn kind(&self) -> &'static str {
        "box"
    }

    fn label(&self) -> f32 {
        self.label
    }

    fn material(&self) -> &str {
        &self.material
    }

    fn contains(&self, point: DVec3) -> bool {
        let d = (point - self.center).abs();
        d.cmple(self.half_size).all()
    }

    fn bounds(&self) -> (DVec3, DVec3) {
        (self.center - self.half_size, self.center + self.half_size)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Sphere {
    radius: f64,
    center: DVec3,
    label: f32,
    material: String,
}

impl Sphere {
    pub fn new(radius: UnitValue, label: f32, material: impl Into<String>) -> SimResult<Self> {
        Ok(Self {
            radius: positive_length("sphere radius", radius)?,
            center: DVec3::ZERO,
            label,
            material: material.into(),
        })
    }

    pub fn at(mut self, position: [UnitValue; 3]) -> SimResult<Self> {
        self.center = position_mm(position)?;
        Ok(self)
    }
}

impl AnalyticalVolume for Sphere {
    fn kind(&self) -> &'static str {
        "sphere"
    }

    fn label(&self) -> f32 {
        self.label
    }

    fn material(&self) -> &str {
        &self.material
    }

    fn contains(&self, point: DVec3) -> bool {
        point.distance_squared(self.center) <= self.radius * self.radius
    }

    fn bounds(&self) -> (DVec3, DVec3) {
        let r = DVec3::splat(self.radius);
        (self.center - r, self.center + r)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tube_contains() {
        let tube = Tube::new(UnitValue::mm(10.0), UnitValue::mm(40.0), 1.0, "Water").unwrap();
        assert!(tube.contains(DVec3::new(9.0, 0.0, 19.0)));
        assert!(!tube.contains(DVec3::new(8.0, 8.0, 0.0)));
        assert!(!tube.contains(DVec3::new(0.0, 0.0, 21.0)));
    }

    #[test]
    fn test_shape_units() {
        // 1 cm radius is 10 mm
        let tube = Tube::new(UnitValue::parse(1.0, "cm").unwrap(), UnitValue::mm(2.0), 1.0, "Water")
            .unwrap();
        assert!(tube.contains(DVec3::new(9.5, 0.0, 0.0)));

        assert!(matches!(
            Tube::new(UnitValue::mev(1.0), UnitValue::mm(1.0), 1.0, "Water"),
            Err(SimError::Unit(_))
        ));
        assert!(matches!(
            Sphere::new(UnitValue::mm(-1.0), 1.0, "Water"),
            Err(SimError::InvalidShape(_))
        ));
    }

    #[test]
    fn test_positioned_cuboid() {
        let cuboid = Cuboid::new([UnitValue::mm(2.0); 3], 2.0, "Bone")
            .unwrap()
            .at([UnitValue::mm(10.0), UnitValue::mm(0.0), UnitValue::mm(0.0)])
            .unwrap();
        assert!(cuboid.contains(DVec3::new(10.9, 0.5, -0.5)));
        assert!(!cuboid.contains(DVec3::ZERO));
        let (lo, hi) = cuboid.bounds();
        assert_eq!(lo, DVec3::new(9.0, -1.0, -1.0));
        assert_eq!(hi, DVec3::new(11.0, 1.0, 1.0));
    }

    #[test]
    fn test_sphere_contains() {
        let sphere = Sphere::new(UnitValue::mm(5.0), 3.0, "Lung").unwrap();
        assert!(sphere.contains(DVec3::new(3.0, 4.0, 0.0)));
        assert!(!sphere.contains(DVec3::new(3.0, 4.0, 0.1)));
    }
}
