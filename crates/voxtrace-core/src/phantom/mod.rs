//! Analytical phantom creation
//!
//! [`PhantomBuilder`] turns analytical primitives into a voxelized phantom plus
//! the range file mapping labels to materials. Primitives are drawn in call
//! order and each one overwrites the voxels it covers, so overlapping shapes
//! must be drawn back to front.

mod image;
mod primitives;

pub use image::{VoxelDataType, VoxelImage};
pub use primitives::{AnalyticalVolume, Cuboid, Sphere, Tube};

use std::path::PathBuf;

use glam::DVec3;
use rayon::prelude::*;

use voxtrace_physics::{Dimension, UnitValue};

use crate::error::{SimError, SimResult};
use crate::geometry::{RangeMaterialMap, VoxelizedNavigator};

pub const DEFAULT_BACKGROUND_MATERIAL: &str = "Air";

/// Files produced by [`PhantomBuilder::write`]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PhantomFiles {
    pub image_file: PathBuf,
    pub raw_file: PathBuf,
    pub range_file: PathBuf,
}

impl PhantomFiles {
    /// Navigator reading these files, with default tolerance and offset
    pub fn navigator(&self, name: impl Into<String>) -> VoxelizedNavigator {
        VoxelizedNavigator::new(name, &self.image_file, &self.range_file)
    }
}

/// Allocated voxel grid and its placement
struct Grid {
    dimensions: [u32; 3],
    element_size: DVec3,
    /// World position of the first voxel's center
    origin: DVec3,
    labels: Vec<f32>,
}

#[derive(Default)]
pub struct PhantomBuilder {
    dimensions: Option<[u32; 3]>,
    element_size: Option<[UnitValue; 3]>,
    outputs: Option<(PathBuf, PathBuf)>,
    isocenter: Option<[UnitValue; 3]>,
    background: Option<String>,
    data_type: VoxelDataType,
    materials: Vec<(f32, String)>,
    grid: Option<Grid>,
}

impl PhantomBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_dimensions(&mut self, width: u32, height: u32, depth: u32) {
        self.dimensions = Some([width, height, depth]);
    }

    pub fn set_element_size(&mut self, size: [UnitValue; 3]) -> SimResult<()> {
        for component in &size {
            component.expect(Dimension::Length)?;
        }
        self.element_size = Some(size);
        Ok(())
    }

    /// Header path of the image and path of the range file
    pub fn set_output_paths(&mut self, image: impl Into<PathBuf>, range: impl Into<PathBuf>) {
        self.outputs = Some((image.into(), range.into()));
    }

    /// World position the phantom's center is shifted by
    pub fn set_isocenter(&mut self, position: [UnitValue; 3]) -> SimResult<()> {
        for component in &position {
            component.expect(Dimension::Length)?;
        }
        self.isocenter = Some(position);
        Ok(())
    }

    /// Material of label 0, every voxel no primitive covers
    pub fn set_background_material(&mut self, material: impl Into<String>) {
        self.background = Some(material.into());
    }

    /// Scalar type the image is written with, `MET_FLOAT` unless set
    pub fn set_data_type(&mut self, data_type: VoxelDataType) {
        self.data_type = data_type;
    }

    pub fn data_type(&self) -> VoxelDataType {
        self.data_type
    }

    pub fn is_initialized(&self) -> bool {
        self.grid.is_some()
    }

    /// Allocate the grid, filled with the background label
    pub fn initialize(&mut self) -> SimResult<()> {
        let dimensions = self.dimensions.unwrap_or([0; 3]);
        if dimensions.contains(&0) {
            return Err(SimError::InvalidDimensions(dimensions));
        }
        let voxels = dimensions
            .iter()
            .try_fold(1usize, |count, &d| count.checked_mul(d as usize))
            .ok_or(SimError::InvalidDimensions(dimensions))?;
        let size = self
            .element_size
            .ok_or(SimError::InvalidElementSize([0.0; 3]))?;
        let size = DVec3::new(size[0].canonical(), size[1].canonical(), size[2].canonical());
        if !size.cmpgt(DVec3::ZERO).all() {
            return Err(SimError::InvalidElementSize(size.to_array()));
        }
        if self.outputs.is_none() {
            return Err(SimError::MissingOutputPaths);
        }
        let isocenter = self
            .isocenter
            .map(|[x, y, z]| DVec3::new(x.canonical(), y.canonical(), z.canonical()))
            .unwrap_or(DVec3::ZERO);

        let extent = DVec3::new(
            f64::from(dimensions[0]),
            f64::from(dimensions[1]),
            f64::from(dimensions[2]),
        ) * size;
        let offset = extent * 0.5 + isocenter;
        let origin = size * 0.5 - offset;

        let background = self
            .background
            .clone()
            .unwrap_or_else(|| DEFAULT_BACKGROUND_MATERIAL.to_string());
        self.materials = vec![(0.0, background)];
        self.grid = Some(Grid {
            dimensions,
            element_size: size,
            origin,
            labels: vec![0.0; voxels],
        });
        log::info!(
            "Phantom grid {}x{}x{} allocated, voxel {:?} mm",
            dimensions[0],
            dimensions[1],
            dimensions[2],
            size.to_array()
        );
        Ok(())
    }

    fn bind_label(&mut self, label: f32, material: &str) -> SimResult<()> {
        if !self.data_type.represents(label) {
            return Err(SimError::UnrepresentableLabel {
                label,
                data_type: self.data_type,
            });
        }
        match self.materials.iter().find(|(l, _)| *l == label) {
            Some((_, existing)) if existing != material => Err(SimError::LabelConflict {
                label,
                existing: existing.clone(),
                requested: material.to_string(),
            }),
            Some(_) => Ok(()),
            None => {
                self.materials.push((label, material.to_string()));
                Ok(())
            }
        }
    }

    /// Rasterize a primitive, overwriting whatever earlier primitives wrote
    pub fn draw<V: AnalyticalVolume + ?Sized>(&mut self, volume: &V) -> SimResult<()> {
        if self.grid.is_none() {
            return Err(SimError::NotInitialized("phantom builder"));
        }
        self.bind_label(volume.label(), volume.material())?;
        let grid = self
            .grid
            .as_mut()
            .ok_or(SimError::NotInitialized("phantom builder"))?;

        let [w, h, _] = grid.dimensions;
        let (w, h) = (w as usize, h as usize);
        let (size, origin) = (grid.element_size, grid.origin);
        let (lo, hi) = volume.bounds();
        let label = volume.label();

        let painted: usize = grid
            .labels
            .par_chunks_mut(w * h)
            .enumerate()
            .map(|(k, slice)| {
                let z = origin.z + k as f64 * size.z;
                if z < lo.z || z > hi.z {
                    return 0;
                }
                let mut count = 0;
                for j in 0..h {
                    let y = origin.y + j as f64 * size.y;
                    if y < lo.y || y > hi.y {
                        continue;
                    }
                    for i in 0..w {
                        let point = DVec3::new(origin.x + i as f64 * size.x, y, z);
                        if volume.contains(point) {
                            slice[i + j * w] = label;
                            count += 1;
                        }
                    }
                }
                count
            })
            .sum();

        log::debug!(
            "Drew {} (label {}, {}): {} voxels",
            volume.kind(),
            label,
            volume.material(),
            painted
        );
        Ok(())
    }

    /// Label of a voxel, once the grid is allocated
    pub fn label_at(&self, x: u32, y: u32, z: u32) -> Option<f32> {
        let grid = self.grid.as_ref()?;
        let [w, h, d] = grid.dimensions;
        if x >= w || y >= h || z >= d {
            return None;
        }
        let index = x as usize + w as usize * (y as usize + h as usize * z as usize);
        grid.labels.get(index).copied()
    }

    /// Labels and their materials, ordered by label
    pub fn range_map(&self) -> RangeMaterialMap {
        let mut bound = self.materials.clone();
        bound.sort_by(|a, b| a.0.total_cmp(&b.0));
        let mut map = RangeMaterialMap::new();
        for (label, material) in bound {
            map.push(label, label, material);
        }
        map
    }

    /// Write the image and the range file
    pub fn write(&self) -> SimResult<PhantomFiles> {
        let grid = self
            .grid
            .as_ref()
            .ok_or(SimError::NotInitialized("phantom builder"))?;
        let (image_file, range_file) = self.outputs.clone().ok_or(SimError::MissingOutputPaths)?;

        let image = VoxelImage {
            dimensions: grid.dimensions,
            element_size: grid.element_size.to_array(),
            offset: grid.origin.to_array(),
            data_type: self.data_type,
            data: grid.labels.clone(),
        };
        let raw_file = image.write(&image_file)?;
        self.range_map().write(&range_file)?;
        log::info!(
            "Phantom written to {} and {}",
            image_file.display(),
            range_file.display()
        );
        Ok(PhantomFiles {
            image_file,
            raw_file,
            range_file,
        })
    }
}
