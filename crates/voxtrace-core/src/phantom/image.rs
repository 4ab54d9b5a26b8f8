//! MetaImage (`.mhd` header + raw little-endian data) reading and writing

use std::fmt;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{SimError, SimResult};

/// Scalar type of the voxels in the raw data file
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VoxelDataType {
    #[serde(rename = "MET_CHAR")]
    Char,
    #[serde(rename = "MET_UCHAR")]
    UChar,
    #[serde(rename = "MET_SHORT")]
    Short,
    #[serde(rename = "MET_USHORT")]
    UShort,
    #[serde(rename = "MET_INT")]
    Int,
    #[serde(rename = "MET_UINT")]
    UInt,
    #[default]
    #[serde(rename = "MET_FLOAT")]
    Float,
}

impl VoxelDataType {
    pub const ALL: [VoxelDataType; 7] = [
        VoxelDataType::Char,
        VoxelDataType::UChar,
        VoxelDataType::Short,
        VoxelDataType::UShort,
        VoxelDataType::Int,
        VoxelDataType::UInt,
        VoxelDataType::Float,
    ];

    /// `ElementType` value in the header
    pub fn tag(self) -> &'static str {
        match self {
            VoxelDataType::Char => "MET_CHAR",
            VoxelDataType::UChar => "MET_UCHAR",
            VoxelDataType::Short => "MET_SHORT",
            VoxelDataType::UShort => "MET_USHORT",
            VoxelDataType::Int => "MET_INT",
            VoxelDataType::UInt => "MET_UINT",
            VoxelDataType::Float => "MET_FLOAT",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.tag() == tag)
    }

    pub fn byte_size(self) -> usize {
        match self {
            VoxelDataType::Char | VoxelDataType::UChar => 1,
            VoxelDataType::Short | VoxelDataType::UShort => 2,
            VoxelDataType::Int | VoxelDataType::UInt | VoxelDataType::Float => 4,
        }
    }

    /// Whether `value` is stored without loss
    pub fn represents(self, value: f32) -> bool {
        let (min, max) = match self {
            VoxelDataType::Float => return value.is_finite(),
            VoxelDataType::Char => (f64::from(i8::MIN), f64::from(i8::MAX)),
            VoxelDataType::UChar => (0.0, f64::from(u8::MAX)),
            VoxelDataType::Short => (f64::from(i16::MIN), f64::from(i16::MAX)),
            VoxelDataType::UShort => (0.0, f64::from(u16::MAX)),
            VoxelDataType::Int => (f64::from(i32::MIN), f64::from(i32::MAX)),
            VoxelDataType::UInt => (0.0, f64::from(u32::MAX)),
        };
        let value = f64::from(value);
        value.fract() == 0.0 && (min..=max).contains(&value)
    }

    fn encode(self, value: f32, out: &mut Vec<u8>) {
        match self {
            VoxelDataType::Char => out.push((value as i8) as u8),
            VoxelDataType::UChar => out.push(value as u8),
            VoxelDataType::Short => out.extend_from_slice(&(value as i16).to_le_bytes()),
            VoxelDataType::UShort => out.extend_from_slice(&(value as u16).to_le_bytes()),
            VoxelDataType::Int => out.extend_from_slice(&(value as i32).to_le_bytes()),
            VoxelDataType::UInt => out.extend_from_slice(&(value as u32).to_le_bytes()),
            VoxelDataType::Float => out.extend_from_slice(&value.to_le_bytes()),
        }
    }

    /// `b` holds exactly [`VoxelDataType::byte_size`] bytes
    fn decode(self, b: &[u8]) -> f32 {
        match self {
            VoxelDataType::Char => f32::from(b[0] as i8),
            VoxelDataType::UChar => f32::from(b[0]),
            VoxelDataType::Short => f32::from(i16::from_le_bytes([b[0], b[1]])),
            VoxelDataType::UShort => f32::from(u16::from_le_bytes([b[0], b[1]])),
            VoxelDataType::Int => i32::from_le_bytes([b[0], b[1], b[2], b[3]]) as f32,
            VoxelDataType::UInt => u32::from_le_bytes([b[0], b[1], b[2], b[3]]) as f32,
            VoxelDataType::Float => f32::from_le_bytes([b[0], b[1], b[2], b[3]]),
        }
    }
}

impl fmt::Display for VoxelDataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// A 3D image with its geometry in mm
///
/// Values are held as `f32` in memory whatever type the raw file stores.
#[derive(Clone, Debug, PartialEq)]
pub struct VoxelImage {
    pub dimensions: [u32; 3],
    pub element_size: [f64; 3],
    /// World position of the first voxel's center
    pub offset: [f64; 3],
    pub data_type: VoxelDataType,
    /// x fastest, then y, then z
    pub data: Vec<f32>,
}

impl VoxelImage {
    pub fn voxel_count(&self) -> usize {
        self.dimensions.iter().map(|&d| d as usize).product()
    }

    pub fn index(&self, x: u32, y: u32, z: u32) -> usize {
        let [w, h, _] = self.dimensions;
        x as usize + w as usize * (y as usize + h as usize * z as usize)
    }

    pub fn get(&self, x: u32, y: u32, z: u32) -> Option<f32> {
        let [w, h, d] = self.dimensions;
        if x >= w || y >= h || z >= d {
            return None;
        }
        self.data.get(self.index(x, y, z)).copied()
    }

    /// Path of the raw data file next to a header
    pub fn raw_path(header: &Path) -> PathBuf {
        header.with_extension("raw")
    }

    fn header_text(&self, raw_name: &str) -> String {
        let [w, h, d] = self.dimensions;
        let [sx, sy, sz] = self.element_size;
        let [ox, oy, oz] = self.offset;
        let mut text = String::new();
        // Writing to a String cannot fail
        let _ = writeln!(text, "ObjectType = Image");
        let _ = writeln!(text, "NDims = 3");
        let _ = writeln!(text, "BinaryData = True");
        let _ = writeln!(text, "BinaryDataByteOrderMSB = False");
        let _ = writeln!(text, "CompressedData = False");
        let _ = writeln!(text, "Offset = {ox} {oy} {oz}");
        let _ = writeln!(text, "ElementSpacing = {sx} {sy} {sz}");
        let _ = writeln!(text, "DimSize = {w} {h} {d}");
        let _ = writeln!(text, "ElementType = {}", self.data_type);
        let _ = writeln!(text, "ElementDataFile = {raw_name}");
        text
    }

    /// Write the header and its raw data file, returning the raw file path
    pub fn write(&self, header: impl AsRef<Path>) -> SimResult<PathBuf> {
        let header = header.as_ref();
        let raw = Self::raw_path(header);
        let raw_name = raw
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        if let Some(value) = self.data.iter().find(|v| !self.data_type.represents(**v)) {
            return Err(SimError::UnrepresentableLabel {
                label: *value,
                data_type: self.data_type,
            });
        }
        let mut bytes = Vec::with_capacity(self.data.len() * self.data_type.byte_size());
        for value in &self.data {
            self.data_type.encode(*value, &mut bytes);
        }
        std::fs::write(&raw, bytes).map_err(|e| SimError::io(&raw, e))?;
        std::fs::write(header, self.header_text(&raw_name)).map_err(|e| SimError::io(header, e))?;
        log::debug!(
            "Wrote image {} ({} voxels, {})",
            header.display(),
            self.data.len(),
            self.data_type
        );
        Ok(raw)
    }

    /// Read an image written by [`VoxelImage::write`]
    pub fn read(header: impl AsRef<Path>) -> SimResult<Self> {
        let header = header.as_ref();
        let text = std::fs::read_to_string(header).map_err(|e| SimError::io(header, e))?;

        let mut dimensions = None;
        let mut element_size = None;
        let mut offset = [0.0; 3];
        let mut data_type = None;
        let mut data_file = None;
        for (index, line) in text.lines().enumerate() {
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let error = |reason: String| SimError::Parse {
                path: header.to_path_buf(),
                line: index + 1,
                reason,
            };
            let value = value.trim();
            match key.trim() {
                "DimSize" => dimensions = Some(parse_triple::<u32>(value).map_err(error)?),
                "ElementSpacing" => element_size = Some(parse_triple::<f64>(value).map_err(error)?),
                "Offset" => offset = parse_triple::<f64>(value).map_err(error)?,
                "ElementType" => {
                    data_type = Some(
                        VoxelDataType::from_tag(value)
                            .ok_or_else(|| error(format!("unsupported element type {value}")))?,
                    );
                }
                "BinaryDataByteOrderMSB" if value.eq_ignore_ascii_case("true") => {
                    return Err(error("big-endian data is not supported".to_string()));
                }
                "ElementDataFile" => data_file = Some(value.to_string()),
                _ => {}
            }
        }

        let missing = |field: &str| SimError::Parse {
            path: header.to_path_buf(),
            line: 0,
            reason: format!("header has no {field}"),
        };
        let dimensions = dimensions.ok_or_else(|| missing("DimSize"))?;
        let element_size = element_size.ok_or_else(|| missing("ElementSpacing"))?;
        let data_type = data_type.ok_or_else(|| missing("ElementType"))?;
        let data_file = data_file.ok_or_else(|| missing("ElementDataFile"))?;

        let raw = header
            .parent()
            .map(|dir| dir.join(&data_file))
            .unwrap_or_else(|| PathBuf::from(&data_file));
        let bytes = std::fs::read(&raw).map_err(|e| SimError::io(&raw, e))?;

        let image = Self {
            dimensions,
            element_size,
            offset,
            data_type,
            data: bytes
                .chunks_exact(data_type.byte_size())
                .map(|b| data_type.decode(b))
                .collect(),
        };
        let expected = image.voxel_count() * data_type.byte_size();
        if bytes.len() != expected {
            return Err(SimError::Parse {
                path: raw,
                line: 0,
                reason: format!(
                    "expected {expected} bytes of {data_type} data, found {}",
                    bytes.len()
                ),
            });
        }
        Ok(image)
    }
}

fn parse_triple<T: std::str::FromStr>(value: &str) -> Result<[T; 3], String> {
    let mut parts = value.split_whitespace().map(str::parse::<T>);
    match (parts.next(), parts.next(), parts.next(), parts.next()) {
        (Some(Ok(a)), Some(Ok(b)), Some(Ok(c)), None) => Ok([a, b, c]),
        _ => Err(format!("expected three values, got '{value}'")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image() -> VoxelImage {
        VoxelImage {
            dimensions: [3, 2, 2],
            element_size: [0.5, 1.0, 2.0],
            offset: [-0.5, -0.5, -1.0],
            data_type: VoxelDataType::Float,
            data: (0..12).map(|v| v as f32).collect(),
        }
    }

    #[test]
    fn test_write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let header = dir.path().join("phantom.mhd");
        let raw = image().write(&header).unwrap();
        assert_eq!(raw, dir.path().join("phantom.raw"));
        assert_eq!(std::fs::metadata(&raw).unwrap().len(), 48);

        let back = VoxelImage::read(&header).unwrap();
        assert_eq!(back, image());
        assert_eq!(back.get(2, 1, 1), Some(11.0));
        assert_eq!(back.get(3, 0, 0), None);
    }

    #[test]
    fn test_header_contents() {
        let text = image().header_text("phantom.raw");
        assert!(text.contains("DimSize = 3 2 2"));
        assert!(text.contains("ElementType = MET_FLOAT"));
        assert!(text.contains("ElementDataFile = phantom.raw"));
    }

    #[test]
    fn test_integer_types_written_at_their_width() {
        let dir = tempfile::tempdir().unwrap();
        for (data_type, width) in [
            (VoxelDataType::Char, 1),
            (VoxelDataType::UChar, 1),
            (VoxelDataType::Short, 2),
            (VoxelDataType::UShort, 2),
            (VoxelDataType::Int, 4),
            (VoxelDataType::UInt, 4),
        ] {
            let header = dir.path().join(format!("{data_type}.mhd"));
            let image = VoxelImage {
                data_type,
                ..image()
            };
            let raw = image.write(&header).unwrap();
            assert_eq!(std::fs::metadata(&raw).unwrap().len(), 12 * width);

            let text = std::fs::read_to_string(&header).unwrap();
            assert!(text.contains(&format!("ElementType = {}", data_type.tag())));
            assert_eq!(VoxelImage::read(&header).unwrap(), image);
        }
    }

    #[test]
    fn test_signed_values_survive() {
        let dir = tempfile::tempdir().unwrap();
        let header = dir.path().join("signed.mhd");
        let mut image = VoxelImage {
            data_type: VoxelDataType::Short,
            ..image()
        };
        image.data[0] = -1000.0;
        image.write(&header).unwrap();
        assert_eq!(VoxelImage::read(&header).unwrap().data[0], -1000.0);
    }

    #[test]
    fn test_unrepresentable_label_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let header = dir.path().join("phantom.mhd");
        let mut image = VoxelImage {
            data_type: VoxelDataType::UChar,
            ..image()
        };
        image.data[3] = 300.0;
        assert!(matches!(
            image.write(&header),
            Err(SimError::UnrepresentableLabel { label, data_type: VoxelDataType::UChar }) if label == 300.0
        ));
        image.data[3] = 1.5;
        assert!(image.write(&header).is_err());
        assert!(!header.exists());
    }

    #[test]
    fn test_data_type_tags() {
        assert!(VoxelDataType::Char.represents(-128.0));
        assert!(!VoxelDataType::Char.represents(128.0));
        assert!(!VoxelDataType::UInt.represents(-1.0));
        assert!(!VoxelDataType::Float.represents(f32::NAN));
        for data_type in VoxelDataType::ALL {
            assert_eq!(VoxelDataType::from_tag(data_type.tag()), Some(data_type));
        }
        assert_eq!(VoxelDataType::from_tag("MET_DOUBLE"), None);
        assert_eq!(VoxelDataType::default(), VoxelDataType::Float);
    }

    #[test]
    fn test_unknown_element_type_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let header = dir.path().join("phantom.mhd");
        image().write(&header).unwrap();
        let text = std::fs::read_to_string(&header).unwrap();
        std::fs::write(&header, text.replace("MET_FLOAT", "MET_DOUBLE")).unwrap();
        assert!(matches!(VoxelImage::read(&header), Err(SimError::Parse { .. })));
    }

    #[test]
    fn test_truncated_raw_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let header = dir.path().join("phantom.mhd");
        let raw = image().write(&header).unwrap();
        std::fs::write(&raw, [0u8; 10]).unwrap();
        assert!(matches!(VoxelImage::read(&header), Err(SimError::Parse { .. })));
    }

    #[test]
    fn test_missing_header() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            VoxelImage::read(dir.path().join("nope.mhd")),
            Err(SimError::Io { .. })
        ));
    }
}
