use ndarray::{Array2, Array3};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Pixel values of a single band (height x width)
pub type Grid = Array2<f32>;

/// Channel-ordered stack of grids (channel x height x width)
pub type Volume = Array3<f32>;

/// Affine transform mapping pixel to georeferenced coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoTransform {
    pub top_left_x: f64,
    pub pixel_width: f64,
    pub rotation_x: f64,
    pub top_left_y: f64,
    pub rotation_y: f64,
    pub pixel_height: f64,
}

impl GeoTransform {
    /// Build from GDAL's six-coefficient layout
    pub fn from_gdal(gt: [f64; 6]) -> Self {
        Self {
            top_left_x: gt[0],
            pixel_width: gt[1],
            rotation_x: gt[2],
            top_left_y: gt[3],
            rotation_y: gt[4],
            pixel_height: gt[5],
        }
    }

    /// Convert back to GDAL's six-coefficient layout
    pub fn to_gdal(&self) -> [f64; 6] {
        [
            self.top_left_x,
            self.pixel_width,
            self.rotation_x,
            self.top_left_y,
            self.rotation_y,
            self.pixel_height,
        ]
    }
}

impl Default for GeoTransform {
    fn default() -> Self {
        // GDAL's identity transform for rasters without georeferencing
        Self::from_gdal([0.0, 1.0, 0.0, 0.0, 0.0, 1.0])
    }
}

/// Storage type of raster pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RasterDataType {
    UInt8,
    UInt16,
    Int16,
    UInt32,
    Int32,
    Float32,
    Float64,
    Other,
}

impl std::fmt::Display for RasterDataType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RasterDataType::UInt8 => write!(f, "uint8"),
            RasterDataType::UInt16 => write!(f, "uint16"),
            RasterDataType::Int16 => write!(f, "int16"),
            RasterDataType::UInt32 => write!(f, "uint32"),
            RasterDataType::Int32 => write!(f, "int32"),
            RasterDataType::Float32 => write!(f, "float32"),
            RasterDataType::Float64 => write!(f, "float64"),
            RasterDataType::Other => write!(f, "other"),
        }
    }
}

/// Grid metadata of a raster file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpatialProfile {
    pub width: usize,
    pub height: usize,
    /// Coordinate reference system as WKT (empty when the raster has none)
    pub crs_wkt: String,
    pub geo_transform: GeoTransform,
    pub data_type: RasterDataType,
    pub nodata: Option<f64>,
    pub band_count: usize,
}

impl SpatialProfile {
    /// Grid shape in ndarray order (height, width)
    pub fn shape(&self) -> (usize, usize) {
        (self.height, self.width)
    }

    /// True when both profiles describe the same pixel grid on the ground
    pub fn same_grid(&self, other: &SpatialProfile) -> bool {
        self.width == other.width
            && self.height == other.height
            && self.crs_wkt == other.crs_wkt
            && self.geo_transform == other.geo_transform
    }
}

/// One single-band raster feeding a stack
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BandSource {
    /// Logical name, e.g. "before_B2.tif"
    pub name: String,
    pub path: PathBuf,
    /// Position of this band in the assembled stack
    pub channel: usize,
}

/// Error types for band stacking and inference
#[derive(Debug, thiserror::Error)]
pub enum StackError {
    #[error("Missing input: only {found} raster files found in {directory}, need {required}")]
    MissingInput {
        directory: PathBuf,
        found: usize,
        required: usize,
    },

    #[error("Failed to read band {path}: {reason}")]
    BandRead { path: PathBuf, reason: String },

    #[error("Channel count error: expected {expected} grids, got {actual}")]
    ChannelCount { expected: usize, actual: usize },

    #[error("Model expects {expected} channels, got {actual}")]
    ChannelMismatch { expected: usize, actual: usize },

    #[error("Degenerate input: {0}")]
    DegenerateInput(String),

    #[error("Failed to write {path}: {reason}")]
    Persistence { path: PathBuf, reason: String },

    #[error("Shape mismatch: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        expected: (usize, usize),
        actual: (usize, usize),
    },

    #[error("Model error: {0}")]
    Model(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("GDAL error: {0}")]
    Gdal(#[from] gdal::errors::GdalError),
}

/// Result type for stacking and inference operations
pub type StackResult<T> = Result<T, StackError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_geo_transform_gdal_layout() {
        let gt = [500000.0, 10.0, 0.0, 4600000.0, 0.0, -10.0];
        let transform = GeoTransform::from_gdal(gt);
        assert_eq!(transform.pixel_width, 10.0);
        assert_eq!(transform.pixel_height, -10.0);
        assert_eq!(transform.to_gdal(), gt);
    }

    #[test]
    fn test_same_grid_ignores_band_metadata() {
        let profile = SpatialProfile {
            width: 4,
            height: 3,
            crs_wkt: "LOCAL_CS[\"test\"]".to_string(),
            geo_transform: GeoTransform::default(),
            data_type: RasterDataType::UInt16,
            nodata: None,
            band_count: 1,
        };
        let mut other = profile.clone();
        other.data_type = RasterDataType::Float32;
        other.band_count = 9;
        other.nodata = Some(0.0);
        assert!(profile.same_grid(&other));

        other.geo_transform.top_left_x = 1.0;
        assert!(!profile.same_grid(&other));
    }

    #[test]
    fn test_missing_input_message_names_counts() {
        let err = StackError::MissingInput {
            directory: PathBuf::from("/data/bands"),
            found: 8,
            required: 9,
        };
        let message = err.to_string();
        assert!(message.contains("only 8"));
        assert!(message.contains("need 9"));
    }
}
