use ndarray::Array2;
use serde::{Deserialize, Serialize};

/// Real-valued raster cell
pub type RasterValue = f64;

/// 2D raster grid (rows x cols)
pub type RasterGrid = Array2<RasterValue>;

/// Active computational region: grid size plus GDAL-style geotransform
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Region {
    pub rows: usize,
    pub cols: usize,
    pub geo_transform: GeoTransform,
}

impl Region {
    pub fn new(rows: usize, cols: usize, geo_transform: GeoTransform) -> Self {
        Self {
            rows,
            cols,
            geo_transform,
        }
    }

    /// Region with unit pixels anchored at the origin
    pub fn unit(rows: usize, cols: usize) -> Self {
        Self::new(rows, cols, GeoTransform::default())
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }
}

/// Geospatial transformation parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoTransform {
    pub top_left_x: f64,
    pub pixel_width: f64,
    pub rotation_x: f64,
    pub top_left_y: f64,
    pub rotation_y: f64,
    pub pixel_height: f64,
}

impl Default for GeoTransform {
    fn default() -> Self {
        Self {
            top_left_x: 0.0,
            pixel_width: 1.0,
            rotation_x: 0.0,
            top_left_y: 0.0,
            rotation_y: 0.0,
            pixel_height: -1.0,
        }
    }
}

impl From<[f64; 6]> for GeoTransform {
    fn from(gt: [f64; 6]) -> Self {
        Self {
            top_left_x: gt[0],
            pixel_width: gt[1],
            rotation_x: gt[2],
            top_left_y: gt[3],
            rotation_y: gt[4],
            pixel_height: gt[5],
        }
    }
}

impl From<GeoTransform> for [f64; 6] {
    fn from(gt: GeoTransform) -> Self {
        [
            gt.top_left_x,
            gt.pixel_width,
            gt.rotation_x,
            gt.top_left_y,
            gt.rotation_y,
            gt.pixel_height,
        ]
    }
}

/// Descriptive record attached to a persisted raster layer
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RasterMetadata {
    pub title: String,
    pub units: String,
    pub description: String,
    pub sources: Vec<String>,
    pub history: String,
}

/// Error types for radiometric calibration
#[derive(Debug, thiserror::Error)]
pub enum ToarError {
    #[error("Missing acquisition metadata: either a UTC timestamp or a day of year is required")]
    MissingMetadata,

    #[error("Unknown spectral band: {0}")]
    UnknownBand(String),

    #[error("Degenerate calibration parameter for band {band}: {parameter} is zero")]
    DegenerateParameter {
        band: String,
        parameter: &'static str,
    },

    #[error("Degenerate conversion input: {0} is zero")]
    DegenerateInput(&'static str),

    #[error("Invalid acquisition timestamp: {0}")]
    InvalidTimestamp(String),

    #[error("Day of year out of range (1-366): {0}")]
    InvalidDayOfYear(u32),

    #[error("Output {output} for {second} clashes with {first}")]
    OutputCollision {
        first: String,
        second: String,
        output: String,
    },

    #[error("Output raster already exists: {0}")]
    OutputExists(String),

    #[error("Raster layer not found: {0}")]
    LayerNotFound(String),

    #[error("Raster {layer} is {actual:?}, active region is {expected:?}")]
    RegionMismatch {
        layer: String,
        expected: (usize, usize),
        actual: (usize, usize),
    },

    #[error("Raster engine error: {0}")]
    Raster(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid layer pattern: {0}")]
    Pattern(#[from] glob::PatternError),

    #[cfg(feature = "gdal")]
    #[error("GDAL error: {0}")]
    Gdal(#[from] gdal::errors::GdalError),
}

/// Result type for calibration operations
pub type ToarResult<T> = Result<T, ToarError>;
