//! ikonos-toar: IKONOS digital numbers to at-sensor radiance and
//! top-of-atmosphere reflectance
//!
//! Converts the quantized digital numbers of IKONOS multispectral and
//! panchromatic bands into spectral radiance and, by default, planetary
//! reflectance, using the published per-band calibration coefficients,
//! bandwidths and mean solar exoatmospheric irradiances.

pub mod types;
pub mod io;
pub mod core;

// Re-export main types and functions for easier access
pub use types::{GeoTransform, RasterGrid, RasterMetadata, Region, ToarError, ToarResult};

pub use io::{bare_name, MemoryEngine, RasterEngine};
#[cfg(feature = "gdal")]
pub use io::GeoTiffWorkspace;

pub use crate::core::{
    AcquisitionContext, AcquisitionInputs, BandParameterTable, CalibrationParams,
    CalibrationPipeline, ConversionRequest,
};
