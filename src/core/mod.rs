//! Core radiometric calibration modules

pub mod acquisition;
pub mod band_params;
pub mod expression;
pub mod pipeline;
pub mod radiometry;
pub mod session;

// Re-export main types
pub use acquisition::{AcquisitionContext, AcquisitionInputs};
pub use band_params::{
    BandCalibration, BandParameterTable, BandSpectralParameters, CALIBRATION_UPDATE_DATE,
    IKONOS_BANDS,
};
pub use expression::{Assignment, BinaryOp, Expr, Function};
pub use pipeline::{CalibrationParams, CalibrationPipeline, ConversionRequest, ConversionResult};
pub use radiometry::{to_radiance, to_reflectance};
pub use session::EngineSession;
