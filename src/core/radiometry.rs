//! DN → spectral radiance → TOA reflectance
//!
//! Spectral radiance at the sensor's aperture, in W/(m2·sr·μm):
//!
//! ```text
//! L(λ) = 10^4 • DN(λ) / CalCoef(λ) • Bandwidth(λ)
//! ```
//!
//! Planetary (top-of-atmosphere) reflectance, unitless:
//!
//! ```text
//! ρ(p) = π • L(λ) • d^2 / ESUN(λ) • cos(θs)
//! ```
//!
//! Both are evaluated literally left to right. The scalar functions here and
//! the raster expressions built alongside them apply the same operations in
//! the same order, so a pixel computed by an engine is bit-identical to the
//! scalar result.

use crate::core::band_params::BandCalibration;
use crate::core::expression::Expr;
use crate::types::{ToarError, ToarResult};
use std::f64::consts::PI;

/// Scale factor between DN/(mW/cm2-sr) coefficients and W/m2 radiance
pub const RADIANCE_SCALE: f64 = 10_000.0;

pub const RADIANCE_UNITS: &str = "W / m2 / μm / ster";
pub const REFLECTANCE_UNITS: &str = "Unitless planetary reflectance";

/// Cosine of the solar zenith angle given in degrees.
///
/// Every reflectance computation goes through this function, including the
/// `cos()` of raster expressions.
pub fn zenith_cosine(sza_deg: f64) -> f64 {
    sza_deg.to_radians().cos()
}

pub fn to_radiance(dn: f64, calibration_coefficient: f64, bandwidth: f64) -> ToarResult<f64> {
    if calibration_coefficient == 0.0 {
        return Err(ToarError::DegenerateInput("calibration coefficient"));
    }
    Ok(RADIANCE_SCALE * dn / calibration_coefficient * bandwidth)
}

pub fn to_reflectance(radiance: f64, esd: f64, esun: f64, sza_deg: f64) -> ToarResult<f64> {
    if esun == 0.0 {
        return Err(ToarError::DegenerateInput("Esun"));
    }
    Ok(PI * radiance * esd.powf(2.0) / esun * zenith_cosine(sza_deg))
}

/// Raster expression for [`to_radiance`] over the `dn` layer
pub fn radiance_expression(dn: &str, band: &BandCalibration) -> Expr {
    Expr::constant(RADIANCE_SCALE)
        .mul(Expr::raster(dn))
        .div(Expr::constant(band.coefficient))
        .mul(Expr::constant(band.bandwidth))
}

/// Raster expression for [`to_reflectance`] over the `radiance` layer
pub fn reflectance_expression(radiance: &str, esd: f64, esun: f64, sza_deg: f64) -> Expr {
    Expr::constant(PI)
        .mul(Expr::raster(radiance))
        .mul(Expr::constant(esd).pow(Expr::constant(2.0)))
        .div(Expr::constant(esun))
        .mul(Expr::constant(sza_deg).cos())
}
