//! IKONOS band calibration constants
//!
//! Source: "IKONOS Planetary Reflectance and Mean Solar Exoatmospheric
//! Irradiance", Martin Taylor, GeoEye. Calibration coefficients are in
//! DN/(mW/cm2-sr), bandwidths in nm, Esun in W/m2/μm.

use crate::types::{ToarError, ToarResult};
use chrono::NaiveDate;
use serde::Serialize;
use std::fmt::Display;

/// Date of the IKONOS radiometric calibration update
pub const CALIBRATION_UPDATE_DATE: NaiveDate = match NaiveDate::from_ymd_opt(2001, 2, 22) {
    Some(date) => date,
    None => panic!("invalid calibration update date"),
};

/// Per-band calibration constants
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BandSpectralParameters {
    pub name: &'static str,
    /// Calibration coefficient for acquisitions before the update
    pub cc_pre: f64,
    /// Calibration coefficient for acquisitions on or after the update
    pub cc_post: f64,
    /// Effective bandwidth (nm)
    pub bandwidth: f64,
    /// Mean solar exoatmospheric irradiance (W/m2/μm)
    pub esun: f64,
}

// Pan is TDI-13
#[rustfmt::skip]
pub const IKONOS_BANDS: [BandSpectralParameters; 5] = [
    BandSpectralParameters { name: "Pan", cc_pre: 161.0, cc_post: 161.0, bandwidth: 403.0, esun: 1375.8 },
    BandSpectralParameters { name: "Blue", cc_pre: 633.0, cc_post: 728.0, bandwidth: 71.3, esun: 1930.9 },
    BandSpectralParameters { name: "Green", cc_pre: 649.0, cc_post: 727.0, bandwidth: 88.6, esun: 1854.8 },
    BandSpectralParameters { name: "Red", cc_pre: 840.0, cc_post: 949.0, bandwidth: 65.8, esun: 1556.5 },
    BandSpectralParameters { name: "NIR", cc_pre: 746.0, cc_post: 843.0, bandwidth: 95.4, esun: 1156.9 },
];

impl BandSpectralParameters {
    /// Coefficient in effect on the given acquisition date
    pub fn coefficient_for(&self, acquisition_date: NaiveDate) -> f64 {
        if acquisition_date < CALIBRATION_UPDATE_DATE {
            self.cc_pre
        } else {
            self.cc_post
        }
    }
}

/// Band parameters with the date-dependent coefficient already chosen
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BandCalibration {
    pub name: &'static str,
    pub coefficient: f64,
    pub bandwidth: f64,
    pub esun: f64,
}

impl BandCalibration {
    /// Reject parameters that would make the conversion formulas undefined
    pub fn validate(&self) -> ToarResult<()> {
        if self.coefficient == 0.0 {
            return Err(ToarError::DegenerateParameter {
                band: self.name.to_string(),
                parameter: "calibration coefficient",
            });
        }
        if self.esun == 0.0 {
            return Err(ToarError::DegenerateParameter {
                band: self.name.to_string(),
                parameter: "Esun",
            });
        }
        Ok(())
    }
}

/// Registry of per-band calibration constants
#[derive(Debug, Clone)]
pub struct BandParameterTable {
    bands: Vec<BandSpectralParameters>,
}

impl Default for BandParameterTable {
    fn default() -> Self {
        Self::ikonos()
    }
}

impl BandParameterTable {
    pub fn new(bands: Vec<BandSpectralParameters>) -> Self {
        Self { bands }
    }

    /// The published IKONOS table
    pub fn ikonos() -> Self {
        Self::new(IKONOS_BANDS.to_vec())
    }

    pub fn bands(&self) -> &[BandSpectralParameters] {
        &self.bands
    }

    /// Registered parameters for a band, matched case-insensitively
    pub fn get(&self, band_name: &str) -> ToarResult<&BandSpectralParameters> {
        self.bands
            .iter()
            .find(|b| b.name.eq_ignore_ascii_case(band_name))
            .ok_or_else(|| ToarError::UnknownBand(band_name.to_string()))
    }

    pub fn lookup(
        &self,
        band_name: &str,
        acquisition_date: NaiveDate,
    ) -> ToarResult<BandCalibration> {
        let params = self.get(band_name)?;
        Ok(BandCalibration {
            name: params.name,
            coefficient: params.coefficient_for(acquisition_date),
            bandwidth: params.bandwidth,
            esun: params.esun,
        })
    }
}

impl Display for BandCalibration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}: Calibration Coefficient={}, Bandwidth={}, Esun={}",
            self.name, self.coefficient, self.bandwidth, self.esun
        )
    }
}
