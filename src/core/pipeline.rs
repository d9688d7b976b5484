//! Per-scene calibration run
//!
//! Every requested band is planned up front (parameter lookup, output
//! naming, collision checks) so that configuration errors abort the run
//! before any raster is written. Bands are then converted and persisted one
//! at a time; a band's output is renamed into place before the next band
//! starts.

use crate::core::acquisition::{AcquisitionContext, AcquisitionInputs};
use crate::core::band_params::{BandCalibration, BandParameterTable, CALIBRATION_UPDATE_DATE};
use crate::core::expression::Assignment;
use crate::core::radiometry::{
    radiance_expression, reflectance_expression, RADIANCE_UNITS, REFLECTANCE_UNITS,
};
use crate::core::session::EngineSession;
use crate::io::{bare_name, RasterEngine};
use crate::types::{RasterMetadata, ToarError, ToarResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub const TAYLOR_CITATION: &str =
    "\"IKONOS Planetary Reflectance and Mean Solar Exoatmospheric Irradiance\", by Martin Taylor, Geoeye";
pub const ESUN_CITATION: &str = "USGS via Digital Globe";

/// Run-wide options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationParams {
    /// Appended to the bare band name to form the output layer name
    pub output_suffix: String,
    /// Stop after spectral radiance
    pub radiance_only: bool,
    /// Leave the caller's region alone instead of aligning to each band
    pub keep_region: bool,
    /// Replace output layers that already exist
    pub overwrite: bool,
}

impl Default for CalibrationParams {
    fn default() -> Self {
        Self {
            output_suffix: "toar".to_string(),
            radiance_only: false,
            keep_region: false,
            overwrite: false,
        }
    }
}

/// One band to convert
#[derive(Debug, Clone, PartialEq)]
pub struct ConversionRequest {
    /// Name in the band parameter table
    pub band: String,
    /// Source DN raster
    pub source: String,
    pub radiance_only: bool,
}

impl ConversionRequest {
    pub fn new(band: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            band: band.into(),
            source: source.into(),
            radiance_only: false,
        }
    }

    /// Request for a raster named after its band, e.g. `Red` or `Red@PERMANENT`
    pub fn from_source(source: &str) -> Self {
        Self::new(bare_name(source), source)
    }

    pub fn radiance_only(mut self, radiance_only: bool) -> Self {
        self.radiance_only = radiance_only;
        self
    }
}

/// Layers produced for one band, before they are persisted
#[derive(Debug, Clone, PartialEq)]
pub struct ConversionResult {
    pub band: String,
    pub radiance: String,
    pub reflectance: Option<String>,
    /// Record for the final artifact
    pub metadata: RasterMetadata,
}

impl ConversionResult {
    /// Reflectance when it was computed, radiance otherwise
    pub fn final_layer(&self) -> &str {
        self.reflectance.as_deref().unwrap_or(&self.radiance)
    }
}

#[derive(Debug, Clone)]
struct BandPlan {
    source: String,
    calibration: BandCalibration,
    output: String,
    radiance_only: bool,
}

pub struct CalibrationPipeline {
    table: BandParameterTable,
    params: CalibrationParams,
}

impl CalibrationPipeline {
    pub fn new(params: CalibrationParams) -> Self {
        Self::with_table(BandParameterTable::ikonos(), params)
    }

    pub fn with_table(table: BandParameterTable, params: CalibrationParams) -> Self {
        Self { table, params }
    }

    pub fn params(&self) -> &CalibrationParams {
        &self.params
    }

    /// Calibrate every requested band and return the persisted output names,
    /// in request order.
    pub fn run<E: RasterEngine>(
        &self,
        engine: &mut E,
        requests: &[ConversionRequest],
        acquisition: &AcquisitionInputs,
    ) -> ToarResult<Vec<String>> {
        let context = acquisition.resolve()?;
        self.run_with_context(engine, requests, &context)
    }

    pub fn run_with_context<E: RasterEngine>(
        &self,
        engine: &mut E,
        requests: &[ConversionRequest],
        acquisition: &AcquisitionContext,
    ) -> ToarResult<Vec<String>> {
        if requests.is_empty() {
            log::warn!("No spectral bands requested");
            return Ok(Vec::new());
        }

        let plans = self.plan(engine, requests, acquisition)?;
        log::info!(
            "Spectral bands to be processed: {}",
            plans
                .iter()
                .map(|p| p.calibration.name)
                .collect::<Vec<_>>()
                .join(", ")
        );

        let mut session = EngineSession::new(engine);
        if !self.params.keep_region {
            session.save_region();
        }

        let mut outputs = Vec::with_capacity(plans.len());
        for plan in &plans {
            log::info!("Processing the {} spectral band", plan.calibration.name);

            if !self.params.keep_region {
                session.align_region_to(&plan.source)?;
            }

            let result = self.convert_band(&mut session, plan, acquisition)?;
            outputs.push(self.persist(&mut session, plan, &result)?);
        }

        Ok(outputs)
    }

    fn plan<E: RasterEngine>(
        &self,
        engine: &E,
        requests: &[ConversionRequest],
        acquisition: &AcquisitionContext,
    ) -> ToarResult<Vec<BandPlan>> {
        // Without a calendar date, the current (post-update) coefficients apply
        let date = acquisition
            .acquisition_date()
            .unwrap_or(CALIBRATION_UPDATE_DATE);

        // An output may not replace another output or any band's input
        let sources: HashMap<&str, &str> = requests
            .iter()
            .map(|r| (bare_name(&r.source), r.source.as_str()))
            .collect();
        let mut claimed: HashMap<String, &str> = HashMap::new();
        let mut plans = Vec::with_capacity(requests.len());

        for request in requests {
            let calibration = self.table.lookup(&request.band, date)?;
            calibration.validate()?;

            let output = format!(
                "{}.{}",
                bare_name(&request.source),
                self.params.output_suffix
            );
            let clash = sources
                .get(output.as_str())
                .copied()
                .or_else(|| claimed.get(&output).copied());
            if let Some(first) = clash {
                return Err(ToarError::OutputCollision {
                    first: first.to_string(),
                    second: request.source.clone(),
                    output,
                });
            }
            claimed.insert(output.clone(), &request.source);

            if !engine.exists(&request.source) {
                return Err(ToarError::LayerNotFound(request.source.clone()));
            }
            if !self.params.overwrite && engine.exists(&output) {
                return Err(ToarError::OutputExists(output));
            }

            plans.push(BandPlan {
                source: request.source.clone(),
                calibration,
                output,
                radiance_only: self.params.radiance_only || request.radiance_only,
            });
        }

        Ok(plans)
    }

    fn convert_band<E: RasterEngine>(
        &self,
        session: &mut EngineSession<'_, E>,
        plan: &BandPlan,
        acquisition: &AcquisitionContext,
    ) -> ToarResult<ConversionResult> {
        let band = &plan.calibration;
        let bare = bare_name(&plan.source);
        log::debug!("Band Parameters: {}", band);

        log::info!(
            "Conversion to Radiance: L(λ) = 10^4 • DN(λ) / CalCoef(λ) • Bandwidth(λ)"
        );
        let radiance = session.temp_name(&[bare, "radiance"]);
        let radiance_calc = Assignment::new(&radiance, radiance_expression(&plan.source, band));
        session.evaluate(&radiance_calc)?;

        if plan.radiance_only {
            return Ok(ConversionResult {
                band: band.name.to_string(),
                metadata: radiance_metadata(band, &radiance_calc),
                radiance,
                reflectance: None,
            });
        }

        log::info!(
            "Conversion to Top-of-Atmosphere Reflectance: ρ(p) = π • L(λ) • d^2 / ESUN(λ) • cos(θ(S))"
        );
        let esd = acquisition.earth_sun_distance();
        let sza = acquisition.solar_zenith_deg();
        let reflectance = session.temp_name(&[bare, "reflectance"]);
        let reflectance_calc = Assignment::new(
            &reflectance,
            reflectance_expression(&radiance, esd, band.esun, sza),
        );
        session.evaluate(&reflectance_calc)?;

        Ok(ConversionResult {
            band: band.name.to_string(),
            metadata: reflectance_metadata(band, &reflectance_calc, esd, sza),
            radiance,
            reflectance: Some(reflectance),
        })
    }

    fn persist<E: RasterEngine>(
        &self,
        session: &mut EngineSession<'_, E>,
        plan: &BandPlan,
        result: &ConversionResult,
    ) -> ToarResult<String> {
        let final_layer = result.final_layer();
        session.set_metadata(final_layer, &result.metadata)?;
        session.rename(final_layer, &plan.output)?;

        if result.reflectance.is_some() {
            session.discard(&result.radiance)?;
        }

        log::info!("✅ {} band written to {}", result.band, plan.output);
        Ok(plan.output.clone())
    }
}

fn radiance_metadata(band: &BandCalibration, calc: &Assignment) -> RasterMetadata {
    RasterMetadata {
        title: format!("{} band (At-sensor Radiance)", band.name),
        units: RADIANCE_UNITS.to_string(),
        description: format!(
            "At-sensor {} band spectral Radiance (W/m2/μm/sr)",
            band.name
        ),
        sources: vec![TAYLOR_CITATION.to_string()],
        history: format!(
            "{}; CalCoef={}; Bandwidth={}",
            calc, band.coefficient, band.bandwidth
        ),
    }
}

fn reflectance_metadata(
    band: &BandCalibration,
    calc: &Assignment,
    esd: f64,
    sza: f64,
) -> RasterMetadata {
    RasterMetadata {
        title: format!("{} band (Top of Atmosphere Reflectance)", band.name),
        units: REFLECTANCE_UNITS.to_string(),
        description: format!(
            "Top of Atmosphere {} band spectral Reflectance (unitless)",
            band.name
        ),
        sources: vec![TAYLOR_CITATION.to_string(), ESUN_CITATION.to_string()],
        history: format!(
            "{}; ESD={}; BAND_Esun={}; SZA={}",
            calc, esd, band.esun, sza
        ),
    }
}
