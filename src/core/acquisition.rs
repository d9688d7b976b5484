//! Scene acquisition geometry
//!
//! Derives the Earth-Sun distance and the solar zenith angle once per
//! scene from the image metadata (acquisition time and sun elevation).

use crate::types::{ToarError, ToarResult};
use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Eccentricity term of the Earth's orbit used by the distance approximation
const ORBIT_ECCENTRICITY: f64 = 0.01672;

/// Day of year of perihelion (early January)
const PERIHELION_DOY: f64 = 4.0;

/// Year length when only a day of year is known: a common year
const COMMON_YEAR_DAYS: f64 = 365.0;

/// Julian date of the Unix epoch
const UNIX_EPOCH_JD: f64 = 2_440_587.5;

const NAIVE_FORMATS: [&str; 3] = [
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];

/// Raw scene metadata as supplied by the caller
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AcquisitionInputs {
    /// Acquisition timestamp (UTC)
    pub utc: Option<String>,
    /// Day of year; overrides the one derived from `utc`
    pub day_of_year: Option<u32>,
    /// Sun elevation angle in degrees, expected in [0, 90]
    pub sun_elevation_deg: f64,
}

impl AcquisitionInputs {
    pub fn resolve(&self) -> ToarResult<AcquisitionContext> {
        AcquisitionContext::resolve(self.utc.as_deref(), self.day_of_year, self.sun_elevation_deg)
    }
}

/// Per-scene solar geometry, computed once and reused for every band
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AcquisitionContext {
    utc: Option<DateTime<Utc>>,
    day_of_year: u32,
    sun_elevation_deg: f64,
    earth_sun_distance: f64,
    solar_zenith_deg: f64,
}

impl AcquisitionContext {
    /// Resolve the scene geometry from a UTC timestamp string and/or a day of year.
    ///
    /// A supplied day of year takes precedence over the one derived from the
    /// timestamp. At least one of the two is required.
    pub fn resolve(
        utc: Option<&str>,
        day_of_year: Option<u32>,
        sun_elevation_deg: f64,
    ) -> ToarResult<Self> {
        let utc = utc.map(parse_utc).transpose()?;
        Self::from_parts(utc, day_of_year, sun_elevation_deg)
    }

    pub fn from_parts(
        utc: Option<DateTime<Utc>>,
        day_of_year: Option<u32>,
        sun_elevation_deg: f64,
    ) -> ToarResult<Self> {
        let (doy, year_days) = match (day_of_year, utc) {
            (Some(doy), utc) => {
                if !(1..=366).contains(&doy) {
                    return Err(ToarError::InvalidDayOfYear(doy));
                }
                let year_days = utc.map_or(COMMON_YEAR_DAYS, |t| days_in_year(t.year()));
                (doy, year_days)
            }
            (None, Some(t)) => {
                let jd = julian_day(&t);
                log::debug!("Acquisition {} -> Julian day {:.5}", t.to_rfc3339(), jd);
                (day_of_year_from_julian(jd, t.year()), days_in_year(t.year()))
            }
            (None, None) => return Err(ToarError::MissingMetadata),
        };

        if !(0.0..=90.0).contains(&sun_elevation_deg) {
            log::warn!(
                "Sun elevation {} deg is outside the expected range [0, 90]",
                sun_elevation_deg
            );
        }

        let earth_sun_distance = earth_sun_distance(doy, year_days);
        let solar_zenith_deg = solar_zenith_angle(sun_elevation_deg);

        log::info!(
            "Acquisition geometry: DOY={}, ESD={:.7} AU, SZA={:.4} deg",
            doy,
            earth_sun_distance,
            solar_zenith_deg
        );

        Ok(Self {
            utc,
            day_of_year: doy,
            sun_elevation_deg,
            earth_sun_distance,
            solar_zenith_deg,
        })
    }

    /// Context with an explicit Earth-Sun distance, e.g. a value taken from
    /// an ephemeris table rather than the orbital approximation
    pub fn with_earth_sun_distance(mut self, esd: f64) -> Self {
        self.earth_sun_distance = esd;
        self
    }

    pub fn utc(&self) -> Option<DateTime<Utc>> {
        self.utc
    }

    /// Calendar date of the acquisition, when a timestamp was supplied
    pub fn acquisition_date(&self) -> Option<NaiveDate> {
        self.utc.map(|t| t.date_naive())
    }

    pub fn julian_day(&self) -> Option<f64> {
        self.utc.as_ref().map(julian_day)
    }

    pub fn day_of_year(&self) -> u32 {
        self.day_of_year
    }

    pub fn sun_elevation_deg(&self) -> f64 {
        self.sun_elevation_deg
    }

    /// Earth-Sun distance in astronomical units
    pub fn earth_sun_distance(&self) -> f64 {
        self.earth_sun_distance
    }

    /// Solar zenith angle in degrees
    pub fn solar_zenith_deg(&self) -> f64 {
        self.solar_zenith_deg
    }
}

/// Parse an acquisition timestamp.
///
/// Accepts RFC 3339, `YYYY-MM-DD HH:MM:SS[.f]` (space or `T` separated),
/// `YYYY-MM-DD HH:MM` with an optional `GMT`/`UTC` suffix as found in
/// IKONOS metadata files, and a bare `YYYY-MM-DD`.
pub fn parse_utc(value: &str) -> ToarResult<DateTime<Utc>> {
    let value = value.trim();

    if let Ok(t) = DateTime::parse_from_rfc3339(value) {
        return Ok(t.with_timezone(&Utc));
    }

    let naive = value
        .strip_suffix("GMT")
        .or_else(|| value.strip_suffix("UTC"))
        .or_else(|| value.strip_suffix('Z'))
        .map(str::trim_end)
        .unwrap_or(value);

    for format in NAIVE_FORMATS {
        if let Ok(t) = NaiveDateTime::parse_from_str(naive, format) {
            return Ok(t.and_utc());
        }
    }

    NaiveDate::parse_from_str(naive, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|t| t.and_utc())
        .ok_or_else(|| ToarError::InvalidTimestamp(value.to_string()))
}

/// Astronomical Julian date (days since 4713 BC January 1, 12:00)
pub fn julian_day(t: &DateTime<Utc>) -> f64 {
    t.timestamp_millis() as f64 / 86_400_000.0 + UNIX_EPOCH_JD
}

/// Day of year of a Julian date within the given calendar year
pub fn day_of_year_from_julian(jd: f64, year: i32) -> u32 {
    let jan1 = NaiveDate::from_ymd_opt(year, 1, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|t| julian_day(&t.and_utc()))
        .unwrap_or(jd);
    ((jd - jan1).floor() as i64 + 1).clamp(1, 366) as u32
}

pub fn days_in_year(year: i32) -> f64 {
    if NaiveDate::from_ymd_opt(year, 2, 29).is_some() {
        366.0
    } else {
        365.0
    }
}

/// Earth-Sun distance (AU) from the first-order eccentricity approximation
pub fn earth_sun_distance(day_of_year: u32, year_days: f64) -> f64 {
    1.0 - ORBIT_ECCENTRICITY * (2.0 * PI * (day_of_year as f64 - PERIHELION_DOY) / year_days).cos()
}

pub fn solar_zenith_angle(sun_elevation_deg: f64) -> f64 {
    90.0 - sun_elevation_deg
}
