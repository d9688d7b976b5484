//! Convert IKONOS digital numbers to at-sensor radiance or top-of-atmosphere
//! reflectance.
//!
//! Usage:
//! ```
//! ikonos-toar --workspace scene/ --band Blue,Green,Red,NIR \
//!     --utc "2005-06-15 10:30 GMT" --sea 52.7888
//! ikonos-toar --workspace scene/ --band Pan --doy 166 --sea 52.7888 -r
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use ikonos_toar::core::{
    AcquisitionInputs, CalibrationParams, CalibrationPipeline, ConversionRequest,
};
use ikonos_toar::io::GeoTiffWorkspace;

#[derive(Parser)]
#[command(name = "ikonos-toar")]
#[command(
    about = "Converts IKONOS digital numbers to spectral radiance or top-of-atmosphere reflectance"
)]
#[command(version)]
struct Args {
    /// Directory holding one GeoTIFF per band
    #[arg(short, long, value_name = "DIR")]
    workspace: String,

    /// Bands to process, named after their raster layers
    #[arg(short, long, value_delimiter = ',', required = true)]
    band: Vec<String>,

    /// Suffix appended to each output layer name
    #[arg(short, long, default_value = "toar")]
    suffix: String,

    /// Acquisition timestamp (UTC)
    #[arg(long, value_name = "TIMESTAMP")]
    utc: Option<String>,

    /// Day of year of acquisition; overrides the one derived from --utc
    #[arg(long, value_name = "DAY")]
    doy: Option<u32>,

    /// Sun elevation angle in degrees
    #[arg(long, value_name = "DEGREES", allow_negative_numbers = true)]
    sea: f64,

    /// Convert to at-sensor radiance only
    #[arg(short, long)]
    radiance: bool,

    /// Use the current region instead of each band's grid
    #[arg(short, long)]
    keep_region: bool,

    /// Replace existing output layers
    #[arg(long)]
    overwrite: bool,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut workspace = GeoTiffWorkspace::open(&args.workspace)
        .with_context(|| format!("Cannot open workspace {}", args.workspace))?;

    let params = CalibrationParams {
        output_suffix: args.suffix,
        radiance_only: args.radiance,
        keep_region: args.keep_region,
        overwrite: args.overwrite,
    };
    let acquisition = AcquisitionInputs {
        utc: args.utc,
        day_of_year: args.doy,
        sun_elevation_deg: args.sea,
    };
    let requests: Vec<ConversionRequest> = args
        .band
        .iter()
        .map(|b| ConversionRequest::from_source(b.trim()))
        .collect();

    let pipeline = CalibrationPipeline::new(params);
    let outputs = pipeline
        .run(&mut workspace, &requests, &acquisition)
        .context("Calibration failed")?;

    for output in outputs {
        println!("{}", workspace.layer_path(&output).display());
    }
    Ok(())
}
