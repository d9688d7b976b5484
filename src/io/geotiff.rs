use super::{bare_name, RasterEngine};
use crate::core::expression::Assignment;
use crate::types::{RasterGrid, RasterMetadata, Region, ToarError, ToarResult};
use gdal::raster::Buffer;
use gdal::spatial_ref::SpatialRef;
use gdal::{Dataset, DatasetOptions, DriverManager, GdalOpenFlags, Metadata};
use glob::Pattern;
use ndarray::Array2;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

const LAYER_EXTENSION: &str = "tif";

/// Raster engine over a directory of single-band GeoTIFF layers.
///
/// Layer `name` lives in `<root>/name.tif`. Metadata records are stored as
/// GDAL metadata items (TITLE, UNITS, DESCRIPTION, SOURCE1..n, HISTORY).
#[derive(Debug)]
pub struct GeoTiffWorkspace {
    root: PathBuf,
    region: Option<Region>,
}

impl GeoTiffWorkspace {
    pub fn open<P: AsRef<Path>>(root: P) -> ToarResult<Self> {
        let root = root.as_ref().to_path_buf();
        if !root.is_dir() {
            return Err(ToarError::Raster(format!(
                "Workspace is not a directory: {}",
                root.display()
            )));
        }
        log::info!("Opened GeoTIFF workspace: {}", root.display());
        Ok(Self { root, region: None })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn layer_path(&self, layer: &str) -> PathBuf {
        self.root
            .join(format!("{}.{}", bare_name(layer), LAYER_EXTENSION))
    }

    fn open_layer(&self, layer: &str) -> ToarResult<Dataset> {
        let path = self.layer_path(layer);
        if !path.is_file() {
            return Err(ToarError::LayerNotFound(layer.to_string()));
        }
        Ok(Dataset::open(&path)?)
    }

    /// Read band 1 of a layer; nodata cells become NaN
    pub fn read_layer(&self, layer: &str) -> ToarResult<(RasterGrid, Region)> {
        let dataset = self.open_layer(layer)?;
        let (width, height) = dataset.raster_size();
        let geo_transform = dataset.geo_transform()?;

        let rasterband = dataset.rasterband(1)?;
        let no_data = rasterband.no_data_value();
        let buffer = rasterband.read_as::<f64>((0, 0), (width, height), (width, height), None)?;

        let mut data = Array2::from_shape_vec((height, width), buffer.data)
            .map_err(|e| ToarError::Raster(format!("Failed to reshape {}: {}", layer, e)))?;
        if let Some(nd) = no_data.filter(|v| !v.is_nan()) {
            data.mapv_inplace(|v| if v == nd { f64::NAN } else { v });
        }

        log::debug!("Read {} ({}x{})", layer, width, height);
        Ok((data, Region::new(height, width, geo_transform.into())))
    }

    pub fn write_layer(
        &self,
        layer: &str,
        data: &RasterGrid,
        region: &Region,
        spatial_ref: Option<&SpatialRef>,
    ) -> ToarResult<()> {
        let path = self.layer_path(layer);
        let driver = DriverManager::get_driver_by_name("GTiff")?;
        let (height, width) = data.dim();

        let mut dataset =
            driver.create_with_band_type::<f64, _>(&path, width as isize, height as isize, 1)?;
        let geo_transform: [f64; 6] = region.geo_transform.into();
        dataset.set_geo_transform(&geo_transform)?;
        if let Some(srs) = spatial_ref {
            dataset.set_spatial_ref(srs)?;
        }

        let mut rasterband = dataset.rasterband(1)?;
        let flat_data: Vec<f64> = data.iter().cloned().collect();
        let buffer = Buffer::new((width, height), flat_data);
        rasterband.write((0, 0), (width, height), &buffer)?;
        rasterband.set_no_data_value(Some(f64::NAN))?;

        log::debug!("Wrote {}", path.display());
        Ok(())
    }

    pub fn read_metadata(&self, layer: &str) -> ToarResult<RasterMetadata> {
        let dataset = self.open_layer(layer)?;
        let item = |key: &str| dataset.metadata_item(key, "").unwrap_or_default();

        let sources = (1..)
            .map_while(|i| dataset.metadata_item(&format!("SOURCE{}", i), ""))
            .collect();

        Ok(RasterMetadata {
            title: item("TITLE"),
            units: item("UNITS"),
            description: item("DESCRIPTION"),
            sources,
            history: item("HISTORY"),
        })
    }

    fn sidecar(path: &Path) -> PathBuf {
        let mut name = path.as_os_str().to_owned();
        name.push(".aux.xml");
        PathBuf::from(name)
    }
}

impl RasterEngine for GeoTiffWorkspace {
    fn region(&self) -> Option<Region> {
        self.region.clone()
    }

    fn set_region(&mut self, region: Option<Region>) -> ToarResult<()> {
        self.region = region;
        Ok(())
    }

    fn layer_region(&self, layer: &str) -> ToarResult<Region> {
        let dataset = self.open_layer(layer)?;
        let (width, height) = dataset.raster_size();
        Ok(Region::new(height, width, dataset.geo_transform()?.into()))
    }

    fn exists(&self, layer: &str) -> bool {
        self.layer_path(layer).is_file()
    }

    fn evaluate(&mut self, assignment: &Assignment) -> ToarResult<()> {
        log::debug!("Evaluating {}", assignment);

        let mut inputs = HashMap::new();
        let mut input_region = None;
        let mut spatial_ref = None;
        for name in assignment.expression.rasters() {
            let (data, region) = self.read_layer(name)?;
            if spatial_ref.is_none() {
                spatial_ref = self.open_layer(name)?.spatial_ref().ok();
            }
            input_region.get_or_insert(region);
            inputs.insert(name.to_string(), data);
        }

        let region = self.region.clone().or(input_region).ok_or_else(|| {
            ToarError::Raster(format!(
                "No active region and no input raster for {}",
                assignment.destination
            ))
        })?;

        let resolve = |name: &str| {
            inputs
                .get(name)
                .ok_or_else(|| ToarError::LayerNotFound(name.to_string()))
        };
        let data = assignment.expression.evaluate(region.shape(), &resolve)?;

        self.write_layer(&assignment.destination, &data, &region, spatial_ref.as_ref())
    }

    fn set_metadata(&mut self, layer: &str, metadata: &RasterMetadata) -> ToarResult<()> {
        let path = self.layer_path(layer);
        if !path.is_file() {
            return Err(ToarError::LayerNotFound(layer.to_string()));
        }
        let mut dataset = Dataset::open_ex(
            &path,
            DatasetOptions {
                open_flags: GdalOpenFlags::GDAL_OF_UPDATE,
                ..Default::default()
            },
        )?;

        dataset.set_metadata_item("TITLE", &metadata.title, "")?;
        dataset.set_metadata_item("UNITS", &metadata.units, "")?;
        dataset.set_metadata_item("DESCRIPTION", &metadata.description, "")?;
        for (i, source) in metadata.sources.iter().enumerate() {
            dataset.set_metadata_item(&format!("SOURCE{}", i + 1), source, "")?;
        }
        dataset.set_metadata_item("HISTORY", &metadata.history, "")?;
        Ok(())
    }

    fn rename(&mut self, from: &str, to: &str) -> ToarResult<()> {
        let from_path = self.layer_path(from);
        if !from_path.is_file() {
            return Err(ToarError::LayerNotFound(from.to_string()));
        }
        let to_path = self.layer_path(to);
        std::fs::rename(&from_path, &to_path)?;

        let aux = Self::sidecar(&from_path);
        if aux.is_file() {
            std::fs::rename(aux, Self::sidecar(&to_path))?;
        }
        Ok(())
    }

    fn remove_matching(&mut self, pattern: &str) -> ToarResult<usize> {
        let pattern = Pattern::new(pattern)?;
        let mut removed = 0;

        for entry in std::fs::read_dir(&self.root)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(LAYER_EXTENSION) {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            if pattern.matches(stem) {
                std::fs::remove_file(&path)?;
                let aux = Self::sidecar(&path);
                if aux.is_file() {
                    std::fs::remove_file(aux)?;
                }
                removed += 1;
            }
        }

        Ok(removed)
    }
}
