use super::{bare_name, RasterEngine};
use crate::core::expression::Assignment;
use crate::types::{RasterGrid, RasterMetadata, Region, ToarError, ToarResult};
use glob::Pattern;
use std::collections::BTreeMap;

/// A raster layer held in memory
#[derive(Debug, Clone)]
pub struct MemoryLayer {
    pub data: RasterGrid,
    pub region: Region,
    pub metadata: Option<RasterMetadata>,
}

/// In-process raster engine backed by `ndarray` grids.
///
/// Used by the test suite and by callers that already hold their bands in
/// memory.
#[derive(Debug, Default)]
pub struct MemoryEngine {
    layers: BTreeMap<String, MemoryLayer>,
    region: Option<Region>,
}

impl MemoryEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_region(region: Region) -> Self {
        Self {
            layers: BTreeMap::new(),
            region: Some(region),
        }
    }

    /// Add a layer on a unit grid matching the data shape
    pub fn insert(&mut self, name: &str, data: RasterGrid) {
        let (rows, cols) = data.dim();
        self.insert_with_region(name, data, Region::unit(rows, cols));
    }

    pub fn insert_with_region(&mut self, name: &str, data: RasterGrid, region: Region) {
        self.layers.insert(
            bare_name(name).to_string(),
            MemoryLayer {
                data,
                region,
                metadata: None,
            },
        );
    }

    pub fn layer(&self, name: &str) -> Option<&MemoryLayer> {
        self.layers.get(bare_name(name))
    }

    pub fn layer_names(&self) -> Vec<&str> {
        self.layers.keys().map(String::as_str).collect()
    }

    fn get(&self, name: &str) -> ToarResult<&MemoryLayer> {
        self.layer(name)
            .ok_or_else(|| ToarError::LayerNotFound(name.to_string()))
    }
}

impl RasterEngine for MemoryEngine {
    fn region(&self) -> Option<Region> {
        self.region.clone()
    }

    fn set_region(&mut self, region: Option<Region>) -> ToarResult<()> {
        self.region = region;
        Ok(())
    }

    fn layer_region(&self, layer: &str) -> ToarResult<Region> {
        Ok(self.get(layer)?.region.clone())
    }

    fn exists(&self, layer: &str) -> bool {
        self.layer(layer).is_some()
    }

    fn evaluate(&mut self, assignment: &Assignment) -> ToarResult<()> {
        let region = match &self.region {
            Some(region) => region.clone(),
            None => {
                let first = assignment.expression.rasters().first().copied().ok_or_else(|| {
                    ToarError::Raster(format!(
                        "No active region and no input raster for {}",
                        assignment.destination
                    ))
                })?;
                self.get(first)?.region.clone()
            }
        };

        log::debug!("Evaluating {}", assignment);
        let resolve = |name: &str| -> ToarResult<&RasterGrid> { Ok(&self.get(name)?.data) };
        let data = assignment.expression.evaluate(region.shape(), &resolve)?;

        self.insert_with_region(&assignment.destination, data, region);
        Ok(())
    }

    fn set_metadata(&mut self, layer: &str, metadata: &RasterMetadata) -> ToarResult<()> {
        let entry = self
            .layers
            .get_mut(bare_name(layer))
            .ok_or_else(|| ToarError::LayerNotFound(layer.to_string()))?;
        entry.metadata = Some(metadata.clone());
        Ok(())
    }

    fn rename(&mut self, from: &str, to: &str) -> ToarResult<()> {
        let layer = self
            .layers
            .remove(bare_name(from))
            .ok_or_else(|| ToarError::LayerNotFound(from.to_string()))?;
        self.layers.insert(bare_name(to).to_string(), layer);
        Ok(())
    }

    fn remove_matching(&mut self, pattern: &str) -> ToarResult<usize> {
        let pattern = Pattern::new(pattern)?;
        let before = self.layers.len();
        self.layers.retain(|name, _| !pattern.matches(name));
        Ok(before - self.layers.len())
    }
}
