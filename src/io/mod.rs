//! Raster engines: where layers live and how algebra is materialized

pub mod memory;
#[cfg(feature = "gdal")]
pub mod geotiff;

pub use memory::MemoryEngine;
#[cfg(feature = "gdal")]
pub use geotiff::GeoTiffWorkspace;

use crate::core::expression::Assignment;
use crate::types::{RasterMetadata, Region, ToarResult};

/// Capabilities the calibration pipeline needs from a raster store.
///
/// Layers are addressed by name. Names may carry an `@mapset` style
/// qualifier; engines that have no notion of qualifiers strip it.
pub trait RasterEngine {
    /// Active computational region; `None` means "follow the input rasters"
    fn region(&self) -> Option<Region>;

    fn set_region(&mut self, region: Option<Region>) -> ToarResult<()>;

    /// Grid of an existing layer
    fn layer_region(&self, layer: &str) -> ToarResult<Region>;

    fn exists(&self, layer: &str) -> bool;

    /// Materialize `destination = expression` as a new layer
    fn evaluate(&mut self, assignment: &Assignment) -> ToarResult<()>;

    fn set_metadata(&mut self, layer: &str, metadata: &RasterMetadata) -> ToarResult<()>;

    /// Rename a layer, replacing any existing layer called `to`
    fn rename(&mut self, from: &str, to: &str) -> ToarResult<()>;

    /// Remove every layer whose name matches the glob `pattern`, returning how many went
    fn remove_matching(&mut self, pattern: &str) -> ToarResult<usize>;

    /// Align the active region to a layer's grid
    fn align_region_to(&mut self, layer: &str) -> ToarResult<()> {
        let region = self.layer_region(layer)?;
        log::debug!("Aligning region to {}: {}x{}", layer, region.rows, region.cols);
        self.set_region(Some(region))
    }
}

/// Layer name without its `@mapset` qualifier
pub fn bare_name(layer: &str) -> &str {
    layer.split('@').next().unwrap_or(layer)
}
