use crate::io::RasterEngine;
use crate::types::{Region, ToarResult};
use std::ops::{Deref, DerefMut};

/// Exclusive use of a raster engine for one calibration run.
///
/// On drop, every temporary layer created under the session prefix is
/// removed and, if the region was captured, the caller's region is put
/// back. Both happen on every exit path, including early returns on error.
pub struct EngineSession<'a, E: RasterEngine> {
    engine: &'a mut E,
    temp_prefix: String,
    saved_region: Option<Option<Region>>,
}

impl<'a, E: RasterEngine> EngineSession<'a, E> {
    pub fn new(engine: &'a mut E) -> Self {
        Self::with_prefix(engine, format!("tmp.{}", std::process::id()))
    }

    pub fn with_prefix(engine: &'a mut E, temp_prefix: String) -> Self {
        Self {
            engine,
            temp_prefix,
            saved_region: None,
        }
    }

    /// Remember the current region so it is restored when the session ends.
    /// Only the first call captures; later calls are no-ops.
    pub fn save_region(&mut self) {
        if self.saved_region.is_none() {
            self.saved_region = Some(self.engine.region());
        }
    }

    /// Name of a temporary layer owned by this session
    pub fn temp_name(&self, parts: &[&str]) -> String {
        let mut name = self.temp_prefix.clone();
        for part in parts {
            name.push('.');
            name.push_str(part);
        }
        name
    }

    pub fn temp_pattern(&self) -> String {
        format!("{}.*", self.temp_prefix)
    }

    /// Drop one temporary layer now instead of waiting for the session to end
    pub fn discard(&mut self, layer: &str) -> ToarResult<()> {
        let removed = self.engine.remove_matching(&glob::Pattern::escape(layer))?;
        log::debug!("Discarded {} ({} layer)", layer, removed);
        Ok(())
    }
}

impl<E: RasterEngine> Deref for EngineSession<'_, E> {
    type Target = E;

    fn deref(&self) -> &E {
        &*self.engine
    }
}

impl<E: RasterEngine> DerefMut for EngineSession<'_, E> {
    fn deref_mut(&mut self) -> &mut E {
        &mut *self.engine
    }
}

impl<E: RasterEngine> Drop for EngineSession<'_, E> {
    fn drop(&mut self) {
        let pattern = self.temp_pattern();
        match self.engine.remove_matching(&pattern) {
            Ok(0) => {}
            Ok(n) => log::debug!("Removed {} temporary layer(s) matching {}", n, pattern),
            Err(e) => log::warn!("Failed to remove temporary layers {}: {}", pattern, e),
        }

        if let Some(region) = self.saved_region.take() {
            match self.engine.set_region(region) {
                Ok(()) => log::debug!("Restored original region"),
                Err(e) => log::error!("Failed to restore original region: {}", e),
            }
        }
    }
}
