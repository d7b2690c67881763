//! Render delegate configuration.
//!
//! Loaded from JSON; every field has a default, so a partial file (or none)
//! is valid.

use std::path::Path;

use pbr_renderer::RendererSettings;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::texture::TextureRegistryConfig;
use crate::util::{Error, Result};

/// Render delegate configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DelegateConfig {
    pub textures: TextureRegistryConfig,
    pub renderer: RendererSettings,
    /// Width and height of generated default textures.
    pub default_texture_dimension: u32,
}

impl Default for DelegateConfig {
    fn default() -> Self {
        Self {
            textures: TextureRegistryConfig::default(),
            renderer: RendererSettings::default(),
            default_texture_dimension: 64,
        }
    }
}

impl DelegateConfig {
    /// Parse and validate a JSON configuration.
    pub fn from_json(json: &str) -> Result<Self> {
        let mut config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)?;
        let config = Self::from_json(&json)?;
        debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Load from a file, falling back to defaults if it is missing or invalid.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match Self::load(path) {
            Ok(config) => config,
            Err(err) => {
                warn!("Failed to load config {}: {}. Using defaults", path.display(), err);
                Self::default()
            }
        }
    }

    /// Save as pretty-printed JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Clamp recoverable values; reject configurations atlas packing cannot satisfy.
    pub fn validate(&mut self) -> Result<()> {
        self.renderer.validate();

        if self.default_texture_dimension == 0 {
            warn!("default_texture_dimension must be at least 1, using 1");
            self.default_texture_dimension = 1;
        }

        if self.textures.atlas_dimension % self.textures.atlas_region_size.max(1) != 0 {
            warn!(
                "atlas region size {} does not divide atlas dimension {}; the remainder is unused",
                self.textures.atlas_region_size, self.textures.atlas_dimension
            );
        }
        if self.textures.initial_atlas_slices == 0 {
            warn!("initial_atlas_slices must be at least 1, using 1");
            self.textures.initial_atlas_slices = 1;
        }
        if self.textures.atlas_formats.len() > self.renderer.material_textures_array_size as usize {
            return Err(Error::Config(format!(
                "{} atlas formats do not fit into material texture array of size {}",
                self.textures.atlas_formats.len(),
                self.renderer.material_textures_array_size
            )));
        }

        self.textures.validate()
    }
}
