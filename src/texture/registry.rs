//! Texture registry interface and the in-memory implementation.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use pbr_renderer::{GpuTexture, ResourceDimension, TextureDesc, TextureFormat};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{
    AtlasSuballocation, ComponentMapping, SamplerParameters, TextureAtlas, TextureData,
    TextureHandle, TextureHandleRef, TextureIdentifier, TextureResource,
};
use crate::util::{Error, Result};

/// Loader invoked by [`TextureRegistry::allocate_with_loader`] on first request.
pub type TextureLoader<'a> = dyn Fn() -> Result<TextureData> + 'a;

/// Shared texture allocation service.
///
/// Handles are deduplicated: the same logical texture requested twice yields
/// the same `Arc`. Implementations must be safe to call from many material
/// syncs at once.
pub trait TextureRegistry: Send + Sync {
    /// Allocate (or find) the texture for a file.
    ///
    /// Returns `None` if the file cannot be probed.
    fn allocate(
        &self,
        id: &TextureIdentifier,
        format: TextureFormat,
        sampler: &SamplerParameters,
    ) -> Option<TextureHandleRef>;

    /// Allocate (or find) a texture whose texels come from `loader`.
    fn allocate_with_loader(
        &self,
        path: &str,
        mapping: ComponentMapping,
        sampler: &SamplerParameters,
        loader: &TextureLoader<'_>,
    ) -> Result<TextureHandleRef>;

    /// Incremented every time any atlas texture is recreated.
    fn atlas_version(&self) -> u32;

    /// Formats that currently have an atlas, in the order the atlases were created.
    fn allocated_atlas_formats(&self) -> Vec<TextureFormat>;

    /// Current GPU texture of the atlas for `format`.
    fn atlas_texture(&self, format: TextureFormat) -> Option<Arc<GpuTexture>>;
}

/// Texture registry configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TextureRegistryConfig {
    /// Formats packed into atlases. Textures of other formats are standalone.
    pub atlas_formats: Vec<TextureFormat>,
    /// Atlas slice width and height in texels.
    pub atlas_dimension: u32,
    /// Side of one grid region in texels.
    pub atlas_region_size: u32,
    pub initial_atlas_slices: u32,
}

impl Default for TextureRegistryConfig {
    fn default() -> Self {
        Self {
            atlas_formats: Vec::new(),
            atlas_dimension: 2048,
            atlas_region_size: 256,
            initial_atlas_slices: 1,
        }
    }
}

impl TextureRegistryConfig {
    /// Check values that would make atlas packing impossible.
    pub fn validate(&self) -> Result<()> {
        if self.atlas_formats.is_empty() {
            return Ok(());
        }
        if self.atlas_dimension == 0 || self.atlas_region_size == 0 {
            return Err(Error::Config("atlas dimension and region size must be non-zero".into()));
        }
        if self.atlas_region_size > self.atlas_dimension {
            return Err(Error::Config(format!(
                "atlas region size {} exceeds atlas dimension {}",
                self.atlas_region_size, self.atlas_dimension
            )));
        }
        if self.atlas_formats.contains(&TextureFormat::Unknown) {
            return Err(Error::Config("atlas format must be known".into()));
        }
        Ok(())
    }

    #[inline]
    pub fn uses_atlas(&self, format: TextureFormat) -> bool {
        self.atlas_formats.contains(&format)
    }
}

/// In-process registry: tracks GPU objects without uploading texels.
pub struct MemoryTextureRegistry {
    config: TextureRegistryConfig,
    file_handles: Mutex<HashMap<(String, TextureFormat), TextureHandleRef>>,
    loaded_handles: Mutex<HashMap<String, TextureHandleRef>>,
    atlases: RwLock<Vec<Arc<TextureAtlas>>>,
    atlas_version: AtomicU32,
}

impl MemoryTextureRegistry {
    pub fn new(config: TextureRegistryConfig) -> Self {
        Self {
            config,
            file_handles: Mutex::new(HashMap::new()),
            loaded_handles: Mutex::new(HashMap::new()),
            atlases: RwLock::new(Vec::new()),
            atlas_version: AtomicU32::new(0),
        }
    }

    #[inline]
    pub fn config(&self) -> &TextureRegistryConfig {
        &self.config
    }

    /// Number of distinct textures allocated.
    pub fn len(&self) -> usize {
        self.file_handles.lock().len() + self.loaded_handles.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Atlas for `format`, created on first use.
    pub fn atlas(&self, format: TextureFormat) -> Arc<TextureAtlas> {
        if let Some(atlas) = self.find_atlas(format) {
            return atlas;
        }

        let mut atlases = self.atlases.write();
        if let Some(atlas) = atlases.iter().find(|a| a.format() == format) {
            return Arc::clone(atlas);
        }
        let atlas = Arc::new(TextureAtlas::new(
            format,
            self.config.atlas_dimension,
            self.config.atlas_region_size,
            self.config.initial_atlas_slices,
        ));
        debug!("Created texture atlas {:?}", format);
        atlases.push(Arc::clone(&atlas));
        atlas
    }

    fn find_atlas(&self, format: TextureFormat) -> Option<Arc<TextureAtlas>> {
        self.atlases.read().iter().find(|a| a.format() == format).cloned()
    }

    fn create_handle(
        &self,
        path: &str,
        format: TextureFormat,
        sampler: SamplerParameters,
        mapping: ComponentMapping,
        width: u32,
        height: u32,
    ) -> TextureHandleRef {
        let resource = if self.config.uses_atlas(format) {
            let atlas = self.atlas(format);
            let (region, grew) = atlas.allocate(width, height);
            if grew {
                self.atlas_version.fetch_add(1, Ordering::AcqRel);
            }
            TextureResource::Atlas(Arc::new(AtlasSuballocation::new(
                atlas,
                region.slice,
                region.uv_scale_bias,
            )))
        } else {
            TextureResource::Standalone(GpuTexture::new(TextureDesc {
                name: path.to_string(),
                format,
                dimension: ResourceDimension::Tex2DArray,
                width,
                height,
                array_size: 1,
            }))
        };

        Arc::new(TextureHandle::new(path, format, sampler, mapping, resource))
    }
}

impl Default for MemoryTextureRegistry {
    fn default() -> Self {
        Self::new(TextureRegistryConfig::default())
    }
}

impl TextureRegistry for MemoryTextureRegistry {
    fn allocate(
        &self,
        id: &TextureIdentifier,
        format: TextureFormat,
        sampler: &SamplerParameters,
    ) -> Option<TextureHandleRef> {
        let path = id.file_path.to_string_lossy().into_owned();
        let key = (path, format);

        let mut handles = self.file_handles.lock();
        if let Some(handle) = handles.get(&key) {
            return Some(Arc::clone(handle));
        }

        let (width, height) = match image::image_dimensions(&id.file_path) {
            Ok(dims) => dims,
            Err(err) => {
                warn!("Failed to load texture {}: {}", id, err);
                return None;
            }
        };

        let handle = self.create_handle(
            &key.0,
            format,
            *sampler,
            ComponentMapping::IDENTITY,
            width,
            height,
        );
        debug!("Allocated texture {} ({}x{}, {:?})", id, width, height, format);
        handles.insert(key, Arc::clone(&handle));
        Some(handle)
    }

    fn allocate_with_loader(
        &self,
        path: &str,
        mapping: ComponentMapping,
        sampler: &SamplerParameters,
        loader: &TextureLoader<'_>,
    ) -> Result<TextureHandleRef> {
        let mut handles = self.loaded_handles.lock();
        if let Some(handle) = handles.get(path) {
            return Ok(Arc::clone(handle));
        }

        let data = loader()?;
        let format = TextureFormat::from_component_count(data.num_components);
        if format == TextureFormat::Unknown {
            return Err(Error::TextureLoad {
                path: path.into(),
                reason: format!("unsupported component count {}", data.num_components),
            });
        }
        let expected = data.width as usize * data.height as usize * data.num_components as usize;
        if data.pixels.len() != expected {
            return Err(Error::TextureLoad {
                path: path.into(),
                reason: format!(
                    "expected {} bytes of texel data, got {}",
                    expected,
                    data.pixels.len()
                ),
            });
        }

        let handle = self.create_handle(path, format, *sampler, mapping, data.width, data.height);
        handles.insert(path.to_string(), Arc::clone(&handle));
        Ok(handle)
    }

    fn atlas_version(&self) -> u32 {
        self.atlas_version.load(Ordering::Acquire)
    }

    fn allocated_atlas_formats(&self) -> Vec<TextureFormat> {
        self.atlases.read().iter().map(|a| a.format()).collect()
    }

    fn atlas_texture(&self, format: TextureFormat) -> Option<Arc<GpuTexture>> {
        self.find_atlas(format).map(|a| a.texture())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::texture::{default_sampler, DefaultTexture};

    fn write_png(dir: &std::path::Path, name: &str, w: u32, h: u32) -> std::path::PathBuf {
        let path = dir.join(name);
        image::RgbaImage::from_pixel(w, h, image::Rgba([10, 20, 30, 255]))
            .save(&path)
            .unwrap();
        path
    }

    #[test]
    fn test_file_dedup() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_png(dir.path(), "a.png", 16, 8);
        let registry = MemoryTextureRegistry::default();
        let id = TextureIdentifier::new(&path);

        let a = registry.allocate(&id, TextureFormat::Rgba8Unorm, &default_sampler()).unwrap();
        let b = registry.allocate(&id, TextureFormat::Rgba8Unorm, &default_sampler()).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(a.texture().unwrap().desc().width, 16);
        assert_eq!(a.texture().unwrap().desc().height, 8);

        let c = registry.allocate(&id, TextureFormat::R8Unorm, &default_sampler()).unwrap();
        assert!(!Arc::ptr_eq(&a, &c));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_missing_file() {
        let registry = MemoryTextureRegistry::default();
        let id = TextureIdentifier::new("/nonexistent/texture.png");
        assert!(registry.allocate(&id, TextureFormat::Rgba8Unorm, &default_sampler()).is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_loader_formats() {
        let registry = MemoryTextureRegistry::default();
        let white = DefaultTexture::WhiteR8;
        let sampler = default_sampler();
        let handle = registry
            .allocate_with_loader(&white.path(), ComponentMapping::IDENTITY, &sampler, &|| {
                Ok(white.create_image(64))
            })
            .unwrap();
        assert_eq!(handle.format(), TextureFormat::R8Unorm);
        assert_eq!(handle.path(), "$Default-whiteR8");

        let again = registry
            .allocate_with_loader(&white.path(), ComponentMapping::IDENTITY, &sampler, &|| {
                panic!("loader must not run twice")
            })
            .unwrap();
        assert!(Arc::ptr_eq(&handle, &again));

        let bad = registry.allocate_with_loader("rgb", ComponentMapping::IDENTITY, &sampler, &|| {
            Ok(TextureData::solid(2, 2, &[1, 2, 3]))
        });
        assert!(matches!(bad, Err(Error::TextureLoad { .. })));
    }

    #[test]
    fn test_atlas_version_bumps_on_growth() {
        let registry = MemoryTextureRegistry::new(TextureRegistryConfig {
            atlas_formats: vec![TextureFormat::Rgba8Unorm],
            atlas_dimension: 64,
            atlas_region_size: 64,
            initial_atlas_slices: 1,
        });
        let load = |i: u8| {
            move || -> Result<TextureData> { Ok(TextureData::solid(4, 4, &[i, i, i, 255])) }
        };

        let a = registry
            .allocate_with_loader("a", ComponentMapping::IDENTITY, &default_sampler(), &load(1))
            .unwrap();
        assert!(a.atlas_suballocation().is_some());
        assert_eq!(registry.atlas_version(), 0);
        assert_eq!(registry.allocated_atlas_formats(), vec![TextureFormat::Rgba8Unorm]);

        let before = registry.atlas_texture(TextureFormat::Rgba8Unorm).unwrap();
        registry
            .allocate_with_loader("b", ComponentMapping::IDENTITY, &default_sampler(), &load(2))
            .unwrap();
        assert_eq!(registry.atlas_version(), 1);
        let after = registry.atlas_texture(TextureFormat::Rgba8Unorm).unwrap();
        assert_ne!(before.unique_id(), after.unique_id());

        // Single-channel textures are not atlased in this configuration
        let r = registry
            .allocate_with_loader("r", ComponentMapping::IDENTITY, &default_sampler(), &|| {
                Ok(TextureData::solid(4, 4, &[255]))
            })
            .unwrap();
        assert!(r.texture().is_some());
        assert!(registry.atlas_texture(TextureFormat::R8Unorm).is_none());
    }

    #[test]
    fn test_config_validate() {
        assert!(TextureRegistryConfig::default().validate().is_ok());
        let bad = TextureRegistryConfig {
            atlas_formats: vec![TextureFormat::R8Unorm],
            atlas_dimension: 64,
            atlas_region_size: 128,
            initial_atlas_slices: 1,
        };
        assert!(matches!(bad.validate(), Err(Error::Config(_))));
    }
}
