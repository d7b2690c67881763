//! Shared texture handles.

use std::sync::Arc;

use glam::Vec4;
use pbr_renderer::{GpuTexture, TextureFormat};

use super::{ComponentMapping, SamplerParameters, TextureAtlas};

/// A region of a texture atlas holding one logical texture.
#[derive(Debug)]
pub struct AtlasSuballocation {
    atlas: Arc<TextureAtlas>,
    slice: u32,
    uv_scale_bias: Vec4,
}

impl AtlasSuballocation {
    pub fn new(atlas: Arc<TextureAtlas>, slice: u32, uv_scale_bias: Vec4) -> Self {
        Self {
            atlas,
            slice,
            uv_scale_bias,
        }
    }

    /// The atlas this region belongs to.
    #[inline]
    pub fn atlas(&self) -> &Arc<TextureAtlas> {
        &self.atlas
    }

    /// Atlas array slice.
    #[inline]
    pub fn slice(&self) -> u32 {
        self.slice
    }

    /// Region in normalized atlas coordinates: xy = scale, zw = bias.
    #[inline]
    pub fn uv_scale_bias(&self) -> Vec4 {
        self.uv_scale_bias
    }
}

/// GPU storage backing a handle.
#[derive(Debug, Clone)]
pub enum TextureResource {
    /// Dedicated texture (single-slice 2D array).
    Standalone(Arc<GpuTexture>),
    /// Region of a shared atlas.
    Atlas(Arc<AtlasSuballocation>),
}

/// Texture allocated by a registry and shared between materials.
#[derive(Debug)]
pub struct TextureHandle {
    path: String,
    format: TextureFormat,
    sampler: SamplerParameters,
    component_mapping: ComponentMapping,
    resource: TextureResource,
}

/// Shared handle reference. Materials hold these; the registry owns the textures.
pub type TextureHandleRef = Arc<TextureHandle>;

impl TextureHandle {
    pub fn new(
        path: impl Into<String>,
        format: TextureFormat,
        sampler: SamplerParameters,
        component_mapping: ComponentMapping,
        resource: TextureResource,
    ) -> Self {
        Self {
            path: path.into(),
            format,
            sampler,
            component_mapping,
            resource,
        }
    }

    /// Logical name the texture was allocated under.
    #[inline]
    pub fn path(&self) -> &str {
        &self.path
    }

    #[inline]
    pub fn format(&self) -> TextureFormat {
        self.format
    }

    #[inline]
    pub fn sampler(&self) -> &SamplerParameters {
        &self.sampler
    }

    #[inline]
    pub fn component_mapping(&self) -> ComponentMapping {
        self.component_mapping
    }

    #[inline]
    pub fn resource(&self) -> &TextureResource {
        &self.resource
    }

    /// Standalone texture, if not atlased.
    pub fn texture(&self) -> Option<&Arc<GpuTexture>> {
        match &self.resource {
            TextureResource::Standalone(tex) => Some(tex),
            TextureResource::Atlas(_) => None,
        }
    }

    /// Atlas region, if atlased.
    pub fn atlas_suballocation(&self) -> Option<&Arc<AtlasSuballocation>> {
        match &self.resource {
            TextureResource::Atlas(sub) => Some(sub),
            TextureResource::Standalone(_) => None,
        }
    }

    /// Texture a shader binds to sample this handle: the standalone texture or the
    /// current atlas texture.
    pub fn bindable_texture(&self) -> Arc<GpuTexture> {
        match &self.resource {
            TextureResource::Standalone(tex) => Arc::clone(tex),
            TextureResource::Atlas(sub) => sub.atlas().texture(),
        }
    }
}
