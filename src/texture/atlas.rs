//! Per-format texture atlas.
//!
//! Each atlas slice is split into a uniform grid of square regions. Regions are
//! handed out in order; when every region is taken the slice count doubles and a
//! new GPU texture replaces the old one. Callers must rebind anything that
//! captured the previous texture (see `TextureRegistry::atlas_version`).

use std::sync::Arc;

use glam::Vec4;
use parking_lot::RwLock;
use pbr_renderer::{GpuTexture, ResourceDimension, TextureDesc, TextureFormat};
use tracing::debug;

/// Region handed out by [`TextureAtlas::allocate`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AtlasRegion {
    pub slice: u32,
    /// xy = scale, zw = bias, normalized to the atlas dimension.
    pub uv_scale_bias: Vec4,
}

#[derive(Debug)]
struct AtlasState {
    texture: Arc<GpuTexture>,
    slices: u32,
    allocated: u32,
}

/// Grid-packed 2D texture array shared by all textures of one format.
#[derive(Debug)]
pub struct TextureAtlas {
    format: TextureFormat,
    dimension: u32,
    region_size: u32,
    state: RwLock<AtlasState>,
}

impl TextureAtlas {
    /// `region_size` is clamped to `1..=dimension`; `initial_slices` to at least 1.
    pub fn new(
        format: TextureFormat,
        dimension: u32,
        region_size: u32,
        initial_slices: u32,
    ) -> Self {
        let dimension = dimension.max(1);
        let region_size = region_size.clamp(1, dimension);
        let slices = initial_slices.max(1);
        Self {
            format,
            dimension,
            region_size,
            state: RwLock::new(AtlasState {
                texture: create_atlas_texture(format, dimension, slices),
                slices,
                allocated: 0,
            }),
        }
    }

    #[inline]
    pub fn format(&self) -> TextureFormat {
        self.format
    }

    #[inline]
    pub fn dimension(&self) -> u32 {
        self.dimension
    }

    /// Current GPU texture. Replaced whenever the atlas grows.
    pub fn texture(&self) -> Arc<GpuTexture> {
        Arc::clone(&self.state.read().texture)
    }

    pub fn slice_count(&self) -> u32 {
        self.state.read().slices
    }

    /// Number of regions allocated so far.
    pub fn allocated_regions(&self) -> u32 {
        self.state.read().allocated
    }

    #[inline]
    fn regions_per_row(&self) -> u32 {
        self.dimension / self.region_size
    }

    #[inline]
    pub fn regions_per_slice(&self) -> u32 {
        let n = self.regions_per_row();
        n * n
    }

    /// Reserve a region for a `width` x `height` image.
    ///
    /// Images larger than a region are clipped to it. Returns the region and
    /// whether the atlas texture had to be recreated.
    pub fn allocate(&self, width: u32, height: u32) -> (AtlasRegion, bool) {
        let per_slice = self.regions_per_slice();
        let mut state = self.state.write();

        let index = state.allocated;
        let mut grew = false;
        if index >= state.slices * per_slice {
            state.slices *= 2;
            state.texture = create_atlas_texture(self.format, self.dimension, state.slices);
            grew = true;
            debug!(
                "Atlas {:?} grown to {} slices (texture {})",
                self.format,
                state.slices,
                state.texture.unique_id()
            );
        }
        state.allocated += 1;

        let slice = index / per_slice;
        let cell = index % per_slice;
        let row = self.regions_per_row();
        let x = (cell % row) * self.region_size;
        let y = (cell / row) * self.region_size;
        let w = width.clamp(1, self.region_size);
        let h = height.clamp(1, self.region_size);

        let dim = self.dimension as f32;
        let region = AtlasRegion {
            slice,
            uv_scale_bias: Vec4::new(
                w as f32 / dim,
                h as f32 / dim,
                x as f32 / dim,
                y as f32 / dim,
            ),
        };
        (region, grew)
    }
}

fn create_atlas_texture(format: TextureFormat, dimension: u32, slices: u32) -> Arc<GpuTexture> {
    GpuTexture::new(TextureDesc {
        name: format!("Texture atlas {:?}", format),
        format,
        dimension: ResourceDimension::Tex2DArray,
        width: dimension,
        height: dimension,
        array_size: slices,
    })
}
