//! GPU objects and the resource binding provider interface.

use std::any::Any;
use std::fmt;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::flags::{primitive_attribs_size, PsoFlags, TextureAttribId};
use crate::settings::RendererSettings;

static NEXT_UNIQUE_ID: AtomicI32 = AtomicI32::new(1);

fn next_unique_id() -> i32 {
    NEXT_UNIQUE_ID.fetch_add(1, Ordering::Relaxed)
}

/// Texture formats used by material textures and atlases.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextureFormat {
    Unknown,
    Rgba8Unorm,
    Rgba8UnormSrgb,
    R8Unorm,
}

impl TextureFormat {
    /// Number of color components.
    pub fn component_count(self) -> u32 {
        match self {
            Self::Unknown => 0,
            Self::Rgba8Unorm | Self::Rgba8UnormSrgb => 4,
            Self::R8Unorm => 1,
        }
    }

    /// 8-bit unorm format with the given number of components.
    pub fn from_component_count(count: u32) -> Self {
        match count {
            1 => Self::R8Unorm,
            4 => Self::Rgba8Unorm,
            _ => Self::Unknown,
        }
    }
}

/// Texture resource dimension.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ResourceDimension {
    Tex2D,
    Tex2DArray,
}

/// Texture description.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TextureDesc {
    pub name: String,
    pub format: TextureFormat,
    pub dimension: ResourceDimension,
    pub width: u32,
    pub height: u32,
    pub array_size: u32,
}

/// GPU texture object.
///
/// Every texture gets a process-unique id at creation. Bindings are cached by these ids,
/// so a recreated texture never aliases the one it replaces.
#[derive(Debug)]
pub struct GpuTexture {
    unique_id: i32,
    desc: TextureDesc,
}

impl GpuTexture {
    pub fn new(desc: TextureDesc) -> Arc<Self> {
        Arc::new(Self {
            unique_id: next_unique_id(),
            desc,
        })
    }

    #[inline]
    pub fn unique_id(&self) -> i32 {
        self.unique_id
    }

    #[inline]
    pub fn desc(&self) -> &TextureDesc {
        &self.desc
    }

    #[inline]
    pub fn format(&self) -> TextureFormat {
        self.desc.format
    }
}

/// GPU buffer object.
#[derive(Debug)]
pub struct GpuBuffer {
    unique_id: i32,
    name: String,
    size: u64,
}

impl GpuBuffer {
    pub fn new(name: impl Into<String>, size: u64) -> Arc<Self> {
        Arc::new(Self {
            unique_id: next_unique_id(),
            name: name.into(),
            size,
        })
    }

    #[inline]
    pub fn unique_id(&self) -> i32 {
        self.unique_id
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn size(&self) -> u64 {
        self.size
    }
}

/// Shader stage.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ShaderType {
    Vertex,
    Pixel,
}

impl fmt::Display for ShaderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Vertex => f.write_str("vertex"),
            Self::Pixel => f.write_str("pixel"),
        }
    }
}

/// A shader-visible variable of a resource binding.
pub trait ShaderResourceVariable: Send + Sync + fmt::Debug {
    /// Bind a single texture view.
    fn set(&self, texture: &Arc<GpuTexture>);

    /// Bind texture views to consecutive array elements starting at `first_element`.
    fn set_array(&self, textures: &[Arc<GpuTexture>], first_element: u32);

    /// Bind a constant buffer range.
    fn set_buffer_range(&self, buffer: &Arc<GpuBuffer>, offset: u64, size: u64);

    fn as_any(&self) -> &dyn Any;
}

/// Shader resource binding (SRB): the set of resources visible to one draw.
pub trait ShaderResourceBinding: Send + Sync + fmt::Debug {
    /// Look up a variable. Returns `None` if the shaders do not declare it.
    fn variable_by_name(
        &self,
        stage: ShaderType,
        name: &str,
    ) -> Option<Arc<dyn ShaderResourceVariable>>;

    fn as_any(&self) -> &dyn Any;
}

/// The PBR renderer as seen by the material core.
pub trait PbrRenderer: Send + Sync {
    fn settings(&self) -> &RendererSettings;

    /// Allocate a new, empty resource binding for the PBR pipeline layout.
    fn create_resource_binding(&self) -> Option<Arc<dyn ShaderResourceBinding>>;

    /// Large buffer holding attributes of many primitives; draws select one via offsets.
    fn primitive_attribs_buffer(&self) -> &Arc<GpuBuffer>;

    /// Size of one primitive's attributes for the given pipeline features.
    fn primitive_attribs_size(&self, flags: PsoFlags) -> u64 {
        primitive_attribs_size(flags)
    }

    /// Bind the variables shared by every material (frame constants, IBL, samplers).
    fn init_common_srb_vars(
        &self,
        srb: &dyn ShaderResourceBinding,
        frame_attribs: &Arc<GpuBuffer>,
    );

    /// Bind a standalone material texture to its slot variable.
    fn set_material_texture(
        &self,
        srb: &dyn ShaderResourceBinding,
        texture: &Arc<GpuTexture>,
        id: TextureAttribId,
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unique_ids() {
        let desc = TextureDesc {
            name: "t".into(),
            format: TextureFormat::R8Unorm,
            dimension: ResourceDimension::Tex2DArray,
            width: 4,
            height: 4,
            array_size: 1,
        };
        let a = GpuTexture::new(desc.clone());
        let b = GpuTexture::new(desc);
        assert_ne!(a.unique_id(), b.unique_id());

        let buf = GpuBuffer::new("cb", 256);
        assert_ne!(buf.unique_id(), a.unique_id());
        assert_eq!(buf.size(), 256);
    }

    #[test]
    fn test_format_components() {
        assert_eq!(TextureFormat::from_component_count(1), TextureFormat::R8Unorm);
        assert_eq!(TextureFormat::from_component_count(4).component_count(), 4);
        assert_eq!(TextureFormat::from_component_count(3), TextureFormat::Unknown);
    }
}
