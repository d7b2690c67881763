//! PBR renderer interface
//!
//! Shader-side vocabulary shared by the material core and the rasterizer:
//! GPU-layout attribute blocks, material texture slots, pipeline feature
//! flags and the resource binding traits a device backend implements.
//!
//! ## Usage
//!
//! ```ignore
//! use pbr_renderer::{headless::HeadlessRenderer, PbrRenderer, RendererSettings};
//!
//! let renderer = HeadlessRenderer::new(RendererSettings::default());
//! let srb = renderer.create_resource_binding().unwrap();
//! ```

mod device;
mod flags;
mod params;
mod settings;

pub mod headless;

pub use device::{
    GpuBuffer, GpuTexture, PbrRenderer, ResourceDimension, ShaderResourceBinding,
    ShaderResourceVariable, ShaderType, TextureDesc, TextureFormat,
};
pub use flags::{
    primitive_attribs_size, PsoFlags, StaticShaderTextureIds, TextureAttribId,
    INVALID_MATERIAL_TEXTURE_ID, PRIMITIVE_CUSTOM_DATA_SIZE, PRIMITIVE_TRANSFORMS_SIZE,
};
pub use params::{
    AlphaMode, MaterialBuilder, MaterialData, MaterialShaderAttribs, TextureShaderAttribs, Workflow,
};
pub use settings::RendererSettings;

/// Name of the per-primitive constant buffer variable (pixel stage).
pub const PRIMITIVE_ATTRIBS_VAR: &str = "cbPrimitiveAttribs";

/// Name of the per-frame constant buffer variable.
pub const FRAME_ATTRIBS_VAR: &str = "cbFrameAttribs";

/// Name of the material texture array variable used with texture atlases.
pub const MATERIAL_TEXTURES_VAR: &str = "g_MaterialTextures";
