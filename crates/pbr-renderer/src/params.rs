//! Material shader attributes
//!
//! Maps directly to the `PBRMaterialShaderInfo` layout in the pixel shader.
//! Vectors are packed as `Vec4` to keep GPU alignment without padding.

use bytemuck::{Pod, Zeroable};
use glam::{Mat2, Vec4};

/// Alpha handling mode.
#[repr(i32)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum AlphaMode {
    #[default]
    Opaque = 0,
    Mask = 1,
    Blend = 2,
}

/// Shading workflow.
#[repr(i32)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Workflow {
    #[default]
    MetallicRoughness = 0,
    SpecularGlossiness = 1,
}

/// Basic material attributes.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct MaterialShaderAttribs {
    /// Base color (rgb) and opacity (a)
    pub base_color_factor: Vec4,
    /// Emissive color (rgb), alpha unused
    pub emissive_factor: Vec4,
    /// Specular color (rgb), alpha unused
    pub specular_factor: Vec4,
    /// [`Workflow`] discriminant
    pub workflow: i32,
    /// [`AlphaMode`] discriminant
    pub alpha_mode: i32,
    pub alpha_cutoff: f32,
    pub metallic_factor: f32,
    pub roughness_factor: f32,
    pub occlusion_factor: f32,
    pub clearcoat_factor: f32,
    pub clearcoat_roughness_factor: f32,
}

impl Default for MaterialShaderAttribs {
    fn default() -> Self {
        Self {
            base_color_factor: Vec4::ONE,
            emissive_factor: Vec4::ZERO,
            specular_factor: Vec4::ONE,
            workflow: Workflow::MetallicRoughness as i32,
            alpha_mode: AlphaMode::Opaque as i32,
            alpha_cutoff: 0.5,
            metallic_factor: 1.0,
            roughness_factor: 1.0,
            occlusion_factor: 1.0,
            clearcoat_factor: 0.0,
            clearcoat_roughness_factor: 0.0,
        }
    }
}

impl MaterialShaderAttribs {
    /// Set the alpha mode.
    pub fn set_alpha_mode(&mut self, mode: AlphaMode) {
        self.alpha_mode = mode as i32;
    }

    /// Set the shading workflow.
    pub fn set_workflow(&mut self, workflow: Workflow) {
        self.workflow = workflow as i32;
    }
}

/// Per-texture sampling attributes.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct TextureShaderAttribs {
    /// Texture coordinate set index, negative when the slot is unused
    pub uv_selector: f32,
    /// Texture array slice (atlas slice for atlas sub-allocations)
    pub texture_slice: f32,
    pub u_bias: f32,
    pub v_bias: f32,
    /// UV scale and rotation applied before the bias
    pub uv_scale_and_rotation: Mat2,
    /// Atlas region: xy = scale, zw = bias
    pub atlas_uv_scale_and_bias: Vec4,
}

impl Default for TextureShaderAttribs {
    fn default() -> Self {
        Self {
            uv_selector: -1.0,
            texture_slice: 0.0,
            u_bias: 0.0,
            v_bias: 0.0,
            uv_scale_and_rotation: Mat2::IDENTITY,
            atlas_uv_scale_and_bias: Vec4::new(1.0, 1.0, 0.0, 0.0),
        }
    }
}

/// CPU-side material: shader attributes plus texture attributes.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MaterialData {
    pub attribs: MaterialShaderAttribs,
    /// Texture attributes indexed by [`crate::RendererSettings::texture_attrib_indices`]
    pub texture_attribs: Vec<TextureShaderAttribs>,
    pub has_clearcoat: bool,
}

impl MaterialData {
    /// Texture attributes at the given index, if allocated.
    pub fn texture_attrib(&self, index: u8) -> Option<&TextureShaderAttribs> {
        self.texture_attribs.get(index as usize)
    }
}

/// Fills texture attributes of a [`MaterialData`].
///
/// Attributes are allocated on first access; [`MaterialBuilder::finalize`] drops
/// the trailing entries nobody touched.
pub struct MaterialBuilder<'a> {
    material: &'a mut MaterialData,
    used: u64,
}

impl<'a> MaterialBuilder<'a> {
    pub fn new(material: &'a mut MaterialData) -> Self {
        Self { material, used: 0 }
    }

    /// Texture attributes at `index`, allocating default entries up to it.
    pub fn texture_attrib(&mut self, index: u8) -> &mut TextureShaderAttribs {
        let index = index as usize;
        if self.material.texture_attribs.len() <= index {
            self.material
                .texture_attribs
                .resize(index + 1, TextureShaderAttribs::default());
        }
        self.used |= 1 << index;
        &mut self.material.texture_attribs[index]
    }

    /// Trim unused trailing attributes. Returns the final attribute count.
    pub fn finalize(self) -> usize {
        let count = (u64::BITS - self.used.leading_zeros()) as usize;
        self.material.texture_attribs.truncate(count);
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gpu_layout_sizes() {
        assert_eq!(std::mem::size_of::<MaterialShaderAttribs>(), 80);
        assert_eq!(std::mem::size_of::<TextureShaderAttribs>(), 48);
    }

    #[test]
    fn test_builder_finalize() {
        let mut data = MaterialData::default();
        data.texture_attribs.resize(8, TextureShaderAttribs::default());

        let mut builder = MaterialBuilder::new(&mut data);
        builder.texture_attrib(0).uv_selector = 0.0;
        builder.texture_attrib(3).texture_slice = 2.0;
        assert_eq!(builder.finalize(), 4);

        assert_eq!(data.texture_attribs.len(), 4);
        assert_eq!(data.texture_attribs[3].texture_slice, 2.0);
        assert_eq!(data.texture_attribs[1].uv_selector, -1.0);
    }

    #[test]
    fn test_attribs_cast() {
        let attribs = MaterialShaderAttribs::default();
        let bytes: &[u8] = bytemuck::bytes_of(&attribs);
        assert_eq!(bytes.len(), 80);
    }
}
