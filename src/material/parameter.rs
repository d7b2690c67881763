//! Extracted material parameters.

use glam::{Vec2, Vec4};
use smallvec::SmallVec;

use super::FallbackValue;
use crate::texture::{SamplerParameters, TextureIdentifier};

/// Parameter kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ParamType {
    /// Constant value (or the value used when the connected source is unusable).
    Fallback,
    Texture,
    /// UV transform applied before sampling a texture.
    Transform2d,
    /// Primvar the shader needs even if no parameter reads it.
    AdditionalPrimvar,
}

/// How a texture is addressed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum TextureKind {
    #[default]
    Uv,
    Udim,
    Ptex,
    Field,
}

/// UV transform: `uv' = rotate(scale * uv) + translation`, rotation in degrees.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transform2d {
    pub scale: Vec2,
    pub rotation: f32,
    pub translation: Vec2,
}

impl Default for Transform2d {
    fn default() -> Self {
        Self {
            scale: Vec2::ONE,
            rotation: 0.0,
            translation: Vec2::ZERO,
        }
    }
}

/// One input of the terminal shader as the renderer sees it.
#[derive(Clone, Debug, PartialEq)]
pub struct MaterialParameter {
    pub param_type: ParamType,
    pub name: String,
    pub fallback_value: Option<FallbackValue>,
    /// Primvars providing texture coordinates, in order.
    pub sampler_coords: SmallVec<[String; 2]>,
    pub texture_kind: TextureKind,
    /// Texture channels read, e.g. `rgb` or `r`.
    pub swizzle: String,
    pub is_premultiplied: bool,
    pub array_size: usize,
    /// Texture value multiplier.
    pub input_scale: Vec4,
    pub transform2d: Transform2d,
}

impl MaterialParameter {
    pub fn new(param_type: ParamType, name: impl Into<String>) -> Self {
        Self {
            param_type,
            name: name.into(),
            fallback_value: None,
            sampler_coords: SmallVec::new(),
            texture_kind: TextureKind::Uv,
            swizzle: String::new(),
            is_premultiplied: false,
            array_size: 0,
            input_scale: Vec4::ONE,
            transform2d: Transform2d::default(),
        }
    }
}

/// Texture referenced by a material network.
#[derive(Clone, Debug, PartialEq)]
pub struct TextureDescriptor {
    /// Terminal input the texture feeds.
    pub name: String,
    pub texture_id: TextureIdentifier,
    pub sampler_params: SamplerParameters,
}
