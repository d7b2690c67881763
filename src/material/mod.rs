//! Material subsystem.
//!
//! Turns scene-authored shading networks into GPU-ready materials:
//!
//! - [`MaterialNetworkMap`] / [`MaterialGraph`] - Scene-side network and its per-pass node arena
//! - [`ShaderRegistry`] - Shader node definitions (inputs, defaults, metadata)
//! - [`MaterialNetwork`] - Extracted parameters, textures and material tag
//! - [`Material`] - Texture allocation, shader attributes and resource binding
//! - [`MaterialSrbCache`] - Resource bindings and shader texture indexings shared by materials
//!
//! ## Example
//!
//! ```ignore
//! use hydrogent::material::{MaterialNetwork, MaterialNetworkMap, ShaderRegistry};
//!
//! let map = MaterialNetworkMap::load("network.json")?;
//! let network = MaterialNetwork::new("/Looks/Wood", &map, &ShaderRegistry::with_builtin_nodes())?;
//! println!("tag: {}", network.tag());
//! ```

mod graph;
mod material;
mod network;
mod parameter;
mod sdr;
mod srb_cache;
mod value;

pub use graph::*;
pub use material::*;
pub use network::*;
pub use parameter::*;
pub use sdr::*;
pub use srb_cache::*;
pub use value::*;

use std::fmt;

use pbr_renderer::{AlphaMode, TextureAttribId, TextureFormat};

/// Shading network tokens.
pub mod tokens {
    pub const DIFFUSE_COLOR: &str = "diffuseColor";
    pub const EMISSIVE_COLOR: &str = "emissiveColor";
    pub const NORMAL: &str = "normal";
    pub const METALLIC: &str = "metallic";
    pub const ROUGHNESS: &str = "roughness";
    pub const OCCLUSION: &str = "occlusion";
    pub const OPACITY: &str = "opacity";
    pub const OPACITY_THRESHOLD: &str = "opacityThreshold";
    pub const CLEARCOAT: &str = "clearcoat";
    pub const CLEARCOAT_ROUGHNESS: &str = "clearcoatRoughness";

    /// Terminal names.
    pub const SURFACE: &str = "surface";
    pub const VOLUME: &str = "volume";

    /// Shader metadata key holding an explicit material tag.
    pub const MATERIAL_TAG: &str = "materialTag";

    // Texture node inputs
    pub const FILE: &str = "file";
    pub const ST: &str = "st";
    pub const WRAP_S: &str = "wrapS";
    pub const WRAP_T: &str = "wrapT";
    pub const MIN_FILTER: &str = "minFilter";
    pub const MAG_FILTER: &str = "magFilter";
    pub const SCALE: &str = "scale";
    pub const PREMULTIPLIED: &str = "premultiplied";

    // Primvar reader and transform inputs
    pub const VARNAME: &str = "varname";
    pub const IN: &str = "in";
    pub const ROTATION: &str = "rotation";
    pub const TRANSLATION: &str = "translation";

    /// File path placeholder marking a UDIM texture set.
    pub const UDIM_TAG: &str = "<UDIM>";
}

/// Material classification used to sort draws into passes.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum MaterialTag {
    #[default]
    Default,
    Masked,
    Additive,
    Translucent,
    Volume,
    /// Tag from shader metadata that the renderer has no pass for.
    Custom(String),
}

impl MaterialTag {
    pub fn from_token(token: &str) -> Self {
        match token {
            "defaultMaterialTag" => Self::Default,
            "masked" => Self::Masked,
            "additive" => Self::Additive,
            "translucent" => Self::Translucent,
            "volume" => Self::Volume,
            other => Self::Custom(other.to_string()),
        }
    }

    pub fn as_token(&self) -> &str {
        match self {
            Self::Default => "defaultMaterialTag",
            Self::Masked => "masked",
            Self::Additive => "additive",
            Self::Translucent => "translucent",
            Self::Volume => "volume",
            Self::Custom(s) => s,
        }
    }

    /// Alpha mode the PBR shader uses for this tag.
    pub fn alpha_mode(&self) -> AlphaMode {
        match self {
            Self::Masked => AlphaMode::Mask,
            Self::Translucent | Self::Additive => AlphaMode::Blend,
            _ => AlphaMode::Opaque,
        }
    }
}

impl fmt::Display for MaterialTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_token())
    }
}

/// Network input that feeds a texture slot. `None` for slots USD materials never author.
pub fn texture_name_for_attrib(id: TextureAttribId) -> Option<&'static str> {
    match id {
        TextureAttribId::BaseColor => Some(tokens::DIFFUSE_COLOR),
        TextureAttribId::Normal => Some(tokens::NORMAL),
        TextureAttribId::Metallic => Some(tokens::METALLIC),
        TextureAttribId::Roughness => Some(tokens::ROUGHNESS),
        TextureAttribId::PhysicalDesc => None,
        TextureAttribId::Occlusion => Some(tokens::OCCLUSION),
        TextureAttribId::Emissive => Some(tokens::EMISSIVE_COLOR),
    }
}

/// Format a material texture is loaded as. `Unknown` for names with no slot.
pub fn material_texture_format(name: &str) -> TextureFormat {
    match name {
        tokens::DIFFUSE_COLOR | tokens::EMISSIVE_COLOR | tokens::NORMAL => {
            TextureFormat::Rgba8Unorm
        }
        tokens::METALLIC | tokens::ROUGHNESS | tokens::OCCLUSION => TextureFormat::R8Unorm,
        _ => TextureFormat::Unknown,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_tokens() {
        assert_eq!(MaterialTag::from_token("masked"), MaterialTag::Masked);
        assert_eq!(MaterialTag::from_token("defaultMaterialTag"), MaterialTag::Default);
        assert_eq!(MaterialTag::from_token("hair"), MaterialTag::Custom("hair".into()));
        assert_eq!(MaterialTag::Translucent.to_string(), "translucent");
    }

    #[test]
    fn test_tag_alpha_mode() {
        assert_eq!(MaterialTag::Default.alpha_mode(), AlphaMode::Opaque);
        assert_eq!(MaterialTag::Masked.alpha_mode(), AlphaMode::Mask);
        assert_eq!(MaterialTag::Additive.alpha_mode(), AlphaMode::Blend);
        assert_eq!(MaterialTag::Volume.alpha_mode(), AlphaMode::Opaque);
    }

    #[test]
    fn test_slot_names_and_formats() {
        assert_eq!(texture_name_for_attrib(TextureAttribId::Emissive), Some("emissiveColor"));
        assert_eq!(texture_name_for_attrib(TextureAttribId::PhysicalDesc), None);
        assert_eq!(material_texture_format("normal"), TextureFormat::Rgba8Unorm);
        assert_eq!(material_texture_format("occlusion"), TextureFormat::R8Unorm);
        assert_eq!(material_texture_format("displacement"), TextureFormat::Unknown);
    }
}
