//! Material texture slots and pipeline feature flags.

use serde::{Deserialize, Serialize};

use crate::params::{MaterialShaderAttribs, TextureShaderAttribs};

/// Material texture slot.
///
/// The discriminant doubles as the index into [`StaticShaderTextureIds`].
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TextureAttribId {
    BaseColor = 0,
    Normal,
    Metallic,
    Roughness,
    /// Packed metallic/roughness map. Not produced by USD preview materials.
    PhysicalDesc,
    Occlusion,
    Emissive,
}

impl TextureAttribId {
    /// Number of texture slots.
    pub const COUNT: usize = 7;

    /// All slots in shader order.
    pub const ALL: [Self; Self::COUNT] = [
        Self::BaseColor,
        Self::Normal,
        Self::Metallic,
        Self::Roughness,
        Self::PhysicalDesc,
        Self::Occlusion,
        Self::Emissive,
    ];

    /// Slot index.
    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    /// Shader variable the slot texture is bound to when atlases are not used.
    pub fn shader_name(self) -> &'static str {
        match self {
            Self::BaseColor => "g_ColorMap",
            Self::Normal => "g_NormalMap",
            Self::Metallic => "g_MetallicMap",
            Self::Roughness => "g_RoughnessMap",
            Self::PhysicalDesc => "g_PhysicalDescriptorMap",
            Self::Occlusion => "g_AOMap",
            Self::Emissive => "g_EmissiveMap",
        }
    }

    /// Pipeline flag that enables sampling of this slot.
    pub fn pso_flag(self) -> PsoFlags {
        match self {
            Self::BaseColor => PsoFlags::USE_COLOR_MAP,
            Self::Normal => PsoFlags::USE_NORMAL_MAP,
            Self::Metallic => PsoFlags::USE_METALLIC_MAP,
            Self::Roughness => PsoFlags::USE_ROUGHNESS_MAP,
            Self::PhysicalDesc => PsoFlags::USE_PHYS_DESC_MAP,
            Self::Occlusion => PsoFlags::USE_AO_MAP,
            Self::Emissive => PsoFlags::USE_EMISSIVE_MAP,
        }
    }
}

/// Per-slot texture array index used by atlas-sampling shaders.
///
/// `ids[slot]` is the index of the atlas (in `g_MaterialTextures`) the slot samples from,
/// or [`INVALID_MATERIAL_TEXTURE_ID`].
pub type StaticShaderTextureIds = [u8; TextureAttribId::COUNT];

/// Marks a slot that does not sample from any atlas.
pub const INVALID_MATERIAL_TEXTURE_ID: u8 = 0xFF;

bitflags::bitflags! {
    /// Shader features a pipeline is compiled with.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct PsoFlags: u64 {
        const USE_COLOR_MAP = 1 << 0;
        const USE_NORMAL_MAP = 1 << 1;
        const USE_METALLIC_MAP = 1 << 2;
        const USE_ROUGHNESS_MAP = 1 << 3;
        const USE_PHYS_DESC_MAP = 1 << 4;
        const USE_AO_MAP = 1 << 5;
        const USE_EMISSIVE_MAP = 1 << 6;
        const USE_TEXCOORD0 = 1 << 7;
        const USE_TEXCOORD1 = 1 << 8;
        const USE_TEXTURE_ATLAS = 1 << 9;
        const ENABLE_CLEAR_COAT = 1 << 10;
        const ENABLE_CUSTOM_DATA_OUTPUT = 1 << 11;

        const ALL_TEXTURE_MAPS = Self::USE_COLOR_MAP.bits()
            | Self::USE_NORMAL_MAP.bits()
            | Self::USE_METALLIC_MAP.bits()
            | Self::USE_ROUGHNESS_MAP.bits()
            | Self::USE_PHYS_DESC_MAP.bits()
            | Self::USE_AO_MAP.bits()
            | Self::USE_EMISSIVE_MAP.bits();
    }
}

/// Size of the node + previous-frame transforms at the head of the primitive block.
pub const PRIMITIVE_TRANSFORMS_SIZE: u64 = 2 * 64;

/// Size of the custom data vector at the tail of the primitive block.
pub const PRIMITIVE_CUSTOM_DATA_SIZE: u64 = 16;

/// Size in bytes of one primitive's attributes in the primitive constant buffer.
///
/// Layout: transforms, material attributes, one texture attribute block per
/// enabled texture map, optional custom data.
pub fn primitive_attribs_size(flags: PsoFlags) -> u64 {
    let num_texture_attribs = TextureAttribId::ALL
        .iter()
        .filter(|id| flags.contains(id.pso_flag()))
        .count() as u64;

    let mut size = PRIMITIVE_TRANSFORMS_SIZE
        + std::mem::size_of::<MaterialShaderAttribs>() as u64
        + num_texture_attribs * std::mem::size_of::<TextureShaderAttribs>() as u64;
    if flags.contains(PsoFlags::ENABLE_CUSTOM_DATA_OUTPUT) {
        size += PRIMITIVE_CUSTOM_DATA_SIZE;
    }
    size
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slot_order() {
        for (i, id) in TextureAttribId::ALL.iter().enumerate() {
            assert_eq!(id.index(), i);
        }
        assert_eq!(TextureAttribId::Occlusion.shader_name(), "g_AOMap");
    }

    #[test]
    fn test_primitive_attribs_size() {
        let base = primitive_attribs_size(PsoFlags::empty());
        assert_eq!(base, 128 + 80);

        let with_maps = primitive_attribs_size(PsoFlags::USE_COLOR_MAP | PsoFlags::USE_NORMAL_MAP);
        assert_eq!(with_maps, base + 2 * 48);

        let custom = primitive_attribs_size(PsoFlags::ENABLE_CUSTOM_DATA_OUTPUT);
        assert_eq!(custom, base + PRIMITIVE_CUSTOM_DATA_SIZE);
    }
}
