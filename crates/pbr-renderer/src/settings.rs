//! Renderer settings the material core depends on.

use serde::{Deserialize, Serialize};

use crate::flags::TextureAttribId;

/// Renderer creation settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererSettings {
    /// Number of elements in the `g_MaterialTextures` array (one per atlas format).
    pub material_textures_array_size: u32,
    /// Texture slot to texture attribute index in [`crate::MaterialData::texture_attribs`].
    pub texture_attrib_indices: [u8; TextureAttribId::COUNT],
    /// Pixel shader writes mesh id / selection into extra render targets.
    pub enable_custom_data_output: bool,
}

impl Default for RendererSettings {
    fn default() -> Self {
        Self {
            material_textures_array_size: 8,
            texture_attrib_indices: [0, 1, 2, 3, 4, 5, 6],
            enable_custom_data_output: true,
        }
    }
}

impl RendererSettings {
    /// Texture attribute index of a slot.
    #[inline]
    pub fn texture_attrib_index(&self, id: TextureAttribId) -> u8 {
        self.texture_attrib_indices[id.index()]
    }

    /// Clamp out-of-range values. Returns `true` if anything changed.
    pub fn validate(&mut self) -> bool {
        let mut changed = false;
        if self.material_textures_array_size == 0 {
            tracing::warn!("material_textures_array_size must be at least 1, using 1");
            self.material_textures_array_size = 1;
            changed = true;
        }
        for (slot, index) in self.texture_attrib_indices.iter_mut().enumerate() {
            if *index as usize >= 64 {
                tracing::warn!(
                    slot,
                    index = *index,
                    "texture attribute index out of range, using slot index"
                );
                *index = slot as u8;
                changed = true;
            }
        }
        changed
    }
}
