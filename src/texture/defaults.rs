//! Flat default textures.

use std::fmt;

use super::{MagFilter, MinFilter, SamplerParameters, WrapMode};

/// Prefix of the logical names default textures are registered under.
pub const DEFAULT_TEXTURE_PREFIX: &str = "$Default-";

/// Decoded texel data handed to a registry by a loader.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TextureData {
    pub width: u32,
    pub height: u32,
    pub num_components: u32,
    pub pixels: Vec<u8>,
}

impl TextureData {
    /// Image filled with one texel value.
    pub fn solid(width: u32, height: u32, texel: &[u8]) -> Self {
        let count = (width * height) as usize;
        let mut pixels = Vec::with_capacity(count * texel.len());
        for _ in 0..count {
            pixels.extend_from_slice(texel);
        }
        Self {
            width,
            height,
            num_components: texel.len() as u32,
            pixels,
        }
    }

    pub fn texel(&self, x: u32, y: u32) -> &[u8] {
        let n = self.num_components as usize;
        let start = (y * self.width + x) as usize * n;
        &self.pixels[start..start + n]
    }
}

/// Textures substituted for material slots the network does not drive.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DefaultTexture {
    WhiteRgba8,
    BlackRgba8,
    WhiteR8,
    /// Flat tangent-space normal (0.5, 0.5, 1).
    Normal,
}

impl DefaultTexture {
    pub const ALL: [DefaultTexture; 4] =
        [Self::WhiteRgba8, Self::BlackRgba8, Self::WhiteR8, Self::Normal];

    pub fn name(self) -> &'static str {
        match self {
            Self::WhiteRgba8 => "whiteRgba8",
            Self::BlackRgba8 => "blackRgba8",
            Self::WhiteR8 => "whiteR8",
            Self::Normal => "normal",
        }
    }

    /// Logical path the registry knows this texture by.
    pub fn path(self) -> String {
        format!("{}{}", DEFAULT_TEXTURE_PREFIX, self.name())
    }

    fn texel(self) -> &'static [u8] {
        match self {
            Self::WhiteRgba8 => &[255, 255, 255, 255],
            Self::BlackRgba8 => &[0, 0, 0, 0],
            Self::WhiteR8 => &[255],
            Self::Normal => &[128, 128, 255, 0],
        }
    }

    /// Generate the image at `dimension` x `dimension`.
    pub fn create_image(self, dimension: u32) -> TextureData {
        TextureData::solid(dimension, dimension, self.texel())
    }
}

impl fmt::Display for DefaultTexture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Sampler used for default textures.
pub fn default_sampler() -> SamplerParameters {
    SamplerParameters {
        wrap_s: WrapMode::Repeat,
        wrap_t: WrapMode::Repeat,
        wrap_r: WrapMode::Repeat,
        min_filter: MinFilter::LinearMipmapLinear,
        mag_filter: MagFilter::Linear,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_paths() {
        assert_eq!(DefaultTexture::WhiteR8.path(), "$Default-whiteR8");
        assert_eq!(DefaultTexture::Normal.path(), "$Default-normal");
    }

    #[test]
    fn test_default_images() {
        let normal = DefaultTexture::Normal.create_image(64);
        assert_eq!((normal.width, normal.height, normal.num_components), (64, 64, 4));
        assert_eq!(normal.texel(17, 40), &[128, 128, 255, 0]);

        let white = DefaultTexture::WhiteR8.create_image(8);
        assert_eq!(white.num_components, 1);
        assert!(white.pixels.iter().all(|&p| p == 255));
        assert_eq!(white.pixels.len(), 64);

        let black = DefaultTexture::BlackRgba8.create_image(2);
        assert!(black.pixels.iter().all(|&p| p == 0));
    }
}
