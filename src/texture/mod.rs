//! Texture registry model.
//!
//! The render delegate does not load textures itself; it asks a [`TextureRegistry`]
//! for shared [`TextureHandle`]s by logical name. A handle resolves either to a
//! standalone GPU texture or to a region of a per-format [`TextureAtlas`].
//!
//! - [`TextureRegistry`] - Allocation interface consumed by materials
//! - [`MemoryTextureRegistry`] - In-process implementation with atlas packing
//! - [`DefaultTexture`] - Flat textures substituted for unauthored material slots

mod atlas;
mod defaults;
mod handle;
mod registry;

pub use atlas::*;
pub use defaults::*;
pub use handle::*;
pub use registry::*;

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Identifies a texture asset.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TextureIdentifier {
    /// Resolved asset path. Empty when the network did not author a file.
    pub file_path: PathBuf,
}

impl TextureIdentifier {
    pub fn new(file_path: impl Into<PathBuf>) -> Self {
        Self {
            file_path: file_path.into(),
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.file_path.as_os_str().is_empty()
    }
}

impl fmt::Display for TextureIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.file_path.display())
    }
}

/// Texture coordinate wrap mode.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum WrapMode {
    Clamp,
    #[default]
    Repeat,
    Black,
    Mirror,
    /// Use the wrap mode stored in the texture file, repeat if none.
    UseMetadata,
}

impl WrapMode {
    /// Parse a shading-network wrap token.
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "clamp" => Some(Self::Clamp),
            "repeat" => Some(Self::Repeat),
            "black" => Some(Self::Black),
            "mirror" => Some(Self::Mirror),
            "useMetadata" => Some(Self::UseMetadata),
            _ => None,
        }
    }
}

/// Minification filter.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MinFilter {
    Nearest,
    Linear,
    NearestMipmapNearest,
    LinearMipmapNearest,
    NearestMipmapLinear,
    #[default]
    LinearMipmapLinear,
}

impl MinFilter {
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "nearest" => Some(Self::Nearest),
            "linear" => Some(Self::Linear),
            "nearestMipmapNearest" => Some(Self::NearestMipmapNearest),
            "linearMipmapNearest" => Some(Self::LinearMipmapNearest),
            "nearestMipmapLinear" => Some(Self::NearestMipmapLinear),
            "linearMipmapLinear" => Some(Self::LinearMipmapLinear),
            _ => None,
        }
    }
}

/// Magnification filter.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MagFilter {
    Nearest,
    #[default]
    Linear,
}

impl MagFilter {
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "nearest" => Some(Self::Nearest),
            "linear" => Some(Self::Linear),
            _ => None,
        }
    }
}

/// Sampler state requested for a texture.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SamplerParameters {
    pub wrap_s: WrapMode,
    pub wrap_t: WrapMode,
    pub wrap_r: WrapMode,
    pub min_filter: MinFilter,
    pub mag_filter: MagFilter,
}

/// Source channel for one destination channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ComponentSwizzle {
    Identity,
    Zero,
    One,
    R,
    G,
    B,
    A,
}

/// Per-channel swizzle applied when a texture is loaded.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ComponentMapping(pub [ComponentSwizzle; 4]);

impl ComponentMapping {
    pub const IDENTITY: Self = Self([ComponentSwizzle::Identity; 4]);

    #[inline]
    pub fn is_identity(&self) -> bool {
        *self == Self::IDENTITY
    }
}

impl Default for ComponentMapping {
    fn default() -> Self {
        Self::IDENTITY
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrap_tokens() {
        assert_eq!(WrapMode::from_token("clamp"), Some(WrapMode::Clamp));
        assert_eq!(WrapMode::from_token("useMetadata"), Some(WrapMode::UseMetadata));
        assert_eq!(WrapMode::from_token("bogus"), None);
        assert_eq!(MinFilter::from_token("nearest"), Some(MinFilter::Nearest));
        assert_eq!(MagFilter::from_token("linear"), Some(MagFilter::Linear));
    }

    #[test]
    fn test_identifier() {
        assert!(TextureIdentifier::default().is_empty());
        let id = TextureIdentifier::new("textures/wood.png");
        assert!(!id.is_empty());
        assert_eq!(id.to_string(), "textures/wood.png");
    }
}
