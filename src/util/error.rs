//! Error types for the render delegate core.

use std::path::PathBuf;
use thiserror::Error;

use pbr_renderer::{ShaderType, TextureFormat};

/// Main error type for material sync and resource binding.
#[derive(Error, Debug)]
pub enum Error {
    /// Scene-supplied material network is structurally invalid
    #[error("Malformed material network: {0}")]
    MalformedNetwork(String),

    /// Texture file could not be found or decoded
    #[error("Failed to load texture {path}: {reason}")]
    TextureLoad { path: PathBuf, reason: String },

    /// A material slot has no texture, not even a default one
    #[error("Texture '{0}' is not set; at least the default texture must always be set")]
    MissingTexture(String),

    /// The pipeline does not declare a variable the binder relies on
    #[error("Shader variable '{name}' not found in {stage} stage")]
    MissingShaderVariable { stage: ShaderType, name: String },

    /// An atlas texture is not tracked by the registry
    #[error("Texture atlas for format {0:?} not found")]
    AtlasNotFound(TextureFormat),

    /// Shader texture indexing id was never issued
    #[error("Unknown shader texture indexing id {0}")]
    UnknownTextureIndexing(u32),

    /// The renderer failed to create a resource binding
    #[error("Failed to create resource binding: {0}")]
    ResourceBindingCreation(String),

    /// Configuration the binder does not implement
    #[error("Unsupported configuration: {0}")]
    Unsupported(String),

    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Image probing/decoding error
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create an "other" error from a string.
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }

    /// Create a malformed network error.
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedNetwork(msg.into())
    }

    /// `true` for errors that mean the core and its collaborators are out of sync.
    ///
    /// These are bugs, not authoring problems, and are not expected in production.
    pub fn is_contract_violation(&self) -> bool {
        matches!(
            self,
            Self::MissingTexture(_)
                | Self::MissingShaderVariable { .. }
                | Self::AtlasNotFound(_)
                | Self::UnknownTextureIndexing(_)
                | Self::ResourceBindingCreation(_)
        )
    }
}

/// Result type alias for render delegate operations.
pub type Result<T> = std::result::Result<T, Error>;
