//! # Hydrogent
//!
//! Material core of a Hydra render delegate for a PBR rasterizer.
//!
//! Turns scene-supplied shader networks (UsdPreviewSurface and friends) into
//! renderer-ready materials: a flat parameter list, allocated textures, a GPU
//! attribute block and a resource binding shared by every material that
//! samples the same textures.
//!
//! ## Modules
//!
//! - [`util`] - Errors, hashing, logging setup
//! - [`core`] - Get-or-create cache, dirty bits
//! - [`texture`] - Texture identifiers, handles, atlases and the registry
//! - [`material`] - Network extraction, materials, resource binding cache
//! - [`delegate`] - Render delegate owning materials and shared caches
//! - [`config`] - JSON configuration
//!
//! ## Example
//!
//! ```ignore
//! use hydrogent::prelude::*;
//!
//! let delegate = RenderDelegate::headless(DelegateConfig::default())?;
//! let scene: HashMap<String, MaterialNetworkMap> = load_scene()?;
//!
//! delegate.insert_material("/World/Looks/Wood");
//! delegate.sync_materials(&scene);
//! for (id, err) in delegate.commit_resources() {
//!     eprintln!("{id}: {err}");
//! }
//! ```

pub mod util;
pub mod core;
pub mod texture;
pub mod material;
pub mod delegate;
pub mod config;

// Re-export commonly used types
pub use util::{init_tracing, Error, Result};
pub use config::DelegateConfig;
pub use delegate::RenderDelegate;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::DelegateConfig;
    pub use crate::core::MaterialDirtyBits;
    pub use crate::delegate::{MaterialRef, RenderDelegate};
    pub use crate::material::{
        Material, MaterialNetwork, MaterialNetworkMap, MaterialNodeDesc, MaterialTag, ParamType,
        SceneDelegate, ShaderRegistry,
    };
    pub use crate::texture::{MemoryTextureRegistry, TextureRegistry, TextureRegistryConfig};
    pub use crate::util::{Error, Result};
}
