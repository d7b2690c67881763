//! Render delegate.
//!
//! Owns the collaborators materials are synced against (texture registry,
//! renderer, shader registry), the caches materials share, and the material
//! table. Materials are synced in parallel; resource bindings are committed
//! afterwards, once every texture a frame needs has been allocated.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use pbr_renderer::headless::HeadlessRenderer;
use pbr_renderer::{GpuBuffer, PbrRenderer, StaticShaderTextureIds};
use rayon::prelude::*;
use tracing::{debug, error, info_span};

use crate::config::DelegateConfig;
use crate::core::MaterialDirtyBits;
use crate::material::{
    Material, MaterialSrbCache, SceneDelegate, ShaderRegistry, ShaderTextureIndexingId,
};
use crate::texture::{MemoryTextureRegistry, TextureRegistry};
use crate::util::{Error, Result};

/// Size of the per-frame constant buffer (camera, lights, post-processing).
pub const FRAME_ATTRIBS_SIZE: u64 = 1024;

/// Shared material reference.
pub type MaterialRef = Arc<Mutex<Material>>;

pub struct RenderDelegate {
    config: DelegateConfig,
    texture_registry: Arc<dyn TextureRegistry>,
    renderer: Arc<dyn PbrRenderer>,
    shader_registry: ShaderRegistry,
    srb_cache: MaterialSrbCache,
    frame_attribs: Arc<GpuBuffer>,
    fallback_material: Mutex<Material>,
    materials: RwLock<HashMap<String, MaterialRef>>,
}

impl RenderDelegate {
    pub fn new(
        mut config: DelegateConfig,
        texture_registry: Arc<dyn TextureRegistry>,
        renderer: Arc<dyn PbrRenderer>,
    ) -> Result<Self> {
        config.validate()?;

        let fallback_material = Material::new_fallback(
            texture_registry.as_ref(),
            renderer.settings(),
            config.default_texture_dimension,
        );

        Ok(Self {
            config,
            texture_registry,
            renderer,
            shader_registry: ShaderRegistry::with_builtin_nodes(),
            srb_cache: MaterialSrbCache::new(),
            frame_attribs: GpuBuffer::new("PBR frame attribs", FRAME_ATTRIBS_SIZE),
            fallback_material: Mutex::new(fallback_material),
            materials: RwLock::new(HashMap::new()),
        })
    }

    /// Delegate over an in-memory texture registry and a headless renderer.
    pub fn headless(config: DelegateConfig) -> Result<Self> {
        let registry = Arc::new(MemoryTextureRegistry::new(config.textures.clone()));
        let renderer = Arc::new(HeadlessRenderer::new(config.renderer.clone()));
        Self::new(config, registry, renderer)
    }

    #[inline]
    pub fn config(&self) -> &DelegateConfig {
        &self.config
    }

    #[inline]
    pub fn texture_registry(&self) -> &dyn TextureRegistry {
        self.texture_registry.as_ref()
    }

    #[inline]
    pub fn renderer(&self) -> &dyn PbrRenderer {
        self.renderer.as_ref()
    }

    #[inline]
    pub fn shader_registry(&self) -> &ShaderRegistry {
        &self.shader_registry
    }

    /// Mutable access for registering custom shader nodes before the first sync.
    pub fn shader_registry_mut(&mut self) -> &mut ShaderRegistry {
        &mut self.shader_registry
    }

    #[inline]
    pub fn srb_cache(&self) -> &MaterialSrbCache {
        &self.srb_cache
    }

    #[inline]
    pub fn frame_attribs_buffer(&self) -> &Arc<GpuBuffer> {
        &self.frame_attribs
    }

    /// Material used for prims without one.
    pub fn fallback_material(&self) -> &Mutex<Material> {
        &self.fallback_material
    }

    /// Add a material. It starts fully dirty; a material with the same id is replaced.
    pub fn insert_material(&self, id: &str) -> MaterialRef {
        let material = Arc::new(Mutex::new(Material::new(id)));
        if self
            .materials
            .write()
            .insert(id.to_string(), Arc::clone(&material))
            .is_some()
        {
            debug!(material = %id, "Replaced material");
        }
        material
    }

    /// Remove a material. Returns `false` if it did not exist.
    pub fn remove_material(&self, id: &str) -> bool {
        self.materials.write().remove(id).is_some()
    }

    pub fn material(&self, id: &str) -> Option<MaterialRef> {
        self.materials.read().get(id).cloned()
    }

    pub fn material_count(&self) -> usize {
        self.materials.read().len()
    }

    /// Material ids, sorted.
    pub fn material_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.materials.read().keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Flag a material for re-sync. Returns `false` if it does not exist.
    pub fn mark_material_dirty(&self, id: &str, bits: MaterialDirtyBits) -> bool {
        match self.material(id) {
            Some(material) => {
                material.lock().mark_dirty(bits);
                true
            }
            None => false,
        }
    }

    /// Sync every dirty material from the scene, in parallel.
    pub fn sync_materials(&self, scene: &dyn SceneDelegate) {
        let _span = info_span!("sync_materials").entered();
        let materials: Vec<MaterialRef> = self.materials.read().values().cloned().collect();
        materials
            .par_iter()
            .for_each(|material| material.lock().sync(scene, self));
    }

    /// Create or refresh resource bindings of all materials, the fallback included.
    ///
    /// Failures are logged and returned per material id; they never abort the pass.
    pub fn commit_resources(&self) -> Vec<(String, Error)> {
        let _span = info_span!("commit_resources").entered();
        let mut failures = Vec::new();

        if let Err(err) = self.fallback_material.lock().update_srb(self) {
            error!("Failed to update fallback material resources: {}", err);
            failures.push((String::new(), err));
        }

        let mut materials: Vec<(String, MaterialRef)> = self
            .materials
            .read()
            .iter()
            .map(|(id, m)| (id.clone(), Arc::clone(m)))
            .collect();
        materials.sort_by(|a, b| a.0.cmp(&b.0));

        for (id, material) in materials {
            if let Err(err) = material.lock().update_srb(self) {
                error!(material = %id, "Failed to update material resources: {}", err);
                failures.push((id, err));
            }
        }

        failures
    }

    /// Slot-to-atlas assignment behind an indexing id.
    pub fn static_shader_texture_ids(
        &self,
        id: ShaderTextureIndexingId,
    ) -> Result<StaticShaderTextureIds> {
        self.srb_cache.shader_texture_indexing(id)
    }
}

impl std::fmt::Debug for RenderDelegate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderDelegate")
            .field("materials", &self.material_count())
            .field("srb_cache", &self.srb_cache)
            .finish()
    }
}
