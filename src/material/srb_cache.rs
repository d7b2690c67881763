//! Resource bindings and shader texture indexings shared by all materials of
//! a render delegate.

use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use parking_lot::Mutex;
use pbr_renderer::{ShaderResourceBinding, StaticShaderTextureIds};
use tracing::{debug, error};

use crate::core::ObjectsRegistry;
use crate::util::{hash_slice, Error, Result};

/// Resource binding cache key: unique ids of the textures the binding references.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ResourceKey {
    pub unique_ids: Vec<i32>,
}

impl ResourceKey {
    pub fn new(unique_ids: Vec<i32>) -> Self {
        Self { unique_ids }
    }
}

impl Hash for ResourceKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(hash_slice(&self.unique_ids));
    }
}

/// Compact id of one slot-to-atlas assignment.
pub type ShaderTextureIndexingId = u32;

#[derive(Default)]
struct IndexingTable {
    ids: HashMap<StaticShaderTextureIds, ShaderTextureIndexingId>,
    indexings: Vec<StaticShaderTextureIds>,
}

/// Memoizes resource bindings by texture set and numbers texture indexings.
///
/// Both tables live as long as the owning delegate; nothing is evicted.
#[derive(Default)]
pub struct MaterialSrbCache {
    bindings: ObjectsRegistry<ResourceKey, Arc<dyn ShaderResourceBinding>>,
    indexing: Mutex<IndexingTable>,
}

impl MaterialSrbCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binding for `key`, created with `create` on first request.
    ///
    /// A failed creation is not cached.
    pub fn get_srb<F>(&self, key: &ResourceKey, create: F) -> Result<Arc<dyn ShaderResourceBinding>>
    where
        F: FnOnce() -> Result<Arc<dyn ShaderResourceBinding>>,
    {
        self.bindings.get_or_try_insert_with(key, || {
            let srb = create()?;
            debug!("Created resource binding for textures {:?}", key.unique_ids);
            Ok(srb)
        })
    }

    /// Register a slot-to-atlas assignment and return its id, for example:
    /// `[0, 0, 0, 1, 255, 1, 0] -> 0`, `[0, 1, 0, 1, 255, 1, 0] -> 1`.
    ///
    /// Equal assignments get equal ids; ids are issued densely from zero.
    pub fn add_shader_texture_indexing(
        &self,
        ids: StaticShaderTextureIds,
    ) -> ShaderTextureIndexingId {
        let mut table = self.indexing.lock();
        if let Some(&id) = table.ids.get(&ids) {
            return id;
        }

        let id = table.indexings.len() as ShaderTextureIndexingId;
        table.ids.insert(ids, id);
        table.indexings.push(ids);
        id
    }

    /// Assignment registered under `id`.
    pub fn shader_texture_indexing(
        &self,
        id: ShaderTextureIndexingId,
    ) -> Result<StaticShaderTextureIds> {
        match self.indexing.lock().indexings.get(id as usize) {
            Some(ids) => Ok(*ids),
            None => {
                error!("Shader texture indexing {} was never registered", id);
                Err(Error::UnknownTextureIndexing(id))
            }
        }
    }

    /// Number of cached bindings.
    pub fn binding_count(&self) -> usize {
        self.bindings.len()
    }

    pub fn indexing_count(&self) -> usize {
        self.indexing.lock().indexings.len()
    }
}

impl std::fmt::Debug for MaterialSrbCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MaterialSrbCache")
            .field("bindings", &self.binding_count())
            .field("indexings", &self.indexing_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pbr_renderer::headless::HeadlessRenderer;
    use pbr_renderer::{PbrRenderer, RendererSettings, INVALID_MATERIAL_TEXTURE_ID as X};

    #[test]
    fn test_indexing_ids() {
        let cache = MaterialSrbCache::new();
        let a = [0, 0, 0, 1, X, 1, 0];
        let b = [0, 1, 0, 1, X, 1, 0];

        let id_a = cache.add_shader_texture_indexing(a);
        let id_b = cache.add_shader_texture_indexing(b);
        assert_eq!(id_a, 0);
        assert_eq!(id_b, 1);
        assert_eq!(cache.add_shader_texture_indexing(a), id_a);
        assert_eq!(cache.shader_texture_indexing(id_b).unwrap(), b);
        assert_eq!(cache.indexing_count(), 2);
    }

    #[test]
    fn test_unknown_indexing() {
        let cache = MaterialSrbCache::new();
        assert!(matches!(cache.shader_texture_indexing(3), Err(Error::UnknownTextureIndexing(3))));
    }

    #[test]
    fn test_key_equality_shares_binding() {
        let renderer = HeadlessRenderer::new(RendererSettings::default());
        let cache = MaterialSrbCache::new();
        let create = || {
            renderer
                .create_resource_binding()
                .ok_or_else(|| Error::ResourceBindingCreation("headless".into()))
        };

        let a = cache.get_srb(&ResourceKey::new(vec![4, 5, 6]), create).unwrap();
        let b = cache.get_srb(&ResourceKey::new(vec![4, 5, 6]), create).unwrap();
        let c = cache.get_srb(&ResourceKey::new(vec![4, 6, 5]), create).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &c));
        assert_eq!(renderer.bindings_created(), 2);
        assert_eq!(cache.binding_count(), 2);
    }

    #[test]
    fn test_concurrent_indexing() {
        let cache = MaterialSrbCache::new();
        let ids: Vec<u32> = std::thread::scope(|s| {
            let handles: Vec<_> = (0..8)
                .map(|i| {
                    let cache = &cache;
                    s.spawn(move || {
                        cache.add_shader_texture_indexing([(i % 2) as u8, 0, 0, 0, X, 0, 0])
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });
        assert_eq!(cache.indexing_count(), 2);
        assert!(ids.iter().all(|&id| id < 2));
    }
}
