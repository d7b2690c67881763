//! Render delegate material.
//!
//! A [`Material`] owns the network extracted for one scene material, the
//! texture handles it resolved, the shader attribute block derived from both,
//! and a resource binding shared with every material that samples the same
//! textures.

use std::collections::HashMap;
use std::sync::Arc;

use glam::{Mat2, Vec4};
use pbr_renderer::{
    GpuTexture, MaterialBuilder, MaterialData, PsoFlags, RendererSettings, ShaderResourceBinding,
    ShaderResourceVariable, ShaderType, StaticShaderTextureIds, TextureAttribId, TextureFormat,
    Workflow, INVALID_MATERIAL_TEXTURE_ID, MATERIAL_TEXTURES_VAR, PRIMITIVE_ATTRIBS_VAR,
};
use tracing::{debug, debug_span, error, info, warn};

use super::tokens;
use super::{
    material_texture_format, texture_name_for_attrib, FallbackValue, MaterialNetwork, ParamType,
    ResourceKey, SceneDelegate, ShaderTextureIndexingId,
};
use crate::core::MaterialDirtyBits;
use crate::delegate::RenderDelegate;
use crate::texture::{
    default_sampler, ComponentMapping, DefaultTexture, TextureData, TextureHandleRef,
    TextureRegistry, TextureResource,
};
use crate::util::{Error, Result};

/// Texture coordinate set read by a material.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TextureCoordinateSet {
    /// Primvar holding the coordinates, e.g. `st`.
    pub primvar: String,
}

/// Texture name to texture coordinate set index, e.g. `diffuseColor -> 0`.
type TexNameToCoordSet = HashMap<String, usize>;

/// Scene material and its GPU-side state.
pub struct Material {
    id: String,
    network: MaterialNetwork,
    /// Slot name to texture. Every slot has an entry after a sync, at least a default texture.
    textures: HashMap<String, TextureHandleRef>,
    tex_coords: Vec<TextureCoordinateSet>,
    data: MaterialData,
    uses_atlas: bool,

    srb: Option<Arc<dyn ShaderResourceBinding>>,
    primitive_attribs_var: Option<Arc<dyn ShaderResourceVariable>>,
    atlas_version: u32,
    indexing_id: ShaderTextureIndexingId,

    dirty_bits: MaterialDirtyBits,
}

impl Material {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            network: MaterialNetwork::default(),
            textures: HashMap::new(),
            tex_coords: Vec::new(),
            data: initial_material_data(),
            uses_atlas: false,
            srb: None,
            primitive_attribs_var: None,
            atlas_version: 0,
            indexing_id: 0,
            dirty_bits: MaterialDirtyBits::ALL_DIRTY,
        }
    }

    /// Material used when a prim has no material. It is never synced, so its
    /// texture attributes are initialized with defaults right away.
    pub fn new_fallback(
        registry: &dyn TextureRegistry,
        settings: &RendererSettings,
        default_texture_dim: u32,
    ) -> Self {
        let mut material = Self::new("");
        material.init_texture_attribs(
            registry,
            settings,
            default_texture_dim,
            &TexNameToCoordSet::new(),
        );
        material.dirty_bits = MaterialDirtyBits::CLEAN;
        material
    }

    #[inline]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[inline]
    pub fn network(&self) -> &MaterialNetwork {
        &self.network
    }

    #[inline]
    pub fn material_data(&self) -> &MaterialData {
        &self.data
    }

    #[inline]
    pub fn uses_atlas(&self) -> bool {
        self.uses_atlas
    }

    /// Texture bound to a slot (`diffuseColor`, `normal`, ...).
    pub fn texture(&self, name: &str) -> Option<&TextureHandleRef> {
        self.textures.get(name)
    }

    pub fn texture_coordinate_sets(&self) -> &[TextureCoordinateSet] {
        &self.tex_coords
    }

    /// Resource binding valid for the atlas version of the last [`Self::update_srb`].
    pub fn srb(&self) -> Option<&Arc<dyn ShaderResourceBinding>> {
        self.srb.as_ref()
    }

    /// Per-primitive attribute buffer variable of the binding.
    pub fn primitive_attribs_var(&self) -> Option<&Arc<dyn ShaderResourceVariable>> {
        self.primitive_attribs_var.as_ref()
    }

    /// Slot-to-atlas assignment id. Zero until an atlas-using material is bound.
    #[inline]
    pub fn shader_texture_indexing_id(&self) -> ShaderTextureIndexingId {
        self.indexing_id
    }

    #[inline]
    pub fn dirty_bits(&self) -> MaterialDirtyBits {
        self.dirty_bits
    }

    pub fn mark_dirty(&mut self, bits: MaterialDirtyBits) {
        self.dirty_bits |= bits;
    }

    /// Pipeline features this material needs.
    pub fn pso_flags(&self, settings: &RendererSettings) -> PsoFlags {
        // Default textures fill every unauthored slot
        let mut flags = PsoFlags::ALL_TEXTURE_MAPS | PsoFlags::USE_TEXCOORD0;
        if self.tex_coords.len() > 1 {
            flags |= PsoFlags::USE_TEXCOORD1;
        }
        if self.uses_atlas {
            flags |= PsoFlags::USE_TEXTURE_ATLAS;
        }
        if self.data.has_clearcoat {
            flags |= PsoFlags::ENABLE_CLEAR_COAT;
        }
        if settings.enable_custom_data_output {
            flags |= PsoFlags::ENABLE_CUSTOM_DATA_OUTPUT;
        }
        flags
    }

    /// Rebuild the network, textures and shader attributes from the scene.
    ///
    /// Extraction errors leave the material with an empty network; texture
    /// attributes are initialized with defaults in every case.
    pub fn sync(&mut self, scene: &dyn SceneDelegate, delegate: &RenderDelegate) {
        if self.dirty_bits.is_clean() {
            return;
        }
        let _span = debug_span!("material_sync", material = %self.id).entered();

        let registry = delegate.texture_registry();
        self.reset();

        let mut tex_name_to_coord_set = TexNameToCoordSet::new();
        if let Some(map) = scene.material_resource(&self.id) {
            if !map.is_empty() {
                match MaterialNetwork::new(&self.id, &map, delegate.shader_registry()) {
                    Ok(network) => {
                        self.network = network;
                        tex_name_to_coord_set = self.allocate_textures(registry);
                        self.process_material_network();
                    }
                    Err(err) => {
                        error!(material = %self.id, "Failed to create material network: {}", err);
                        self.network = MaterialNetwork::default();
                    }
                }
            }
        }

        self.init_texture_attribs(
            registry,
            delegate.renderer().settings(),
            delegate.config().default_texture_dimension,
            &tex_name_to_coord_set,
        );

        self.dirty_bits = MaterialDirtyBits::CLEAN;
    }

    fn reset(&mut self) {
        self.network = MaterialNetwork::default();
        self.textures.clear();
        self.tex_coords.clear();
        self.data = initial_material_data();
        self.uses_atlas = false;
        self.atlas_version = 0;
        self.indexing_id = 0;
        self.srb = None;
        self.primitive_attribs_var = None;
    }

    fn allocate_textures(&mut self, registry: &dyn TextureRegistry) -> TexNameToCoordSet {
        let mut tex_name_to_coord_set = TexNameToCoordSet::new();
        // Coordinate primvar to coordinate set index, e.g. "st" -> 0
        let mut primvar_to_coord_set: HashMap<String, usize> = HashMap::new();

        for desc in self.network.textures() {
            let format = material_texture_format(&desc.name);
            if format == TextureFormat::Unknown {
                info!(material = %self.id, texture = %desc.name, "Skipping unknown texture");
                continue;
            }

            if desc.texture_id.is_empty() {
                error!(material = %self.id, texture = %desc.name, "Texture has no file path");
                continue;
            }

            let Some(handle) = registry.allocate(&desc.texture_id, format, &desc.sampler_params)
            else {
                continue;
            };
            self.textures.insert(desc.name.clone(), handle);

            let mut coord_set = None;
            if let Some(param) = self.network.parameter(ParamType::Texture, &desc.name) {
                match param.sampler_coords.first() {
                    Some(primvar) => {
                        if param.sampler_coords.len() > 1 {
                            warn!(
                                texture = %desc.name,
                                "Texture has {} texture coordinates. Only the first set is used",
                                param.sampler_coords.len()
                            );
                        }
                        let next = self.tex_coords.len();
                        let idx = *primvar_to_coord_set.entry(primvar.clone()).or_insert(next);
                        if idx == next {
                            self.tex_coords.push(TextureCoordinateSet {
                                primvar: primvar.clone(),
                            });
                        }
                        tex_name_to_coord_set.insert(desc.name.clone(), idx);
                        coord_set = Some(idx);
                    }
                    None => {
                        error!(
                            material = %self.id,
                            texture = %desc.name,
                            "Texture has no texture coordinates"
                        );
                    }
                }
            }

            if coord_set.is_none() {
                error!(
                    material = %self.id,
                    texture = %desc.name,
                    "Failed to find texture coordinates"
                );
            }
        }

        tex_name_to_coord_set
    }

    fn process_material_network(&mut self) {
        let network = &self.network;
        let attribs = &mut self.data.attribs;

        let fallback = |name: &str| {
            network
                .parameter(ParamType::Fallback, name)
                .and_then(|p| p.fallback_value)
        };
        let input_scale = |name: &str| {
            network
                .parameter(ParamType::Texture, name)
                .map(|p| p.input_scale)
        };

        if let Some(v) = fallback(tokens::DIFFUSE_COLOR) {
            attribs.base_color_factor = v.to_vec3().extend(1.0);
        }
        if let Some(v) = fallback(tokens::METALLIC) {
            attribs.metallic_factor = v.to_float();
        }
        if let Some(v) = fallback(tokens::ROUGHNESS) {
            attribs.roughness_factor = v.to_float();
        }
        if let Some(v) = fallback(tokens::OCCLUSION) {
            attribs.occlusion_factor = v.to_float();
        }
        attribs.emissive_factor = match fallback(tokens::EMISSIVE_COLOR) {
            Some(v) => v.to_vec3().extend(1.0),
            None if self.textures.contains_key(tokens::EMISSIVE_COLOR) => Vec4::ONE,
            None => Vec4::ZERO,
        };

        if let Some(scale) = input_scale(tokens::DIFFUSE_COLOR) {
            attribs.base_color_factor *= scale;
        }
        if let Some(scale) = input_scale(tokens::METALLIC) {
            attribs.metallic_factor *= scale.x;
        }
        if let Some(scale) = input_scale(tokens::ROUGHNESS) {
            attribs.roughness_factor *= scale.x;
        }
        if let Some(scale) = input_scale(tokens::OCCLUSION) {
            attribs.occlusion_factor *= scale.x;
        }
        if let Some(scale) = input_scale(tokens::EMISSIVE_COLOR) {
            attribs.emissive_factor *= scale;
        }

        if let Some(clearcoat) = fallback(tokens::CLEARCOAT).map(FallbackValue::to_float) {
            attribs.clearcoat_factor = clearcoat;
            if clearcoat > 0.0 {
                self.data.has_clearcoat = true;
                if let Some(v) = fallback(tokens::CLEARCOAT_ROUGHNESS) {
                    attribs.clearcoat_roughness_factor = v.to_float();
                }
            }
        }

        attribs.set_alpha_mode(network.tag().alpha_mode());
        attribs.alpha_cutoff = network.opacity_threshold();
        attribs.base_color_factor.w = network.opacity();
    }

    fn init_texture_attribs(
        &mut self,
        registry: &dyn TextureRegistry,
        settings: &RendererSettings,
        default_texture_dim: u32,
        tex_name_to_coord_set: &TexNameToCoordSet,
    ) {
        let mut builder = MaterialBuilder::new(&mut self.data);

        for id in TextureAttribId::ALL {
            let Some(name) = texture_name_for_attrib(id) else {
                continue;
            };

            let tex_attribs = builder.texture_attrib(settings.texture_attrib_index(id));
            tex_attribs.uv_selector = tex_name_to_coord_set
                .get(name)
                .map_or(0.0, |&idx| idx as f32);
            tex_attribs.u_bias = 0.0;
            tex_attribs.v_bias = 0.0;
            tex_attribs.uv_scale_and_rotation = Mat2::IDENTITY;

            let handle = match self.textures.get(name) {
                Some(handle) => {
                    if let Some(param) = self.network.parameter(ParamType::Transform2d, name) {
                        let xform = &param.transform2d;
                        let mut uv_scale_and_rotation = Mat2::from_diagonal(xform.scale);
                        if xform.rotation != 0.0 {
                            uv_scale_and_rotation *= Mat2::from_angle(xform.rotation.to_radians());
                        }
                        tex_attribs.u_bias = xform.translation.x;
                        tex_attribs.v_bias = xform.translation.y;
                        tex_attribs.uv_scale_and_rotation = uv_scale_and_rotation;
                    }
                    Arc::clone(handle)
                }
                None => match default_texture(registry, name, default_texture_dim) {
                    Ok(handle) => {
                        self.textures.insert(name.to_string(), Arc::clone(&handle));
                        handle
                    }
                    Err(err) => {
                        error!(
                            material = %self.id,
                            texture = %name,
                            "Failed to allocate default texture: {}",
                            err
                        );
                        continue;
                    }
                },
            };

            match handle.resource() {
                TextureResource::Atlas(sub) => {
                    tex_attribs.texture_slice = sub.slice() as f32;
                    tex_attribs.atlas_uv_scale_and_bias = sub.uv_scale_bias();
                    self.uses_atlas = true;
                }
                TextureResource::Standalone(_) => {
                    tex_attribs.texture_slice = 0.0;
                    tex_attribs.atlas_uv_scale_and_bias = Vec4::new(1.0, 1.0, 0.0, 0.0);
                }
            }
        }

        builder.finalize();
    }

    /// Create or reuse the resource binding.
    ///
    /// A binding of an atlas-using material is dropped when the atlas version
    /// changes; otherwise an existing binding is kept. Materials that reference
    /// the same textures share one binding.
    pub fn update_srb(&mut self, delegate: &RenderDelegate) -> Result<()> {
        let registry = delegate.texture_registry();
        let atlas_version = registry.atlas_version();
        if self.uses_atlas && atlas_version != self.atlas_version {
            debug!(material = %self.id, "Atlas version changed, releasing resource binding");
            self.srb = None;
            self.primitive_attribs_var = None;
        }

        if self.srb.is_some() {
            return Ok(());
        }

        let renderer = delegate.renderer();
        let settings = renderer.settings();
        let srb_cache = delegate.srb_cache();
        let array_size = settings.material_textures_array_size as usize;

        // Atlas format to its index in the material texture array, e.g.
        // Rgba8Unorm -> 0, R8Unorm -> 1
        let atlas_format_ids: HashMap<TextureFormat, u8> = if self.uses_atlas {
            registry
                .allocated_atlas_formats()
                .into_iter()
                .enumerate()
                .map(|(i, fmt)| (fmt, i as u8))
                .collect()
        } else {
            HashMap::new()
        };

        let mut key = ResourceKey::default();
        let mut all_in_atlases = true;
        let mut slot_textures: Vec<(TextureAttribId, Arc<GpuTexture>)> =
            Vec::with_capacity(TextureAttribId::COUNT);
        let mut static_ids: StaticShaderTextureIds =
            [INVALID_MATERIAL_TEXTURE_ID; TextureAttribId::COUNT];

        for id in TextureAttribId::ALL {
            let Some(name) = texture_name_for_attrib(id) else {
                continue;
            };

            let Some(handle) = self.textures.get(name) else {
                error!(
                    material = %self.id,
                    texture = %name,
                    "Texture is not set; at least the default texture must always be set"
                );
                return Err(Error::MissingTexture(name.to_string()));
            };

            let texture = match handle.resource() {
                TextureResource::Standalone(texture) => {
                    all_in_atlases = false;
                    Arc::clone(texture)
                }
                TextureResource::Atlas(sub) => {
                    let texture = sub.atlas().texture();
                    match atlas_format_ids.get(&texture.format()) {
                        Some(&atlas_id) => static_ids[id.index()] = atlas_id,
                        None => {
                            error!(
                                material = %self.id,
                                texture = %name,
                                "Texture atlas {:?} is not tracked by the registry",
                                texture.format()
                            );
                            return Err(Error::AtlasNotFound(texture.format()));
                        }
                    }
                    texture
                }
            };

            if !self.uses_atlas {
                key.unique_ids.push(texture.unique_id());
            }
            slot_textures.push((id, texture));
        }

        let mut atlas_textures: Vec<Arc<GpuTexture>> = Vec::new();
        if self.uses_atlas {
            if !all_in_atlases {
                error!(
                    material = %self.id,
                    "Mixing atlas and standalone textures is not implemented"
                );
                return Err(Error::Unsupported(format!(
                    "material {} mixes atlas and standalone textures",
                    self.id
                )));
            }
            atlas_textures = self.atlas_texture_array(delegate, &atlas_format_ids, array_size)?;
            key.unique_ids
                .extend(atlas_textures.iter().map(|tex| tex.unique_id()));

            self.indexing_id = srb_cache.add_shader_texture_indexing(static_ids);
        }

        let uses_atlas = self.uses_atlas;
        let attribs_size = renderer.primitive_attribs_size(self.pso_flags(settings));
        let srb = srb_cache.get_srb(&key, || {
            let srb = renderer.create_resource_binding().ok_or_else(|| {
                error!(material = %self.id, "Failed to create shader resource binding");
                Error::ResourceBindingCreation(format!("material {}", self.id))
            })?;

            // The primitive attribs buffer holds many primitives; draws select
            // one with a dynamic offset
            let Some(var) = srb.variable_by_name(ShaderType::Pixel, PRIMITIVE_ATTRIBS_VAR) else {
                error!(
                    "Failed to find '{}' variable in the shader resource binding",
                    PRIMITIVE_ATTRIBS_VAR
                );
                return Err(Error::MissingShaderVariable {
                    stage: ShaderType::Pixel,
                    name: PRIMITIVE_ATTRIBS_VAR.to_string(),
                });
            };
            var.set_buffer_range(renderer.primitive_attribs_buffer(), 0, attribs_size);

            renderer.init_common_srb_vars(srb.as_ref(), delegate.frame_attribs_buffer());

            if uses_atlas {
                match srb.variable_by_name(ShaderType::Pixel, MATERIAL_TEXTURES_VAR) {
                    Some(var) => var.set_array(&atlas_textures, 0),
                    None => warn!(
                        "'{}' variable not found in the shader resource binding",
                        MATERIAL_TEXTURES_VAR
                    ),
                }
            } else {
                for (id, texture) in &slot_textures {
                    renderer.set_material_texture(srb.as_ref(), texture, *id);
                }
            }

            Ok(srb)
        })?;

        let Some(var) = srb.variable_by_name(ShaderType::Pixel, PRIMITIVE_ATTRIBS_VAR) else {
            error!(
                material = %self.id,
                "Resource binding has no '{}' variable",
                PRIMITIVE_ATTRIBS_VAR
            );
            return Err(Error::MissingShaderVariable {
                stage: ShaderType::Pixel,
                name: PRIMITIVE_ATTRIBS_VAR.to_string(),
            });
        };
        self.primitive_attribs_var = Some(var);
        self.srb = Some(srb);
        self.atlas_version = atlas_version;
        Ok(())
    }

    /// Atlas textures by their index in `atlas_format_ids`, unused elements
    /// padded with the white default texture's atlas.
    fn atlas_texture_array(
        &self,
        delegate: &RenderDelegate,
        atlas_format_ids: &HashMap<TextureFormat, u8>,
        array_size: usize,
    ) -> Result<Vec<Arc<GpuTexture>>> {
        let registry = delegate.texture_registry();

        let mut textures: Vec<Option<Arc<GpuTexture>>> = vec![None; array_size];
        for (&format, &idx) in atlas_format_ids {
            let Some(slot) = textures.get_mut(idx as usize) else {
                error!(
                    "Atlas {:?} does not fit into a material texture array of {} elements",
                    format, array_size
                );
                return Err(Error::Unsupported(format!(
                    "{} atlas formats exceed material texture array size {}",
                    atlas_format_ids.len(),
                    array_size
                )));
            };
            let Some(texture) = registry.atlas_texture(format) else {
                error!("Texture atlas {:?} was not found", format);
                return Err(Error::AtlasNotFound(format));
            };
            *slot = Some(texture);
        }

        if textures.iter().any(Option::is_none) {
            let white = default_texture(
                registry,
                tokens::DIFFUSE_COLOR,
                delegate.config().default_texture_dimension,
            )?;
            let Some(sub) = white.atlas_suballocation() else {
                error!("Default white texture is not in an atlas");
                return Err(Error::AtlasNotFound(white.format()));
            };
            let white = sub.atlas().texture();
            for slot in textures.iter_mut().filter(|t| t.is_none()) {
                *slot = Some(Arc::clone(&white));
            }
        }

        Ok(textures.into_iter().flatten().collect())
    }
}

impl std::fmt::Debug for Material {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Material")
            .field("id", &self.id)
            .field("tag", self.network.tag())
            .field("textures", &self.textures.len())
            .field("uses_atlas", &self.uses_atlas)
            .field("has_srb", &self.srb.is_some())
            .field("dirty_bits", &self.dirty_bits)
            .finish()
    }
}

fn initial_material_data() -> MaterialData {
    let mut data = MaterialData::default();
    data.attribs.base_color_factor = Vec4::ONE;
    data.attribs.specular_factor = Vec4::ONE;
    data.attribs.metallic_factor = 1.0;
    data.attribs.roughness_factor = 1.0;
    data.attribs.occlusion_factor = 1.0;
    data.attribs.set_workflow(Workflow::MetallicRoughness);
    data
}

/// Default texture kind for a material slot.
pub fn default_texture_kind(name: &str) -> DefaultTexture {
    match name {
        tokens::DIFFUSE_COLOR | tokens::EMISSIVE_COLOR => DefaultTexture::WhiteRgba8,
        tokens::NORMAL => DefaultTexture::Normal,
        tokens::METALLIC | tokens::ROUGHNESS | tokens::OCCLUSION => DefaultTexture::WhiteR8,
        _ => {
            error!(texture = %name, "Unknown texture name");
            DefaultTexture::BlackRgba8
        }
    }
}

/// Allocate the default texture of a material slot.
pub fn default_texture(
    registry: &dyn TextureRegistry,
    name: &str,
    dimension: u32,
) -> Result<TextureHandleRef> {
    let kind = default_texture_kind(name);
    let loader = || -> Result<TextureData> { Ok(kind.create_image(dimension)) };
    registry.allocate_with_loader(
        &kind.path(),
        ComponentMapping::IDENTITY,
        &default_sampler(),
        &loader,
    )
}
