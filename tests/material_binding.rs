//! Material sync and resource binding through the render delegate.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use glam::Vec4;
use hydrogent::prelude::*;
use hydrogent::texture::{
    default_sampler, ComponentMapping, SamplerParameters, TextureData, TextureHandleRef,
    TextureIdentifier, TextureLoader,
};
use pbr_renderer::headless::{BoundResource, HeadlessRenderer, HeadlessResourceBinding};
use pbr_renderer::{
    primitive_attribs_size, GpuTexture, PsoFlags, ShaderResourceBinding, ShaderType,
    TextureAttribId, TextureFormat, INVALID_MATERIAL_TEXTURE_ID as X, FRAME_ATTRIBS_VAR,
    MATERIAL_TEXTURES_VAR, PRIMITIVE_ATTRIBS_VAR,
};

type Scene = HashMap<String, MaterialNetworkMap>;

fn write_png(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    image::RgbaImage::from_pixel(8, 8, image::Rgba([200, 100, 50, 255]))
        .save(&path)
        .unwrap();
    path
}

fn plain(roughness: f32) -> MaterialNetworkMap {
    let mut map = MaterialNetworkMap::new();
    map.add_node(
        "/M/Surface",
        MaterialNodeDesc::new("UsdPreviewSurface").with_param("roughness", roughness),
    )
    .set_terminal("surface", "/M/Surface", "surface");
    map
}

/// Preview surface with `(input, file, uv primvar)` textures.
fn textured(textures: &[(&str, &Path, &str)]) -> MaterialNetworkMap {
    let mut surface = MaterialNodeDesc::new("UsdPreviewSurface");
    let mut map = MaterialNetworkMap::new();
    for (i, (input, file, primvar)) in textures.iter().enumerate() {
        let tex = format!("/M/Tex{}", i);
        let reader = format!("/M/Reader{}", i);
        let output = match *input {
            "diffuseColor" | "emissiveColor" | "normal" => "rgb",
            _ => "r",
        };
        surface = surface.with_connection(input, &tex, output);
        map.add_node(
            &tex,
            MaterialNodeDesc::new("UsdUVTexture")
                .with_param("file", file.to_str().unwrap())
                .with_connection("st", &reader, "result"),
        )
        .add_node(
            &reader,
            MaterialNodeDesc::new("UsdPrimvarReader_float2").with_param("varname", *primvar),
        );
    }
    map.add_node("/M/Surface", surface)
        .set_terminal("surface", "/M/Surface", "surface");
    map
}

fn atlas_config() -> DelegateConfig {
    let mut config = DelegateConfig::default();
    config.textures.atlas_formats = vec![TextureFormat::Rgba8Unorm, TextureFormat::R8Unorm];
    config.textures.atlas_dimension = 64;
    config.textures.atlas_region_size = 16;
    config.default_texture_dimension = 16;
    config
}

fn headless(srb: &Arc<dyn ShaderResourceBinding>) -> &HeadlessResourceBinding {
    srb.as_any().downcast_ref::<HeadlessResourceBinding>().unwrap()
}

fn srb_of(delegate: &RenderDelegate, id: &str) -> Arc<dyn ShaderResourceBinding> {
    delegate.material(id).unwrap().lock().srb().cloned().unwrap()
}

fn slot_texture(handle: &TextureHandleRef) -> Arc<GpuTexture> {
    handle.texture().cloned().unwrap()
}

/// Memory registry whose atlas version can be bumped by hand.
struct BumpingRegistry {
    inner: MemoryTextureRegistry,
    bumps: AtomicU32,
}

impl TextureRegistry for BumpingRegistry {
    fn allocate(
        &self,
        id: &TextureIdentifier,
        format: TextureFormat,
        sampler: &SamplerParameters,
    ) -> Option<TextureHandleRef> {
        self.inner.allocate(id, format, sampler)
    }

    fn allocate_with_loader(
        &self,
        path: &str,
        mapping: ComponentMapping,
        sampler: &SamplerParameters,
        loader: &TextureLoader<'_>,
    ) -> Result<TextureHandleRef> {
        self.inner.allocate_with_loader(path, mapping, sampler, loader)
    }

    fn atlas_version(&self) -> u32 {
        self.inner.atlas_version() + self.bumps.load(Ordering::Acquire)
    }

    fn allocated_atlas_formats(&self) -> Vec<TextureFormat> {
        self.inner.allocated_atlas_formats()
    }

    fn atlas_texture(&self, format: TextureFormat) -> Option<Arc<GpuTexture>> {
        self.inner.atlas_texture(format)
    }
}

#[test]
fn test_identical_textures_share_binding() {
    let dir = tempfile::tempdir().unwrap();
    let wood = write_png(dir.path(), "wood.png");
    let stone = write_png(dir.path(), "stone.png");

    let mut scene = Scene::new();
    scene.insert("/A".into(), textured(&[("diffuseColor", &wood, "st")]));
    scene.insert("/B".into(), textured(&[("diffuseColor", &wood, "st")]));
    scene.insert("/C".into(), textured(&[("diffuseColor", &stone, "st")]));
    scene.insert("/D".into(), plain(0.5));

    let delegate = RenderDelegate::headless(DelegateConfig::default()).unwrap();
    for id in ["/A", "/B", "/C", "/D"] {
        delegate.insert_material(id);
    }
    delegate.sync_materials(&scene);
    assert!(delegate.commit_resources().is_empty());

    let a = srb_of(&delegate, "/A");
    let b = srb_of(&delegate, "/B");
    let c = srb_of(&delegate, "/C");
    let d = srb_of(&delegate, "/D");
    assert!(Arc::ptr_eq(&a, &b));
    assert!(!Arc::ptr_eq(&a, &c));
    // Default textures only: same textures as the fallback material
    let fallback = delegate.fallback_material().lock().srb().cloned().unwrap();
    assert!(Arc::ptr_eq(&d, &fallback));
    assert_eq!(delegate.srb_cache().binding_count(), 3);

    let material = delegate.material("/A").unwrap();
    let material = material.lock();
    let wood_tex = slot_texture(material.texture("diffuseColor").unwrap());
    assert_eq!(
        headless(&a).bound(ShaderType::Pixel, "g_ColorMap").unwrap().texture_ids(),
        vec![wood_tex.unique_id()]
    );
    let normal_tex = slot_texture(material.texture("normal").unwrap());
    assert_eq!(
        headless(&a).bound(ShaderType::Pixel, "g_NormalMap").unwrap().texture_ids(),
        vec![normal_tex.unique_id()]
    );
}

#[test]
fn test_default_textures_and_common_variables() {
    let mut scene = Scene::new();
    scene.insert("/M".into(), plain(0.3));

    let delegate = RenderDelegate::headless(DelegateConfig::default()).unwrap();
    delegate.insert_material("/M");
    delegate.sync_materials(&scene);
    assert!(delegate.commit_resources().is_empty());

    let material = delegate.material("/M").unwrap();
    let material = material.lock();
    assert_eq!(material.texture("occlusion").unwrap().path(), "$Default-whiteR8");
    assert_eq!(material.texture("metallic").unwrap().format(), TextureFormat::R8Unorm);
    assert_eq!(material.texture("normal").unwrap().path(), "$Default-normal");
    assert_eq!(material.texture("emissiveColor").unwrap().path(), "$Default-whiteRgba8");
    assert!((material.material_data().attribs.roughness_factor - 0.3).abs() < 1e-6);
    assert!(material.primitive_attribs_var().is_some());

    let srb = material.srb().unwrap();
    let settings = delegate.renderer().settings();
    match headless(srb).bound(ShaderType::Pixel, PRIMITIVE_ATTRIBS_VAR).unwrap() {
        BoundResource::BufferRange { offset, size, .. } => {
            assert_eq!(offset, 0);
            assert_eq!(size, primitive_attribs_size(material.pso_flags(settings)));
        }
        other => panic!("unexpected primitive attribs binding: {other:?}"),
    }
    match headless(srb).bound(ShaderType::Vertex, FRAME_ATTRIBS_VAR).unwrap() {
        BoundResource::BufferRange { buffer, .. } => {
            assert_eq!(buffer.unique_id(), delegate.frame_attribs_buffer().unique_id());
        }
        other => panic!("unexpected frame attribs binding: {other:?}"),
    }
}

#[test]
fn test_empty_network_binds_defaults() {
    let mut scene = Scene::new();
    scene.insert("/Empty".into(), MaterialNetworkMap::new());

    let delegate = RenderDelegate::headless(DelegateConfig::default()).unwrap();
    delegate.insert_material("/Empty");
    delegate.insert_material("/NotInScene");
    delegate.sync_materials(&scene);
    assert!(delegate.commit_resources().is_empty());

    for id in ["/Empty", "/NotInScene"] {
        let material = delegate.material(id).unwrap();
        let material = material.lock();
        assert!(material.network().is_empty());
        assert_eq!(material.network().tag(), &MaterialTag::Default);
        assert!(material.srb().is_some());
    }
}

#[test]
fn test_malformed_network_binds_as_empty() {
    let mut map = MaterialNetworkMap::new();
    map.add_node(
        "/M/Surface",
        MaterialNodeDesc::new("UsdPreviewSurface").with_connection(
            "diffuseColor",
            "/M/Gone",
            "rgb",
        ),
    )
    .set_terminal("surface", "/M/Surface", "surface");

    let mut scene = Scene::new();
    scene.insert("/Broken".into(), map);

    let delegate = RenderDelegate::headless(DelegateConfig::default()).unwrap();
    delegate.insert_material("/Broken");
    delegate.sync_materials(&scene);
    assert!(delegate.commit_resources().is_empty());

    let material = delegate.material("/Broken").unwrap();
    let material = material.lock();
    assert!(material.network().is_empty());
    assert_eq!(material.texture("diffuseColor").unwrap().path(), "$Default-whiteRgba8");
    assert!(material.srb().is_some());
}

#[test]
fn test_atlas_indexing() {
    let mut scene = Scene::new();
    scene.insert("/A".into(), plain(0.2));
    scene.insert("/B".into(), plain(0.7));

    let delegate = RenderDelegate::headless(atlas_config()).unwrap();
    delegate.insert_material("/A");
    delegate.insert_material("/B");
    delegate.sync_materials(&scene);
    assert!(delegate.commit_resources().is_empty());

    let a = delegate.material("/A").unwrap();
    let a = a.lock();
    assert!(a.uses_atlas());
    assert!(a.pso_flags(delegate.renderer().settings()).contains(PsoFlags::USE_TEXTURE_ATLAS));

    // The fallback material created the RGBA atlas first
    let registry = delegate.texture_registry();
    assert_eq!(
        registry.allocated_atlas_formats(),
        vec![TextureFormat::Rgba8Unorm, TextureFormat::R8Unorm]
    );
    let ids = delegate.static_shader_texture_ids(a.shader_texture_indexing_id()).unwrap();
    assert_eq!(ids, [0, 0, 1, 1, X, 1, 0]);
    assert_eq!(ids[TextureAttribId::PhysicalDesc.index()], X);

    let b = delegate.material("/B").unwrap();
    let b = b.lock();
    assert_eq!(a.shader_texture_indexing_id(), b.shader_texture_indexing_id());
    assert!(Arc::ptr_eq(a.srb().unwrap(), b.srb().unwrap()));

    let rgba = registry.atlas_texture(TextureFormat::Rgba8Unorm).unwrap();
    let r8 = registry.atlas_texture(TextureFormat::R8Unorm).unwrap();
    let array_size = delegate.renderer().settings().material_textures_array_size as usize;
    let mut expected = vec![rgba.unique_id(), r8.unique_id()];
    expected.resize(array_size, rgba.unique_id());
    assert_eq!(
        headless(a.srb().unwrap())
            .bound(ShaderType::Pixel, MATERIAL_TEXTURES_VAR)
            .unwrap()
            .texture_ids(),
        expected
    );

    let base = a
        .material_data()
        .texture_attrib(
            delegate
                .renderer()
                .settings()
                .texture_attrib_index(TextureAttribId::BaseColor),
        )
        .unwrap();
    assert_eq!(base.atlas_uv_scale_and_bias.x, 16.0 / 64.0);
}

#[test]
fn test_atlas_growth_rebinds_atlas_materials() {
    let mut scene = Scene::new();
    scene.insert("/M".into(), plain(0.5));

    let delegate = RenderDelegate::headless(atlas_config()).unwrap();
    delegate.insert_material("/M");
    delegate.sync_materials(&scene);
    assert!(delegate.commit_resources().is_empty());

    let before = srb_of(&delegate, "/M");
    let indexing = delegate.material("/M").unwrap().lock().shader_texture_indexing_id();
    let version = delegate.texture_registry().atlas_version();

    // 16 regions per slice, one already taken by the white default
    let load = || -> Result<TextureData> { Ok(TextureData::solid(4, 4, &[128])) };
    for i in 0..16 {
        delegate
            .texture_registry()
            .allocate_with_loader(
                &format!("$Test-r8-{}", i),
                ComponentMapping::IDENTITY,
                &default_sampler(),
                &load,
            )
            .unwrap();
    }
    assert!(delegate.texture_registry().atlas_version() > version);

    assert!(delegate.commit_resources().is_empty());
    let after = srb_of(&delegate, "/M");
    assert!(!Arc::ptr_eq(&before, &after));
    assert_eq!(delegate.material("/M").unwrap().lock().shader_texture_indexing_id(), indexing);

    let r8 = delegate.texture_registry().atlas_texture(TextureFormat::R8Unorm).unwrap();
    let bound = headless(&after)
        .bound(ShaderType::Pixel, MATERIAL_TEXTURES_VAR)
        .unwrap()
        .texture_ids();
    assert_eq!(bound[1], r8.unique_id());
}

#[test]
fn test_atlas_version_ignored_by_standalone_materials() {
    let config = DelegateConfig::default();
    let registry = Arc::new(BumpingRegistry {
        inner: MemoryTextureRegistry::new(config.textures.clone()),
        bumps: AtomicU32::new(0),
    });
    let renderer = Arc::new(HeadlessRenderer::new(config.renderer.clone()));
    let delegate = RenderDelegate::new(config, registry.clone(), renderer.clone()).unwrap();

    let mut scene = Scene::new();
    scene.insert("/M".into(), plain(0.5));
    delegate.insert_material("/M");
    delegate.sync_materials(&scene);
    assert!(delegate.commit_resources().is_empty());

    let before = srb_of(&delegate, "/M");
    let created = renderer.bindings_created();

    registry.bumps.fetch_add(1, Ordering::AcqRel);
    assert!(delegate.commit_resources().is_empty());

    assert!(Arc::ptr_eq(&before, &srb_of(&delegate, "/M")));
    assert_eq!(renderer.bindings_created(), created);
}

#[test]
fn test_mixed_atlas_is_unsupported() {
    let mut config = atlas_config();
    config.textures.atlas_formats = vec![TextureFormat::Rgba8Unorm];

    let mut scene = Scene::new();
    scene.insert("/M".into(), plain(0.5));

    let delegate = RenderDelegate::headless(config).unwrap();
    delegate.insert_material("/M");
    delegate.sync_materials(&scene);

    let failures = delegate.commit_resources();
    let ids: Vec<&str> = failures.iter().map(|(id, _)| id.as_str()).collect();
    assert_eq!(ids, ["", "/M"]);
    assert!(failures.iter().all(|(_, err)| matches!(err, Error::Unsupported(_))));
    assert!(failures.iter().all(|(_, err)| !err.is_contract_violation()));
    assert!(delegate.material("/M").unwrap().lock().srb().is_none());
}

#[test]
fn test_unknown_indexing_id() {
    let delegate = RenderDelegate::headless(DelegateConfig::default()).unwrap();
    assert!(matches!(
        delegate.static_shader_texture_ids(42),
        Err(Error::UnknownTextureIndexing(42))
    ));
}

#[test]
fn test_resync_only_when_dirty() {
    let dir = tempfile::tempdir().unwrap();
    let wood = write_png(dir.path(), "wood.png");

    let mut scene = Scene::new();
    scene.insert("/M".into(), plain(0.3));

    let delegate = RenderDelegate::headless(DelegateConfig::default()).unwrap();
    delegate.insert_material("/M");
    delegate.sync_materials(&scene);
    assert!(delegate.commit_resources().is_empty());
    let before = srb_of(&delegate, "/M");

    // Not dirty: the new network is not picked up
    scene.insert("/M".into(), textured(&[("diffuseColor", &wood, "st")]));
    delegate.sync_materials(&scene);
    assert_eq!(
        delegate.material("/M").unwrap().lock().texture("diffuseColor").unwrap().path(),
        "$Default-whiteRgba8"
    );

    assert!(delegate.mark_material_dirty("/M", MaterialDirtyBits::DIRTY_RESOURCE));
    delegate.sync_materials(&scene);
    {
        let material = delegate.material("/M").unwrap();
        let material = material.lock();
        assert!(material.srb().is_none());
        assert_eq!(material.texture("diffuseColor").unwrap().path(), wood.to_string_lossy());
    }

    assert!(delegate.commit_resources().is_empty());
    assert!(!Arc::ptr_eq(&before, &srb_of(&delegate, "/M")));
}

#[test]
fn test_texture_coordinate_sets() {
    let dir = tempfile::tempdir().unwrap();
    let color = write_png(dir.path(), "color.png");
    let metal = write_png(dir.path(), "metal.png");
    let rough = write_png(dir.path(), "rough.png");

    let mut scene = Scene::new();
    scene.insert(
        "/M".into(),
        textured(&[
            ("diffuseColor", &color, "st"),
            ("metallic", &metal, "st1"),
            ("roughness", &rough, "st"),
        ]),
    );

    let delegate = RenderDelegate::headless(DelegateConfig::default()).unwrap();
    delegate.insert_material("/M");
    delegate.sync_materials(&scene);

    let material = delegate.material("/M").unwrap();
    let material = material.lock();
    let primvars: Vec<&str> = material
        .texture_coordinate_sets()
        .iter()
        .map(|s| s.primvar.as_str())
        .collect();
    assert_eq!(primvars, ["st", "st1"]);

    let settings = delegate.renderer().settings();
    assert!(material.pso_flags(settings).contains(PsoFlags::USE_TEXCOORD1));
    let data = material.material_data();
    let selector = |id| data.texture_attrib(settings.texture_attrib_index(id)).unwrap().uv_selector;
    assert_eq!(selector(TextureAttribId::BaseColor), 0.0);
    assert_eq!(selector(TextureAttribId::Metallic), 1.0);
    assert_eq!(selector(TextureAttribId::Roughness), 0.0);
}

#[test]
fn test_missing_texture_file_uses_default() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("missing.png");

    let mut scene = Scene::new();
    scene.insert("/M".into(), textured(&[("diffuseColor", &missing, "st")]));

    let delegate = RenderDelegate::headless(DelegateConfig::default()).unwrap();
    delegate.insert_material("/M");
    delegate.sync_materials(&scene);
    assert!(delegate.commit_resources().is_empty());

    let material = delegate.material("/M").unwrap();
    let material = material.lock();
    assert_eq!(material.texture("diffuseColor").unwrap().path(), "$Default-whiteRgba8");
    assert!(material.texture_coordinate_sets().is_empty());
}

#[test]
fn test_textured_factors() {
    let dir = tempfile::tempdir().unwrap();
    let glow = write_png(dir.path(), "glow.png");

    let mut map = textured(&[("emissiveColor", &glow, "st")]);
    map.nodes
        .get_mut("/M/Tex0")
        .unwrap()
        .parameters
        .insert("scale".into(), Vec4::new(2.0, 2.0, 2.0, 1.0).into());
    map.nodes
        .get_mut("/M/Surface")
        .unwrap()
        .parameters
        .insert("opacity".into(), 0.5f32.into());

    let mut scene = Scene::new();
    scene.insert("/M".into(), map);

    let delegate = RenderDelegate::headless(DelegateConfig::default()).unwrap();
    delegate.insert_material("/M");
    delegate.sync_materials(&scene);

    let material = delegate.material("/M").unwrap();
    let material = material.lock();
    let attribs = &material.material_data().attribs;
    assert_eq!(attribs.emissive_factor, Vec4::new(2.0, 2.0, 2.0, 1.0));
    assert_eq!(material.network().tag(), &MaterialTag::Translucent);
    assert_eq!(attribs.base_color_factor.w, 0.5);
}

#[test]
fn test_parallel_sync_shares_bindings() {
    let mut scene = Scene::new();
    for i in 0..32 {
        scene.insert(format!("/M{}", i), plain(i as f32 / 32.0));
    }

    let delegate = RenderDelegate::headless(atlas_config()).unwrap();
    for id in scene.keys() {
        delegate.insert_material(id);
    }
    delegate.sync_materials(&scene);
    assert!(delegate.commit_resources().is_empty());

    assert_eq!(delegate.srb_cache().binding_count(), 1);
    assert_eq!(delegate.srb_cache().indexing_count(), 1);
    let first = srb_of(&delegate, "/M0");
    for id in delegate.material_ids() {
        assert!(Arc::ptr_eq(&first, &srb_of(&delegate, &id)));
    }
}
