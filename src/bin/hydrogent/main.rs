//! Hydrogent CLI - Tool for inspecting material networks and their resource bindings.

use std::collections::HashMap;
use std::env;
use std::path::Path;

use anyhow::{bail, Context, Result};
use hydrogent::prelude::*;
use hydrogent::material::TextureKind;
use tracing::{debug, info};

fn main() {
    let args: Vec<String> = env::args().collect();

    // Parse global flags
    let mut filter = "hydrogent=info";
    let mut config_path: Option<String> = None;
    let mut filtered_args: Vec<&str> = Vec::new();
    let mut iter = args[1..].iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "-v" | "--verbose" => filter = "hydrogent=debug",
            "-vv" | "--trace" => filter = "hydrogent=trace",
            "-q" | "--quiet" => filter = "hydrogent=error",
            "-c" | "--config" => match iter.next() {
                Some(path) => config_path = Some(path.clone()),
                None => {
                    eprintln!("Error: --config requires a file argument");
                    std::process::exit(1);
                }
            },
            "-V" | "--version" => {
                println!(
                    "hydrogent {} ({})",
                    env!("CARGO_PKG_VERSION"),
                    env!("HYDROGENT_BUILD_DATE")
                );
                return;
            }
            _ => filtered_args.push(arg),
        }
    }

    hydrogent::init_tracing(filter);

    if filtered_args.is_empty() {
        print_help();
        return;
    }

    let config = match &config_path {
        Some(path) => DelegateConfig::load_or_default(path),
        None => DelegateConfig::default(),
    };

    let result = match filtered_args[0] {
        // Inspect command - extracted parameters of one network
        "inspect" | "i" => {
            if filtered_args.len() < 2 {
                eprintln!("Error: missing file argument");
                eprintln!("Usage: hydrogent inspect <network.json>");
                std::process::exit(1);
            }
            cmd_inspect(filtered_args[1])
        }

        // Bind command - sync materials and create resource bindings
        "bind" | "b" => {
            if filtered_args.len() < 2 {
                eprintln!("Error: missing file argument");
                eprintln!("Usage: hydrogent bind <network.json>...");
                std::process::exit(1);
            }
            cmd_bind(&filtered_args[1..], config)
        }

        "help" | "h" | "-h" | "--help" => {
            print_help();
            Ok(())
        }

        _ => {
            eprintln!("Unknown command: {}", filtered_args[0]);
            eprintln!();
            print_help();
            std::process::exit(1);
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn print_help() {
    println!("Hydrogent CLI - material network inspection tool");
    println!();
    println!("Usage: hydrogent [options] <command> [args]");
    println!();
    println!("Commands:");
    println!("  inspect, i <network.json>     Show extracted parameters, textures and tag");
    println!("  bind, b <network.json>...     Sync materials and create resource bindings");
    println!("  help, h                       Show this help");
    println!();
    println!("Options:");
    println!("  -c, --config <file.json>      Delegate configuration");
    println!("  -v, --verbose                 Debug output");
    println!("  -vv, --trace                  Trace output");
    println!("  -q, --quiet                   Errors only");
    println!("  -V, --version                 Print version");
    println!();
    println!("Logging can also be configured with {}", hydrogent::util::LOG_ENV);
}

/// Material id of a network file: `/` followed by the file stem.
fn material_id(path: &str) -> String {
    let stem = Path::new(path)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string());
    format!("/{}", stem)
}

fn cmd_inspect(path: &str) -> Result<()> {
    let map = MaterialNetworkMap::load(path).with_context(|| format!("Failed to load {}", path))?;
    let registry = ShaderRegistry::with_builtin_nodes();
    let id = material_id(path);
    let network = MaterialNetwork::new(&id, &map, &registry)
        .with_context(|| format!("Failed to extract {}", id))?;

    println!("Material: {}", id);
    println!("  Nodes:   {}", map.nodes.len());
    println!("  Tag:     {}", network.tag());
    println!("  Volume:  {}", network.is_volume());
    if network.is_empty() {
        println!("  (empty network)");
        return Ok(());
    }

    println!();
    println!("Parameters:");
    for param in network.parameters() {
        match param.param_type {
            ParamType::Fallback => {
                println!("  fallback   {:<20} {:?}", param.name, param.fallback_value);
            }
            ParamType::Texture => {
                let kind = match param.texture_kind {
                    TextureKind::Uv => "uv",
                    TextureKind::Udim => "udim",
                    TextureKind::Ptex => "ptex",
                    TextureKind::Field => "field",
                };
                println!(
                    "  texture    {:<20} {} swizzle={} coords={:?} scale={}",
                    param.name,
                    kind,
                    param.swizzle,
                    param.sampler_coords.as_slice(),
                    param.input_scale
                );
            }
            ParamType::Transform2d => {
                let xf = &param.transform2d;
                println!(
                    "  transform  {:<20} scale={} rotation={} translation={}",
                    param.name, xf.scale, xf.rotation, xf.translation
                );
            }
            ParamType::AdditionalPrimvar => {
                println!("  primvar    {}", param.name);
            }
        }
    }

    if !network.textures().is_empty() {
        println!();
        println!("Textures:");
        for tex in network.textures() {
            println!("  {:<20} {}", tex.name, tex.texture_id);
        }
    }

    Ok(())
}

fn cmd_bind(paths: &[&str], config: DelegateConfig) -> Result<()> {
    let mut scene: HashMap<String, MaterialNetworkMap> = HashMap::new();
    for path in paths {
        let map = MaterialNetworkMap::load(path)
            .with_context(|| format!("Failed to load {}", path))?;
        let id = material_id(path);
        if scene.insert(id.clone(), map).is_some() {
            bail!("Duplicate material id {}", id);
        }
    }

    let delegate = RenderDelegate::headless(config).context("Failed to create render delegate")?;
    let mut ids: Vec<&String> = scene.keys().collect();
    ids.sort();
    for id in &ids {
        delegate.insert_material(id);
    }
    debug!("Syncing {} materials", ids.len());

    delegate.sync_materials(&scene);
    let failures = delegate.commit_resources();

    for id in &ids {
        let Some(material) = delegate.material(id) else {
            continue;
        };
        let material = material.lock();
        let settings = delegate.renderer().settings();
        println!("{}", id);
        println!("  Tag:        {}", material.network().tag());
        println!("  Atlas:      {}", material.uses_atlas());
        println!("  Tex coords: {}", material.texture_coordinate_sets().len());
        println!("  PSO flags:  {:?}", material.pso_flags(settings));
        if material.uses_atlas() {
            let indexing =
                delegate.static_shader_texture_ids(material.shader_texture_indexing_id())?;
            println!("  Indexing:   {} {:?}", material.shader_texture_indexing_id(), indexing);
        }
        println!("  Binding:    {}", if material.srb().is_some() { "ok" } else { "none" });
    }

    println!();
    info!(
        "{} materials, {} resource bindings, {} texture indexings",
        ids.len(),
        delegate.srb_cache().binding_count(),
        delegate.srb_cache().indexing_count()
    );

    if !failures.is_empty() {
        for (id, err) in &failures {
            eprintln!("{}: {}", if id.is_empty() { "<fallback>" } else { id }, err);
        }
        bail!("{} materials failed to bind", failures.len());
    }
    Ok(())
}
