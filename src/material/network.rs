//! Material network extraction.
//!
//! Supports the two configurations a preview material comes in: a terminal
//! shader with inputs that are either authored or connected to a texture,
//! primvar reader or other node, where a texture may in turn read its
//! coordinates through a primvar reader, optionally via a 2D transform.
//! Arbitrary node graphs are not flattened into shader code.

use std::collections::BTreeMap;

use glam::{Vec2, Vec3, Vec4};
use tracing::{debug, warn};

use super::tokens;
use super::{
    FallbackValue, GraphNode, MaterialGraph, MaterialNetworkMap, MaterialParameter, MaterialTag,
    NodeId, NodeRole, ParamType, ShaderNodeDef, ShaderRegistry, TextureDescriptor, TextureKind,
    Transform2d, Value,
};
use crate::texture::{MagFilter, MinFilter, SamplerParameters, TextureIdentifier, WrapMode};
use crate::util::Result;

/// Parameters, textures and classification extracted from a material network.
///
/// Rebuilt from scratch on every sync. The default value is the empty network:
/// no parameters, no textures, default tag.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MaterialNetwork {
    parameters: Vec<MaterialParameter>,
    textures: Vec<TextureDescriptor>,
    tag: MaterialTag,
    metadata: BTreeMap<String, String>,
    is_volume: bool,
}

impl MaterialNetwork {
    /// Extract the network of material `id`.
    ///
    /// A missing terminal or an unresolvable terminal shader yields an empty
    /// network. Structurally invalid input is an error the caller is expected
    /// to recover from.
    pub fn new(id: &str, map: &MaterialNetworkMap, registry: &ShaderRegistry) -> Result<Self> {
        let graph = MaterialGraph::build(map)?;

        let (terminal, is_volume) = match graph.terminal(tokens::SURFACE) {
            Some(node) => (node, false),
            None => match graph.terminal(tokens::VOLUME) {
                Some(node) => (node, true),
                None => {
                    debug!(material = %id, "No surface or volume terminal");
                    return Ok(Self::default());
                }
            },
        };

        let terminal_node = graph.node(terminal);
        let def = match registry.node(&terminal_node.type_id) {
            Some(def) if def.is_resolvable() => def,
            _ => {
                debug!(
                    material = %id,
                    node_type = %terminal_node.type_id,
                    "Terminal shader is not resolvable"
                );
                return Ok(Self {
                    is_volume,
                    ..Default::default()
                });
            }
        };

        let mut network = Self {
            metadata: def.metadata.clone(),
            tag: material_tag(&def.metadata, terminal_node),
            is_volume,
            ..Default::default()
        };

        let extractor = Extractor {
            graph: &graph,
            registry,
            terminal,
        };
        extractor.load_material_params(def, &mut network);

        Ok(network)
    }

    /// Find a parameter by type and name.
    pub fn parameter(&self, param_type: ParamType, name: &str) -> Option<&MaterialParameter> {
        self.parameters
            .iter()
            .find(|p| p.param_type == param_type && p.name == name)
    }

    pub fn parameters(&self) -> &[MaterialParameter] {
        &self.parameters
    }

    pub fn textures(&self) -> &[TextureDescriptor] {
        &self.textures
    }

    /// Primvars the shader needs beyond those read by parameters.
    pub fn additional_primvars(&self) -> impl Iterator<Item = &str> {
        self.parameters
            .iter()
            .filter(|p| p.param_type == ParamType::AdditionalPrimvar)
            .map(|p| p.name.as_str())
    }

    #[inline]
    pub fn tag(&self) -> &MaterialTag {
        &self.tag
    }

    pub fn metadata(&self) -> &BTreeMap<String, String> {
        &self.metadata
    }

    #[inline]
    pub fn is_volume(&self) -> bool {
        self.is_volume
    }

    pub fn is_empty(&self) -> bool {
        self.parameters.is_empty() && self.textures.is_empty()
    }

    /// Fallback value of a scalar fallback parameter.
    pub fn fallback_float(&self, name: &str) -> Option<f32> {
        self.parameter(ParamType::Fallback, name)
            .and_then(|p| p.fallback_value)
            .map(FallbackValue::to_float)
    }

    pub fn opacity(&self) -> f32 {
        self.fallback_float(tokens::OPACITY).unwrap_or(1.0)
    }

    pub fn opacity_threshold(&self) -> f32 {
        self.fallback_float(tokens::OPACITY_THRESHOLD).unwrap_or(0.0)
    }
}

/// Material tag by decreasing strength of opinion:
/// explicit metadata, authored opacity threshold, opacity connection, authored opacity.
fn material_tag(metadata: &BTreeMap<String, String>, terminal: &GraphNode) -> MaterialTag {
    if let Some(tag) = metadata.get(tokens::MATERIAL_TAG) {
        return MaterialTag::from_token(tag);
    }

    if let Some(threshold) = terminal.param(tokens::OPACITY_THRESHOLD) {
        if threshold.as_float().unwrap_or(0.0) > 0.0 {
            return MaterialTag::Masked;
        }
    }

    let translucent = terminal.is_connected(tokens::OPACITY)
        || terminal
            .param(tokens::OPACITY)
            .is_some_and(|v| v.as_float().unwrap_or(0.0) < 1.0);

    if translucent {
        MaterialTag::Translucent
    } else {
        MaterialTag::Default
    }
}

struct Extractor<'a> {
    graph: &'a MaterialGraph,
    registry: &'a ShaderRegistry,
    terminal: NodeId,
}

impl Extractor<'_> {
    fn load_material_params(&self, def: &ShaderNodeDef, network: &mut MaterialNetwork) {
        let mut reader_primvars = Vec::new();

        for input in &def.inputs {
            self.make_params_for_input(&input.name, network, &mut reader_primvars);
        }

        // Fallbacks for everything except primvar requests
        let terminal = self.graph.node(self.terminal);
        for param in &mut network.parameters {
            if param.param_type != ParamType::AdditionalPrimvar && param.fallback_value.is_none() {
                param.fallback_value = Some(self.param_fallback_value(terminal, &param.name));
            }
        }

        let mut primvars: Vec<String> = def
            .primvars
            .iter()
            .chain(self.graph.primvars())
            .cloned()
            .chain(reader_primvars)
            .collect();
        primvars.sort();
        primvars.dedup();

        network.parameters.extend(
            primvars
                .into_iter()
                .map(|name| MaterialParameter::new(ParamType::AdditionalPrimvar, name)),
        );
    }

    fn make_params_for_input(
        &self,
        input: &str,
        network: &mut MaterialNetwork,
        reader_primvars: &mut Vec<String>,
    ) {
        let terminal = self.graph.node(self.terminal);

        let Some(conn) = terminal.connection(input) else {
            network.parameters.push(MaterialParameter::new(ParamType::Fallback, input));
            return;
        };

        let upstream = self.graph.node(conn.upstream);
        match self.registry.node(&upstream.type_id).map(|d| d.role) {
            Some(NodeRole::Texture) => {
                self.make_texture_params(input, conn.upstream, &conn.output, network);
            }
            Some(NodeRole::PrimvarReader) => {
                network.parameters.push(MaterialParameter::new(ParamType::Fallback, input));
                if let Some(varname) = upstream.param(tokens::VARNAME).and_then(Value::as_str) {
                    reader_primvars.push(varname.to_string());
                }
            }
            Some(_) => {
                network.parameters.push(MaterialParameter::new(ParamType::Fallback, input));
            }
            None => {
                warn!(node = %upstream.path, node_type = %upstream.type_id, "Unrecognized node");
                network.parameters.push(MaterialParameter::new(ParamType::Fallback, input));
            }
        }
    }

    fn make_texture_params(
        &self,
        input: &str,
        tex_id: NodeId,
        output: &str,
        network: &mut MaterialNetwork,
    ) {
        let tex = self.graph.node(tex_id);
        let tex_def = self.registry.node(&tex.type_id);

        let file = tex
            .param(tokens::FILE)
            .and_then(Value::as_str)
            .unwrap_or_default();

        let mut param = MaterialParameter::new(ParamType::Texture, input);
        param.swizzle = output.to_string();
        param.texture_kind = if file.contains(tokens::UDIM_TAG) {
            TextureKind::Udim
        } else {
            TextureKind::Uv
        };
        param.is_premultiplied = tex
            .param(tokens::PREMULTIPLIED)
            .and_then(Value::as_bool)
            .unwrap_or(false);
        param.input_scale = tex
            .param(tokens::SCALE)
            .and_then(Value::to_fallback)
            .map_or(Vec4::ONE, FallbackValue::to_vec4);

        let mut transform = None;
        if let Some(st) = tex.connection(tokens::ST) {
            let st_node = self.graph.node(st.upstream);
            let reader = match self.registry.node(&st_node.type_id) {
                Some(def) if def.role == NodeRole::Transform2d => {
                    transform = Some(read_transform(st_node, def));
                    st_node.connection(tokens::IN).map(|c| self.graph.node(c.upstream))
                }
                _ => Some(st_node),
            };
            if let Some(varname) = reader
                .and_then(|r| r.param(tokens::VARNAME))
                .and_then(Value::as_str)
            {
                param.sampler_coords.push(varname.to_string());
            }
        }

        let token = |name: &str| -> Option<String> {
            tex.param(name)
                .or_else(|| {
                    tex_def
                        .and_then(|d| d.input(name))
                        .and_then(|p| p.default_value.as_ref())
                })
                .and_then(Value::as_str)
                .map(str::to_string)
        };
        let mut sampler = SamplerParameters::default();
        if let Some(wrap) = token(tokens::WRAP_S).as_deref().and_then(WrapMode::from_token) {
            sampler.wrap_s = wrap;
        }
        if let Some(wrap) = token(tokens::WRAP_T).as_deref().and_then(WrapMode::from_token) {
            sampler.wrap_t = wrap;
        }
        if let Some(filter) = token(tokens::MIN_FILTER).as_deref().and_then(MinFilter::from_token) {
            sampler.min_filter = filter;
        }
        if let Some(filter) = token(tokens::MAG_FILTER).as_deref().and_then(MagFilter::from_token) {
            sampler.mag_filter = filter;
        }

        network.textures.push(TextureDescriptor {
            name: input.to_string(),
            texture_id: TextureIdentifier::new(file),
            sampler_params: sampler,
        });
        network.parameters.push(param);

        if let Some(transform2d) = transform {
            let mut param = MaterialParameter::new(ParamType::Transform2d, input);
            param.transform2d = transform2d;
            network.parameters.push(param);
        }
    }

    /// The value a parameter takes when nothing usable is connected.
    ///
    /// Precedence: the connected node's fallback, the authored value, the
    /// shader's declared input default (or its type's default). A 3-component
    /// zero is returned when none resolves.
    fn param_fallback_value(&self, node: &GraphNode, name: &str) -> FallbackValue {
        if let Some(conn) = node.connection(name) {
            let upstream = self.graph.node(conn.upstream);
            if let Some(value) = self.node_fallback_value(upstream, &conn.output) {
                return value;
            }
        }

        if let Some(value) = node.param(name).and_then(Value::to_fallback) {
            return value;
        }

        if let Some(input) = self.registry.node(&node.type_id).and_then(|d| d.input(name)) {
            if let Some(value) = input.default_or_type_default().to_fallback() {
                return value;
            }
        }

        warn!(param = %name, node_type = %node.type_id, "Couldn't determine default value");
        FallbackValue::Float3(Vec3::ZERO)
    }

    /// Fallback a node provides for one of its outputs.
    ///
    /// The node's default input (the pass-through of a disabled node) stands in
    /// for a fallback when authored, otherwise the output's declared default or
    /// its type's default is used.
    fn node_fallback_value(&self, node: &GraphNode, output: &str) -> Option<FallbackValue> {
        let def = self.registry.node(&node.type_id)?;

        if let Some(default_input) = def.default_input() {
            if let Some(value) = node.param(&default_input.name) {
                return value.to_fallback();
            }
        }

        def.output(output)
            .and_then(|out| out.default_or_type_default().to_fallback())
    }
}

fn read_transform(node: &GraphNode, def: &ShaderNodeDef) -> Transform2d {
    let value = |name: &str| {
        node.param(name)
            .or_else(|| def.input(name).and_then(|p| p.default_value.as_ref()))
    };
    Transform2d {
        scale: value(tokens::SCALE).and_then(Value::as_vec2).unwrap_or(Vec2::ONE),
        rotation: value(tokens::ROTATION).and_then(Value::as_float).unwrap_or(0.0),
        translation: value(tokens::TRANSLATION).and_then(Value::as_vec2).unwrap_or(Vec2::ZERO),
    }
}
