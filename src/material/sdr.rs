//! Shader node definitions.
//!
//! A small registry of the shader nodes the extractor understands: their
//! inputs with declared defaults, outputs, the input a disabled node passes
//! through, and metadata such as an explicit material tag.

use std::collections::{BTreeMap, HashMap};

use glam::{Vec2, Vec3, Vec4};
use serde::{Deserialize, Serialize};

use super::Value;

/// Property value type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ValueType {
    Bool,
    Int,
    Float,
    Float2,
    Float3,
    Float4,
    Color3,
    Normal3,
    String,
    Token,
    Asset,
}

impl ValueType {
    /// Default-constructed value of the type.
    pub fn default_value(self) -> Value {
        match self {
            Self::Bool => Value::Bool(false),
            Self::Int => Value::Int(0),
            Self::Float => Value::Float(0.0),
            Self::Float2 => Value::Float2(Vec2::ZERO),
            Self::Float3 | Self::Color3 | Self::Normal3 => Value::Float3(Vec3::ZERO),
            Self::Float4 => Value::Float4(Vec4::ZERO),
            Self::String | Self::Token | Self::Asset => Value::String(String::new()),
        }
    }
}

/// Shader input or output.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ShaderProperty {
    pub name: String,
    pub value_type: ValueType,
    #[serde(default)]
    pub default_value: Option<Value>,
}

impl ShaderProperty {
    pub fn new(name: &str, value_type: ValueType) -> Self {
        Self {
            name: name.to_string(),
            value_type,
            default_value: None,
        }
    }

    pub fn with_default(name: &str, value_type: ValueType, default: impl Into<Value>) -> Self {
        Self {
            name: name.to_string(),
            value_type,
            default_value: Some(default.into()),
        }
    }

    /// Declared default, or the type's default if none is declared.
    pub fn default_or_type_default(&self) -> Value {
        self.default_value
            .clone()
            .unwrap_or_else(|| self.value_type.default_value())
    }
}

/// What a node does in a network.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NodeRole {
    /// Terminal shading node.
    #[default]
    Surface,
    Texture,
    PrimvarReader,
    Transform2d,
    Field,
    Math,
}

/// Where a node's shader code comes from.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Implementation {
    #[default]
    None,
    Uri(String),
    Source(String),
}

/// Shader node definition.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShaderNodeDef {
    pub identifier: String,
    pub role: NodeRole,
    /// Inputs in declaration order.
    pub inputs: Vec<ShaderProperty>,
    pub outputs: Vec<ShaderProperty>,
    /// Input passed through when the node is disabled.
    pub default_input: Option<String>,
    /// Primvars the shader reads regardless of the network.
    pub primvars: Vec<String>,
    pub implementation: Implementation,
    pub metadata: BTreeMap<String, String>,
}

impl ShaderNodeDef {
    pub fn new(identifier: &str, role: NodeRole) -> Self {
        Self {
            identifier: identifier.to_string(),
            role,
            ..Default::default()
        }
    }

    pub fn input(&self, name: &str) -> Option<&ShaderProperty> {
        self.inputs.iter().find(|p| p.name == name)
    }

    pub fn output(&self, name: &str) -> Option<&ShaderProperty> {
        self.outputs.iter().find(|p| p.name == name)
    }

    pub fn default_input(&self) -> Option<&ShaderProperty> {
        self.default_input.as_deref().and_then(|name| self.input(name))
    }

    /// Check if the node has shader code to compile.
    pub fn is_resolvable(&self) -> bool {
        match &self.implementation {
            Implementation::Uri(uri) => !uri.is_empty(),
            Implementation::Source(src) => !src.is_empty(),
            Implementation::None => false,
        }
    }
}

/// Shader node definitions by identifier.
#[derive(Clone, Debug, Default)]
pub struct ShaderRegistry {
    nodes: HashMap<String, ShaderNodeDef>,
}

impl ShaderRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the preview surface and its helper nodes.
    pub fn with_builtin_nodes() -> Self {
        let mut registry = Self::new();
        registry.register(preview_surface());
        registry.register(uv_texture());
        registry.register(primvar_reader("UsdPrimvarReader_float", ValueType::Float));
        registry.register(primvar_reader("UsdPrimvarReader_float2", ValueType::Float2));
        registry.register(primvar_reader("UsdPrimvarReader_float3", ValueType::Float3));
        registry.register(primvar_reader("UsdPrimvarReader_float4", ValueType::Float4));
        registry.register(transform_2d());
        registry
    }

    /// Add or replace a definition.
    pub fn register(&mut self, def: ShaderNodeDef) {
        self.nodes.insert(def.identifier.clone(), def);
    }

    pub fn node(&self, identifier: &str) -> Option<&ShaderNodeDef> {
        self.nodes.get(identifier)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

fn preview_surface() -> ShaderNodeDef {
    use ValueType::*;

    let mut def = ShaderNodeDef::new("UsdPreviewSurface", NodeRole::Surface);
    def.inputs = vec![
        ShaderProperty::with_default("diffuseColor", Color3, Vec3::splat(0.18)),
        ShaderProperty::with_default("emissiveColor", Color3, Vec3::ZERO),
        ShaderProperty::with_default("useSpecularWorkflow", Int, Value::Int(0)),
        ShaderProperty::with_default("specularColor", Color3, Vec3::ZERO),
        ShaderProperty::with_default("metallic", Float, 0.0),
        ShaderProperty::with_default("roughness", Float, 0.5),
        ShaderProperty::with_default("clearcoat", Float, 0.0),
        ShaderProperty::with_default("clearcoatRoughness", Float, 0.01),
        ShaderProperty::with_default("opacity", Float, 1.0),
        ShaderProperty::with_default("opacityThreshold", Float, 0.0),
        ShaderProperty::with_default("ior", Float, 1.5),
        ShaderProperty::with_default("normal", Normal3, Vec3::Z),
        ShaderProperty::with_default("displacement", Float, 0.0),
        ShaderProperty::with_default("occlusion", Float, 1.0),
    ];
    def.outputs = vec![
        ShaderProperty::new("surface", Token),
        ShaderProperty::new("displacement", Token),
    ];
    def.implementation = Implementation::Uri("shaders/previewSurface.glslfx".into());
    def
}

fn uv_texture() -> ShaderNodeDef {
    use ValueType::*;

    let mut def = ShaderNodeDef::new("UsdUVTexture", NodeRole::Texture);
    def.inputs = vec![
        ShaderProperty::new("file", Asset),
        ShaderProperty::new("st", Float2),
        ShaderProperty::with_default("wrapS", Token, "useMetadata"),
        ShaderProperty::with_default("wrapT", Token, "useMetadata"),
        ShaderProperty::with_default("minFilter", Token, "linearMipmapLinear"),
        ShaderProperty::with_default("magFilter", Token, "linear"),
        ShaderProperty::with_default("fallback", Float4, Vec4::new(0.0, 0.0, 0.0, 1.0)),
        ShaderProperty::with_default("scale", Float4, Vec4::ONE),
        ShaderProperty::with_default("bias", Float4, Vec4::ZERO),
        ShaderProperty::with_default("sourceColorSpace", Token, "auto"),
    ];
    def.outputs = vec![
        ShaderProperty::new("r", Float),
        ShaderProperty::new("g", Float),
        ShaderProperty::new("b", Float),
        ShaderProperty::new("a", Float),
        ShaderProperty::new("rgb", Float3),
        ShaderProperty::new("rgba", Float4),
    ];
    def.default_input = Some("fallback".into());
    def.implementation = Implementation::Uri("shaders/uvTexture.glslfx".into());
    def
}

fn primvar_reader(identifier: &str, value_type: ValueType) -> ShaderNodeDef {
    let mut def = ShaderNodeDef::new(identifier, NodeRole::PrimvarReader);
    def.inputs = vec![
        ShaderProperty::new("varname", ValueType::Token),
        ShaderProperty::new("fallback", value_type),
    ];
    def.outputs = vec![ShaderProperty::new("result", value_type)];
    def.default_input = Some("fallback".into());
    def.implementation = Implementation::Uri("shaders/primvarReader.glslfx".into());
    def
}

fn transform_2d() -> ShaderNodeDef {
    use ValueType::*;

    let mut def = ShaderNodeDef::new("UsdTransform2d", NodeRole::Transform2d);
    def.inputs = vec![
        ShaderProperty::new("in", Float2),
        ShaderProperty::with_default("rotation", Float, 0.0),
        ShaderProperty::with_default("scale", Float2, Vec2::ONE),
        ShaderProperty::with_default("translation", Float2, Vec2::ZERO),
    ];
    def.outputs = vec![ShaderProperty::new("result", Float2)];
    def.default_input = Some("in".into());
    def.implementation = Implementation::Uri("shaders/transform2d.glslfx".into());
    def
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_nodes() {
        let registry = ShaderRegistry::with_builtin_nodes();
        assert_eq!(registry.len(), 7);

        let surface = registry.node("UsdPreviewSurface").unwrap();
        assert!(surface.is_resolvable());
        assert_eq!(surface.input("roughness").unwrap().default_value, Some(Value::Float(0.5)));
        assert!(surface.default_input().is_none());

        let tex = registry.node("UsdUVTexture").unwrap();
        assert_eq!(tex.role, NodeRole::Texture);
        assert_eq!(tex.default_input().unwrap().name, "fallback");
        assert_eq!(tex.output("rgb").unwrap().default_or_type_default(), Value::Float3(Vec3::ZERO));
    }

    #[test]
    fn test_unresolvable() {
        let def = ShaderNodeDef::new("Custom", NodeRole::Surface);
        assert!(!def.is_resolvable());
        let def = ShaderNodeDef {
            implementation: Implementation::Source("void main() {}".into()),
            ..def
        };
        assert!(def.is_resolvable());
    }
}
