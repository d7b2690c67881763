//! Shading network values.

use glam::{Vec2, Vec3, Vec4};
use serde::{Deserialize, Serialize};

/// Value authored on a network node or declared as a shader default.
///
/// In JSON: booleans, numbers, strings and 2-4 element number arrays.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Bool(bool),
    Int(i32),
    Float(f32),
    Float2(Vec2),
    Float3(Vec3),
    Float4(Vec4),
    String(String),
}

impl Value {
    /// Get as float if possible. Vectors yield their first component.
    pub fn as_float(&self) -> Option<f32> {
        match self {
            Self::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            Self::Int(v) => Some(*v as f32),
            Self::Float(v) => Some(*v),
            Self::Float2(v) => Some(v.x),
            Self::Float3(v) => Some(v.x),
            Self::Float4(v) => Some(v.x),
            Self::String(_) => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            Self::Int(v) => Some(*v != 0),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_vec2(&self) -> Option<Vec2> {
        self.to_fallback().map(|v| v.to_vec2())
    }

    /// The numeric value as a fallback, `None` for strings.
    pub fn to_fallback(&self) -> Option<FallbackValue> {
        match self {
            Self::Bool(_) | Self::Int(_) | Self::Float(_) => {
                self.as_float().map(FallbackValue::Float)
            }
            Self::Float2(v) => Some(FallbackValue::Float2(*v)),
            Self::Float3(v) => Some(FallbackValue::Float3(*v)),
            Self::Float4(v) => Some(FallbackValue::Float4(*v)),
            Self::String(_) => None,
        }
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Self::Float(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Float(v as f32)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<Vec2> for Value {
    fn from(v: Vec2) -> Self {
        Self::Float2(v)
    }
}

impl From<Vec3> for Value {
    fn from(v: Vec3) -> Self {
        Self::Float3(v)
    }
}

impl From<Vec4> for Value {
    fn from(v: Vec4) -> Self {
        Self::Float4(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

/// Resolved fallback value of a material parameter.
///
/// Conversions follow what the shader reads: a scalar widens by splatting,
/// a vector narrows to its leading components.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum FallbackValue {
    Float(f32),
    Float2(Vec2),
    Float3(Vec3),
    Float4(Vec4),
}

impl FallbackValue {
    pub fn to_float(self) -> f32 {
        match self {
            Self::Float(v) => v,
            Self::Float2(v) => v.x,
            Self::Float3(v) => v.x,
            Self::Float4(v) => v.x,
        }
    }

    pub fn to_vec2(self) -> Vec2 {
        match self {
            Self::Float(v) => Vec2::splat(v),
            Self::Float2(v) => v,
            Self::Float3(v) => v.truncate(),
            Self::Float4(v) => v.truncate().truncate(),
        }
    }

    pub fn to_vec3(self) -> Vec3 {
        match self {
            Self::Float(v) => Vec3::splat(v),
            Self::Float2(v) => v.extend(0.0),
            Self::Float3(v) => v,
            Self::Float4(v) => v.truncate(),
        }
    }

    pub fn to_vec4(self) -> Vec4 {
        match self {
            Self::Float(v) => Vec4::splat(v),
            Self::Float2(v) => v.extend(0.0).extend(1.0),
            Self::Float3(v) => v.extend(1.0),
            Self::Float4(v) => v,
        }
    }

    /// Number of components.
    pub fn arity(self) -> usize {
        match self {
            Self::Float(_) => 1,
            Self::Float2(_) => 2,
            Self::Float3(_) => 3,
            Self::Float4(_) => 4,
        }
    }
}
