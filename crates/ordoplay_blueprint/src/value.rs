// SPDX-License-Identifier: MIT OR Apache-2.0
//! Values carried by data ports.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Data type that can flow through a data port
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueType {
    /// Boolean value
    Bool,
    /// Integer value
    Int,
    /// Floating point value
    Float,
    /// 2D vector
    Vector2,
    /// 3D vector
    Vector3,
    /// 4D vector / Color
    Vector4,
    /// String value
    String,
    /// Any type (for generic nodes)
    Any,
}

impl ValueType {
    /// Display name, also used to name dependency ports
    pub fn name(&self) -> &'static str {
        match self {
            Self::Bool => "Bool",
            Self::Int => "Int",
            Self::Float => "Float",
            Self::Vector2 => "Vector2",
            Self::Vector3 => "Vector3",
            Self::Vector4 => "Vector4",
            Self::String => "String",
            Self::Any => "Any",
        }
    }

    /// Check if an output of this type can feed an input of `other`
    pub fn can_connect_to(&self, other: &ValueType) -> bool {
        if matches!(self, Self::Any) || matches!(other, Self::Any) {
            return true;
        }

        if self == other {
            return true;
        }

        match (self, other) {
            (Self::Int, Self::Float) | (Self::Float, Self::Int) => true,
            (Self::Float, Self::Vector2 | Self::Vector3 | Self::Vector4) => true,
            (Self::Vector2, Self::Vector3 | Self::Vector4) => true,
            (Self::Vector3, Self::Vector4) => true,
            _ => false,
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A value produced by an output port
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// Boolean
    Bool(bool),
    /// Integer
    Int(i32),
    /// Float
    Float(f32),
    /// 2D vector
    Vector2([f32; 2]),
    /// 3D vector
    Vector3([f32; 3]),
    /// 4D vector
    Vector4([f32; 4]),
    /// String
    String(String),
}

impl Value {
    /// Get the value type of this value
    pub fn value_type(&self) -> ValueType {
        match self {
            Self::Bool(_) => ValueType::Bool,
            Self::Int(_) => ValueType::Int,
            Self::Float(_) => ValueType::Float,
            Self::Vector2(_) => ValueType::Vector2,
            Self::Vector3(_) => ValueType::Vector3,
            Self::Vector4(_) => ValueType::Vector4,
            Self::String(_) => ValueType::String,
        }
    }
}

impl Default for Value {
    fn default() -> Self {
        Self::Int(0)
    }
}

/// Rust types that can be read from and written to data ports.
///
/// `from_value` performs the implicit conversions that [`ValueType::can_connect_to`]
/// allows between scalar types. Everything else is rejected and the reader falls
/// back to its default.
pub trait PortData: Sized + 'static {
    /// Declared type of ports carrying this data
    const VALUE_TYPE: ValueType;

    /// Wrap into a runtime value
    fn into_value(self) -> Value;

    /// Unwrap from a runtime value
    fn from_value(value: Value) -> Option<Self>;
}

impl PortData for bool {
    const VALUE_TYPE: ValueType = ValueType::Bool;

    fn into_value(self) -> Value {
        Value::Bool(self)
    }

    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Bool(v) => Some(v),
            _ => None,
        }
    }
}

impl PortData for i32 {
    const VALUE_TYPE: ValueType = ValueType::Int;

    fn into_value(self) -> Value {
        Value::Int(self)
    }

    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Int(v) => Some(v),
            Value::Float(v) => Some(v as i32),
            _ => None,
        }
    }
}

impl PortData for f32 {
    const VALUE_TYPE: ValueType = ValueType::Float;

    fn into_value(self) -> Value {
        Value::Float(self)
    }

    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Float(v) => Some(v),
            Value::Int(v) => Some(v as f32),
            _ => None,
        }
    }
}

impl PortData for [f32; 2] {
    const VALUE_TYPE: ValueType = ValueType::Vector2;

    fn into_value(self) -> Value {
        Value::Vector2(self)
    }

    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Vector2(v) => Some(v),
            _ => None,
        }
    }
}

impl PortData for [f32; 3] {
    const VALUE_TYPE: ValueType = ValueType::Vector3;

    fn into_value(self) -> Value {
        Value::Vector3(self)
    }

    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Vector3(v) => Some(v),
            _ => None,
        }
    }
}

impl PortData for [f32; 4] {
    const VALUE_TYPE: ValueType = ValueType::Vector4;

    fn into_value(self) -> Value {
        Value::Vector4(self)
    }

    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Vector4(v) => Some(v),
            _ => None,
        }
    }
}

impl PortData for String {
    const VALUE_TYPE: ValueType = ValueType::String;

    fn into_value(self) -> Value {
        Value::String(self)
    }

    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::String(v) => Some(v),
            _ => None,
        }
    }
}

impl PortData for Value {
    const VALUE_TYPE: ValueType = ValueType::Any;

    fn into_value(self) -> Value {
        self
    }

    fn from_value(value: Value) -> Option<Self> {
        Some(value)
    }
}
