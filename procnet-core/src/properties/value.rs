//! Property Values
//!
//! Properties hold one of a fixed set of primitive value kinds. Values are
//! stored typed, and rendered as strings when persisted. The rendering is
//! exact: parsing a rendered value yields the same bits back, including for
//! floating point values, so documents round-trip without drift.

use std::fmt;

/// The primitive kinds a property can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Bool,
    Int,
    Float,
    Double,
    String,
    Vec2,
    Vec3,
    Vec4,
}

impl ValueKind {
    /// The type name used in persisted documents.
    pub fn name(self) -> &'static str {
        match self {
            ValueKind::Bool => "bool",
            ValueKind::Int => "int",
            ValueKind::Float => "float",
            ValueKind::Double => "double",
            ValueKind::String => "string",
            ValueKind::Vec2 => "vec2",
            ValueKind::Vec3 => "vec3",
            ValueKind::Vec4 => "vec4",
        }
    }

    /// Look up a kind by its persisted type name.
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "bool" => ValueKind::Bool,
            "int" => ValueKind::Int,
            "float" => ValueKind::Float,
            "double" => ValueKind::Double,
            "string" => ValueKind::String,
            "vec2" => ValueKind::Vec2,
            "vec3" => ValueKind::Vec3,
            "vec4" => ValueKind::Vec4,
            _ => return None,
        })
    }

    /// Scalars that convert into each other across links.
    pub fn is_scalar(self) -> bool {
        matches!(
            self,
            ValueKind::Bool | ValueKind::Int | ValueKind::Float | ValueKind::Double
        )
    }

    /// Check if a value of this kind can be converted into `target`.
    pub fn converts_to(self, target: ValueKind) -> bool {
        self == target || (self.is_scalar() && target.is_scalar())
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A typed property value.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    Bool(bool),
    Int(i64),
    Float(f32),
    Double(f64),
    String(String),
    Vec2([f64; 2]),
    Vec3([f64; 3]),
    Vec4([f64; 4]),
}

impl PropertyValue {
    /// The kind of this value.
    pub fn kind(&self) -> ValueKind {
        match self {
            PropertyValue::Bool(_) => ValueKind::Bool,
            PropertyValue::Int(_) => ValueKind::Int,
            PropertyValue::Float(_) => ValueKind::Float,
            PropertyValue::Double(_) => ValueKind::Double,
            PropertyValue::String(_) => ValueKind::String,
            PropertyValue::Vec2(_) => ValueKind::Vec2,
            PropertyValue::Vec3(_) => ValueKind::Vec3,
            PropertyValue::Vec4(_) => ValueKind::Vec4,
        }
    }

    /// Render the value as persisted string content.
    pub fn render(&self) -> String {
        match self {
            PropertyValue::Bool(v) => v.to_string(),
            PropertyValue::Int(v) => v.to_string(),
            PropertyValue::Float(v) => v.to_string(),
            PropertyValue::Double(v) => v.to_string(),
            PropertyValue::String(v) => v.clone(),
            PropertyValue::Vec2(v) => render_components(v),
            PropertyValue::Vec3(v) => render_components(v),
            PropertyValue::Vec4(v) => render_components(v),
        }
    }

    /// Parse persisted string content as a value of the given kind.
    pub fn parse(kind: ValueKind, content: &str) -> Option<Self> {
        Some(match kind {
            ValueKind::Bool => PropertyValue::Bool(content.trim().parse().ok()?),
            ValueKind::Int => PropertyValue::Int(content.trim().parse().ok()?),
            ValueKind::Float => PropertyValue::Float(content.trim().parse().ok()?),
            ValueKind::Double => PropertyValue::Double(content.trim().parse().ok()?),
            ValueKind::String => PropertyValue::String(content.to_string()),
            ValueKind::Vec2 => PropertyValue::Vec2(parse_components(content)?),
            ValueKind::Vec3 => PropertyValue::Vec3(parse_components(content)?),
            ValueKind::Vec4 => PropertyValue::Vec4(parse_components(content)?),
        })
    }

    /// Convert this value into the given kind.
    ///
    /// Scalars convert between each other (truncating toward zero when going
    /// to `Int`); every other kind only converts to itself.
    pub fn convert_to(&self, target: ValueKind) -> Option<PropertyValue> {
        if self.kind() == target {
            return Some(self.clone());
        }
        let scalar = self.as_f64()?;
        Some(match target {
            ValueKind::Bool => PropertyValue::Bool(scalar != 0.0),
            ValueKind::Int => match self {
                PropertyValue::Bool(v) => PropertyValue::Int(i64::from(*v)),
                _ => PropertyValue::Int(scalar as i64),
            },
            ValueKind::Float => PropertyValue::Float(scalar as f32),
            ValueKind::Double => PropertyValue::Double(scalar),
            _ => return None,
        })
    }

    fn as_f64(&self) -> Option<f64> {
        match self {
            PropertyValue::Bool(v) => Some(if *v { 1.0 } else { 0.0 }),
            PropertyValue::Int(v) => Some(*v as f64),
            PropertyValue::Float(v) => Some(f64::from(*v)),
            PropertyValue::Double(v) => Some(*v),
            _ => None,
        }
    }
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

fn render_components(components: &[f64]) -> String {
    components
        .iter()
        .map(|c| c.to_string())
        .collect::<Vec<_>>()
        .join(" ")
}

fn parse_components<const N: usize>(content: &str) -> Option<[f64; N]> {
    let mut out = [0.0; N];
    let mut parts = content.split_whitespace();
    for slot in out.iter_mut() {
        *slot = parts.next()?.parse().ok()?;
    }
    if parts.next().is_some() {
        return None;
    }
    Some(out)
}

macro_rules! impl_from {
    ($ty:ty, $variant:ident) => {
        impl From<$ty> for PropertyValue {
            fn from(value: $ty) -> Self {
                PropertyValue::$variant(value)
            }
        }
    };
}

impl_from!(bool, Bool);
impl_from!(i64, Int);
impl_from!(f32, Float);
impl_from!(f64, Double);
impl_from!(String, String);
impl_from!([f64; 2], Vec2);
impl_from!([f64; 3], Vec3);
impl_from!([f64; 4], Vec4);

impl From<i32> for PropertyValue {
    fn from(value: i32) -> Self {
        PropertyValue::Int(i64::from(value))
    }
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        PropertyValue::String(value.to_string())
    }
}

/// Extract a concrete Rust value from a [`PropertyValue`].
pub trait FromValue: Sized {
    fn from_value(value: &PropertyValue) -> Option<Self>;
}

macro_rules! impl_from_value {
    ($ty:ty, $variant:ident) => {
        impl FromValue for $ty {
            fn from_value(value: &PropertyValue) -> Option<Self> {
                match value {
                    PropertyValue::$variant(v) => Some(v.clone()),
                    _ => None,
                }
            }
        }
    };
}

impl_from_value!(bool, Bool);
impl_from_value!(i64, Int);
impl_from_value!(f32, Float);
impl_from_value!(f64, Double);
impl_from_value!(String, String);
impl_from_value!([f64; 2], Vec2);
impl_from_value!([f64; 3], Vec3);
impl_from_value!([f64; 4], Vec4);

impl FromValue for PropertyValue {
    fn from_value(value: &PropertyValue) -> Option<Self> {
        Some(value.clone())
    }
}
