//! Declared parameter types, bound argument values, and the string
//! coercion rules that turn raw request parameters into typed arguments.
//!
//! Coercion rules for a raw string and a target type:
//! - `Bool`: `"on"` (any case) is `true`, otherwise a `true`/`false` literal.
//! - `Guid`: any standard GUID spelling (hyphenated, simple, braced).
//! - `Array(T)`: split on `,` and coerce every piece to `T`.
//! - everything else: primitive parse (numbers, chars, enum-by-name) or
//!   string passthrough.
//!
//! An absent raw value binds the type's zero value for value types and
//! `Null` for `String` and arrays.

use std::fmt;

use serde::ser::{Serialize, SerializeSeq, Serializer};
use uuid::Uuid;

use crate::error::{BindingError, TypeMismatch};

// ──────────────────────────────────────────────
// ParamType
// ──────────────────────────────────────────────

/// The declared type of an operation parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamType {
    Bool,
    Guid,
    Int32,
    Int64,
    UInt32,
    UInt64,
    Float64,
    Char,
    String,
    /// A closed set of variant names, matched exactly.
    Enum(Vec<String>),
    Array(Box<ParamType>),
}

impl ParamType {
    pub fn array_of(element: ParamType) -> Self {
        ParamType::Array(Box::new(element))
    }

    pub fn enumeration<I, S>(variants: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ParamType::Enum(variants.into_iter().map(Into::into).collect())
    }

    /// Value types always have a zero instance; `String` and arrays are
    /// reference types and bind `Null` when absent.
    pub fn is_value_type(&self) -> bool {
        !matches!(self, ParamType::String | ParamType::Array(_))
    }
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamType::Bool => write!(f, "bool"),
            ParamType::Guid => write!(f, "guid"),
            ParamType::Int32 => write!(f, "int"),
            ParamType::Int64 => write!(f, "long"),
            ParamType::UInt32 => write!(f, "uint"),
            ParamType::UInt64 => write!(f, "ulong"),
            ParamType::Float64 => write!(f, "double"),
            ParamType::Char => write!(f, "char"),
            ParamType::String => write!(f, "string"),
            ParamType::Enum(variants) => write!(f, "enum({})", variants.join("|")),
            ParamType::Array(element) => write!(f, "{}[]", element),
        }
    }
}

impl Serialize for ParamType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

// ──────────────────────────────────────────────
// Value
// ──────────────────────────────────────────────

/// A bound argument value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Guid(Uuid),
    Int(i64),
    UInt(u64),
    Float(f64),
    Char(char),
    Str(String),
    /// The matched variant name of an enum parameter.
    Enum(String),
    Array(Vec<Value>),
}

impl Value {
    /// Short name of the value's shape, used in type mismatch messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Guid(_) => "guid",
            Value::Int(_) => "int",
            Value::UInt(_) => "uint",
            Value::Float(_) => "float",
            Value::Char(_) => "char",
            Value::Str(_) => "string",
            Value::Enum(_) => "enum",
            Value::Array(_) => "array",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Guid(g) => serializer.collect_str(&g.hyphenated()),
            Value::Int(i) => serializer.serialize_i64(*i),
            Value::UInt(u) => serializer.serialize_u64(*u),
            Value::Float(x) => serializer.serialize_f64(*x),
            Value::Char(c) => serializer.serialize_char(*c),
            Value::Str(s) | Value::Enum(s) => serializer.serialize_str(s),
            Value::Array(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
        }
    }
}

// ──────────────────────────────────────────────
// Coercion
// ──────────────────────────────────────────────

/// Coerce a raw request string to the declared type.
pub fn coerce(raw: Option<&str>, ty: &ParamType) -> Result<Value, BindingError> {
    let raw = match raw {
        Some(raw) => raw,
        None if ty.is_value_type() => return Ok(zero_value(ty)),
        None => return Ok(Value::Null),
    };

    match ty {
        ParamType::Bool => {
            if raw.eq_ignore_ascii_case("on") {
                return Ok(Value::Bool(true));
            }
            parse_bool(raw)
                .map(Value::Bool)
                .ok_or_else(|| invalid(raw, ty))
        }
        ParamType::Guid => Uuid::parse_str(raw.trim())
            .map(Value::Guid)
            .map_err(|_| invalid(raw, ty)),
        ParamType::Array(element) => raw
            .split(',')
            .map(|piece| coerce(Some(piece), element))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        ParamType::Int32 => parse_int::<i32>(raw, ty).map(|n| Value::Int(n.into())),
        ParamType::Int64 => parse_int::<i64>(raw, ty).map(Value::Int),
        ParamType::UInt32 => parse_int::<u32>(raw, ty).map(|n| Value::UInt(n.into())),
        ParamType::UInt64 => parse_int::<u64>(raw, ty).map(Value::UInt),
        ParamType::Float64 => raw
            .trim()
            .parse::<f64>()
            .map(Value::Float)
            .map_err(|_| invalid(raw, ty)),
        ParamType::Char => {
            let mut chars = raw.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => Ok(Value::Char(c)),
                _ => Err(invalid(raw, ty)),
            }
        }
        ParamType::String => Ok(Value::Str(raw.to_string())),
        ParamType::Enum(variants) => variants
            .iter()
            .find(|variant| variant.as_str() == raw.trim())
            .map(|variant| Value::Enum(variant.clone()))
            .ok_or_else(|| invalid(raw, ty)),
    }
}

/// The zero instance of a declared type.
///
/// Reference types get an empty instance (`""`, `[]`) rather than `Null`;
/// this is only reached through the required-with-default binding rule.
pub fn zero_value(ty: &ParamType) -> Value {
    match ty {
        ParamType::Bool => Value::Bool(false),
        ParamType::Guid => Value::Guid(Uuid::nil()),
        ParamType::Int32 | ParamType::Int64 => Value::Int(0),
        ParamType::UInt32 | ParamType::UInt64 => Value::UInt(0),
        ParamType::Float64 => Value::Float(0.0),
        ParamType::Char => Value::Char('\0'),
        ParamType::String => Value::Str(String::new()),
        ParamType::Enum(variants) => variants
            .first()
            .map(|first| Value::Enum(first.clone()))
            .unwrap_or(Value::Null),
        ParamType::Array(_) => Value::Array(Vec::new()),
    }
}

fn invalid(raw: &str, ty: &ParamType) -> BindingError {
    BindingError::InvalidValue {
        raw: raw.to_string(),
        expected: ty.to_string(),
    }
}

/// Boolean literal, case-insensitive, surrounding whitespace ignored.
fn parse_bool(raw: &str) -> Option<bool> {
    let trimmed = raw.trim();
    if trimmed.eq_ignore_ascii_case("true") {
        Some(true)
    } else if trimmed.eq_ignore_ascii_case("false") {
        Some(false)
    } else {
        None
    }
}

fn parse_int<T>(raw: &str, ty: &ParamType) -> Result<T, BindingError>
where
    T: std::str::FromStr<Err = std::num::ParseIntError>,
{
    use std::num::IntErrorKind;

    raw.trim().parse::<T>().map_err(|e| match e.kind() {
        IntErrorKind::PosOverflow | IntErrorKind::NegOverflow => BindingError::OutOfRange {
            raw: raw.to_string(),
            expected: ty.to_string(),
        },
        _ => invalid(raw, ty),
    })
}

// ──────────────────────────────────────────────
// FromValue
// ──────────────────────────────────────────────

/// Read a bound [`Value`] as a concrete Rust type inside an operation body.
///
/// Value types read `Null` as their zero value, matching how an absent
/// value-typed argument is passed to an operation. `String` and `Vec<T>`
/// reject `Null`; ask for `Option<T>` to observe absence.
pub trait FromValue: Sized {
    fn from_value(value: &Value) -> Result<Self, TypeMismatch>;
}

fn mismatch(expected: &'static str, value: &Value) -> TypeMismatch {
    TypeMismatch {
        expected,
        found: value.kind(),
    }
}

macro_rules! int_from_value {
    ($($ty:ty => $name:literal),* $(,)?) => {
        $(
            impl FromValue for $ty {
                fn from_value(value: &Value) -> Result<Self, TypeMismatch> {
                    match value {
                        Value::Null => Ok(0),
                        Value::Int(n) => <$ty>::try_from(*n).map_err(|_| mismatch($name, value)),
                        Value::UInt(n) => <$ty>::try_from(*n).map_err(|_| mismatch($name, value)),
                        other => Err(mismatch($name, other)),
                    }
                }
            }
        )*
    };
}

int_from_value! {
    i32 => "int",
    i64 => "long",
    u32 => "uint",
    u64 => "ulong",
    usize => "usize",
}

impl FromValue for bool {
    fn from_value(value: &Value) -> Result<Self, TypeMismatch> {
        match value {
            Value::Null => Ok(false),
            Value::Bool(b) => Ok(*b),
            other => Err(mismatch("bool", other)),
        }
    }
}

impl FromValue for f64 {
    fn from_value(value: &Value) -> Result<Self, TypeMismatch> {
        match value {
            Value::Null => Ok(0.0),
            Value::Float(x) => Ok(*x),
            Value::Int(n) => Ok(*n as f64),
            Value::UInt(n) => Ok(*n as f64),
            other => Err(mismatch("double", other)),
        }
    }
}

impl FromValue for char {
    fn from_value(value: &Value) -> Result<Self, TypeMismatch> {
        match value {
            Value::Null => Ok('\0'),
            Value::Char(c) => Ok(*c),
            other => Err(mismatch("char", other)),
        }
    }
}

impl FromValue for Uuid {
    fn from_value(value: &Value) -> Result<Self, TypeMismatch> {
        match value {
            Value::Null => Ok(Uuid::nil()),
            Value::Guid(g) => Ok(*g),
            other => Err(mismatch("guid", other)),
        }
    }
}

impl FromValue for String {
    fn from_value(value: &Value) -> Result<Self, TypeMismatch> {
        match value {
            Value::Str(s) | Value::Enum(s) => Ok(s.clone()),
            other => Err(mismatch("string", other)),
        }
    }
}

impl<T: FromValue> FromValue for Vec<T> {
    fn from_value(value: &Value) -> Result<Self, TypeMismatch> {
        match value {
            Value::Array(items) => items.iter().map(T::from_value).collect(),
            other => Err(mismatch("array", other)),
        }
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: &Value) -> Result<Self, TypeMismatch> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}

impl FromValue for Value {
    fn from_value(value: &Value) -> Result<Self, TypeMismatch> {
        Ok(value.clone())
    }
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────
