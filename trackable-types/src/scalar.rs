//! Structural scalar values.
//!
//! A [`Scalar`] is anything the tracker copies and compares by value: numbers,
//! text, booleans, UUIDs and small composites of those (e.g. a key/value
//! pair). Arrays and value collections are sequences of scalars.
//!
//! Floats compare by bit pattern (`f64::total_cmp`), so a `NaN` written back
//! over a `NaN` snapshot is not reported as a change. Non-finite floats
//! serialize as the strings `"NaN"`, `"inf"` and `"-inf"`, since JSON has no
//! number for them.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A value that is copied and compared structurally.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Scalar {
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(#[serde(with = "float_repr")] f64),
    Text(String),
    Uuid(Uuid),
    /// Fixed composite of scalars (records, key/value pairs).
    Tuple(Vec<Scalar>),
}

impl Scalar {
    /// Short name of the variant, used in diagnostics.
    #[must_use]
    pub const fn kind_name(&self) -> &'static str {
        match self {
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::UInt(_) => "uint",
            Self::Float(_) => "float",
            Self::Text(_) => "text",
            Self::Uuid(_) => "uuid",
            Self::Tuple(_) => "tuple",
        }
    }

    /// Returns the text if this is a `Text` scalar.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Returns true if this is a `Text` scalar.
    #[must_use]
    pub const fn is_text(&self) -> bool {
        matches!(self, Self::Text(_))
    }

    /// Converts to a typed value, if the variant fits.
    #[must_use]
    pub fn to<T: FromScalar>(&self) -> Option<T> {
        T::from_scalar(self)
    }
}

mod float_repr {
    use serde::{Deserialize, Deserializer, Serializer, de};

    pub fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        if value.is_nan() {
            serializer.serialize_str("NaN")
        } else if value.is_infinite() {
            serializer.serialize_str(if *value > 0.0 { "inf" } else { "-inf" })
        } else {
            serializer.serialize_f64(*value)
        }
    }

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Number(f64),
        Text(String),
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        match Repr::deserialize(deserializer)? {
            Repr::Number(value) => Ok(value),
            Repr::Text(text) => match text.as_str() {
                "NaN" => Ok(f64::NAN),
                "inf" => Ok(f64::INFINITY),
                "-inf" => Ok(f64::NEG_INFINITY),
                other => Err(de::Error::invalid_value(
                    de::Unexpected::Str(other),
                    &"a number, \"NaN\", \"inf\" or \"-inf\"",
                )),
            },
        }
    }
}

impl PartialEq for Scalar {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::UInt(a), Self::UInt(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a.total_cmp(b).is_eq(),
            (Self::Text(a), Self::Text(b)) => a == b,
            (Self::Uuid(a), Self::Uuid(b)) => a == b,
            (Self::Tuple(a), Self::Tuple(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Scalar {}

impl From<bool> for Scalar {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i32> for Scalar {
    fn from(v: i32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<i64> for Scalar {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<u8> for Scalar {
    fn from(v: u8) -> Self {
        Self::UInt(u64::from(v))
    }
}

impl From<u32> for Scalar {
    fn from(v: u32) -> Self {
        Self::UInt(u64::from(v))
    }
}

impl From<u64> for Scalar {
    fn from(v: u64) -> Self {
        Self::UInt(v)
    }
}

impl From<f64> for Scalar {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for Scalar {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for Scalar {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<Uuid> for Scalar {
    fn from(v: Uuid) -> Self {
        Self::Uuid(v)
    }
}

impl<A: Into<Scalar>, B: Into<Scalar>> From<(A, B)> for Scalar {
    fn from((a, b): (A, B)) -> Self {
        Self::Tuple(vec![a.into(), b.into()])
    }
}

/// Typed extraction from a [`Scalar`].
///
/// Returns `None` when the variant does not fit the requested type or an
/// integer is out of range.
pub trait FromScalar: Sized {
    fn from_scalar(scalar: &Scalar) -> Option<Self>;
}

impl FromScalar for Scalar {
    fn from_scalar(scalar: &Scalar) -> Option<Self> {
        Some(scalar.clone())
    }
}

impl FromScalar for bool {
    fn from_scalar(scalar: &Scalar) -> Option<Self> {
        match scalar {
            Scalar::Bool(v) => Some(*v),
            _ => None,
        }
    }
}

impl FromScalar for i64 {
    fn from_scalar(scalar: &Scalar) -> Option<Self> {
        match scalar {
            Scalar::Int(v) => Some(*v),
            Scalar::UInt(v) => i64::try_from(*v).ok(),
            _ => None,
        }
    }
}

impl FromScalar for i32 {
    fn from_scalar(scalar: &Scalar) -> Option<Self> {
        i64::from_scalar(scalar).and_then(|v| i32::try_from(v).ok())
    }
}

impl FromScalar for u64 {
    fn from_scalar(scalar: &Scalar) -> Option<Self> {
        match scalar {
            Scalar::UInt(v) => Some(*v),
            Scalar::Int(v) => u64::try_from(*v).ok(),
            _ => None,
        }
    }
}

impl FromScalar for u32 {
    fn from_scalar(scalar: &Scalar) -> Option<Self> {
        u64::from_scalar(scalar).and_then(|v| u32::try_from(v).ok())
    }
}

impl FromScalar for u8 {
    fn from_scalar(scalar: &Scalar) -> Option<Self> {
        u64::from_scalar(scalar).and_then(|v| u8::try_from(v).ok())
    }
}

impl FromScalar for f64 {
    fn from_scalar(scalar: &Scalar) -> Option<Self> {
        match scalar {
            Scalar::Float(v) => Some(*v),
            _ => None,
        }
    }
}

impl FromScalar for String {
    fn from_scalar(scalar: &Scalar) -> Option<Self> {
        scalar.as_str().map(str::to_string)
    }
}

impl FromScalar for Uuid {
    fn from_scalar(scalar: &Scalar) -> Option<Self> {
        match scalar {
            Scalar::Uuid(v) => Some(*v),
            _ => None,
        }
    }
}

impl<A: FromScalar, B: FromScalar> FromScalar for (A, B) {
    fn from_scalar(scalar: &Scalar) -> Option<Self> {
        match scalar {
            Scalar::Tuple(items) if items.len() == 2 => {
                Some((A::from_scalar(&items[0])?, B::from_scalar(&items[1])?))
            }
            _ => None,
        }
    }
}
