//! IEC 61131-3 elementary types.
//!
//! Instance records hold plain Rust scalars; `Value` is the tagged form
//! used wherever a variable crosses the record boundary (monitoring,
//! retain images, I/O binding).

use std::fmt;

use serde::{Deserialize, Serialize};

/// Declared elementary type of a variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ValueKind {
    Bool,
    Sint,
    Int,
    Dint,
    Lint,
    Usint,
    Uint,
    Udint,
    Ulint,
    Real,
    Lreal,
}

impl ValueKind {
    /// Keyword used in Structured Text declarations.
    pub fn iec_name(self) -> &'static str {
        match self {
            ValueKind::Bool => "BOOL",
            ValueKind::Sint => "SINT",
            ValueKind::Int => "INT",
            ValueKind::Dint => "DINT",
            ValueKind::Lint => "LINT",
            ValueKind::Usint => "USINT",
            ValueKind::Uint => "UINT",
            ValueKind::Udint => "UDINT",
            ValueKind::Ulint => "ULINT",
            ValueKind::Real => "REAL",
            ValueKind::Lreal => "LREAL",
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.iec_name())
    }
}

/// A tagged variable value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "UPPERCASE")]
pub enum Value {
    Bool(bool),
    Sint(i8),
    Int(i16),
    Dint(i32),
    Lint(i64),
    Usint(u8),
    Uint(u16),
    Udint(u32),
    Ulint(u64),
    #[serde(with = "real_repr")]
    Real(f32),
    #[serde(with = "lreal_repr")]
    Lreal(f64),
}

impl Value {
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Bool(_) => ValueKind::Bool,
            Value::Sint(_) => ValueKind::Sint,
            Value::Int(_) => ValueKind::Int,
            Value::Dint(_) => ValueKind::Dint,
            Value::Lint(_) => ValueKind::Lint,
            Value::Usint(_) => ValueKind::Usint,
            Value::Uint(_) => ValueKind::Uint,
            Value::Udint(_) => ValueKind::Udint,
            Value::Ulint(_) => ValueKind::Ulint,
            Value::Real(_) => ValueKind::Real,
            Value::Lreal(_) => ValueKind::Lreal,
        }
    }
}

/// JSON has no literal for non-finite floats. They are written as the
/// strings `"inf"`, `"-inf"` and `"nan"` so that each stays distinct.
#[derive(Deserialize)]
#[serde(untagged)]
enum FloatRepr {
    Number(f64),
    Text(String),
}

fn non_finite_name(v: f64) -> Option<&'static str> {
    if v.is_nan() {
        Some("nan")
    } else if v == f64::INFINITY {
        Some("inf")
    } else if v == f64::NEG_INFINITY {
        Some("-inf")
    } else {
        None
    }
}

fn parse_non_finite(text: &str) -> Option<f64> {
    match text {
        "nan" => Some(f64::NAN),
        "inf" => Some(f64::INFINITY),
        "-inf" => Some(f64::NEG_INFINITY),
        _ => None,
    }
}

macro_rules! float_repr {
    ($module:ident, $ty:ty) => {
        mod $module {
            use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

            use super::{non_finite_name, parse_non_finite, FloatRepr};

            pub fn serialize<S: Serializer>(v: &$ty, s: S) -> Result<S::Ok, S::Error> {
                match non_finite_name(f64::from(*v)) {
                    Some(name) => s.serialize_str(name),
                    None => v.serialize(s),
                }
            }

            pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<$ty, D::Error> {
                match FloatRepr::deserialize(d)? {
                    FloatRepr::Number(v) => Ok(v as $ty),
                    FloatRepr::Text(text) => parse_non_finite(&text)
                        .map(|v| v as $ty)
                        .ok_or_else(|| de::Error::custom(format!("invalid float {:?}", text))),
                }
            }
        }
    };
}

float_repr!(real_repr, f32);
float_repr!(lreal_repr, f64);

/// Renders values as Structured Text literals (`TRUE`, `INT#-3`, ...).
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(true) => f.write_str("TRUE"),
            Value::Bool(false) => f.write_str("FALSE"),
            Value::Sint(v) => write!(f, "SINT#{}", v),
            Value::Int(v) => write!(f, "INT#{}", v),
            Value::Dint(v) => write!(f, "DINT#{}", v),
            Value::Lint(v) => write!(f, "LINT#{}", v),
            Value::Usint(v) => write!(f, "USINT#{}", v),
            Value::Uint(v) => write!(f, "UINT#{}", v),
            Value::Udint(v) => write!(f, "UDINT#{}", v),
            Value::Ulint(v) => write!(f, "ULINT#{}", v),
            Value::Real(v) => write!(f, "REAL#{:?}", v),
            Value::Lreal(v) => write!(f, "LREAL#{:?}", v),
        }
    }
}

/// A Rust scalar that can be the storage type of a declared variable.
pub trait IecType: Copy + Default + PartialEq + fmt::Debug {
    const KIND: ValueKind;

    fn into_value(self) -> Value;

    /// `None` when `value` has a different kind. No implicit conversion.
    fn from_value(value: Value) -> Option<Self>;
}

macro_rules! impl_iec_type {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl IecType for $ty {
                const KIND: ValueKind = ValueKind::$variant;

                fn into_value(self) -> Value {
                    Value::$variant(self)
                }

                fn from_value(value: Value) -> Option<Self> {
                    match value {
                        Value::$variant(v) => Some(v),
                        _ => None,
                    }
                }
            }

            impl From<$ty> for Value {
                fn from(v: $ty) -> Self {
                    Value::$variant(v)
                }
            }
        )*
    };
}

impl_iec_type! {
    bool => Bool,
    i8 => Sint,
    i16 => Int,
    i32 => Dint,
    i64 => Lint,
    u8 => Usint,
    u16 => Uint,
    u32 => Udint,
    u64 => Ulint,
    f32 => Real,
    f64 => Lreal,
}
