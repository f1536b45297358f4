use std::fmt;
use std::str::FromStr;

use bytes::Bytes;

use crate::error::FrameError;

/// One typed argument of a frame.
///
/// Numeric arguments carry their wire width inside [`Integer`] and
/// [`Float`], which can only be built in canonical form. Any value a caller
/// constructs therefore encodes and decodes back to an equal value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Integer(Integer),
    Float(Float),
    Boolean(bool),
    Text(String),
    Bytes(Bytes),
}

/// Signed integer argument, carried in 1, 2, 4 or 8 bytes.
///
/// [`Integer::new`] picks the narrowest width that holds the value. A wider
/// width only appears on integers decoded from a peer that chose it, and
/// re-encoding such an integer keeps that width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Integer(pub(crate) IntRepr);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum IntRepr {
    W1(i8),
    W2(i16),
    W4(i32),
    W8(i64),
}

impl Integer {
    pub fn new(value: i64) -> Self {
        let repr = if let Ok(v) = i8::try_from(value) {
            IntRepr::W1(v)
        } else if let Ok(v) = i16::try_from(value) {
            IntRepr::W2(v)
        } else if let Ok(v) = i32::try_from(value) {
            IntRepr::W4(v)
        } else {
            IntRepr::W8(value)
        };
        Self(repr)
    }

    pub fn get(self) -> i64 {
        match self.0 {
            IntRepr::W1(v) => i64::from(v),
            IntRepr::W2(v) => i64::from(v),
            IntRepr::W4(v) => i64::from(v),
            IntRepr::W8(v) => v,
        }
    }

    /// Width on the wire, in bytes.
    pub fn width(self) -> usize {
        match self.0 {
            IntRepr::W1(_) => 1,
            IntRepr::W2(_) => 2,
            IntRepr::W4(_) => 4,
            IntRepr::W8(_) => 8,
        }
    }
}

/// IEEE-754 argument, carried in 4 or 8 bytes.
///
/// [`Float::new`] rounds to `f32` whenever the magnitude fits, which is
/// what the wire format does, so the stored value is exactly the one a
/// receiver will see. `NaN` and infinities stay 64-bit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Float(pub(crate) FloatRepr);

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum FloatRepr {
    W4(f32),
    W8(f64),
}

impl Float {
    pub fn new(value: f64) -> Self {
        if value.abs() <= f64::from(f32::MAX) {
            Self(FloatRepr::W4(value as f32))
        } else {
            Self(FloatRepr::W8(value))
        }
    }

    pub fn get(self) -> f64 {
        match self.0 {
            FloatRepr::W4(v) => f64::from(v),
            FloatRepr::W8(v) => v,
        }
    }

    /// Width on the wire, in bytes.
    pub fn width(self) -> usize {
        match self.0 {
            FloatRepr::W4(_) => 4,
            FloatRepr::W8(_) => 8,
        }
    }
}

impl fmt::Display for Integer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.get())
    }
}

impl fmt::Display for Float {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // f32 formatting keeps narrowed values short (-1.1, not -1.100000023841858).
        match self.0 {
            FloatRepr::W4(v) => write!(f, "{v}"),
            FloatRepr::W8(v) => write!(f, "{v}"),
        }
    }
}

/// The five value kinds the wire format supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Integer,
    Float,
    Boolean,
    Text,
    Bytes,
}

impl ValueKind {
    /// Lowercase name, also the prefix accepted by [`Value::from_str`].
    pub fn as_str(self) -> &'static str {
        match self {
            ValueKind::Integer => "int",
            ValueKind::Float => "float",
            ValueKind::Boolean => "bool",
            ValueKind::Text => "str",
            ValueKind::Bytes => "bytes",
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Value {
    /// Integer in the narrowest signed width that holds `value`.
    pub fn integer(value: i64) -> Self {
        Value::Integer(Integer::new(value))
    }

    /// Float narrowed to 32 bits whenever its magnitude fits `f32`.
    pub fn float(value: f64) -> Self {
        Value::Float(Float::new(value))
    }

    pub fn text(value: impl Into<String>) -> Self {
        Value::Text(value.into())
    }

    pub fn bytes(value: impl Into<Bytes>) -> Self {
        Value::Bytes(value.into())
    }

    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Integer(_) => ValueKind::Integer,
            Value::Float(_) => ValueKind::Float,
            Value::Boolean(_) => ValueKind::Boolean,
            Value::Text(_) => ValueKind::Text,
            Value::Bytes(_) => ValueKind::Bytes,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            Value::Integer(v) => Some(v.get()),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            Value::Float(v) => Some(v.get()),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match *self {
            Value::Boolean(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(v) => Some(v.as_str()),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(v) => Some(v.as_ref()),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Integer(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Boolean(v) => write!(f, "{v}"),
            Value::Text(v) => f.write_str(v),
            Value::Bytes(v) => {
                for (i, b) in v.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "0x{b:02X}")?;
                }
                Ok(())
            }
        }
    }
}

/// Parses `kind:literal`, e.g. `int:-256`, `float:-1.1`, `bool:true`,
/// `str:Hello` or `bytes:414243` (hex).
impl FromStr for Value {
    type Err = FrameError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let (kind, literal) = input
            .split_once(':')
            .ok_or_else(|| FrameError::UnsupportedValueType(input.to_string()))?;

        let invalid = |kind: ValueKind| FrameError::InvalidValue {
            kind: kind.as_str(),
            input: literal.to_string(),
        };

        match kind {
            "int" | "i" => literal
                .trim()
                .parse::<i64>()
                .map(Value::integer)
                .map_err(|_| invalid(ValueKind::Integer)),
            "float" | "f" => literal
                .trim()
                .parse::<f64>()
                .map(Value::float)
                .map_err(|_| invalid(ValueKind::Float)),
            "bool" | "b" => match literal.trim() {
                "true" | "1" => Ok(Value::Boolean(true)),
                "false" | "0" => Ok(Value::Boolean(false)),
                _ => Err(invalid(ValueKind::Boolean)),
            },
            "str" | "s" => Ok(Value::text(literal)),
            "bytes" | "x" => parse_hex(literal)
                .map(Value::bytes)
                .ok_or_else(|| invalid(ValueKind::Bytes)),
            other => Err(FrameError::UnsupportedValueType(other.to_string())),
        }
    }
}

fn parse_hex(input: &str) -> Option<Vec<u8>> {
    let digits: Vec<u8> = input
        .bytes()
        .filter(|b| !matches!(b, b' ' | b',' | b'_'))
        .collect();
    if digits.len() % 2 != 0 {
        return None;
    }
    digits
        .chunks(2)
        .map(|pair| {
            let hi = char::from(pair[0]).to_digit(16)?;
            let lo = char::from(pair[1]).to_digit(16)?;
            u8::try_from(hi * 16 + lo).ok()
        })
        .collect()
}

macro_rules! integer_from {
    ($($t:ty),*) => {
        $(
            impl From<$t> for Value {
                fn from(value: $t) -> Self {
                    Value::integer(i64::from(value))
                }
            }
        )*
    };
}

integer_from!(i8, i16, i32, i64, u8, u16, u32);

impl From<f32> for Value {
    fn from(value: f32) -> Self {
        Value::float(f64::from(value))
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::float(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Boolean(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl From<Vec<u8>> for Value {
    fn from(value: Vec<u8>) -> Self {
        Value::Bytes(Bytes::from(value))
    }
}

impl From<&[u8]> for Value {
    fn from(value: &[u8]) -> Self {
        Value::Bytes(Bytes::copy_from_slice(value))
    }
}

impl From<Bytes> for Value {
    fn from(value: Bytes) -> Self {
        Value::Bytes(value)
    }
}
