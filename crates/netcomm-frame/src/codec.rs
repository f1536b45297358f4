use std::fmt;

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{FrameError, Result};
use crate::markers::{
    length_tag, BOOLEAN, EOT, ETX, FLOAT_32, FLOAT_64, INT_16, INT_32, INT_64, INT_8, SOH, STX,
};
use crate::parser::{Advance, FrameParser};
use crate::value::{Float, FloatRepr, IntRepr, Integer, Value};

/// Maximum declared length of one text or byte-array value.
pub const ARG_MAXLEN: usize = 0x7F_FFFF - 5;

/// Maximum length of the frame text (command byte plus values).
pub const TXT_MAXLEN: usize = 0x7FFF_FFFF - 10;

/// Default initial capacity of the parser's accumulation buffer: 8 KiB.
pub const DEFAULT_BUFFER_CAPACITY: usize = 8 * 1024;

/// A decoded or to-be-encoded message: one command byte and ordered values.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    /// Application command.
    pub command: u8,
    /// Arguments in wire order.
    pub values: Vec<Value>,
}

impl Frame {
    /// Create a new frame.
    pub fn new(command: u8, values: impl IntoIterator<Item = Value>) -> Self {
        Self {
            command,
            values: values.into_iter().collect(),
        }
    }

    /// Encode this frame into a fresh buffer.
    pub fn encode(&self) -> Result<Bytes> {
        let mut dst = BytesMut::new();
        encode_frame(i64::from(self.command), &self.values, &mut dst)?;
        Ok(dst.freeze())
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:02X} (", self.command)?;
        for (i, value) in self.values.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            match value {
                Value::Bytes(_) => write!(f, "[{value}]")?,
                other => write!(f, "{other}")?,
            }
        }
        f.write_str(")")
    }
}

/// XOR of every byte in `text`.
pub fn checksum(text: &[u8]) -> u8 {
    text.iter().fold(0u8, |acc, b| acc ^ b)
}

/// Encode a command and its values into the wire format.
///
/// Wire format:
/// ```text
/// ┌─────┬────────────┬─────┬───────────────────────┬─────┬─────┬─────┐
/// │ SOH │ OTL tag +  │ STX │ TEXT                  │ ETX │ CHK │ EOT │
/// │ 01  │ 1/2/4B len │ 02  │ command, tagged values│ 03  │ XOR │ 04  │
/// └─────┴────────────┴─────┴───────────────────────┴─────┴─────┴─────┘
/// ```
///
/// Every number is big-endian and each integer, float and length field uses
/// the narrowest width that holds it. Nothing is written to `dst` on error.
pub fn encode_frame(command: i64, values: &[Value], dst: &mut BytesMut) -> Result<()> {
    let command = u8::try_from(command).map_err(|_| FrameError::CommandOutOfRange { command })?;

    let mut text = BytesMut::with_capacity(1 + values.len() * 5);
    text.put_u8(command);
    for value in values {
        encode_value(value, &mut text)?;
    }

    if text.len() > TXT_MAXLEN {
        return Err(FrameError::FrameTooLarge {
            len: text.len(),
            max: TXT_MAXLEN,
        });
    }

    let (otl_tag, otl_width) = length_tag(0x10, text.len());
    dst.reserve(text.len() + otl_width + 5);
    dst.put_u8(SOH);
    dst.put_u8(otl_tag);
    put_length(dst, text.len(), otl_width);
    dst.put_u8(STX);
    dst.put_slice(&text);
    dst.put_u8(ETX);
    dst.put_u8(checksum(&text));
    dst.put_u8(EOT);
    Ok(())
}

/// Decode the first frame in `src`.
///
/// Returns `Ok(None)` if `src` holds only part of a frame. Bytes after the
/// first frame are ignored.
pub fn decode_frame(src: &[u8]) -> Result<Option<Frame>> {
    let mut parser = FrameParser::new();
    parser.append(src);
    match parser.advance()? {
        Advance::FrameReady(frame) => Ok(Some(frame)),
        Advance::NeedMoreData | Advance::StillAccumulating => Ok(None),
    }
}

fn encode_value(value: &Value, text: &mut BytesMut) -> Result<()> {
    match value {
        Value::Integer(v) => put_integer(text, *v),
        Value::Float(v) => put_float(text, *v),
        Value::Boolean(v) => {
            text.put_u8(BOOLEAN);
            text.put_u8(u8::from(*v));
        }
        Value::Text(s) => {
            let len = s.len();
            if len > ARG_MAXLEN {
                return Err(FrameError::StringTooLong {
                    len,
                    max: ARG_MAXLEN,
                });
            }
            put_length_prefixed(text, 0x90, s.as_bytes());
        }
        Value::Bytes(b) => {
            let len = b.len();
            if len > ARG_MAXLEN {
                return Err(FrameError::ByteArrayTooLong {
                    len,
                    max: ARG_MAXLEN,
                });
            }
            put_length_prefixed(text, 0xB0, b);
        }
    }
    Ok(())
}

// Numeric widths were fixed when the value was built; write them as stored.
fn put_integer(text: &mut BytesMut, value: Integer) {
    match value.0 {
        IntRepr::W1(v) => {
            text.put_u8(INT_8);
            text.put_i8(v);
        }
        IntRepr::W2(v) => {
            text.put_u8(INT_16);
            text.put_i16(v);
        }
        IntRepr::W4(v) => {
            text.put_u8(INT_32);
            text.put_i32(v);
        }
        IntRepr::W8(v) => {
            text.put_u8(INT_64);
            text.put_i64(v);
        }
    }
}

fn put_float(text: &mut BytesMut, value: Float) {
    match value.0 {
        FloatRepr::W4(v) => {
            text.put_u8(FLOAT_32);
            text.put_f32(v);
        }
        FloatRepr::W8(v) => {
            text.put_u8(FLOAT_64);
            text.put_f64(v);
        }
    }
}

fn put_length_prefixed(text: &mut BytesMut, base: u8, payload: &[u8]) {
    let (tag, width) = length_tag(base, payload.len());
    text.put_u8(tag);
    put_length(text, payload.len(), width);
    text.put_slice(payload);
}

// Callers bound `len` by the field width chosen in `length_tag`.
fn put_length(dst: &mut BytesMut, len: usize, width: usize) {
    match width {
        1 => dst.put_u8(len as u8),
        2 => dst.put_u16(len as u16),
        _ => dst.put_u32(len as u32),
    }
}

/// Configuration for the frame parser.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Largest accepted outer text length. Default: [`TXT_MAXLEN`].
    pub max_text_len: usize,
    /// Largest accepted length-prefixed value. Default: [`ARG_MAXLEN`].
    pub max_arg_len: usize,
    /// Initial accumulation buffer capacity. Default: 8 KiB.
    pub initial_capacity: usize,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_text_len: TXT_MAXLEN,
            max_arg_len: ARG_MAXLEN,
            initial_capacity: DEFAULT_BUFFER_CAPACITY,
        }
    }
}
