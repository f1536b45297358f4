use std::fmt;

use bytes::{Buf, Bytes, BytesMut};
use tracing::trace;

use crate::codec::{checksum, Frame, FrameConfig};
use crate::error::DecodeError;
use crate::markers::{
    length_field_width, read_signed_be, BOOLEAN, BYTES_1, BYTES_2, BYTES_4, EOT, ETX, FLOAT_32,
    FLOAT_64, INT_16, INT_32, INT_64, INT_8, SOH, STX, TEXT_1, TEXT_2, TEXT_4,
};
use crate::value::{Float, FloatRepr, IntRepr, Integer, Value};

/// Position of the parser within the current frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParserState {
    /// Expecting SOH. The only state in which the buffer holds no consumed bytes.
    AwaitStart,
    /// Expecting the OTL tag and its length field.
    AwaitLengthHeader,
    /// Expecting STX.
    AwaitBodyMarker,
    /// Expecting the whole frame text followed by ETX.
    AwaitBody,
    /// Expecting the checksum byte.
    AwaitChecksum,
    /// Expecting EOT.
    AwaitEnd,
}

impl fmt::Display for ParserState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ParserState::AwaitStart => "awaiting SOH",
            ParserState::AwaitLengthHeader => "awaiting text length",
            ParserState::AwaitBodyMarker => "awaiting STX",
            ParserState::AwaitBody => "awaiting text",
            ParserState::AwaitChecksum => "awaiting checksum",
            ParserState::AwaitEnd => "awaiting EOT",
        })
    }
}

/// Outcome of one [`FrameParser::advance`] call.
#[derive(Debug, Clone, PartialEq)]
pub enum Advance {
    /// The buffer is empty and no frame is in flight.
    NeedMoreData,
    /// Part of a frame is buffered; more bytes are required.
    StillAccumulating,
    /// A checksum-validated frame was completed and its bytes released.
    FrameReady(Frame),
}

/// Resumable decoder for the framed wire format.
///
/// Bytes are [`append`](FrameParser::append)ed as they arrive and
/// [`advance`](FrameParser::advance) is called until it stops returning
/// [`Advance::FrameReady`]. Fragmentation is invisible to the caller: a
/// frame split over any number of appends decodes exactly like one delivered
/// at once, and already-validated header bytes are never scanned again.
///
/// After a [`DecodeError`] the parser stays on the offending byte; call
/// [`reset`](FrameParser::reset) to discard everything and start over.
#[derive(Debug)]
pub struct FrameParser {
    buf: BytesMut,
    pos: usize,
    state: ParserState,
    text_len: usize,
    checksum: u8,
    command: u8,
    values: Vec<Value>,
    config: FrameConfig,
}

impl Default for FrameParser {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameParser {
    /// Create a parser with default configuration.
    pub fn new() -> Self {
        Self::with_config(FrameConfig::default())
    }

    /// Create a parser with explicit configuration.
    pub fn with_config(config: FrameConfig) -> Self {
        Self {
            buf: BytesMut::with_capacity(config.initial_capacity),
            pos: 0,
            state: ParserState::AwaitStart,
            text_len: 0,
            checksum: 0,
            command: 0,
            values: Vec::new(),
            config,
        }
    }

    /// Copy received bytes into the accumulation buffer.
    pub fn append(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    /// Current state machine position.
    pub fn state(&self) -> ParserState {
        self.state
    }

    /// Bytes received but not yet resolved into a completed frame.
    pub fn buffered_len(&self) -> usize {
        self.buf.len()
    }

    /// Whether a frame is partially received.
    pub fn in_frame(&self) -> bool {
        self.state != ParserState::AwaitStart || !self.buf.is_empty()
    }

    /// Current parser configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }

    /// Drop all buffered bytes and return to [`ParserState::AwaitStart`].
    pub fn reset(&mut self) {
        self.buf.clear();
        self.pos = 0;
        self.text_len = 0;
        self.checksum = 0;
        self.command = 0;
        self.values.clear();
        self.state = ParserState::AwaitStart;
    }

    /// Run the state machine until it completes a frame or runs out of bytes.
    pub fn advance(&mut self) -> Result<Advance, DecodeError> {
        loop {
            let unread = &self.buf[self.pos..];
            let Some(&first) = unread.first() else {
                return Ok(self.idle_result());
            };

            match self.state {
                ParserState::AwaitStart => {
                    self.expect(SOH, first)?;
                    self.pos += 1;
                    self.state = ParserState::AwaitLengthHeader;
                }
                ParserState::AwaitLengthHeader => {
                    let width = length_field_width(first).ok_or(DecodeError::InvalidLengthTag(first))?;
                    let Some(field) = unread.get(1..1 + width) else {
                        return Ok(Advance::StillAccumulating);
                    };
                    let declared = read_signed_be(field).ok_or(DecodeError::InvalidLengthTag(first))?;
                    self.text_len = checked_length(declared, self.config.max_text_len, |len, max| {
                        DecodeError::TextTooLong { len, max }
                    })?;
                    self.pos += 1 + width;
                    self.state = ParserState::AwaitBodyMarker;
                }
                ParserState::AwaitBodyMarker => {
                    self.expect(STX, first)?;
                    self.pos += 1;
                    self.state = ParserState::AwaitBody;
                }
                ParserState::AwaitBody => {
                    if unread.len() <= self.text_len {
                        return Ok(Advance::StillAccumulating);
                    }
                    let end = unread[self.text_len];
                    if end != ETX {
                        return Err(DecodeError::UnexpectedByte {
                            state: self.state,
                            expected: ETX,
                            found: end,
                        });
                    }

                    let text = &unread[..self.text_len];
                    let (command, values) = decode_text(text, self.config.max_arg_len)?;
                    self.checksum = checksum(text);
                    self.command = command;
                    self.values = values;
                    self.pos += self.text_len + 1;
                    self.state = ParserState::AwaitChecksum;
                }
                ParserState::AwaitChecksum => {
                    if first != self.checksum {
                        return Err(DecodeError::ChecksumMismatch {
                            expected: self.checksum,
                            found: first,
                        });
                    }
                    self.pos += 1;
                    self.state = ParserState::AwaitEnd;
                }
                ParserState::AwaitEnd => {
                    self.expect(EOT, first)?;
                    self.pos += 1;
                    return Ok(Advance::FrameReady(self.finish_frame()));
                }
            }
        }
    }

    fn expect(&self, expected: u8, found: u8) -> Result<(), DecodeError> {
        if found == expected {
            Ok(())
        } else {
            Err(DecodeError::UnexpectedByte {
                state: self.state,
                expected,
                found,
            })
        }
    }

    fn idle_result(&self) -> Advance {
        if self.in_frame() {
            Advance::StillAccumulating
        } else {
            Advance::NeedMoreData
        }
    }

    // Release the completed frame's bytes, keeping any trailing bytes of the
    // next frame at the front of the buffer.
    fn finish_frame(&mut self) -> Frame {
        self.buf.advance(self.pos);
        self.pos = 0;
        self.state = ParserState::AwaitStart;
        self.text_len = 0;
        self.checksum = 0;

        let frame = Frame {
            command: self.command,
            values: std::mem::take(&mut self.values),
        };
        trace!(
            command = frame.command,
            values = frame.values.len(),
            remaining = self.buf.len(),
            "decoded frame"
        );
        frame
    }
}

fn checked_length(
    declared: i64,
    max: usize,
    too_long: impl FnOnce(usize, usize) -> DecodeError,
) -> Result<usize, DecodeError> {
    let len = usize::try_from(declared).map_err(|_| DecodeError::NegativeLength(declared))?;
    if len > max {
        return Err(too_long(len, max));
    }
    Ok(len)
}

fn int(repr: IntRepr) -> Value {
    Value::Integer(Integer(repr))
}

fn float(repr: FloatRepr) -> Value {
    Value::Float(Float(repr))
}

fn decode_text(text: &[u8], max_arg_len: usize) -> Result<(u8, Vec<Value>), DecodeError> {
    let (&command, mut rest) = text.split_first().ok_or(DecodeError::EmptyText)?;
    let mut values = Vec::new();
    let mut offset = 1usize;

    while let Some((&tag, body)) = rest.split_first() {
        let (value, used) = match tag {
            INT_8 => (int(IntRepr::W1(i8::from_be_bytes(take(body, tag)?))), 1),
            INT_16 => (int(IntRepr::W2(i16::from_be_bytes(take(body, tag)?))), 2),
            INT_32 => (int(IntRepr::W4(i32::from_be_bytes(take(body, tag)?))), 4),
            INT_64 => (int(IntRepr::W8(i64::from_be_bytes(take(body, tag)?))), 8),
            FLOAT_32 => (float(FloatRepr::W4(f32::from_be_bytes(take(body, tag)?))), 4),
            FLOAT_64 => (float(FloatRepr::W8(f64::from_be_bytes(take(body, tag)?))), 8),
            BOOLEAN => {
                let [flag] = take(body, tag)?;
                (Value::Boolean(flag != 0), 1)
            }
            TEXT_1 | TEXT_2 | TEXT_4 => {
                let (payload, used) = length_prefixed(body, tag, max_arg_len)?;
                let text = std::str::from_utf8(payload).map_err(|_| DecodeError::InvalidUtf8)?;
                (Value::Text(text.to_string()), used)
            }
            BYTES_1 | BYTES_2 | BYTES_4 => {
                let (payload, used) = length_prefixed(body, tag, max_arg_len)?;
                (Value::Bytes(Bytes::copy_from_slice(payload)), used)
            }
            _ => return Err(DecodeError::UnknownValueTag { tag, offset }),
        };
        values.push(value);
        rest = &body[used..];
        offset += 1 + used;
    }

    Ok((command, values))
}

fn take<const N: usize>(body: &[u8], tag: u8) -> Result<[u8; N], DecodeError> {
    body.get(..N)
        .and_then(|bytes| bytes.try_into().ok())
        .ok_or(DecodeError::ValueOverrun { tag })
}

fn length_prefixed(body: &[u8], tag: u8, max_arg_len: usize) -> Result<(&[u8], usize), DecodeError> {
    let width = usize::from(tag & 0x0F);
    let field = body.get(..width).ok_or(DecodeError::ValueOverrun { tag })?;
    let declared = read_signed_be(field).ok_or(DecodeError::ValueOverrun { tag })?;
    let len = checked_length(declared, max_arg_len, |len, max| DecodeError::ArgumentTooLong {
        len,
        max,
    })?;
    let payload = body
        .get(width..width + len)
        .ok_or(DecodeError::ValueOverrun { tag })?;
    Ok((payload, width + len))
}
