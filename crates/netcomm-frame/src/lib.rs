//! Wire codec and streaming parser for netcomm frames.
//!
//! A frame carries one command byte and an ordered list of typed values:
//!
//! ```text
//! SOH | OTL tag + length | STX | command, tagged values | ETX | XOR checksum | EOT
//! ```
//!
//! [`encode_frame`] produces the wire bytes. [`FrameParser`] consumes bytes
//! in whatever fragments the transport delivers and yields complete,
//! checksum-validated [`Frame`]s.

pub mod codec;
pub mod error;
pub mod markers;
pub mod parser;
pub mod reader;
pub mod value;
pub mod writer;

#[cfg(feature = "async")]
pub mod tokio_codec;

pub use codec::{
    checksum, decode_frame, encode_frame, Frame, FrameConfig, ARG_MAXLEN, DEFAULT_BUFFER_CAPACITY,
    TXT_MAXLEN,
};
pub use error::{DecodeError, FrameError, Result};
pub use parser::{Advance, FrameParser, ParserState};
pub use reader::FrameReader;
#[cfg(feature = "async")]
pub use tokio_codec::NetcommCodec;
pub use value::{Float, Integer, Value, ValueKind};
pub use writer::FrameWriter;
