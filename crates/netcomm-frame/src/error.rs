use crate::parser::ParserState;

/// Errors that can occur during frame encoding or decoding.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The command does not fit in one byte.
    #[error("command {command} out of range (expected 0..=255)")]
    CommandOutOfRange { command: i64 },

    /// A text value exceeds the per-argument length limit.
    #[error("string too long ({len} bytes, max {max})")]
    StringTooLong { len: usize, max: usize },

    /// A byte array value exceeds the per-argument length limit.
    #[error("byte array too long ({len} bytes, max {max})")]
    ByteArrayTooLong { len: usize, max: usize },

    /// The value kind has no wire representation.
    #[error("unsupported value type '{0}'")]
    UnsupportedValueType(String),

    /// The serialized command and values exceed the frame text limit.
    #[error("frame too large ({len} bytes of text, max {max})")]
    FrameTooLarge { len: usize, max: usize },

    /// A textual value literal could not be parsed.
    #[error("invalid {kind} value '{input}'")]
    InvalidValue { kind: &'static str, input: String },

    /// The incoming byte stream violates the wire format.
    #[error("frame decode error: {0}")]
    Decode(#[from] DecodeError),

    /// An I/O error occurred while reading or writing frames.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The stream ended before a complete frame was received.
    #[error("connection closed (incomplete frame)")]
    ConnectionClosed,
}

/// Wire format violations detected by [`crate::FrameParser`].
///
/// Every variant is terminal for the stream it was read from.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    /// A delimiter byte did not match.
    #[error("unexpected byte 0x{found:02X} while {state} (expected 0x{expected:02X})")]
    UnexpectedByte {
        state: ParserState,
        expected: u8,
        found: u8,
    },

    /// The byte after SOH is not an outer length tag.
    #[error("invalid length tag 0x{0:02X}")]
    InvalidLengthTag(u8),

    /// A length field decoded to a negative number.
    #[error("negative length {0}")]
    NegativeLength(i64),

    /// The declared text length exceeds the configured limit.
    #[error("frame text too long ({len} bytes, max {max})")]
    TextTooLong { len: usize, max: usize },

    /// The frame text has no command byte.
    #[error("frame text is empty")]
    EmptyText,

    /// A value tag is not part of the tag table.
    #[error("unknown value tag 0x{tag:02X} at text offset {offset}")]
    UnknownValueTag { tag: u8, offset: usize },

    /// A value extends past the end of the frame text.
    #[error("value with tag 0x{tag:02X} overruns the frame text")]
    ValueOverrun { tag: u8 },

    /// A length-prefixed value declares more than the per-argument limit.
    #[error("argument too long ({len} bytes, max {max})")]
    ArgumentTooLong { len: usize, max: usize },

    /// A text value is not valid UTF-8.
    #[error("text value is not valid UTF-8")]
    InvalidUtf8,

    /// The checksum byte does not match the XOR of the frame text.
    #[error("checksum mismatch (computed 0x{expected:02X}, received 0x{found:02X})")]
    ChecksumMismatch { expected: u8, found: u8 },
}

pub type Result<T> = std::result::Result<T, FrameError>;
