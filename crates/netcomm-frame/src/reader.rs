use std::io::{ErrorKind, Read};

use crate::codec::{Frame, FrameConfig};
use crate::error::{FrameError, Result};
use crate::parser::{Advance, FrameParser};

const READ_CHUNK_SIZE: usize = 4 * 1024;

/// Blocking frame source over a byte stream.
///
/// Bytes are fed into a [`FrameParser`] until it yields a frame; short reads
/// and `Interrupted` are absorbed.
pub struct FrameReader<T> {
    inner: T,
    parser: FrameParser,
}

impl<T: Read> FrameReader<T> {
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self {
            inner,
            parser: FrameParser::with_config(config),
        }
    }

    /// Block until the next frame is decoded.
    ///
    /// End of stream, whether between frames or inside one, is
    /// [`FrameError::ConnectionClosed`]. Malformed input is
    /// [`FrameError::Decode`]; the parser is reset so the next call starts
    /// on fresh input.
    pub fn read_frame(&mut self) -> Result<Frame> {
        let mut chunk = [0u8; READ_CHUNK_SIZE];
        loop {
            match self.parser.advance() {
                Ok(Advance::FrameReady(frame)) => return Ok(frame),
                Ok(Advance::NeedMoreData | Advance::StillAccumulating) => {}
                Err(err) => {
                    self.parser.reset();
                    return Err(err.into());
                }
            }

            let read = match self.inner.read(&mut chunk) {
                Ok(n) => n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            };

            if read == 0 {
                return Err(FrameError::ConnectionClosed);
            }

            self.parser.append(&chunk[..read]);
        }
    }

    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    pub fn into_inner(self) -> T {
        self.inner
    }

    pub fn config(&self) -> &FrameConfig {
        self.parser.config()
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use bytes::BytesMut;

    use super::*;
    use crate::codec::encode_frame;
    use crate::error::DecodeError;
    use crate::markers::{OTL_1, SOH, STX};
    use crate::value::Value;

    fn wire_of(frames: &[(i64, Vec<Value>)]) -> Vec<u8> {
        let mut wire = BytesMut::new();
        for (command, values) in frames {
            encode_frame(*command, values, &mut wire).unwrap();
        }
        wire.to_vec()
    }

    /// Hands out `step` bytes per read, after failing `interrupts` times.
    struct Trickle {
        wire: Cursor<Vec<u8>>,
        step: usize,
        interrupts: usize,
    }

    impl Trickle {
        fn new(wire: Vec<u8>, step: usize, interrupts: usize) -> Self {
            Self {
                wire: Cursor::new(wire),
                step,
                interrupts,
            }
        }
    }

    impl Read for Trickle {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if self.interrupts > 0 {
                self.interrupts -= 1;
                return Err(ErrorKind::Interrupted.into());
            }
            let len = buf.len().min(self.step);
            self.wire.read(&mut buf[..len])
        }
    }

    #[test]
    fn frames_are_read_back_to_back_then_eof() {
        let wire = wire_of(&[
            (1, vec![Value::text("one")]),
            (2, vec![Value::integer(2)]),
            (3, vec![Value::Boolean(false)]),
        ]);
        let mut reader = FrameReader::new(Cursor::new(wire));

        let commands: Vec<u8> = (0..3)
            .map(|_| reader.read_frame().unwrap().command)
            .collect();
        assert_eq!(commands, [1, 2, 3]);
        assert!(matches!(
            reader.read_frame().unwrap_err(),
            FrameError::ConnectionClosed
        ));
    }

    #[test]
    fn single_byte_reads_with_interrupts() {
        let expected = Frame::new(4, vec![Value::text("slow"), Value::float(0.25)]);
        let wire = expected.encode().unwrap().to_vec();

        let mut reader = FrameReader::new(Trickle::new(wire, 1, 3));
        assert_eq!(reader.read_frame().unwrap(), expected);
    }

    #[test]
    fn frame_spanning_many_chunks() {
        let payload = vec![0xAB; 3 * READ_CHUNK_SIZE + 17];
        let wire = wire_of(&[(9, vec![Value::bytes(payload.clone())])]);

        let mut reader = FrameReader::new(Trickle::new(wire, 1000, 0));
        let frame = reader.read_frame().unwrap();

        assert_eq!(frame.values[0].as_bytes(), Some(payload.as_slice()));
    }

    #[test]
    fn eof_inside_frame_is_connection_closed() {
        let mut reader = FrameReader::new(Cursor::new(vec![SOH, OTL_1, 0x10, STX, 0x01]));
        assert!(matches!(
            reader.read_frame().unwrap_err(),
            FrameError::ConnectionClosed
        ));
    }

    #[test]
    fn garbage_and_limits_surface_as_decode_errors() {
        let mut reader = FrameReader::new(Cursor::new(vec![0x00, 0x01, 0x00]));
        assert!(matches!(
            reader.read_frame().unwrap_err(),
            FrameError::Decode(DecodeError::UnexpectedByte { found: 0x00, .. })
        ));

        let config = FrameConfig {
            max_text_len: 16,
            ..FrameConfig::default()
        };
        let wire = wire_of(&[(1, vec![Value::text("x".repeat(32))])]);
        let mut reader = FrameReader::with_config(Cursor::new(wire), config);
        assert_eq!(reader.config().max_text_len, 16);
        assert!(matches!(
            reader.read_frame().unwrap_err(),
            FrameError::Decode(DecodeError::TextTooLong { max: 16, .. })
        ));
    }

    #[test]
    fn decode_error_discards_buffered_input() {
        let mut wire = vec![SOH, 0x7F, 0x00];
        wire.extend(wire_of(&[(2, vec![Value::text("next")])]));

        let mut reader = FrameReader::new(Trickle::new(wire, 3, 0));
        assert!(matches!(
            reader.read_frame().unwrap_err(),
            FrameError::Decode(DecodeError::InvalidLengthTag(0x7F))
        ));
        assert!(!reader.parser.in_frame());
        assert_eq!(reader.parser.buffered_len(), 0);

        // The bad chunk is gone; the following frame decodes cleanly.
        let frame = reader.read_frame().unwrap();
        assert_eq!(frame, Frame::new(2, vec![Value::text("next")]));
    }

    #[test]
    fn tcp_loopback() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let client = std::net::TcpStream::connect(listener.local_addr().unwrap()).unwrap();
        let (server, _) = listener.accept().unwrap();

        let mut writer = crate::writer::FrameWriter::new(client);
        let mut reader = FrameReader::new(server);

        writer.send(0x88, &[Value::text("ping")]).unwrap();
        assert_eq!(
            reader.read_frame().unwrap(),
            Frame::new(0x88, vec![Value::text("ping")])
        );

        drop(writer.into_inner());
        assert!(matches!(
            reader.read_frame().unwrap_err(),
            FrameError::ConnectionClosed
        ));
    }
}
