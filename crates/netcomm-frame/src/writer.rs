use std::io::{ErrorKind, Write};

use bytes::BytesMut;

use crate::codec::{encode_frame, Frame, DEFAULT_BUFFER_CAPACITY};
use crate::error::{FrameError, Result};
use crate::value::Value;

/// Blocking frame sink over a byte stream.
///
/// Each frame is encoded into an internal buffer first, so an encode error
/// never leaves a partial frame on the wire.
pub struct FrameWriter<T> {
    inner: T,
    buf: BytesMut,
}

impl<T: Write> FrameWriter<T> {
    pub fn new(inner: T) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(DEFAULT_BUFFER_CAPACITY),
        }
    }

    pub fn write_frame(&mut self, frame: &Frame) -> Result<()> {
        self.send(i64::from(frame.command), &frame.values)
    }

    /// Encode and send a command with its values.
    pub fn send(&mut self, command: i64, values: &[Value]) -> Result<()> {
        self.buf.clear();
        encode_frame(command, values, &mut self.buf)?;

        let mut offset = 0usize;
        while offset < self.buf.len() {
            match self.inner.write(&self.buf[offset..]) {
                Ok(0) => return Err(FrameError::ConnectionClosed),
                Ok(n) => offset += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }

        self.flush()
    }

    pub fn flush(&mut self) -> Result<()> {
        loop {
            match self.inner.flush() {
                Ok(()) => return Ok(()),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
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
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::codec::decode_frame;

    /// Records writes, optionally refusing them or failing with
    /// `Interrupted` a few times first.
    #[derive(Default)]
    struct Sink {
        data: Vec<u8>,
        interrupts: usize,
        flushes: usize,
        refuse: bool,
    }

    impl Write for Sink {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            if self.interrupts > 0 {
                self.interrupts -= 1;
                return Err(ErrorKind::Interrupted.into());
            }
            if self.refuse {
                return Ok(0);
            }
            // Short writes exercise the offset loop.
            let n = buf.len().min(3);
            self.data.extend_from_slice(&buf[..n]);
            Ok(n)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            self.flushes += 1;
            Ok(())
        }
    }

    #[test]
    fn send_matches_frame_encoding() {
        let frame = Frame::new(2, vec![Value::integer(-256), Value::Boolean(true)]);

        let mut by_parts = FrameWriter::new(Cursor::new(Vec::new()));
        by_parts.send(2, &frame.values).unwrap();
        let mut whole = FrameWriter::new(Cursor::new(Vec::new()));
        whole.write_frame(&frame).unwrap();

        let wire = by_parts.into_inner().into_inner();
        assert_eq!(wire, whole.into_inner().into_inner());
        assert_eq!(decode_frame(&wire).unwrap(), Some(frame));
    }

    #[test]
    fn short_and_interrupted_writes_complete_then_flush() {
        let mut writer = FrameWriter::new(Sink {
            interrupts: 2,
            ..Sink::default()
        });
        writer.send(5, &[Value::text("retry")]).unwrap();
        writer.send(6, &[]).unwrap();

        let sink = writer.into_inner();
        assert_eq!(sink.flushes, 2);
        let first = decode_frame(&sink.data).unwrap().unwrap();
        assert_eq!(first.command, 5);
    }

    #[test]
    fn encode_error_writes_nothing() {
        let mut writer = FrameWriter::new(Sink::default());

        let err = writer.send(300, &[]).unwrap_err();
        assert!(matches!(err, FrameError::CommandOutOfRange { command: 300 }));
        assert!(writer.get_ref().data.is_empty());
        assert_eq!(writer.get_ref().flushes, 0);
    }

    #[test]
    fn zero_length_write_is_connection_closed() {
        let mut writer = FrameWriter::new(Sink {
            refuse: true,
            ..Sink::default()
        });
        let err = writer.send(1, &[]).unwrap_err();
        assert!(matches!(err, FrameError::ConnectionClosed));
    }
}
