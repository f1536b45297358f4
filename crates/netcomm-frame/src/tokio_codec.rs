//! Tokio codec for use with `Framed`, `FramedRead` and `FramedWrite`.

use bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder};
use tracing::{trace, warn};

use crate::codec::{encode_frame, Frame, FrameConfig};
use crate::error::{FrameError, Result};
use crate::parser::{Advance, FrameParser};

/// Async adapter over [`FrameParser`] and [`encode_frame`].
///
/// Incoming bytes are moved out of the read buffer into the parser on every
/// call, so partial frames are never rescanned.
#[derive(Debug, Default)]
pub struct NetcommCodec {
    parser: FrameParser,
    /// Frames decoded so far.
    pub frames_decoded: u64,
    /// Frames encoded so far.
    pub frames_encoded: u64,
}

impl NetcommCodec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: FrameConfig) -> Self {
        Self {
            parser: FrameParser::with_config(config),
            ..Self::default()
        }
    }
}

impl Decoder for NetcommCodec {
    type Item = Frame;
    type Error = FrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Frame>> {
        if !src.is_empty() {
            self.parser.append(&src.split());
        }

        match self.parser.advance() {
            Ok(Advance::FrameReady(frame)) => {
                self.frames_decoded += 1;
                trace!(command = frame.command, values = frame.values.len(), "decoded frame");
                Ok(Some(frame))
            }
            Ok(Advance::NeedMoreData | Advance::StillAccumulating) => Ok(None),
            Err(err) => {
                warn!(error = %err, "frame decode error");
                Err(err.into())
            }
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Frame>> {
        match self.decode(src)? {
            Some(frame) => Ok(Some(frame)),
            None if self.parser.in_frame() => Err(FrameError::ConnectionClosed),
            None => Ok(None),
        }
    }
}

impl Encoder<&Frame> for NetcommCodec {
    type Error = FrameError;

    fn encode(&mut self, item: &Frame, dst: &mut BytesMut) -> Result<()> {
        encode_frame(i64::from(item.command), &item.values, dst)?;
        self.frames_encoded += 1;
        Ok(())
    }
}

impl Encoder<Frame> for NetcommCodec {
    type Error = FrameError;

    fn encode(&mut self, item: Frame, dst: &mut BytesMut) -> Result<()> {
        <Self as Encoder<&Frame>>::encode(self, &item, dst)
    }
}

#[cfg(test)]
mod tests {
    use futures_util::{SinkExt, StreamExt};
    use tokio_util::codec::{FramedRead, FramedWrite};

    use super::*;
    use crate::value::Value;

    fn sample() -> Frame {
        Frame::new(
            0x88,
            vec![
                Value::integer(-256),
                Value::Boolean(true),
                Value::text("Hello"),
                Value::float(-1.1),
                Value::bytes(vec![0x41, 0x42, 0x43]),
            ],
        )
    }

    #[test]
    fn test_codec_roundtrip() {
        let mut codec = NetcommCodec::new();
        let mut buf = BytesMut::new();

        codec.encode(sample(), &mut buf).unwrap();
        assert_eq!(codec.frames_encoded, 1);

        assert_eq!(codec.decode(&mut buf).unwrap(), Some(sample()));
        assert!(buf.is_empty());
        assert_eq!(codec.decode(&mut buf).unwrap(), None);
        assert_eq!(codec.frames_decoded, 1);
    }

    #[test]
    fn test_codec_partial_then_complete() {
        let wire = sample().encode().unwrap();
        let mut codec = NetcommCodec::new();

        let mut buf = BytesMut::from(&wire[..7]);
        assert_eq!(codec.decode(&mut buf).unwrap(), None);

        buf.extend_from_slice(&wire[7..]);
        assert_eq!(codec.decode(&mut buf).unwrap(), Some(sample()));
    }

    #[test]
    fn test_codec_eof_mid_frame() {
        let wire = sample().encode().unwrap();
        let mut codec = NetcommCodec::new();
        let mut buf = BytesMut::from(&wire[..wire.len() - 2]);

        let err = codec.decode_eof(&mut buf).unwrap_err();
        assert!(matches!(err, FrameError::ConnectionClosed));
    }

    #[test]
    fn test_codec_rejects_garbage() {
        let mut codec = NetcommCodec::new();
        let mut buf = BytesMut::from(&[0xFFu8, 0x00][..]);
        let err = codec.decode(&mut buf).unwrap_err();
        assert!(matches!(err, FrameError::Decode(_)));
    }

    #[tokio::test]
    async fn test_framed_read_over_chunked_stream() {
        let mut wire = BytesMut::new();
        NetcommCodec::new().encode(sample(), &mut wire).unwrap();
        NetcommCodec::new()
            .encode(Frame::new(1, vec![Value::text("two")]), &mut wire)
            .unwrap();

        let reader = tokio_test_reader(wire.to_vec());
        let mut framed = FramedRead::new(reader, NetcommCodec::new());

        assert_eq!(framed.next().await.unwrap().unwrap(), sample());
        assert_eq!(
            framed.next().await.unwrap().unwrap(),
            Frame::new(1, vec![Value::text("two")])
        );
        assert!(framed.next().await.is_none());
    }

    #[tokio::test]
    async fn test_framed_write_then_read() {
        let mut out = Vec::new();
        {
            let mut sink = FramedWrite::new(&mut out, NetcommCodec::new());
            sink.send(sample()).await.unwrap();
            sink.send(Frame::new(2, Vec::new())).await.unwrap();
        }

        let mut framed = FramedRead::new(out.as_slice(), NetcommCodec::new());
        assert_eq!(framed.next().await.unwrap().unwrap(), sample());
        assert_eq!(framed.next().await.unwrap().unwrap(), Frame::new(2, Vec::new()));
        assert!(framed.next().await.is_none());
    }

    // Reader that hands out at most three bytes per poll.
    fn tokio_test_reader(data: Vec<u8>) -> impl tokio::io::AsyncRead + Unpin {
        let chunks: Vec<std::io::Result<bytes::Bytes>> = data
            .chunks(3)
            .map(|c| Ok(bytes::Bytes::copy_from_slice(c)))
            .collect();
        tokio_util::io::StreamReader::new(futures_util::stream::iter(chunks))
    }
}
