use bytes::{Buf, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

/// A `tokio_util` Codec for the panel's line-oriented UART protocol.
///
/// Lines are `\n`-terminated UTF-8 text. Invalid UTF-8 is replaced rather
/// than treated as a framing error, and blank lines are dropped silently,
/// matching the panel's own chattiness rather than a protocol violation.
#[derive(Debug, Clone, Default)]
pub struct UartLineCodec;

impl Decoder for UartLineCodec {
    type Item = String;
    type Error = std::io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        loop {
            let Some(pos) = src.iter().position(|&b| b == b'\n') else {
                return Ok(None);
            };

            let line = src.split_to(pos);
            src.advance(1); // drop the '\n' itself
            let text = String::from_utf8_lossy(&line).trim().to_string();
            if text.is_empty() {
                continue;
            }
            return Ok(Some(text));
        }
    }
}

impl Encoder<String> for UartLineCodec {
    type Error = std::io::Error;

    fn encode(&mut self, item: String, dst: &mut BytesMut) -> Result<(), Self::Error> {
        dst.extend_from_slice(item.as_bytes());
        dst.extend_from_slice(b"\n");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_simple_line() {
        let mut codec = UartLineCodec;
        let mut buf = BytesMut::from(&b"Video Mute on\n"[..]);

        let line = codec.decode(&mut buf).expect("should decode").expect("should have line");
        assert_eq!(line, "Video Mute on");
        assert!(buf.is_empty());
    }

    #[test]
    fn decode_skips_blank_lines() {
        let mut codec = UartLineCodec;
        let mut buf = BytesMut::from(&b"\n\n  \nVideo Mute off\n"[..]);

        let line = codec.decode(&mut buf).expect("should decode").expect("should have line");
        assert_eq!(line, "Video Mute off");
    }

    #[test]
    fn decode_partial_line_returns_none() {
        let mut codec = UartLineCodec;
        let input = b"Video Mute o";
        let mut buf = BytesMut::from(&input[..]);

        let res = codec.decode(&mut buf).expect("should not error");
        assert!(res.is_none());
        assert_eq!(buf, &input[..]);
    }

    #[test]
    fn encode_appends_newline() {
        let mut codec = UartLineCodec;
        let mut buf = BytesMut::new();
        codec
            .encode("videomute 0 1".to_string(), &mut buf)
            .expect("should encode");
        assert_eq!(&buf[..], b"videomute 0 1\n");
    }
}
