use bytes::{Buf, BytesMut};
use tokio_util::codec;

use crate::{
    frame::{Frame, OpCode},
    mask::apply_mask,
    Result, WebSocketError, MAX_PAYLOAD_READ,
};

/// The fields that precede the payload of a WebSocket frame.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Header {
    /// Indicates if this is the final fragment in a message.
    fin: bool,
    rsv1: bool,
    rsv2: bool,
    rsv3: bool,
    /// The operation code of the frame.
    opcode: OpCode,
    /// Masking key, present when the MASK bit is set.
    mask: Option<[u8; 4]>,
    /// Declared length of the payload, in bytes.
    payload_len: u64,
    /// Total size of the header in bytes, including the mask key.
    header_size: usize,
}

impl Header {
    /// Parses the header at the front of `src` without consuming anything.
    ///
    /// Returns `TruncatedHeader` when `src` is shorter than the header it starts.
    fn parse(src: &[u8]) -> Result<Header> {
        if src.len() < 2 {
            return Err(WebSocketError::TruncatedHeader {
                needed: 2,
                available: src.len(),
            });
        }

        let fin = src[0] & 0b1000_0000 != 0;
        let rsv1 = src[0] & 0b0100_0000 != 0;
        let rsv2 = src[0] & 0b0010_0000 != 0;
        let rsv3 = src[0] & 0b0001_0000 != 0;
        let opcode = OpCode::from_nibble(src[0]);

        let masked = src[1] & 0b1000_0000 != 0;
        let length_code = src[1] & 0x7F;

        // Determine additional header length
        let extra = match length_code {
            126 => 2,
            127 => 8,
            _ => 0,
        };
        let header_size = 2 + extra + if masked { 4 } else { 0 };

        if src.len() < header_size {
            return Err(WebSocketError::TruncatedHeader {
                needed: header_size,
                available: src.len(),
            });
        }

        let payload_len = match extra {
            0 => u64::from(length_code),
            2 => u64::from(u16::from_be_bytes([src[2], src[3]])),
            _ => {
                let mut be = [0; 8];
                be.copy_from_slice(&src[2..10]);
                u64::from_be_bytes(be)
            }
        };

        let mask = if masked {
            let mut key = [0; 4];
            key.copy_from_slice(&src[2 + extra..header_size]);
            Some(key)
        } else {
            None
        };

        #[cfg(feature = "logging")]
        log::trace!(
            "frame header: fin={} opcode={:#x} masked={} payload_len={}",
            fin,
            opcode.as_u8(),
            masked,
            payload_len
        );

        Ok(Header {
            fin,
            rsv1,
            rsv2,
            rsv3,
            opcode,
            mask,
            payload_len,
            header_size,
        })
    }

    /// Builds the read-only frame for this header, unmasking `payload` in place.
    fn into_frame(self, mut payload: BytesMut) -> Frame {
        if let Some(key) = self.mask {
            apply_mask(&mut payload, key);
        }

        Frame {
            fin: self.fin,
            rsv1: self.rsv1,
            rsv2: self.rsv2,
            rsv3: self.rsv3,
            opcode: self.opcode,
            mask: self.mask,
            payload,
            mutable: false,
        }
    }
}

/// Decodes the single frame at the front of `src`, ignoring any trailing bytes.
///
/// The payload is copied out of `src` only after the declared length has been checked
/// against the bytes actually present.
pub fn decode(src: &[u8]) -> Result<Frame> {
    let header = Header::parse(src).inspect_err(log_rejected)?;

    let body = &src[header.header_size..];
    if header.payload_len > body.len() as u64 {
        let err = WebSocketError::TruncatedPayload {
            declared: header.payload_len,
            available: body.len(),
        };
        log_rejected(&err);
        return Err(err);
    }

    let payload = BytesMut::from(&body[..header.payload_len as usize]);
    Ok(header.into_frame(payload))
}

#[inline]
fn log_rejected(_err: &WebSocketError) {
    #[cfg(feature = "logging")]
    log::debug!("rejecting frame: {}", _err);
}

/// A combined codec that provides both encoding and decoding functionality for WebSocket frames.
///
/// This codec can be used with Tokio's framed streams so that a caller-owned transport yields
/// and accepts [`Frame`]s. It performs no I/O itself.
pub struct Codec {
    decoder: Decoder,
    encoder: Encoder,
}

impl Codec {
    /// Creates a codec whose decoder rejects payloads larger than `max_payload_size`.
    pub fn new(max_payload_size: usize) -> Self {
        Self::from((Decoder::new(max_payload_size), Encoder))
    }
}

impl Default for Codec {
    fn default() -> Self {
        Self::new(MAX_PAYLOAD_READ)
    }
}

impl From<(Decoder, Encoder)> for Codec {
    fn from((decoder, encoder): (Decoder, Encoder)) -> Self {
        Self { decoder, encoder }
    }
}

impl codec::Decoder for Codec {
    type Item = <Decoder as codec::Decoder>::Item;
    type Error = <Decoder as codec::Decoder>::Error;

    #[inline]
    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        codec::Decoder::decode(&mut self.decoder, src)
    }
}

impl codec::Encoder<Frame> for Codec {
    type Error = WebSocketError;

    #[inline]
    fn encode(&mut self, item: Frame, dst: &mut BytesMut) -> Result<()> {
        codec::Encoder::encode(&mut self.encoder, item, dst)
    }
}

impl codec::Encoder<&Frame> for Codec {
    type Error = WebSocketError;

    #[inline]
    fn encode(&mut self, item: &Frame, dst: &mut BytesMut) -> Result<()> {
        codec::Encoder::encode(&mut self.encoder, item, dst)
    }
}

/// A streaming decoder for WebSocket frames.
///
/// Unlike [`decode`], an incomplete frame is not an error: the decoder asks for more data by
/// returning `Ok(None)` and leaves the buffer untouched until the whole frame is available.
pub struct Decoder {
    /// Maximum allowed size for the frame payload.
    max_payload_size: usize,
}

impl Decoder {
    /// Creates a new `Decoder` that limits payloads to `max_payload_size` bytes.
    pub fn new(max_payload_size: usize) -> Self {
        Self { max_payload_size }
    }
}

impl codec::Decoder for Decoder {
    type Item = Frame;
    type Error = WebSocketError;

    /// Decodes one frame from the front of `src`.
    ///
    /// # Returns
    /// - `Ok(Some(Frame))` once a whole frame is buffered; its bytes are consumed.
    /// - `Ok(None)` if more data is needed. Capacity for the missing bytes is reserved.
    /// - `Err(WebSocketError::FrameTooLarge)` if the declared payload exceeds the limit.
    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        let header = match Header::parse(src) {
            Ok(header) => header,
            Err(WebSocketError::TruncatedHeader { needed, available }) => {
                src.reserve(needed - available);
                return Ok(None);
            }
            Err(err) => return Err(err),
        };

        if header.payload_len > self.max_payload_size as u64 {
            let err = WebSocketError::FrameTooLarge {
                len: header.payload_len,
                max: self.max_payload_size,
            };
            log_rejected(&err);
            return Err(err);
        }

        let payload_len = header.payload_len as usize;
        let Some(frame_len) = header.header_size.checked_add(payload_len) else {
            let err = WebSocketError::FrameTooLarge {
                len: header.payload_len,
                max: self.max_payload_size,
            };
            log_rejected(&err);
            return Err(err);
        };
        if src.remaining() < frame_len {
            src.reserve(frame_len - src.remaining());
            return Ok(None);
        }

        src.advance(header.header_size);
        let payload = src.split_to(payload_len);

        Ok(Some(header.into_frame(payload)))
    }
}

/// WebSocket frame encoder, appending each frame's wire bytes to the destination buffer.
///
/// # Errors
/// Returns `EmptyPayload` for frames without payload.
pub struct Encoder;

impl codec::Encoder<Frame> for Encoder {
    type Error = WebSocketError;

    fn encode(&mut self, frame: Frame, dst: &mut BytesMut) -> Result<()> {
        frame.encode_into(dst)
    }
}

impl codec::Encoder<&Frame> for Encoder {
    type Error = WebSocketError;

    fn encode(&mut self, frame: &Frame, dst: &mut BytesMut) -> Result<()> {
        frame.encode_into(dst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod header_tests {
        use super::*;

        #[test]
        fn test_text_header() {
            let header = Header::parse(&[0x81, 0x05]).unwrap();

            assert!(header.fin);
            assert!(!header.rsv1 && !header.rsv2 && !header.rsv3);
            assert_eq!(header.opcode, OpCode::TEXT);
            assert_eq!(header.mask, None);
            assert_eq!(header.payload_len, 5);
            assert_eq!(header.header_size, 2);
        }

        #[test]
        fn test_rsv_bits() {
            let header = Header::parse(&[0b0100_0010, 0x00]).unwrap();
            assert!(!header.fin);
            assert!(header.rsv1 && !header.rsv2 && !header.rsv3);

            let header = Header::parse(&[0b0010_0000, 0x00]).unwrap();
            assert!(!header.rsv1 && header.rsv2 && !header.rsv3);

            let header = Header::parse(&[0b0001_0000, 0x00]).unwrap();
            assert!(!header.rsv1 && !header.rsv2 && header.rsv3);
        }

        #[test]
        fn test_reserved_opcode_is_accepted() {
            let header = Header::parse(&[0x83, 0x00]).unwrap();
            assert_eq!(header.opcode.as_u8(), 0x3);
        }

        #[test]
        fn test_extended_16() {
            let header = Header::parse(&[0x82, 126, 0x01, 0x00]).unwrap();
            assert_eq!(header.payload_len, 256);
            assert_eq!(header.header_size, 4);
        }

        #[test]
        fn test_extended_64() {
            let header =
                Header::parse(&[0x82, 127, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x02])
                    .unwrap();
            assert_eq!(header.payload_len, (1 << 32) + 2);
            assert_eq!(header.header_size, 10);
        }

        #[test]
        fn test_masked_extended() {
            let header = Header::parse(&[0x81, 0x80 | 126, 0x00, 0xC8, 1, 2, 3, 4]).unwrap();
            assert_eq!(header.payload_len, 200);
            assert_eq!(header.mask, Some([1, 2, 3, 4]));
            assert_eq!(header.header_size, 8);
        }

        #[test]
        fn test_truncated_headers() {
            assert!(matches!(
                Header::parse(&[]),
                Err(WebSocketError::TruncatedHeader {
                    needed: 2,
                    available: 0
                })
            ));
            assert!(matches!(
                Header::parse(&[0x82, 126, 0x01]),
                Err(WebSocketError::TruncatedHeader {
                    needed: 4,
                    available: 3
                })
            ));
            assert!(matches!(
                Header::parse(&[0x82, 127, 0, 0, 0, 0]),
                Err(WebSocketError::TruncatedHeader {
                    needed: 10,
                    available: 6
                })
            ));
            assert!(matches!(
                Header::parse(&[0x82, 0x85, 1, 2]),
                Err(WebSocketError::TruncatedHeader {
                    needed: 6,
                    available: 4
                })
            ));
        }
    }

    mod decode_tests {
        use super::*;

        #[test]
        fn test_decode_unmasks() {
            let frame = decode(&[0x82, 0x84, 0x01, 0x02, 0x03, 0x04, 0x01, 0x02, 0x03, 0x04]).unwrap();

            assert!(frame.is_masked());
            assert_eq!(frame.mask_key(), [0x01, 0x02, 0x03, 0x04]);
            assert_eq!(frame.payload(), &[0x00, 0x00, 0x00, 0x00]);
            assert!(!frame.is_mutable());
        }

        #[test]
        fn test_trailing_bytes_ignored() {
            let frame = decode(&[0x81, 0x02, b'o', b'k', 0xFF, 0xFF, 0xFF]).unwrap();
            assert_eq!(frame.payload(), b"ok");
        }

        #[test]
        fn test_truncated_payload() {
            let mut src = vec![0x82, 100];
            src.extend_from_slice(&[0u8; 10]);

            assert!(matches!(
                decode(&src),
                Err(WebSocketError::TruncatedPayload {
                    declared: 100,
                    available: 10
                })
            ));
        }

        #[test]
        fn test_huge_declared_length() {
            let src = [0x82, 127, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0x00];
            assert!(matches!(
                decode(&src),
                Err(WebSocketError::TruncatedPayload {
                    declared: u64::MAX,
                    available: 1
                })
            ));
        }

        #[test]
        fn test_zero_length_frame() {
            let frame = decode(&[0x88, 0x00]).unwrap();
            assert_eq!(frame.opcode(), OpCode::PING);
            assert!(frame.payload().is_empty());
        }
    }

    mod streaming_tests {
        use super::*;
        use tokio_util::codec::{Decoder as _, Encoder as _};

        #[test]
        fn test_partial_input_waits() {
            let mut codec = Codec::default();
            let mut buf = BytesMut::from(&[0x81u8][..]);
            assert_eq!(codec.decode(&mut buf).unwrap(), None);
            assert_eq!(buf.len(), 1);

            buf.extend_from_slice(&[0x05, b'H', b'e']);
            assert_eq!(codec.decode(&mut buf).unwrap(), None);
            assert_eq!(buf.len(), 4);

            buf.extend_from_slice(b"llo");
            let frame = codec.decode(&mut buf).unwrap().unwrap();
            assert_eq!(frame.opcode(), OpCode::TEXT);
            assert_eq!(frame.payload(), b"Hello");
            assert!(buf.is_empty());
        }

        #[test]
        fn test_back_to_back_frames() {
            let mut codec = Codec::default();
            let mut buf = BytesMut::new();
            codec.encode(Frame::text("one"), &mut buf).unwrap();
            codec
                .encode(&Frame::binary([1u8, 2, 3]).with_mask([9, 8, 7, 6]), &mut buf)
                .unwrap();

            let first = codec.decode(&mut buf).unwrap().unwrap();
            assert_eq!(first.opcode(), OpCode::TEXT);
            assert_eq!(first.payload(), b"one");

            let second = codec.decode(&mut buf).unwrap().unwrap();
            assert_eq!(second.opcode(), OpCode::BINARY);
            assert_eq!(second.payload(), &[1, 2, 3]);

            assert_eq!(codec.decode(&mut buf).unwrap(), None);
        }

        #[test]
        fn test_frame_too_large() {
            let mut codec = Codec::new(16);
            let mut buf = BytesMut::from(&[0x82u8, 17][..]);

            assert!(matches!(
                codec.decode(&mut buf),
                Err(WebSocketError::FrameTooLarge { len: 17, max: 16 })
            ));
        }

        #[test]
        fn test_unbounded_limit_rejects_overflowing_length() {
            let mut codec = Codec::new(usize::MAX);
            let mut buf = BytesMut::from(&[0x82u8, 127, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF][..]);

            #[cfg(target_pointer_width = "64")]
            assert!(matches!(
                codec.decode(&mut buf),
                Err(WebSocketError::FrameTooLarge { len: u64::MAX, max: usize::MAX })
            ));
            #[cfg(not(target_pointer_width = "64"))]
            assert!(matches!(
                codec.decode(&mut buf),
                Err(WebSocketError::FrameTooLarge { len: u64::MAX, .. })
            ));
            assert_eq!(buf.len(), 10);
        }

        #[test]
        fn test_limit_is_inclusive() {
            let mut codec = Codec::new(3);
            let mut buf = BytesMut::from(&[0x82u8, 3, 1, 2, 3][..]);
            assert!(codec.decode(&mut buf).unwrap().is_some());
        }

        #[test]
        fn test_encode_empty_payload() {
            let mut codec = Codec::default();
            let mut buf = BytesMut::new();
            assert!(matches!(
                codec.encode(Frame::default(), &mut buf),
                Err(WebSocketError::EmptyPayload)
            ));
            assert!(buf.is_empty());
        }
    }
}
