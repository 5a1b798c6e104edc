//! # Frame
//!
//! The `frame` module implements WebSocket frames as defined in [RFC 6455 Section 5.2](https://datatracker.ietf.org/doc/html/rfc6455#section-5.2).
//! A [`Frame`] holds the header bits, the masking key and an owned, already unmasked payload.
//!
//! ### Frame Binary Format
//!
//! ```text
//!  0                   1                   2                   3
//!  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
//! +-+-+-+-+-------+-+-------------+-------------------------------+
//! |F|R|R|R| opcode|M| Payload len |    Extended payload length    |
//! |I|S|S|S|  (4)  |A|     (7)     |         (16 or 64 bits)       |
//! |N|V|V|V|       |S|             |                               |
//! | |1|2|3|       |K|             |                               |
//! +-+-+-+-+-------+-+-------------+-------------------------------+
//! |        Extended payload length continued, if payload len == 127|
//! +---------------------------------------------------------------+
//! |                               |   Masking-key, if MASK set to 1|
//! +-------------------------------+-------------------------------+
//! |     Masking-key (continued)       |          Payload Data      |
//! +-----------------------------------+ - - - - - - - - - - - - - -+
//! :                     Payload Data continued ...                :
//! +---------------------------------------------------------------+
//! ```
//!
//! All multi-byte length fields are big-endian.
//!
//! ## Lifecycle
//!
//! A frame is either built by the application ([`Frame::default`], [`Frame::new`] and the
//! typed constructors) and then encoded, or produced by [`Frame::decode`]. Built frames are
//! mutable. Decoded frames are read-only: [`Frame::set_payload`] and the `with_*` setters
//! leave them untouched without reporting an error.
//!
//! ```rust
//! use wsframe::{Frame, OpCode};
//!
//! let frame = Frame::text("Hello").with_mask([0x37, 0xfa, 0x21, 0x3d]);
//! let wire = frame.encode()?;
//!
//! let mut decoded = Frame::decode(&wire)?;
//! assert_eq!(decoded.opcode(), OpCode::TEXT);
//! assert_eq!(&decoded.payload()[..], b"Hello");
//!
//! decoded.set_payload(&b"ignored"[..]);
//! assert_eq!(&decoded.payload()[..], b"Hello");
//! # Ok::<(), wsframe::WebSocketError>(())
//! ```
use bytes::{Bytes, BytesMut};

use crate::{codec, mask::apply_mask, Result, WebSocketError};

/// Largest possible header: 2 base bytes, 8 extended length bytes and a 4 byte mask key.
pub(crate) const MAX_HEAD_SIZE: usize = 14;

/// WebSocket operation code, the 4-bit field that determines how a frame is interpreted.
///
/// Every 4-bit value is representable: this codec does not reject unnamed opcodes, it only
/// names the ones its callers dispatch on:
/// - `CONTINUATION` = 0x0
/// - `TEXT` = 0x1
/// - `BINARY` = 0x2
/// - `PING` = 0x8
/// - `PONG` = 0x9
///
/// `PING` and `PONG` keep the values established callers compare against. They sit one
/// below the [RFC 6455, Section 11.8](https://datatracker.ietf.org/doc/html/rfc6455#section-11.8)
/// assignments, so a close frame (0x8) compares equal to `PING`.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
pub struct OpCode(u8);

impl OpCode {
    pub const CONTINUATION: OpCode = OpCode(0x0);
    pub const TEXT: OpCode = OpCode(0x1);
    pub const BINARY: OpCode = OpCode(0x2);
    pub const PING: OpCode = OpCode(0x8);
    pub const PONG: OpCode = OpCode(0x9);

    /// Takes the low nibble of a header byte.
    #[inline]
    pub(crate) const fn from_nibble(byte: u8) -> Self {
        OpCode(byte & 0x0F)
    }

    /// Returns the raw 4-bit value.
    #[inline]
    pub const fn as_u8(self) -> u8 {
        self.0
    }

    /// Returns `true` for control opcodes (0x8 to 0xF).
    pub fn is_control(&self) -> bool {
        self.0 & 0x08 != 0
    }
}

impl TryFrom<u8> for OpCode {
    type Error = WebSocketError;

    /// Accepts any value that fits in the 4-bit opcode field.
    fn try_from(value: u8) -> std::result::Result<Self, Self::Error> {
        if value > 0x0F {
            return Err(WebSocketError::InvalidOpCode(value));
        }
        Ok(OpCode(value))
    }
}

impl From<OpCode> for u8 {
    fn from(val: OpCode) -> Self {
        val.0
    }
}

/// A single WebSocket frame.
///
/// # Fields
/// - `fin`: Final fragment flag.
/// - `rsv1`, `rsv2`, `rsv3`: Extension bits, carried through encode and decode unchanged.
/// - `opcode`: Frame type.
/// - `mask`: Optional 4-byte XOR masking key. The payload is masked on the wire only.
/// - `payload`: The unmasked payload, exclusively owned by the frame.
/// - `mutable`: `false` once the frame was produced by decoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub(crate) fin: bool,
    pub(crate) rsv1: bool,
    pub(crate) rsv2: bool,
    pub(crate) rsv3: bool,
    pub(crate) opcode: OpCode,
    pub(crate) mask: Option<[u8; 4]>,
    pub(crate) payload: BytesMut,
    pub(crate) mutable: bool,
}

/// An empty, mutable, final, unmasked continuation frame waiting for a payload.
impl Default for Frame {
    fn default() -> Self {
        Self {
            fin: true,
            rsv1: false,
            rsv2: false,
            rsv3: false,
            opcode: OpCode::CONTINUATION,
            mask: None,
            payload: BytesMut::new(),
            mutable: true,
        }
    }
}

impl Frame {
    /// Creates a new mutable `Frame`.
    ///
    /// # Parameters
    /// - `fin`: Indicates if this frame is the final fragment in a message.
    /// - `opcode`: The operation code of the frame.
    /// - `mask`: Optional 4-byte masking key, applied to the payload when encoding.
    /// - `payload`: The frame payload data.
    pub fn new(
        fin: bool,
        opcode: OpCode,
        mask: Option<[u8; 4]>,
        payload: impl Into<BytesMut>,
    ) -> Self {
        Self {
            fin,
            opcode,
            mask,
            payload: payload.into(),
            ..Default::default()
        }
    }

    /// Creates a final text frame.
    pub fn text(payload: impl AsRef<[u8]>) -> Self {
        Self::new(true, OpCode::TEXT, None, payload.as_ref())
    }

    /// Creates a final binary frame.
    pub fn binary(payload: impl AsRef<[u8]>) -> Self {
        Self::new(true, OpCode::BINARY, None, payload.as_ref())
    }

    /// Creates a ping frame.
    pub fn ping(payload: impl AsRef<[u8]>) -> Self {
        Self::new(true, OpCode::PING, None, payload.as_ref())
    }

    /// Creates a pong frame.
    pub fn pong(payload: impl AsRef<[u8]>) -> Self {
        Self::new(true, OpCode::PONG, None, payload.as_ref())
    }

    /// Decodes the frame starting at offset 0 of `src`.
    ///
    /// Bytes after the end of the frame are ignored. The returned frame has its payload
    /// unmasked and is read-only.
    ///
    /// # Errors
    /// - `TruncatedHeader` if `src` ends inside the header.
    /// - `TruncatedPayload` if fewer payload bytes follow than the header declares.
    pub fn decode(src: &[u8]) -> Result<Frame> {
        codec::decode(src)
    }

    /// Sets the three reserved extension bits.
    pub fn with_rsv(mut self, rsv1: bool, rsv2: bool, rsv3: bool) -> Self {
        if self.check_mutable("rsv bits") {
            self.rsv1 = rsv1;
            self.rsv2 = rsv2;
            self.rsv3 = rsv3;
        }
        self
    }

    /// Sets the masking key used when the frame is encoded.
    pub fn with_mask(mut self, key: [u8; 4]) -> Self {
        if self.check_mutable("mask key") {
            self.mask = Some(key);
        }
        self
    }

    /// Sets a freshly generated random masking key, as clients must when sending.
    pub fn with_random_mask(self) -> Self {
        let key: [u8; 4] = rand::random();
        self.with_mask(key)
    }

    /// Replaces the payload.
    ///
    /// The previous buffer is dropped. On a decoded frame this does nothing.
    pub fn set_payload(&mut self, payload: impl Into<BytesMut>) {
        if self.check_mutable("payload") {
            self.payload = payload.into();
        }
    }

    fn check_mutable(&self, _what: &str) -> bool {
        #[cfg(feature = "logging")]
        if !self.mutable {
            log::debug!("ignoring {} update on a decoded frame", _what);
        }
        self.mutable
    }

    /// Indicates if this is the final frame in a message.
    #[inline]
    pub fn fin(&self) -> bool {
        self.fin
    }

    /// First reserved extension bit (bit 6 of the first header byte).
    #[inline]
    pub fn rsv1(&self) -> bool {
        self.rsv1
    }

    /// Second reserved extension bit (bit 5).
    #[inline]
    pub fn rsv2(&self) -> bool {
        self.rsv2
    }

    /// Third reserved extension bit (bit 4).
    #[inline]
    pub fn rsv3(&self) -> bool {
        self.rsv3
    }

    /// The operation code of the frame.
    #[inline]
    pub fn opcode(&self) -> OpCode {
        self.opcode
    }

    /// Returns whether the frame is masked on the wire.
    #[inline]
    pub fn is_masked(&self) -> bool {
        self.mask.is_some()
    }

    /// Returns the masking key, or all zeroes for an unmasked frame.
    #[inline]
    pub fn mask_key(&self) -> [u8; 4] {
        self.mask.unwrap_or_default()
    }

    /// Returns `false` for frames produced by [`Frame::decode`].
    #[inline]
    pub fn is_mutable(&self) -> bool {
        self.mutable
    }

    /// The unmasked payload.
    #[inline]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Consumes the frame and returns its payload buffer.
    pub fn into_payload(self) -> BytesMut {
        self.payload
    }

    /// Checks if the frame payload is valid UTF-8.
    #[inline]
    pub fn is_utf8(&self) -> bool {
        std::str::from_utf8(&self.payload).is_ok()
    }

    /// Number of bytes [`Frame::encode`] produces for this frame.
    pub fn encoded_len(&self) -> usize {
        let len_size = match self.payload.len() {
            0..=125 => 0,
            126..=0xFFFF => 2,
            _ => 8,
        };
        let mask_size = if self.is_masked() { 4 } else { 0 };
        2 + len_size + mask_size + self.payload.len()
    }

    /// Encodes the frame into a new buffer.
    ///
    /// When the frame has a masking key, the key is written after the length and the
    /// payload is masked on the wire. The frame's own payload is not modified.
    ///
    /// # Errors
    /// Returns `EmptyPayload` if the frame has no payload.
    pub fn encode(&self) -> Result<Bytes> {
        let mut dst = BytesMut::with_capacity(self.encoded_len());
        self.encode_into(&mut dst)?;
        Ok(dst.freeze())
    }

    /// Appends the encoded frame to `dst`.
    ///
    /// # Errors
    /// Returns `EmptyPayload` if the frame has no payload. Nothing is written in that case.
    pub fn encode_into(&self, dst: &mut BytesMut) -> Result<()> {
        if self.payload.is_empty() {
            #[cfg(feature = "logging")]
            log::debug!("refusing to encode {:?} frame without payload", self.opcode);
            return Err(WebSocketError::EmptyPayload);
        }

        let mut head = [0; MAX_HEAD_SIZE];
        let size = self.fmt_head(&mut head);

        dst.reserve(size + self.payload.len());
        dst.extend_from_slice(&head[..size]);

        let start = dst.len();
        dst.extend_from_slice(&self.payload);
        if let Some(key) = self.mask {
            apply_mask(&mut dst[start..], key);
        }

        Ok(())
    }

    /// Formats the frame header into `head` and returns its size.
    ///
    /// The size is 2, 4 or 10 bytes depending on the length field, plus 4 when masked.
    ///
    /// # Panics
    /// Panics if `head` is shorter than [`MAX_HEAD_SIZE`].
    pub(crate) fn fmt_head(&self, head: &mut [u8]) -> usize {
        head[0] = u8::from(self.fin) << 7
            | u8::from(self.rsv1) << 6
            | u8::from(self.rsv2) << 5
            | u8::from(self.rsv3) << 4
            | self.opcode.as_u8();

        let len = self.payload.len();
        let size = if len < 126 {
            head[1] = len as u8;
            2
        } else if len <= usize::from(u16::MAX) {
            head[1] = 126;
            head[2..4].copy_from_slice(&(len as u16).to_be_bytes());
            4
        } else {
            head[1] = 127;
            head[2..10].copy_from_slice(&(len as u64).to_be_bytes());
            10
        };

        if let Some(mask) = self.mask {
            head[1] |= 0x80;
            head[size..size + 4].copy_from_slice(&mask);
            size + 4
        } else {
            size
        }
    }
}
