//! # wsframe
//! Encoding and decoding of single WebSocket data frames ([RFC 6455 Section 5](https://datatracker.ietf.org/doc/html/rfc6455#section-5)).
//!
//! The crate is a pure, synchronous codec: a byte buffer goes in and a [`Frame`] comes out,
//! or a [`Frame`] goes in and its wire bytes come out. It performs no I/O and knows nothing
//! about handshakes, connections or message reassembly.
//!
//! # Features
//! - `logging`: Enables debug logging of rejected frames and ignored mutations using the `log` crate.
//!
//! # Decoding
//! ```rust
//! use wsframe::{Frame, OpCode};
//!
//! let frame = Frame::decode(&[0x81, 0x05, b'H', b'e', b'l', b'l', b'o'])?;
//! assert!(frame.fin());
//! assert_eq!(frame.opcode(), OpCode::TEXT);
//! assert_eq!(&frame.payload()[..], b"Hello");
//! # Ok::<(), wsframe::WebSocketError>(())
//! ```
//!
//! # Encoding
//! ```rust
//! use wsframe::Frame;
//!
//! let mut frame = Frame::default();
//! frame.set_payload(&b"Hello"[..]);
//! let bytes = frame.encode()?;
//! assert_eq!(&bytes[..2], &[0x80, 0x05]);
//! # Ok::<(), wsframe::WebSocketError>(())
//! ```
//!
//! # Streaming
//! [`codec::Codec`] implements the `tokio-util` `Decoder` and `Encoder` traits on top of the
//! same parser, so frames can be read from and written to any `Framed` transport the caller owns.
//!
//! # Memory Safety
//! - Length fields are attacker controlled: they are checked against the bytes actually
//!   available before anything is copied.
//! - The streaming decoder additionally rejects frames larger than a configurable limit
//!   (default [`MAX_PAYLOAD_READ`]).

#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod codec;
pub mod frame;
mod mask;

use thiserror::Error;

pub use codec::Codec;
pub use frame::{Frame, OpCode};

/// The default maximum payload size accepted by the streaming decoder, set to 1 MiB.
///
/// Frames declaring a larger payload are rejected before any payload bytes are buffered.
pub const MAX_PAYLOAD_READ: usize = 1024 * 1024;

/// A result type for frame operations, using `WebSocketError` as the error type.
pub type Result<T> = std::result::Result<T, WebSocketError>;

/// Errors produced while decoding or encoding a frame.
///
/// An error only concerns the single operation that returned it; it never invalidates
/// other frames or the codec.
#[derive(Error, Debug)]
pub enum WebSocketError {
    /// The input ends before the base header, the extended length field or the
    /// masking key is complete.
    #[error("Truncated header: need {needed} bytes, have {available}")]
    TruncatedHeader { needed: usize, available: usize },

    /// The declared payload length exceeds the bytes remaining after the header.
    #[error("Truncated payload: declared {declared} bytes, have {available}")]
    TruncatedPayload { declared: u64, available: usize },

    /// Encoding was requested for a frame without payload.
    #[error("Frame payload is empty")]
    EmptyPayload,

    /// A frame declares a payload larger than the decoder accepts.
    #[error("Frame too large: {len} bytes (max {max})")]
    FrameTooLarge { len: u64, max: usize },

    /// A value that does not fit in the 4-bit opcode field.
    #[error("Invalid opcode (byte={0})")]
    InvalidOpCode(u8),

    /// Wraps I/O errors raised by a transport driving the streaming [`Codec`].
    #[error(transparent)]
    IoError(#[from] std::io::Error),
}
