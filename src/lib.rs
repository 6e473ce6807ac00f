//! # `trice`
//!
//! A host-side decoder for the *trice* embedded-logging byte-stream
//! protocol. Firmware emits compact binary records that carry a
//! compile-time-assigned numeric identifier instead of a format string;
//! this crate resynchronizes and reframes the byte stream, resolves each
//! identifier through a JSON-backed lookup table, extracts the typed
//! parameters and renders the final log line.
//!
//! Two wire framings are supported:
//!
//! - [`Encoding::Cobs`]: zero-terminated, byte-stuffed frames
//!   (Consistent Overhead Byte Stuffing) whose decoded payload holds a
//!   descriptor word, an optional target timestamp and one or more
//!   packets of `header + parameters`.
//!
//! - [`Encoding::Esc`]: in-band frames introduced by an `0xEC` escape
//!   byte, with the parameter-space size encoded as a length class in
//!   the following byte.
//!
//! Usage is simple:
//! ```
//! use std::sync::Arc;
//! use trice::{DecoderOptions, Encoding, Lookup, TriceDecoder};
//!
//! let list = br#"{ "65409": { "Type": "TRICE8_1", "Strg": "tst:TRICE8_1 %d\\n" } }"#;
//! let lut = Arc::new(Lookup::from_json(list).unwrap());
//!
//! // or a std::fs::File, or anything else that implements std::io::Read
//! let stream: &[u8] = &[0xEC, 0xE0, 0xFF, 0x81, 0x91];
//! let mut decoder = TriceDecoder::new(stream, lut, Encoding::Esc, DecoderOptions::default());
//! for fragment in decoder.fragments() {
//!     assert_eq!(fragment.unwrap(), "tst:TRICE8_1 -111\n");
//! }
//! ```
//!
//! [`TriceDecoder::fragments`] iterates fully-available input such as a
//! recorded trace file or a byte buffer. For live transports (serial,
//! stdin, TCP) use [`run::translate`] instead, which backs off while the
//! transport starves and honors a cancellation token.
//!
//! Protocol-level anomalies (unknown identifiers, cycle skips, malformed
//! frames) never abort a session; they surface as diagnostic lines in the
//! output stream, in packet order, and the decoder advances past the bad
//! frame. Only transport failures are returned as [`Error`].

#![deny(rustdoc::broken_intra_doc_links)]

pub mod cobs;
mod decoder;
pub mod emit;
mod esc;
mod fmt;
mod frame;
mod id;
mod iter;
pub mod run;
mod tag;

pub use decoder::{Progress, Signals, TriceDecoder};
pub use fmt::{Template, Val};
pub use frame::{Framing, Record, Session, Step};
pub use id::{Lookup, TriceFmt, TriceId};
pub use iter::Fragments;
pub use tag::{BitWidth, Padding, TypeTag};

use std::str::FromStr;

/// Byte order of multi-byte fields on the wire. A single run-time flag
/// for the whole session; the firmware default is big-endian.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endian {
    Big,
    Little,
}

impl Default for Endian {
    fn default() -> Self {
        Endian::Big
    }
}

impl FromStr for Endian {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "big" | "be" => Ok(Endian::Big),
            "little" | "le" => Ok(Endian::Little),
            other => Err(format!("unknown byte order: {}", other)),
        }
    }
}

/// Wire framing of the incoming byte stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    /// Zero-terminated, byte-stuffed frames.
    Cobs,
    /// `0xEC`-introduced frames with length-class bytes.
    Esc,
}

impl FromStr for Encoding {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cobs" | "COBS" => Ok(Encoding::Cobs),
            "esc" | "ESC" => Ok(Encoding::Esc),
            other => Err(format!("unknown encoding: {}", other)),
        }
    }
}

/// Reads a `u16` from the first two bytes of `bytes`.
///
/// The slice must hold at least two bytes; shorter input is a contract
/// violation (the framings validate lengths before calling).
pub fn read_u16(bytes: &[u8], endian: Endian) -> u16 {
    let b = [bytes[0], bytes[1]];
    match endian {
        Endian::Big => u16::from_be_bytes(b),
        Endian::Little => u16::from_le_bytes(b),
    }
}

/// Reads a `u32` from the first four bytes of `bytes`.
pub fn read_u32(bytes: &[u8], endian: Endian) -> u32 {
    let b = [bytes[0], bytes[1], bytes[2], bytes[3]];
    match endian {
        Endian::Big => u32::from_be_bytes(b),
        Endian::Little => u32::from_le_bytes(b),
    }
}

/// Reads a `u64` from the first eight bytes of `bytes`.
pub fn read_u64(bytes: &[u8], endian: Endian) -> u64 {
    let b = [
        bytes[0], bytes[1], bytes[2], bytes[3], bytes[4], bytes[5], bytes[6], bytes[7],
    ];
    match endian {
        Endian::Big => u64::from_be_bytes(b),
        Endian::Little => u64::from_le_bytes(b),
    }
}

/// In-place stream decryption hook, applied to every decoded COBS frame
/// when configured. The transform must preserve the buffer length.
pub trait Cipher: Send {
    fn decrypt(&mut self, frame: &mut [u8]);
}

/// [`TriceDecoder`] configuration, fixed for the lifetime of a session.
pub struct DecoderOptions {
    /// Byte order of identifiers, headers and parameters.
    pub endian: Endian,

    /// Optional decrypt transform over decoded COBS frames.
    pub cipher: Option<Box<dyn Cipher>>,
}

impl Default for DecoderOptions {
    fn default() -> Self {
        DecoderOptions {
            endian: Endian::default(),
            cipher: None,
        }
    }
}

/// Set of errors that can end a decoding session.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("transport error: {0}")]
    Io(#[from] std::io::Error),
    #[error("identifier list is not valid JSON: {0}")]
    List(#[from] serde_json::Error),
}

#[cfg(test)]
mod endian_tests {
    use super::*;

    #[test]
    fn read_both_orders() {
        let b = [0x01, 0x23, 0xca, 0xfe, 0x00, 0x00, 0x00, 0x2a];
        assert_eq!(read_u16(&b, Endian::Big), 0x0123);
        assert_eq!(read_u16(&b, Endian::Little), 0x2301);
        assert_eq!(read_u32(&b, Endian::Big), 0x0123_cafe);
        assert_eq!(read_u32(&b, Endian::Little), 0xfeca_2301);
        assert_eq!(read_u64(&b, Endian::Big), 0x0123_cafe_0000_002a);
        assert_eq!(read_u64(&b, Endian::Little), 0x2a00_0000_feca_2301);
    }
}
