//! The framing seam: both wire encodings expose the same packet
//! extraction contract and feed one dispatcher/renderer downstream.

use std::io::{ErrorKind, Read};
use std::sync::Arc;

use crate::decoder::{CycleTracker, Signals};
use crate::id::TriceId;
use crate::tag::Padding;
use crate::{Cipher, DecoderOptions, Endian};

/// Transport reads append to the accumulation buffer in chunks of up to
/// this many bytes.
pub(crate) const READ_CHUNK: usize = 1024;

/// One extracted packet: an identifier plus its parameter region, sized
/// exactly to the parameter space the frame declared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub id: TriceId,
    pub params: Vec<u8>,
    /// The padding rule of the framing that produced this record; the
    /// dispatcher validates the parameter space against it.
    pub padding: Padding,
}

/// Outcome of one packet-extraction attempt.
#[derive(Debug)]
pub enum Step {
    /// A complete packet was extracted.
    Record(Record),
    /// Not enough buffered input; try again once more arrived.
    Need,
    /// The transport reported end-of-stream. It may reopen; callers
    /// decide whether to retry.
    EndOfStream,
    /// Irrecoverable transport failure.
    Fatal(std::io::Error),
}

/// Session-scoped decoder state shared between a framing and the
/// dispatcher: configuration plus the mutable bits the wire protocol
/// threads through consecutive packets.
pub struct Session {
    pub endian: Endian,
    pub(crate) cycle: CycleTracker,
    pub(crate) cipher: Option<Box<dyn Cipher>>,
    pub(crate) signals: Arc<Signals>,
}

impl Session {
    pub(crate) fn new(options: DecoderOptions, signals: Arc<Signals>) -> Session {
        Session {
            endian: options.endian,
            cycle: CycleTracker::new(),
            cipher: options.cipher,
            signals,
        }
    }
}

/// A wire framing. Implementations own the transport and the
/// accumulation buffer and yield one packet at a time; resynchronization
/// notices and frame-level errors are written to `out` as diagnostic
/// lines, in stream order.
pub trait Framing: Send {
    fn next_record(&mut self, session: &mut Session, out: &mut String) -> Step;
}

/// Issues a single transport read, appending whatever arrives to
/// `buffer`. Returns the number of bytes read; `Ok(0)` is end-of-stream.
pub(crate) fn fill<R: Read>(reader: &mut R, buffer: &mut Vec<u8>) -> std::io::Result<usize> {
    let mut chunk = [0u8; READ_CHUNK];
    loop {
        match reader.read(&mut chunk) {
            Ok(n) => {
                buffer.extend_from_slice(&chunk[..n]);
                return Ok(n);
            }
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
}
