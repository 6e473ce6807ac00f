//! ESC framing: in-band frames introduced by an `0xEC` escape byte.
//!
//! The byte after the escape encodes a length class; `0xDF` means no
//! parameters, `0xE0..=0xE8` mean `1 << (class - 0xE0)` parameter bytes
//! (1, 2, 4, … 256), zero-padded when a packet does not fill its slot.
//! Two identifier bytes follow the length class. Frames are concatenated
//! with no further delimiter, so a scan position that is not `0xEC`
//! triggers a one-byte resynchronization step.

use std::io::Read;

use log::trace;

use crate::frame::{fill, Framing, Record, Session, Step};
use crate::id::TriceId;
use crate::read_u16;
use crate::tag::Padding;

const ESC: u8 = 0xEC;
const LC_NO_PARAMS: u8 = 0xDF;
const LC_MAX: u8 = 0xE8;
/// Escape byte, length class, 16-bit identifier.
const FRAME_HEAD: usize = 4;

/// Frame extractor for the ESC encoding.
pub struct EscFraming<R> {
    reader: R,
    acc: Vec<u8>,
}

impl<R: Read> EscFraming<R> {
    pub fn new(reader: R) -> EscFraming<R> {
        EscFraming {
            reader,
            acc: Vec::with_capacity(crate::frame::READ_CHUNK),
        }
    }

    /// Grows the accumulation buffer to at least `want` bytes with one
    /// transport read. `None` on success, otherwise the step to report.
    fn want(&mut self, want: usize) -> Option<Step> {
        if self.acc.len() >= want {
            return None;
        }
        match fill(&mut self.reader, &mut self.acc) {
            Ok(0) => Some(Step::EndOfStream),
            Ok(_) if self.acc.len() >= want => None,
            Ok(_) => Some(Step::Need),
            Err(e) => Some(Step::Fatal(e)),
        }
    }
}

impl<R: Read + Send> Framing for EscFraming<R> {
    fn next_record(&mut self, session: &mut Session, out: &mut String) -> Step {
        loop {
            if let Some(step) = self.want(FRAME_HEAD) {
                return step;
            }
            if self.acc[0] != ESC {
                out.push_str(&format!(
                    "syncbyte: {:#04x} is not 0xec - ignoring first byte\n",
                    self.acc[0]
                ));
                self.acc.drain(..1);
                continue;
            }
            let class = self.acc[1];
            if !(LC_NO_PARAMS..=LC_MAX).contains(&class) {
                out.push_str(&format!(
                    "syncbyte: invalid length class {:#04x} - ignoring first byte\n",
                    class
                ));
                self.acc.drain(..1);
                continue;
            }

            let param_space = if class == LC_NO_PARAMS {
                0
            } else {
                1usize << (class - 0xE0)
            };
            let total = FRAME_HEAD + param_space;
            if let Some(step) = self.want(total) {
                return step;
            }

            let id = read_u16(&self.acc[2..4], session.endian) as TriceId;
            session.signals.set_last_id(id);
            trace!("ESC frame {:02x?}", &self.acc[..total]);
            let params = self.acc[FRAME_HEAD..total].to_vec();
            self.acc.drain(..total);
            return Step::Record(Record {
                id,
                params,
                padding: Padding::Pow2,
            });
        }
    }
}
