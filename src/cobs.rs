//! COBS framing: zero-terminated, byte-stuffed frames.
//!
//! A decoded frame holds a descriptor word, an optional 32-bit target
//! timestamp, and one or more packets of `header + parameters`. The
//! header word carries the identifier, the parameter-space length byte
//! (times 4) and the cycle counter.

use std::io::Read;

use log::trace;

use crate::decoder::HINTS;
use crate::frame::{fill, Framing, Record, Session, Step};
use crate::id::TriceId;
use crate::read_u32;
use crate::tag::Padding;

/// Packet header size in bytes.
const HEAD_SIZE: usize = 4;

/// Decodes one Consistent-Overhead-Byte-Stuffing frame, including its
/// terminating zero byte. Returns `None` when a group code points past
/// the delimiter or a zero appears before the end.
pub fn decode(frame: &[u8]) -> Option<Vec<u8>> {
    let mut out = Vec::with_capacity(frame.len());
    let mut i = 0;
    loop {
        let code = *frame.get(i)?;
        if code == 0 {
            // The delimiter must be the last byte of the frame.
            return if i + 1 == frame.len() { Some(out) } else { None };
        }
        let end = i + code as usize;
        if end >= frame.len() {
            return None;
        }
        out.extend_from_slice(&frame[i + 1..end]);
        i = end;
        // A 0xFF group carries 254 data bytes and no implicit zero.
        if code < 0xFF && frame[i] != 0 {
            out.push(0);
        }
    }
}

/// Encodes `payload` into a COBS frame ending with the zero delimiter.
/// The inverse of [`decode`]; exists for loopback tests and fixtures.
pub fn encode(payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(payload.len() + 2 + payload.len() / 254);
    let mut code_at = 0;
    out.push(0);
    let mut code: u8 = 1;
    for &b in payload {
        if b == 0 {
            out[code_at] = code;
            code_at = out.len();
            out.push(0);
            code = 1;
        } else {
            out.push(b);
            code += 1;
            if code == 0xFF {
                out[code_at] = code;
                code_at = out.len();
                out.push(0);
                code = 1;
            }
        }
    }
    out[code_at] = code;
    out.push(0);
    out
}

/// Frame extractor for the COBS encoding.
pub struct CobsFraming<R> {
    reader: R,
    /// Raw bytes read from the transport but not yet framed.
    acc: Vec<u8>,
    /// Remainder of the current decoded frame; holds the packets not yet
    /// split off.
    body: Vec<u8>,
}

impl<R: Read> CobsFraming<R> {
    pub fn new(reader: R) -> CobsFraming<R> {
        CobsFraming {
            reader,
            acc: Vec::with_capacity(crate::frame::READ_CHUNK),
            body: Vec::new(),
        }
    }

    /// Scans for the next zero-delimited frame, decodes it and leaves
    /// the packet body in `self.body`. Returns `None` on success (the
    /// caller re-enters the split loop) or a [`Step`] to report.
    fn next_frame(&mut self, session: &mut Session, out: &mut String) -> Option<Step> {
        let mut delim = self.acc.iter().position(|&b| b == 0);
        if delim.is_none() {
            match fill(&mut self.reader, &mut self.acc) {
                Ok(0) => return Some(Step::EndOfStream),
                Ok(_) => {}
                Err(e) => return Some(Step::Fatal(e)),
            }
            delim = self.acc.iter().position(|&b| b == 0);
        }
        let delim = match delim {
            Some(i) => i,
            None => return Some(Step::Need),
        };

        let frame: Vec<u8> = self.acc.drain(..=delim).collect();
        trace!("COBS frame {:02x?}", frame);
        let mut body = match decode(&frame) {
            Some(d) => d,
            None => {
                out.push_str("ERROR:malformed COBS frame - ignoring frame\n");
                out.push_str(HINTS);
                return None;
            }
        };
        if body.len() & 3 != 0 {
            out.push_str(&format!(
                "ERROR:decoded package len {} is no multiple of 4 - ignoring package {:?}\n",
                body.len(),
                body
            ));
            out.push_str(HINTS);
            return None;
        }

        if let Some(cipher) = session.cipher.as_mut() {
            cipher.decrypt(&mut body);
        }

        // Descriptor word: 1 announces a target timestamp before the
        // first packet header; anything else leaves the body as-is.
        if body.len() >= 4 {
            let descriptor = read_u32(&body, session.endian);
            body.drain(..4);
            if descriptor == 1 && body.len() >= 4 {
                let timestamp = read_u32(&body, session.endian);
                session.signals.set_target_timestamp(timestamp);
                body.drain(..4);
            }
        }

        // A leftover shorter than a header is inter-packet garbage and
        // dies with its frame.
        self.body = body;
        None
    }

    /// Splits one packet off the decoded frame body: header decode,
    /// cycle tracking, declared-length validation.
    fn split_record(&mut self, session: &mut Session, out: &mut String) -> Option<Record> {
        let head = read_u32(&self.body, session.endian);
        session.cycle.check(head as u8, out);
        let param_space = ((head & 0x0000_FF00) >> 6) as usize;
        let id = (head >> 16) as TriceId;
        session.signals.set_last_id(id);

        if self.body.len() < HEAD_SIZE + param_space {
            out.push_str(&format!(
                "ERROR:package len {} is < {} - ignoring package {:?}\n",
                self.body.len(),
                HEAD_SIZE + param_space,
                self.body
            ));
            out.push_str(HINTS);
            self.body.clear();
            return None;
        }

        let params = self.body[HEAD_SIZE..HEAD_SIZE + param_space].to_vec();
        self.body.drain(..HEAD_SIZE + param_space);
        Some(Record {
            id,
            params,
            padding: Padding::Word,
        })
    }
}

impl<R: Read + Send> Framing for CobsFraming<R> {
    fn next_record(&mut self, session: &mut Session, out: &mut String) -> Step {
        loop {
            if self.body.len() >= HEAD_SIZE {
                if let Some(record) = self.split_record(session, out) {
                    return Step::Record(record);
                }
                continue;
            }
            if let Some(step) = self.next_frame(session, out) {
                return step;
            }
        }
    }
}
