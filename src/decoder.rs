//! Packet dispatch and rendering: identifier resolution, parameter-space
//! checks, cycle tracking and the diagnostic lines for everything that
//! does not decode cleanly.

use std::io::Read;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

use log::debug;

use crate::cobs::CobsFraming;
use crate::esc::EscFraming;
use crate::fmt::{Template, Val};
use crate::frame::{Framing, Record, Session, Step};
use crate::id::{Lookup, TriceFmt, TriceId};
use crate::tag::{BitWidth, Padding, TypeTag};
use crate::{read_u16, read_u32, read_u64, DecoderOptions, Encoding, Error};

/// Pointer appended after every error diagnostic.
pub(crate) const HINTS: &str = "att:Hints:Baudrate? Encoding? til.json? Password?\n";

/// Best-effort side channels a session exposes while decoding: the last
/// seen identifier (UI overlays) and the last target timestamp published
/// by a frame descriptor.
#[derive(Debug, Default)]
pub struct Signals {
    last_id: AtomicU32,
    target_timestamp: AtomicU32,
    timestamp_seen: AtomicBool,
}

impl Signals {
    /// Identifier of the most recently extracted packet; 0 before the
    /// first packet.
    pub fn last_id(&self) -> TriceId {
        self.last_id.load(Ordering::Relaxed)
    }

    /// The most recent 32-bit target timestamp, if any frame carried
    /// one.
    pub fn target_timestamp(&self) -> Option<u32> {
        if self.timestamp_seen.load(Ordering::Relaxed) {
            Some(self.target_timestamp.load(Ordering::Relaxed))
        } else {
            None
        }
    }

    pub(crate) fn set_last_id(&self, id: TriceId) {
        self.last_id.store(id, Ordering::Relaxed);
    }

    pub(crate) fn set_target_timestamp(&self, timestamp: u32) {
        self.target_timestamp.store(timestamp, Ordering::Relaxed);
        self.timestamp_seen.store(true, Ordering::Relaxed);
    }
}

/// Cycle-counter tracking for the packed encoding. The counter runs
/// `0xC0..=0xFF` and wraps back into the window; a skip indicates lost
/// packets and is reported, then re-synchronized.
pub(crate) struct CycleTracker {
    expected: u8,
    /// A reset-looking event already produced its warning; later ones
    /// re-arm silently.
    reset_warned: bool,
}

const CYCLE_START: u8 = 0xC0;

impl CycleTracker {
    pub(crate) fn new() -> CycleTracker {
        CycleTracker {
            expected: CYCLE_START,
            reset_warned: false,
        }
    }

    #[cfg(test)]
    pub(crate) fn expected(&self) -> u8 {
        self.expected
    }

    /// Applies the cycle rules to one observed counter value, appending
    /// a diagnostic line on anomalies. Decoding continues regardless.
    pub(crate) fn check(&mut self, observed: u8, out: &mut String) {
        if observed == CYCLE_START {
            // Looks like a target reset. The first such event warns;
            // the 0xC0/0xC0 coincidence at session start stays silent.
            if self.expected != CYCLE_START && !self.reset_warned {
                out.push_str("warning:   Target Reset?   \n");
                self.reset_warned = true;
            }
            self.expected = CYCLE_START + 1;
            return;
        }
        if observed != self.expected {
            out.push_str(&format!(
                "CYCLE: {:#04X} not equal expected value {:#04X} - adjusting.\n",
                observed, self.expected
            ));
        }
        self.expected = if observed == 0xFF {
            CYCLE_START
        } else {
            observed + 1
        };
    }
}

/// Progress of one decoding step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress {
    /// A packet was processed; its output (or diagnostics) were appended.
    Rendered,
    /// More transport input is needed before the next packet.
    Need,
    /// The transport reported end-of-stream.
    EndOfStream,
}

/// A decoding session: one framing, one identifier table, one cycle
/// counter, living as long as the byte stream.
pub struct TriceDecoder {
    framing: Box<dyn Framing>,
    session: Session,
    lut: Arc<Lookup>,
}

impl TriceDecoder {
    /// Creates a decoder reading `reader` under the given framing.
    pub fn new<R>(
        reader: R,
        lut: Arc<Lookup>,
        encoding: Encoding,
        options: DecoderOptions,
    ) -> TriceDecoder
    where
        R: Read + Send + 'static,
    {
        let session = Session::new(options, Arc::new(Signals::default()));
        let framing: Box<dyn Framing> = match encoding {
            Encoding::Cobs => Box::new(CobsFraming::new(reader)),
            Encoding::Esc => Box::new(EscFraming::new(reader)),
        };
        TriceDecoder {
            framing,
            session,
            lut,
        }
    }

    /// The session's side channels, shareable with observers.
    pub fn signals(&self) -> Arc<Signals> {
        self.session.signals.clone()
    }

    /// Extracts and renders at most one packet, appending rendered text
    /// and any diagnostics to `out` in stream order.
    pub fn read(&mut self, out: &mut String) -> Result<Progress, Error> {
        match self.framing.next_record(&mut self.session, out) {
            Step::Record(record) => {
                self.render(&record, out);
                Ok(Progress::Rendered)
            }
            Step::Need => Ok(Progress::Need),
            Step::EndOfStream => Ok(Progress::EndOfStream),
            Step::Fatal(e) => Err(Error::Io(e)),
        }
    }

    /// Resolves and renders one extracted packet.
    fn render(&mut self, record: &Record, out: &mut String) {
        let fmt = match self.lut.get(record.id) {
            Some(fmt) => fmt,
            None => {
                debug!("id {} not in identifier table", record.id);
                out.push_str(&format!(
                    "WARNING:unknown ID {} - ignoring trice {:?}\n",
                    record.id, record.params
                ));
                out.push_str(HINTS);
                return;
            }
        };
        let template = Template::parse(&fmt.template);
        let tag = match TypeTag::parse(&fmt.tag, template.specifier_count()) {
            Some(tag) => tag,
            None => {
                out.push_str(&format!(
                    "err:Unknown trice.Type {} - ignoring trice data {:?}\n",
                    fmt.tag, record.params
                ));
                out.push_str(HINTS);
                return;
            }
        };

        match tag {
            TypeTag::Str => self.render_string(record, &fmt, &template, out),
            TypeTag::Zero | TypeTag::Numeric { .. } => {
                // The enumerated parameter space of the tag must match
                // what the frame declared.
                let expected = tag.param_space(record.padding).unwrap_or(0);
                if expected != record.params.len() {
                    self.shape_mismatch(&fmt, expected, record, out);
                    return;
                }
                match tag {
                    TypeTag::Zero => out.push_str(&template.render(&[])),
                    TypeTag::Numeric { width, count } => {
                        self.render_numeric(record, &fmt, &template, width, count, out)
                    }
                    TypeTag::Str => unreachable!(),
                }
            }
        }
    }

    fn render_numeric(
        &self,
        record: &Record,
        fmt: &TriceFmt,
        template: &Template,
        width: BitWidth,
        count: u8,
        out: &mut String,
    ) {
        let unsigned = template.unsigned_flags();
        if unsigned.len() != count as usize {
            out.push_str(&format!(
                "ERROR: Invalid format specifier count inside {} {:?}\n",
                fmt.tag, fmt.template
            ));
            return;
        }
        let mut vals = Vec::with_capacity(unsigned.len());
        for (i, &is_unsigned) in unsigned.iter().enumerate() {
            let offset = i * width.bytes();
            let raw: u64 = match width {
                BitWidth::B8 => record.params[offset] as u64,
                BitWidth::B16 => read_u16(&record.params[offset..], self.session.endian) as u64,
                BitWidth::B32 => read_u32(&record.params[offset..], self.session.endian) as u64,
                BitWidth::B64 => read_u64(&record.params[offset..], self.session.endian),
            };
            vals.push(if is_unsigned {
                Val::Uint(raw)
            } else {
                Val::Int(sign_extend(raw, width))
            });
        }
        out.push_str(&template.render(&vals));
    }

    fn render_string(
        &self,
        record: &Record,
        fmt: &TriceFmt,
        template: &Template,
        out: &mut String,
    ) {
        if template.specifier_count() != 1 {
            out.push_str(&format!(
                "ERROR: Invalid format specifier count inside {} {:?}\n",
                fmt.tag, fmt.template
            ));
            return;
        }
        let text = match record.padding {
            // Packed encoding: u32 length prefix, string bytes, zero
            // padding up to the declared parameter space.
            Padding::Word => {
                if record.params.len() < 4 {
                    self.shape_mismatch(fmt, 4, record, out);
                    return;
                }
                let len = read_u32(&record.params, self.session.endian) as usize;
                let expected = len.saturating_add(4 + 3) & !3;
                if expected != record.params.len() {
                    self.shape_mismatch(fmt, expected, record, out);
                    return;
                }
                String::from_utf8_lossy(&record.params[4..4 + len]).into_owned()
            }
            // ESC frames carry the bare string zero-padded to the length
            // class.
            Padding::Pow2 => {
                let end = record
                    .params
                    .iter()
                    .rposition(|&b| b != 0)
                    .map_or(0, |p| p + 1);
                String::from_utf8_lossy(&record.params[..end]).into_owned()
            }
        };
        out.push_str(&template.render(&[Val::Str(text)]));
    }

    fn shape_mismatch(&self, fmt: &TriceFmt, expected: usize, record: &Record, out: &mut String) {
        debug!(
            "parameter space mismatch for id {}: {} declared, {} expected",
            record.id,
            record.params.len(),
            expected
        );
        out.push_str(&format!(
            "err:trice.Type {} s.paramSpace {} != p.paramSpace {} - ignoring data {:?}\n",
            fmt.tag,
            expected,
            record.params.len(),
            record.params
        ));
        out.push_str(HINTS);
    }

    /// Returns an iterator over rendered fragments; ends at
    /// end-of-stream. Meant for fully-available input — live transports
    /// belong in [`run::translate`](crate::run::translate), which paces
    /// its retries.
    pub fn fragments(&mut self) -> crate::Fragments<'_> {
        crate::Fragments::new(self)
    }
}

fn sign_extend(raw: u64, width: BitWidth) -> i64 {
    match width {
        BitWidth::B8 => raw as u8 as i8 as i64,
        BitWidth::B16 => raw as u16 as i16 as i64,
        BitWidth::B32 => raw as u32 as i32 as i64,
        BitWidth::B64 => raw as i64,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run_cycle(tracker: &mut CycleTracker, observed: u8) -> String {
        let mut out = String::new();
        tracker.check(observed, &mut out);
        out
    }

    #[test]
    fn cycle_in_order_stays_silent() {
        let mut t = CycleTracker::new();
        assert_eq!(run_cycle(&mut t, 0xC0), "");
        assert_eq!(run_cycle(&mut t, 0xC1), "");
        assert_eq!(run_cycle(&mut t, 0xC2), "");
        assert_eq!(t.expected(), 0xC3);
    }

    #[test]
    fn cycle_wraps_inside_the_window() {
        let mut t = CycleTracker::new();
        t.check(0xC0, &mut String::new());
        let mut out = String::new();
        t.check(0xFF, &mut out);
        assert!(out.contains("CYCLE:"), "skip to 0xFF must warn");
        assert_eq!(t.expected(), 0xC0, "0xFF + 1 wraps to 0xC0");
        assert_eq!(run_cycle(&mut t, 0xC0), "", "wrap arrival is in order");
    }

    #[test]
    fn cycle_skip_reports_both_values() {
        let mut t = CycleTracker::new();
        for c in 0xC0..=0xC4u8 {
            t.check(c, &mut String::new());
        }
        assert_eq!(t.expected(), 0xC5);
        let out = run_cycle(&mut t, 0xC8);
        assert_eq!(out, "CYCLE: 0xC8 not equal expected value 0xC5 - adjusting.\n");
        assert_eq!(t.expected(), 0xC9);
    }

    #[test]
    fn first_reset_warns_once() {
        let mut t = CycleTracker::new();
        for c in 0xC0..=0xC4u8 {
            t.check(c, &mut String::new());
        }
        let out = run_cycle(&mut t, 0xC0);
        assert_eq!(out, "warning:   Target Reset?   \n");
        assert_eq!(t.expected(), 0xC1);
        // Later resets re-arm silently.
        t.check(0xC1, &mut String::new());
        t.check(0xC2, &mut String::new());
        assert_eq!(run_cycle(&mut t, 0xC0), "");
        assert_eq!(t.expected(), 0xC1);
    }

    #[test]
    fn signals_default_to_nothing_seen() {
        let s = Signals::default();
        assert_eq!(s.last_id(), 0);
        assert_eq!(s.target_timestamp(), None);
        s.set_last_id(65409);
        s.set_target_timestamp(0);
        assert_eq!(s.last_id(), 65409);
        assert_eq!(s.target_timestamp(), Some(0));
    }

    #[test]
    fn sign_extension_per_width() {
        assert_eq!(sign_extend(0x91, BitWidth::B8), -111);
        assert_eq!(sign_extend(0xFF91, BitWidth::B16), -111);
        assert_eq!(sign_extend(0xFFFF_FF91, BitWidth::B32), -111);
        assert_eq!(sign_extend(0xFFFF_FFFF_FFFF_FF91, BitWidth::B64), -111);
        assert_eq!(sign_extend(0x7F, BitWidth::B8), 127);
    }
}
