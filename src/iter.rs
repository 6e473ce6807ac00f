//! Iterator over rendered fragments.

use crate::decoder::{Progress, TriceDecoder};
use crate::Error;

/// Iterator that yields one rendered fragment (or batch of diagnostic
/// lines) per extracted packet, ending at end-of-stream. Diagnostics
/// emitted while the stream starves are carried over and prepended to
/// the next fragment, preserving output order.
///
/// Short reads are retried immediately, without back-off, so this
/// iterator is meant for fully-available input: files, captures,
/// in-memory buffers. Live transports (serial, stdin, TCP) belong in
/// [`run::translate`], which sleeps while the transport starves and
/// honors a cancellation token.
///
/// [`run::translate`]: crate::run::translate
pub struct Fragments<'a> {
    decoder: &'a mut TriceDecoder,
    pending: String,
    done: bool,
}

impl<'a> Fragments<'a> {
    pub(crate) fn new(decoder: &'a mut TriceDecoder) -> Fragments<'a> {
        Fragments {
            decoder,
            pending: String::new(),
            done: false,
        }
    }
}

impl Iterator for Fragments<'_> {
    type Item = Result<String, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        loop {
            match self.decoder.read(&mut self.pending) {
                Ok(Progress::Rendered) => {
                    // A packet may legitimately render to nothing, e.g. a
                    // dropped payload with its diagnostics suppressed.
                    if !self.pending.is_empty() {
                        return Some(Ok(std::mem::take(&mut self.pending)));
                    }
                }
                Ok(Progress::Need) => continue,
                Ok(Progress::EndOfStream) => {
                    self.done = true;
                    return if self.pending.is_empty() {
                        None
                    } else {
                        Some(Ok(std::mem::take(&mut self.pending)))
                    };
                }
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            }
        }
    }
}
