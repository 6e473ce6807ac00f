//! The pipeline driver: pumps one decoder into one line composer until
//! the transport fails, the stream ends, or the session is cancelled.

use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use log::debug;

use crate::decoder::{Progress, TriceDecoder};
use crate::emit::LineComposer;
use crate::Error;

/// Back-off between extraction attempts while the transport starves,
/// bounding CPU use on a slow byte source.
pub const RETRY_DELAY: Duration = Duration::from_millis(100);

/// Drives `decoder`, writing rendered fragments and diagnostics to
/// `composer` in packet order.
///
/// On starvation the loop sleeps [`RETRY_DELAY`] and retries. With
/// `follow` set, end-of-stream is treated the same way (the transport
/// may reopen); otherwise it ends the session cleanly. A transport error
/// is returned; `stop` cancels the session at the next packet boundary.
pub fn translate(
    decoder: &mut TriceDecoder,
    composer: &mut LineComposer,
    stop: &AtomicBool,
    follow: bool,
) -> Result<(), Error> {
    let mut fragment = String::new();
    while !stop.load(Ordering::Relaxed) {
        fragment.clear();
        let progress = decoder.read(&mut fragment)?;
        if !fragment.is_empty() {
            composer.write_fragment(&fragment).map_err(Error::Io)?;
        }
        match progress {
            Progress::Rendered => {}
            Progress::Need => thread::sleep(RETRY_DELAY),
            Progress::EndOfStream => {
                if !follow {
                    break;
                }
                thread::sleep(RETRY_DELAY);
            }
        }
    }
    debug!("decoding session ends");
    composer.flush().map_err(Error::Io)?;
    Ok(())
}
