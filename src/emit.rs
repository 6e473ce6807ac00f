//! Line composition: collects rendered fragments into whole lines and
//! hands them to a line-oriented sink, optionally decorated with a host
//! timestamp, a prefix and a suffix.

use std::io::{self, Write};
use std::str::FromStr;

use chrono::{Local, Utc};

/// A line-oriented output device. Receives complete lines without the
/// trailing newline.
pub trait LineWriter {
    fn write_line(&mut self, line: &str) -> io::Result<()>;
}

/// [`LineWriter`] over any [`Write`], one flushed line per call.
pub struct ConsoleWriter<W: Write> {
    out: W,
}

impl<W: Write> ConsoleWriter<W> {
    pub fn new(out: W) -> ConsoleWriter<W> {
        ConsoleWriter { out }
    }
}

impl<W: Write> LineWriter for ConsoleWriter<W> {
    fn write_line(&mut self, line: &str) -> io::Result<()> {
        writeln!(self.out, "{}", line)?;
        self.out.flush()
    }
}

/// Host-side timestamp prepended to every line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimestampFormat {
    /// No timestamp.
    Off,
    /// Local time with microseconds.
    LocalMicro,
    /// UTC with microseconds.
    UtcMicro,
    /// A fixed placeholder, for byte-stable test output.
    Fixed,
}

impl Default for TimestampFormat {
    fn default() -> Self {
        TimestampFormat::Off
    }
}

impl FromStr for TimestampFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "off" | "none" => Ok(TimestampFormat::Off),
            "local" => Ok(TimestampFormat::LocalMicro),
            "utc" => Ok(TimestampFormat::UtcMicro),
            "fixed" => Ok(TimestampFormat::Fixed),
            other => Err(format!("unknown timestamp format: {}", other)),
        }
    }
}

/// [`LineComposer`] configuration, fixed at session start.
#[derive(Debug, Clone, Default)]
pub struct ComposerOptions {
    pub timestamp: TimestampFormat,
    /// Text between the timestamp and the line body.
    pub prefix: String,
    /// Text appended after the line body.
    pub suffix: String,
}

/// Splits decoder output fragments on newlines and emits decorated
/// whole lines to the sink.
pub struct LineComposer {
    writer: Box<dyn LineWriter + Send>,
    options: ComposerOptions,
    line: String,
}

impl LineComposer {
    pub fn new(writer: Box<dyn LineWriter + Send>, options: ComposerOptions) -> LineComposer {
        LineComposer {
            writer,
            options,
            line: String::new(),
        }
    }

    /// Appends one decoder fragment, emitting a line for every newline
    /// it contains.
    pub fn write_fragment(&mut self, fragment: &str) -> io::Result<()> {
        for c in fragment.chars() {
            if c == '\n' {
                self.complete_line()?;
            } else {
                self.line.push(c);
            }
        }
        Ok(())
    }

    /// Emits a trailing partial line, if any. Called at session end.
    pub fn flush(&mut self) -> io::Result<()> {
        if !self.line.is_empty() {
            self.complete_line()?;
        }
        Ok(())
    }

    fn complete_line(&mut self) -> io::Result<()> {
        let mut full = String::new();
        match self.options.timestamp {
            TimestampFormat::Off => {}
            TimestampFormat::LocalMicro => {
                full.push_str(&Local::now().format("%Y-%m-%d_%H%M%S.%6f ").to_string())
            }
            TimestampFormat::UtcMicro => {
                full.push_str(&Utc::now().format("%Y-%m-%d_%H%M%S.%6f ").to_string())
            }
            TimestampFormat::Fixed => full.push_str("0000-00-00_000000 "),
        }
        full.push_str(&self.options.prefix);
        full.push_str(&self.line);
        full.push_str(&self.options.suffix);
        self.line.clear();
        self.writer.write_line(&full)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct Capture {
        lines: Arc<Mutex<Vec<String>>>,
    }

    impl LineWriter for Capture {
        fn write_line(&mut self, line: &str) -> io::Result<()> {
            self.lines.lock().unwrap().push(line.to_string());
            Ok(())
        }
    }

    fn taken(capture: &Capture) -> Vec<String> {
        capture.lines.lock().unwrap().clone()
    }

    #[test]
    fn fragments_compose_into_lines() {
        let capture = Capture::default();
        let mut composer =
            LineComposer::new(Box::new(capture.clone()), ComposerOptions::default());
        composer.write_fragment("MSG: part").unwrap();
        composer.write_fragment(" and rest\nerr:whole line\nnext").unwrap();
        assert_eq!(taken(&capture), vec!["MSG: part and rest", "err:whole line"]);
        composer.flush().unwrap();
        assert_eq!(taken(&capture).last().unwrap(), "next");
    }

    #[test]
    fn prefix_suffix_and_fixed_timestamp() {
        let capture = Capture::default();
        let mut composer = LineComposer::new(
            Box::new(capture.clone()),
            ComposerOptions {
                timestamp: TimestampFormat::Fixed,
                prefix: "COM3: ".into(),
                suffix: " <<".into(),
            },
        );
        composer.write_fragment("hello\n").unwrap();
        assert_eq!(
            taken(&capture),
            vec!["0000-00-00_000000 COM3: hello <<"]
        );
    }

    #[test]
    fn empty_lines_survive() {
        let capture = Capture::default();
        let mut composer =
            LineComposer::new(Box::new(capture.clone()), ComposerOptions::default());
        composer.write_fragment("\n\n").unwrap();
        assert_eq!(taken(&capture), vec!["", ""]);
    }
}
