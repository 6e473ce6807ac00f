use anyhow::{Context, Result};
use std::fs::File;
use std::io::Read;
use std::net::TcpStream;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use structopt::StructOpt;

use trice::emit::{ComposerOptions, ConsoleWriter, LineComposer, TimestampFormat};
use trice::{run, DecoderOptions, Encoding, Endian, Lookup, TriceDecoder};

#[derive(StructOpt, Debug)]
#[structopt(
    about = "A trice byte-stream decoder. Reframes the firmware log stream, resolves identifiers through an identifier list and prints the rendered log lines."
)]
struct Opt {
    /// Identifier list JSON file (id -> {Type, Strg}).
    #[structopt(short = "l", long = "list", parse(from_os_str))]
    list: PathBuf,

    /// Wire framing: cobs or esc.
    #[structopt(short = "e", long = "encoding", default_value = "cobs")]
    encoding: Encoding,

    /// Byte order of the stream: big or little.
    #[structopt(long = "endian", default_value = "big")]
    endian: Endian,

    /// Line timestamps: off, local, utc or fixed.
    #[structopt(short = "t", long = "timestamp", default_value = "off")]
    timestamp: TimestampFormat,

    /// Text prepended to every output line.
    #[structopt(long = "prefix", default_value = "")]
    prefix: String,

    /// Text appended to every output line.
    #[structopt(long = "suffix", default_value = "")]
    suffix: String,

    /// Keep retrying when the input reports end-of-stream.
    #[structopt(short = "f", long = "follow")]
    follow: bool,

    /// Verbose logging to stderr (-v, -vv, ...).
    #[structopt(short = "v", long = "verbose", parse(from_occurrences))]
    verbose: usize,

    /// Byte source: a file path, `-` for stdin, or `tcp:<addr>`.
    #[structopt(name = "INPUT")]
    input: String,
}

fn open_input(input: &str) -> Result<Box<dyn Read + Send>> {
    if input == "-" {
        return Ok(Box::new(std::io::stdin()));
    }
    if let Some(addr) = input.strip_prefix("tcp:") {
        let stream = TcpStream::connect(addr)
            .with_context(|| format!("failed to connect to {}", addr))?;
        return Ok(Box::new(stream));
    }
    let file = File::open(input).with_context(|| format!("failed to open {}", input))?;
    Ok(Box::new(file))
}

fn main() -> Result<()> {
    let opt = Opt::from_args();

    stderrlog::new()
        .verbosity(opt.verbose)
        .init()
        .context("failed to initialize logging")?;

    let list = std::fs::read(&opt.list)
        .with_context(|| format!("failed to read {}", opt.list.display()))?;
    let lut = Arc::new(Lookup::from_json(&list).context("failed to parse identifier list")?);

    let stop = Arc::new(AtomicBool::new(false));
    {
        let stop = stop.clone();
        ctrlc::set_handler(move || stop.store(true, Ordering::Relaxed))
            .context("failed to install the signal handler")?;
    }

    let input = open_input(&opt.input)?;
    let mut decoder = TriceDecoder::new(
        input,
        lut,
        opt.encoding,
        DecoderOptions {
            endian: opt.endian,
            cipher: None,
        },
    );
    let mut composer = LineComposer::new(
        Box::new(ConsoleWriter::new(std::io::stdout())),
        ComposerOptions {
            timestamp: opt.timestamp,
            prefix: opt.prefix.clone(),
            suffix: opt.suffix.clone(),
        },
    );

    run::translate(&mut decoder, &mut composer, &stop, opt.follow)
        .context("decoding session failed")
}
