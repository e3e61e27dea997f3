//! Forwarding of daemon stdout/stderr.

use crate::config::ProcessConfig;
use std::io::{BufRead, BufReader, Read};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, info, warn};

/// Which pipe a line came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutputStream {
    Stdout,
    Stderr,
}

impl OutputStream {
    pub fn prefix(&self) -> &'static str {
        match self {
            OutputStream::Stdout => ProcessConfig::STDOUT_PREFIX,
            OutputStream::Stderr => ProcessConfig::STDERR_PREFIX,
        }
    }
}

/// Receives daemon output one line at a time.
///
/// Called from the drain threads, so implementations must be thread-safe.
/// Lines arrive in pipe order per stream, without their line terminator.
pub trait LineSink: Send + Sync {
    fn line(&self, stream: OutputStream, line: &str);
}

/// Default sink: forwards to `tracing` under the `monerod` target.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl LineSink for TracingSink {
    fn line(&self, stream: OutputStream, line: &str) {
        match stream {
            OutputStream::Stdout => info!(target: "monerod", "[{}] {}", stream.prefix(), line),
            OutputStream::Stderr => warn!(target: "monerod", "[{}] {}", stream.prefix(), line),
        }
    }
}

/// Spawn a thread that drains `reader` into `sink` until EOF.
pub(crate) fn spawn_drain<R>(
    reader: R,
    stream: OutputStream,
    sink: Arc<dyn LineSink>,
) -> std::io::Result<JoinHandle<()>>
where
    R: Read + Send + 'static,
{
    thread::Builder::new()
        .name(format!("{}-drain", stream.prefix()))
        .spawn(move || drain_lines(reader, stream, sink.as_ref()))
}

/// Read lines until EOF. Invalid UTF-8 is replaced rather than dropped.
pub(crate) fn drain_lines<R: Read>(reader: R, stream: OutputStream, sink: &dyn LineSink) {
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();

    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf) {
            Ok(0) => break,
            Ok(_) => {
                let line = String::from_utf8_lossy(&buf);
                sink.line(stream, line.trim_end_matches(['\r', '\n']));
            }
            Err(e) => {
                debug!("{} pipe closed: {}", stream.prefix(), e);
                break;
            }
        }
    }
}
