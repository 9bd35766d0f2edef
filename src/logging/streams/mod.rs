//! Sinks that loggers write into.
//!
//! - [`GenericOutputStream`] writes every message as soon as it is logged.
//! - [`LumberjackStream`] hands messages to a [`Lumberjack`](crate::Lumberjack)
//!   and writes the coalesced result on the output rank when flushed.
//! - [`SynchronizedStream`] caches lines and writes them in rank order.

use std::io::{self, Write};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::message::Level;

pub mod generic;
pub mod lumberjack_stream;
pub mod synchronized;

pub use generic::GenericOutputStream;
pub use lumberjack_stream::LumberjackStream;
pub use synchronized::SynchronizedStream;

/// A destination for logged messages.
pub trait LogStream: Send {
    /// Accept one message. `filter_duplicates` is a hint; streams that
    /// coalesce always do.
    fn append(
        &mut self,
        level: Level,
        message: &str,
        tag: &str,
        file_name: &str,
        line: u32,
        filter_duplicates: bool,
    );

    /// Write out everything accepted so far. May be collective.
    fn flush(&mut self) {}

    /// Make partial progress without a full flush. May be collective.
    fn push(&mut self) {}
}

/// A stream shared between levels and loggers.
pub type SharedStream = Arc<Mutex<dyn LogStream>>;

/// Wrap `stream` so it can be registered with loggers.
pub fn shared<S: LogStream + 'static>(stream: S) -> SharedStream {
    Arc::new(Mutex::new(stream))
}

/// Cloneable in-memory byte sink, handy for tests and for capturing output.
#[derive(Clone, Debug, Default)]
pub struct MemorySink {
    buf: Arc<Mutex<Vec<u8>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything written so far, lossily decoded.
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.buf.lock()).into_owned()
    }

    pub fn lines(&self) -> Vec<String> {
        self.contents().lines().map(str::to_owned).collect()
    }

    pub fn clear(&self) {
        self.buf.lock().clear();
    }
}

impl Write for MemorySink {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.buf.lock().extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Write one line, reporting (not propagating) I/O failures.
pub(crate) fn write_line<W: Write>(sink: &mut W, line: &str) {
    if let Err(e) = writeln!(sink, "{line}") {
        log::error!("log stream write failed: {e}");
    }
}

pub(crate) fn flush_sink<W: Write>(sink: &mut W) {
    if let Err(e) = sink.flush() {
        log::error!("log stream flush failed: {e}");
    }
}
