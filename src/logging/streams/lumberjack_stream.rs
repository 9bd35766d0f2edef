//! Stream backed by a [`Lumberjack`]: messages are coalesced across ranks and
//! only the output rank writes them.

use std::io::Write;
use std::sync::Arc;

use parking_lot::Mutex;

use super::{LogStream, flush_sink, write_line};
use crate::communicator::{BinaryTreeCommunicator, Communicator};
use crate::logging::format::{FormatFields, MessageFormat, timestamp_now};
use crate::lumberjack::Lumberjack;
use crate::message::Level;
use crate::transport::Transport;

enum Backend {
    /// Built by the stream; finalized when the stream is dropped.
    Owned(Lumberjack),
    /// Supplied by the caller, who stays responsible for it.
    Shared(Arc<Mutex<Lumberjack>>),
}

pub struct LumberjackStream<W: Write + Send> {
    sink: W,
    format: MessageFormat,
    backend: Backend,
}

impl<W: Write + Send> LumberjackStream<W> {
    /// Build a binary-tree communicator and a lumberjack over `transport`.
    /// The stream owns both.
    pub fn new<T: Transport>(sink: W, transport: T, ranks_limit: usize) -> Self {
        let communicator = BinaryTreeCommunicator::new(transport, ranks_limit);
        Self::with_communicator(sink, Box::new(communicator), ranks_limit)
    }

    /// Build an owned lumberjack over an existing communicator.
    pub fn with_communicator(
        sink: W,
        communicator: Box<dyn Communicator>,
        ranks_limit: usize,
    ) -> Self {
        LumberjackStream {
            sink,
            format: MessageFormat::default(),
            backend: Backend::Owned(Lumberjack::new(communicator, ranks_limit)),
        }
    }

    /// Write through a lumberjack the caller keeps ownership of.
    pub fn from_shared(sink: W, lumberjack: Arc<Mutex<Lumberjack>>) -> Self {
        LumberjackStream {
            sink,
            format: MessageFormat::default(),
            backend: Backend::Shared(lumberjack),
        }
    }

    pub fn with_format(mut self, format: MessageFormat) -> Self {
        self.format = format;
        self
    }

    pub fn format(&self) -> &MessageFormat {
        &self.format
    }

    /// Whether the lumberjack is finalized together with this stream.
    pub fn owns_lumberjack(&self) -> bool {
        matches!(self.backend, Backend::Owned(_))
    }

    pub fn sink(&self) -> &W {
        &self.sink
    }

    /// Run `f` on the lumberjack, locking it if shared.
    pub fn with_lumberjack<R>(&mut self, f: impl FnOnce(&mut Lumberjack) -> R) -> R {
        match &mut self.backend {
            Backend::Owned(lj) => f(lj),
            Backend::Shared(lj) => f(&mut *lj.lock()),
        }
    }

    /// Format and write what the output rank holds, then forget it.
    fn write_messages(&mut self) {
        let Self {
            sink,
            format,
            backend,
        } = self;
        let mut guard;
        let lj: &mut Lumberjack = match backend {
            Backend::Owned(lj) => lj,
            Backend::Shared(shared) => {
                guard = shared.lock();
                &mut *guard
            }
        };
        if !lj.is_output_node() {
            return;
        }
        let stamp = timestamp_now();
        for m in lj.messages() {
            write_line(sink, &format.render(&FormatFields::from_message(m, &stamp)));
        }
        lj.clear_messages();
        flush_sink(sink);
    }
}

impl<W: Write + Send> LogStream for LumberjackStream<W> {
    fn append(
        &mut self,
        level: Level,
        message: &str,
        tag: &str,
        file_name: &str,
        line: u32,
        _filter_duplicates: bool,
    ) {
        self.with_lumberjack(|lj| lj.enqueue_message(message, file_name, line, level, tag));
    }

    fn flush(&mut self) {
        // A failed flush leaves messages queued; they go out with the next one.
        if let Err(e) = self.with_lumberjack(Lumberjack::push_fully) {
            log::error!("lumberjack stream flush failed: {e}");
            return;
        }
        self.write_messages();
    }

    fn push(&mut self) {
        if let Err(e) = self.with_lumberjack(Lumberjack::push_once) {
            log::error!("lumberjack stream push failed: {e}");
        }
    }
}

impl<W: Write + Send> Drop for LumberjackStream<W> {
    fn drop(&mut self) {
        if let Backend::Owned(lj) = &mut self.backend {
            lj.finalize();
        }
    }
}
