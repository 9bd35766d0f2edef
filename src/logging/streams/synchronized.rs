//! Rank-ordered output without coalescing.
//!
//! Lines are cached locally until `flush`, which is collective: rank `r` waits
//! for an empty token from `r - 1`, writes its cache, then hands the token on
//! to `r + 1`. The sink must be shared between ranks (a terminal, a file
//! opened in append mode) for the ordering to be visible.

use std::io::Write;

use bytes::Bytes;

use super::{LogStream, flush_sink, write_line};
use crate::logging::format::{FormatFields, MessageFormat, timestamp_now};
use crate::lumberjack_error::LumberjackError;
use crate::message::Level;
use crate::transport::{CommTag, Transport, Wait};

pub struct SynchronizedStream<W: Write + Send, T: Transport> {
    sink: W,
    transport: T,
    format: MessageFormat,
    cache: Vec<String>,
}

impl<W: Write + Send, T: Transport> SynchronizedStream<W, T> {
    pub fn new(sink: W, transport: T) -> Self {
        Self::with_format(sink, transport, MessageFormat::default())
    }

    pub fn with_format(sink: W, transport: T, format: MessageFormat) -> Self {
        SynchronizedStream {
            sink,
            transport,
            format,
            cache: Vec::new(),
        }
    }

    /// Lines waiting for the next flush.
    pub fn cached(&self) -> &[String] {
        &self.cache
    }

    pub fn sink(&self) -> &W {
        &self.sink
    }

    fn ordered_write(&mut self) -> Result<(), LumberjackError> {
        let rank = self.transport.rank();
        let size = self.transport.size();
        if rank > 0 {
            self.transport.recv(rank - 1, CommTag::SYNC_TOKEN)?;
        }
        for line in self.cache.drain(..) {
            write_line(&mut self.sink, &line);
        }
        flush_sink(&mut self.sink);
        if rank + 1 < size {
            self.transport
                .isend(rank + 1, CommTag::SYNC_TOKEN, Bytes::new())?
                .wait()?;
        }
        Ok(())
    }
}

impl<W: Write + Send, T: Transport> LogStream for SynchronizedStream<W, T> {
    fn append(
        &mut self,
        level: Level,
        message: &str,
        tag: &str,
        file_name: &str,
        line: u32,
        _filter_duplicates: bool,
    ) {
        let ranks = self.transport.rank().to_string();
        self.cache.push(self.format.render(&FormatFields {
            level,
            message,
            tag,
            ranks: ranks.into(),
            file: file_name,
            line,
            count: 1,
            timestamp: timestamp_now().into(),
        }));
    }

    fn flush(&mut self) {
        if let Err(e) = self.ordered_write() {
            log::error!(
                "rank {}: synchronized flush failed: {e}",
                self.transport.rank()
            );
        }
    }
}
