//! Immediate, per-rank output.

use std::io::Write;

use super::{LogStream, flush_sink, write_line};
use crate::logging::format::{FormatFields, MessageFormat, timestamp_now};
use crate::message::Level;

/// Formats each message as it arrives and writes it to `sink`.
///
/// No ranks are known here, so `{ranks}` renders empty and `{count}` as 1.
pub struct GenericOutputStream<W: Write + Send> {
    sink: W,
    format: MessageFormat,
}

impl<W: Write + Send> GenericOutputStream<W> {
    pub fn new(sink: W) -> Self {
        Self::with_format(sink, MessageFormat::default())
    }

    pub fn with_format(sink: W, format: MessageFormat) -> Self {
        GenericOutputStream { sink, format }
    }

    pub fn sink(&self) -> &W {
        &self.sink
    }

    pub fn format(&self) -> &MessageFormat {
        &self.format
    }
}

impl<W: Write + Send> LogStream for GenericOutputStream<W> {
    fn append(
        &mut self,
        level: Level,
        message: &str,
        tag: &str,
        file_name: &str,
        line: u32,
        _filter_duplicates: bool,
    ) {
        let text = self.format.render(&FormatFields {
            level,
            message,
            tag,
            ranks: "".into(),
            file: file_name,
            line,
            count: 1,
            timestamp: timestamp_now().into(),
        });
        write_line(&mut self.sink, &text);
    }

    fn flush(&mut self) {
        flush_sink(&mut self.sink);
    }
}
