//! A named logger: severity threshold, per-level streams, flush and abort
//! policies.

use std::backtrace::Backtrace;
use std::fmt;
use std::sync::Arc;

use crate::logging::streams::SharedStream;
use crate::message::{Level, LevelMask};

/// Exit status used by the default abort handler.
pub const ABORT_EXIT_CODE: i32 = 1;

/// Called after a message whose level is in the abort mask has been flushed.
pub type AbortHandler = Arc<dyn Fn(Level) + Send + Sync>;

/// Log the reason and a stack trace of the logging call, then terminate the
/// process.
pub fn default_abort_handler() -> AbortHandler {
    Arc::new(|level: Level| {
        log::error!("{}", abort_report(level, &Backtrace::force_capture()));
        std::process::exit(ABORT_EXIT_CODE);
    })
}

fn abort_report(level: Level, trace: &Backtrace) -> String {
    format!("aborting after a {level} message\n** stack trace **\n{trace}")
}

pub struct Logger {
    name: String,
    level: Level,
    abort_mask: LevelMask,
    flush_mask: LevelMask,
    streams: [Vec<SharedStream>; Level::COUNT],
    abort_handler: AbortHandler,
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logger")
            .field("name", &self.name)
            .field("level", &self.level)
            .field("abort_mask", &self.abort_mask)
            .field("flush_mask", &self.flush_mask)
            .field(
                "streams",
                &self.streams.iter().map(Vec::len).collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl Logger {
    /// A logger that passes every level, aborts on errors and has no streams.
    pub fn new(name: impl Into<String>) -> Self {
        Logger {
            name: name.into(),
            level: Level::Debug,
            abort_mask: LevelMask::only(Level::Error),
            flush_mask: LevelMask::NONE,
            streams: Default::default(),
            abort_handler: default_abort_handler(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Most verbose level still emitted.
    pub fn logging_msg_level(&self) -> Level {
        self.level
    }

    pub fn set_logging_msg_level(&mut self, level: Level) {
        self.level = level;
    }

    pub fn set_abort_on_error(&mut self, enabled: bool) {
        self.abort_mask.set(Level::Error, enabled);
    }

    pub fn set_abort_on_warning(&mut self, enabled: bool) {
        self.abort_mask.set(Level::Warning, enabled);
    }

    pub fn is_abort_on_error_enabled(&self) -> bool {
        self.abort_mask.contains(Level::Error)
    }

    pub fn is_abort_on_warning_enabled(&self) -> bool {
        self.abort_mask.contains(Level::Warning)
    }

    pub fn abort_mask(&self) -> LevelMask {
        self.abort_mask
    }

    pub fn set_abort_mask(&mut self, mask: LevelMask) {
        self.abort_mask = mask;
    }

    pub fn flush_mask(&self) -> LevelMask {
        self.flush_mask
    }

    /// Levels whose streams are flushed right after every message.
    pub fn set_flush_levels(&mut self, mask: LevelMask) {
        self.flush_mask = mask;
    }

    pub fn set_abort_handler(&mut self, handler: AbortHandler) {
        self.abort_handler = handler;
    }

    /// Bind `stream` to `level`. Binding the same stream twice is a no-op.
    pub fn add_stream_to_msg_level(&mut self, stream: SharedStream, level: Level) {
        let bound = &mut self.streams[level.index()];
        if !bound.iter().any(|s| Arc::ptr_eq(s, &stream)) {
            bound.push(stream);
        }
    }

    pub fn add_stream_to_all_msg_levels(&mut self, stream: SharedStream) {
        for level in Level::ALL {
            self.add_stream_to_msg_level(Arc::clone(&stream), level);
        }
    }

    /// Streams bound to `level`.
    pub fn streams(&self, level: Level) -> &[SharedStream] {
        &self.streams[level.index()]
    }

    pub fn stream_count(&self) -> usize {
        self.unique_streams().len()
    }

    pub fn log_message(
        &self,
        level: Level,
        message: &str,
        file_name: &str,
        line: u32,
        filter_duplicates: bool,
    ) {
        self.log_message_with_tag(level, message, "", file_name, line, filter_duplicates);
    }

    /// Route one message to the streams bound to `level`, then apply the
    /// flush and abort policies.
    pub fn log_message_with_tag(
        &self,
        level: Level,
        message: &str,
        tag: &str,
        file_name: &str,
        line: u32,
        filter_duplicates: bool,
    ) {
        if level > self.level {
            return;
        }
        let bound = &self.streams[level.index()];
        for stream in bound {
            stream
                .lock()
                .append(level, message, tag, file_name, line, filter_duplicates);
        }
        if self.flush_mask.contains(level) {
            for stream in bound {
                stream.lock().flush();
            }
        }
        if self.abort_mask.contains(level) {
            self.flush_streams();
            (self.abort_handler)(level);
        }
    }

    /// Flush every stream once, even if bound to several levels.
    pub fn flush_streams(&self) {
        for stream in self.unique_streams() {
            stream.lock().flush();
        }
    }

    /// Push every stream once.
    pub fn push_streams(&self) {
        for stream in self.unique_streams() {
            stream.lock().push();
        }
    }

    fn unique_streams(&self) -> Vec<&SharedStream> {
        let mut seen: Vec<&SharedStream> = Vec::new();
        for stream in self.streams.iter().flatten() {
            if !seen.iter().any(|s| Arc::ptr_eq(s, stream)) {
                seen.push(stream);
            }
        }
        seen
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::format::MessageFormat;
    use crate::logging::streams::{GenericOutputStream, LogStream, MemorySink, shared};
    use parking_lot::Mutex;

    #[test]
    fn abort_report_carries_a_stack_trace() {
        let trace = Backtrace::force_capture();
        let report = abort_report(Level::Error, &trace);
        assert!(report.starts_with("aborting after a ERROR message\n** stack trace **\n"));
        assert!(report.ends_with(&trace.to_string()));
    }

    #[derive(Default)]
    struct Counting {
        appended: usize,
        flushed: usize,
        pushed: usize,
    }

    impl LogStream for Counting {
        fn append(&mut self, _: Level, _: &str, _: &str, _: &str, _: u32, _: bool) {
            self.appended += 1;
        }
        fn flush(&mut self) {
            self.flushed += 1;
        }
        fn push(&mut self) {
            self.pushed += 1;
        }
    }

    fn recording(logger: &mut Logger) -> Arc<Mutex<Vec<Level>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        logger.set_abort_handler(Arc::new(move |level: Level| sink.lock().push(level)));
        seen
    }

    #[test]
    fn threshold_drops_verbose_levels() {
        let out = MemorySink::new();
        let mut logger = Logger::new("t");
        logger.add_stream_to_all_msg_levels(shared(GenericOutputStream::with_format(
            out.clone(),
            MessageFormat::new("{level}:{message}"),
        )));
        logger.set_logging_msg_level(Level::Warning);
        logger.log_message(Level::Warning, "w", "", 0, false);
        logger.log_message(Level::Info, "i", "", 0, false);
        logger.log_message(Level::Debug, "d", "", 0, false);
        assert_eq!(out.lines(), vec!["WARNING:w"]);
    }

    #[test]
    fn streams_only_receive_their_levels() {
        let errors = Arc::new(Mutex::new(Counting::default()));
        let mut logger = Logger::new("t");
        logger.add_stream_to_msg_level(errors.clone(), Level::Warning);
        logger.add_stream_to_msg_level(errors.clone(), Level::Warning);
        logger.log_message(Level::Warning, "w", "", 0, true);
        logger.log_message(Level::Info, "i", "", 0, true);
        assert_eq!(errors.lock().appended, 1);
        assert_eq!(logger.streams(Level::Warning).len(), 1);
    }

    #[test]
    fn flush_mask_flushes_after_append() {
        let s = Arc::new(Mutex::new(Counting::default()));
        let mut logger = Logger::new("t");
        logger.add_stream_to_all_msg_levels(s.clone());
        logger.set_flush_levels(LevelMask::only(Level::Info));
        logger.log_message(Level::Info, "i", "", 0, true);
        logger.log_message(Level::Debug, "d", "", 0, true);
        assert_eq!(s.lock().flushed, 1);
        assert_eq!(s.lock().appended, 2);
    }

    #[test]
    fn abort_mask_flushes_all_then_calls_handler() {
        let s = Arc::new(Mutex::new(Counting::default()));
        let mut logger = Logger::new("t");
        logger.add_stream_to_all_msg_levels(s.clone());
        let aborts = recording(&mut logger);
        logger.log_message(Level::Warning, "w", "", 0, true);
        assert!(aborts.lock().is_empty());
        logger.log_message(Level::Error, "e", "", 0, true);
        assert_eq!(*aborts.lock(), vec![Level::Error]);
        // Bound to four levels, flushed once.
        assert_eq!(s.lock().flushed, 1);

        logger.set_abort_on_error(false);
        logger.set_abort_on_warning(true);
        assert!(!logger.is_abort_on_error_enabled());
        logger.log_message(Level::Error, "e", "", 0, true);
        logger.log_message(Level::Warning, "w", "", 0, true);
        assert_eq!(*aborts.lock(), vec![Level::Error, Level::Warning]);
    }

    #[test]
    fn push_streams_visits_each_stream_once() {
        let a = Arc::new(Mutex::new(Counting::default()));
        let b = Arc::new(Mutex::new(Counting::default()));
        let mut logger = Logger::new("t");
        logger.add_stream_to_all_msg_levels(a.clone());
        logger.add_stream_to_msg_level(b.clone(), Level::Debug);
        logger.push_streams();
        assert_eq!(a.lock().pushed, 1);
        assert_eq!(b.lock().pushed, 1);
        assert_eq!(logger.stream_count(), 2);
    }
}
