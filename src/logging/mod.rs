//! Process-wide logging front end.
//!
//! The registry maps names to [`Logger`]s and keeps one of them active; the
//! free functions in this module act on the active logger. Call
//! [`initialize`] first and [`finalize`] last. Until then every call is
//! reported through the `log` facade and otherwise ignored.
//!
//! ```
//! use lumberjack::logging::{self, streams::{GenericOutputStream, MemorySink, shared}};
//! use lumberjack::Level;
//!
//! let out = MemorySink::new();
//! logging::initialize();
//! logging::add_stream_to_all_msg_levels(shared(GenericOutputStream::new(out.clone())));
//! logging::log_message(Level::Info, "mesh loaded", "main.rs", 7, true);
//! logging::finalize();
//! assert!(out.contents().contains("mesh loaded"));
//! ```
//!
//! Every rank owns its own registry. Collective streams (see
//! [`LumberjackStream`](streams::LumberjackStream)) must be flushed by all
//! ranks together.

use hashbrown::HashMap;
use once_cell::sync::Lazy;
use parking_lot::Mutex;

use crate::lumberjack_error::LumberjackError;
use crate::message::{Level, LevelMask};

pub mod format;
pub mod logger;
pub mod streams;

pub use format::{DEFAULT_FORMAT, FormatFields, MessageFormat, timestamp_now};
pub use logger::{ABORT_EXIT_CODE, AbortHandler, Logger, default_abort_handler};
pub use streams::{LogStream, SharedStream};

/// Name of the logger created and activated by [`initialize`].
pub const ROOT_LOGGER: &str = "root";

struct Registry {
    loggers: HashMap<String, Logger>,
    active: String,
}

impl Registry {
    fn active_mut(&mut self) -> Option<&mut Logger> {
        self.loggers.get_mut(&self.active)
    }
}

static REGISTRY: Lazy<Mutex<Option<Registry>>> = Lazy::new(|| Mutex::new(None));

/// Create the registry with a `root` logger and make it active. Calling it
/// again keeps the existing registry.
pub fn initialize() {
    let mut registry = REGISTRY.lock();
    if registry.is_some() {
        return;
    }
    let mut loggers = HashMap::new();
    loggers.insert(ROOT_LOGGER.to_owned(), Logger::new(ROOT_LOGGER));
    *registry = Some(Registry {
        loggers,
        active: ROOT_LOGGER.to_owned(),
    });
}

pub fn is_initialized() -> bool {
    REGISTRY.lock().is_some()
}

/// Drop every logger (and with it every stream no one else holds).
pub fn finalize() {
    let taken = REGISTRY.lock().take();
    if let Some(registry) = taken {
        for logger in registry.loggers.values() {
            logger.flush_streams();
        }
    }
}

fn with_registry<R>(f: impl FnOnce(&mut Registry) -> R) -> Option<R> {
    let mut guard = REGISTRY.lock();
    match guard.as_mut() {
        Some(registry) => Some(f(registry)),
        None => {
            log::warn!("{}", LumberjackError::NotInitialized);
            None
        }
    }
}

/// Run `f` on the active logger. `None` if the registry is not initialized.
pub fn with_active_logger<R>(f: impl FnOnce(&mut Logger) -> R) -> Option<R> {
    with_registry(|r| r.active_mut().map(f)).flatten()
}

/// Register a logger named `name`. Streams the root logger has bound to the
/// levels in `inherit` are bound to the new logger too. Returns `false` if the
/// name is taken.
pub fn create_logger(name: &str, inherit: LevelMask) -> bool {
    with_registry(|r| {
        if r.loggers.contains_key(name) {
            log::warn!("logger {name:?} already exists");
            return false;
        }
        let mut logger = Logger::new(name);
        if let Some(root) = r.loggers.get(ROOT_LOGGER) {
            for level in inherit.iter() {
                for stream in root.streams(level) {
                    logger.add_stream_to_msg_level(stream.clone(), level);
                }
            }
        }
        r.loggers.insert(name.to_owned(), logger);
        true
    })
    .unwrap_or(false)
}

/// Make `name` the active logger. Unknown names leave the active logger as it
/// was.
pub fn activate_logger(name: &str) -> bool {
    with_registry(|r| {
        if r.loggers.contains_key(name) {
            r.active = name.to_owned();
            true
        } else {
            log::warn!("{}", LumberjackError::UnknownLogger(name.to_owned()));
            false
        }
    })
    .unwrap_or(false)
}

pub fn active_logger_name() -> Option<String> {
    with_registry(|r| r.active.clone())
}

pub fn has_logger(name: &str) -> bool {
    with_registry(|r| r.loggers.contains_key(name)).unwrap_or(false)
}

pub fn set_logging_msg_level(level: Level) {
    with_active_logger(|l| l.set_logging_msg_level(level));
}

pub fn logging_msg_level() -> Option<Level> {
    with_active_logger(|l| l.logging_msg_level())
}

pub fn set_abort_on_error(enabled: bool) {
    with_active_logger(|l| l.set_abort_on_error(enabled));
}

pub fn set_abort_on_warning(enabled: bool) {
    with_active_logger(|l| l.set_abort_on_warning(enabled));
}

pub fn is_abort_on_error_enabled() -> bool {
    with_active_logger(|l| l.is_abort_on_error_enabled()).unwrap_or(false)
}

pub fn is_abort_on_warning_enabled() -> bool {
    with_active_logger(|l| l.is_abort_on_warning_enabled()).unwrap_or(false)
}

pub fn set_flush_levels(mask: LevelMask) {
    with_active_logger(|l| l.set_flush_levels(mask));
}

/// Replace the active logger's abort handler. The handler runs with the
/// registry locked and must not call back into this module.
pub fn set_abort_handler(handler: AbortHandler) {
    with_active_logger(|l| l.set_abort_handler(handler));
}

pub fn add_stream_to_msg_level(stream: SharedStream, level: Level) {
    with_active_logger(|l| l.add_stream_to_msg_level(stream, level));
}

pub fn add_stream_to_all_msg_levels(stream: SharedStream) {
    with_active_logger(|l| l.add_stream_to_all_msg_levels(stream));
}

pub fn log_message(level: Level, message: &str, file_name: &str, line: u32, filter_duplicates: bool) {
    log_message_with_tag(level, message, "", file_name, line, filter_duplicates);
}

pub fn log_message_with_tag(
    level: Level,
    message: &str,
    tag: &str,
    file_name: &str,
    line: u32,
    filter_duplicates: bool,
) {
    with_active_logger(|l| {
        l.log_message_with_tag(level, message, tag, file_name, line, filter_duplicates)
    });
}

/// Log an error with its origin.
pub fn log_error_message(message: &str, file_name: &str, line: u32) {
    log_message(Level::Error, message, file_name, line, false);
}

pub fn log_warning_message(message: &str, file_name: &str, line: u32) {
    log_message(Level::Warning, message, file_name, line, false);
}

/// Flush the active logger's streams. Collective for aggregating streams.
pub fn flush_streams() {
    with_active_logger(|l| l.flush_streams());
}

/// Push the active logger's streams once. Collective for aggregating streams.
pub fn push_streams() {
    with_active_logger(|l| l.push_streams());
}
