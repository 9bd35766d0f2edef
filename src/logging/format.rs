//! Output templates for streams.
//!
//! A template is plain text with `{name}` substitutions. Recognized names are
//! `level`, `message`, `tag`, `ranks`, `file`, `line`, `count` and
//! `timestamp`; anything else, including an unterminated `{`, is copied
//! through verbatim.
//!
//! `{timestamp}` is UTC, RFC 3339 with milliseconds. Immediate and
//! synchronized streams stamp a message when it is appended. Aggregated
//! messages carry no time across ranks, so they are stamped when the output
//! node writes them out.

use std::borrow::Cow;

use chrono::{SecondsFormat, Utc};

use crate::message::{Level, Message};

/// Template used when a stream is not given one.
pub const DEFAULT_FORMAT: &str =
    "[{level}][{file}:{line}][ranks={ranks} count={count}] {tag}: {message}";

/// Delimiter between ranks in `{ranks}`.
pub const RANKS_DELIMITER: &str = ",";

/// The current time as rendered by `{timestamp}`.
pub fn timestamp_now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Values substituted into a template for one message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FormatFields<'a> {
    pub level: Level,
    pub message: &'a str,
    pub tag: &'a str,
    pub ranks: Cow<'a, str>,
    pub file: &'a str,
    pub line: u32,
    pub count: usize,
    pub timestamp: Cow<'a, str>,
}

impl<'a> FormatFields<'a> {
    /// Fields of an aggregated message written at `timestamp`.
    pub fn from_message(m: &'a Message, timestamp: &'a str) -> Self {
        FormatFields {
            level: m.level(),
            message: m.text(),
            tag: m.tag(),
            ranks: Cow::Owned(m.stringify_ranks(RANKS_DELIMITER)),
            file: m.file_name(),
            line: m.line_number(),
            count: m.rank_count(),
            timestamp: Cow::Borrowed(timestamp),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MessageFormat {
    template: String,
}

impl Default for MessageFormat {
    fn default() -> Self {
        MessageFormat::new(DEFAULT_FORMAT)
    }
}

impl MessageFormat {
    pub fn new(template: impl Into<String>) -> Self {
        MessageFormat {
            template: template.into(),
        }
    }

    pub fn template(&self) -> &str {
        &self.template
    }

    /// Expand the template. No trailing newline is added.
    pub fn render(&self, fields: &FormatFields<'_>) -> String {
        let mut out = String::with_capacity(self.template.len() + fields.message.len());
        let mut rest = self.template.as_str();
        while let Some(open) = rest.find('{') {
            out.push_str(&rest[..open]);
            let after = &rest[open + 1..];
            let Some(close) = after.find('}') else {
                out.push_str(&rest[open..]);
                return out;
            };
            let name = &after[..close];
            match name {
                "level" => out.push_str(fields.level.as_str()),
                "message" => out.push_str(fields.message),
                "tag" => out.push_str(fields.tag),
                "ranks" => out.push_str(&fields.ranks),
                "file" => out.push_str(fields.file),
                "line" => out.push_str(&fields.line.to_string()),
                "count" => out.push_str(&fields.count.to_string()),
                "timestamp" => out.push_str(&fields.timestamp),
                _ => {
                    out.push('{');
                    out.push_str(name);
                    out.push('}');
                }
            }
            rest = &after[close + 1..];
        }
        out.push_str(rest);
        out
    }
}
