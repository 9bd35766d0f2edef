//! Serializable settings for wiring a lumberjack into an application.
//!
//! Every field has a default, so a config file only needs the keys it
//! changes:
//!
//! ```
//! let cfg: lumberjack::LumberjackConfig =
//!     serde_json::from_str(r#"{ "ranks_limit": 8, "topology": "root" }"#).unwrap();
//! assert_eq!(cfg.ranks_limit, 8);
//! assert!(cfg.abort_on_error);
//! ```

use std::io::Write;

use serde::{Deserialize, Serialize};

use crate::communicator::{Communicator, Topology};
use crate::logging::format::{DEFAULT_FORMAT, MessageFormat};
use crate::logging::logger::Logger;
use crate::logging::streams::LumberjackStream;
use crate::lumberjack::DEFAULT_RANKS_LIMIT;
use crate::message::{Level, LevelMask};
use crate::transport::Transport;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LumberjackConfig {
    /// Ranks tracked per message.
    pub ranks_limit: usize,
    pub topology: Topology,
    /// Output template, see [`MessageFormat`].
    pub format: String,
    /// Most verbose level emitted.
    pub level: Level,
    pub abort_on_error: bool,
    pub abort_on_warning: bool,
    /// Levels whose streams flush after every message.
    pub flush_levels: Vec<Level>,
}

impl Default for LumberjackConfig {
    fn default() -> Self {
        LumberjackConfig {
            ranks_limit: DEFAULT_RANKS_LIMIT,
            topology: Topology::default(),
            format: DEFAULT_FORMAT.to_owned(),
            level: Level::Debug,
            abort_on_error: true,
            abort_on_warning: false,
            flush_levels: Vec::new(),
        }
    }
}

impl LumberjackConfig {
    pub fn message_format(&self) -> MessageFormat {
        MessageFormat::new(self.format.as_str())
    }

    pub fn build_communicator<T: Transport>(&self, transport: T) -> Box<dyn Communicator> {
        self.topology.build(transport, self.ranks_limit)
    }

    /// An aggregating stream that owns its lumberjack.
    pub fn build_stream<W: Write + Send, T: Transport>(
        &self,
        sink: W,
        transport: T,
    ) -> LumberjackStream<W> {
        LumberjackStream::with_communicator(sink, self.build_communicator(transport), self.ranks_limit)
            .with_format(self.message_format())
    }

    /// Copy threshold, abort and flush policies onto `logger`.
    pub fn apply_to(&self, logger: &mut Logger) {
        logger.set_logging_msg_level(self.level);
        logger.set_abort_on_error(self.abort_on_error);
        logger.set_abort_on_warning(self.abort_on_warning);
        logger.set_flush_levels(self.flush_levels.iter().copied().collect::<LevelMask>());
    }
}
