//! LumberjackError: Unified error type for lumberjack public APIs
//!
//! Only substrate failures travel back to callers as `Err`. Usage mistakes and
//! corrupt packs are recovered where they happen and reported through the
//! `log` facade, but they still have a variant here so helpers can describe
//! them uniformly.

use thiserror::Error;

/// Unified error type for lumberjack operations.
#[derive(Debug, Error)]
pub enum LumberjackError {
    /// An aggregator operation ran before a communicator was bound.
    #[error("Lumberjack has no communicator; call `initialize` first")]
    NoCommunicator,
    /// The logger registry was used before `logging::initialize`.
    #[error("logging registry is not initialized")]
    NotInitialized,
    /// A combiner with the same id is already registered.
    #[error("combiner `{0}` is already registered")]
    DuplicateCombiner(String),
    /// No logger is registered under the requested name.
    #[error("no logger named `{0}`")]
    UnknownLogger(String),
    /// A received pack failed to decode.
    #[error("corrupt message pack: {0}")]
    Pack(#[from] PackError),
    /// Point-to-point communication with a peer failed.
    #[error("communication with rank {neighbor} failed: {source}")]
    CommError {
        neighbor: usize,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// Any other failure reported by the message-passing substrate.
    #[error("substrate failure: {0}")]
    Substrate(String),
    /// The substrate reported a rank outside of its world.
    #[error("rank {rank} is outside a world of size {size}")]
    InvalidWorld { rank: usize, size: usize },
    /// A data-structure invariant does not hold.
    #[error("invariant violated: {0}")]
    InvariantViolation(String),
}

/// Ways a pack can fail self-delimitation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PackError {
    #[error("needed {needed} bytes but only {available} remain")]
    Truncated { needed: usize, available: usize },
    #[error("{0} bytes left over after the last declared field")]
    TrailingBytes(usize),
    #[error("unsupported pack version {0}")]
    BadVersion(u16),
    #[error("header declares {declared} messages but {found} were framed")]
    CountMismatch { declared: usize, found: usize },
    #[error("message of {len} bytes exceeds the declared maximum of {max}")]
    LengthExceedsMax { len: usize, max: usize },
    #[error("string field is not valid UTF-8")]
    InvalidUtf8,
    #[error("unknown severity level {0}")]
    InvalidLevel(u32),
    #[error("message counts {count} events but tracks {tracked} ranks")]
    InconsistentRanks { count: u64, tracked: usize },
}
