#![cfg_attr(docsrs, feature(doc_cfg))]
//! # lumberjack
//!
//! lumberjack collects diagnostic messages from every rank of a parallel job,
//! folds duplicates together and emits one line per distinct message on a
//! single output rank, annotated with the ranks that logged it and how often.
//!
//! ## Features
//! - [`Message`]s carrying level, origin, tag and a capped list of ranks
//! - Pluggable [`Combiner`]s deciding which messages are the same
//! - A self-delimiting binary pack format for moving messages between ranks
//! - Binary-tree and root-gather [`communicator`] topologies over a small
//!   [`Transport`] trait (serial, in-process threads, or MPI)
//! - A logger registry with per-level streams, flush and abort policies
//!
//! ## Usage
//!
//! ```toml
//! [dependencies]
//! lumberjack = "0.3"
//! # Optional features:
//! # features = ["mpi-support", "check-invariants"]
//! ```
//!
//! A serial program can aggregate with [`NoComm`](transport::NoComm):
//!
//! ```
//! use lumberjack::prelude::*;
//!
//! let mut lj = Lumberjack::new(Topology::BinaryTree.build(NoComm, 5), 5);
//! lj.enqueue("residual did not converge");
//! lj.enqueue("residual did not converge");
//! lj.push_fully().unwrap();
//! assert_eq!(lj.messages()[0].rank_count(), 2);
//! ```
//!
//! ## Failure handling
//! Usage mistakes and corrupt packs are reported through the [`log`] facade
//! and never abort a run. Substrate failures are returned from
//! [`Lumberjack::push_once`] and [`Lumberjack::push_fully`].

pub mod combiner;
pub mod communicator;
pub mod config;
pub mod debug_invariants;
pub mod logging;
pub mod lumberjack;
pub mod lumberjack_error;
mod macros;
pub mod message;
pub mod transport;
pub mod wire;

pub use combiner::{Combiner, TextEqualityCombiner};
pub use config::LumberjackConfig;
pub use debug_invariants::DebugInvariants;
pub use crate::lumberjack::Lumberjack;
pub use lumberjack_error::{LumberjackError, PackError};
pub use message::{Level, LevelMask, Message};

/// A convenient prelude to import the most-used traits & types:
pub mod prelude {
    pub use crate::combiner::{Combiner, TextEqualityCombiner};
    pub use crate::communicator::{
        BinaryTreeCommunicator, Communicator, RootCommunicator, Topology,
    };
    pub use crate::config::LumberjackConfig;
    pub use crate::debug_invariants::DebugInvariants;
    pub use crate::logging::streams::{
        GenericOutputStream, LogStream, LumberjackStream, MemorySink, SharedStream,
        SynchronizedStream, shared,
    };
    pub use crate::logging::{Logger, MessageFormat};
    pub use crate::lumberjack::Lumberjack;
    pub use crate::lumberjack_error::LumberjackError;
    pub use crate::message::{Level, LevelMask, Message};
    #[cfg(feature = "mpi-support")]
    pub use crate::transport::MpiComm;
    pub use crate::transport::{CommTag, LocalComm, NoComm, Transport, Wait};
}
