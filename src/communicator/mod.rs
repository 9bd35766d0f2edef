//! Overlay topologies that move packs toward the output rank.
//!
//! A [`Communicator`] owns a [`Transport`] and decides, for each push round,
//! which peer this rank sends its pack to and which peers it receives from.
//! Every round is bracketed by two barriers so packs from different rounds are
//! never mixed.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::lumberjack_error::LumberjackError;
use crate::transport::{CommTag, Transport, Wait};

pub mod binary_tree;
pub mod root;

pub use binary_tree::BinaryTreeCommunicator;
pub use root::RootCommunicator;

/// One hop of message movement across ranks.
pub trait Communicator: Send {
    /// Rank of this process.
    fn rank(&self) -> usize;

    /// Limit on individually tracked ranks per message.
    fn ranks_limit(&self) -> usize;

    fn set_ranks_limit(&mut self, value: usize);

    /// Push rounds needed to move every message to the output node.
    fn num_pushes_to_flush(&self) -> usize;

    /// Send `outgoing` one hop and append the non-empty packs received from
    /// peers to `incoming`.
    fn push(&mut self, outgoing: Bytes, incoming: &mut Vec<Bytes>) -> Result<(), LumberjackError>;

    /// Whether this rank drains and emits messages.
    fn is_output_node(&self) -> bool;

    /// Release topology resources. Called once, last.
    fn finalize(&mut self) {}
}

/// Available overlay topologies.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Topology {
    /// Binary-tree reduction toward rank 0.
    #[default]
    BinaryTree,
    /// Every rank sends straight to rank 0.
    Root,
}

impl Topology {
    /// Build the communicator for this topology on top of `transport`.
    pub fn build<T: Transport>(self, transport: T, ranks_limit: usize) -> Box<dyn Communicator> {
        match self {
            Topology::BinaryTree => Box::new(BinaryTreeCommunicator::new(transport, ranks_limit)),
            Topology::Root => Box::new(RootCommunicator::new(transport, ranks_limit)),
        }
    }
}

/// One bracketed round: barrier, send to `parent` (if any), receive one pack
/// from each of `sources`, wait for the send, barrier.
///
/// `incoming` is only extended once the whole round succeeded.
pub(crate) fn exchange_round<T: Transport>(
    transport: &T,
    parent: Option<usize>,
    outgoing: Bytes,
    sources: impl IntoIterator<Item = usize>,
    incoming: &mut Vec<Bytes>,
) -> Result<(), LumberjackError> {
    transport.barrier()?;

    let pending = match parent {
        Some(p) => Some(transport.isend(p, CommTag::LUMBERJACK_PUSH, outgoing)?),
        None => None,
    };

    let mut received = Vec::new();
    for src in sources {
        let pack = transport.recv(src, CommTag::LUMBERJACK_PUSH)?;
        if !pack.is_empty() {
            received.push(pack);
        }
    }

    if let Some(handle) = pending {
        handle.wait()?;
    }

    transport.barrier()?;
    incoming.extend(received);
    Ok(())
}
