//! Binary-tree reduction overlay.
//!
//! Rank `r` has parent `(r - 1) / 2` and children `2r + 1`, `2r + 2` (when
//! inside the world). One push moves every pack one level up, so after
//! `tree_height - 1` pushes everything has reached rank 0.

use bytes::Bytes;

use super::{Communicator, exchange_round};
use crate::lumberjack_error::LumberjackError;
use crate::transport::Transport;

/// `⌈log2(n)⌉`, with `ceil_log2(0) == ceil_log2(1) == 0`.
#[inline]
fn ceil_log2(n: usize) -> usize {
    if n <= 1 {
        0
    } else {
        (usize::BITS - (n - 1).leading_zeros()) as usize
    }
}

pub struct BinaryTreeCommunicator<T: Transport> {
    transport: T,
    rank: usize,
    size: usize,
    ranks_limit: usize,
    parent: Option<usize>,
    left_child: Option<usize>,
    right_child: Option<usize>,
    tree_height: usize,
}

impl<T: Transport> BinaryTreeCommunicator<T> {
    /// Capture the world shape from `transport` and place this rank in the
    /// tree.
    pub fn new(transport: T, ranks_limit: usize) -> Self {
        let rank = transport.rank();
        let size = transport.size();
        let within = |r: usize| (r < size).then_some(r);
        Self {
            parent: (rank > 0).then(|| (rank - 1) / 2),
            left_child: within(2 * rank + 1),
            right_child: within(2 * rank + 2),
            tree_height: ceil_log2(size) + 1,
            transport,
            rank,
            size,
            ranks_limit,
        }
    }

    pub fn parent(&self) -> Option<usize> {
        self.parent
    }

    /// Children of this rank, left first.
    pub fn children(&self) -> impl Iterator<Item = usize> + '_ {
        self.left_child.into_iter().chain(self.right_child)
    }

    pub fn child_count(&self) -> usize {
        self.children().count()
    }

    pub fn tree_height(&self) -> usize {
        self.tree_height
    }

    pub fn world_size(&self) -> usize {
        self.size
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }
}

impl<T: Transport> Communicator for BinaryTreeCommunicator<T> {
    fn rank(&self) -> usize {
        self.rank
    }

    fn ranks_limit(&self) -> usize {
        self.ranks_limit
    }

    fn set_ranks_limit(&mut self, value: usize) {
        self.ranks_limit = value;
    }

    fn num_pushes_to_flush(&self) -> usize {
        self.tree_height - 1
    }

    fn push(&mut self, outgoing: Bytes, incoming: &mut Vec<Bytes>) -> Result<(), LumberjackError> {
        let children: Vec<usize> = self.children().collect();
        log::trace!(
            "rank {}: tree push to {:?}, receiving from {:?}",
            self.rank,
            self.parent,
            children
        );
        exchange_round(&self.transport, self.parent, outgoing, children, incoming)
    }

    fn is_output_node(&self) -> bool {
        self.rank == 0
    }
}
