//! Root-gather overlay: every rank sends straight to rank 0, so a single push
//! flushes the world.

use bytes::Bytes;

use super::{Communicator, exchange_round};
use crate::lumberjack_error::LumberjackError;
use crate::transport::Transport;

pub struct RootCommunicator<T: Transport> {
    transport: T,
    rank: usize,
    size: usize,
    ranks_limit: usize,
}

impl<T: Transport> RootCommunicator<T> {
    pub fn new(transport: T, ranks_limit: usize) -> Self {
        Self {
            rank: transport.rank(),
            size: transport.size(),
            transport,
            ranks_limit,
        }
    }

    pub fn world_size(&self) -> usize {
        self.size
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }
}

impl<T: Transport> Communicator for RootCommunicator<T> {
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
        1
    }

    fn push(&mut self, outgoing: Bytes, incoming: &mut Vec<Bytes>) -> Result<(), LumberjackError> {
        let (parent, sources) = if self.rank == 0 {
            (None, 1..self.size)
        } else {
            (Some(0), 0..0)
        };
        log::trace!("rank {}: root-gather push", self.rank);
        exchange_round(&self.transport, parent, outgoing, sources, incoming)
    }

    fn is_output_node(&self) -> bool {
        self.rank == 0
    }
}
