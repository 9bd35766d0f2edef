//! Thin façade over the message-passing substrate lumberjack runs on.
//!
//! Messages are *contiguous byte buffers* (no zero-copy guarantees). Sends
//! return a waitable handle; receives block until the peer's buffer arrived.
//! Three backends are provided:
//!
//! - [`NoComm`]: a world of one rank, for serial programs and unit tests.
//! - [`LocalComm`]: several simulated ranks inside one process, one thread
//!   each.
//! - `MpiComm` (feature `mpi-support`): real MPI via the `mpi` crate.

use bytes::Bytes;

use crate::lumberjack_error::LumberjackError;

pub mod local;
#[cfg(feature = "mpi-support")]
pub mod mpi_backend;

pub use local::LocalComm;
#[cfg(feature = "mpi-support")]
pub use mpi_backend::{MpiComm, MpiSendHandle};

/// Typed message tag so independent protocols never match each other's
/// receives.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct CommTag(u16);

impl CommTag {
    /// Packs moving up a communicator overlay.
    pub const LUMBERJACK_PUSH: CommTag = CommTag(0x4C4A);
    /// Ordering token passed between ranks by `SynchronizedStream`.
    pub const SYNC_TOKEN: CommTag = CommTag(0x5354);

    pub const fn new(raw: u16) -> Self {
        CommTag(raw)
    }

    #[inline]
    pub const fn as_u16(self) -> u16 {
        self.0
    }
}

/// Anything that can be waited on.
pub trait Wait {
    /// Block until the operation completed.
    fn wait(self) -> Result<(), LumberjackError>;
}

impl Wait for () {
    fn wait(self) -> Result<(), LumberjackError> {
        Ok(())
    }
}

/// Point-to-point message passing plus a barrier.
pub trait Transport: Send + 'static {
    /// Handle returned by `isend`.
    type SendHandle: Wait;

    /// This process's rank in `0..size()`.
    fn rank(&self) -> usize;
    /// Number of ranks in the world.
    fn size(&self) -> usize;
    /// Block until every rank reached the barrier.
    fn barrier(&self) -> Result<(), LumberjackError>;
    /// Start sending `buf` to `peer`.
    fn isend(&self, peer: usize, tag: CommTag, buf: Bytes)
    -> Result<Self::SendHandle, LumberjackError>;
    /// Block until a buffer from `peer` with `tag` arrives.
    fn recv(&self, peer: usize, tag: CommTag) -> Result<Bytes, LumberjackError>;
}

/// Reject peers outside `0..size`.
pub(crate) fn check_peer(peer: usize, size: usize) -> Result<(), LumberjackError> {
    if peer < size {
        Ok(())
    } else {
        Err(LumberjackError::InvalidWorld { rank: peer, size })
    }
}

/// Compile-time single-rank world for serial programs and unit tests.
#[derive(Clone, Debug, Default)]
pub struct NoComm;

impl Transport for NoComm {
    type SendHandle = ();

    fn rank(&self) -> usize {
        0
    }
    fn size(&self) -> usize {
        1
    }
    fn barrier(&self) -> Result<(), LumberjackError> {
        Ok(())
    }
    fn isend(&self, peer: usize, _tag: CommTag, _buf: Bytes) -> Result<(), LumberjackError> {
        // A world of one has nobody to talk to.
        Err(LumberjackError::InvalidWorld { rank: peer, size: 1 })
    }
    fn recv(&self, peer: usize, _tag: CommTag) -> Result<Bytes, LumberjackError> {
        Err(LumberjackError::InvalidWorld { rank: peer, size: 1 })
    }
}
