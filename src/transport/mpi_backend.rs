//! MPI backend (feature `mpi-support`).
//!
//! Sends are immediate (non-blocking) MPI sends of the whole pack; the handle
//! owns the pack until the request completes. Receives probe for the incoming
//! size and allocate exactly that much. MPI's default error handler
//! aborts the job on communication failures, so the only errors surfaced here
//! are usage errors such as an out-of-world peer.

use bytes::Bytes;
use mpi::environment::Universe;
use mpi::request::{Request, StaticScope};
use mpi::topology::SimpleCommunicator;
use mpi::traits::*;

use super::{CommTag, Transport, Wait, check_peer};
use crate::lumberjack_error::LumberjackError;

pub struct MpiComm {
    pub world: SimpleCommunicator,
    pub rank: usize,
    size: usize,
    // Dropped last; dropping the universe finalizes MPI.
    _universe: Option<Universe>,
}

// SAFETY: an `MpiComm` is owned by exactly one thread at a time; it is moved
// into the logging registry, never shared, and every MPI call for a rank goes
// through that single owner.
unsafe impl Send for MpiComm {}

impl MpiComm {
    /// Initialize MPI and wrap `MPI_COMM_WORLD`.
    pub fn new() -> Result<Self, LumberjackError> {
        let universe = mpi::initialize()
            .ok_or_else(|| LumberjackError::Substrate("MPI was already initialized".into()))?;
        let world = universe.world();
        let mut comm = Self::from_world(world);
        comm._universe = Some(universe);
        Ok(comm)
    }

    /// Wrap a communicator whose MPI environment the caller manages.
    pub fn from_world(world: SimpleCommunicator) -> Self {
        let rank = world.rank() as usize;
        let size = world.size() as usize;
        Self {
            world,
            rank,
            size,
            _universe: None,
        }
    }

    fn mpi_tag(tag: CommTag) -> i32 {
        i32::from(tag.as_u16())
    }
}

/// An in-flight send. Waiting (or dropping) completes the request before the
/// pack it reads from is released.
pub struct MpiSendHandle {
    request: Option<Request<'static, [u8], StaticScope>>,
    _buf: Bytes,
}

impl Wait for MpiSendHandle {
    fn wait(mut self) -> Result<(), LumberjackError> {
        if let Some(request) = self.request.take() {
            request.wait();
        }
        Ok(())
    }
}

impl Drop for MpiSendHandle {
    fn drop(&mut self) {
        if let Some(request) = self.request.take() {
            request.wait();
        }
    }
}

impl Transport for MpiComm {
    type SendHandle = MpiSendHandle;

    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.size
    }

    fn barrier(&self) -> Result<(), LumberjackError> {
        self.world.barrier();
        Ok(())
    }

    fn isend(
        &self,
        peer: usize,
        tag: CommTag,
        buf: Bytes,
    ) -> Result<MpiSendHandle, LumberjackError> {
        check_peer(peer, self.size)?;
        // SAFETY: `buf` is moved into the returned handle, which completes the
        // request in `wait` or `drop` before releasing it, so the slice
        // outlives every read MPI makes from it.
        let data: &'static [u8] = unsafe { std::slice::from_raw_parts(buf.as_ptr(), buf.len()) };
        let request = self
            .world
            .process_at_rank(peer as i32)
            .immediate_send_with_tag(StaticScope, data, Self::mpi_tag(tag));
        Ok(MpiSendHandle {
            request: Some(request),
            _buf: buf,
        })
    }

    fn recv(&self, peer: usize, tag: CommTag) -> Result<Bytes, LumberjackError> {
        check_peer(peer, self.size)?;
        let (data, _status) = self
            .world
            .process_at_rank(peer as i32)
            .receive_vec_with_tag::<u8>(Self::mpi_tag(tag));
        Ok(Bytes::from(data))
    }
}
