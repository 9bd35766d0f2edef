//! In-process substrate: every simulated rank is a thread sharing one mailbox.
//!
//! `LocalComm::run(n, f)` is the usual entry point: it spawns `n` threads, hands
//! each its own `LocalComm`, and collects the results in rank order. If any
//! rank panics the world is marked aborted, so peers blocked in `recv` or
//! `barrier` fail instead of waiting forever, and the first panic is re-raised.

use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use bytes::Bytes;
use dashmap::DashMap;
use parking_lot::{Condvar, Mutex};

use super::{CommTag, Transport, check_peer};
use crate::lumberjack_error::LumberjackError;

type Key = (usize, usize, u16); // (src, dst, tag)

const POLL: Duration = Duration::from_millis(20);

struct BarrierState {
    arrived: usize,
    generation: u64,
}

struct Universe {
    size: usize,
    mailbox: DashMap<Key, VecDeque<Bytes>>,
    barrier: Mutex<BarrierState>,
    released: Condvar,
    aborted: AtomicBool,
}

impl Universe {
    fn abort(&self) {
        self.aborted.store(true, Ordering::SeqCst);
        self.released.notify_all();
    }

    fn check_alive(&self) -> Result<(), LumberjackError> {
        if self.aborted.load(Ordering::SeqCst) {
            Err(LumberjackError::Substrate(
                "local world aborted by a panicking rank".into(),
            ))
        } else {
            Ok(())
        }
    }
}

/// One rank of an in-process world.
#[derive(Clone)]
pub struct LocalComm {
    rank: usize,
    universe: Arc<Universe>,
}

impl std::fmt::Debug for LocalComm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalComm")
            .field("rank", &self.rank)
            .field("size", &self.universe.size)
            .finish()
    }
}

impl LocalComm {
    /// Build the communicators of a world with `size` ranks.
    ///
    /// # Panics
    /// Panics if `size == 0`.
    pub fn world(size: usize) -> Vec<LocalComm> {
        assert!(size > 0, "a local world needs at least one rank");
        let universe = Arc::new(Universe {
            size,
            mailbox: DashMap::new(),
            barrier: Mutex::new(BarrierState {
                arrived: 0,
                generation: 0,
            }),
            released: Condvar::new(),
            aborted: AtomicBool::new(false),
        });
        (0..size)
            .map(|rank| LocalComm {
                rank,
                universe: Arc::clone(&universe),
            })
            .collect()
    }

    /// Run `f` once per rank on its own thread; results come back in rank
    /// order.
    ///
    /// # Panics
    /// Panics if `size == 0`, and re-raises the first panic of any rank.
    pub fn run<R, F>(size: usize, f: F) -> Vec<R>
    where
        R: Send,
        F: Fn(LocalComm) -> R + Sync,
    {
        let comms = Self::world(size);
        let universe = Arc::clone(&comms[0].universe);
        let outcomes = std::thread::scope(|scope| {
            let handles: Vec<_> = comms
                .into_iter()
                .map(|comm| {
                    let f = &f;
                    let universe = &universe;
                    scope.spawn(move || {
                        let out = panic::catch_unwind(AssertUnwindSafe(|| f(comm)));
                        if out.is_err() {
                            universe.abort();
                        }
                        out
                    })
                })
                .collect();
            handles
                .into_iter()
                .map(|h| h.join().unwrap_or_else(Err))
                .collect::<Vec<_>>()
        });
        outcomes
            .into_iter()
            .map(|out| out.unwrap_or_else(|payload| panic::resume_unwind(payload)))
            .collect()
    }
}

impl Transport for LocalComm {
    type SendHandle = ();

    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.universe.size
    }

    fn barrier(&self) -> Result<(), LumberjackError> {
        let u = &self.universe;
        let mut state = u.barrier.lock();
        u.check_alive()?;
        let generation = state.generation;
        state.arrived += 1;
        if state.arrived == u.size {
            state.arrived = 0;
            state.generation = state.generation.wrapping_add(1);
            u.released.notify_all();
            return Ok(());
        }
        while state.generation == generation {
            u.released.wait_for(&mut state, POLL);
            u.check_alive()?;
        }
        Ok(())
    }

    fn isend(&self, peer: usize, tag: CommTag, buf: Bytes) -> Result<(), LumberjackError> {
        check_peer(peer, self.universe.size)?;
        self.universe.check_alive()?;
        let key = (self.rank, peer, tag.as_u16());
        self.universe.mailbox.entry(key).or_default().push_back(buf);
        Ok(())
    }

    fn recv(&self, peer: usize, tag: CommTag) -> Result<Bytes, LumberjackError> {
        check_peer(peer, self.universe.size)?;
        let key = (peer, self.rank, tag.as_u16());
        loop {
            if let Some(mut queue) = self.universe.mailbox.get_mut(&key) {
                if let Some(bytes) = queue.pop_front() {
                    return Ok(bytes);
                }
            }
            self.universe.check_alive()?;
            std::thread::yield_now();
        }
    }
}
