//! Thin façade over intra-process (threads-as-ranks) or inter-process (MPI)
//! message passing.
//!
//! Messages are *contiguous byte slices* (no zero-copy guarantees).
//! All handles are **waitable** but non-blocking; the exchange code calls
//! `.wait()` before it trusts that a buffer is ready.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use bytes::Bytes;
use dashmap::DashMap;

/// Message tag for one communication epoch.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct CommTag(pub u16);

impl CommTag {
    pub const fn new(v: u16) -> Self {
        CommTag(v)
    }

    #[inline]
    pub const fn as_u16(self) -> u16 {
        self.0
    }

    /// Tag `k` slots after this one.
    #[inline]
    pub const fn offset(self, k: u16) -> Self {
        CommTag(self.0.wrapping_add(k))
    }
}

/// Tags used by the two phases of a field exchange.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ExchangeTags {
    /// Link-size handshake (done once, before stepping).
    pub sizes: CommTag,
    /// Stage values.
    pub data: CommTag,
}

impl ExchangeTags {
    pub const fn from_base(base: CommTag) -> Self {
        ExchangeTags {
            sizes: base,
            data: base.offset(1),
        }
    }
}

impl Default for ExchangeTags {
    fn default() -> Self {
        ExchangeTags::from_base(CommTag::new(0xD600))
    }
}

/// Non-blocking communication interface (minimal by design).
pub trait Communicator {
    /// Handle returned by `isend`.
    type SendHandle: Wait;
    /// Handle returned by `irecv`.
    type RecvHandle: Wait;

    /// This process's rank in the world.
    fn rank(&self) -> usize;
    /// Number of ranks in the world.
    fn size(&self) -> usize;

    fn isend(&self, peer: usize, tag: u16, buf: &[u8]) -> Self::SendHandle;
    /// Post a receive of (nominally) `len` bytes; the handle yields the whole
    /// message so callers can check its length.
    fn irecv(&self, peer: usize, tag: u16, len: usize) -> Self::RecvHandle;

    /// Block until every rank reached the barrier.
    fn barrier(&self) {}

    /// Tear the whole run down after a fatal error on this rank.
    fn abort(&self) {}
}

/// Anything that can be waited on.
pub trait Wait {
    /// Wait for completion and return the received data (if any).
    ///
    /// `None` on a receive means the message will never arrive.
    fn wait(self) -> Option<Vec<u8>>;
}

impl Wait for () {
    fn wait(self) -> Option<Vec<u8>> {
        None
    }
}

/// Compile-time no-op comm for pure serial runs.
#[derive(Clone, Debug, Default)]
pub struct NoComm;

impl Communicator for NoComm {
    type SendHandle = ();
    type RecvHandle = ();

    fn rank(&self) -> usize {
        0
    }
    fn size(&self) -> usize {
        1
    }
    fn isend(&self, _peer: usize, _tag: u16, _buf: &[u8]) {}
    fn irecv(&self, _peer: usize, _tag: u16, _len: usize) {}
}

// --- LocalComm: intra-process, one thread per rank ---
type Key = (usize, usize, u16); // (src, dst, tag)

#[derive(Debug, Default)]
struct Mailbox {
    slots: DashMap<Key, VecDeque<Bytes>>,
    aborted: AtomicBool,
    arrived: AtomicUsize,
    generation: AtomicUsize,
}

/// Threads-as-ranks communicator. All ranks of one world share a mailbox;
/// messages between the same `(src, dst, tag)` are delivered in FIFO order.
#[derive(Clone, Debug)]
pub struct LocalComm {
    rank: usize,
    size: usize,
    mailbox: Arc<Mailbox>,
}

impl LocalComm {
    /// Create the `size` communicators of a fresh world, indexed by rank.
    pub fn world(size: usize) -> Vec<LocalComm> {
        let mailbox = Arc::new(Mailbox::default());
        (0..size)
            .map(|rank| LocalComm {
                rank,
                size,
                mailbox: Arc::clone(&mailbox),
            })
            .collect()
    }

    /// True once any rank of this world aborted.
    pub fn is_aborted(&self) -> bool {
        self.mailbox.aborted.load(Ordering::Acquire)
    }
}

pub struct LocalHandle {
    key: Key,
    mailbox: Arc<Mailbox>,
}

impl Wait for LocalHandle {
    fn wait(self) -> Option<Vec<u8>> {
        loop {
            if let Some(mut queue) = self.mailbox.slots.get_mut(&self.key) {
                if let Some(bytes) = queue.pop_front() {
                    return Some(bytes.to_vec());
                }
            }
            if self.mailbox.aborted.load(Ordering::Acquire) {
                return None;
            }
            std::thread::yield_now();
        }
    }
}

impl Communicator for LocalComm {
    type SendHandle = ();
    type RecvHandle = LocalHandle;

    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.size
    }

    fn isend(&self, peer: usize, tag: u16, buf: &[u8]) -> Self::SendHandle {
        let key = (self.rank, peer, tag);
        self.mailbox
            .slots
            .entry(key)
            .or_default()
            .push_back(Bytes::copy_from_slice(buf));
    }

    fn irecv(&self, peer: usize, tag: u16, _len: usize) -> Self::RecvHandle {
        LocalHandle {
            key: (peer, self.rank, tag),
            mailbox: Arc::clone(&self.mailbox),
        }
    }

    fn barrier(&self) {
        let mb = &self.mailbox;
        let generation = mb.generation.load(Ordering::Acquire);
        if mb.arrived.fetch_add(1, Ordering::AcqRel) + 1 == self.size {
            mb.arrived.store(0, Ordering::Release);
            mb.generation.fetch_add(1, Ordering::AcqRel);
        } else {
            while mb.generation.load(Ordering::Acquire) == generation
                && !mb.aborted.load(Ordering::Acquire)
            {
                std::thread::yield_now();
            }
        }
    }

    fn abort(&self) {
        log::warn!("rank {} aborting local world", self.rank);
        self.mailbox.aborted.store(true, Ordering::Release);
    }
}

// --- MPI backend (feature = "mpi-support") ---
#[cfg(feature = "mpi-support")]
mod mpi_backend {
    use super::*;
    use mpi::environment::Universe;
    use mpi::request::StaticScope;
    use mpi::topology::SimpleCommunicator;
    use mpi::traits::*;

    /// MPI world communicator. Dropping it finalizes MPI.
    pub struct MpiComm {
        world: SimpleCommunicator,
        rank: usize,
        size: usize,
        _universe: Universe,
    }

    impl MpiComm {
        /// Initialise MPI; `None` if it was already initialised.
        pub fn new() -> Option<Self> {
            let universe = mpi::initialize()?;
            let world = universe.world();
            let rank = world.rank() as usize;
            let size = world.size() as usize;
            Some(Self {
                world,
                rank,
                size,
                _universe: universe,
            })
        }
    }

    /// Pending MPI request plus the leaked buffer it reads from or writes to.
    ///
    /// The buffer is reclaimed once the request completed, either in `wait`
    /// or on drop.
    pub struct MpiHandle {
        finish: Option<Box<dyn FnOnce()>>,
        buf: *mut [u8],
        receive: bool,
    }

    impl MpiHandle {
        fn complete(&mut self) -> Option<Vec<u8>> {
            let finish = self.finish.take()?;
            finish();
            // SAFETY: `buf` came from `Box::leak` in isend/irecv and the
            // request using it has completed.
            let owned = unsafe { Box::from_raw(self.buf) };
            self.receive.then(|| owned.into_vec())
        }
    }

    impl Wait for MpiHandle {
        fn wait(mut self) -> Option<Vec<u8>> {
            self.complete()
        }
    }

    impl Drop for MpiHandle {
        fn drop(&mut self) {
            let _ = self.complete();
        }
    }

    impl Communicator for MpiComm {
        type SendHandle = MpiHandle;
        type RecvHandle = MpiHandle;

        fn rank(&self) -> usize {
            self.rank
        }

        fn size(&self) -> usize {
            self.size
        }

        fn isend(&self, peer: usize, tag: u16, buf: &[u8]) -> MpiHandle {
            let data: &'static mut [u8] = Box::leak(buf.to_vec().into_boxed_slice());
            let raw = data as *mut [u8];
            let req = self.world.process_at_rank(peer as i32).immediate_send_with_tag(
                StaticScope,
                &*data,
                i32::from(tag),
            );
            MpiHandle {
                finish: Some(Box::new(move || {
                    req.wait();
                })),
                buf: raw,
                receive: false,
            }
        }

        fn irecv(&self, peer: usize, tag: u16, len: usize) -> MpiHandle {
            let data: &'static mut [u8] = Box::leak(vec![0u8; len].into_boxed_slice());
            let raw = data as *mut [u8];
            let req = self
                .world
                .process_at_rank(peer as i32)
                .immediate_receive_into_with_tag(StaticScope, data, i32::from(tag));
            MpiHandle {
                finish: Some(Box::new(move || {
                    req.wait();
                })),
                buf: raw,
                receive: true,
            }
        }

        fn barrier(&self) {
            self.world.barrier();
        }

        fn abort(&self) {
            log::error!("rank {} aborting MPI world", self.rank);
            self.world.abort(1)
        }
    }
}

#[cfg(feature = "mpi-support")]
pub use mpi_backend::{MpiComm, MpiHandle};
