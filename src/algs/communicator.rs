//! Thin façade over the collective operations the coarsening pipeline needs.
//!
//! The core never posts point-to-point messages: all cross-rank coordination
//! goes through all-reduce (termination checks, tie-breaking), an exclusive
//! prefix sum (global numbering), a barrier, and an all-gather byte exchange
//! (owner/ghost reconciliation keyed by global id). Keeping the trait this
//! small makes it object-safe, so a mesh can hold an `Arc<dyn Communicator>`
//! and the algorithm code stays identical across backends.
//!
//! Three backends are provided:
//! - [`NoComm`]: compile-time no-op for single-rank runs and unit tests;
//! - [`ThreadComm`]: in-process ranks over shared state, used by the
//!   multi-rank integration tests;
//! - `MpiComm` (feature `mpi-support`): one process per rank over MPI.

use std::sync::Arc;

use parking_lot::{Condvar, Mutex};

/// Collective communication across ranks (object-safe, minimal by design).
///
/// Every method is a collective: all ranks of the communicator must call it
/// the same number of times in the same order.
pub trait Communicator: Send + Sync {
    /// This rank's index in `0..size()`.
    fn rank(&self) -> usize;
    /// Number of ranks.
    fn size(&self) -> usize;
    /// Logical AND across ranks.
    fn allreduce_and(&self, value: bool) -> bool;
    /// Minimum across ranks.
    fn allreduce_min_i64(&self, value: i64) -> i64;
    /// Maximum across ranks.
    fn allreduce_max_i64(&self, value: i64) -> i64;
    /// Sum across ranks.
    fn allreduce_sum_u64(&self, value: u64) -> u64;
    /// Exclusive prefix sum: the sum of `value` over all lower ranks
    /// (zero on rank 0).
    fn exscan_sum_u64(&self, value: u64) -> u64;
    /// Gather every rank's byte payload; the result is indexed by rank and
    /// identical on all ranks. Payload sizes may differ per rank.
    fn allgather_bytes(&self, bytes: &[u8]) -> Vec<Vec<u8>>;
    /// Block until every rank has arrived.
    fn barrier(&self);
}

/// Compile-time no-op communicator for single-rank runs.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoComm;

impl Communicator for NoComm {
    fn rank(&self) -> usize {
        0
    }
    fn size(&self) -> usize {
        1
    }
    fn allreduce_and(&self, value: bool) -> bool {
        value
    }
    fn allreduce_min_i64(&self, value: i64) -> i64 {
        value
    }
    fn allreduce_max_i64(&self, value: i64) -> i64 {
        value
    }
    fn allreduce_sum_u64(&self, value: u64) -> u64 {
        value
    }
    fn exscan_sum_u64(&self, _value: u64) -> u64 {
        0
    }
    fn allgather_bytes(&self, bytes: &[u8]) -> Vec<Vec<u8>> {
        vec![bytes.to_vec()]
    }
    fn barrier(&self) {}
}

// --- ThreadComm: intra-process ranks over a shared rendezvous ---

struct Rendezvous {
    slots: Vec<Option<Vec<u8>>>,
    arrived: usize,
    departed: usize,
    results: Option<Arc<Vec<Vec<u8>>>>,
}

struct Shared {
    size: usize,
    inner: Mutex<Rendezvous>,
    cvar: Condvar,
}

/// In-process communicator: each "rank" is a thread sharing one rendezvous.
///
/// Collectives are built on a single all-gather over the shared state, so all
/// reductions are deterministic regardless of thread scheduling.
#[derive(Clone)]
pub struct ThreadComm {
    rank: usize,
    shared: Arc<Shared>,
}

impl ThreadComm {
    /// Create `size` linked communicators, one per rank.
    pub fn create(size: usize) -> Vec<Self> {
        assert!(size > 0, "a communicator needs at least one rank");
        let shared = Arc::new(Shared {
            size,
            inner: Mutex::new(Rendezvous {
                slots: vec![None; size],
                arrived: 0,
                departed: 0,
                results: None,
            }),
            cvar: Condvar::new(),
        });
        (0..size)
            .map(|rank| ThreadComm {
                rank,
                shared: shared.clone(),
            })
            .collect()
    }

    fn gather(&self, mine: &[u8]) -> Arc<Vec<Vec<u8>>> {
        let s = &*self.shared;
        let mut g = s.inner.lock();
        // A rank racing into the next collective waits for the previous
        // round to drain completely.
        while g.results.is_some() {
            s.cvar.wait(&mut g);
        }
        g.slots[self.rank] = Some(mine.to_vec());
        g.arrived += 1;
        if g.arrived == s.size {
            let all: Vec<Vec<u8>> = g.slots.iter_mut().map(|s| s.take().unwrap_or_default()).collect();
            g.results = Some(Arc::new(all));
            s.cvar.notify_all();
        } else {
            while g.results.is_none() {
                s.cvar.wait(&mut g);
            }
        }
        let results = g.results.clone().unwrap_or_default();
        g.departed += 1;
        if g.departed == s.size {
            g.results = None;
            g.arrived = 0;
            g.departed = 0;
            s.cvar.notify_all();
        }
        results
    }

    fn gather_u64(&self, value: u64) -> Vec<u64> {
        self.gather(&value.to_le_bytes())
            .iter()
            .map(|b| {
                let mut word = [0u8; 8];
                word.copy_from_slice(&b[..8]);
                u64::from_le_bytes(word)
            })
            .collect()
    }
}

impl Communicator for ThreadComm {
    fn rank(&self) -> usize {
        self.rank
    }
    fn size(&self) -> usize {
        self.shared.size
    }
    fn allreduce_and(&self, value: bool) -> bool {
        self.gather_u64(value as u64).iter().all(|&v| v != 0)
    }
    fn allreduce_min_i64(&self, value: i64) -> i64 {
        self.gather_u64(value as u64)
            .iter()
            .map(|&v| v as i64)
            .min()
            .unwrap_or(value)
    }
    fn allreduce_max_i64(&self, value: i64) -> i64 {
        self.gather_u64(value as u64)
            .iter()
            .map(|&v| v as i64)
            .max()
            .unwrap_or(value)
    }
    fn allreduce_sum_u64(&self, value: u64) -> u64 {
        self.gather_u64(value).iter().sum()
    }
    fn exscan_sum_u64(&self, value: u64) -> u64 {
        self.gather_u64(value)[..self.rank].iter().sum()
    }
    fn allgather_bytes(&self, bytes: &[u8]) -> Vec<Vec<u8>> {
        (*self.gather(bytes)).clone()
    }
    fn barrier(&self) {
        let _ = self.gather(&[]);
    }
}

// --- MPI backend (feature = "mpi-support") ---
#[cfg(feature = "mpi-support")]
mod mpi_backend {
    use super::Communicator;
    use mpi::collective::SystemOperation;
    use mpi::topology::SimpleCommunicator;
    use mpi::traits::*;

    /// One process per rank over the MPI world communicator.
    pub struct MpiComm {
        world: SimpleCommunicator,
        _universe: Option<mpi::environment::Universe>,
    }

    impl MpiComm {
        /// Initialize MPI (when not already initialized) and wrap the world.
        pub fn world() -> Self {
            let universe = mpi::initialize();
            let world = match &universe {
                Some(u) => u.world(),
                None => SimpleCommunicator::world(),
            };
            Self {
                world,
                _universe: universe,
            }
        }
    }

    impl Communicator for MpiComm {
        fn rank(&self) -> usize {
            self.world.rank() as usize
        }
        fn size(&self) -> usize {
            self.world.size() as usize
        }
        fn allreduce_and(&self, value: bool) -> bool {
            let mut out = 0i32;
            self.world
                .all_reduce_into(&(value as i32), &mut out, SystemOperation::logical_and());
            out != 0
        }
        fn allreduce_min_i64(&self, value: i64) -> i64 {
            let mut out = 0i64;
            self.world
                .all_reduce_into(&value, &mut out, SystemOperation::min());
            out
        }
        fn allreduce_max_i64(&self, value: i64) -> i64 {
            let mut out = 0i64;
            self.world
                .all_reduce_into(&value, &mut out, SystemOperation::max());
            out
        }
        fn allreduce_sum_u64(&self, value: u64) -> u64 {
            let mut out = 0u64;
            self.world
                .all_reduce_into(&value, &mut out, SystemOperation::sum());
            out
        }
        fn exscan_sum_u64(&self, value: u64) -> u64 {
            let mut out = 0u64;
            self.world
                .exclusive_scan_into(&value, &mut out, SystemOperation::sum());
            out
        }
        fn allgather_bytes(&self, bytes: &[u8]) -> Vec<Vec<u8>> {
            let size = self.size();
            let mut counts = vec![0i32; size];
            self.world.all_gather_into(&(bytes.len() as i32), &mut counts[..]);
            let displs: Vec<i32> = counts
                .iter()
                .scan(0i32, |acc, &c| {
                    let d = *acc;
                    *acc += c;
                    Some(d)
                })
                .collect();
            let total: i32 = counts.iter().sum();
            let mut flat = vec![0u8; total as usize];
            {
                let mut partition =
                    mpi::datatype::PartitionMut::new(&mut flat[..], &counts[..], &displs[..]);
                self.world.all_gather_varcount_into(bytes, &mut partition);
            }
            counts
                .iter()
                .zip(&displs)
                .map(|(&c, &d)| flat[d as usize..(d + c) as usize].to_vec())
                .collect()
        }
        fn barrier(&self) {
            self.world.barrier();
        }
    }
}

#[cfg(feature = "mpi-support")]
pub use mpi_backend::MpiComm;
