//! Thin façade over intra-process (threads) or inter-process (MPI) collectives.
//!
//! Messages are *contiguous byte slices*. Every collective is blocking: all ranks
//! of the communicator must reach the call, ranks with nothing to contribute pass
//! an empty slice. There is no timeout; a rank that never arrives deadlocks the
//! others.

use parking_lot::{Condvar, Mutex};
use std::sync::Arc;

/// Blocking collective interface (minimal by design).
pub trait Communicator {
    /// Rank of the calling process.
    fn rank(&self) -> usize;
    /// Number of ranks.
    fn size(&self) -> usize;
    /// Fixed-size all-gather: every rank contributes `send.len()` bytes and
    /// `recv` receives `size() * send.len()` bytes ordered by rank.
    fn allgather(&self, send: &[u8], recv: &mut [u8]);
    /// Variable-size all-gather: rank `r` contributes `counts[r]` bytes, laid out
    /// contiguously in rank order in `recv`.
    fn allgatherv(&self, send: &[u8], counts: &[usize], recv: &mut [u8]);
}

/// Serial communicator: one rank, collectives are copies.
#[derive(Clone, Debug, Default)]
pub struct NoComm;

impl Communicator for NoComm {
    fn rank(&self) -> usize {
        0
    }
    fn size(&self) -> usize {
        1
    }
    fn allgather(&self, send: &[u8], recv: &mut [u8]) {
        recv[..send.len()].copy_from_slice(send);
    }
    fn allgatherv(&self, send: &[u8], _counts: &[usize], recv: &mut [u8]) {
        recv[..send.len()].copy_from_slice(send);
    }
}

// --- LocalComm: one rank per thread inside a single process ---

#[derive(Default)]
struct Rendezvous {
    generation: u64,
    arrived: usize,
    slots: Vec<Option<Vec<u8>>>,
    result: Arc<Vec<Vec<u8>>>,
}

struct LocalWorld {
    size: usize,
    state: Mutex<Rendezvous>,
    ready: Condvar,
}

impl LocalWorld {
    /// Deposit this rank's contribution and block until every rank has done so.
    fn exchange(&self, rank: usize, data: Vec<u8>) -> Arc<Vec<Vec<u8>>> {
        let mut st = self.state.lock();
        let generation = st.generation;
        st.slots[rank] = Some(data);
        st.arrived += 1;
        if st.arrived == self.size {
            let gathered: Vec<Vec<u8>> = st
                .slots
                .iter_mut()
                .map(|slot| slot.take().unwrap_or_default())
                .collect();
            st.result = Arc::new(gathered);
            st.arrived = 0;
            st.generation += 1;
            self.ready.notify_all();
            return st.result.clone();
        }
        while st.generation == generation {
            self.ready.wait(&mut st);
        }
        st.result.clone()
    }
}

/// In-process communicator: each rank lives on its own thread and collectives
/// rendezvous through shared state.
#[derive(Clone)]
pub struct LocalComm {
    rank: usize,
    world: Arc<LocalWorld>,
}

impl LocalComm {
    /// Create the `size` rank handles of a fresh world.
    pub fn world(size: usize) -> Vec<LocalComm> {
        let size = size.max(1);
        let world = Arc::new(LocalWorld {
            size,
            state: Mutex::new(Rendezvous {
                slots: vec![None; size],
                ..Default::default()
            }),
            ready: Condvar::new(),
        });
        (0..size)
            .map(|rank| LocalComm {
                rank,
                world: world.clone(),
            })
            .collect()
    }
}

impl std::fmt::Debug for LocalComm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalComm")
            .field("rank", &self.rank)
            .field("size", &self.world.size)
            .finish()
    }
}

impl Communicator for LocalComm {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.world.size
    }

    fn allgather(&self, send: &[u8], recv: &mut [u8]) {
        let all = self.world.exchange(self.rank, send.to_vec());
        let mut pos = 0;
        for chunk in all.iter() {
            recv[pos..pos + chunk.len()].copy_from_slice(chunk);
            pos += chunk.len();
        }
    }

    fn allgatherv(&self, send: &[u8], counts: &[usize], recv: &mut [u8]) {
        debug_assert_eq!(counts.get(self.rank).copied(), Some(send.len()));
        let all = self.world.exchange(self.rank, send.to_vec());
        let mut pos = 0;
        for (chunk, &count) in all.iter().zip(counts) {
            recv[pos..pos + count].copy_from_slice(&chunk[..count]);
            pos += count;
        }
    }
}

// --- MPI backend (feature = "mpi-support") ---
#[cfg(feature = "mpi-support")]
mod mpi_backend {
    use super::Communicator;
    use mpi::datatype::PartitionMut;
    use mpi::topology::SimpleCommunicator;
    use mpi::traits::{Communicator as _, CommunicatorCollectives};
    use mpi::Count;

    pub struct MpiComm {
        pub world: SimpleCommunicator,
        pub rank: usize,
        size: usize,
    }

    impl MpiComm {
        pub fn new(world: SimpleCommunicator) -> Self {
            let rank = world.rank() as usize;
            let size = world.size() as usize;
            Self { world, rank, size }
        }
    }

    impl Communicator for MpiComm {
        fn rank(&self) -> usize {
            self.rank
        }

        fn size(&self) -> usize {
            self.size
        }

        fn allgather(&self, send: &[u8], recv: &mut [u8]) {
            self.world.all_gather_into(send, recv);
        }

        fn allgatherv(&self, send: &[u8], counts: &[usize], recv: &mut [u8]) {
            let counts: Vec<Count> = counts.iter().map(|&c| c as Count).collect();
            let displs: Vec<Count> = counts
                .iter()
                .scan(0, |acc, &c| {
                    let start = *acc;
                    *acc += c;
                    Some(start)
                })
                .collect();
            let mut partition = PartitionMut::new(recv, &counts[..], &displs[..]);
            self.world.all_gather_varcount_into(send, &mut partition);
        }
    }
}

#[cfg(feature = "mpi-support")]
pub use mpi_backend::MpiComm;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serial_allgather_is_a_copy() {
        let comm = NoComm;
        let mut recv = [0u8; 3];
        comm.allgather(&[7, 8, 9], &mut recv);
        assert_eq!(recv, [7, 8, 9]);
    }

    #[test]
    fn local_allgatherv_orders_by_rank() {
        let comms = LocalComm::world(3);
        let counts = [2usize, 0, 1];
        let results: Vec<Vec<u8>> = std::thread::scope(|s| {
            let handles: Vec<_> = comms
                .iter()
                .map(|comm| {
                    s.spawn(move || {
                        let send: Vec<u8> = vec![comm.rank() as u8 + 10; counts[comm.rank()]];
                        let mut recv = vec![0u8; 3];
                        comm.allgatherv(&send, &counts, &mut recv);
                        recv
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });
        for recv in results {
            assert_eq!(recv, vec![10, 10, 12]);
        }
    }

    #[test]
    fn local_collectives_can_repeat() {
        let comms = LocalComm::world(2);
        std::thread::scope(|s| {
            for comm in &comms {
                s.spawn(move || {
                    for round in 0..50u8 {
                        let mut recv = [0u8; 2];
                        comm.allgather(&[round + comm.rank() as u8], &mut recv);
                        assert_eq!(recv, [round, round + 1]);
                    }
                });
            }
        });
    }
}
