//! Typed collectives on top of the byte-level [`Communicator`].
//!
//! Values travel as their in-memory representation through `bytemuck`; all ranks
//! are assumed to share endianness. Counts are exchanged as `u64`.

use crate::algs::communicator::Communicator;
use crate::coupling_error::CouplingError;
use bytemuck::Pod;

pub fn cast_slice<T: Pod>(v: &[T]) -> &[u8] {
    bytemuck::cast_slice(v)
}

pub fn cast_slice_mut<T: Pod>(v: &mut [T]) -> &mut [u8] {
    bytemuck::cast_slice_mut(v)
}

/// Gather one count from every rank; entry `r` is rank `r`'s value.
pub fn allgather_count<C: Communicator + ?Sized>(comm: &C, local: usize) -> Vec<usize> {
    let n_ranks = comm.size().max(1);
    let send = [local as u64];
    let mut recv = vec![0u64; n_ranks];
    comm.allgather(cast_slice(&send), cast_slice_mut(&mut recv));
    recv.into_iter().map(|c| c as usize).collect()
}

/// Variable-length all-gather of `Pod` values.
///
/// `counts[r]` is the number of values contributed by rank `r`; the result holds
/// every rank's block in rank order. The local contribution must match
/// `counts[comm.rank()]`.
pub fn allgatherv_values<T, C>(
    comm: &C,
    local: &[T],
    counts: &[usize],
) -> Result<Vec<T>, CouplingError>
where
    T: Pod + Default,
    C: Communicator + ?Sized,
{
    let expected = counts.get(comm.rank()).copied().unwrap_or(0);
    if local.len() != expected {
        return Err(CouplingError::BufferLength {
            expected,
            found: local.len(),
        });
    }
    let total: usize = counts.iter().sum();
    let mut out = vec![T::default(); total];
    let width = std::mem::size_of::<T>();
    let byte_counts: Vec<usize> = counts.iter().map(|&c| c * width).collect();
    comm.allgatherv(cast_slice(local), &byte_counts, cast_slice_mut(&mut out));
    Ok(out)
}

/// Sum an `f64` over all ranks.
pub fn allreduce_sum<C: Communicator + ?Sized>(comm: &C, local: f64) -> f64 {
    let n_ranks = comm.size().max(1);
    let send = [local];
    let mut recv = vec![0f64; n_ranks];
    comm.allgather(cast_slice(&send), cast_slice_mut(&mut recv));
    recv.iter().sum()
}

/// Exclusive prefix sums of `counts`: the offset where each rank's block begins.
pub fn displacements(counts: &[usize]) -> Vec<usize> {
    let mut acc = 0;
    counts
        .iter()
        .map(|&c| {
            let start = acc;
            acc += c;
            start
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algs::communicator::{LocalComm, NoComm};

    #[test]
    fn displacements_are_exclusive_prefix_sums() {
        assert_eq!(displacements(&[3, 0, 2, 5]), vec![0, 3, 3, 5]);
        assert!(displacements(&[]).is_empty());
    }

    #[test]
    fn serial_gatherv_rejects_wrong_length() {
        let err = allgatherv_values(&NoComm, &[1.0f64, 2.0], &[3]).unwrap_err();
        assert_eq!(
            err,
            CouplingError::BufferLength {
                expected: 3,
                found: 2
            }
        );
    }

    #[test]
    fn typed_gather_across_threads() {
        let comms = LocalComm::world(3);
        let out: Vec<Vec<f64>> = std::thread::scope(|s| {
            let handles: Vec<_> = comms
                .iter()
                .map(|comm| {
                    s.spawn(move || {
                        let local: Vec<f64> = (0..comm.rank()).map(|i| i as f64).collect();
                        let counts = allgather_count(comm, local.len());
                        allgatherv_values(comm, &local, &counts).unwrap()
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });
        for gathered in out {
            assert_eq!(gathered, vec![0.0, 0.0, 1.0]);
        }
    }
}
