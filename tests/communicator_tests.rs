mod util;
use util::*;

use sem_coupling::algs::communicator::{Communicator, NoComm};
use sem_coupling::algs::wire::{allgather_count, allgatherv_values, allreduce_sum};

#[test]
fn serial_collectives_are_identity() {
    assert_eq!(NoComm.rank(), 0);
    assert_eq!(NoComm.size(), 1);
    assert_eq!(allgather_count(&NoComm, 7), vec![7]);
    assert_eq!(allreduce_sum(&NoComm, 2.5), 2.5);
    assert_eq!(allgatherv_values(&NoComm, &[1u64, 2], &[2]).unwrap(), vec![1, 2]);
}

#[test]
fn counts_and_sums_over_four_ranks() {
    let out = run_ranks(4, |comm| {
        let counts = allgather_count(comm, 2 * comm.rank());
        let sum = allreduce_sum(comm, comm.rank() as f64 + 0.5);
        (counts, sum)
    });
    for (counts, sum) in out {
        assert_eq!(counts, vec![0, 2, 4, 6]);
        assert_eq!(sum, 8.0);
    }
}

#[test]
fn variable_gather_skips_empty_ranks() {
    let out = run_ranks(3, |comm| {
        let local: Vec<i32> = match comm.rank() {
            0 => vec![10, 11],
            1 => vec![],
            _ => vec![30],
        };
        let counts = allgather_count(comm, local.len());
        allgatherv_values(comm, &local, &counts).unwrap()
    });
    for gathered in out {
        assert_eq!(gathered, vec![10, 11, 30]);
    }
}

#[test]
fn back_to_back_collectives_stay_in_step() {
    let out = run_ranks(2, |comm| {
        (0..20)
            .map(|round| allreduce_sum(comm, (round * (comm.rank() + 1)) as f64))
            .collect::<Vec<_>>()
    });
    let want: Vec<f64> = (0..20).map(|round| (3 * round) as f64).collect();
    assert_eq!(out[0], want);
    assert_eq!(out[1], want);
}
