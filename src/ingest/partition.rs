//! Batch partitioning for the worker pool

use crate::models::BillReference;

/// Split the work list into one immutable batch per worker.
///
/// The first N-1 workers each receive `len / N` bills; the last
/// worker takes whatever remains. Ordering within a batch follows the
/// input order, which fixes the intra-worker processing order.
pub fn partition(bills: Vec<BillReference>, workers: usize) -> Vec<Vec<BillReference>> {
    let workers = workers.max(1);
    let chunk = bills.len() / workers;

    let mut batches: Vec<Vec<BillReference>> = Vec::with_capacity(workers);
    let mut rest = bills;
    for _ in 0..workers - 1 {
        let tail = rest.split_off(chunk.min(rest.len()));
        batches.push(std::mem::replace(&mut rest, tail));
    }
    batches.push(rest);
    batches
}
