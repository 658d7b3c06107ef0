//! Merging per-worker values into one value known to every worker.
//!
//! Each function here is a single collective call. Inputs must have the same
//! shape on every worker; nothing is broadcast. A shape that differs across
//! workers is reported by the communicator, not detected here.

use crate::comm::Communicator;
use crate::datatype::Element;
use crate::error::Result;
use crate::shard::Reduced;
use crate::ReduceOp;
use ndarray::{Array, Dimension};
use tracing::debug;

/// Combine one scalar per worker with `op`.
pub(crate) fn combine_scalar<C, T>(comm: &C, value: T, op: ReduceOp) -> Result<T>
where
    C: Communicator,
    T: Element,
{
    debug!(rank = comm.rank(), size = comm.size(), %op, "combining scalar");
    comm.allreduce_scalar(value, op)
}

/// Combine a scalar, vector or matrix element-wise across the group.
pub(crate) fn combine<C, T>(comm: &C, value: Reduced<T>, op: ReduceOp) -> Result<Reduced<T>>
where
    C: Communicator,
    T: Element,
{
    match value {
        Reduced::Scalar(x) => combine_scalar(comm, x, op).map(Reduced::Scalar),
        Reduced::Vector(v) => combine_array(comm, v, op).map(Reduced::Vector),
        Reduced::Matrix(m) => combine_array(comm, m, op).map(Reduced::Matrix),
    }
}

/// Element-wise sum across the group.
pub(crate) fn combine_sum<C, T>(comm: &C, value: Reduced<T>) -> Result<Reduced<T>>
where
    C: Communicator,
    T: Element,
{
    combine(comm, value, ReduceOp::Sum)
}

fn combine_array<C, T, D>(comm: &C, partial: Array<T, D>, op: ReduceOp) -> Result<Array<T, D>>
where
    C: Communicator,
    T: Element,
    D: Dimension,
{
    debug!(
        rank = comm.rank(),
        size = comm.size(),
        %op,
        shape = ?partial.shape(),
        "combining array"
    );
    let dim = partial.raw_dim();
    // Logical (row-major) order, whatever the memory layout of `partial`.
    let mut buffer: Vec<T> = partial.iter().copied().collect();
    comm.allreduce_inplace(&mut buffer, op)?;
    Ok(Array::from_shape_vec(dim, buffer)?)
}
