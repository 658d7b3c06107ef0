//! Distributed products over a shared contraction axis.
//!
//! The contraction axis of a product is split across the group: the left
//! operand's last axis and the right operand's first axis. Each worker
//! multiplies its own slices, producing a partial result of the *full* output
//! shape that only accounts for its part of the contraction. One element-wise
//! sum across the group then completes the product on every worker, whatever
//! the length of the contraction axis.
//!
//! ```text
//!            worker 0      worker 1             A[:, k0] · B[k0, :]
//!   A  =  [ A[:, k0]  |  A[:, k1] ]     C  =       +
//!   B  =  [ B[k0, :]  ;  B[k1, :] ]             A[:, k1] · B[k1, :]
//! ```
//!
//! Transposed operands are passed as transposed views, e.g. `a.t()`.

use crate::combine::combine_sum;
use crate::comm::Communicator;
use crate::datatype::Element;
use crate::error::{Error, Result};
use crate::shard::{Reduced, Shard};
use ndarray::{Array1, Array2};
use tracing::debug;

/// Multiply this worker's shards without communicating.
///
/// Supported shape classes, with `k` the local contraction extent:
///
/// | `lhs`   | `rhs`   | result        |
/// |---------|---------|---------------|
/// | `[k]`   | `[k]`   | scalar        |
/// | `[m,k]` | `[k]`   | vector `[m]`  |
/// | `[k]`   | `[k,n]` | vector `[n]`  |
/// | `[m,k]` | `[k,n]` | matrix `[m,n]`|
///
/// A worker with `k == 0` contributes an all-zero partial result.
///
/// # Errors
///
/// [`Error::ShapeMismatch`] if the contraction extents differ and
/// [`Error::UnsupportedRank`] for scalars or operands of rank three or more.
pub(crate) fn local_product<T: Element>(lhs: Shard<'_, T>, rhs: Shard<'_, T>) -> Result<Reduced<T>> {
    match (lhs.normalize(), rhs.normalize()) {
        (Shard::Vector(a), Shard::Vector(b)) => {
            aligned(a.len(), b.len(), a.shape(), b.shape())?;
            Ok(Reduced::Scalar(a.dot(&b)))
        }
        (Shard::Matrix(a), Shard::Vector(b)) => {
            aligned(a.ncols(), b.len(), a.shape(), b.shape())?;
            if b.is_empty() {
                return Ok(Reduced::Vector(Array1::zeros(a.nrows())));
            }
            Ok(Reduced::Vector(a.dot(&b)))
        }
        (Shard::Vector(a), Shard::Matrix(b)) => {
            aligned(a.len(), b.nrows(), a.shape(), b.shape())?;
            if a.is_empty() {
                return Ok(Reduced::Vector(Array1::zeros(b.ncols())));
            }
            Ok(Reduced::Vector(a.dot(&b)))
        }
        (Shard::Matrix(a), Shard::Matrix(b)) => {
            aligned(a.ncols(), b.nrows(), a.shape(), b.shape())?;
            if a.ncols() == 0 {
                return Ok(Reduced::Matrix(Array2::zeros((a.nrows(), b.ncols()))));
            }
            Ok(Reduced::Matrix(a.dot(&b)))
        }
        (lhs, rhs) => {
            let rank = match lhs {
                Shard::Vector(_) | Shard::Matrix(_) => rhs.ndim(),
                _ => lhs.ndim(),
            };
            Err(Error::UnsupportedRank { op: "dot", rank })
        }
    }
}

/// Product of two distributed operands, replicated on every worker.
///
/// Validates and multiplies the local shards with [`local_product`], then
/// sums the partial results across the group. A shape error is raised before
/// any collective call, so it never leaves peers waiting.
pub(crate) fn distributed_dot<C, T>(comm: &C, lhs: Shard<'_, T>, rhs: Shard<'_, T>) -> Result<Reduced<T>>
where
    C: Communicator,
    T: Element,
{
    debug!(
        rank = comm.rank(),
        size = comm.size(),
        lhs = ?lhs.shape(),
        rhs = ?rhs.shape(),
        "distributed dot"
    );
    let partial = local_product(lhs, rhs)?;
    combine_sum(comm, partial)
}

fn aligned(lhs_k: usize, rhs_k: usize, lhs: &[usize], rhs: &[usize]) -> Result<()> {
    if lhs_k == rhs_k {
        Ok(())
    } else {
        Err(Error::shape_mismatch("dot", lhs, rhs))
    }
}
