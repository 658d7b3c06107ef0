//! The per-worker entry point.

use crate::combine::combine_scalar;
use crate::comm::Communicator;
use crate::datatype::Element;
use crate::error::Result;
use crate::local::local_reduce;
use crate::product::distributed_dot;
use crate::shard::{Reduced, Shard};
use crate::ReduceOp;
use tracing::debug;

/// Distributed `sum`, `max`, `min` and `dot` for one worker of a group.
///
/// Each worker builds one of these around its communicator and passes its
/// local shards; every worker receives the same, fully combined result. The
/// handle is immutable, so several groups can be served side by side in one
/// process.
///
/// # Lockstep
///
/// Every method is a collective call. All workers must call the same methods
/// in the same order, or the communicator blocks (or, for backends that can
/// detect it, fails). Failures of the communicator are returned unchanged and
/// never retried: once some workers have moved past a collective it cannot be
/// repeated safely.
///
/// # Example
///
/// ```
/// use ndarray::{array, s};
/// use parallel_ndarray::{Communicator, ParallelLinalg, ThreadGroup};
///
/// let global = array![[-1.0, 1.0, 5.0, 4.0], [4.0, 5.0, 4.0, 5.0], [7.0, 0.0, 1.0, 0.0]];
///
/// let group = ThreadGroup::new(2).unwrap();
/// let maxima = group
///     .run(|comm| {
///         let rows = if comm.rank() == 0 { s![0..2, ..] } else { s![2.., ..] };
///         ParallelLinalg::new(&comm).max(global.slice(rows))
///     })
///     .unwrap();
/// assert!(maxima.iter().all(|m| *m == Ok(7.0)));
/// ```
#[derive(Debug, Clone, Copy)]
pub struct ParallelLinalg<'c, C> {
    comm: &'c C,
}

impl<'c, C: Communicator> ParallelLinalg<'c, C> {
    /// Bind the operations to a worker group.
    pub fn new(comm: &'c C) -> Self {
        ParallelLinalg { comm }
    }

    /// Sum of every element of the global array.
    ///
    /// Empty shards contribute `0`; if every shard is empty the result is `0`.
    pub fn sum<'a, T: Element>(&self, shard: impl Into<Shard<'a, T>>) -> Result<T> {
        self.reduce(shard.into(), ReduceOp::Sum)
    }

    /// Largest element of the global array.
    ///
    /// Empty shards contribute `-inf`; if every shard is empty the result is
    /// `-inf`.
    pub fn max<'a, T: Element>(&self, shard: impl Into<Shard<'a, T>>) -> Result<T> {
        self.reduce(shard.into(), ReduceOp::Max)
    }

    /// Smallest element of the global array.
    ///
    /// Empty shards contribute `+inf`; if every shard is empty the result is
    /// `+inf`.
    pub fn min<'a, T: Element>(&self, shard: impl Into<Shard<'a, T>>) -> Result<T> {
        self.reduce(shard.into(), ReduceOp::Min)
    }

    /// Product of two operands distributed along their contraction axis.
    ///
    /// `lhs` is split along its last axis and `rhs` along its first, with the
    /// same local extent on each worker:
    ///
    /// | `lhs`   | `rhs`   | result        |
    /// |---------|---------|---------------|
    /// | `[k]`   | `[k]`   | scalar        |
    /// | `[m,k]` | `[k]`   | vector `[m]`  |
    /// | `[k]`   | `[k,n]` | vector `[n]`  |
    /// | `[m,k]` | `[k,n]` | matrix `[m,n]`|
    ///
    /// # Errors
    ///
    /// [`Error::ShapeMismatch`](crate::Error::ShapeMismatch) if the local
    /// contraction extents differ and
    /// [`Error::UnsupportedRank`](crate::Error::UnsupportedRank) for scalars
    /// or operands of rank three or more, both detected before any
    /// communication.
    pub fn dot<'a, 'b, T: Element>(
        &self,
        lhs: impl Into<Shard<'a, T>>,
        rhs: impl Into<Shard<'b, T>>,
    ) -> Result<Reduced<T>> {
        distributed_dot(self.comm, lhs.into(), rhs.into())
    }

    fn reduce<T: Element>(&self, shard: Shard<'_, T>, op: ReduceOp) -> Result<T> {
        let local = local_reduce(&shard, op);
        debug!(
            rank = self.comm.rank(),
            %op,
            elements = shard.len(),
            local = %local,
            "local reduction"
        );
        combine_scalar(self.comm, local, op)
    }
}
