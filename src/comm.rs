//! The collective-communication seam.

use crate::datatype::Element;
use crate::error::{Error, Result};
use crate::ReduceOp;

/// A handle to a fixed group of cooperating workers.
///
/// This is the only channel through which the reduction and product engine
/// talks to other workers. Implementations own the group: its size and the
/// caller's rank are fixed when the handle is created and never change.
///
/// Every reduction method is a **collective call**. All workers of the group
/// must call the same method, in the same order, with buffers of the same
/// length. Failures reported by the implementation are propagated unchanged
/// by the rest of the crate; nothing is retried.
///
/// # Example
///
/// ```no_run
/// use parallel_ndarray::{Communicator, ReduceOp, ThreadGroup};
///
/// let group = ThreadGroup::new(4).unwrap();
/// let sums = group
///     .run(|comm| comm.allreduce_scalar(comm.rank() as f64, ReduceOp::Sum))
///     .unwrap();
/// assert!(sums.iter().all(|s| *s == Ok(6.0)));
/// ```
pub trait Communicator {
    /// Get the rank of the calling worker, in `0..size()`.
    fn rank(&self) -> usize;

    /// Get the number of workers in the group.
    fn size(&self) -> usize;

    /// All-reduce `send` element-wise across the group into `recv`.
    ///
    /// On return `recv` holds the same values on every worker.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidBuffer`] if `send` and `recv` differ in length,
    /// otherwise whatever the backend reports.
    fn allreduce<T: Element>(&self, send: &[T], recv: &mut [T], op: ReduceOp) -> Result<()>;

    /// All-reduce values in place.
    fn allreduce_inplace<T: Element>(&self, data: &mut [T], op: ReduceOp) -> Result<()> {
        let send = data.to_vec();
        self.allreduce(&send, data, op)
    }

    /// All-reduce a single value.
    ///
    /// Convenience method for reducing a single scalar.
    fn allreduce_scalar<T: Element>(&self, value: T, op: ReduceOp) -> Result<T> {
        let send = [value];
        let mut recv = [op.identity::<T>()];
        self.allreduce(&send, &mut recv, op)?;
        Ok(recv[0])
    }

    /// Barrier synchronization.
    ///
    /// No worker returns until every worker of the group has entered.
    fn barrier(&self) -> Result<()>;
}

impl<C: Communicator> Communicator for &C {
    fn rank(&self) -> usize {
        (**self).rank()
    }

    fn size(&self) -> usize {
        (**self).size()
    }

    fn allreduce<T: Element>(&self, send: &[T], recv: &mut [T], op: ReduceOp) -> Result<()> {
        (**self).allreduce(send, recv, op)
    }

    fn allreduce_inplace<T: Element>(&self, data: &mut [T], op: ReduceOp) -> Result<()> {
        (**self).allreduce_inplace(data, op)
    }

    fn allreduce_scalar<T: Element>(&self, value: T, op: ReduceOp) -> Result<T> {
        (**self).allreduce_scalar(value, op)
    }

    fn barrier(&self) -> Result<()> {
        (**self).barrier()
    }
}

/// The group made of the calling worker alone.
///
/// Every reduction returns its input. Useful for serial runs of code written
/// against [`Communicator`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SelfCommunicator;

impl SelfCommunicator {
    /// Create the single-worker group.
    pub fn new() -> Self {
        SelfCommunicator
    }
}

impl Communicator for SelfCommunicator {
    fn rank(&self) -> usize {
        0
    }

    fn size(&self) -> usize {
        1
    }

    fn allreduce<T: Element>(&self, send: &[T], recv: &mut [T], _op: ReduceOp) -> Result<()> {
        if send.len() != recv.len() {
            return Err(Error::InvalidBuffer);
        }
        recv.copy_from_slice(send);
        Ok(())
    }

    fn barrier(&self) -> Result<()> {
        Ok(())
    }
}
