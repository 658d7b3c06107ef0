//! # parallel-ndarray
//!
//! Distributed reductions and linear-algebra products over [`ndarray`] shards.
//!
//! Every worker in a group holds only its local shard of a logically global
//! array. This crate combines per-worker partial results through a collective
//! all-reduce so that every worker ends up with the same, fully-combined
//! answer, without any worker ever materializing the global input:
//! - Global `sum`, `max` and `min` over shards of any rank
//! - Distributed `dot` for vector·vector, matrix·vector, vector·matrix and
//!   matrix·matrix products split along the contraction axis
//! - Well-defined results for empty shards (0, −∞ and +∞ identity elements)
//! - A pluggable [`Communicator`] seam plus an in-process [`ThreadGroup`]
//!   backend
//!
//! ## Supported Types
//!
//! All operations are generic over [`Element`]: `f32`, `f64`
//!
//! ## Quick Start
//!
//! ```no_run
//! use ndarray::{array, s};
//! use parallel_ndarray::{Communicator, ParallelLinalg, ThreadGroup};
//!
//! fn main() -> Result<(), parallel_ndarray::Error> {
//!     let a = array![1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
//!     let b = array![6.0, 5.0, 4.0, 3.0, 2.0, 1.0];
//!
//!     let group = ThreadGroup::new(2)?;
//!     let results = group.run(|comm| {
//!         let linalg = ParallelLinalg::new(&comm);
//!         // Each worker owns one contiguous half of both vectors.
//!         let half = 3 * comm.rank();
//!         let local_a = a.slice(s![half..half + 3]);
//!         let local_b = b.slice(s![half..half + 3]);
//!
//!         let total = linalg.sum(local_a)?;
//!         let inner = linalg.dot(local_a, local_b)?.into_scalar();
//!         Ok::<_, parallel_ndarray::Error>((total, inner))
//!     })?;
//!
//!     for result in results {
//!         println!("{:?}", result?);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Collective Calls
//!
//! Every public operation is a collective call: all workers of a group must
//! invoke the same operations in the same order with mutually compatible
//! shards. Shape errors are detected locally before any communication is
//! issued; anything the communicator reports is propagated unchanged.
//!
//! ## Configuration
//!
//! | Variable | Description |
//! |----------|-------------|
//! | `PARALLEL_NDARRAY_WORKERS` | Group size used by [`ThreadGroup::from_env`] |

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

mod combine;
mod comm;
mod datatype;
mod error;
mod local;
mod parallel;
mod product;
mod shard;
mod thread_group;

pub use comm::{Communicator, SelfCommunicator};
pub use datatype::{DatatypeTag, Element};
pub use error::{Error, Result};
pub use parallel::ParallelLinalg;
pub use shard::{Reduced, Shard};
pub use thread_group::{ThreadCommunicator, ThreadGroup, WORKERS_ENV};

/// Reduction operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum ReduceOp {
    /// Sum of values
    Sum = 0,
    /// Maximum value
    Max = 1,
    /// Minimum value
    Min = 2,
}

impl ReduceOp {
    /// The value an empty contribution supplies for this operation.
    ///
    /// Combining any value with the identity returns that value unchanged:
    /// `0` for [`Sum`](Self::Sum), `-inf` for [`Max`](Self::Max) and `+inf`
    /// for [`Min`](Self::Min).
    pub fn identity<T: Element>(self) -> T {
        match self {
            ReduceOp::Sum => T::zero(),
            ReduceOp::Max => T::neg_infinity(),
            ReduceOp::Min => T::infinity(),
        }
    }

    /// Combine two values.
    ///
    /// `Max` and `Min` follow IEEE `fmax`/`fmin`: a NaN operand loses to a
    /// number.
    pub fn apply<T: Element>(self, a: T, b: T) -> T {
        match self {
            ReduceOp::Sum => a + b,
            ReduceOp::Max => a.max(b),
            ReduceOp::Min => a.min(b),
        }
    }

    /// Short lowercase name, used in log events and error messages.
    pub fn name(self) -> &'static str {
        match self {
            ReduceOp::Sum => "sum",
            ReduceOp::Max => "max",
            ReduceOp::Min => "min",
        }
    }
}

impl std::fmt::Display for ReduceOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
