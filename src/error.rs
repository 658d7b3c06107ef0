//! Error types for parallel-ndarray

use thiserror::Error;

/// Result type for distributed operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for distributed operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// The local operands of a product do not agree on the shared axis.
    ///
    /// Raised before any collective call is issued.
    #[error("shape mismatch in {op}: {lhs:?} and {rhs:?} are not aligned")]
    ShapeMismatch {
        /// Operation that rejected the operands
        op: &'static str,
        /// Local shape of the left operand
        lhs: Vec<usize>,
        /// Local shape of the right operand
        rhs: Vec<usize>,
    },

    /// An operand has a rank the operation does not handle
    #[error("{op} does not support operands of rank {rank}")]
    UnsupportedRank {
        /// Operation that rejected the operand
        op: &'static str,
        /// Rank of the offending operand
        rank: usize,
    },

    /// Send and receive buffers have different lengths
    #[error("Invalid buffer")]
    InvalidBuffer,

    /// A worker group must have at least one member
    #[error("Invalid group size: {0}")]
    InvalidGroupSize(usize),

    /// Workers contributed buffers of different lengths to one collective
    #[error("rank {rank} contributed {got} elements, expected {expected}")]
    CountMismatch {
        /// First rank whose contribution disagreed with rank 0
        rank: usize,
        /// Length contributed by rank 0
        expected: usize,
        /// Length contributed by `rank`
        got: usize,
    },

    /// Workers entered different collective operations at the same step
    #[error("workers requested different collective operations")]
    OpMismatch,

    /// Workers reduced buffers of different element types in one collective
    #[error("workers contributed different element types")]
    DatatypeMismatch,

    /// A peer left the group while a collective was outstanding
    #[error("a peer worker exited before completing the collective")]
    PeerExited,

    /// Failure reported by an external collective-communication backend
    #[error("collective failure: {0}")]
    Collective(String),

    /// Invalid configuration value
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Whether the error came from the collective-communication layer rather
    /// than from local validation.
    pub fn is_collective(&self) -> bool {
        matches!(
            self,
            Error::CountMismatch { .. }
                | Error::OpMismatch
                | Error::DatatypeMismatch
                | Error::PeerExited
                | Error::Collective(_)
        )
    }

    pub(crate) fn shape_mismatch(op: &'static str, lhs: &[usize], rhs: &[usize]) -> Self {
        Error::ShapeMismatch {
            op,
            lhs: lhs.to_vec(),
            rhs: rhs.to_vec(),
        }
    }
}

impl From<ndarray::ShapeError> for Error {
    fn from(e: ndarray::ShapeError) -> Self {
        Error::Internal(e.to_string())
    }
}
