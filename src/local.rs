//! Reductions of a single worker's shard.
//!
//! These never communicate. An empty shard reduces to the identity element
//! of the operation, so it cannot change the group-wide result.

use crate::datatype::Element;
use crate::shard::Shard;
use crate::ReduceOp;
use ndarray::{ArrayBase, Data, Dimension};

/// Sum of all elements; `0` for an empty shard.
pub(crate) fn local_sum<S, D>(shard: &ArrayBase<S, D>) -> S::Elem
where
    S: Data,
    S::Elem: Element,
    D: Dimension,
{
    fold(shard, ReduceOp::Sum)
}

/// Largest element; `-inf` for an empty shard.
pub(crate) fn local_max<S, D>(shard: &ArrayBase<S, D>) -> S::Elem
where
    S: Data,
    S::Elem: Element,
    D: Dimension,
{
    fold(shard, ReduceOp::Max)
}

/// Smallest element; `+inf` for an empty shard.
pub(crate) fn local_min<S, D>(shard: &ArrayBase<S, D>) -> S::Elem
where
    S: Data,
    S::Elem: Element,
    D: Dimension,
{
    fold(shard, ReduceOp::Min)
}

/// Reduce a shard of any rank with `op`.
pub(crate) fn local_reduce<T: Element>(shard: &Shard<'_, T>, op: ReduceOp) -> T {
    match shard {
        Shard::Scalar(x) => op.apply(op.identity(), *x),
        Shard::Vector(v) => reduce_with(v, op),
        Shard::Matrix(m) => reduce_with(m, op),
        Shard::Array(a) => reduce_with(a, op),
    }
}

fn reduce_with<S, D>(shard: &ArrayBase<S, D>, op: ReduceOp) -> S::Elem
where
    S: Data,
    S::Elem: Element,
    D: Dimension,
{
    match op {
        ReduceOp::Sum => local_sum(shard),
        ReduceOp::Max => local_max(shard),
        ReduceOp::Min => local_min(shard),
    }
}

fn fold<S, D>(shard: &ArrayBase<S, D>, op: ReduceOp) -> S::Elem
where
    S: Data,
    S::Elem: Element,
    D: Dimension,
{
    shard.fold(op.identity(), |acc, &x| op.apply(acc, x))
}
