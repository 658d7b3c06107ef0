//! Element trait and type tag mapping.
//!
//! This module provides the [`Element`] trait, a sealed trait that marks the
//! Rust floating point types the reduction and product engine works with.
//!
//! # Supported Types
//!
//! | Rust Type | Tag Value |
//! |-----------|-----------|
//! | `f32`     | 0         |
//! | `f64`     | 1         |
//!
//! Integer types are deliberately absent: the identity elements of `max` and
//! `min` are `-inf` and `+inf`, which only floating point types can express.

use ndarray::{LinalgScalar, ScalarOperand};
use num_traits::Float;
use std::fmt::{Debug, Display};

/// Internal module to seal the trait — prevents external implementations.
mod sealed {
    pub trait Sealed {}
}

/// Tag values identifying an element type inside a collective.
///
/// Backends that carry every element type through one buffer record the tag
/// with each call so workers reducing `f32` and `f64` at the same step are
/// caught instead of silently mixed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum DatatypeTag {
    /// 32-bit floating point
    F32 = 0,
    /// 64-bit floating point
    F64 = 1,
}

/// Trait for types that can be reduced and multiplied across a worker group.
///
/// This is a **sealed trait** — it cannot be implemented outside this crate.
/// Supported types: [`f32`], [`f64`].
///
/// The widening conversions let a backend carry every element type through a
/// single `f64` buffer; `f32 -> f64 -> f32` is exact.
pub trait Element:
    sealed::Sealed
    + Float
    + LinalgScalar
    + ScalarOperand
    + Debug
    + Display
    + Send
    + Sync
    + 'static
{
    /// The datatype tag for this element type.
    const TAG: DatatypeTag;

    /// Widen to `f64`.
    fn widen(self) -> f64;

    /// Narrow from `f64`, rounding to nearest.
    fn narrow(value: f64) -> Self;
}

macro_rules! impl_element {
    ($ty:ty, $tag:expr) => {
        impl sealed::Sealed for $ty {}
        impl Element for $ty {
            const TAG: DatatypeTag = $tag;

            #[inline]
            fn widen(self) -> f64 {
                f64::from(self)
            }

            #[inline]
            #[allow(clippy::cast_possible_truncation)]
            fn narrow(value: f64) -> Self {
                value as $ty
            }
        }
    };
}

impl_element!(f32, DatatypeTag::F32);
impl_element!(f64, DatatypeTag::F64);
