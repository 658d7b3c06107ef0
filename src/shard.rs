//! Borrowed local shards and replicated results.

use crate::datatype::Element;
use ndarray::{
    Array0, Array1, Array2, ArrayD, ArrayView0, ArrayView1, ArrayView2, ArrayViewD, Ix0, Ix1, Ix2,
};

/// One worker's portion of a global array, borrowed for a single call.
///
/// The variant is chosen once, from the rank of the input, and every
/// operation dispatches on it. A [`Shard::Array`] of rank 0, 1 or 2 is
/// treated exactly like the matching fixed-rank variant.
///
/// Shards may be empty along any axis; an empty shard contributes the
/// identity element of whichever reduction it takes part in.
///
/// # Example
///
/// ```
/// use ndarray::array;
/// use parallel_ndarray::Shard;
///
/// let m = array![[1.0, 2.0], [3.0, 4.0]];
/// let shard = Shard::from(&m);
/// assert_eq!(shard.ndim(), 2);
/// assert_eq!(Shard::from(m.t()).shape(), vec![2, 2]);
/// assert_eq!(Shard::scalar(5.0f64).len(), 1);
/// ```
#[derive(Debug, Clone)]
pub enum Shard<'a, T> {
    /// A rank-0 value
    Scalar(T),
    /// A rank-1 view
    Vector(ArrayView1<'a, T>),
    /// A rank-2 view
    Matrix(ArrayView2<'a, T>),
    /// A view of arbitrary rank
    Array(ArrayViewD<'a, T>),
}

impl<'a, T: Element> Shard<'a, T> {
    /// A rank-0 shard.
    pub fn scalar(value: T) -> Self {
        Shard::Scalar(value)
    }

    /// Number of axes.
    pub fn ndim(&self) -> usize {
        match self {
            Shard::Scalar(_) => 0,
            Shard::Vector(_) => 1,
            Shard::Matrix(_) => 2,
            Shard::Array(a) => a.ndim(),
        }
    }

    /// Local extent along every axis.
    pub fn shape(&self) -> Vec<usize> {
        match self {
            Shard::Scalar(_) => Vec::new(),
            Shard::Vector(v) => v.shape().to_vec(),
            Shard::Matrix(m) => m.shape().to_vec(),
            Shard::Array(a) => a.shape().to_vec(),
        }
    }

    /// Number of local elements.
    pub fn len(&self) -> usize {
        match self {
            Shard::Scalar(_) => 1,
            Shard::Vector(v) => v.len(),
            Shard::Matrix(m) => m.len(),
            Shard::Array(a) => a.len(),
        }
    }

    /// Whether this worker holds no elements.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Collapse a dynamic-rank view of rank 0, 1 or 2 into its fixed-rank
    /// variant. Other shards are returned unchanged.
    #[must_use]
    pub fn normalize(self) -> Self {
        match self {
            Shard::Array(view) => match view.ndim() {
                0 => match view.clone().into_dimensionality::<Ix0>() {
                    Ok(v) => Shard::Scalar(*v.into_scalar()),
                    Err(_) => Shard::Array(view),
                },
                1 => match view.clone().into_dimensionality::<Ix1>() {
                    Ok(v) => Shard::Vector(v),
                    Err(_) => Shard::Array(view),
                },
                2 => match view.clone().into_dimensionality::<Ix2>() {
                    Ok(m) => Shard::Matrix(m),
                    Err(_) => Shard::Array(view),
                },
                _ => Shard::Array(view),
            },
            other => other,
        }
    }
}

impl<'a, T: Element> From<ArrayView0<'a, T>> for Shard<'a, T> {
    fn from(view: ArrayView0<'a, T>) -> Self {
        Shard::Scalar(*view.into_scalar())
    }
}

impl<'a, T: Element> From<&'a Array0<T>> for Shard<'a, T> {
    fn from(array: &'a Array0<T>) -> Self {
        Shard::from(array.view())
    }
}

impl<'a, T: Element> From<ArrayView1<'a, T>> for Shard<'a, T> {
    fn from(view: ArrayView1<'a, T>) -> Self {
        Shard::Vector(view)
    }
}

impl<'a, T: Element> From<&'a Array1<T>> for Shard<'a, T> {
    fn from(array: &'a Array1<T>) -> Self {
        Shard::Vector(array.view())
    }
}

impl<'a, T: Element> From<ArrayView2<'a, T>> for Shard<'a, T> {
    fn from(view: ArrayView2<'a, T>) -> Self {
        Shard::Matrix(view)
    }
}

impl<'a, T: Element> From<&'a Array2<T>> for Shard<'a, T> {
    fn from(array: &'a Array2<T>) -> Self {
        Shard::Matrix(array.view())
    }
}

impl<'a, T: Element> From<ArrayViewD<'a, T>> for Shard<'a, T> {
    fn from(view: ArrayViewD<'a, T>) -> Self {
        Shard::Array(view).normalize()
    }
}

impl<'a, T: Element> From<&'a ArrayD<T>> for Shard<'a, T> {
    fn from(array: &'a ArrayD<T>) -> Self {
        Shard::from(array.view())
    }
}

/// A fully combined result, identical on every worker of the group.
///
/// Each worker owns its copy outright.
#[derive(Debug, Clone, PartialEq)]
pub enum Reduced<T> {
    /// Result of a vector·vector product
    Scalar(T),
    /// Result of a matrix·vector or vector·matrix product
    Vector(Array1<T>),
    /// Result of a matrix·matrix product
    Matrix(Array2<T>),
}

impl<T: Element> Reduced<T> {
    /// Shape of the result (`[]` for a scalar).
    pub fn shape(&self) -> Vec<usize> {
        match self {
            Reduced::Scalar(_) => Vec::new(),
            Reduced::Vector(v) => v.shape().to_vec(),
            Reduced::Matrix(m) => m.shape().to_vec(),
        }
    }

    /// The scalar result, if this is one.
    pub fn into_scalar(self) -> Option<T> {
        match self {
            Reduced::Scalar(x) => Some(x),
            _ => None,
        }
    }

    /// The vector result, if this is one.
    pub fn into_vector(self) -> Option<Array1<T>> {
        match self {
            Reduced::Vector(v) => Some(v),
            _ => None,
        }
    }

    /// The matrix result, if this is one.
    pub fn into_matrix(self) -> Option<Array2<T>> {
        match self {
            Reduced::Matrix(m) => Some(m),
            _ => None,
        }
    }

    /// The result as a dynamic-rank array.
    pub fn into_dyn(self) -> ArrayD<T> {
        match self {
            Reduced::Scalar(x) => Array0::from_elem((), x).into_dyn(),
            Reduced::Vector(v) => v.into_dyn(),
            Reduced::Matrix(m) => m.into_dyn(),
        }
    }
}
