//! The tensor values stored in the fields of structured tensors.
//!
//! - [`DenseTensor`] is an n-dimensional array with a [`DType`] element type and a static [`TensorShape`] that may
//!     know less than the runtime shape of the array.
//! - [`RowPartition`] describes how a flat sequence of values is split into rows of possibly different lengths.
//! - [`RaggedTensor`] is a dense tensor of flat values and a non-empty list of nested row partitions, a tensor where
//!     some dimensions have variable length.
//!
//! Dense tensors are backed by [`ndarray`] arrays, and elements can be accessed with
//! [`as_array`](DenseTensor::as_array):
//! ```rust
//! use structured_tensor::tensor::DenseTensor;
//!
//! let tensor = DenseTensor::from_vec(vec![1_i64, 2, 3, 4]).reshape(&[2, 2])?;
//! let array = tensor.as_array::<i64>().unwrap();
//! assert_eq!(array[[1, 0]], 3);
//! # Ok::<(), structured_tensor::Error>(())
//! ```

mod dense;
mod fmt;
mod ragged;
mod row_partition;
mod scalar;
mod shape;

pub use dense::{DenseTensor, TensorData};
pub use ragged::RaggedTensor;
pub use row_partition::RowPartition;
pub use scalar::{DType, Element, IndexType};
pub use shape::{Dim, TensorShape};

