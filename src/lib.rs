#![cfg_attr(deny_warnings, deny(warnings))]
// some new clippy::lint annotations are supported in latest Rust but not recognized by older versions
#![cfg_attr(deny_warnings, allow(unknown_lints))]
#![cfg_attr(deny_warnings, deny(missing_docs))]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]

//! Structured tensors: nested, dictionary-keyed records with statically tracked shapes.
//!
//! A [`StructuredTensor`](structured::StructuredTensor) is a collection of named fields that all share the same
//! leading dimensions, the *shape* of the structured tensor. Each field is either a dense tensor, a ragged tensor
//! (a tensor with variable-length dimensions), or another structured tensor. This makes it possible to represent
//! batches of semi-structured records, such as a list of documents where each document has a variable number of
//! sentences, and each sentence a variable number of tokens, while keeping per-field shape and type information.
//!
//! The shape of a structured tensor has a known rank, but each of its dimensions may be unknown. Ragged
//! dimensions beyond the outermost one are described by [`RowPartition`](tensor::RowPartition)s, shared by
//! every field of the structured tensor.
//!
//! Structured tensors are immutable and can only be created through validated constructors:
//! ```rust
//! use structured_tensor::structured::{FieldInput, StructuredTensor};
//! use structured_tensor::tensor::TensorShape;
//!
//! let st = StructuredTensor::from_fields(
//!     [("a", FieldInput::from(12)), ("b", FieldInput::from(vec![1, 2, 3]))],
//!     TensorShape::scalar(),
//! )?;
//! assert_eq!(st.rank(), 0);
//! assert_eq!(st.field_names().collect::<Vec<_>>(), ["a", "b"]);
//! # Ok::<(), structured_tensor::Error>(())
//! ```
//!
//! Or from a tree of native values, such as nested lists of dictionaries:
//! ```rust
//! use structured_tensor::pyval;
//! use structured_tensor::structured::StructuredTensor;
//!
//! let value = StructuredTensor::from_pyval(&pyval!([{"a": 1}, {"a": 2}]), None)?;
//! let st = value.as_structured().unwrap();
//! assert_eq!(st.shape().to_string(), "(2,)");
//! assert_eq!(st.to_pyval()?, pyval!([{"a": 1}, {"a": 2}]));
//! # Ok::<(), structured_tensor::Error>(())
//! ```
//!
//! ## Validation
//! Consistency of the fields is checked eagerly whenever the involved shape information is statically known.
//! Checks that depend on runtime values, such as the row splits of ragged fields, are attached to the structured
//! tensor as deferred checks when constructing with `validate = true`, and run by
//! [`evaluate`](structured::StructuredTensor::evaluate). With `validate = false` these checks are skipped
//! entirely, which is cheaper but leaves inconsistent inputs undetected.
//!
//! ## Cargo Features
//! - `std`:
//!   Enable the standard library. This feature is enabled by default, but can be disabled to build
//!   [`structured_tensor`](crate) in a `no_std` environment. An allocator is always required.
//! - `half`:
//!   Adds a dependency to the `half` crate, which provides fully capable `f16` and `bf16` types.
//!   Without this feature enabled, both of these types are available as opaque bit wrappers and can not be
//!   converted from or to native values.
//! - `num-complex`:
//!   Adds a dependency to the `num-complex` crate, which provides a fully capable complex number type.
//!   Without this feature enabled, complex numbers are available as a simple struct with two public fields
//!   without any operations.
//!
//! By default only the `std` feature is enabled.

#![cfg_attr(not(feature = "std"), no_std)]

#[cfg(not(feature = "std"))]
extern crate core as std;

#[doc(hidden)]
pub mod __private {
    #[cfg(feature = "std")]
    pub mod alloc {
        pub use std::borrow::ToOwned;
        pub use std::boxed::Box;
        pub use std::collections::{BTreeMap, BTreeSet};
        pub use std::format;
        pub use std::string::{String, ToString};
        pub use std::sync::Arc;
        pub use std::vec;
        pub use std::vec::Vec;
    }
    #[cfg(not(feature = "std"))]
    pub mod alloc {
        extern crate alloc;
        pub use alloc::borrow::ToOwned;
        pub use alloc::boxed::Box;
        pub use alloc::collections::{BTreeMap, BTreeSet};
        pub use alloc::format;
        pub use alloc::string::{String, ToString};
        pub use alloc::sync::Arc;
        pub use alloc::vec;
        pub use alloc::vec::Vec;
    }
}

#[allow(unused_imports)]
use crate::__private::alloc;

#[macro_use]
mod private;
mod error;
#[macro_use]
pub mod native;
pub mod scalar;
pub mod structured;
pub mod tensor;


pub use error::{Error, Result};

pub use ndarray;

#[cfg(feature = "half")]
pub use half;

#[cfg(feature = "num-complex")]
pub use num_complex;
