//! # equistore-core
//!
//! Metadata-indexed storage of n-dimensional tensors, where the data can come
//! from any array library (and any language) through a C-compatible array
//! interface.
//!
//! This crate provides the foundational building blocks of equistore:
//!
//! - **Labels** ([`Labels`]): named, integer-valued index tables describing
//!   the entries along an axis
//! - **Array interface** ([`eqs_array_t`], [`Array`]): a vtable wrapping
//!   arrays from any backend, without knowing their element type or where
//!   the data lives
//! - **Blocks** ([`TensorBlock`]): a data array with labels for each axis,
//!   and named gradients sharing the property labels
//! - **Tensor maps** ([`TensorMap`]): a set of blocks indexed by keys, with
//!   operations moving key variables to the samples or properties of the
//!   blocks
//! - **C API** ([`c_api`]): everything above, exported as `extern "C"`
//!   functions for bindings in other languages
//!
//! ## Data layout
//!
//! The first axis of every array contains the *samples*, the last axis the
//! *properties*, and any number of *components* axes can sit in between.
//! Gradients of the values with respect to some parameter are stored next
//! to the values, with their own samples. The first sample variable of a
//! gradient is always called `sample`, and contains the index of the
//! corresponding row in the values.
//!
//! ## Quick Start
//!
//! ```
//! # #[cfg(feature = "ndarray")] {
//! use std::sync::Arc;
//!
//! use equistore_core::{eqs_array_t, Labels, TensorBlock, TensorMap};
//! use ndarray::ArrayD;
//!
//! let block = |value: f64| {
//!     TensorBlock::new(
//!         eqs_array_t::new(Box::new(ArrayD::from_elem(vec![2, 1], value))),
//!         Labels::new(&["structure"], vec![0, 1]).unwrap(),
//!         vec![],
//!         Arc::new(Labels::new(&["n"], vec![0]).unwrap()),
//!     )
//!     .unwrap()
//! };
//!
//! let keys = Labels::new(&["species"], vec![1, 6]).unwrap();
//! let mut tensor = TensorMap::new(keys, vec![block(1.0), block(6.0)]).unwrap();
//!
//! // move the `species` key to the properties, merging the two blocks
//! let species = Labels::empty(&["species"]).unwrap();
//! tensor.keys_to_properties(&species, true).unwrap();
//!
//! assert_eq!(tensor.keys(), &Labels::single());
//! let block = tensor.block_by_id(0).unwrap();
//! assert_eq!(block.values().properties().names(), ["species", "n"]);
//! assert_eq!(block.values().data().shape().unwrap(), [2, 2]);
//! # }
//! ```
//!
//! ## Error handling
//!
//! All fallible operations return [`Result`], with an [`Error`] that maps to
//! one of the `EQS_*` status codes of the C API. Errors coming from array
//! callbacks keep the status code returned by the callback.
//!
//! ## Logging
//!
//! The merge operations emit [`tracing`] events and spans. With the
//! `logging` feature, `tracing_support::init_tracing` installs a
//! subscriber configured from the environment.

mod error;
pub use self::error::{Error, Result};
pub use self::error::{
    eqs_status_t, EQS_BUFFER_SIZE_ERROR, EQS_INTERNAL_ERROR, EQS_INVALID_PARAMETER_ERROR,
    EQS_SUCCESS,
};

mod utils;

mod labels;
pub use self::labels::{is_valid_label_name, Labels, LabelsBuilder};

pub mod data;
pub use self::data::{eqs_array_t, eqs_sample_mapping_t, Array};

mod block;
pub use self::block::{BasicBlock, TensorBlock, VALUES};

mod tensor;
pub use self::tensor::TensorMap;

pub mod c_api;

#[cfg(feature = "logging")]
pub mod tracing_support;
