//! # equistore
//!
//! Metadata-indexed storage of n-dimensional tensors, where every axis of
//! the data is described by [`Labels`](core::Labels) and blocks of data are
//! grouped in a [`TensorMap`](core::TensorMap) indexed by keys.
//!
//! This is the **meta crate** re-exporting [`equistore_core`] for convenient
//! access. Bindings to other languages use the C API in [`core::c_api`].
//!
//! ## Quick Start
//!
//! ```
//! # #[cfg(feature = "ndarray")] {
//! use equistore::prelude::*;
//! use ndarray::ArrayD;
//!
//! let block = TensorBlock::new(
//!     eqs_array_t::new(Box::new(ArrayD::from_elem(vec![3, 2], 1.0))),
//!     Labels::new(&["structure"], vec![0, 1, 2])?,
//!     vec![],
//!     Labels::new(&["n"], vec![0, 1])?.into(),
//! )?;
//!
//! let keys = Labels::new(&["species"], vec![8])?;
//! let mut tensor = TensorMap::new(keys, vec![block])?;
//! tensor.keys_to_samples(&Labels::empty(&["species"])?, true)?;
//!
//! let samples = tensor.block_by_id(0)?.values().samples();
//! assert_eq!(samples.names(), ["species", "structure"]);
//! # }
//! # Ok::<(), anyhow::Error>(())
//! ```
//!
//! ## Features
//!
//! - `ndarray` (default): use `ndarray::ArrayD<f64>` as block data
//! - `serde`: serialization of [`Labels`](core::Labels)
//! - `logging`: `core::tracing_support`, installing a `tracing` subscriber
//!   configured from the environment

pub use equistore_core as core;

pub mod prelude {
    //! Prelude module for convenient imports
    //!
    //! # Example
    //!
    //! ```
    //! use equistore::prelude::*;
    //!
    //! let labels = Labels::new(&["structure", "atom"], vec![0, 1, 0, 2]).unwrap();
    //! assert_eq!(labels.position(&[0, 2]).unwrap(), Some(1));
    //! ```

    // Metadata
    pub use crate::core::{Labels, LabelsBuilder};

    // Data
    pub use crate::core::{eqs_array_t, Array};

    // Blocks and tensor maps
    pub use crate::core::{BasicBlock, TensorBlock, TensorMap};

    // Errors
    pub use crate::core::{Error, Result};
}
