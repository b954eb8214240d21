//! C API for equistore.
//!
//! Every function catches panics and reports errors through a status code,
//! with the full message available from [`eqs_last_error`]. Functions
//! returning pointers return `NULL` on error. Arrays and blocks given to a
//! function that fails are still owned by the caller.
#![allow(clippy::missing_safety_doc)]

mod status;
pub(crate) use self::status::catch_unwind;
pub use self::status::{eqs_last_error, eqs_set_last_error};

mod labels;
pub use self::labels::{eqs_labels_position, eqs_labels_t};

mod data;
pub use self::data::{eqs_get_data_origin, eqs_register_data_origin};

mod block;
pub use self::block::{
    eqs_block, eqs_block_add_gradient, eqs_block_copy, eqs_block_data, eqs_block_free,
    eqs_block_gradients_list, eqs_block_labels, eqs_block_t,
};

mod tensor;
pub use self::tensor::{
    eqs_tensormap, eqs_tensormap_block_by_id, eqs_tensormap_block_selection,
    eqs_tensormap_components_to_properties, eqs_tensormap_copy, eqs_tensormap_free,
    eqs_tensormap_keys, eqs_tensormap_keys_to_properties, eqs_tensormap_keys_to_samples,
    eqs_tensormap_t,
};
