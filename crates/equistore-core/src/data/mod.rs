//! Backend-agnostic handling of n-dimensional arrays.
//!
//! The data stored in blocks is never accessed directly: everything goes
//! through the function pointers of [`eqs_array_t`], which can wrap arrays
//! from any language or device. Rust code can implement the [`Array`] trait
//! instead, and convert to an [`eqs_array_t`] with [`eqs_array_t::new`].
//!
//! Each kind of array is tagged with a data origin from a process-wide
//! registry, which is used to refuse mixing arrays from unrelated backends in
//! a single operation.

mod origin;
pub use self::origin::{eqs_data_origin_t, get_data_origin, register_data_origin};

mod array;
pub use self::array::{eqs_array_t, eqs_sample_mapping_t};

mod rust_array;
pub use self::rust_array::Array;

#[cfg(feature = "ndarray")]
mod dense;
#[cfg(feature = "ndarray")]
pub use self::dense::NDARRAY_DATA_ORIGIN;

use crate::{Error, Result};

/// Check that all the given arrays come from the same data origin, before
/// using them together in a single operation.
pub(crate) fn check_same_origin<'a>(
    arrays: impl IntoIterator<Item = &'a eqs_array_t>,
    context: &str,
) -> Result<()> {
    let mut first = None;
    for array in arrays {
        let origin = array.origin()?;
        match first {
            None => first = Some(origin),
            Some(first) if first != origin => {
                let first = get_data_origin(first).unwrap_or_else(|_| first.to_string());
                let other = get_data_origin(origin).unwrap_or_else(|_| origin.to_string());
                return Err(Error::Internal(format!(
                    "{}: can not combine arrays from different origins ('{}' and '{}')",
                    context, first, other
                )));
            }
            Some(_) => {}
        }
    }
    Ok(())
}
