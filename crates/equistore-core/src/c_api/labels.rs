use std::ffi::{c_char, c_void, CStr};

use crate::{eqs_status_t, Error, Labels, Result};

use super::status::{catch_unwind, check_pointers};

/// A set of labels used to carry metadata associated with a tensor map.
///
/// This is similar to a list of `count` named tuples, but stored as a 2D
/// array of shape `(count, size)`, with a set of names associated with the
/// columns of this array (often called *variables*). Each row/entry in this
/// array is unique, and they are often (but not always) sorted in
/// lexicographic order.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
#[allow(non_camel_case_types)]
pub struct eqs_labels_t {
    /// internal: pointer to the rust `Labels` struct if any, null otherwise
    pub labels_ptr: *const c_void,
    /// Names of the variables composing this set of labels. There are `size`
    /// elements in this array, each being a NULL terminated UTF-8 string.
    pub names: *const *const c_char,
    /// Pointer to the first element of a 2D row-major array of 32-bit signed
    /// integer containing the values taken by the different variables in
    /// `names`. Each row has `size` elements, and there are `count` rows in
    /// total.
    pub values: *const i32,
    /// Number of variables/size of a single entry in the set of labels
    pub size: usize,
    /// Number entries in the set of labels
    pub count: usize,
}

impl eqs_labels_t {
    /// Create a view of the given Rust `labels`. The view is only valid for
    /// as long as the labels are alive and not moved.
    pub(crate) fn from_rust(labels: &Labels) -> eqs_labels_t {
        eqs_labels_t {
            labels_ptr: (labels as *const Labels).cast(),
            names: labels.c_names(),
            values: labels.values().as_ptr(),
            size: labels.size(),
            count: labels.count(),
        }
    }

    /// Create new Rust `Labels` with the content of this view, checking
    /// that the names are valid and the entries unique.
    ///
    /// # Safety
    ///
    /// `names` must point to `size` valid NUL-terminated strings, and
    /// `values` to `size * count` integers.
    pub(crate) unsafe fn to_rust(&self) -> Result<Labels> {
        if self.size == 0 {
            if self.count != 0 {
                return Err(Error::InvalidParameter(
                    "labels without variables can not contain entries".into(),
                ));
            }
            return Labels::new(&[], Vec::new());
        }

        let names = self.names;
        check_pointers!(names);

        let mut rust_names = Vec::with_capacity(self.size);
        for i in 0..self.size {
            let name = *names.add(i);
            check_pointers!(name);
            rust_names.push(CStr::from_ptr(name).to_str()?);
        }

        let values = if self.count == 0 {
            Vec::new()
        } else {
            let values = self.values;
            check_pointers!(values);
            std::slice::from_raw_parts(values, self.count * self.size).to_vec()
        };

        Labels::new(&rust_names, values)
    }
}

/// Get the position of the entry defined by the `values` array in the given
/// set of `labels`. This operation is only available if the labels
/// correspond to a set of Rust Labels (i.e. `labels.labels_ptr` is not
/// NULL).
///
/// @param labels set of labels coming from an `eqs_block_t` or an
///        `eqs_tensormap_t`
/// @param values array containing the label to lookup
/// @param count size of the values array
/// @param result position of the values in the labels or -1 if the values
///        were not found
///
/// @returns The status code of this operation. If the status is not
///          `EQS_SUCCESS`, you can use `eqs_last_error()` to get the full
///          error message.
#[no_mangle]
pub unsafe extern "C" fn eqs_labels_position(
    labels: eqs_labels_t,
    values: *const i32,
    count: u64,
    result: *mut i64,
) -> eqs_status_t {
    catch_unwind(|| {
        check_pointers!(result);

        if labels.labels_ptr.is_null() {
            return Err(Error::InvalidParameter(
                "these labels do not support calling eqs_labels_position, \
                they must come from a block or a tensor map"
                    .into(),
            ));
        }

        let rust_labels = &*labels.labels_ptr.cast::<Labels>();
        let count = usize::try_from(count)?;
        let values: &[i32] = if count == 0 {
            &[]
        } else {
            check_pointers!(values);
            std::slice::from_raw_parts(values, count)
        };

        *result = match rust_labels.position(values)? {
            Some(position) => i64::try_from(position)?,
            None => -1,
        };

        Ok(())
    })
}
