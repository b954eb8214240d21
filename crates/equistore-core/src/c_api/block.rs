use std::ffi::{c_char, CStr};
use std::mem::ManuallyDrop;
use std::sync::Arc;

use crate::{eqs_array_t, eqs_status_t, Labels, Result, TensorBlock, EQS_SUCCESS};

use super::labels::eqs_labels_t;
use super::status::{catch_unwind, check_pointers};

/// Basic building block for tensor map. A single block contains a
/// n-dimensional `eqs_array_t`, and n sets of `eqs_labels_t` (one for each
/// dimension).
///
/// A block can also contain gradients of the values with respect to a
/// variety of parameters. In this case, each gradient has a separate set of
/// sample and component labels but share the property labels with the
/// values.
#[repr(transparent)]
#[allow(non_camel_case_types)]
pub struct eqs_block_t(TensorBlock);

impl eqs_block_t {
    pub(crate) fn into_block(self) -> TensorBlock {
        self.0
    }

    pub(crate) fn block(&self) -> &TensorBlock {
        &self.0
    }

    /// Get a C pointer to an existing Rust block
    pub(crate) fn from_ref(block: &TensorBlock) -> *const eqs_block_t {
        (block as *const TensorBlock).cast()
    }
}

/// Convert the C array of `count` component labels to Rust
pub(crate) unsafe fn components_to_rust(
    components: *const eqs_labels_t,
    count: usize,
) -> Result<Vec<Labels>> {
    if count == 0 {
        return Ok(Vec::new());
    }

    check_pointers!(components);
    std::slice::from_raw_parts(components, count)
        .iter()
        .map(|labels| labels.to_rust())
        .collect()
}

/// Create a new `eqs_block_t` with the given `data` and `samples`,
/// `components` and `properties` labels.
///
/// The memory allocated by this function and the blocks should be released
/// using `eqs_block_free`, or moved into a tensor map using `eqs_tensormap`.
///
/// @param data array handle containing the data for this block. The block
///        takes ownership of the array, and will release it with
///        `array.destroy(array.ptr)` when it no longer needs it. If this
///        function fails, the array is not released.
/// @param samples sample labels corresponding to the first dimension of the
///        data
/// @param components array of component labels corresponding to intermediary
///        dimensions of the data
/// @param components_count number of entries in the `components` array
/// @param properties property labels corresponding to the last dimension of
///        the data
///
/// @returns A pointer to the newly allocated block, or a `NULL` pointer in
///          case of error. In case of error, you can use `eqs_last_error()`
///          to get the error message.
#[no_mangle]
pub unsafe extern "C" fn eqs_block(
    data: eqs_array_t,
    samples: eqs_labels_t,
    components: *const eqs_labels_t,
    components_count: usize,
    properties: eqs_labels_t,
) -> *mut eqs_block_t {
    // the caller keeps ownership of the array until the block is created
    let data = ManuallyDrop::new(data);

    let mut result = std::ptr::null_mut();
    let status = catch_unwind(|| {
        let samples = samples.to_rust()?;
        let components = components_to_rust(components, components_count)?;
        let properties = properties.to_rust()?;

        TensorBlock::validate(&data, &samples, &components, &properties)?;

        let data = ManuallyDrop::into_inner(data);
        let block = TensorBlock::new(data, samples, components, Arc::new(properties))?;
        result = Box::into_raw(Box::new(eqs_block_t(block)));

        Ok(())
    });

    if status != EQS_SUCCESS {
        return std::ptr::null_mut();
    }

    result
}

/// Free the memory associated with a `block` previously created with
/// `eqs_block`.
///
/// If `block` is `NULL`, this function does nothing.
///
/// @param block pointer to an existing block, or `NULL`
///
/// @returns The status code of this operation. If the status is not
///          `EQS_SUCCESS`, you can use `eqs_last_error()` to get the full
///          error message.
#[no_mangle]
pub unsafe extern "C" fn eqs_block_free(block: *mut eqs_block_t) -> eqs_status_t {
    catch_unwind(|| {
        if !block.is_null() {
            drop(Box::from_raw(block));
        }
        Ok(())
    })
}

/// Make a copy of an `eqs_block_t`.
///
/// The memory allocated by this function and the blocks should be released
/// using `eqs_block_free`, or moved into a tensor map using `eqs_tensormap`.
///
/// @param block existing block to copy
///
/// @returns A pointer to the newly allocated block, or a `NULL` pointer in
///          case of error. In case of error, you can use `eqs_last_error()`
///          to get the error message.
#[no_mangle]
pub unsafe extern "C" fn eqs_block_copy(block: *const eqs_block_t) -> *mut eqs_block_t {
    let mut result = std::ptr::null_mut();
    let status = catch_unwind(|| {
        check_pointers!(block);
        let copy = (*block).block().try_clone()?;
        result = Box::into_raw(Box::new(eqs_block_t(copy)));
        Ok(())
    });

    if status != EQS_SUCCESS {
        return std::ptr::null_mut();
    }

    result
}

/// Get the set of labels for the requested `axis` from this `block`.
///
/// The `values_gradients` parameter controls whether this function looks up
/// labels for `"values"` or one of the gradients in this block.
///
/// The resulting `labels.values` points inside memory owned by the block,
/// and as such is only valid until the block is destroyed with
/// `eqs_block_free`, or the containing tensor map is modified with one of
/// the `eqs_tensormap_keys_to_xxx` function.
///
/// @param block pointer to an existing block
/// @param values_gradients either `"values"` or the name of gradients to
///        lookup
/// @param axis axis/dimension of the data array for which you need the
///        labels
/// @param labels pointer to an empty `eqs_labels_t` that will be set to the
///        requested labels
///
/// @returns The status code of this operation. If the status is not
///          `EQS_SUCCESS`, you can use `eqs_last_error()` to get the full
///          error message.
#[no_mangle]
pub unsafe extern "C" fn eqs_block_labels(
    block: *const eqs_block_t,
    values_gradients: *const c_char,
    axis: usize,
    labels: *mut eqs_labels_t,
) -> eqs_status_t {
    catch_unwind(|| {
        check_pointers!(block, values_gradients, labels);

        let selector = CStr::from_ptr(values_gradients).to_str()?;
        let rust_labels = (*block).block().labels(selector, axis)?;
        labels.write(eqs_labels_t::from_rust(rust_labels));

        Ok(())
    })
}

/// Get the array handle for either values or one of the gradient in this
/// `block`.
///
/// The `values_gradients` parameter controls whether this function looks up
/// labels for `"values"` or one of the gradients in this block.
///
/// The array stays owned by the block: it must not be destroyed by the
/// caller, and is invalidated when the block is freed.
///
/// @param block pointer to an existing block
/// @param values_gradients either `"values"` or the name of gradients to
///        lookup
/// @param data pointer to an empty `eqs_array_t` that will be set to the
///        requested array
///
/// @returns The status code of this operation. If the status is not
///          `EQS_SUCCESS`, you can use `eqs_last_error()` to get the full
///          error message.
#[no_mangle]
pub unsafe extern "C" fn eqs_block_data(
    block: *const eqs_block_t,
    values_gradients: *const c_char,
    data: *mut eqs_array_t,
) -> eqs_status_t {
    catch_unwind(|| {
        check_pointers!(block, values_gradients, data);

        let selector = CStr::from_ptr(values_gradients).to_str()?;
        let array = (*block).block().data(selector)?;

        // shallow copy: `data` does not own the array, and the caller must
        // not call `destroy` on it
        std::ptr::copy_nonoverlapping(array, data, 1);

        Ok(())
    })
}

/// Add a new gradient to this `block` with the given `parameter`.
///
/// @param block pointer to an existing block
/// @param parameter name of the gradient as a NULL-terminated UTF-8 string.
///        This is usually the parameter used when taking derivatives (e.g.
///        `"positions"`, `"cell"`, etc.)
/// @param data array containing the gradient data. The block takes
///        ownership of the array, and will release it with
///        `array.destroy(array.ptr)` when it no longer needs it. If this
///        function fails, the array is not released.
/// @param samples sample labels for the gradient array. The components and
///        property labels are supposed to match the values in this block
/// @param components array of component labels corresponding to
///        intermediary dimensions of the data
/// @param components_count number of entries in the `components` array
///
/// @returns The status code of this operation. If the status is not
///          `EQS_SUCCESS`, you can use `eqs_last_error()` to get the full
///          error message.
#[no_mangle]
pub unsafe extern "C" fn eqs_block_add_gradient(
    block: *mut eqs_block_t,
    parameter: *const c_char,
    data: eqs_array_t,
    samples: eqs_labels_t,
    components: *const eqs_labels_t,
    components_count: usize,
) -> eqs_status_t {
    let data = ManuallyDrop::new(data);

    catch_unwind(|| {
        check_pointers!(block, parameter);

        let block = &mut (*block).0;
        let parameter = CStr::from_ptr(parameter).to_str()?;
        let samples = samples.to_rust()?;
        let components = components_to_rust(components, components_count)?;

        block.validate_gradient(parameter, &data, &samples, &components)?;

        let data = ManuallyDrop::into_inner(data);
        block.add_gradient(parameter, data, samples, components)
    })
}

/// Get a list of all gradients defined in this `block` in the `parameters`
/// array.
///
/// @param block pointer to an existing block
/// @param parameters will be set to the first element of an array of
///        NULL-terminated UTF-8 strings containing all the parameters for
///        which a gradient exists in the block
/// @param count will be set to the number of elements in `parameters`
///
/// @returns The status code of this operation. If the status is not
///          `EQS_SUCCESS`, you can use `eqs_last_error()` to get the full
///          error message.
#[no_mangle]
pub unsafe extern "C" fn eqs_block_gradients_list(
    block: *const eqs_block_t,
    parameters: *mut *const *const c_char,
    count: *mut u64,
) -> eqs_status_t {
    catch_unwind(|| {
        check_pointers!(block, parameters, count);

        let (list, len) = (*block).block().gradient_parameters_c();
        *parameters = list;
        *count = u64::try_from(len)?;

        Ok(())
    })
}
