use std::ffi::{c_char, CStr};

use crate::{eqs_status_t, Error, TensorBlock, TensorMap, EQS_SUCCESS};

use super::block::eqs_block_t;
use super::labels::eqs_labels_t;
use super::status::{catch_unwind, check_pointers};

/// Opaque type representing a `TensorMap`.
#[repr(transparent)]
#[allow(non_camel_case_types)]
pub struct eqs_tensormap_t(TensorMap);

impl eqs_tensormap_t {
    fn tensor(&self) -> &TensorMap {
        &self.0
    }

    fn tensor_mut(&mut self) -> &mut TensorMap {
        &mut self.0
    }
}

/// Create a new `eqs_tensormap_t` with the given `keys` and `blocks`.
/// `blocks_count` must be set to the number of entries in the blocks array.
///
/// The new tensor map takes ownership of the blocks, which should not be
/// released separately. If this function fails, the blocks are not
/// released.
///
/// The memory allocated by this function and the blocks should be released
/// using `eqs_tensormap_free`.
///
/// @param keys labels containing the keys associated with each block
/// @param blocks pointer to the first element of an array of blocks
/// @param blocks_count number of elements in the `blocks` array
///
/// @returns A pointer to the newly allocated tensor map, or a `NULL` pointer
///          in case of error. In case of error, you can use
///          `eqs_last_error()` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn eqs_tensormap(
    keys: eqs_labels_t,
    blocks: *mut *mut eqs_block_t,
    blocks_count: u64,
) -> *mut eqs_tensormap_t {
    let mut result = std::ptr::null_mut();
    let status = catch_unwind(|| {
        let keys = keys.to_rust()?;

        let blocks_count = usize::try_from(blocks_count)?;
        let blocks: &[*mut eqs_block_t] = if blocks_count == 0 {
            &[]
        } else {
            check_pointers!(blocks);
            std::slice::from_raw_parts(blocks, blocks_count)
        };

        for (i, &block) in blocks.iter().enumerate() {
            check_pointers!(block);
            if blocks[..i].contains(&block) {
                return Err(Error::InvalidParameter(format!(
                    "got the same block multiple times (at index {})",
                    i
                )));
            }
        }

        let borrowed = blocks
            .iter()
            .map(|&block| (*block).block())
            .collect::<Vec<&TensorBlock>>();
        TensorMap::validate(&keys, &borrowed)?;

        // everything is valid, we can now take ownership of the blocks
        let blocks = blocks
            .iter()
            .map(|&block| Box::from_raw(block).into_block())
            .collect();

        let tensor = TensorMap::new(keys, blocks)?;
        result = Box::into_raw(Box::new(eqs_tensormap_t(tensor)));

        Ok(())
    });

    if status != EQS_SUCCESS {
        return std::ptr::null_mut();
    }

    result
}

/// Free the memory associated with a `tensor` previously created with
/// `eqs_tensormap`.
///
/// If `tensor` is `NULL`, this function does nothing.
///
/// @param tensor pointer to an existing tensor map, or `NULL`
///
/// @returns The status code of this operation. If the status is not
///          `EQS_SUCCESS`, you can use `eqs_last_error()` to get the full
///          error message.
#[no_mangle]
pub unsafe extern "C" fn eqs_tensormap_free(tensor: *mut eqs_tensormap_t) -> eqs_status_t {
    catch_unwind(|| {
        if !tensor.is_null() {
            drop(Box::from_raw(tensor));
        }
        Ok(())
    })
}

/// Make a copy of an `eqs_tensormap_t`, including all the data contained
/// inside.
///
/// The memory allocated by this function should be released using
/// `eqs_tensormap_free`.
///
/// @param tensor existing tensor map to copy
///
/// @returns A pointer to the newly allocated tensor map, or a `NULL` pointer
///          in case of error. In case of error, you can use
///          `eqs_last_error()` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn eqs_tensormap_copy(tensor: *const eqs_tensormap_t) -> *mut eqs_tensormap_t {
    let mut result = std::ptr::null_mut();
    let status = catch_unwind(|| {
        check_pointers!(tensor);
        let copy = (*tensor).tensor().try_clone()?;
        result = Box::into_raw(Box::new(eqs_tensormap_t(copy)));
        Ok(())
    });

    if status != EQS_SUCCESS {
        return std::ptr::null_mut();
    }

    result
}

/// Get the keys for the given `tensor` map. After a successful call to this
/// function, `keys.values` contains a pointer to memory inside the
/// `tensor` which is invalidated when the tensor map is freed with
/// `eqs_tensormap_free` or the set of keys is modified by calling one of
/// the `eqs_tensormap_keys_to_XXX` function.
///
/// @param tensor pointer to an existing tensor map
/// @param keys pointer to be filled with the keys of the tensor map
///
/// @returns The status code of this operation. If the status is not
///          `EQS_SUCCESS`, you can use `eqs_last_error()` to get the full
///          error message.
#[no_mangle]
pub unsafe extern "C" fn eqs_tensormap_keys(
    tensor: *const eqs_tensormap_t,
    keys: *mut eqs_labels_t,
) -> eqs_status_t {
    catch_unwind(|| {
        check_pointers!(tensor, keys);
        keys.write(eqs_labels_t::from_rust((*tensor).tensor().keys()));
        Ok(())
    })
}

/// Get a pointer to the `index`-th block in this tensor map.
///
/// The block memory is still managed by the tensor map, this block should
/// not be freed. The block is invalidated when the tensor map is freed with
/// `eqs_tensormap_free` or the set of keys is modified by calling one of
/// the `eqs_tensormap_keys_to_XXX` function.
///
/// @param tensor pointer to an existing tensor map
/// @param block pointer to be filled with a block
/// @param index index of the block to get
///
/// @returns The status code of this operation. If the status is not
///          `EQS_SUCCESS`, you can use `eqs_last_error()` to get the full
///          error message.
#[no_mangle]
pub unsafe extern "C" fn eqs_tensormap_block_by_id(
    tensor: *const eqs_tensormap_t,
    block: *mut *const eqs_block_t,
    index: u64,
) -> eqs_status_t {
    catch_unwind(|| {
        check_pointers!(tensor, block);

        let index = usize::try_from(index)?;
        let rust_block = (*tensor).tensor().block_by_id(index)?;
        *block = eqs_block_t::from_ref(rust_block);

        Ok(())
    })
}

/// Get a pointer to the `block` in this `tensor` corresponding to the given
/// `selection`. The `selection` should have the same names/variables as the
/// keys for this tensor map (or a subset of them), and only one entry,
/// describing the requested block.
///
/// The block memory is still managed by the tensor map, this block should
/// not be freed. The block is invalidated when the tensor map is freed with
/// `eqs_tensormap_free` or the set of keys is modified by calling one of
/// the `eqs_tensormap_keys_to_XXX` function.
///
/// @param tensor pointer to an existing tensor map
/// @param block pointer to be filled with a block
/// @param selection labels with a single entry describing which block is
///        requested
///
/// @returns The status code of this operation. If the status is not
///          `EQS_SUCCESS`, you can use `eqs_last_error()` to get the full
///          error message.
#[no_mangle]
pub unsafe extern "C" fn eqs_tensormap_block_selection(
    tensor: *const eqs_tensormap_t,
    block: *mut *const eqs_block_t,
    selection: eqs_labels_t,
) -> eqs_status_t {
    catch_unwind(|| {
        check_pointers!(tensor, block);

        let selection = selection.to_rust()?;
        let rust_block = (*tensor).tensor().block(&selection)?;
        *block = eqs_block_t::from_ref(rust_block);

        Ok(())
    })
}

/// Merge blocks with the same value for selected keys variables along the
/// property axis.
///
/// The variables (names) of `keys_to_move` will be moved from the keys to
/// the property labels, and blocks with the same remaining keys variables
/// will be merged together along the property axis.
///
/// If `keys_to_move` does not contains any entries (`keys_to_move.count ==
/// 0`), then the new property labels will contain entries corresponding to
/// the merged blocks only. For example, merging a block with key `a=0` and
/// properties `p=1, 2` with a block with key `a=2` and properties `p=1, 3`
/// will produce a block with properties `a, p = (0, 1), (0, 2), (2, 1), (2,
/// 3)`.
///
/// If `keys_to_move` contains entries, then the property labels must be the
/// same for all the merged blocks. In that case, the merged property labels
/// will contains each of the entries of `keys_to_move` and then the current
/// property labels. For example, using `a=2, 3` in `keys_to_move`, and
/// blocks with properties `p=1, 2` will result in `a, p = (2, 1), (2, 2),
/// (3, 1), (3, 2)`.
///
/// The new sample labels will contains all of the merged blocks sample
/// labels. The order of the samples is controlled by `sort_samples`. If
/// `sort_samples` is true, samples are re-ordered to keep them
/// lexicographically sorted. Otherwise they are kept in the order in which
/// they appear in the blocks.
///
/// @param tensor pointer to an existing tensor map
/// @param keys_to_move description of the keys to move
/// @param sort_samples whether to sort the samples lexicographically after
///        merging blocks
///
/// @returns The status code of this operation. If the status is not
///          `EQS_SUCCESS`, you can use `eqs_last_error()` to get the full
///          error message.
#[no_mangle]
pub unsafe extern "C" fn eqs_tensormap_keys_to_properties(
    tensor: *mut eqs_tensormap_t,
    keys_to_move: eqs_labels_t,
    sort_samples: bool,
) -> eqs_status_t {
    catch_unwind(|| {
        check_pointers!(tensor);

        let keys_to_move = keys_to_move.to_rust()?;
        (*tensor).tensor_mut().keys_to_properties(&keys_to_move, sort_samples)
    })
}

/// Move the given variables from the component labels to the property
/// labels for each block in this tensor map.
///
/// `variables` must be an array of `variables_count` NULL-terminated
/// strings, encoded as UTF-8.
///
/// @param tensor pointer to an existing tensor map
/// @param variables names of the component variables to move to the
///        properties
/// @param variables_count number of entries in the `variables` array
///
/// @returns The status code of this operation. If the status is not
///          `EQS_SUCCESS`, you can use `eqs_last_error()` to get the full
///          error message.
#[no_mangle]
pub unsafe extern "C" fn eqs_tensormap_components_to_properties(
    tensor: *mut eqs_tensormap_t,
    variables: *const *const c_char,
    variables_count: u64,
) -> eqs_status_t {
    catch_unwind(|| {
        check_pointers!(tensor);

        let variables_count = usize::try_from(variables_count)?;
        let mut rust_variables = Vec::with_capacity(variables_count);
        if variables_count != 0 {
            check_pointers!(variables);
            for &variable in std::slice::from_raw_parts(variables, variables_count) {
                check_pointers!(variable);
                rust_variables.push(CStr::from_ptr(variable).to_str()?);
            }
        }

        (*tensor).tensor_mut().components_to_properties(&rust_variables)
    })
}

/// Merge blocks with the same value for selected keys variables along the
/// samples axis.
///
/// The variables (names) of `keys_to_move` will be moved from the keys to
/// the sample labels, and blocks with the same remaining keys variables
/// will be merged together along the sample axis.
///
/// `keys_to_move` must be empty (`keys_to_move.count == 0`), and the new
/// sample labels will contain entries corresponding to the merged blocks'
/// keys.
///
/// The new sample labels will contains all of the merged blocks sample
/// labels. The order of the samples is controlled by `sort_samples`. If
/// `sort_samples` is true, samples are re-ordered to keep them
/// lexicographically sorted. Otherwise they are kept in the order in which
/// they appear in the blocks.
///
/// This function is only implemented if all merged block have the same
/// property labels.
///
/// @param tensor pointer to an existing tensor map
/// @param keys_to_move description of the keys to move
/// @param sort_samples whether to sort the samples lexicographically after
///        merging blocks or not
///
/// @returns The status code of this operation. If the status is not
///          `EQS_SUCCESS`, you can use `eqs_last_error()` to get the full
///          error message.
#[no_mangle]
pub unsafe extern "C" fn eqs_tensormap_keys_to_samples(
    tensor: *mut eqs_tensormap_t,
    keys_to_move: eqs_labels_t,
    sort_samples: bool,
) -> eqs_status_t {
    catch_unwind(|| {
        check_pointers!(tensor);

        let keys_to_move = keys_to_move.to_rust()?;
        (*tensor).tensor_mut().keys_to_samples(&keys_to_move, sort_samples)
    })
}
