//! Tests of the C API, driving it the way a C caller would: labels built
//! from raw arrays, arrays given by value, and results read through output
//! pointers.

mod common;

use std::ffi::{c_char, c_void, CStr, CString};
use std::mem::ManuallyDrop;

use equistore_core::c_api::*;
use equistore_core::{
    eqs_array_t, eqs_status_t, EQS_INTERNAL_ERROR, EQS_INVALID_PARAMETER_ERROR, EQS_SUCCESS,
};
use ndarray::ArrayD;

use common::{as_ndarray, counting, created, dense, destroyed};

/// Labels owned by the test, viewed as `eqs_labels_t`
struct CLabels {
    _names: Vec<CString>,
    names_ptr: Vec<*const c_char>,
    values: Vec<i32>,
}

impl CLabels {
    fn new(names: &[&str], values: Vec<i32>) -> CLabels {
        let names = names
            .iter()
            .map(|&name| CString::new(name).unwrap())
            .collect::<Vec<_>>();
        let names_ptr = names.iter().map(|name| name.as_ptr()).collect();
        CLabels {
            _names: names,
            names_ptr,
            values,
        }
    }

    fn as_eqs(&self) -> eqs_labels_t {
        let size = self.names_ptr.len();
        eqs_labels_t {
            labels_ptr: std::ptr::null(),
            names: self.names_ptr.as_ptr(),
            values: self.values.as_ptr(),
            size,
            count: if size == 0 { 0 } else { self.values.len() / size },
        }
    }
}

fn last_error() -> String {
    unsafe { CStr::from_ptr(eqs_last_error()) }
        .to_str()
        .unwrap()
        .to_owned()
}

/// Labels view to Rust vectors of names and values
fn read_labels(labels: &eqs_labels_t) -> (Vec<String>, Vec<i32>) {
    let names = (0..labels.size)
        .map(|i| unsafe { CStr::from_ptr(*labels.names.add(i)) })
        .map(|name| name.to_str().unwrap().to_owned())
        .collect();
    let values =
        unsafe { std::slice::from_raw_parts(labels.values, labels.size * labels.count) }.to_vec();
    (names, values)
}

/// Create a block through the C API with samples `s`, properties `p`, and a
/// counting array filled with `value`
fn c_block(samples: &[i32], properties: &[i32], value: f64) -> *mut eqs_block_t {
    let data = counting(ArrayD::from_elem(vec![samples.len(), properties.len()], value));
    let samples = CLabels::new(&["s"], samples.to_vec());
    let properties = CLabels::new(&["p"], properties.to_vec());

    let block = unsafe {
        eqs_block(
            data,
            samples.as_eqs(),
            std::ptr::null(),
            0,
            properties.as_eqs(),
        )
    };
    assert!(!block.is_null(), "{}", last_error());
    block
}

#[test]
fn test_tensormap_lifecycle() {
    let (created_before, destroyed_before) = (created(), destroyed());

    let keys = CLabels::new(&["a"], vec![0, 2]);
    let mut blocks = [c_block(&[0, 1], &[1, 2], 1.0), c_block(&[1, 2], &[1, 3], 2.0)];
    let tensor = unsafe { eqs_tensormap(keys.as_eqs(), blocks.as_mut_ptr(), 2) };
    assert!(!tensor.is_null(), "{}", last_error());

    let mut keys = eqs_labels_t {
        labels_ptr: std::ptr::null(),
        names: std::ptr::null(),
        values: std::ptr::null(),
        size: 0,
        count: 0,
    };
    let status = unsafe { eqs_tensormap_keys(tensor, &mut keys) };
    assert_eq!(status, EQS_SUCCESS);
    assert_eq!(read_labels(&keys), (vec!["a".to_owned()], vec![0, 2]));

    let mut position = 0;
    let status = unsafe { eqs_labels_position(keys, [2].as_ptr(), 1, &mut position) };
    assert_eq!(status, EQS_SUCCESS);
    assert_eq!(position, 1);

    let status = unsafe { eqs_labels_position(keys, [2, 0].as_ptr(), 2, &mut position) };
    assert_eq!(status, EQS_INVALID_PARAMETER_ERROR);
    assert!(last_error().contains("expected a label entry with 1 values, got 2"));

    let empty = CLabels::new(&["a"], vec![]);
    let status = unsafe { eqs_tensormap_keys_to_properties(tensor, empty.as_eqs(), true) };
    assert_eq!(status, EQS_SUCCESS, "{}", last_error());

    let mut block = std::ptr::null();
    let status = unsafe { eqs_tensormap_block_by_id(tensor, &mut block, 0) };
    assert_eq!(status, EQS_SUCCESS);

    let mut properties = keys;
    let status = unsafe { eqs_block_labels(block, c"values".as_ptr(), 1, &mut properties) };
    assert_eq!(status, EQS_SUCCESS);
    assert_eq!(
        read_labels(&properties),
        (
            vec!["a".to_owned(), "p".to_owned()],
            vec![0, 1, 0, 2, 2, 1, 2, 3]
        )
    );

    let mut data = ManuallyDrop::new(eqs_array_t::null());
    let status = unsafe { eqs_block_data(block, c"values".as_ptr(), &mut *data) };
    assert_eq!(status, EQS_SUCCESS);
    let expected = ndarray::arr2(&[
        [1.0, 1.0, 0.0, 0.0],
        [1.0, 1.0, 2.0, 2.0],
        [0.0, 0.0, 2.0, 2.0],
    ]);
    assert_eq!(*as_ndarray(&data), expected.into_dyn());

    let copy = unsafe { eqs_tensormap_copy(tensor) };
    assert!(!copy.is_null());

    unsafe {
        assert_eq!(eqs_tensormap_free(tensor), EQS_SUCCESS);
        assert_eq!(eqs_tensormap_free(copy), EQS_SUCCESS);
        assert_eq!(eqs_tensormap_free(std::ptr::null_mut()), EQS_SUCCESS);
    }

    // 2 initial arrays, 1 merged array and its copy
    assert_eq!(created() - created_before, 4);
    assert_eq!(destroyed() - destroyed_before, 4);
}

#[test]
fn test_failed_block_keeps_array() {
    let destroyed_before = destroyed();

    let mut data = ManuallyDrop::new(counting(ArrayD::zeros(vec![3, 2])));
    let samples = CLabels::new(&["s"], vec![0, 1]);
    let properties = CLabels::new(&["p"], vec![0, 1]);

    let block = unsafe {
        eqs_block(
            std::ptr::read(&*data),
            samples.as_eqs(),
            std::ptr::null(),
            0,
            properties.as_eqs(),
        )
    };

    assert!(block.is_null());
    assert!(last_error().contains("data"), "{}", last_error());
    assert_eq!(destroyed(), destroyed_before);

    // the caller still owns the array
    assert_eq!(data.shape().unwrap(), [3, 2]);
    unsafe { ManuallyDrop::drop(&mut data) };
    assert_eq!(destroyed() - destroyed_before, 1);
}

/// `copy` callback of an array implemented outside of Rust, reporting its
/// failure through `eqs_set_last_error`
unsafe extern "C" fn foreign_failing_copy(
    _: *const c_void,
    _: *mut eqs_array_t,
) -> eqs_status_t {
    eqs_set_last_error(c"the device holding this array is gone".as_ptr());
    -3
}

#[test]
fn test_foreign_callback_error_message() {
    let (created_before, destroyed_before) = (created(), destroyed());

    let mut data = counting(ArrayD::zeros(vec![2, 1]));
    data.copy = Some(foreign_failing_copy);

    let samples = CLabels::new(&["s"], vec![0, 1]);
    let properties = CLabels::new(&["p"], vec![0]);
    let block = unsafe {
        eqs_block(data, samples.as_eqs(), std::ptr::null(), 0, properties.as_eqs())
    };
    assert!(!block.is_null(), "{}", last_error());

    let copy = unsafe { eqs_block_copy(block) };
    assert!(copy.is_null());
    assert_eq!(
        last_error(),
        "external error (status -3): calling eqs_array_t.copy failed: \
        the device holding this array is gone"
    );

    let status = unsafe { eqs_block_free(block) };
    assert_eq!(status, EQS_SUCCESS);
    assert_eq!(created() - created_before, 1);
    assert_eq!(destroyed() - destroyed_before, 1);
}

#[test]
fn test_failed_tensormap_keeps_blocks() {
    let (created_before, destroyed_before) = (created(), destroyed());

    let block = c_block(&[0], &[0], 1.0);
    let other_samples = {
        let samples = CLabels::new(&["other"], vec![0]);
        let properties = CLabels::new(&["p"], vec![0]);
        let data = counting(ArrayD::zeros(vec![1, 1]));
        unsafe {
            eqs_block(
                data,
                samples.as_eqs(),
                std::ptr::null(),
                0,
                properties.as_eqs(),
            )
        }
    };
    assert!(!other_samples.is_null());

    let keys = CLabels::new(&["a"], vec![0, 1]);
    let mut blocks = [block, other_samples];
    let tensor = unsafe { eqs_tensormap(keys.as_eqs(), blocks.as_mut_ptr(), 2) };
    assert!(tensor.is_null());
    assert!(last_error().contains("same samples label names"), "{}", last_error());

    let mut blocks = [block, block];
    let tensor = unsafe { eqs_tensormap(keys.as_eqs(), blocks.as_mut_ptr(), 2) };
    assert!(tensor.is_null());
    assert!(last_error().contains("same block multiple times"));

    // no block was consumed
    assert_eq!(destroyed(), destroyed_before);
    unsafe {
        assert_eq!(eqs_block_free(block), EQS_SUCCESS);
        assert_eq!(eqs_block_free(other_samples), EQS_SUCCESS);
    }
    assert_eq!(created() - created_before, destroyed() - destroyed_before);
}

#[test]
fn test_gradients() {
    let block = c_block(&[0, 1], &[0], 1.0);

    let samples = CLabels::new(&["sample", "atom"], vec![0, 0, 1, 0, 1, 1]);
    let components = [CLabels::new(&["direction"], vec![0, 1, 2])];
    let components = components.iter().map(CLabels::as_eqs).collect::<Vec<_>>();

    let data = counting(ArrayD::zeros(vec![3, 3, 1]));
    let status = unsafe {
        eqs_block_add_gradient(
            block,
            c"positions".as_ptr(),
            data,
            samples.as_eqs(),
            components.as_ptr(),
            components.len(),
        )
    };
    assert_eq!(status, EQS_SUCCESS, "{}", last_error());

    let data = counting(ArrayD::zeros(vec![3, 3, 1]));
    let status = unsafe {
        eqs_block_add_gradient(
            block,
            c"positions".as_ptr(),
            data,
            samples.as_eqs(),
            components.as_ptr(),
            components.len(),
        )
    };
    assert_eq!(status, EQS_INVALID_PARAMETER_ERROR);
    assert!(last_error().contains("already exists"));

    // gradients must use the same kind of arrays as the values
    let mut data = ManuallyDrop::new(dense(ArrayD::zeros(vec![3, 3, 1])));
    let status = unsafe {
        eqs_block_add_gradient(
            block,
            c"strain".as_ptr(),
            std::ptr::read(&*data),
            samples.as_eqs(),
            components.as_ptr(),
            components.len(),
        )
    };
    assert_eq!(status, EQS_INTERNAL_ERROR);
    assert!(last_error().contains("different origins"), "{}", last_error());
    assert_eq!(data.shape().unwrap(), [3, 3, 1]);
    unsafe { ManuallyDrop::drop(&mut data) };

    let mut parameters = std::ptr::null();
    let mut count = 0;
    let status = unsafe { eqs_block_gradients_list(block, &mut parameters, &mut count) };
    assert_eq!(status, EQS_SUCCESS);
    assert_eq!(count, 1);
    let name = unsafe { CStr::from_ptr(*parameters) };
    assert_eq!(name.to_str().unwrap(), "positions");

    let copy = unsafe { eqs_block_copy(block) };
    assert!(!copy.is_null());

    let mut labels = samples.as_eqs();
    let status = unsafe { eqs_block_labels(copy, c"positions".as_ptr(), 0, &mut labels) };
    assert_eq!(status, EQS_SUCCESS);
    assert_eq!(read_labels(&labels).1, [0, 0, 1, 0, 1, 1]);

    let status = unsafe { eqs_block_labels(copy, c"cell".as_ptr(), 0, &mut labels) };
    assert_eq!(status, EQS_INVALID_PARAMETER_ERROR);

    unsafe {
        eqs_block_free(block);
        eqs_block_free(copy);
    }
}

#[test]
fn test_selection_and_components() {
    let block = {
        let data = counting(ArrayD::from_shape_fn(vec![1, 2, 1], |i| i[1] as f64));
        let samples = CLabels::new(&["s"], vec![0]);
        let components = [CLabels::new(&["x"], vec![0, 1])];
        let components = components.iter().map(CLabels::as_eqs).collect::<Vec<_>>();
        let properties = CLabels::new(&["p"], vec![0]);
        unsafe {
            eqs_block(
                data,
                samples.as_eqs(),
                components.as_ptr(),
                components.len(),
                properties.as_eqs(),
            )
        }
    };
    assert!(!block.is_null(), "{}", last_error());

    let keys = CLabels::new(&["a", "b"], vec![0, 1]);
    let mut blocks = [block];
    let tensor = unsafe { eqs_tensormap(keys.as_eqs(), blocks.as_mut_ptr(), 1) };
    assert!(!tensor.is_null(), "{}", last_error());

    let mut found = std::ptr::null();
    let selection = CLabels::new(&["b"], vec![1]);
    let status = unsafe { eqs_tensormap_block_selection(tensor, &mut found, selection.as_eqs()) };
    assert_eq!(status, EQS_SUCCESS);

    let selection = CLabels::new(&["b"], vec![3]);
    let status = unsafe { eqs_tensormap_block_selection(tensor, &mut found, selection.as_eqs()) };
    assert_eq!(status, EQS_INVALID_PARAMETER_ERROR);

    let variables = [c"x".as_ptr()];
    let status = unsafe { eqs_tensormap_components_to_properties(tensor, variables.as_ptr(), 1) };
    assert_eq!(status, EQS_SUCCESS, "{}", last_error());

    let status = unsafe { eqs_tensormap_block_by_id(tensor, &mut found, 0) };
    assert_eq!(status, EQS_SUCCESS);
    let mut data = ManuallyDrop::new(eqs_array_t::null());
    let status = unsafe { eqs_block_data(found, c"values".as_ptr(), &mut *data) };
    assert_eq!(status, EQS_SUCCESS);
    assert_eq!(data.shape().unwrap(), [1, 2]);
    assert_eq!(as_ndarray(&data).as_slice().unwrap(), [0.0, 1.0]);

    // `a` is no longer a key after the first call
    let keys_to_move = CLabels::new(&["a"], vec![]);
    let status = unsafe { eqs_tensormap_keys_to_samples(tensor, keys_to_move.as_eqs(), true) };
    assert_eq!(status, EQS_SUCCESS, "{}", last_error());

    let keys_to_move = CLabels::new(&["a"], vec![]);
    let status = unsafe { eqs_tensormap_keys_to_samples(tensor, keys_to_move.as_eqs(), true) };
    assert_eq!(status, EQS_INVALID_PARAMETER_ERROR);

    unsafe { eqs_tensormap_free(tensor) };
}
