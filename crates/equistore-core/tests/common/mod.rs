//! Shared helpers for the integration tests: an [`Array`] backend counting
//! how many arrays are alive, and builders for small tensor maps.
#![allow(dead_code)]

use std::any::Any;
use std::cell::Cell;
use std::ops::Range;
use std::sync::Arc;

use equistore_core::data::{eqs_data_origin_t, register_data_origin};
use equistore_core::{
    eqs_array_t, eqs_sample_mapping_t, Array, Error, Labels, Result, TensorBlock, TensorMap,
};
use ndarray::ArrayD;

pub const COUNTING_DATA_ORIGIN: &str = "tests.counting";

/// Status returned by a `CountingArray` callback made to fail with
/// [`fail_callback`]
pub const FAILURE_STATUS: i32 = -42;

thread_local! {
    static CREATED: Cell<usize> = const { Cell::new(0) };
    static DESTROYED: Cell<usize> = const { Cell::new(0) };
    static FAILURE: Cell<Option<(&'static str, usize)>> = const { Cell::new(None) };
}

/// Make the `callback` of every `CountingArray` on the current thread fail
/// once it succeeded `successes` times. The failure is reset after it
/// happened.
pub fn fail_callback(callback: &'static str, successes: usize) {
    FAILURE.with(|failure| failure.set(Some((callback, successes))));
}

/// Remove any pending failure set with [`fail_callback`]
pub fn clear_failure() {
    FAILURE.with(|failure| failure.set(None));
}

fn check_failure(callback: &str) -> Result<()> {
    FAILURE.with(|failure| match failure.get() {
        Some((name, 0)) if name == callback => {
            failure.set(None);
            Err(Error::External {
                status: FAILURE_STATUS,
                message: format!("simulated failure in {}", callback),
            })
        }
        Some((name, successes)) if name == callback => {
            failure.set(Some((name, successes - 1)));
            Ok(())
        }
        _ => Ok(()),
    })
}

/// Number of `CountingArray` created on the current thread
pub fn created() -> usize {
    CREATED.with(Cell::get)
}

/// Number of `CountingArray` destroyed on the current thread
pub fn destroyed() -> usize {
    DESTROYED.with(Cell::get)
}

/// Number of `CountingArray` currently alive on the current thread
pub fn alive() -> usize {
    created() - destroyed()
}

/// `ndarray::ArrayD<f64>` with a separate data origin, keeping track of
/// creation and destruction
#[derive(Debug)]
pub struct CountingArray {
    data: ArrayD<f64>,
}

impl CountingArray {
    pub fn new(data: ArrayD<f64>) -> CountingArray {
        CREATED.with(|count| count.set(count.get() + 1));
        CountingArray { data }
    }

    pub fn data(&self) -> &ArrayD<f64> {
        &self.data
    }
}

impl Drop for CountingArray {
    fn drop(&mut self) {
        DESTROYED.with(|count| count.set(count.get() + 1));
    }
}

impl Array for CountingArray {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn origin(&self) -> Result<eqs_data_origin_t> {
        register_data_origin(COUNTING_DATA_ORIGIN)
    }

    fn shape(&self) -> &[usize] {
        self.data.shape()
    }

    fn reshape(&mut self, shape: &[usize]) -> Result<()> {
        check_failure("reshape")?;
        Array::reshape(&mut self.data, shape)
    }

    fn swap_axes(&mut self, axis_1: usize, axis_2: usize) -> Result<()> {
        Array::swap_axes(&mut self.data, axis_1, axis_2)
    }

    fn create(&self, shape: &[usize]) -> Result<Box<dyn Array>> {
        check_failure("create")?;
        Ok(Box::new(CountingArray::new(ArrayD::zeros(shape))))
    }

    fn copy(&self) -> Result<Box<dyn Array>> {
        Ok(Box::new(CountingArray::new(self.data.clone())))
    }

    fn move_samples_from(
        &mut self,
        input: &dyn Array,
        samples: &[eqs_sample_mapping_t],
        properties: Range<usize>,
    ) -> Result<()> {
        check_failure("move_samples_from")?;
        let input = input
            .as_any()
            .downcast_ref::<CountingArray>()
            .ok_or_else(|| Error::InvalidParameter("input is not a CountingArray".into()))?;

        Array::move_samples_from(&mut self.data, &input.data, samples, properties)
    }
}

pub fn labels(names: &[&str], values: Vec<i32>) -> Labels {
    Labels::new(names, values).unwrap()
}

pub fn counting(data: ArrayD<f64>) -> eqs_array_t {
    eqs_array_t::new(Box::new(CountingArray::new(data)))
}

pub fn dense(data: ArrayD<f64>) -> eqs_array_t {
    eqs_array_t::new(Box::new(data))
}

/// Get the data of `array`, which must be a `CountingArray` or an
/// `ndarray::ArrayD<f64>`
pub fn as_ndarray(array: &eqs_array_t) -> &ArrayD<f64> {
    if let Some(array) = array.downcast_ref::<CountingArray>() {
        return array.data();
    }
    array.downcast_ref::<ArrayD<f64>>().unwrap()
}

/// Block with samples `["structure", "center"]`, property `["n"]`, and the
/// given `data` of shape `(samples, properties)`
pub fn block(
    array: fn(ArrayD<f64>) -> eqs_array_t,
    samples: Vec<i32>,
    properties: Vec<i32>,
    value: f64,
) -> TensorBlock {
    let samples = labels(&["structure", "center"], samples);
    let properties = labels(&["n"], properties);
    let data = ArrayD::from_elem(vec![samples.count(), properties.count()], value);

    TensorBlock::new(array(data), samples, vec![], Arc::new(properties)).unwrap()
}

/// Tensor map with keys `["center_species", "neighbor_species"]`, similar to
/// what a spherical expansion calculator would produce. Each block is filled
/// with its index plus one.
pub fn species_tensor(array: fn(ArrayD<f64>) -> eqs_array_t) -> TensorMap {
    let keys = labels(
        &["center_species", "neighbor_species"],
        vec![1, 1, 1, 6, 6, 1, 6, 6],
    );

    let blocks = vec![
        // center_species = 1
        block(array, vec![0, 0, 0, 1, 1, 0], vec![0, 1], 1.0),
        block(array, vec![0, 1, 1, 0], vec![0, 1], 2.0),
        // center_species = 6
        block(array, vec![0, 2, 1, 1], vec![0, 1], 3.0),
        block(array, vec![0, 2], vec![0, 1], 4.0),
    ];

    TensorMap::new(keys, blocks).unwrap()
}
