//! Reference [`Array`] backend storing data in `ndarray::ArrayD<f64>`.
//!
//! Arrays created from this backend use the `rust.ndarray` data origin.
//!
//! # Examples
//!
//! ```
//! use equistore_core::{eqs_array_t, Labels, TensorBlock};
//! use ndarray::ArrayD;
//!
//! let values = ArrayD::from_elem(vec![3, 2], 1.0);
//! let block = TensorBlock::new(
//!     eqs_array_t::new(Box::new(values)),
//!     Labels::new(&["sample"], vec![0, 1, 2]).unwrap(),
//!     Vec::new(),
//!     Labels::new(&["property"], vec![5, 3]).unwrap().into(),
//! ).unwrap();
//!
//! let data = block.values().data().downcast_ref::<ArrayD<f64>>().unwrap();
//! assert_eq!(data.shape(), [3, 2]);
//! ```

use std::any::Any;
use std::ops::Range;

use ::ndarray::{ArrayD, Axis, IxDyn, Slice};

use crate::{Error, Result};

use super::{eqs_data_origin_t, eqs_sample_mapping_t, register_data_origin, Array};

/// Name of the data origin used by `ndarray::ArrayD<f64>` arrays
pub const NDARRAY_DATA_ORIGIN: &str = "rust.ndarray";

impl Array for ArrayD<f64> {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn origin(&self) -> Result<eqs_data_origin_t> {
        register_data_origin(NDARRAY_DATA_ORIGIN)
    }

    fn shape(&self) -> &[usize] {
        ArrayD::shape(self)
    }

    fn reshape(&mut self, shape: &[usize]) -> Result<()> {
        let count = shape.iter().product::<usize>();
        if count != self.len() {
            return Err(Error::InvalidParameter(format!(
                "can not reshape array with shape {:?} to {:?}: the number of elements differs",
                ArrayD::shape(self),
                shape
            )));
        }

        let array = std::mem::take(self);
        // swap_axes leaves arrays in a non-standard layout, which can not be
        // reshaped in place
        let array = if array.is_standard_layout() {
            array
        } else {
            array.as_standard_layout().into_owned()
        };

        *self = array
            .into_shape_with_order(IxDyn(shape))
            .map_err(|e| Error::Internal(format!("failed to reshape array: {}", e)))?;

        Ok(())
    }

    fn swap_axes(&mut self, axis_1: usize, axis_2: usize) -> Result<()> {
        if axis_1 >= self.ndim() || axis_2 >= self.ndim() {
            return Err(Error::InvalidParameter(format!(
                "can not swap axes {} and {} in an array with {} dimensions",
                axis_1,
                axis_2,
                self.ndim()
            )));
        }

        ArrayD::swap_axes(self, axis_1, axis_2);
        Ok(())
    }

    fn create(&self, shape: &[usize]) -> Result<Box<dyn Array>> {
        Ok(Box::new(ArrayD::<f64>::zeros(IxDyn(shape))))
    }

    fn copy(&self) -> Result<Box<dyn Array>> {
        Ok(Box::new(self.clone()))
    }

    fn move_samples_from(
        &mut self,
        input: &dyn Array,
        samples: &[eqs_sample_mapping_t],
        properties: Range<usize>,
    ) -> Result<()> {
        let input = input.as_any().downcast_ref::<ArrayD<f64>>().ok_or_else(|| {
            Error::InvalidParameter(
                "input array in move_samples_from is not an ndarray::ArrayD<f64>".into(),
            )
        })?;

        let output_shape = ArrayD::shape(self);
        let input_shape = input.shape();
        if output_shape.len() < 2 || input_shape.len() != output_shape.len() {
            return Err(Error::InvalidParameter(format!(
                "incompatible arrays in move_samples_from: input has shape {:?}, output has shape {:?}",
                input_shape, output_shape
            )));
        }

        let last = output_shape.len() - 1;
        if properties.start > properties.end || properties.end > output_shape[last] {
            return Err(Error::InvalidParameter(format!(
                "invalid property range {:?} for an array with {} properties",
                properties, output_shape[last]
            )));
        }

        let compatible = input_shape[1..last] == output_shape[1..last]
            && input_shape[last] == properties.len();
        if !compatible {
            return Err(Error::InvalidParameter(format!(
                "incompatible arrays in move_samples_from: can not put input with shape {:?} \
                in properties {:?} of output with shape {:?}",
                input_shape, properties, output_shape
            )));
        }

        let (input_samples, output_samples) = (input_shape[0], output_shape[0]);
        for sample in samples {
            if sample.input >= input_samples || sample.output >= output_samples {
                return Err(Error::InvalidParameter(format!(
                    "sample mapping {:?} is out of bounds (input has {} samples, output has {})",
                    sample, input_samples, output_samples
                )));
            }

            let value = input.index_axis(Axis(0), sample.input);
            let mut output = self.index_axis_mut(Axis(0), sample.output);
            output
                .slice_axis_mut(Axis(last - 1), Slice::from(properties.clone()))
                .assign(&value);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use ::ndarray::{array, ArrayD};

    use super::*;
    use crate::data::get_data_origin;
    use crate::eqs_array_t;

    fn ndarray(data: ArrayD<f64>) -> eqs_array_t {
        eqs_array_t::new(Box::new(data))
    }

    #[test]
    fn test_origin() {
        let array = ndarray(ArrayD::zeros(vec![2]));
        let origin = array.origin().unwrap();
        assert_eq!(get_data_origin(origin).unwrap(), NDARRAY_DATA_ORIGIN);
    }

    #[test]
    fn test_shape_and_reshape() {
        let mut array = ndarray(ArrayD::zeros(vec![2, 3, 4]));
        assert_eq!(array.shape().unwrap(), [2, 3, 4]);

        array.reshape(&[6, 4]).unwrap();
        assert_eq!(array.shape().unwrap(), [6, 4]);

        let error = array.reshape(&[5, 5]).unwrap_err();
        assert!(matches!(error, Error::InvalidParameter(_)));
        assert_eq!(array.shape().unwrap(), [6, 4]);
    }

    #[test]
    fn test_swap_axes_then_reshape() {
        let data = array![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]].into_dyn();
        let mut array = ndarray(data);

        array.swap_axes(0, 1).unwrap();
        assert_eq!(array.shape().unwrap(), [3, 2]);

        array.reshape(&[6]).unwrap();
        let data = array.downcast_ref::<ArrayD<f64>>().unwrap();
        assert_eq!(data.as_slice().unwrap(), [1.0, 4.0, 2.0, 5.0, 3.0, 6.0]);

        assert!(array.swap_axes(0, 3).is_err());
    }

    #[test]
    fn test_create_and_copy() {
        let array = ndarray(ArrayD::from_elem(vec![2, 2], 3.0));

        let created = array.create(&[4, 1]).unwrap();
        let created = created.downcast_ref::<ArrayD<f64>>().unwrap();
        assert_eq!(created, &ArrayD::<f64>::zeros(vec![4, 1]));

        let copy = array.try_clone().unwrap();
        assert_ne!(copy.ptr, array.ptr);
        assert_eq!(
            copy.downcast_ref::<ArrayD<f64>>(),
            array.downcast_ref::<ArrayD<f64>>()
        );
    }

    #[test]
    fn test_move_samples_from() {
        let input = ndarray(array![[1.0, 2.0], [3.0, 4.0]].into_dyn());
        let mut output = input.create(&[3, 5]).unwrap();

        let samples = [
            eqs_sample_mapping_t { input: 0, output: 2 },
            eqs_sample_mapping_t { input: 1, output: 0 },
        ];
        output.move_samples_from(&input, &samples, 3..5).unwrap();

        let expected = array![
            [0.0, 0.0, 0.0, 3.0, 4.0],
            [0.0, 0.0, 0.0, 0.0, 0.0],
            [0.0, 0.0, 0.0, 1.0, 2.0],
        ]
        .into_dyn();
        assert_eq!(output.downcast_ref::<ArrayD<f64>>().unwrap(), &expected);

        // wrong property range
        let error = output.move_samples_from(&input, &samples, 0..3).unwrap_err();
        assert!(matches!(error, Error::InvalidParameter(_)));

        // out of bounds samples
        let samples = [eqs_sample_mapping_t { input: 2, output: 0 }];
        let error = output.move_samples_from(&input, &samples, 0..2).unwrap_err();
        assert!(error.to_string().contains("out of bounds"));
    }
}
