//! Blocks: one data array with labels along each axis, and named gradients.

use std::collections::HashMap;
use std::ffi::{c_char, CString};
use std::sync::Arc;

use crate::data::check_same_origin;
use crate::utils::ConstCStrArray;
use crate::{eqs_array_t, Error, Labels, Result};

/// Selector used to access the values of a block (as opposed to one of its
/// gradients) in [`TensorBlock::data`] and [`TensorBlock::labels`]
pub const VALUES: &str = "values";

/// A single data array with the corresponding labels: samples for the first
/// axis, any number of components for the intermediary axes, and properties
/// for the last axis.
///
/// This is used both for the values of a [`TensorBlock`] and for each of its
/// gradients. The properties are stored behind an `Arc` so they can be shared
/// between the values and the gradients.
#[derive(Debug)]
pub struct BasicBlock {
    data: eqs_array_t,
    samples: Labels,
    components: Vec<Labels>,
    properties: Arc<Labels>,
}

impl BasicBlock {
    /// Create a new `BasicBlock`, validating the shape of `data` against
    /// the labels
    pub(crate) fn new(
        data: eqs_array_t,
        samples: Labels,
        components: Vec<Labels>,
        properties: Arc<Labels>,
    ) -> Result<BasicBlock> {
        BasicBlock::check(&data, &samples, &components, &properties, "data")?;
        Ok(BasicBlock {
            data,
            samples,
            components,
            properties,
        })
    }

    /// Check that the shape of `data` matches the given labels
    fn check(
        data: &eqs_array_t,
        samples: &Labels,
        components: &[Labels],
        properties: &Labels,
        context: &str,
    ) -> Result<()> {
        let mut expected = Vec::with_capacity(components.len() + 2);
        expected.push(samples.count());
        expected.extend(components.iter().map(Labels::count));
        expected.push(properties.count());

        data.check_shape(&expected, context)
    }

    /// Get the data array
    pub fn data(&self) -> &eqs_array_t {
        &self.data
    }

    /// Labels of the first axis
    pub fn samples(&self) -> &Labels {
        &self.samples
    }

    /// Labels of the intermediary axes
    pub fn components(&self) -> &[Labels] {
        &self.components
    }

    /// Labels of the last axis
    pub fn properties(&self) -> &Arc<Labels> {
        &self.properties
    }

    /// Get the labels for the given `axis` of the data array
    pub fn labels(&self, axis: usize) -> Result<&Labels> {
        let n_components = self.components.len();
        if axis == 0 {
            Ok(&self.samples)
        } else if axis <= n_components {
            Ok(&self.components[axis - 1])
        } else if axis == n_components + 1 {
            Ok(&self.properties)
        } else {
            Err(Error::InvalidParameter(format!(
                "tried to get the labels for axis {}, but we only have {} axes for this block",
                axis,
                n_components + 2
            )))
        }
    }

    /// Deep copy of this block, using the given (already copied) properties
    fn try_clone_with(&self, properties: Arc<Labels>) -> Result<BasicBlock> {
        Ok(BasicBlock {
            data: self.data.try_clone()?,
            samples: self.samples.clone(),
            components: self.components.clone(),
            properties,
        })
    }
}

/// Basic building block for tensor map. A single block contains a
/// n-dimensional `eqs_array_t`, and n sets of `Labels` (one for each
/// dimension).
///
/// A block can also contain gradients of the values with respect to a
/// variety of parameters. In this case, each gradient has a separate set of
/// sample and component labels but share the property labels with the
/// values.
#[derive(Debug)]
pub struct TensorBlock {
    values: BasicBlock,
    gradients: HashMap<String, BasicBlock>,
    gradient_parameters: ConstCStrArray,
}

impl TensorBlock {
    /// Create a new `TensorBlock` containing the given `data`, described by
    /// the `samples`, `components` and `properties` labels. The block takes
    /// ownership of the array, and will destroy it when dropped.
    pub fn new(
        data: eqs_array_t,
        samples: Labels,
        components: Vec<Labels>,
        properties: Arc<Labels>,
    ) -> Result<TensorBlock> {
        Ok(TensorBlock {
            values: BasicBlock::new(data, samples, components, properties)?,
            gradients: HashMap::new(),
            gradient_parameters: ConstCStrArray::new(Vec::new()),
        })
    }

    /// Check that a block could be created from the given data and labels,
    /// without taking ownership of anything.
    pub fn validate(
        data: &eqs_array_t,
        samples: &Labels,
        components: &[Labels],
        properties: &Labels,
    ) -> Result<()> {
        BasicBlock::check(data, samples, components, properties, "data")
    }

    /// Assemble a block from already validated parts
    pub(crate) fn from_parts(
        values: BasicBlock,
        gradients: Vec<(String, BasicBlock)>,
    ) -> Result<TensorBlock> {
        let mut block = TensorBlock {
            values,
            gradients: HashMap::new(),
            gradient_parameters: ConstCStrArray::new(Vec::new()),
        };

        for (parameter, gradient) in gradients {
            if !Arc::ptr_eq(&gradient.properties, &block.values.properties) {
                return Err(Error::Internal(format!(
                    "gradient with respect to '{}' does not share properties with the values",
                    parameter
                )));
            }
            block.gradient_parameters.push(CString::new(parameter.as_str())?);
            block.gradients.insert(parameter, gradient);
        }

        Ok(block)
    }

    /// Get the values data and metadata in this block
    pub fn values(&self) -> &BasicBlock {
        &self.values
    }

    /// Get the gradient with respect to the given `parameter`, if it exists
    pub fn gradient(&self, parameter: &str) -> Option<&BasicBlock> {
        self.gradients.get(parameter)
    }

    /// Get the list of gradients parameters in this block, in the order they
    /// were added
    pub fn gradients_list(&self) -> Vec<&str> {
        self.gradient_parameters.iter().collect()
    }

    /// Iterate over `(parameter, gradient)` pairs in this block, in the order
    /// they were added
    pub fn gradients(&self) -> impl Iterator<Item = (&str, &BasicBlock)> + '_ {
        self.gradient_parameters
            .iter()
            .filter_map(|parameter| self.gradients.get(parameter).map(|g| (parameter, g)))
    }

    pub(crate) fn gradient_parameters_c(&self) -> (*const *const c_char, usize) {
        (self.gradient_parameters.as_ptr(), self.gradient_parameters.len())
    }

    /// Get either the values (if `selector` is `"values"`) or the gradient
    /// with respect to `selector`
    pub fn select(&self, selector: &str) -> Result<&BasicBlock> {
        if selector == VALUES {
            return Ok(&self.values);
        }

        self.gradients.get(selector).ok_or_else(|| {
            Error::InvalidParameter(format!(
                "can not find gradients with respect to '{}' in this block",
                selector
            ))
        })
    }

    /// Get the data array for the values or the gradient named `selector`
    pub fn data(&self, selector: &str) -> Result<&eqs_array_t> {
        Ok(self.select(selector)?.data())
    }

    /// Get the labels of `axis` for the values or the gradient named
    /// `selector`
    pub fn labels(&self, selector: &str, axis: usize) -> Result<&Labels> {
        self.select(selector)?.labels(axis)
    }

    /// Check that a gradient could be added to this block, without taking
    /// ownership of anything.
    pub fn validate_gradient(
        &self,
        parameter: &str,
        data: &eqs_array_t,
        samples: &Labels,
        components: &[Labels],
    ) -> Result<()> {
        if parameter == VALUES {
            return Err(Error::InvalidParameter(format!(
                "can not store gradient with respect to '{}'",
                VALUES
            )));
        }

        if parameter.is_empty() || parameter.contains('\0') {
            return Err(Error::InvalidParameter(format!(
                "invalid gradient parameter name {:?}",
                parameter
            )));
        }

        if self.gradients.contains_key(parameter) {
            return Err(Error::InvalidParameter(format!(
                "gradient with respect to '{}' already exists for this block",
                parameter
            )));
        }

        check_same_origin([&self.values.data, data], "gradient data")?;
        check_gradient_samples(samples, self.values.samples.count())?;

        let values_components = &self.values.components;
        if components.len() < values_components.len() {
            return Err(Error::InvalidParameter(
                "gradients components should contain at least as many labels as the values components"
                    .into(),
            ));
        }

        let extra = components.len() - values_components.len();
        if components[extra..] != values_components[..] {
            return Err(Error::InvalidParameter(
                "gradients and values components mismatch".into(),
            ));
        }

        let shape = data.shape()?;
        let n_properties = self.values.properties.count();
        if shape.last() != Some(&n_properties) {
            return Err(Error::InvalidParameter(format!(
                "the last axis of the gradient array ({:?}) must match the number of properties in the block ({})",
                shape.last(),
                n_properties
            )));
        }

        BasicBlock::check(
            data,
            samples,
            components,
            &self.values.properties,
            "gradient data",
        )
    }

    /// Add a gradient with respect to `parameter` in this block. The
    /// gradient `samples` must have a first variable named `sample`,
    /// containing the index of the corresponding row in the values. The
    /// gradient `components` must end with the values components, and the
    /// gradient properties are the same as the values properties.
    pub fn add_gradient(
        &mut self,
        parameter: &str,
        data: eqs_array_t,
        samples: Labels,
        components: Vec<Labels>,
    ) -> Result<()> {
        self.validate_gradient(parameter, &data, &samples, &components)?;

        let gradient = BasicBlock {
            data,
            samples,
            components,
            properties: Arc::clone(&self.values.properties),
        };

        self.gradient_parameters.push(CString::new(parameter)?);
        self.gradients.insert(parameter.to_string(), gradient);

        Ok(())
    }

    /// Make a deep copy of this block, including all the gradients, using
    /// the `copy` function of each array.
    pub fn try_clone(&self) -> Result<TensorBlock> {
        let properties = Arc::new((*self.values.properties).clone());

        let values = self.values.try_clone_with(Arc::clone(&properties))?;
        let gradients = self
            .gradients()
            .map(|(parameter, gradient)| -> Result<(String, BasicBlock)> {
                let gradient = gradient.try_clone_with(Arc::clone(&properties))?;
                Ok((parameter.to_string(), gradient))
            })
            .collect::<Result<Vec<_>>>()?;

        TensorBlock::from_parts(values, gradients)
    }
}

/// Gradient samples must start with a `sample` variable containing indexes
/// into the `n_values_samples` rows of the values.
fn check_gradient_samples(samples: &Labels, n_values_samples: usize) -> Result<()> {
    let names = samples.names();
    match names.first() {
        None => {
            return Err(Error::InvalidParameter(
                "gradients samples must have at least one dimension named 'sample', we got none"
                    .into(),
            ))
        }
        Some(&"sample") => {}
        Some(first) => {
            return Err(Error::InvalidParameter(format!(
                "'{}' is not valid for the first dimension in the gradients samples labels. \
                It should be 'sample'",
                first
            )))
        }
    }

    for row in samples.iter() {
        let in_range = usize::try_from(row[0]).map_or(false, |s| s < n_values_samples);
        if !in_range {
            return Err(Error::InvalidParameter(format!(
                "gradient sample {:?} refers to sample {} but the values only have {} samples",
                row, row[0], n_values_samples
            )));
        }
    }

    Ok(())
}
