use std::sync::Arc;

use crate::block::BasicBlock;
use crate::{eqs_array_t, Error, Labels, Result, TensorBlock};

use super::utils::{product, Shape};
use super::TensorMap;

impl TensorMap {
    /// Move the given `variables` from the component labels to the property
    /// labels for each block in this `TensorMap`.
    ///
    /// All the variables of a given component axis must be moved together,
    /// and the moved variables become the first property variables. Component
    /// axes are ordered by their first mention in `variables`, variables of
    /// the same axis keep the order they have in the component labels.
    #[tracing::instrument(level = "debug", skip_all, fields(variables = ?variables))]
    pub fn components_to_properties(&mut self, variables: &[&str]) -> Result<()> {
        if variables.is_empty() {
            return Ok(());
        }

        let Some(first) = self.blocks.first() else {
            return Ok(());
        };

        let axes = components_axes(
            first.values().components(),
            first.values().properties(),
            variables,
        )?;

        let blocks = self
            .blocks
            .iter()
            .map(|block| block.components_to_properties(&axes))
            .collect::<Result<Vec<_>>>()?;

        tracing::debug!(?axes, blocks = blocks.len(), "moved components to properties");
        self.blocks = blocks;

        Ok(())
    }
}

/// Find the component axes containing the given `variables`, in the order
/// in which they are first mentioned.
fn components_axes(
    components: &[Labels],
    properties: &Labels,
    variables: &[&str],
) -> Result<Vec<usize>> {
    let mut axes = Vec::new();
    for (i, variable) in variables.iter().enumerate() {
        if variables[..i].contains(variable) {
            return Err(Error::InvalidParameter(format!(
                "can not move '{}' to the properties multiple times",
                variable
            )));
        }

        if properties.variable_index(variable).is_some() {
            return Err(Error::InvalidParameter(format!(
                "can not move '{}' to the properties: there is already a property variable with this name",
                variable
            )));
        }

        let axis = components
            .iter()
            .position(|component| component.variable_index(variable).is_some())
            .ok_or_else(|| {
                Error::InvalidParameter(format!(
                    "'{}' is not part of the components for this tensor map",
                    variable
                ))
            })?;

        if !axes.contains(&axis) {
            axes.push(axis);
        }
    }

    for &axis in &axes {
        for name in components[axis].names() {
            if !variables.contains(&name) {
                return Err(Error::InvalidParameter(format!(
                    "can not move only part of a component to the properties: \
                    '{}' must be moved together with [{}]",
                    name,
                    components[axis].names().join(", ")
                )));
            }
        }
    }

    Ok(axes)
}

/// Move the `axis` of `data` right before the last axis, keeping the order
/// of the other axes, and then merge it with the last axis.
fn merge_into_last_axis(data: &mut eqs_array_t, axis: usize) -> Result<()> {
    let shape = Shape::from_slice(data.shape()?);
    let last = shape.len() - 1;
    debug_assert!(axis > 0 && axis < last);

    for i in axis..last - 1 {
        data.swap_axes(i, i + 1)?;
    }

    let mut new_shape = shape
        .iter()
        .enumerate()
        .filter(|&(i, _)| i != axis && i != last)
        .map(|(_, &extent)| extent)
        .collect::<Shape>();
    new_shape.push(shape[axis] * shape[last]);

    data.reshape(&new_shape)
}

struct GradientParts {
    parameter: String,
    data: eqs_array_t,
    samples: Labels,
    components: Vec<Labels>,
}

impl TensorBlock {
    /// Create a new block where the component `axes` (indexes in the values
    /// components) are merged with the properties. The first axis in `axes`
    /// ends up as the outermost property variable.
    fn components_to_properties(&self, axes: &[usize]) -> Result<TensorBlock> {
        let values = self.values();
        let mut data = values.data().try_clone()?;
        let mut components = values.components().to_vec();
        let mut properties = (**values.properties()).clone();

        let mut gradients = self
            .gradients()
            .map(|(parameter, gradient)| -> Result<GradientParts> {
                Ok(GradientParts {
                    parameter: parameter.to_string(),
                    data: gradient.data().try_clone()?,
                    samples: gradient.samples().clone(),
                    components: gradient.components().to_vec(),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let mut moved: Vec<usize> = Vec::with_capacity(axes.len());
        for &axis in axes.iter().rev() {
            let current = axis - moved.iter().filter(|&&m| m < axis).count();
            let n_components = components.len();

            merge_into_last_axis(&mut data, 1 + current)?;
            for gradient in &mut gradients {
                // gradients can have extra components before the values ones
                let extra = gradient.components.len() - n_components;
                merge_into_last_axis(&mut gradient.data, 1 + extra + current)?;
                gradient.components.remove(extra + current);
            }

            let component = components.remove(current);
            properties = product(&component, &properties)?;
            moved.push(axis);
        }

        let properties = Arc::new(properties);
        let values = BasicBlock::new(
            data,
            values.samples().clone(),
            components,
            Arc::clone(&properties),
        )?;

        let gradients = gradients
            .into_iter()
            .map(|gradient| -> Result<(String, BasicBlock)> {
                let block = BasicBlock::new(
                    gradient.data,
                    gradient.samples,
                    gradient.components,
                    Arc::clone(&properties),
                )?;
                Ok((gradient.parameter, block))
            })
            .collect::<Result<Vec<_>>>()?;

        TensorBlock::from_parts(values, gradients)
    }
}
