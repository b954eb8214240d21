//! Tensor maps: a set of blocks indexed by key labels.

use crate::{Error, Labels, Result, TensorBlock};

pub(crate) mod utils;

mod components_to_properties;
mod keys_to_properties;
mod keys_to_samples;

/// A tensor map is the main user-facing struct of this library, and can
/// store any kind of data used in atomistic machine learning.
///
/// A tensor map contains a list of `TensorBlock`s, each one associated with
/// a key in the form of a single `Labels` entry.
///
/// It provides functions to merge blocks together by moving some of these
/// keys to the samples or properties labels of the blocks, transforming the
/// sparse representation of the data to a dense one.
#[derive(Debug)]
pub struct TensorMap {
    keys: Labels,
    blocks: Vec<TensorBlock>,
}

/// Check that `first` and `other` have the same variable names, returning
/// an error mentioning `what` otherwise
fn check_same_names(first: &Labels, other: &Labels, what: &str) -> Result<()> {
    if first.names() != other.names() {
        return Err(Error::InvalidParameter(format!(
            "all blocks must have the same {} label names, got [{}] and [{}]",
            what,
            first.names().join(", "),
            other.names().join(", "),
        )));
    }
    Ok(())
}

fn check_same_components_names(first: &[Labels], other: &[Labels], what: &str) -> Result<()> {
    if first.len() != other.len() {
        return Err(Error::InvalidParameter(format!(
            "all blocks must have the same number of {}, got {} and {}",
            what,
            first.len(),
            other.len()
        )));
    }

    for (first, other) in first.iter().zip(other) {
        check_same_names(first, other, what)?;
    }

    Ok(())
}

impl TensorMap {
    /// Create a new `TensorMap` with the given `keys` and `blocks`. The
    /// number of keys must match the number of blocks, and all the blocks
    /// must use the same variable names for their labels.
    pub fn new(keys: Labels, blocks: Vec<TensorBlock>) -> Result<TensorMap> {
        TensorMap::validate(&keys, &blocks.iter().collect::<Vec<_>>())?;
        Ok(TensorMap { keys, blocks })
    }

    /// Check that a tensor map could be created from the given `keys` and
    /// `blocks`, without taking ownership of them.
    pub fn validate(keys: &Labels, blocks: &[&TensorBlock]) -> Result<()> {
        if blocks.len() != keys.count() {
            return Err(Error::InvalidParameter(format!(
                "expected the same number of blocks ({}) as the number of \
                entries in the keys when creating a tensor, got {}",
                keys.count(),
                blocks.len()
            )));
        }

        let Some((first, others)) = blocks.split_first() else {
            return Ok(());
        };

        let first_gradients = {
            let mut list = first.gradients_list();
            list.sort_unstable();
            list
        };

        for block in others {
            let values = block.values();
            check_same_names(first.values().samples(), values.samples(), "samples")?;
            check_same_components_names(
                first.values().components(),
                values.components(),
                "components",
            )?;
            check_same_names(first.values().properties(), values.properties(), "properties")?;

            let mut gradients = block.gradients_list();
            gradients.sort_unstable();
            if gradients != first_gradients {
                return Err(Error::InvalidParameter(format!(
                    "all blocks must have the same gradients, got [{}] and [{}]",
                    first_gradients.join(", "),
                    gradients.join(", "),
                )));
            }

            for (parameter, first_gradient) in first.gradients() {
                let gradient = block.gradient(parameter).ok_or_else(|| {
                    Error::Internal(format!("missing gradient with respect to '{}'", parameter))
                })?;

                check_same_names(first_gradient.samples(), gradient.samples(), "gradient samples")?;
                check_same_components_names(
                    first_gradient.components(),
                    gradient.components(),
                    "gradient components",
                )?;
            }
        }

        Ok(())
    }

    /// Get the keys defined in this tensor map
    pub fn keys(&self) -> &Labels {
        &self.keys
    }

    /// Get all the blocks in this tensor map, in the same order as the keys
    pub fn blocks(&self) -> &[TensorBlock] {
        &self.blocks
    }

    /// Iterate over `(key, block)` pairs in this tensor map
    pub fn iter(&self) -> impl ExactSizeIterator<Item = (&[i32], &TensorBlock)> + '_ {
        self.keys.iter().zip(&self.blocks)
    }

    /// Get the block at the given `index` in this tensor map
    pub fn block_by_id(&self, index: usize) -> Result<&TensorBlock> {
        self.blocks.get(index).ok_or_else(|| {
            Error::InvalidParameter(format!(
                "block index out of bounds: we have {} blocks but the index is {}",
                self.blocks.len(),
                index
            ))
        })
    }

    /// Get the index of the blocks matching the given `selection`.
    ///
    /// The selection must contain a single entry, defining the requested
    /// values of the keys. It can contain only a subset of the key variables,
    /// in which case all blocks matching the requested variables are
    /// returned.
    pub fn blocks_matching(&self, selection: &Labels) -> Result<Vec<usize>> {
        if selection.count() != 1 {
            return Err(Error::InvalidParameter(format!(
                "block selection labels must contain a single row, got {}",
                selection.count()
            )));
        }

        let mut variables = Vec::with_capacity(selection.size());
        for name in selection.names() {
            let index = self.keys.variable_index(name).ok_or_else(|| {
                Error::InvalidParameter(format!(
                    "'{}' is not part of the keys for this tensor map",
                    name
                ))
            })?;
            variables.push(index);
        }

        let selection = &selection[0];
        let matching = self
            .keys
            .iter()
            .enumerate()
            .filter(|(_, key)| {
                variables
                    .iter()
                    .zip(selection)
                    .all(|(&variable, value)| key[variable] == *value)
            })
            .map(|(i, _)| i)
            .collect();

        Ok(matching)
    }

    /// Get the block matching the given `selection`. This function fails if
    /// zero or more than one block matches the selection.
    pub fn block(&self, selection: &Labels) -> Result<&TensorBlock> {
        let matching = self.blocks_matching(selection)?;
        match matching.as_slice() {
            [index] => Ok(&self.blocks[*index]),
            [] => Err(Error::InvalidParameter(format!(
                "no blocks matched the selection ({})",
                format_selection(selection)
            ))),
            _ => Err(Error::InvalidParameter(format!(
                "{} blocks matched the selection ({}), expected only one",
                matching.len(),
                format_selection(selection)
            ))),
        }
    }

    /// Make a deep copy of this tensor map, including all the data and
    /// metadata.
    pub fn try_clone(&self) -> Result<TensorMap> {
        let blocks = self
            .blocks
            .iter()
            .map(TensorBlock::try_clone)
            .collect::<Result<Vec<_>>>()?;

        Ok(TensorMap {
            keys: self.keys.clone(),
            blocks,
        })
    }

    /// Replace the keys and blocks of this tensor map at once
    fn replace(&mut self, keys: Labels, blocks: Vec<TensorBlock>) {
        debug_assert_eq!(keys.count(), blocks.len());
        self.keys = keys;
        self.blocks = blocks;
    }
}

fn format_selection(selection: &Labels) -> String {
    selection
        .names()
        .iter()
        .zip(&selection[0])
        .map(|(name, value)| format!("{} = {}", name, value))
        .collect::<Vec<_>>()
        .join(", ")
}
