//! Building blocks shared by the operations moving key variables around:
//! grouping blocks by their remaining keys, merging sample rows, and the
//! final data movement through `eqs_array_t::move_samples_from`.

use std::ops::Range;
use std::sync::Arc;

use smallvec::SmallVec;

use crate::block::BasicBlock;
use crate::data::check_same_origin;
use crate::labels::LabelsRow;
use crate::{eqs_array_t, eqs_sample_mapping_t, Error, Labels, LabelsBuilder, Result, TensorBlock};

/// Shape of the arrays created when merging blocks
pub(crate) type Shape = SmallVec<[usize; 6]>;

/// Blocks of a tensor map grouped by the values of the keys which are not
/// moved.
#[derive(Debug)]
pub(crate) struct GroupedKeys {
    /// Keys of the tensor map after moving some variables, with one entry per
    /// group
    pub new_keys: Labels,
    /// Indexes of the blocks in each group, in tensor map order
    pub groups: Vec<Vec<usize>>,
    /// For each block, the values of the moved variables, in the order the
    /// variables were requested
    pub moved: Vec<LabelsRow>,
}

/// Split the `keys` of a tensor map between the `variables` to move and the
/// remaining ones, and group blocks sharing the same remaining key values.
pub(crate) fn group_by_remaining_keys(keys: &Labels, variables: &[&str]) -> Result<GroupedKeys> {
    let names = keys.names();

    let mut moved_indexes = Vec::with_capacity(variables.len());
    for variable in variables {
        let index = keys.variable_index(variable).ok_or_else(|| {
            Error::InvalidParameter(format!(
                "'{}' is not part of the keys for this tensor map",
                variable
            ))
        })?;

        if moved_indexes.contains(&index) {
            return Err(Error::InvalidParameter(format!(
                "can not move '{}' multiple times",
                variable
            )));
        }
        moved_indexes.push(index);
    }

    let kept_indexes = (0..names.len())
        .filter(|i| !moved_indexes.contains(i))
        .collect::<Vec<_>>();

    // without any remaining key variable, all blocks are merged together and
    // identified by the `_` variable
    let kept_names = if kept_indexes.is_empty() {
        vec!["_"]
    } else {
        kept_indexes.iter().map(|&i| names[i]).collect()
    };

    let mut new_keys = LabelsBuilder::new(kept_names)?;
    let mut groups: Vec<Vec<usize>> = Vec::new();
    let mut moved: Vec<LabelsRow> = Vec::with_capacity(keys.count());

    for (block_i, key) in keys.iter().enumerate() {
        let kept: LabelsRow = if kept_indexes.is_empty() {
            LabelsRow::from_slice(&[0])
        } else {
            kept_indexes.iter().map(|&i| key[i]).collect()
        };

        match new_keys.position(&kept) {
            Some(group) => groups[group].push(block_i),
            None => {
                new_keys.add(&kept)?;
                groups.push(vec![block_i]);
            }
        }

        moved.push(moved_indexes.iter().map(|&i| key[i]).collect());
    }

    Ok(GroupedKeys {
        new_keys: new_keys.finish(),
        groups,
        moved,
    })
}

/// Get a copy of `labels` with the rows sorted in lexicographic order
pub(crate) fn sorted(labels: &Labels) -> Result<Labels> {
    let mut rows = labels.iter().collect::<Vec<_>>();
    rows.sort_unstable();
    Labels::new(&labels.names(), rows.concat())
}

/// Cartesian product of two sets of labels, with `outer` varying the
/// slowest.
pub(crate) fn product(outer: &Labels, inner: &Labels) -> Result<Labels> {
    let mut names = outer.names();
    names.extend(inner.names());

    let mut builder = LabelsBuilder::new(names)?;
    let mut row = LabelsRow::new();
    for outer_row in outer.iter() {
        for inner_row in inner.iter() {
            row.clear();
            row.extend_from_slice(outer_row);
            row.extend_from_slice(inner_row);
            builder.add(&row)?;
        }
    }

    Ok(builder.finish())
}

/// Merge rows coming from multiple blocks in a single set of labels with the
/// given `names`. Duplicated rows are only kept once, at the position of
/// their first occurrence, and the rows are sorted if `sort` is `true`.
///
/// This returns the merged labels, and for each block the position of each
/// of its rows in the merged labels.
pub(crate) fn merge_rows(
    names: &[&str],
    rows: &[Vec<LabelsRow>],
    sort: bool,
) -> Result<(Labels, Vec<Vec<usize>>)> {
    let mut builder = LabelsBuilder::new(names.to_vec())?;
    for row in rows.iter().flatten() {
        if builder.position(row).is_none() {
            builder.add(row)?;
        }
    }

    let mut merged = builder.finish();
    if sort {
        merged = sorted(&merged)?;
    }

    let positions = rows
        .iter()
        .map(|block_rows| {
            block_rows
                .iter()
                .map(|row| {
                    merged.position(row)?.ok_or_else(|| {
                        Error::Internal(format!("missing row {:?} in merged labels", row))
                    })
                })
                .collect::<Result<Vec<_>>>()
        })
        .collect::<Result<Vec<_>>>()?;

    Ok((merged, positions))
}

/// Check that all the `blocks` in a group have the same component labels,
/// for the values and every gradient.
pub(crate) fn check_same_components(blocks: &[&TensorBlock], operation: &str) -> Result<()> {
    let Some((first, others)) = blocks.split_first() else {
        return Ok(());
    };

    for block in others {
        if block.values().components() != first.values().components() {
            return Err(Error::InvalidParameter(format!(
                "can not move keys to {}: components must be the same in all blocks that are merged together",
                operation
            )));
        }

        for (parameter, gradient) in first.gradients() {
            let other = block.gradient(parameter).ok_or_else(|| {
                Error::Internal(format!("missing gradient with respect to '{}'", parameter))
            })?;

            if other.components() != gradient.components() {
                return Err(Error::InvalidParameter(format!(
                    "can not move keys to {}: components of the gradients with respect to '{}' \
                    must be the same in all blocks that are merged together",
                    operation, parameter
                )));
            }
        }
    }

    Ok(())
}

/// Check that all the arrays in the given `blocks` come from the same data
/// origin.
pub(crate) fn check_group_origin(blocks: &[&TensorBlock], operation: &str) -> Result<()> {
    let arrays = blocks.iter().flat_map(|&block| {
        std::iter::once(block.values().data())
            .chain(block.gradients().map(|(_, gradient)| gradient.data()))
    });

    check_same_origin(arrays, operation)
}

/// Data coming from a single block into a merged block
#[derive(Debug, Clone)]
pub(crate) struct Contribution {
    /// Index of the block in the tensor map
    pub block: usize,
    /// For each sample of the block, position of this sample in the merged
    /// block
    pub samples: Vec<usize>,
    /// Where to put the properties of the block in the merged block
    pub properties: Range<usize>,
}

impl Contribution {
    fn mapping(&self) -> Vec<eqs_sample_mapping_t> {
        self.samples
            .iter()
            .enumerate()
            .map(|(input, &output)| eqs_sample_mapping_t { input, output })
            .collect()
    }
}

/// Everything needed to build the gradient with respect to one parameter in
/// a merged block
#[derive(Debug)]
pub(crate) struct GradientMerge {
    parameter: String,
    samples: Labels,
    components: Vec<Labels>,
    contributions: Vec<Contribution>,
}

/// Everything needed to build a merged block, computed before allocating
/// any array.
#[derive(Debug)]
pub(crate) struct BlockMerge {
    /// Block used to create new arrays
    pub template: usize,
    pub samples: Labels,
    pub components: Vec<Labels>,
    pub properties: Labels,
    pub contributions: Vec<Contribution>,
    pub gradients: Vec<GradientMerge>,
}

/// Merge the gradients of the blocks contributing to a merged block. The
/// first variable (`sample`) of the gradient samples is updated to refer to
/// the samples of the merged block.
pub(crate) fn merge_gradients(
    blocks: &[TensorBlock],
    template: usize,
    contributions: &[Contribution],
    sort_samples: bool,
) -> Result<Vec<GradientMerge>> {
    let mut merged = Vec::new();
    for (parameter, reference) in blocks[template].gradients() {
        let mut rows = Vec::with_capacity(contributions.len());
        for contribution in contributions {
            let gradient = blocks[contribution.block]
                .gradient(parameter)
                .ok_or_else(|| {
                    Error::Internal(format!("missing gradient with respect to '{}'", parameter))
                })?;

            let block_rows = gradient
                .samples()
                .iter()
                .map(|row| -> Result<LabelsRow> {
                    let mut new_row = LabelsRow::from_slice(row);
                    new_row[0] = merged_sample(row[0], &contribution.samples)?;
                    Ok(new_row)
                })
                .collect::<Result<Vec<_>>>()?;

            rows.push(block_rows);
        }

        let names = reference.samples().names();
        let (samples, positions) = merge_rows(&names, &rows, sort_samples)?;

        let contributions = contributions
            .iter()
            .zip(positions)
            .map(|(contribution, samples)| Contribution {
                block: contribution.block,
                samples,
                properties: contribution.properties.clone(),
            })
            .collect();

        merged.push(GradientMerge {
            parameter: parameter.to_string(),
            samples,
            components: reference.components().to_vec(),
            contributions,
        });
    }

    Ok(merged)
}

/// Translate a gradient `sample` value, i.e. an index in the samples of the
/// original block, to an index in the samples of the merged block
fn merged_sample(sample: i32, mapping: &[usize]) -> Result<i32> {
    let position = usize::try_from(sample)
        .ok()
        .and_then(|sample| mapping.get(sample))
        .ok_or_else(|| {
            Error::Internal(format!(
                "gradient sample {} is out of bounds for a block with {} samples",
                sample,
                mapping.len()
            ))
        })?;

    i32::try_from(*position).map_err(|_| {
        Error::Internal(format!("sample index {} does not fit in i32", position))
    })
}

fn shape_of(samples: &Labels, components: &[Labels], properties: &Labels) -> Shape {
    let mut shape = Shape::new();
    shape.push(samples.count());
    shape.extend(components.iter().map(Labels::count));
    shape.push(properties.count());
    shape
}

/// Create a zero-filled array from `template` and fill it with the data of
/// each contribution
fn merge_data<'a>(
    template: &BasicBlock,
    shape: &[usize],
    contributions: &[Contribution],
    get: impl Fn(usize) -> Result<&'a BasicBlock>,
) -> Result<eqs_array_t> {
    let mut data = template.data().create(shape)?;
    for contribution in contributions {
        let input = get(contribution.block)?;
        data.move_samples_from(
            input.data(),
            &contribution.mapping(),
            contribution.properties.clone(),
        )?;
    }
    Ok(data)
}

impl BlockMerge {
    /// Allocate the merged arrays and move the data of every contributing
    /// block in them.
    pub(crate) fn execute(self, blocks: &[TensorBlock]) -> Result<TensorBlock> {
        let template = &blocks[self.template];

        let shape = shape_of(&self.samples, &self.components, &self.properties);
        tracing::trace!(?shape, blocks = self.contributions.len(), "merging blocks");

        let data = merge_data(template.values(), &shape, &self.contributions, |i| {
            Ok(blocks[i].values())
        })?;

        let properties = Arc::new(self.properties);
        let values = BasicBlock::new(data, self.samples, self.components, Arc::clone(&properties))?;

        let mut gradients = Vec::with_capacity(self.gradients.len());
        for gradient in self.gradients {
            let parameter = gradient.parameter;
            let reference = template.gradient(&parameter).ok_or_else(|| {
                Error::Internal(format!("missing gradient with respect to '{}'", parameter))
            })?;

            let shape = shape_of(&gradient.samples, &gradient.components, &properties);
            let data = merge_data(reference, &shape, &gradient.contributions, |i| {
                blocks[i].gradient(&parameter).ok_or_else(|| {
                    Error::Internal(format!("missing gradient with respect to '{}'", parameter))
                })
            })?;

            let block = BasicBlock::new(
                data,
                gradient.samples,
                gradient.components,
                Arc::clone(&properties),
            )?;
            gradients.push((parameter, block));
        }

        TensorBlock::from_parts(values, gradients)
    }
}
