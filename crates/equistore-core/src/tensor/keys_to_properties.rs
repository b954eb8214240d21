use std::ops::Range;

use crate::labels::LabelsRow;
use crate::{Error, Labels, LabelsBuilder, Result, TensorBlock};

use super::utils::{
    check_group_origin, check_same_components, group_by_remaining_keys, merge_gradients,
    merge_rows, product, BlockMerge, Contribution,
};
use super::TensorMap;

impl TensorMap {
    /// Merge blocks with the same value for selected keys variables along the
    /// property axis.
    ///
    /// The variables (names) of `keys_to_move` will be moved from the keys to
    /// the property labels, and blocks with the same remaining keys variables
    /// will be merged together along the property axis.
    ///
    /// If `keys_to_move` does not contain any entries (`keys_to_move.count()
    /// == 0`), then the new property labels will contain entries
    /// corresponding to the merged blocks only. For example, merging a block
    /// with key `a=0` and properties `p=1, 2` with a block with key `a=2` and
    /// properties `p=1, 3` will produce a block with properties `a, p =
    /// (0, 1), (0, 2), (2, 1), (2, 3)`.
    ///
    /// If `keys_to_move` contains entries, then the property labels must be
    /// the same for all the merged blocks. In that case, the merged property
    /// labels will contains each of the entries of `keys_to_move` and then
    /// the current property labels. For example, using `a=2, 3` in
    /// `keys_to_move`, and blocks with properties `p=1, 2` will result in `a,
    /// p = (2, 1), (2, 2), (3, 1), (3, 2)`. Blocks whose moved key is not
    /// part of `keys_to_move` are not included in the merged block.
    ///
    /// The new sample labels will contain all of the merged blocks sample
    /// labels, sorted in lexicographic order if `sort_samples` is `true`. A
    /// sample present in multiple blocks is only included once, and each
    /// block fills its own properties in the corresponding row.
    #[tracing::instrument(
        level = "debug",
        skip_all,
        fields(variables = ?keys_to_move.names(), sort_samples = sort_samples)
    )]
    pub fn keys_to_properties(&mut self, keys_to_move: &Labels, sort_samples: bool) -> Result<()> {
        if keys_to_move.size() == 0 {
            return Ok(());
        }

        let names = keys_to_move.names();
        if let Some(first) = self.blocks.first() {
            let properties = first.values().properties();
            for name in &names {
                if properties.variable_index(name).is_some() {
                    return Err(Error::InvalidParameter(format!(
                        "can not move '{}' to the properties: there is already a property variable with this name",
                        name
                    )));
                }
            }
        }

        let grouped = group_by_remaining_keys(&self.keys, &names)?;

        let merges = grouped
            .groups
            .iter()
            .map(|group| {
                plan_merge(&self.blocks, group, &grouped.moved, keys_to_move, sort_samples)
            })
            .collect::<Result<Vec<_>>>()?;

        let blocks = merges
            .into_iter()
            .map(|merge| merge.execute(&self.blocks))
            .collect::<Result<Vec<_>>>()?;

        tracing::debug!(
            old_blocks = self.blocks.len(),
            new_blocks = blocks.len(),
            "moved keys to properties"
        );
        self.replace(grouped.new_keys, blocks);

        Ok(())
    }
}

/// Compute the labels of the merged block for a single group of blocks, and
/// where the data of each block should go.
fn plan_merge(
    blocks: &[TensorBlock],
    group: &[usize],
    moved: &[LabelsRow],
    keys_to_move: &Labels,
    sort_samples: bool,
) -> Result<BlockMerge> {
    let group_blocks = group.iter().map(|&i| &blocks[i]).collect::<Vec<_>>();
    check_same_components(&group_blocks, "properties")?;
    check_group_origin(&group_blocks, "keys_to_properties")?;

    let template = group[0];
    let first = &blocks[template];

    let (properties, windows) = if keys_to_move.count() == 0 {
        properties_from_blocks(blocks, group, moved, keys_to_move)?
    } else {
        let reference = first.values().properties();
        for &block_i in group {
            if blocks[block_i].values().properties() != reference {
                return Err(Error::InvalidParameter(
                    "can not provide values for the keys to move to properties if \
                    the blocks have different property labels"
                        .into(),
                ));
            }
        }

        let n_properties = reference.count();
        let mut windows = Vec::with_capacity(group.len());
        for &block_i in group {
            if let Some(position) = keys_to_move.position(&moved[block_i])? {
                let start = position * n_properties;
                windows.push((block_i, start..start + n_properties));
            }
        }

        (product(keys_to_move, reference)?, windows)
    };

    let rows = windows
        .iter()
        .map(|(block_i, _)| {
            blocks[*block_i]
                .values()
                .samples()
                .iter()
                .map(LabelsRow::from_slice)
                .collect::<Vec<_>>()
        })
        .collect::<Vec<_>>();

    let names = first.values().samples().names();
    let (samples, positions) = merge_rows(&names, &rows, sort_samples)?;

    let contributions = windows
        .into_iter()
        .zip(positions)
        .map(|((block, properties), samples)| Contribution {
            block,
            samples,
            properties,
        })
        .collect::<Vec<_>>();

    let gradients = merge_gradients(blocks, template, &contributions, sort_samples)?;

    Ok(BlockMerge {
        template,
        samples,
        components: first.values().components().to_vec(),
        properties,
        contributions,
        gradients,
    })
}

/// New properties when `keys_to_move` does not contain entries: each block
/// gets its own window, containing its property rows prefixed by the value
/// of the moved keys.
fn properties_from_blocks(
    blocks: &[TensorBlock],
    group: &[usize],
    moved: &[LabelsRow],
    keys_to_move: &Labels,
) -> Result<(Labels, Vec<(usize, Range<usize>)>)> {
    let first = &blocks[group[0]];

    let mut names = keys_to_move.names();
    names.extend(first.values().properties().names());
    let mut builder = LabelsBuilder::new(names)?;

    let mut windows = Vec::with_capacity(group.len());
    let mut row = LabelsRow::new();
    for &block_i in group {
        let start = builder.count();
        for property in blocks[block_i].values().properties().iter() {
            row.clear();
            row.extend_from_slice(&moved[block_i]);
            row.extend_from_slice(property);
            builder.add(&row)?;
        }
        windows.push((block_i, start..builder.count()));
    }

    Ok((builder.finish(), windows))
}

#[cfg(all(test, feature = "ndarray"))]
mod tests {
    use std::sync::Arc;

    use ndarray::{array, ArrayD};

    use super::*;
    use crate::eqs_array_t;
    use crate::tensor::tests::{block, labels};

    fn block_with_data(samples: Vec<i32>, properties: Vec<i32>, data: ArrayD<f64>) -> TensorBlock {
        TensorBlock::new(
            eqs_array_t::new(Box::new(data)),
            labels(&["s"], samples),
            vec![],
            Arc::new(labels(&["p"], properties)),
        )
        .unwrap()
    }

    fn values(block: &TensorBlock) -> &ArrayD<f64> {
        block.values().data().downcast_ref::<ArrayD<f64>>().unwrap()
    }

    #[test]
    fn test_empty_keys_to_move() {
        let mut tensor = TensorMap::new(
            labels(&["a"], vec![0, 2]),
            vec![
                block_with_data(vec![0, 1], vec![1, 2], array![[1.0, 2.0], [3.0, 4.0]].into_dyn()),
                block_with_data(vec![1, 2], vec![1, 3], array![[5.0, 6.0], [7.0, 8.0]].into_dyn()),
            ],
        )
        .unwrap();

        tensor
            .keys_to_properties(&Labels::empty(&["a"]).unwrap(), true)
            .unwrap();

        assert_eq!(tensor.keys(), &Labels::single());
        assert_eq!(tensor.blocks().len(), 1);

        let block = &tensor.blocks()[0];
        assert_eq!(
            **block.values().properties(),
            labels(&["a", "p"], vec![0, 1, 0, 2, 2, 1, 2, 3])
        );
        assert_eq!(*block.values().samples(), labels(&["s"], vec![0, 1, 2]));

        let expected = array![
            [1.0, 2.0, 0.0, 0.0],
            [3.0, 4.0, 5.0, 6.0],
            [0.0, 0.0, 7.0, 8.0],
        ];
        assert_eq!(values(block), &expected.into_dyn());
    }

    #[test]
    fn test_explicit_keys_to_move() {
        let mut tensor = TensorMap::new(
            labels(&["a"], vec![0, 2]),
            vec![
                block_with_data(vec![0], vec![1, 2], array![[1.0, 2.0]].into_dyn()),
                block_with_data(vec![0], vec![1, 2], array![[3.0, 4.0]].into_dyn()),
            ],
        )
        .unwrap();

        tensor
            .keys_to_properties(&labels(&["a"], vec![2, 3]), false)
            .unwrap();

        let block = &tensor.blocks()[0];
        assert_eq!(
            **block.values().properties(),
            labels(&["a", "p"], vec![2, 1, 2, 2, 3, 1, 3, 2])
        );
        assert_eq!(*block.values().samples(), labels(&["s"], vec![0]));
        assert_eq!(values(block), &array![[3.0, 4.0, 0.0, 0.0]].into_dyn());
    }

    #[test]
    fn test_mismatched_properties() {
        let mut tensor = TensorMap::new(
            labels(&["a"], vec![0, 1]),
            vec![block(vec![0], vec![1, 2], 1.0), block(vec![0], vec![1, 3], 2.0)],
        )
        .unwrap();

        let error = tensor
            .keys_to_properties(&labels(&["a"], vec![0, 1]), false)
            .unwrap_err();
        assert!(matches!(error, Error::InvalidParameter(_)));

        // the tensor map is unchanged
        assert_eq!(*tensor.keys(), labels(&["a"], vec![0, 1]));
        assert_eq!(tensor.blocks().len(), 2);
        assert_eq!(**tensor.blocks()[1].values().properties(), labels(&["p"], vec![1, 3]));
    }

    #[test]
    fn test_partial_keys() {
        let mut tensor = TensorMap::new(
            labels(&["a", "b"], vec![0, 0, 0, 1, 1, 0]),
            vec![
                block(vec![0], vec![0], 1.0),
                block(vec![1], vec![0], 2.0),
                block(vec![2], vec![0], 3.0),
            ],
        )
        .unwrap();

        tensor
            .keys_to_properties(&Labels::empty(&["b"]).unwrap(), false)
            .unwrap();

        assert_eq!(*tensor.keys(), labels(&["a"], vec![0, 1]));

        let first = &tensor.blocks()[0];
        assert_eq!(**first.values().properties(), labels(&["b", "p"], vec![0, 0, 1, 0]));
        assert_eq!(*first.values().samples(), labels(&["s"], vec![0, 1]));
        assert_eq!(values(first), &array![[1.0, 0.0], [0.0, 2.0]].into_dyn());

        let second = &tensor.blocks()[1];
        assert_eq!(**second.values().properties(), labels(&["b", "p"], vec![0, 0]));
        assert_eq!(values(second), &array![[3.0]].into_dyn());
    }

    #[test]
    fn test_unsorted_samples() {
        let mut tensor = TensorMap::new(
            labels(&["a"], vec![0, 1]),
            vec![block(vec![3, 1], vec![0], 1.0), block(vec![2, 1], vec![0], 2.0)],
        )
        .unwrap();

        let mut sorted = tensor.try_clone().unwrap();

        tensor
            .keys_to_properties(&Labels::empty(&["a"]).unwrap(), false)
            .unwrap();
        let block = &tensor.blocks()[0];
        assert_eq!(*block.values().samples(), labels(&["s"], vec![3, 1, 2]));
        assert_eq!(
            values(block),
            &array![[1.0, 0.0], [1.0, 2.0], [0.0, 2.0]].into_dyn()
        );

        sorted
            .keys_to_properties(&Labels::empty(&["a"]).unwrap(), true)
            .unwrap();
        let block = &sorted.blocks()[0];
        assert_eq!(*block.values().samples(), labels(&["s"], vec![1, 2, 3]));
        assert_eq!(
            values(block),
            &array![[1.0, 2.0], [0.0, 2.0], [1.0, 0.0]].into_dyn()
        );
    }

    #[test]
    fn test_gradients() {
        let mut first = block_with_data(vec![0, 1], vec![0], array![[1.0], [2.0]].into_dyn());
        first
            .add_gradient(
                "g",
                eqs_array_t::new(Box::new(array![[10.0], [11.0]].into_dyn())),
                labels(&["sample", "x"], vec![0, 0, 1, 0]),
                vec![],
            )
            .unwrap();

        let mut second = block_with_data(vec![1, 2], vec![1], array![[3.0], [4.0]].into_dyn());
        second
            .add_gradient(
                "g",
                eqs_array_t::new(Box::new(array![[12.0]].into_dyn())),
                labels(&["sample", "x"], vec![1, 5]),
                vec![],
            )
            .unwrap();

        let mut tensor = TensorMap::new(labels(&["a"], vec![0, 1]), vec![first, second]).unwrap();
        tensor
            .keys_to_properties(&Labels::empty(&["a"]).unwrap(), false)
            .unwrap();

        let block = &tensor.blocks()[0];
        assert_eq!(*block.values().samples(), labels(&["s"], vec![0, 1, 2]));

        let gradient = block.gradient("g").unwrap();
        assert!(Arc::ptr_eq(gradient.properties(), block.values().properties()));
        assert_eq!(
            *gradient.samples(),
            labels(&["sample", "x"], vec![0, 0, 1, 0, 2, 5])
        );

        let data = gradient.data().downcast_ref::<ArrayD<f64>>().unwrap();
        assert_eq!(
            data,
            &array![[10.0, 0.0], [11.0, 0.0], [0.0, 12.0]].into_dyn()
        );
    }

    #[test]
    fn test_errors() {
        let mut tensor = TensorMap::new(
            labels(&["a"], vec![0, 1]),
            vec![block(vec![0], vec![0], 1.0), block(vec![0], vec![0], 2.0)],
        )
        .unwrap();

        let error = tensor
            .keys_to_properties(&Labels::empty(&["b"]).unwrap(), false)
            .unwrap_err();
        assert_eq!(
            error.to_string(),
            "invalid parameter: 'b' is not part of the keys for this tensor map"
        );

        let mut tensor = TensorMap::new(
            labels(&["p"], vec![0, 1]),
            vec![block(vec![0], vec![0], 1.0), block(vec![0], vec![0], 2.0)],
        )
        .unwrap();
        let error = tensor
            .keys_to_properties(&Labels::empty(&["p"]).unwrap(), false)
            .unwrap_err();
        assert!(error.to_string().contains("already a property variable"));
    }

    #[test]
    fn test_no_variables() {
        let mut tensor = TensorMap::new(
            labels(&["a"], vec![0, 1]),
            vec![block(vec![0], vec![0], 1.0), block(vec![0], vec![0], 2.0)],
        )
        .unwrap();

        tensor
            .keys_to_properties(&Labels::empty(&[]).unwrap(), false)
            .unwrap();
        assert_eq!(tensor.blocks().len(), 2);
    }
}
