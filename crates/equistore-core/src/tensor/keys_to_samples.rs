use crate::labels::LabelsRow;
use crate::{Error, Labels, Result, TensorBlock};

use super::utils::{
    check_group_origin, check_same_components, group_by_remaining_keys, merge_gradients,
    merge_rows, BlockMerge, Contribution,
};
use super::TensorMap;

impl TensorMap {
    /// Merge blocks with the same value for selected keys variables along the
    /// samples axis.
    ///
    /// The variables (names) of `keys_to_move` will be moved from the keys to
    /// the sample labels, and blocks with the same remaining keys variables
    /// will be merged together along the sample axis.
    ///
    /// `keys_to_move` must be empty (`keys_to_move.count() == 0`), and the
    /// new sample labels will contain entries corresponding to the merged
    /// blocks' keys, followed by the existing sample variables.
    ///
    /// The new sample labels will contains all of the merged blocks sample
    /// labels, sorted in lexicographic order if `sort_samples` is `true`.
    /// All the merged blocks must have the same property and component
    /// labels.
    #[tracing::instrument(
        level = "debug",
        skip_all,
        fields(variables = ?keys_to_move.names(), sort_samples = sort_samples)
    )]
    pub fn keys_to_samples(&mut self, keys_to_move: &Labels, sort_samples: bool) -> Result<()> {
        if keys_to_move.size() == 0 {
            return Ok(());
        }

        if keys_to_move.count() > 0 {
            return Err(Error::InvalidParameter(
                "keys_to_move should be empty in keys_to_samples, \
                providing values for the keys is not supported"
                    .into(),
            ));
        }

        let names = keys_to_move.names();
        if let Some(first) = self.blocks.first() {
            let samples = first.values().samples();
            for name in &names {
                if samples.variable_index(name).is_some() {
                    return Err(Error::InvalidParameter(format!(
                        "can not move '{}' to the samples: there is already a sample variable with this name",
                        name
                    )));
                }
            }
        }

        let grouped = group_by_remaining_keys(&self.keys, &names)?;

        let merges = grouped
            .groups
            .iter()
            .map(|group| plan_merge(&self.blocks, group, &grouped.moved, &names, sort_samples))
            .collect::<Result<Vec<_>>>()?;

        let blocks = merges
            .into_iter()
            .map(|merge| merge.execute(&self.blocks))
            .collect::<Result<Vec<_>>>()?;

        tracing::debug!(
            old_blocks = self.blocks.len(),
            new_blocks = blocks.len(),
            "moved keys to samples"
        );
        self.replace(grouped.new_keys, blocks);

        Ok(())
    }
}

fn plan_merge(
    blocks: &[TensorBlock],
    group: &[usize],
    moved: &[LabelsRow],
    moved_names: &[&str],
    sort_samples: bool,
) -> Result<BlockMerge> {
    let group_blocks = group.iter().map(|&i| &blocks[i]).collect::<Vec<_>>();
    check_same_components(&group_blocks, "samples")?;

    let template = group[0];
    let first = &blocks[template];
    let properties = first.values().properties();
    for block in &group_blocks {
        if block.values().properties() != properties {
            return Err(Error::InvalidParameter(
                "can not move keys to samples if the blocks have different property labels"
                    .into(),
            ));
        }
    }

    check_group_origin(&group_blocks, "keys_to_samples")?;

    let rows = group
        .iter()
        .map(|&block_i| {
            blocks[block_i]
                .values()
                .samples()
                .iter()
                .map(|sample| {
                    let mut row = moved[block_i].clone();
                    row.extend_from_slice(sample);
                    row
                })
                .collect::<Vec<_>>()
        })
        .collect::<Vec<_>>();

    let mut names = moved_names.to_vec();
    names.extend(first.values().samples().names());
    let (samples, positions) = merge_rows(&names, &rows, sort_samples)?;

    let contributions = group
        .iter()
        .zip(positions)
        .map(|(&block, samples)| Contribution {
            block,
            samples,
            properties: 0..properties.count(),
        })
        .collect::<Vec<_>>();

    let gradients = merge_gradients(blocks, template, &contributions, sort_samples)?;

    Ok(BlockMerge {
        template,
        samples,
        components: first.values().components().to_vec(),
        properties: (**properties).clone(),
        contributions,
        gradients,
    })
}
