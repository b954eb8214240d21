//! Building a tensor map and reshaping its blocks.
//!
//! This example demonstrates the core functionality of equistore-core:
//! - Creating labels, blocks with gradients and a tensor map
//! - Looking up blocks by index and by key selection
//! - Moving key variables to the properties and samples of the blocks
//! - Moving components to the properties
//!
//! Run with:
//! ```bash
//! cargo run --example first_tensormap
//! ```

use std::sync::Arc;

use anyhow::Result;
use equistore_core::{eqs_array_t, Labels, TensorBlock, TensorMap};
use ndarray::ArrayD;

fn main() -> Result<()> {
    println!("=== equistore: first tensor map ===\n");

    let mut tensor = build_tensor()?;
    describe(&tensor);

    println!("--- Selecting blocks ---");
    let selection = Labels::new(&["center_species", "neighbor_species"], vec![6, 1])?;
    let block = tensor.block(&selection)?;
    println!(
        "block for (6, 1) has {} samples\n",
        block.values().samples().count()
    );

    println!("--- Moving neighbor_species to the properties ---");
    tensor.keys_to_properties(&Labels::empty(&["neighbor_species"])?, true)?;
    describe(&tensor);

    println!("--- Moving center_species to the samples ---");
    tensor.keys_to_samples(&Labels::empty(&["center_species"])?, true)?;
    describe(&tensor);

    println!("--- Moving the 'direction' component to the properties ---");
    tensor.components_to_properties(&["direction"])?;
    describe(&tensor);

    Ok(())
}

/// Tensor map with one block per pair of species, each block having a
/// `direction` component and a gradient with respect to positions
fn build_tensor() -> Result<TensorMap> {
    let pairs = [(1, 1), (1, 6), (6, 1), (6, 6)];

    let mut blocks = Vec::new();
    for (i, &(center, neighbor)) in pairs.iter().enumerate() {
        let n_samples = if center == 1 { 3 } else { 2 };
        let samples = Labels::new(
            &["structure", "center"],
            (0..n_samples).flat_map(|s| [0, s]).collect(),
        )?;
        let direction = Labels::new(&["direction"], vec![0, 1, 2])?;
        let properties = Labels::new(&["n"], vec![0, 1, 2, 3])?;

        let values = ArrayD::from_elem(vec![n_samples as usize, 3, 4], i as f64);
        let mut block = TensorBlock::new(
            eqs_array_t::new(Box::new(values)),
            samples,
            vec![direction.clone()],
            Arc::new(properties),
        )?;

        // gradient of every sample with respect to the position of the
        // neighbor atom, which is atom `0` if the pair is of the same species
        let neighbor_atom = if center == neighbor { 0 } else { 1 };
        let gradient_samples = Labels::new(
            &["sample", "structure", "atom"],
            (0..n_samples).flat_map(|s| [s, 0, neighbor_atom]).collect(),
        )?;
        let xyz = Labels::new(&["xyz"], vec![0, 1, 2])?;
        let gradient = ArrayD::from_elem(vec![n_samples as usize, 3, 3, 4], -(i as f64));
        block.add_gradient(
            "positions",
            eqs_array_t::new(Box::new(gradient)),
            gradient_samples,
            vec![xyz, direction],
        )?;

        blocks.push(block);
    }

    let keys = Labels::new(
        &["center_species", "neighbor_species"],
        pairs.iter().flat_map(|&(c, n)| [c, n]).collect(),
    )?;

    Ok(TensorMap::new(keys, blocks)?)
}

fn describe(tensor: &TensorMap) {
    println!(
        "keys {:?}: {} blocks",
        tensor.keys().names(),
        tensor.blocks().len()
    );

    for (key, block) in tensor.iter() {
        let values = block.values();
        let shape = values.data().shape().unwrap_or(&[]);
        println!(
            "  {:?}: samples {:?}, properties {:?}, shape {:?}, gradients {:?}",
            key,
            values.samples().names(),
            values.properties().names(),
            shape,
            block.gradients_list(),
        );
    }
    println!();
}
