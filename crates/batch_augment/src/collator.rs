use crate::minibatch::MiniBatch;
use crate::sample::Sample;
use anyhow::{bail, Result};
use std::collections::{HashMap, HashSet};
use tch::Tensor;

/// A `Collator` combines multiple [`Sample`]s into one [`MiniBatch`].
pub trait Collator {
    fn collate(&self, samples: &[Sample]) -> Result<MiniBatch>;
}

/// Stacks same-shape tensors along the batch dimension (dim 0).
///
/// Every sample must carry the same feature keys, and every tensor under a
/// given key must have the same shape. Fixed-size images satisfy both; any
/// mismatch is reported as an error rather than padded over.
#[derive(Debug, Clone)]
pub struct StackCollator;

impl Collator for StackCollator {
    fn collate(&self, samples: &[Sample]) -> Result<MiniBatch> {
        if samples.is_empty() {
            bail!("Cannot collate empty sample list");
        }

        // Validate feature keys against the first sample
        let first_keys: HashSet<&String> = samples[0].features.keys().collect();
        for (i, sample) in samples.iter().enumerate().skip(1) {
            let missing: Vec<&String> = first_keys
                .iter()
                .filter(|&&k| !sample.features.contains_key(k))
                .cloned()
                .collect();
            let extra: Vec<&String> = sample
                .features
                .keys()
                .filter(|k| !first_keys.contains(k))
                .collect();
            if !missing.is_empty() || !extra.is_empty() {
                bail!(
                    "Sample #{} has mismatched feature keys:\n -Missing: {:?}\n -Extra: {:?}",
                    i,
                    missing,
                    extra
                );
            }
        }

        let mut tensors = HashMap::with_capacity(first_keys.len());
        for key in first_keys {
            let to_stack: Vec<&Tensor> = samples
                .iter()
                .map(|s| s.features.get(key).expect("validated key"))
                .collect();

            let reference_shape = to_stack[0].size();
            for (i, tensor) in to_stack.iter().enumerate() {
                if tensor.size() != reference_shape {
                    bail!(
                        "Shape mismatch in sample {} for feature '{}': expected {:?}, got {:?}",
                        i,
                        key,
                        reference_shape,
                        tensor.size()
                    );
                }
            }

            tensors.insert(key.clone(), Tensor::stack(&to_stack, 0));
        }
        Ok(MiniBatch { tensors })
    }
}
