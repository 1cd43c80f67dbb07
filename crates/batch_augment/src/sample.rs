use anyhow::{anyhow, Result};
use std::collections::HashMap;
use tch::Tensor;

/// A single data example: a mapping from feature names to tensors.
///
/// For an image-classification example the map typically holds
/// `{"image": Tensor[C, H, W], "label": Tensor[]}`. Feature names are the
/// contract between the per-sample transform that produces a `Sample` and
/// the model hooks that consume the batched tensors downstream.
#[derive(Debug)]
pub struct Sample {
    pub features: HashMap<String, Tensor>,
}

/// Cloning is shallow: tensors share storage with the original.
impl Clone for Sample {
    fn clone(&self) -> Self {
        let features = self
            .features
            .iter()
            .map(|(k, v)| (k.clone(), v.shallow_clone()))
            .collect();
        Self { features }
    }
}

/// Safety: `tch::Tensor` is `Send + Sync` (verified in tch-rs source), and
/// `HashMap<String, Tensor>` composes only `Send + Sync` members. Mutation
/// requires `&mut self`, so shared references only permit concurrent reads.
unsafe impl Send for Sample {}
unsafe impl Sync for Sample {}

impl Sample {
    /// Creates a `Sample` from a full feature map.
    pub fn new(features: HashMap<String, Tensor>) -> Self {
        Self { features }
    }

    /// Creates a `Sample` holding a single `(feature_name, tensor)` pair.
    /// Chain with [`with_feature`](Self::with_feature) to add more.
    pub fn from_single(name: impl Into<String>, tensor: Tensor) -> Self {
        Self {
            features: HashMap::from([(name.into(), tensor)]),
        }
    }

    /// Adds or overwrites a feature.
    pub fn with_feature(mut self, name: impl Into<String>, tensor: Tensor) -> Self {
        self.features.insert(name.into(), tensor);
        self
    }

    /// Returns the tensor stored under `feature`.
    pub fn get(&self, feature: &str) -> Result<&Tensor> {
        self.features
            .get(feature)
            .ok_or_else(|| anyhow!("Feature '{}' not found in sample", feature))
    }

    /// Iterates over all feature names.
    pub fn features(&self) -> impl Iterator<Item = &str> {
        self.features.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tch::{Kind, Tensor};

    #[test]
    fn test_construction_and_lookup() -> Result<()> {
        let sample = Sample::from_single(
            "image",
            Tensor::zeros(&[3, 4, 4], (Kind::Float, tch::Device::Cpu)),
        )
        .with_feature("label", Tensor::from(2i64));

        assert_eq!(sample.get("image")?.size(), vec![3, 4, 4]);
        assert_eq!(sample.get("label")?.int64_value(&[]), 2);
        assert!(sample.get("mask").is_err());

        let names: Vec<_> = sample.features().collect();
        assert!(names.contains(&"image"));
        assert!(names.contains(&"label"));
        Ok(())
    }

    #[test]
    fn test_clone_is_shallow() -> Result<()> {
        let sample = Sample::from_single("label", Tensor::from(1i64));
        let copy = sample.clone();
        assert_eq!(copy.get("label")?.int64_value(&[]), 1);
        Ok(())
    }
}
