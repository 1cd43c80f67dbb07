use crate::sample::Sample;
use crate::transforms::Transform;
use anyhow::{Context, Result};
use std::sync::Arc;

/// An in-memory dataset of raw records plus a mandatory per-sample transform.
///
/// Records stay in their raw form (for example `(DynamicImage, i64)` pairs);
/// the transform converts each record into a [`Sample`] at access time, so
/// one dataset can back many epochs without re-materializing tensors.
///
/// Storage is `Arc<[Raw]>`: cloning the dataset only bumps a reference count
/// and read access is safe to share.
#[derive(Clone)]
pub struct InMemoryDataset<Raw> {
    records: Arc<[Raw]>,
    transform: Arc<dyn Transform<Raw, Sample>>,
}

impl<Raw> InMemoryDataset<Raw>
where
    Raw: Clone + Send + Sync,
{
    /// Creates a dataset from raw records and the transform that turns each
    /// record into a [`Sample`].
    pub fn new(records: Vec<Raw>, transform: impl Transform<Raw, Sample> + 'static) -> Self {
        Self {
            records: records.into(),
            transform: Arc::new(transform),
        }
    }

    /// Applies the transform to the record at `index`.
    /// Returns `Ok(None)` when the index is out of bounds.
    pub fn get(&self, index: usize) -> Result<Option<Sample>> {
        self.records
            .get(index)
            .map(|record| {
                self.transform
                    .apply(record.clone())
                    .with_context(|| format!("Failed to transform record {}", index))
            })
            .transpose()
    }

    /// Total number of records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tch::Tensor;

    /// Converts an integer record into a one-feature sample.
    struct IntToSample;
    impl Transform<i64, Sample> for IntToSample {
        fn apply(&self, value: i64) -> Result<Sample> {
            Ok(Sample::from_single("value", Tensor::from(value)))
        }
    }

    #[test]
    fn test_len_and_get() -> Result<()> {
        let dataset = InMemoryDataset::new(vec![10i64, 20, 30], IntToSample);
        assert_eq!(dataset.len(), 3);
        assert!(!dataset.is_empty());

        let sample = dataset.get(1)?.expect("index in bounds");
        assert_eq!(sample.get("value")?.int64_value(&[]), 20);
        assert!(dataset.get(3)?.is_none());
        Ok(())
    }

    #[test]
    fn test_clone_is_zero_copy() -> Result<()> {
        let dataset = InMemoryDataset::new(vec![1i64, 2], IntToSample);
        let copy = dataset.clone();
        assert_eq!(copy.len(), dataset.len());
        assert_eq!(copy.get(0)?.unwrap().get("value")?.int64_value(&[]), 1);
        Ok(())
    }

    #[test]
    fn test_transform_errors_propagate() {
        struct AlwaysFails;
        impl Transform<i64, Sample> for AlwaysFails {
            fn apply(&self, _: i64) -> Result<Sample> {
                anyhow::bail!("bad record")
            }
        }
        let dataset = InMemoryDataset::new(vec![1i64], AlwaysFails);
        assert!(dataset.get(0).is_err());
    }
}
