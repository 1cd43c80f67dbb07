//! Single-threaded batch iteration over an in-memory dataset.
//!
//! The `DataLoader` coordinates the dataset, iteration order, and collator
//! to produce [`MiniBatch`]es. Loading is synchronous on the calling
//! thread: parallel decoding and device dispatch belong to the surrounding
//! frameworks, not to this loader.
//!
//! ```ignore
//! let config = DataLoaderConfig::builder()
//!     .batch_size(32)
//!     .shuffle(true)
//!     .seed(42)
//!     .build();
//! let loader = DataLoader::new(dataset, config)?;
//! for batch in loader.iter()? {
//!     let batch: MiniBatch = batch?;
//! }
//! ```

use crate::collator::{Collator, StackCollator};
use crate::dataset::InMemoryDataset;
use crate::minibatch::MiniBatch;
use crate::sample::Sample;
use anyhow::{anyhow, Result};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Configuration for [`DataLoader`] behaviour.
#[derive(Debug, Clone, Default)]
pub struct DataLoaderConfig {
    /// Number of samples per batch (defaults to 1 if not specified).
    pub batch_size: Option<usize>,
    /// Whether to drop the last incomplete batch (defaults to false).
    pub drop_last: Option<bool>,
    /// Whether to reshuffle the iteration order every epoch.
    pub shuffle: Option<bool>,
    /// Random seed for reproducible shuffling.
    pub seed: Option<u64>,
}

impl DataLoaderConfig {
    pub fn builder() -> DataLoaderConfigBuilder {
        DataLoaderConfigBuilder::default()
    }
}

/// Builder for [`DataLoaderConfig`] with method chaining.
#[derive(Default)]
pub struct DataLoaderConfigBuilder {
    config: DataLoaderConfig,
}

impl DataLoaderConfigBuilder {
    /// Set the batch size (must be > 0).
    pub fn batch_size(mut self, size: usize) -> Self {
        self.config.batch_size = Some(size);
        self
    }

    /// Set whether to drop the last incomplete batch.
    pub fn drop_last(mut self, drop: bool) -> Self {
        self.config.drop_last = Some(drop);
        self
    }

    /// Set whether to reshuffle every epoch.
    pub fn shuffle(mut self, shuffle: bool) -> Self {
        self.config.shuffle = Some(shuffle);
        self
    }

    /// Set the random seed for reproducible shuffling.
    pub fn seed(mut self, seed: u64) -> Self {
        self.config.seed = Some(seed);
        self
    }

    pub fn build(self) -> DataLoaderConfig {
        self.config
    }
}

/// Yields [`MiniBatch`]es from an [`InMemoryDataset`].
///
/// Each call to [`iter`](Self::iter) starts a new epoch. With
/// `shuffle = true` the order is reshuffled per epoch; when a seed is set
/// the epoch seed is `seed + (epoch << 32)` so runs are reproducible while
/// epochs still differ from each other.
pub struct DataLoader<Raw, C = StackCollator> {
    dataset: InMemoryDataset<Raw>,
    collator: C,
    config: DataLoaderConfig,
    current_epoch: AtomicUsize,
}

impl<Raw> DataLoader<Raw, StackCollator>
where
    Raw: Clone + Send + Sync,
{
    /// Creates a loader with the default [`StackCollator`].
    pub fn new(dataset: InMemoryDataset<Raw>, config: DataLoaderConfig) -> Result<Self> {
        Self::new_with_collator(dataset, config, StackCollator)
    }
}

impl<Raw, C> DataLoader<Raw, C>
where
    Raw: Clone + Send + Sync,
    C: Collator,
{
    /// Creates a loader with a custom collator.
    pub fn new_with_collator(
        dataset: InMemoryDataset<Raw>,
        mut config: DataLoaderConfig,
        collator: C,
    ) -> Result<Self> {
        config.batch_size = Some(config.batch_size.unwrap_or(1));
        config.drop_last = Some(config.drop_last.unwrap_or(false));
        config.shuffle = Some(config.shuffle.unwrap_or(false));

        if config.batch_size == Some(0) {
            return Err(anyhow!("Batch size must be greater than 0"));
        }

        Ok(Self {
            dataset,
            collator,
            config,
            current_epoch: AtomicUsize::new(0),
        })
    }

    /// Number of batches one epoch will yield.
    pub fn num_batches(&self) -> usize {
        let batch_size = self.config.batch_size.unwrap_or(1);
        let n = self.dataset.len();
        if self.config.drop_last.unwrap_or(false) {
            n / batch_size
        } else {
            n.div_ceil(batch_size)
        }
    }

    /// Starts a new epoch and returns an iterator over its batches.
    pub fn iter(&self) -> Result<DataLoaderIter<'_, Raw, C>> {
        let epoch = self.current_epoch.fetch_add(1, Ordering::SeqCst);
        let batch_size = self.config.batch_size.unwrap_or(1);

        let mut order: Vec<usize> = (0..self.dataset.len()).collect();
        if self.config.shuffle.unwrap_or(false) {
            let mut rng = match self.config.seed {
                Some(seed) => StdRng::seed_from_u64(seed.wrapping_add((epoch as u64) << 32)),
                None => StdRng::from_os_rng(),
            };
            order.shuffle(&mut rng);
        }

        let mut batches: Vec<Vec<usize>> =
            order.chunks(batch_size).map(|c| c.to_vec()).collect();
        if self.config.drop_last.unwrap_or(false) {
            if let Some(last) = batches.last() {
                if last.len() < batch_size {
                    batches.pop();
                }
            }
        }

        Ok(DataLoaderIter {
            loader: self,
            batches: batches.into_iter(),
        })
    }
}

/// Iterator over one epoch of batches. Not `Send`: use from one thread.
pub struct DataLoaderIter<'a, Raw, C> {
    loader: &'a DataLoader<Raw, C>,
    batches: std::vec::IntoIter<Vec<usize>>,
}

impl<Raw, C> Iterator for DataLoaderIter<'_, Raw, C>
where
    Raw: Clone + Send + Sync,
    C: Collator,
{
    type Item = Result<MiniBatch>;

    fn next(&mut self) -> Option<Self::Item> {
        let indices = self.batches.next()?;
        let samples: Result<Vec<Sample>> = indices
            .iter()
            .map(|&i| {
                self.loader
                    .dataset
                    .get(i)?
                    .ok_or_else(|| anyhow!("Sample index {} out of bounds", i))
            })
            .collect();
        Some(samples.and_then(|s| self.loader.collator.collate(&s)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transforms::Transform;
    use tch::Tensor;

    struct IntToSample;
    impl Transform<i64, Sample> for IntToSample {
        fn apply(&self, value: i64) -> Result<Sample> {
            Ok(Sample::from_single("value", Tensor::from(value)))
        }
    }

    fn int_dataset(n: i64) -> InMemoryDataset<i64> {
        InMemoryDataset::new((0..n).collect(), IntToSample)
    }

    fn collect_values(loader: &DataLoader<i64>) -> Result<Vec<i64>> {
        let mut values = Vec::new();
        for batch in loader.iter()? {
            let batch_values: Vec<i64> = batch?.get("value")?.try_into()?;
            values.extend(batch_values);
        }
        Ok(values)
    }

    #[test]
    fn test_sequential_batching() -> Result<()> {
        let config = DataLoaderConfig::builder().batch_size(4).build();
        let loader = DataLoader::new(int_dataset(10), config)?;

        assert_eq!(loader.num_batches(), 3);
        let values = collect_values(&loader)?;
        assert_eq!(values, (0..10).collect::<Vec<_>>());
        Ok(())
    }

    #[test]
    fn test_drop_last() -> Result<()> {
        let config = DataLoaderConfig::builder()
            .batch_size(4)
            .drop_last(true)
            .build();
        let loader = DataLoader::new(int_dataset(10), config)?;

        assert_eq!(loader.num_batches(), 2);
        assert_eq!(collect_values(&loader)?.len(), 8);
        Ok(())
    }

    #[test]
    fn test_zero_batch_size_rejected() {
        let config = DataLoaderConfig::builder().batch_size(0).build();
        assert!(DataLoader::new(int_dataset(4), config).is_err());
    }

    #[test]
    fn test_seeded_shuffle_is_reproducible() -> Result<()> {
        let make = || {
            DataLoader::new(
                int_dataset(32),
                DataLoaderConfig::builder()
                    .batch_size(8)
                    .shuffle(true)
                    .seed(42)
                    .build(),
            )
        };

        let first = collect_values(&make()?)?;
        let second = collect_values(&make()?)?;
        assert_eq!(first, second);

        let mut sorted = first.clone();
        sorted.sort_unstable();
        assert_eq!(sorted, (0..32).collect::<Vec<_>>());
        Ok(())
    }

    #[test]
    fn test_epochs_reshuffle() -> Result<()> {
        let loader = DataLoader::new(
            int_dataset(64),
            DataLoaderConfig::builder()
                .batch_size(64)
                .shuffle(true)
                .seed(7)
                .build(),
        )?;

        let first = collect_values(&loader)?;
        let second = collect_values(&loader)?;
        assert_ne!(first, second);
        Ok(())
    }
}
