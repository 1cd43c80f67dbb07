//! Batched image augmentation for tch training loops.
//!
//! Per-sample transforms turn decoded images into tensors; batch-level
//! transforms (normalize, random flip, optional color jitter) run on the
//! assembled `[N, C, H, W]` tensor inside the training step, so augmentation
//! happens once per batch on the training device. A small hook-style
//! [`TrainingModule`] / [`Trainer`] pair drives the loop end to end.

pub mod collator;
pub mod dataloader;
pub mod dataset;
pub mod metrics;
pub mod minibatch;
pub mod model;
pub mod rng;
pub mod sample;
pub mod trainer;
pub mod transforms;

pub use collator::{Collator, StackCollator};
pub use dataloader::{DataLoader, DataLoaderConfig, DataLoaderConfigBuilder};
pub use dataset::InMemoryDataset;
pub use minibatch::MiniBatch;
pub use model::{LinearClassifier, TrainingModule, ValidationOutput};
pub use sample::Sample;
pub use trainer::{EvalReport, FitReport, Trainer, TrainerConfig};
pub use transforms::{BatchAugment, LabeledImageToSample, Normalize, ToTensor, Transform};
