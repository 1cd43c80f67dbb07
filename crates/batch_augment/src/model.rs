//! Training modules: the hook interface the [`Trainer`](crate::trainer::Trainer)
//! drives, and a linear classifier implementing it.

use crate::metrics;
use crate::minibatch::MiniBatch;
use crate::transforms::{BatchAugment, Normalize, Transform};
use anyhow::{Context, Result};
use tch::nn::{self, Module, OptimizerConfig};
use tch::{no_grad, Device, Tensor};

/// Per-batch evaluation results, aggregated by the trainer.
#[derive(Debug, Clone, Copy)]
pub struct ValidationOutput {
    /// Mean loss over the batch.
    pub loss: f64,
    /// Correct predictions in the batch.
    pub correct: i64,
    /// Samples in the batch.
    pub total: i64,
}

/// Hook interface between a model and the training loop.
///
/// The trainer owns iteration and optimization bookkeeping; the module owns
/// everything model-specific: how a batch becomes a loss, how evaluation
/// is scored, and which optimizer to use. Data augmentation lives inside
/// [`training_step`](Self::training_step) so it runs batched on the
/// training device, not per sample on the loader thread.
pub trait TrainingModule {
    /// Computes logits for a preprocessed input batch.
    fn forward(&self, input: &Tensor) -> Tensor;

    /// Computes the training loss for one batch. The returned tensor must
    /// carry gradients for the optimizer step.
    fn training_step(&self, batch: &MiniBatch) -> Result<Tensor>;

    /// Scores one evaluation batch. No augmentation, no gradients.
    fn validation_step(&self, batch: &MiniBatch) -> Result<ValidationOutput>;

    /// Builds the optimizer over this module's trainable variables.
    fn configure_optimizer(&self) -> Result<nn::Optimizer>;

    /// Device the module's parameters live on; the trainer moves batches
    /// here before invoking the steps.
    fn device(&self) -> Device;
}

/// Single linear layer over flattened pixels, trained with Adam on
/// cross-entropy.
///
/// Training batches pass through the full [`BatchAugment`] pipeline;
/// validation batches only get the shared [`Normalize`] rescale, so both
/// paths see `[0, 1]` inputs but only training sees randomness.
pub struct LinearClassifier {
    vs: nn::VarStore,
    linear: nn::Linear,
    augment: BatchAugment,
    normalize: Normalize,
    learning_rate: f64,
}

impl LinearClassifier {
    pub fn new(device: Device, input_dim: i64, num_classes: i64, augment: BatchAugment) -> Self {
        let vs = nn::VarStore::new(device);
        let linear = nn::linear(
            vs.root() / "classifier",
            input_dim,
            num_classes,
            Default::default(),
        );
        Self {
            vs,
            linear,
            augment,
            normalize: Normalize::default(),
            learning_rate: 1e-3,
        }
    }

    pub fn with_learning_rate(mut self, learning_rate: f64) -> Self {
        self.learning_rate = learning_rate;
        self
    }

    fn batch_tensors(batch: &MiniBatch) -> Result<(Tensor, Tensor)> {
        let images = batch.get("image")?.shallow_clone();
        let labels = batch.get("label")?.shallow_clone();
        Ok((images, labels))
    }
}

impl TrainingModule for LinearClassifier {
    fn forward(&self, input: &Tensor) -> Tensor {
        input.flatten(1, -1).apply(&self.linear)
    }

    fn training_step(&self, batch: &MiniBatch) -> Result<Tensor> {
        let (images, labels) = Self::batch_tensors(batch)?;
        let augmented = self.augment.apply(images)?;
        let logits = self.forward(&augmented);
        Ok(logits.cross_entropy_for_logits(&labels))
    }

    fn validation_step(&self, batch: &MiniBatch) -> Result<ValidationOutput> {
        let (images, labels) = Self::batch_tensors(batch)?;
        no_grad(|| {
            let input = self.normalize.apply(images)?;
            let logits = self.forward(&input);
            let loss = logits
                .cross_entropy_for_logits(&labels)
                .f_double_value(&[])
                .context("Failed to read validation loss")?;
            let predictions = logits.argmax(-1, false);
            let correct = metrics::num_correct(&predictions, &labels)?;
            Ok(ValidationOutput {
                loss,
                correct,
                total: labels.size1().context("Labels must be 1-D")?,
            })
        })
    }

    fn configure_optimizer(&self) -> Result<nn::Optimizer> {
        nn::Adam::default()
            .build(&self.vs, self.learning_rate)
            .context("Failed to build Adam optimizer")
    }

    fn device(&self) -> Device {
        self.vs.device()
    }
}
