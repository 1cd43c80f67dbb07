//! The training loop driver.
//!
//! [`Trainer`] owns the generic plumbing (epoch iteration, device
//! transfer, the optimizer step, progress logging) and delegates every
//! model-specific decision to a [`TrainingModule`].

use crate::collator::Collator;
use crate::dataloader::DataLoader;
use crate::metrics;
use crate::model::TrainingModule;
use anyhow::{ensure, Context, Result};
use tch::nn::Optimizer;

/// Trainer behaviour knobs.
#[derive(Debug, Clone)]
pub struct TrainerConfig {
    /// Number of passes over the training loader.
    pub max_epochs: usize,
    /// Log training loss every this many optimizer steps.
    pub log_every: usize,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            max_epochs: 1,
            log_every: 10,
        }
    }
}

impl TrainerConfig {
    pub fn max_epochs(mut self, max_epochs: usize) -> Self {
        self.max_epochs = max_epochs;
        self
    }

    pub fn log_every(mut self, log_every: usize) -> Self {
        self.log_every = log_every;
        self
    }
}

/// Summary of a completed [`Trainer::fit`] run.
#[derive(Debug, Clone, Copy)]
pub struct FitReport {
    pub epochs: usize,
    pub steps: usize,
    /// Training loss of the last optimizer step.
    pub final_loss: f64,
}

/// Aggregated results of one evaluation pass.
#[derive(Debug, Clone, Copy)]
pub struct EvalReport {
    /// Sample-weighted mean loss.
    pub loss: f64,
    pub accuracy: f64,
    pub num_samples: i64,
}

pub struct Trainer {
    config: TrainerConfig,
}

impl Trainer {
    pub fn new(config: TrainerConfig) -> Self {
        Self { config }
    }

    /// Trains `model` for `max_epochs` passes over `loader`.
    ///
    /// Per batch: move to the model's device, take the model's
    /// `training_step` loss, and apply one optimizer step.
    pub fn fit<M, Raw, C>(&self, model: &M, loader: &DataLoader<Raw, C>) -> Result<FitReport>
    where
        M: TrainingModule,
        Raw: Clone + Send + Sync,
        C: Collator,
    {
        ensure!(self.config.max_epochs > 0, "max_epochs must be at least 1");
        let mut optimizer: Optimizer = model.configure_optimizer()?;

        let mut steps = 0usize;
        let mut final_loss = f64::NAN;
        for epoch in 0..self.config.max_epochs {
            for batch in loader.iter()? {
                let batch = batch?.to_device(model.device());
                let loss = model
                    .training_step(&batch)
                    .with_context(|| format!("Training step {} failed", steps))?;
                optimizer.backward_step(&loss);

                final_loss = loss
                    .f_double_value(&[])
                    .context("Failed to read training loss")?;
                steps += 1;
                if self.config.log_every > 0 && steps % self.config.log_every == 0 {
                    log::info!(
                        "epoch {} step {}: loss {:.4}",
                        epoch + 1,
                        steps,
                        final_loss
                    );
                }
            }
            log::info!(
                "epoch {}/{} finished after {} steps",
                epoch + 1,
                self.config.max_epochs,
                steps
            );
        }

        Ok(FitReport {
            epochs: self.config.max_epochs,
            steps,
            final_loss,
        })
    }

    /// Runs one evaluation pass, aggregating per-batch losses (weighted by
    /// batch size) and accuracy over the whole loader.
    pub fn validate<M, Raw, C>(&self, model: &M, loader: &DataLoader<Raw, C>) -> Result<EvalReport>
    where
        M: TrainingModule,
        Raw: Clone + Send + Sync,
        C: Collator,
    {
        let mut weighted_loss = 0.0;
        let mut correct = 0i64;
        let mut total = 0i64;

        for batch in loader.iter()? {
            let batch = batch?.to_device(model.device());
            let output = model.validation_step(&batch)?;
            weighted_loss += output.loss * output.total as f64;
            correct += output.correct;
            total += output.total;
        }
        ensure!(total > 0, "Evaluation loader produced no samples");

        let report = EvalReport {
            loss: weighted_loss / total as f64,
            accuracy: metrics::accuracy_from_counts(correct, total)?,
            num_samples: total,
        };
        log::info!(
            "evaluation: loss {:.4}, accuracy {:.2}% over {} samples",
            report.loss,
            report.accuracy * 100.0,
            report.num_samples
        );
        Ok(report)
    }
}

impl Default for Trainer {
    fn default() -> Self {
        Self::new(TrainerConfig::default())
    }
}
