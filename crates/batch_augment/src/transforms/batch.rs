use crate::rng;
use crate::transforms::photometric::ColorJitter;
use crate::transforms::Transform;
use anyhow::{ensure, Context, Result};
use tch::{no_grad, IndexOp, Tensor};

// ============================================================================
// Normalize
// ============================================================================

/// Rescales pixel values by dividing by a fixed maximum (255.0 by default),
/// mapping `[0, 255]` inputs into `[0, 1]`. Deterministic, shape-preserving,
/// and shared between the training and evaluation paths.
#[derive(Debug, Clone)]
pub struct Normalize {
    max_value: f64,
}

impl Normalize {
    pub fn new(max_value: f64) -> Result<Self> {
        ensure!(
            max_value > 0.0,
            "Normalization maximum must be positive (got {})",
            max_value
        );
        Ok(Self { max_value })
    }
}

impl Default for Normalize {
    fn default() -> Self {
        Self { max_value: 255.0 }
    }
}

impl Transform<Tensor, Tensor> for Normalize {
    fn apply(&self, tensor: Tensor) -> Result<Tensor> {
        tensor
            .f_div_scalar(self.max_value)
            .context("Failed to rescale tensor values")
    }
}

// ============================================================================
// RandomHorizontalFlip
// ============================================================================

/// Flips each sample of an `[N, C, H, W]` batch along the width axis
/// independently with probability `p`.
///
/// `p = 0.0` and `p = 1.0` short-circuit to deterministic fast paths; tests
/// use those to pin the flip outcome.
#[derive(Debug, Clone)]
pub struct RandomHorizontalFlip {
    p: f64,
}

impl RandomHorizontalFlip {
    pub fn new(p: f64) -> Result<Self> {
        ensure!(
            (0.0..=1.0).contains(&p),
            "Probability must be in [0.0, 1.0] range (got {})",
            p
        );
        Ok(Self { p })
    }
}

impl Transform<Tensor, Tensor> for RandomHorizontalFlip {
    fn apply(&self, batch: Tensor) -> Result<Tensor> {
        let (num_samples, _c, _h, _w) = batch
            .size4()
            .context("Horizontal flip expects a 4D [N, C, H, W] batch")?;

        let result = if self.p <= 0.0 {
            batch
        } else if self.p >= 1.0 {
            batch.flip(&[3])
        } else {
            let output = batch.zeros_like();
            for index in 0..num_samples {
                let mut view = output.i(index);
                let sample = batch.i(index);
                // Per-sample view is [C, H, W]: width is dim 2
                let source = if rng::gen_bool(self.p) {
                    sample.flip(&[2])
                } else {
                    sample
                };
                view.copy_(&source);
            }
            output
        };
        Ok(result)
    }
}

// ============================================================================
// BatchAugment
// ============================================================================

/// The batched augmentation pipeline applied right before the forward pass.
///
/// Runs a fixed, ordered sequence on an `[N, C, H, W]` float batch with
/// values in `[0, 255]`:
///
/// 1. [`Normalize`] by 255.0 (unconditional)
/// 2. [`RandomHorizontalFlip`] with probability 0.5 (unconditional)
/// 3. [`ColorJitter`] with magnitude 0.5 for brightness/contrast/saturation/
///    hue, only when `apply_color_jitter` was set at construction
///
/// The whole sequence runs under [`tch::no_grad`]: this is preprocessing,
/// not a differentiable layer, so the output never carries a grad fn. The
/// input is not mutated; a fresh tensor of identical shape is returned.
/// Flip decisions and jitter factors are drawn fresh on every call.
#[derive(Debug)]
pub struct BatchAugment {
    normalize: Normalize,
    flip: RandomHorizontalFlip,
    jitter: Option<ColorJitter>,
}

impl BatchAugment {
    /// Jitter magnitude used for all four color properties.
    pub const JITTER_MAGNITUDE: f64 = 0.5;

    /// Creates the fixed pipeline. `apply_color_jitter` selects the
    /// conditional third step and is immutable afterwards.
    pub fn new(apply_color_jitter: bool) -> Result<Self> {
        let jitter = if apply_color_jitter {
            Some(ColorJitter::new(
                Self::JITTER_MAGNITUDE,
                Self::JITTER_MAGNITUDE,
                Self::JITTER_MAGNITUDE,
                Self::JITTER_MAGNITUDE,
            )?)
        } else {
            None
        };

        Ok(Self {
            normalize: Normalize::new(255.0)?,
            flip: RandomHorizontalFlip::new(0.5)?,
            jitter,
        })
    }

    /// Overrides the flip probability (default 0.5). `0.0` and `1.0` pin
    /// the flip outcome, which variance-based tests rely on.
    pub fn with_flip_probability(mut self, p: f64) -> Result<Self> {
        self.flip = RandomHorizontalFlip::new(p)?;
        Ok(self)
    }
}

impl Transform<Tensor, Tensor> for BatchAugment {
    fn apply(&self, batch: Tensor) -> Result<Tensor> {
        batch
            .size4()
            .context("Augmentation expects a 4D [N, C, H, W] batch")?;

        no_grad(|| {
            let out = self.normalize.apply(batch)?;
            let out = self.flip.apply(out)?;
            match &self.jitter {
                Some(jitter) => jitter.apply(out),
                None => Ok(out),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tch::{Device, Kind};

    fn ramp_batch() -> Tensor {
        // Each 1x1x4 row is [0, 1, 2, 3] so flips are visible
        Tensor::arange(4, (Kind::Float, Device::Cpu)).reshape(&[1, 1, 1, 4])
    }

    #[test]
    fn test_normalize_rescales() -> Result<()> {
        let batch = Tensor::full(&[2, 3, 4, 4], 255.0, (Kind::Float, Device::Cpu));
        let out = Normalize::default().apply(batch)?;
        let max_diff = (out - 1.0).abs().max().double_value(&[]);
        assert_eq!(max_diff, 0.0);
        Ok(())
    }

    #[test]
    fn test_normalize_rejects_zero_max() {
        assert!(Normalize::new(0.0).is_err());
    }

    #[test]
    fn test_flip_pinned_on_reverses_width() -> Result<()> {
        let out = RandomHorizontalFlip::new(1.0)?.apply(ramp_batch())?;
        let values: Vec<f64> = Vec::<f64>::try_from(&out.flatten(0, -1))?;
        assert_eq!(values, vec![3.0, 2.0, 1.0, 0.0]);
        Ok(())
    }

    #[test]
    fn test_flip_pinned_off_is_identity() -> Result<()> {
        let batch = ramp_batch();
        let out = RandomHorizontalFlip::new(0.0)?.apply(batch.shallow_clone())?;
        assert!(out.equal(&batch));
        Ok(())
    }

    #[test]
    fn test_flip_rejects_bad_probability() {
        assert!(RandomHorizontalFlip::new(1.5).is_err());
        assert!(RandomHorizontalFlip::new(-0.1).is_err());
    }

    #[test]
    fn test_flip_rejects_non_batched_input() -> Result<()> {
        let chw = Tensor::zeros(&[3, 4, 4], (Kind::Float, Device::Cpu));
        assert!(RandomHorizontalFlip::new(0.5)?.apply(chw).is_err());
        Ok(())
    }

    #[test]
    fn test_pipeline_rejects_non_batched_input() -> Result<()> {
        let chw = Tensor::zeros(&[3, 4, 4], (Kind::Float, Device::Cpu));
        assert!(BatchAugment::new(false)?.apply(chw).is_err());
        Ok(())
    }
}
