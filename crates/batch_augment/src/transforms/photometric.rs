//! Batched photometric augmentation.
//!
//! Everything here operates on `[N, C, H, W]` float batches with values in
//! `[0, 1]`, the range the batch-level `Normalize` step produces. One jitter
//! factor per property is drawn per call and shared across the batch, so a
//! whole batch gets a coherent color shift while consecutive batches differ.

use crate::rng;
use crate::transforms::Transform;
use anyhow::{ensure, Context, Result};
use tch::{Kind, Tensor};

/// ITU-R BT.601 luma coefficients, reshaped to broadcast over `[N, 3, H, W]`.
fn grayscale_weights(reference: &Tensor) -> Tensor {
    Tensor::from_slice(&[0.2989f32, 0.5870, 0.1140])
        .reshape(&[1, 3, 1, 1])
        .to_device(reference.device())
}

/// Collapses the channel dimension of an RGB batch to luma, keeping the
/// dimension so the result broadcasts back over the input.
fn rgb_to_grayscale(batch: &Tensor) -> Tensor {
    (batch * grayscale_weights(batch)).sum_dim_intlist(Some(&[-3i64][..]), true, Kind::Float)
}

/// Linear interpolation `a * factor + b * (1 - factor)`, clamped back to the
/// valid pixel range.
fn blend(a: &Tensor, b: &Tensor, factor: f64) -> Tensor {
    (a * factor + b * (1.0 - factor)).clamp(0.0, 1.0)
}

/// `1 - t` elementwise (tch has no scalar-minus-tensor operator).
fn one_minus(t: &Tensor) -> Tensor {
    t.neg() + 1.0
}

/// Converts an `[N, 3, H, W]` RGB batch in `[0, 1]` to HSV, hue in `[0, 1)`.
fn rgb_to_hsv(batch: &Tensor) -> Tensor {
    let r = batch.select(1, 0);
    let g = batch.select(1, 1);
    let b = batch.select(1, 2);

    let max = batch.amax(&[1i64][..], false);
    let min = batch.amin(&[1i64][..], false);
    let delta = &max - &min;

    // Guard against division by zero; the masks below zero out the
    // contributions where delta or max is actually zero.
    let safe_delta = delta.clamp_min(1e-8);
    let safe_max = max.clamp_min(1e-8);

    let r_is_max = r.eq_tensor(&max).to_kind(Kind::Float);
    // Break ties in channel order so each pixel picks exactly one sector
    let g_is_max = g.eq_tensor(&max).to_kind(Kind::Float) * one_minus(&r_is_max);
    let b_is_max =
        b.eq_tensor(&max).to_kind(Kind::Float) * one_minus(&r_is_max) * one_minus(&g_is_max);

    let h_r = (&g - &b) / &safe_delta;
    let h_g = (&b - &r) / &safe_delta + 2.0;
    let h_b = (&r - &g) / &safe_delta + 4.0;

    let hue = (r_is_max * h_r + g_is_max * h_g + b_is_max * h_b) / 6.0;
    let hue = hue.remainder(1.0) * delta.gt(0.0).to_kind(Kind::Float);

    let saturation = (&delta / safe_max) * max.gt(0.0).to_kind(Kind::Float);

    Tensor::stack(&[hue, saturation, max], 1)
}

/// Converts an `[N, 3, H, W]` HSV batch back to RGB in `[0, 1]`.
fn hsv_to_rgb(batch: &Tensor) -> Tensor {
    let h = batch.select(1, 0);
    let s = batch.select(1, 1);
    let v = batch.select(1, 2);

    let h6 = &h * 6.0;
    let sector = h6.floor().remainder(6.0).to_kind(Kind::Int64);
    let f = &h6 - h6.floor();

    let p = &v * one_minus(&s);
    let q = &v * one_minus(&(&s * &f));
    let t = &v * one_minus(&(&s * one_minus(&f)));

    let mask = |k: i64| sector.eq(k).to_kind(Kind::Float);

    let r = mask(0) * &v + mask(1) * &q + mask(2) * &p + mask(3) * &p + mask(4) * &t + mask(5) * &v;
    let g = mask(0) * &t + mask(1) * &v + mask(2) * &v + mask(3) * &q + mask(4) * &p + mask(5) * &p;
    let b = mask(0) * &p + mask(1) * &p + mask(2) * &t + mask(3) * &v + mask(4) * &v + mask(5) * &q;

    Tensor::stack(&[r, g, b], 1)
}

/// Shifts the hue channel of an RGB batch by `delta` (fraction of a full
/// turn, so 0.5 is the opposite hue). A round trip through HSV.
fn adjust_hue(batch: &Tensor, delta: f64) -> Tensor {
    let hsv = rgb_to_hsv(batch);
    let shifted = (hsv.select(1, 0) + delta).remainder(1.0);
    let mut hue_view = hsv.select(1, 0);
    hue_view.copy_(&shifted);
    hsv_to_rgb(&hsv).clamp(0.0, 1.0)
}

// ============================================================================
// ColorJitter
// ============================================================================

/// Randomly perturbs brightness, contrast, saturation, and hue of an
/// `[N, C, H, W]` batch with values in `[0, 1]`.
///
/// Each magnitude `m` defines a sampling range:
/// - brightness, contrast, saturation: factor drawn from
///   `[max(0, 1 - m), 1 + m]`, where 1.0 leaves the batch unchanged
/// - hue: shift drawn from `[-m, m]` (capped at 0.5, half a turn), where
///   0.0 leaves the batch unchanged
///
/// Saturation and hue require three channels and silently skip other
/// layouts; brightness and contrast apply to any channel count.
#[derive(Debug, Clone)]
pub struct ColorJitter {
    brightness: f64,
    contrast: f64,
    saturation: f64,
    hue: f64,
}

impl ColorJitter {
    pub fn new(brightness: f64, contrast: f64, saturation: f64, hue: f64) -> Result<Self> {
        ensure!(
            brightness >= 0.0 && contrast >= 0.0 && saturation >= 0.0,
            "Jitter magnitudes must be non-negative (got brightness={}, contrast={}, saturation={})",
            brightness,
            contrast,
            saturation
        );
        ensure!(
            (0.0..=0.5).contains(&hue),
            "Hue magnitude must be in [0.0, 0.5] range (got {})",
            hue
        );
        Ok(Self {
            brightness,
            contrast,
            saturation,
            hue,
        })
    }

    fn sample_factor(magnitude: f64) -> f64 {
        let low = (1.0 - magnitude).max(0.0);
        rng::gen_range(low, 1.0 + magnitude)
    }

    fn adjust_brightness(&self, batch: &Tensor) -> Tensor {
        let factor = Self::sample_factor(self.brightness);
        blend(batch, &batch.zeros_like(), factor)
    }

    fn adjust_contrast(&self, batch: &Tensor, channels: i64) -> Tensor {
        let factor = Self::sample_factor(self.contrast);
        let gray = if channels == 3 {
            rgb_to_grayscale(batch)
        } else {
            batch.shallow_clone()
        };
        let mean = gray.mean_dim(Some(&[-3i64, -2, -1][..]), true, Kind::Float);
        blend(batch, &mean, factor)
    }

    fn adjust_saturation(&self, batch: &Tensor) -> Tensor {
        let factor = Self::sample_factor(self.saturation);
        blend(batch, &rgb_to_grayscale(batch), factor)
    }
}

impl Transform<Tensor, Tensor> for ColorJitter {
    fn apply(&self, batch: Tensor) -> Result<Tensor> {
        let (_n, channels, _h, _w) = batch
            .size4()
            .context("Color jitter expects a 4D [N, C, H, W] batch")?;

        let mut out = self.adjust_brightness(&batch);
        out = self.adjust_contrast(&out, channels);
        if channels == 3 {
            out = self.adjust_saturation(&out);
            let delta = rng::gen_range(-self.hue, self.hue);
            // Zero shift skips the HSV round trip so it stays an exact no-op
            if delta != 0.0 {
                out = adjust_hue(&out, delta);
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tch::{Device, Kind};

    fn max_abs_diff(a: &Tensor, b: &Tensor) -> f64 {
        (a - b).abs().max().double_value(&[])
    }

    fn random_rgb_batch() -> Tensor {
        tch::manual_seed(0);
        Tensor::rand(&[2, 3, 5, 5], (Kind::Float, Device::Cpu))
    }

    #[test]
    fn test_zero_magnitude_is_identity() -> Result<()> {
        let batch = random_rgb_batch();
        let jitter = ColorJitter::new(0.0, 0.0, 0.0, 0.0)?;
        let out = jitter.apply(batch.shallow_clone())?;
        assert!(max_abs_diff(&out, &batch) < 1e-5);
        Ok(())
    }

    #[test]
    fn test_rejects_invalid_magnitudes() {
        assert!(ColorJitter::new(-0.1, 0.0, 0.0, 0.0).is_err());
        assert!(ColorJitter::new(0.0, 0.0, 0.0, 0.6).is_err());
    }

    #[test]
    fn test_output_stays_in_unit_range() -> Result<()> {
        let batch = random_rgb_batch();
        let jitter = ColorJitter::new(0.5, 0.5, 0.5, 0.5)?;
        let out = jitter.apply(batch)?;
        assert!(out.min().double_value(&[]) >= 0.0);
        assert!(out.max().double_value(&[]) <= 1.0);
        Ok(())
    }

    #[test]
    fn test_gray_batch_unchanged_by_saturation() -> Result<()> {
        // A gray image has zero chroma, so pure saturation jitter is a no-op
        let batch = Tensor::full(&[1, 3, 4, 4], 0.5, (Kind::Float, Device::Cpu));
        let jitter = ColorJitter::new(0.0, 0.0, 0.5, 0.0)?;
        let out = jitter.apply(batch.shallow_clone())?;
        assert!(max_abs_diff(&out, &batch) < 1e-4);
        Ok(())
    }

    #[test]
    fn test_hsv_round_trip() -> Result<()> {
        let batch = random_rgb_batch();
        let restored = hsv_to_rgb(&rgb_to_hsv(&batch));
        assert!(max_abs_diff(&restored, &batch) < 1e-3);
        Ok(())
    }

    #[test]
    fn test_hue_zero_shift_is_identity() -> Result<()> {
        let batch = random_rgb_batch();
        let out = adjust_hue(&batch, 0.0);
        assert!(max_abs_diff(&out, &batch) < 1e-3);
        Ok(())
    }

    #[test]
    fn test_hue_half_turn_twice_restores() -> Result<()> {
        let batch = random_rgb_batch();
        let out = adjust_hue(&adjust_hue(&batch, 0.5), 0.5);
        assert!(max_abs_diff(&out, &batch) < 1e-3);
        Ok(())
    }

    #[test]
    fn test_single_channel_skips_color_ops() -> Result<()> {
        // Brightness/contrast still apply, saturation/hue must not touch
        // a single-channel batch
        let batch = Tensor::full(&[2, 1, 4, 4], 0.25, (Kind::Float, Device::Cpu));
        let jitter = ColorJitter::new(0.0, 0.0, 0.5, 0.5)?;
        let out = jitter.apply(batch.shallow_clone())?;
        assert!(max_abs_diff(&out, &batch) < 1e-5);
        Ok(())
    }
}
