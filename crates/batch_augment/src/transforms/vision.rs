use crate::sample::Sample;
use crate::transforms::Transform;
use anyhow::{ensure, Context, Result};
use image::{DynamicImage, GenericImageView};
use tch::{Kind, Tensor};

// ============================================================================
// ToTensor
// ============================================================================

/// Converts a decoded image to a channel-first f32 tensor.
///
/// Layout conversion and float cast only: values stay in the original
/// `[0, 255]` pixel range. Rescaling is owned by the batch-level
/// [`Normalize`](crate::transforms::Normalize) step so that training and
/// evaluation share one normalization definition.
///
/// Channel handling:
/// | Input Format  | Output Shape |
/// |---------------|--------------|
/// | Grayscale (L) | `[1, H, W]`  |
/// | RGB           | `[3, H, W]`  |
/// | RGBA          | `[4, H, W]`  |
/// | Other         | `[3, H, W]` (implicit RGB conversion) |
#[derive(Debug, Clone)]
pub struct ToTensor;

/// Decoded buffers are row-major interleaved (H, W, C); permute into the
/// channel-first planes the batch transforms expect.
fn interleaved_to_chw(raw: &[u8], height: i64, width: i64, channels: i64) -> Tensor {
    Tensor::from_slice(raw)
        .reshape(&[height, width, channels])
        .permute(&[2, 0, 1])
        .contiguous()
}

impl Transform<DynamicImage, Tensor> for ToTensor {
    fn apply(&self, img: DynamicImage) -> Result<Tensor> {
        let (width, height) = img.dimensions();
        ensure!(
            width > 0 && height > 0,
            "Image dimensions must be positive (got {}x{})",
            width,
            height
        );
        let (h, w) = (height as i64, width as i64);

        let tensor = match img {
            DynamicImage::ImageLuma8(img) => {
                Tensor::from_slice(img.as_raw()).reshape(&[1, h, w])
            }
            DynamicImage::ImageRgb8(img) => interleaved_to_chw(img.as_raw(), h, w, 3),
            DynamicImage::ImageRgba8(img) => interleaved_to_chw(img.as_raw(), h, w, 4),
            // Handle all other cases via conversion to RGB
            _ => interleaved_to_chw(img.to_rgb8().as_raw(), h, w, 3),
        };

        Ok(tensor.to_kind(Kind::Float))
    }
}

// ============================================================================
// LabeledImageToSample
// ============================================================================

/// Converts a labeled image into a model-ready [`Sample`].
///
/// Applies the wrapped image transform (`DynamicImage` → `Tensor`), then
/// packs the result with its label:
/// - `"image"`: image tensor, typically `[C, H, W]`
/// - `"label"`: scalar i64 tensor
///
/// This is the per-sample transform an
/// [`InMemoryDataset`](crate::dataset::InMemoryDataset) of
/// `(DynamicImage, i64)` records is built with.
#[derive(Debug, Clone)]
pub struct LabeledImageToSample<T> {
    image_transform: T,
}

impl<T> LabeledImageToSample<T> {
    pub fn new(image_transform: T) -> Self {
        Self { image_transform }
    }
}

impl<T> Transform<(DynamicImage, i64), Sample> for LabeledImageToSample<T>
where
    T: Transform<DynamicImage, Tensor>,
{
    fn apply(&self, (image, label): (DynamicImage, i64)) -> Result<Sample> {
        let tensor = self
            .image_transform
            .apply(image)
            .context("Failed to apply image transform")?;

        Ok(Sample::from_single("image", tensor).with_feature("label", Tensor::from(label)))
    }
}
