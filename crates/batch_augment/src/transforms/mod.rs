//! Composable data transforms.
//!
//! ```text
//! transforms/
//! ├── core.rs         → Transform trait and chaining
//! ├── vision.rs       → per-sample preprocessing (image → tensor → Sample)
//! ├── batch.rs        → batched NCHW augmentation (normalize, flip, pipeline)
//! └── photometric.rs  → batched color jitter
//! ```
//!
//! The per-sample transforms run while building samples; the batch-level
//! transforms run on the assembled `[N, C, H, W]` tensor right before the
//! model's forward pass.

pub mod batch;
pub mod core;
pub mod photometric;
pub mod vision;

pub use batch::{BatchAugment, Normalize, RandomHorizontalFlip};
pub use core::{Chain, Transform};
pub use photometric::ColorJitter;
pub use vision::{LabeledImageToSample, ToTensor};
