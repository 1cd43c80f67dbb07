//! Classification metrics.

use anyhow::{ensure, Context, Result};
use tch::{Kind, Tensor};

/// Counts predictions matching their targets. Both tensors must be 1-D
/// integer class indices of the same length.
pub fn num_correct(predictions: &Tensor, targets: &Tensor) -> Result<i64> {
    ensure!(
        predictions.size() == targets.size(),
        "Prediction/target shape mismatch: {:?} vs {:?}",
        predictions.size(),
        targets.size()
    );
    predictions
        .eq_tensor(targets)
        .sum(Kind::Int64)
        .f_int64_value(&[])
        .context("Failed to read correct-prediction count")
}

/// Fraction of predictions matching their targets, in `[0, 1]`.
pub fn accuracy(predictions: &Tensor, targets: &Tensor) -> Result<f64> {
    let total = predictions.size1().context("Predictions must be 1-D")?;
    accuracy_from_counts(num_correct(predictions, targets)?, total)
}

/// Accuracy from pre-aggregated counts, for callers that fold correct/total
/// tallies across batches before reporting.
pub fn accuracy_from_counts(correct: i64, total: i64) -> Result<f64> {
    ensure!(total > 0, "Cannot compute accuracy over zero predictions");
    ensure!(
        (0..=total).contains(&correct),
        "Correct count {} outside [0, {}]",
        correct,
        total
    );
    Ok(correct as f64 / total as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_num_correct() -> Result<()> {
        let predictions = Tensor::from_slice(&[0i64, 1, 2, 1]);
        let targets = Tensor::from_slice(&[0i64, 1, 1, 1]);
        assert_eq!(num_correct(&predictions, &targets)?, 3);
        Ok(())
    }

    #[test]
    fn test_accuracy() -> Result<()> {
        let predictions = Tensor::from_slice(&[0i64, 1, 2, 1]);
        let targets = Tensor::from_slice(&[0i64, 1, 1, 1]);
        assert!((accuracy(&predictions, &targets)? - 0.75).abs() < 1e-12);
        Ok(())
    }

    #[test]
    fn test_shape_mismatch_rejected() {
        let predictions = Tensor::from_slice(&[0i64, 1]);
        let targets = Tensor::from_slice(&[0i64, 1, 2]);
        assert!(num_correct(&predictions, &targets).is_err());
    }

    #[test]
    fn test_empty_accuracy_rejected() {
        let empty = Tensor::from_slice(&[] as &[i64]);
        assert!(accuracy(&empty, &empty).is_err());
    }

    #[test]
    fn test_accuracy_from_counts() -> Result<()> {
        assert_eq!(accuracy_from_counts(3, 4)?, 0.75);
        assert_eq!(accuracy_from_counts(0, 4)?, 0.0);
        assert!(accuracy_from_counts(0, 0).is_err());
        assert!(accuracy_from_counts(5, 4).is_err());
        Ok(())
    }
}
