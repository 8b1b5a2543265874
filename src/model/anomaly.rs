//! Autoencoder anomaly gate: reconstruction error against a fixed threshold.

use crate::error::ScoringError;
use serde::Serialize;

/// Maps a scaled vector to its reconstruction (same dimensionality).
pub trait Reconstructor: Send + Sync {
    fn reconstruct(&self, input: &[f32]) -> Result<Vec<f32>, ScoringError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AnomalyScore {
    /// Mean squared error between input and reconstruction.
    pub reconstruction_error: f64,
    pub threshold: f64,
    pub is_anomaly: bool,
}

/// Reconstruction model plus the benign-percentile MSE threshold it was trained with.
pub struct AnomalyModel {
    reconstructor: Box<dyn Reconstructor>,
    threshold: f64,
}

impl AnomalyModel {
    pub fn new(reconstructor: Box<dyn Reconstructor>, threshold: f64) -> Self {
        Self {
            reconstructor,
            threshold,
        }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Anomalous means strictly above the threshold.
    pub fn score(&self, input: &[f32]) -> Result<AnomalyScore, ScoringError> {
        let reconstructed = self.reconstructor.reconstruct(input)?;
        let mse = reconstruction_error(input, &reconstructed)?;
        Ok(AnomalyScore {
            reconstruction_error: mse,
            threshold: self.threshold,
            is_anomaly: mse > self.threshold,
        })
    }
}

/// `mean((x - x')^2)`, accumulated in f64.
pub fn reconstruction_error(input: &[f32], reconstructed: &[f32]) -> Result<f64, ScoringError> {
    if input.len() != reconstructed.len() {
        return Err(ScoringError::DimensionMismatch {
            expected: input.len(),
            actual: reconstructed.len(),
        });
    }
    if input.is_empty() {
        return Err(ScoringError::DimensionMismatch {
            expected: 1,
            actual: 0,
        });
    }
    let sum: f64 = input
        .iter()
        .zip(reconstructed)
        .map(|(&a, &b)| {
            let d = a as f64 - b as f64;
            d * d
        })
        .sum();
    let mse = sum / input.len() as f64;
    if !mse.is_finite() {
        return Err(ScoringError::NonFinite);
    }
    Ok(mse)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Shift(f32);

    impl Reconstructor for Shift {
        fn reconstruct(&self, input: &[f32]) -> Result<Vec<f32>, ScoringError> {
            Ok(input.iter().map(|v| v + self.0).collect())
        }
    }

    #[test]
    fn mse_of_constant_shift() {
        let model = AnomalyModel::new(Box::new(Shift(0.5)), 0.2);
        let s = model.score(&[1.0, 2.0, 3.0, 4.0]).unwrap();
        assert!((s.reconstruction_error - 0.25).abs() < 1e-12);
        assert!(s.is_anomaly);
    }

    #[test]
    fn error_equal_to_threshold_is_normal() {
        let model = AnomalyModel::new(Box::new(Shift(0.5)), 0.25);
        assert!(!model.score(&[0.0, 0.0]).unwrap().is_anomaly);
    }

    #[test]
    fn length_mismatch_is_an_error() {
        assert!(matches!(
            reconstruction_error(&[1.0, 2.0], &[1.0]),
            Err(ScoringError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn nan_reconstruction_is_an_error() {
        assert!(matches!(
            reconstruction_error(&[1.0], &[f32::NAN]),
            Err(ScoringError::NonFinite)
        ));
    }
}
