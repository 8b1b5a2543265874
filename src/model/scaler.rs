//! Standard scaling fitted offline: `(x - mean) / scale` per feature.

use crate::error::ScoringError;
use crate::features::FeatureVector;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct StandardScaler {
    mean: Vec<f64>,
    scale: Vec<f64>,
}

impl StandardScaler {
    pub fn new(mean: Vec<f64>, scale: Vec<f64>) -> Self {
        Self { mean, scale }
    }

    /// Identity transform over `dim` features.
    pub fn identity(dim: usize) -> Self {
        Self::new(vec![0.0; dim], vec![1.0; dim])
    }

    pub fn dim(&self) -> usize {
        self.mean.len()
    }

    pub fn validate(&self, dim: usize) -> Result<(), String> {
        if self.mean.len() != dim || self.scale.len() != dim {
            return Err(format!(
                "scaler has {} means and {} scales, schema has {} features",
                self.mean.len(),
                self.scale.len(),
                dim
            ));
        }
        if self.mean.iter().chain(&self.scale).any(|v| !v.is_finite()) {
            return Err("scaler contains non-finite values".to_string());
        }
        Ok(())
    }

    /// Scaled values as the f32 tensor row the models consume.
    pub fn transform(&self, vector: &FeatureVector) -> Result<Vec<f32>, ScoringError> {
        let values = vector.as_slice();
        if values.len() != self.dim() {
            return Err(ScoringError::DimensionMismatch {
                expected: self.dim(),
                actual: values.len(),
            });
        }
        Ok(values
            .iter()
            .zip(self.mean.iter().zip(&self.scale))
            .map(|(&x, (&m, &s))| {
                let s = if s == 0.0 { 1.0 } else { s };
                ((x - m) / s) as f32
            })
            .collect())
    }
}
