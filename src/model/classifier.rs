//! Multi-class family classifier.

use crate::error::ScoringError;
use serde::Serialize;

/// What the underlying model reports as its prediction.
#[derive(Debug, Clone, PartialEq)]
pub enum PredictedLabel {
    Index(i64),
    Name(String),
}

impl PredictedLabel {
    /// Index of the largest probability (first one on ties).
    pub fn argmax(probabilities: &[f32]) -> Result<Self, ScoringError> {
        let mut best: Option<(usize, f32)> = None;
        for (i, &p) in probabilities.iter().enumerate() {
            if best.map_or(true, |(_, b)| p > b) {
                best = Some((i, p));
            }
        }
        best.map(|(i, _)| PredictedLabel::Index(i as i64))
            .ok_or(ScoringError::EmptyDistribution)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RawPrediction {
    pub label: PredictedLabel,
    pub probabilities: Vec<f32>,
}

pub trait ProbabilisticClassifier: Send + Sync {
    fn predict(&self, input: &[f32]) -> Result<RawPrediction, ScoringError>;
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Classification {
    /// Predicted class name, or the raw model label when it maps to no known class.
    pub label: String,
    /// `None` when the label could not be mapped to a class index.
    pub class_index: Option<usize>,
    /// Probability of the predicted class in percent; the distribution's
    /// maximum when the label is unmapped.
    pub confidence: f64,
    pub distribution: Vec<(String, f64)>,
}

impl Classification {
    pub fn probability_of(&self, class: &str) -> Option<f64> {
        self.distribution
            .iter()
            .find(|(c, _)| c == class)
            .map(|(_, p)| *p)
    }
}

pub struct ClassifierModel {
    classifier: Box<dyn ProbabilisticClassifier>,
    classes: Vec<String>,
}

impl ClassifierModel {
    pub fn new(classifier: Box<dyn ProbabilisticClassifier>, classes: Vec<String>) -> Self {
        Self {
            classifier,
            classes,
        }
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    pub fn classify(&self, input: &[f32]) -> Result<Classification, ScoringError> {
        let raw = self.classifier.predict(input)?;
        if raw.probabilities.is_empty() {
            return Err(ScoringError::EmptyDistribution);
        }
        if raw.probabilities.len() != self.classes.len() {
            return Err(ScoringError::DistributionMismatch {
                expected: self.classes.len(),
                actual: raw.probabilities.len(),
            });
        }
        let probabilities: Vec<f64> = raw.probabilities.iter().map(|&p| p as f64).collect();
        if probabilities.iter().any(|p| !p.is_finite()) {
            return Err(ScoringError::NonFinite);
        }

        let (label, class_index) = match raw.label {
            PredictedLabel::Index(i) => match usize::try_from(i).ok().filter(|&i| i < self.classes.len()) {
                Some(i) => (self.classes[i].clone(), Some(i)),
                None => (i.to_string(), None),
            },
            PredictedLabel::Name(name) => {
                let idx = self.classes.iter().position(|c| *c == name);
                (name, idx)
            }
        };

        let probability = match class_index {
            Some(i) => probabilities[i],
            None => {
                tracing::warn!(label = %label, "classifier label maps to no known class; using max probability");
                probabilities.iter().copied().fold(0.0, f64::max)
            }
        };

        Ok(Classification {
            label,
            class_index,
            confidence: probability * 100.0,
            distribution: self.classes.iter().cloned().zip(probabilities).collect(),
        })
    }
}
