//! Fuses the anomaly gate with the family classifier into one verdict.
//!
//! Policy:
//! - not anomalous → `Benign`, risk `Low`, confidence from the classifier's
//!   benign class (or the configured fallback when there is none);
//! - anomalous → the classifier's label verbatim, even `Benign`, with the
//!   probability of that label; risk from the label;
//! - either model failed → `Error`, risk `Undetermined`, confidence 0.
//!
//! An anomalous sample labelled `Benign` by the classifier is reported as is,
//! with both raw model outputs kept in [`Diagnostics`].

use crate::config::FusionConfig;
use crate::error::ScoringError;
use crate::model::{AnomalyScore, Classification};
use serde::{Deserialize, Serialize};

pub const ERROR_LABEL: &str = "Error";

const LABEL_RISK: &[(&str, RiskLevel)] = &[
    ("Ransomware", RiskLevel::Critical),
    ("Trojan", RiskLevel::High),
    ("Spyware", RiskLevel::Medium),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
    Undetermined,
}

impl RiskLevel {
    /// Risk of an anomalous sample, by substring of its label, first match wins.
    pub fn from_label(label: &str) -> Self {
        LABEL_RISK
            .iter()
            .find(|(needle, _)| label.contains(needle))
            .map_or(RiskLevel::Medium, |(_, level)| *level)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "Low",
            RiskLevel::Medium => "Medium",
            RiskLevel::High => "High",
            RiskLevel::Critical => "Critical",
            RiskLevel::Undetermined => "Undetermined",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoringStage {
    Scaling,
    Anomaly,
    Classifier,
}

/// A model failure kept alongside the degraded verdict.
#[derive(Debug)]
pub struct ScoringFailure {
    pub stage: ScoringStage,
    pub error: ScoringError,
}

/// Raw outputs of both models, for auditing disagreement between them.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnostics {
    pub anomaly: Option<AnomalyScore>,
    pub classification: Option<Classification>,
    /// Threshold in force, reported even when the autoencoder failed.
    pub threshold: f64,
}

impl Diagnostics {
    pub fn raw_label(&self) -> Option<&str> {
        self.classification.as_ref().map(|c| c.label.as_str())
    }
}

#[derive(Debug)]
pub struct Verdict {
    /// Always false for a degraded verdict, even if the autoencoder flagged
    /// the sample; check [`Verdict::is_degraded`] first.
    pub is_malware: bool,
    pub malware_type: String,
    /// Percent, in `[0, 100]`.
    pub confidence: f64,
    pub risk_level: RiskLevel,
    pub diagnostics: Diagnostics,
    pub failures: Vec<ScoringFailure>,
}

impl Verdict {
    pub fn is_degraded(&self) -> bool {
        !self.failures.is_empty()
    }
}

pub struct VerdictEngine {
    config: FusionConfig,
}

impl VerdictEngine {
    pub fn new(config: FusionConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &FusionConfig {
        &self.config
    }

    /// Both results are expected to have been computed; neither is skipped
    /// based on the other.
    pub fn fuse(
        &self,
        anomaly: Result<AnomalyScore, ScoringError>,
        classification: Result<Classification, ScoringError>,
        threshold: f64,
    ) -> Verdict {
        let mut failures = Vec::new();
        let anomaly = anomaly
            .map_err(|error| failures.push(ScoringFailure {
                stage: ScoringStage::Anomaly,
                error,
            }))
            .ok();
        let classification = classification
            .map_err(|error| failures.push(ScoringFailure {
                stage: ScoringStage::Classifier,
                error,
            }))
            .ok();
        let diagnostics = Diagnostics {
            anomaly,
            classification,
            threshold,
        };

        let (Some(score), Some(class)) = (&diagnostics.anomaly, &diagnostics.classification) else {
            for f in &failures {
                tracing::warn!(stage = ?f.stage, error = %f.error, "model evaluation failed; verdict undetermined");
            }
            return Self::undetermined(diagnostics, failures);
        };

        let (is_malware, malware_type, confidence, risk_level) = if score.is_anomaly {
            (
                true,
                class.label.clone(),
                class.confidence,
                RiskLevel::from_label(&class.label),
            )
        } else {
            let confidence = class
                .probability_of(&self.config.benign_class)
                .map(|p| p * 100.0)
                .unwrap_or(self.config.benign_fallback_confidence);
            (
                false,
                self.config.benign_class.clone(),
                confidence,
                RiskLevel::Low,
            )
        };

        if score.is_anomaly && class.label == self.config.benign_class {
            tracing::info!(
                reconstruction_error = score.reconstruction_error,
                "autoencoder flagged anomaly but classifier predicts benign class"
            );
        }

        Verdict {
            is_malware,
            malware_type,
            confidence: confidence.clamp(0.0, 100.0),
            risk_level,
            diagnostics,
            failures,
        }
    }

    /// Verdict used when scoring could not run at all (e.g. scaling failed).
    pub fn undetermined(diagnostics: Diagnostics, failures: Vec<ScoringFailure>) -> Verdict {
        Verdict {
            is_malware: false,
            malware_type: ERROR_LABEL.to_string(),
            confidence: 0.0,
            risk_level: RiskLevel::Undetermined,
            diagnostics,
            failures,
        }
    }
}
