//! Loads every trained artifact once at startup.
//!
//! All of them are required; the first missing or invalid one aborts startup.

use super::anomaly::AnomalyModel;
use super::classifier::ClassifierModel;
use super::onnx::{OnnxClassifier, OnnxReconstructor, OnnxRuntime};
use super::scaler::StandardScaler;
use crate::config::ScannerConfig;
use crate::error::StartupError;
use crate::features::FeatureSchema;
use serde::de::DeserializeOwned;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Immutable model bundle shared by every request.
pub struct ModelArtifacts {
    pub schema: Arc<FeatureSchema>,
    pub scaler: StandardScaler,
    pub anomaly: AnomalyModel,
    pub classifier: ClassifierModel,
}

impl ModelArtifacts {
    /// Validates cross-artifact consistency; used by [`ModelArtifacts::load`]
    /// and by callers that bring their own model implementations.
    pub fn new(
        schema: FeatureSchema,
        scaler: StandardScaler,
        anomaly: AnomalyModel,
        classifier: ClassifierModel,
    ) -> Result<Self, StartupError> {
        scaler.validate(schema.len()).map_err(StartupError::Invalid)?;
        validate_threshold(anomaly.threshold())?;
        validate_classes(classifier.classes())?;
        Ok(Self {
            schema: Arc::new(schema),
            scaler,
            anomaly,
            classifier,
        })
    }

    pub fn load(config: &ScannerConfig) -> Result<Self, StartupError> {
        let a = &config.artifacts;
        let paths: Vec<PathBuf> = [
            &a.feature_columns,
            &a.scaler,
            &a.ae_threshold,
            &a.classes,
            &a.autoencoder,
            &a.classifier,
        ]
        .iter()
        .map(|f| config.artifact_path(f))
        .collect();
        if let Some(missing) = paths.iter().find(|p| !p.exists()) {
            tracing::error!(path = %missing.display(), "required model artifact not found");
            return Err(StartupError::MissingArtifact(missing.clone()));
        }
        tracing::info!(model_dir = %config.model_dir.display(), "loading model artifacts");

        let schema = Self::read_schema(config)?;
        let scaler: StandardScaler = read_json(&config.artifact_path(&a.scaler))?;
        let threshold: f64 = read_json(&config.artifact_path(&a.ae_threshold))?;
        let classes = Self::read_classes(config)?;

        let runtime = OnnxRuntime::new(config.onnx.intra_threads)?;
        let reconstructor = OnnxReconstructor::load(
            &runtime,
            &config.artifact_path(&a.autoencoder),
            schema.len(),
        )?;
        let classifier = OnnxClassifier::load(
            &runtime,
            &config.artifact_path(&a.classifier),
            &config.onnx.probability_output,
            config.onnx.label_output.as_deref(),
        )?;

        let artifacts = Self::new(
            schema,
            scaler,
            AnomalyModel::new(Box::new(reconstructor), threshold),
            ClassifierModel::new(Box::new(classifier), classes),
        )?;
        tracing::info!(
            features = artifacts.schema.len(),
            classes = artifacts.classifier.classes().len(),
            threshold = artifacts.anomaly.threshold(),
            "model artifacts loaded"
        );
        Ok(artifacts)
    }
}

impl ModelArtifacts {
    /// Only the feature-name list, without touching the models.
    pub fn read_schema(config: &ScannerConfig) -> Result<FeatureSchema, StartupError> {
        let names: Vec<String> = read_json(&config.artifact_path(&config.artifacts.feature_columns))?;
        FeatureSchema::new(names).map_err(StartupError::Invalid)
    }

    pub fn read_classes(config: &ScannerConfig) -> Result<Vec<String>, StartupError> {
        let classes: Vec<String> = read_json(&config.artifact_path(&config.artifacts.classes))?;
        validate_classes(&classes)?;
        Ok(classes)
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, StartupError> {
    let data = std::fs::read_to_string(path).map_err(|e| StartupError::io(path, e))?;
    serde_json::from_str(&data).map_err(|source| StartupError::Json {
        path: path.to_path_buf(),
        source,
    })
}

fn validate_threshold(threshold: f64) -> Result<(), StartupError> {
    if !threshold.is_finite() || threshold < 0.0 {
        return Err(StartupError::Invalid(format!(
            "anomaly threshold must be a finite non-negative number, got {}",
            threshold
        )));
    }
    Ok(())
}

fn validate_classes(classes: &[String]) -> Result<(), StartupError> {
    if classes.is_empty() {
        return Err(StartupError::Invalid("classifier class list is empty".to_string()));
    }
    let unique: HashSet<&str> = classes.iter().map(String::as_str).collect();
    if unique.len() != classes.len() {
        return Err(StartupError::Invalid("classifier class list has duplicates".to_string()));
    }
    Ok(())
}
