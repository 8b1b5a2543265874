//! ONNX Runtime backing for the autoencoder and the classifier.
//! Input for both: [1, feature_dim] f32 in schema order, already scaled.
//!
//! Classifiers must be exported with a plain probability tensor output
//! (for skl2onnx: `zipmap=False`). When no label output is configured the
//! predicted class is the arg-max of the probabilities.

use super::anomaly::Reconstructor;
use super::classifier::{PredictedLabel, ProbabilisticClassifier, RawPrediction};
use crate::error::{ScoringError, StartupError};
use ndarray::{Array2, CowArray};
use ort::tensor::OrtOwnedTensor;
use ort::{Environment, GraphOptimizationLevel, Session, SessionBuilder, Value};
use std::path::Path;
use std::sync::Arc;

/// Shared ONNX Runtime environment; built once at startup.
pub struct OnnxRuntime {
    env: Arc<Environment>,
    intra_threads: i16,
}

impl OnnxRuntime {
    pub fn new(intra_threads: i16) -> Result<Self, StartupError> {
        let env = Environment::builder()
            .with_name("hybrid-scan")
            .build()?
            .into_arc();
        Ok(Self {
            env,
            intra_threads: intra_threads.max(1),
        })
    }

    fn session(&self, path: &Path) -> Result<Session, StartupError> {
        if !path.exists() {
            return Err(StartupError::MissingArtifact(path.to_path_buf()));
        }
        let session = SessionBuilder::new(&self.env)?
            .with_optimization_level(GraphOptimizationLevel::Level1)?
            .with_intra_threads(self.intra_threads)?
            .with_model_from_file(path)?;
        Ok(session)
    }
}

fn run(session: &Session, input: &[f32]) -> Result<Vec<Value<'static>>, ScoringError> {
    let array = CowArray::from(Array2::from_shape_vec((1, input.len()), input.to_vec())?.into_dyn());
    let value = Value::from_array(session.allocator(), &array)?;
    Ok(session.run(vec![value])?)
}

fn extract_f32(value: &Value<'static>) -> Result<Vec<f32>, ScoringError> {
    let tensor: OrtOwnedTensor<f32, _> = value.try_extract()?;
    let out = tensor.view().iter().copied().collect();
    Ok(out)
}

fn output_index(session: &Session, name: &str) -> Result<usize, StartupError> {
    session
        .outputs
        .iter()
        .position(|o| o.name == name)
        .ok_or_else(|| {
            let available: Vec<&str> = session.outputs.iter().map(|o| o.name.as_str()).collect();
            StartupError::Invalid(format!(
                "model has no output '{}' (available: {})",
                name,
                available.join(", ")
            ))
        })
}

/// Autoencoder whose first output is the reconstruction of its input.
pub struct OnnxReconstructor {
    session: Session,
    feature_dim: usize,
}

impl OnnxReconstructor {
    pub fn load(runtime: &OnnxRuntime, path: &Path, feature_dim: usize) -> Result<Self, StartupError> {
        let session = runtime.session(path)?;
        tracing::info!(path = %path.display(), feature_dim, "loaded autoencoder");
        Ok(Self {
            session,
            feature_dim,
        })
    }
}

impl Reconstructor for OnnxReconstructor {
    fn reconstruct(&self, input: &[f32]) -> Result<Vec<f32>, ScoringError> {
        if input.len() != self.feature_dim {
            return Err(ScoringError::DimensionMismatch {
                expected: self.feature_dim,
                actual: input.len(),
            });
        }
        let outputs = run(&self.session, input)?;
        let first = outputs
            .first()
            .ok_or_else(|| ScoringError::MissingOutput("reconstruction".to_string()))?;
        extract_f32(first)
    }
}

/// Multi-class classifier with a `[1, n_classes]` probability output.
pub struct OnnxClassifier {
    session: Session,
    probability_output: usize,
    label_output: Option<usize>,
}

impl OnnxClassifier {
    pub fn load(
        runtime: &OnnxRuntime,
        path: &Path,
        probability_output: &str,
        label_output: Option<&str>,
    ) -> Result<Self, StartupError> {
        let session = runtime.session(path)?;
        let probability_output = output_index(&session, probability_output)?;
        let label_output = label_output
            .map(|name| output_index(&session, name))
            .transpose()?;
        tracing::info!(
            path = %path.display(),
            label_from_model = label_output.is_some(),
            "loaded classifier"
        );
        Ok(Self {
            session,
            probability_output,
            label_output,
        })
    }
}

impl ProbabilisticClassifier for OnnxClassifier {
    fn predict(&self, input: &[f32]) -> Result<RawPrediction, ScoringError> {
        let outputs = run(&self.session, input)?;
        let probabilities = outputs
            .get(self.probability_output)
            .ok_or_else(|| ScoringError::MissingOutput("probabilities".to_string()))
            .and_then(extract_f32)?;

        let label = match self.label_output {
            Some(i) => {
                let value = outputs
                    .get(i)
                    .ok_or_else(|| ScoringError::MissingOutput("label".to_string()))?;
                let tensor: OrtOwnedTensor<i64, _> = value.try_extract()?;
                let index = tensor
                    .view()
                    .iter()
                    .next()
                    .copied()
                    .ok_or_else(|| ScoringError::MissingOutput("label".to_string()))?;
                PredictedLabel::Index(index)
            }
            None => PredictedLabel::argmax(&probabilities)?,
        };

        Ok(RawPrediction {
            label,
            probabilities,
        })
    }
}
