//! Pretrained models: scaling, autoencoder anomaly gate, family classifier.

pub mod anomaly;
pub mod artifacts;
pub mod classifier;
pub mod onnx;
pub mod scaler;

pub use anomaly::{reconstruction_error, AnomalyModel, AnomalyScore, Reconstructor};
pub use artifacts::ModelArtifacts;
pub use classifier::{
    Classification, ClassifierModel, PredictedLabel, ProbabilisticClassifier, RawPrediction,
};
pub use onnx::{OnnxClassifier, OnnxReconstructor, OnnxRuntime};
pub use scaler::StandardScaler;
