//! Scanner configuration. Model artifacts are produced by offline training and
//! only read here.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScannerConfig {
    /// Directory holding every trained artifact
    pub model_dir: PathBuf,
    /// Artifact file names inside `model_dir`
    pub artifacts: ArtifactsConfig,
    /// ONNX Runtime session settings
    pub onnx: OnnxConfig,
    /// Executable parsing limits
    pub extraction: ExtractionConfig,
    /// Verdict fusion policy
    pub fusion: FusionConfig,
    /// Batch scanning
    pub scan: ScanConfig,
    /// Logging
    pub log: LogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ArtifactsConfig {
    /// Ordered feature names (JSON array of strings)
    pub feature_columns: String,
    /// Standard scaler (JSON object with `mean` and `scale` arrays)
    pub scaler: String,
    /// Autoencoder MSE threshold (JSON number)
    pub ae_threshold: String,
    /// Classifier class labels in probability order (JSON array of strings)
    pub classes: String,
    /// Autoencoder model
    pub autoencoder: String,
    /// Classifier model
    pub classifier: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OnnxConfig {
    pub intra_threads: i16,
    /// Classifier output carrying the `[1, n_classes]` probabilities
    pub probability_output: String,
    /// Classifier output carrying the predicted class index; arg-max when unset
    pub label_output: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Executables larger than this are rejected before parsing
    pub max_file_bytes: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FusionConfig {
    /// Class name the classifier uses for clean samples
    pub benign_class: String,
    /// Confidence shown for a benign verdict when the classifier has no benign class
    pub benign_fallback_confidence: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Worker threads for batch scans; 0 lets rayon decide
    pub threads: usize,
    /// Only pick up files with executable magic when walking directories
    pub executables_only: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub level: String,
    pub json: bool,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            model_dir: PathBuf::from("models"),
            artifacts: ArtifactsConfig::default(),
            onnx: OnnxConfig::default(),
            extraction: ExtractionConfig::default(),
            fusion: FusionConfig::default(),
            scan: ScanConfig::default(),
            log: LogConfig::default(),
        }
    }
}

impl Default for ArtifactsConfig {
    fn default() -> Self {
        Self {
            feature_columns: "feature_columns.json".to_string(),
            scaler: "scaler.json".to_string(),
            ae_threshold: "ae_threshold.json".to_string(),
            classes: "rf_classes.json".to_string(),
            autoencoder: "autoencoder.onnx".to_string(),
            classifier: "rf_model.onnx".to_string(),
        }
    }
}

impl Default for OnnxConfig {
    fn default() -> Self {
        Self {
            intra_threads: 1,
            probability_output: "output_probability".to_string(),
            label_output: None,
        }
    }
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            max_file_bytes: 256 * 1024 * 1024,
        }
    }
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            benign_class: "Benign".to_string(),
            benign_fallback_confidence: 99.0,
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl ScannerConfig {
    /// Load from JSON file if present; otherwise return default.
    /// An unreadable or invalid file is reported on stderr and ignored.
    pub fn load(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }
        let parsed = std::fs::read_to_string(path)
            .map_err(|e| e.to_string())
            .and_then(|data| serde_json::from_str::<ScannerConfig>(&data).map_err(|e| e.to_string()));
        match parsed {
            Ok(c) => c,
            Err(e) => {
                // Logging is configured from this file, so it is not up yet.
                eprintln!("ignoring config {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    pub fn artifact_path(&self, file: &str) -> PathBuf {
        self.model_dir.join(file)
    }
}
