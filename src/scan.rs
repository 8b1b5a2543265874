//! Scan pipeline: input → normalized vector → scaled → both models → verdict.
//!
//! Each request runs synchronously to completion. Batches run independent
//! requests in parallel over one shared, read-only [`ScanContext`].

use crate::config::{ExtractionConfig, ScannerConfig};
use crate::error::{InputError, StartupError};
use crate::features::{extract_executable, FeatureSchema, FeatureVector, Normalizer};
use crate::input::{read_first_row, sha256_file, InputKind};
use crate::model::ModelArtifacts;
use crate::report::{FailedScan, ScanRecord, ScanReport};
use crate::risk::{Diagnostics, ScoringFailure, ScoringStage, Verdict, VerdictEngine};
use chrono::Utc;
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Everything loaded at startup. Never mutated afterwards.
pub struct ScanContext {
    artifacts: ModelArtifacts,
    engine: VerdictEngine,
    extraction: ExtractionConfig,
}

impl ScanContext {
    pub fn new(artifacts: ModelArtifacts, engine: VerdictEngine, extraction: ExtractionConfig) -> Self {
        Self {
            artifacts,
            engine,
            extraction,
        }
    }

    /// Load all artifacts named by `config`; any failure is fatal.
    pub fn load(config: &ScannerConfig) -> Result<Self, StartupError> {
        let artifacts = ModelArtifacts::load(config)?;
        Ok(Self::new(
            artifacts,
            VerdictEngine::new(config.fusion.clone()),
            config.extraction.clone(),
        ))
    }

    pub fn schema(&self) -> &Arc<FeatureSchema> {
        &self.artifacts.schema
    }

    pub fn classes(&self) -> &[String] {
        self.artifacts.classifier.classes()
    }

    pub fn normalizer(&self) -> Normalizer {
        Normalizer::new(Arc::clone(&self.artifacts.schema))
    }

    /// Static features of the executable at `path`, in schema order.
    pub fn extract(&self, path: &Path) -> Result<FeatureVector, InputError> {
        Ok(extract_executable(
            path,
            &self.artifacts.schema,
            self.extraction.max_file_bytes,
        )?)
    }

    /// Score a normalized vector. Model failures degrade the verdict; they
    /// are never returned as errors.
    pub fn evaluate(&self, vector: &FeatureVector) -> Verdict {
        let threshold = self.artifacts.anomaly.threshold();
        let scaled = match self.artifacts.scaler.transform(vector) {
            Ok(s) => s,
            Err(error) => {
                warn!(error = %error, "feature scaling failed; verdict undetermined");
                return VerdictEngine::undetermined(
                    Diagnostics {
                        anomaly: None,
                        classification: None,
                        threshold,
                    },
                    vec![ScoringFailure {
                        stage: ScoringStage::Scaling,
                        error,
                    }],
                );
            }
        };

        let anomaly = self.artifacts.anomaly.score(&scaled);
        let classification = self.artifacts.classifier.classify(&scaled);
        if let Ok(a) = &anomaly {
            debug!(mse = a.reconstruction_error, threshold, anomaly = a.is_anomaly, "autoencoder");
        }
        if let Ok(c) = &classification {
            debug!(label = %c.label, confidence = c.confidence, "classifier");
        }

        let verdict = self.engine.fuse(anomaly, classification, threshold);
        info!(
            malware_type = %verdict.malware_type,
            confidence = verdict.confidence,
            risk = verdict.risk_level.as_str(),
            degraded = verdict.is_degraded(),
            "hybrid verdict"
        );
        verdict
    }
}

pub struct Scanner {
    context: Arc<ScanContext>,
    pool: Option<rayon::ThreadPool>,
}

impl Scanner {
    /// `threads == 0` uses rayon's global pool.
    pub fn new(context: Arc<ScanContext>, threads: usize) -> Result<Self, StartupError> {
        let pool = if threads == 0 {
            None
        } else {
            Some(
                rayon::ThreadPoolBuilder::new()
                    .num_threads(threads)
                    .thread_name(|i| format!("scan-{}", i))
                    .build()?,
            )
        };
        Ok(Self { context, pool })
    }

    pub fn context(&self) -> &Arc<ScanContext> {
        &self.context
    }

    pub fn scan_path(&self, path: &Path) -> Result<ScanReport, InputError> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        self.scan_named(path, &name)
    }

    /// Scan `path`, reporting it under `file_name` (e.g. a spooled upload).
    pub fn scan_named(&self, path: &Path, file_name: &str) -> Result<ScanReport, InputError> {
        let kind = InputKind::detect(path)?;
        info!(file = file_name, kind = ?kind, "scanning");
        let vector = match kind {
            InputKind::Executable => self.context.extract(path)?,
            InputKind::Tabular => {
                let row = read_first_row(path)?;
                self.context.normalizer().from_row(&row)?
            }
        };
        let sha256 = match sha256_file(path) {
            Ok(h) => Some(h),
            Err(e) => {
                warn!(file = file_name, error = %e, "could not hash input");
                None
            }
        };
        let verdict = self.context.evaluate(&vector);
        Ok(ScanReport::new(file_name, kind, sha256, &verdict, Utc::now()))
    }

    fn scan_record(&self, path: &Path) -> ScanRecord {
        match self.scan_path(path) {
            Ok(report) => ScanRecord::Report(report),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "scan failed");
                ScanRecord::Failed(FailedScan::new(path.display().to_string(), e.to_string(), Utc::now()))
            }
        }
    }

    /// Scan every path in parallel; one record per path, in input order.
    pub fn scan_many(&self, paths: &[PathBuf]) -> Vec<ScanRecord> {
        let run = || -> Vec<ScanRecord> { paths.par_iter().map(|p| self.scan_record(p)).collect() };
        match &self.pool {
            Some(pool) => pool.install(run),
            None => run(),
        }
    }
}
