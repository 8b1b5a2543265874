//! Serialized scan record handed back to callers.

use crate::input::InputKind;
use crate::risk::{RiskLevel, Verdict};
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

const SCAN_TIME_FORMAT: &str = "%Y-%m-%d %I:%M:%S %p UTC";

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanReport {
    pub scan_id: String,
    pub file_name: String,
    pub scan_time: String,
    pub input_kind: InputKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,
    pub is_malware: bool,
    pub malware_type: String,
    pub confidence_score: f64,
    pub risk_level: RiskLevel,
    /// "Anomaly" or "Normal"
    pub ae_verdict_on_exe: &'static str,
    pub rf_raw_prediction: String,
    /// -1.0 when the autoencoder did not produce a score.
    pub ae_reconstruction_error: f64,
    pub ae_threshold: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ScanReport {
    pub fn new(
        file_name: impl Into<String>,
        input_kind: InputKind,
        sha256: Option<String>,
        verdict: &Verdict,
        at: DateTime<Utc>,
    ) -> Self {
        let anomaly = verdict.diagnostics.anomaly.as_ref();
        let error = if verdict.failures.is_empty() {
            None
        } else {
            Some(
                verdict
                    .failures
                    .iter()
                    .map(|f| format!("{:?}: {}", f.stage, f.error))
                    .collect::<Vec<_>>()
                    .join("; "),
            )
        };
        Self {
            scan_id: Uuid::new_v4().to_string(),
            file_name: file_name.into(),
            scan_time: at.format(SCAN_TIME_FORMAT).to_string(),
            input_kind,
            sha256,
            is_malware: verdict.is_malware,
            malware_type: verdict.malware_type.clone(),
            confidence_score: round_to(verdict.confidence, 2),
            risk_level: verdict.risk_level,
            ae_verdict_on_exe: if anomaly.map_or(false, |a| a.is_anomaly) {
                "Anomaly"
            } else {
                "Normal"
            },
            rf_raw_prediction: verdict
                .diagnostics
                .raw_label()
                .unwrap_or(crate::risk::ERROR_LABEL)
                .to_string(),
            ae_reconstruction_error: anomaly.map_or(-1.0, |a| round_to(a.reconstruction_error, 6)),
            ae_threshold: round_to(verdict.diagnostics.threshold, 6),
            error,
        }
    }
}

/// Record for an input that could not be scored at all.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FailedScan {
    pub file_name: String,
    pub scan_time: String,
    pub status: &'static str,
    pub message: String,
}

impl FailedScan {
    pub fn new(file_name: impl Into<String>, message: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self {
            file_name: file_name.into(),
            scan_time: at.format(SCAN_TIME_FORMAT).to_string(),
            status: "error",
            message: message.into(),
        }
    }
}

/// One line of batch output.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum ScanRecord {
    Report(ScanReport),
    Failed(FailedScan),
}

impl ScanRecord {
    pub fn file_name(&self) -> &str {
        match self {
            ScanRecord::Report(r) => &r.file_name,
            ScanRecord::Failed(f) => &f.file_name,
        }
    }

    pub fn is_malware(&self) -> bool {
        matches!(self, ScanRecord::Report(r) if r.is_malware)
    }
}

fn round_to(v: f64, decimals: i32) -> f64 {
    let f = 10f64.powi(decimals);
    (v * f).round() / f
}
